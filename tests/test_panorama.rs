mod common;

use common::*;
use streetscan::panorama::{
    PANORAMA_FILE_NAME, PanoramaBuilder, StripPanorama, load_scene_images, scene_image_paths,
};

#[test]
fn test_strip_scales_to_common_height() -> anyhow::Result<()> {
    let images = vec![solid_image(10, 20, RED), solid_image(20, 40, WHITE)];

    let panorama = StripPanorama.build(&images, false)?;

    assert_eq!((panorama.width(), panorama.height()), (20, 20));
    let rgb = panorama.to_rgb8();
    assert_eq!(*rgb.get_pixel(2, 10), RED);
    assert_eq!(*rgb.get_pixel(17, 10), WHITE);
    Ok(())
}

#[test]
fn test_strip_ignores_reorder_request() -> anyhow::Result<()> {
    let images = vec![solid_image(10, 10, WHITE), solid_image(10, 10, RED)];

    let panorama = StripPanorama.build(&images, true)?;

    assert_eq!(*panorama.to_rgb8().get_pixel(0, 0), WHITE);
    Ok(())
}

#[test]
fn test_strip_needs_images() -> anyhow::Result<()> {
    assert!(StripPanorama.build(&[], false).is_err());
    Ok(())
}

#[test]
fn test_scene_images_sorted_by_name() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    solid_image(4, 4, RED).save(dir.path().join("b.png"))?;
    solid_image(6, 4, WHITE).save(dir.path().join("a.png"))?;
    std::fs::write(dir.path().join("notes.txt"), "not an image")?;
    std::fs::create_dir(dir.path().join("c.png"))?;

    let paths = scene_image_paths(dir.path())?;
    let names: Vec<String> = paths
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(names, vec!["a.png", "b.png"]);

    let images = load_scene_images(dir.path())?;
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].width(), 6);
    Ok(())
}

#[test]
fn test_scene_without_images_fails() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;

    assert!(load_scene_images(dir.path()).is_err());
    Ok(())
}

#[test]
fn test_previous_panorama_is_not_a_photograph() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    solid_image(4, 4, RED).save(dir.path().join("a.png"))?;
    solid_image(8, 4, WHITE).save(dir.path().join(PANORAMA_FILE_NAME))?;

    let paths = scene_image_paths(dir.path())?;
    assert_eq!(paths, vec![dir.path().join("a.png")]);

    let images = load_scene_images(dir.path())?;
    let panorama = StripPanorama.build(&images, false)?;
    assert_eq!(panorama.width(), 4);
    Ok(())
}
