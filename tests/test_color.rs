mod common;

use common::*;
use streetscan::analysis::ColorProfiler;
use streetscan::error::SceneError;

#[test]
fn test_uniform_red_region() -> anyhow::Result<()> {
    let mut image = solid_image(100, 60, WHITE);
    paint_rect(&mut image, 10, 10, 60, 40, RED);
    let profiler = ColorProfiler::new(&image);

    let fingerprint = profiler.profile(&Quad::from_rect(15.0, 15.0, 55.0, 35.0))?;

    assert_eq!(fingerprint.hue_mean, 0.0);
    assert_eq!(fingerprint.hue_std, 0.0);
    assert_eq!(fingerprint.sat_mean, 255.0);
    assert_eq!(fingerprint.val_mean, 255.0);
    assert_eq!(fingerprint.sat_std, 0.0);
    assert_eq!(fingerprint.val_std, 0.0);
    Ok(())
}

#[test]
fn test_region_boundary_is_included() -> anyhow::Result<()> {
    // A red frame around a black interior: the frame pixels must be sampled
    let mut image = solid_image(50, 50, BLACK);
    paint_rect(&mut image, 10, 10, 30, 30, RED);
    paint_rect(&mut image, 11, 11, 29, 29, BLACK);
    let profiler = ColorProfiler::new(&image);

    let fingerprint = profiler.profile(&Quad::from_rect(10.0, 10.0, 30.0, 30.0))?;

    assert!(fingerprint.val_mean > 0.0);
    assert!(fingerprint.val_mean < 255.0);
    assert!(fingerprint.val_std > 0.0);
    Ok(())
}

#[test]
fn test_profile_is_deterministic() -> anyhow::Result<()> {
    let image = gradient_image(120, 80);
    let quad = Quad::ordered([
        Point::new(12.3, 20.0),
        Point::new(90.7, 14.2),
        Point::new(95.0, 50.5),
        Point::new(15.1, 60.0),
    ]);

    let first = ColorProfiler::new(&image).profile(&quad)?;
    let second = ColorProfiler::new(&image).profile(&quad)?;

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_standard_deviations_are_non_negative() -> anyhow::Result<()> {
    let image = gradient_image(120, 80);
    let profiler = ColorProfiler::new(&image);

    for quad in [
        Quad::from_rect(0.0, 0.0, 119.0, 79.0),
        Quad::from_rect(30.0, 10.0, 31.0, 11.0),
        Quad::from_rect(-20.0, -20.0, 40.0, 40.0),
    ] {
        let fingerprint = profiler.profile(&quad)?;
        assert!(fingerprint.hue_std >= 0.0);
        assert!(fingerprint.sat_std >= 0.0);
        assert!(fingerprint.val_std >= 0.0);
    }
    Ok(())
}

#[test]
fn test_region_outside_image_is_empty() -> anyhow::Result<()> {
    let profiler = ColorProfiler::new(&solid_image(50, 50, RED));
    let quad = Quad::from_rect(100.0, 100.0, 140.0, 120.0);

    let err = profiler.profile(&quad).expect_err("no pixels selected");

    assert_eq!(err, SceneError::EmptyRegion { bbox: quad });
    Ok(())
}

#[test]
fn test_collapsed_polygon_is_empty() -> anyhow::Result<()> {
    let profiler = ColorProfiler::new(&solid_image(50, 50, RED));
    let quad = Quad::new([Point::new(10.0, 10.0); 4]);

    assert!(matches!(
        profiler.profile(&quad),
        Err(SceneError::EmptyRegion { .. })
    ));
    Ok(())
}

#[test]
fn test_characterize_keeps_order_and_skips_empty_regions() -> anyhow::Result<()> {
    let profiler = ColorProfiler::new(&solid_image(100, 100, RED));

    let characterized = profiler.characterize(vec![
        Detection::Raw(make_word("ONE", 0.0, 0.0, 20.0, 10.0)),
        Detection::Raw(make_word("LOST", 500.0, 500.0, 520.0, 510.0)),
        Detection::Raw(make_word("TWO", 30.0, 30.0, 60.0, 40.0)),
    ]);

    let texts: Vec<&str> = characterized.iter().map(|c| c.text()).collect();
    assert_eq!(texts, vec!["ONE", "TWO"]);
    assert!(characterized.iter().all(|c| !c.is_in_street_list && c.grade == 0.0));
    Ok(())
}

#[test]
fn test_characterized_detections_pass_through() -> anyhow::Result<()> {
    let profiler = ColorProfiler::new(&solid_image(100, 100, RED));
    let word = make_word("KEEP", 0.0, 0.0, 20.0, 10.0);
    let fingerprint = profiler.profile(&Quad::from_rect(50.0, 50.0, 60.0, 60.0))?;
    let mut prepared = CharacterizedInstance::new(word, fingerprint);
    prepared.grade = 0.5;

    let characterized = profiler.characterize(vec![Detection::Characterized(prepared.clone())]);

    assert_eq!(characterized, vec![prepared]);
    Ok(())
}
