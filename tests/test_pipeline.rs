mod common;

use std::time::Duration;

use common::*;
use streetscan::geolocation::{LocationOutcome, LocationQuery, locate};
use streetscan::pipeline::{SceneReport, ScenePipeline};

fn scripted_scene() -> ScriptedSource {
    ScriptedSource::new(vec![
        vec![make_word("MAIN", 800.0, 100.0, 900.0, 130.0)],
        vec![
            make_word("MAIN", 40.0, 100.0, 140.0, 130.0),
            make_word("ST", 140.0, 100.0, 200.0, 130.0),
        ],
        vec![make_word("PIZZA", 500.0, 600.0, 650.0, 640.0)],
    ])
}

fn run_scene() -> anyhow::Result<SceneReport> {
    let panorama = solid_image(3000, 1000, WHITE);
    ScenePipeline::new(SceneConfig::default()).run(&scripted_scene(), &panorama)
}

#[test]
fn test_pipeline_finds_street_label() -> anyhow::Result<()> {
    let report = run_scene()?;

    assert_eq!(report.words.len(), 3);
    let streets: Vec<&str> = report.streets.iter().map(|s| s.text()).collect();
    let others: Vec<&str> = report.others.iter().map(|s| s.text()).collect();
    assert_eq!(streets, vec!["MAIN ST"]);
    assert_eq!(others, vec!["PIZZA"]);
    assert_eq!(report.regions().count(), 2);
    Ok(())
}

#[test]
fn test_extracted_words_listing() -> anyhow::Result<()> {
    let report = run_scene()?;

    assert_eq!(
        report.extracted_words(),
        "streets:\n\tMAIN ST\nothers:\n\tPIZZA\n"
    );
    assert_eq!(SceneReport::default().extracted_words(), "streets:\nothers:\n");
    Ok(())
}

#[test]
fn test_debug_dir_receives_stage_outputs() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let debug_dir = dir.path().join("debug");
    let panorama = solid_image(3000, 1000, WHITE);

    ScenePipeline::new(SceneConfig::default())
        .with_debug(debug_dir.clone())?
        .run(&scripted_scene(), &panorama)?;

    for stage in ["01_detection", "02_merge", "03_classification"] {
        assert!(debug_dir.join(stage).join("data.json").is_file());
    }
    Ok(())
}

#[test]
fn test_each_scene_gets_its_own_debug_dir() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let debug_dir = dir.path().join("debug");
    let panorama = solid_image(3000, 1000, WHITE);
    let pipeline = ScenePipeline::new(SceneConfig::default()).with_debug(debug_dir.clone())?;

    for scene in ["corner_a", "corner_b"] {
        pipeline.for_scene(scene)?.run(&scripted_scene(), &panorama)?;
    }

    for scene in ["corner_a", "corner_b"] {
        let detection = debug_dir.join(scene).join("01_detection").join("data.json");
        assert!(detection.is_file());
    }
    assert!(!debug_dir.join("01_detection").exists());
    Ok(())
}

#[test]
fn test_debug_dir_must_be_empty() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    std::fs::write(dir.path().join("leftover.txt"), "x")?;

    assert!(
        ScenePipeline::new(SceneConfig::default())
            .with_debug(dir.path().to_path_buf())
            .is_err()
    );
    Ok(())
}

#[tokio::test]
async fn test_geolocation_found() -> anyhow::Result<()> {
    let report = run_scene()?;
    let search = FakeSearch::answering(vec![make_location("Main Street, Springfield")]);

    let outcome = report.geolocate(&search, Duration::from_secs(5)).await;

    assert_eq!(
        outcome,
        LocationOutcome::Found(vec![make_location("Main Street, Springfield")])
    );
    assert_eq!(search.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_geolocation_empty_answer_is_not_found() -> anyhow::Result<()> {
    let report = run_scene()?;
    let search = FakeSearch::answering(Vec::new());

    let outcome = report.geolocate(&search, Duration::from_secs(5)).await;

    assert_eq!(outcome, LocationOutcome::NotFound);
    Ok(())
}

#[tokio::test]
async fn test_geolocation_failure_keeps_results() -> anyhow::Result<()> {
    let report = run_scene()?;
    let search = FakeSearch::failing("service unavailable");

    let outcome = report.geolocate(&search, Duration::from_secs(5)).await;

    assert!(matches!(&outcome, LocationOutcome::Failed(reason) if reason.contains("service unavailable")));
    assert_eq!(report.streets.len(), 1);
    assert_eq!(report.others.len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_geolocation_timeout_is_failure() -> anyhow::Result<()> {
    let report = run_scene()?;
    let search = FakeSearch::answering(vec![make_location("too late")])
        .with_delay(Duration::from_secs(60));

    let outcome = report.geolocate(&search, Duration::from_millis(50)).await;

    assert!(matches!(outcome, LocationOutcome::Failed(_)));
    assert_eq!(report.streets.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_nothing_to_search_skips_the_service() -> anyhow::Result<()> {
    let search = FakeSearch::answering(vec![make_location("anywhere")]);

    let outcome = locate(&search, &[], &[], Duration::from_secs(5)).await;

    assert_eq!(outcome, LocationOutcome::NotFound);
    assert_eq!(search.calls(), 0);
    Ok(())
}

#[test]
fn test_location_query_text() -> anyhow::Result<()> {
    let report = run_scene()?;

    let query = LocationQuery::new(&report.streets, &report.others);
    assert_eq!(query.free_form(), "MAIN ST");

    let fallback = LocationQuery::new(&[], &report.others);
    assert_eq!(fallback.free_form(), "PIZZA");
    Ok(())
}
