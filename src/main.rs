use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser};
use image::DynamicImage;
use log::{error, info, warn};

use streetscan::core::WordsArchive;
use streetscan::geolocation::{LocationOutcome, NominatimClient};
use streetscan::panorama::{self, PANORAMA_FILE_NAME, PanoramaBuilder, StripPanorama};
use streetscan::{OcrsDetector, SceneConfig, ScenePipeline};

const ARCHIVE_FILE: &str = "words.tar.zst";
const EXTRACTED_WORDS_FILE: &str = "extracted_words.txt";
const LOCATION_FILE: &str = "location.txt";

#[derive(Parser)]
#[command(name = "streetscan")]
#[command(about = "Read street signs from panoramas and locate the scene")]
struct Cli {
    #[command(flatten)]
    input: Input,

    /// Results directory (default: inside the input directory)
    #[arg(long, value_name = "DIR")]
    results_dir: Option<PathBuf>,

    /// Photos are named in left-to-right order; do not try to reorder them
    #[arg(long)]
    dont_reorder: bool,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Detection window size in pixels (overrides the config file)
    #[arg(long, value_name = "N")]
    window_size: Option<u32>,

    /// Reuse an existing words archive instead of detecting again
    #[arg(long)]
    resume: bool,

    /// Do not query the location service
    #[arg(long)]
    skip_geolocation: bool,

    /// Text detection model (default: ~/.cache/ocrs/text-detection.rten)
    #[arg(long, value_name = "FILE", requires = "recognition_model")]
    detection_model: Option<PathBuf>,

    /// Text recognition model (default: ~/.cache/ocrs/text-recognition.rten)
    #[arg(long, value_name = "FILE", requires = "detection_model")]
    recognition_model: Option<PathBuf>,

    /// Save intermediate results to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Input {
    /// Parent directory with one subdirectory per scene
    #[arg(long, value_name = "DIR")]
    scenes_dir: Option<PathBuf>,

    /// Directory containing the photos of one scene
    #[arg(long, value_name = "DIR")]
    single_scene: Option<PathBuf>,
}

struct Runner<'a> {
    args: &'a Cli,
    detector: Option<OcrsDetector>,
    search: Option<NominatimClient>,
}

fn ensure_detector<'d>(
    detector: &'d mut Option<OcrsDetector>,
    args: &Cli,
) -> anyhow::Result<&'d OcrsDetector> {
    if detector.is_none() {
        info!("Loading OCR models");
        let loaded = match (&args.detection_model, &args.recognition_model) {
            (Some(detection), Some(recognition)) => OcrsDetector::from_models(detection, recognition)?,
            _ => OcrsDetector::from_cache_dir()?,
        };
        *detector = Some(loaded);
    }
    detector.as_ref().context("OCR detector unavailable")
}

impl Runner<'_> {
    async fn process_scene(
        &mut self,
        pipeline: &ScenePipeline,
        scene_dir: &Path,
        output_dir: &Path,
    ) -> anyhow::Result<()> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create results dir {:?}", output_dir))?;

        let archive_path = output_dir.join(ARCHIVE_FILE);
        let (panorama, words) = if self.args.resume && archive_path.is_file() {
            info!("Resuming from {:?}", archive_path);
            let archive = WordsArchive::load(&archive_path)?;
            let panorama = match archive.panorama {
                Some(panorama) => panorama,
                None => load_image(&output_dir.join(PANORAMA_FILE_NAME))?,
            };
            (panorama, archive.words)
        } else {
            let images = panorama::load_scene_images(scene_dir)?;
            let panorama = StripPanorama.build(&images, !self.args.dont_reorder)?;
            save_image(&panorama, &output_dir.join(PANORAMA_FILE_NAME))?;

            let detector = ensure_detector(&mut self.detector, self.args)?;
            let words = pipeline.detect(detector, &panorama)?;
            WordsArchive::new(
                words.clone(),
                (panorama.width(), panorama.height()),
                pipeline.config().window.size,
            )?
            .with_panorama(panorama.clone())
            .save(&archive_path)?;
            (panorama, words)
        };

        let report = pipeline.analyze(&panorama, words)?;

        let words_path = output_dir.join(EXTRACTED_WORDS_FILE);
        std::fs::write(&words_path, report.extracted_words())
            .with_context(|| format!("Failed to write {:?}", words_path))?;

        if let Some(search) = &self.search {
            let timeout = Duration::from_secs(pipeline.config().geolocation.timeout_secs);
            let outcome = report.geolocate(search, timeout).await;
            match &outcome {
                LocationOutcome::Found(locations) => {
                    if let Some(best) = locations.first() {
                        info!("Best location: {}", best.display_name);
                    }
                }
                LocationOutcome::NotFound => info!("No location matches the extracted text"),
                LocationOutcome::Failed(reason) => warn!("Location search failed: {}", reason),
            }

            let location_path = output_dir.join(LOCATION_FILE);
            std::fs::write(&location_path, format!("{}\n", outcome))
                .with_context(|| format!("Failed to write {:?}", location_path))?;
        }

        Ok(())
    }
}

fn load_image(path: &Path) -> anyhow::Result<DynamicImage> {
    image::ImageReader::open(path)
        .with_context(|| format!("Failed to open image {:?}", path))?
        .decode()
        .with_context(|| format!("Failed to decode image {:?}", path))
}

fn save_image(image: &DynamicImage, path: &Path) -> anyhow::Result<()> {
    image
        .save(path)
        .with_context(|| format!("Failed to save image {:?}", path))
}

fn init_logging(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => SceneConfig::from_file(path)?,
        None => SceneConfig::default(),
    };
    if let Some(size) = args.window_size {
        config.window.size = size;
    }

    let search = if args.skip_geolocation {
        None
    } else {
        Some(NominatimClient::new(config.geolocation.clone())?)
    };

    let mut pipeline = ScenePipeline::new(config);
    if let Some(debug_dir) = &args.debug_out {
        pipeline = pipeline.with_debug(debug_dir.clone())?;
    }

    if let Some(results_dir) = &args.results_dir {
        std::fs::create_dir_all(results_dir)
            .with_context(|| format!("Failed to create results dir {:?}", results_dir))?;
    }

    let mut runner = Runner {
        args: &args,
        detector: None,
        search,
    };

    if let Some(scenes_dir) = &args.input.scenes_dir {
        let results_dir = args.results_dir.clone().unwrap_or_else(|| scenes_dir.clone());

        let mut scenes: Vec<PathBuf> = std::fs::read_dir(scenes_dir)
            .with_context(|| format!("Failed to read scenes dir {:?}", scenes_dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        scenes.sort();

        let mut failed = 0;
        for scene in &scenes {
            let Some(name) = scene.file_name() else {
                continue;
            };
            info!("Processing {:?}", name);
            let result = match pipeline.for_scene(&name.to_string_lossy()) {
                Ok(scene_pipeline) => {
                    runner
                        .process_scene(&scene_pipeline, scene, &results_dir.join(name))
                        .await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                error!("Scene {:?} failed: {:#}", name, e);
                failed += 1;
            }
        }

        if failed > 0 {
            anyhow::bail!("{} of {} scenes failed", failed, scenes.len());
        }
    } else if let Some(scene) = &args.input.single_scene {
        let results_dir = args.results_dir.clone().unwrap_or_else(|| scene.clone());
        runner.process_scene(&pipeline, scene, &results_dir).await?;
    }

    Ok(())
}
