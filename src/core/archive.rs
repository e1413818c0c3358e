use std::{
    fs::{self, File},
    io::{Cursor, Read, Write},
    path::Path,
};

use anyhow::Context;
use image::{DynamicImage, ImageFormat};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use tar::{Archive, Builder, Header};
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

use crate::models::TextInstance;

const MANIFEST_FILE_NAME: &str = "manifest.json";
const WORDS_FILE_NAME: &str = "words.json";
const PANORAMA_FILE_NAME: &str = "panorama.png";

/// Highest archive layout this build can read
pub const ARCHIVE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub id: Uuid,
    /// RFC 3339 timestamp
    pub created_at: String,
    pub panorama_width: u32,
    pub panorama_height: u32,
    pub window_size: u32,
    pub word_count: usize,
    pub version: u32,
}

impl ArchiveManifest {
    pub fn created_at(&self) -> anyhow::Result<OffsetDateTime> {
        OffsetDateTime::parse(&self.created_at, &Rfc3339)
            .with_context(|| format!("Invalid creation time {:?}", self.created_at))
    }
}

/// Deduplicated words of one scene, persisted so analysis can be rerun
/// without detecting again.
#[derive(Debug, Clone)]
pub struct WordsArchive {
    pub manifest: ArchiveManifest,
    pub words: Vec<TextInstance>,
    pub panorama: Option<DynamicImage>,
}

impl WordsArchive {
    pub fn new(
        words: Vec<TextInstance>,
        panorama_size: (u32, u32),
        window_size: u32,
    ) -> anyhow::Result<Self> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let created_at = now.format(&Rfc3339).context("Failed to format creation time")?;

        Ok(Self {
            manifest: ArchiveManifest {
                id: Uuid::new_v4(),
                created_at,
                panorama_width: panorama_size.0,
                panorama_height: panorama_size.1,
                window_size,
                word_count: words.len(),
                version: ARCHIVE_VERSION,
            },
            words,
            panorama: None,
        })
    }

    pub fn with_panorama(mut self, panorama: DynamicImage) -> Self {
        self.panorama = Some(panorama);
        self
    }

    /// Write the archive as tar.zst, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manifest = serde_json::to_vec_pretty(&self.manifest)
            .context("Failed to serialize archive manifest")?;
        let words = serde_json::to_vec(&self.words).context("Failed to serialize words")?;

        let out = File::create(path)
            .with_context(|| format!("Failed to create words archive {:?}", path))?;

        let encoder = ZstdEncoder::new(out, 3)
            .with_context(|| format!("Failed to create zstd encoder for {:?}", path))?;

        let mut tar = Builder::new(encoder);
        append_bytes(&mut tar, MANIFEST_FILE_NAME, &manifest)?;
        append_bytes(&mut tar, WORDS_FILE_NAME, &words)?;

        if let Some(panorama) = &self.panorama {
            let mut png = Vec::new();
            panorama
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .context("Failed to encode panorama")?;
            append_bytes(&mut tar, PANORAMA_FILE_NAME, &png)?;
        }

        // Finish tar, then finish zstd stream
        let encoder = tar
            .into_inner()
            .with_context(|| format!("Failed to finalize tar for {:?}", path))?;

        encoder
            .finish()
            .with_context(|| format!("Failed to finalize zstd stream for {:?}", path))?
            .flush()?;

        info!("Saved {} words to {:?}", self.words.len(), path);
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();

        let f = File::open(path)
            .with_context(|| format!("Failed to open words archive {:?}", path))?;

        let decoder = ZstdDecoder::new(f)
            .with_context(|| format!("Invalid zstd stream in {:?}", path))?;

        let mut archive = Archive::new(decoder);

        let mut manifest: Option<ArchiveManifest> = None;
        let mut words: Option<Vec<TextInstance>> = None;
        let mut panorama: Option<DynamicImage> = None;

        let entries = archive
            .entries()
            .with_context(|| format!("Failed to read entries of {:?}", path))?;

        for entry in entries {
            let mut entry = entry.with_context(|| format!("Corrupt entry in {:?}", path))?;
            let name = entry.path()?.to_string_lossy().into_owned();

            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .with_context(|| format!("Failed to read {} from {:?}", name, path))?;

            match name.as_str() {
                MANIFEST_FILE_NAME => {
                    manifest = Some(
                        serde_json::from_slice(&bytes)
                            .with_context(|| format!("Invalid manifest in {:?}", path))?,
                    );
                }
                WORDS_FILE_NAME => {
                    words = Some(
                        serde_json::from_slice(&bytes)
                            .with_context(|| format!("Invalid word list in {:?}", path))?,
                    );
                }
                PANORAMA_FILE_NAME => {
                    panorama = Some(
                        image::load_from_memory(&bytes)
                            .with_context(|| format!("Invalid panorama in {:?}", path))?,
                    );
                }
                other => debug!("Ignoring unknown archive entry {:?}", other),
            }
        }

        let manifest =
            manifest.with_context(|| format!("{:?} has no {}", path, MANIFEST_FILE_NAME))?;
        let words = words.with_context(|| format!("{:?} has no {}", path, WORDS_FILE_NAME))?;

        if manifest.version > ARCHIVE_VERSION {
            anyhow::bail!(
                "{:?} uses archive version {}, newest supported is {}",
                path,
                manifest.version,
                ARCHIVE_VERSION
            );
        }
        if manifest.word_count != words.len() {
            anyhow::bail!(
                "{:?} declares {} words but holds {}",
                path,
                manifest.word_count,
                words.len()
            );
        }

        Ok(Self {
            manifest,
            words,
            panorama,
        })
    }
}

fn append_bytes<W: Write>(tar: &mut Builder<W>, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    tar.append_data(&mut header, name, bytes)
        .with_context(|| format!("Failed to add {} to tar", name))?;
    Ok(())
}
