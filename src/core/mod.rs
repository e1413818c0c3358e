pub mod archive;

pub use archive::{ArchiveManifest, WordsArchive};
