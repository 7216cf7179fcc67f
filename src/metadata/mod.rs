pub mod fields;
mod partial;
mod record;

pub use partial::{is_meaningful, PartialRecord, SourceKind, BACKEND_TAG, SOURCE_TAG};
pub use record::{
    parse_date, AudioProfile, AudiobookRecord, BitrateMode, Chapter, Contributor,
    CoverImage, FileRef, Provenance,
};
