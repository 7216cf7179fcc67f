//! Field names shared by every source, the merger, and the validator.

pub const TITLE: &str = "title";
pub const SUBTITLE: &str = "subtitle";
pub const ALBUM: &str = "album";
pub const AUTHORS: &str = "authors";
pub const NARRATORS: &str = "narrators";
pub const SERIES: &str = "series";
pub const VOLUME: &str = "volume";
pub const YEAR: &str = "year";
pub const RELEASE_DATE: &str = "release_date";
pub const ASIN: &str = "asin";
pub const ISBN: &str = "isbn";
pub const PUBLISHER: &str = "publisher";
pub const LANGUAGE: &str = "language";
pub const REGION: &str = "region";
pub const LITERATURE_TYPE: &str = "literature_type";
pub const IS_ADULT: &str = "is_adult";
pub const RATING: &str = "rating";
pub const DESCRIPTION: &str = "description";
pub const GENRES: &str = "genres";
pub const TAGS: &str = "tags";
pub const CHAPTERS: &str = "chapters";
pub const CHAPTER_COUNT: &str = "chapter_count";
/// Duration-based guess, only used when no chapter list or count survives
pub const CHAPTER_ESTIMATE: &str = "chapter_estimate";
pub const FILES: &str = "files";
pub const CODEC: &str = "codec";
pub const BITRATE_KBPS: &str = "bitrate_kbps";
pub const BITRATE_MODE: &str = "bitrate_mode";
pub const SAMPLE_RATE: &str = "sample_rate";
pub const CHANNELS: &str = "channels";
pub const BIT_DEPTH: &str = "bit_depth";
pub const DURATION_SEC: &str = "duration_sec";
pub const FILE_SIZE: &str = "file_size";
pub const LOSSLESS: &str = "lossless";
pub const COVER_URL: &str = "cover_url";
pub const HAS_COVER: &str = "has_cover";
pub const COVER_WIDTH: &str = "cover_width";
pub const COVER_HEIGHT: &str = "cover_height";

/// Every field with a short description, in display order
pub const ALL: &[(&str, &str)] = &[
    (TITLE, "Book title"),
    (SUBTITLE, "Subtitle"),
    (ALBUM, "Display album (defaults to title)"),
    (AUTHORS, "Author list"),
    (NARRATORS, "Narrator list"),
    (SERIES, "Series name"),
    (VOLUME, "Position in series (zero-padded)"),
    (YEAR, "Publication year"),
    (RELEASE_DATE, "Release date"),
    (ASIN, "Amazon ASIN"),
    (ISBN, "ISBN"),
    (PUBLISHER, "Publisher"),
    (LANGUAGE, "ISO-639-1 language code"),
    (REGION, "Store region"),
    (LITERATURE_TYPE, "Fiction / nonfiction"),
    (IS_ADULT, "Adult content flag"),
    (RATING, "Average rating (0-5)"),
    (DESCRIPTION, "Plain-text description"),
    (GENRES, "Genre list"),
    (TAGS, "Tag list"),
    (CHAPTERS, "Chapter list"),
    (CHAPTER_COUNT, "Number of chapters"),
    (CHAPTER_ESTIMATE, "Estimated chapter count"),
    (FILES, "Audio files"),
    (CODEC, "Audio codec"),
    (BITRATE_KBPS, "Bitrate in kbps"),
    (BITRATE_MODE, "CBR or VBR"),
    (SAMPLE_RATE, "Sample rate in Hz"),
    (CHANNELS, "Channel count"),
    (BIT_DEPTH, "Bits per sample"),
    (DURATION_SEC, "Duration in seconds"),
    (FILE_SIZE, "Total size in bytes"),
    (LOSSLESS, "Lossless codec flag"),
    (COVER_URL, "Cover image URL"),
    (HAS_COVER, "Embedded cover present"),
    (COVER_WIDTH, "Cover width in pixels"),
    (COVER_HEIGHT, "Cover height in pixels"),
];

pub fn is_known(name: &str) -> bool {
    ALL.iter().any(|(n, _)| *n == name)
}
