//! Audnexus response shapes

use serde::Deserialize;
use serde_json::Value;

/// `GET /books/{asin}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub asin: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    #[serde(default)]
    pub authors: Vec<Person>,
    #[serde(default)]
    pub narrators: Vec<Person>,
    pub series_primary: Option<Series>,
    pub publisher_name: Option<String>,
    pub release_date: Option<String>,
    pub runtime_length_min: Option<f64>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    /// HTML
    pub summary: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub region: Option<String>,
    pub format_type: Option<String>,
    pub literature_type: Option<String>,
    pub is_adult: Option<bool>,
    /// Sent as a string ("4.5") by some regions, a number by others
    pub rating: Option<Value>,
    pub image: Option<String>,
    pub isbn: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Person {
    pub asin: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Series {
    pub name: Option<String>,
    pub position: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Genre {
    pub name: Option<String>,
    /// "genre" or "tag"
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// `GET /books/{asin}/chapters`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterList {
    #[serde(default)]
    pub chapters: Vec<ChapterEntry>,
    pub is_accurate: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterEntry {
    pub title: Option<String>,
    pub start_offset_ms: Option<u64>,
    pub length_ms: Option<u64>,
}
