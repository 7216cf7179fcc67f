//! Genre and tag canonicalization.

use std::collections::HashSet;

/// Words kept lowercase when title-casing, unless first
const SMALL_WORDS: &[&str] = &["a", "an", "and", "as", "at", "by", "for", "in", "of", "on", "or", "the", "to"];

/// Common spellings folded into one display form
const ALIASES: &[(&str, &str)] = &[
    ("sci-fi", "Science Fiction"),
    ("scifi", "Science Fiction"),
    ("sf", "Science Fiction"),
    ("ya", "Young Adult"),
    ("litrpg", "LitRPG"),
    ("non-fiction", "Nonfiction"),
    ("non fiction", "Nonfiction"),
    ("bio", "Biography"),
];

/// Lookup key: lowercase, trimmed, inner whitespace collapsed
pub fn canonical_key(tag: &str) -> String {
    tag.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Trim, dedupe case-insensitively, and give each tag a display casing.
///
/// The first spelling seen wins unless it is all lowercase, in which case
/// it is title-cased. Known aliases map to one canonical spelling.
pub fn normalize<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for tag in tags {
        let key = canonical_key(tag.as_ref());
        if key.is_empty() {
            continue;
        }

        let display = match ALIASES.iter().find(|(alias, _)| *alias == key) {
            Some((_, canonical)) => canonical.to_string(),
            None => display_casing(tag.as_ref()),
        };

        if seen.insert(canonical_key(&display)) {
            out.push(display);
        }
    }

    out
}

fn display_casing(tag: &str) -> String {
    let collapsed = tag.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().any(|c| c.is_uppercase()) {
        return collapsed;
    }
    collapsed
        .split(' ')
        .enumerate()
        .map(|(i, word)| {
            if i > 0 && SMALL_WORDS.contains(&word) {
                word.to_string()
            } else {
                capitalize(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
