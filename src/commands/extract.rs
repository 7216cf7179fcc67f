use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use audiobook_meta::config::Config;
use audiobook_meta::tracker::format_runtime;
use audiobook_meta::AudiobookRecord;

pub fn run(config: &Config, path: &Path, json: bool, offline: bool, quiet: bool) -> Result<()> {
    let record = super::extract_record(config, path, offline)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_pretty(&record, path, quiet);
    }

    Ok(())
}

fn print_pretty(record: &AudiobookRecord, path: &Path, quiet: bool) {
    if !quiet {
        println!("{}", path.display().to_string().bold());
        println!("{}", "─".repeat(40));
    }

    print_field("Title", record.title.as_deref());
    print_field("Subtitle", record.subtitle.as_deref());
    print_field("Author", record.author_names().as_deref());
    print_field("Narrator", record.narrator_names().as_deref());

    let series = match (&record.series, &record.volume) {
        (Some(s), Some(v)) => Some(format!("{} #{}", s, v)),
        (Some(s), None) => Some(s.clone()),
        (None, Some(v)) => Some(format!("#{}", v)),
        (None, None) => None,
    };
    print_field("Series", series.as_deref());

    if let Some(year) = record.year {
        print_field("Year", Some(&year.to_string()));
    }
    print_field("Publisher", record.publisher.as_deref());
    print_field("Language", record.language.as_deref());
    print_field("ASIN", record.asin.as_deref());

    if !record.genres.is_empty() {
        print_field("Genres", Some(&record.genres.join(", ")));
    }
    if !record.tags.is_empty() {
        print_field("Tags", Some(&record.tags.join(", ")));
    }

    let audio = &record.audio;
    if let Some(duration) = audio.duration_sec {
        print_field("Duration", Some(&format_runtime(duration)));
    }
    if let Some(chapters) = record.chapter_count {
        print_field("Chapters", Some(&chapters.to_string()));
    }
    if let Some(quality) = &audio.quality {
        print_field(
            "Format",
            Some(&format!("{} {}", quality.format.label(), quality.encoding)),
        );
        print_field("Quality", Some(&format!("{:.2}", quality.score)));
    }
    if let Some(rate) = audio.sample_rate {
        print_field("Sample rate", Some(&format!("{} Hz", rate)));
    }
    if !record.files.is_empty() {
        print_field("Files", Some(&record.files.len().to_string()));
    }
    if let Some(cover) = &record.cover {
        let info = match (&cover.url, cover.width, cover.height) {
            (Some(url), _, _) => url.clone(),
            (None, Some(w), Some(h)) => format!("embedded, {}x{}", w, h),
            (None, _, _) => "embedded".to_string(),
        };
        print_field("Cover", Some(&info));
    }

    if let Some(desc) = &record.description {
        println!();
        println!("{}", "Description:".cyan());
        for line in textwrap_simple(desc, 80) {
            println!("  {}", line);
        }
    }

    if !quiet && !record.field_sources.is_empty() {
        println!();
        println!("{}", "Sources:".cyan());
        for (field, source) in &record.field_sources {
            println!("  {:<16} {}", field, source.as_str().dimmed());
        }
    }

    for warning in &record.warnings {
        println!("{} {}", "warning:".yellow(), warning);
    }
}

fn print_field(label: &str, value: Option<&str>) {
    if let Some(v) = value {
        println!("{:>12}: {}", label.cyan(), v);
    }
}

/// Greedy word wrap, paragraph breaks preserved
fn textwrap_simple(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current = word.to_string();
            } else if current.len() + 1 + word.len() <= width {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        lines.push(current);
    }
    lines
}
