//! In-process backends: mp4ameta for the MP4 family, lofty for the rest.

use lofty::config::ParseOptions;
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::mp4::{Mp4Codec, Mp4File};
use lofty::probe::Probe;
use lofty::tag::ItemKey;
use serde_json::json;
use std::path::Path;

use super::FileProbe;
use crate::error::{Error, Result};
use crate::metadata::SourceKind;

pub const MP4AMETA: &str = "mp4ameta";
pub const LOFTY: &str = "lofty";

/// Read an m4b/m4a/mp4 container's audio info and embedded atoms
pub fn read_mp4(path: &Path) -> Result<FileProbe> {
    let mut tag = mp4ameta::Tag::read_from_path(path).map_err(|e| {
        Error::extraction(
            SourceKind::Embedded,
            format!("failed to read {}: {}", path.display(), e),
        )
    })?;

    let asin = tag
        .take_strings_of(&mp4ameta::FreeformIdent::new("com.apple.iTunes", "ASIN"))
        .next();
    let artwork = tag.artwork().map(|art| {
        let fmt = match art.fmt {
            mp4ameta::ImgFmt::Jpeg => "jpeg",
            mp4ameta::ImgFmt::Png => "png",
            mp4ameta::ImgFmt::Bmp => "bmp",
        };
        (fmt, art.data.len())
    });

    let duration_ms = tag.duration().map(|d| d.as_millis() as u64);
    let avg_bitrate = tag.avg_bitrate().map(u64::from);
    let sample_rate = tag.sample_rate().map(|r| r.hz());
    let channels = tag.channel_config().map(|c| c.channel_count());
    // mp4ameta doesn't expose the sample entry, so the codec comes from lofty
    let stream = mp4_stream(path);
    let codec = stream.and_then(|(codec, _)| codec);
    let bit_depth = stream.and_then(|(_, depth)| depth);

    Ok(FileProbe {
        path: path.to_path_buf(),
        backend: MP4AMETA,
        codec: codec.map(String::from),
        duration_ms,
        stream_bitrate_bps: avg_bitrate,
        container_bitrate_bps: None,
        sample_rate,
        channels,
        bit_depth,
        size_bytes: file_size(path),
        chapters: Vec::new(),
        has_cover: artwork.is_some(),
        cover_width: None,
        cover_height: None,
        asin: asin.clone(),
        raw: json!({
            "duration_ms": duration_ms,
            "avg_bitrate": avg_bitrate,
            "sample_rate": sample_rate,
            "channels": channels,
            "codec": codec,
            "bit_depth": bit_depth,
            "artwork": artwork.map(|(fmt, len)| json!({"format": fmt, "bytes": len})),
            "asin": asin,
        }),
    })
}

/// Read any format lofty understands
pub fn read_generic(path: &Path) -> Result<FileProbe> {
    let tagged_file = Probe::open(path)
        .and_then(|p| p.read())
        .map_err(|e| {
            Error::extraction(
                SourceKind::Embedded,
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;

    let properties = tagged_file.properties();
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());

    let asin = tag.and_then(|t| {
        t.items().find_map(|item| match item.key() {
            ItemKey::Unknown(key) if key.eq_ignore_ascii_case("asin") => {
                item.value().text().map(|s| s.trim().to_string())
            }
            _ => None,
        })
    });
    let pictures = tag.map(|t| t.pictures().len()).unwrap_or(0);

    let codec = match tagged_file.file_type() {
        FileType::Mp4 => mp4_stream(path).and_then(|(codec, _)| codec),
        other => codec_for(other),
    };
    let duration_ms = properties.duration().as_millis() as u64;
    let audio_bitrate = properties.audio_bitrate().map(|k| u64::from(k) * 1000);
    let overall_bitrate = properties.overall_bitrate().map(|k| u64::from(k) * 1000);

    Ok(FileProbe {
        path: path.to_path_buf(),
        backend: LOFTY,
        codec: codec.map(String::from),
        duration_ms: (duration_ms > 0).then_some(duration_ms),
        stream_bitrate_bps: audio_bitrate,
        container_bitrate_bps: overall_bitrate,
        sample_rate: properties.sample_rate(),
        channels: properties.channels(),
        bit_depth: properties.bit_depth(),
        size_bytes: file_size(path),
        chapters: Vec::new(),
        has_cover: pictures > 0,
        cover_width: None,
        cover_height: None,
        asin: asin.clone(),
        raw: json!({
            "file_type": format!("{:?}", tagged_file.file_type()),
            "duration_ms": duration_ms,
            "audio_bitrate_kbps": properties.audio_bitrate(),
            "overall_bitrate_kbps": properties.overall_bitrate(),
            "sample_rate": properties.sample_rate(),
            "channels": properties.channels(),
            "bit_depth": properties.bit_depth(),
            "pictures": pictures,
            "asin": asin,
        }),
    })
}

fn codec_for(file_type: FileType) -> Option<&'static str> {
    match file_type {
        FileType::Mpeg => Some("mp3"),
        FileType::Flac => Some("flac"),
        FileType::Opus => Some("opus"),
        FileType::Vorbis => Some("vorbis"),
        FileType::Aac => Some("aac"),
        FileType::Wav => Some("pcm_s16le"),
        _ => None,
    }
}

/// Codec and bit depth from an MP4 sample description
fn mp4_stream(path: &Path) -> Option<(Option<&'static str>, Option<u8>)> {
    let mut file = std::fs::File::open(path).ok()?;
    let mp4 = Mp4File::read_from(&mut file, ParseOptions::new().read_tags(false)).ok()?;
    let properties = mp4.properties();
    Some((mp4_codec_name(properties.codec()), properties.bit_depth()))
}

fn mp4_codec_name(codec: &Mp4Codec) -> Option<&'static str> {
    match codec {
        Mp4Codec::AAC => Some("aac"),
        Mp4Codec::ALAC => Some("alac"),
        Mp4Codec::MP3 => Some("mp3"),
        Mp4Codec::FLAC => Some("flac"),
        _ => None,
    }
}

pub fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}
