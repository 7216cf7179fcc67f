//! Post-merge cleanup: HTML stripping, quality detection, tag and language
//! canonicalization.

pub mod format;
pub mod html;
pub mod language;
pub mod tags;

pub use format::{AudioFormat, Encoding, QualityInfo};

/// Zero-pad integral series positions to two digits (`1` -> `01`);
/// fractional positions (`1.5`) are kept as written.
pub fn pad_volume(volume: &str) -> String {
    let volume = volume.trim();
    if let Ok(n) = volume.parse::<u32>() {
        return format!("{:02}", n);
    }
    match volume.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => {
            format!("{:02}", f as u32)
        }
        _ => volume.to_string(),
    }
}
