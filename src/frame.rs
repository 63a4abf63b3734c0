//! Frame filename parsing and grouping-key derivation.
//!
//! The parser is the pluggable seam between raw arrival paths and the
//! display layer: swap in another [`FrameParser`] to support a different
//! filename convention without touching the worker or the executor.

use std::path::Path;

use serde::Serialize;

use crate::errors::FlowError;
use crate::types::{FrameId, GroupingKey};

/// Metadata parsed from one arrival filename.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FrameInfo {
    /// Canonical frame identifier (the filename stem).
    pub frame_id: FrameId,
    /// Three-letter instrument code, e.g. `IRC`.
    pub instrument: String,
    /// Frame-type letter, e.g. `A`.
    pub frame_type: char,
    /// Eight-digit frame number.
    pub number: u32,
}

/// Parses arrival paths into [`FrameInfo`] and derives display groupings.
pub trait FrameParser: Send + Sync {
    /// Parse domain metadata from `path`.
    fn parse(&self, path: &Path) -> Result<FrameInfo, FlowError>;

    /// Derive the display grouping key for a parsed frame.
    fn grouping_key(&self, frame: &FrameInfo) -> GroupingKey;
}

/// Default parser for the observatory filename convention:
/// three uppercase letters (instrument), one uppercase letter (frame type),
/// eight digits, with an optional `.fits`, `.fits.fz`, or `.fits.gz` suffix.
pub struct ObsFrameParser {
    multi_detector: Vec<String>,
}

impl ObsFrameParser {
    /// Create a parser; `multi_detector` lists instrument codes whose
    /// groupings are split per detector digit.
    pub fn new(multi_detector: Vec<String>) -> Self {
        Self { multi_detector }
    }
}

const FRAME_SUFFIXES: [&str; 3] = [".fits.fz", ".fits.gz", ".fits"];

fn frame_stem(file_name: &str) -> &str {
    for suffix in FRAME_SUFFIXES {
        if let Some(stem) = file_name.strip_suffix(suffix) {
            return stem;
        }
    }
    file_name
}

impl FrameParser for ObsFrameParser {
    fn parse(&self, path: &Path) -> Result<FrameInfo, FlowError> {
        let parse_err = |reason: &str| FlowError::Parse {
            item: path.display().to_string(),
            reason: reason.to_string(),
        };

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| parse_err("path has no usable file name"))?;
        let stem = frame_stem(file_name);

        if stem.len() != 12 || !stem.is_ascii() {
            return Err(parse_err("frame id must be 4 letters and 8 digits"));
        }
        let (code, digits) = stem.split_at(4);
        if !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(parse_err("instrument code must be uppercase letters"));
        }
        // str::parse would also accept a leading '+'.
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(parse_err("frame number must be 8 digits"));
        }
        let number: u32 = digits
            .parse()
            .map_err(|_| parse_err("frame number must be 8 digits"))?;

        let mut code_chars = code.chars();
        let instrument: String = code_chars.by_ref().take(3).collect();
        let frame_type = code_chars.next().unwrap_or('A');

        Ok(FrameInfo {
            frame_id: stem.to_string(),
            instrument,
            frame_type,
            number,
        })
    }

    fn grouping_key(&self, frame: &FrameInfo) -> GroupingKey {
        let base = format!("{}{}", frame.instrument, frame.frame_type);
        if self.multi_detector.iter().any(|ins| ins == &frame.instrument) {
            // Detector id lives in the last digit of the frame number.
            format!("{base}_{}", frame.number % 10)
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parser() -> ObsFrameParser {
        ObsFrameParser::new(vec!["MCS".to_string()])
    }

    #[test]
    fn parses_plain_and_compressed_names() {
        for name in [
            "IRCA00012345.fits",
            "IRCA00012345.fits.fz",
            "IRCA00012345.fits.gz",
            "IRCA00012345",
        ] {
            let info = parser().parse(&PathBuf::from(format!("/d/{name}"))).unwrap();
            assert_eq!(info.frame_id, "IRCA00012345");
            assert_eq!(info.instrument, "IRC");
            assert_eq!(info.frame_type, 'A');
            assert_eq!(info.number, 12345);
        }
    }

    #[test]
    fn rejects_malformed_names() {
        for name in [
            "notes.txt",
            "IRCA0001234.fits",   // seven digits
            "IRCA000123456.fits", // nine digits
            "irca00012345.fits",  // lowercase code
            "IRCAxxxxxxxx.fits",  // non-numeric
            "IRCA+1234567.fits",  // sign is not a digit
            "",
        ] {
            assert!(
                parser().parse(&PathBuf::from(format!("/d/{name}"))).is_err(),
                "expected parse failure for {name:?}"
            );
        }
    }

    #[test]
    fn grouping_splits_only_multi_detector_instruments() {
        let p = parser();
        let ircs = p.parse(&PathBuf::from("/d/IRCA00012345.fits")).unwrap();
        assert_eq!(p.grouping_key(&ircs), "IRCA");

        let mcs1 = p.parse(&PathBuf::from("/d/MCSA00012341.fits")).unwrap();
        let mcs2 = p.parse(&PathBuf::from("/d/MCSA00012342.fits")).unwrap();
        assert_eq!(p.grouping_key(&mcs1), "MCSA_1");
        assert_eq!(p.grouping_key(&mcs2), "MCSA_2");
    }
}
