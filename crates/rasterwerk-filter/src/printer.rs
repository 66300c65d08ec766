// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer description — the subset of a PPD the filters need, kept as
// JSON: page sizes with margins, duplex conventions, colour calibration
// and the ICC profile table.

use std::path::{Path, PathBuf};

use rasterwerk_core::{ColorSpace, RasterError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::collab::{ColorManager, MatchedPageSize, PpdResolver};
use crate::geometry::BacksideConvention;

/// Sheets within this many points of a declared size match it.
const SIZE_TOLERANCE: f64 = 5.0;

/// One page size of the printer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSize {
    pub name: String,
    /// Width in points.
    pub width: f64,
    /// Length in points.
    pub length: f64,
    /// Left, bottom, right, top margins in points.
    #[serde(default)]
    pub margins: [f64; 4],
    /// Borderless size.
    #[serde(default)]
    pub full_bleed: bool,
}

/// One `cupsICCProfile` entry. Empty qualifiers match anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IccProfileEntry {
    #[serde(default)]
    pub color_space: Option<ColorSpace>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub resolution: Option<[u32; 2]>,
    pub path: PathBuf,
}

impl IccProfileEntry {
    fn matches(&self, color_space: ColorSpace, media_type: &str, resolution: [u32; 2]) -> bool {
        self.color_space.is_none_or(|cs| cs == color_space)
            && self
                .media_type
                .as_deref()
                .is_none_or(|m| m.eq_ignore_ascii_case(media_type))
            && self.resolution.is_none_or(|r| r == resolution)
    }

    /// Number of qualifiers set, for picking the most specific entry.
    fn specificity(&self) -> usize {
        self.color_space.is_some() as usize
            + self.media_type.is_some() as usize
            + self.resolution.is_some() as usize
    }
}

/// Parsed printer description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterDescription {
    /// Model name, for logging.
    pub name: String,
    pub page_sizes: Vec<PaperSize>,
    /// `cupsBackSide`.
    pub backside: BacksideConvention,
    /// `APDuplexRequiresFlippedMargin`.
    pub flipped_margin: Option<bool>,
    /// PageRegion has to be set instead of PageSize.
    pub requires_page_region: bool,
    /// Colour calibration mode: print device values untouched.
    pub color_calibration: bool,
    /// Colour management switched off for this queue.
    pub cm_disabled: bool,
    pub icc_profiles: Vec<IccProfileEntry>,
}

impl PrinterDescription {
    /// Load a description from a JSON file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let description = Self::from_json(&text)?;
        info!(
            name = %description.name,
            page_sizes = description.page_sizes.len(),
            profiles = description.icc_profiles.len(),
            "printer description loaded"
        );
        Ok(description)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let description: Self = serde_json::from_str(text)?;
        for size in &description.page_sizes {
            if !(size.width > 0.0 && size.length > 0.0) {
                return Err(RasterError::Config(format!(
                    "page size {} has no extent",
                    size.name
                )));
            }
        }
        Ok(description)
    }

    fn to_match(size: &PaperSize) -> MatchedPageSize {
        MatchedPageSize {
            name: size.name.clone(),
            width: size.width,
            length: size.length,
            margins: size.margins,
            full_bleed: size.full_bleed,
        }
    }
}

impl PpdResolver for PrinterDescription {
    fn matched_page_size(&self, name: Option<&str>, size: [f64; 2]) -> Option<MatchedPageSize> {
        if let Some(name) = name {
            if let Some(found) = self
                .page_sizes
                .iter()
                .find(|s| s.name.eq_ignore_ascii_case(name))
            {
                return Some(Self::to_match(found));
            }
        }
        // Borderless variants only match when asked for by name.
        let found = self.page_sizes.iter().find(|s| {
            !s.full_bleed
                && (s.width - size[0]).abs() <= SIZE_TOLERANCE
                && (s.length - size[1]).abs() <= SIZE_TOLERANCE
        });
        if found.is_none() {
            debug!(width = size[0], length = size[1], "no page size matches");
        }
        found.map(Self::to_match)
    }

    fn color_calibration(&self) -> bool {
        self.color_calibration
    }

    fn backside_convention(&self) -> BacksideConvention {
        self.backside
    }

    fn flipped_margin(&self) -> Option<bool> {
        self.flipped_margin
    }

    fn requires_page_region(&self) -> bool {
        self.requires_page_region
    }
}

impl ColorManager for PrinterDescription {
    fn is_cm_disabled(&self) -> bool {
        self.cm_disabled
    }

    fn icc_profile_path(
        &self,
        color_space: ColorSpace,
        media_type: &str,
        resolution: [u32; 2],
    ) -> Option<PathBuf> {
        self.icc_profiles
            .iter()
            .filter(|p| p.matches(color_space, media_type, resolution))
            .max_by_key(|p| p.specificity())
            .map(|p| p.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "Office Laser",
        "backside": "manual-tumble",
        "flipped_margin": true,
        "page_sizes": [
            { "name": "A4", "width": 595, "length": 842, "margins": [12, 12, 12, 12] },
            { "name": "A4.Borderless", "width": 595, "length": 842, "full_bleed": true }
        ],
        "icc_profiles": [
            { "path": "/profiles/generic.icc" },
            { "color_space": "cmyk", "media_type": "glossy", "path": "/profiles/glossy.icc" },
            { "color_space": "cmyk", "path": "/profiles/cmyk.icc" }
        ]
    }"#;

    #[test]
    fn parses_with_defaults() {
        let p = PrinterDescription::from_json(SAMPLE).unwrap();
        assert_eq!(p.backside_convention(), BacksideConvention::ManualTumble);
        assert_eq!(p.flipped_margin(), Some(true));
        assert!(!p.requires_page_region());
        assert!(!p.is_cm_disabled());
        assert_eq!(p.page_sizes[1].margins, [0.0; 4]);
    }

    #[test]
    fn page_sizes_match_by_name_then_extent() {
        let p = PrinterDescription::from_json(SAMPLE).unwrap();
        let by_name = p.matched_page_size(Some("a4.borderless"), [1.0, 1.0]).unwrap();
        assert!(by_name.full_bleed);
        let by_size = p.matched_page_size(None, [597.0, 840.0]).unwrap();
        assert_eq!(by_size.name, "A4");
        assert_eq!(by_size.margins, [12.0; 4]);
        assert!(p.matched_page_size(None, [612.0, 792.0]).is_none());
    }

    #[test]
    fn most_specific_profile_wins() {
        let p = PrinterDescription::from_json(SAMPLE).unwrap();
        let glossy = p.icc_profile_path(ColorSpace::Cmyk, "Glossy", [600, 600]);
        assert_eq!(glossy, Some(PathBuf::from("/profiles/glossy.icc")));
        let plain = p.icc_profile_path(ColorSpace::Cmyk, "plain", [600, 600]);
        assert_eq!(plain, Some(PathBuf::from("/profiles/cmyk.icc")));
        let rgb = p.icc_profile_path(ColorSpace::Srgb, "plain", [600, 600]);
        assert_eq!(rgb, Some(PathBuf::from("/profiles/generic.icc")));
    }

    #[test]
    fn empty_page_sizes_are_rejected() {
        let bad = r#"{ "page_sizes": [ { "name": "Zero", "width": 0, "length": 842 } ] }"#;
        assert!(matches!(
            PrinterDescription::from_json(bad),
            Err(RasterError::Config(_))
        ));
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("printer.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let p = PrinterDescription::load(&path).unwrap();
        assert_eq!(p.name, "Office Laser");
    }
}
