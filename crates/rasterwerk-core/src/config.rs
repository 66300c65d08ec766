// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job options.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::header::PageHeader;
use crate::types::{ColorMode, ColorOrder, ColorSpace, Orientation, RasterFormat, RenderingIntent};

/// Options of a single filter run, usually loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Output colour space.
    pub color_space: ColorSpace,
    /// Output colour order.
    pub color_order: ColorOrder,
    /// Output bits per colour (1, 2, 4, 8 or 16).
    pub bits_per_color: u32,
    /// Output resolution `[x, y]` in dpi.
    pub resolution: [u32; 2],
    /// Requested media size name (e.g. "A4", "Letter"). When absent the page
    /// size of the input is used.
    pub page_size: Option<String>,
    /// Two-sided printing.
    pub duplex: bool,
    /// Short-edge binding for two-sided printing.
    pub tumble: bool,
    pub rendering_intent: RenderingIntent,
    /// Media type keyword used to pick a colour profile.
    pub media_type: Option<String>,
    pub copies: u32,
    pub collate: bool,
    pub color_mode: ColorMode,
    /// PWG print quality (3 draft, 4 normal, 5 high, 0 unset).
    pub print_quality: u32,
    pub orientation: Orientation,
    /// Container written to the output stream.
    pub output_format: RasterFormat,
    /// Render into the whole sheet instead of the imageable area.
    pub full_bleed: bool,
    /// Explicit imageable area `[left, bottom, right, top]` in points, used
    /// when no printer description matches the page.
    pub imageable_area: Option<[u32; 4]>,
    /// ICC profile of the input colours. sRGB when unset.
    pub source_profile: Option<PathBuf>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            color_space: ColorSpace::Srgb,
            color_order: ColorOrder::Chunked,
            bits_per_color: 8,
            resolution: [300, 300],
            page_size: None,
            duplex: false,
            tumble: false,
            rendering_intent: RenderingIntent::Perceptual,
            media_type: None,
            copies: 1,
            collate: false,
            color_mode: ColorMode::Auto,
            print_quality: 0,
            orientation: Orientation::Portrait,
            output_format: RasterFormat::Cups,
            full_bleed: false,
            imageable_area: None,
            source_profile: None,
        }
    }
}

impl JobOptions {
    /// Parse options from a JSON document.
    pub fn from_json(text: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build the page header template the geometry resolver starts from.
    ///
    /// A monochrome colour mode forces an sGray-family space, keeping 1-bit
    /// jobs in `K` and everything else in `SW`.
    pub fn header_template(&self) -> PageHeader {
        let mut color_space = self.color_space;
        let mut bits = self.bits_per_color;
        match self.color_mode {
            ColorMode::Monochrome if !color_space.is_gray() => {
                color_space = if bits == 1 { ColorSpace::K } else { ColorSpace::Sw };
            }
            ColorMode::BiLevel => {
                if !color_space.is_gray() {
                    color_space = ColorSpace::K;
                }
                bits = 1;
            }
            _ => {}
        }

        let mut header = PageHeader {
            color_space,
            color_order: self.color_order,
            bits_per_color: bits,
            hw_resolution: self.resolution,
            duplex: self.duplex,
            tumble: self.tumble,
            collate: self.collate,
            num_copies: self.copies.max(1),
            orientation: self.orientation,
            rendering_intent: self.rendering_intent.header_value().to_string(),
            media_type: self.media_type.clone().unwrap_or_default(),
            page_size_name: self.page_size.clone().unwrap_or_default(),
            ..PageHeader::default()
        };
        header.integers[crate::header::PWG_PRINT_QUALITY] = self.print_quality;
        if let Some(area) = self.imageable_area {
            header.imaging_bbox = area;
        }
        header.update_derived();
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let opts = JobOptions::from_json(r#"{ "color_space": "cmyk", "duplex": true }"#).unwrap();
        assert_eq!(opts.color_space, ColorSpace::Cmyk);
        assert!(opts.duplex);
        assert_eq!(opts.bits_per_color, 8);
        assert_eq!(opts.resolution, [300, 300]);
    }

    #[test]
    fn monochrome_mode_forces_gray() {
        let opts = JobOptions {
            color_mode: ColorMode::Monochrome,
            ..JobOptions::default()
        };
        let h = opts.header_template();
        assert_eq!(h.color_space, ColorSpace::Sw);
        assert_eq!(h.num_colors, 1);
    }

    #[test]
    fn bi_level_forces_one_bit_black() {
        let opts = JobOptions {
            color_mode: ColorMode::BiLevel,
            ..JobOptions::default()
        };
        let h = opts.header_template();
        assert_eq!(h.color_space, ColorSpace::K);
        assert_eq!(h.bits_per_color, 1);
        assert_eq!(h.bits_per_pixel, 1);
    }
}
