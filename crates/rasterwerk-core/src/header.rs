// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster page header — one record per output page, in the field order of
// `cups_page_header2_t`. The wire encoding lives in `rasterwerk-raster`.

use crate::error::{RasterError, Result};
use crate::types::{ColorOrder, ColorSpace, Orientation};

/// Index of `TotalPageCount` in [`PageHeader::integers`] (PWG Raster).
pub const PWG_TOTAL_PAGE_COUNT: usize = 0;
/// Index of `CrossFeedTransform`.
pub const PWG_CROSS_FEED_TRANSFORM: usize = 1;
/// Index of `FeedTransform`.
pub const PWG_FEED_TRANSFORM: usize = 2;
/// Index of `ImageBoxLeft`.
pub const PWG_IMAGE_BOX_LEFT: usize = 3;
/// Index of `ImageBoxTop`.
pub const PWG_IMAGE_BOX_TOP: usize = 4;
/// Index of `ImageBoxRight`.
pub const PWG_IMAGE_BOX_RIGHT: usize = 5;
/// Index of `ImageBoxBottom`.
pub const PWG_IMAGE_BOX_BOTTOM: usize = 6;
/// Index of `PrintQuality`.
pub const PWG_PRINT_QUALITY: usize = 8;

/// Points per inch; page sizes and margins are kept in points.
pub const POINTS_PER_INCH: f64 = 72.0;

/// A raster page header.
#[derive(Debug, Clone, PartialEq)]
pub struct PageHeader {
    pub media_class: String,
    pub media_color: String,
    pub media_type: String,
    pub output_type: String,
    pub advance_distance: u32,
    pub advance_media: u32,
    pub collate: bool,
    pub cut_media: u32,
    pub duplex: bool,
    /// Horizontal and vertical resolution in dpi.
    pub hw_resolution: [u32; 2],
    /// Left, bottom, right, top of the imageable area in points.
    pub imaging_bbox: [u32; 4],
    pub insert_sheet: bool,
    pub jog: u32,
    pub leading_edge: u32,
    /// Left and bottom margins in points.
    pub margins: [u32; 2],
    pub manual_feed: bool,
    pub media_position: u32,
    pub media_weight: u32,
    pub mirror_print: bool,
    pub negative_print: bool,
    pub num_copies: u32,
    pub orientation: Orientation,
    pub output_face_up: bool,
    /// Width and length of the sheet in points.
    pub page_size: [u32; 2],
    pub separations: bool,
    pub tray_switch: bool,
    pub tumble: bool,
    /// Bitmap width in pixels.
    pub width: u32,
    /// Bitmap height in pixels.
    pub height: u32,
    pub cups_media_type: u32,
    pub bits_per_color: u32,
    pub bits_per_pixel: u32,
    pub bytes_per_line: u32,
    pub color_order: ColorOrder,
    pub color_space: ColorSpace,
    pub compression: u32,
    pub row_count: u32,
    pub row_feed: u32,
    pub row_step: u32,
    pub num_colors: u32,
    pub borderless_scaling_factor: f32,
    pub page_size_f: [f32; 2],
    pub imaging_bbox_f: [f32; 4],
    pub integers: [u32; 16],
    pub reals: [f32; 16],
    pub strings: [String; 16],
    pub marker_type: String,
    pub rendering_intent: String,
    pub page_size_name: String,
}

impl Default for PageHeader {
    fn default() -> Self {
        Self {
            media_class: String::new(),
            media_color: String::new(),
            media_type: String::new(),
            output_type: String::new(),
            advance_distance: 0,
            advance_media: 0,
            collate: false,
            cut_media: 0,
            duplex: false,
            hw_resolution: [300, 300],
            imaging_bbox: [0; 4],
            insert_sheet: false,
            jog: 0,
            leading_edge: 0,
            margins: [0; 2],
            manual_feed: false,
            media_position: 0,
            media_weight: 0,
            mirror_print: false,
            negative_print: false,
            num_copies: 1,
            orientation: Orientation::Portrait,
            output_face_up: false,
            page_size: [612, 792],
            separations: false,
            tray_switch: false,
            tumble: false,
            width: 0,
            height: 0,
            cups_media_type: 0,
            bits_per_color: 8,
            bits_per_pixel: 24,
            bytes_per_line: 0,
            color_order: ColorOrder::Chunked,
            color_space: ColorSpace::Srgb,
            compression: 0,
            row_count: 0,
            row_feed: 0,
            row_step: 0,
            num_colors: 3,
            borderless_scaling_factor: 0.0,
            page_size_f: [612.0, 792.0],
            imaging_bbox_f: [0.0; 4],
            integers: [0; 16],
            reals: [0.0; 16],
            strings: Default::default(),
            marker_type: String::new(),
            rendering_intent: String::new(),
            page_size_name: String::new(),
        }
    }
}

impl PageHeader {
    /// Check that the colour space / depth / order combination can be
    /// produced at all. Done once at job setup, never per scanline.
    pub fn validate_format(&self) -> Result<()> {
        let bits = self.bits_per_color;
        let cs = self.color_space;
        if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
            return Err(RasterError::UnsupportedDepth {
                color_space: cs,
                bits_per_color: bits,
            });
        }
        let depth_ok = match cs {
            ColorSpace::CieLab | ColorSpace::CieXyz => bits >= 8,
            ColorSpace::KcmyLight => bits == 1,
            _ => true,
        };
        if !depth_ok {
            return Err(RasterError::UnsupportedDepth {
                color_space: cs,
                bits_per_color: bits,
            });
        }
        Ok(())
    }

    /// Recompute `num_colors`, `bits_per_pixel` and `bytes_per_line` from
    /// colour space, depth, order and width.
    pub fn update_derived(&mut self) {
        let bits = self.bits_per_color;
        self.num_colors = self.color_space.num_colors(bits);
        self.bits_per_pixel = match self.color_order {
            ColorOrder::Chunked => match (self.color_space, self.num_colors) {
                (ColorSpace::KcmyLight, _) if bits == 1 => 8,
                (_, 3) if bits < 8 => bits * 4,
                (_, n) => bits.saturating_mul(n),
            },
            ColorOrder::Banded | ColorOrder::Planar => bits,
        };
        let plane_bytes = (u64::from(self.bits_per_pixel) * u64::from(self.width)).div_ceil(8);
        let line_bytes = match self.color_order {
            ColorOrder::Banded => plane_bytes * u64::from(self.num_colors),
            _ => plane_bytes,
        };
        // Saturates for headers read off the wire with absurd sizes.
        self.bytes_per_line = u32::try_from(line_bytes).unwrap_or(u32::MAX);
    }

    /// Bytes of one line of one plane (equal to `bytes_per_line` unless banded).
    pub fn plane_bytes(&self) -> usize {
        match self.color_order {
            ColorOrder::Banded => (self.bytes_per_line / self.num_colors.max(1)) as usize,
            _ => self.bytes_per_line as usize,
        }
    }

    /// Number of passes over the page the writer expects.
    pub fn num_planes(&self) -> u32 {
        match self.color_order {
            ColorOrder::Planar => self.num_colors,
            _ => 1,
        }
    }

    /// Number of bands inside one line.
    pub fn num_bands(&self) -> u32 {
        match self.color_order {
            ColorOrder::Banded => self.num_colors,
            _ => 1,
        }
    }

    /// Total number of raster bytes the page carries after its header.
    pub fn page_bytes(&self) -> u64 {
        self.bytes_per_line as u64 * self.height as u64 * self.num_planes() as u64
    }

    /// Byte value of a blank (unprinted) sample for this colour space.
    pub fn blank_byte(&self) -> u8 {
        match self.color_space {
            ColorSpace::W
            | ColorSpace::Sw
            | ColorSpace::White
            | ColorSpace::Rgb
            | ColorSpace::Srgb
            | ColorSpace::AdobeRgb
            | ColorSpace::Rgba
            | ColorSpace::Rgbw => 0xff,
            _ => 0x00,
        }
    }

    /// Mirror the float copies of page size / imaging box from the integer
    /// point values.
    pub fn sync_float_fields(&mut self) {
        self.page_size_f = [self.page_size[0] as f32, self.page_size[1] as f32];
        self.imaging_bbox_f = [
            self.imaging_bbox[0] as f32,
            self.imaging_bbox[1] as f32,
            self.imaging_bbox[2] as f32,
            self.imaging_bbox[3] as f32,
        ];
    }
}
