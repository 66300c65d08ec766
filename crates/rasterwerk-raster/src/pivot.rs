// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pivot formats — the handful of pixel layouts the resampler and the line
// converters work on, and conversion of input raster lines into them.

use rasterwerk_core::{ColorOrder, ColorSpace, PageHeader, RasterError, Result};

use crate::bits::{one_bit_line, one_bit_to_gray_line};
use crate::cspace::{cmyk_to_rgb, rgb_to_gray};

/// Working pixel layout between input and device conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotFormat {
    /// 1 bit per pixel, MSB-first, 1 = white.
    Mono1,
    /// 8-bit gray, 0 = black.
    Gray8,
    /// 8-bit RGB.
    Rgb8,
}

impl PivotFormat {
    /// Bytes of a `width` pixel line.
    pub fn line_bytes(self, width: u32) -> usize {
        match self {
            Self::Mono1 => (width as usize).div_ceil(8),
            Self::Gray8 => width as usize,
            Self::Rgb8 => width as usize * 3,
        }
    }

    /// Bytes per pixel (0 for the bit-packed layout).
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Mono1 => 0,
            Self::Gray8 => 1,
            Self::Rgb8 => 3,
        }
    }

    /// Value of a white line byte.
    pub fn white(self) -> u8 {
        0xff
    }
}

/// Pixel layout of an input raster page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    Mono1 { black_is_one: bool },
    Gray8 { black_is_zero: bool },
    Gray16 { black_is_zero: bool },
    Rgb8,
    Rgb16,
    Cmyk8,
    Cmyk16,
}

impl InputLayout {
    /// Work out the layout from an input page header. Only chunked
    /// gray, RGB and CMYK pages are accepted.
    pub fn from_header(header: &PageHeader) -> Result<Self> {
        let cs = header.color_space;
        let bits = header.bits_per_color;
        if header.color_order != ColorOrder::Chunked && header.num_colors > 1 {
            return Err(RasterError::Config(format!(
                "input colour order {:?} is not supported",
                header.color_order
            )));
        }
        let unsupported = || RasterError::UnsupportedDepth {
            color_space: cs,
            bits_per_color: bits,
        };
        if cs.is_gray() {
            let light = cs.is_light_gray();
            return match bits {
                1 => Ok(Self::Mono1 { black_is_one: !light }),
                8 => Ok(Self::Gray8 { black_is_zero: light }),
                16 => Ok(Self::Gray16 { black_is_zero: light }),
                _ => Err(unsupported()),
            };
        }
        match cs {
            ColorSpace::Rgb | ColorSpace::Srgb | ColorSpace::AdobeRgb => match bits {
                8 => Ok(Self::Rgb8),
                16 => Ok(Self::Rgb16),
                _ => Err(unsupported()),
            },
            ColorSpace::Cmyk => match bits {
                8 => Ok(Self::Cmyk8),
                16 => Ok(Self::Cmyk16),
                _ => Err(unsupported()),
            },
            other => Err(RasterError::UnsupportedColorSpace(other)),
        }
    }

    /// Bytes of a `width` pixel input line.
    pub fn line_bytes(self, width: u32) -> usize {
        let w = width as usize;
        match self {
            Self::Mono1 { .. } => w.div_ceil(8),
            Self::Gray8 { .. } => w,
            Self::Gray16 { .. } => 2 * w,
            Self::Rgb8 => 3 * w,
            Self::Rgb16 => 6 * w,
            Self::Cmyk8 => 4 * w,
            Self::Cmyk16 => 8 * w,
        }
    }

    pub fn is_one_bit(self) -> bool {
        matches!(self, Self::Mono1 { .. })
    }

    pub fn is_gray(self) -> bool {
        matches!(
            self,
            Self::Mono1 { .. } | Self::Gray8 { .. } | Self::Gray16 { .. }
        )
    }
}

/// Converts input raster lines into a pivot format, keeping its own scratch
/// line for two-step conversions.
pub struct InputConverter {
    layout: InputLayout,
    target: PivotFormat,
    width: u32,
    bi_level: bool,
    scratch: Vec<u8>,
}

impl InputConverter {
    pub fn new(layout: InputLayout, target: PivotFormat, width: u32, bi_level: bool) -> Result<Self> {
        if target == PivotFormat::Mono1 && !layout.is_gray() {
            return Err(RasterError::Config(
                "1-bit pivot needs a gray input".into(),
            ));
        }
        Ok(Self {
            layout,
            target,
            width,
            bi_level,
            scratch: vec![0; width as usize * 3],
        })
    }

    pub fn target(&self) -> PivotFormat {
        self.target
    }

    /// Convert one input line. `row` feeds the dither when thresholding.
    ///
    /// Fails with [`RasterError::Stream`] when either line is shorter than
    /// the converter's width needs.
    pub fn convert(&mut self, src: &[u8], dst: &mut [u8], row: u32) -> Result<()> {
        let w = self.width as usize;
        let need_src = self.layout.line_bytes(self.width);
        let need_dst = self.target.line_bytes(self.width);
        if src.len() < need_src || dst.len() < need_dst {
            return Err(RasterError::Stream(format!(
                "line {row} holds {} bytes, {:?} at width {} needs {need_src}",
                src.len(),
                self.layout,
                self.width
            )));
        }
        match (self.layout, self.target) {
            (InputLayout::Mono1 { black_is_one }, PivotFormat::Mono1) => {
                let size = w.div_ceil(8);
                dst[..size].copy_from_slice(&src[..size]);
                if black_is_one {
                    crate::bits::reverse_one_bit_line(&mut dst[..size], self.width);
                }
            }
            (InputLayout::Mono1 { black_is_one }, _) => {
                let gray = &mut self.scratch[..w];
                one_bit_to_gray_line(src, gray, self.width);
                if black_is_one {
                    crate::bits::invert_line(gray);
                }
                gray_to_target(gray, dst, self.target, self.width, row, self.bi_level);
            }
            (InputLayout::Gray8 { black_is_zero }, _) => {
                let gray = &mut self.scratch[..w];
                gray.copy_from_slice(&src[..w]);
                if !black_is_zero {
                    crate::bits::invert_line(gray);
                }
                gray_to_target(gray, dst, self.target, self.width, row, self.bi_level);
            }
            (InputLayout::Gray16 { black_is_zero }, _) => {
                let gray = &mut self.scratch[..w];
                for x in 0..w {
                    gray[x] = src[2 * x];
                }
                if !black_is_zero {
                    crate::bits::invert_line(gray);
                }
                gray_to_target(gray, dst, self.target, self.width, row, self.bi_level);
            }
            (InputLayout::Rgb8, PivotFormat::Rgb8) => dst[..3 * w].copy_from_slice(&src[..3 * w]),
            (InputLayout::Rgb8, _) => {
                for x in 0..w {
                    dst[x] = rgb_to_gray(&src[3 * x..3 * x + 3]);
                }
            }
            (InputLayout::Rgb16, target) => {
                let rgb = &mut self.scratch[..3 * w];
                for i in 0..3 * w {
                    rgb[i] = src[2 * i];
                }
                rgb_to_target(rgb, dst, target, w);
            }
            (InputLayout::Cmyk8, target) => {
                let rgb = &mut self.scratch[..3 * w];
                for x in 0..w {
                    cmyk_to_rgb(&src[4 * x..4 * x + 4], &mut rgb[3 * x..3 * x + 3]);
                }
                rgb_to_target(rgb, dst, target, w);
            }
            (InputLayout::Cmyk16, target) => {
                let rgb = &mut self.scratch[..3 * w];
                for x in 0..w {
                    let s = &src[8 * x..8 * x + 8];
                    let cmyk = [s[0], s[2], s[4], s[6]];
                    cmyk_to_rgb(&cmyk, &mut rgb[3 * x..3 * x + 3]);
                }
                rgb_to_target(rgb, dst, target, w);
            }
        }
        Ok(())
    }
}

fn gray_to_target(gray: &[u8], dst: &mut [u8], target: PivotFormat, width: u32, row: u32, bi_level: bool) {
    let w = width as usize;
    match target {
        PivotFormat::Mono1 => one_bit_line(gray, dst, width, row, bi_level),
        PivotFormat::Gray8 => dst[..w].copy_from_slice(&gray[..w]),
        PivotFormat::Rgb8 => {
            for x in 0..w {
                dst[3 * x..3 * x + 3].fill(gray[x]);
            }
        }
    }
}

fn rgb_to_target(rgb: &[u8], dst: &mut [u8], target: PivotFormat, w: usize) {
    match target {
        PivotFormat::Rgb8 => dst[..3 * w].copy_from_slice(&rgb[..3 * w]),
        _ => {
            for x in 0..w {
                dst[x] = rgb_to_gray(&rgb[3 * x..3 * x + 3]);
            }
        }
    }
}

/// Convert a resampled working line into the conversion pivot. Only the
/// gray to 1-bit step does any work; other pairs are copies.
pub fn finish_pivot_line(
    src: &[u8],
    from: PivotFormat,
    dst: &mut [u8],
    to: PivotFormat,
    width: u32,
    row: u32,
    bi_level: bool,
) {
    match (from, to) {
        (PivotFormat::Gray8, PivotFormat::Mono1) => one_bit_line(src, dst, width, row, bi_level),
        (PivotFormat::Mono1, PivotFormat::Gray8) => one_bit_to_gray_line(src, dst, width),
        (PivotFormat::Gray8, PivotFormat::Rgb8) => gray_to_target(src, dst, to, width, row, bi_level),
        (PivotFormat::Rgb8, PivotFormat::Gray8) => rgb_to_target(src, dst, to, width as usize),
        (f, _) => {
            let n = f.line_bytes(width);
            dst[..n].copy_from_slice(&src[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cs: ColorSpace, bits: u32) -> PageHeader {
        let mut h = PageHeader {
            color_space: cs,
            bits_per_color: bits,
            width: 4,
            ..PageHeader::default()
        };
        h.update_derived();
        h
    }

    #[test]
    fn layouts_from_headers() {
        assert_eq!(
            InputLayout::from_header(&header(ColorSpace::K, 1)).unwrap(),
            InputLayout::Mono1 { black_is_one: true }
        );
        assert_eq!(
            InputLayout::from_header(&header(ColorSpace::Sw, 8)).unwrap(),
            InputLayout::Gray8 { black_is_zero: true }
        );
        assert_eq!(
            InputLayout::from_header(&header(ColorSpace::Srgb, 8)).unwrap(),
            InputLayout::Rgb8
        );
        assert!(InputLayout::from_header(&header(ColorSpace::CieLab, 8)).is_err());
        assert!(InputLayout::from_header(&header(ColorSpace::Rgb, 4)).is_err());
    }

    #[test]
    fn black_mono_becomes_white_is_one() {
        let mut conv =
            InputConverter::new(InputLayout::Mono1 { black_is_one: true }, PivotFormat::Mono1, 4, false)
                .unwrap();
        let mut out = [0u8; 1];
        conv.convert(&[0b1010_0000], &mut out, 0).unwrap();
        assert_eq!(out[0], 0b0101_0000);
    }

    #[test]
    fn gray_replicates_into_rgb() {
        let mut conv =
            InputConverter::new(InputLayout::Gray8 { black_is_zero: true }, PivotFormat::Rgb8, 2, false)
                .unwrap();
        let mut out = [0u8; 6];
        conv.convert(&[10, 200], &mut out, 0).unwrap();
        assert_eq!(out, [10, 10, 10, 200, 200, 200]);
    }

    #[test]
    fn cmyk_input_to_rgb() {
        let mut conv = InputConverter::new(InputLayout::Cmyk8, PivotFormat::Rgb8, 1, false).unwrap();
        let mut out = [0u8; 3];
        conv.convert(&[0, 255, 0, 55], &mut out, 0).unwrap();
        assert_eq!(out, [200, 0, 200]);
    }

    #[test]
    fn short_input_lines_are_rejected() {
        let mut conv =
            InputConverter::new(InputLayout::Gray8 { black_is_zero: false }, PivotFormat::Gray8, 300, false)
                .unwrap();
        let mut out = vec![0u8; 300];
        let err = conv.convert(&[0], &mut out, 0).unwrap_err();
        assert!(matches!(err, RasterError::Stream(_)));
        assert_eq!(err.class(), rasterwerk_core::ErrorClass::Transient);
    }

    #[test]
    fn rgb_cannot_pivot_through_mono() {
        assert!(InputConverter::new(InputLayout::Rgb8, PivotFormat::Mono1, 1, false).is_err());
    }
}
