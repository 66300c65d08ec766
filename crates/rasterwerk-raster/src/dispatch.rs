// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion selection — picks, once per job, the routine that turns a pivot
// line into a device line. A small table of fast paths keyed on the exact
// (colour space, bits per pixel, bits per colour) triple is tried first;
// everything else goes through the generic per-pixel loop.

use rasterwerk_core::{ColorOrder, ColorSpace, PageHeader, Result};
use tracing::debug;

use crate::bits::{
    convert_bits, invert_line, line_swap_bytes, mirror_one_bit_line, reverse_one_bit_line,
    reverse_one_bit_line_swap, write_pixel, MAX_BYTES_PER_PIXEL,
};
use crate::cspace::{rgb_to_cmyk, ColorTransform, IccEncoding, PixelConversion, PixelConverter};
use crate::pivot::PivotFormat;

/// Key of the fast-path table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConversionKey {
    pub color_space: ColorSpace,
    pub bits_per_pixel: u32,
    pub bits_per_color: u32,
}

/// Whole-line fast paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialLine {
    /// The pivot line already is the device line.
    Noop,
    /// Invert in place (light to ink). 1-bit lines keep their pad bits clear.
    Invert,
    /// Mirror 1-byte pixels.
    SwapBytes,
    /// Mirror 1-byte pixels and invert.
    InvertSwapBytes,
    /// Mirror 3-byte pixels.
    Swap24,
    /// Mirror a 1-bit line.
    SwapBits,
    /// Mirror a 1-bit line and invert.
    InvertSwapBits,
    /// RGB to CMYK, optionally K first, optionally mirrored.
    RgbToCmyk { kcmy: bool, mirror: bool },
}

impl SpecialLine {
    /// Whether the routine writes into the scratch line instead of working
    /// on the source in place.
    pub fn needs_buffer(self) -> bool {
        !matches!(self, Self::Noop | Self::Invert)
    }
}

/// One row of the fast-path table.
#[derive(Debug, Clone, Copy)]
pub struct SpecialEntry {
    pub key: ConversionKey,
    /// Routine for normal lines.
    pub forward: SpecialLine,
    /// Routine for lines of a mirrored back side.
    pub reverse: SpecialLine,
}

const fn entry(
    color_space: ColorSpace,
    bits_per_pixel: u32,
    bits_per_color: u32,
    forward: SpecialLine,
    reverse: SpecialLine,
) -> SpecialEntry {
    SpecialEntry {
        key: ConversionKey {
            color_space,
            bits_per_pixel,
            bits_per_color,
        },
        forward,
        reverse,
    }
}

const CMYK: SpecialLine = SpecialLine::RgbToCmyk { kcmy: false, mirror: false };
const CMYK_SWAP: SpecialLine = SpecialLine::RgbToCmyk { kcmy: false, mirror: true };
const KCMY: SpecialLine = SpecialLine::RgbToCmyk { kcmy: true, mirror: false };
const KCMY_SWAP: SpecialLine = SpecialLine::RgbToCmyk { kcmy: true, mirror: true };

/// Fast paths, sorted by key for binary search.
pub static SPECIAL_CASES: [SpecialEntry; 17] = [
    entry(ColorSpace::W, 1, 1, SpecialLine::Noop, SpecialLine::SwapBits),
    entry(ColorSpace::W, 8, 8, SpecialLine::Noop, SpecialLine::SwapBytes),
    entry(ColorSpace::Rgb, 24, 8, SpecialLine::Noop, SpecialLine::Swap24),
    entry(ColorSpace::K, 1, 1, SpecialLine::Invert, SpecialLine::InvertSwapBits),
    entry(ColorSpace::K, 8, 8, SpecialLine::Invert, SpecialLine::InvertSwapBytes),
    entry(ColorSpace::Cmyk, 32, 8, CMYK, CMYK_SWAP),
    entry(ColorSpace::Kcmy, 32, 8, KCMY, KCMY_SWAP),
    entry(ColorSpace::White, 1, 1, SpecialLine::Noop, SpecialLine::SwapBits),
    entry(ColorSpace::White, 8, 8, SpecialLine::Noop, SpecialLine::SwapBytes),
    entry(ColorSpace::Gold, 1, 1, SpecialLine::Invert, SpecialLine::InvertSwapBits),
    entry(ColorSpace::Gold, 8, 8, SpecialLine::Invert, SpecialLine::InvertSwapBytes),
    entry(ColorSpace::Silver, 1, 1, SpecialLine::Invert, SpecialLine::InvertSwapBits),
    entry(ColorSpace::Silver, 8, 8, SpecialLine::Invert, SpecialLine::InvertSwapBytes),
    entry(ColorSpace::Sw, 1, 1, SpecialLine::Noop, SpecialLine::SwapBits),
    entry(ColorSpace::Sw, 8, 8, SpecialLine::Noop, SpecialLine::SwapBytes),
    entry(ColorSpace::Srgb, 24, 8, SpecialLine::Noop, SpecialLine::Swap24),
    entry(ColorSpace::AdobeRgb, 24, 8, SpecialLine::Noop, SpecialLine::Swap24),
];

/// Look up the fast path for an exact triple.
pub fn lookup_special(key: ConversionKey) -> Option<&'static SpecialEntry> {
    SPECIAL_CASES
        .binary_search_by(|e| e.key.cmp(&key))
        .ok()
        .map(|i| &SPECIAL_CASES[i])
}

/// Line-level routine for one page side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineConversion {
    Special(SpecialLine),
    /// Per-pixel loop for the given order, optionally mirrored.
    Generic { order: ColorOrder, mirror: bool },
}

/// How packed device samples come out of the pixel conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelPacking {
    /// Repack 8-bit samples to this many bits per channel.
    Bits(u32),
    /// The pixel conversion already wrote the final form.
    Passthrough,
}

/// Inputs to [`select_conversion`].
#[derive(Debug, Clone, Copy)]
pub struct ConversionParams {
    pub color_space: ColorSpace,
    pub color_order: ColorOrder,
    pub bits_per_color: u32,
    pub bits_per_pixel: u32,
    pub num_colors: u32,
    /// Set when a colour transform will drive the pixel conversion.
    pub icc: Option<IccEncoding>,
    /// Mirror the lines of even (back side) pages.
    pub swap_image_x: bool,
}

impl ConversionParams {
    pub fn from_header(header: &PageHeader, icc: Option<IccEncoding>, swap_image_x: bool) -> Self {
        Self {
            color_space: header.color_space,
            color_order: header.color_order,
            bits_per_color: header.bits_per_color,
            bits_per_pixel: header.bits_per_pixel,
            num_colors: header.num_colors,
            icc,
            swap_image_x,
        }
    }
}

/// The job's chosen conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub pixel: PixelConversion,
    pub packing: PixelPacking,
    /// Routine for odd (front) pages.
    pub odd: LineConversion,
    /// Routine for even (back) pages.
    pub even: LineConversion,
    /// Whether a scratch line is needed.
    pub alloc_line_buf: bool,
    /// Layout the line converter expects its input in.
    pub pivot: PivotFormat,
}

/// Choose the conversion for a job.
///
/// Fast paths apply only without a colour transform and when the output is
/// chunked or single-channel (one channel lays out the same in every order).
pub fn select_conversion(params: &ConversionParams) -> Result<Conversion> {
    let key = ConversionKey {
        color_space: params.color_space,
        bits_per_pixel: params.bits_per_pixel,
        bits_per_color: params.bits_per_color,
    };
    let special_allowed =
        params.icc.is_none() && (params.color_order == ColorOrder::Chunked || params.num_colors == 1);

    if special_allowed {
        if let Some(found) = lookup_special(key) {
            if let Ok(pixel) = PixelConversion::for_color_space(params.color_space) {
                let even = if params.swap_image_x { found.reverse } else { found.forward };
                let pivot = if params.bits_per_color == 1 {
                    PivotFormat::Mono1
                } else if pixel.source_channels() == 1 {
                    PivotFormat::Gray8
                } else {
                    PivotFormat::Rgb8
                };
                debug!(?key, forward = ?found.forward, even = ?even, "fast-path conversion");
                return Ok(Conversion {
                    pixel,
                    packing: PixelPacking::Bits(params.bits_per_color),
                    odd: LineConversion::Special(found.forward),
                    even: LineConversion::Special(even),
                    alloc_line_buf: found.forward.needs_buffer() || even.needs_buffer(),
                    pivot,
                });
            }
        }
    }

    let pixel = match params.icc {
        Some(encoding) => PixelConversion::Icc {
            channels: params.num_colors,
            encoding,
        },
        None => PixelConversion::for_color_space(params.color_space)?,
    };
    let packing = if pixel.produces_final() {
        PixelPacking::Passthrough
    } else {
        PixelPacking::Bits(params.bits_per_color)
    };
    let pivot = if pixel.source_channels() == 1 {
        PivotFormat::Gray8
    } else {
        PivotFormat::Rgb8
    };
    debug!(?key, ?pixel, order = ?params.color_order, "generic conversion");
    Ok(Conversion {
        pixel,
        packing,
        odd: LineConversion::Generic {
            order: params.color_order,
            mirror: false,
        },
        even: LineConversion::Generic {
            order: params.color_order,
            mirror: params.swap_image_x,
        },
        alloc_line_buf: true,
        pivot,
    })
}

impl Conversion {
    /// Bind to the job's colour transform and output geometry.
    pub fn bind<'a>(
        &self,
        transform: Option<&'a dyn ColorTransform>,
        header: &PageHeader,
    ) -> Result<LineConverter<'a>> {
        Ok(LineConverter {
            odd: self.odd,
            even: self.even,
            pixel: self.pixel.bind(transform)?,
            packing: self.packing,
            num_colors: header.num_colors,
            bits_per_color: header.bits_per_color,
            plane_bytes: header.plane_bytes(),
            num_bands: header.num_bands() as usize,
            pivot: self.pivot,
        })
    }
}

/// A bound conversion, ready to turn pivot lines into device lines.
pub struct LineConverter<'a> {
    odd: LineConversion,
    even: LineConversion,
    pixel: PixelConverter<'a>,
    packing: PixelPacking,
    num_colors: u32,
    bits_per_color: u32,
    plane_bytes: usize,
    num_bands: usize,
    pivot: PivotFormat,
}

impl LineConverter<'_> {
    pub fn pivot(&self) -> PivotFormat {
        self.pivot
    }

    /// Bytes of the device line [`convert`](Self::convert) returns.
    pub fn line_bytes(&self) -> usize {
        self.plane_bytes * self.num_bands
    }

    /// Convert one pivot line of `pixels` pixels.
    ///
    /// `src` may be modified in place. The result borrows either `src` or
    /// `scratch`. `plane` selects the colour plane for planar output.
    pub fn convert<'b>(
        &self,
        even_page: bool,
        src: &'b mut [u8],
        scratch: &'b mut [u8],
        row: u32,
        plane: u32,
        pixels: u32,
    ) -> &'b [u8] {
        let line = if even_page { self.even } else { self.odd };
        let len = self.line_bytes();
        match line {
            LineConversion::Special(special) => self.special(special, src, scratch, pixels, len),
            LineConversion::Generic { order, mirror } => {
                self.generic(order, mirror, src, &mut scratch[..len], row, plane, pixels);
                &scratch[..len]
            }
        }
    }

    fn special<'b>(
        &self,
        special: SpecialLine,
        src: &'b mut [u8],
        scratch: &'b mut [u8],
        pixels: u32,
        len: usize,
    ) -> &'b [u8] {
        let one_bit = self.bits_per_color == 1;
        match special {
            SpecialLine::Noop => &src[..len],
            SpecialLine::Invert => {
                if one_bit {
                    reverse_one_bit_line(&mut src[..len], pixels);
                } else {
                    invert_line(&mut src[..len]);
                }
                &src[..len]
            }
            SpecialLine::SwapBytes => {
                line_swap_bytes(src, scratch, pixels, 1);
                &scratch[..len]
            }
            SpecialLine::InvertSwapBytes => {
                line_swap_bytes(src, scratch, pixels, 1);
                invert_line(&mut scratch[..len]);
                &scratch[..len]
            }
            SpecialLine::Swap24 => {
                line_swap_bytes(src, scratch, pixels, 3);
                &scratch[..len]
            }
            SpecialLine::SwapBits => {
                mirror_one_bit_line(src, scratch, pixels, false);
                &scratch[..len]
            }
            SpecialLine::InvertSwapBits => {
                reverse_one_bit_line_swap(src, scratch, pixels);
                &scratch[..len]
            }
            SpecialLine::RgbToCmyk { kcmy, mirror } => {
                let n = pixels as usize;
                for i in 0..n {
                    let from = if mirror { n - 1 - i } else { i };
                    let out = &mut scratch[4 * i..4 * i + 4];
                    rgb_to_cmyk(&src[3 * from..3 * from + 3], out);
                    if kcmy {
                        out.rotate_right(1);
                    }
                }
                &scratch[..len]
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn generic(
        &self,
        order: ColorOrder,
        mirror: bool,
        src: &[u8],
        dst: &mut [u8],
        row: u32,
        plane: u32,
        pixels: u32,
    ) {
        dst.fill(0);
        let channels = self.pixel.conversion().source_channels();
        let mut device = [0u8; MAX_BYTES_PER_PIXEL];
        let mut packed = [0u8; MAX_BYTES_PER_PIXEL];
        let last = pixels.saturating_sub(1);

        for x in 0..pixels {
            let sx = (if mirror { last - x } else { x }) as usize;
            let n = self
                .pixel
                .convert(&src[sx * channels..(sx + 1) * channels], &mut device, x, row);
            let sample: &[u8] = match self.packing {
                PixelPacking::Passthrough => &device[..n],
                PixelPacking::Bits(bits) => {
                    let m = convert_bits(&device, &mut packed, x, row, self.num_colors, bits);
                    &packed[..m]
                }
            };
            match order {
                ColorOrder::Chunked | ColorOrder::Planar => write_pixel(
                    dst,
                    plane,
                    x,
                    sample,
                    self.num_colors,
                    self.bits_per_color,
                    order,
                ),
                ColorOrder::Banded => {
                    for band in 0..self.num_bands {
                        let start = band * self.plane_bytes;
                        write_pixel(
                            &mut dst[start..start + self.plane_bytes],
                            band as u32,
                            x,
                            sample,
                            self.num_colors,
                            self.bits_per_color,
                            order,
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(cs: ColorSpace, bits: u32, order: ColorOrder, swap: bool) -> (ConversionParams, PageHeader) {
        let mut header = PageHeader {
            color_space: cs,
            bits_per_color: bits,
            color_order: order,
            width: 10,
            ..PageHeader::default()
        };
        header.update_derived();
        (ConversionParams::from_header(&header, None, swap), header)
    }

    #[test]
    fn table_is_sorted_and_unique() {
        for pair in SPECIAL_CASES.windows(2) {
            assert!(pair[0].key < pair[1].key, "{:?} !< {:?}", pair[0].key, pair[1].key);
        }
    }

    #[test]
    fn lookup_is_exact() {
        let key = ConversionKey {
            color_space: ColorSpace::Cmyk,
            bits_per_pixel: 32,
            bits_per_color: 8,
        };
        assert_eq!(lookup_special(key).map(|e| e.forward), Some(CMYK));
        let miss = ConversionKey {
            bits_per_pixel: 64,
            bits_per_color: 16,
            ..key
        };
        assert!(lookup_special(miss).is_none());
    }

    #[test]
    fn fast_path_only_uses_reverse_when_mirroring() {
        let (p, _) = params(ColorSpace::K, 8, ColorOrder::Chunked, false);
        let c = select_conversion(&p).unwrap();
        assert_eq!(c.odd, LineConversion::Special(SpecialLine::Invert));
        assert_eq!(c.even, LineConversion::Special(SpecialLine::Invert));
        assert!(!c.alloc_line_buf);

        let (p, _) = params(ColorSpace::K, 8, ColorOrder::Chunked, true);
        let c = select_conversion(&p).unwrap();
        assert_eq!(c.even, LineConversion::Special(SpecialLine::InvertSwapBytes));
        assert!(c.alloc_line_buf);
    }

    #[test]
    fn single_channel_planar_may_take_fast_path() {
        let (p, _) = params(ColorSpace::Sw, 8, ColorOrder::Planar, false);
        let c = select_conversion(&p).unwrap();
        assert_eq!(c.odd, LineConversion::Special(SpecialLine::Noop));
    }

    #[test]
    fn banded_cmyk_is_generic() {
        let (p, _) = params(ColorSpace::Cmyk, 8, ColorOrder::Banded, false);
        let c = select_conversion(&p).unwrap();
        assert!(matches!(c.odd, LineConversion::Generic { order: ColorOrder::Banded, .. }));
        assert_eq!(c.pivot, PivotFormat::Rgb8);
    }

    #[test]
    fn transform_disables_fast_path() {
        let (mut p, _) = params(ColorSpace::Srgb, 8, ColorOrder::Chunked, false);
        p.icc = Some(IccEncoding::Device8);
        let c = select_conversion(&p).unwrap();
        assert!(matches!(c.odd, LineConversion::Generic { .. }));
        assert!(matches!(c.pixel, PixelConversion::Icc { channels: 3, .. }));
    }

    #[test]
    fn cie_without_transform_is_rejected() {
        let (p, _) = params(ColorSpace::CieLab, 8, ColorOrder::Chunked, false);
        assert!(select_conversion(&p).is_err());
    }

    fn run(cs: ColorSpace, bits: u32, order: ColorOrder, mirror: bool, force_generic: bool, src: &[u8]) -> Vec<u8> {
        let (p, header) = params(cs, bits, order, mirror);
        let mut c = select_conversion(&p).unwrap();
        if force_generic {
            c.odd = LineConversion::Generic { order, mirror: false };
            c.even = LineConversion::Generic { order, mirror };
            c.pivot = if c.pixel.source_channels() == 1 { PivotFormat::Gray8 } else { PivotFormat::Rgb8 };
        }
        let conv = c.bind(None, &header).unwrap();
        let mut line = src.to_vec();
        let mut scratch = vec![0u8; conv.line_bytes().max(line.len())];
        conv.convert(true, &mut line, &mut scratch, 3, 0, 10).to_vec()
    }

    #[test]
    fn fast_paths_match_generic_loop() {
        let rgb: Vec<u8> = (0..30).map(|i| (i * 37 % 256) as u8).collect();
        let gray: Vec<u8> = (0..10).map(|i| (i * 29) as u8).collect();
        for mirror in [false, true] {
            for cs in [ColorSpace::Cmyk, ColorSpace::Kcmy, ColorSpace::Srgb] {
                assert_eq!(
                    run(cs, 8, ColorOrder::Chunked, mirror, false, &rgb),
                    run(cs, 8, ColorOrder::Chunked, mirror, true, &rgb),
                    "{cs:?} mirror={mirror}"
                );
            }
            for cs in [ColorSpace::K, ColorSpace::Sw] {
                assert_eq!(
                    run(cs, 8, ColorOrder::Chunked, mirror, false, &gray),
                    run(cs, 8, ColorOrder::Chunked, mirror, true, &gray),
                    "{cs:?} mirror={mirror}"
                );
            }
        }
    }

    #[test]
    fn one_bit_fast_path_matches_generic_for_solid_pixels() {
        // Pixels 0..10: black, white alternating in pairs.
        let gray: Vec<u8> = (0..10).map(|i| if (i / 2) % 2 == 0 { 0 } else { 255 }).collect();
        let mono: Vec<u8> = {
            let mut m = vec![0u8; 2];
            crate::bits::one_bit_line(&gray, &mut m, 10, 3, false);
            m
        };
        for mirror in [false, true] {
            let fast = run(ColorSpace::K, 1, ColorOrder::Chunked, mirror, false, &mono);
            let slow = run(ColorSpace::K, 1, ColorOrder::Chunked, mirror, true, &gray);
            assert_eq!(fast, slow, "mirror={mirror}");
        }
    }

    #[test]
    fn banded_cmyk_bands_follow_each_other() {
        // White, red.
        let src = [255u8, 255, 255, 255, 0, 0];
        let (p, mut header) = params(ColorSpace::Cmyk, 8, ColorOrder::Banded, false);
        header.width = 2;
        header.update_derived();
        let conv = select_conversion(&p).unwrap().bind(None, &header).unwrap();
        let mut line = src.to_vec();
        let mut scratch = vec![0u8; 8];
        let out = conv.convert(false, &mut line, &mut scratch, 0, 0, 2);
        assert_eq!(out, &[0, 0, 0, 255, 0, 255, 0, 0]);
    }

    #[test]
    fn planar_writes_requested_plane() {
        let src = [255u8, 0, 0];
        let (p, mut header) = params(ColorSpace::Cmy, 8, ColorOrder::Planar, false);
        header.width = 1;
        header.update_derived();
        let conv = select_conversion(&p).unwrap().bind(None, &header).unwrap();
        let mut scratch = vec![0u8; 1];
        for (plane, want) in [(0u32, 0u8), (1, 255), (2, 255)] {
            let mut line = src.to_vec();
            let out = conv.convert(false, &mut line, &mut scratch, 0, plane, 1).to_vec();
            assert_eq!(out, vec![want]);
        }
    }
}
