// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Resolution adaptation — integer-ratio scaling in both directions, the
// overspray stretch for input slightly smaller than the page, and window
// copies for cropping / placing lines with bit offsets.

use rasterwerk_core::{RasterError, Result};

use crate::pivot::PivotFormat;

/// Integer ratio between input and output resolution on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleRatio {
    Same,
    /// Each input pixel becomes `n` output pixels.
    Up(u32),
    /// Every `n` input pixels become one output pixel.
    Down(u32),
}

impl ScaleRatio {
    /// Ratio from input to output resolution. Non-integer ratios are an error.
    pub fn between(input: u32, output: u32) -> Result<Self> {
        let err = || RasterError::ResolutionRatio { input, output };
        if input == 0 || output == 0 {
            return Err(err());
        }
        if input == output {
            Ok(Self::Same)
        } else if output > input {
            if output % input != 0 {
                return Err(err());
            }
            Ok(Self::Up(output / input))
        } else {
            if input % output != 0 {
                return Err(err());
            }
            Ok(Self::Down(input / output))
        }
    }

    /// Output length for an input length.
    pub fn scale(self, n: u32) -> u32 {
        match self {
            Self::Same => n,
            Self::Up(k) => n * k,
            Self::Down(k) => n.div_ceil(k),
        }
    }
}

#[inline]
fn get_bit(line: &[u8], x: usize) -> bool {
    (line[x / 8] >> (7 - x % 8)) & 1 == 1
}

#[inline]
fn set_bit(line: &mut [u8], x: usize, on: bool) {
    let mask = 0x80u8 >> (x % 8);
    if on {
        line[x / 8] |= mask;
    } else {
        line[x / 8] &= !mask;
    }
}

/// Scale one line horizontally. Returns the output width in pixels.
///
/// Downscaling averages 8-bit samples and keeps the last pixel of each
/// group for 1-bit lines. Upscaling repeats pixels.
pub fn resample_line(src: &[u8], dst: &mut [u8], pixels: u32, format: PivotFormat, ratio: ScaleRatio) -> u32 {
    let out = ratio.scale(pixels);
    let n = pixels as usize;
    match (format, ratio) {
        (_, ScaleRatio::Same) => {
            let len = format.line_bytes(pixels);
            dst[..len].copy_from_slice(&src[..len]);
        }
        (PivotFormat::Mono1, ScaleRatio::Up(k)) => {
            dst[..format.line_bytes(out)].fill(0);
            for x in 0..n {
                let bit = get_bit(src, x);
                for r in 0..k as usize {
                    set_bit(dst, x * k as usize + r, bit);
                }
            }
        }
        (PivotFormat::Mono1, ScaleRatio::Down(k)) => {
            dst[..format.line_bytes(out)].fill(0);
            let k = k as usize;
            for o in 0..out as usize {
                let last = ((o + 1) * k).min(n) - 1;
                set_bit(dst, o, get_bit(src, last));
            }
        }
        (_, ScaleRatio::Up(k)) => {
            let bpp = format.bytes_per_pixel();
            let k = k as usize;
            for x in 0..n {
                let pixel = &src[x * bpp..(x + 1) * bpp];
                for r in 0..k {
                    let at = (x * k + r) * bpp;
                    dst[at..at + bpp].copy_from_slice(pixel);
                }
            }
        }
        (_, ScaleRatio::Down(k)) => {
            let bpp = format.bytes_per_pixel();
            let k = k as usize;
            for o in 0..out as usize {
                let first = o * k;
                let end = ((o + 1) * k).min(n);
                let count = (end - first) as u32;
                for c in 0..bpp {
                    let sum: u32 = (first..end).map(|x| src[x * bpp + c] as u32).sum();
                    dst[o * bpp + c] = (sum / count) as u8;
                }
            }
        }
    }
    out
}

/// Supplier of lines for the vertical stages.
pub trait LineSource {
    /// Fill `buf` with the next line. `Ok(false)` once the input is exhausted.
    fn next_line(&mut self, buf: &mut [u8]) -> Result<bool>;
}

/// Vertical scaling over a [`LineSource`].
pub struct VerticalResampler<S> {
    source: S,
    ratio: ScaleRatio,
    format: PivotFormat,
    line: Vec<u8>,
    acc: Vec<u32>,
    repeats_left: u32,
}

impl<S: LineSource> VerticalResampler<S> {
    /// `width` is the pixel width of the lines the source produces.
    pub fn new(source: S, ratio: ScaleRatio, format: PivotFormat, width: u32) -> Self {
        let len = format.line_bytes(width);
        Self {
            source,
            ratio,
            format,
            line: vec![0; len],
            acc: vec![0; len],
            repeats_left: 0,
        }
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: LineSource> LineSource for VerticalResampler<S> {
    fn next_line(&mut self, out: &mut [u8]) -> Result<bool> {
        let len = self.line.len();
        match self.ratio {
            ScaleRatio::Same => self.source.next_line(out),
            ScaleRatio::Up(k) => {
                if self.repeats_left == 0 {
                    if !self.source.next_line(&mut self.line)? {
                        return Ok(false);
                    }
                    self.repeats_left = k;
                }
                self.repeats_left -= 1;
                out[..len].copy_from_slice(&self.line);
                Ok(true)
            }
            ScaleRatio::Down(k) => {
                let mut count = 0u32;
                if self.format != PivotFormat::Mono1 {
                    self.acc.fill(0);
                }
                for _ in 0..k {
                    if !self.source.next_line(&mut self.line)? {
                        break;
                    }
                    count += 1;
                    if self.format != PivotFormat::Mono1 {
                        for (a, &v) in self.acc.iter_mut().zip(&self.line) {
                            *a += v as u32;
                        }
                    }
                }
                if count == 0 {
                    return Ok(false);
                }
                if self.format == PivotFormat::Mono1 {
                    out[..len].copy_from_slice(&self.line);
                } else {
                    for (o, &a) in out[..len].iter_mut().zip(&self.acc) {
                        *o = (a / count) as u8;
                    }
                }
                Ok(true)
            }
        }
    }
}

/// Stretch plan for input a little smaller than the page: one pixel (and
/// one line) is duplicated after every `cadence` input pixels so the image
/// covers the page. The cadence is shared by both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overspray {
    pub cadence: u32,
}

impl Overspray {
    /// Plan the stretch from `input` to `page` size (pixels, `[w, h]`).
    /// `None` when the input already covers the page. A page twice the
    /// input size or more on either axis is an error.
    pub fn plan(input: [u32; 2], page: [u32; 2]) -> Result<Option<Self>> {
        let mut cadence: Option<u32> = None;
        for axis in 0..2 {
            let (have, want) = (input[axis], page[axis]);
            if want >= have.saturating_mul(2) {
                return Err(RasterError::PageSizeMismatch(format!(
                    "input {}x{} cannot cover page {}x{}",
                    input[0], input[1], page[0], page[1]
                )));
            }
            if want > have {
                let every = have / (want - have);
                cadence = Some(cadence.map_or(every, |c| c.min(every)));
            }
        }
        Ok(cadence.map(|cadence| Self { cadence }))
    }

    /// Length after stretching.
    pub fn stretched(self, n: u32) -> u32 {
        n + n / self.cadence
    }

    /// Whether input row `index` (0-based) is followed by a duplicate.
    pub fn duplicate_row(self, index: u32) -> bool {
        (index + 1) % self.cadence == 0
    }

    /// Stretch one line. Returns the output width in pixels.
    pub fn stretch_line(self, src: &[u8], dst: &mut [u8], pixels: u32, format: PivotFormat) -> u32 {
        let out = self.stretched(pixels);
        let cadence = self.cadence as usize;
        let mut o = 0usize;
        match format {
            PivotFormat::Mono1 => {
                dst[..format.line_bytes(out)].fill(0);
                for x in 0..pixels as usize {
                    let bit = get_bit(src, x);
                    set_bit(dst, o, bit);
                    o += 1;
                    if (x + 1) % cadence == 0 {
                        set_bit(dst, o, bit);
                        o += 1;
                    }
                }
            }
            _ => {
                let bpp = format.bytes_per_pixel();
                for x in 0..pixels as usize {
                    let pixel = &src[x * bpp..(x + 1) * bpp];
                    dst[o * bpp..(o + 1) * bpp].copy_from_slice(pixel);
                    o += 1;
                    if (x + 1) % cadence == 0 {
                        dst[o * bpp..(o + 1) * bpp].copy_from_slice(pixel);
                        o += 1;
                    }
                }
            }
        }
        out
    }
}

/// Vertical half of [`Overspray`]: repeats every `cadence`-th line.
pub struct OversprayRows<S> {
    source: S,
    plan: Overspray,
    seen: u32,
    last: Vec<u8>,
    repeat: bool,
}

impl<S: LineSource> OversprayRows<S> {
    pub fn new(source: S, plan: Overspray, line_bytes: usize) -> Self {
        Self {
            source,
            plan,
            seen: 0,
            last: vec![0; line_bytes],
            repeat: false,
        }
    }
}

impl<S: LineSource> LineSource for OversprayRows<S> {
    fn next_line(&mut self, out: &mut [u8]) -> Result<bool> {
        let len = self.last.len();
        if self.repeat {
            self.repeat = false;
            out[..len].copy_from_slice(&self.last);
            return Ok(true);
        }
        if !self.source.next_line(&mut self.last)? {
            return Ok(false);
        }
        self.repeat = self.plan.duplicate_row(self.seen);
        self.seen += 1;
        out[..len].copy_from_slice(&self.last);
        Ok(true)
    }
}

/// Copy a window of `src` into `dst`: output pixel `x` takes source pixel
/// `x + offset`; positions outside the source are white. A positive offset
/// crops, a negative one shifts the line right.
pub fn window_line(
    src: &[u8],
    src_pixels: u32,
    dst: &mut [u8],
    dst_pixels: u32,
    offset: i64,
    format: PivotFormat,
) {
    let white = format.white();
    match format {
        PivotFormat::Mono1 => {
            dst[..format.line_bytes(dst_pixels)].fill(0);
            for x in 0..dst_pixels as usize {
                let sx = x as i64 + offset;
                let on = sx < 0 || sx >= src_pixels as i64 || get_bit(src, sx as usize);
                set_bit(dst, x, on);
            }
        }
        _ => {
            let bpp = format.bytes_per_pixel();
            for x in 0..dst_pixels as usize {
                let sx = x as i64 + offset;
                let out = &mut dst[x * bpp..(x + 1) * bpp];
                if sx < 0 || sx >= src_pixels as i64 {
                    out.fill(white);
                } else {
                    let sx = sx as usize;
                    out.copy_from_slice(&src[sx * bpp..(sx + 1) * bpp]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lines(Vec<Vec<u8>>, usize);

    impl LineSource for Lines {
        fn next_line(&mut self, buf: &mut [u8]) -> Result<bool> {
            match self.0.get(self.1) {
                Some(line) => {
                    buf[..line.len()].copy_from_slice(line);
                    self.1 += 1;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    fn drain<S: LineSource>(mut s: S, len: usize) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; len];
        while s.next_line(&mut buf).unwrap() {
            out.push(buf.clone());
        }
        out
    }

    #[test]
    fn ratios() {
        assert_eq!(ScaleRatio::between(300, 300).unwrap(), ScaleRatio::Same);
        assert_eq!(ScaleRatio::between(300, 600).unwrap(), ScaleRatio::Up(2));
        assert_eq!(ScaleRatio::between(600, 200).unwrap(), ScaleRatio::Down(3));
        assert!(matches!(
            ScaleRatio::between(300, 400),
            Err(RasterError::ResolutionRatio { input: 300, output: 400 })
        ));
    }

    #[test]
    fn gray_up_then_down_is_identity() {
        let src: Vec<u8> = (0..7).map(|i| i * 30).collect();
        let mut up = vec![0u8; 21];
        let mut back = vec![0u8; 7];
        assert_eq!(resample_line(&src, &mut up, 7, PivotFormat::Gray8, ScaleRatio::Up(3)), 21);
        assert_eq!(resample_line(&up, &mut back, 21, PivotFormat::Gray8, ScaleRatio::Down(3)), 7);
        assert_eq!(back, src);
    }

    #[test]
    fn one_bit_down_keeps_last_of_group() {
        // Groups of 4: 0001 1110 -> 1, 0
        let src = [0b0001_1110u8];
        let mut dst = [0u8; 1];
        resample_line(&src, &mut dst, 8, PivotFormat::Mono1, ScaleRatio::Down(4));
        assert_eq!(dst[0], 0b1000_0000);
    }

    #[test]
    fn one_bit_up_repeats() {
        let src = [0b1010_0000u8];
        let mut dst = [0u8; 1];
        resample_line(&src, &mut dst, 4, PivotFormat::Mono1, ScaleRatio::Up(2));
        assert_eq!(dst[0], 0b1100_1100);
    }

    #[test]
    fn vertical_down_averages_and_handles_short_tail() {
        let src = Lines(vec![vec![10], vec![20], vec![30], vec![40], vec![50]], 0);
        let v = VerticalResampler::new(src, ScaleRatio::Down(2), PivotFormat::Gray8, 1);
        assert_eq!(drain(v, 1), vec![vec![15], vec![35], vec![50]]);
    }

    #[test]
    fn vertical_up_repeats_lines() {
        let src = Lines(vec![vec![1], vec![2]], 0);
        let v = VerticalResampler::new(src, ScaleRatio::Up(3), PivotFormat::Gray8, 1);
        assert_eq!(drain(v, 1).len(), 6);
    }

    #[test]
    fn overspray_uses_smaller_cadence_of_both_axes() {
        let plan = Overspray::plan([100, 200], [110, 210]).unwrap().unwrap();
        assert_eq!(plan.cadence, 10);
        assert_eq!(plan.stretched(100), 110);
        assert_eq!(plan.stretched(200), 220);
        assert!(Overspray::plan([100, 100], [100, 100]).unwrap().is_none());
        assert!(Overspray::plan([100, 100], [200, 100]).is_err());
    }

    #[test]
    fn overspray_duplicates_after_cadence() {
        let plan = Overspray { cadence: 2 };
        let mut dst = [0u8; 6];
        assert_eq!(plan.stretch_line(&[1, 2, 3, 4], &mut dst, 4, PivotFormat::Gray8), 6);
        assert_eq!(dst, [1, 2, 2, 3, 4, 4]);

        let rows = OversprayRows::new(Lines(vec![vec![1], vec![2], vec![3]], 0), plan, 1);
        assert_eq!(drain(rows, 1), vec![vec![1], vec![2], vec![2], vec![3]]);
    }

    #[test]
    fn window_crops_and_pads_white() {
        let src = [1u8, 2, 3, 4];
        let mut dst = [0u8; 4];
        window_line(&src, 4, &mut dst, 4, 2, PivotFormat::Gray8);
        assert_eq!(dst, [3, 4, 255, 255]);
        window_line(&src, 4, &mut dst, 4, -1, PivotFormat::Gray8);
        assert_eq!(dst, [255, 1, 2, 3]);
    }

    #[test]
    fn window_on_bits_with_unaligned_offset() {
        let src = [0b0000_1111u8, 0b0000_0000];
        let mut dst = [0u8; 1];
        window_line(&src, 16, &mut dst, 8, 4, PivotFormat::Mono1);
        assert_eq!(dst[0], 0b1111_0000);
        // Beyond the source is white.
        window_line(&src, 10, &mut dst, 8, 4, PivotFormat::Mono1);
        assert_eq!(dst[0], 0b1111_0011);
    }
}
