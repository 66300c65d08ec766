// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bit-packing primitives — per-pixel depth conversion, scatter of packed
// pixels into device lines, 1-bit thresholding and mirroring.
//
// Nothing here allocates or fails. Depths outside 1/2/4/8/16 are rejected
// once at job setup (`PageHeader::validate_format`), not per scanline.

use rasterwerk_core::ColorOrder;

/// Largest packed pixel: 15 channels at 16 bits.
pub const MAX_BYTES_PER_PIXEL: usize = 32;

/// 16x16 ordered dither matrix, values 0..=255.
pub static DITHER_16: [[u8; 16]; 16] = build_dither();

const fn bayer(x: usize, y: usize) -> u8 {
    let mut value = 0usize;
    let mut bit = 0;
    while bit < 4 {
        let xb = (x >> bit) & 1;
        let yb = (y >> bit) & 1;
        value = (value << 2) | ((xb ^ yb) << 1) | yb;
        bit += 1;
    }
    value as u8
}

const fn build_dither() -> [[u8; 16]; 16] {
    let mut m = [[0u8; 16]; 16];
    let mut y = 0;
    while y < 16 {
        let mut x = 0;
        while x < 16 {
            m[y][x] = bayer(x, y);
            x += 1;
        }
        y += 1;
    }
    m
}

/// Dither threshold in 0..=254 for pixel `(x, y)`.
#[inline]
pub(crate) fn threshold(x: u32, y: u32) -> u32 {
    DITHER_16[(y & 15) as usize][(x & 15) as usize] as u32 * 255 / 256
}

/// Quantise an 8-bit sample to `bits` (< 8) with the ordered dither.
#[inline]
fn quantise(sample: u8, bits: u32, x: u32, y: u32) -> u64 {
    let levels = (1u32 << bits) - 1;
    ((sample as u32 * levels + threshold(x, y)) / 255) as u64
}

/// Bits one chunked pixel occupies on the line (CUPS rules: three-channel
/// spaces below 8 bits pad to four slots, 6-channel 1-bit spaces to a byte).
pub fn chunked_pixel_bits(num_colors: u32, bits: u32) -> u32 {
    match num_colors {
        1 => bits,
        3 if bits < 8 => bits * 4,
        6 if bits == 1 => 8,
        n => n * bits,
    }
}

/// Bytes of the packed field [`convert_bits`] produces.
pub fn packed_len(num_colors: u32, bits: u32) -> usize {
    (num_colors * bits).div_ceil(8) as usize
}

/// Repack one pixel of 8-bit samples into `bits` per channel.
///
/// 16-bit output is big-endian per channel. Below 8 bits the channels are
/// ordered-dithered and right-aligned, MSB-first, in a big-endian field of
/// [`packed_len`] bytes. Returns the number of bytes written.
pub fn convert_bits(src: &[u8], dst: &mut [u8], x: u32, y: u32, num_colors: u32, bits: u32) -> usize {
    let n = num_colors as usize;
    match bits {
        16 => {
            for i in 0..n {
                let wide = src[i] as u16 * 257;
                dst[2 * i..2 * i + 2].copy_from_slice(&wide.to_be_bytes());
            }
            2 * n
        }
        8 => {
            dst[..n].copy_from_slice(&src[..n]);
            n
        }
        _ => {
            let mut acc = 0u64;
            for &sample in &src[..n] {
                acc = (acc << bits) | quantise(sample, bits, x, y);
            }
            let len = packed_len(num_colors, bits);
            write_be(acc, &mut dst[..len]);
            len
        }
    }
}

/// Inverse of [`convert_bits`] up to quantisation: expand a packed pixel back
/// to 8-bit samples.
pub fn unpack_bits(packed: &[u8], dst: &mut [u8], num_colors: u32, bits: u32) {
    let n = num_colors as usize;
    match bits {
        16 => {
            for i in 0..n {
                dst[i] = packed[2 * i];
            }
        }
        8 => dst[..n].copy_from_slice(&packed[..n]),
        _ => {
            let len = packed_len(num_colors, bits);
            let acc = read_be(&packed[..len]);
            let mask = (1u64 << bits) - 1;
            let levels = mask as u32;
            for i in 0..n {
                let shift = (n - 1 - i) as u32 * bits;
                let q = ((acc >> shift) & mask) as u32;
                dst[i] = (q * 255 / levels) as u8;
            }
        }
    }
}

fn write_be(value: u64, dst: &mut [u8]) {
    let len = dst.len();
    for (i, byte) in dst.iter_mut().enumerate() {
        *byte = (value >> (8 * (len - 1 - i))) as u8;
    }
}

fn read_be(src: &[u8]) -> u64 {
    src.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Write the low `nbits` of `value` MSB-first starting at `bit_offset`.
fn put_bits(dst: &mut [u8], bit_offset: usize, nbits: u32, value: u64) {
    if bit_offset % 8 == 0 && nbits % 8 == 0 {
        let start = bit_offset / 8;
        let len = (nbits / 8) as usize;
        write_be(value, &mut dst[start..start + len]);
        return;
    }
    for i in 0..nbits as usize {
        let bit = (value >> (nbits as usize - 1 - i)) & 1;
        let pos = bit_offset + i;
        let mask = 0x80u8 >> (pos % 8);
        if bit == 1 {
            dst[pos / 8] |= mask;
        } else {
            dst[pos / 8] &= !mask;
        }
    }
}

/// Scatter one packed pixel into a device line.
///
/// Chunked order places the whole pixel at `pixel_index` times the chunked
/// pixel width. Banded and planar order extract channel `plane` and place it
/// at `pixel_index * bits`; `dst` is then the band (or plane line) itself.
pub fn write_pixel(
    dst: &mut [u8],
    plane: u32,
    pixel_index: u32,
    pixel: &[u8],
    num_colors: u32,
    bits: u32,
    order: ColorOrder,
) {
    let index = pixel_index as usize;
    match order {
        ColorOrder::Chunked => {
            let pixel_bits = chunked_pixel_bits(num_colors, bits);
            if bits >= 8 {
                let len = (pixel_bits / 8) as usize;
                dst[index * len..(index + 1) * len].copy_from_slice(&pixel[..len]);
            } else {
                let field = packed_len(num_colors, bits);
                let value = read_be(&pixel[..field]);
                put_bits(dst, index * pixel_bits as usize, pixel_bits, value);
            }
        }
        ColorOrder::Banded | ColorOrder::Planar => {
            if bits >= 8 {
                let len = (bits / 8) as usize;
                let from = plane as usize * len;
                dst[index * len..(index + 1) * len].copy_from_slice(&pixel[from..from + len]);
            } else {
                let field = packed_len(num_colors, bits);
                let acc = read_be(&pixel[..field]);
                let shift = (num_colors - 1 - plane) * bits;
                let value = (acc >> shift) & ((1u64 << bits) - 1);
                put_bits(dst, index * bits as usize, bits, value);
            }
        }
    }
}

/// Reverse the bit order of a byte.
#[inline]
fn reverse_byte(b: u8) -> u8 {
    b.reverse_bits()
}

/// Mask clearing the pad bits of the last byte of a `pixels` wide line.
#[inline]
fn tail_mask(pixels: u32) -> u8 {
    match pixels % 8 {
        0 => 0xff,
        rem => 0xffu8 << (8 - rem),
    }
}

/// Invert the polarity of a 1-bit line in place (white-is-one to
/// black-is-one and back). Pad bits stay clear.
pub fn reverse_one_bit_line(line: &mut [u8], pixels: u32) {
    let size = (pixels as usize).div_ceil(8).min(line.len());
    for b in &mut line[..size] {
        *b = !*b;
    }
    if size > 0 {
        line[size - 1] &= tail_mask(pixels);
    }
}

/// Invert the polarity of a 1-bit line and mirror its pixel order, reading
/// `src` from the tail and writing `dst` from the head.
pub fn reverse_one_bit_line_swap(src: &[u8], dst: &mut [u8], pixels: u32) {
    mirror_one_bit_line(src, dst, pixels, true);
}

/// Mirror the pixel order of a 1-bit line, optionally inverting polarity.
pub fn mirror_one_bit_line(src: &[u8], dst: &mut [u8], pixels: u32, invert: bool) {
    let size = (pixels as usize).div_ceil(8);
    let flip = if invert { 0xff } else { 0x00 };
    if pixels % 8 == 0 {
        for j in 0..size {
            dst[j] = reverse_byte(src[size - 1 - j]) ^ flip;
        }
        return;
    }
    dst[..size].fill(0);
    let last = pixels as usize - 1;
    for i in 0..pixels as usize {
        let from = last - i;
        let bit = (src[from / 8] >> (7 - from % 8)) & 1;
        let bit = bit ^ (flip & 1);
        if bit == 1 {
            dst[i / 8] |= 0x80 >> (i % 8);
        }
    }
}

/// Threshold an 8-bit gray line (0 = black) into 1 bit per pixel, MSB-first,
/// 1 = white. `bi_level` uses a fixed midpoint instead of the dither matrix;
/// `row` selects the dither row and is used unchanged.
pub fn one_bit_line(src: &[u8], dst: &mut [u8], width: u32, row: u32, bi_level: bool) {
    let size = (width as usize).div_ceil(8);
    dst[..size].fill(0);
    for x in 0..width {
        let v = src[x as usize] as u32;
        let white = if bi_level {
            v >= 128
        } else {
            v + threshold(x, row) >= 255
        };
        if white {
            dst[(x / 8) as usize] |= 0x80 >> (x % 8);
        }
    }
}

/// Expand a 1-bit line (1 = white) to 8-bit gray, 0 or 255 per pixel.
pub fn one_bit_to_gray_line(src: &[u8], dst: &mut [u8], width: u32) {
    for x in 0..width as usize {
        let bit = (src[x / 8] >> (7 - x % 8)) & 1;
        dst[x] = if bit == 1 { 0xff } else { 0x00 };
    }
}

/// Invert every byte of a line in place.
pub fn invert_line(line: &mut [u8]) {
    for b in line.iter_mut() {
        *b = !*b;
    }
}

/// Reverse the order of `bytes_per_pixel` wide pixels from `src` into `dst`.
pub fn line_swap_bytes(src: &[u8], dst: &mut [u8], pixels: u32, bytes_per_pixel: usize) {
    let n = pixels as usize;
    for i in 0..n {
        let from = (n - 1 - i) * bytes_per_pixel;
        dst[i * bytes_per_pixel..(i + 1) * bytes_per_pixel]
            .copy_from_slice(&src[from..from + bytes_per_pixel]);
    }
}
