// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster stream codec — CUPS, PWG and Apple raster containers.
//
// CUPS and PWG share the 1796-byte page header; PWG pins the byte order to
// big-endian and blanks the CUPS-only fields. Apple raster wraps a short
// 32-byte page header in a file header carrying the page count.

pub mod compress;
pub mod reader;
pub mod writer;

pub use reader::RasterReader;
pub use writer::RasterWriter;

use byteorder::ByteOrder;
use rasterwerk_core::{
    ColorOrder, ColorSpace, Orientation, PageHeader, RasterError, Result, header::POINTS_PER_INCH,
};

/// Size of a CUPS / PWG page header.
pub const HEADER_SIZE: usize = 1796;
/// Size of an Apple raster page header.
pub const APPLE_HEADER_SIZE: usize = 32;

/// CUPS v1 sync word (compressed).
pub const SYNC_V1: &[u8; 4] = b"RaSt";
/// CUPS v2 / PWG sync word (compressed).
pub const SYNC_V2: &[u8; 4] = b"RaS2";
/// CUPS v3 sync word (uncompressed).
pub const SYNC_V3: &[u8; 4] = b"RaS3";
/// Apple raster file magic.
pub const APPLE_SYNC: &[u8; 8] = b"UNIRAST\0";

/// Media class PWG raster headers carry.
pub const PWG_MEDIA_CLASS: &str = "PwgRaster";

const STRING_LEN: usize = 64;

/// A failed read on the input side. Unlike output failures it only costs
/// the page being read.
pub(crate) fn read_failed(err: std::io::Error) -> RasterError {
    RasterError::Stream(format!("input read failed: {err}"))
}

// Offsets of the numeric fields.
const OFF_ADVANCE_DISTANCE: usize = 256;
const OFF_HW_RESOLUTION: usize = 276;
const OFF_IMAGING_BBOX: usize = 284;
const OFF_MARGINS: usize = 312;
const OFF_PAGE_SIZE: usize = 352;
const OFF_WIDTH: usize = 372;
const OFF_BORDERLESS: usize = 424;
const OFF_PAGE_SIZE_F: usize = 428;
const OFF_IMAGING_BBOX_F: usize = 436;
const OFF_INTEGERS: usize = 452;
const OFF_REALS: usize = 516;
const OFF_STRINGS: usize = 580;
const OFF_MARKER_TYPE: usize = 1604;
const OFF_RENDERING_INTENT: usize = 1668;
const OFF_PAGE_SIZE_NAME: usize = 1732;

fn read_string(raw: &[u8], offset: usize) -> String {
    let field = &raw[offset..offset + STRING_LEN];
    let end = field.iter().position(|&b| b == 0).unwrap_or(STRING_LEN);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn write_string(raw: &mut [u8], offset: usize, value: &str) {
    let field = &mut raw[offset..offset + STRING_LEN];
    field.fill(0);
    let bytes = value.as_bytes();
    // Always leave a terminating NUL.
    let n = bytes.len().min(STRING_LEN - 1);
    field[..n].copy_from_slice(&bytes[..n]);
}

/// Decode a 1796-byte page header.
pub fn decode_header<B: ByteOrder>(raw: &[u8]) -> Result<PageHeader> {
    if raw.len() < HEADER_SIZE {
        return Err(RasterError::ShortRead {
            expected: HEADER_SIZE,
            actual: raw.len(),
        });
    }
    let u = |offset: usize| B::read_u32(&raw[offset..offset + 4]);
    let f = |offset: usize| B::read_f32(&raw[offset..offset + 4]);
    let flag = |offset: usize| u(offset) != 0;

    let mut header = PageHeader {
        media_class: read_string(raw, 0),
        media_color: read_string(raw, 64),
        media_type: read_string(raw, 128),
        output_type: read_string(raw, 192),
        advance_distance: u(OFF_ADVANCE_DISTANCE),
        advance_media: u(260),
        collate: flag(264),
        cut_media: u(268),
        duplex: flag(272),
        hw_resolution: [u(OFF_HW_RESOLUTION), u(OFF_HW_RESOLUTION + 4)],
        imaging_bbox: [
            u(OFF_IMAGING_BBOX),
            u(OFF_IMAGING_BBOX + 4),
            u(OFF_IMAGING_BBOX + 8),
            u(OFF_IMAGING_BBOX + 12),
        ],
        insert_sheet: flag(300),
        jog: u(304),
        leading_edge: u(308),
        margins: [u(OFF_MARGINS), u(OFF_MARGINS + 4)],
        manual_feed: flag(320),
        media_position: u(324),
        media_weight: u(328),
        mirror_print: flag(332),
        negative_print: flag(336),
        num_copies: u(340),
        orientation: Orientation::from_raw(u(344)),
        output_face_up: flag(348),
        page_size: [u(OFF_PAGE_SIZE), u(OFF_PAGE_SIZE + 4)],
        separations: flag(360),
        tray_switch: flag(364),
        tumble: flag(368),
        width: u(OFF_WIDTH),
        height: u(376),
        cups_media_type: u(380),
        bits_per_color: u(384),
        bits_per_pixel: u(388),
        bytes_per_line: u(392),
        color_order: ColorOrder::from_raw(u(396))?,
        color_space: ColorSpace::from_raw(u(400))?,
        compression: u(404),
        row_count: u(408),
        row_feed: u(412),
        row_step: u(416),
        num_colors: u(420),
        borderless_scaling_factor: f(OFF_BORDERLESS),
        page_size_f: [f(OFF_PAGE_SIZE_F), f(OFF_PAGE_SIZE_F + 4)],
        imaging_bbox_f: [
            f(OFF_IMAGING_BBOX_F),
            f(OFF_IMAGING_BBOX_F + 4),
            f(OFF_IMAGING_BBOX_F + 8),
            f(OFF_IMAGING_BBOX_F + 12),
        ],
        marker_type: read_string(raw, OFF_MARKER_TYPE),
        rendering_intent: read_string(raw, OFF_RENDERING_INTENT),
        page_size_name: read_string(raw, OFF_PAGE_SIZE_NAME),
        ..PageHeader::default()
    };
    for i in 0..16 {
        header.integers[i] = u(OFF_INTEGERS + 4 * i);
        header.reals[i] = f(OFF_REALS + 4 * i);
        header.strings[i] = read_string(raw, OFF_STRINGS + STRING_LEN * i);
    }
    Ok(header)
}

/// Encode a page header into 1796 bytes.
pub fn encode_header<B: ByteOrder>(header: &PageHeader, raw: &mut [u8; HEADER_SIZE]) {
    raw.fill(0);
    write_string(raw, 0, &header.media_class);
    write_string(raw, 64, &header.media_color);
    write_string(raw, 128, &header.media_type);
    write_string(raw, 192, &header.output_type);

    let numbers: [(usize, u32); 42] = [
        (OFF_ADVANCE_DISTANCE, header.advance_distance),
        (260, header.advance_media),
        (264, header.collate as u32),
        (268, header.cut_media),
        (272, header.duplex as u32),
        (OFF_HW_RESOLUTION, header.hw_resolution[0]),
        (OFF_HW_RESOLUTION + 4, header.hw_resolution[1]),
        (OFF_IMAGING_BBOX, header.imaging_bbox[0]),
        (OFF_IMAGING_BBOX + 4, header.imaging_bbox[1]),
        (OFF_IMAGING_BBOX + 8, header.imaging_bbox[2]),
        (OFF_IMAGING_BBOX + 12, header.imaging_bbox[3]),
        (300, header.insert_sheet as u32),
        (304, header.jog),
        (308, header.leading_edge),
        (OFF_MARGINS, header.margins[0]),
        (OFF_MARGINS + 4, header.margins[1]),
        (320, header.manual_feed as u32),
        (324, header.media_position),
        (328, header.media_weight),
        (332, header.mirror_print as u32),
        (336, header.negative_print as u32),
        (340, header.num_copies),
        (344, header.orientation.raw()),
        (348, header.output_face_up as u32),
        (OFF_PAGE_SIZE, header.page_size[0]),
        (OFF_PAGE_SIZE + 4, header.page_size[1]),
        (360, header.separations as u32),
        (364, header.tray_switch as u32),
        (368, header.tumble as u32),
        (OFF_WIDTH, header.width),
        (376, header.height),
        (380, header.cups_media_type),
        (384, header.bits_per_color),
        (388, header.bits_per_pixel),
        (392, header.bytes_per_line),
        (396, header.color_order.raw()),
        (400, header.color_space.raw()),
        (404, header.compression),
        (408, header.row_count),
        (412, header.row_feed),
        (416, header.row_step),
        (420, header.num_colors),
    ];
    for (offset, value) in numbers {
        B::write_u32(&mut raw[offset..offset + 4], value);
    }

    B::write_f32(&mut raw[OFF_BORDERLESS..OFF_BORDERLESS + 4], header.borderless_scaling_factor);
    for i in 0..2 {
        let at = OFF_PAGE_SIZE_F + 4 * i;
        B::write_f32(&mut raw[at..at + 4], header.page_size_f[i]);
    }
    for i in 0..4 {
        let at = OFF_IMAGING_BBOX_F + 4 * i;
        B::write_f32(&mut raw[at..at + 4], header.imaging_bbox_f[i]);
    }
    for i in 0..16 {
        let at = OFF_INTEGERS + 4 * i;
        B::write_u32(&mut raw[at..at + 4], header.integers[i]);
        let at = OFF_REALS + 4 * i;
        B::write_f32(&mut raw[at..at + 4], header.reals[i]);
        write_string(raw, OFF_STRINGS + STRING_LEN * i, &header.strings[i]);
    }
    write_string(raw, OFF_MARKER_TYPE, &header.marker_type);
    write_string(raw, OFF_RENDERING_INTENT, &header.rendering_intent);
    write_string(raw, OFF_PAGE_SIZE_NAME, &header.page_size_name);
}

/// The header as PWG raster carries it: PWG media class, CUPS-only fields
/// cleared, the PWG integer block kept.
pub fn pwg_header(header: &PageHeader) -> PageHeader {
    PageHeader {
        media_class: PWG_MEDIA_CLASS.to_string(),
        advance_distance: 0,
        advance_media: 0,
        collate: false,
        imaging_bbox: [0; 4],
        margins: [0; 2],
        manual_feed: false,
        cups_media_type: 0,
        compression: 0,
        row_count: 0,
        row_feed: 0,
        row_step: 0,
        borderless_scaling_factor: 0.0,
        page_size_f: [0.0; 2],
        imaging_bbox_f: [0.0; 4],
        reals: [0.0; 16],
        strings: Default::default(),
        marker_type: String::new(),
        ..header.clone()
    }
}

/// Apple raster colour space codes.
fn apple_color_code(color_space: ColorSpace) -> u8 {
    match color_space {
        ColorSpace::Srgb => 1,
        ColorSpace::CieLab => 2,
        ColorSpace::AdobeRgb => 3,
        ColorSpace::W | ColorSpace::Sw => 4,
        ColorSpace::Rgb => 5,
        ColorSpace::Cmyk => 6,
        _ => 0,
    }
}

fn apple_color_space(code: u8) -> Result<ColorSpace> {
    Ok(match code {
        1 => ColorSpace::Srgb,
        2 => ColorSpace::CieLab,
        3 => ColorSpace::AdobeRgb,
        4 => ColorSpace::Sw,
        5 => ColorSpace::Rgb,
        6 => ColorSpace::Cmyk,
        other => {
            return Err(RasterError::Stream(format!(
                "unknown Apple raster colour space {other}"
            )))
        }
    })
}

/// Whether a page can be written as Apple raster.
pub fn apple_supported(header: &PageHeader) -> bool {
    header.color_order == ColorOrder::Chunked
        && header.bits_per_color == 8
        && matches!(
            (header.color_space, header.bits_per_pixel),
            (ColorSpace::Sw | ColorSpace::W, 8)
                | (ColorSpace::Srgb | ColorSpace::AdobeRgb | ColorSpace::Rgb, 24)
                | (ColorSpace::Cmyk, 32)
        )
}

/// Encode an Apple raster page header.
pub fn encode_apple_header(header: &PageHeader) -> [u8; APPLE_HEADER_SIZE] {
    use byteorder::BigEndian;
    let mut raw = [0u8; APPLE_HEADER_SIZE];
    raw[0] = header.bits_per_pixel as u8;
    raw[1] = apple_color_code(header.color_space);
    raw[2] = match (header.duplex, header.tumble) {
        (false, _) => 1,
        (true, true) => 2,
        (true, false) => 3,
    };
    raw[3] = header.integers[rasterwerk_core::header::PWG_PRINT_QUALITY] as u8;
    raw[5] = header.media_position as u8;
    BigEndian::write_u32(&mut raw[12..16], header.width);
    BigEndian::write_u32(&mut raw[16..20], header.height);
    BigEndian::write_u32(&mut raw[20..24], header.hw_resolution[0]);
    raw
}

/// Decode an Apple raster page header into a full page header.
pub fn decode_apple_header(raw: &[u8; APPLE_HEADER_SIZE]) -> Result<PageHeader> {
    use byteorder::BigEndian;
    let color_space = apple_color_space(raw[1])?;
    let bits_per_pixel = raw[0] as u32;
    let num_colors = color_space.num_colors(8);
    let resolution = BigEndian::read_u32(&raw[20..24]);
    if resolution == 0 || bits_per_pixel == 0 {
        return Err(RasterError::Stream("Apple raster page header is empty".into()));
    }
    let width = BigEndian::read_u32(&raw[12..16]);
    let height = BigEndian::read_u32(&raw[16..20]);
    let to_points = |pixels: u32| (pixels as f64 * POINTS_PER_INCH / resolution as f64).round() as u32;

    let mut header = PageHeader {
        width,
        height,
        hw_resolution: [resolution, resolution],
        color_space,
        color_order: ColorOrder::Chunked,
        bits_per_color: bits_per_pixel / num_colors,
        duplex: raw[2] >= 2,
        tumble: raw[2] == 2,
        media_position: raw[5] as u32,
        page_size: [to_points(width), to_points(height)],
        ..PageHeader::default()
    };
    header.integers[rasterwerk_core::header::PWG_PRINT_QUALITY] = raw[3] as u32;
    header.update_derived();
    header.imaging_bbox = [0, 0, header.page_size[0], header.page_size[1]];
    header.sync_float_fields();
    Ok(header)
}
