// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page geometry — duplex swap flags and the per-page resolution of sheet
// size, margins, bitmap size and bitmap offset. PDF and raster input go
// through the same arithmetic; only the declared page size differs.

use rasterwerk_core::header::POINTS_PER_INCH;
use rasterwerk_core::{PageHeader, RasterError, Result};
use rasterwerk_document::PageGeometry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{DocumentContext, PagePlan, SizeOption};

/// How a duplex printer images the back of a sheet (`cupsBackSide`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BacksideConvention {
    /// Back sides come out like front sides.
    #[default]
    None,
    /// Back sides are rotated 180 degrees.
    Rotated,
    /// Back sides are mirrored along the feed direction.
    Flipped,
    /// Short-edge duplex done by hand: rotated only when tumbling.
    ManualTumble,
}

/// Which axes of back-side pages get their image and margins swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapFlags {
    pub swap_image_x: bool,
    pub swap_image_y: bool,
    pub swap_margin_x: bool,
    pub swap_margin_y: bool,
}

impl SwapFlags {
    /// Flags for a whole job. `flipped_margin` is the printer's
    /// `APDuplexRequiresFlippedMargin` when it declares one.
    pub fn for_job(
        duplex: bool,
        tumble: bool,
        convention: BacksideConvention,
        flipped_margin: Option<bool>,
    ) -> Self {
        if !duplex {
            return Self::default();
        }
        let both = Self {
            swap_image_x: true,
            swap_image_y: true,
            swap_margin_x: true,
            swap_margin_y: true,
        };
        let mut flags = match (convention, tumble) {
            (BacksideConvention::Rotated, false) | (BacksideConvention::ManualTumble, true) => both,
            (BacksideConvention::Flipped, true) => Self {
                swap_image_x: true,
                swap_margin_x: true,
                ..Self::default()
            },
            (BacksideConvention::Flipped, false) => Self {
                swap_image_y: true,
                swap_margin_y: true,
                ..Self::default()
            },
            _ => Self::default(),
        };
        match (convention, flipped_margin) {
            (BacksideConvention::Rotated | BacksideConvention::ManualTumble, Some(true)) => {
                flags.swap_margin_y = false;
            }
            (BacksideConvention::Flipped, Some(false)) => {
                flags.swap_margin_y = !flags.swap_margin_y;
            }
            _ => {}
        }
        flags
    }
}

/// What a source says about one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    /// Declared `[width, length]` in points, before rotation.
    pub size: [f64; 2],
    /// Clockwise rotation in degrees.
    pub rotate: u32,
    /// Imageable area `[left, bottom, right, top]` in points, if declared.
    pub imaging_box: Option<[f64; 4]>,
}

impl PageRequest {
    /// A PDF page: its crop box and `/Rotate`, no imageable area.
    pub fn from_pdf(geometry: &PageGeometry) -> Self {
        Self {
            size: geometry.size(),
            rotate: geometry.rotate,
            imaging_box: None,
        }
    }

    /// A raster page: the previous stage's own header, never rotated.
    /// Headers without a page size get one from their pixel size.
    pub fn from_raster(header: &PageHeader) -> Self {
        let size = if header.page_size[0] > 0 && header.page_size[1] > 0 {
            [header.page_size[0] as f64, header.page_size[1] as f64]
        } else {
            let points = |pixels: u32, res: u32| pixels as f64 * POINTS_PER_INCH / res.max(1) as f64;
            [
                points(header.width, header.hw_resolution[0]),
                points(header.height, header.hw_resolution[1]),
            ]
        };
        let bbox = header.imaging_bbox;
        let imaging_box = (bbox[2] > bbox[0] && bbox[3] > bbox[1])
            .then(|| [bbox[0] as f64, bbox[1] as f64, bbox[2] as f64, bbox[3] as f64]);
        Self {
            size,
            rotate: 0,
            imaging_box,
        }
    }
}

/// Points to pixels, rounding half up.
fn to_pixels(points: f64, dpi: u32) -> u32 {
    (points * dpi as f64 / POINTS_PER_INCH + 0.5) as u32
}

fn round_points(points: f64) -> u32 {
    (points.max(0.0) + 0.5) as u32
}

/// Work out the header, bitmap size and offset of page `page_number`
/// (1-based).
pub fn resolve_geometry(
    ctx: &DocumentContext<'_>,
    page_number: u32,
    request: &PageRequest,
) -> Result<PagePlan> {
    let mut size = request.size;
    if request.rotate % 180 == 90 {
        size.swap(0, 1);
    }
    if !(size[0] > 0.0 && size[1] > 0.0) {
        return Err(RasterError::PageSizeMismatch(format!(
            "page {page_number} declares no page size"
        )));
    }

    let options = ctx.options;
    let requested = options.page_size.as_deref();
    let matched = ctx.ppd.and_then(|ppd| ppd.matched_page_size(requested, size));
    let (paper, mut margins, full_bleed, name) = match matched {
        Some(found) => (
            [found.width, found.length],
            found.margins,
            found.full_bleed || options.full_bleed,
            found.name,
        ),
        None => {
            let bbox = options
                .imageable_area
                .map(|b| b.map(f64::from))
                .or(request.imaging_box);
            let margins = bbox.map_or([0.0; 4], |b| {
                [b[0], b[1], size[0] - b[2], size[1] - b[3]].map(|m| m.max(0.0))
            });
            (size, margins, options.full_bleed, requested.unwrap_or_default().to_string())
        }
    };
    if margins[0] + margins[2] >= paper[0] || margins[1] + margins[3] >= paper[1] {
        return Err(RasterError::PageSizeMismatch(format!(
            "margins {margins:?} leave nothing of a {}x{} pt sheet",
            paper[0], paper[1]
        )));
    }

    let back_side = ctx.template.duplex && page_number % 2 == 0;
    let mut margins_swapped = false;
    if back_side {
        if ctx.swap.swap_margin_x {
            margins.swap(0, 2);
            margins_swapped = true;
        }
        if ctx.swap.swap_margin_y {
            margins.swap(1, 3);
            margins_swapped = true;
        }
    }

    let res = ctx.template.hw_resolution;
    let sheet = [to_pixels(paper[0], res[0]), to_pixels(paper[1], res[1])];
    let (width, height, offset) = if full_bleed {
        (sheet[0], sheet[1], [0, 0])
    } else {
        (
            to_pixels(paper[0] - margins[0] - margins[2], res[0]),
            to_pixels(paper[1] - margins[1] - margins[3], res[1]),
            [to_pixels(margins[0], res[0]), to_pixels(margins[3], res[1])],
        )
    };
    if width == 0 || height == 0 {
        return Err(RasterError::PageSizeMismatch(format!(
            "page {page_number} has no pixels at {}x{} dpi",
            res[0], res[1]
        )));
    }

    let mut header = ctx.template.clone();
    header.page_size = [round_points(paper[0]), round_points(paper[1])];
    header.margins = [round_points(margins[0]), round_points(margins[1])];
    header.imaging_bbox = [
        round_points(margins[0]),
        round_points(margins[1]),
        round_points(paper[0] - margins[2]),
        round_points(paper[1] - margins[3]),
    ];
    header.page_size_name = name;
    header.width = width;
    header.height = height;
    header.update_derived();
    header.sync_float_fields();

    let size_option = match ctx.ppd {
        Some(ppd) if ppd.requires_page_region() => SizeOption::PageRegion,
        _ => SizeOption::PageSize,
    };
    debug!(
        page = page_number,
        width,
        height,
        offset_x = offset[0],
        offset_y = offset[1],
        back_side,
        margins_swapped,
        "page geometry resolved"
    );
    Ok(PagePlan {
        header,
        offset,
        sheet,
        margins_swapped,
        back_side,
        size_option,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobData;
    use crate::printer::{PaperSize, PrinterDescription};
    use rasterwerk_core::{JobOptions, RasterFormat};

    const ALL: SwapFlags = SwapFlags {
        swap_image_x: true,
        swap_image_y: true,
        swap_margin_x: true,
        swap_margin_y: true,
    };
    const NONE: SwapFlags = SwapFlags {
        swap_image_x: false,
        swap_image_y: false,
        swap_margin_x: false,
        swap_margin_y: false,
    };
    const X_ONLY: SwapFlags = SwapFlags {
        swap_image_x: true,
        swap_image_y: false,
        swap_margin_x: true,
        swap_margin_y: false,
    };
    const Y_ONLY: SwapFlags = SwapFlags {
        swap_image_x: false,
        swap_image_y: true,
        swap_margin_x: false,
        swap_margin_y: true,
    };

    #[test]
    fn backside_truth_table() {
        use BacksideConvention::*;
        let cases = [
            (None, false, NONE),
            (None, true, NONE),
            (Rotated, false, ALL),
            (Rotated, true, NONE),
            (ManualTumble, true, ALL),
            (ManualTumble, false, NONE),
            (Flipped, true, X_ONLY),
            (Flipped, false, Y_ONLY),
        ];
        for (convention, tumble, want) in cases {
            assert_eq!(
                SwapFlags::for_job(true, tumble, convention, Option::None),
                want,
                "{convention:?} tumble={tumble}"
            );
        }
    }

    #[test]
    fn simplex_never_swaps() {
        for convention in [
            BacksideConvention::Rotated,
            BacksideConvention::Flipped,
            BacksideConvention::ManualTumble,
        ] {
            assert_eq!(SwapFlags::for_job(false, false, convention, Some(false)), NONE);
        }
    }

    #[test]
    fn flipped_margin_attribute() {
        let rotated = SwapFlags::for_job(true, false, BacksideConvention::Rotated, Some(true));
        assert!(rotated.swap_margin_x && !rotated.swap_margin_y);
        assert!(rotated.swap_image_y);

        let flipped = SwapFlags::for_job(true, true, BacksideConvention::Flipped, Some(false));
        assert!(flipped.swap_margin_x && flipped.swap_margin_y);
        let flipped = SwapFlags::for_job(true, false, BacksideConvention::Flipped, Some(false));
        assert!(!flipped.swap_margin_y);
        assert!(flipped.swap_image_y);
    }

    fn letter_printer(convention: BacksideConvention) -> PrinterDescription {
        PrinterDescription {
            backside: convention,
            page_sizes: vec![PaperSize {
                name: "Letter".into(),
                width: 612.0,
                length: 792.0,
                margins: [18.0, 36.0, 9.0, 72.0],
                full_bleed: false,
            }],
            ..PrinterDescription::default()
        }
    }

    fn letter_request() -> PageRequest {
        PageRequest {
            size: [612.0, 792.0],
            rotate: 0,
            imaging_box: Option::None,
        }
    }

    #[test]
    fn printer_margins_give_bitmap_and_offset() {
        let job = JobData::new(JobOptions::default()).with_printer(letter_printer(BacksideConvention::None));
        let ctx = DocumentContext::new(&job, RasterFormat::Cups).unwrap();
        let plan = resolve_geometry(&ctx, 1, &letter_request()).unwrap();
        // (612 - 27) * 300 / 72 = 2437.5 -> 2438
        assert_eq!(plan.header.width, 2438);
        // (792 - 108) * 300 / 72 = 2850
        assert_eq!(plan.header.height, 2850);
        assert_eq!(plan.offset, [75, 300]);
        assert_eq!(plan.sheet, [2550, 3300]);
        assert_eq!(plan.header.page_size, [612, 792]);
        assert_eq!(plan.header.margins, [18, 36]);
        assert_eq!(plan.header.imaging_bbox, [18, 36, 603, 720]);
        assert_eq!(plan.header.bytes_per_line, 2438 * 3);
        assert_eq!(plan.header.page_size_name, "Letter");
        assert!(!plan.back_side);
    }

    #[test]
    fn rotated_back_side_swaps_both_margins() {
        let options = JobOptions {
            duplex: true,
            ..JobOptions::default()
        };
        let job = JobData::new(options).with_printer(letter_printer(BacksideConvention::Rotated));
        let ctx = DocumentContext::new(&job, RasterFormat::Cups).unwrap();
        let front = resolve_geometry(&ctx, 1, &letter_request()).unwrap();
        let back = resolve_geometry(&ctx, 2, &letter_request()).unwrap();
        assert!(!front.margins_swapped);
        assert!(back.back_side && back.margins_swapped);
        assert_eq!(back.header.margins, [9, 72]);
        // Left margin now 9 pt, top margin 36 pt.
        assert_eq!(back.offset, [38, 150]);
        assert_eq!(back.header.width, front.header.width);
    }

    #[test]
    fn flipped_long_edge_swaps_only_vertical_margins() {
        let options = JobOptions {
            duplex: true,
            ..JobOptions::default()
        };
        let job = JobData::new(options).with_printer(letter_printer(BacksideConvention::Flipped));
        let ctx = DocumentContext::new(&job, RasterFormat::Cups).unwrap();
        let back = resolve_geometry(&ctx, 2, &letter_request()).unwrap();
        assert_eq!(back.header.margins, [18, 72]);
        assert_eq!(back.offset, [75, 150]);
    }

    #[test]
    fn without_printer_the_declared_box_is_used() {
        let job = JobData::new(JobOptions::default());
        let ctx = DocumentContext::new(&job, RasterFormat::Cups).unwrap();
        let request = PageRequest {
            size: [72.0, 144.0],
            rotate: 90,
            imaging_box: Option::None,
        };
        let plan = resolve_geometry(&ctx, 1, &request).unwrap();
        assert_eq!((plan.header.width, plan.header.height), (600, 300));
        assert_eq!(plan.offset, [0, 0]);
        assert_eq!(plan.header.margins, [0, 0]);

        let boxed = PageRequest {
            size: [144.0, 144.0],
            rotate: 0,
            imaging_box: Some([36.0, 36.0, 108.0, 108.0]),
        };
        let plan = resolve_geometry(&ctx, 1, &boxed).unwrap();
        assert_eq!((plan.header.width, plan.header.height), (300, 300));
        assert_eq!(plan.offset, [150, 150]);
    }

    #[test]
    fn full_bleed_starts_at_the_sheet_corner() {
        let options = JobOptions {
            full_bleed: true,
            ..JobOptions::default()
        };
        let job = JobData::new(options).with_printer(letter_printer(BacksideConvention::None));
        let ctx = DocumentContext::new(&job, RasterFormat::Cups).unwrap();
        let plan = resolve_geometry(&ctx, 1, &letter_request()).unwrap();
        assert_eq!(plan.offset, [0, 0]);
        assert_eq!([plan.header.width, plan.header.height], plan.sheet);
        assert_eq!(plan.header.margins, [18, 36]);
    }

    #[test]
    fn impossible_sizes_are_rejected() {
        let job = JobData::new(JobOptions::default());
        let ctx = DocumentContext::new(&job, RasterFormat::Cups).unwrap();
        let empty = PageRequest {
            size: [0.0, 792.0],
            rotate: 0,
            imaging_box: Option::None,
        };
        assert!(matches!(
            resolve_geometry(&ctx, 1, &empty),
            Err(RasterError::PageSizeMismatch(_))
        ));
    }

    #[test]
    fn raster_request_falls_back_to_pixel_size() {
        let header = PageHeader {
            width: 600,
            height: 300,
            hw_resolution: [300, 150],
            page_size: [0, 0],
            ..PageHeader::default()
        };
        let request = PageRequest::from_raster(&header);
        assert_eq!(request.size, [144.0, 144.0]);
        assert_eq!(request.imaging_box, Option::None);
    }
}
