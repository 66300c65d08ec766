// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end runs of both filters over in-memory streams.

use std::cell::Cell;
use std::io::Cursor;
use std::path::PathBuf;
use std::rc::Rc;

use rasterwerk_core::{ColorSpace, JobOptions, PageHeader, RasterError, RasterFormat, Result};
use rasterwerk_document::{PageGeometry, PageRenderer, PixelLayout, RenderRequest, RenderedPage};
use rasterwerk_filter::pdf_to_raster::render_pages;
use rasterwerk_filter::printer::PrinterDescription;
use rasterwerk_filter::{
    run_filter, BacksideConvention, ColorManager, ErrorSink, FilterOutcome, IccEngine, JobData,
    ProfileTarget, TransformRequest,
};
use rasterwerk_raster::stream::HEADER_SIZE;
use rasterwerk_raster::{ColorTransform, RasterReader, RasterWriter};

/// A raster stream of `pages`, each line `y` of page `p` produced by `line(p, y)`.
fn raster_input(
    format: RasterFormat,
    header: &PageHeader,
    pages: u32,
    line: impl Fn(u32, u32) -> Vec<u8>,
) -> Vec<u8> {
    let mut writer = RasterWriter::new(Vec::new(), format, pages);
    for p in 0..pages {
        writer.write_header(header).unwrap();
        for y in 0..header.height {
            writer.write_pixels(&line(p, y)).unwrap();
        }
    }
    writer.finish().unwrap()
}

fn gray_header(width: u32, height: u32, dpi: u32) -> PageHeader {
    let mut h = PageHeader {
        color_space: ColorSpace::Sw,
        bits_per_color: 8,
        width,
        height,
        hw_resolution: [dpi, dpi],
        page_size: [width * 72 / dpi, height * 72 / dpi],
        ..PageHeader::default()
    };
    h.update_derived();
    h
}

/// Every page of an output stream, as its header and lines.
fn read_pages(bytes: &[u8]) -> Vec<(PageHeader, Vec<Vec<u8>>)> {
    let mut reader = RasterReader::open(Cursor::new(bytes)).unwrap();
    let mut pages = Vec::new();
    while let Some(header) = reader.read_header().unwrap() {
        let mut lines = Vec::new();
        for _ in 0..header.height * header.num_planes() {
            let mut line = vec![0u8; header.bytes_per_line as usize];
            reader.read_pixels(&mut line).unwrap();
            lines.push(line);
        }
        pages.push((header, lines));
    }
    pages
}

#[test]
fn pwg_srgb_becomes_cups_cmyk() {
    let mut input = PageHeader {
        color_space: ColorSpace::Srgb,
        bits_per_color: 8,
        width: 300,
        height: 300,
        hw_resolution: [300, 300],
        page_size: [72, 72],
        ..PageHeader::default()
    };
    input.update_derived();
    let bytes = raster_input(RasterFormat::Pwg, &input, 1, |_, _| vec![0xff; 900]);

    let job = JobData::new(JobOptions {
        color_space: ColorSpace::Cmyk,
        ..JobOptions::default()
    });
    let mut out = Vec::new();
    let outcome = run_filter(Cursor::new(bytes), &mut out, false, &job, RasterFormat::Cups);
    assert_eq!(outcome, FilterOutcome::Success { pages: 1 });
    assert_eq!(&out[..4], b"RaS3");

    let pages = read_pages(&out);
    assert_eq!(pages.len(), 1);
    let (header, lines) = &pages[0];
    assert_eq!(header.bits_per_pixel, 32);
    assert_eq!(header.bytes_per_line, 1200);
    assert_eq!((header.width, header.height), (300, 300));
    // White RGB carries no ink.
    assert!(lines.iter().all(|l| l.iter().all(|&b| b == 0)));
}

#[test]
fn zero_page_jobs_write_only_the_sync_word() {
    let job = JobData::new(JobOptions::default());

    let mut out = Vec::new();
    let outcome = run_filter(std::io::empty(), &mut out, false, &job, RasterFormat::Cups);
    assert_eq!(outcome, FilterOutcome::Success { pages: 0 });
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(out, b"RaS3");

    let mut out = Vec::new();
    let outcome = run_filter(Cursor::new(b"RaS2".to_vec()), &mut out, false, &job, RasterFormat::Pwg);
    assert_eq!(outcome, FilterOutcome::Success { pages: 0 });
    assert_eq!(out, b"RaS2");
}

#[test]
fn doubling_the_resolution_doubles_both_axes() {
    let input = gray_header(100, 50, 300);
    let bytes = raster_input(RasterFormat::Cups, &input, 1, |_, _| (0..100).map(|x| x as u8).collect());

    let job = JobData::new(JobOptions {
        color_space: ColorSpace::Sw,
        resolution: [600, 600],
        ..JobOptions::default()
    });
    let mut out = Vec::new();
    let outcome = run_filter(Cursor::new(bytes), &mut out, false, &job, RasterFormat::Cups);
    assert_eq!(outcome, FilterOutcome::Success { pages: 1 });

    let pages = read_pages(&out);
    let (header, lines) = &pages[0];
    assert_eq!((header.width, header.height), (200, 100));
    assert_eq!(header.hw_resolution, [600, 600]);
    for pair in lines.chunks(2) {
        assert_eq!(pair[0], pair[1]);
    }
    for x in 0..100usize {
        assert_eq!(lines[0][2 * x], x as u8);
        assert_eq!(lines[0][2 * x + 1], x as u8);
    }
}

#[test]
fn flipped_back_sides_run_bottom_to_top() {
    let input = gray_header(4, 4, 72);
    let bytes = raster_input(RasterFormat::Cups, &input, 2, |_, y| vec![y as u8 * 10; 4]);

    let job = JobData::new(JobOptions {
        color_space: ColorSpace::Sw,
        resolution: [72, 72],
        duplex: true,
        ..JobOptions::default()
    })
    .with_printer(PrinterDescription {
        backside: BacksideConvention::Flipped,
        ..PrinterDescription::default()
    });
    let mut out = Vec::new();
    let outcome = run_filter(Cursor::new(bytes), &mut out, false, &job, RasterFormat::Cups);
    assert_eq!(outcome, FilterOutcome::Success { pages: 2 });

    let pages = read_pages(&out);
    let firsts: Vec<u8> = pages[0].1.iter().map(|l| l[0]).collect();
    let seconds: Vec<u8> = pages[1].1.iter().map(|l| l[0]).collect();
    assert_eq!(firsts, [0, 10, 20, 30]);
    assert_eq!(seconds, [30, 20, 10, 0]);
}

#[test]
fn cancellation_stops_between_pages() {
    let input = gray_header(8, 8, 72);
    let bytes = raster_input(RasterFormat::Cups, &input, 3, |_, _| vec![0x80; 8]);

    let polls = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&polls);
    let job = JobData::new(JobOptions {
        color_space: ColorSpace::Sw,
        resolution: [72, 72],
        ..JobOptions::default()
    })
    .with_cancel(move || {
        counter.set(counter.get() + 1);
        counter.get() > 1
    });
    let mut out = Vec::new();
    let outcome = run_filter(Cursor::new(bytes), &mut out, false, &job, RasterFormat::Cups);
    assert_eq!(outcome, FilterOutcome::Canceled { pages: 1 });
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(read_pages(&out).len(), 1);
}

#[test]
fn configuration_errors_write_nothing() {
    let job = JobData::new(JobOptions {
        color_space: ColorSpace::Cmyk,
        bits_per_color: 16,
        ..JobOptions::default()
    });
    let mut out = Vec::new();
    let outcome = run_filter(Cursor::new(b"RaS3".to_vec()), &mut out, false, &job, RasterFormat::Apple);
    assert!(matches!(outcome, FilterOutcome::Failed { .. }));
    assert_eq!(outcome.exit_code(), 1);
    assert!(out.is_empty());
}

#[test]
fn a_stream_cut_inside_a_later_page_keeps_the_earlier_ones() {
    let input = gray_header(8, 8, 72);
    let mut bytes = raster_input(RasterFormat::Cups, &input, 2, |_, y| vec![y as u8 * 10; 8]);
    let page_bytes = HEADER_SIZE + 64;
    // Page 2 stops two and a half lines into its pixels.
    bytes.truncate(4 + page_bytes + HEADER_SIZE + 20);

    let job = JobData::new(JobOptions {
        color_space: ColorSpace::Sw,
        resolution: [72, 72],
        ..JobOptions::default()
    });
    let mut out = Vec::new();
    let outcome = run_filter(Cursor::new(bytes), &mut out, false, &job, RasterFormat::Cups);
    assert!(
        matches!(outcome, FilterOutcome::PartialFailure { pages: 1, .. }),
        "{outcome}"
    );
    assert_eq!(outcome.exit_code(), 1);

    let pages = read_pages(&out);
    let firsts: Vec<u8> = pages[0].1.iter().map(|l| l[0]).collect();
    assert_eq!(firsts, [0, 10, 20, 30, 40, 50, 60, 70]);
    // The cut page is padded white to its declared height.
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1].1.len(), 8);
    assert_eq!(pages[1].1[0], vec![0; 8]);
    assert_eq!(pages[1].1[7], vec![0xff; 8]);
}

/// A gray page header claiming one byte per line at 300 pixels wide.
fn short_line_header() -> PageHeader {
    let mut h = gray_header(300, 4, 300);
    h.bytes_per_line = 1;
    h
}

#[test]
fn headers_with_short_lines_fail_the_job() {
    let bytes = raster_input(RasterFormat::Cups, &short_line_header(), 1, |_, _| vec![0x80]);

    let job = JobData::new(JobOptions {
        color_space: ColorSpace::Sw,
        ..JobOptions::default()
    });
    let mut out = Vec::new();
    let outcome = run_filter(Cursor::new(bytes), &mut out, false, &job, RasterFormat::Cups);
    assert!(matches!(outcome, FilterOutcome::Failed { .. }), "{outcome}");
    assert!(out.is_empty());
}

#[test]
fn a_later_header_with_short_lines_ends_the_job() {
    let good = gray_header(300, 4, 300);
    let mut writer = RasterWriter::new(Vec::new(), RasterFormat::Cups, 2);
    writer.write_header(&good).unwrap();
    for _ in 0..4 {
        writer.write_pixels(&[0x80; 300]).unwrap();
    }
    writer.write_header(&short_line_header()).unwrap();
    for _ in 0..4 {
        writer.write_pixels(&[0x80]).unwrap();
    }
    let bytes = writer.finish().unwrap();

    let job = JobData::new(JobOptions {
        color_space: ColorSpace::Sw,
        ..JobOptions::default()
    });
    let mut out = Vec::new();
    let outcome = run_filter(Cursor::new(bytes), &mut out, false, &job, RasterFormat::Cups);
    assert!(
        matches!(outcome, FilterOutcome::PartialFailure { pages: 1, .. }),
        "{outcome}"
    );
    let pages = read_pages(&out);
    assert_eq!(pages.len(), 1);
    assert!(pages[0].1.iter().all(|l| l.iter().all(|&b| b == 0x80)));
}

/// Blank pages of one square inch; `fail_on` fails that page index.
struct FakeRenderer {
    pages: usize,
    fail_on: Option<usize>,
    renders: Vec<usize>,
}

impl PageRenderer for FakeRenderer {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn page_geometry(&self, _index: usize) -> Result<PageGeometry> {
        Ok(PageGeometry {
            media_box: [0.0, 0.0, 72.0, 72.0],
            crop_box: [0.0, 0.0, 72.0, 72.0],
            rotate: 0,
        })
    }

    fn render_page(&mut self, request: &RenderRequest) -> Result<RenderedPage> {
        self.renders.push(request.index);
        if self.fail_on == Some(request.index) {
            return Err(RasterError::Render(format!("page {} is broken", request.index)));
        }
        let channels = match request.layout {
            PixelLayout::Gray8 => 1,
            PixelLayout::Rgb8 => 3,
        };
        Ok(RenderedPage {
            width: request.width,
            height: request.height,
            layout: request.layout,
            data: vec![0xff; (request.width * request.height) as usize * channels],
        })
    }
}

#[test]
fn a_failed_later_page_keeps_the_earlier_ones() {
    let mut renderer = FakeRenderer {
        pages: 3,
        fail_on: Some(1),
        renders: Vec::new(),
    };
    let job = JobData::new(JobOptions::default());
    let mut out = Vec::new();
    let outcome = render_pages(&mut renderer, &mut out, &job, RasterFormat::Pwg);

    assert!(matches!(outcome, FilterOutcome::PartialFailure { pages: 1, .. }));
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(renderer.renders, [0, 1]);
    let pages = read_pages(&out);
    assert_eq!(pages.len(), 1);
    assert_eq!((pages[0].0.width, pages[0].0.height), (300, 300));
}

#[test]
fn a_failed_first_page_fails_the_job() {
    let mut renderer = FakeRenderer {
        pages: 2,
        fail_on: Some(0),
        renders: Vec::new(),
    };
    let job = JobData::new(JobOptions::default());
    let mut out = Vec::new();
    let outcome = render_pages(&mut renderer, &mut out, &job, RasterFormat::Cups);
    assert!(matches!(outcome, FilterOutcome::Failed { .. }));
    assert_eq!(renderer.renders, [0]);
    assert!(out.is_empty());
}

#[test]
fn bi_level_pdf_pages_are_one_bit() {
    let mut renderer = FakeRenderer {
        pages: 1,
        fail_on: None,
        renders: Vec::new(),
    };
    let job = JobData::new(JobOptions {
        color_mode: rasterwerk_core::ColorMode::BiLevel,
        ..JobOptions::default()
    });
    let mut out = Vec::new();
    let outcome = render_pages(&mut renderer, &mut out, &job, RasterFormat::Cups);
    assert_eq!(outcome, FilterOutcome::Success { pages: 1 });

    let pages = read_pages(&out);
    let (header, lines) = &pages[0];
    assert_eq!(header.bits_per_pixel, 1);
    assert_eq!(header.bytes_per_line, 300u32.div_ceil(8));
    // White paper in a black-is-one colour space.
    assert!(lines.iter().all(|l| l.iter().all(|&b| b == 0)));
}

/// One-page renderer whose page is black on its left half; keeps every
/// request it gets.
struct HalfInkRenderer {
    requests: Vec<RenderRequest>,
}

impl PageRenderer for HalfInkRenderer {
    fn page_count(&self) -> usize {
        1
    }

    fn page_geometry(&self, _index: usize) -> Result<PageGeometry> {
        Ok(PageGeometry {
            media_box: [0.0, 0.0, 72.0, 72.0],
            crop_box: [0.0, 0.0, 72.0, 72.0],
            rotate: 0,
        })
    }

    fn render_page(&mut self, request: &RenderRequest) -> Result<RenderedPage> {
        self.requests.push(*request);
        assert_eq!(request.layout, PixelLayout::Gray8);
        let line: Vec<u8> = (0..request.width)
            .map(|x| if x < request.width / 2 { 0x00 } else { 0xff })
            .collect();
        Ok(RenderedPage {
            width: request.width,
            height: request.height,
            layout: request.layout,
            data: line.repeat(request.height as usize),
        })
    }
}

#[test]
fn one_bit_pages_render_eight_times_wider() {
    let mut renderer = HalfInkRenderer { requests: Vec::new() };
    let job = JobData::new(JobOptions {
        color_mode: rasterwerk_core::ColorMode::BiLevel,
        ..JobOptions::default()
    });
    let mut out = Vec::new();
    let outcome = render_pages(&mut renderer, &mut out, &job, RasterFormat::Cups);
    assert_eq!(outcome, FilterOutcome::Success { pages: 1 });

    let request = renderer.requests[0];
    assert_eq!((request.xres, request.yres), (2400, 300));
    assert_eq!((request.width, request.height), (2400, 300));

    let pages = read_pages(&out);
    let (header, lines) = &pages[0];
    assert_eq!(header.width, 300);
    // Pixels 0..150 are black (1 in K), the rest white.
    let mut expected = vec![0u8; 38];
    expected[..18].fill(0xff);
    expected[18] = 0b1111_1100;
    assert!(lines.iter().all(|l| *l == expected));
}

/// Profile lookups that always answer with one CMYK profile.
struct OneProfile;

impl ColorManager for OneProfile {
    fn is_cm_disabled(&self) -> bool {
        false
    }

    fn icc_profile_path(&self, color_space: ColorSpace, _media: &str, _res: [u32; 2]) -> Option<PathBuf> {
        (color_space == ColorSpace::Cmyk).then(|| PathBuf::from("/profiles/press.icc"))
    }
}

struct FixedInk;

impl ColorTransform for FixedInk {
    fn apply(&self, _src: &[u8], dst: &mut [u8]) {
        dst[..4].copy_from_slice(&[1, 2, 3, 4]);
    }

    fn apply_lab(&self, _src: &[u8]) -> [f64; 3] {
        [50.0, 0.0, 0.0]
    }
}

/// Counts the transforms it builds.
struct CountingEngine(Rc<Cell<u32>>);

impl IccEngine for CountingEngine {
    fn create_transform(&self, request: &TransformRequest, _sink: &dyn ErrorSink) -> Result<Box<dyn ColorTransform>> {
        assert_eq!(request.target, ProfileTarget::File(PathBuf::from("/profiles/press.icc")));
        self.0.set(self.0.get() + 1);
        Ok(Box::new(FixedInk))
    }
}

#[test]
fn the_colour_transform_is_built_once_per_job() {
    let builds = Rc::new(Cell::new(0));
    let mut renderer = FakeRenderer {
        pages: 2,
        fail_on: None,
        renders: Vec::new(),
    };
    let job = JobData::new(JobOptions {
        color_space: ColorSpace::Cmyk,
        ..JobOptions::default()
    })
    .with_color_manager(OneProfile)
    .with_icc_engine(CountingEngine(Rc::clone(&builds)));
    let mut out = Vec::new();
    let outcome = render_pages(&mut renderer, &mut out, &job, RasterFormat::Cups);
    assert_eq!(outcome, FilterOutcome::Success { pages: 2 });
    assert_eq!(builds.get(), 1);

    let pages = read_pages(&out);
    assert_eq!(&pages[1].1[0][..8], &[1, 2, 3, 4, 1, 2, 3, 4]);
}

#[test]
fn lab_output_uses_the_builtin_engine() {
    let mut renderer = FakeRenderer {
        pages: 1,
        fail_on: None,
        renders: Vec::new(),
    };
    let job = JobData::new(JobOptions {
        color_space: ColorSpace::CieLab,
        ..JobOptions::default()
    });
    let mut out = Vec::new();
    let outcome = render_pages(&mut renderer, &mut out, &job, RasterFormat::Cups);
    assert_eq!(outcome, FilterOutcome::Success { pages: 1 });

    let pages = read_pages(&out);
    let (header, lines) = &pages[0];
    assert_eq!(header.bits_per_pixel, 24);
    // White paper is L* 100.
    assert!(lines[0][0] >= 254);
}

#[test]
fn failing_colour_engines_fail_the_job() {
    struct Broken;
    impl IccEngine for Broken {
        fn create_transform(&self, _request: &TransformRequest, sink: &dyn ErrorSink) -> Result<Box<dyn ColorTransform>> {
            sink.report("profile is unreadable");
            Err(RasterError::ColorManagement("profile is unreadable".into()))
        }
    }

    let reports = Rc::new(Cell::new(0u32));
    let seen = Rc::clone(&reports);
    let mut renderer = FakeRenderer {
        pages: 1,
        fail_on: None,
        renders: Vec::new(),
    };
    let job = JobData::new(JobOptions {
        color_space: ColorSpace::Cmyk,
        ..JobOptions::default()
    })
    .with_color_manager(OneProfile)
    .with_icc_engine(Broken)
    .with_log(move |_, message| {
        if message.contains("unreadable") {
            seen.set(seen.get() + 1);
        }
    });
    let mut out = Vec::new();
    let outcome = render_pages(&mut renderer, &mut out, &job, RasterFormat::Cups);
    assert!(matches!(outcome, FilterOutcome::Failed { .. }));
    assert!(renderer.renders.is_empty());
    assert!(reports.get() >= 2);
}
