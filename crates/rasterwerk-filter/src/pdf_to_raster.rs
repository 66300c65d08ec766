// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF to raster: render every page at the job resolution and push the
// pixels through the job's line conversion.

use std::io::{Read, Write};

use rasterwerk_core::{RasterFormat, Result};
use rasterwerk_document::{PageRenderer, PixelLayout, PopplerRenderer, RenderRequest, RenderedPage};
use rasterwerk_raster::pivot::finish_pivot_line;
use rasterwerk_raster::resample::window_line;
use rasterwerk_raster::{LineSource, PivotFormat, RasterWriter};
use tracing::{debug, instrument};

use crate::collab::ErrorSink;
use crate::context::DocumentContext;
use crate::emit::{emit_page, run_pages, PageSupply};
use crate::geometry::{resolve_geometry, PageRequest};
use crate::job::{FilterOutcome, JobData, LogLevel};

/// Horizontal oversampling of pages bound for 1-bit output. Each run of
/// this many gray samples becomes one output bit.
const MONO_OVERSAMPLE: u32 = 8;

/// Render `input` (a PDF document) into a raster stream on `output`.
///
/// A seekable input with a known path is rendered in place; anything else
/// is spooled to a temporary file first.
#[instrument(skip_all, fields(format = ?format))]
pub fn pdf_to_raster<R: Read, W: Write>(
    input: R,
    output: W,
    input_seekable: bool,
    job: &JobData,
    format: RasterFormat,
) -> FilterOutcome {
    let opened = match job.input_path() {
        Some(path) if input_seekable => PopplerRenderer::open(path),
        _ => PopplerRenderer::from_reader(input),
    };
    let renderer = match opened {
        Ok(r) => r,
        Err(err) => return FilterOutcome::failed(job, format!("cannot open PDF: {err}")),
    };
    let mut renderer = match job.pdftoppm() {
        Some(program) => renderer.with_program(program),
        None => renderer,
    };
    render_pages(&mut renderer, output, job, format)
}

/// Run the PDF filter over any [`PageRenderer`].
pub fn render_pages<W: Write>(
    renderer: &mut dyn PageRenderer,
    output: W,
    job: &JobData,
    format: RasterFormat,
) -> FilterOutcome {
    let mut ctx = match DocumentContext::new(job, format) {
        Ok(ctx) => ctx,
        Err(err) => return FilterOutcome::failed(job, err),
    };
    let count = renderer.page_count();
    job.log(LogLevel::Info, &format!("rendering {count} pages"));
    let writer = RasterWriter::new(output, format, count as u32);
    let mut pages = PdfPages {
        renderer,
        next: 0,
        count,
    };
    run_pages(&mut pages, &mut ctx, writer, job)
}

struct PdfPages<'r> {
    renderer: &'r mut dyn PageRenderer,
    next: usize,
    count: usize,
}

impl PageSupply for PdfPages<'_> {
    fn emit_next<W: Write>(
        &mut self,
        ctx: &mut DocumentContext<'_>,
        page_number: u32,
        writer: &mut RasterWriter<W>,
        sink: &dyn ErrorSink,
    ) -> Result<bool> {
        if self.next >= self.count {
            return Ok(false);
        }
        let index = self.next;
        self.next += 1;

        let geometry = self.renderer.page_geometry(index)?;
        let plan = resolve_geometry(ctx, page_number, &PageRequest::from_pdf(&geometry))?;
        ctx.prepare(sink)?;
        let converter = ctx.converter(&plan)?;
        let pivot = converter.pivot();
        let (layout, scale) = match pivot {
            PivotFormat::Rgb8 => (PixelLayout::Rgb8, 1),
            PivotFormat::Gray8 => (PixelLayout::Gray8, 1),
            PivotFormat::Mono1 => (PixelLayout::Gray8, MONO_OVERSAMPLE),
        };
        let request = RenderRequest {
            index,
            xres: plan.header.hw_resolution[0] * scale,
            yres: plan.header.hw_resolution[1],
            offset_x: plan.offset[0] * scale,
            offset_y: plan.offset[1],
            width: plan.header.width * scale,
            height: plan.header.height,
            layout,
        };
        debug!(page = page_number, ?request, "rendering");
        let rendered = self.renderer.render_page(&request)?;

        let mut lines = RenderedLines::new(&rendered, pivot, plan.header.width, scale, ctx.bi_level);
        emit_page(ctx, &converter, &plan, &mut lines, writer)?;
        Ok(true)
    }
}

/// Lines of a rendered page, cut to the bitmap width and brought to the
/// conversion pivot.
///
/// A page rendered `scale` times wider than the bitmap (gray only) is
/// brought back to the bitmap width by averaging each run of `scale`
/// samples before the threshold.
struct RenderedLines<'p> {
    page: &'p RenderedPage,
    from: PivotFormat,
    to: PivotFormat,
    width: u32,
    scale: u32,
    bi_level: bool,
    row: u32,
    work: Vec<u8>,
}

impl<'p> RenderedLines<'p> {
    fn new(page: &'p RenderedPage, to: PivotFormat, width: u32, scale: u32, bi_level: bool) -> Self {
        let from = match page.layout {
            PixelLayout::Gray8 => PivotFormat::Gray8,
            PixelLayout::Rgb8 => PivotFormat::Rgb8,
        };
        let scale = if from == PivotFormat::Gray8 { scale.max(1) } else { 1 };
        Self {
            page,
            from,
            to,
            width,
            scale,
            bi_level,
            row: 0,
            work: vec![from.white(); from.line_bytes(width * scale)],
        }
    }
}

/// Average each run of `scale` gray samples into `line[x]`, in place.
fn downsample_gray(line: &mut [u8], width: usize, scale: usize) {
    for x in 0..width {
        let run = &line[x * scale..(x + 1) * scale];
        let sum: usize = run.iter().map(|&v| v as usize).sum();
        line[x] = (sum / scale) as u8;
    }
}

impl LineSource for RenderedLines<'_> {
    fn next_line(&mut self, buf: &mut [u8]) -> Result<bool> {
        let Some(src) = self.page.line(self.row) else {
            return Ok(false);
        };
        window_line(src, self.page.width, &mut self.work, self.width * self.scale, 0, self.from);
        if self.scale > 1 {
            downsample_gray(&mut self.work, self.width as usize, self.scale as usize);
        }
        finish_pivot_line(&self.work, self.from, buf, self.to, self.width, self.row, self.bi_level);
        self.row += 1;
        Ok(true)
    }
}
