// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster to raster: read CUPS, PWG or Apple raster pages and re-encode them
// at the job's resolution, colour space and container.
//
// Each input line goes through a chain of stages: unpack into a working
// format, scale horizontally, scale vertically, stretch when slightly too
// small for the sheet, then cut to the printable bitmap and convert to the
// pivot the output conversion expects.

use std::io::{Read, Write};

use rasterwerk_core::{PageHeader, RasterError, RasterFormat, Result};
use rasterwerk_raster::pivot::finish_pivot_line;
use rasterwerk_raster::resample::{resample_line, window_line, OversprayRows};
use rasterwerk_raster::{
    InputConverter, InputLayout, LineSource, Overspray, PivotFormat, RasterReader, RasterWriter,
    ScaleRatio, VerticalResampler,
};
use tracing::{debug, instrument};

use crate::collab::ErrorSink;
use crate::context::DocumentContext;
use crate::emit::{emit_page, run_pages, PageSupply};
use crate::geometry::{resolve_geometry, PageRequest};
use crate::job::{FilterOutcome, JobData, LogLevel};

/// Re-encode the raster stream on `input` into `output`.
#[instrument(skip_all, fields(format = ?format))]
pub fn raster_to_raster<R: Read, W: Write>(
    input: R,
    output: W,
    job: &JobData,
    format: RasterFormat,
) -> FilterOutcome {
    let mut ctx = match DocumentContext::new(job, format) {
        Ok(ctx) => ctx,
        Err(err) => return FilterOutcome::failed(job, err),
    };
    let reader = match RasterReader::open(input) {
        Ok(reader) => Some(reader),
        // No bytes at all: a job without pages.
        Err(RasterError::ShortRead { actual: 0, .. }) => None,
        Err(err) => return FilterOutcome::failed(job, format!("cannot read raster input: {err}")),
    };
    let Some(reader) = reader else {
        job.log(LogLevel::Info, "empty input, writing an empty stream");
        let writer = RasterWriter::new(output, format, 0);
        ctx.finish();
        return match writer.finish() {
            Ok(_) => FilterOutcome::Success { pages: 0 },
            Err(err) => FilterOutcome::failed(job, err),
        };
    };
    job.log(
        LogLevel::Debug,
        &format!("raster input is {:?}", reader.format()),
    );
    let writer = RasterWriter::new(output, format, reader.declared_pages().unwrap_or(0));
    let mut pages = RasterPages { reader };
    run_pages(&mut pages, &mut ctx, writer, job)
}

struct RasterPages<R> {
    reader: RasterReader<R>,
}

impl<R: Read> PageSupply for RasterPages<R> {
    fn emit_next<W: Write>(
        &mut self,
        ctx: &mut DocumentContext<'_>,
        page_number: u32,
        writer: &mut RasterWriter<W>,
        sink: &dyn ErrorSink,
    ) -> Result<bool> {
        let Some(input) = self.reader.read_header()? else {
            return Ok(false);
        };
        let plan = resolve_geometry(ctx, page_number, &PageRequest::from_raster(&input))?;
        ctx.prepare(sink)?;
        let converter = ctx.converter(&plan)?;
        let pivot = converter.pivot();

        let layout = InputLayout::from_header(&input)?;
        let format = working_format(layout, pivot);
        let res = plan.header.hw_resolution;
        let ratio = [
            ScaleRatio::between(input.hw_resolution[0], res[0])?,
            ScaleRatio::between(input.hw_resolution[1], res[1])?,
        ];
        let scaled = [ratio[0].scale(input.width), ratio[1].scale(input.height)];
        let origin = placement(&input, res, scaled, plan.sheet);
        let overspray = match origin {
            Some(_) => None,
            None => Overspray::plan(scaled, plan.sheet)?,
        };
        let stretched = overspray.map_or(scaled[0], |o| o.stretched(scaled[0]));
        let origin = origin.unwrap_or([0, 0]);
        debug!(
            page = page_number,
            ?ratio,
            ?scaled,
            ?origin,
            ?overspray,
            ?format,
            "raster page chain"
        );

        let lines = InputLines {
            convert: InputConverter::new(layout, format, input.width, ctx.bi_level)?,
            raw: vec![0; input.bytes_per_line as usize],
            work: vec![format.white(); format.line_bytes(input.width)],
            scaled: vec![format.white(); format.line_bytes(scaled[0])],
            reader: &mut self.reader,
            format,
            width: input.width,
            ratio: ratio[0],
            overspray,
            rows_left: input.height,
            row: 0,
        };
        let vertical = VerticalResampler::new(lines, ratio[1], format, stretched);
        let source: Box<dyn LineSource + '_> = match overspray {
            Some(plan) => Box::new(OversprayRows::new(vertical, plan, format.line_bytes(stretched))),
            None => Box::new(vertical),
        };
        let offset = [
            plan.offset[0] as i64 - origin[0] as i64,
            plan.offset[1] as i64 - origin[1] as i64,
        ];
        let mut placed = PlacedLines {
            source,
            format,
            pivot,
            src_width: stretched,
            width: plan.header.width,
            offset,
            bi_level: ctx.bi_level,
            line: vec![format.white(); format.line_bytes(stretched)],
            placed: vec![format.white(); format.line_bytes(plan.header.width)],
            row: 0,
            skipped: false,
        };
        emit_page(ctx, &converter, &plan, &mut placed, writer)?;
        Ok(true)
    }
}

/// Format the resampling stages work in. 1-bit input stays 1-bit when the
/// output is 1-bit; gray outputs work in gray, everything else in RGB.
fn working_format(layout: InputLayout, pivot: PivotFormat) -> PivotFormat {
    match pivot {
        PivotFormat::Mono1 if layout.is_one_bit() => PivotFormat::Mono1,
        PivotFormat::Mono1 | PivotFormat::Gray8 => PivotFormat::Gray8,
        PivotFormat::Rgb8 => PivotFormat::Rgb8,
    }
}

/// Where an input bitmap that covers only the imageable area of its page
/// sits on the output sheet, in output pixels. `None` when the input
/// stands for the whole sheet.
fn placement(input: &PageHeader, res: [u32; 2], scaled: [u32; 2], sheet: [u32; 2]) -> Option<[u32; 2]> {
    let bbox = input.imaging_bbox;
    let page = input.page_size;
    let partial = bbox[2] > bbox[0]
        && bbox[3] > bbox[1]
        && bbox != [0, 0, page[0], page[1]]
        && (scaled[0] < sheet[0] || scaled[1] < sheet[1]);
    partial.then(|| {
        let px = |points: u32, dpi: u32| ((points as u64 * dpi as u64 * 2 + 72) / 144) as u32;
        [px(bbox[0], res[0]), px(page[1].saturating_sub(bbox[3]), res[1])]
    })
}

/// Input lines unpacked to the working format and scaled horizontally.
struct InputLines<'a, R> {
    reader: &'a mut RasterReader<R>,
    convert: InputConverter,
    raw: Vec<u8>,
    work: Vec<u8>,
    scaled: Vec<u8>,
    format: PivotFormat,
    width: u32,
    ratio: ScaleRatio,
    overspray: Option<Overspray>,
    rows_left: u32,
    row: u32,
}

impl<R: Read> LineSource for InputLines<'_, R> {
    fn next_line(&mut self, out: &mut [u8]) -> Result<bool> {
        if self.rows_left == 0 {
            return Ok(false);
        }
        self.reader.read_pixels(&mut self.raw)?;
        self.convert.convert(&self.raw, &mut self.work, self.row)?;
        match self.overspray {
            None => {
                resample_line(&self.work, out, self.width, self.format, self.ratio);
            }
            Some(plan) => {
                let pixels = resample_line(&self.work, &mut self.scaled, self.width, self.format, self.ratio);
                plan.stretch_line(&self.scaled, out, pixels, self.format);
            }
        }
        self.rows_left -= 1;
        self.row += 1;
        Ok(true)
    }
}

/// Cut the scaled image to the printable bitmap and convert to the pivot.
struct PlacedLines<'a> {
    source: Box<dyn LineSource + 'a>,
    format: PivotFormat,
    pivot: PivotFormat,
    src_width: u32,
    width: u32,
    /// Bitmap origin relative to the image origin; negative is white space.
    offset: [i64; 2],
    bi_level: bool,
    line: Vec<u8>,
    placed: Vec<u8>,
    row: u32,
    skipped: bool,
}

impl LineSource for PlacedLines<'_> {
    fn next_line(&mut self, out: &mut [u8]) -> Result<bool> {
        if !self.skipped {
            self.skipped = true;
            for _ in 0..self.offset[1].max(0) {
                if !self.source.next_line(&mut self.line)? {
                    break;
                }
            }
        }
        if (self.row as i64) + self.offset[1] < 0 {
            self.placed.fill(self.format.white());
        } else {
            if !self.source.next_line(&mut self.line)? {
                return Ok(false);
            }
            window_line(
                &self.line,
                self.src_width,
                &mut self.placed,
                self.width,
                self.offset[0],
                self.format,
            );
        }
        finish_pivot_line(&self.placed, self.format, out, self.pivot, self.width, self.row, self.bi_level);
        self.row += 1;
        Ok(true)
    }
}
