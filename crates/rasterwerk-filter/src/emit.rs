// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page emission and the page loop both filters share.
//
// For every page: wait for the source (`PageSupply::emit_next`), render or
// read it, convert its lines with the job's line converter and write them.
// The loop ends at the end of input, on cancellation, or on a failed page.
// A failed first page fails the job; a later one ends the job with the
// pages written so far. Output stream failures are always fatal.
//
// Pages stream straight to the output, so a page that fails after its
// header went out cannot be taken back. Its missing lines are written
// blank and the page stays in the stream: readers see one more page than
// `FilterOutcome::pages` counts.

use std::io::Write;

use rasterwerk_core::{ErrorClass, Result};
use rasterwerk_raster::{LineConverter, LineSource, RasterWriter};
use tracing::{debug, instrument};

use crate::collab::ErrorSink;
use crate::context::{DocumentContext, PagePlan};
use crate::job::{FilterOutcome, JobData, JobSink, LogLevel};

/// A filter's source of pages.
pub trait PageSupply {
    /// Produce page `page_number` (1-based) and write it to `writer`.
    /// `Ok(false)` once the input has no more pages.
    fn emit_next<W: Write>(
        &mut self,
        ctx: &mut DocumentContext<'_>,
        page_number: u32,
        writer: &mut RasterWriter<W>,
        sink: &dyn ErrorSink,
    ) -> Result<bool>;
}

/// Write one page: its header, then `height` converted lines per plane.
///
/// `source` yields pivot lines of the page width. Lines it cannot supply
/// are white. Back sides with a vertical image swap are walked bottom to
/// top, and planar output walks the page once per plane; both buffer the
/// page, everything else streams line by line.
pub fn emit_page<S: LineSource, W: Write>(
    ctx: &DocumentContext<'_>,
    converter: &LineConverter<'_>,
    plan: &PagePlan,
    source: &mut S,
    writer: &mut RasterWriter<W>,
) -> Result<()> {
    let header = &plan.header;
    let (width, height) = (header.width, header.height);
    let pivot = converter.pivot();
    let white = pivot.white();
    let in_len = pivot.line_bytes(width);
    let mut src = vec![white; in_len.max(converter.line_bytes())];
    let mut scratch = if ctx.alloc_line_buf {
        vec![0u8; converter.line_bytes()]
    } else {
        Vec::new()
    };
    let even = plan.back_side;
    let reverse = plan.back_side && ctx.swap.swap_image_y;
    let planes = header.num_planes();

    writer.write_header(header)?;

    if reverse || planes > 1 {
        let mut page = vec![white; in_len * height as usize];
        for line in page.chunks_exact_mut(in_len) {
            if !source.next_line(line)? {
                break;
            }
        }
        for plane in 0..planes {
            for y in 0..height {
                let sy = if reverse { height - 1 - y } else { y } as usize;
                src[..in_len].copy_from_slice(&page[sy * in_len..(sy + 1) * in_len]);
                let out = converter.convert(even, &mut src, &mut scratch, y, plane, width);
                writer.write_pixels(out)?;
            }
        }
    } else {
        let mut exhausted = false;
        for y in 0..height {
            if !exhausted && !source.next_line(&mut src[..in_len])? {
                exhausted = true;
                debug!(line = y, "source ended early, filling with white");
            }
            if exhausted {
                src.fill(white);
            }
            let out = converter.convert(even, &mut src, &mut scratch, y, 0, width);
            writer.write_pixels(out)?;
        }
    }
    debug!(width, height, planes, reverse, "page written");
    Ok(())
}

/// Run the page loop to the end and close the output stream.
///
/// The page count in the outcome covers completed pages only. A page cut
/// short by a page-scoped error is padded to its declared height and left
/// in the stream after them.
#[instrument(skip_all)]
pub fn run_pages<P: PageSupply, W: Write>(
    supply: &mut P,
    ctx: &mut DocumentContext<'_>,
    mut writer: RasterWriter<W>,
    job: &JobData,
) -> FilterOutcome {
    let sink = JobSink(job);
    let mut pages = 0u32;
    let mut stopped: Option<FilterOutcome> = None;

    loop {
        if job.is_canceled() {
            job.log(LogLevel::Info, &format!("job canceled after {pages} pages"));
            stopped = Some(FilterOutcome::Canceled { pages });
            break;
        }
        let page_number = pages + 1;
        match supply.emit_next(ctx, page_number, &mut writer, &sink) {
            Ok(true) => {
                pages = page_number;
                job.log(LogLevel::Debug, &format!("page {page_number} written"));
            }
            Ok(false) => break,
            Err(err) => {
                job.log(LogLevel::Error, &format!("page {page_number} failed: {err}"));
                let fatal = err.class() == ErrorClass::Resource;
                if !fatal && writer.lines_remaining() > 0 {
                    // Keep the stream framing intact for the pages before.
                    match writer.pad_page() {
                        Ok(lines) => job.log(
                            LogLevel::Warn,
                            &format!("page {page_number} padded with {lines} blank lines"),
                        ),
                        Err(pad) => {
                            job.log(LogLevel::Error, &format!("cannot pad page {page_number}: {pad}"));
                        }
                    }
                }
                stopped = Some(if fatal || pages == 0 {
                    FilterOutcome::Failed {
                        error: err.to_string(),
                    }
                } else {
                    FilterOutcome::PartialFailure {
                        pages,
                        error: err.to_string(),
                    }
                });
                break;
            }
        }
    }
    ctx.finish();

    let outcome = stopped.unwrap_or(FilterOutcome::Success { pages });
    let close = match &outcome {
        // Nothing usable left to frame.
        FilterOutcome::Failed { .. } => writer.started() && writer.lines_remaining() == 0,
        _ => true,
    };
    if close {
        if let Err(err) = writer.finish() {
            job.log(LogLevel::Error, &format!("cannot finish output stream: {err}"));
            return FilterOutcome::Failed {
                error: err.to_string(),
            };
        }
    }
    job.log(LogLevel::Info, &format!("{outcome}"));
    outcome
}
