// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster stream writer.

use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};
use rasterwerk_core::{ColorOrder, PageHeader, RasterError, RasterFormat, Result};
use tracing::{debug, instrument};

use super::compress::{encode_group, unit_size, MAX_LINE_REPEAT};
use super::{
    apple_supported, encode_apple_header, encode_header, pwg_header, APPLE_SYNC, HEADER_SIZE, SYNC_V2,
    SYNC_V3,
};

/// Writes pages to a CUPS (v3, uncompressed), PWG or Apple raster stream.
///
/// The sync word goes out with the first page, or from [`finish`](Self::finish)
/// when the job produced no page at all. CUPS output is big-endian.
pub struct RasterWriter<W: Write> {
    inner: W,
    format: RasterFormat,
    apple_page_count: u32,
    started: bool,
    header: Option<PageHeader>,
    lines_expected: u64,
    lines_written: u64,
    pages_written: u32,
    pending: Vec<u8>,
    pending_repeat: u32,
    encoded: Vec<u8>,
}

impl<W: Write> RasterWriter<W> {
    /// `page_count` is only used by the Apple file header.
    pub fn new(inner: W, format: RasterFormat, page_count: u32) -> Self {
        Self {
            inner,
            format,
            apple_page_count: page_count,
            started: false,
            header: None,
            lines_expected: 0,
            lines_written: 0,
            pages_written: 0,
            pending: Vec::new(),
            pending_repeat: 0,
            encoded: Vec::new(),
        }
    }

    pub fn format(&self) -> RasterFormat {
        self.format
    }

    pub fn pages_written(&self) -> u32 {
        self.pages_written
    }

    /// Whether anything has been written to the stream yet.
    pub fn started(&self) -> bool {
        self.started
    }

    /// Lines the current page still expects (all planes).
    pub fn lines_remaining(&self) -> u64 {
        self.lines_expected - self.lines_written
    }

    fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        match self.format {
            RasterFormat::Cups => self.inner.write_all(SYNC_V3)?,
            RasterFormat::Pwg => self.inner.write_all(SYNC_V2)?,
            RasterFormat::Apple => {
                self.inner.write_all(APPLE_SYNC)?;
                self.inner.write_u32::<BigEndian>(self.apple_page_count)?;
            }
        }
        self.started = true;
        Ok(())
    }

    fn compressed(&self) -> bool {
        self.format != RasterFormat::Cups
    }

    fn flush_group(&mut self) -> Result<()> {
        if self.pending_repeat == 0 {
            return Ok(());
        }
        let unit = self.header.as_ref().map_or(1, |h| unit_size(h.bits_per_pixel));
        self.encoded.clear();
        encode_group(&self.pending, self.pending_repeat, unit, &mut self.encoded);
        self.inner.write_all(&self.encoded)?;
        self.pending_repeat = 0;
        Ok(())
    }

    fn end_page(&mut self) -> Result<()> {
        if self.header.is_none() {
            return Ok(());
        }
        if self.lines_written < self.lines_expected {
            return Err(RasterError::Stream(format!(
                "page {} ended after {} of {} lines",
                self.pages_written, self.lines_written, self.lines_expected
            )));
        }
        self.flush_group()
    }

    /// Start a new page. The previous page must be complete.
    #[instrument(skip_all)]
    pub fn write_header(&mut self, header: &PageHeader) -> Result<()> {
        self.end_page()?;
        if header.width == 0 || header.height == 0 {
            return Err(RasterError::Config("page has no pixels".into()));
        }
        match self.format {
            RasterFormat::Pwg if header.color_order != ColorOrder::Chunked => {
                return Err(RasterError::Config("PWG raster is chunked only".into()));
            }
            RasterFormat::Apple if !apple_supported(header) => {
                return Err(RasterError::Config(format!(
                    "Apple raster cannot carry {:?} at {} bits",
                    header.color_space, header.bits_per_pixel
                )));
            }
            _ => {}
        }

        self.start()?;
        match self.format {
            RasterFormat::Cups => {
                let mut raw = [0u8; HEADER_SIZE];
                encode_header::<BigEndian>(header, &mut raw);
                self.inner.write_all(&raw)?;
            }
            RasterFormat::Pwg => {
                let mut raw = [0u8; HEADER_SIZE];
                encode_header::<BigEndian>(&pwg_header(header), &mut raw);
                self.inner.write_all(&raw)?;
            }
            RasterFormat::Apple => self.inner.write_all(&encode_apple_header(header))?,
        }

        self.pages_written += 1;
        self.lines_expected = header.height as u64 * header.num_planes() as u64;
        self.lines_written = 0;
        self.pending = vec![0u8; header.bytes_per_line as usize];
        self.pending_repeat = 0;
        debug!(
            width = header.width,
            height = header.height,
            bytes_per_line = header.bytes_per_line,
            "page header written"
        );
        self.header = Some(header.clone());
        Ok(())
    }

    /// Append one line (`bytes_per_line` long) to the current page.
    pub fn write_pixels(&mut self, line: &[u8]) -> Result<()> {
        let Some((len, height)) = self
            .header
            .as_ref()
            .map(|h| (h.bytes_per_line as usize, h.height as u64))
        else {
            return Err(RasterError::Stream("line written before any page header".into()));
        };
        if line.len() < len {
            return Err(RasterError::Stream(format!(
                "line of {} bytes, page needs {len}",
                line.len()
            )));
        }
        if self.lines_written >= self.lines_expected {
            return Err(RasterError::Stream("line past the end of the page".into()));
        }
        let line = &line[..len];

        if !self.compressed() {
            self.inner.write_all(line)?;
        } else if self.pending_repeat > 0
            && self.pending_repeat < MAX_LINE_REPEAT
            && self.pending.as_slice() == line
        {
            self.pending_repeat += 1;
        } else {
            self.flush_group()?;
            self.pending.copy_from_slice(line);
            self.pending_repeat = 1;
        }
        self.lines_written += 1;
        // Groups never cross a plane boundary.
        if self.compressed() && self.lines_written % height == 0 {
            self.flush_group()?;
        }
        Ok(())
    }

    /// Pad the current page with blank lines up to its declared height.
    pub fn pad_page(&mut self) -> Result<u64> {
        let Some(header) = self.header.as_ref() else {
            return Ok(0);
        };
        let blank = vec![header.blank_byte(); header.bytes_per_line as usize];
        let missing = self.lines_remaining();
        for _ in 0..missing {
            self.write_pixels(&blank)?;
        }
        Ok(missing)
    }

    /// Close the current page and flush. Emits the sync word when no page
    /// was written.
    pub fn finish(mut self) -> Result<W> {
        self.end_page()?;
        self.start()?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}
