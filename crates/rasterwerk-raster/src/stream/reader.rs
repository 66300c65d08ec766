// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster stream reader.

use std::io::{self, Read};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use rasterwerk_core::{PageHeader, RasterError, RasterFormat, Result};
use tracing::{debug, instrument};

use super::compress::{decode_group, unit_size};
use super::{
    decode_apple_header, decode_header, read_failed, APPLE_HEADER_SIZE, APPLE_SYNC, HEADER_SIZE, PWG_MEDIA_CLASS,
    SYNC_V1, SYNC_V2, SYNC_V3,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrderKind {
    Big,
    Little,
}

/// Read as many bytes as the source gives, up to `buf.len()`.
fn read_full<R: Read>(inner: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match inner.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// Reject a header whose line length and pixel size disagree with its
/// colour space, depth, order and width. Lines may carry trailing padding
/// but never fewer bytes than the pixels need.
fn check_layout(header: &PageHeader, page: u32) -> Result<()> {
    let mut expected = header.clone();
    expected.update_derived();
    if header.num_colors != expected.num_colors
        || header.bits_per_pixel != expected.bits_per_pixel
        || header.bytes_per_line < expected.bytes_per_line
    {
        return Err(RasterError::Stream(format!(
            "page {page} declares {} colours, {} bits per pixel and {} bytes per line; \
             {:?} at {} bits and width {} needs {}, {} and {}",
            header.num_colors,
            header.bits_per_pixel,
            header.bytes_per_line,
            header.color_space,
            header.bits_per_color,
            header.width,
            expected.num_colors,
            expected.bits_per_pixel,
            expected.bytes_per_line
        )));
    }
    Ok(())
}

/// Reads pages and lines from a CUPS, PWG or Apple raster stream.
pub struct RasterReader<R> {
    inner: R,
    format: RasterFormat,
    order: ByteOrderKind,
    compressed: bool,
    apple_pages: Option<u32>,
    pages_read: u32,
    header: Option<PageHeader>,
    lines_left: u64,
    repeat_left: u32,
    line: Vec<u8>,
}

impl<R: Read> RasterReader<R> {
    /// Read and check the stream's sync word.
    #[instrument(skip(inner))]
    pub fn open(mut inner: R) -> Result<Self> {
        let mut sync = [0u8; 4];
        let got = read_full(&mut inner, &mut sync).map_err(read_failed)?;
        if got < sync.len() {
            return Err(RasterError::ShortRead {
                expected: sync.len(),
                actual: got,
            });
        }
        let mut reversed = sync;
        reversed.reverse();

        let (format, order, compressed, apple_pages) = if &sync == SYNC_V2 {
            (RasterFormat::Cups, ByteOrderKind::Big, true, None)
        } else if &reversed == SYNC_V2 {
            (RasterFormat::Cups, ByteOrderKind::Little, true, None)
        } else if &sync == SYNC_V1 {
            (RasterFormat::Cups, ByteOrderKind::Big, true, None)
        } else if &reversed == SYNC_V1 {
            (RasterFormat::Cups, ByteOrderKind::Little, true, None)
        } else if &sync == SYNC_V3 {
            (RasterFormat::Cups, ByteOrderKind::Big, false, None)
        } else if &reversed == SYNC_V3 {
            (RasterFormat::Cups, ByteOrderKind::Little, false, None)
        } else if sync == APPLE_SYNC[..4] {
            let mut rest = [0u8; 4];
            inner.read_exact(&mut rest).map_err(read_failed)?;
            if rest != APPLE_SYNC[4..] {
                return Err(RasterError::Stream("bad Apple raster magic".into()));
            }
            let pages = inner.read_u32::<BigEndian>().map_err(read_failed)?;
            (RasterFormat::Apple, ByteOrderKind::Big, true, Some(pages))
        } else {
            return Err(RasterError::Stream(format!(
                "unknown raster sync word {:02x?}",
                sync
            )));
        };
        debug!(?format, ?order, compressed, "raster stream opened");

        Ok(Self {
            inner,
            format,
            order,
            compressed,
            apple_pages,
            pages_read: 0,
            header: None,
            lines_left: 0,
            repeat_left: 0,
            line: Vec::new(),
        })
    }

    /// Container format. A `RaS2` stream counts as PWG once its first page
    /// header carries the PWG media class.
    pub fn format(&self) -> RasterFormat {
        self.format
    }

    /// Page count from the Apple file header.
    pub fn declared_pages(&self) -> Option<u32> {
        self.apple_pages
    }

    /// Header of the current page.
    pub fn header(&self) -> Option<&PageHeader> {
        self.header.as_ref()
    }

    /// Lines of the current page not read yet (all planes).
    pub fn lines_left(&self) -> u64 {
        self.lines_left
    }

    /// Advance to the next page, skipping unread lines of the current one.
    /// `Ok(None)` at a clean end of stream.
    pub fn read_header(&mut self) -> Result<Option<PageHeader>> {
        let mut skip = vec![0u8; self.line.len()];
        while self.lines_left > 0 {
            self.read_pixels(&mut skip)?;
        }
        if let Some(total) = self.apple_pages {
            if self.pages_read >= total {
                return Ok(None);
            }
        }

        let header = match self.format {
            RasterFormat::Apple => {
                let mut raw = [0u8; APPLE_HEADER_SIZE];
                let got = read_full(&mut self.inner, &mut raw).map_err(read_failed)?;
                if got == 0 {
                    return Ok(None);
                }
                if got < raw.len() {
                    return Err(RasterError::ShortRead {
                        expected: raw.len(),
                        actual: got,
                    });
                }
                decode_apple_header(&raw)?
            }
            _ => {
                let mut raw = vec![0u8; HEADER_SIZE];
                let got = read_full(&mut self.inner, &mut raw).map_err(read_failed)?;
                if got == 0 {
                    return Ok(None);
                }
                if got < raw.len() {
                    return Err(RasterError::ShortRead {
                        expected: raw.len(),
                        actual: got,
                    });
                }
                match self.order {
                    ByteOrderKind::Big => decode_header::<BigEndian>(&raw)?,
                    ByteOrderKind::Little => decode_header::<LittleEndian>(&raw)?,
                }
            }
        };

        if header.width == 0 || header.height == 0 || header.bytes_per_line == 0 {
            return Err(RasterError::Stream(format!(
                "page {} has an empty geometry {}x{}",
                self.pages_read + 1,
                header.width,
                header.height
            )));
        }
        check_layout(&header, self.pages_read + 1)?;
        if self.pages_read == 0 && self.format == RasterFormat::Cups && header.media_class == PWG_MEDIA_CLASS {
            self.format = RasterFormat::Pwg;
        }

        self.pages_read += 1;
        self.lines_left = header.height as u64 * header.num_planes() as u64;
        self.repeat_left = 0;
        self.line = vec![0u8; header.bytes_per_line as usize];
        debug!(
            page = self.pages_read,
            width = header.width,
            height = header.height,
            color_space = ?header.color_space,
            bits = header.bits_per_color,
            "raster page header"
        );
        self.header = Some(header.clone());
        Ok(Some(header))
    }

    /// Read one line of the current page into `buf` (`bytes_per_line` long).
    /// Returns the number of bytes stored.
    ///
    /// A stream ending inside the page data is a [`RasterError::ShortRead`].
    pub fn read_pixels(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(header) = self.header.as_ref() else {
            return Err(RasterError::Stream("line read before any page header".into()));
        };
        if self.lines_left == 0 {
            return Err(RasterError::Stream("read past the end of the page".into()));
        }
        let len = header.bytes_per_line as usize;
        if buf.len() < len {
            return Err(RasterError::Stream(format!(
                "line buffer of {} bytes for {len} byte lines",
                buf.len()
            )));
        }

        if self.compressed {
            if self.repeat_left == 0 {
                let unit = unit_size(header.bits_per_pixel);
                let blank = header.blank_byte();
                self.repeat_left = decode_group(&mut self.inner, &mut self.line, unit, blank)?;
            }
            self.repeat_left -= 1;
            buf[..len].copy_from_slice(&self.line);
        } else {
            let got = read_full(&mut self.inner, &mut buf[..len]).map_err(read_failed)?;
            if got < len {
                return Err(RasterError::ShortRead {
                    expected: len,
                    actual: got,
                });
            }
        }
        self.lines_left -= 1;
        Ok(len)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
