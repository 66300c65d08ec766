// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rendering. The filters see rendering only through `PageRenderer`;
// `PopplerRenderer` drives Poppler's `pdftoppm` and decodes its PNM output.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use image::ImageFormat;
use rasterwerk_core::{RasterError, Result};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use crate::pdf::reader::{PageGeometry, PdfDocument};

/// Pixel layout of a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Gray8,
    Rgb8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb8 => 3,
        }
    }
}

/// One page to render: a `width` x `height` pixel window starting at
/// `(offset_x, offset_y)` of the page rendered at `xres` x `yres` dpi.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    /// 0-based page index.
    pub index: usize,
    pub xres: u32,
    pub yres: u32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
}

/// Rendered pixels, top line first, no padding between lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl RenderedPage {
    /// Build from RGBA samples, dropping the alpha channel.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Self {
        let data = rgba
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        Self {
            width,
            height,
            layout: PixelLayout::Rgb8,
            data,
        }
    }

    pub fn line_bytes(&self) -> usize {
        self.width as usize * self.layout.channels()
    }

    /// Line `y`, or `None` past the bottom.
    pub fn line(&self, y: u32) -> Option<&[u8]> {
        let len = self.line_bytes();
        let start = y as usize * len;
        self.data.get(start..start + len)
    }
}

/// Something that can rasterise the pages of a document.
pub trait PageRenderer {
    fn page_count(&self) -> usize;

    /// Declared geometry of page `index`.
    fn page_geometry(&self, index: usize) -> Result<PageGeometry>;

    /// Render one page. Failures are page-scoped.
    fn render_page(&mut self, request: &RenderRequest) -> Result<RenderedPage>;
}

/// Renders with Poppler's `pdftoppm`.
pub struct PopplerRenderer {
    document: PdfDocument,
    path: PathBuf,
    program: PathBuf,
    // Keeps a spooled input alive for the renderer's lifetime.
    _spool: Option<NamedTempFile>,
}

impl PopplerRenderer {
    /// Render a PDF file in place.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self {
            document: PdfDocument::open(path)?,
            path: path.to_path_buf(),
            program: PathBuf::from("pdftoppm"),
            _spool: None,
        })
    }

    /// Spool a PDF from a non-seekable stream to a temporary file first.
    #[instrument(skip_all)]
    pub fn from_reader(mut input: impl Read) -> Result<Self> {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;
        let mut spool = NamedTempFile::new()
            .map_err(|err| RasterError::Resource(format!("cannot create spool file: {err}")))?;
        spool
            .write_all(&data)
            .and_then(|()| spool.flush())
            .map_err(|err| RasterError::Resource(format!("cannot write spool file: {err}")))?;
        debug!(bytes = data.len(), path = %spool.path().display(), "PDF spooled");
        Ok(Self {
            document: PdfDocument::from_bytes(&data)?,
            path: spool.path().to_path_buf(),
            program: PathBuf::from("pdftoppm"),
            _spool: Some(spool),
        })
    }

    /// Use another `pdftoppm` binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn document(&self) -> &PdfDocument {
        &self.document
    }

    fn arguments(&self, request: &RenderRequest) -> Vec<String> {
        let page = (request.index + 1).to_string();
        let mut args = vec![
            "-f".to_string(),
            page.clone(),
            "-l".to_string(),
            page,
            "-rx".to_string(),
            request.xres.to_string(),
            "-ry".to_string(),
            request.yres.to_string(),
            "-x".to_string(),
            request.offset_x.to_string(),
            "-y".to_string(),
            request.offset_y.to_string(),
            "-W".to_string(),
            request.width.to_string(),
            "-H".to_string(),
            request.height.to_string(),
            "-cropbox".to_string(),
        ];
        if request.layout == PixelLayout::Gray8 {
            args.push("-gray".to_string());
        }
        args.push(self.path.display().to_string());
        args
    }
}

impl PageRenderer for PopplerRenderer {
    fn page_count(&self) -> usize {
        self.document.page_count()
    }

    fn page_geometry(&self, index: usize) -> Result<PageGeometry> {
        self.document.page_geometry(index)
    }

    #[instrument(skip_all, fields(page = request.index + 1))]
    fn render_page(&mut self, request: &RenderRequest) -> Result<RenderedPage> {
        let output = Command::new(&self.program)
            .args(self.arguments(request))
            .output()
            .map_err(|err| {
                RasterError::Render(format!("cannot run {}: {err}", self.program.display()))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "pdftoppm failed");
            return Err(RasterError::Render(format!(
                "pdftoppm exited with {} on page {}",
                output.status,
                request.index + 1
            )));
        }
        let page = decode_pnm(&output.stdout, request.layout)?;
        debug!(width = page.width, height = page.height, "page rendered");
        Ok(page)
    }
}

/// Decode PNM bytes into the requested layout.
pub fn decode_pnm(bytes: &[u8], layout: PixelLayout) -> Result<RenderedPage> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Pnm)
        .map_err(|err| RasterError::Render(format!("cannot decode renderer output: {err}")))?;
    let (width, height, data) = match layout {
        PixelLayout::Gray8 => {
            let gray = image.to_luma8();
            (gray.width(), gray.height(), gray.into_raw())
        }
        PixelLayout::Rgb8 => {
            let rgb = image.to_rgb8();
            (rgb.width(), rgb.height(), rgb.into_raw())
        }
    };
    Ok(RenderedPage {
        width,
        height,
        layout,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn request(layout: PixelLayout) -> RenderRequest {
        RenderRequest {
            index: 2,
            xres: 300,
            yres: 600,
            offset_x: 10,
            offset_y: 20,
            width: 100,
            height: 50,
            layout,
        }
    }

    fn renderer() -> PopplerRenderer {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page = doc.add_object(lopdf::dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            lopdf::Object::Dictionary(lopdf::dictionary! {
                "Type" => "Pages",
                "Kids" => vec![lopdf::Object::Reference(page)],
                "Count" => lopdf::Object::Integer(1),
            }),
        );
        let catalog = doc.add_object(lopdf::dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        PopplerRenderer::from_reader(bytes.as_slice()).unwrap()
    }

    #[test]
    fn alpha_is_dropped() {
        let page = RenderedPage::from_rgba(2, 1, &[1, 2, 3, 255, 4, 5, 6, 0]);
        assert_eq!(page.data, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(page.line(0), Some(&[1u8, 2, 3, 4, 5, 6][..]));
        assert_eq!(page.line(1), None);
    }

    #[test]
    fn arguments_select_one_page_window() {
        let r = renderer();
        let args = r.arguments(&request(PixelLayout::Gray8));
        assert_eq!(&args[..4], ["-f", "3", "-l", "3"]);
        assert!(args.windows(2).any(|w| w == ["-ry", "600"]));
        assert!(args.windows(2).any(|w| w == ["-W", "100"]));
        assert!(args.contains(&"-gray".to_string()));
        assert_eq!(args.last().map(String::as_str), r.path.to_str());
        assert!(!r.arguments(&request(PixelLayout::Rgb8)).contains(&"-gray".to_string()));
    }

    #[test]
    fn spooled_document_is_inspected() {
        let r = renderer();
        assert_eq!(r.page_count(), 1);
        assert!(r.path.exists());
    }

    #[test]
    fn missing_program_is_a_render_error() {
        let mut r = renderer().with_program("/nonexistent/pdftoppm");
        let err = r.render_page(&request(PixelLayout::Rgb8)).unwrap_err();
        assert!(matches!(err, RasterError::Render(_)));
    }

    #[test]
    fn pnm_decodes_to_either_layout() {
        let mut ppm = b"P6\n2 1\n255\n".to_vec();
        ppm.extend_from_slice(&[255, 0, 0, 255, 255, 255]);
        let rgb = decode_pnm(&ppm, PixelLayout::Rgb8).unwrap();
        assert_eq!((rgb.width, rgb.height), (2, 1));
        assert_eq!(rgb.data, vec![255, 0, 0, 255, 255, 255]);
        let gray = decode_pnm(&ppm, PixelLayout::Gray8).unwrap();
        assert_eq!(gray.data.len(), 2);
        assert_eq!(gray.data[1], 255);
    }

    #[test]
    fn garbage_output_is_a_render_error() {
        assert!(matches!(
            decode_pnm(b"not an image", PixelLayout::Rgb8),
            Err(RasterError::Render(_))
        ));
    }
}
