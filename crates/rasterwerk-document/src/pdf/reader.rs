// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open a document with `lopdf` and report per-page geometry
// (media box, crop box, rotation), following page-tree inheritance.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use rasterwerk_core::{RasterError, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Letter, used when no page-tree node declares a media box.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Deepest page-tree walk accepted before the tree is treated as cyclic.
const MAX_TREE_DEPTH: usize = 64;

/// Geometry of one page in PDF user space units (points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    /// `[x0, y0, x1, y1]`.
    pub media_box: [f64; 4],
    /// Crop box clipped to the media box.
    pub crop_box: [f64; 4],
    /// Clockwise rotation, one of 0, 90, 180, 270.
    pub rotate: u32,
}

impl PageGeometry {
    /// Width and height of the crop box before rotation.
    pub fn size(&self) -> [f64; 2] {
        [
            self.crop_box[2] - self.crop_box[0],
            self.crop_box[3] - self.crop_box[1],
        ]
    }

    /// Width and height as displayed: swapped for 90 and 270 degrees.
    pub fn rotated_size(&self) -> [f64; 2] {
        let [w, h] = self.size();
        if self.is_sideways() { [h, w] } else { [w, h] }
    }

    pub fn is_sideways(&self) -> bool {
        self.rotate % 180 == 90
    }
}

/// An opened PDF document.
pub struct PdfDocument {
    document: Document,
    /// Page object ids in page order.
    pages: Vec<ObjectId>,
    source_path: Option<String>,
}

impl PdfDocument {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            RasterError::Render(format!("failed to open {}: {}", path_ref.display(), err))
        })?;
        let mut doc = Self::from_document(document);
        doc.source_path = Some(path_ref.display().to_string());
        Ok(doc)
    }

    /// Load a PDF already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| RasterError::Render(format!("failed to load PDF from memory: {}", err)))?;
        Ok(Self::from_document(document))
    }

    fn from_document(document: Document) -> Self {
        // lopdf keys pages by 1-based page number, in order.
        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        debug!(pages = pages.len(), "PDF loaded");
        Self {
            document,
            pages,
            source_path: None,
        }
    }

    // -- Inspection -----------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// Geometry of page `index` (0-based).
    pub fn page_geometry(&self, index: usize) -> Result<PageGeometry> {
        let page_id = *self.pages.get(index).ok_or_else(|| {
            RasterError::Render(format!(
                "page {} out of range (document has {} pages)",
                index + 1,
                self.pages.len()
            ))
        })?;

        let media_box = self
            .inherited(page_id, b"MediaBox")
            .and_then(|obj| self.read_box(obj))
            .unwrap_or_else(|| {
                warn!(page = index + 1, "no MediaBox, assuming Letter");
                DEFAULT_MEDIA_BOX
            });
        let crop_box = self
            .inherited(page_id, b"CropBox")
            .and_then(|obj| self.read_box(obj))
            .map(|crop| clip(crop, media_box))
            .unwrap_or(media_box);
        let rotate = self
            .inherited(page_id, b"Rotate")
            .and_then(|obj| self.resolve(obj))
            .and_then(number)
            .map(|deg| (deg as i64).rem_euclid(360) as u32 / 90 * 90)
            .unwrap_or(0);

        Ok(PageGeometry {
            media_box,
            crop_box,
            rotate,
        })
    }

    // -- Helpers --------------------------------------------------------------

    fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(id) => self.document.get_object(*id).ok(),
            other => Some(other),
        }
    }

    fn dictionary(&self, id: ObjectId) -> Option<&Dictionary> {
        match self.document.get_object(id).ok()? {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    /// Look `key` up on the page, then on its ancestors.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node = self.dictionary(page_id);
        for _ in 0..MAX_TREE_DEPTH {
            let dict = node?;
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            node = match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => self.dictionary(*parent),
                _ => None,
            };
        }
        None
    }

    /// Read a rectangle, normalising it so `x0 <= x1` and `y0 <= y1`.
    fn read_box(&self, object: &Object) -> Option<[f64; 4]> {
        let Object::Array(items) = self.resolve(object)? else {
            return None;
        };
        if items.len() != 4 {
            return None;
        }
        let mut v = [0.0; 4];
        for (slot, item) in v.iter_mut().zip(items) {
            *slot = number(self.resolve(item)?)?;
        }
        Some([v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])])
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn clip(inner: [f64; 4], outer: [f64; 4]) -> [f64; 4] {
    let clipped = [
        inner[0].max(outer[0]),
        inner[1].max(outer[1]),
        inner[2].min(outer[2]),
        inner[3].min(outer[3]),
    ];
    if clipped[0] >= clipped[2] || clipped[1] >= clipped[3] {
        outer
    } else {
        clipped
    }
}
