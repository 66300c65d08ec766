// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// rasterwerk-document — Page-description input for the Rasterwerk filters.
//
// Reads PDF page geometry (media box, crop box, rotation) with `lopdf` and
// renders pages to RGB pixels through an external renderer.

pub mod pdf;
pub mod render;

pub use pdf::reader::{PageGeometry, PdfDocument};
pub use render::{PageRenderer, PixelLayout, PopplerRenderer, RenderRequest, RenderedPage};
