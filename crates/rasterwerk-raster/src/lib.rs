// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// rasterwerk-raster — Pixel-level machinery for the Rasterwerk filters.
//
// Provides bit packing and dithering, colour space conversion, conversion
// selection with a fast-path table, integer-ratio resampling, and the
// CUPS / PWG / Apple raster stream reader and writer.

pub mod bits;
pub mod cspace;
pub mod dispatch;
pub mod pivot;
pub mod resample;
pub mod stream;

pub use cspace::{ColorTransform, IccEncoding, PixelConversion};
pub use dispatch::{select_conversion, Conversion, ConversionParams, LineConverter};
pub use pivot::{InputConverter, InputLayout, PivotFormat};
pub use resample::{LineSource, Overspray, ScaleRatio, VerticalResampler};
pub use stream::{RasterReader, RasterWriter};
