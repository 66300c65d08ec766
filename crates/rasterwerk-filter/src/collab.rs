// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capabilities the filters consume but do not implement: printer
// description lookups, colour-manager profile lookup and ICC transforms.
//
// `PrinterDescription` implements the first two from a JSON file;
// `BuiltinCieEngine` covers the sRGB to Lab / XYZ transforms. Anything else
// is injected by the caller through `JobData`.

use std::path::PathBuf;

use rasterwerk_core::{ColorSpace, Result};
use rasterwerk_raster::ColorTransform;

use crate::color::TransformRequest;
use crate::geometry::BacksideConvention;

/// A page size entry matched in the printer description.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPageSize {
    pub name: String,
    /// Sheet width and length in points.
    pub width: f64,
    pub length: f64,
    /// Left, bottom, right, top unprintable margins in points.
    pub margins: [f64; 4],
    /// Image the whole sheet; the bitmap starts at the sheet corner.
    pub full_bleed: bool,
}

/// Queries answered by the printer description (the PPD).
pub trait PpdResolver {
    /// Find the page size matching `name`, or failing that a sheet of
    /// `size` (`[width, length]` in points).
    fn matched_page_size(&self, name: Option<&str>, size: [f64; 2]) -> Option<MatchedPageSize>;

    /// Whether the printer is in colour calibration mode (raw device output,
    /// no colour management).
    fn color_calibration(&self) -> bool;

    /// How the printer images the back of a duplexed sheet.
    fn backside_convention(&self) -> BacksideConvention;

    /// `APDuplexRequiresFlippedMargin`, when declared.
    fn flipped_margin(&self) -> Option<bool>;

    /// Whether a `PageRegion` has to be requested instead of `PageSize`.
    fn requires_page_region(&self) -> bool;
}

/// Queries answered by the system colour manager.
pub trait ColorManager {
    /// Colour management switched off for this printer by the administrator.
    fn is_cm_disabled(&self) -> bool;

    /// Output profile for a colour space / media type / resolution tuple.
    fn icc_profile_path(
        &self,
        color_space: ColorSpace,
        media_type: &str,
        resolution: [u32; 2],
    ) -> Option<PathBuf>;
}

/// Receives diagnostics raised while a colour transform is built or run.
pub trait ErrorSink {
    fn report(&self, message: &str);
}

/// Builds colour transforms.
pub trait IccEngine {
    /// Build the transform described by `request`. Problems found on the way
    /// go to `sink` as well as into the returned error.
    fn create_transform(
        &self,
        request: &TransformRequest,
        sink: &dyn ErrorSink,
    ) -> Result<Box<dyn ColorTransform>>;
}
