// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// rasterwerk-filter — The two print filters and what they share.
//
// `pdf_to_raster` renders PDF pages, `raster_to_raster` re-encodes CUPS,
// PWG and Apple raster at another resolution, colour space or container.
// Both resolve page geometry the same way and drive the same per-page
// emission loop. `job::run_filter` is the process-level entry point.

pub mod collab;
pub mod color;
pub mod context;
pub mod emit;
pub mod geometry;
pub mod job;
pub mod pdf_to_raster;
pub mod printer;
pub mod raster_to_raster;

pub use collab::{ColorManager, ErrorSink, IccEngine, MatchedPageSize, PpdResolver};
pub use color::{BuiltinCieEngine, ColorProfileState, ProfileTarget, TransformRequest};
pub use context::{DocumentContext, PagePlan, SizeOption};
pub use geometry::{resolve_geometry, BacksideConvention, PageRequest, SwapFlags};
pub use job::{run_filter, FilterOutcome, JobData, LogLevel};
pub use printer::PrinterDescription;
