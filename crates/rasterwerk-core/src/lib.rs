// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterwerk — Page header model, core types and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod header;
pub mod types;

pub use config::JobOptions;
pub use error::{ErrorClass, RasterError, Result};
pub use header::PageHeader;
pub use types::*;
