// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Rasterwerk.

use thiserror::Error;

use crate::types::ColorSpace;

/// How far an error reaches: the whole job, or only the page being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad colour space, depth, resolution ratio or page size. Fatal before
    /// output starts; stops the page loop when hit mid-job.
    Configuration,
    /// Short read, renderer failure on a single page. Page-scoped.
    Transient,
    /// Allocation, temp file or output stream failure. Always job-fatal.
    Resource,
}

/// Top-level error type for all Rasterwerk operations.
#[derive(Debug, Error)]
pub enum RasterError {
    // -- Configuration errors --
    #[error("unsupported colour space {0:?}")]
    UnsupportedColorSpace(ColorSpace),

    #[error("unsupported depth: {bits_per_color} bits per colour for {color_space:?}")]
    UnsupportedDepth {
        color_space: ColorSpace,
        bits_per_color: u32,
    },

    #[error("unknown colour space value {0}")]
    UnknownColorSpace(u32),

    #[error("input resolution {input} dpi and output resolution {output} dpi are not an integer multiple of each other")]
    ResolutionRatio { input: u32, output: u32 },

    #[error("page size mismatch: {0}")]
    PageSizeMismatch(String),

    #[error("configuration error: {0}")]
    Config(String),

    // -- Transient, page-scoped errors --
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("page rendering failed: {0}")]
    Render(String),

    #[error("raster stream error: {0}")]
    Stream(String),

    // -- Colour management --
    #[error("colour management failed: {0}")]
    ColorManagement(String),

    // -- Resource errors --
    #[error("resource error: {0}")]
    Resource(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RasterError {
    /// Classify the error for the page loop.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnsupportedColorSpace(_)
            | Self::UnsupportedDepth { .. }
            | Self::UnknownColorSpace(_)
            | Self::ResolutionRatio { .. }
            | Self::PageSizeMismatch(_)
            | Self::Config(_)
            | Self::ColorManagement(_)
            | Self::Json(_) => ErrorClass::Configuration,
            Self::ShortRead { .. } | Self::Render(_) | Self::Stream(_) => ErrorClass::Transient,
            Self::Resource(_) | Self::Io(_) => ErrorClass::Resource,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RasterError>;
