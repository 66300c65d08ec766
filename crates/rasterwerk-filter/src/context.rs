// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job-lifetime and page-lifetime state of a filter run.

use rasterwerk_core::{ColorMode, ColorOrder, JobOptions, PageHeader, RasterError, RasterFormat, Result};
use rasterwerk_raster::stream::apple_supported;
use rasterwerk_raster::{select_conversion, Conversion, ConversionParams, LineConverter};
use tracing::{info, instrument};

use crate::collab::{ErrorSink, IccEngine, PpdResolver};
use crate::color::ColorProfileState;
use crate::geometry::{BacksideConvention, SwapFlags};
use crate::job::JobData;

/// Which option carried the page size to the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeOption {
    PageSize,
    PageRegion,
}

/// Everything decided about one page before its pixels are produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub header: PageHeader,
    /// Top-left corner of the bitmap on the sheet, in pixels.
    pub offset: [u32; 2],
    /// Whole sheet in pixels.
    pub sheet: [u32; 2],
    pub margins_swapped: bool,
    /// Even page of a duplex job.
    pub back_side: bool,
    pub size_option: SizeOption,
}

/// State shared by every page of a job.
pub struct DocumentContext<'j> {
    pub options: &'j JobOptions,
    pub ppd: Option<&'j dyn PpdResolver>,
    /// Header every page starts from.
    pub template: PageHeader,
    pub swap: SwapFlags,
    pub color: ColorProfileState,
    pub conversion: Conversion,
    pub num_planes: u32,
    pub num_bands: u32,
    pub alloc_line_buf: bool,
    /// Threshold 1-bit output at a fixed midpoint instead of dithering.
    pub bi_level: bool,
    engine: &'j dyn IccEngine,
}

impl<'j> DocumentContext<'j> {
    /// Resolve options, printer description and colour management into the
    /// job's conversion. Every configuration error surfaces here, before
    /// any output is written.
    #[instrument(skip_all, fields(format = ?format))]
    pub fn new(job: &'j JobData, format: RasterFormat) -> Result<Self> {
        let options = &job.options;
        let template = options.header_template();
        template.validate_format()?;
        match format {
            RasterFormat::Pwg if template.color_order != ColorOrder::Chunked => {
                return Err(RasterError::Config("PWG raster is chunked only".into()));
            }
            RasterFormat::Apple if !apple_supported(&template) => {
                return Err(RasterError::Config(format!(
                    "Apple raster cannot carry {:?} at {} bits",
                    template.color_space, template.bits_per_color
                )));
            }
            _ => {}
        }

        let ppd = job.ppd();
        let swap = SwapFlags::for_job(
            template.duplex,
            template.tumble,
            ppd.map_or(BacksideConvention::None, |p| p.backside_convention()),
            ppd.and_then(|p| p.flipped_margin()),
        );
        let color = ColorProfileState::setup(&template, options, ppd, job.color_manager())?;
        let params = ConversionParams::from_header(&template, color.encoding(), swap.swap_image_x);
        let conversion = select_conversion(&params)?;
        info!(
            color_space = ?template.color_space,
            bits = template.bits_per_color,
            order = ?template.color_order,
            resolution = ?template.hw_resolution,
            swap = ?swap,
            "job configured"
        );

        Ok(Self {
            options,
            ppd,
            num_planes: template.num_planes(),
            num_bands: template.num_bands(),
            alloc_line_buf: conversion.alloc_line_buf,
            bi_level: options.color_mode == ColorMode::BiLevel,
            template,
            swap,
            color,
            conversion,
            engine: job.icc_engine(),
        })
    }

    /// Build the colour transform if the job needs one and it does not
    /// exist yet. Called before every page; only the first call works.
    pub fn prepare(&mut self, sink: &dyn ErrorSink) -> Result<()> {
        self.color.ensure_transform(self.engine, sink)
    }

    /// Bind the job's conversion to one page.
    pub fn converter(&self, plan: &PagePlan) -> Result<LineConverter<'_>> {
        self.conversion.bind(self.color.transform(), &plan.header)
    }

    /// Release job resources.
    pub fn finish(&mut self) {
        self.color.release();
    }
}
