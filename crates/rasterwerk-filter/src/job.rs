// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job data handed to a filter, the outcome it reports, and the entry point
// that picks the filter for an input stream.

use std::fmt;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use rasterwerk_core::{JobOptions, RasterFormat};
use tracing::{debug, error, info, warn};

use crate::collab::{ColorManager, ErrorSink, IccEngine, PpdResolver};
use crate::color::BuiltinCieEngine;
use crate::printer::PrinterDescription;
use crate::{pdf_to_raster, raster_to_raster};

/// Severity of a job log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Prefix CUPS expects on a filter's stderr lines.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

type LogFn = Box<dyn Fn(LogLevel, &str)>;
type CancelFn = Box<dyn Fn() -> bool>;

/// Everything a filter run receives from its caller.
#[derive(Default)]
pub struct JobData {
    pub options: JobOptions,
    pub printer: Option<PrinterDescription>,
    color_manager: Option<Box<dyn ColorManager>>,
    icc_engine: Option<Box<dyn IccEngine>>,
    input_path: Option<PathBuf>,
    pdftoppm: Option<PathBuf>,
    log: Option<LogFn>,
    cancel: Option<CancelFn>,
}

impl JobData {
    pub fn new(options: JobOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn with_printer(mut self, printer: PrinterDescription) -> Self {
        self.printer = Some(printer);
        self
    }

    /// Route job messages to `log` in addition to `tracing`.
    pub fn with_log(mut self, log: impl Fn(LogLevel, &str) + 'static) -> Self {
        self.log = Some(Box::new(log));
        self
    }

    /// Poll `cancel` between pages; `true` stops the job.
    pub fn with_cancel(mut self, cancel: impl Fn() -> bool + 'static) -> Self {
        self.cancel = Some(Box::new(cancel));
        self
    }

    /// Use `manager` for profile lookups instead of the printer description.
    pub fn with_color_manager(mut self, manager: impl ColorManager + 'static) -> Self {
        self.color_manager = Some(Box::new(manager));
        self
    }

    pub fn with_icc_engine(mut self, engine: impl IccEngine + 'static) -> Self {
        self.icc_engine = Some(Box::new(engine));
        self
    }

    /// File the input stream was opened from. Lets the PDF filter read it
    /// in place instead of spooling.
    pub fn with_input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(path.into());
        self
    }

    /// Renderer binary to use instead of `pdftoppm` on `PATH`.
    pub fn with_pdftoppm(mut self, program: impl Into<PathBuf>) -> Self {
        self.pdftoppm = Some(program.into());
        self
    }

    pub fn ppd(&self) -> Option<&dyn PpdResolver> {
        self.printer.as_ref().map(|p| p as &dyn PpdResolver)
    }

    pub fn color_manager(&self) -> Option<&dyn ColorManager> {
        match &self.color_manager {
            Some(manager) => Some(manager.as_ref()),
            None => self.printer.as_ref().map(|p| p as &dyn ColorManager),
        }
    }

    pub fn icc_engine(&self) -> &dyn IccEngine {
        match &self.icc_engine {
            Some(engine) => engine.as_ref(),
            None => &BuiltinCieEngine,
        }
    }

    pub fn input_path(&self) -> Option<&Path> {
        self.input_path.as_deref()
    }

    pub fn pdftoppm(&self) -> Option<&Path> {
        self.pdftoppm.as_deref()
    }

    /// Emit a job message to `tracing` and the caller's log callback.
    pub fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!("{message}"),
            LogLevel::Info => info!("{message}"),
            LogLevel::Warn => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
        }
        if let Some(log) = &self.log {
            log(level, message);
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|cancel| cancel())
    }
}

impl fmt::Debug for JobData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobData")
            .field("options", &self.options)
            .field("printer", &self.printer.as_ref().map(|p| &p.name))
            .field("color_manager", &self.color_manager.is_some())
            .field("icc_engine", &self.icc_engine.is_some())
            .field("input_path", &self.input_path)
            .finish_non_exhaustive()
    }
}

/// Forwards colour engine diagnostics into the job log.
pub(crate) struct JobSink<'j>(pub(crate) &'j JobData);

impl ErrorSink for JobSink<'_> {
    fn report(&self, message: &str) {
        self.0.log(LogLevel::Error, message);
    }
}

/// How a filter run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Success { pages: u32 },
    /// Stopped by the cancel callback after `pages` complete pages.
    Canceled { pages: u32 },
    /// A page after the first failed; the `pages` before it were written.
    PartialFailure { pages: u32, error: String },
    Failed { error: String },
}

impl FilterOutcome {
    /// Process exit status: zero for success and cancellation.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success { .. } | Self::Canceled { .. } => 0,
            Self::PartialFailure { .. } | Self::Failed { .. } => 1,
        }
    }

    pub fn pages(&self) -> u32 {
        match self {
            Self::Success { pages } | Self::Canceled { pages } | Self::PartialFailure { pages, .. } => {
                *pages
            }
            Self::Failed { .. } => 0,
        }
    }

    pub(crate) fn failed(job: &JobData, error: impl fmt::Display) -> Self {
        let error = error.to_string();
        job.log(LogLevel::Error, &error);
        Self::Failed { error }
    }
}

impl fmt::Display for FilterOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { pages } => write!(f, "job finished, {pages} pages"),
            Self::Canceled { pages } => write!(f, "job canceled, {pages} pages"),
            Self::PartialFailure { pages, error } => {
                write!(f, "job stopped after {pages} pages: {error}")
            }
            Self::Failed { error } => write!(f, "job failed: {error}"),
        }
    }
}

/// Run the filter matching the input: PDF documents are rendered, anything
/// else is read as a raster stream. `input_seekable` says the stream is the
/// file named by [`JobData::with_input_path`].
pub fn run_filter<R: Read, W: Write>(
    mut input: R,
    output: W,
    input_seekable: bool,
    job: &JobData,
    format: RasterFormat,
) -> FilterOutcome {
    let mut head = Vec::with_capacity(4);
    if let Err(err) = (&mut input).take(4).read_to_end(&mut head) {
        return FilterOutcome::failed(job, format!("cannot read input: {err}"));
    }
    let is_pdf = head.as_slice() == b"%PDF";
    let input = Cursor::new(head).chain(input);
    if is_pdf {
        job.log(LogLevel::Debug, "input is PDF");
        pdf_to_raster::pdf_to_raster(input, output, input_seekable, job, format)
    } else {
        job.log(LogLevel::Debug, "input is raster");
        raster_to_raster::raster_to_raster(input, output, job, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn exit_codes() {
        assert_eq!(FilterOutcome::Success { pages: 2 }.exit_code(), 0);
        assert_eq!(FilterOutcome::Canceled { pages: 1 }.exit_code(), 0);
        let partial = FilterOutcome::PartialFailure {
            pages: 1,
            error: "x".into(),
        };
        assert_eq!(partial.exit_code(), 1);
        assert_eq!(partial.pages(), 1);
        assert_eq!(FilterOutcome::Failed { error: "x".into() }.exit_code(), 1);
    }

    #[test]
    fn log_reaches_the_callback() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let job = JobData::new(JobOptions::default())
            .with_log(move |level, msg| sink.borrow_mut().push((level, msg.to_owned())));
        JobSink(&job).report("profile missing");
        job.log(LogLevel::Info, "hello");
        assert_eq!(
            *seen.borrow(),
            vec![
                (LogLevel::Error, "profile missing".to_owned()),
                (LogLevel::Info, "hello".to_owned()),
            ]
        );
    }

    #[test]
    fn printer_answers_color_lookups_unless_overridden() {
        let job = JobData::new(JobOptions::default());
        assert!(job.ppd().is_none());
        assert!(job.color_manager().is_none());

        let job = job.with_printer(PrinterDescription {
            cm_disabled: true,
            ..PrinterDescription::default()
        });
        assert!(job.color_manager().is_some_and(|m| m.is_cm_disabled()));
    }

    #[test]
    fn cancel_callback_is_polled() {
        let job = JobData::new(JobOptions::default());
        assert!(!job.is_canceled());
        let job = job.with_cancel(|| true);
        assert!(job.is_canceled());
    }

    #[test]
    fn empty_input_is_an_empty_stream() {
        let job = JobData::new(JobOptions::default());
        let mut out = Vec::new();
        let outcome = run_filter(std::io::empty(), &mut out, false, &job, RasterFormat::Pwg);
        assert_eq!(outcome, FilterOutcome::Success { pages: 0 });
        assert_eq!(out, b"RaS2");
    }
}
