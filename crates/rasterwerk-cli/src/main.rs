// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// rasterwerk: run the print filters from a shell or a CUPS filter chain.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use rasterwerk_core::{JobOptions, RasterFormat, Result};
use rasterwerk_document::{PageGeometry, PdfDocument};
use rasterwerk_filter::{run_filter, JobData, PrinterDescription};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "rasterwerk", version, about = "PDF and raster to printer raster filters")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a PDF document or raster stream into printer raster
    Convert {
        /// Input file; standard input when absent
        input: Option<PathBuf>,
        /// Job options as JSON
        #[arg(short, long)]
        options: Option<PathBuf>,
        /// Printer description as JSON
        #[arg(short, long)]
        printer: Option<PathBuf>,
        /// Output container; defaults to the job options' `output_format`
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
        /// Output file; standard output when absent
        #[arg(short = 'O', long)]
        output: Option<PathBuf>,
        /// Renderer binary used for PDF pages
        #[arg(long)]
        pdftoppm: Option<PathBuf>,
        /// Also write `LEVEL: message` lines on stderr for the spooler
        #[arg(long)]
        cups_messages: bool,
    },
    /// Print the page geometry of a PDF document as JSON
    Info {
        input: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Cups,
    Pwg,
    Apple,
}

impl From<FormatArg> for RasterFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Cups => Self::Cups,
            FormatArg::Pwg => Self::Pwg,
            FormatArg::Apple => Self::Apple,
        }
    }
}

#[derive(Serialize)]
struct PageInfo {
    page: usize,
    #[serde(flatten)]
    geometry: PageGeometry,
    size: [f64; 2],
}

struct ConvertArgs {
    input: Option<PathBuf>,
    options: Option<PathBuf>,
    printer: Option<PathBuf>,
    format: Option<FormatArg>,
    output: Option<PathBuf>,
    pdftoppm: Option<PathBuf>,
    cups_messages: bool,
}

fn load_job(args: &ConvertArgs) -> Result<JobData> {
    let options = match &args.options {
        Some(path) => JobOptions::from_json(&std::fs::read_to_string(path)?)?,
        None => JobOptions::default(),
    };
    let mut job = JobData::new(options);
    if let Some(path) = &args.printer {
        job = job.with_printer(PrinterDescription::load(path)?);
    }
    if let Some(path) = &args.input {
        job = job.with_input_path(path);
    }
    if let Some(program) = &args.pdftoppm {
        job = job.with_pdftoppm(program);
    }
    if args.cups_messages {
        job = job.with_log(|level, message| eprintln!("{}: {message}", level.prefix()));
    }
    Ok(job)
}

fn cmd_convert(args: ConvertArgs) -> i32 {
    let job = match load_job(&args) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return 1;
        }
    };
    let format = args.format.map_or(job.options.output_format, RasterFormat::from);

    let output: Box<dyn Write> = match &args.output {
        Some(path) => match File::create(path) {
            Ok(file) => Box::new(BufWriter::new(file)),
            Err(e) => {
                eprintln!("ERROR: cannot create {}: {e}", path.display());
                return 1;
            }
        },
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let outcome = match &args.input {
        Some(path) => match File::open(path) {
            Ok(file) => run_filter(file, output, true, &job, format),
            Err(e) => {
                eprintln!("ERROR: cannot open {}: {e}", path.display());
                return 1;
            }
        },
        None => run_filter(io::stdin().lock(), output, false, &job, format),
    };
    tracing::info!(%outcome, "done");
    outcome.exit_code()
}

fn cmd_info(input: &Path) -> Result<()> {
    let document = PdfDocument::open(input)?;
    let pages = (0..document.page_count())
        .map(|index| {
            let geometry = document.page_geometry(index)?;
            Ok(PageInfo {
                page: index + 1,
                size: geometry.rotated_size(),
                geometry,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    println!("{}", serde_json::to_string_pretty(&pages)?);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Command::Convert {
            input,
            options,
            printer,
            format,
            output,
            pdftoppm,
            cups_messages,
        } => cmd_convert(ConvertArgs {
            input,
            options,
            printer,
            format,
            output,
            pdftoppm,
            cups_messages,
        }),
        Command::Info { input } => match cmd_info(&input) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("ERROR: {e}");
                1
            }
        },
    };
    process::exit(code);
}
