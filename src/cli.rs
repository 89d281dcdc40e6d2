//! Command-line front end of `images2pdf`.

use anyhow::{Result, anyhow};
use clap::Parser;
use log::info;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::{ConversionReport, ConvertOptions, convert_images_to_pdf_with};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

/// Convert images into a single PDF document with one page per image, in the
/// order given. Each page has the size of its image (one pixel per point).
///
/// Inputs which cannot be decoded as images are skipped and reported. No
/// document is written if none of the inputs can be converted.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path of the PDF document to write (created or replaced)
    output_path: PathBuf,
    /// Images to convert, one per page (PNG, JPEG, GIF, BMP, TIFF, WebP)
    #[arg(required = true)]
    image_paths: Vec<PathBuf>,
    /// Do not report skipped inputs nor the saved document
    #[arg(short, long)]
    quiet: bool,
    /// Fail without writing anything if any input has to be skipped
    #[arg(long)]
    strict: bool,
}

/// Parse `args` (the first one being the name the program was invoked with),
/// run the conversion and return the process exit status.
pub fn run<I, T>(args: I) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version requests are printed on stdout and are not failures.
            let _ = err.print();
            return if err.use_stderr() {
                EXIT_FAILURE
            } else {
                EXIT_SUCCESS
            };
        }
    };

    match convert(&cli) {
        Ok(report) => {
            if !cli.quiet {
                print_report(&cli, &report);
            }
            EXIT_SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            EXIT_FAILURE
        }
    }
}

fn convert(cli: &Cli) -> Result<ConversionReport> {
    if cli.output_path.is_dir() {
        return Err(anyhow!(
            "The output path '{}' is a directory",
            cli.output_path.display()
        ));
    }

    info!(
        "Converting {} images into '{}'",
        cli.image_paths.len(),
        cli.output_path.display()
    );

    let options = ConvertOptions { strict: cli.strict };
    convert_images_to_pdf_with(&cli.image_paths, &cli.output_path, options)
}

fn print_report(cli: &Cli, report: &ConversionReport) {
    for skipped in &report.skipped {
        eprintln!(
            "Skipped input #{} '{}': {}",
            skipped.position + 1,
            skipped.path.display(),
            skipped.reason
        );
    }

    println!(
        "Output document saved as '{}' ({} of {} images)",
        cli.output_path.display(),
        report.pages,
        cli.image_paths.len()
    );
}
