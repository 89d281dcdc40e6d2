use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use image::ImageFormat;
use images2pdf::utils::{generate_corrupt_file, generate_image_set, generate_random_image};
use std::path::Path;

/// Generate sample inputs for images2pdf: images of random noise, and files which
/// no image decoder accepts.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Desired action
    #[command(subcommand)]
    cmd: ToolCmd,
}

#[derive(Subcommand, Debug)]
enum ToolCmd {
    /// Generate one image of random noise
    RandomImage {
        /// Output path
        #[arg(short = 'o')]
        output_path: String,
        /// Width in pixels
        #[arg(short = 'w', default_value_t = 64)]
        width: u32,
        /// Height in pixels
        #[arg(short = 'H', default_value_t = 64)]
        height: u32,
        /// Encoding of the image
        #[arg(short = 'f', value_enum, default_value_t = Format::Png)]
        format: Format,
    },
    /// Generate images of pairwise distinct sizes in an existing directory
    ImageSet {
        /// Directory receiving the images
        #[arg(short = 'd')]
        dir_path: String,
        /// Number of images
        #[arg(short = 'n')]
        num_images: u32,
    },
    /// Generate a file of random bytes
    CorruptFile {
        /// Output path
        #[arg(short = 'o')]
        output_path: String,
        /// Length in bytes
        #[arg(short = 'l', default_value_t = 256)]
        len: usize,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Png,
    Jpeg,
    Bmp,
    Tiff,
}

impl From<Format> for ImageFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Png => ImageFormat::Png,
            Format::Jpeg => ImageFormat::Jpeg,
            Format::Bmp => ImageFormat::Bmp,
            Format::Tiff => ImageFormat::Tiff,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.cmd {
        ToolCmd::RandomImage {
            output_path,
            width,
            height,
            format,
        } => refuse_existing(&output_path)
            .and_then(|()| generate_random_image(&output_path, width, height, format.into())),
        ToolCmd::ImageSet {
            dir_path,
            num_images,
        } => generate_image_set(&dir_path, num_images).map(|image_paths| {
            for image_path in image_paths {
                println!("{}", image_path.display());
            }
        }),
        ToolCmd::CorruptFile { output_path, len } => {
            refuse_existing(&output_path).and_then(|()| generate_corrupt_file(&output_path, len))
        }
    };

    if let Err(err) = result {
        eprintln!("Error encountered: {}", err);
        std::process::exit(1);
    }
}

fn refuse_existing(output_path: impl AsRef<Path>) -> Result<()> {
    let output_path = output_path.as_ref();

    if std::fs::exists(output_path)? {
        return Err(anyhow!(
            "A file at location '{}' exists already",
            output_path.display()
        ));
    }

    Ok(())
}
