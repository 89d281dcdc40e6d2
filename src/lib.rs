pub mod cli;
pub mod page;
pub mod utils;

use anyhow::{Result, anyhow};
use log::{debug, info, trace, warn};
use lopdf::{Document, Object, ObjectId, dictionary};
use std::fmt;
use std::path::{Path, PathBuf};

const PDF_VERSION: &str = "1.7";
const PARTIAL_OUTPUT_SUFFIX: &str = ".partial";

/// An input that did not make it into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedInput {
    pub path: PathBuf,
    /// Zero-based index of the input among all the inputs.
    pub position: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file could not be read or decoded as an image.
    Decode(String),
    /// The decoded image could not be turned into a page.
    Wrap(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Decode(err) => write!(f, "not a decodable image: {err}"),
            SkipReason::Wrap(err) => write!(f, "cannot be made into a page: {err}"),
        }
    }
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub pages: usize,
    pub skipped: Vec<SkippedInput>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// Fail, without writing anything, if any input is skipped.
    pub strict: bool,
}

/// Write to `output_path` a PDF document with one page per decodable image of
/// `image_paths`, in the given order.
///
/// Inputs that cannot be decoded or wrapped as a page are skipped and listed
/// in the returned report. A document without pages is never written: if no
/// input could be converted an error is returned instead.
pub fn convert_images_to_pdf(
    image_paths: &[impl AsRef<Path>],
    output_path: impl AsRef<Path>,
) -> Result<ConversionReport> {
    convert_images_to_pdf_with(image_paths, output_path, ConvertOptions::default())
}

pub fn convert_images_to_pdf_with(
    image_paths: &[impl AsRef<Path>],
    output_path: impl AsRef<Path>,
    options: ConvertOptions,
) -> Result<ConversionReport> {
    let output_path = output_path.as_ref();

    let (mut doc, skipped) = build_images_doc(image_paths);
    let pages = doc.get_pages().len();

    if pages == 0 {
        return Err(anyhow!(
            "None of the {} input images could be converted, '{}' was not written",
            image_paths.len(),
            output_path.display()
        ));
    }

    if options.strict && !skipped.is_empty() {
        return Err(anyhow!(
            "{} of the {} input images could not be converted (first: '{}'), \
            '{}' was not written",
            skipped.len(),
            image_paths.len(),
            skipped[0].path.display(),
            output_path.display()
        ));
    }

    save_doc(&mut doc, output_path)?;
    info!(
        "Saved '{}' with {pages} pages ({} inputs skipped)",
        output_path.display(),
        skipped.len()
    );

    Ok(ConversionReport { pages, skipped })
}

/// Build a document with one page per image of `image_paths`, in order.
///
/// Per-input failures are not errors: the input is left out of the document
/// and recorded among the returned skipped inputs.
pub fn build_images_doc(image_paths: &[impl AsRef<Path>]) -> (Document, Vec<SkippedInput>) {
    info!("Initialising the document");
    let mut doc = Document::with_version(PDF_VERSION);
    let pages_root_id = initialise_doc_with_empty_pages_root(&mut doc);

    info!("Start appending {} images", image_paths.len());
    let mut skipped = Vec::new();

    for (position, image_path) in image_paths.iter().enumerate() {
        let image_path = image_path.as_ref();
        trace!("Input #{position}: '{}'", image_path.display());

        let reason = match page::decode_image(image_path) {
            Err(err) => Some(SkipReason::Decode(format!("{err:#}"))),
            Ok(image) => match page::append_image_page(&mut doc, pages_root_id, &image) {
                Err(err) => Some(SkipReason::Wrap(format!("{err:#}"))),
                Ok(_page_id) => None,
            },
        };

        if let Some(reason) = reason {
            warn!("Skipping '{}': {reason}", image_path.display());
            skipped.push(SkippedInput {
                path: image_path.to_path_buf(),
                position,
                reason,
            });
        }
    }

    (doc, skipped)
}

/// Add to `doc` a catalog and a pages root without kids. Returns the id of
/// the pages root.
pub fn initialise_doc_with_empty_pages_root(doc: &mut Document) -> ObjectId {
    let pages_root_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Object::Array(vec![]),
        "Count" => Object::Integer(0),
    });

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_root_id),
    });
    doc.trailer.set("Root", catalog_id);

    pages_root_id
}

/// Compress and serialize `doc`, then create or replace `output_path` with it.
///
/// The bytes go first to a sibling `<name>.partial` file which is then renamed
/// over `output_path`: when an error is returned the partial file is gone and
/// a previous file at `output_path` is untouched.
pub fn save_doc(doc: &mut Document, output_path: impl AsRef<Path>) -> Result<()> {
    let output_path = output_path.as_ref();

    let file_name = output_path.file_name().ok_or(anyhow!(
        "The output path '{}' does not end with a file name",
        output_path.display()
    ))?;

    let mut partial_name = file_name.to_os_string();
    partial_name.push(PARTIAL_OUTPUT_SUFFIX);
    let partial_path = output_path.with_file_name(partial_name);

    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    debug!("Serialized the document in {} bytes", buffer.len());

    let written = std::fs::write(&partial_path, &buffer)
        .and_then(|()| std::fs::rename(&partial_path, output_path));

    if let Err(err) = written {
        // The partial file may not even have been created.
        let _ = std::fs::remove_file(&partial_path);
        return Err(anyhow!("Could not write '{}': {err}", output_path.display()));
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils;
    use image::ImageFormat;

    #[test]
    fn pages_follow_input_order() -> Result<()> {
        let test_dir = utils::get_virgin_test_dir("pages_follow_input_order")?;
        let image_paths = utils::generate_image_set(&test_dir, 5)?;
        let output_path = format!("{test_dir}/out.pdf");

        let report = convert_images_to_pdf(&image_paths, &output_path)?;

        assert_eq!(report.pages, 5);
        assert!(report.skipped.is_empty());

        let doc = Document::load(&output_path)?;
        let sizes = utils::get_page_sizes(&doc)?;
        let expected_sizes = image_paths
            .iter()
            .map(|image_path| utils::get_image_size(image_path))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(sizes, expected_sizes);

        Ok(())
    }

    #[test]
    fn corrupt_input_is_dropped_without_holding_its_place() -> Result<()> {
        let test_dir =
            utils::get_virgin_test_dir("corrupt_input_is_dropped_without_holding_its_place")?;
        let a_path = format!("{test_dir}/a.jpg");
        let corrupt_path = format!("{test_dir}/corrupt.png");
        let b_path = format!("{test_dir}/b.jpg");
        let output_path = format!("{test_dir}/out.pdf");

        utils::generate_image(&a_path, 40, 30, [255, 0, 0], ImageFormat::Jpeg)?;
        utils::generate_corrupt_file(&corrupt_path, 128)?;
        utils::generate_image(&b_path, 20, 50, [0, 255, 0], ImageFormat::Jpeg)?;

        let report = convert_images_to_pdf(&[&a_path, &corrupt_path, &b_path], &output_path)?;

        assert_eq!(report.pages, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, PathBuf::from(&corrupt_path));
        assert_eq!(report.skipped[0].position, 1);
        assert!(matches!(report.skipped[0].reason, SkipReason::Decode(_)));

        let doc = Document::load(&output_path)?;
        assert_eq!(utils::get_page_sizes(&doc)?, vec![(40, 30), (20, 50)]);

        Ok(())
    }

    #[test]
    fn missing_input_is_skipped() -> Result<()> {
        let test_dir = utils::get_virgin_test_dir("missing_input_is_skipped")?;
        let image_path = format!("{test_dir}/present.png");
        let missing_path = format!("{test_dir}/missing.png");
        let output_path = format!("{test_dir}/out.pdf");

        utils::generate_image(&image_path, 8, 8, [1, 2, 3], ImageFormat::Png)?;

        let report = convert_images_to_pdf(&[&missing_path, &image_path], &output_path)?;

        assert_eq!(report.pages, 1);
        assert_eq!(report.skipped[0].position, 0);
        assert_eq!(Document::load(&output_path)?.get_pages().len(), 1);

        Ok(())
    }

    #[test]
    fn no_decodable_input_writes_nothing() -> Result<()> {
        let test_dir = utils::get_virgin_test_dir("no_decodable_input_writes_nothing")?;
        let corrupt_path = format!("{test_dir}/corrupt.jpg");
        let output_path = format!("{test_dir}/out.pdf");

        utils::generate_corrupt_file(&corrupt_path, 32)?;

        let missing_path = format!("{test_dir}/missing.png");
        let result = convert_images_to_pdf(&[&corrupt_path, &missing_path], &output_path);

        assert!(result.is_err());
        assert!(!std::fs::exists(&output_path)?);

        Ok(())
    }

    #[test]
    fn strict_conversion_refuses_skipped_inputs() -> Result<()> {
        let test_dir = utils::get_virgin_test_dir("strict_conversion_refuses_skipped_inputs")?;
        let image_path = format!("{test_dir}/image.png");
        let corrupt_path = format!("{test_dir}/corrupt.png");
        let output_path = format!("{test_dir}/out.pdf");

        utils::generate_image(&image_path, 8, 8, [9, 9, 9], ImageFormat::Png)?;
        utils::generate_corrupt_file(&corrupt_path, 32)?;

        let result = convert_images_to_pdf_with(
            &[&image_path, &corrupt_path],
            &output_path,
            ConvertOptions { strict: true },
        );

        assert!(result.is_err());
        assert!(!std::fs::exists(&output_path)?);

        Ok(())
    }

    #[test]
    fn unwritable_output_leaves_no_file() -> Result<()> {
        let test_dir = utils::get_virgin_test_dir("unwritable_output_leaves_no_file")?;
        let image_paths = utils::generate_image_set(&test_dir, 2)?;
        let output_path = format!("{test_dir}/no_such_dir/out.pdf");

        assert!(convert_images_to_pdf(&image_paths, &output_path).is_err());
        assert!(!std::fs::exists(&output_path)?);
        assert!(!std::fs::exists(format!("{output_path}{PARTIAL_OUTPUT_SUFFIX}"))?);

        Ok(())
    }

    #[test]
    fn reconversion_overwrites_with_identical_bytes() -> Result<()> {
        let test_dir = utils::get_virgin_test_dir("reconversion_overwrites_with_identical_bytes")?;
        let image_paths = utils::generate_image_set(&test_dir, 3)?;
        let output_path = format!("{test_dir}/out.pdf");

        std::fs::write(&output_path, b"stale content")?;

        convert_images_to_pdf(&image_paths, &output_path)?;
        let first_bytes = std::fs::read(&output_path)?;

        convert_images_to_pdf(&image_paths, &output_path)?;
        let second_bytes = std::fs::read(&output_path)?;

        assert_eq!(first_bytes, second_bytes);
        assert_eq!(Document::load(&output_path)?.get_pages().len(), 3);
        assert!(!std::fs::exists(format!("{output_path}{PARTIAL_OUTPUT_SUFFIX}"))?);

        Ok(())
    }

    #[test]
    fn saved_pixels_match_the_input() -> Result<()> {
        let test_dir = utils::get_virgin_test_dir("saved_pixels_match_the_input")?;
        let image_path = format!("{test_dir}/flat.png");
        let output_path = format!("{test_dir}/out.pdf");

        utils::generate_image(&image_path, 5, 4, [12, 34, 56], ImageFormat::Png)?;
        convert_images_to_pdf(&[&image_path], &output_path)?;

        let doc = Document::load(&output_path)?;
        let samples = utils::get_page_image_samples(&doc, 1)?;
        assert_eq!(samples, [12u8, 34, 56].repeat(5 * 4));

        Ok(())
    }
}
