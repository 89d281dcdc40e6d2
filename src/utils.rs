use anyhow::{Result, anyhow};
use image::{ImageFormat, Rgb, RgbImage};
use lopdf::{Document, ObjectId, Stream};
use rand::Rng;
use std::path::{Path, PathBuf};

use crate::page::IMAGE_RESOURCE_NAME;

const TEST_DIR: &str = "dev-playground/test";
const IMAGE_SET_FORMATS: [ImageFormat; 3] = [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Bmp];

/// Remove and recreate the directory `dev-playground/test/<dir_name>`.
pub fn get_virgin_test_dir(dir_name: impl AsRef<Path>) -> Result<String> {
    let dir_path = format!("{TEST_DIR}/{}", dir_name.as_ref().display());

    if std::fs::exists(&dir_path)? {
        std::fs::remove_dir_all(&dir_path)?;
    }

    std::fs::create_dir_all(&dir_path)?;
    Ok(dir_path)
}

/// Write an image of a single colour.
pub fn generate_image(
    image_path: impl AsRef<Path>,
    width: u32,
    height: u32,
    rgb: [u8; 3],
    format: ImageFormat,
) -> Result<()> {
    RgbImage::from_pixel(width, height, Rgb(rgb)).save_with_format(image_path, format)?;
    Ok(())
}

/// Write an image of random noise.
pub fn generate_random_image(
    image_path: impl AsRef<Path>,
    width: u32,
    height: u32,
    format: ImageFormat,
) -> Result<()> {
    let mut rng = rand::rng();
    RgbImage::from_fn(width, height, |_x, _y| Rgb(rng.random()))
        .save_with_format(image_path, format)?;
    Ok(())
}

/// Generate `num_images` random images in `dir_path`, cycling through PNG,
/// JPEG and BMP. The images have pairwise distinct sizes, so that each page of
/// a converted document can be traced back to its input.
///
/// Returns the paths of the images in generation order.
pub fn generate_image_set(dir_path: impl AsRef<Path>, num_images: u32) -> Result<Vec<PathBuf>> {
    let dir_path = dir_path.as_ref();

    if !dir_path.is_dir() {
        return Err(anyhow!(
            "The path '{}' is not a directory",
            dir_path.display()
        ));
    }

    (0..num_images)
        .map(|index| {
            let format = IMAGE_SET_FORMATS[index as usize % IMAGE_SET_FORMATS.len()];
            let extension = format.extensions_str().first().copied().unwrap_or("img");
            let image_path = dir_path.join(format!("image_{index:03}.{extension}"));

            generate_random_image(&image_path, 16 + index * 3, 48 - index % 7, format)?;
            Ok(image_path)
        })
        .collect()
}

/// Write `len` random bytes, which no image decoder accepts.
pub fn generate_corrupt_file(file_path: impl AsRef<Path>, len: usize) -> Result<()> {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(&mut bytes[..]);
    // None of the decodable formats starts with a zero byte.
    if let Some(first) = bytes.first_mut() {
        *first = 0;
    }

    std::fs::write(file_path, bytes)?;
    Ok(())
}

/// A document with a catalog and a pages root without kids, with the id of
/// the pages root.
pub fn get_empty_doc() -> Result<(Document, ObjectId)> {
    let mut doc = Document::with_version(crate::PDF_VERSION);
    let pages_root_id = crate::initialise_doc_with_empty_pages_root(&mut doc);

    if !doc.get_pages().is_empty() {
        return Err(anyhow!("The freshly initialised document has pages"));
    }

    Ok((doc, pages_root_id))
}

pub fn get_image_size(image_path: impl AsRef<Path>) -> Result<(i64, i64)> {
    let (width, height) = image::image_dimensions(image_path)?;
    Ok((i64::from(width), i64::from(height)))
}

/// Width and height of the MediaBox of a page.
pub fn get_page_size(doc: &Document, page_id: ObjectId) -> Result<(i64, i64)> {
    let media_box = doc.get_dictionary(page_id)?.get(b"MediaBox")?.as_array()?;

    match media_box.as_slice() {
        [x0, y0, x1, y1] => Ok((
            x1.as_i64()? - x0.as_i64()?,
            y1.as_i64()? - y0.as_i64()?,
        )),
        _ => Err(anyhow!(
            "The MediaBox of the page {page_id:?} has {} entries instead of 4",
            media_box.len()
        )),
    }
}

/// Sizes of all the pages of `doc`, in page order.
pub fn get_page_sizes(doc: &Document) -> Result<Vec<(i64, i64)>> {
    doc.get_pages()
        .values()
        .map(|&page_id| get_page_size(doc, page_id))
        .collect()
}

/// The image XObject drawn on a page.
pub fn get_page_image(doc: &Document, page_id: ObjectId) -> Result<&Stream> {
    let image_id = doc
        .get_dictionary(page_id)?
        .get(b"Resources")?
        .as_dict()?
        .get(b"XObject")?
        .as_dict()?
        .get(IMAGE_RESOURCE_NAME.as_bytes())?
        .as_reference()?;

    Ok(doc.get_object(image_id)?.as_stream()?)
}

/// Decompressed samples of the image on page `page_number` (1-based).
pub fn get_page_image_samples(doc: &Document, page_number: u32) -> Result<Vec<u8>> {
    let page_id = *doc.get_pages().get(&page_number).ok_or(anyhow!(
        "The document has no page {page_number}"
    ))?;

    let image = get_page_image(doc, page_id)?;
    if image.dict.has(b"Filter") {
        Ok(image.decompressed_content()?)
    } else {
        Ok(image.content.clone())
    }
}
