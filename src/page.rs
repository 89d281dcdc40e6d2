//! Decoding of the input files and their wrapping as single-image PDF pages.
//!
//! A page is exactly as large as its image: one pixel becomes one point
//! (72 DPI). The pixels are embedded as 8-bit samples without any lossy
//! re-encoding, and an alpha channel, when it carries any transparency,
//! becomes a soft mask (`SMask`) of the image.

use anyhow::{Result, anyhow};
use image::{DynamicImage, ImageReader};
use log::{debug, trace};
use lopdf::{
    Document, Object, ObjectId, Stream,
    content::{Content, Operation},
    dictionary,
};
use std::path::Path;

/// Name under which a page refers to its image.
pub const IMAGE_RESOURCE_NAME: &str = "Im0";
const BITS_PER_COMPONENT: i64 = 8;

/// Decode the file at `image_path` into an in-memory raster image.
///
/// The format is guessed from the content of the file, the extension is only
/// used when the content is not conclusive.
pub fn decode_image(image_path: impl AsRef<Path>) -> Result<DynamicImage> {
    let image_path = image_path.as_ref();
    trace!("Decode the image '{}'", image_path.display());

    let image = ImageReader::open(image_path)?
        .with_guessed_format()?
        .decode()?;

    debug!(
        "Decoded '{}': {}x{} pixels, {:?}",
        image_path.display(),
        image.width(),
        image.height(),
        image.color()
    );

    Ok(image)
}

/// Append to `doc` a page displaying `image` over its whole surface, as last
/// child of the pages root `pages_root_id`. Returns the id of the new page.
///
/// Nothing is added to the document if an error is returned.
pub fn append_image_page(
    doc: &mut Document,
    pages_root_id: ObjectId,
    image: &DynamicImage,
) -> Result<ObjectId> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(anyhow!(
            "The image has no area ({width}x{height} pixels), it cannot fill a page"
        ));
    }
    let (width, height) = (i64::from(width), i64::from(height));

    let samples = ImageSamples::from_image(image);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![IMAGE_RESOURCE_NAME.into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content = content.encode()?;

    let page_count = get_page_count(doc, pages_root_id)?;

    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => samples.color_space,
        "BitsPerComponent" => BITS_PER_COMPONENT,
    };

    if let Some(alpha) = samples.alpha {
        let smask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => BITS_PER_COMPONENT,
            },
            alpha,
        ));
        image_dict.set("SMask", smask_id);
    }

    let image_id = doc.add_object(Stream::new(image_dict, samples.color));
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_root_id,
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                IMAGE_RESOURCE_NAME => image_id,
            },
        },
        "Contents" => content_id,
    });

    let pages_root = doc.get_object_mut(pages_root_id)?.as_dict_mut()?;
    pages_root
        .get_mut(b"Kids")?
        .as_array_mut()?
        .push(Object::Reference(page_id));
    pages_root.set("Count", Object::Integer(page_count + 1));

    trace!(
        "Page {} ({width}x{height} pt) appended with id {page_id:?}",
        page_count + 1
    );

    Ok(page_id)
}

/// Number of pages below the pages root, checking on the way that the root
/// can receive a new kid.
fn get_page_count(doc: &Document, pages_root_id: ObjectId) -> Result<i64> {
    let pages_root = doc.get_dictionary(pages_root_id)?;
    let kids = pages_root.get(b"Kids")?.as_array()?;
    let count = pages_root.get(b"Count")?.as_i64()?;

    if count != kids.len() as i64 {
        return Err(anyhow!(
            "The pages root {pages_root_id:?} is inconsistent: Count is {count} but it has {} kids",
            kids.len()
        ));
    }

    Ok(count)
}

/// The samples of an image as laid out in a PDF image stream.
struct ImageSamples {
    color_space: &'static str,
    color: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

impl ImageSamples {
    fn from_image(image: &DynamicImage) -> Self {
        let color_type = image.color();

        let (color_space, color, alpha) = match (color_type.has_color(), color_type.has_alpha()) {
            (false, false) => ("DeviceGray", image.to_luma8().into_raw(), None),
            (true, false) => ("DeviceRGB", image.to_rgb8().into_raw(), None),
            (false, true) => {
                let (color, alpha) = split_alpha(&image.to_luma_alpha8().into_raw(), 1);
                ("DeviceGray", color, Some(alpha))
            }
            (true, true) => {
                let (color, alpha) = split_alpha(&image.to_rgba8().into_raw(), 3);
                ("DeviceRGB", color, Some(alpha))
            }
        };

        // A fully opaque alpha channel would only weigh on the file.
        let alpha = alpha.filter(|alpha| alpha.iter().any(|&sample| sample != u8::MAX));

        Self {
            color_space,
            color,
            alpha,
        }
    }
}

fn split_alpha(samples: &[u8], color_channels: usize) -> (Vec<u8>, Vec<u8>) {
    let pixel_len = color_channels + 1;
    let num_pixels = samples.len() / pixel_len;

    let mut color = Vec::with_capacity(num_pixels * color_channels);
    let mut alpha = Vec::with_capacity(num_pixels);

    for pixel in samples.chunks_exact(pixel_len) {
        color.extend_from_slice(&pixel[..color_channels]);
        alpha.push(pixel[color_channels]);
    }

    (color, alpha)
}
