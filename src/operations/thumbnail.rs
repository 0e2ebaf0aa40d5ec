use crate::common::errors::CaptureError;
use crate::config::structure::ThumbnailSpec;
use image::{DynamicImage, codecs::jpeg::JpegEncoder};
use std::{
    fs::{File, create_dir_all},
    io::{BufWriter, Write},
    path::Path,
};

/// Decode a freshly captured image, shrink it to fit the bounding box and
/// persist it as a JPEG. Returns the thumbnail's dimensions.
pub fn generate_thumbnail(
    image_bytes: &[u8],
    spec: &ThumbnailSpec,
    target: &Path,
) -> Result<(u32, u32), CaptureError> {
    let thumbnail_error = |source| CaptureError::Thumbnail {
        path: target.to_path_buf(),
        source,
    };

    let dynamic_image = image::load_from_memory(image_bytes).map_err(thumbnail_error)?;
    let thumbnail_image = fit_within(&dynamic_image, spec.width, spec.height).to_rgb8();

    // Ensure the directory exists
    if let Some(parent_path) = target.parent() {
        create_dir_all(parent_path).map_err(|error| CaptureError::storage(parent_path, error))?;
    }

    let file = File::create(target).map_err(|error| CaptureError::storage(target, error))?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, spec.quality)
        .encode_image(&thumbnail_image)
        .map_err(thumbnail_error)?;
    writer
        .flush()
        .map_err(|error| CaptureError::storage(target, error))?;

    Ok(thumbnail_image.dimensions())
}

/// Scale down, preserving aspect ratio, so both sides fit the box.
/// Images already inside the box are left at their size.
fn fit_within(image: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if image.width() <= max_width && image.height() <= max_height {
        image.clone()
    } else {
        image.thumbnail(max_width, max_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::template::PathTemplate;
    use image::{ImageFormat, RgbImage};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn spec(width: u32, height: u32) -> ThumbnailSpec {
        ThumbnailSpec {
            width,
            height,
            path_template: PathTemplate::parse("thumb-{datetime}.jpg").unwrap(),
            quality: 60,
        }
    }

    #[test]
    fn preserves_aspect_ratio_inside_box() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested/deeper/thumb.jpg");

        let dimensions = generate_thumbnail(&png_bytes(400, 200), &spec(100, 100), &target).unwrap();

        assert_eq!(dimensions, (100, 50));
        let written = image::open(&target).unwrap();
        assert_eq!((written.width(), written.height()), (100, 50));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("thumb.jpg");

        let dimensions = generate_thumbnail(&png_bytes(40, 30), &spec(100, 100), &target).unwrap();

        assert_eq!(dimensions, (40, 30));
    }

    #[test]
    fn undecodable_bytes_are_a_thumbnail_error() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("thumb.jpg");

        let result = generate_thumbnail(b"not an image", &spec(100, 100), &target);

        assert!(matches!(result, Err(CaptureError::Thumbnail { .. })));
        assert!(!target.exists());
    }
}
