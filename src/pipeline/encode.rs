//! Image encoding: `DynamicImage` slice → PDF image XObject.
//!
//! Slices are embedded as raw 8-bit RGB samples; the document-level
//! compression pass later wraps every stream in `FlateDecode`. Lossless
//! encoding keeps the screenshot text crisp for the retrieval model, which
//! reads each page as an image.

use image::DynamicImage;
use lopdf::{dictionary, Stream};
use tracing::debug;

/// Name under which a page's slice image is registered in its resources.
pub const SLICE_XOBJECT_NAME: &str = "Im0";

/// Encode one slice as an uncompressed `DeviceRGB` image XObject stream.
///
/// Any alpha channel is discarded; PDF viewers composite image XObjects
/// over the white page anyway.
pub fn encode_slice(img: &DynamicImage) -> Stream {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let samples = rgb.into_raw();
    debug!("Encoded slice {}x{} → {} bytes RGB", width, height, samples.len());

    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
        },
        samples,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_slice() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, Rgba([255, 0, 0, 255])));
        let stream = encode_slice(&img);
        assert_eq!(stream.content.len(), 4 * 3 * 3);
        assert_eq!(&stream.content[..3], &[255, 0, 0]);
        assert_eq!(stream.dict.get(b"Width").unwrap().as_i64().unwrap(), 4);
        assert_eq!(stream.dict.get(b"Height").unwrap().as_i64().unwrap(), 3);
        assert_eq!(
            stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap(),
            b"DeviceRGB"
        );
    }
}
