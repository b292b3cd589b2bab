use std::io::Cursor;

use pdf_writer::{Filter, Pdf, Ref};

use crate::error::Error;

/// Image data ready to be written as an XObject.
#[derive(Clone, Debug)]
pub enum PreparedImage {
    /// JPEG passes through untouched as DCT data.
    Jpeg {
        data: Vec<u8>,
        width: u32,
        height: u32,
        gray: bool,
    },
    /// Everything else is decoded and stored as Flate-compressed RGB with an
    /// optional soft mask.
    Raster {
        rgb: Vec<u8>,
        alpha: Option<Vec<u8>>,
        width: u32,
        height: u32,
    },
}

impl PreparedImage {
    pub fn pixel_size(&self) -> (u32, u32) {
        match self {
            PreparedImage::Jpeg { width, height, .. } | PreparedImage::Raster { width, height, .. } => {
                (*width, *height)
            }
        }
    }
}

/// Decode and validate chart bytes. Fails with `Error::Asset` for empty,
/// unknown or corrupt payloads.
pub fn prepare_image(bytes: &[u8]) -> Result<PreparedImage, Error> {
    if bytes.is_empty() {
        return Err(Error::Asset("empty image payload".into()));
    }
    let format = image::guess_format(bytes)
        .map_err(|e| Error::Asset(format!("unrecognized image format: {e}")))?;

    if format == image::ImageFormat::Jpeg {
        let decoder = image::ImageReader::with_format(Cursor::new(bytes), format);
        let decoded = decoder
            .decode()
            .map_err(|e| Error::Asset(format!("corrupt JPEG: {e}")))?;
        let gray = matches!(
            decoded.color(),
            image::ColorType::L8 | image::ColorType::L16
        );
        return Ok(PreparedImage::Jpeg {
            data: bytes.to_vec(),
            width: decoded.width(),
            height: decoded.height(),
            gray,
        });
    }

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| Error::Asset(format!("corrupt {format:?} image: {e}")))?;
    let rgba: image::RgbaImage = decoded.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());
    if width == 0 || height == 0 {
        return Err(Error::Asset("image has no pixels".into()));
    }
    let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);

    let rgb_data: Vec<u8> = rgba
        .pixels()
        .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
        .collect();
    let rgb = miniz_oxide::deflate::compress_to_vec_zlib(&rgb_data, 6);
    let alpha = has_alpha.then(|| {
        let alpha_data: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
        miniz_oxide::deflate::compress_to_vec_zlib(&alpha_data, 6)
    });

    Ok(PreparedImage::Raster {
        rgb,
        alpha,
        width,
        height,
    })
}

pub(crate) fn embed_image(pdf: &mut Pdf, alloc: &mut impl FnMut() -> Ref, img: &PreparedImage) -> Ref {
    let xobj_ref = alloc();
    match img {
        PreparedImage::Jpeg {
            data,
            width,
            height,
            gray,
        } => {
            let mut xobj = pdf.image_xobject(xobj_ref, data);
            xobj.filter(Filter::DctDecode);
            xobj.width(*width as i32);
            xobj.height(*height as i32);
            if *gray {
                xobj.color_space().device_gray();
            } else {
                xobj.color_space().device_rgb();
            }
            xobj.bits_per_component(8);
        }
        PreparedImage::Raster {
            rgb,
            alpha,
            width,
            height,
        } => {
            let smask_ref = alpha.as_ref().map(|alpha| {
                let mask_ref = alloc();
                let mut mask = pdf.image_xobject(mask_ref, alpha);
                mask.filter(Filter::FlateDecode);
                mask.width(*width as i32);
                mask.height(*height as i32);
                mask.color_space().device_gray();
                mask.bits_per_component(8);
                mask_ref
            });

            let mut xobj = pdf.image_xobject(xobj_ref, rgb);
            xobj.filter(Filter::FlateDecode);
            xobj.width(*width as i32);
            xobj.height(*height as i32);
            xobj.color_space().device_rgb();
            xobj.bits_per_component(8);
            if let Some(mask_ref) = smask_ref {
                xobj.s_mask(mask_ref);
            }
        }
    }
    xobj_ref
}
