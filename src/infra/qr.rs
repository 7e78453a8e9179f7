//! QR code encoder emitting PNG data URIs.

use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{QrCode, types::QrError};

use crate::application::rendering::{EncodeError, ImageEncoder};

const DATA_URI_PREFIX: &str = "data:image/png;base64,";
const QUIET_ZONE_MODULES: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct QrImageEncoder;

impl QrImageEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl ImageEncoder for QrImageEncoder {
    fn encode(&self, url: &str, size: u32) -> Result<String, EncodeError> {
        let code = QrCode::new(url.as_bytes()).map_err(|err| match err {
            QrError::DataTooLong => EncodeError::Payload {
                message: format!("{} bytes do not fit in a QR symbol", url.len()),
            },
            other => EncodeError::Payload {
                message: other.to_string(),
            },
        })?;

        let minimum = code.width() + 2 * QUIET_ZONE_MODULES;
        if size == 0 || (size as usize) < minimum {
            return Err(EncodeError::InvalidSize { size });
        }

        let image = code
            .render::<Luma<u8>>()
            .quiet_zone(true)
            .max_dimensions(size, size)
            .build();

        let mut png = Vec::new();
        DynamicImage::ImageLuma8(image)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|err| EncodeError::Image {
                message: err.to_string(),
            })?;

        Ok(format!("{DATA_URI_PREFIX}{}", STANDARD.encode(png)))
    }
}
