// ==================== QR CODE ====================
// PNG with the bot link, sent as a photo on /qr and saved to disk.

use crate::{models::Reply, utils::error::AppError};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;
use std::path::{Path, PathBuf};

const MODULE_SIZE_PX: u32 = 10;

/// Renders `data` as a PNG: error correction L, 10px modules,
/// standard 4-module quiet zone, black on white
pub fn render_png(data: &str) -> Result<Vec<u8>, AppError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)
        .map_err(|e| AppError::QrError(format!("Failed to encode '{}': {}", data, e)))?;

    let image = code
        .render::<Luma<u8>>()
        .module_dimensions(MODULE_SIZE_PX, MODULE_SIZE_PX)
        .quiet_zone(true)
        .dark_color(Luma([0u8]))
        .light_color(Luma([255u8]))
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| AppError::QrError(format!("Failed to encode PNG: {}", e)))?;

    Ok(png)
}

/// Renders and saves the PNG, returning its bytes
pub fn generate(data: &str, path: &Path) -> Result<Vec<u8>, AppError> {
    let png = render_png(data)?;
    std::fs::write(path, &png).map_err(|e| {
        AppError::QrError(format!("Failed to save {}: {}", path.display(), e))
    })?;
    Ok(png)
}

#[derive(Debug, Clone)]
pub struct QrService {
    bot_link: String,
    output_path: PathBuf,
}

impl QrService {
    pub fn new(bot_link: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            bot_link: bot_link.into(),
            output_path: output_path.into(),
        }
    }

    pub fn photo_reply(&self) -> Result<Reply, AppError> {
        let png = generate(&self.bot_link, &self.output_path)?;
        log::info!("🔳 QR code for {} saved to {}", self.bot_link, self.output_path.display());

        Ok(Reply::Photo {
            png,
            caption: format!(
                "QR code for finding the bot, saved to {}.",
                self.output_path.display()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_render_png() {
        let png = render_png("https://t.me/zapadny_bot").unwrap();
        assert!(png.starts_with(&PNG_SIGNATURE));

        let decoded = image::load_from_memory(&png).unwrap();
        // Smallest symbol is 21 modules, plus the quiet zone on both sides
        assert!(decoded.width() >= (21 + 8) * MODULE_SIZE_PX);
        assert_eq!(decoded.width() % MODULE_SIZE_PX, 0);
        assert_eq!(decoded.width(), decoded.height());
    }

    #[test]
    fn test_photo_reply_saves_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qr.png");
        let service = QrService::new("https://t.me/zapadny_bot", &path);

        let reply = service.photo_reply().unwrap();
        match reply {
            Reply::Photo { png, caption } => {
                assert_eq!(std::fs::read(&path).unwrap(), png);
                assert!(caption.contains("qr.png"));
            }
            other => panic!("expected a photo, got {:?}", other),
        }
    }
}
