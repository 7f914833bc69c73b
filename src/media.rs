use std::{io::ErrorKind, path::Path};

use image::ImageFormat;
use log::{info, warn};
use uuid::Uuid;

use crate::{constants::RECIPE_IMAGE_DIR, error::Error};

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Sniffs the format from the bytes and decodes the whole image. Anything
/// that fails either step is not an image.
pub fn inspect_image(data: &[u8]) -> Result<ImageFormat, Error> {
    if data.is_empty() {
        return Err(Error::validation("image", "The submitted file is empty."));
    }

    let format = image::guess_format(data).map_err(|_| Error::validation("image", INVALID_IMAGE))?;
    image::load_from_memory_with_format(data, format)
        .map_err(|_| Error::validation("image", INVALID_IMAGE))?;

    Ok(format)
}

/// Extension of the uploaded name when it belongs to the detected format,
/// otherwise the format's own. Served content types follow the extension.
fn file_extension(filename: Option<&str>, format: ImageFormat) -> String {
    let known = format.extensions_str();
    let extension = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| known.contains(&ext.as_str()));

    extension.unwrap_or_else(|| known.first().copied().unwrap_or("img").to_string())
}

fn image_path_with_id(id: &str, filename: Option<&str>, format: ImageFormat) -> String {
    format!("{RECIPE_IMAGE_DIR}/{id}.{}", file_extension(filename, format))
}

/// Relative path for a new recipe image. Every call yields a fresh name.
pub fn recipe_image_file_path(filename: Option<&str>, format: ImageFormat) -> String {
    image_path_with_id(&Uuid::new_v4().to_string(), filename, format)
}

/// Validates and writes an uploaded image under the media root, returning
/// its path relative to the root.
pub async fn store_recipe_image(
    media_root: &Path,
    filename: Option<&str>,
    data: &[u8],
) -> Result<String, Error> {
    let format = inspect_image(data)?;
    let relative = recipe_image_file_path(filename, format);

    tokio::fs::create_dir_all(media_root.join(RECIPE_IMAGE_DIR)).await?;
    tokio::fs::write(media_root.join(&relative), data).await?;

    info!("Stored {} ({} bytes)", relative, data.len());
    Ok(relative)
}

pub async fn remove_media_file(media_root: &Path, relative: &str) {
    match tokio::fs::remove_file(media_root.join(relative)).await {
        Ok(()) => info!("Removed {relative}"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {relative}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageBuffer, Rgb};

    use super::*;

    fn png() -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(4, 4);
        let mut data = Vec::new();
        img.write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
            .unwrap();
        data
    }

    #[test]
    fn image_path_uses_id_and_extension() {
        let path = image_path_with_id("mock-test-uuid", Some("myimage.jpg"), ImageFormat::Jpeg);
        assert_eq!(path, "uploads/recipe/mock-test-uuid.jpg");
    }

    #[test]
    fn extension_falls_back_to_format() {
        assert_eq!(file_extension(Some("photo"), ImageFormat::Png), "png");
        assert_eq!(file_extension(None, ImageFormat::Jpeg), "jpg");
        assert_eq!(file_extension(Some("evil.p/ng"), ImageFormat::Png), "png");
        assert_eq!(file_extension(Some("Holiday.PNG"), ImageFormat::Png), "png");
        assert_eq!(file_extension(Some("photo.jpeg"), ImageFormat::Jpeg), "jpeg");
    }

    #[test]
    fn extension_must_match_detected_format() {
        assert_eq!(file_extension(Some("x.html"), ImageFormat::Png), "png");
        assert_eq!(file_extension(Some("x.svg"), ImageFormat::Png), "png");
        assert_eq!(file_extension(Some("x.jpg"), ImageFormat::Png), "png");
    }

    #[test]
    fn generated_paths_are_unique() {
        let a = recipe_image_file_path(Some("a.png"), ImageFormat::Png);
        let b = recipe_image_file_path(Some("a.png"), ImageFormat::Png);
        assert_ne!(a, b);
        assert!(a.starts_with("uploads/recipe/"));
        assert!(a.ends_with(".png"));
    }

    #[test]
    fn non_images_are_rejected() {
        assert!(inspect_image(b"notimage").is_err());
        assert!(inspect_image(b"").is_err());

        let mut truncated = png();
        truncated.truncate(20);
        assert!(inspect_image(&truncated).is_err());
    }

    #[test]
    fn png_is_accepted() {
        assert_eq!(inspect_image(&png()).unwrap(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn stored_image_lands_under_media_root() {
        let root = tempfile::tempdir().unwrap();
        let relative = store_recipe_image(root.path(), Some("x.png"), &png())
            .await
            .unwrap();

        assert!(root.path().join(&relative).exists());
        remove_media_file(root.path(), &relative).await;
        assert!(!root.path().join(&relative).exists());
        remove_media_file(root.path(), &relative).await;
    }
}
