use std::path::{Path, PathBuf};

use axum::extract::{multipart::Field, Multipart};
use image::ImageFormat;
use log::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Directory holding the images of one vehicle.
pub fn vehicle_dir(upload_dir: &str, vehicle_id: Uuid) -> PathBuf {
	Path::new(upload_dir).join("vehicles").join(vehicle_id.to_string())
}

/// Rejects anything that could leave the image directory.
pub fn safe_segment(segment: &str) -> AppResult<&str> {
	if segment.is_empty() || segment.contains("..") || segment.contains('/') || segment.contains('\\') {
		return Err(AppError::BadRequest("invalid file name".to_string()));
	}
	Ok(segment)
}

/// Checks the bytes really are an image and picks the extension to store
/// them under.
pub fn sniff_image(data: &[u8]) -> AppResult<&'static str> {
	let format = image::guess_format(data).map_err(|_| AppError::Unprocessable("upload is not an image".to_string()))?;
	let extension = match format {
		ImageFormat::Png => "png",
		ImageFormat::Jpeg => "jpg",
		ImageFormat::WebP => "webp",
		ImageFormat::Gif => "gif",
		other => {
			return Err(AppError::Unprocessable(format!("unsupported image format {other:?}")));
		}
	};
	image::load_from_memory_with_format(data, format)
		.map_err(|err| AppError::Unprocessable(format!("image could not be decoded: {err}")))?;
	Ok(extension)
}

async fn save_file(dir: &Path, filename: &str, data: &[u8]) -> AppResult<()> {
	tokio::fs::write(dir.join(filename), data).await?;
	Ok(())
}

async fn field_bytes(field: Field<'_>) -> AppResult<Vec<u8>> {
	Ok(field.bytes().await?.to_vec())
}

/// Stores every file part of `multipart` as `img_<n>.<ext>` under `dir`,
/// numbering after the `existing` images, and returns the new names.
pub async fn save_images(mut multipart: Multipart, dir: &Path, existing: usize) -> AppResult<Vec<String>> {
	tokio::fs::create_dir_all(dir).await?;

	let mut saved = Vec::new();
	while let Some(field) = multipart.next_field().await? {
		if field.file_name().is_none() {
			warn!("skipping multipart field {:?} without a file name", field.name());
			continue;
		}
		let data = field_bytes(field).await?;
		let extension = sniff_image(&data)?;
		let img_name = format!("img_{}.{}", existing + saved.len(), extension);
		save_file(dir, &img_name, &data).await?;
		info!("saved image {}", dir.join(&img_name).display());
		saved.push(img_name);
	}

	if saved.is_empty() {
		return Err(AppError::BadRequest("no image files in upload".to_string()));
	}
	Ok(saved)
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use image::{ImageBuffer, Rgb};

	use super::*;

	fn png_bytes() -> Vec<u8> {
		let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(2, 2, Rgb([200, 30, 30]));
		let mut out = Cursor::new(Vec::new());
		img.write_to(&mut out, ImageFormat::Png).unwrap();
		out.into_inner()
	}

	#[test]
	fn png_is_accepted() {
		assert_eq!(sniff_image(&png_bytes()).unwrap(), "png");
	}

	#[test]
	fn text_is_not_an_image() {
		assert!(matches!(sniff_image(b"hello there"), Err(AppError::Unprocessable(_))));
	}

	#[test]
	fn truncated_png_is_rejected() {
		let bytes = png_bytes();
		assert!(sniff_image(&bytes[..bytes.len() / 2]).is_err());
	}

	#[test]
	fn traversal_segments_are_rejected() {
		assert!(safe_segment("img_0.png").is_ok());
		assert!(safe_segment("../secrets").is_err());
		assert!(safe_segment("a/b.png").is_err());
		assert!(safe_segment("").is_err());
	}
}
