//! Image preprocessing: bound the dimensions and re-encode before upload so
//! oversized originals don't dominate upload time and storage.
//!
//! Failures here are never fatal. A file that cannot be decoded or
//! re-encoded is uploaded as-is.

use std::io::Cursor;

use bytes::Bytes;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat};

/// Target bounding box and JPEG quality for one input size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPlan {
	pub max_dimension: u32,
	pub quality: u8,
}

/// Step function over the input size: the larger the original, the smaller
/// the bounding box and the lower the quality.
pub fn plan_for(input_len: usize) -> CompressionPlan {
	const MIB: usize = 1024 * 1024;

	match input_len {
		len if len <= MIB => CompressionPlan {
			max_dimension: 2048,
			quality: 85,
		},
		len if len <= 4 * MIB => CompressionPlan {
			max_dimension: 1600,
			quality: 80,
		},
		len if len <= 10 * MIB => CompressionPlan {
			max_dimension: 1280,
			quality: 75,
		},
		_ => CompressionPlan {
			max_dimension: 1024,
			quality: 70,
		},
	}
}

/// Compresses an image, falling back to the original bytes on any failure.
///
/// The CPU-heavy decode/resize/encode runs on the blocking thread pool.
pub async fn compress(bytes: Bytes) -> Bytes {
	let input = bytes.clone();

	match tokio::task::spawn_blocking(move || compress_blocking(&input)).await {
		Ok(Ok(output)) => output,
		Ok(Err(error)) => {
			tracing::warn!(%error, "image preprocessing failed, uploading original bytes");
			bytes
		}
		Err(error) => {
			tracing::warn!(%error, "image preprocessing task panicked, uploading original bytes");
			bytes
		}
	}
}

/// PNG stays PNG; every other decodable format is normalized to JPEG at the
/// plan's quality. JPEG has no alpha channel, so the pixel data is flattened
/// to RGB before encoding.
fn compress_blocking(data: &[u8]) -> Result<Bytes, image::ImageError> {
	let plan = plan_for(data.len());
	let format = image::guess_format(data)?;
	let img = image::load_from_memory(data)?;

	let (width, height) = img.dimensions();
	let img = if width > plan.max_dimension || height > plan.max_dimension {
		img.resize(plan.max_dimension, plan.max_dimension, FilterType::Triangle)
	} else {
		img
	};

	let mut buf = Vec::new();
	let mut cursor = Cursor::new(&mut buf);

	match format {
		ImageFormat::Png => img.write_to(&mut cursor, ImageOutputFormat::Png)?,
		_ => DynamicImage::ImageRgb8(img.to_rgb8())
			.write_to(&mut cursor, ImageOutputFormat::Jpeg(plan.quality))?,
	}

	Ok(Bytes::from(buf))
}

#[cfg(test)]
mod test {
	use super::*;

	fn png_bytes(width: u32, height: u32) -> Bytes {
		let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
			width,
			height,
			image::Rgb([120, 80, 40]),
		));
		let mut buf = Vec::new();
		img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
			.unwrap();
		Bytes::from(buf)
	}

	#[test]
	fn test_plan_steps_down_with_size() {
		const MIB: usize = 1024 * 1024;

		assert_eq!(
			plan_for(512 * 1024),
			CompressionPlan {
				max_dimension: 2048,
				quality: 85
			}
		);
		assert_eq!(
			plan_for(2 * MIB),
			CompressionPlan {
				max_dimension: 1600,
				quality: 80
			}
		);
		assert_eq!(
			plan_for(8 * MIB),
			CompressionPlan {
				max_dimension: 1280,
				quality: 75
			}
		);
		assert_eq!(
			plan_for(32 * MIB),
			CompressionPlan {
				max_dimension: 1024,
				quality: 70
			}
		);
	}

	#[tokio::test]
	async fn test_compress_bounds_dimensions() {
		let original = png_bytes(3000, 1000);

		let output = compress(original).await;
		let img = image::load_from_memory(&output).unwrap();

		assert!(img.width() <= 2048);
		assert!(img.height() <= 2048);
	}

	#[tokio::test]
	async fn test_compress_keeps_small_images_decodable() {
		let original = png_bytes(100, 50);

		let output = compress(original).await;
		let img = image::load_from_memory(&output).unwrap();

		assert_eq!((img.width(), img.height()), (100, 50));
	}

	#[tokio::test]
	async fn test_compress_falls_back_on_garbage() {
		let original = Bytes::from_static(b"definitely not an image");

		let output = compress(original.clone()).await;

		assert_eq!(output, original);
	}
}
