//! Decoded images, ready to be uploaded to textures.
//!
//! Decoding is done by the [image] crate. Images with an alpha channel are decoded as RGBA8, any
//! other as RGB8. Rows are kept in file order (top row first).
//!
//! [image]: https://crates.io/crates/image

use crate::pixel::PixelFormat;
use std::error;
use std::fmt;
use std::path::{Path, PathBuf};

/// Errors that might happen while loading images.
#[non_exhaustive]
#[derive(Debug)]
pub enum ImageError {
  /// The file couldn’t be opened or decoded.
  Load {
    path: PathBuf,
    error: image::ImageError,
  },
  /// The bytes couldn’t be decoded.
  Decode(image::ImageError),
  /// Raw pixels don’t match the announced size and format.
  SizeMismatch { expected: usize, provided: usize },
}

impl ImageError {
  pub fn size_mismatch(expected: usize, provided: usize) -> Self {
    ImageError::SizeMismatch { expected, provided }
  }
}

impl fmt::Display for ImageError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match self {
      ImageError::Load { path, error } => {
        write!(f, "cannot load image {}: {}", path.display(), error)
      }
      ImageError::Decode(e) => write!(f, "cannot decode image: {}", e),
      ImageError::SizeMismatch { expected, provided } => write!(
        f,
        "image pixel size mismatch: expected {} bytes, got {}",
        expected, provided
      ),
    }
  }
}

impl error::Error for ImageError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      ImageError::Load { error, .. } => Some(error),
      ImageError::Decode(e) => Some(e),
      ImageError::SizeMismatch { .. } => None,
    }
  }
}

/// Decoded image.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
  size: [u32; 2],
  format: PixelFormat,
  pixels: Vec<u8>,
}

impl Image {
  /// Decode an image file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ImageError> {
    let path = path.as_ref();

    let img = image::open(path).map_err(|error| {
      let err = ImageError::Load {
        path: path.to_owned(),
        error,
      };
      log::error!("{}", err);
      err
    })?;

    log::debug!("loaded image {}", path.display());

    Ok(Self::from_dynamic(img))
  }

  /// Decode an in-memory encoded image; the format is guessed from the content.
  pub fn from_memory(bytes: &[u8]) -> Result<Self, ImageError> {
    let img = image::load_from_memory(bytes).map_err(|e| {
      let err = ImageError::Decode(e);
      log::error!("{}", err);
      err
    })?;

    Ok(Self::from_dynamic(img))
  }

  /// Wrap raw pixels.
  pub fn from_pixels(
    size: [u32; 2],
    format: PixelFormat,
    pixels: Vec<u8>,
  ) -> Result<Self, ImageError> {
    let expected = size[0] as usize * size[1] as usize * format.bytes_per_pixel();

    if pixels.len() != expected {
      return Err(ImageError::size_mismatch(expected, pixels.len()));
    }

    Ok(Image {
      size,
      format,
      pixels,
    })
  }

  fn from_dynamic(img: image::DynamicImage) -> Self {
    let size = [img.width(), img.height()];

    if img.color().has_alpha() {
      Image {
        size,
        format: PixelFormat::RGBA8,
        pixels: img.into_rgba8().into_raw(),
      }
    } else {
      Image {
        size,
        format: PixelFormat::RGB8,
        pixels: img.into_rgb8().into_raw(),
      }
    }
  }

  pub fn size(&self) -> [u32; 2] {
    self.size
  }

  pub fn format(&self) -> PixelFormat {
    self.format
  }

  pub fn pixels(&self) -> &[u8] {
    &self.pixels
  }

  pub fn into_pixels(self) -> Vec<u8> {
    self.pixels
  }

  /// Same image with the rows in reverse order, bottom row first as OpenGL expects.
  pub fn flipped_vertically(&self) -> Self {
    let row = self.size[0] as usize * self.format.bytes_per_pixel();
    let pixels = if row == 0 {
      Vec::new()
    } else {
      self.pixels.chunks_exact(row).rev().flatten().copied().collect()
    };

    Image {
      size: self.size,
      format: self.format,
      pixels,
    }
  }
}
