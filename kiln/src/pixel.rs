//! Pixel formats.

use gl::types::GLenum;

/// Storage format of a texture or render buffer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PixelFormat {
  R8,
  RG8,
  RGB8,
  RGBA8,
  /// sRGB color, linear alpha-less.
  SRGB8,
  SRGBA8,
  R16F,
  RGBA16F,
  R32F,
  RGBA32F,
  R32I,
  Depth16,
  Depth24,
  Depth32F,
  Depth24Stencil8,
}

impl PixelFormat {
  /// `(format, internal format, type)` triple used for uploads and downloads.
  pub(crate) fn to_glenums(self) -> (GLenum, GLenum, GLenum) {
    match self {
      PixelFormat::R8 => (gl::RED, gl::R8, gl::UNSIGNED_BYTE),
      PixelFormat::RG8 => (gl::RG, gl::RG8, gl::UNSIGNED_BYTE),
      PixelFormat::RGB8 => (gl::RGB, gl::RGB8, gl::UNSIGNED_BYTE),
      PixelFormat::RGBA8 => (gl::RGBA, gl::RGBA8, gl::UNSIGNED_BYTE),
      PixelFormat::SRGB8 => (gl::RGB, gl::SRGB8, gl::UNSIGNED_BYTE),
      PixelFormat::SRGBA8 => (gl::RGBA, gl::SRGB8_ALPHA8, gl::UNSIGNED_BYTE),
      PixelFormat::R16F => (gl::RED, gl::R16F, gl::HALF_FLOAT),
      PixelFormat::RGBA16F => (gl::RGBA, gl::RGBA16F, gl::HALF_FLOAT),
      PixelFormat::R32F => (gl::RED, gl::R32F, gl::FLOAT),
      PixelFormat::RGBA32F => (gl::RGBA, gl::RGBA32F, gl::FLOAT),
      PixelFormat::R32I => (gl::RED_INTEGER, gl::R32I, gl::INT),
      PixelFormat::Depth16 => (gl::DEPTH_COMPONENT, gl::DEPTH_COMPONENT16, gl::UNSIGNED_SHORT),
      PixelFormat::Depth24 => (gl::DEPTH_COMPONENT, gl::DEPTH_COMPONENT24, gl::UNSIGNED_INT),
      PixelFormat::Depth32F => (gl::DEPTH_COMPONENT, gl::DEPTH_COMPONENT32F, gl::FLOAT),
      PixelFormat::Depth24Stencil8 => (
        gl::DEPTH_STENCIL,
        gl::DEPTH24_STENCIL8,
        gl::UNSIGNED_INT_24_8,
      ),
    }
  }

  pub(crate) fn internal_format(self) -> GLenum {
    self.to_glenums().1
  }

  /// Size of one pixel in client memory.
  pub fn bytes_per_pixel(self) -> usize {
    match self {
      PixelFormat::R8 => 1,
      PixelFormat::RG8 | PixelFormat::R16F | PixelFormat::Depth16 => 2,
      PixelFormat::RGB8 | PixelFormat::SRGB8 => 3,
      PixelFormat::RGBA8
      | PixelFormat::SRGBA8
      | PixelFormat::R32F
      | PixelFormat::R32I
      | PixelFormat::Depth24
      | PixelFormat::Depth32F
      | PixelFormat::Depth24Stencil8 => 4,
      PixelFormat::RGBA16F => 8,
      PixelFormat::RGBA32F => 16,
    }
  }

  pub fn is_depth(self) -> bool {
    matches!(
      self,
      PixelFormat::Depth16
        | PixelFormat::Depth24
        | PixelFormat::Depth32F
        | PixelFormat::Depth24Stencil8
    )
  }

  pub fn has_stencil(self) -> bool {
    self == PixelFormat::Depth24Stencil8
  }

  /// Whether the format can be attached as a color render target.
  pub fn is_color_renderable(self) -> bool {
    !self.is_depth() && self != PixelFormat::SRGB8
  }

  /// Framebuffer attachment point for depth formats.
  pub(crate) fn depth_attachment(self) -> GLenum {
    if self.has_stencil() {
      gl::DEPTH_STENCIL_ATTACHMENT
    } else {
      gl::DEPTH_ATTACHMENT
    }
  }

  /// Depth format for a requested number of depth bits; `0` means no depth.
  pub fn from_depth_bits(bits: u32) -> Option<Self> {
    match bits {
      0 => None,
      1..=16 => Some(PixelFormat::Depth16),
      17..=24 => Some(PixelFormat::Depth24),
      _ => Some(PixelFormat::Depth32F),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn depth_classification() {
    assert!(PixelFormat::Depth24Stencil8.is_depth());
    assert!(!PixelFormat::Depth24Stencil8.is_color_renderable());
    assert!(PixelFormat::RGBA16F.is_color_renderable());
    assert_eq!(
      PixelFormat::Depth24Stencil8.depth_attachment(),
      gl::DEPTH_STENCIL_ATTACHMENT
    );
    assert_eq!(PixelFormat::Depth32F.depth_attachment(), gl::DEPTH_ATTACHMENT);
  }

  #[test]
  fn depth_bits() {
    assert_eq!(PixelFormat::from_depth_bits(0), None);
    assert_eq!(PixelFormat::from_depth_bits(16), Some(PixelFormat::Depth16));
    assert_eq!(PixelFormat::from_depth_bits(24), Some(PixelFormat::Depth24));
    assert_eq!(PixelFormat::from_depth_bits(32), Some(PixelFormat::Depth32F));
  }
}
