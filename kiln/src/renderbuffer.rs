//! Render buffers: framebuffer attachments that can’t be sampled.

use crate::context::ContextError;
use crate::functions::{Bind, GlFunctions};
use crate::pixel::PixelFormat;
use gl::types::*;

/// GPU render buffer.
#[derive(Debug)]
pub struct RenderBuffer {
  gl: GlFunctions,
  handle: GLuint,
  format: PixelFormat,
  size: [u32; 2],
}

impl RenderBuffer {
  /// Create a render buffer and allocate its storage.
  pub fn new(gl: &GlFunctions, size: [u32; 2], format: PixelFormat) -> Result<Self, ContextError> {
    let handle = gl.gen_renderbuffer()?;

    let renderbuffer = RenderBuffer {
      gl: gl.clone(),
      handle,
      format,
      size,
    };

    gl.bind_renderbuffer(handle, Bind::Cached)?;
    gl.renderbuffer_storage(
      format.internal_format(),
      [size[0] as GLsizei, size[1] as GLsizei],
    )?;

    log::trace!(
      "created render buffer {}: {}×{} {:?}",
      handle,
      size[0],
      size[1],
      format
    );

    Ok(renderbuffer)
  }

  pub fn handle(&self) -> GLuint {
    self.handle
  }

  pub fn format(&self) -> PixelFormat {
    self.format
  }

  pub fn size(&self) -> [u32; 2] {
    self.size
  }
}

impl Drop for RenderBuffer {
  fn drop(&mut self) {
    match self.gl.delete_renderbuffer(self.handle) {
      Ok(()) => log::trace!("deleted render buffer {}", self.handle),
      Err(e) => log::error!("leaking render buffer {}: {}", self.handle, e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::headless;

  #[test]
  fn storage_and_lifetime() {
    let (gl, driver) = headless();
    let rb = RenderBuffer::new(&gl, [64, 32], PixelFormat::Depth24Stencil8).unwrap();
    let handle = rb.handle();

    assert!(driver.is_renderbuffer(handle));
    assert_eq!(driver.calls("glRenderbufferStorage"), 1);
    assert_eq!(rb.size(), [64, 32]);

    drop(rb);
    assert!(!driver.is_renderbuffer(handle));
  }
}
