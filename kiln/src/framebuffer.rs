//! Framebuffers.
//!
//! A [`FrameBuffer`] is built incrementally: color attachments are set up one after the other at
//! `COLOR_ATTACHMENT0 + index`, then at most one depth (or depth-stencil) attachment, then
//! [`FrameBuffer::check_completion`] must be called once. Attachments are either textures (they
//! can be sampled afterwards) or render buffers, picked at runtime with [`AttachmentKind`].
//!
//! [`FrameBuffer::back_buffer`] wraps the window-provided framebuffer; it has no attachments, is
//! never deleted and is always complete.

use crate::context::ContextError;
use crate::functions::{Bind, GlFunctions};
use crate::pixel::PixelFormat;
use crate::renderbuffer::RenderBuffer;
use crate::texture::{Sampler, Texture, TextureError};
use gl::types::*;
use std::error;
use std::fmt;
use std::rc::Rc;

/// Framebuffer error.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FramebufferError {
  Context(ContextError),
  /// Creating an attachment’s texture failed.
  Texture(TextureError),
  /// The completeness check failed.
  Incomplete(IncompleteReason),
  /// The driver doesn’t support that many color attachments.
  TooManyColorAttachments { max: usize },
  /// The format can’t be used for that attachment.
  UnsupportedFormat(PixelFormat),
  /// The window-provided framebuffer can’t get attachments.
  BackBuffer,
}

impl fmt::Display for FramebufferError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      FramebufferError::Context(ref e) => write!(f, "framebuffer context error: {}", e),
      FramebufferError::Texture(ref e) => write!(f, "framebuffer texture error: {}", e),
      FramebufferError::Incomplete(ref e) => write!(f, "incomplete framebuffer: {}", e),
      FramebufferError::TooManyColorAttachments { max } => {
        write!(f, "too many color attachments (at most {})", max)
      }
      FramebufferError::UnsupportedFormat(format) => {
        write!(f, "unsupported attachment format {:?}", format)
      }
      FramebufferError::BackBuffer => f.write_str("the back buffer cannot have attachments"),
    }
  }
}

impl error::Error for FramebufferError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      FramebufferError::Context(e) => Some(e),
      FramebufferError::Texture(e) => Some(e),
      FramebufferError::Incomplete(e) => Some(e),
      _ => None,
    }
  }
}

impl From<ContextError> for FramebufferError {
  fn from(e: ContextError) -> Self {
    FramebufferError::Context(e)
  }
}

impl From<TextureError> for FramebufferError {
  fn from(e: TextureError) -> Self {
    FramebufferError::Texture(e)
  }
}

impl From<IncompleteReason> for FramebufferError {
  fn from(e: IncompleteReason) -> Self {
    FramebufferError::Incomplete(e)
  }
}

/// Reason a framebuffer is incomplete.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IncompleteReason {
  Undefined,
  /// An attachment has no storage, an empty one, or one of the wrong kind.
  IncompleteAttachment,
  /// No attachment at all.
  MissingAttachment,
  /// A draw buffer names a missing attachment.
  IncompleteDrawBuffer,
  IncompleteReadBuffer,
  Unsupported,
  IncompleteMultisample,
  IncompleteLayerTargets,
  /// Status the driver isn’t supposed to return.
  Unknown(GLenum),
}

impl IncompleteReason {
  fn from_status(status: GLenum) -> Result<(), Self> {
    match status {
      gl::FRAMEBUFFER_COMPLETE => Ok(()),
      gl::FRAMEBUFFER_UNDEFINED => Err(IncompleteReason::Undefined),
      gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => Err(IncompleteReason::IncompleteAttachment),
      gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => Err(IncompleteReason::MissingAttachment),
      gl::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => Err(IncompleteReason::IncompleteDrawBuffer),
      gl::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => Err(IncompleteReason::IncompleteReadBuffer),
      gl::FRAMEBUFFER_UNSUPPORTED => Err(IncompleteReason::Unsupported),
      gl::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => Err(IncompleteReason::IncompleteMultisample),
      gl::FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS => Err(IncompleteReason::IncompleteLayerTargets),
      _ => Err(IncompleteReason::Unknown(status)),
    }
  }
}

impl fmt::Display for IncompleteReason {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      IncompleteReason::Undefined => f.write_str("undefined framebuffer"),
      IncompleteReason::IncompleteAttachment => f.write_str("incomplete attachment"),
      IncompleteReason::MissingAttachment => f.write_str("missing attachment"),
      IncompleteReason::IncompleteDrawBuffer => f.write_str("incomplete draw buffer"),
      IncompleteReason::IncompleteReadBuffer => f.write_str("incomplete read buffer"),
      IncompleteReason::Unsupported => f.write_str("unsupported combination of formats"),
      IncompleteReason::IncompleteMultisample => {
        f.write_str("incomplete multisample configuration")
      }
      IncompleteReason::IncompleteLayerTargets => f.write_str("incomplete layer targets"),
      IncompleteReason::Unknown(status) => write!(f, "unknown status 0x{:x}", status),
    }
  }
}

impl error::Error for IncompleteReason {}

/// Storage used for an attachment.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AttachmentKind {
  Texture,
  RenderBuffer,
}

/// Attachment of a framebuffer, shared with whoever wants to read it.
#[derive(Clone, Debug)]
pub enum Attachment {
  Texture(Rc<Texture>),
  RenderBuffer(Rc<RenderBuffer>),
}

impl Attachment {
  pub fn kind(&self) -> AttachmentKind {
    match self {
      Attachment::Texture(_) => AttachmentKind::Texture,
      Attachment::RenderBuffer(_) => AttachmentKind::RenderBuffer,
    }
  }

  pub fn handle(&self) -> GLuint {
    match self {
      Attachment::Texture(t) => t.handle(),
      Attachment::RenderBuffer(rb) => rb.handle(),
    }
  }

  pub fn format(&self) -> PixelFormat {
    match self {
      Attachment::Texture(t) => t.format(),
      Attachment::RenderBuffer(rb) => rb.format(),
    }
  }

  pub fn as_texture(&self) -> Option<&Rc<Texture>> {
    match self {
      Attachment::Texture(t) => Some(t),
      Attachment::RenderBuffer(_) => None,
    }
  }
}

/// Description of a whole framebuffer.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameBufferConfig {
  pub size: [u32; 2],
  pub color_kind: AttachmentKind,
  pub color_formats: Vec<PixelFormat>,
  pub depth_kind: AttachmentKind,
  /// Requested depth bits; `0` for no depth attachment.
  pub depth_bits: u32,
  /// Add a stencil channel to the depth attachment.
  pub stencil: bool,
}

impl FrameBufferConfig {
  /// One RGBA8 color texture and a 24-bit depth render buffer.
  pub fn new(size: [u32; 2]) -> Self {
    FrameBufferConfig {
      size,
      color_kind: AttachmentKind::Texture,
      color_formats: vec![PixelFormat::RGBA8],
      depth_kind: AttachmentKind::RenderBuffer,
      depth_bits: 24,
      stencil: false,
    }
  }
}

/// Framebuffer.
#[derive(Debug)]
pub struct FrameBuffer {
  gl: GlFunctions,
  handle: GLuint,
  size: [u32; 2],
  owned: bool,
  color_attachments: Vec<Attachment>,
  depth_attachment: Option<Attachment>,
}

impl FrameBuffer {
  /// Create a framebuffer without attachments.
  pub fn new(gl: &GlFunctions, size: [u32; 2]) -> Result<Self, FramebufferError> {
    let handle = gl.gen_framebuffer()?;

    let fb = FrameBuffer {
      gl: gl.clone(),
      handle,
      size,
      owned: true,
      color_attachments: Vec::new(),
      depth_attachment: None,
    };

    fb.bind()?;
    log::trace!("created framebuffer {}", handle);

    Ok(fb)
  }

  /// Create a framebuffer with every attachment of `config`, and check it.
  pub fn with_config(
    gl: &GlFunctions,
    config: &FrameBufferConfig,
  ) -> Result<Self, FramebufferError> {
    let mut fb = Self::new(gl, config.size)?;

    for &format in &config.color_formats {
      fb.set_up_color_attachment(config.color_kind, format)?;
    }

    fb.set_up_depth_attachment(config.depth_kind, config.depth_bits, config.stencil)?;

    fb.check_completion()?;

    Ok(fb)
  }

  /// The window-provided framebuffer.
  pub fn back_buffer(gl: &GlFunctions, size: [u32; 2]) -> Self {
    FrameBuffer {
      gl: gl.clone(),
      handle: 0,
      size,
      owned: false,
      color_attachments: Vec::new(),
      depth_attachment: None,
    }
  }

  pub fn handle(&self) -> GLuint {
    self.handle
  }

  pub fn size(&self) -> [u32; 2] {
    self.size
  }

  pub fn is_back_buffer(&self) -> bool {
    self.handle == 0
  }

  pub fn color_attachments(&self) -> &[Attachment] {
    &self.color_attachments
  }

  pub fn color_attachment_count(&self) -> usize {
    self.color_attachments.len()
  }

  pub fn depth_attachment(&self) -> Option<&Attachment> {
    self.depth_attachment.as_ref()
  }

  /// Bind for drawing and reading.
  pub fn bind(&self) -> Result<(), FramebufferError> {
    self
      .gl
      .bind_framebuffer(gl::FRAMEBUFFER, self.handle, Bind::Cached)?;
    Ok(())
  }

  /// Add a color attachment of the given kind.
  pub fn set_up_color_attachment(
    &mut self,
    kind: AttachmentKind,
    format: PixelFormat,
  ) -> Result<Attachment, FramebufferError> {
    match kind {
      AttachmentKind::Texture => self
        .set_up_color_texture_attachment(format)
        .map(Attachment::Texture),
      AttachmentKind::RenderBuffer => self
        .set_up_color_render_buffer_attachment(format)
        .map(Attachment::RenderBuffer),
    }
  }

  pub fn set_up_color_texture_attachment(
    &mut self,
    format: PixelFormat,
  ) -> Result<Rc<Texture>, FramebufferError> {
    let point = self.next_color_point(format)?;
    let texture = Rc::new(self.attachment_texture(format)?);

    self.bind()?;
    self
      .gl
      .framebuffer_texture_2d(gl::FRAMEBUFFER, point, gl::TEXTURE_2D, texture.handle(), 0)?;

    self.push_color(Attachment::Texture(texture.clone()))?;

    Ok(texture)
  }

  pub fn set_up_color_render_buffer_attachment(
    &mut self,
    format: PixelFormat,
  ) -> Result<Rc<RenderBuffer>, FramebufferError> {
    let point = self.next_color_point(format)?;
    let rb = Rc::new(RenderBuffer::new(&self.gl, self.size, format)?);

    self.bind()?;
    self
      .gl
      .framebuffer_renderbuffer(gl::FRAMEBUFFER, point, rb.handle())?;

    self.push_color(Attachment::RenderBuffer(rb.clone()))?;

    Ok(rb)
  }

  /// Set the depth attachment; `Ok(None)` if `depth_bits` is `0`.
  pub fn set_up_depth_attachment(
    &mut self,
    kind: AttachmentKind,
    depth_bits: u32,
    stencil: bool,
  ) -> Result<Option<Attachment>, FramebufferError> {
    match kind {
      AttachmentKind::Texture => Ok(
        self
          .set_up_depth_texture_attachment(depth_bits, stencil)?
          .map(Attachment::Texture),
      ),
      AttachmentKind::RenderBuffer => Ok(
        self
          .set_up_depth_render_buffer_attachment(depth_bits, stencil)?
          .map(Attachment::RenderBuffer),
      ),
    }
  }

  pub fn set_up_depth_texture_attachment(
    &mut self,
    depth_bits: u32,
    stencil: bool,
  ) -> Result<Option<Rc<Texture>>, FramebufferError> {
    let Some(format) = self.depth_format(depth_bits, stencil)? else {
      return Ok(None);
    };

    let texture = Rc::new(self.attachment_texture(format)?);

    self.bind()?;
    self.gl.framebuffer_texture_2d(
      gl::FRAMEBUFFER,
      format.depth_attachment(),
      gl::TEXTURE_2D,
      texture.handle(),
      0,
    )?;

    self.depth_attachment = Some(Attachment::Texture(texture.clone()));

    Ok(Some(texture))
  }

  pub fn set_up_depth_render_buffer_attachment(
    &mut self,
    depth_bits: u32,
    stencil: bool,
  ) -> Result<Option<Rc<RenderBuffer>>, FramebufferError> {
    let Some(format) = self.depth_format(depth_bits, stencil)? else {
      return Ok(None);
    };

    let rb = Rc::new(RenderBuffer::new(&self.gl, self.size, format)?);

    self.bind()?;
    self
      .gl
      .framebuffer_renderbuffer(gl::FRAMEBUFFER, format.depth_attachment(), rb.handle())?;

    self.depth_attachment = Some(Attachment::RenderBuffer(rb.clone()));

    Ok(Some(rb))
  }

  /// Ask the driver whether the framebuffer can be rendered to.
  ///
  /// Must be called once every attachment is set up.
  pub fn check_completion(&self) -> Result<(), FramebufferError> {
    if self.is_back_buffer() {
      return Ok(());
    }

    self.bind()?;

    if self.color_attachments.is_empty() {
      // depth-only
      self.gl.draw_buffers(&[])?;
    }

    let status = self.gl.check_framebuffer_status(gl::FRAMEBUFFER)?;

    IncompleteReason::from_status(status).map_err(|reason| {
      log::error!("framebuffer {} is incomplete: {}", self.handle, reason);
      FramebufferError::Incomplete(reason)
    })
  }

  fn next_color_point(&self, format: PixelFormat) -> Result<GLenum, FramebufferError> {
    if self.is_back_buffer() {
      log::error!("attachments requested on the back buffer");
      return Err(FramebufferError::BackBuffer);
    }

    if !format.is_color_renderable() {
      log::error!("{:?} cannot be used as a color attachment", format);
      return Err(FramebufferError::UnsupportedFormat(format));
    }

    let max = self.gl.get_integer(gl::MAX_COLOR_ATTACHMENTS)?.max(0) as usize;
    let index = self.color_attachments.len();

    if index >= max {
      let err = FramebufferError::TooManyColorAttachments { max };
      log::error!("{}", err);
      return Err(err);
    }

    Ok(gl::COLOR_ATTACHMENT0 + index as GLenum)
  }

  fn push_color(&mut self, attachment: Attachment) -> Result<(), FramebufferError> {
    self.color_attachments.push(attachment);

    let buffers = (0..self.color_attachments.len() as GLenum)
      .map(|i| gl::COLOR_ATTACHMENT0 + i)
      .collect::<Vec<_>>();
    self.gl.draw_buffers(&buffers)?;

    Ok(())
  }

  fn depth_format(
    &self,
    depth_bits: u32,
    stencil: bool,
  ) -> Result<Option<PixelFormat>, FramebufferError> {
    if self.is_back_buffer() {
      log::error!("attachments requested on the back buffer");
      return Err(FramebufferError::BackBuffer);
    }

    let format = PixelFormat::from_depth_bits(depth_bits).map(|format| {
      if stencil {
        PixelFormat::Depth24Stencil8
      } else {
        format
      }
    });

    Ok(format)
  }

  fn attachment_texture(&self, format: PixelFormat) -> Result<Texture, TextureError> {
    let mut texture = Texture::new(&self.gl, Sampler::default())?;
    texture.create(self.size, Some(1), format)?;
    Ok(texture)
  }
}

impl Drop for FrameBuffer {
  fn drop(&mut self) {
    if !self.owned {
      return;
    }

    match self.gl.delete_framebuffer(self.handle) {
      Ok(()) => log::trace!("deleted framebuffer {}", self.handle),
      Err(e) => log::error!("leaking framebuffer {}: {}", self.handle, e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::headless;

  #[test]
  fn color_and_depth_attachments() {
    let (gl, driver) = headless();
    let mut fb = FrameBuffer::new(&gl, [128, 64]).unwrap();

    let color = fb.set_up_color_texture_attachment(PixelFormat::RGBA8).unwrap();
    fb.set_up_color_render_buffer_attachment(PixelFormat::RGBA16F)
      .unwrap();
    let depth = fb.set_up_depth_render_buffer_attachment(24, false).unwrap();

    assert!(depth.is_some());
    assert_eq!(fb.color_attachment_count(), 2);
    assert_eq!(color.size(), [128, 64]);
    assert_eq!(fb.check_completion(), Ok(()));
    assert!(driver.is_framebuffer(fb.handle()));
  }

  #[test]
  fn no_depth_requested() {
    let (gl, _) = headless();
    let mut fb = FrameBuffer::new(&gl, [16, 16]).unwrap();

    fb.set_up_color_attachment(AttachmentKind::Texture, PixelFormat::RGBA8)
      .unwrap();
    assert!(fb
      .set_up_depth_attachment(AttachmentKind::Texture, 0, false)
      .unwrap()
      .is_none());

    assert!(fb.depth_attachment().is_none());
    assert_eq!(fb.check_completion(), Ok(()));
  }

  #[test]
  fn depth_only_framebuffer() {
    let (gl, _) = headless();
    let mut fb = FrameBuffer::new(&gl, [16, 16]).unwrap();

    let depth = fb.set_up_depth_texture_attachment(32, false).unwrap().unwrap();
    assert_eq!(depth.format(), PixelFormat::Depth32F);
    assert_eq!(fb.check_completion(), Ok(()));
  }

  #[test]
  fn stencil_selects_a_packed_format() {
    let (gl, _) = headless();
    let mut fb = FrameBuffer::new(&gl, [16, 16]).unwrap();

    let depth = fb
      .set_up_depth_attachment(AttachmentKind::RenderBuffer, 24, true)
      .unwrap()
      .unwrap();
    assert_eq!(depth.format(), PixelFormat::Depth24Stencil8);
  }

  #[test]
  fn empty_framebuffer_is_incomplete() {
    let (gl, _) = headless();
    let fb = FrameBuffer::new(&gl, [16, 16]).unwrap();

    assert_eq!(
      fb.check_completion(),
      Err(FramebufferError::Incomplete(IncompleteReason::MissingAttachment))
    );
  }

  #[test]
  fn depth_formats_are_not_color_attachments() {
    let (gl, _) = headless();
    let mut fb = FrameBuffer::new(&gl, [16, 16]).unwrap();

    assert_eq!(
      fb.set_up_color_texture_attachment(PixelFormat::Depth24)
        .unwrap_err(),
      FramebufferError::UnsupportedFormat(PixelFormat::Depth24)
    );
  }

  #[test]
  fn configured_framebuffer() {
    let (gl, _) = headless();
    let config = FrameBufferConfig {
      color_formats: vec![PixelFormat::RGBA8, PixelFormat::R32I],
      ..FrameBufferConfig::new([32, 32])
    };
    let fb = FrameBuffer::with_config(&gl, &config).unwrap();

    assert_eq!(fb.color_attachment_count(), 2);
    assert_eq!(
      fb.depth_attachment().map(Attachment::kind),
      Some(AttachmentKind::RenderBuffer)
    );
  }

  #[test]
  fn back_buffer_is_never_deleted_nor_checked() {
    let (gl, driver) = headless();
    let mut back = FrameBuffer::back_buffer(&gl, [800, 600]);

    assert_eq!(back.check_completion(), Ok(()));
    assert_eq!(
      back.set_up_color_texture_attachment(PixelFormat::RGBA8)
        .unwrap_err(),
      FramebufferError::BackBuffer
    );

    drop(back);
    assert_eq!(driver.calls("glCheckFramebufferStatus"), 0);
    assert_eq!(driver.calls("glDeleteFramebuffers"), 0);
  }

  #[test]
  fn attachments_outlive_the_framebuffer() {
    let (gl, driver) = headless();
    let mut fb = FrameBuffer::new(&gl, [8, 8]).unwrap();
    let color = fb.set_up_color_texture_attachment(PixelFormat::RGBA8).unwrap();
    let handle = fb.handle();

    drop(fb);

    assert!(!driver.is_framebuffer(handle));
    assert!(driver.is_texture(color.handle()));
  }
}
