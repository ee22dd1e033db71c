//! Server-side capabilities that can be toggled with `glEnable` / `glDisable`.

use gl::types::GLenum;

/// A toggleable driver capability.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Capability {
  /// Blending of fragment colors with the framebuffer content.
  Blend,
  /// Face culling; see [`crate::face_culling`].
  CullFace,
  /// Depth test.
  DepthTest,
  /// sRGB conversion when writing to sRGB framebuffers.
  FramebufferSrgb,
  /// Multisample rasterization.
  Multisample,
  /// Primitive restart with a fixed index.
  PrimitiveRestart,
  /// Scissor test.
  ScissorTest,
  /// Stencil test.
  StencilTest,
}

impl Capability {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      Capability::Blend => gl::BLEND,
      Capability::CullFace => gl::CULL_FACE,
      Capability::DepthTest => gl::DEPTH_TEST,
      Capability::FramebufferSrgb => gl::FRAMEBUFFER_SRGB,
      Capability::Multisample => gl::MULTISAMPLE,
      Capability::PrimitiveRestart => gl::PRIMITIVE_RESTART,
      Capability::ScissorTest => gl::SCISSOR_TEST,
      Capability::StencilTest => gl::STENCIL_TEST,
    }
  }
}
