//! Blending equations and factors.
//!
//! Given two pixels *src* and *dst* (the pixel being computed and the one already stored in the
//! framebuffer), each gets multiplied by a [`Factor`] and the results are combined with an
//! [`Equation`]. A [`BlendMode`] packs both.

use gl::types::GLenum;

/// Blending equation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Equation {
  /// `src * srcK + dst * dstK`
  Additive,
  /// `src * srcK - dst * dstK`
  Subtract,
  /// `dst * dstK - src * srcK`
  ReverseSubtract,
  /// `min(src, dst)`
  Min,
  /// `max(src, dst)`
  Max,
}

impl Equation {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      Equation::Additive => gl::FUNC_ADD,
      Equation::Subtract => gl::FUNC_SUBTRACT,
      Equation::ReverseSubtract => gl::FUNC_REVERSE_SUBTRACT,
      Equation::Min => gl::MIN,
      Equation::Max => gl::MAX,
    }
  }
}

/// Blending factor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Factor {
  One,
  Zero,
  SrcColor,
  SrcColorComplement,
  DstColor,
  DstColorComplement,
  SrcAlpha,
  SrcAlphaComplement,
  DstAlpha,
  DstAlphaComplement,
  SrcAlphaSaturate,
}

impl Factor {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      Factor::One => gl::ONE,
      Factor::Zero => gl::ZERO,
      Factor::SrcColor => gl::SRC_COLOR,
      Factor::SrcColorComplement => gl::ONE_MINUS_SRC_COLOR,
      Factor::DstColor => gl::DST_COLOR,
      Factor::DstColorComplement => gl::ONE_MINUS_DST_COLOR,
      Factor::SrcAlpha => gl::SRC_ALPHA,
      Factor::SrcAlphaComplement => gl::ONE_MINUS_SRC_ALPHA,
      Factor::DstAlpha => gl::DST_ALPHA,
      Factor::DstAlphaComplement => gl::ONE_MINUS_DST_ALPHA,
      Factor::SrcAlphaSaturate => gl::SRC_ALPHA_SATURATE,
    }
  }
}

/// Equation and factors used when blending is enabled.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlendMode {
  pub equation: Equation,
  pub src: Factor,
  pub dst: Factor,
}

impl BlendMode {
  /// Classic alpha blending: `src * srcA + dst * (1 - srcA)`.
  pub const ALPHA: BlendMode = BlendMode {
    equation: Equation::Additive,
    src: Factor::SrcAlpha,
    dst: Factor::SrcAlphaComplement,
  };

  /// Additive blending: `src + dst`.
  pub const ADDITIVE: BlendMode = BlendMode {
    equation: Equation::Additive,
    src: Factor::One,
    dst: Factor::One,
  };

  pub fn new(equation: Equation, src: Factor, dst: Factor) -> Self {
    BlendMode { equation, src, dst }
  }
}

/// The driver default: `src * 1 + dst * 0`.
impl Default for BlendMode {
  fn default() -> Self {
    BlendMode::new(Equation::Additive, Factor::One, Factor::Zero)
  }
}
