//! Depth and stencil test configuration.

use gl::types::GLenum;

/// Comparison performed by the depth and stencil tests. `a` is the incoming fragment’s value and
/// `b` the one already stored.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Comparison {
  /// Test never succeeds.
  Never,
  /// Test always succeeds.
  Always,
  /// `a == b`.
  Equal,
  /// `a != b`.
  NotEqual,
  /// `a < b`.
  Less,
  /// `a <= b`.
  LessOrEqual,
  /// `a > b`.
  Greater,
  /// `a >= b`.
  GreaterOrEqual,
}

impl Comparison {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      Comparison::Never => gl::NEVER,
      Comparison::Always => gl::ALWAYS,
      Comparison::Equal => gl::EQUAL,
      Comparison::NotEqual => gl::NOTEQUAL,
      Comparison::Less => gl::LESS,
      Comparison::LessOrEqual => gl::LEQUAL,
      Comparison::Greater => gl::GREATER,
      Comparison::GreaterOrEqual => gl::GEQUAL,
    }
  }
}

/// Action applied to the stored stencil value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StencilOp {
  Keep,
  Zero,
  Replace,
  /// Increment, clamping at the maximum value.
  Increment,
  /// Increment, wrapping around to `0`.
  IncrementWrap,
  /// Decrement, clamping at `0`.
  Decrement,
  /// Decrement, wrapping around to the maximum value.
  DecrementWrap,
  Invert,
}

impl StencilOp {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      StencilOp::Keep => gl::KEEP,
      StencilOp::Zero => gl::ZERO,
      StencilOp::Replace => gl::REPLACE,
      StencilOp::Increment => gl::INCR,
      StencilOp::IncrementWrap => gl::INCR_WRAP,
      StencilOp::Decrement => gl::DECR,
      StencilOp::DecrementWrap => gl::DECR_WRAP,
      StencilOp::Invert => gl::INVERT,
    }
  }
}

/// Full stencil test setup: the test itself, the write mask and what to do with the stored value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StencilTest {
  pub comparison: Comparison,
  pub reference: u8,
  /// Mask applied to both values before comparing.
  pub mask: u8,
  /// Bits of the stencil buffer that can be written.
  pub write_mask: u8,
  /// Stencil test fails.
  pub stencil_fails: StencilOp,
  /// Stencil test passes but the depth test fails.
  pub depth_fails: StencilOp,
  /// Both tests pass.
  pub depth_passes: StencilOp,
}

impl StencilTest {
  pub fn new(comparison: Comparison, reference: u8, mask: u8) -> Self {
    StencilTest {
      comparison,
      reference,
      mask,
      ..StencilTest::default()
    }
  }

  pub fn on_pass(self, op: StencilOp) -> Self {
    StencilTest {
      depth_passes: op,
      ..self
    }
  }

  pub fn on_stencil_fail(self, op: StencilOp) -> Self {
    StencilTest {
      stencil_fails: op,
      ..self
    }
  }

  pub fn on_depth_fail(self, op: StencilOp) -> Self {
    StencilTest {
      depth_fails: op,
      ..self
    }
  }

  pub fn with_write_mask(self, write_mask: u8) -> Self {
    StencilTest { write_mask, ..self }
  }
}

/// The driver default: always pass, keep everything.
impl Default for StencilTest {
  fn default() -> Self {
    StencilTest {
      comparison: Comparison::Always,
      reference: 0,
      mask: 0xFF,
      write_mask: 0xFF,
      stencil_fails: StencilOp::Keep,
      depth_fails: StencilOp::Keep,
      depth_passes: StencilOp::Keep,
    }
  }
}
