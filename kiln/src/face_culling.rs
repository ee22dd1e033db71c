//! Triangle winding and culled faces.

use gl::types::GLenum;

/// Winding order of front-facing triangles.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrontFace {
  /// Clockwise.
  Cw,
  /// Counter-clockwise (driver default).
  Ccw,
}

impl FrontFace {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      FrontFace::Cw => gl::CW,
      FrontFace::Ccw => gl::CCW,
    }
  }
}

impl Default for FrontFace {
  fn default() -> Self {
    FrontFace::Ccw
  }
}

/// Polygon faces discarded when face culling is enabled.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PolygonFacing {
  Front,
  /// Driver default.
  Back,
  FrontAndBack,
}

impl PolygonFacing {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      PolygonFacing::Front => gl::FRONT,
      PolygonFacing::Back => gl::BACK,
      PolygonFacing::FrontAndBack => gl::FRONT_AND_BACK,
    }
  }
}

impl Default for PolygonFacing {
  fn default() -> Self {
    PolygonFacing::Back
  }
}
