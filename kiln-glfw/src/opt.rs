//! Window options.

/// Size and mode of the window.
///
///   - `Windowed(width, height)` opens a window of that size.
///   - `Fullscreen` opens in fullscreen mode with the resolution of the primary monitor.
///   - `FullscreenRestricted(width, height)` opens in fullscreen mode with the given resolution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WindowDim {
  Windowed(u32, u32),
  Fullscreen,
  FullscreenRestricted(u32, u32),
}

/// Cursor mode.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CursorMode {
  #[default]
  Visible,
  /// Hidden while over the window.
  Invisible,
  /// Hidden and grabbed by the window.
  Disabled,
}

impl CursorMode {
  pub(crate) fn to_glfw(self) -> glfw::CursorMode {
    match self {
      CursorMode::Visible => glfw::CursorMode::Normal,
      CursorMode::Invisible => glfw::CursorMode::Hidden,
      CursorMode::Disabled => glfw::CursorMode::Disabled,
    }
  }
}

/// Window hints.
///
/// Start from `default()` and tweak it with the setters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WindowOpt {
  cursor_mode: CursorMode,
  num_samples: Option<u32>,
  vsync: bool,
  gl_version: [u32; 2],
}

impl Default for WindowOpt {
  /// Visible cursor, no multisampling, vertical sync and an OpenGL 3.3 context.
  fn default() -> Self {
    WindowOpt {
      cursor_mode: CursorMode::Visible,
      num_samples: None,
      vsync: true,
      gl_version: [3, 3],
    }
  }
}

impl WindowOpt {
  #[inline]
  pub fn set_cursor_mode(self, cursor_mode: CursorMode) -> Self {
    WindowOpt { cursor_mode, ..self }
  }

  #[inline]
  pub fn cursor_mode(&self) -> CursorMode {
    self.cursor_mode
  }

  /// Number of samples for multisampling; `None` disables it.
  #[inline]
  pub fn set_num_samples<S>(self, samples: S) -> Self
  where
    S: Into<Option<u32>>,
  {
    WindowOpt {
      num_samples: samples.into(),
      ..self
    }
  }

  #[inline]
  pub fn num_samples(&self) -> Option<u32> {
    self.num_samples
  }

  /// Wait for the vertical blank before presenting.
  #[inline]
  pub fn set_vsync(self, vsync: bool) -> Self {
    WindowOpt { vsync, ..self }
  }

  #[inline]
  pub fn vsync(&self) -> bool {
    self.vsync
  }

  /// Core profile version to request, as `[major, minor]`.
  #[inline]
  pub fn set_gl_version(self, gl_version: [u32; 2]) -> Self {
    WindowOpt { gl_version, ..self }
  }

  #[inline]
  pub fn gl_version(&self) -> [u32; 2] {
    self.gl_version
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn setters_keep_other_hints() {
    let opt = WindowOpt::default()
      .set_num_samples(4)
      .set_cursor_mode(CursorMode::Disabled);

    assert_eq!(opt.num_samples(), Some(4));
    assert_eq!(opt.cursor_mode(), CursorMode::Disabled);
    assert!(opt.vsync());

    let opt = opt.set_num_samples(None).set_vsync(false);
    assert_eq!(opt.num_samples(), None);
    assert_eq!(opt.cursor_mode(), CursorMode::Disabled);
    assert!(!opt.vsync());
    assert_eq!(opt.gl_version(), [3, 3]);
    assert_eq!(opt.set_gl_version([4, 5]).gl_version(), [4, 5]);
  }
}
