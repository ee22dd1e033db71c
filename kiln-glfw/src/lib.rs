//! [GLFW](https://crates.io/crates/glfw) surface provider for kiln.
//!
//! [`GlfwSurface::new`] opens a window with an OpenGL core context (3.3 unless asked otherwise),
//! loads the driver entry points from it and hands back a current [`kiln::Context`] along with the
//! window events.

mod opt;

pub use crate::opt::{CursorMode, WindowDim, WindowOpt};

use glfw::{Context as _, InitError, RenderContext, SwapInterval, Window, WindowEvent, WindowMode};
use kiln::framebuffer::FrameBuffer;
use kiln::{Context, ContextError, GlFunctions, Surface};
use std::os::raw::c_void;
use std::sync::mpsc::Receiver;
use std::{error, fmt};

/// Errors that can happen while creating a surface.
#[non_exhaustive]
#[derive(Debug)]
pub enum GlfwSurfaceError {
  /// GLFW couldn’t be initialized.
  InitError(InitError),
  /// The window (or its OpenGL context) couldn’t be created.
  WindowCreationFailed,
  /// Fullscreen was requested but there is no primary monitor.
  NoPrimaryMonitor,
  /// The driver couldn’t be loaded from the window’s context.
  Context(ContextError),
}

impl fmt::Display for GlfwSurfaceError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      GlfwSurfaceError::InitError(ref e) => write!(f, "initialization error: {}", e),
      GlfwSurfaceError::WindowCreationFailed => f.write_str("failed to create window"),
      GlfwSurfaceError::NoPrimaryMonitor => f.write_str("no primary monitor"),
      GlfwSurfaceError::Context(ref e) => write!(f, "failed to create context: {}", e),
    }
  }
}

impl error::Error for GlfwSurfaceError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      GlfwSurfaceError::InitError(e) => Some(e),
      GlfwSurfaceError::Context(e) => Some(e),
      _ => None,
    }
  }
}

impl From<InitError> for GlfwSurfaceError {
  fn from(e: InitError) -> Self {
    GlfwSurfaceError::InitError(e)
  }
}

impl From<ContextError> for GlfwSurfaceError {
  fn from(e: ContextError) -> Self {
    GlfwSurfaceError::Context(e)
  }
}

/// The window’s render context, as seen by kiln.
struct GlfwRenderContext(RenderContext);

impl Surface for GlfwRenderContext {
  fn make_current(&mut self) {
    self.0.make_current();
  }

  fn swap_buffers(&mut self) {
    self.0.swap_buffers();
  }
}

/// GLFW window with a kiln context.
pub struct GlfwSurface {
  // dropped before the window
  context: Context,

  /// Wrapped GLFW window.
  pub window: Window,

  /// Wrapped GLFW events queue.
  pub events_rx: Receiver<(f64, WindowEvent)>,

  opts: WindowOpt,
}

impl fmt::Debug for GlfwSurface {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.debug_struct("GlfwSurface")
      .field("context", &self.context)
      .field("size", &self.size())
      .field("opts", &self.opts)
      .finish()
  }
}

impl GlfwSurface {
  /// Open a window and create a context current on the calling thread.
  pub fn new(dim: WindowDim, title: &str, opts: WindowOpt) -> Result<Self, GlfwSurfaceError> {
    #[cfg(feature = "log-errors")]
    let error_cbk = glfw::LOG_ERRORS;
    #[cfg(not(feature = "log-errors"))]
    let error_cbk = glfw::FAIL_ON_ERRORS;

    let mut glfw = glfw::init(error_cbk)?;

    // OpenGL hints
    glfw.window_hint(glfw::WindowHint::OpenGlProfile(
      glfw::OpenGlProfileHint::Core,
    ));
    glfw.window_hint(glfw::WindowHint::OpenGlForwardCompat(true));
    let [major, minor] = opts.gl_version();
    glfw.window_hint(glfw::WindowHint::ContextVersionMajor(major));
    glfw.window_hint(glfw::WindowHint::ContextVersionMinor(minor));
    glfw.window_hint(glfw::WindowHint::Samples(opts.num_samples()));

    let created = match dim {
      WindowDim::Windowed(w, h) => glfw.create_window(w, h, title, WindowMode::Windowed),

      WindowDim::Fullscreen => glfw.with_primary_monitor(|glfw, monitor| {
        let monitor = monitor?;
        let mode = monitor.get_video_mode()?;
        glfw.create_window(mode.width, mode.height, title, WindowMode::FullScreen(monitor))
      }),

      WindowDim::FullscreenRestricted(w, h) => glfw.with_primary_monitor(|glfw, monitor| {
        glfw.create_window(w, h, title, WindowMode::FullScreen(monitor?))
      }),
    };

    let (mut window, events_rx) = created.ok_or_else(|| {
      let err = match dim {
        WindowDim::Windowed(..) => GlfwSurfaceError::WindowCreationFailed,
        _ => GlfwSurfaceError::NoPrimaryMonitor,
      };
      log::error!("{}", err);
      err
    })?;

    window.make_current();
    window.set_all_polling(true);
    window.set_cursor_mode(opts.cursor_mode().to_glfw());
    window.glfw.set_swap_interval(if opts.vsync() {
      SwapInterval::Sync(1)
    } else {
      SwapInterval::None
    });

    let render_context = GlfwRenderContext(window.render_context());
    let context = Context::create(render_context, |s| window.get_proc_address(s) as *const c_void)?;

    log::info!("created {:?} window with an OpenGL {} context", dim, context.version());

    Ok(GlfwSurface {
      context,
      window,
      events_rx,
      opts,
    })
  }

  pub fn context(&self) -> &Context {
    &self.context
  }

  /// Dispatch table of the window’s context.
  pub fn functions(&self) -> GlFunctions {
    self.context.functions()
  }

  pub fn opts(&self) -> &WindowOpt {
    &self.opts
  }

  pub fn set_cursor_mode(&mut self, mode: CursorMode) -> &mut Self {
    self.window.set_cursor_mode(mode.to_glfw());
    self.opts = self.opts.set_cursor_mode(mode);
    self
  }

  /// Size of the window’s framebuffer.
  pub fn size(&self) -> [u32; 2] {
    let (w, h) = self.window.get_framebuffer_size();
    [w.max(0) as u32, h.max(0) as u32]
  }

  pub fn should_close(&self) -> bool {
    self.window.should_close()
  }

  /// Events received since the last call, without blocking.
  pub fn poll_events(&mut self) -> impl Iterator<Item = WindowEvent> + '_ {
    self.window.glfw.poll_events();
    glfw::flush_messages(&self.events_rx).map(|(_, e)| e)
  }

  /// Block until at least one event is received.
  pub fn wait_events(&mut self) -> impl Iterator<Item = WindowEvent> + '_ {
    self.window.glfw.wait_events();
    glfw::flush_messages(&self.events_rx).map(|(_, e)| e)
  }

  pub fn swap_buffers(&mut self) {
    self.context.swap_buffers();
  }

  /// The window’s framebuffer, at its current size.
  pub fn back_buffer(&self) -> FrameBuffer {
    FrameBuffer::back_buffer(&self.context.functions(), self.size())
  }
}
