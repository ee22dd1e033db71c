//! Framebuffers dropped while the window keeps rendering to the back buffer.

use crate::FixtureResult;
use glfw::{Action, Key, WindowEvent};
use kiln::framebuffer::{FrameBuffer, FrameBufferConfig};
use kiln::renderer::Renderer;
use kiln_glfw::{GlfwSurface, WindowDim, WindowOpt};

pub fn fixture() -> FixtureResult {
  let mut surface = GlfwSurface::new(
    WindowDim::Windowed(512, 512),
    "Drop framebuffer",
    WindowOpt::default(),
  )?;
  let gl = surface.functions();
  let renderer = Renderer::new(&gl)?;

  let offscreen = FrameBuffer::with_config(&gl, &FrameBufferConfig::new(surface.size()))?;
  let handle = offscreen.handle();
  drop(offscreen);

  log::info!("dropped framebuffer {}", handle);

  'app: loop {
    for event in surface.poll_events() {
      match event {
        WindowEvent::Close | WindowEvent::Key(Key::Escape, _, Action::Release, _) => break 'app,
        _ => (),
      }
    }

    // a framebuffer per frame
    let fb = FrameBuffer::with_config(&gl, &FrameBufferConfig::new([256, 256]))?;
    fb.bind()?;
    renderer.clear([1., 0., 0., 1.])?;
    drop(fb);

    surface.back_buffer().bind()?;
    renderer.clear([0., 0.5, 0.5, 1.])?;

    surface.swap_buffers();
  }

  Ok(())
}
