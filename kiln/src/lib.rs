//! # GPU resource and binding management for the kiln engine
//!
//! kiln wraps OpenGL objects into owned Rust values and keeps track of which context may issue
//! commands, what is bound where and which CPU views of GPU memory are alive. It is the layer the
//! engine’s renderer and editor are written against.
//!
//! # Overview
//!
//! - **Context**: a [`Context`] owns one command-submission context. At most one context is
//!   current per OS thread, and every driver call made through kiln checks that the context it
//!   belongs to is current on the calling thread.
//! - **Dispatch table**: [`GlFunctions`] is the only way to reach the driver. It shares a
//!   [`GraphicsStateCache`](state::GraphicsStateCache) with every other table of the same context,
//!   so redundant state changes and binds never reach the driver.
//! - **Buffers**: [`BufferObject`](buffer::BufferObject) owns a GPU buffer, and hands out at most
//!   one live CPU-mapped view, [`BufferContent`](buffer::BufferContent), at a time. Vertex, index
//!   and uniform buffers are built on top of it.
//! - **Textures**: 2D [`Texture`](texture::Texture)s and [`CubeMap`](cubemap::CubeMap)s, with
//!   bounds-checked partial updates.
//! - **Framebuffers**: [`FrameBuffer`](framebuffer::FrameBuffer) composes texture or render buffer
//!   attachments and checks completeness.
//! - **Shaders**: [`Shader`](shader::Shader) stages and linked
//!   [`ShaderProgram`](program::ShaderProgram)s, with cached reflection of uniforms and uniform
//!   blocks.
//! - **Renderer**: a small façade binding a program, lights and a material before issuing draws.
//!
//! # Drivers
//!
//! Contexts talk to a [`Driver`](driver::Driver). [`GlDriver`](driver::GlDriver) is the real thing,
//! loaded from a platform proc-address resolver (see the kiln-glfw crate).
//! [`SoftwareDriver`](driver::SoftwareDriver) simulates it in memory, which is what the test suite
//! runs on.
//!
//! # Errors and logging
//!
//! Precondition violations (context not current, out-of-range updates, access-mode mismatches) and
//! creation failures are returned as errors and logged with the [log] crate. Conditions that
//! routinely happen while rendering, such as setting an optimized-out uniform, are logged as
//! warnings and otherwise ignored.
//!
//! [log]: https://crates.io/crates/log

pub mod blending;
pub mod buffer;
pub mod capability;
pub mod context;
pub mod cubemap;
pub mod depth_stencil;
pub mod driver;
pub mod face_culling;
pub mod framebuffer;
pub mod functions;
pub mod loader;
pub mod pixel;
pub mod program;
pub mod property;
pub mod rect;
pub mod renderbuffer;
pub mod renderer;
pub mod shader;
pub mod state;
pub mod texture;
pub mod uniform_buffer;
pub mod vertex_array;

pub use crate::context::{Context, ContextError, HeadlessSurface, Surface, Version};
pub use crate::functions::GlFunctions;

#[cfg(test)]
pub(crate) mod testing {
  use crate::context::{Context, HeadlessSurface};
  use crate::driver::SoftwareDriver;
  use crate::functions::GlFunctions;

  /// Dispatch table of a fresh headless context, current on the calling thread, with the driver
  /// behind it and its call counters reset.
  pub(crate) fn headless() -> (GlFunctions, SoftwareDriver) {
    let driver = SoftwareDriver::new();
    let ctx = Context::new(HeadlessSurface, driver.clone()).expect("headless context");
    driver.reset_calls();

    (ctx.functions(), driver)
  }
}
