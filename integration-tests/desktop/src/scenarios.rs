//! Texture bounds, uniform buffer composition and uniform lookups on the real driver.

use crate::FixtureResult;
use glam::{Mat4, Vec3};
use kiln::buffer::BufferUsage;
use kiln::pixel::PixelFormat;
use kiln::program::{ShaderProgram, UniformLocation};
use kiln::texture::{Sampler, Texture, TextureError};
use kiln::uniform_buffer::UniformBuffer;
use kiln::GlFunctions;
use kiln_glfw::{GlfwSurface, WindowDim, WindowOpt};

const VS: &str = "#version 330 core
uniform mat4 u_Transform;
in vec3 a_Position;

void main() {
  gl_Position = u_Transform * vec4(a_Position, 1.);
}";

const FS: &str = "#version 330 core
out vec4 frag;

void main() {
  frag = vec4(1.);
}";

pub fn fixture() -> FixtureResult {
  let surface = GlfwSurface::new(WindowDim::Windowed(64, 64), "Scenarios", WindowOpt::default())?;
  let gl = surface.functions();

  texture_update_bounds(&gl)?;
  uniform_buffer_round_trip(&gl)?;
  uniform_locations(&gl)?;

  Ok(())
}

fn texture_update_bounds(gl: &GlFunctions) -> FixtureResult {
  let mut texture = Texture::new(gl, Sampler::default())?;
  texture.create([256, 256], Some(1), PixelFormat::RGBA8)?;

  let pixels = vec![0xff; 64 * 64 * 4];
  texture.update(Some(&pixels), 0, [64, 64], [192, 192])?;

  match texture.update(Some(&pixels), 0, [64, 64], [193, 192]) {
    Err(TextureError::OutOfRange { .. }) => Ok(()),
    other => Err(format!("expected an out of range update, got {:?}", other).into()),
  }
}

fn uniform_buffer_round_trip(gl: &GlFunctions) -> FixtureResult {
  let mut ubo = UniformBuffer::new(gl, 80, BufferUsage::DynamicDraw)?;
  let transform = Mat4::from_rotation_z(0.5);
  let color = Vec3::new(1., 0.5, 0.25);

  ubo.set(&transform, 0)?;
  ubo.set(&color, 64)?;

  let sent = ubo.flush()?;
  log::info!("{} uploads for {} bytes", sent, ubo.size());

  let bytes = ubo.buffer().read(0, 76)?;
  assert_eq!(&bytes[..64], bytemuck::bytes_of(&transform));
  assert_eq!(&bytes[64..], bytemuck::bytes_of(&color));

  Ok(())
}

fn uniform_locations(gl: &GlFunctions) -> FixtureResult {
  let program = ShaderProgram::from_sources(gl, "scenarios", VS, FS)?;

  assert!(program.uniform_location("u_Transform")?.is_valid());
  assert_eq!(program.uniform_location("u_DoesNotExist")?, UniformLocation::INVALID);

  Ok(())
}
