//! Reflection of a program on the real driver.

use crate::FixtureResult;
use colored::Colorize as _;
use kiln::program::ShaderProgram;
use kiln_glfw::{GlfwSurface, WindowDim, WindowOpt};

const VS: &str = "#version 330 core
uniform mat4 u_ViewProjection;
uniform mat4 u_Transform;
in vec3 a_Position;

void main() {
  gl_Position = u_ViewProjection * u_Transform * vec4(a_Position, 1.);
}";

const FS: &str = "#version 330 core
layout (std140) uniform Material {
  vec4 albedo;
  float roughness;
};

uniform vec3 u_LightColors[4];
out vec4 frag;

void main() {
  frag = albedo * roughness + vec4(u_LightColors[3], 1.);
}";

pub fn fixture() -> FixtureResult {
  let surface = GlfwSurface::new(
    WindowDim::Windowed(64, 64),
    "Uniform reflection",
    WindowOpt::default(),
  )?;
  let program = ShaderProgram::from_sources(&surface.functions(), "reflection", VS, FS)?;

  for uniform in program.active_uniforms() {
    println!(
      "{} {:?}[{}] at {}",
      uniform.name.blue(),
      uniform.ty,
      uniform.size,
      uniform.location.raw()
    );
  }

  for block in program.active_uniform_blocks() {
    println!("{} ({} bytes) in {:?}", block.name.blue(), block.size, block.stages);
  }

  assert!(program.uniform_location("u_Transform")?.is_valid());
  assert!(program.uniform_location("u_LightColors[3]")?.is_valid());
  assert!(!program.uniform_location("u_DoesNotExist")?.is_valid());
  assert_eq!(program.query_uniform_block("Material")?.size, 32);

  Ok(())
}
