//! A rotating quad lit by two point lights.

use crate::FixtureResult;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use glfw::{Action, Key, WindowEvent};
use kiln::buffer::{BufferUsage, IndexBuffer, VertexBuffer};
use kiln::program::ShaderProgram;
use kiln::rect::Rect;
use kiln::renderer::{Camera, Light, Material, Renderer};
use kiln::vertex_array::{BufferElement, BufferLayout, ShaderDataType, VertexArray};
use kiln_glfw::{GlfwSurface, WindowDim, WindowOpt};

const VS: &str = "#version 330 core
uniform mat4 u_ViewProjection;
uniform mat4 u_Transform;

in vec3 a_Position;
in vec3 a_Normal;

out vec3 v_Position;
out vec3 v_Normal;

void main() {
  vec4 position = u_Transform * vec4(a_Position, 1.);
  v_Position = position.xyz;
  v_Normal = mat3(u_Transform) * a_Normal;
  gl_Position = u_ViewProjection * position;
}";

const FS: &str = "#version 330 core
uniform int u_LightCount;
uniform vec3 u_LightPositions[8];
uniform vec3 u_LightColors[8];
uniform vec4 u_Albedo;

in vec3 v_Position;
in vec3 v_Normal;

out vec4 frag;

void main() {
  vec3 n = normalize(v_Normal);
  vec3 color = vec3(0.05);

  for (int i = 0; i < u_LightCount; ++i) {
    vec3 l = normalize(u_LightPositions[i] - v_Position);
    color += max(dot(n, l), 0.) * u_LightColors[i];
  }

  frag = vec4(color, 1.) * u_Albedo;
}";

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct Vertex {
  position: [f32; 3],
  normal: [f32; 3],
}

const fn vertex(x: f32, y: f32) -> Vertex {
  Vertex {
    position: [x, y, 0.],
    normal: [0., 0., 1.],
  }
}

const VERTICES: [Vertex; 4] = [vertex(-1., -1.), vertex(1., -1.), vertex(1., 1.), vertex(-1., 1.)];

pub fn fixture() -> FixtureResult {
  let mut surface = GlfwSurface::new(
    WindowDim::Windowed(800, 600),
    "Lit quad",
    WindowOpt::default().set_num_samples(4),
  )?;
  let gl = surface.functions();

  let program = ShaderProgram::from_sources(&gl, "lit", VS, FS)?;

  let layout = BufferLayout::new(vec![
    BufferElement::new(ShaderDataType::Float3, "a_Position"),
    BufferElement::new(ShaderDataType::Float3, "a_Normal"),
  ]);
  let mut quad = VertexArray::new(&gl)?;
  quad
    .add_vertex_buffer(VertexBuffer::new(&gl, BufferUsage::StaticDraw, &VERTICES, layout)?)?;
  quad
    .set_index_buffer(IndexBuffer::new(&gl, BufferUsage::StaticDraw, &[0, 1, 2, 2, 3, 0])?)?;

  let material = Material {
    albedo: Vec4::new(0.9, 0.8, 0.7, 1.),
    ..Material::default()
  };
  let lights = [
    Light::new(Vec3::new(-2., 1., 2.), Vec3::new(1., 0.4, 0.2), 1.5),
    Light::new(Vec3::new(2., -1., 2.), Vec3::new(0.2, 0.4, 1.), 1.5),
  ];

  let mut renderer = Renderer::new(&gl)?;
  let start = surface.window.glfw.get_time();

  'app: loop {
    for event in surface.poll_events() {
      match event {
        WindowEvent::Close | WindowEvent::Key(Key::Escape, _, Action::Release, _) => break 'app,
        _ => (),
      }
    }

    let size = surface.size();
    let aspect_ratio = size[0] as f32 / size[1].max(1) as f32;
    let camera = Camera::perspective(std::f32::consts::FRAC_PI_3, aspect_ratio, 0.1, 100.).look_at(
      Vec3::new(0., 0., 4.),
      Vec3::ZERO,
      Vec3::Y,
    );
    let t = (surface.window.glfw.get_time() - start) as f32;

    surface.back_buffer().bind()?;
    renderer.set_viewport(Rect::from_size(size))?;
    renderer.clear([0.1, 0.1, 0.1, 1.])?;

    renderer.begin_scene(&camera, &lights);
    renderer.submit(&program, &material, &quad, Mat4::from_rotation_y(t.sin()))?;
    let stats = renderer.end_scene()?;
    log::trace!("{} draw calls", stats.draw_calls);

    surface.swap_buffers();
  }

  Ok(())
}
