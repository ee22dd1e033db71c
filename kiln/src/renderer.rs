//! Scene renderer.
//!
//! [`Renderer`] is a thin layer over programs and vertex arrays. A scene starts with
//! [`Renderer::begin_scene`], which records the camera and the lights; every
//! [`Renderer::submit`] then binds a program, uploads the scene, transform and material uniforms
//! and draws a mesh; [`Renderer::end_scene`] closes the scene and returns its statistics.
//!
//! Programs are expected to use the following uniforms; any of them may be missing.
//!
//! | Uniform              | Type          |
//! |----------------------|---------------|
//! | `u_ViewProjection`   | `mat4`        |
//! | `u_Transform`        | `mat4`        |
//! | `u_CameraPosition`   | `vec3`        |
//! | `u_LightCount`       | `int`         |
//! | `u_LightPositions`   | `vec3[8]`     |
//! | `u_LightColors`      | `vec3[8]`     |
//! | `u_Albedo`           | `vec4`        |
//! | `u_Roughness`        | `float`       |
//! | `u_Metallic`         | `float`       |
//! | `u_HasTexture`       | `bool`        |
//! | `u_Texture`          | `sampler2D`   |

use crate::blending::BlendMode;
use crate::capability::Capability;
use crate::context::ContextError;
use crate::functions::GlFunctions;
use crate::program::{ProgramError, ShaderProgram};
use crate::property::{PropertyRegistry, PropertyValue};
use crate::rect::Rect;
use crate::texture::Texture;
use crate::vertex_array::{Mode, VertexArray, VertexArrayError};
use glam::{Mat4, Vec3, Vec4};
use std::error;
use std::fmt;
use std::rc::Rc;

/// Most lights a scene can have.
pub const MAX_LIGHTS: usize = 8;

/// Camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
  pub projection: Mat4,
  pub view: Mat4,
  pub position: Vec3,
}

impl Camera {
  /// Perspective camera at the origin looking down `-Z`; `fov_y` is in radians.
  pub fn perspective(fov_y: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
    Camera {
      projection: Mat4::perspective_rh_gl(fov_y, aspect_ratio, z_near, z_far),
      view: Mat4::IDENTITY,
      position: Vec3::ZERO,
    }
  }

  /// Orthographic camera covering `[left; right]` × `[bottom; top]`.
  pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32) -> Self {
    Camera {
      projection: Mat4::orthographic_rh_gl(left, right, bottom, top, -1., 1.),
      view: Mat4::IDENTITY,
      position: Vec3::ZERO,
    }
  }

  pub fn look_at(self, eye: Vec3, target: Vec3, up: Vec3) -> Self {
    Camera {
      view: Mat4::look_at_rh(eye, target, up),
      position: eye,
      ..self
    }
  }

  pub fn view_projection(&self) -> Mat4 {
    self.projection * self.view
  }
}

/// Point light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
  pub position: Vec3,
  pub color: Vec3,
  pub intensity: f32,
}

impl Light {
  pub fn new(position: Vec3, color: Vec3, intensity: f32) -> Self {
    Light {
      position,
      color,
      intensity,
    }
  }

  fn radiance(&self) -> Vec3 {
    self.color * self.intensity
  }
}

/// Surface parameters of a mesh.
#[derive(Clone, Debug)]
pub struct Material {
  pub albedo: Vec4,
  pub roughness: f32,
  pub metallic: f32,
  pub texture: Option<Rc<Texture>>,
}

impl Default for Material {
  fn default() -> Self {
    Material {
      albedo: Vec4::ONE,
      roughness: 0.5,
      metallic: 0.,
      texture: None,
    }
  }
}

impl Material {
  pub fn with_texture(self, texture: Rc<Texture>) -> Self {
    Material {
      texture: Some(texture),
      ..self
    }
  }

  /// Properties published to script bridges and inspectors.
  pub fn properties() -> PropertyRegistry<Material> {
    PropertyRegistry::<Material>::new("Material")
      .read_write(
        "albedo",
        |m| PropertyValue::Color(m.albedo.to_array()),
        |m, v| match *v {
          PropertyValue::Color(c) => {
            m.albedo = Vec4::from_array(c);
            true
          }
          _ => false,
        },
      )
      .read_write(
        "roughness",
        |m| PropertyValue::Float(m.roughness),
        |m, v| match *v {
          PropertyValue::Float(x) => {
            m.roughness = x.clamp(0., 1.);
            true
          }
          _ => false,
        },
      )
      .read_write(
        "metallic",
        |m| PropertyValue::Float(m.metallic),
        |m, v| match *v {
          PropertyValue::Float(x) => {
            m.metallic = x.clamp(0., 1.);
            true
          }
          _ => false,
        },
      )
      .read_only("has_texture", |m| PropertyValue::Bool(m.texture.is_some()))
  }
}

/// Counters of a scene.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RenderStats {
  pub draw_calls: usize,
  /// Indices (or vertices, for non-indexed meshes) drawn.
  pub elements: usize,
}

/// Renderer errors.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RenderError {
  Context(ContextError),
  Program(ProgramError),
  VertexArray(VertexArrayError),
  /// Submitting or ending outside of a scene.
  NoScene,
}

impl fmt::Display for RenderError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      RenderError::Context(ref e) => write!(f, "render context error: {}", e),
      RenderError::Program(ref e) => write!(f, "render program error: {}", e),
      RenderError::VertexArray(ref e) => write!(f, "render mesh error: {}", e),
      RenderError::NoScene => f.write_str("no scene in progress"),
    }
  }
}

impl error::Error for RenderError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      RenderError::Context(e) => Some(e),
      RenderError::Program(e) => Some(e),
      RenderError::VertexArray(e) => Some(e),
      RenderError::NoScene => None,
    }
  }
}

impl From<ContextError> for RenderError {
  fn from(e: ContextError) -> Self {
    RenderError::Context(e)
  }
}

impl From<ProgramError> for RenderError {
  fn from(e: ProgramError) -> Self {
    RenderError::Program(e)
  }
}

impl From<VertexArrayError> for RenderError {
  fn from(e: VertexArrayError) -> Self {
    RenderError::VertexArray(e)
  }
}

#[derive(Debug)]
struct Scene {
  view_projection: Mat4,
  camera_position: Vec3,
  light_positions: Vec<Vec3>,
  light_colors: Vec<Vec3>,
}

/// Scene renderer.
#[derive(Debug)]
pub struct Renderer {
  gl: GlFunctions,
  scene: Option<Scene>,
  stats: RenderStats,
}

impl Renderer {
  /// Renderer drawing with depth test and alpha blending.
  pub fn new(gl: &GlFunctions) -> Result<Self, RenderError> {
    gl.enable(Capability::DepthTest)?;
    gl.enable(Capability::Blend)?;
    gl.set_blend_mode(BlendMode::ALPHA)?;

    Ok(Renderer {
      gl: gl.clone(),
      scene: None,
      stats: RenderStats::default(),
    })
  }

  /// Clear the color and depth buffers of the bound framebuffer.
  pub fn clear(&self, color: [f32; 4]) -> Result<(), RenderError> {
    self.gl.set_clear_color(color)?;
    self.gl.clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT)?;
    Ok(())
  }

  pub fn set_viewport(&self, rect: Rect) -> Result<(), RenderError> {
    self.gl.set_viewport(rect.to_viewport())?;
    Ok(())
  }

  /// Start a scene seen from `camera` and lit by `lights`.
  ///
  /// Lights past [`MAX_LIGHTS`] are ignored. A scene still in progress is dropped.
  pub fn begin_scene(&mut self, camera: &Camera, lights: &[Light]) {
    if self.scene.is_some() {
      log::warn!("beginning a scene while another one is in progress");
    }

    if lights.len() > MAX_LIGHTS {
      log::warn!(
        "scene has {} lights, only the first {} are used",
        lights.len(),
        MAX_LIGHTS
      );
    }

    let lights = &lights[..lights.len().min(MAX_LIGHTS)];

    self.scene = Some(Scene {
      view_projection: camera.view_projection(),
      camera_position: camera.position,
      light_positions: lights.iter().map(|l| l.position).collect(),
      light_colors: lights.iter().map(Light::radiance).collect(),
    });
    self.stats = RenderStats::default();
  }

  /// Draw `mesh` with `program` and `material`, placed by `transform`.
  pub fn submit(
    &mut self,
    program: &ShaderProgram,
    material: &Material,
    mesh: &VertexArray,
    transform: Mat4,
  ) -> Result<(), RenderError> {
    let Some(ref scene) = self.scene else {
      log::error!("submitting a mesh outside of a scene");
      return Err(RenderError::NoScene);
    };

    if !program.is_linked() {
      log::warn!("skipping a mesh drawn with unlinked shader program {}", program.name());
      return Ok(());
    }

    program.use_program()?;

    program.set_uniform("u_ViewProjection", &scene.view_projection)?;
    program.set_uniform("u_Transform", &transform)?;
    program.set_uniform("u_CameraPosition", &scene.camera_position)?;
    program.set_uniform("u_LightCount", &(scene.light_positions.len() as i32))?;

    if !scene.light_positions.is_empty() {
      program.set_uniform("u_LightPositions", &scene.light_positions[..])?;
      program.set_uniform("u_LightColors", &scene.light_colors[..])?;
    }

    program.set_uniform("u_Albedo", &material.albedo)?;
    program.set_uniform("u_Roughness", &material.roughness)?;
    program.set_uniform("u_Metallic", &material.metallic)?;
    program.set_uniform("u_HasTexture", &material.texture.is_some())?;

    let _texture = match material.texture {
      Some(ref texture) => Some(program.bind_texture("u_Texture", texture.as_ref())?),
      None => None,
    };

    mesh.draw(Mode::Triangle)?;

    self.stats.draw_calls += 1;
    self.stats.elements += mesh.element_count();

    Ok(())
  }

  /// Close the scene; returns what was drawn in it.
  pub fn end_scene(&mut self) -> Result<RenderStats, RenderError> {
    match self.scene.take() {
      Some(_) => {
        log::trace!(
          "scene ended: {} draw calls, {} elements",
          self.stats.draw_calls,
          self.stats.elements
        );
        Ok(self.stats)
      }

      None => {
        log::error!("ending a scene that was never begun");
        Err(RenderError::NoScene)
      }
    }
  }

  /// Statistics of the current (or last) scene.
  pub fn stats(&self) -> RenderStats {
    self.stats
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::buffer::{BufferUsage, IndexBuffer, VertexBuffer};
  use crate::driver::software::RecordedUniform;
  use crate::pixel::PixelFormat;
  use crate::testing::headless;
  use crate::texture::Sampler;
  use crate::vertex_array::{BufferElement, BufferLayout, ShaderDataType};

  const VS: &str = "
#version 330 core
uniform mat4 u_ViewProjection;
uniform mat4 u_Transform;
in vec3 a_Position;
void main() { gl_Position = u_ViewProjection * u_Transform * vec4(a_Position, 1.); }
";

  const FS: &str = "
#version 330 core
uniform int u_LightCount;
uniform vec3 u_LightPositions[8];
uniform vec3 u_LightColors[8];
uniform vec4 u_Albedo;
uniform bool u_HasTexture;
uniform sampler2D u_Texture;
out vec4 frag;
void main() { frag = u_Albedo; }
";

  fn quad(gl: &GlFunctions) -> VertexArray {
    let layout = BufferLayout::new(vec![BufferElement::new(ShaderDataType::Float3, "a_Position")]);
    let positions: [f32; 12] = [0., 0., 0., 1., 0., 0., 1., 1., 0., 0., 1., 0.];

    let mut vao = VertexArray::new(gl).unwrap();
    let vertices = VertexBuffer::new(gl, BufferUsage::StaticDraw, &positions, layout).unwrap();
    vao.add_vertex_buffer(vertices).unwrap();
    vao
      .set_index_buffer(IndexBuffer::new(gl, BufferUsage::StaticDraw, &[0, 1, 2, 2, 3, 0]).unwrap())
      .unwrap();
    vao
  }

  #[test]
  fn submit_uploads_the_scene_and_draws() {
    let (gl, driver) = headless();
    let program = ShaderProgram::from_sources(&gl, "scene", VS, FS).unwrap();
    let mesh = quad(&gl);
    let mut renderer = Renderer::new(&gl).unwrap();

    let camera = Camera::perspective(1., 1., 0.1, 100.).look_at(Vec3::Z * 5., Vec3::ZERO, Vec3::Y);
    let light = Light::new(Vec3::ONE, Vec3::new(1., 0.5, 0.), 2.);
    let transform = Mat4::from_scale(Vec3::splat(2.));

    renderer.begin_scene(&camera, &[light]);
    renderer
      .submit(&program, &Material::default(), &mesh, transform)
      .unwrap();

    let value = |name: &str| {
      let location = program.uniform_location(name).unwrap().raw();
      driver.uniform_value(program.handle(), location)
    };

    assert_eq!(
      value("u_ViewProjection"),
      Some(RecordedUniform::Float(camera.view_projection().to_cols_array().to_vec()))
    );
    assert_eq!(
      value("u_Transform"),
      Some(RecordedUniform::Float(transform.to_cols_array().to_vec()))
    );
    assert_eq!(value("u_LightCount"), Some(RecordedUniform::Int(vec![1])));
    assert_eq!(value("u_LightColors"), Some(RecordedUniform::Float(vec![2., 1., 0.])));
    assert_eq!(value("u_HasTexture"), Some(RecordedUniform::Int(vec![0])));

    assert_eq!(driver.calls("glDrawElements"), 1);
    assert_eq!(gl.get_error(), Ok(gl::NO_ERROR));

    assert_eq!(
      renderer.end_scene(),
      Ok(RenderStats {
        draw_calls: 1,
        elements: 6
      })
    );
  }

  #[test]
  fn textured_materials_bind_their_texture() {
    let (gl, driver) = headless();
    let program = ShaderProgram::from_sources(&gl, "textured", VS, FS).unwrap();
    let mesh = quad(&gl);
    let mut renderer = Renderer::new(&gl).unwrap();

    let mut texture = Texture::new(&gl, Sampler::default()).unwrap();
    texture.create([2, 2], Some(1), PixelFormat::RGBA8).unwrap();
    let material = Material::default().with_texture(Rc::new(texture));

    renderer.begin_scene(&Camera::orthographic(0., 1., 0., 1.), &[]);
    renderer.submit(&program, &material, &mesh, Mat4::IDENTITY).unwrap();

    let location = program.uniform_location("u_HasTexture").unwrap().raw();
    assert_eq!(
      driver.uniform_value(program.handle(), location),
      Some(RecordedUniform::Int(vec![1]))
    );

    // the unit was given back after the draw
    assert_eq!(gl.reserve_texture_unit(), Ok(Some(0)));
  }

  #[test]
  fn submitting_outside_of_a_scene_fails() {
    let (gl, driver) = headless();
    let program = ShaderProgram::from_sources(&gl, "none", VS, FS).unwrap();
    let mesh = quad(&gl);
    let mut renderer = Renderer::new(&gl).unwrap();

    assert_eq!(
      renderer.submit(&program, &Material::default(), &mesh, Mat4::IDENTITY),
      Err(RenderError::NoScene)
    );
    assert_eq!(renderer.end_scene(), Err(RenderError::NoScene));
    assert_eq!(driver.calls("glDrawElements"), 0);
  }

  #[test]
  fn unlinked_programs_draw_nothing() {
    let (gl, driver) = headless();
    let linked = ShaderProgram::from_sources(&gl, "flat", VS, FS).unwrap();
    let unlinked = ShaderProgram::new(&gl, "empty").unwrap();
    let mesh = quad(&gl);
    let mut renderer = Renderer::new(&gl).unwrap();

    renderer.begin_scene(&Camera::orthographic(0., 1., 0., 1.), &[]);
    renderer
      .submit(&linked, &Material::default(), &mesh, Mat4::IDENTITY)
      .unwrap();
    renderer
      .submit(&unlinked, &Material::default(), &mesh, Mat4::IDENTITY)
      .unwrap();

    assert_eq!(driver.calls("glDrawElements"), 1);
    assert_eq!(renderer.end_scene().map(|stats| stats.draw_calls), Ok(1));
  }

  #[test]
  fn extra_lights_are_ignored() {
    let (gl, driver) = headless();
    let program = ShaderProgram::from_sources(&gl, "lights", VS, FS).unwrap();
    let mesh = quad(&gl);
    let mut renderer = Renderer::new(&gl).unwrap();
    let lights = vec![Light::new(Vec3::ZERO, Vec3::ONE, 1.); MAX_LIGHTS + 3];

    renderer.begin_scene(&Camera::orthographic(0., 1., 0., 1.), &lights);
    renderer
      .submit(&program, &Material::default(), &mesh, Mat4::IDENTITY)
      .unwrap();

    let location = program.uniform_location("u_LightCount").unwrap().raw();
    assert_eq!(
      driver.uniform_value(program.handle(), location),
      Some(RecordedUniform::Int(vec![MAX_LIGHTS as i32]))
    );
    assert_eq!(renderer.stats().draw_calls, 1);
  }

  #[test]
  fn clear_and_viewport() {
    let (gl, driver) = headless();
    let renderer = Renderer::new(&gl).unwrap();

    renderer.clear([0.1, 0.2, 0.3, 1.]).unwrap();
    renderer.set_viewport(Rect::new(0, 0, 640, 480)).unwrap();

    assert_eq!(driver.clear_color(), [0.1, 0.2, 0.3, 1.]);
    assert_eq!(driver.viewport(), [0, 0, 640, 480]);
    assert_eq!(driver.calls("glClear"), 1);
  }

  #[test]
  fn material_properties() {
    let registry = Material::properties();
    let mut material = Material::default();

    assert!(registry.set(&mut material, "roughness", PropertyValue::Float(3.)));
    assert_eq!(material.roughness, 1.);
    assert!(!registry.set(&mut material, "has_texture", PropertyValue::Bool(true)));
    assert_eq!(
      registry.get(&material, "albedo"),
      Some(PropertyValue::Color([1.; 4]))
    );
  }
}
