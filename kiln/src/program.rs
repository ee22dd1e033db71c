//! Shader programs.
//!
//! A [`ShaderProgram`] starts empty and unlinked. Stages are [attached](ShaderProgram::attach),
//! then the program is [linked](ShaderProgram::link). A successful link reflects the active
//! uniforms and uniform blocks into caches that stay valid until the next successful link; a failed
//! link only marks the program unlinked and leaves the previous caches as they were.
//!
//! Looking up a uniform that the driver doesn’t know (typically because it was optimized out)
//! yields [`UniformLocation::INVALID`]. Setting a value through it is a silent no-op.
//!
//! # Binding resources
//!
//! Textures and uniform buffers are handed to a program by reserving a texture unit (or uniform
//! buffer binding point) from the context, binding the resource there and pointing the sampler
//! uniform (or uniform block) at it. The returned guard gives the unit back when dropped.

use crate::context::ContextError;
use crate::functions::{Bind, GlFunctions};
use crate::shader::{Shader, StageError, StageType};
use crate::texture::TextureBinding;
use crate::uniform_buffer::UniformBuffer;
use gl::types::*;
use glam::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use std::cell::RefCell;
use std::collections::HashMap;
use std::error;
use std::fmt;
use std::marker::PhantomData;

/// Location of a uniform in a linked program.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct UniformLocation(GLint);

impl UniformLocation {
  /// Location of uniforms the program doesn’t have.
  pub const INVALID: Self = UniformLocation(-1);

  pub fn is_valid(self) -> bool {
    self.0 >= 0
  }

  pub fn raw(self) -> GLint {
    self.0
  }
}

/// Index of a uniform block in a linked program.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BlockIndex(GLuint);

impl BlockIndex {
  /// Index of uniform blocks the program doesn’t have.
  pub const INVALID: Self = BlockIndex(gl::INVALID_INDEX);

  pub fn is_valid(self) -> bool {
    self.0 != gl::INVALID_INDEX
  }

  pub fn raw(self) -> GLuint {
    self.0
  }
}

/// Type of a uniform, as reported by the driver.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum UniformType {
  // scalars
  Int,
  UInt,
  Float,
  Bool,

  // vectors
  IVec2,
  IVec3,
  IVec4,
  UIVec2,
  UIVec3,
  UIVec4,
  Vec2,
  Vec3,
  Vec4,
  BVec2,
  BVec3,
  BVec4,

  // matrices
  M22,
  M33,
  M44,

  // textures
  Sampler1D,
  Sampler2D,
  Sampler3D,
  Sampler2DArray,
  Sampler2DShadow,
  ISampler2D,
  UISampler2D,
  Cubemap,

  /// Anything else; carries the driver enum.
  Other(GLenum),
}

impl UniformType {
  pub(crate) fn from_glenum(ty: GLenum) -> Self {
    match ty {
      gl::INT => UniformType::Int,
      gl::UNSIGNED_INT => UniformType::UInt,
      gl::FLOAT => UniformType::Float,
      gl::BOOL => UniformType::Bool,
      gl::INT_VEC2 => UniformType::IVec2,
      gl::INT_VEC3 => UniformType::IVec3,
      gl::INT_VEC4 => UniformType::IVec4,
      gl::UNSIGNED_INT_VEC2 => UniformType::UIVec2,
      gl::UNSIGNED_INT_VEC3 => UniformType::UIVec3,
      gl::UNSIGNED_INT_VEC4 => UniformType::UIVec4,
      gl::FLOAT_VEC2 => UniformType::Vec2,
      gl::FLOAT_VEC3 => UniformType::Vec3,
      gl::FLOAT_VEC4 => UniformType::Vec4,
      gl::BOOL_VEC2 => UniformType::BVec2,
      gl::BOOL_VEC3 => UniformType::BVec3,
      gl::BOOL_VEC4 => UniformType::BVec4,
      gl::FLOAT_MAT2 => UniformType::M22,
      gl::FLOAT_MAT3 => UniformType::M33,
      gl::FLOAT_MAT4 => UniformType::M44,
      gl::SAMPLER_1D => UniformType::Sampler1D,
      gl::SAMPLER_2D => UniformType::Sampler2D,
      gl::SAMPLER_3D => UniformType::Sampler3D,
      gl::SAMPLER_2D_ARRAY => UniformType::Sampler2DArray,
      gl::SAMPLER_2D_SHADOW => UniformType::Sampler2DShadow,
      gl::INT_SAMPLER_2D => UniformType::ISampler2D,
      gl::UNSIGNED_INT_SAMPLER_2D => UniformType::UISampler2D,
      gl::SAMPLER_CUBE => UniformType::Cubemap,
      other => UniformType::Other(other),
    }
  }

  pub fn is_sampler(self) -> bool {
    matches!(
      self,
      UniformType::Sampler1D
        | UniformType::Sampler2D
        | UniformType::Sampler3D
        | UniformType::Sampler2DArray
        | UniformType::Sampler2DShadow
        | UniformType::ISampler2D
        | UniformType::UISampler2D
        | UniformType::Cubemap
    )
  }
}

/// Reflected active uniform.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UniformInfo {
  /// Name, without the `[0]` suffix the driver reports arrays with.
  pub name: String,
  /// Number of array elements; `1` for non-arrays.
  pub size: usize,
  pub ty: UniformType,
  pub location: UniformLocation,
}

/// Reflected active uniform block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UniformBlockInfo {
  pub name: String,
  pub index: BlockIndex,
  /// Size of the block storage in bytes.
  pub size: usize,
  /// Binding point at link time.
  pub binding: u32,
  /// Stages referencing the block.
  pub stages: Vec<StageType>,
}

/// Errors that programs can emit.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProgramError {
  Context(ContextError),
  /// A stage of the program failed.
  Stage(StageError),
  /// The driver refused to create the program.
  CreationFailed,
  /// Link failed; carries the driver log.
  LinkFailed(String),
  /// Detaching a stage that isn’t attached.
  NotAttached { shader: GLuint },
  /// The program has no active uniform with that name.
  UnknownUniform(String),
  /// The program has no active uniform block with that name.
  UnknownUniformBlock(String),
  /// Every texture unit is in use.
  NoTextureUnit,
  /// Every uniform buffer binding point is in use.
  NoBufferBinding,
}

impl ProgramError {
  pub fn link_failed(log: impl Into<String>) -> Self {
    ProgramError::LinkFailed(log.into())
  }

  pub fn unknown_uniform(name: impl Into<String>) -> Self {
    ProgramError::UnknownUniform(name.into())
  }

  pub fn unknown_uniform_block(name: impl Into<String>) -> Self {
    ProgramError::UnknownUniformBlock(name.into())
  }
}

impl fmt::Display for ProgramError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      ProgramError::Context(ref e) => write!(f, "shader program context error: {}", e),
      ProgramError::Stage(ref e) => write!(f, "shader program has stage error: {}", e),
      ProgramError::CreationFailed => f.write_str("cannot create shader program"),
      ProgramError::LinkFailed(ref s) => write!(f, "shader program failed to link: {}", s),
      ProgramError::NotAttached { shader } => {
        write!(f, "shader {} is not attached to the program", shader)
      }
      ProgramError::UnknownUniform(ref name) => write!(f, "unknown uniform {}", name),
      ProgramError::UnknownUniformBlock(ref name) => write!(f, "unknown uniform block {}", name),
      ProgramError::NoTextureUnit => f.write_str("no texture unit available"),
      ProgramError::NoBufferBinding => f.write_str("no uniform buffer binding point available"),
    }
  }
}

impl error::Error for ProgramError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      ProgramError::Context(e) => Some(e),
      ProgramError::Stage(e) => Some(e),
      _ => None,
    }
  }
}

impl From<ContextError> for ProgramError {
  fn from(e: ContextError) -> Self {
    ProgramError::Context(e)
  }
}

impl From<StageError> for ProgramError {
  fn from(e: StageError) -> Self {
    ProgramError::Stage(e)
  }
}

/// Values that can be sent to a uniform of the program in use.
pub trait Uniformable {
  fn update(&self, gl: &GlFunctions, location: UniformLocation) -> Result<(), ContextError>;
}

macro_rules! impl_Uniformable {
  (scalar $t:ty, $f:ident, $conv:expr) => {
    impl Uniformable for $t {
      fn update(&self, gl: &GlFunctions, location: UniformLocation) -> Result<(), ContextError> {
        gl.$f(location.raw(), $conv(*self))
      }
    }
  };

  (vec $t:ty, $f:ident, $n:expr) => {
    impl Uniformable for $t {
      fn update(&self, gl: &GlFunctions, location: UniformLocation) -> Result<(), ContextError> {
        gl.$f(location.raw(), $n, &self.to_array())
      }
    }

    impl Uniformable for [$t] {
      fn update(&self, gl: &GlFunctions, location: UniformLocation) -> Result<(), ContextError> {
        gl.$f(location.raw(), $n, bytemuck::cast_slice(self))
      }
    }
  };

  (mat $t:ty, $n:expr) => {
    impl Uniformable for $t {
      fn update(&self, gl: &GlFunctions, location: UniformLocation) -> Result<(), ContextError> {
        gl.uniform_matrix_fv(location.raw(), $n, &self.to_cols_array())
      }
    }

    impl Uniformable for [$t] {
      fn update(&self, gl: &GlFunctions, location: UniformLocation) -> Result<(), ContextError> {
        gl.uniform_matrix_fv(location.raw(), $n, bytemuck::cast_slice(self))
      }
    }
  };
}

impl_Uniformable!(scalar i32, uniform_1i, |v| v);
impl_Uniformable!(scalar u32, uniform_1ui, |v| v);
impl_Uniformable!(scalar f32, uniform_1f, |v| v);
impl_Uniformable!(scalar bool, uniform_1i, |v: bool| v as GLint);

impl_Uniformable!(vec Vec2, uniform_fv, 2);
impl_Uniformable!(vec Vec3, uniform_fv, 3);
impl_Uniformable!(vec Vec4, uniform_fv, 4);
impl_Uniformable!(vec IVec2, uniform_iv, 2);
impl_Uniformable!(vec IVec3, uniform_iv, 3);
impl_Uniformable!(vec IVec4, uniform_iv, 4);

impl_Uniformable!(mat Mat2, 2);
impl_Uniformable!(mat Mat3, 3);
impl_Uniformable!(mat Mat4, 4);

impl Uniformable for [f32] {
  fn update(&self, gl: &GlFunctions, location: UniformLocation) -> Result<(), ContextError> {
    gl.uniform_fv(location.raw(), 1, self)
  }
}

impl Uniformable for [i32] {
  fn update(&self, gl: &GlFunctions, location: UniformLocation) -> Result<(), ContextError> {
    gl.uniform_iv(location.raw(), 1, self)
  }
}

/// Texture bound on a reserved texture unit for a program.
///
/// The unit goes back to the context when this is dropped.
#[derive(Debug)]
pub struct BoundTexture<'a> {
  gl: GlFunctions,
  unit: u32,
  _texture: PhantomData<&'a ()>,
}

impl<'a> BoundTexture<'a> {
  pub fn unit(&self) -> u32 {
    self.unit
  }
}

impl<'a> Drop for BoundTexture<'a> {
  fn drop(&mut self) {
    if let Err(e) = self.gl.release_texture_unit(self.unit) {
      log::error!("texture unit {} stays reserved: {}", self.unit, e);
    }
  }
}

/// Uniform buffer bound on a reserved binding point for a program.
///
/// The binding point goes back to the context when this is dropped.
#[derive(Debug)]
pub struct BoundUniformBuffer<'a> {
  gl: GlFunctions,
  binding: u32,
  _buffer: PhantomData<&'a ()>,
}

impl<'a> BoundUniformBuffer<'a> {
  pub fn binding(&self) -> u32 {
    self.binding
  }
}

impl<'a> Drop for BoundUniformBuffer<'a> {
  fn drop(&mut self) {
    if let Err(e) = self.gl.release_buffer_binding(self.binding) {
      log::error!("uniform buffer binding {} stays reserved: {}", self.binding, e);
    }
  }
}

/// A shader program.
#[derive(Debug)]
pub struct ShaderProgram {
  gl: GlFunctions,
  handle: GLuint,
  name: String,
  linked: bool,
  attached: Vec<GLuint>,
  uniforms: Vec<UniformInfo>,
  blocks: Vec<UniformBlockInfo>,
  // every name looked up since the last link, including misses
  locations: RefCell<HashMap<String, UniformLocation>>,
  block_indices: RefCell<HashMap<String, BlockIndex>>,
}

impl ShaderProgram {
  /// Create an empty, unlinked program.
  pub fn new(gl: &GlFunctions, name: impl Into<String>) -> Result<Self, ProgramError> {
    let handle = gl.create_program()?;
    let name = name.into();

    if handle == 0 {
      log::error!("cannot create shader program {}", name);
      return Err(ProgramError::CreationFailed);
    }

    log::debug!("created shader program {} ({})", name, handle);

    Ok(ShaderProgram {
      gl: gl.clone(),
      handle,
      name,
      linked: false,
      attached: Vec::new(),
      uniforms: Vec::new(),
      blocks: Vec::new(),
      locations: RefCell::new(HashMap::new()),
      block_indices: RefCell::new(HashMap::new()),
    })
  }

  /// Compile a vertex and a fragment stage and link them into a new program.
  ///
  /// The stages are detached once the program is linked.
  pub fn from_sources(
    gl: &GlFunctions,
    name: impl Into<String>,
    vertex: &str,
    fragment: &str,
  ) -> Result<Self, ProgramError> {
    let vs = Shader::compile(gl, StageType::Vertex, vertex)?;
    let fs = Shader::compile(gl, StageType::Fragment, fragment)?;

    let mut program = Self::new(gl, name)?;
    program.attach(&vs)?;
    program.attach(&fs)?;
    program.link()?;
    program.detach(&vs)?;
    program.detach(&fs)?;

    Ok(program)
  }

  pub fn handle(&self) -> GLuint {
    self.handle
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn is_linked(&self) -> bool {
    self.linked
  }

  /// Handles of the attached stages, in attachment order.
  pub fn attached_shaders(&self) -> &[GLuint] {
    &self.attached
  }

  pub fn is_attached(&self, shader: &Shader) -> bool {
    self.attached.contains(&shader.handle())
  }

  /// Attach a stage. Attaching a stage twice is a no-op.
  pub fn attach(&mut self, shader: &Shader) -> Result<(), ProgramError> {
    if self.is_attached(shader) {
      log::warn!(
        "{} {} is already attached to shader program {}",
        shader.stage_type(),
        shader.handle(),
        self.name
      );
      return Ok(());
    }

    self.gl.attach_shader(self.handle, shader.handle())?;
    self.attached.push(shader.handle());

    Ok(())
  }

  /// Detach a stage; fails if it isn’t attached.
  pub fn detach(&mut self, shader: &Shader) -> Result<(), ProgramError> {
    let Some(position) = self.attached.iter().position(|h| *h == shader.handle()) else {
      let err = ProgramError::NotAttached {
        shader: shader.handle(),
      };
      log::error!("shader program {}: {}", self.name, err);
      return Err(err);
    };

    self.gl.detach_shader(self.handle, shader.handle())?;
    self.attached.remove(position);

    Ok(())
  }

  /// Link the attached stages.
  ///
  /// On success, the reflection caches are rebuilt. On failure, the program is unlinked, the
  /// caches are left untouched and the driver log is returned in the error.
  pub fn link(&mut self) -> Result<(), ProgramError> {
    self.gl.link_program(self.handle)?;

    let linked = self.gl.get_program_iv(self.handle, gl::LINK_STATUS)? == gl::TRUE as GLint;

    if !linked {
      self.linked = false;
      let err = ProgramError::link_failed(self.log()?);
      log::error!("shader program {}: {}", self.name, err);
      return Err(err);
    }

    self.reflect()?;
    self.linked = true;

    log::debug!(
      "linked shader program {}: {} uniforms, {} uniform blocks",
      self.name,
      self.uniforms.len(),
      self.blocks.len()
    );

    Ok(())
  }

  /// Driver diagnostics of the last link; empty if none.
  pub fn log(&self) -> Result<String, ContextError> {
    match self.gl.get_program_iv(self.handle, gl::INFO_LOG_LENGTH)? {
      0 => Ok(String::new()),
      _ => self.gl.get_program_info_log(self.handle),
    }
  }

  fn reflect(&mut self) -> Result<(), ContextError> {
    let uniform_count = self.gl.get_program_iv(self.handle, gl::ACTIVE_UNIFORMS)?.max(0) as GLuint;
    let mut uniforms = Vec::with_capacity(uniform_count as usize);

    for index in 0..uniform_count {
      let active = self.gl.get_active_uniform(self.handle, index)?;
      let name = match active.name.strip_suffix("[0]") {
        Some(base) => base.to_owned(),
        None => active.name,
      };
      let location = self.gl.get_uniform_location(self.handle, &name)?;

      uniforms.push(UniformInfo {
        name,
        size: active.size.max(1) as usize,
        ty: UniformType::from_glenum(active.ty),
        location: UniformLocation(location),
      });
    }

    let block_count = self
      .gl
      .get_program_iv(self.handle, gl::ACTIVE_UNIFORM_BLOCKS)?
      .max(0) as GLuint;
    let mut blocks = Vec::with_capacity(block_count as usize);

    for index in 0..block_count {
      let name = self.gl.get_active_uniform_block_name(self.handle, index)?;
      let query = |pname| self.gl.get_active_uniform_block_iv(self.handle, index, pname);

      let size = query(gl::UNIFORM_BLOCK_DATA_SIZE)?.max(0) as usize;
      let binding = query(gl::UNIFORM_BLOCK_BINDING)?.max(0) as u32;

      let mut stages = Vec::new();
      for (pname, stage) in [
        (gl::UNIFORM_BLOCK_REFERENCED_BY_VERTEX_SHADER, StageType::Vertex),
        (
          gl::UNIFORM_BLOCK_REFERENCED_BY_TESS_CONTROL_SHADER,
          StageType::TessellationControl,
        ),
        (
          gl::UNIFORM_BLOCK_REFERENCED_BY_TESS_EVALUATION_SHADER,
          StageType::TessellationEvaluation,
        ),
        (gl::UNIFORM_BLOCK_REFERENCED_BY_GEOMETRY_SHADER, StageType::Geometry),
        (gl::UNIFORM_BLOCK_REFERENCED_BY_FRAGMENT_SHADER, StageType::Fragment),
        (gl::UNIFORM_BLOCK_REFERENCED_BY_COMPUTE_SHADER, StageType::Compute),
      ] {
        if query(pname)? != 0 {
          stages.push(stage);
        }
      }

      blocks.push(UniformBlockInfo {
        name,
        index: BlockIndex(index),
        size,
        binding,
        stages,
      });
    }

    self.uniforms = uniforms;
    self.blocks = blocks;
    self.locations.borrow_mut().clear();
    self.block_indices.borrow_mut().clear();

    Ok(())
  }

  /// Active uniforms of the last successful link.
  pub fn active_uniforms(&self) -> &[UniformInfo] {
    &self.uniforms
  }

  /// Active uniform blocks of the last successful link.
  pub fn active_uniform_blocks(&self) -> &[UniformBlockInfo] {
    &self.blocks
  }

  /// Reflected uniform named `name`.
  pub fn query_uniform(&self, name: &str) -> Result<&UniformInfo, ProgramError> {
    self.uniforms.iter().find(|u| u.name == name).ok_or_else(|| {
      let err = ProgramError::unknown_uniform(name);
      log::error!("shader program {}: {}", self.name, err);
      err
    })
  }

  /// Reflected uniform block named `name`.
  pub fn query_uniform_block(&self, name: &str) -> Result<&UniformBlockInfo, ProgramError> {
    self.blocks.iter().find(|b| b.name == name).ok_or_else(|| {
      let err = ProgramError::unknown_uniform_block(name);
      log::error!("shader program {}: {}", self.name, err);
      err
    })
  }

  /// Location of a uniform, or [`UniformLocation::INVALID`] if the program has none by that name.
  ///
  /// Array elements can be looked up with `name[i]`. Answers are memoized until the next link; a
  /// miss is only warned about the first time.
  pub fn uniform_location(&self, name: &str) -> Result<UniformLocation, ContextError> {
    if let Some(location) = self.locations.borrow().get(name) {
      return Ok(*location);
    }

    let location = match self.uniforms.iter().find(|u| u.name == name) {
      Some(uniform) => uniform.location,
      None if self.linked => UniformLocation(self.gl.get_uniform_location(self.handle, name)?),
      None => UniformLocation::INVALID,
    };

    if !location.is_valid() {
      log::warn!("shader program {} has no uniform {}", self.name, name);
    }

    self.locations.borrow_mut().insert(name.to_owned(), location);

    Ok(location)
  }

  /// Index of a uniform block, or [`BlockIndex::INVALID`] if the program has none by that name.
  pub fn uniform_block_index(&self, name: &str) -> Result<BlockIndex, ContextError> {
    if let Some(index) = self.block_indices.borrow().get(name) {
      return Ok(*index);
    }

    let index = match self.blocks.iter().find(|b| b.name == name) {
      Some(block) => block.index,
      None if self.linked => BlockIndex(self.gl.get_uniform_block_index(self.handle, name)?),
      None => BlockIndex::INVALID,
    };

    if !index.is_valid() {
      log::warn!("shader program {} has no uniform block {}", self.name, name);
    }

    self.block_indices.borrow_mut().insert(name.to_owned(), index);

    Ok(index)
  }

  /// Make this program the one draw calls use. No-op while unlinked.
  pub fn use_program(&self) -> Result<(), ProgramError> {
    if !self.linked {
      log::debug!("not using unlinked shader program {}", self.name);
      return Ok(());
    }

    self.gl.use_program(self.handle, Bind::Cached)?;
    Ok(())
  }

  /// Set a uniform by name; no-op if the program doesn’t have it.
  ///
  /// The program is made current first.
  pub fn set_uniform<T>(&self, name: &str, value: &T) -> Result<(), ProgramError>
  where
    T: Uniformable + ?Sized,
  {
    let location = self.uniform_location(name)?;
    self.set_uniform_at(location, value)
  }

  /// Set a uniform by location; no-op on [`UniformLocation::INVALID`].
  pub fn set_uniform_at<T>(&self, location: UniformLocation, value: &T) -> Result<(), ProgramError>
  where
    T: Uniformable + ?Sized,
  {
    if !location.is_valid() || !self.linked {
      return Ok(());
    }

    self.use_program()?;
    value.update(&self.gl, location)?;

    Ok(())
  }

  /// Bind a texture on a free texture unit and point the sampler uniform `name` at it.
  pub fn bind_texture<'a, T>(
    &self,
    name: &str,
    texture: &'a T,
  ) -> Result<BoundTexture<'a>, ProgramError>
  where
    T: TextureBinding + ?Sized,
  {
    let unit = self.gl.reserve_texture_unit()?.ok_or_else(|| {
      log::error!("shader program {}: no texture unit left for {}", self.name, name);
      ProgramError::NoTextureUnit
    })?;

    let bound = BoundTexture {
      gl: self.gl.clone(),
      unit,
      _texture: PhantomData,
    };

    self
      .gl
      .bind_texture_at(unit, texture.target(), texture.handle())?;
    self.set_uniform(name, &(unit as GLint))?;

    Ok(bound)
  }

  /// Bind a uniform buffer on a free binding point and point the uniform block `name` at it.
  pub fn bind_uniform_buffer<'a>(
    &self,
    name: &str,
    buffer: &'a UniformBuffer,
  ) -> Result<BoundUniformBuffer<'a>, ProgramError> {
    let binding = self.gl.reserve_buffer_binding()?.ok_or_else(|| {
      log::error!("shader program {}: no uniform buffer binding left for {}", self.name, name);
      ProgramError::NoBufferBinding
    })?;

    let bound = BoundUniformBuffer {
      gl: self.gl.clone(),
      binding,
      _buffer: PhantomData,
    };

    self
      .gl
      .bind_buffer_base(gl::UNIFORM_BUFFER, binding, buffer.buffer().handle())?;

    let index = self.uniform_block_index(name)?;
    if index.is_valid() {
      self
        .gl
        .uniform_block_binding(self.handle, index.raw(), binding)?;
    }

    Ok(bound)
  }
}

impl Drop for ShaderProgram {
  fn drop(&mut self) {
    match self.gl.delete_program(self.handle) {
      Ok(()) => log::trace!("deleted shader program {} ({})", self.name, self.handle),
      Err(e) => log::error!("leaking shader program {} ({}): {}", self.name, self.handle, e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::buffer::BufferUsage;
  use crate::driver::software::RecordedUniform;
  use crate::pixel::PixelFormat;
  use crate::testing::headless;
  use crate::texture::{Sampler, Texture};

  const VS: &str = "
#version 330 core
uniform mat4 u_ViewProjection;
uniform mat4 u_Transform;
layout (location = 0) in vec3 a_Position;
void main() {
  gl_Position = u_ViewProjection * u_Transform * vec4(a_Position, 1.);
}
";

  const FS: &str = "
#version 330 core
layout (std140) uniform Material {
  vec4 albedo;
  float roughness;
};
uniform sampler2D u_Texture;
uniform vec3 u_LightColors[4];
out vec4 frag;
void main() {
  frag = albedo * texture(u_Texture, vec2(0.));
}
";

  fn program(gl: &GlFunctions) -> ShaderProgram {
    ShaderProgram::from_sources(gl, "test", VS, FS).unwrap()
  }

  #[test]
  fn link_reflects_uniforms_and_blocks() {
    let (gl, _) = headless();
    let program = program(&gl);

    assert!(program.is_linked());
    assert!(program.attached_shaders().is_empty());

    let names: Vec<_> = program.active_uniforms().iter().map(|u| u.name.as_str()).collect();
    assert_eq!(
      names,
      ["u_ViewProjection", "u_Transform", "u_Texture", "u_LightColors"]
    );

    let lights = program.query_uniform("u_LightColors").unwrap();
    assert_eq!(lights.size, 4);
    assert_eq!(lights.ty, UniformType::Vec3);
    assert!(program.query_uniform("u_Texture").unwrap().ty.is_sampler());

    let material = program.query_uniform_block("Material").unwrap();
    assert_eq!(material.size, 32);
    assert_eq!(material.stages, [StageType::Fragment]);

    for uniform in program.active_uniforms() {
      assert!(program.query_uniform(&uniform.name).is_ok());
      assert_eq!(program.uniform_location(&uniform.name), Ok(uniform.location));
    }
  }

  #[test]
  fn unknown_uniforms_yield_the_invalid_location() {
    let (gl, driver) = headless();
    let program = program(&gl);

    assert_eq!(
      program.uniform_location("u_DoesNotExist"),
      Ok(UniformLocation::INVALID)
    );
    assert_eq!(
      program.query_uniform("u_DoesNotExist"),
      Err(ProgramError::unknown_uniform("u_DoesNotExist"))
    );
    assert_eq!(
      program.uniform_block_index("Nope"),
      Ok(BlockIndex::INVALID)
    );

    // misses are memoized
    let lookups = driver.calls("glGetUniformLocation");
    program.uniform_location("u_DoesNotExist").unwrap();
    assert_eq!(driver.calls("glGetUniformLocation"), lookups);

    // and setting them does nothing
    let uploads = driver.calls("glUniform1f");
    program.set_uniform("u_DoesNotExist", &1.0f32).unwrap();
    assert_eq!(driver.calls("glUniform1f"), uploads);
  }

  #[test]
  fn array_elements_are_looked_up() {
    let (gl, _) = headless();
    let program = program(&gl);
    let base = program.uniform_location("u_LightColors").unwrap();

    assert_eq!(
      program.uniform_location("u_LightColors[2]").unwrap().raw(),
      base.raw() + 2
    );
    assert!(!program.uniform_location("u_LightColors[4]").unwrap().is_valid());
  }

  #[test]
  fn uniform_values_reach_the_program() {
    let (gl, driver) = headless();
    let program = program(&gl);
    let transform = Mat4::from_translation(Vec3::new(1., 2., 3.));

    program.set_uniform("u_Transform", &transform).unwrap();
    program
      .set_uniform("u_LightColors", &[Vec3::X, Vec3::Y][..])
      .unwrap();

    let location = program.uniform_location("u_Transform").unwrap().raw();
    assert_eq!(
      driver.uniform_value(program.handle(), location),
      Some(RecordedUniform::Float(transform.to_cols_array().to_vec()))
    );

    let location = program.uniform_location("u_LightColors").unwrap().raw();
    assert_eq!(
      driver.uniform_value(program.handle(), location),
      Some(RecordedUniform::Float(vec![1., 0., 0., 0., 1., 0.]))
    );
  }

  #[test]
  fn failed_link_keeps_previous_reflection() {
    let (gl, driver) = headless();
    let mut program = program(&gl);
    let uniforms = program.active_uniforms().to_vec();
    let blocks = program.active_uniform_blocks().to_vec();

    let broken = Shader::new(&gl, StageType::Geometry, "void main() {\n#error broken\n}").unwrap();
    program.attach(&broken).unwrap();

    assert!(matches!(program.link(), Err(ProgramError::LinkFailed(_))));
    assert!(!program.is_linked());
    assert_eq!(program.active_uniforms(), &uniforms[..]);
    assert_eq!(program.active_uniform_blocks(), &blocks[..]);

    let uses = driver.calls("glUseProgram");
    program.use_program().unwrap();
    assert_eq!(driver.calls("glUseProgram"), uses);
  }

  #[test]
  fn relinking_rebuilds_reflection() {
    let (gl, _) = headless();
    let vs = Shader::compile(&gl, StageType::Vertex, VS).unwrap();
    let fs = Shader::compile(&gl, StageType::Fragment, "out vec4 f;\nvoid main() {}").unwrap();

    let mut program = ShaderProgram::new(&gl, "relink").unwrap();
    program.attach(&vs).unwrap();
    program.attach(&fs).unwrap();
    program.link().unwrap();
    assert_eq!(program.active_uniforms().len(), 2);
    assert!(program.active_uniform_blocks().is_empty());

    let richer = Shader::compile(&gl, StageType::Fragment, FS).unwrap();
    program.detach(&fs).unwrap();
    program.attach(&richer).unwrap();
    program.link().unwrap();

    assert_eq!(program.active_uniforms().len(), 4);
    assert_eq!(program.active_uniform_blocks().len(), 1);
  }

  #[test]
  fn attach_twice_and_detach_unknown() {
    let (gl, driver) = headless();
    let vs = Shader::compile(&gl, StageType::Vertex, VS).unwrap();
    let fs = Shader::compile(&gl, StageType::Fragment, FS).unwrap();
    let mut program = ShaderProgram::new(&gl, "attach").unwrap();

    program.attach(&vs).unwrap();
    program.attach(&vs).unwrap();
    assert_eq!(program.attached_shaders(), &[vs.handle()]);
    assert_eq!(driver.calls("glAttachShader"), 1);

    assert_eq!(
      program.detach(&fs),
      Err(ProgramError::NotAttached { shader: fs.handle() })
    );
  }

  #[test]
  fn failing_stage_is_reported() {
    let (gl, _) = headless();

    assert!(matches!(
      ShaderProgram::from_sources(&gl, "broken", VS, "void main() {"),
      Err(ProgramError::Stage(StageError::CompilationFailed(StageType::Fragment, _)))
    ));
  }

  #[test]
  fn textures_are_bound_on_reserved_units() {
    let (gl, driver) = headless();
    let program = program(&gl);
    let mut texture = Texture::new(&gl, Sampler::default()).unwrap();
    texture.create([4, 4], Some(1), PixelFormat::RGBA8).unwrap();

    let location = program.uniform_location("u_Texture").unwrap().raw();

    {
      let first = program.bind_texture("u_Texture", &texture).unwrap();
      let second = program.bind_texture("u_Texture", &texture).unwrap();
      assert_ne!(first.unit(), second.unit());
      assert_eq!(
        driver.uniform_value(program.handle(), location),
        Some(RecordedUniform::Int(vec![second.unit() as GLint]))
      );
    }

    // both units were given back
    let unit = program.bind_texture("u_Texture", &texture).unwrap().unit();
    assert!(unit < 2);
  }

  #[test]
  fn uniform_buffers_are_bound_to_blocks() {
    let (gl, driver) = headless();
    let program = program(&gl);
    let buffer = UniformBuffer::new(&gl, 32, BufferUsage::DynamicDraw).unwrap();

    let bound = program.bind_uniform_buffer("Material", &buffer).unwrap();

    assert_eq!(
      driver.indexed_buffer(gl::UNIFORM_BUFFER, bound.binding()),
      buffer.buffer().handle()
    );
    assert_eq!(driver.calls("glUniformBlockBinding"), 1);

    // an unknown block still binds the buffer, without pointing any block at it
    let _unknown = program.bind_uniform_buffer("Nope", &buffer).unwrap();
    assert_eq!(driver.calls("glUniformBlockBinding"), 1);
  }

  #[test]
  fn programs_are_deleted_on_drop() {
    let (gl, driver) = headless();
    let program = program(&gl);
    let handle = program.handle();

    drop(program);
    assert!(!driver.is_program(handle));
  }
}
