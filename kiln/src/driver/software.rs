//! In-memory simulation of the OpenGL entry points.
//!
//! [`SoftwareDriver`] keeps a tiny model of a GPU: buffer storage with mapping, texture levels,
//! render buffers, framebuffer completeness, shader compilation and program linking with
//! reflection of the declared uniforms and uniform blocks, uniform values and vertex array state.
//! Invalid calls set the error flag returned by `glGetError` instead of doing anything, like a
//! real driver would.
//!
//! Every entry point bumps a call counter keyed by its OpenGL name (`"glBufferSubData"`, …),
//! which is what tests use to assert that an operation issued (or did not issue) a given driver
//! call. Clones share the same simulated GPU.

use crate::driver::{ActiveUniform, Driver};
use gl::types::*;
use std::collections::{BTreeMap, HashMap};
use std::os::raw::c_void;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

mod glsl;

const MAX_TEXTURE_SIZE: GLint = 8192;
const MAX_COLOR_ATTACHMENTS: GLint = 8;
const MAX_COMBINED_TEXTURE_IMAGE_UNITS: GLint = 32;
const MAX_UNIFORM_BUFFER_BINDINGS: GLint = 36;
const MAX_VERTEX_ATTRIBS: GLint = 16;
const MAX_TEXTURE_LOD_BIAS: GLfloat = 16.;

/// A uniform value recorded by one of the `glUniform*` calls.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedUniform {
  Int(Vec<GLint>),
  UInt(Vec<GLuint>),
  Float(Vec<GLfloat>),
}

/// Vertex attribute state recorded in a vertex array.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VertexAttribute {
  pub components: GLint,
  pub ty: GLenum,
  pub normalized: bool,
  pub integer: bool,
  pub stride: GLsizei,
  pub offset: usize,
  pub buffer: GLuint,
  pub enabled: bool,
}

/// Simulated OpenGL driver.
#[derive(Clone, Debug, Default)]
pub struct SoftwareDriver {
  gpu: Arc<Mutex<Gpu>>,
}

#[derive(Debug)]
struct Gpu {
  error: GLenum,
  calls: HashMap<&'static str, usize>,
  next_name: GLuint,

  capabilities: HashMap<GLenum, bool>,
  clear_color: [GLfloat; 4],
  viewport: [GLint; 4],
  raster: RasterState,
  pixel_store: HashMap<GLenum, GLint>,

  buffers: HashMap<GLuint, SoftBuffer>,
  buffer_bindings: HashMap<GLenum, GLuint>,
  indexed_bindings: HashMap<(GLenum, GLuint), GLuint>,

  textures: HashMap<GLuint, SoftTexture>,
  active_unit: GLuint,
  texture_bindings: HashMap<(GLuint, GLenum), GLuint>,

  renderbuffers: HashMap<GLuint, Option<RenderbufferStorage>>,
  renderbuffer_binding: GLuint,

  framebuffers: HashMap<GLuint, SoftFramebuffer>,
  draw_framebuffer: GLuint,
  read_framebuffer: GLuint,

  shaders: HashMap<GLuint, SoftShader>,
  programs: HashMap<GLuint, SoftProgram>,
  current_program: GLuint,

  vertex_arrays: HashMap<GLuint, SoftVertexArray>,
  vertex_array_binding: GLuint,
}

impl Default for Gpu {
  fn default() -> Self {
    Gpu {
      error: gl::NO_ERROR,
      calls: HashMap::new(),
      next_name: 1,
      capabilities: HashMap::new(),
      clear_color: [0.; 4],
      viewport: [0; 4],
      raster: RasterState::default(),
      pixel_store: HashMap::new(),
      buffers: HashMap::new(),
      buffer_bindings: HashMap::new(),
      indexed_bindings: HashMap::new(),
      textures: HashMap::new(),
      active_unit: 0,
      texture_bindings: HashMap::new(),
      renderbuffers: HashMap::new(),
      renderbuffer_binding: 0,
      framebuffers: HashMap::new(),
      draw_framebuffer: 0,
      read_framebuffer: 0,
      shaders: HashMap::new(),
      programs: HashMap::new(),
      current_program: 0,
      vertex_arrays: HashMap::new(),
      vertex_array_binding: 0,
    }
  }
}

/// Blending, culling, depth and stencil parameters last sent to the driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RasterState {
  pub blend_equation: GLenum,
  /// Source and destination factors.
  pub blend_func: (GLenum, GLenum),
  pub front_face: GLenum,
  pub cull_face: GLenum,
  pub depth_func: GLenum,
  /// Function, reference and mask.
  pub stencil_func: (GLenum, GLint, GLuint),
  /// Stencil fail, depth fail and depth pass operations.
  pub stencil_op: (GLenum, GLenum, GLenum),
  pub stencil_mask: GLuint,
}

impl Default for RasterState {
  fn default() -> Self {
    RasterState {
      blend_equation: gl::FUNC_ADD,
      blend_func: (gl::ONE, gl::ZERO),
      front_face: gl::CCW,
      cull_face: gl::BACK,
      depth_func: gl::LESS,
      stencil_func: (gl::ALWAYS, 0, !0),
      stencil_op: (gl::KEEP, gl::KEEP, gl::KEEP),
      stencil_mask: !0,
    }
  }
}

#[derive(Debug, Default)]
struct SoftBuffer {
  data: Vec<u8>,
  mapped: bool,
}

#[derive(Debug, Default)]
struct SoftTexture {
  target: Option<GLenum>,
  params: HashMap<GLenum, GLint>,
  // (image target, level)
  images: HashMap<(GLenum, GLint), SoftImage>,
}

#[derive(Clone, Debug)]
struct SoftImage {
  internal_format: GLenum,
  size: [usize; 2],
  pixel_size: usize,
  data: Vec<u8>,
}

#[derive(Clone, Copy, Debug)]
struct RenderbufferStorage {
  internal_format: GLenum,
  size: [GLsizei; 2],
}

#[derive(Clone, Copy, Debug)]
enum Attached {
  Texture {
    handle: GLuint,
    target: GLenum,
    level: GLint,
  },
  Renderbuffer(GLuint),
}

#[derive(Debug)]
struct SoftFramebuffer {
  attachments: BTreeMap<GLenum, Attached>,
  draw_buffers: Vec<GLenum>,
}

impl Default for SoftFramebuffer {
  fn default() -> Self {
    SoftFramebuffer {
      attachments: BTreeMap::new(),
      draw_buffers: vec![gl::COLOR_ATTACHMENT0],
    }
  }
}

#[derive(Debug)]
struct SoftShader {
  ty: GLenum,
  source: String,
  compiled: bool,
  log: String,
  delete_pending: bool,
}

#[derive(Debug)]
struct ReflectedUniform {
  name: String,
  ty: GLenum,
  count: usize,
  location: GLint,
}

#[derive(Debug)]
struct ReflectedBlock {
  name: String,
  size: usize,
  members: usize,
  binding: GLuint,
  stages: Vec<GLenum>,
}

#[derive(Debug, Default)]
struct SoftProgram {
  attached: Vec<GLuint>,
  linked: bool,
  log: String,
  uniforms: Vec<ReflectedUniform>,
  blocks: Vec<ReflectedBlock>,
  locations: GLint,
  values: HashMap<GLint, RecordedUniform>,
}

#[derive(Debug, Default)]
struct SoftVertexArray {
  attributes: BTreeMap<GLuint, VertexAttribute>,
  element_buffer: GLuint,
}

impl Gpu {
  fn fail(&mut self, error: GLenum) {
    if self.error == gl::NO_ERROR {
      self.error = error;
    }
  }

  fn gen_name(&mut self) -> GLuint {
    let name = self.next_name;
    self.next_name += 1;
    name
  }

  fn bound_buffer(&self, target: GLenum) -> GLuint {
    if target == gl::ELEMENT_ARRAY_BUFFER && self.vertex_array_binding != 0 {
      return self
        .vertex_arrays
        .get(&self.vertex_array_binding)
        .map_or(0, |vao| vao.element_buffer);
    }

    self.buffer_bindings.get(&target).copied().unwrap_or(0)
  }

  fn bound_buffer_mut(&mut self, target: GLenum) -> Option<&mut SoftBuffer> {
    let handle = self.bound_buffer(target);

    if handle == 0 {
      self.fail(gl::INVALID_OPERATION);
      return None;
    }

    self.buffers.get_mut(&handle)
  }

  fn bound_texture(&self, target: GLenum) -> GLuint {
    self
      .texture_bindings
      .get(&(self.active_unit, binding_target(target)))
      .copied()
      .unwrap_or(0)
  }

  fn bound_texture_mut(&mut self, target: GLenum) -> Option<&mut SoftTexture> {
    let handle = self.bound_texture(target);

    if handle == 0 {
      self.fail(gl::INVALID_OPERATION);
      return None;
    }

    self.textures.get_mut(&handle)
  }

  fn framebuffer_for(&self, target: GLenum) -> GLuint {
    match target {
      gl::READ_FRAMEBUFFER => self.read_framebuffer,
      _ => self.draw_framebuffer,
    }
  }

  fn is_attached_anywhere(&self, shader: GLuint) -> bool {
    self
      .programs
      .values()
      .any(|program| program.attached.contains(&shader))
  }

  fn framebuffer_status(&self, handle: GLuint) -> GLenum {
    if handle == 0 {
      return gl::FRAMEBUFFER_COMPLETE;
    }

    let Some(fb) = self.framebuffers.get(&handle) else {
      return gl::FRAMEBUFFER_UNDEFINED;
    };

    if fb.attachments.is_empty() {
      return gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
    }

    for (&point, &attached) in &fb.attachments {
      let storage = match attached {
        Attached::Texture {
          handle,
          target,
          level,
        } => self
          .textures
          .get(&handle)
          .and_then(|tex| tex.images.get(&(target, level)))
          .map(|image| (image.internal_format, image.size[0] * image.size[1])),

        Attached::Renderbuffer(handle) => self
          .renderbuffers
          .get(&handle)
          .copied()
          .flatten()
          .map(|rb| (rb.internal_format, (rb.size[0] * rb.size[1]) as usize)),
      };

      let Some((internal_format, area)) = storage else {
        return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
      };

      let depth_point = matches!(
        point,
        gl::DEPTH_ATTACHMENT | gl::STENCIL_ATTACHMENT | gl::DEPTH_STENCIL_ATTACHMENT
      );

      if area == 0 || depth_point != is_depth_format(internal_format) {
        return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
      }
    }

    let missing_draw_buffer = fb
      .draw_buffers
      .iter()
      .any(|buffer| *buffer != gl::NONE && !fb.attachments.contains_key(buffer));

    if missing_draw_buffer {
      return gl::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER;
    }

    gl::FRAMEBUFFER_COMPLETE
  }

  fn link(&mut self, handle: GLuint) {
    let Some(program) = self.programs.get(&handle) else {
      self.fail(gl::INVALID_VALUE);
      return;
    };

    let mut stages = Vec::new();
    let mut log = String::new();

    for shader in &program.attached {
      match self.shaders.get(shader) {
        Some(shader) if shader.compiled => stages.push((shader.ty, shader.source.as_str())),
        _ => log.push_str(&format!("error: shader {} is not compiled\n", shader)),
      }
    }

    let has = |ty| stages.iter().any(|(t, _)| *t == ty);
    let graphics = has(gl::VERTEX_SHADER) && has(gl::FRAGMENT_SHADER);
    let compute = has(gl::COMPUTE_SHADER);

    if log.is_empty() && !graphics && !compute {
      log.push_str("error: a program needs a vertex and a fragment stage, or a compute stage\n");
    }

    let mut uniforms: Vec<ReflectedUniform> = Vec::new();
    let mut blocks: Vec<ReflectedBlock> = Vec::new();
    let mut locations = 0;

    if log.is_empty() {
      for (ty, source) in &stages {
        let decls = glsl::declarations(source);

        for uniform in decls.uniforms {
          if uniforms.iter().any(|u| u.name == uniform.name) {
            continue;
          }

          uniforms.push(ReflectedUniform {
            name: uniform.name,
            ty: uniform.ty,
            count: uniform.count,
            location: locations,
          });
          locations += uniform.count as GLint;
        }

        for block in decls.blocks {
          match blocks.iter_mut().find(|b| b.name == block.name) {
            Some(known) => known.stages.push(*ty),
            None => blocks.push(ReflectedBlock {
              name: block.name,
              size: block.size,
              members: block.members,
              binding: 0,
              stages: vec![*ty],
            }),
          }
        }
      }
    }

    if let Some(program) = self.programs.get_mut(&handle) {
      program.linked = log.is_empty();
      program.log = log;
      program.uniforms = uniforms;
      program.blocks = blocks;
      program.locations = locations;
      program.values.clear();
    }
  }

  fn record_uniform(&mut self, location: GLint, value: RecordedUniform) {
    if location == -1 {
      return;
    }

    let current = self.current_program;
    match self.programs.get_mut(&current) {
      Some(program) if location >= 0 && location < program.locations => {
        program.values.insert(location, value);
      }

      _ => self.fail(gl::INVALID_OPERATION),
    }
  }
}

fn binding_target(target: GLenum) -> GLenum {
  if (gl::TEXTURE_CUBE_MAP_POSITIVE_X..=gl::TEXTURE_CUBE_MAP_NEGATIVE_Z).contains(&target) {
    gl::TEXTURE_CUBE_MAP
  } else {
    target
  }
}

fn is_depth_format(internal_format: GLenum) -> bool {
  matches!(
    internal_format,
    gl::DEPTH_COMPONENT
      | gl::DEPTH_COMPONENT16
      | gl::DEPTH_COMPONENT24
      | gl::DEPTH_COMPONENT32
      | gl::DEPTH_COMPONENT32F
      | gl::DEPTH_STENCIL
      | gl::DEPTH24_STENCIL8
      | gl::DEPTH32F_STENCIL8
  )
}

fn pixel_size(format: GLenum, ty: GLenum) -> Option<usize> {
  match ty {
    gl::UNSIGNED_INT_24_8 => return Some(4),
    gl::FLOAT_32_UNSIGNED_INT_24_8_REV => return Some(8),
    _ => (),
  }

  let components = match format {
    gl::RED | gl::RED_INTEGER | gl::DEPTH_COMPONENT | gl::STENCIL_INDEX => 1,
    gl::RG | gl::RG_INTEGER => 2,
    gl::RGB | gl::BGR | gl::RGB_INTEGER => 3,
    gl::RGBA | gl::BGRA | gl::RGBA_INTEGER => 4,
    _ => return None,
  };

  let component_size = match ty {
    gl::BYTE | gl::UNSIGNED_BYTE => 1,
    gl::SHORT | gl::UNSIGNED_SHORT | gl::HALF_FLOAT => 2,
    gl::INT | gl::UNSIGNED_INT | gl::FLOAT => 4,
    _ => return None,
  };

  Some(components * component_size)
}

impl SoftwareDriver {
  /// A fresh simulated GPU.
  pub fn new() -> Self {
    Self::default()
  }

  fn gpu(&self, entry_point: &'static str) -> MutexGuard<Gpu> {
    let mut gpu = self.inspect();
    *gpu.calls.entry(entry_point).or_insert(0) += 1;
    gpu
  }

  fn inspect(&self) -> MutexGuard<Gpu> {
    self.gpu.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Number of times an entry point (e.g. `"glBufferSubData"`) was called.
  pub fn calls(&self, entry_point: &str) -> usize {
    self.inspect().calls.get(entry_point).copied().unwrap_or(0)
  }

  /// Total number of entry point calls.
  pub fn total_calls(&self) -> usize {
    self.inspect().calls.values().sum()
  }

  /// Forget every recorded call.
  pub fn reset_calls(&self) {
    self.inspect().calls.clear();
  }

  /// Toggle a capability without going through any dispatch table, as foreign code would.
  pub fn set_enabled_externally(&self, cap: GLenum, enabled: bool) {
    self.inspect().capabilities.insert(cap, enabled);
  }

  pub fn is_buffer(&self, handle: GLuint) -> bool {
    self.inspect().buffers.contains_key(&handle)
  }

  pub fn is_texture(&self, handle: GLuint) -> bool {
    self.inspect().textures.contains_key(&handle)
  }

  pub fn is_renderbuffer(&self, handle: GLuint) -> bool {
    self.inspect().renderbuffers.contains_key(&handle)
  }

  pub fn is_framebuffer(&self, handle: GLuint) -> bool {
    self.inspect().framebuffers.contains_key(&handle)
  }

  pub fn is_shader(&self, handle: GLuint) -> bool {
    self.inspect().shaders.contains_key(&handle)
  }

  pub fn is_program(&self, handle: GLuint) -> bool {
    self.inspect().programs.contains_key(&handle)
  }

  pub fn is_vertex_array(&self, handle: GLuint) -> bool {
    self.inspect().vertex_arrays.contains_key(&handle)
  }

  /// Contents of a buffer's storage.
  pub fn buffer_bytes(&self, handle: GLuint) -> Option<Vec<u8>> {
    self.inspect().buffers.get(&handle).map(|b| b.data.clone())
  }

  pub fn is_buffer_mapped(&self, handle: GLuint) -> bool {
    self.inspect().buffers.get(&handle).map_or(false, |b| b.mapped)
  }

  /// Size of an allocated texture level; `target` is the image target (a cube face for cube maps).
  pub fn texture_level_size(
    &self,
    handle: GLuint,
    target: GLenum,
    level: GLint,
  ) -> Option<[u32; 2]> {
    self
      .inspect()
      .textures
      .get(&handle)
      .and_then(|tex| tex.images.get(&(target, level)))
      .map(|image| [image.size[0] as u32, image.size[1] as u32])
  }

  /// Number of allocated levels of a texture image target.
  pub fn texture_levels(&self, handle: GLuint, target: GLenum) -> usize {
    self.inspect().textures.get(&handle).map_or(0, |tex| {
      tex
        .images
        .keys()
        .filter(|(image_target, _)| *image_target == target)
        .count()
    })
  }

  pub fn texture_parameter(&self, handle: GLuint, pname: GLenum) -> Option<GLint> {
    self
      .inspect()
      .textures
      .get(&handle)
      .and_then(|tex| tex.params.get(&pname).copied())
  }

  /// Last value uploaded to a uniform location of a program.
  pub fn uniform_value(&self, program: GLuint, location: GLint) -> Option<RecordedUniform> {
    self
      .inspect()
      .programs
      .get(&program)
      .and_then(|p| p.values.get(&location).cloned())
  }

  pub fn vertex_attribute(&self, vertex_array: GLuint, index: GLuint) -> Option<VertexAttribute> {
    self
      .inspect()
      .vertex_arrays
      .get(&vertex_array)
      .and_then(|vao| vao.attributes.get(&index).copied())
  }

  /// Buffer bound as element array of a vertex array.
  pub fn element_buffer(&self, vertex_array: GLuint) -> Option<GLuint> {
    self
      .inspect()
      .vertex_arrays
      .get(&vertex_array)
      .map(|vao| vao.element_buffer)
  }

  /// Buffer bound to an indexed binding point (e.g. a uniform buffer binding).
  pub fn indexed_buffer(&self, target: GLenum, index: GLuint) -> GLuint {
    self
      .inspect()
      .indexed_bindings
      .get(&(target, index))
      .copied()
      .unwrap_or(0)
  }

  pub fn clear_color(&self) -> [GLfloat; 4] {
    self.inspect().clear_color
  }

  pub fn viewport(&self) -> [GLint; 4] {
    self.inspect().viewport
  }

  pub fn raster_state(&self) -> RasterState {
    self.inspect().raster
  }
}

unsafe impl Driver for SoftwareDriver {
  fn get_error(&self) -> GLenum {
    let mut gpu = self.gpu("glGetError");
    std::mem::replace(&mut gpu.error, gl::NO_ERROR)
  }

  fn get_integer(&self, pname: GLenum) -> GLint {
    let mut gpu = self.gpu("glGetIntegerv");

    match pname {
      gl::MAJOR_VERSION | gl::MINOR_VERSION => 3,
      gl::MAX_TEXTURE_SIZE | gl::MAX_RENDERBUFFER_SIZE => MAX_TEXTURE_SIZE,
      gl::MAX_CUBE_MAP_TEXTURE_SIZE => MAX_TEXTURE_SIZE,
      gl::MAX_COLOR_ATTACHMENTS | gl::MAX_DRAW_BUFFERS => MAX_COLOR_ATTACHMENTS,
      gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS => MAX_COMBINED_TEXTURE_IMAGE_UNITS,
      gl::MAX_UNIFORM_BUFFER_BINDINGS => MAX_UNIFORM_BUFFER_BINDINGS,
      gl::MAX_VERTEX_ATTRIBS => MAX_VERTEX_ATTRIBS,
      gl::UNPACK_ALIGNMENT | gl::PACK_ALIGNMENT => {
        gpu.pixel_store.get(&pname).copied().unwrap_or(4)
      }
      gl::CURRENT_PROGRAM => gpu.current_program as GLint,
      gl::ACTIVE_TEXTURE => (gl::TEXTURE0 + gpu.active_unit) as GLint,
      gl::ARRAY_BUFFER_BINDING => gpu.bound_buffer(gl::ARRAY_BUFFER) as GLint,
      gl::ELEMENT_ARRAY_BUFFER_BINDING => gpu.bound_buffer(gl::ELEMENT_ARRAY_BUFFER) as GLint,
      gl::UNIFORM_BUFFER_BINDING => gpu.bound_buffer(gl::UNIFORM_BUFFER) as GLint,
      gl::VERTEX_ARRAY_BINDING => gpu.vertex_array_binding as GLint,
      gl::DRAW_FRAMEBUFFER_BINDING => gpu.draw_framebuffer as GLint,
      gl::READ_FRAMEBUFFER_BINDING => gpu.read_framebuffer as GLint,
      gl::RENDERBUFFER_BINDING => gpu.renderbuffer_binding as GLint,
      _ => {
        gpu.fail(gl::INVALID_ENUM);
        0
      }
    }
  }

  fn get_float(&self, pname: GLenum) -> GLfloat {
    let mut gpu = self.gpu("glGetFloatv");

    match pname {
      gl::MAX_TEXTURE_LOD_BIAS => MAX_TEXTURE_LOD_BIAS,
      _ => {
        gpu.fail(gl::INVALID_ENUM);
        0.
      }
    }
  }

  fn get_string(&self, name: GLenum) -> String {
    let mut gpu = self.gpu("glGetString");

    let s = match name {
      gl::VENDOR => "kiln",
      gl::RENDERER => "kiln software rasterizer",
      gl::VERSION => "3.3.0 kiln-software",
      gl::SHADING_LANGUAGE_VERSION => "3.30",
      _ => {
        gpu.fail(gl::INVALID_ENUM);
        ""
      }
    };

    s.to_owned()
  }

  fn is_enabled(&self, cap: GLenum) -> bool {
    let gpu = self.gpu("glIsEnabled");

    // GL_DITHER and GL_MULTISAMPLE start enabled; everything else starts disabled
    let default = matches!(cap, gl::DITHER | gl::MULTISAMPLE);
    gpu.capabilities.get(&cap).copied().unwrap_or(default)
  }

  fn enable(&self, cap: GLenum) {
    self.gpu("glEnable").capabilities.insert(cap, true);
  }

  fn disable(&self, cap: GLenum) {
    self.gpu("glDisable").capabilities.insert(cap, false);
  }

  fn blend_equation(&self, mode: GLenum) {
    self.gpu("glBlendEquation").raster.blend_equation = mode;
  }

  fn blend_func(&self, src: GLenum, dst: GLenum) {
    self.gpu("glBlendFunc").raster.blend_func = (src, dst);
  }

  fn clear_color(&self, color: [GLfloat; 4]) {
    self.gpu("glClearColor").clear_color = color;
  }

  fn clear(&self, mask: GLbitfield) {
    let mut gpu = self.gpu("glClear");
    let known = gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT | gl::STENCIL_BUFFER_BIT;

    if mask & !known != 0 {
      gpu.fail(gl::INVALID_VALUE);
    }
  }

  fn front_face(&self, mode: GLenum) {
    self.gpu("glFrontFace").raster.front_face = mode;
  }

  fn cull_face(&self, mode: GLenum) {
    self.gpu("glCullFace").raster.cull_face = mode;
  }

  fn depth_func(&self, func: GLenum) {
    self.gpu("glDepthFunc").raster.depth_func = func;
  }

  fn stencil_func(&self, func: GLenum, reference: GLint, mask: GLuint) {
    self.gpu("glStencilFunc").raster.stencil_func = (func, reference, mask);
  }

  fn stencil_op(&self, sfail: GLenum, dpfail: GLenum, dppass: GLenum) {
    self.gpu("glStencilOp").raster.stencil_op = (sfail, dpfail, dppass);
  }

  fn stencil_mask(&self, mask: GLuint) {
    self.gpu("glStencilMask").raster.stencil_mask = mask;
  }

  fn viewport(&self, viewport: [GLint; 4]) {
    let mut gpu = self.gpu("glViewport");

    if viewport[2] < 0 || viewport[3] < 0 {
      gpu.fail(gl::INVALID_VALUE);
    } else {
      gpu.viewport = viewport;
    }
  }

  fn pixel_store(&self, pname: GLenum, param: GLint) {
    let mut gpu = self.gpu("glPixelStorei");

    if matches!(param, 1 | 2 | 4 | 8) {
      gpu.pixel_store.insert(pname, param);
    } else {
      gpu.fail(gl::INVALID_VALUE);
    }
  }

  fn gen_buffer(&self) -> GLuint {
    let mut gpu = self.gpu("glGenBuffers");
    let name = gpu.gen_name();
    gpu.buffers.insert(name, SoftBuffer::default());
    name
  }

  fn delete_buffer(&self, handle: GLuint) {
    let mut gpu = self.gpu("glDeleteBuffers");
    gpu.buffers.remove(&handle);
    gpu.buffer_bindings.retain(|_, bound| *bound != handle);
    gpu.indexed_bindings.retain(|_, bound| *bound != handle);
  }

  fn bind_buffer(&self, target: GLenum, handle: GLuint) {
    let mut gpu = self.gpu("glBindBuffer");

    if handle != 0 && !gpu.buffers.contains_key(&handle) {
      gpu.fail(gl::INVALID_OPERATION);
      return;
    }

    if target == gl::ELEMENT_ARRAY_BUFFER && gpu.vertex_array_binding != 0 {
      let vao = gpu.vertex_array_binding;
      if let Some(vao) = gpu.vertex_arrays.get_mut(&vao) {
        vao.element_buffer = handle;
      }
    } else {
      gpu.buffer_bindings.insert(target, handle);
    }
  }

  fn bind_buffer_base(&self, target: GLenum, index: GLuint, handle: GLuint) {
    let mut gpu = self.gpu("glBindBufferBase");

    if index >= MAX_UNIFORM_BUFFER_BINDINGS as GLuint
      || (handle != 0 && !gpu.buffers.contains_key(&handle))
    {
      gpu.fail(gl::INVALID_VALUE);
      return;
    }

    gpu.indexed_bindings.insert((target, index), handle);
    gpu.buffer_bindings.insert(target, handle);
  }

  fn buffer_data(&self, target: GLenum, size: usize, data: Option<&[u8]>, _: GLenum) {
    let mut gpu = self.gpu("glBufferData");

    if let Some(buffer) = gpu.bound_buffer_mut(target) {
      let mut storage = vec![0; size];

      if let Some(data) = data {
        let len = data.len().min(size);
        storage[..len].copy_from_slice(&data[..len]);
      }

      buffer.data = storage;
      buffer.mapped = false;
    }
  }

  fn buffer_sub_data(&self, target: GLenum, offset: usize, data: &[u8]) {
    let mut gpu = self.gpu("glBufferSubData");

    let error = match gpu.bound_buffer_mut(target) {
      Some(buffer) if buffer.mapped => gl::INVALID_OPERATION,
      Some(buffer) if offset + data.len() > buffer.data.len() => gl::INVALID_VALUE,
      Some(buffer) => {
        buffer.data[offset..offset + data.len()].copy_from_slice(data);
        gl::NO_ERROR
      }
      None => gl::NO_ERROR,
    };

    if error != gl::NO_ERROR {
      gpu.fail(error);
    }
  }

  fn get_buffer_sub_data(&self, target: GLenum, offset: usize, out: &mut [u8]) {
    let mut gpu = self.gpu("glGetBufferSubData");

    let error = match gpu.bound_buffer_mut(target) {
      Some(buffer) if buffer.mapped => gl::INVALID_OPERATION,
      Some(buffer) if offset + out.len() > buffer.data.len() => gl::INVALID_VALUE,
      Some(buffer) => {
        out.copy_from_slice(&buffer.data[offset..offset + out.len()]);
        gl::NO_ERROR
      }
      None => gl::NO_ERROR,
    };

    if error != gl::NO_ERROR {
      gpu.fail(error);
    }
  }

  unsafe fn map_buffer(&self, target: GLenum, _: GLenum) -> *mut c_void {
    let mut gpu = self.gpu("glMapBuffer");

    let ptr = match gpu.bound_buffer_mut(target) {
      Some(buffer) if !buffer.mapped && !buffer.data.is_empty() => {
        buffer.mapped = true;
        // the storage is only reallocated by glBufferData, which unmaps first
        buffer.data.as_mut_ptr() as *mut c_void
      }

      _ => ptr::null_mut(),
    };

    if ptr.is_null() {
      gpu.fail(gl::INVALID_OPERATION);
    }

    ptr
  }

  fn unmap_buffer(&self, target: GLenum) -> bool {
    let mut gpu = self.gpu("glUnmapBuffer");

    let was_mapped = match gpu.bound_buffer_mut(target) {
      Some(buffer) => std::mem::replace(&mut buffer.mapped, false),
      None => return false,
    };

    if !was_mapped {
      gpu.fail(gl::INVALID_OPERATION);
    }

    was_mapped
  }

  fn gen_texture(&self) -> GLuint {
    let mut gpu = self.gpu("glGenTextures");
    let name = gpu.gen_name();
    gpu.textures.insert(name, SoftTexture::default());
    name
  }

  fn delete_texture(&self, handle: GLuint) {
    let mut gpu = self.gpu("glDeleteTextures");
    gpu.textures.remove(&handle);
    gpu.texture_bindings.retain(|_, bound| *bound != handle);
  }

  fn active_texture(&self, unit: GLenum) {
    let mut gpu = self.gpu("glActiveTexture");
    let index = unit.wrapping_sub(gl::TEXTURE0);

    if index >= MAX_COMBINED_TEXTURE_IMAGE_UNITS as GLuint {
      gpu.fail(gl::INVALID_ENUM);
    } else {
      gpu.active_unit = index;
    }
  }

  fn bind_texture(&self, target: GLenum, handle: GLuint) {
    let mut gpu = self.gpu("glBindTexture");

    if handle != 0 {
      match gpu.textures.get_mut(&handle) {
        Some(tex) => match tex.target {
          None => tex.target = Some(target),
          Some(t) if t == target => (),
          Some(_) => {
            gpu.fail(gl::INVALID_OPERATION);
            return;
          }
        },

        None => {
          gpu.fail(gl::INVALID_OPERATION);
          return;
        }
      }
    }

    let unit = gpu.active_unit;
    gpu.texture_bindings.insert((unit, target), handle);
  }

  fn tex_parameter(&self, target: GLenum, pname: GLenum, param: GLint) {
    let mut gpu = self.gpu("glTexParameteri");

    if let Some(tex) = gpu.bound_texture_mut(target) {
      tex.params.insert(pname, param);
    }
  }

  fn tex_image_2d(
    &self,
    target: GLenum,
    level: GLint,
    internal_format: GLenum,
    size: [GLsizei; 2],
    format: GLenum,
    ty: GLenum,
    data: Option<&[u8]>,
  ) {
    let mut gpu = self.gpu("glTexImage2D");

    let Some(pixel_size) = pixel_size(format, ty) else {
      gpu.fail(gl::INVALID_ENUM);
      return;
    };

    let [w, h] = size;
    if level < 0 || w < 0 || h < 0 || w > MAX_TEXTURE_SIZE || h > MAX_TEXTURE_SIZE {
      gpu.fail(gl::INVALID_VALUE);
      return;
    }

    let size = [w as usize, h as usize];
    let len = size[0] * size[1] * pixel_size;

    let storage = match data {
      Some(data) if data.len() < len => {
        gpu.fail(gl::INVALID_VALUE);
        return;
      }
      Some(data) => data[..len].to_vec(),
      None => vec![0; len],
    };

    if let Some(tex) = gpu.bound_texture_mut(target) {
      tex.images.insert(
        (target, level),
        SoftImage {
          internal_format,
          size,
          pixel_size,
          data: storage,
        },
      );
    }
  }

  fn tex_sub_image_2d(
    &self,
    target: GLenum,
    level: GLint,
    offset: [GLint; 2],
    size: [GLsizei; 2],
    format: GLenum,
    ty: GLenum,
    data: &[u8],
  ) {
    let mut gpu = self.gpu("glTexSubImage2D");

    let Some(pixel_size) = pixel_size(format, ty) else {
      gpu.fail(gl::INVALID_ENUM);
      return;
    };

    let Some(tex) = gpu.bound_texture_mut(target) else {
      return;
    };

    let error = match tex.images.get_mut(&(target, level)) {
      None => gl::INVALID_OPERATION,

      Some(image) => {
        let [x, y] = offset;
        let [w, h] = size;
        let fits = x >= 0
          && y >= 0
          && w >= 0
          && h >= 0
          && (x + w) as usize <= image.size[0]
          && (y + h) as usize <= image.size[1];
        let (x, y, w, h) = (x as usize, y as usize, w as usize, h as usize);

        if !fits || pixel_size != image.pixel_size || data.len() < w * h * pixel_size {
          gl::INVALID_VALUE
        } else {
          let row = w * pixel_size;

          for r in 0..h {
            let dst = ((y + r) * image.size[0] + x) * pixel_size;
            image.data[dst..dst + row].copy_from_slice(&data[r * row..(r + 1) * row]);
          }

          gl::NO_ERROR
        }
      }
    };

    if error != gl::NO_ERROR {
      gpu.fail(error);
    }
  }

  fn get_tex_image(&self, target: GLenum, level: GLint, _: GLenum, _: GLenum, out: &mut [u8]) {
    let mut gpu = self.gpu("glGetTexImage");

    let image = gpu
      .bound_texture_mut(target)
      .and_then(|tex| tex.images.get(&(target, level)))
      .map(|image| image.data.clone());

    match image {
      Some(data) => {
        let len = data.len().min(out.len());
        out[..len].copy_from_slice(&data[..len]);
      }

      None => gpu.fail(gl::INVALID_OPERATION),
    }
  }

  fn generate_mipmap(&self, target: GLenum) {
    let mut gpu = self.gpu("glGenerateMipmap");

    let Some(tex) = gpu.bound_texture_mut(target) else {
      return;
    };

    let max_level = tex.params.get(&gl::TEXTURE_MAX_LEVEL).copied().unwrap_or(1000);
    let bases = tex
      .images
      .iter()
      .filter(|((_, level), _)| *level == 0)
      .map(|(&(face, _), image)| (face, image.clone()))
      .collect::<Vec<_>>();

    for (face, base) in bases {
      let mut level = 1;
      let mut size = base.size;

      while (size[0] > 1 || size[1] > 1) && level <= max_level {
        size = [(size[0] / 2).max(1), (size[1] / 2).max(1)];

        let mut data = Vec::with_capacity(size[0] * size[1] * base.pixel_size);
        for y in 0..size[1] {
          for x in 0..size[0] {
            let src_x = (x << level).min(base.size[0] - 1);
            let src_y = (y << level).min(base.size[1] - 1);
            let src = (src_y * base.size[0] + src_x) * base.pixel_size;
            data.extend_from_slice(&base.data[src..src + base.pixel_size]);
          }
        }

        tex.images.insert(
          (face, level),
          SoftImage {
            internal_format: base.internal_format,
            size,
            pixel_size: base.pixel_size,
            data,
          },
        );

        level += 1;
      }
    }
  }

  fn gen_renderbuffer(&self) -> GLuint {
    let mut gpu = self.gpu("glGenRenderbuffers");
    let name = gpu.gen_name();
    gpu.renderbuffers.insert(name, None);
    name
  }

  fn delete_renderbuffer(&self, handle: GLuint) {
    let mut gpu = self.gpu("glDeleteRenderbuffers");
    gpu.renderbuffers.remove(&handle);

    if gpu.renderbuffer_binding == handle {
      gpu.renderbuffer_binding = 0;
    }
  }

  fn bind_renderbuffer(&self, handle: GLuint) {
    let mut gpu = self.gpu("glBindRenderbuffer");

    if handle != 0 && !gpu.renderbuffers.contains_key(&handle) {
      gpu.fail(gl::INVALID_OPERATION);
    } else {
      gpu.renderbuffer_binding = handle;
    }
  }

  fn renderbuffer_storage(&self, internal_format: GLenum, size: [GLsizei; 2]) {
    let mut gpu = self.gpu("glRenderbufferStorage");
    let handle = gpu.renderbuffer_binding;

    if size.iter().any(|s| *s < 0 || *s > MAX_TEXTURE_SIZE) {
      gpu.fail(gl::INVALID_VALUE);
      return;
    }

    match gpu.renderbuffers.get_mut(&handle) {
      Some(storage) => {
        *storage = Some(RenderbufferStorage {
          internal_format,
          size,
        })
      }
      None => gpu.fail(gl::INVALID_OPERATION),
    }
  }

  fn gen_framebuffer(&self) -> GLuint {
    let mut gpu = self.gpu("glGenFramebuffers");
    let name = gpu.gen_name();
    gpu.framebuffers.insert(name, SoftFramebuffer::default());
    name
  }

  fn delete_framebuffer(&self, handle: GLuint) {
    let mut gpu = self.gpu("glDeleteFramebuffers");
    gpu.framebuffers.remove(&handle);

    if gpu.draw_framebuffer == handle {
      gpu.draw_framebuffer = 0;
    }

    if gpu.read_framebuffer == handle {
      gpu.read_framebuffer = 0;
    }
  }

  fn bind_framebuffer(&self, target: GLenum, handle: GLuint) {
    let mut gpu = self.gpu("glBindFramebuffer");

    if handle != 0 && !gpu.framebuffers.contains_key(&handle) {
      gpu.fail(gl::INVALID_OPERATION);
      return;
    }

    match target {
      gl::DRAW_FRAMEBUFFER => gpu.draw_framebuffer = handle,
      gl::READ_FRAMEBUFFER => gpu.read_framebuffer = handle,
      _ => {
        gpu.draw_framebuffer = handle;
        gpu.read_framebuffer = handle;
      }
    }
  }

  fn framebuffer_texture_2d(
    &self,
    target: GLenum,
    attachment: GLenum,
    tex_target: GLenum,
    texture: GLuint,
    level: GLint,
  ) {
    let mut gpu = self.gpu("glFramebufferTexture2D");
    let fb = gpu.framebuffer_for(target);

    if fb == 0 || (texture != 0 && !gpu.textures.contains_key(&texture)) {
      gpu.fail(gl::INVALID_OPERATION);
      return;
    }

    if let Some(fb) = gpu.framebuffers.get_mut(&fb) {
      if texture == 0 {
        fb.attachments.remove(&attachment);
      } else {
        fb.attachments.insert(
          attachment,
          Attached::Texture {
            handle: texture,
            target: tex_target,
            level,
          },
        );
      }
    }
  }

  fn framebuffer_renderbuffer(&self, target: GLenum, attachment: GLenum, renderbuffer: GLuint) {
    let mut gpu = self.gpu("glFramebufferRenderbuffer");
    let fb = gpu.framebuffer_for(target);

    if fb == 0 || (renderbuffer != 0 && !gpu.renderbuffers.contains_key(&renderbuffer)) {
      gpu.fail(gl::INVALID_OPERATION);
      return;
    }

    if let Some(fb) = gpu.framebuffers.get_mut(&fb) {
      if renderbuffer == 0 {
        fb.attachments.remove(&attachment);
      } else {
        fb.attachments
          .insert(attachment, Attached::Renderbuffer(renderbuffer));
      }
    }
  }

  fn check_framebuffer_status(&self, target: GLenum) -> GLenum {
    let gpu = self.gpu("glCheckFramebufferStatus");
    gpu.framebuffer_status(gpu.framebuffer_for(target))
  }

  fn draw_buffers(&self, buffers: &[GLenum]) {
    let mut gpu = self.gpu("glDrawBuffers");
    let fb = gpu.draw_framebuffer;

    if let Some(fb) = gpu.framebuffers.get_mut(&fb) {
      fb.draw_buffers = buffers.to_vec();
    }
  }

  fn create_shader(&self, ty: GLenum) -> GLuint {
    let mut gpu = self.gpu("glCreateShader");

    let known = matches!(
      ty,
      gl::VERTEX_SHADER
        | gl::FRAGMENT_SHADER
        | gl::GEOMETRY_SHADER
        | gl::COMPUTE_SHADER
        | gl::TESS_CONTROL_SHADER
        | gl::TESS_EVALUATION_SHADER
    );

    if !known {
      gpu.fail(gl::INVALID_ENUM);
      return 0;
    }

    let name = gpu.gen_name();
    gpu.shaders.insert(
      name,
      SoftShader {
        ty,
        source: String::new(),
        compiled: false,
        log: String::new(),
        delete_pending: false,
      },
    );

    name
  }

  fn delete_shader(&self, handle: GLuint) {
    let mut gpu = self.gpu("glDeleteShader");

    if gpu.is_attached_anywhere(handle) {
      if let Some(shader) = gpu.shaders.get_mut(&handle) {
        shader.delete_pending = true;
      }
    } else {
      gpu.shaders.remove(&handle);
    }
  }

  fn shader_source(&self, handle: GLuint, source: &str) {
    let mut gpu = self.gpu("glShaderSource");

    match gpu.shaders.get_mut(&handle) {
      Some(shader) => shader.source = source.to_owned(),
      None => gpu.fail(gl::INVALID_VALUE),
    }
  }

  fn compile_shader(&self, handle: GLuint) {
    let mut gpu = self.gpu("glCompileShader");

    match gpu.shaders.get_mut(&handle) {
      Some(shader) => match glsl::check(&shader.source) {
        Ok(()) => {
          shader.compiled = true;
          shader.log.clear();
        }

        Err(log) => {
          shader.compiled = false;
          shader.log = log;
        }
      },

      None => gpu.fail(gl::INVALID_VALUE),
    }
  }

  fn get_shader_iv(&self, handle: GLuint, pname: GLenum) -> GLint {
    let mut gpu = self.gpu("glGetShaderiv");

    let value = gpu.shaders.get(&handle).map(|shader| match pname {
      gl::COMPILE_STATUS => shader.compiled as GLint,
      gl::SHADER_TYPE => shader.ty as GLint,
      gl::DELETE_STATUS => shader.delete_pending as GLint,
      gl::SHADER_SOURCE_LENGTH if shader.source.is_empty() => 0,
      gl::SHADER_SOURCE_LENGTH => shader.source.len() as GLint + 1,
      gl::INFO_LOG_LENGTH if shader.log.is_empty() => 0,
      gl::INFO_LOG_LENGTH => shader.log.len() as GLint + 1,
      _ => 0,
    });

    value.unwrap_or_else(|| {
      gpu.fail(gl::INVALID_VALUE);
      0
    })
  }

  fn get_shader_info_log(&self, handle: GLuint) -> String {
    let gpu = self.gpu("glGetShaderInfoLog");
    gpu.shaders.get(&handle).map(|s| s.log.clone()).unwrap_or_default()
  }

  fn create_program(&self) -> GLuint {
    let mut gpu = self.gpu("glCreateProgram");
    let name = gpu.gen_name();
    gpu.programs.insert(name, SoftProgram::default());
    name
  }

  fn delete_program(&self, handle: GLuint) {
    let mut gpu = self.gpu("glDeleteProgram");

    if let Some(program) = gpu.programs.remove(&handle) {
      for shader in program.attached {
        let orphaned = !gpu.is_attached_anywhere(shader)
          && gpu.shaders.get(&shader).map_or(false, |s| s.delete_pending);

        if orphaned {
          gpu.shaders.remove(&shader);
        }
      }
    }

    if gpu.current_program == handle {
      gpu.current_program = 0;
    }
  }

  fn attach_shader(&self, program: GLuint, shader: GLuint) {
    let mut gpu = self.gpu("glAttachShader");

    if !gpu.shaders.contains_key(&shader) {
      gpu.fail(gl::INVALID_VALUE);
      return;
    }

    match gpu.programs.get_mut(&program) {
      Some(p) if p.attached.contains(&shader) => gpu.fail(gl::INVALID_OPERATION),
      Some(p) => p.attached.push(shader),
      None => gpu.fail(gl::INVALID_VALUE),
    }
  }

  fn detach_shader(&self, program: GLuint, shader: GLuint) {
    let mut gpu = self.gpu("glDetachShader");

    let detached = match gpu.programs.get_mut(&program) {
      Some(p) => {
        let before = p.attached.len();
        p.attached.retain(|s| *s != shader);
        before != p.attached.len()
      }
      None => false,
    };

    if !detached {
      gpu.fail(gl::INVALID_OPERATION);
      return;
    }

    let orphaned = !gpu.is_attached_anywhere(shader)
      && gpu.shaders.get(&shader).map_or(false, |s| s.delete_pending);

    if orphaned {
      gpu.shaders.remove(&shader);
    }
  }

  fn link_program(&self, program: GLuint) {
    self.gpu("glLinkProgram").link(program);
  }

  fn get_program_iv(&self, handle: GLuint, pname: GLenum) -> GLint {
    let mut gpu = self.gpu("glGetProgramiv");

    let value = gpu.programs.get(&handle).map(|program| match pname {
      gl::LINK_STATUS => program.linked as GLint,
      gl::ATTACHED_SHADERS => program.attached.len() as GLint,
      gl::ACTIVE_UNIFORMS => program.uniforms.len() as GLint,
      gl::ACTIVE_UNIFORM_BLOCKS => program.blocks.len() as GLint,
      gl::ACTIVE_UNIFORM_MAX_LENGTH => program
        .uniforms
        .iter()
        .map(|u| u.name.len() as GLint + 4)
        .max()
        .unwrap_or(0),
      gl::INFO_LOG_LENGTH if program.log.is_empty() => 0,
      gl::INFO_LOG_LENGTH => program.log.len() as GLint + 1,
      _ => 0,
    });

    value.unwrap_or_else(|| {
      gpu.fail(gl::INVALID_VALUE);
      0
    })
  }

  fn get_program_info_log(&self, handle: GLuint) -> String {
    let gpu = self.gpu("glGetProgramInfoLog");
    gpu.programs.get(&handle).map(|p| p.log.clone()).unwrap_or_default()
  }

  fn use_program(&self, handle: GLuint) {
    let mut gpu = self.gpu("glUseProgram");

    if handle != 0 && !gpu.programs.get(&handle).map_or(false, |p| p.linked) {
      gpu.fail(gl::INVALID_OPERATION);
    } else {
      gpu.current_program = handle;
    }
  }

  fn get_active_uniform(&self, program: GLuint, index: GLuint) -> ActiveUniform {
    let mut gpu = self.gpu("glGetActiveUniform");

    let uniform = gpu
      .programs
      .get(&program)
      .and_then(|p| p.uniforms.get(index as usize))
      .map(|u| ActiveUniform {
        name: if u.count > 1 {
          format!("{}[0]", u.name)
        } else {
          u.name.clone()
        },
        size: u.count as GLint,
        ty: u.ty,
      });

    uniform.unwrap_or_else(|| {
      gpu.fail(gl::INVALID_VALUE);
      ActiveUniform {
        name: String::new(),
        size: 0,
        ty: gl::NONE,
      }
    })
  }

  fn get_uniform_location(&self, program: GLuint, name: &str) -> GLint {
    let mut gpu = self.gpu("glGetUniformLocation");

    let Some(program) = gpu.programs.get(&program).filter(|p| p.linked) else {
      gpu.fail(gl::INVALID_OPERATION);
      return -1;
    };

    let (base, element) = match name.strip_suffix(']').and_then(|n| n.split_once('[')) {
      Some((base, index)) => match index.parse::<usize>() {
        Ok(index) => (base, index),
        Err(_) => return -1,
      },
      None => (name, 0),
    };

    program
      .uniforms
      .iter()
      .find(|u| u.name == base && element < u.count)
      .map_or(-1, |u| u.location + element as GLint)
  }

  fn get_active_uniform_block_name(&self, program: GLuint, index: GLuint) -> String {
    let mut gpu = self.gpu("glGetActiveUniformBlockName");

    let name = gpu
      .programs
      .get(&program)
      .and_then(|p| p.blocks.get(index as usize))
      .map(|b| b.name.clone());

    name.unwrap_or_else(|| {
      gpu.fail(gl::INVALID_VALUE);
      String::new()
    })
  }

  fn get_active_uniform_block_iv(&self, program: GLuint, index: GLuint, pname: GLenum) -> GLint {
    let mut gpu = self.gpu("glGetActiveUniformBlockiv");

    let value = gpu
      .programs
      .get(&program)
      .and_then(|p| p.blocks.get(index as usize))
      .map(|block| match pname {
        gl::UNIFORM_BLOCK_DATA_SIZE => block.size as GLint,
        gl::UNIFORM_BLOCK_BINDING => block.binding as GLint,
        gl::UNIFORM_BLOCK_NAME_LENGTH => block.name.len() as GLint + 1,
        gl::UNIFORM_BLOCK_ACTIVE_UNIFORMS => block.members as GLint,
        gl::UNIFORM_BLOCK_REFERENCED_BY_VERTEX_SHADER => {
          block.stages.contains(&gl::VERTEX_SHADER) as GLint
        }
        gl::UNIFORM_BLOCK_REFERENCED_BY_GEOMETRY_SHADER => {
          block.stages.contains(&gl::GEOMETRY_SHADER) as GLint
        }
        gl::UNIFORM_BLOCK_REFERENCED_BY_FRAGMENT_SHADER => {
          block.stages.contains(&gl::FRAGMENT_SHADER) as GLint
        }
        _ => 0,
      });

    value.unwrap_or_else(|| {
      gpu.fail(gl::INVALID_VALUE);
      0
    })
  }

  fn get_uniform_block_index(&self, program: GLuint, name: &str) -> GLuint {
    let gpu = self.gpu("glGetUniformBlockIndex");

    gpu
      .programs
      .get(&program)
      .and_then(|p| p.blocks.iter().position(|b| b.name == name))
      .map_or(gl::INVALID_INDEX, |index| index as GLuint)
  }

  fn uniform_block_binding(&self, program: GLuint, index: GLuint, binding: GLuint) {
    let mut gpu = self.gpu("glUniformBlockBinding");

    match gpu
      .programs
      .get_mut(&program)
      .and_then(|p| p.blocks.get_mut(index as usize))
    {
      Some(block) => block.binding = binding,
      None => gpu.fail(gl::INVALID_VALUE),
    }
  }

  fn uniform_1i(&self, location: GLint, value: GLint) {
    self
      .gpu("glUniform1i")
      .record_uniform(location, RecordedUniform::Int(vec![value]));
  }

  fn uniform_1ui(&self, location: GLint, value: GLuint) {
    self
      .gpu("glUniform1ui")
      .record_uniform(location, RecordedUniform::UInt(vec![value]));
  }

  fn uniform_1f(&self, location: GLint, value: GLfloat) {
    self
      .gpu("glUniform1f")
      .record_uniform(location, RecordedUniform::Float(vec![value]));
  }

  fn uniform_fv(&self, location: GLint, _: usize, values: &[GLfloat]) {
    self
      .gpu("glUniformfv")
      .record_uniform(location, RecordedUniform::Float(values.to_vec()));
  }

  fn uniform_iv(&self, location: GLint, _: usize, values: &[GLint]) {
    self
      .gpu("glUniformiv")
      .record_uniform(location, RecordedUniform::Int(values.to_vec()));
  }

  fn uniform_matrix_fv(&self, location: GLint, _: usize, values: &[GLfloat]) {
    self
      .gpu("glUniformMatrixfv")
      .record_uniform(location, RecordedUniform::Float(values.to_vec()));
  }

  fn gen_vertex_array(&self) -> GLuint {
    let mut gpu = self.gpu("glGenVertexArrays");
    let name = gpu.gen_name();
    gpu.vertex_arrays.insert(name, SoftVertexArray::default());
    name
  }

  fn delete_vertex_array(&self, handle: GLuint) {
    let mut gpu = self.gpu("glDeleteVertexArrays");
    gpu.vertex_arrays.remove(&handle);

    if gpu.vertex_array_binding == handle {
      gpu.vertex_array_binding = 0;
    }
  }

  fn bind_vertex_array(&self, handle: GLuint) {
    let mut gpu = self.gpu("glBindVertexArray");

    if handle != 0 && !gpu.vertex_arrays.contains_key(&handle) {
      gpu.fail(gl::INVALID_OPERATION);
    } else {
      gpu.vertex_array_binding = handle;
    }
  }

  fn enable_vertex_attrib_array(&self, index: GLuint) {
    let mut gpu = self.gpu("glEnableVertexAttribArray");
    let vao = gpu.vertex_array_binding;

    match gpu.vertex_arrays.get_mut(&vao) {
      Some(vao) => {
        vao
          .attributes
          .entry(index)
          .or_insert(VertexAttribute {
            components: 4,
            ty: gl::FLOAT,
            normalized: false,
            integer: false,
            stride: 0,
            offset: 0,
            buffer: 0,
            enabled: false,
          })
          .enabled = true;
      }

      None => gpu.fail(gl::INVALID_OPERATION),
    }
  }

  fn vertex_attrib_pointer(
    &self,
    index: GLuint,
    components: GLint,
    ty: GLenum,
    normalized: bool,
    stride: GLsizei,
    offset: usize,
  ) {
    let mut gpu = self.gpu("glVertexAttribPointer");
    set_attribute(&mut gpu, index, components, ty, normalized, false, stride, offset);
  }

  fn vertex_attrib_i_pointer(
    &self,
    index: GLuint,
    components: GLint,
    ty: GLenum,
    stride: GLsizei,
    offset: usize,
  ) {
    let mut gpu = self.gpu("glVertexAttribIPointer");
    set_attribute(&mut gpu, index, components, ty, false, true, stride, offset);
  }

  fn draw_arrays(&self, _: GLenum, first: GLint, count: GLsizei) {
    let mut gpu = self.gpu("glDrawArrays");

    if first < 0 || count < 0 {
      gpu.fail(gl::INVALID_VALUE);
    } else if gpu.vertex_array_binding == 0 || gpu.current_program == 0 {
      gpu.fail(gl::INVALID_OPERATION);
    }
  }

  fn draw_elements(&self, _: GLenum, count: GLsizei, _: GLenum, _: usize) {
    let mut gpu = self.gpu("glDrawElements");

    if count < 0 {
      gpu.fail(gl::INVALID_VALUE);
    } else if gpu.vertex_array_binding == 0
      || gpu.current_program == 0
      || gpu.bound_buffer(gl::ELEMENT_ARRAY_BUFFER) == 0
    {
      gpu.fail(gl::INVALID_OPERATION);
    }
  }
}

#[allow(clippy::too_many_arguments)]
fn set_attribute(
  gpu: &mut Gpu,
  index: GLuint,
  components: GLint,
  ty: GLenum,
  normalized: bool,
  integer: bool,
  stride: GLsizei,
  offset: usize,
) {
  let vao = gpu.vertex_array_binding;
  let buffer = gpu.bound_buffer(gl::ARRAY_BUFFER);

  if !(1..=4).contains(&components) || stride < 0 {
    gpu.fail(gl::INVALID_VALUE);
    return;
  }

  if buffer == 0 {
    gpu.fail(gl::INVALID_OPERATION);
    return;
  }

  match gpu.vertex_arrays.get_mut(&vao) {
    Some(vao) => {
      let enabled = vao.attributes.get(&index).map_or(false, |a| a.enabled);

      vao.attributes.insert(
        index,
        VertexAttribute {
          components,
          ty,
          normalized,
          integer,
          stride,
          offset,
          buffer,
          enabled,
        },
      );
    }

    None => gpu.fail(gl::INVALID_OPERATION),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const VS: &str = "#version 330 core\n\
    uniform mat4 u_Transform;\n\
    layout(std140) uniform Camera { mat4 view_projection; vec3 position; };\n\
    void main() { gl_Position = u_Transform * vec4(0.); }";

  const FS: &str = "#version 330 core\n\
    uniform vec4 u_Colors[3];\n\
    uniform sampler2D u_Albedo;\n\
    layout(std140) uniform Camera { mat4 view_projection; vec3 position; };\n\
    out vec4 frag;\n\
    void main() { frag = u_Colors[0]; }";

  fn compiled(driver: &SoftwareDriver, ty: GLenum, source: &str) -> GLuint {
    let shader = driver.create_shader(ty);
    driver.shader_source(shader, source);
    driver.compile_shader(shader);
    shader
  }

  fn linked(driver: &SoftwareDriver) -> GLuint {
    let program = driver.create_program();
    let vs = compiled(driver, gl::VERTEX_SHADER, VS);
    let fs = compiled(driver, gl::FRAGMENT_SHADER, FS);
    driver.attach_shader(program, vs);
    driver.attach_shader(program, fs);
    driver.link_program(program);
    program
  }

  #[test]
  fn calls_are_counted_per_entry_point() {
    let driver = SoftwareDriver::new();
    let clone = driver.clone();

    driver.gen_buffer();
    clone.gen_buffer();
    driver.enable(gl::BLEND);

    assert_eq!(driver.calls("glGenBuffers"), 2);
    assert_eq!(clone.calls("glEnable"), 1);
    assert_eq!(driver.total_calls(), 3);

    driver.reset_calls();
    assert_eq!(clone.total_calls(), 0);
  }

  #[test]
  fn errors_are_sticky_until_queried() {
    let driver = SoftwareDriver::new();

    driver.bind_buffer(gl::ARRAY_BUFFER, 42);
    driver.clear(0xdead_beef);

    assert_eq!(driver.get_error(), gl::INVALID_OPERATION);
    assert_eq!(driver.get_error(), gl::NO_ERROR);
  }

  #[test]
  fn buffer_storage_and_mapping() {
    let driver = SoftwareDriver::new();
    let buffer = driver.gen_buffer();

    driver.bind_buffer(gl::ARRAY_BUFFER, buffer);
    driver.buffer_data(gl::ARRAY_BUFFER, 4, Some(&[1, 2, 3, 4]), gl::STATIC_DRAW);
    driver.buffer_sub_data(gl::ARRAY_BUFFER, 2, &[9, 9]);
    assert_eq!(driver.buffer_bytes(buffer), Some(vec![1, 2, 9, 9]));

    let ptr = unsafe { driver.map_buffer(gl::ARRAY_BUFFER, gl::READ_WRITE) } as *mut u8;
    assert!(!ptr.is_null());
    assert!(driver.is_buffer_mapped(buffer));

    // mapped buffers cannot be updated through the regular path
    driver.buffer_sub_data(gl::ARRAY_BUFFER, 0, &[0]);
    assert_eq!(driver.get_error(), gl::INVALID_OPERATION);

    unsafe { *ptr = 7 };
    assert!(driver.unmap_buffer(gl::ARRAY_BUFFER));
    assert_eq!(driver.buffer_bytes(buffer), Some(vec![7, 2, 9, 9]));

    driver.buffer_sub_data(gl::ARRAY_BUFFER, 3, &[0, 0]);
    assert_eq!(driver.get_error(), gl::INVALID_VALUE);
  }

  #[test]
  fn texture_sub_image_out_of_bounds() {
    let driver = SoftwareDriver::new();
    let tex = driver.gen_texture();

    driver.bind_texture(gl::TEXTURE_2D, tex);
    driver.tex_image_2d(
      gl::TEXTURE_2D,
      0,
      gl::RGBA8,
      [4, 4],
      gl::RGBA,
      gl::UNSIGNED_BYTE,
      None,
    );

    let texels = [255; 2 * 2 * 4];
    driver.tex_sub_image_2d(
      gl::TEXTURE_2D,
      0,
      [2, 2],
      [2, 2],
      gl::RGBA,
      gl::UNSIGNED_BYTE,
      &texels,
    );
    assert_eq!(driver.get_error(), gl::NO_ERROR);

    driver.tex_sub_image_2d(
      gl::TEXTURE_2D,
      0,
      [3, 2],
      [2, 2],
      gl::RGBA,
      gl::UNSIGNED_BYTE,
      &texels,
    );
    assert_eq!(driver.get_error(), gl::INVALID_VALUE);

    let mut out = vec![0; 4 * 4 * 4];
    driver.get_tex_image(gl::TEXTURE_2D, 0, gl::RGBA, gl::UNSIGNED_BYTE, &mut out);
    assert_eq!(&out[(2 * 4 + 2) * 4..(2 * 4 + 3) * 4], &[255; 4]);
    assert_eq!(&out[..4], &[0; 4]);
  }

  #[test]
  fn mipmaps_follow_max_level() {
    let driver = SoftwareDriver::new();
    let tex = driver.gen_texture();

    driver.bind_texture(gl::TEXTURE_2D, tex);
    driver.tex_parameter(gl::TEXTURE_2D, gl::TEXTURE_MAX_LEVEL, 2);
    driver.tex_image_2d(
      gl::TEXTURE_2D,
      0,
      gl::R8,
      [8, 4],
      gl::RED,
      gl::UNSIGNED_BYTE,
      None,
    );
    driver.generate_mipmap(gl::TEXTURE_2D);

    assert_eq!(driver.texture_levels(tex, gl::TEXTURE_2D), 3);
    assert_eq!(driver.texture_level_size(tex, gl::TEXTURE_2D, 2), Some([2, 1]));
  }

  #[test]
  fn framebuffer_completeness() {
    let driver = SoftwareDriver::new();
    let fb = driver.gen_framebuffer();
    driver.bind_framebuffer(gl::FRAMEBUFFER, fb);

    assert_eq!(
      driver.check_framebuffer_status(gl::FRAMEBUFFER),
      gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT
    );

    let depth = driver.gen_renderbuffer();
    driver.bind_renderbuffer(depth);
    driver.renderbuffer_storage(gl::DEPTH_COMPONENT24, [16, 16]);
    driver.framebuffer_renderbuffer(gl::FRAMEBUFFER, gl::DEPTH_ATTACHMENT, depth);

    // the default draw buffer is not attached yet
    assert_eq!(
      driver.check_framebuffer_status(gl::FRAMEBUFFER),
      gl::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER
    );

    let color = driver.gen_texture();
    driver.bind_texture(gl::TEXTURE_2D, color);
    driver.framebuffer_texture_2d(
      gl::FRAMEBUFFER,
      gl::COLOR_ATTACHMENT0,
      gl::TEXTURE_2D,
      color,
      0,
    );

    // no storage behind the texture
    assert_eq!(
      driver.check_framebuffer_status(gl::FRAMEBUFFER),
      gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT
    );

    driver.tex_image_2d(
      gl::TEXTURE_2D,
      0,
      gl::RGBA8,
      [16, 16],
      gl::RGBA,
      gl::UNSIGNED_BYTE,
      None,
    );
    assert_eq!(
      driver.check_framebuffer_status(gl::FRAMEBUFFER),
      gl::FRAMEBUFFER_COMPLETE
    );

    driver.bind_framebuffer(gl::FRAMEBUFFER, 0);
    assert_eq!(
      driver.check_framebuffer_status(gl::FRAMEBUFFER),
      gl::FRAMEBUFFER_COMPLETE
    );
  }

  #[test]
  fn link_reflects_uniforms_and_blocks() {
    let driver = SoftwareDriver::new();
    let program = linked(&driver);

    assert_eq!(driver.get_program_iv(program, gl::LINK_STATUS), 1);
    assert_eq!(driver.get_program_iv(program, gl::ACTIVE_UNIFORMS), 3);
    assert_eq!(driver.get_program_iv(program, gl::ACTIVE_UNIFORM_BLOCKS), 1);

    let colors = driver.get_active_uniform(program, 1);
    assert_eq!(colors.name, "u_Colors[0]");
    assert_eq!(colors.size, 3);
    assert_eq!(colors.ty, gl::FLOAT_VEC4);

    assert_eq!(driver.get_uniform_location(program, "u_Transform"), 0);
    assert_eq!(driver.get_uniform_location(program, "u_Colors"), 1);
    assert_eq!(driver.get_uniform_location(program, "u_Colors[2]"), 3);
    assert_eq!(driver.get_uniform_location(program, "u_Colors[3]"), -1);
    assert_eq!(driver.get_uniform_location(program, "u_Albedo"), 4);
    assert_eq!(driver.get_uniform_location(program, "u_Nope"), -1);

    let camera = driver.get_uniform_block_index(program, "Camera");
    assert_eq!(camera, 0);
    assert_eq!(
      driver.get_active_uniform_block_iv(program, camera, gl::UNIFORM_BLOCK_DATA_SIZE),
      80
    );
    assert_eq!(
      driver.get_active_uniform_block_iv(
        program,
        camera,
        gl::UNIFORM_BLOCK_REFERENCED_BY_FRAGMENT_SHADER
      ),
      1
    );
    assert_eq!(
      driver.get_uniform_block_index(program, "Nope"),
      gl::INVALID_INDEX
    );
  }

  #[test]
  fn link_fails_without_fragment_stage() {
    let driver = SoftwareDriver::new();
    let program = driver.create_program();
    let vs = compiled(&driver, gl::VERTEX_SHADER, VS);

    driver.attach_shader(program, vs);
    driver.link_program(program);

    assert_eq!(driver.get_program_iv(program, gl::LINK_STATUS), 0);
    assert!(!driver.get_program_info_log(program).is_empty());
  }

  #[test]
  fn deleted_shader_lives_while_attached() {
    let driver = SoftwareDriver::new();
    let program = driver.create_program();
    let vs = compiled(&driver, gl::VERTEX_SHADER, VS);

    driver.attach_shader(program, vs);
    driver.delete_shader(vs);
    assert!(driver.is_shader(vs));

    driver.detach_shader(program, vs);
    assert!(!driver.is_shader(vs));
  }

  #[test]
  fn uniforms_are_recorded_on_current_program() {
    let driver = SoftwareDriver::new();
    let program = linked(&driver);

    driver.uniform_1i(4, 3);
    assert_eq!(driver.get_error(), gl::INVALID_OPERATION);

    driver.use_program(program);
    driver.uniform_1i(4, 3);
    driver.uniform_1i(-1, 3);
    assert_eq!(driver.get_error(), gl::NO_ERROR);
    assert_eq!(
      driver.uniform_value(program, 4),
      Some(RecordedUniform::Int(vec![3]))
    );
  }
}
