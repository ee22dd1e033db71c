//! Context-bound dispatch table.
//!
//! [`GlFunctions`] is the only way GPU object wrappers reach the driver. Every method first checks
//! that the owning context is current on the calling thread and fails with
//! [`ContextError::NotCurrent`] otherwise, without touching the driver. State-setting methods write
//! through the context’s [`GraphicsStateCache`] and skip the driver call when the cache already
//! holds the requested value.
//!
//! Cloning a [`GlFunctions`] is cheap; clones share the context and its cache.

use crate::blending::BlendMode;
use crate::capability::Capability;
use crate::context::{Context, ContextError};
use crate::depth_stencil::{Comparison, StencilTest};
use crate::driver::{ActiveUniform, Driver};
use crate::face_culling::{FrontFace, PolygonFacing};
use crate::state::GraphicsStateCache;
use gl::types::*;
use std::os::raw::c_void;
use std::sync::MutexGuard;

/// Should the binding be cached or forced to the provided value?
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Bind {
  Forced,
  Cached,
}

/// Dispatch table of a context.
#[derive(Clone, Debug)]
pub struct GlFunctions {
  ctx: Context,
}

impl GlFunctions {
  pub(crate) fn new(ctx: Context) -> Self {
    GlFunctions { ctx }
  }

  /// Context this table is bound to.
  pub fn context(&self) -> &Context {
    &self.ctx
  }

  /// Whether the owning context is current on the calling thread.
  pub fn is_current(&self) -> bool {
    self.ctx.is_current()
  }

  /// Cached driver state.
  ///
  /// The cache is locked while the guard lives: drop it before calling any other method.
  pub fn state(&self) -> MutexGuard<GraphicsStateCache> {
    self.ctx.state()
  }

  /// Make the cache forget what it knows about the driver state.
  ///
  /// Needed after driver calls issued behind the table’s back.
  pub fn invalidate_cache(&self) -> Result<(), ContextError> {
    self.check("invalidate_cache")?;
    self.ctx.state().invalidate();
    Ok(())
  }

  fn check(&self, call: &'static str) -> Result<&dyn Driver, ContextError> {
    if self.ctx.is_current() {
      Ok(self.ctx.driver())
    } else {
      let err = ContextError::not_current(call);
      log::error!("{}", err);
      Err(err)
    }
  }

  // queries

  pub fn get_error(&self) -> Result<GLenum, ContextError> {
    Ok(self.check("glGetError")?.get_error())
  }

  pub fn get_integer(&self, pname: GLenum) -> Result<GLint, ContextError> {
    Ok(self.check("glGetIntegerv")?.get_integer(pname))
  }

  pub fn get_float(&self, pname: GLenum) -> Result<GLfloat, ContextError> {
    Ok(self.check("glGetFloatv")?.get_float(pname))
  }

  pub fn get_string(&self, name: GLenum) -> Result<String, ContextError> {
    Ok(self.check("glGetString")?.get_string(name))
  }

  /// Whether a capability is enabled.
  ///
  /// The driver is asked the first time only; later answers come from the cache.
  pub fn is_enabled(&self, cap: Capability) -> Result<bool, ContextError> {
    let driver = self.check("glIsEnabled")?;
    let mut state = self.ctx.state();

    let enabled = *state
      .capabilities
      .entry(cap)
      .or_insert_with(|| driver.is_enabled(cap.to_glenum()));

    Ok(enabled)
  }

  // fixed-function state

  pub fn enable(&self, cap: Capability) -> Result<(), ContextError> {
    self.set_capability(cap, true)
  }

  pub fn disable(&self, cap: Capability) -> Result<(), ContextError> {
    self.set_capability(cap, false)
  }

  pub fn set_capability(&self, cap: Capability, enabled: bool) -> Result<(), ContextError> {
    let driver = self.check(if enabled { "glEnable" } else { "glDisable" })?;

    if self.ctx.state().capabilities.insert(cap, enabled) != Some(enabled) {
      if enabled {
        driver.enable(cap.to_glenum());
      } else {
        driver.disable(cap.to_glenum());
      }
    }

    Ok(())
  }

  pub fn set_blend_mode(&self, mode: BlendMode) -> Result<(), ContextError> {
    let driver = self.check("glBlendFunc")?;

    if self.ctx.state().blend_mode.update(mode) {
      driver.blend_equation(mode.equation.to_glenum());
      driver.blend_func(mode.src.to_glenum(), mode.dst.to_glenum());
    }

    Ok(())
  }

  pub fn blend_mode(&self) -> Result<BlendMode, ContextError> {
    self.check("blend_mode")?;
    Ok(self.ctx.state().blend_mode())
  }

  pub fn set_clear_color(&self, color: [GLfloat; 4]) -> Result<(), ContextError> {
    let driver = self.check("glClearColor")?;

    if self.ctx.state().clear_color.update(color) {
      driver.clear_color(color);
    }

    Ok(())
  }

  pub fn clear_color(&self) -> Result<[GLfloat; 4], ContextError> {
    self.check("clear_color")?;
    Ok(self.ctx.state().clear_color())
  }

  pub fn clear(&self, mask: GLbitfield) -> Result<(), ContextError> {
    self.check("glClear")?.clear(mask);
    Ok(())
  }

  pub fn set_front_face(&self, face: FrontFace) -> Result<(), ContextError> {
    let driver = self.check("glFrontFace")?;

    if self.ctx.state().front_face.update(face) {
      driver.front_face(face.to_glenum());
    }

    Ok(())
  }

  pub fn front_face(&self) -> Result<FrontFace, ContextError> {
    self.check("front_face")?;
    Ok(self.ctx.state().front_face())
  }

  pub fn set_polygon_facing(&self, facing: PolygonFacing) -> Result<(), ContextError> {
    let driver = self.check("glCullFace")?;

    if self.ctx.state().polygon_facing.update(facing) {
      driver.cull_face(facing.to_glenum());
    }

    Ok(())
  }

  pub fn polygon_facing(&self) -> Result<PolygonFacing, ContextError> {
    self.check("polygon_facing")?;
    Ok(self.ctx.state().polygon_facing())
  }

  pub fn set_stencil_test(&self, test: StencilTest) -> Result<(), ContextError> {
    let driver = self.check("glStencilFunc")?;

    if self.ctx.state().stencil_test.update(test) {
      driver.stencil_func(
        test.comparison.to_glenum(),
        test.reference.into(),
        test.mask.into(),
      );
      driver.stencil_op(
        test.stencil_fails.to_glenum(),
        test.depth_fails.to_glenum(),
        test.depth_passes.to_glenum(),
      );
      driver.stencil_mask(test.write_mask.into());
    }

    Ok(())
  }

  pub fn stencil_test(&self) -> Result<StencilTest, ContextError> {
    self.check("stencil_test")?;
    Ok(self.ctx.state().stencil_test())
  }

  pub fn set_depth_comparison(&self, comparison: Comparison) -> Result<(), ContextError> {
    let driver = self.check("glDepthFunc")?;

    if self.ctx.state().depth_comparison.update(comparison) {
      driver.depth_func(comparison.to_glenum());
    }

    Ok(())
  }

  pub fn set_viewport(&self, viewport: [GLint; 4]) -> Result<(), ContextError> {
    let driver = self.check("glViewport")?;

    if self.ctx.state().viewport.update(viewport) {
      driver.viewport(viewport);
    }

    Ok(())
  }

  pub fn viewport(&self) -> Result<[GLint; 4], ContextError> {
    self.check("viewport")?;
    Ok(self.ctx.state().viewport())
  }

  pub fn set_unpack_alignment(&self, alignment: GLint) -> Result<(), ContextError> {
    let driver = self.check("glPixelStorei")?;

    if self.ctx.state().unpack_alignment.update(alignment) {
      driver.pixel_store(gl::UNPACK_ALIGNMENT, alignment);
    }

    Ok(())
  }

  pub fn set_pack_alignment(&self, alignment: GLint) -> Result<(), ContextError> {
    let driver = self.check("glPixelStorei")?;

    if self.ctx.state().pack_alignment.update(alignment) {
      driver.pixel_store(gl::PACK_ALIGNMENT, alignment);
    }

    Ok(())
  }

  // buffers

  pub fn gen_buffer(&self) -> Result<GLuint, ContextError> {
    Ok(self.check("glGenBuffers")?.gen_buffer())
  }

  pub fn delete_buffer(&self, handle: GLuint) -> Result<(), ContextError> {
    let driver = self.check("glDeleteBuffers")?;
    self.ctx.state().forget_buffer(handle);
    driver.delete_buffer(handle);
    Ok(())
  }

  pub fn bind_buffer(
    &self,
    target: GLenum,
    handle: GLuint,
    bind: Bind,
  ) -> Result<(), ContextError> {
    let driver = self.check("glBindBuffer")?;

    let changed = self.ctx.state().bound_buffers.insert(target, handle) != Some(handle);
    if changed || bind == Bind::Forced {
      driver.bind_buffer(target, handle);
    }

    Ok(())
  }

  /// Bind a buffer to an indexed binding point of `target` (e.g. a uniform buffer binding).
  pub fn bind_buffer_base(
    &self,
    target: GLenum,
    index: u32,
    handle: GLuint,
  ) -> Result<(), ContextError> {
    let driver = self.check("glBindBufferBase")?;
    let mut state = self.ctx.state();

    if state.bound_indexed_buffers.insert((target, index), handle) != Some(handle) {
      // binding to an indexed point also binds the generic one
      state.bound_buffers.insert(target, handle);
      driver.bind_buffer_base(target, index, handle);
    }

    Ok(())
  }

  pub fn buffer_data(
    &self,
    target: GLenum,
    size: usize,
    data: Option<&[u8]>,
    usage: GLenum,
  ) -> Result<(), ContextError> {
    self
      .check("glBufferData")?
      .buffer_data(target, size, data, usage);
    Ok(())
  }

  pub fn buffer_sub_data(
    &self,
    target: GLenum,
    offset: usize,
    data: &[u8],
  ) -> Result<(), ContextError> {
    self
      .check("glBufferSubData")?
      .buffer_sub_data(target, offset, data);
    Ok(())
  }

  pub fn get_buffer_sub_data(
    &self,
    target: GLenum,
    offset: usize,
    out: &mut [u8],
  ) -> Result<(), ContextError> {
    self
      .check("glGetBufferSubData")?
      .get_buffer_sub_data(target, offset, out);
    Ok(())
  }

  /// Map the buffer bound to `target`.
  ///
  /// # Safety
  ///
  /// The returned pointer is only valid until the buffer is unmapped, respecified or deleted.
  pub unsafe fn map_buffer(
    &self,
    target: GLenum,
    access: GLenum,
  ) -> Result<*mut c_void, ContextError> {
    Ok(self.check("glMapBuffer")?.map_buffer(target, access))
  }

  pub fn unmap_buffer(&self, target: GLenum) -> Result<bool, ContextError> {
    Ok(self.check("glUnmapBuffer")?.unmap_buffer(target))
  }

  // textures

  pub fn gen_texture(&self) -> Result<GLuint, ContextError> {
    Ok(self.check("glGenTextures")?.gen_texture())
  }

  pub fn delete_texture(&self, handle: GLuint) -> Result<(), ContextError> {
    let driver = self.check("glDeleteTextures")?;
    self.ctx.state().forget_texture(handle);
    driver.delete_texture(handle);
    Ok(())
  }

  /// Select the texture unit subsequent texture binds apply to.
  pub fn active_texture(&self, unit: u32) -> Result<(), ContextError> {
    let driver = self.check("glActiveTexture")?;

    if self.ctx.state().active_texture_unit.update(unit) {
      driver.active_texture(gl::TEXTURE0 + unit);
    }

    Ok(())
  }

  /// Bind a texture on the active texture unit.
  pub fn bind_texture(
    &self,
    target: GLenum,
    handle: GLuint,
    bind: Bind,
  ) -> Result<(), ContextError> {
    let driver = self.check("glBindTexture")?;
    let mut state = self.ctx.state();
    let unit = state.active_texture_unit.get();

    let changed = state.bound_textures.insert(unit, (target, handle)) != Some((target, handle));
    if changed || bind == Bind::Forced {
      driver.bind_texture(target, handle);
    }

    Ok(())
  }

  /// Bind a texture on a given texture unit.
  pub fn bind_texture_at(
    &self,
    unit: u32,
    target: GLenum,
    handle: GLuint,
  ) -> Result<(), ContextError> {
    self.active_texture(unit)?;
    self.bind_texture(target, handle, Bind::Cached)
  }

  pub fn tex_parameter(
    &self,
    target: GLenum,
    pname: GLenum,
    param: GLint,
  ) -> Result<(), ContextError> {
    self
      .check("glTexParameteri")?
      .tex_parameter(target, pname, param);
    Ok(())
  }

  #[allow(clippy::too_many_arguments)]
  pub fn tex_image_2d(
    &self,
    target: GLenum,
    level: GLint,
    internal_format: GLenum,
    size: [GLsizei; 2],
    format: GLenum,
    ty: GLenum,
    data: Option<&[u8]>,
  ) -> Result<(), ContextError> {
    self.check("glTexImage2D")?.tex_image_2d(
      target,
      level,
      internal_format,
      size,
      format,
      ty,
      data,
    );
    Ok(())
  }

  #[allow(clippy::too_many_arguments)]
  pub fn tex_sub_image_2d(
    &self,
    target: GLenum,
    level: GLint,
    offset: [GLint; 2],
    size: [GLsizei; 2],
    format: GLenum,
    ty: GLenum,
    data: &[u8],
  ) -> Result<(), ContextError> {
    self
      .check("glTexSubImage2D")?
      .tex_sub_image_2d(target, level, offset, size, format, ty, data);
    Ok(())
  }

  pub fn get_tex_image(
    &self,
    target: GLenum,
    level: GLint,
    format: GLenum,
    ty: GLenum,
    out: &mut [u8],
  ) -> Result<(), ContextError> {
    self
      .check("glGetTexImage")?
      .get_tex_image(target, level, format, ty, out);
    Ok(())
  }

  pub fn generate_mipmap(&self, target: GLenum) -> Result<(), ContextError> {
    self.check("glGenerateMipmap")?.generate_mipmap(target);
    Ok(())
  }

  // binding points; bookkeeping only, no driver call

  /// Reserve a free texture unit; `None` if all of them are in use.
  pub fn reserve_texture_unit(&self) -> Result<Option<u32>, ContextError> {
    self.check("reserve_texture_unit")?;
    Ok(self.ctx.state().binding_stack.reserve_texture_unit())
  }

  pub fn release_texture_unit(&self, unit: u32) -> Result<(), ContextError> {
    self.check("release_texture_unit")?;
    self.ctx.state().binding_stack.release_texture_unit(unit);
    Ok(())
  }

  /// Reserve a free uniform buffer binding point; `None` if all of them are in use.
  pub fn reserve_buffer_binding(&self) -> Result<Option<u32>, ContextError> {
    self.check("reserve_buffer_binding")?;
    Ok(self.ctx.state().binding_stack.reserve_buffer_binding())
  }

  pub fn release_buffer_binding(&self, binding: u32) -> Result<(), ContextError> {
    self.check("release_buffer_binding")?;
    self.ctx.state().binding_stack.release_buffer_binding(binding);
    Ok(())
  }

  // render buffers

  pub fn gen_renderbuffer(&self) -> Result<GLuint, ContextError> {
    Ok(self.check("glGenRenderbuffers")?.gen_renderbuffer())
  }

  pub fn delete_renderbuffer(&self, handle: GLuint) -> Result<(), ContextError> {
    let driver = self.check("glDeleteRenderbuffers")?;
    self.ctx.state().forget_renderbuffer(handle);
    driver.delete_renderbuffer(handle);
    Ok(())
  }

  pub fn bind_renderbuffer(&self, handle: GLuint, bind: Bind) -> Result<(), ContextError> {
    let driver = self.check("glBindRenderbuffer")?;

    if self.ctx.state().renderbuffer.update(handle) || bind == Bind::Forced {
      driver.bind_renderbuffer(handle);
    }

    Ok(())
  }

  pub fn renderbuffer_storage(
    &self,
    internal_format: GLenum,
    size: [GLsizei; 2],
  ) -> Result<(), ContextError> {
    self
      .check("glRenderbufferStorage")?
      .renderbuffer_storage(internal_format, size);
    Ok(())
  }

  // framebuffers

  pub fn gen_framebuffer(&self) -> Result<GLuint, ContextError> {
    Ok(self.check("glGenFramebuffers")?.gen_framebuffer())
  }

  pub fn delete_framebuffer(&self, handle: GLuint) -> Result<(), ContextError> {
    let driver = self.check("glDeleteFramebuffers")?;
    self.ctx.state().forget_framebuffer(handle);
    driver.delete_framebuffer(handle);
    Ok(())
  }

  /// Bind a framebuffer; `gl::FRAMEBUFFER` binds both the draw and the read targets.
  pub fn bind_framebuffer(
    &self,
    target: GLenum,
    handle: GLuint,
    bind: Bind,
  ) -> Result<(), ContextError> {
    let driver = self.check("glBindFramebuffer")?;
    let mut state = self.ctx.state();

    let changed = match target {
      gl::DRAW_FRAMEBUFFER => state.draw_framebuffer.update(handle),
      gl::READ_FRAMEBUFFER => state.read_framebuffer.update(handle),
      _ => {
        let draw = state.draw_framebuffer.update(handle);
        state.read_framebuffer.update(handle) || draw
      }
    };

    if changed || bind == Bind::Forced {
      driver.bind_framebuffer(target, handle);
    }

    Ok(())
  }

  pub fn framebuffer_texture_2d(
    &self,
    target: GLenum,
    attachment: GLenum,
    tex_target: GLenum,
    texture: GLuint,
    level: GLint,
  ) -> Result<(), ContextError> {
    self
      .check("glFramebufferTexture2D")?
      .framebuffer_texture_2d(target, attachment, tex_target, texture, level);
    Ok(())
  }

  pub fn framebuffer_renderbuffer(
    &self,
    target: GLenum,
    attachment: GLenum,
    renderbuffer: GLuint,
  ) -> Result<(), ContextError> {
    self
      .check("glFramebufferRenderbuffer")?
      .framebuffer_renderbuffer(target, attachment, renderbuffer);
    Ok(())
  }

  pub fn check_framebuffer_status(&self, target: GLenum) -> Result<GLenum, ContextError> {
    Ok(self.check("glCheckFramebufferStatus")?.check_framebuffer_status(target))
  }

  /// Select the color attachments written by draw calls; an empty list disables color output.
  pub fn draw_buffers(&self, buffers: &[GLenum]) -> Result<(), ContextError> {
    self.check("glDrawBuffers")?.draw_buffers(buffers);
    Ok(())
  }

  // shader stages

  pub fn create_shader(&self, ty: GLenum) -> Result<GLuint, ContextError> {
    Ok(self.check("glCreateShader")?.create_shader(ty))
  }

  pub fn delete_shader(&self, handle: GLuint) -> Result<(), ContextError> {
    self.check("glDeleteShader")?.delete_shader(handle);
    Ok(())
  }

  pub fn shader_source(&self, handle: GLuint, source: &str) -> Result<(), ContextError> {
    self.check("glShaderSource")?.shader_source(handle, source);
    Ok(())
  }

  pub fn compile_shader(&self, handle: GLuint) -> Result<(), ContextError> {
    self.check("glCompileShader")?.compile_shader(handle);
    Ok(())
  }

  pub fn get_shader_iv(&self, handle: GLuint, pname: GLenum) -> Result<GLint, ContextError> {
    Ok(self.check("glGetShaderiv")?.get_shader_iv(handle, pname))
  }

  pub fn get_shader_info_log(&self, handle: GLuint) -> Result<String, ContextError> {
    Ok(self.check("glGetShaderInfoLog")?.get_shader_info_log(handle))
  }

  // shader programs

  pub fn create_program(&self) -> Result<GLuint, ContextError> {
    Ok(self.check("glCreateProgram")?.create_program())
  }

  pub fn delete_program(&self, handle: GLuint) -> Result<(), ContextError> {
    let driver = self.check("glDeleteProgram")?;
    self.ctx.state().forget_program(handle);
    driver.delete_program(handle);
    Ok(())
  }

  pub fn attach_shader(&self, program: GLuint, shader: GLuint) -> Result<(), ContextError> {
    self.check("glAttachShader")?.attach_shader(program, shader);
    Ok(())
  }

  pub fn detach_shader(&self, program: GLuint, shader: GLuint) -> Result<(), ContextError> {
    self.check("glDetachShader")?.detach_shader(program, shader);
    Ok(())
  }

  pub fn link_program(&self, program: GLuint) -> Result<(), ContextError> {
    self.check("glLinkProgram")?.link_program(program);
    Ok(())
  }

  pub fn get_program_iv(&self, program: GLuint, pname: GLenum) -> Result<GLint, ContextError> {
    Ok(self.check("glGetProgramiv")?.get_program_iv(program, pname))
  }

  pub fn get_program_info_log(&self, program: GLuint) -> Result<String, ContextError> {
    Ok(self.check("glGetProgramInfoLog")?.get_program_info_log(program))
  }

  pub fn use_program(&self, program: GLuint, bind: Bind) -> Result<(), ContextError> {
    let driver = self.check("glUseProgram")?;

    if self.ctx.state().program.update(program) || bind == Bind::Forced {
      driver.use_program(program);
    }

    Ok(())
  }

  pub fn get_active_uniform(
    &self,
    program: GLuint,
    index: GLuint,
  ) -> Result<ActiveUniform, ContextError> {
    Ok(self.check("glGetActiveUniform")?.get_active_uniform(program, index))
  }

  pub fn get_uniform_location(&self, program: GLuint, name: &str) -> Result<GLint, ContextError> {
    Ok(self.check("glGetUniformLocation")?.get_uniform_location(program, name))
  }

  pub fn get_active_uniform_block_name(
    &self,
    program: GLuint,
    index: GLuint,
  ) -> Result<String, ContextError> {
    Ok(
      self
        .check("glGetActiveUniformBlockName")?
        .get_active_uniform_block_name(program, index),
    )
  }

  pub fn get_active_uniform_block_iv(
    &self,
    program: GLuint,
    index: GLuint,
    pname: GLenum,
  ) -> Result<GLint, ContextError> {
    Ok(
      self
        .check("glGetActiveUniformBlockiv")?
        .get_active_uniform_block_iv(program, index, pname),
    )
  }

  pub fn get_uniform_block_index(
    &self,
    program: GLuint,
    name: &str,
  ) -> Result<GLuint, ContextError> {
    Ok(
      self
        .check("glGetUniformBlockIndex")?
        .get_uniform_block_index(program, name),
    )
  }

  pub fn uniform_block_binding(
    &self,
    program: GLuint,
    index: GLuint,
    binding: GLuint,
  ) -> Result<(), ContextError> {
    self
      .check("glUniformBlockBinding")?
      .uniform_block_binding(program, index, binding);
    Ok(())
  }

  // uniforms of the program in use

  pub fn uniform_1i(&self, location: GLint, value: GLint) -> Result<(), ContextError> {
    self.check("glUniform1i")?.uniform_1i(location, value);
    Ok(())
  }

  pub fn uniform_1ui(&self, location: GLint, value: GLuint) -> Result<(), ContextError> {
    self.check("glUniform1ui")?.uniform_1ui(location, value);
    Ok(())
  }

  pub fn uniform_1f(&self, location: GLint, value: GLfloat) -> Result<(), ContextError> {
    self.check("glUniform1f")?.uniform_1f(location, value);
    Ok(())
  }

  pub fn uniform_fv(
    &self,
    location: GLint,
    components: usize,
    values: &[GLfloat],
  ) -> Result<(), ContextError> {
    self
      .check("glUniformfv")?
      .uniform_fv(location, components, values);
    Ok(())
  }

  pub fn uniform_iv(
    &self,
    location: GLint,
    components: usize,
    values: &[GLint],
  ) -> Result<(), ContextError> {
    self
      .check("glUniformiv")?
      .uniform_iv(location, components, values);
    Ok(())
  }

  pub fn uniform_matrix_fv(
    &self,
    location: GLint,
    dim: usize,
    values: &[GLfloat],
  ) -> Result<(), ContextError> {
    self
      .check("glUniformMatrixfv")?
      .uniform_matrix_fv(location, dim, values);
    Ok(())
  }

  // vertex arrays

  pub fn gen_vertex_array(&self) -> Result<GLuint, ContextError> {
    Ok(self.check("glGenVertexArrays")?.gen_vertex_array())
  }

  pub fn delete_vertex_array(&self, handle: GLuint) -> Result<(), ContextError> {
    let driver = self.check("glDeleteVertexArrays")?;
    self.ctx.state().forget_vertex_array(handle);
    driver.delete_vertex_array(handle);
    Ok(())
  }

  pub fn bind_vertex_array(&self, handle: GLuint, bind: Bind) -> Result<(), ContextError> {
    let driver = self.check("glBindVertexArray")?;
    let mut state = self.ctx.state();

    if state.vertex_array.update(handle) || bind == Bind::Forced {
      // the element array binding is part of the vertex array state
      state.bound_buffers.remove(&gl::ELEMENT_ARRAY_BUFFER);
      driver.bind_vertex_array(handle);
    }

    Ok(())
  }

  pub fn enable_vertex_attrib_array(&self, index: GLuint) -> Result<(), ContextError> {
    self
      .check("glEnableVertexAttribArray")?
      .enable_vertex_attrib_array(index);
    Ok(())
  }

  pub fn vertex_attrib_pointer(
    &self,
    index: GLuint,
    components: GLint,
    ty: GLenum,
    normalized: bool,
    stride: GLsizei,
    offset: usize,
  ) -> Result<(), ContextError> {
    self
      .check("glVertexAttribPointer")?
      .vertex_attrib_pointer(index, components, ty, normalized, stride, offset);
    Ok(())
  }

  pub fn vertex_attrib_i_pointer(
    &self,
    index: GLuint,
    components: GLint,
    ty: GLenum,
    stride: GLsizei,
    offset: usize,
  ) -> Result<(), ContextError> {
    self
      .check("glVertexAttribIPointer")?
      .vertex_attrib_i_pointer(index, components, ty, stride, offset);
    Ok(())
  }

  // draw calls

  pub fn draw_arrays(
    &self,
    mode: GLenum,
    first: GLint,
    count: GLsizei,
  ) -> Result<(), ContextError> {
    self.check("glDrawArrays")?.draw_arrays(mode, first, count);
    Ok(())
  }

  pub fn draw_elements(
    &self,
    mode: GLenum,
    count: GLsizei,
    ty: GLenum,
    offset: usize,
  ) -> Result<(), ContextError> {
    self
      .check("glDrawElements")?
      .draw_elements(mode, count, ty, offset);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::blending::{Equation, Factor};
  use crate::depth_stencil::StencilOp;
  use crate::context::HeadlessSurface;
  use crate::driver::SoftwareDriver;
  use std::thread;

  fn setup() -> (GlFunctions, SoftwareDriver) {
    let driver = SoftwareDriver::new();
    let ctx = Context::new(HeadlessSurface, driver.clone()).expect("headless context");
    driver.reset_calls();

    (ctx.functions(), driver)
  }

  #[test]
  fn calls_fail_when_context_is_not_current() {
    let (gl, driver) = setup();
    let remote = gl.clone();

    let result = thread::spawn(move || remote.gen_buffer()).join().expect("thread");

    assert_eq!(
      result,
      Err(ContextError::NotCurrent {
        call: "glGenBuffers"
      })
    );
    assert_eq!(driver.calls("glGenBuffers"), 0);
  }

  #[test]
  fn binding_points_need_a_current_context() {
    let (gl, _) = setup();
    let remote = gl.clone();
    assert_eq!(gl.reserve_buffer_binding(), Ok(Some(0)));

    let (reserved, released) = thread::spawn(move || {
      (remote.reserve_texture_unit(), remote.release_buffer_binding(0))
    })
    .join()
    .expect("thread");

    assert_eq!(
      reserved,
      Err(ContextError::NotCurrent {
        call: "reserve_texture_unit"
      })
    );
    assert_eq!(
      released,
      Err(ContextError::NotCurrent {
        call: "release_buffer_binding"
      })
    );

    // the stacks were left alone
    assert_eq!(gl.reserve_texture_unit(), Ok(Some(0)));
    assert_eq!(gl.reserve_buffer_binding(), Ok(Some(1)));
  }

  #[test]
  fn redundant_state_changes_are_skipped() {
    let (gl, driver) = setup();

    gl.set_clear_color([0.1, 0.2, 0.3, 1.]).unwrap();
    gl.set_clear_color([0.1, 0.2, 0.3, 1.]).unwrap();
    gl.set_blend_mode(BlendMode::ALPHA).unwrap();
    gl.set_blend_mode(BlendMode::ALPHA).unwrap();
    gl.enable(Capability::Blend).unwrap();
    gl.enable(Capability::Blend).unwrap();

    assert_eq!(driver.calls("glClearColor"), 1);
    assert_eq!(driver.calls("glBlendFunc"), 1);
    assert_eq!(driver.calls("glEnable"), 1);
    assert_eq!(driver.clear_color(), [0.1, 0.2, 0.3, 1.]);
  }

  #[test]
  fn state_changes_reach_the_driver() {
    let (gl, driver) = setup();
    let stencil = StencilTest::new(Comparison::Equal, 1, 0x0F).on_pass(StencilOp::Replace);

    gl.set_blend_mode(BlendMode::ALPHA).unwrap();
    gl.set_front_face(FrontFace::Cw).unwrap();
    gl.set_polygon_facing(PolygonFacing::Front).unwrap();
    gl.set_depth_comparison(Comparison::GreaterOrEqual).unwrap();
    gl.set_stencil_test(stencil).unwrap();

    let raster = driver.raster_state();
    assert_eq!(raster.blend_equation, gl::FUNC_ADD);
    assert_eq!(raster.blend_func, (gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA));
    assert_eq!(raster.front_face, gl::CW);
    assert_eq!(raster.cull_face, gl::FRONT);
    assert_eq!(raster.depth_func, gl::GEQUAL);
    assert_eq!(raster.stencil_func, (gl::EQUAL, 1, 0x0F));
    assert_eq!(raster.stencil_op, (gl::KEEP, gl::KEEP, gl::REPLACE));
    assert_eq!(raster.stencil_mask, 0xFF);

    assert_eq!(gl.stencil_test(), Ok(stencil));
    assert_eq!(gl.polygon_facing(), Ok(PolygonFacing::Front));
  }

  #[test]
  fn clones_share_the_cache() {
    let (gl, driver) = setup();
    let other = gl.clone();
    let mode = BlendMode::new(Equation::Max, Factor::One, Factor::One);

    gl.set_blend_mode(mode).unwrap();
    gl.set_front_face(FrontFace::Cw).unwrap();

    assert_eq!(other.blend_mode(), Ok(mode));
    assert_eq!(other.front_face(), Ok(FrontFace::Cw));

    other.set_front_face(FrontFace::Cw).unwrap();
    assert_eq!(driver.calls("glFrontFace"), 1);
  }

  #[test]
  fn is_enabled_is_memoized() {
    let (gl, driver) = setup();

    assert_eq!(gl.is_enabled(Capability::DepthTest), Ok(false));

    // foreign code toggles the capability behind the cache
    driver.set_enabled_externally(gl::DEPTH_TEST, true);
    assert_eq!(gl.is_enabled(Capability::DepthTest), Ok(false));
    assert_eq!(driver.calls("glIsEnabled"), 1);

    gl.invalidate_cache().unwrap();
    assert_eq!(gl.is_enabled(Capability::DepthTest), Ok(true));
    assert_eq!(driver.calls("glIsEnabled"), 2);
  }

  #[test]
  fn enabling_updates_the_cache_without_a_query() {
    let (gl, driver) = setup();

    gl.enable(Capability::StencilTest).unwrap();
    assert_eq!(gl.is_enabled(Capability::StencilTest), Ok(true));
    assert_eq!(driver.calls("glIsEnabled"), 0);
  }

  #[test]
  fn cached_binds_are_skipped_and_forced_binds_are_not() {
    let (gl, driver) = setup();
    let buffer = gl.gen_buffer().unwrap();

    gl.bind_buffer(gl::ARRAY_BUFFER, buffer, Bind::Cached).unwrap();
    gl.bind_buffer(gl::ARRAY_BUFFER, buffer, Bind::Cached).unwrap();
    assert_eq!(driver.calls("glBindBuffer"), 1);

    gl.bind_buffer(gl::ARRAY_BUFFER, buffer, Bind::Forced).unwrap();
    assert_eq!(driver.calls("glBindBuffer"), 2);

    gl.delete_buffer(buffer).unwrap();
    assert_eq!(gl.state().bound_buffer(gl::ARRAY_BUFFER), 0);
  }

  #[test]
  fn texture_bindings_are_per_unit() {
    let (gl, driver) = setup();
    let a = gl.gen_texture().unwrap();
    let b = gl.gen_texture().unwrap();

    gl.bind_texture_at(0, gl::TEXTURE_2D, a).unwrap();
    gl.bind_texture_at(3, gl::TEXTURE_2D, b).unwrap();
    gl.bind_texture_at(0, gl::TEXTURE_2D, a).unwrap();

    assert_eq!(driver.calls("glBindTexture"), 2);
    assert_eq!(driver.calls("glActiveTexture"), 2);

    let state = gl.state();
    assert_eq!(state.bound_texture(3), Some((gl::TEXTURE_2D, b)));
    assert_eq!(state.active_texture_unit(), 0);
  }

  #[test]
  fn binding_a_vertex_array_forgets_the_element_buffer() {
    let (gl, _) = setup();
    let vao = gl.gen_vertex_array().unwrap();
    let ibo = gl.gen_buffer().unwrap();

    gl.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, ibo, Bind::Cached).unwrap();
    gl.bind_vertex_array(vao, Bind::Cached).unwrap();

    assert_eq!(gl.state().bound_buffer(gl::ELEMENT_ARRAY_BUFFER), 0);
  }
}
