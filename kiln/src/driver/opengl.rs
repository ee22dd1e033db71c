//! Driver forwarding to the system OpenGL implementation.

use crate::context::ContextError;
use crate::driver::{ActiveUniform, Driver};
use gl::types::*;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::ptr::null;

/// Production driver.
///
/// The entry points are the `gl` crate’s globally loaded function pointers, so this type carries
/// no data; it only proves the loader ran and resolved everything the engine needs.
#[derive(Debug)]
pub struct GlDriver {
  _loaded: (),
}

impl GlDriver {
  /// Load the OpenGL entry points through a proc-address resolver.
  ///
  /// The context the resolver belongs to must be current on the calling thread.
  pub fn load_with<F>(mut resolver: F) -> Result<Self, ContextError>
  where
    F: FnMut(&str) -> *const c_void,
  {
    gl::load_with(|symbol| resolver(symbol));

    let required: &[(&str, fn() -> bool)] = &[
      ("glGetIntegerv", gl::GetIntegerv::is_loaded),
      ("glGenBuffers", gl::GenBuffers::is_loaded),
      ("glBufferData", gl::BufferData::is_loaded),
      ("glMapBuffer", gl::MapBuffer::is_loaded),
      ("glUnmapBuffer", gl::UnmapBuffer::is_loaded),
      ("glGenTextures", gl::GenTextures::is_loaded),
      ("glTexImage2D", gl::TexImage2D::is_loaded),
      ("glGenerateMipmap", gl::GenerateMipmap::is_loaded),
      ("glGenFramebuffers", gl::GenFramebuffers::is_loaded),
      ("glCheckFramebufferStatus", gl::CheckFramebufferStatus::is_loaded),
      ("glGenRenderbuffers", gl::GenRenderbuffers::is_loaded),
      ("glCreateShader", gl::CreateShader::is_loaded),
      ("glCreateProgram", gl::CreateProgram::is_loaded),
      ("glGetActiveUniformBlockiv", gl::GetActiveUniformBlockiv::is_loaded),
      ("glBindBufferBase", gl::BindBufferBase::is_loaded),
      ("glGenVertexArrays", gl::GenVertexArrays::is_loaded),
      ("glDrawElements", gl::DrawElements::is_loaded),
    ];

    for &(symbol, is_loaded) in required {
      if !is_loaded() {
        log::error!("cannot resolve OpenGL entry point {}", symbol);
        return Err(ContextError::loader_failed(symbol));
      }
    }

    Ok(GlDriver { _loaded: () })
  }
}

fn c_name(name: &str) -> Option<CString> {
  CString::new(name.as_bytes()).ok()
}

fn utf8_log(mut log: Vec<u8>, written: GLsizei) -> String {
  log.truncate(written.max(0) as usize);
  String::from_utf8_lossy(&log).into_owned()
}

unsafe impl Driver for GlDriver {
  fn get_error(&self) -> GLenum {
    unsafe { gl::GetError() }
  }

  fn get_integer(&self, pname: GLenum) -> GLint {
    let mut value = 0;
    unsafe { gl::GetIntegerv(pname, &mut value) };
    value
  }

  fn get_float(&self, pname: GLenum) -> GLfloat {
    let mut value = 0.;
    unsafe { gl::GetFloatv(pname, &mut value) };
    value
  }

  fn get_string(&self, name: GLenum) -> String {
    unsafe {
      let ptr = gl::GetString(name);

      if ptr.is_null() {
        String::new()
      } else {
        CStr::from_ptr(ptr as *const c_char)
          .to_string_lossy()
          .into_owned()
      }
    }
  }

  fn is_enabled(&self, cap: GLenum) -> bool {
    unsafe { gl::IsEnabled(cap) == gl::TRUE }
  }

  fn enable(&self, cap: GLenum) {
    unsafe { gl::Enable(cap) }
  }

  fn disable(&self, cap: GLenum) {
    unsafe { gl::Disable(cap) }
  }

  fn blend_equation(&self, mode: GLenum) {
    unsafe { gl::BlendEquation(mode) }
  }

  fn blend_func(&self, src: GLenum, dst: GLenum) {
    unsafe { gl::BlendFunc(src, dst) }
  }

  fn clear_color(&self, color: [GLfloat; 4]) {
    unsafe { gl::ClearColor(color[0], color[1], color[2], color[3]) }
  }

  fn clear(&self, mask: GLbitfield) {
    unsafe { gl::Clear(mask) }
  }

  fn front_face(&self, mode: GLenum) {
    unsafe { gl::FrontFace(mode) }
  }

  fn cull_face(&self, mode: GLenum) {
    unsafe { gl::CullFace(mode) }
  }

  fn depth_func(&self, func: GLenum) {
    unsafe { gl::DepthFunc(func) }
  }

  fn stencil_func(&self, func: GLenum, reference: GLint, mask: GLuint) {
    unsafe { gl::StencilFunc(func, reference, mask) }
  }

  fn stencil_op(&self, stencil_fail: GLenum, depth_fail: GLenum, depth_pass: GLenum) {
    unsafe { gl::StencilOp(stencil_fail, depth_fail, depth_pass) }
  }

  fn stencil_mask(&self, mask: GLuint) {
    unsafe { gl::StencilMask(mask) }
  }

  fn viewport(&self, viewport: [GLint; 4]) {
    unsafe { gl::Viewport(viewport[0], viewport[1], viewport[2], viewport[3]) }
  }

  fn pixel_store(&self, pname: GLenum, param: GLint) {
    unsafe { gl::PixelStorei(pname, param) }
  }

  fn gen_buffer(&self) -> GLuint {
    let mut handle = 0;
    unsafe { gl::GenBuffers(1, &mut handle) };
    handle
  }

  fn delete_buffer(&self, handle: GLuint) {
    unsafe { gl::DeleteBuffers(1, &handle) }
  }

  fn bind_buffer(&self, target: GLenum, handle: GLuint) {
    unsafe { gl::BindBuffer(target, handle) }
  }

  fn bind_buffer_base(&self, target: GLenum, index: GLuint, handle: GLuint) {
    unsafe { gl::BindBufferBase(target, index, handle) }
  }

  fn buffer_data(&self, target: GLenum, size: usize, data: Option<&[u8]>, usage: GLenum) {
    let ptr = data.map_or(null(), |data| data.as_ptr() as *const c_void);
    unsafe { gl::BufferData(target, size as GLsizeiptr, ptr, usage) }
  }

  fn buffer_sub_data(&self, target: GLenum, offset: usize, data: &[u8]) {
    unsafe {
      gl::BufferSubData(
        target,
        offset as GLintptr,
        data.len() as GLsizeiptr,
        data.as_ptr() as *const c_void,
      )
    }
  }

  fn get_buffer_sub_data(&self, target: GLenum, offset: usize, out: &mut [u8]) {
    unsafe {
      gl::GetBufferSubData(
        target,
        offset as GLintptr,
        out.len() as GLsizeiptr,
        out.as_mut_ptr() as *mut c_void,
      )
    }
  }

  unsafe fn map_buffer(&self, target: GLenum, access: GLenum) -> *mut c_void {
    gl::MapBuffer(target, access)
  }

  fn unmap_buffer(&self, target: GLenum) -> bool {
    unsafe { gl::UnmapBuffer(target) == gl::TRUE }
  }

  fn gen_texture(&self) -> GLuint {
    let mut handle = 0;
    unsafe { gl::GenTextures(1, &mut handle) };
    handle
  }

  fn delete_texture(&self, handle: GLuint) {
    unsafe { gl::DeleteTextures(1, &handle) }
  }

  fn active_texture(&self, unit: GLenum) {
    unsafe { gl::ActiveTexture(unit) }
  }

  fn bind_texture(&self, target: GLenum, handle: GLuint) {
    unsafe { gl::BindTexture(target, handle) }
  }

  fn tex_parameter(&self, target: GLenum, pname: GLenum, param: GLint) {
    unsafe { gl::TexParameteri(target, pname, param) }
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
    let ptr = data.map_or(null(), |data| data.as_ptr() as *const c_void);

    unsafe {
      gl::TexImage2D(
        target,
        level,
        internal_format as GLint,
        size[0],
        size[1],
        0,
        format,
        ty,
        ptr,
      )
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
    unsafe {
      gl::TexSubImage2D(
        target,
        level,
        offset[0],
        offset[1],
        size[0],
        size[1],
        format,
        ty,
        data.as_ptr() as *const c_void,
      )
    }
  }

  fn get_tex_image(
    &self,
    target: GLenum,
    level: GLint,
    format: GLenum,
    ty: GLenum,
    out: &mut [u8],
  ) {
    unsafe { gl::GetTexImage(target, level, format, ty, out.as_mut_ptr() as *mut c_void) }
  }

  fn generate_mipmap(&self, target: GLenum) {
    unsafe { gl::GenerateMipmap(target) }
  }

  fn gen_renderbuffer(&self) -> GLuint {
    let mut handle = 0;
    unsafe { gl::GenRenderbuffers(1, &mut handle) };
    handle
  }

  fn delete_renderbuffer(&self, handle: GLuint) {
    unsafe { gl::DeleteRenderbuffers(1, &handle) }
  }

  fn bind_renderbuffer(&self, handle: GLuint) {
    unsafe { gl::BindRenderbuffer(gl::RENDERBUFFER, handle) }
  }

  fn renderbuffer_storage(&self, internal_format: GLenum, size: [GLsizei; 2]) {
    unsafe { gl::RenderbufferStorage(gl::RENDERBUFFER, internal_format, size[0], size[1]) }
  }

  fn gen_framebuffer(&self) -> GLuint {
    let mut handle = 0;
    unsafe { gl::GenFramebuffers(1, &mut handle) };
    handle
  }

  fn delete_framebuffer(&self, handle: GLuint) {
    unsafe { gl::DeleteFramebuffers(1, &handle) }
  }

  fn bind_framebuffer(&self, target: GLenum, handle: GLuint) {
    unsafe { gl::BindFramebuffer(target, handle) }
  }

  fn framebuffer_texture_2d(
    &self,
    target: GLenum,
    attachment: GLenum,
    tex_target: GLenum,
    texture: GLuint,
    level: GLint,
  ) {
    unsafe { gl::FramebufferTexture2D(target, attachment, tex_target, texture, level) }
  }

  fn framebuffer_renderbuffer(&self, target: GLenum, attachment: GLenum, renderbuffer: GLuint) {
    unsafe { gl::FramebufferRenderbuffer(target, attachment, gl::RENDERBUFFER, renderbuffer) }
  }

  fn check_framebuffer_status(&self, target: GLenum) -> GLenum {
    unsafe { gl::CheckFramebufferStatus(target) }
  }

  fn draw_buffers(&self, buffers: &[GLenum]) {
    if buffers.is_empty() {
      unsafe { gl::DrawBuffer(gl::NONE) };
    } else {
      unsafe { gl::DrawBuffers(buffers.len() as GLsizei, buffers.as_ptr()) };
    }
  }

  fn create_shader(&self, ty: GLenum) -> GLuint {
    unsafe { gl::CreateShader(ty) }
  }

  fn delete_shader(&self, handle: GLuint) {
    unsafe { gl::DeleteShader(handle) }
  }

  fn shader_source(&self, handle: GLuint, source: &str) {
    let ptr = source.as_ptr() as *const GLchar;
    let len = source.len() as GLint;

    unsafe { gl::ShaderSource(handle, 1, &ptr, &len) }
  }

  fn compile_shader(&self, handle: GLuint) {
    unsafe { gl::CompileShader(handle) }
  }

  fn get_shader_iv(&self, handle: GLuint, pname: GLenum) -> GLint {
    let mut value = 0;
    unsafe { gl::GetShaderiv(handle, pname, &mut value) };
    value
  }

  fn get_shader_info_log(&self, handle: GLuint) -> String {
    let len = self.get_shader_iv(handle, gl::INFO_LOG_LENGTH);

    if len <= 0 {
      return String::new();
    }

    let mut log = vec![0u8; len as usize];
    let mut written = 0;
    unsafe { gl::GetShaderInfoLog(handle, len, &mut written, log.as_mut_ptr() as *mut GLchar) };

    utf8_log(log, written)
  }

  fn create_program(&self) -> GLuint {
    unsafe { gl::CreateProgram() }
  }

  fn delete_program(&self, handle: GLuint) {
    unsafe { gl::DeleteProgram(handle) }
  }

  fn attach_shader(&self, program: GLuint, shader: GLuint) {
    unsafe { gl::AttachShader(program, shader) }
  }

  fn detach_shader(&self, program: GLuint, shader: GLuint) {
    unsafe { gl::DetachShader(program, shader) }
  }

  fn link_program(&self, program: GLuint) {
    unsafe { gl::LinkProgram(program) }
  }

  fn get_program_iv(&self, program: GLuint, pname: GLenum) -> GLint {
    let mut value = 0;
    unsafe { gl::GetProgramiv(program, pname, &mut value) };
    value
  }

  fn get_program_info_log(&self, program: GLuint) -> String {
    let len = self.get_program_iv(program, gl::INFO_LOG_LENGTH);

    if len <= 0 {
      return String::new();
    }

    let mut log = vec![0u8; len as usize];
    let mut written = 0;
    unsafe { gl::GetProgramInfoLog(program, len, &mut written, log.as_mut_ptr() as *mut GLchar) };

    utf8_log(log, written)
  }

  fn use_program(&self, program: GLuint) {
    unsafe { gl::UseProgram(program) }
  }

  fn get_active_uniform(&self, program: GLuint, index: GLuint) -> ActiveUniform {
    let max_len = self
      .get_program_iv(program, gl::ACTIVE_UNIFORM_MAX_LENGTH)
      .max(1);
    let mut name = vec![0u8; max_len as usize];
    let mut written = 0;
    let mut size = 0;
    let mut ty = 0;

    unsafe {
      gl::GetActiveUniform(
        program,
        index,
        max_len,
        &mut written,
        &mut size,
        &mut ty,
        name.as_mut_ptr() as *mut GLchar,
      )
    };

    ActiveUniform {
      name: utf8_log(name, written),
      size,
      ty,
    }
  }

  fn get_uniform_location(&self, program: GLuint, name: &str) -> GLint {
    match c_name(name) {
      Some(c_name) => unsafe { gl::GetUniformLocation(program, c_name.as_ptr() as *const GLchar) },
      None => -1,
    }
  }

  fn get_active_uniform_block_name(&self, program: GLuint, index: GLuint) -> String {
    let len = self
      .get_active_uniform_block_iv(program, index, gl::UNIFORM_BLOCK_NAME_LENGTH)
      .max(1);
    let mut name = vec![0u8; len as usize];
    let mut written = 0;

    unsafe {
      gl::GetActiveUniformBlockName(
        program,
        index,
        len,
        &mut written,
        name.as_mut_ptr() as *mut GLchar,
      )
    };

    utf8_log(name, written)
  }

  fn get_active_uniform_block_iv(&self, program: GLuint, index: GLuint, pname: GLenum) -> GLint {
    let mut value = 0;
    unsafe { gl::GetActiveUniformBlockiv(program, index, pname, &mut value) };
    value
  }

  fn get_uniform_block_index(&self, program: GLuint, name: &str) -> GLuint {
    match c_name(name) {
      Some(c_name) => unsafe {
        gl::GetUniformBlockIndex(program, c_name.as_ptr() as *const GLchar)
      },
      None => gl::INVALID_INDEX,
    }
  }

  fn uniform_block_binding(&self, program: GLuint, index: GLuint, binding: GLuint) {
    unsafe { gl::UniformBlockBinding(program, index, binding) }
  }

  fn uniform_1i(&self, location: GLint, value: GLint) {
    unsafe { gl::Uniform1i(location, value) }
  }

  fn uniform_1ui(&self, location: GLint, value: GLuint) {
    unsafe { gl::Uniform1ui(location, value) }
  }

  fn uniform_1f(&self, location: GLint, value: GLfloat) {
    unsafe { gl::Uniform1f(location, value) }
  }

  fn uniform_fv(&self, location: GLint, components: usize, values: &[GLfloat]) {
    let count = (values.len() / components.max(1)) as GLsizei;
    let ptr = values.as_ptr();

    unsafe {
      match components {
        1 => gl::Uniform1fv(location, count, ptr),
        2 => gl::Uniform2fv(location, count, ptr),
        3 => gl::Uniform3fv(location, count, ptr),
        4 => gl::Uniform4fv(location, count, ptr),
        _ => log::error!("cannot upload float vector of {} components", components),
      }
    }
  }

  fn uniform_iv(&self, location: GLint, components: usize, values: &[GLint]) {
    let count = (values.len() / components.max(1)) as GLsizei;
    let ptr = values.as_ptr();

    unsafe {
      match components {
        1 => gl::Uniform1iv(location, count, ptr),
        2 => gl::Uniform2iv(location, count, ptr),
        3 => gl::Uniform3iv(location, count, ptr),
        4 => gl::Uniform4iv(location, count, ptr),
        _ => log::error!("cannot upload integer vector of {} components", components),
      }
    }
  }

  fn uniform_matrix_fv(&self, location: GLint, dim: usize, values: &[GLfloat]) {
    let count = (values.len() / (dim * dim).max(1)) as GLsizei;
    let ptr = values.as_ptr();

    unsafe {
      match dim {
        2 => gl::UniformMatrix2fv(location, count, gl::FALSE, ptr),
        3 => gl::UniformMatrix3fv(location, count, gl::FALSE, ptr),
        4 => gl::UniformMatrix4fv(location, count, gl::FALSE, ptr),
        _ => log::error!("cannot upload {}x{} matrix", dim, dim),
      }
    }
  }

  fn gen_vertex_array(&self) -> GLuint {
    let mut handle = 0;
    unsafe { gl::GenVertexArrays(1, &mut handle) };
    handle
  }

  fn delete_vertex_array(&self, handle: GLuint) {
    unsafe { gl::DeleteVertexArrays(1, &handle) }
  }

  fn bind_vertex_array(&self, handle: GLuint) {
    unsafe { gl::BindVertexArray(handle) }
  }

  fn enable_vertex_attrib_array(&self, index: GLuint) {
    unsafe { gl::EnableVertexAttribArray(index) }
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
    let normalized = if normalized { gl::TRUE } else { gl::FALSE };

    unsafe {
      gl::VertexAttribPointer(
        index,
        components,
        ty,
        normalized,
        stride,
        offset as *const c_void,
      )
    }
  }

  fn vertex_attrib_i_pointer(
    &self,
    index: GLuint,
    components: GLint,
    ty: GLenum,
    stride: GLsizei,
    offset: usize,
  ) {
    unsafe { gl::VertexAttribIPointer(index, components, ty, stride, offset as *const c_void) }
  }

  fn draw_arrays(&self, mode: GLenum, first: GLint, count: GLsizei) {
    unsafe { gl::DrawArrays(mode, first, count) }
  }

  fn draw_elements(&self, mode: GLenum, count: GLsizei, ty: GLenum, offset: usize) {
    unsafe { gl::DrawElements(mode, count, ty, offset as *const c_void) }
  }
}
