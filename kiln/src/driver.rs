//! Raw graphics driver entry points.
//!
//! A [`Driver`] is the lowest layer of kiln: one method per OpenGL entry point the engine uses,
//! with the `gl` crate’s enums as parameters. Nothing in here checks which context is current or
//! caches anything; that is the job of [`GlFunctions`](crate::functions::GlFunctions), which wraps
//! a driver and is what every GPU object talks to.
//!
//! Two drivers exist:
//!
//! - [`GlDriver`], forwarding to the real OpenGL implementation loaded through a proc-address
//!   resolver.
//! - [`SoftwareDriver`], simulating the same entry points in memory. It is what the test suite
//!   runs against.

use gl::types::*;
use std::fmt;
use std::os::raw::c_void;

mod opengl;
pub mod software;

pub use self::opengl::GlDriver;
pub use self::software::SoftwareDriver;

/// Metadata of an active uniform, as reported by the driver.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActiveUniform {
  /// Name of the uniform; arrays are reported with a `[0]` suffix.
  pub name: String,
  /// Number of array elements; `1` for non-arrays.
  pub size: GLint,
  /// OpenGL type enum of the uniform.
  pub ty: GLenum,
}

/// OpenGL entry points.
///
/// # Unsafety
///
/// Implementors must honor the OpenGL contract for [`Driver::map_buffer`]: the returned pointer
/// must stay valid for the size of the buffer bound to the target until the buffer is unmapped,
/// respecified or deleted.
pub unsafe trait Driver: fmt::Debug + Send + Sync {
  // queries
  fn get_error(&self) -> GLenum;
  fn get_integer(&self, pname: GLenum) -> GLint;
  fn get_float(&self, pname: GLenum) -> GLfloat;
  fn get_string(&self, name: GLenum) -> String;
  fn is_enabled(&self, cap: GLenum) -> bool;

  // fixed-function state
  fn enable(&self, cap: GLenum);
  fn disable(&self, cap: GLenum);
  fn blend_equation(&self, mode: GLenum);
  fn blend_func(&self, src: GLenum, dst: GLenum);
  fn clear_color(&self, color: [GLfloat; 4]);
  fn clear(&self, mask: GLbitfield);
  fn front_face(&self, mode: GLenum);
  fn cull_face(&self, mode: GLenum);
  fn depth_func(&self, func: GLenum);
  fn stencil_func(&self, func: GLenum, reference: GLint, mask: GLuint);
  fn stencil_op(&self, stencil_fail: GLenum, depth_fail: GLenum, depth_pass: GLenum);
  fn stencil_mask(&self, mask: GLuint);
  fn viewport(&self, viewport: [GLint; 4]);
  fn pixel_store(&self, pname: GLenum, param: GLint);

  // buffers
  fn gen_buffer(&self) -> GLuint;
  fn delete_buffer(&self, handle: GLuint);
  fn bind_buffer(&self, target: GLenum, handle: GLuint);
  fn bind_buffer_base(&self, target: GLenum, index: GLuint, handle: GLuint);
  fn buffer_data(&self, target: GLenum, size: usize, data: Option<&[u8]>, usage: GLenum);
  fn buffer_sub_data(&self, target: GLenum, offset: usize, data: &[u8]);
  fn get_buffer_sub_data(&self, target: GLenum, offset: usize, out: &mut [u8]);
  /// Map the buffer bound to `target`; null on failure.
  unsafe fn map_buffer(&self, target: GLenum, access: GLenum) -> *mut c_void;
  fn unmap_buffer(&self, target: GLenum) -> bool;

  // textures
  fn gen_texture(&self) -> GLuint;
  fn delete_texture(&self, handle: GLuint);
  fn active_texture(&self, unit: GLenum);
  fn bind_texture(&self, target: GLenum, handle: GLuint);
  fn tex_parameter(&self, target: GLenum, pname: GLenum, param: GLint);
  #[allow(clippy::too_many_arguments)]
  fn tex_image_2d(
    &self,
    target: GLenum,
    level: GLint,
    internal_format: GLenum,
    size: [GLsizei; 2],
    format: GLenum,
    ty: GLenum,
    data: Option<&[u8]>,
  );
  #[allow(clippy::too_many_arguments)]
  fn tex_sub_image_2d(
    &self,
    target: GLenum,
    level: GLint,
    offset: [GLint; 2],
    size: [GLsizei; 2],
    format: GLenum,
    ty: GLenum,
    data: &[u8],
  );
  fn get_tex_image(&self, target: GLenum, level: GLint, format: GLenum, ty: GLenum, out: &mut [u8]);
  fn generate_mipmap(&self, target: GLenum);

  // render buffers
  fn gen_renderbuffer(&self) -> GLuint;
  fn delete_renderbuffer(&self, handle: GLuint);
  fn bind_renderbuffer(&self, handle: GLuint);
  fn renderbuffer_storage(&self, internal_format: GLenum, size: [GLsizei; 2]);

  // framebuffers
  fn gen_framebuffer(&self) -> GLuint;
  fn delete_framebuffer(&self, handle: GLuint);
  fn bind_framebuffer(&self, target: GLenum, handle: GLuint);
  fn framebuffer_texture_2d(
    &self,
    target: GLenum,
    attachment: GLenum,
    tex_target: GLenum,
    texture: GLuint,
    level: GLint,
  );
  fn framebuffer_renderbuffer(&self, target: GLenum, attachment: GLenum, renderbuffer: GLuint);
  fn check_framebuffer_status(&self, target: GLenum) -> GLenum;
  fn draw_buffers(&self, buffers: &[GLenum]);

  // shader stages
  fn create_shader(&self, ty: GLenum) -> GLuint;
  fn delete_shader(&self, handle: GLuint);
  fn shader_source(&self, handle: GLuint, source: &str);
  fn compile_shader(&self, handle: GLuint);
  fn get_shader_iv(&self, handle: GLuint, pname: GLenum) -> GLint;
  fn get_shader_info_log(&self, handle: GLuint) -> String;

  // shader programs
  fn create_program(&self) -> GLuint;
  fn delete_program(&self, handle: GLuint);
  fn attach_shader(&self, program: GLuint, shader: GLuint);
  fn detach_shader(&self, program: GLuint, shader: GLuint);
  fn link_program(&self, program: GLuint);
  fn get_program_iv(&self, program: GLuint, pname: GLenum) -> GLint;
  fn get_program_info_log(&self, program: GLuint) -> String;
  fn use_program(&self, program: GLuint);
  fn get_active_uniform(&self, program: GLuint, index: GLuint) -> ActiveUniform;
  fn get_uniform_location(&self, program: GLuint, name: &str) -> GLint;
  fn get_active_uniform_block_name(&self, program: GLuint, index: GLuint) -> String;
  fn get_active_uniform_block_iv(&self, program: GLuint, index: GLuint, pname: GLenum) -> GLint;
  fn get_uniform_block_index(&self, program: GLuint, name: &str) -> GLuint;
  fn uniform_block_binding(&self, program: GLuint, index: GLuint, binding: GLuint);

  // uniforms of the program in use
  fn uniform_1i(&self, location: GLint, value: GLint);
  fn uniform_1ui(&self, location: GLint, value: GLuint);
  fn uniform_1f(&self, location: GLint, value: GLfloat);
  /// Upload `values.len() / components` vectors of `components` floats.
  fn uniform_fv(&self, location: GLint, components: usize, values: &[GLfloat]);
  /// Upload `values.len() / components` vectors of `components` integers.
  fn uniform_iv(&self, location: GLint, components: usize, values: &[GLint]);
  /// Upload `values.len() / (dim * dim)` column-major square matrices.
  fn uniform_matrix_fv(&self, location: GLint, dim: usize, values: &[GLfloat]);

  // vertex arrays
  fn gen_vertex_array(&self) -> GLuint;
  fn delete_vertex_array(&self, handle: GLuint);
  fn bind_vertex_array(&self, handle: GLuint);
  fn enable_vertex_attrib_array(&self, index: GLuint);
  fn vertex_attrib_pointer(
    &self,
    index: GLuint,
    components: GLint,
    ty: GLenum,
    normalized: bool,
    stride: GLsizei,
    offset: usize,
  );
  fn vertex_attrib_i_pointer(
    &self,
    index: GLuint,
    components: GLint,
    ty: GLenum,
    stride: GLsizei,
    offset: usize,
  );

  // draw calls
  fn draw_arrays(&self, mode: GLenum, first: GLint, count: GLsizei);
  fn draw_elements(&self, mode: GLenum, count: GLsizei, ty: GLenum, offset: usize);
}
