//! Vertex arrays and vertex layouts.
//!
//! A [`BufferLayout`] describes one vertex of a [`VertexBuffer`]: an ordered list of
//! [`BufferElement`]s, each of a [`ShaderDataType`]. Offsets are computed from the order of the
//! elements, keeping each one aligned on its component size; the stride is the size of a whole
//! vertex, padding included.
//!
//! A [`VertexArray`] owns its vertex buffers and at most one index buffer. Attribute indices are
//! given in the order buffers are added, then in element order; matrix elements take one index
//! per column.

use crate::buffer::{BufferError, IndexBuffer, VertexBuffer};
use crate::context::ContextError;
use crate::functions::{Bind, GlFunctions};
use gl::types::*;
use std::error;
use std::fmt;

/// Type of a vertex attribute, as seen from shaders.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ShaderDataType {
  Float,
  Float2,
  Float3,
  Float4,
  Mat3,
  Mat4,
  Int,
  Int2,
  Int3,
  Int4,
  UInt,
  UInt2,
  UInt3,
  UInt4,
  Bool,
}

impl ShaderDataType {
  /// Number of components; matrices count all of their cells.
  pub fn component_count(self) -> usize {
    match self {
      ShaderDataType::Float
      | ShaderDataType::Int
      | ShaderDataType::UInt
      | ShaderDataType::Bool => 1,
      ShaderDataType::Float2 | ShaderDataType::Int2 | ShaderDataType::UInt2 => 2,
      ShaderDataType::Float3 | ShaderDataType::Int3 | ShaderDataType::UInt3 => 3,
      ShaderDataType::Float4 | ShaderDataType::Int4 | ShaderDataType::UInt4 => 4,
      ShaderDataType::Mat3 => 9,
      ShaderDataType::Mat4 => 16,
    }
  }

  /// Size of one component, in bytes.
  pub fn component_size(self) -> usize {
    match self {
      ShaderDataType::Bool => 1,
      _ => 4,
    }
  }

  /// Size in bytes.
  pub fn size(self) -> usize {
    self.component_count() * self.component_size()
  }

  /// Whether shaders see integral values.
  pub fn is_integer(self) -> bool {
    !matches!(
      self,
      ShaderDataType::Float
        | ShaderDataType::Float2
        | ShaderDataType::Float3
        | ShaderDataType::Float4
        | ShaderDataType::Mat3
        | ShaderDataType::Mat4
    )
  }

  // attribute slots taken and components per slot
  fn slots(self) -> (usize, GLint) {
    match self {
      ShaderDataType::Mat3 => (3, 3),
      ShaderDataType::Mat4 => (4, 4),
      ty => (1, ty.component_count() as GLint),
    }
  }

  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      ShaderDataType::Float
      | ShaderDataType::Float2
      | ShaderDataType::Float3
      | ShaderDataType::Float4
      | ShaderDataType::Mat3
      | ShaderDataType::Mat4 => gl::FLOAT,
      ShaderDataType::Int
      | ShaderDataType::Int2
      | ShaderDataType::Int3
      | ShaderDataType::Int4 => gl::INT,
      ShaderDataType::UInt
      | ShaderDataType::UInt2
      | ShaderDataType::UInt3
      | ShaderDataType::UInt4 => gl::UNSIGNED_INT,
      ShaderDataType::Bool => gl::UNSIGNED_BYTE,
    }
  }
}

/// One attribute of a vertex.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BufferElement {
  pub name: String,
  pub ty: ShaderDataType,
  /// Whether integral values are normalized to `[0; 1]` / `[-1; 1]` floats.
  pub normalized: bool,
  /// Offset in the vertex, computed by [`BufferLayout::new`].
  pub offset: usize,
}

impl BufferElement {
  pub fn new(ty: ShaderDataType, name: impl Into<String>) -> Self {
    BufferElement {
      name: name.into(),
      ty,
      normalized: false,
      offset: 0,
    }
  }

  pub fn normalized(self) -> Self {
    BufferElement {
      normalized: true,
      ..self
    }
  }
}

/// Layout of the vertices of a buffer.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BufferLayout {
  elements: Vec<BufferElement>,
  stride: usize,
}

impl BufferLayout {
  pub fn new(mut elements: Vec<BufferElement>) -> Self {
    let mut offset = 0;
    let mut align = 1;

    for element in &mut elements {
      let element_align = element.ty.component_size();
      offset = off_align(offset, element_align);
      element.offset = offset;
      offset += element.ty.size();
      align = align.max(element_align);
    }

    BufferLayout {
      elements,
      stride: off_align(offset, align),
    }
  }

  pub fn elements(&self) -> &[BufferElement] {
    &self.elements
  }

  /// Size of a vertex, in bytes.
  pub fn stride(&self) -> usize {
    self.stride
  }

  pub fn is_empty(&self) -> bool {
    self.elements.is_empty()
  }

  /// Number of attribute indices the layout takes.
  pub fn attribute_count(&self) -> usize {
    self.elements.iter().map(|e| e.ty.slots().0).sum()
  }
}

fn off_align(off: usize, align: usize) -> usize {
  let a = align - 1;
  (off + a) & !a
}

/// Primitive mode of draw calls.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Mode {
  Point,
  Line,
  LineStrip,
  #[default]
  Triangle,
  TriangleFan,
  TriangleStrip,
}

impl Mode {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      Mode::Point => gl::POINTS,
      Mode::Line => gl::LINES,
      Mode::LineStrip => gl::LINE_STRIP,
      Mode::Triangle => gl::TRIANGLES,
      Mode::TriangleFan => gl::TRIANGLE_FAN,
      Mode::TriangleStrip => gl::TRIANGLE_STRIP,
    }
  }
}

/// Vertex array errors.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VertexArrayError {
  Context(ContextError),
  Buffer(BufferError),
  /// The vertex buffer has no layout.
  EmptyLayout,
  /// The layouts need more attribute indices than the driver has.
  TooManyAttributes { needed: usize, max: usize },
  /// Nothing to draw.
  NoVertexBuffer,
}

impl fmt::Display for VertexArrayError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      VertexArrayError::Context(ref e) => write!(f, "vertex array context error: {}", e),
      VertexArrayError::Buffer(ref e) => write!(f, "vertex array buffer error: {}", e),
      VertexArrayError::EmptyLayout => f.write_str("vertex buffer has no layout"),
      VertexArrayError::TooManyAttributes { needed, max } => write!(
        f,
        "vertex array needs {} attributes, at most {} available",
        needed, max
      ),
      VertexArrayError::NoVertexBuffer => f.write_str("vertex array has no vertex buffer"),
    }
  }
}

impl error::Error for VertexArrayError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      VertexArrayError::Context(e) => Some(e),
      VertexArrayError::Buffer(e) => Some(e),
      _ => None,
    }
  }
}

impl From<ContextError> for VertexArrayError {
  fn from(e: ContextError) -> Self {
    VertexArrayError::Context(e)
  }
}

impl From<BufferError> for VertexArrayError {
  fn from(e: BufferError) -> Self {
    VertexArrayError::Buffer(e)
  }
}

/// Vertex array: vertex buffers, their attribute layouts and an optional index buffer.
#[derive(Debug)]
pub struct VertexArray {
  gl: GlFunctions,
  handle: GLuint,
  vertex_buffers: Vec<VertexBuffer>,
  index_buffer: Option<IndexBuffer>,
  next_attribute: usize,
}

impl VertexArray {
  pub fn new(gl: &GlFunctions) -> Result<Self, VertexArrayError> {
    let handle = gl.gen_vertex_array()?;

    gl.bind_vertex_array(handle, Bind::Forced)?;
    log::trace!("created vertex array {}", handle);

    Ok(VertexArray {
      gl: gl.clone(),
      handle,
      vertex_buffers: Vec::new(),
      index_buffer: None,
      next_attribute: 0,
    })
  }

  pub fn handle(&self) -> GLuint {
    self.handle
  }

  pub fn bind(&self) -> Result<(), VertexArrayError> {
    self.gl.bind_vertex_array(self.handle, Bind::Cached)?;
    Ok(())
  }

  /// Add a vertex buffer and point attributes at it, following its layout.
  pub fn add_vertex_buffer(&mut self, buffer: VertexBuffer) -> Result<(), VertexArrayError> {
    let layout = buffer.layout();

    if layout.is_empty() {
      log::error!("vertex buffer {} has no layout", buffer.handle());
      return Err(VertexArrayError::EmptyLayout);
    }

    let max = self.gl.get_integer(gl::MAX_VERTEX_ATTRIBS)?.max(0) as usize;
    let needed = self.next_attribute + layout.attribute_count();

    if needed > max {
      let err = VertexArrayError::TooManyAttributes { needed, max };
      log::error!("{}", err);
      return Err(err);
    }

    self.bind()?;
    buffer.bind()?;

    let stride = layout.stride() as GLsizei;
    let mut index = self.next_attribute as GLuint;

    for element in layout.elements() {
      let (slots, components) = element.ty.slots();
      let column = components as usize * element.ty.component_size();

      for slot in 0..slots {
        let offset = element.offset + slot * column;

        self.gl.enable_vertex_attrib_array(index)?;

        if element.ty.is_integer() && !element.normalized {
          self
            .gl
            .vertex_attrib_i_pointer(index, components, element.ty.to_glenum(), stride, offset)?;
        } else {
          self.gl.vertex_attrib_pointer(
            index,
            components,
            element.ty.to_glenum(),
            element.normalized,
            stride,
            offset,
          )?;
        }

        index += 1;
      }
    }

    self.next_attribute = index as usize;
    self.vertex_buffers.push(buffer);

    Ok(())
  }

  /// Set the index buffer, replacing the previous one.
  pub fn set_index_buffer(&mut self, buffer: IndexBuffer) -> Result<(), VertexArrayError> {
    self.bind()?;
    buffer.bind()?;
    self.index_buffer = Some(buffer);

    Ok(())
  }

  pub fn vertex_buffers(&self) -> &[VertexBuffer] {
    &self.vertex_buffers
  }

  pub fn index_buffer(&self) -> Option<&IndexBuffer> {
    self.index_buffer.as_ref()
  }

  /// Number of indices, or of vertices in the first buffer when there is no index buffer.
  pub fn element_count(&self) -> usize {
    match (&self.index_buffer, self.vertex_buffers.first()) {
      (Some(indices), _) => indices.count(),
      (None, Some(vertices)) => vertices.vertex_count(),
      (None, None) => 0,
    }
  }

  /// Draw every element with the program in use.
  pub fn draw(&self, mode: Mode) -> Result<(), VertexArrayError> {
    if self.vertex_buffers.is_empty() {
      log::error!("vertex array {} has no vertex buffer", self.handle);
      return Err(VertexArrayError::NoVertexBuffer);
    }

    self.bind()?;

    match self.index_buffer {
      Some(ref indices) => self.gl.draw_elements(
        mode.to_glenum(),
        indices.count() as GLsizei,
        indices.index_type(),
        0,
      )?,
      None => self
        .gl
        .draw_arrays(mode.to_glenum(), 0, self.element_count() as GLsizei)?,
    }

    Ok(())
  }
}

impl Drop for VertexArray {
  fn drop(&mut self) {
    match self.gl.delete_vertex_array(self.handle) {
      Ok(()) => log::trace!("deleted vertex array {}", self.handle),
      Err(e) => log::error!("leaking vertex array {}: {}", self.handle, e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::buffer::BufferUsage;
  use crate::testing::headless;

  fn layout() -> BufferLayout {
    BufferLayout::new(vec![
      BufferElement::new(ShaderDataType::Float3, "a_Position"),
      BufferElement::new(ShaderDataType::Bool, "a_Selected"),
      BufferElement::new(ShaderDataType::Float2, "a_TexCoord"),
      BufferElement::new(ShaderDataType::Int, "a_EntityId"),
    ])
  }

  #[test]
  fn offsets_and_stride() {
    let layout = layout();
    let offsets: Vec<_> = layout.elements().iter().map(|e| e.offset).collect();

    assert_eq!(offsets, [0, 12, 16, 24]);
    assert_eq!(layout.stride(), 28);
    assert_eq!(BufferLayout::new(Vec::new()).stride(), 0);

    let matrices = BufferLayout::new(vec![
      BufferElement::new(ShaderDataType::Mat4, "a_Model"),
      BufferElement::new(ShaderDataType::Mat3, "a_Normal"),
    ]);
    assert_eq!(matrices.stride(), 64 + 36);
    assert_eq!(matrices.attribute_count(), 7);
  }

  #[test]
  fn attributes_follow_the_layout() {
    let (gl, driver) = headless();
    let vertices = VertexBuffer::with_size(&gl, BufferUsage::StaticDraw, 28 * 3, layout()).unwrap();
    let vbo = vertices.handle();

    let mut vao = VertexArray::new(&gl).unwrap();
    vao.add_vertex_buffer(vertices).unwrap();

    let position = driver.vertex_attribute(vao.handle(), 0).unwrap();
    assert_eq!((position.components, position.ty, position.stride), (3, gl::FLOAT, 28));
    assert!(position.enabled && !position.integer);
    assert_eq!(position.buffer, vbo);

    let selected = driver.vertex_attribute(vao.handle(), 1).unwrap();
    assert_eq!((selected.ty, selected.offset), (gl::UNSIGNED_BYTE, 12));
    assert!(selected.integer);

    let id = driver.vertex_attribute(vao.handle(), 3).unwrap();
    assert_eq!((id.ty, id.offset), (gl::INT, 24));
    assert!(id.integer);

    assert_eq!(vao.element_count(), 3);
  }

  #[test]
  fn matrices_take_one_attribute_per_column() {
    let (gl, driver) = headless();
    let layout = BufferLayout::new(vec![BufferElement::new(ShaderDataType::Mat4, "a_Model")]);
    let vertices = VertexBuffer::with_size(&gl, BufferUsage::StaticDraw, 64, layout).unwrap();

    let mut vao = VertexArray::new(&gl).unwrap();
    vao.add_vertex_buffer(vertices).unwrap();

    for column in 0..4 {
      let attribute = driver.vertex_attribute(vao.handle(), column).unwrap();
      assert_eq!(attribute.components, 4);
      assert_eq!(attribute.offset, column as usize * 16);
    }
  }

  #[test]
  fn index_buffer_is_recorded_in_the_vertex_array() {
    let (gl, driver) = headless();
    let mut vao = VertexArray::new(&gl).unwrap();
    let indices = IndexBuffer::new(&gl, BufferUsage::StaticDraw, &[0, 1, 2, 2, 3, 0]).unwrap();
    let ibo = indices.handle();

    vao.set_index_buffer(indices).unwrap();

    assert_eq!(driver.element_buffer(vao.handle()), Some(ibo));
    assert_eq!(vao.element_count(), 6);
  }

  #[test]
  fn layouts_must_fit_the_attribute_limit() {
    let (gl, _) = headless();
    let mut vao = VertexArray::new(&gl).unwrap();

    let empty =
      VertexBuffer::with_size(&gl, BufferUsage::StaticDraw, 4, BufferLayout::default()).unwrap();
    assert_eq!(vao.add_vertex_buffer(empty), Err(VertexArrayError::EmptyLayout));

    let huge = BufferLayout::new(
      (0..5)
        .map(|i| BufferElement::new(ShaderDataType::Mat4, format!("a_M{}", i)))
        .collect(),
    );
    let vertices = VertexBuffer::with_size(&gl, BufferUsage::StaticDraw, 320, huge).unwrap();

    assert_eq!(
      vao.add_vertex_buffer(vertices),
      Err(VertexArrayError::TooManyAttributes { needed: 20, max: 16 })
    );
  }

  #[test]
  fn drawing_needs_vertices() {
    let (gl, _) = headless();
    let vao = VertexArray::new(&gl).unwrap();

    assert_eq!(vao.draw(Mode::Triangle), Err(VertexArrayError::NoVertexBuffer));
  }
}
