//! GPU buffers and their CPU-mapped views.
//!
//! A [`BufferObject`] owns one GPU buffer. Its storage is (re)allocated with
//! [`BufferObject::data`] and partially updated with [`BufferObject::sub_data`]; both check ranges
//! against the current size.
//!
//! [`BufferObject::content`] maps the buffer into CPU memory and returns a [`BufferContent`]. At
//! most one mapped view of a buffer is alive at any time: asking for another one while it lives
//! returns the same view. The buffer is unmapped when the last handle to the view is dropped. If
//! the buffer goes away first (or is reallocated), the view is invalidated and every later access
//! through it fails with [`BufferError::Invalidated`].

use crate::context::ContextError;
use crate::functions::{Bind, GlFunctions};
use crate::vertex_array::BufferLayout;
use bytemuck::Pod;
use gl::types::*;
use std::cell::{Cell, RefCell};
use std::error;
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr;
use std::rc::{Rc, Weak};

// Target used for every storage operation, so that uploads never disturb the element array
// binding of the bound vertex array.
const UPLOAD_TARGET: GLenum = gl::ARRAY_BUFFER;

/// What a buffer is used for.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum BufferKind {
  Vertex,
  Index,
  Uniform,
}

impl BufferKind {
  /// Binding target of buffers of this kind.
  pub fn target(self) -> GLenum {
    match self {
      BufferKind::Vertex => gl::ARRAY_BUFFER,
      BufferKind::Index => gl::ELEMENT_ARRAY_BUFFER,
      BufferKind::Uniform => gl::UNIFORM_BUFFER,
    }
  }
}

/// Usage hint given to the driver when allocating storage.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum BufferUsage {
  StaticDraw,
  StaticRead,
  StaticCopy,
  DynamicDraw,
  DynamicRead,
  DynamicCopy,
  StreamDraw,
  StreamRead,
  StreamCopy,
}

impl BufferUsage {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      BufferUsage::StaticDraw => gl::STATIC_DRAW,
      BufferUsage::StaticRead => gl::STATIC_READ,
      BufferUsage::StaticCopy => gl::STATIC_COPY,
      BufferUsage::DynamicDraw => gl::DYNAMIC_DRAW,
      BufferUsage::DynamicRead => gl::DYNAMIC_READ,
      BufferUsage::DynamicCopy => gl::DYNAMIC_COPY,
      BufferUsage::StreamDraw => gl::STREAM_DRAW,
      BufferUsage::StreamRead => gl::STREAM_READ,
      BufferUsage::StreamCopy => gl::STREAM_COPY,
    }
  }
}

impl Default for BufferUsage {
  fn default() -> Self {
    BufferUsage::StaticDraw
  }
}

/// Access mode of a mapped view.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Access {
  ReadOnly,
  WriteOnly,
  ReadWrite,
}

impl Access {
  pub fn can_read(self) -> bool {
    self != Access::WriteOnly
  }

  pub fn can_write(self) -> bool {
    self != Access::ReadOnly
  }

  fn to_glenum(self) -> GLenum {
    match self {
      Access::ReadOnly => gl::READ_ONLY,
      Access::WriteOnly => gl::WRITE_ONLY,
      Access::ReadWrite => gl::READ_WRITE,
    }
  }
}

impl fmt::Display for Access {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      Access::ReadOnly => f.write_str("read-only"),
      Access::WriteOnly => f.write_str("write-only"),
      Access::ReadWrite => f.write_str("read-write"),
    }
  }
}

/// Buffer errors.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BufferError {
  /// The owning context is not current.
  Context(ContextError),
  /// A range exceeds the buffer’s storage.
  OutOfRange {
    offset: usize,
    len: usize,
    size: usize,
  },
  /// Provided data doesn’t match the requested allocation size.
  SizeMismatch { expected: usize, provided: usize },
  /// The buffer has no storage to map.
  EmptyBuffer,
  /// The operation is impossible on a non-owning null buffer.
  NullBuffer,
  /// The operation is impossible while a mapped view is alive.
  Mapped,
  /// The driver refused to map the buffer.
  MapFailed,
  /// Reading through a write-only view or writing through a read-only one.
  AccessViolation { access: Access },
  /// The mapped view outlived its mapping.
  Invalidated,
}

impl BufferError {
  pub fn out_of_range(offset: usize, len: usize, size: usize) -> Self {
    BufferError::OutOfRange { offset, len, size }
  }

  pub fn size_mismatch(expected: usize, provided: usize) -> Self {
    BufferError::SizeMismatch { expected, provided }
  }

  pub fn access_violation(access: Access) -> Self {
    BufferError::AccessViolation { access }
  }
}

impl fmt::Display for BufferError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      BufferError::Context(ref e) => write!(f, "buffer context error: {}", e),
      BufferError::OutOfRange { offset, len, size } => write!(
        f,
        "buffer range out of bounds: offset {} + length {} > size {}",
        offset, len, size
      ),
      BufferError::SizeMismatch { expected, provided } => write!(
        f,
        "buffer data size mismatch: expected {} bytes, got {}",
        expected, provided
      ),
      BufferError::EmptyBuffer => f.write_str("cannot map an empty buffer"),
      BufferError::NullBuffer => f.write_str("operation not allowed on the null buffer"),
      BufferError::Mapped => f.write_str("buffer is currently mapped"),
      BufferError::MapFailed => f.write_str("buffer mapping failed"),
      BufferError::AccessViolation { access } => {
        write!(f, "access violation through a {} buffer view", access)
      }
      BufferError::Invalidated => f.write_str("buffer view used after being invalidated"),
    }
  }
}

impl error::Error for BufferError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      BufferError::Context(e) => Some(e),
      _ => None,
    }
  }
}

impl From<ContextError> for BufferError {
  fn from(e: ContextError) -> Self {
    BufferError::Context(e)
  }
}

fn check_range(offset: usize, len: usize, size: usize) -> Result<(), BufferError> {
  match offset.checked_add(len) {
    Some(end) if end <= size => Ok(()),
    _ => {
      let err = BufferError::out_of_range(offset, len, size);
      log::error!("{}", err);
      Err(err)
    }
  }
}

/// GPU buffer.
#[derive(Debug)]
pub struct BufferObject {
  gl: GlFunctions,
  handle: GLuint,
  kind: BufferKind,
  usage: BufferUsage,
  size: usize,
  owned: bool,
  view: RefCell<Weak<MappedView>>,
}

impl BufferObject {
  /// Create a buffer without storage.
  pub fn new(gl: &GlFunctions, kind: BufferKind, usage: BufferUsage) -> Result<Self, BufferError> {
    let handle = gl.gen_buffer()?;

    // the object only exists once bound
    gl.bind_buffer(UPLOAD_TARGET, handle, Bind::Forced)?;
    log::trace!("created {:?} buffer {}", kind, handle);

    Ok(BufferObject {
      gl: gl.clone(),
      handle,
      kind,
      usage,
      size: 0,
      owned: true,
      view: RefCell::new(Weak::new()),
    })
  }

  /// Create a buffer with zeroed storage of `size` bytes.
  pub fn with_size(
    gl: &GlFunctions,
    kind: BufferKind,
    usage: BufferUsage,
    size: usize,
  ) -> Result<Self, BufferError> {
    let mut buffer = Self::new(gl, kind, usage)?;
    buffer.data(usage, size, None)?;
    Ok(buffer)
  }

  /// Create a buffer holding a copy of `data`.
  pub fn with_data(
    gl: &GlFunctions,
    kind: BufferKind,
    usage: BufferUsage,
    data: &[u8],
  ) -> Result<Self, BufferError> {
    let mut buffer = Self::new(gl, kind, usage)?;
    buffer.data(usage, data.len(), Some(data))?;
    Ok(buffer)
  }

  /// Wrap a buffer created elsewhere; it is not deleted on drop.
  pub fn from_raw(gl: &GlFunctions, handle: GLuint, kind: BufferKind, size: usize) -> Self {
    BufferObject {
      gl: gl.clone(),
      handle,
      kind,
      usage: BufferUsage::default(),
      size,
      owned: false,
      view: RefCell::new(Weak::new()),
    }
  }

  /// The null buffer of a kind (handle `0`), used to unbind.
  pub fn null(gl: &GlFunctions, kind: BufferKind) -> Self {
    Self::from_raw(gl, 0, kind, 0)
  }

  pub fn handle(&self) -> GLuint {
    self.handle
  }

  pub fn kind(&self) -> BufferKind {
    self.kind
  }

  pub fn usage(&self) -> BufferUsage {
    self.usage
  }

  /// Size of the storage, in bytes.
  pub fn size(&self) -> usize {
    self.size
  }

  pub fn is_empty(&self) -> bool {
    self.size == 0
  }

  /// Whether the GPU buffer is deleted with this value.
  pub fn is_owned(&self) -> bool {
    self.owned
  }

  /// Whether a mapped view of this buffer is alive.
  ///
  /// A view that was invalidated doesn't count, even if handles to it are still held.
  pub fn is_mapped(&self) -> bool {
    self.live_view().is_some()
  }

  fn live_view(&self) -> Option<Rc<MappedView>> {
    self
      .view
      .borrow()
      .upgrade()
      .filter(|view| !view.ptr.get().is_null())
  }

  pub(crate) fn gl(&self) -> &GlFunctions {
    &self.gl
  }

  /// Bind the buffer to the target of its kind.
  pub fn bind(&self) -> Result<(), BufferError> {
    self
      .gl
      .bind_buffer(self.kind.target(), self.handle, Bind::Cached)?;
    Ok(())
  }

  /// (Re)allocate the storage.
  ///
  /// The previous content is lost and a live mapped view is invalidated. When `data` is provided,
  /// its length must be `size`.
  pub fn data(
    &mut self,
    usage: BufferUsage,
    size: usize,
    data: Option<&[u8]>,
  ) -> Result<(), BufferError> {
    if self.handle == 0 {
      return Err(BufferError::NullBuffer);
    }

    if let Some(data) = data {
      if data.len() != size {
        let err = BufferError::size_mismatch(size, data.len());
        log::error!("{}", err);
        return Err(err);
      }
    }

    self.invalidate_view();

    self.gl.bind_buffer(UPLOAD_TARGET, self.handle, Bind::Cached)?;
    self
      .gl
      .buffer_data(UPLOAD_TARGET, size, data, usage.to_glenum())?;

    self.size = size;
    self.usage = usage;

    Ok(())
  }

  /// Overwrite `data.len()` bytes of the storage starting at `offset`.
  pub fn sub_data(&self, offset: usize, data: &[u8]) -> Result<(), BufferError> {
    check_range(offset, data.len(), self.size)?;
    self.check_unmapped()?;

    self.gl.bind_buffer(UPLOAD_TARGET, self.handle, Bind::Cached)?;
    self.gl.buffer_sub_data(UPLOAD_TARGET, offset, data)?;

    Ok(())
  }

  /// Read `len` bytes of the storage starting at `offset`.
  pub fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>, BufferError> {
    check_range(offset, len, self.size)?;
    self.check_unmapped()?;

    let mut out = vec![0; len];
    self.gl.bind_buffer(UPLOAD_TARGET, self.handle, Bind::Cached)?;
    self.gl.get_buffer_sub_data(UPLOAD_TARGET, offset, &mut out)?;

    Ok(out)
  }

  /// Map the buffer.
  ///
  /// If a view is already alive, it is returned instead of mapping again; a warning is logged if
  /// it was mapped with another access mode.
  pub fn content(&self, access: Access) -> Result<BufferContent, BufferError> {
    if let Some(view) = self.live_view() {
      if view.access != access {
        log::warn!(
          "buffer {} is already mapped {}; {} view requested, returning the live one",
          self.handle,
          view.access,
          access
        );
      }

      return Ok(BufferContent { view });
    }

    if self.size == 0 {
      log::error!("cannot map buffer {}: it has no storage", self.handle);
      return Err(BufferError::EmptyBuffer);
    }

    self.gl.bind_buffer(UPLOAD_TARGET, self.handle, Bind::Cached)?;
    let ptr = unsafe { self.gl.map_buffer(UPLOAD_TARGET, access.to_glenum())? } as *mut u8;

    if ptr.is_null() {
      log::error!("mapping buffer {} failed", self.handle);
      return Err(BufferError::MapFailed);
    }

    let view = Rc::new(MappedView {
      gl: self.gl.clone(),
      handle: self.handle,
      access,
      size: self.size,
      ptr: Cell::new(ptr),
    });

    *self.view.borrow_mut() = Rc::downgrade(&view);

    Ok(BufferContent { view })
  }

  fn check_unmapped(&self) -> Result<(), BufferError> {
    if self.is_mapped() {
      log::error!("buffer {} is mapped", self.handle);
      Err(BufferError::Mapped)
    } else {
      Ok(())
    }
  }

  fn invalidate_view(&self) {
    if let Some(view) = self.view.replace(Weak::new()).upgrade() {
      log::debug!("invalidating the mapped view of buffer {}", self.handle);
      view.invalidate();
    }
  }
}

impl Drop for BufferObject {
  fn drop(&mut self) {
    self.invalidate_view();

    if self.owned && self.handle != 0 {
      match self.gl.delete_buffer(self.handle) {
        Ok(()) => log::trace!("deleted buffer {}", self.handle),
        Err(e) => log::error!("leaking buffer {}: {}", self.handle, e),
      }
    }
  }
}

// The mapping itself; unmapped when the last BufferContent pointing to it goes away.
#[derive(Debug)]
struct MappedView {
  gl: GlFunctions,
  handle: GLuint,
  access: Access,
  size: usize,
  ptr: Cell<*mut u8>,
}

impl MappedView {
  fn invalidate(&self) {
    let ptr = self.ptr.replace(ptr::null_mut());

    if ptr.is_null() {
      return;
    }

    let unmapped = self
      .gl
      .bind_buffer(UPLOAD_TARGET, self.handle, Bind::Cached)
      .and_then(|_| self.gl.unmap_buffer(UPLOAD_TARGET));

    match unmapped {
      Ok(true) => (),
      Ok(false) => log::warn!("buffer {} content was corrupted while mapped", self.handle),
      Err(e) => log::error!("cannot unmap buffer {}: {}", self.handle, e),
    }
  }

  fn ptr(&self) -> Result<*mut u8, BufferError> {
    let ptr = self.ptr.get();

    if ptr.is_null() {
      Err(BufferError::Invalidated)
    } else {
      Ok(ptr)
    }
  }
}

impl Drop for MappedView {
  fn drop(&mut self) {
    self.invalidate();
  }
}

/// CPU-mapped view of a buffer.
///
/// Clones refer to the same mapping.
#[derive(Clone, Debug)]
pub struct BufferContent {
  view: Rc<MappedView>,
}

impl BufferContent {
  pub fn access(&self) -> Access {
    self.view.access
  }

  /// Size of the mapped range, in bytes.
  pub fn size(&self) -> usize {
    self.view.size
  }

  /// Whether the mapping is still alive.
  pub fn is_valid(&self) -> bool {
    !self.view.ptr.get().is_null()
  }

  /// Whether both values are handles to the same mapping.
  pub fn is_same_view(&self, other: &BufferContent) -> bool {
    Rc::ptr_eq(&self.view, &other.view)
  }

  /// Copy of the whole mapped range.
  pub fn get(&self) -> Result<Vec<u8>, BufferError> {
    self.read(0, self.size())
  }

  /// Copy of `len` bytes starting at `offset`.
  pub fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>, BufferError> {
    let mut out = vec![0; len];
    self.read_into(offset, &mut out)?;
    Ok(out)
  }

  pub fn read_into(&self, offset: usize, out: &mut [u8]) -> Result<(), BufferError> {
    let ptr = self.readable()?;
    check_range(offset, out.len(), self.size())?;

    unsafe { ptr::copy_nonoverlapping(ptr.add(offset), out.as_mut_ptr(), out.len()) };

    Ok(())
  }

  /// Read a value stored at `offset`; no alignment is required.
  pub fn get_value<T>(&self, offset: usize) -> Result<T, BufferError>
  where
    T: Pod,
  {
    let bytes = self.read(offset, mem::size_of::<T>())?;
    Ok(bytemuck::pod_read_unaligned(&bytes))
  }

  /// Write `data` starting at `offset`.
  pub fn set(&self, data: &[u8], offset: usize) -> Result<(), BufferError> {
    let ptr = self.writable()?;
    check_range(offset, data.len(), self.size())?;

    unsafe { ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset), data.len()) };

    Ok(())
  }

  pub fn set_value<T>(&self, value: &T, offset: usize) -> Result<(), BufferError>
  where
    T: Pod,
  {
    self.set(bytemuck::bytes_of(value), offset)
  }

  /// Unmap now; every handle to this view becomes invalid.
  pub fn invalidate(&self) {
    self.view.invalidate();
  }

  fn readable(&self) -> Result<*mut u8, BufferError> {
    let ptr = self.view.ptr()?;

    if self.access().can_read() {
      Ok(ptr)
    } else {
      let err = BufferError::access_violation(self.access());
      log::error!("{}", err);
      Err(err)
    }
  }

  fn writable(&self) -> Result<*mut u8, BufferError> {
    let ptr = self.view.ptr()?;

    if self.access().can_write() {
      Ok(ptr)
    } else {
      let err = BufferError::access_violation(self.access());
      log::error!("{}", err);
      Err(err)
    }
  }
}

/// Buffer of vertices laid out as described by a [`BufferLayout`].
#[derive(Debug)]
pub struct VertexBuffer {
  buffer: BufferObject,
  layout: BufferLayout,
}

impl VertexBuffer {
  pub fn new<T>(
    gl: &GlFunctions,
    usage: BufferUsage,
    vertices: &[T],
    layout: BufferLayout,
  ) -> Result<Self, BufferError>
  where
    T: Pod,
  {
    let buffer =
      BufferObject::with_data(gl, BufferKind::Vertex, usage, bytemuck::cast_slice(vertices))?;
    Ok(VertexBuffer { buffer, layout })
  }

  /// Vertex buffer with zeroed storage for `size` bytes.
  pub fn with_size(
    gl: &GlFunctions,
    usage: BufferUsage,
    size: usize,
    layout: BufferLayout,
  ) -> Result<Self, BufferError> {
    let buffer = BufferObject::with_size(gl, BufferKind::Vertex, usage, size)?;
    Ok(VertexBuffer { buffer, layout })
  }

  pub fn layout(&self) -> &BufferLayout {
    &self.layout
  }

  pub fn set_layout(&mut self, layout: BufferLayout) {
    self.layout = layout;
  }

  /// Number of whole vertices in the storage.
  pub fn vertex_count(&self) -> usize {
    match self.layout.stride() {
      0 => 0,
      stride => self.buffer.size() / stride,
    }
  }
}

impl Deref for VertexBuffer {
  type Target = BufferObject;

  fn deref(&self) -> &Self::Target {
    &self.buffer
  }
}

impl DerefMut for VertexBuffer {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.buffer
  }
}

/// Buffer of `u32` indices.
#[derive(Debug)]
pub struct IndexBuffer {
  buffer: BufferObject,
}

impl IndexBuffer {
  pub fn new(gl: &GlFunctions, usage: BufferUsage, indices: &[u32]) -> Result<Self, BufferError> {
    let buffer =
      BufferObject::with_data(gl, BufferKind::Index, usage, bytemuck::cast_slice(indices))?;
    Ok(IndexBuffer { buffer })
  }

  /// Replace every index.
  pub fn set_indices(&mut self, usage: BufferUsage, indices: &[u32]) -> Result<(), BufferError> {
    let bytes = bytemuck::cast_slice(indices);
    self.buffer.data(usage, bytes.len(), Some(bytes))
  }

  pub fn count(&self) -> usize {
    self.buffer.size() / mem::size_of::<u32>()
  }

  /// Driver type of the indices.
  pub fn index_type(&self) -> GLenum {
    gl::UNSIGNED_INT
  }
}

impl Deref for IndexBuffer {
  type Target = BufferObject;

  fn deref(&self) -> &Self::Target {
    &self.buffer
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::headless;
  use std::thread;

  #[test]
  fn mapped_view_round_trips_bytes() {
    let (gl, _) = headless();
    let buffer =
      BufferObject::with_size(&gl, BufferKind::Vertex, BufferUsage::DynamicDraw, 16).unwrap();

    {
      let content = buffer.content(Access::WriteOnly).unwrap();
      content.set(&[1, 2, 3, 4], 12).unwrap();
      content.set_value(&0xdead_beef_u32, 3).unwrap();
    }

    let content = buffer.content(Access::ReadOnly).unwrap();
    assert_eq!(content.read(12, 4).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(content.get_value::<u32>(3).unwrap(), 0xdead_beef);
    assert_eq!(content.get().unwrap().len(), 16);
  }

  #[test]
  fn at_most_one_view_per_buffer() {
    let (gl, driver) = headless();
    let buffer =
      BufferObject::with_size(&gl, BufferKind::Uniform, BufferUsage::DynamicDraw, 8).unwrap();

    let a = buffer.content(Access::ReadWrite).unwrap();
    let b = buffer.content(Access::ReadWrite).unwrap();
    let c = buffer.content(Access::ReadOnly).unwrap();

    assert!(a.is_same_view(&b));
    assert!(a.is_same_view(&c));
    assert_eq!(c.access(), Access::ReadWrite);
    assert_eq!(driver.calls("glMapBuffer"), 1);

    drop((a, b));
    assert!(driver.is_buffer_mapped(buffer.handle()));

    drop(c);
    assert!(!driver.is_buffer_mapped(buffer.handle()));
    assert_eq!(driver.calls("glUnmapBuffer"), 1);
  }

  #[test]
  fn access_modes_are_enforced() {
    let (gl, _) = headless();
    let buffer =
      BufferObject::with_size(&gl, BufferKind::Vertex, BufferUsage::StaticDraw, 4).unwrap();

    let view = buffer.content(Access::ReadOnly).unwrap();
    assert_eq!(
      view.set(&[0], 0),
      Err(BufferError::access_violation(Access::ReadOnly))
    );
    drop(view);

    let view = buffer.content(Access::WriteOnly).unwrap();
    assert_eq!(
      view.get(),
      Err(BufferError::access_violation(Access::WriteOnly))
    );
    assert_eq!(view.set(&[0, 0], 3), Err(BufferError::out_of_range(3, 2, 4)));
  }

  #[test]
  fn empty_buffer_cannot_be_mapped() {
    let (gl, driver) = headless();
    let buffer = BufferObject::new(&gl, BufferKind::Vertex, BufferUsage::StaticDraw).unwrap();

    assert_eq!(
      buffer.content(Access::ReadOnly).unwrap_err(),
      BufferError::EmptyBuffer
    );
    assert_eq!(driver.calls("glMapBuffer"), 0);
  }

  #[test]
  fn sub_data_checks_range() {
    let (gl, driver) = headless();
    let buffer =
      BufferObject::with_data(&gl, BufferKind::Vertex, BufferUsage::StaticDraw, &[0; 8]).unwrap();

    buffer.sub_data(4, &[7; 4]).unwrap();
    assert_eq!(
      buffer.sub_data(5, &[7; 4]),
      Err(BufferError::out_of_range(5, 4, 8))
    );
    assert_eq!(
      buffer.sub_data(usize::MAX, &[7]),
      Err(BufferError::out_of_range(usize::MAX, 1, 8))
    );

    assert_eq!(driver.calls("glBufferSubData"), 1);
    assert_eq!(buffer.read(0, 8).unwrap(), vec![0, 0, 0, 0, 7, 7, 7, 7]);
  }

  #[test]
  fn sub_data_is_refused_while_mapped() {
    let (gl, _) = headless();
    let buffer =
      BufferObject::with_size(&gl, BufferKind::Vertex, BufferUsage::StaticDraw, 4).unwrap();

    let _view = buffer.content(Access::ReadOnly).unwrap();
    assert_eq!(buffer.sub_data(0, &[1]), Err(BufferError::Mapped));
  }

  #[test]
  fn reallocation_invalidates_the_view() {
    let (gl, driver) = headless();
    let mut buffer =
      BufferObject::with_size(&gl, BufferKind::Vertex, BufferUsage::StaticDraw, 4).unwrap();

    let view = buffer.content(Access::ReadWrite).unwrap();
    buffer.data(BufferUsage::DynamicDraw, 32, None).unwrap();

    assert!(!view.is_valid());
    assert_eq!(view.get(), Err(BufferError::Invalidated));
    assert_eq!(buffer.size(), 32);
    assert_eq!(driver.calls("glUnmapBuffer"), 1);

    // dropping the stale view doesn’t unmap again
    drop(view);
    assert_eq!(driver.calls("glUnmapBuffer"), 1);
  }

  #[test]
  fn view_outliving_its_buffer_is_invalidated() {
    let (gl, driver) = headless();
    let buffer =
      BufferObject::with_size(&gl, BufferKind::Vertex, BufferUsage::StaticDraw, 4).unwrap();
    let handle = buffer.handle();

    let view = buffer.content(Access::ReadWrite).unwrap();
    drop(buffer);

    assert!(!driver.is_buffer(handle));
    assert_eq!(view.set(&[1], 0), Err(BufferError::Invalidated));
  }

  #[test]
  fn data_requires_matching_size() {
    let (gl, _) = headless();
    let mut buffer = BufferObject::new(&gl, BufferKind::Vertex, BufferUsage::StaticDraw).unwrap();

    assert_eq!(
      buffer.data(BufferUsage::StaticDraw, 8, Some(&[0; 4])),
      Err(BufferError::size_mismatch(8, 4))
    );
  }

  #[test]
  fn non_owning_buffers_are_not_deleted() {
    let (gl, driver) = headless();
    let handle = gl.gen_buffer().unwrap();

    drop(BufferObject::from_raw(&gl, handle, BufferKind::Vertex, 0));
    drop(BufferObject::null(&gl, BufferKind::Index));

    assert!(driver.is_buffer(handle));
    assert_eq!(driver.calls("glDeleteBuffers"), 0);
  }

  #[test]
  fn null_buffer_has_no_storage() {
    let (gl, _) = headless();
    let mut null = BufferObject::null(&gl, BufferKind::Uniform);

    assert_eq!(
      null.data(BufferUsage::StaticDraw, 4, None),
      Err(BufferError::NullBuffer)
    );
    assert_eq!(
      null.content(Access::ReadOnly).unwrap_err(),
      BufferError::EmptyBuffer
    );
  }

  #[test]
  fn deletion_is_refused_where_the_context_is_not_current() {
    let (gl, driver) = headless();
    let handle = gl.gen_buffer().unwrap();
    let remote = gl.clone();

    let refused = thread::spawn(move || remote.delete_buffer(handle).is_err())
      .join()
      .expect("thread");

    assert!(refused);
    assert!(driver.is_buffer(handle));
  }

  #[test]
  fn typed_buffers() {
    let (gl, _) = headless();
    let indices = IndexBuffer::new(&gl, BufferUsage::StaticDraw, &[0, 1, 2, 2, 3, 0]).unwrap();

    assert_eq!(indices.count(), 6);
    assert_eq!(indices.kind(), BufferKind::Index);
    assert_eq!(indices.index_type(), gl::UNSIGNED_INT);
  }
}
