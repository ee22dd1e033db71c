//! Graphics state cache.
//!
//! One [`GraphicsStateCache`] lives in every [`Context`](crate::context::Context) and is shared by
//! every [`GlFunctions`](crate::functions::GlFunctions) taken from it. It mirrors the pieces of
//! driver state the engine changes often (capabilities, blending, clear color, winding, culling,
//! stencil, viewport and object bindings) so that redundant driver calls can be skipped and reads
//! don’t need a driver round-trip.
//!
//! The cache only knows what went through the dispatch table. Driver calls issued by foreign code
//! make it stale; call
//! [`GlFunctions::invalidate_cache`](crate::functions::GlFunctions::invalidate_cache) after such
//! calls.

use crate::blending::BlendMode;
use crate::capability::Capability;
use crate::depth_stencil::{Comparison, StencilTest};
use crate::face_culling::{FrontFace, PolygonFacing};
use gl::types::*;
use std::collections::HashMap;

// minimal values guaranteed by OpenGL 3.3
const MAX_TEXTURE_UNITS: u32 = 48;
const MAX_UNIFORM_BUFFER_BINDINGS: u32 = 36;

/// Cached value.
///
/// Prevents issuing a driver command when the driver is known to already hold the value. An
/// invalidated value keeps its last known content for reads but forces the next update through.
#[derive(Debug)]
pub(crate) struct Cached<T> {
  value: T,
  dirty: bool,
}

impl<T> Cached<T>
where
  T: Clone + PartialEq,
{
  fn new(value: T) -> Self {
    Cached {
      value,
      dirty: false,
    }
  }

  fn invalidate(&mut self) {
    self.dirty = true;
  }

  /// Store `value`; returns whether the driver must be told.
  pub(crate) fn update(&mut self, value: T) -> bool {
    if self.dirty || self.value != value {
      self.value = value;
      self.dirty = false;
      true
    } else {
      false
    }
  }

  pub(crate) fn get(&self) -> T {
    self.value.clone()
  }
}

/// Free lists of texture units and uniform buffer binding points.
#[derive(Debug)]
pub(crate) struct BindingStack {
  next_texture_unit: u32,
  free_texture_units: Vec<u32>,
  next_buffer_binding: u32,
  free_buffer_bindings: Vec<u32>,
}

impl BindingStack {
  fn new() -> Self {
    BindingStack {
      next_texture_unit: 0,
      free_texture_units: Vec::new(),
      next_buffer_binding: 0,
      free_buffer_bindings: Vec::new(),
    }
  }

  pub(crate) fn reserve_texture_unit(&mut self) -> Option<u32> {
    self.free_texture_units.pop().or_else(|| {
      let unit = self.next_texture_unit;

      if unit < MAX_TEXTURE_UNITS {
        self.next_texture_unit += 1;
        Some(unit)
      } else {
        None
      }
    })
  }

  pub(crate) fn release_texture_unit(&mut self, unit: u32) {
    self.free_texture_units.push(unit);
  }

  pub(crate) fn reserve_buffer_binding(&mut self) -> Option<u32> {
    self.free_buffer_bindings.pop().or_else(|| {
      let binding = self.next_buffer_binding;

      if binding < MAX_UNIFORM_BUFFER_BINDINGS {
        self.next_buffer_binding += 1;
        Some(binding)
      } else {
        None
      }
    })
  }

  pub(crate) fn release_buffer_binding(&mut self, binding: u32) {
    self.free_buffer_bindings.push(binding);
  }

  fn in_use(&self) -> (usize, usize) {
    (
      (self.next_texture_unit as usize) - self.free_texture_units.len(),
      (self.next_buffer_binding as usize) - self.free_buffer_bindings.len(),
    )
  }
}

/// Cached driver state of a context.
#[derive(Debug)]
pub struct GraphicsStateCache {
  pub(crate) binding_stack: BindingStack,

  // filled lazily: a capability is only known once queried or set
  pub(crate) capabilities: HashMap<Capability, bool>,

  pub(crate) blend_mode: Cached<BlendMode>,
  pub(crate) clear_color: Cached<[GLfloat; 4]>,
  pub(crate) front_face: Cached<FrontFace>,
  pub(crate) polygon_facing: Cached<PolygonFacing>,
  pub(crate) stencil_test: Cached<StencilTest>,
  pub(crate) depth_comparison: Cached<Comparison>,
  pub(crate) viewport: Cached<[GLint; 4]>,
  pub(crate) unpack_alignment: Cached<GLint>,
  pub(crate) pack_alignment: Cached<GLint>,

  pub(crate) active_texture_unit: Cached<u32>,
  // texture unit -> (target, handle)
  pub(crate) bound_textures: HashMap<u32, (GLenum, GLuint)>,
  pub(crate) bound_buffers: HashMap<GLenum, GLuint>,
  // (target, binding index) -> handle
  pub(crate) bound_indexed_buffers: HashMap<(GLenum, u32), GLuint>,
  pub(crate) program: Cached<GLuint>,
  pub(crate) draw_framebuffer: Cached<GLuint>,
  pub(crate) read_framebuffer: Cached<GLuint>,
  pub(crate) vertex_array: Cached<GLuint>,
  pub(crate) renderbuffer: Cached<GLuint>,
}

impl GraphicsStateCache {
  /// State of a freshly created context.
  pub(crate) fn new() -> Self {
    GraphicsStateCache {
      binding_stack: BindingStack::new(),
      capabilities: HashMap::new(),
      blend_mode: Cached::new(BlendMode::default()),
      clear_color: Cached::new([0.; 4]),
      front_face: Cached::new(FrontFace::default()),
      polygon_facing: Cached::new(PolygonFacing::default()),
      stencil_test: Cached::new(StencilTest::default()),
      depth_comparison: Cached::new(Comparison::Less),
      viewport: Cached::new([0; 4]),
      unpack_alignment: Cached::new(4),
      pack_alignment: Cached::new(4),
      active_texture_unit: Cached::new(0),
      bound_textures: HashMap::new(),
      bound_buffers: HashMap::new(),
      bound_indexed_buffers: HashMap::new(),
      program: Cached::new(0),
      draw_framebuffer: Cached::new(0),
      read_framebuffer: Cached::new(0),
      vertex_array: Cached::new(0),
      renderbuffer: Cached::new(0),
    }
  }

  /// Cached state of a capability; `None` if it was never queried nor set.
  pub fn capability(&self, cap: Capability) -> Option<bool> {
    self.capabilities.get(&cap).copied()
  }

  pub fn blend_mode(&self) -> BlendMode {
    self.blend_mode.get()
  }

  pub fn clear_color(&self) -> [GLfloat; 4] {
    self.clear_color.get()
  }

  pub fn front_face(&self) -> FrontFace {
    self.front_face.get()
  }

  pub fn polygon_facing(&self) -> PolygonFacing {
    self.polygon_facing.get()
  }

  pub fn stencil_test(&self) -> StencilTest {
    self.stencil_test.get()
  }

  pub fn depth_comparison(&self) -> Comparison {
    self.depth_comparison.get()
  }

  pub fn viewport(&self) -> [GLint; 4] {
    self.viewport.get()
  }

  pub fn active_texture_unit(&self) -> u32 {
    self.active_texture_unit.get()
  }

  /// Texture bound to a unit, with its target.
  pub fn bound_texture(&self, unit: u32) -> Option<(GLenum, GLuint)> {
    self.bound_textures.get(&unit).copied()
  }

  pub fn bound_buffer(&self, target: GLenum) -> GLuint {
    self.bound_buffers.get(&target).copied().unwrap_or(0)
  }

  pub fn bound_program(&self) -> GLuint {
    self.program.get()
  }

  pub fn bound_draw_framebuffer(&self) -> GLuint {
    self.draw_framebuffer.get()
  }

  pub fn bound_vertex_array(&self) -> GLuint {
    self.vertex_array.get()
  }

  /// Number of texture units and uniform buffer binding points currently reserved.
  pub fn reserved_bindings(&self) -> (usize, usize) {
    self.binding_stack.in_use()
  }

  /// Forget everything known about the driver state.
  ///
  /// Values are kept for reads, but the next update of each one reaches the driver, and capability
  /// states are queried again.
  pub(crate) fn invalidate(&mut self) {
    self.capabilities.clear();
    self.blend_mode.invalidate();
    self.clear_color.invalidate();
    self.front_face.invalidate();
    self.polygon_facing.invalidate();
    self.stencil_test.invalidate();
    self.depth_comparison.invalidate();
    self.viewport.invalidate();
    self.unpack_alignment.invalidate();
    self.pack_alignment.invalidate();
    self.active_texture_unit.invalidate();
    self.bound_textures.clear();
    self.bound_buffers.clear();
    self.bound_indexed_buffers.clear();
    self.program.invalidate();
    self.draw_framebuffer.invalidate();
    self.read_framebuffer.invalidate();
    self.vertex_array.invalidate();
    self.renderbuffer.invalidate();
  }

  // Drop every cached binding of a deleted object.

  pub(crate) fn forget_buffer(&mut self, handle: GLuint) {
    self.bound_buffers.retain(|_, h| *h != handle);
    self.bound_indexed_buffers.retain(|_, h| *h != handle);
  }

  pub(crate) fn forget_texture(&mut self, handle: GLuint) {
    self.bound_textures.retain(|_, (_, h)| *h != handle);
  }

  pub(crate) fn forget_program(&mut self, handle: GLuint) {
    if self.program.get() == handle {
      self.program.update(0);
    }
  }

  pub(crate) fn forget_framebuffer(&mut self, handle: GLuint) {
    if self.draw_framebuffer.get() == handle {
      self.draw_framebuffer.update(0);
    }

    if self.read_framebuffer.get() == handle {
      self.read_framebuffer.update(0);
    }
  }

  pub(crate) fn forget_vertex_array(&mut self, handle: GLuint) {
    if self.vertex_array.get() == handle {
      self.vertex_array.update(0);
    }
  }

  pub(crate) fn forget_renderbuffer(&mut self, handle: GLuint) {
    if self.renderbuffer.get() == handle {
      self.renderbuffer.update(0);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cached_update_reports_changes() {
    let mut cached = Cached::new(3);

    assert!(!cached.update(3));
    assert!(cached.update(4));
    assert_eq!(cached.get(), 4);

    cached.invalidate();
    assert_eq!(cached.get(), 4);
    assert!(cached.update(4));
    assert!(!cached.update(4));
  }

  #[test]
  fn binding_stack_recycles_released_units() {
    let mut stack = BindingStack::new();

    let a = stack.reserve_texture_unit();
    let b = stack.reserve_texture_unit();
    assert_eq!((a, b), (Some(0), Some(1)));

    stack.release_texture_unit(0);
    assert_eq!(stack.reserve_texture_unit(), Some(0));
    assert_eq!(stack.reserve_texture_unit(), Some(2));
    assert_eq!(stack.in_use(), (3, 0));
  }

  #[test]
  fn binding_stack_is_bounded() {
    let mut stack = BindingStack::new();

    for _ in 0..MAX_UNIFORM_BUFFER_BINDINGS {
      assert!(stack.reserve_buffer_binding().is_some());
    }

    assert_eq!(stack.reserve_buffer_binding(), None);

    stack.release_buffer_binding(7);
    assert_eq!(stack.reserve_buffer_binding(), Some(7));
  }

  #[test]
  fn forgetting_deleted_objects() {
    let mut state = GraphicsStateCache::new();

    state.bound_buffers.insert(gl::ARRAY_BUFFER, 3);
    state.bound_buffers.insert(gl::UNIFORM_BUFFER, 4);
    state.program.update(9);

    state.forget_buffer(3);
    state.forget_program(9);

    assert_eq!(state.bound_buffer(gl::ARRAY_BUFFER), 0);
    assert_eq!(state.bound_buffer(gl::UNIFORM_BUFFER), 4);
    assert_eq!(state.bound_program(), 0);
  }
}
