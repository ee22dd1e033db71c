//! Uniform buffers with a CPU-side shadow copy.
//!
//! Values are composed in the shadow first; [`UniformBuffer::flush`] then sends every modified
//! range to the GPU, one sub-data call per range. Ranges that touch or overlap are merged.

use crate::buffer::{BufferError, BufferKind, BufferObject, BufferUsage};
use crate::functions::GlFunctions;
use bytemuck::Pod;
use std::mem;
use std::ops::Range;

/// Uniform buffer.
#[derive(Debug)]
pub struct UniformBuffer {
  buffer: BufferObject,
  shadow: Vec<u8>,
  dirty: Vec<Range<usize>>,
}

impl UniformBuffer {
  /// Uniform buffer of `size` zeroed bytes.
  pub fn new(gl: &GlFunctions, size: usize, usage: BufferUsage) -> Result<Self, BufferError> {
    let buffer = BufferObject::with_size(gl, BufferKind::Uniform, usage, size)?;

    Ok(UniformBuffer {
      buffer,
      shadow: vec![0; size],
      dirty: Vec::new(),
    })
  }

  pub fn buffer(&self) -> &BufferObject {
    &self.buffer
  }

  pub fn size(&self) -> usize {
    self.shadow.len()
  }

  /// Write a value at `offset` in the shadow copy.
  pub fn set<T>(&mut self, value: &T, offset: usize) -> Result<(), BufferError>
  where
    T: Pod,
  {
    self.set_bytes(bytemuck::bytes_of(value), offset)
  }

  pub fn set_bytes(&mut self, bytes: &[u8], offset: usize) -> Result<(), BufferError> {
    let end = self.checked_end(offset, bytes.len())?;

    self.shadow[offset..end].copy_from_slice(bytes);
    self.mark_dirty(offset..end);

    Ok(())
  }

  /// Read a value at `offset` from the shadow copy.
  pub fn get<T>(&self, offset: usize) -> Result<T, BufferError>
  where
    T: Pod,
  {
    let end = self.checked_end(offset, mem::size_of::<T>())?;
    Ok(bytemuck::pod_read_unaligned(&self.shadow[offset..end]))
  }

  /// Ranges written since the last flush.
  pub fn dirty_ranges(&self) -> &[Range<usize>] {
    &self.dirty
  }

  /// Send the modified ranges to the GPU; returns how many uploads were issued.
  ///
  /// On error, the ranges not sent yet stay dirty.
  pub fn flush(&mut self) -> Result<usize, BufferError> {
    let mut sent = 0;

    while let Some(range) = self.dirty.first().cloned() {
      self
        .buffer
        .sub_data(range.start, &self.shadow[range.clone()])?;
      self.dirty.remove(0);
      sent += 1;
    }

    Ok(sent)
  }

  /// Bind the GPU buffer to a uniform buffer binding point.
  pub fn bind_base(&self, index: u32) -> Result<(), BufferError> {
    self
      .buffer
      .gl()
      .bind_buffer_base(gl::UNIFORM_BUFFER, index, self.buffer.handle())?;
    Ok(())
  }

  fn checked_end(&self, offset: usize, len: usize) -> Result<usize, BufferError> {
    match offset.checked_add(len) {
      Some(end) if end <= self.shadow.len() => Ok(end),
      _ => {
        let err = BufferError::out_of_range(offset, len, self.shadow.len());
        log::error!("{}", err);
        Err(err)
      }
    }
  }

  // keep the list sorted and merge ranges that overlap or touch
  fn mark_dirty(&mut self, range: Range<usize>) {
    if range.is_empty() {
      return;
    }

    let mut merged = range;
    let mut kept = Vec::with_capacity(self.dirty.len() + 1);

    for r in self.dirty.drain(..) {
      if r.end < merged.start || merged.end < r.start {
        kept.push(r);
      } else {
        merged = merged.start.min(r.start)..merged.end.max(r.end);
      }
    }

    let at = kept
      .iter()
      .position(|r| r.start > merged.start)
      .unwrap_or(kept.len());
    kept.insert(at, merged);

    self.dirty = kept;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::headless;
  use glam::{Mat4, Vec3};

  #[test]
  fn values_round_trip_through_the_shadow() {
    let (gl, _) = headless();
    let mut ubo = UniformBuffer::new(&gl, 80, BufferUsage::DynamicDraw).unwrap();
    let m = Mat4::from_translation(Vec3::new(1., 2., 3.));

    ubo.set(&m, 0).unwrap();
    ubo.set(&Vec3::new(4., 5., 6.), 64).unwrap();

    assert_eq!(ubo.get::<Mat4>(0).unwrap(), m);
    assert_eq!(ubo.get::<Vec3>(64).unwrap(), Vec3::new(4., 5., 6.));
  }

  #[test]
  fn adjacent_writes_are_flushed_once() {
    let (gl, driver) = headless();
    let mut ubo = UniformBuffer::new(&gl, 80, BufferUsage::DynamicDraw).unwrap();

    ubo.set(&Mat4::IDENTITY, 0).unwrap();
    ubo.set(&Vec3::ONE, 64).unwrap();
    assert_eq!(ubo.dirty_ranges(), &[0..76]);

    driver.reset_calls();
    assert_eq!(ubo.flush(), Ok(1));
    assert_eq!(driver.calls("glBufferSubData"), 1);
    assert!(ubo.dirty_ranges().is_empty());

    let bytes = driver.buffer_bytes(ubo.buffer().handle()).unwrap();
    assert_eq!(&bytes[64..76], bytemuck::bytes_of(&Vec3::ONE));
  }

  #[test]
  fn disjoint_writes_are_flushed_separately() {
    let (gl, driver) = headless();
    let mut ubo = UniformBuffer::new(&gl, 64, BufferUsage::DynamicDraw).unwrap();

    ubo.set(&1.0f32, 48).unwrap();
    ubo.set(&2.0f32, 0).unwrap();
    ubo.set(&3.0f32, 2).unwrap();

    assert_eq!(ubo.dirty_ranges(), &[0..6, 48..52]);

    driver.reset_calls();
    assert_eq!(ubo.flush(), Ok(2));
    assert_eq!(driver.calls("glBufferSubData"), 2);
    assert_eq!(ubo.flush(), Ok(0));
  }

  #[test]
  fn writes_past_the_end_are_refused() {
    let (gl, _) = headless();
    let mut ubo = UniformBuffer::new(&gl, 16, BufferUsage::DynamicDraw).unwrap();

    assert_eq!(
      ubo.set(&Vec3::ZERO, 8),
      Err(BufferError::out_of_range(8, 12, 16))
    );
    assert!(ubo.dirty_ranges().is_empty());
    assert!(ubo.get::<Mat4>(0).is_err());
  }

  #[test]
  fn binding_to_an_indexed_point() {
    let (gl, driver) = headless();
    let ubo = UniformBuffer::new(&gl, 16, BufferUsage::DynamicDraw).unwrap();

    ubo.bind_base(2).unwrap();
    assert_eq!(
      driver.indexed_buffer(gl::UNIFORM_BUFFER, 2),
      ubo.buffer().handle()
    );
  }
}
