//! 2D textures.
//!
//! A [`Texture`] is created empty: [`Texture::new`] only generates the GPU object, and storage is
//! allocated later with [`Texture::create`], once dimensions are known. Partial updates with
//! [`Texture::update`] are bounds-checked against the level being written before any driver call.
//!
//! The driver limits ([`max_size`], [`max_lod`]) are asked once per process.

use crate::context::ContextError;
use crate::functions::{Bind, GlFunctions};
use crate::loader::Image;
use crate::pixel::PixelFormat;
use crate::property::{PropertyRegistry, PropertyValue};
use gl::types::*;
use std::error;
use std::fmt;
use std::sync::OnceLock;

static MAX_SIZE: OnceLock<u32> = OnceLock::new();
static MAX_LOD: OnceLock<f32> = OnceLock::new();

/// Largest texture dimension supported by the driver.
pub fn max_size(gl: &GlFunctions) -> Result<u32, ContextError> {
  if let Some(&size) = MAX_SIZE.get() {
    return Ok(size);
  }

  let size = gl.get_integer(gl::MAX_TEXTURE_SIZE)?.max(0) as u32;
  Ok(*MAX_SIZE.get_or_init(|| size))
}

/// Largest level-of-detail bias supported by the driver.
pub fn max_lod(gl: &GlFunctions) -> Result<f32, ContextError> {
  if let Some(&lod) = MAX_LOD.get() {
    return Ok(lod);
  }

  let lod = gl.get_float(gl::MAX_TEXTURE_LOD_BIAS)?;
  Ok(*MAX_LOD.get_or_init(|| lod))
}

/// How to wrap texture coordinates outside of `[0; 1]`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Wrap {
  ClampToEdge,
  Repeat,
  MirroredRepeat,
  ClampToBorder,
}

impl Wrap {
  fn to_glenum(self) -> GLenum {
    match self {
      Wrap::ClampToEdge => gl::CLAMP_TO_EDGE,
      Wrap::Repeat => gl::REPEAT,
      Wrap::MirroredRepeat => gl::MIRRORED_REPEAT,
      Wrap::ClampToBorder => gl::CLAMP_TO_BORDER,
    }
  }
}

/// Minification filter.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MinFilter {
  Nearest,
  Linear,
  NearestMipmapNearest,
  NearestMipmapLinear,
  LinearMipmapNearest,
  LinearMipmapLinear,
}

impl MinFilter {
  fn to_glenum(self) -> GLenum {
    match self {
      MinFilter::Nearest => gl::NEAREST,
      MinFilter::Linear => gl::LINEAR,
      MinFilter::NearestMipmapNearest => gl::NEAREST_MIPMAP_NEAREST,
      MinFilter::NearestMipmapLinear => gl::NEAREST_MIPMAP_LINEAR,
      MinFilter::LinearMipmapNearest => gl::LINEAR_MIPMAP_NEAREST,
      MinFilter::LinearMipmapLinear => gl::LINEAR_MIPMAP_LINEAR,
    }
  }
}

/// Magnification filter.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MagFilter {
  Nearest,
  Linear,
}

impl MagFilter {
  fn to_glenum(self) -> GLenum {
    match self {
      MagFilter::Nearest => gl::NEAREST,
      MagFilter::Linear => gl::LINEAR,
    }
  }
}

/// How a texture is sampled.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Sampler {
  pub wrap_s: Wrap,
  pub wrap_t: Wrap,
  pub wrap_r: Wrap,
  pub min_filter: MinFilter,
  pub mag_filter: MagFilter,
}

/// Clamp to edge, linear filtering.
impl Default for Sampler {
  fn default() -> Self {
    Sampler {
      wrap_s: Wrap::ClampToEdge,
      wrap_t: Wrap::ClampToEdge,
      wrap_r: Wrap::ClampToEdge,
      min_filter: MinFilter::Linear,
      mag_filter: MagFilter::Linear,
    }
  }
}

impl Sampler {
  pub fn with_wrap(self, wrap: Wrap) -> Self {
    Sampler {
      wrap_s: wrap,
      wrap_t: wrap,
      wrap_r: wrap,
      ..self
    }
  }

  pub fn with_filters(self, min_filter: MinFilter, mag_filter: MagFilter) -> Self {
    Sampler {
      min_filter,
      mag_filter,
      ..self
    }
  }
}

/// Errors that might happen when working with textures.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TextureError {
  Context(ContextError),
  /// A dimension is zero.
  InvalidSize { size: [u32; 2] },
  /// A dimension exceeds the driver limit.
  TooLarge { size: [u32; 2], max: u32 },
  /// The texture has no storage yet.
  NotCreated,
  /// The mip-level doesn’t exist.
  InvalidLevel { level: usize, levels: usize },
  /// The updated region doesn’t fit in the level.
  OutOfRange {
    offset: [u32; 2],
    size: [u32; 2],
    extent: [u32; 2],
  },
  /// Fewer bytes than the region needs.
  NotEnoughPixels { expected: usize, provided: usize },
  /// The driver rejected the storage allocation.
  StorageCreationFailed(String),
}

impl TextureError {
  pub fn too_large(size: [u32; 2], max: u32) -> Self {
    TextureError::TooLarge { size, max }
  }

  pub fn invalid_level(level: usize, levels: usize) -> Self {
    TextureError::InvalidLevel { level, levels }
  }

  pub fn out_of_range(offset: [u32; 2], size: [u32; 2], extent: [u32; 2]) -> Self {
    TextureError::OutOfRange {
      offset,
      size,
      extent,
    }
  }

  pub fn not_enough_pixels(expected: usize, provided: usize) -> Self {
    TextureError::NotEnoughPixels { expected, provided }
  }

  pub fn storage_creation_failed(reason: impl Into<String>) -> Self {
    TextureError::StorageCreationFailed(reason.into())
  }
}

impl fmt::Display for TextureError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      TextureError::Context(ref e) => write!(f, "texture context error: {}", e),
      TextureError::InvalidSize { size } => {
        write!(f, "invalid texture size {}×{}", size[0], size[1])
      }
      TextureError::TooLarge { size, max } => write!(
        f,
        "texture size {}×{} exceeds the maximum of {}",
        size[0], size[1], max
      ),
      TextureError::NotCreated => f.write_str("texture has no storage"),
      TextureError::InvalidLevel { level, levels } => write!(
        f,
        "mip-level {} doesn’t exist (texture has {} levels)",
        level, levels
      ),
      TextureError::OutOfRange {
        offset,
        size,
        extent,
      } => write!(
        f,
        "texture region {}×{} at ({}, {}) exceeds the level size {}×{}",
        size[0], size[1], offset[0], offset[1], extent[0], extent[1]
      ),
      TextureError::NotEnoughPixels { expected, provided } => write!(
        f,
        "not enough pixels provided: expected {} bytes, provided {} bytes",
        expected, provided
      ),
      TextureError::StorageCreationFailed(ref e) => {
        write!(f, "texture storage creation failed: {}", e)
      }
    }
  }
}

impl error::Error for TextureError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      TextureError::Context(e) => Some(e),
      _ => None,
    }
  }
}

impl From<ContextError> for TextureError {
  fn from(e: ContextError) -> Self {
    TextureError::Context(e)
  }
}

/// Anything that can be bound on a texture unit.
pub trait TextureBinding {
  /// Bind target (`gl::TEXTURE_2D`, `gl::TEXTURE_CUBE_MAP`, …).
  fn target(&self) -> GLenum;

  fn handle(&self) -> GLuint;
}

/// Number of mip-levels used when none is asked for.
pub fn default_levels(size: [u32; 2]) -> usize {
  let max = size[0].max(size[1]).max(1);
  (max.ilog2() as usize).max(1)
}

/// Size of a mip-level.
pub fn level_size(size: [u32; 2], level: usize) -> [u32; 2] {
  let shift = |x: u32| x.checked_shr(level as u32).unwrap_or(0).max(1);
  [shift(size[0]), shift(size[1])]
}

// row alignment for tightly packed pixels, given the number of bytes of a row
fn row_alignment(width: u32, format: PixelFormat) -> GLint {
  match (width as usize * format.bytes_per_pixel()) % 8 {
    0 => 8,
    4 => 4,
    2 | 6 => 2,
    _ => 1,
  }
}

/// GPU texture.
#[derive(Debug)]
pub struct Texture {
  gl: GlFunctions,
  handle: GLuint,
  target: GLenum,
  size: [u32; 2],
  format: PixelFormat,
  sampler: Sampler,
  levels: usize,
  mipmaps_generated: bool,
}

impl Texture {
  /// Create a 2D texture without storage.
  pub fn new(gl: &GlFunctions, sampler: Sampler) -> Result<Self, TextureError> {
    Self::with_target(gl, gl::TEXTURE_2D, sampler)
  }

  pub(crate) fn with_target(
    gl: &GlFunctions,
    target: GLenum,
    sampler: Sampler,
  ) -> Result<Self, TextureError> {
    let handle = gl.gen_texture()?;
    gl.bind_texture(target, handle, Bind::Cached)?;
    log::trace!("created texture {}", handle);

    let texture = Texture {
      gl: gl.clone(),
      handle,
      target,
      size: [0, 0],
      format: PixelFormat::RGBA8,
      sampler,
      levels: 0,
      mipmaps_generated: false,
    };

    texture.apply_sampler()?;

    Ok(texture)
  }

  /// Create a texture holding a decoded image.
  ///
  /// All mip-levels are allocated and generated from the image.
  pub fn from_image(
    gl: &GlFunctions,
    image: &Image,
    sampler: Sampler,
  ) -> Result<Self, TextureError> {
    let mut texture = Self::new(gl, sampler)?;

    texture.create(image.size(), None, image.format())?;
    texture.update(Some(image.pixels()), 0, image.size(), [0, 0])?;

    if texture.levels > 1 {
      texture.generate_mipmaps()?;
    }

    Ok(texture)
  }

  pub fn handle(&self) -> GLuint {
    self.handle
  }

  pub fn size(&self) -> [u32; 2] {
    self.size
  }

  pub fn width(&self) -> u32 {
    self.size[0]
  }

  pub fn height(&self) -> u32 {
    self.size[1]
  }

  pub fn format(&self) -> PixelFormat {
    self.format
  }

  pub fn sampler(&self) -> Sampler {
    self.sampler
  }

  /// Number of allocated mip-levels; `0` before [`Texture::create`].
  pub fn levels(&self) -> usize {
    self.levels
  }

  pub fn is_created(&self) -> bool {
    self.levels > 0
  }

  pub fn mipmaps_generated(&self) -> bool {
    self.mipmaps_generated
  }

  /// (Re)allocate storage.
  ///
  /// With `levels` set to `None`, `floor(log2(max(width, height)))` levels are allocated (at least
  /// one). The previous content is lost.
  pub fn create(
    &mut self,
    size: [u32; 2],
    levels: Option<usize>,
    format: PixelFormat,
  ) -> Result<(), TextureError> {
    if size[0] == 0 || size[1] == 0 {
      let err = TextureError::InvalidSize { size };
      log::error!("{}", err);
      return Err(err);
    }

    let max = max_size(&self.gl)?;
    if size[0] > max || size[1] > max {
      let err = TextureError::too_large(size, max);
      log::error!("{}", err);
      return Err(err);
    }

    let levels = levels.unwrap_or_else(|| default_levels(size)).max(1);
    let (fmt, internal, ty) = format.to_glenums();

    self.bind()?;
    self.gl.tex_parameter(self.target, gl::TEXTURE_BASE_LEVEL, 0)?;
    self
      .gl
      .tex_parameter(self.target, gl::TEXTURE_MAX_LEVEL, levels as GLint - 1)?;

    // drain errors issued before the allocation
    self.gl.get_error()?;

    for &image_target in self.image_targets() {
      for level in 0..levels {
        let [w, h] = level_size(size, level);
        self.gl.tex_image_2d(
          image_target,
          level as GLint,
          internal,
          [w as GLsizei, h as GLsizei],
          fmt,
          ty,
          None,
        )?;
      }
    }

    match self.gl.get_error()? {
      gl::NO_ERROR => (),
      code => {
        let err = TextureError::storage_creation_failed(format!("driver error 0x{:x}", code));
        log::error!("{}", err);
        return Err(err);
      }
    }

    self.size = size;
    self.levels = levels;
    self.format = format;
    self.mipmaps_generated = false;

    log::debug!(
      "allocated texture {}: {}×{} {:?}, {} levels",
      self.handle,
      size[0],
      size[1],
      format,
      levels
    );

    Ok(())
  }

  /// Upload pixels into a region of a mip-level.
  ///
  /// The region must lie within the level. Passing `None` as pixels only checks the region.
  pub fn update(
    &self,
    pixels: Option<&[u8]>,
    level: usize,
    size: [u32; 2],
    offset: [u32; 2],
  ) -> Result<(), TextureError> {
    self.update_image(self.target, pixels, level, size, offset)
  }

  pub(crate) fn update_image(
    &self,
    image_target: GLenum,
    pixels: Option<&[u8]>,
    level: usize,
    size: [u32; 2],
    offset: [u32; 2],
  ) -> Result<(), TextureError> {
    self.check_region(level, size, offset)?;

    let Some(pixels) = pixels else {
      return Ok(());
    };

    let expected = size[0] as usize * size[1] as usize * self.format.bytes_per_pixel();
    if pixels.len() < expected {
      let err = TextureError::not_enough_pixels(expected, pixels.len());
      log::error!("{}", err);
      return Err(err);
    }

    let (fmt, _, ty) = self.format.to_glenums();

    self.bind()?;
    self
      .gl
      .set_unpack_alignment(row_alignment(size[0], self.format))?;
    self.gl.tex_sub_image_2d(
      image_target,
      level as GLint,
      [offset[0] as GLint, offset[1] as GLint],
      [size[0] as GLsizei, size[1] as GLsizei],
      fmt,
      ty,
      &pixels[..expected],
    )?;

    Ok(())
  }

  fn check_region(
    &self,
    level: usize,
    size: [u32; 2],
    offset: [u32; 2],
  ) -> Result<(), TextureError> {
    if !self.is_created() {
      log::error!("texture {} updated before its storage is created", self.handle);
      return Err(TextureError::NotCreated);
    }

    if level >= self.levels {
      let err = TextureError::invalid_level(level, self.levels);
      log::error!("{}", err);
      return Err(err);
    }

    let extent = level_size(self.size, level);
    let fits = |axis: usize| {
      offset[axis]
        .checked_add(size[axis])
        .map_or(false, |end| end <= extent[axis])
    };

    if fits(0) && fits(1) {
      Ok(())
    } else {
      let err = TextureError::out_of_range(offset, size, extent);
      log::error!("{}", err);
      Err(err)
    }
  }

  /// Read back the pixels of a mip-level.
  pub fn get_pixels(&self, level: usize) -> Result<Vec<u8>, TextureError> {
    self.read_image(self.target, level)
  }

  pub(crate) fn read_image(
    &self,
    image_target: GLenum,
    level: usize,
  ) -> Result<Vec<u8>, TextureError> {
    if !self.is_created() {
      return Err(TextureError::NotCreated);
    }

    if level >= self.levels {
      return Err(TextureError::invalid_level(level, self.levels));
    }

    let [w, h] = level_size(self.size, level);
    let (fmt, _, ty) = self.format.to_glenums();
    let mut pixels = vec![0; w as usize * h as usize * self.format.bytes_per_pixel()];

    self.bind()?;
    self.gl.set_pack_alignment(row_alignment(w, self.format))?;
    self
      .gl
      .get_tex_image(image_target, level as GLint, fmt, ty, &mut pixels)?;

    Ok(pixels)
  }

  /// Change how the texture is sampled.
  pub fn set_sampler(&mut self, sampler: Sampler) -> Result<(), TextureError> {
    self.sampler = sampler;
    self.apply_sampler()
  }

  fn apply_sampler(&self) -> Result<(), TextureError> {
    let s = &self.sampler;

    self.bind()?;

    for (pname, param) in [
      (gl::TEXTURE_WRAP_S, s.wrap_s.to_glenum()),
      (gl::TEXTURE_WRAP_T, s.wrap_t.to_glenum()),
      (gl::TEXTURE_WRAP_R, s.wrap_r.to_glenum()),
      (gl::TEXTURE_MIN_FILTER, s.min_filter.to_glenum()),
      (gl::TEXTURE_MAG_FILTER, s.mag_filter.to_glenum()),
    ] {
      self.gl.tex_parameter(self.target, pname, param as GLint)?;
    }

    Ok(())
  }

  /// Fill every level past the base one from the base level.
  pub fn generate_mipmaps(&mut self) -> Result<(), TextureError> {
    if !self.is_created() {
      log::error!("cannot generate mip-maps of texture {}: no storage", self.handle);
      return Err(TextureError::NotCreated);
    }

    self.bind()?;
    self.gl.generate_mipmap(self.target)?;
    self.mipmaps_generated = true;

    Ok(())
  }

  fn bind(&self) -> Result<(), TextureError> {
    self.gl.bind_texture(self.target, self.handle, Bind::Cached)?;
    Ok(())
  }

  fn image_targets(&self) -> &'static [GLenum] {
    const CUBE_FACES: [GLenum; 6] = [
      gl::TEXTURE_CUBE_MAP_POSITIVE_X,
      gl::TEXTURE_CUBE_MAP_NEGATIVE_X,
      gl::TEXTURE_CUBE_MAP_POSITIVE_Y,
      gl::TEXTURE_CUBE_MAP_NEGATIVE_Y,
      gl::TEXTURE_CUBE_MAP_POSITIVE_Z,
      gl::TEXTURE_CUBE_MAP_NEGATIVE_Z,
    ];

    if self.target == gl::TEXTURE_CUBE_MAP {
      &CUBE_FACES
    } else {
      &[gl::TEXTURE_2D]
    }
  }

  /// Properties exposed to inspectors and scripts.
  pub fn properties() -> PropertyRegistry<Texture> {
    PropertyRegistry::<Texture>::new("Texture")
      .read_only("width", |t| PropertyValue::Int(t.width().into()))
      .read_only("height", |t| PropertyValue::Int(t.height().into()))
      .read_only("levels", |t| PropertyValue::Int(t.levels() as i64))
      .read_only("format", |t| PropertyValue::String(format!("{:?}", t.format())))
      .read_only("mipmaps_generated", |t| PropertyValue::Bool(t.mipmaps_generated()))
  }
}

impl TextureBinding for Texture {
  fn target(&self) -> GLenum {
    self.target
  }

  fn handle(&self) -> GLuint {
    self.handle
  }
}

impl Drop for Texture {
  fn drop(&mut self) {
    match self.gl.delete_texture(self.handle) {
      Ok(()) => log::trace!("deleted texture {}", self.handle),
      Err(e) => log::error!("leaking texture {}: {}", self.handle, e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::headless;

  #[test]
  fn default_level_count() {
    assert_eq!(default_levels([256, 256]), 8);
    assert_eq!(default_levels([300, 17]), 8);
    assert_eq!(default_levels([1, 1]), 1);
    assert_eq!(level_size([256, 64], 7), [2, 1]);
    assert_eq!(level_size([256, 64], 40), [1, 1]);
  }

  #[test]
  fn storage_is_allocated_on_create() {
    let (gl, driver) = headless();
    let mut texture = Texture::new(&gl, Sampler::default()).unwrap();

    assert!(!texture.is_created());
    assert_eq!(driver.calls("glTexImage2D"), 0);

    texture.create([64, 32], None, PixelFormat::RGBA8).unwrap();

    assert_eq!(texture.levels(), 6);
    assert_eq!(driver.calls("glTexImage2D"), 6);
    assert_eq!(
      driver.texture_level_size(texture.handle(), gl::TEXTURE_2D, 5),
      Some([2, 1])
    );
    assert_eq!(
      driver.texture_parameter(texture.handle(), gl::TEXTURE_MAX_LEVEL),
      Some(5)
    );
  }

  #[test]
  fn explicit_level_count() {
    let (gl, driver) = headless();
    let mut texture = Texture::new(&gl, Sampler::default()).unwrap();

    texture.create([16, 16], Some(1), PixelFormat::R8).unwrap();
    assert_eq!(texture.levels(), 1);
    assert_eq!(driver.texture_levels(texture.handle(), gl::TEXTURE_2D), 1);
  }

  #[test]
  fn oversized_or_empty_textures_are_refused() {
    let (gl, driver) = headless();
    let mut texture = Texture::new(&gl, Sampler::default()).unwrap();
    let max = max_size(&gl).unwrap();

    assert_eq!(
      texture.create([max + 1, 4], None, PixelFormat::RGBA8),
      Err(TextureError::too_large([max + 1, 4], max))
    );
    assert_eq!(
      texture.create([0, 4], None, PixelFormat::RGBA8),
      Err(TextureError::InvalidSize { size: [0, 4] })
    );
    assert_eq!(driver.calls("glTexImage2D"), 0);
  }

  #[test]
  fn driver_limits_are_asked_once() {
    let (gl, driver) = headless();

    // the first call in the process fills the cache, whichever test makes it
    assert_eq!(max_size(&gl), Ok(8192));
    assert_eq!(max_lod(&gl), Ok(16.));
    assert_eq!(MAX_SIZE.get(), Some(&8192));
    assert_eq!(MAX_LOD.get(), Some(&16.));

    driver.reset_calls();

    assert_eq!(max_size(&gl), Ok(8192));
    assert_eq!(max_lod(&gl), Ok(16.));
    assert_eq!(driver.calls("glGetIntegerv"), 0);
    assert_eq!(driver.calls("glGetFloatv"), 0);
  }

  #[test]
  fn partial_updates_land_where_asked() {
    let (gl, _) = headless();
    let mut texture = Texture::new(&gl, Sampler::default()).unwrap();

    texture.create([4, 4], Some(1), PixelFormat::R8).unwrap();
    texture.update(Some(&[1, 2, 3, 4]), 0, [2, 2], [2, 1]).unwrap();

    #[rustfmt::skip]
    assert_eq!(texture.get_pixels(0).unwrap(), vec![
      0, 0, 0, 0,
      0, 0, 1, 2,
      0, 0, 3, 4,
      0, 0, 0, 0,
    ]);
  }

  #[test]
  fn out_of_range_updates_never_reach_the_driver() {
    let (gl, driver) = headless();
    let mut texture = Texture::new(&gl, Sampler::default()).unwrap();
    texture.create([8, 8], Some(2), PixelFormat::RGBA8).unwrap();
    let pixels = vec![0; 8 * 8 * 4];

    assert_eq!(
      texture.update(Some(&pixels), 0, [4, 4], [5, 0]),
      Err(TextureError::out_of_range([5, 0], [4, 4], [8, 8]))
    );
    assert_eq!(
      texture.update(Some(&pixels), 1, [4, 4], [0, 1]),
      Err(TextureError::out_of_range([0, 1], [4, 4], [4, 4]))
    );
    assert_eq!(
      texture.update(Some(&pixels), 0, [1, 1], [u32::MAX, 0]),
      Err(TextureError::out_of_range([u32::MAX, 0], [1, 1], [8, 8]))
    );
    assert_eq!(
      texture.update(Some(&pixels), 2, [1, 1], [0, 0]),
      Err(TextureError::invalid_level(2, 2))
    );
    assert_eq!(driver.calls("glTexSubImage2D"), 0);
  }

  #[test]
  fn null_pixels_are_a_no_op() {
    let (gl, driver) = headless();
    let mut texture = Texture::new(&gl, Sampler::default()).unwrap();
    texture.create([8, 8], Some(1), PixelFormat::RGBA8).unwrap();

    texture.update(None, 0, [8, 8], [0, 0]).unwrap();
    assert_eq!(driver.calls("glTexSubImage2D"), 0);

    // still checked though
    assert!(texture.update(None, 0, [9, 8], [0, 0]).is_err());
  }

  #[test]
  fn short_pixel_data_is_refused() {
    let (gl, _) = headless();
    let mut texture = Texture::new(&gl, Sampler::default()).unwrap();
    texture.create([2, 2], Some(1), PixelFormat::RGB8).unwrap();

    assert_eq!(
      texture.update(Some(&[0; 11]), 0, [2, 2], [0, 0]),
      Err(TextureError::not_enough_pixels(12, 11))
    );
  }

  #[test]
  fn updating_before_create() {
    let (gl, _) = headless();
    let texture = Texture::new(&gl, Sampler::default()).unwrap();

    assert_eq!(
      texture.update(Some(&[0; 4]), 0, [1, 1], [0, 0]),
      Err(TextureError::NotCreated)
    );
  }

  #[test]
  fn mipmap_generation() {
    let (gl, driver) = headless();
    let mut texture = Texture::new(&gl, Sampler::default()).unwrap();
    texture.create([4, 4], None, PixelFormat::R8).unwrap();
    texture.update(Some(&[9; 16]), 0, [4, 4], [0, 0]).unwrap();

    assert!(!texture.mipmaps_generated());
    texture.generate_mipmaps().unwrap();

    assert!(texture.mipmaps_generated());
    assert_eq!(driver.calls("glGenerateMipmap"), 1);
    assert_eq!(texture.get_pixels(1).unwrap(), vec![9; 4]);
  }

  #[test]
  fn sampler_is_applied() {
    let (gl, driver) = headless();
    let sampler = Sampler::default()
      .with_wrap(Wrap::Repeat)
      .with_filters(MinFilter::LinearMipmapLinear, MagFilter::Nearest);
    let mut texture = Texture::new(&gl, sampler).unwrap();

    assert_eq!(
      driver.texture_parameter(texture.handle(), gl::TEXTURE_WRAP_S),
      Some(gl::REPEAT as GLint)
    );
    assert_eq!(
      driver.texture_parameter(texture.handle(), gl::TEXTURE_MIN_FILTER),
      Some(gl::LINEAR_MIPMAP_LINEAR as GLint)
    );

    texture.set_sampler(Sampler::default()).unwrap();
    assert_eq!(
      driver.texture_parameter(texture.handle(), gl::TEXTURE_MAG_FILTER),
      Some(gl::LINEAR as GLint)
    );
  }

  #[test]
  fn textures_are_deleted_on_drop() {
    let (gl, driver) = headless();
    let texture = Texture::new(&gl, Sampler::default()).unwrap();
    let handle = texture.handle();

    drop(texture);
    assert!(!driver.is_texture(handle));
  }

  #[test]
  fn published_properties() {
    let (gl, _) = headless();
    let mut texture = Texture::new(&gl, Sampler::default()).unwrap();
    texture.create([32, 16], None, PixelFormat::RGBA8).unwrap();

    let props = Texture::properties();
    assert_eq!(props.get(&texture, "width"), Some(PropertyValue::Int(32)));
    assert_eq!(props.get(&texture, "levels"), Some(PropertyValue::Int(5)));
    assert!(!props.set(&mut texture, "width", PropertyValue::Int(1)));
    assert_eq!(texture.width(), 32);
  }
}
