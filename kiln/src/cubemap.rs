//! Cube maps.
//!
//! A [`CubeMap`] owns one cube map texture and exactly six [`CubeTexture`] faces, created with it.
//! Faces observe the map’s texture without owning it: once the map is gone, a face is invalid and
//! every operation through it fails.

use crate::functions::GlFunctions;
use crate::pixel::PixelFormat;
use crate::texture::{self, Sampler, Texture, TextureBinding, TextureError};
use gl::types::*;
use std::cell::RefCell;
use std::error;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

/// Face of a cube map.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CubeFace {
  /// `+X`.
  Right,
  /// `-X`.
  Left,
  /// `+Y`.
  Top,
  /// `-Y`.
  Bottom,
  /// `+Z`.
  Back,
  /// `-Z`.
  Front,
}

impl CubeFace {
  pub const ALL: [CubeFace; 6] = [
    CubeFace::Right,
    CubeFace::Left,
    CubeFace::Top,
    CubeFace::Bottom,
    CubeFace::Back,
    CubeFace::Front,
  ];

  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      CubeFace::Right => gl::TEXTURE_CUBE_MAP_POSITIVE_X,
      CubeFace::Left => gl::TEXTURE_CUBE_MAP_NEGATIVE_X,
      CubeFace::Top => gl::TEXTURE_CUBE_MAP_POSITIVE_Y,
      CubeFace::Bottom => gl::TEXTURE_CUBE_MAP_NEGATIVE_Y,
      CubeFace::Back => gl::TEXTURE_CUBE_MAP_POSITIVE_Z,
      CubeFace::Front => gl::TEXTURE_CUBE_MAP_NEGATIVE_Z,
    }
  }

  fn index(self) -> usize {
    self as usize
  }
}

/// Cube map errors.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CubeMapError {
  Texture(TextureError),
  /// Faces must be square.
  NotSquare { size: [u32; 2] },
  /// Faces must be strictly smaller than the driver limit.
  TooLarge { size: u32, max: u32 },
  /// The face outlived its cube map.
  Invalidated(CubeFace),
}

impl fmt::Display for CubeMapError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      CubeMapError::Texture(ref e) => write!(f, "cube map texture error: {}", e),
      CubeMapError::NotSquare { size } => {
        write!(f, "cube map faces must be square, got {}×{}", size[0], size[1])
      }
      CubeMapError::TooLarge { size, max } => {
        write!(f, "cube map size {} must be below {}", size, max)
      }
      CubeMapError::Invalidated(face) => write!(f, "{:?} face used after its cube map", face),
    }
  }
}

impl error::Error for CubeMapError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      CubeMapError::Texture(e) => Some(e),
      _ => None,
    }
  }
}

impl From<TextureError> for CubeMapError {
  fn from(e: TextureError) -> Self {
    CubeMapError::Texture(e)
  }
}

impl From<crate::context::ContextError> for CubeMapError {
  fn from(e: crate::context::ContextError) -> Self {
    CubeMapError::Texture(e.into())
  }
}

#[derive(Debug)]
struct CubeCore {
  texture: RefCell<Texture>,
}

/// One face of a cube map.
#[derive(Debug)]
pub struct CubeTexture {
  face: CubeFace,
  owner: Weak<CubeCore>,
}

impl CubeTexture {
  pub fn face(&self) -> CubeFace {
    self.face
  }

  /// Whether the face still belongs to a live cube map.
  pub fn is_valid(&self) -> bool {
    self.owner.strong_count() > 0
  }

  /// Whether `map` is the cube map this face belongs to.
  pub fn is_owned_by(&self, map: &CubeMap) -> bool {
    self
      .owner
      .upgrade()
      .map_or(false, |core| Rc::ptr_eq(&core, &map.core))
  }

  /// Upload pixels into a region of this face; see [`Texture::update`].
  pub fn update(
    &self,
    pixels: Option<&[u8]>,
    level: usize,
    size: [u32; 2],
    offset: [u32; 2],
  ) -> Result<(), CubeMapError> {
    let core = self.core()?;
    let texture = core.texture.borrow();
    texture.update_image(self.face.to_glenum(), pixels, level, size, offset)?;
    Ok(())
  }

  /// Read back the pixels of a mip-level of this face.
  pub fn get_pixels(&self, level: usize) -> Result<Vec<u8>, CubeMapError> {
    let core = self.core()?;
    let texture = core.texture.borrow();
    Ok(texture.read_image(self.face.to_glenum(), level)?)
  }

  /// Detach the face from its cube map.
  pub fn invalidate(&mut self) {
    self.owner = Weak::new();
  }

  fn core(&self) -> Result<Rc<CubeCore>, CubeMapError> {
    self.owner.upgrade().ok_or_else(|| {
      let err = CubeMapError::Invalidated(self.face);
      log::error!("{}", err);
      err
    })
  }
}

/// Cube map texture.
#[derive(Debug)]
pub struct CubeMap {
  core: Rc<CubeCore>,
  faces: [CubeTexture; 6],
}

impl CubeMap {
  /// Create a cube map with `size`×`size` faces.
  ///
  /// With `levels` set to `None`, the level count is computed as for [`Texture::create`].
  pub fn new(
    gl: &GlFunctions,
    size: [u32; 2],
    levels: Option<usize>,
    format: PixelFormat,
    sampler: Sampler,
  ) -> Result<Self, CubeMapError> {
    if size[0] != size[1] {
      let err = CubeMapError::NotSquare { size };
      log::error!("{}", err);
      return Err(err);
    }

    let max = texture::max_size(gl)?;
    if size[0] >= max {
      let err = CubeMapError::TooLarge { size: size[0], max };
      log::error!("{}", err);
      return Err(err);
    }

    let mut texture = Texture::with_target(gl, gl::TEXTURE_CUBE_MAP, sampler)?;
    texture.create(size, levels, format)?;

    let core = Rc::new(CubeCore {
      texture: RefCell::new(texture),
    });
    let faces = CubeFace::ALL.map(|face| CubeTexture {
      face,
      owner: Rc::downgrade(&core),
    });

    Ok(CubeMap { core, faces })
  }

  pub fn face(&self, face: CubeFace) -> &CubeTexture {
    &self.faces[face.index()]
  }

  pub fn faces(&self) -> &[CubeTexture; 6] {
    &self.faces
  }

  /// Size of a face.
  pub fn size(&self) -> u32 {
    self.core.texture.borrow().width()
  }

  pub fn levels(&self) -> usize {
    self.core.texture.borrow().levels()
  }

  pub fn format(&self) -> PixelFormat {
    self.core.texture.borrow().format()
  }

  pub fn set_sampler(&self, sampler: Sampler) -> Result<(), CubeMapError> {
    self.core.texture.borrow_mut().set_sampler(sampler)?;
    Ok(())
  }

  pub fn generate_mipmaps(&self) -> Result<(), CubeMapError> {
    self.core.texture.borrow_mut().generate_mipmaps()?;
    Ok(())
  }

  pub fn mipmaps_generated(&self) -> bool {
    self.core.texture.borrow().mipmaps_generated()
  }

  /// Exchange the textures of two cube maps.
  ///
  /// Faces stay with their map: after the swap, every face of `self` refers to `self`.
  pub fn swap(&mut self, other: &mut CubeMap) {
    mem::swap(&mut self.core, &mut other.core);
    self.repoint_faces();
    other.repoint_faces();
  }

  fn repoint_faces(&mut self) {
    for face in &mut self.faces {
      face.owner = Rc::downgrade(&self.core);
    }
  }
}

impl TextureBinding for CubeMap {
  fn target(&self) -> GLenum {
    gl::TEXTURE_CUBE_MAP
  }

  fn handle(&self) -> GLuint {
    self.core.texture.borrow().handle()
  }
}

impl Drop for CubeMap {
  fn drop(&mut self) {
    for face in &mut self.faces {
      face.invalidate();
    }
  }
}
