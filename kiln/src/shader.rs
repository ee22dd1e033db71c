//! Shader stages.
//!
//! A [`Shader`] is compiled as soon as it is created. A failed compilation still yields a
//! [`Shader`]: [`Shader::is_compiled`] tells whether it can be linked and [`Shader::log`] holds the
//! driver diagnostics. Use [`Shader::compile`] to get the failure as an error instead.

use crate::context::ContextError;
use crate::functions::GlFunctions;
use gl::types::*;
use std::error;
use std::fmt;

/// A shader stage type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StageType {
  Vertex,
  TessellationControl,
  TessellationEvaluation,
  Geometry,
  Fragment,
  Compute,
}

impl StageType {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      StageType::Vertex => gl::VERTEX_SHADER,
      StageType::TessellationControl => gl::TESS_CONTROL_SHADER,
      StageType::TessellationEvaluation => gl::TESS_EVALUATION_SHADER,
      StageType::Geometry => gl::GEOMETRY_SHADER,
      StageType::Fragment => gl::FRAGMENT_SHADER,
      StageType::Compute => gl::COMPUTE_SHADER,
    }
  }
}

impl fmt::Display for StageType {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      StageType::Vertex => f.write_str("vertex shader"),
      StageType::TessellationControl => f.write_str("tessellation control shader"),
      StageType::TessellationEvaluation => f.write_str("tessellation evaluation shader"),
      StageType::Geometry => f.write_str("geometry shader"),
      StageType::Fragment => f.write_str("fragment shader"),
      StageType::Compute => f.write_str("compute shader"),
    }
  }
}

/// Errors that shader stages can emit.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StageError {
  Context(ContextError),
  /// The driver refused to create the stage.
  CreationFailed(StageType),
  /// Compilation failed; carries the driver log.
  CompilationFailed(StageType, String),
}

impl StageError {
  pub fn compilation_failed(ty: StageType, log: impl Into<String>) -> Self {
    StageError::CompilationFailed(ty, log.into())
  }
}

impl fmt::Display for StageError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      StageError::Context(ref e) => write!(f, "shader context error: {}", e),
      StageError::CreationFailed(ty) => write!(f, "cannot create {}", ty),
      StageError::CompilationFailed(ty, ref log) => {
        write!(f, "{} compilation error: {}", ty, log)
      }
    }
  }
}

impl error::Error for StageError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      StageError::Context(e) => Some(e),
      _ => None,
    }
  }
}

impl From<ContextError> for StageError {
  fn from(e: ContextError) -> Self {
    StageError::Context(e)
  }
}

/// Shader stage.
#[derive(Debug)]
pub struct Shader {
  gl: GlFunctions,
  handle: GLuint,
  ty: StageType,
  source: String,
  compiled: bool,
}

impl Shader {
  /// Create and compile a stage.
  pub fn new(
    gl: &GlFunctions,
    ty: StageType,
    source: impl Into<String>,
  ) -> Result<Self, StageError> {
    let handle = gl.create_shader(ty.to_glenum())?;

    if handle == 0 {
      log::error!("cannot create {}", ty);
      return Err(StageError::CreationFailed(ty));
    }

    let mut shader = Shader {
      gl: gl.clone(),
      handle,
      ty,
      source: source.into(),
      compiled: false,
    };

    shader.recompile()?;

    Ok(shader)
  }

  /// Create and compile a stage; a compilation failure is an error.
  pub fn compile(
    gl: &GlFunctions,
    ty: StageType,
    source: impl Into<String>,
  ) -> Result<Self, StageError> {
    let shader = Self::new(gl, ty, source)?;

    if shader.compiled {
      Ok(shader)
    } else {
      Err(StageError::compilation_failed(ty, shader.log()?))
    }
  }

  pub fn handle(&self) -> GLuint {
    self.handle
  }

  pub fn stage_type(&self) -> StageType {
    self.ty
  }

  pub fn source(&self) -> &str {
    &self.source
  }

  /// Outcome of the last compilation.
  pub fn is_compiled(&self) -> bool {
    self.compiled
  }

  /// Driver diagnostics of the last compilation; empty if none.
  pub fn log(&self) -> Result<String, ContextError> {
    match self.gl.get_shader_iv(self.handle, gl::INFO_LOG_LENGTH)? {
      0 => Ok(String::new()),
      _ => self.gl.get_shader_info_log(self.handle),
    }
  }

  /// Replace the source and compile again.
  pub fn set_source(&mut self, source: impl Into<String>) -> Result<bool, ContextError> {
    self.source = source.into();
    self.recompile()
  }

  /// Compile the current source again; returns whether it compiled.
  pub fn recompile(&mut self) -> Result<bool, ContextError> {
    self.gl.shader_source(self.handle, &self.source)?;
    self.gl.compile_shader(self.handle)?;

    self.compiled = self.gl.get_shader_iv(self.handle, gl::COMPILE_STATUS)? == gl::TRUE as GLint;

    if self.compiled {
      log::debug!("compiled {} {}", self.ty, self.handle);
    } else {
      log::error!("{} {} failed to compile: {}", self.ty, self.handle, self.log()?);
    }

    Ok(self.compiled)
  }
}

impl Drop for Shader {
  fn drop(&mut self) {
    match self.gl.delete_shader(self.handle) {
      Ok(()) => log::trace!("deleted {} {}", self.ty, self.handle),
      Err(e) => log::error!("leaking {} {}: {}", self.ty, self.handle, e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::headless;

  const VS: &str = "#version 330 core\nvoid main() { gl_Position = vec4(0.); }\n";

  #[test]
  fn compiles_on_creation() {
    let (gl, driver) = headless();
    let shader = Shader::new(&gl, StageType::Vertex, VS).unwrap();

    assert!(shader.is_compiled());
    assert_eq!(shader.log(), Ok(String::new()));
    assert_eq!(driver.calls("glCompileShader"), 1);
  }

  #[test]
  fn failed_compilation_is_reported() {
    let (gl, _) = headless();
    let broken = "#version 330 core\nvoid main() {\n#error nope\n}\n";

    let shader = Shader::new(&gl, StageType::Fragment, broken).unwrap();
    assert!(!shader.is_compiled());
    assert!(shader.log().unwrap().contains("nope"));

    assert!(matches!(
      Shader::compile(&gl, StageType::Fragment, broken),
      Err(StageError::CompilationFailed(StageType::Fragment, _))
    ));
  }

  #[test]
  fn recompiling_with_a_fixed_source() {
    let (gl, _) = headless();
    let mut shader = Shader::new(&gl, StageType::Vertex, "void nothing() {}").unwrap();

    assert!(!shader.is_compiled());
    assert_eq!(shader.set_source(VS), Ok(true));
    assert!(shader.is_compiled());
  }

  #[test]
  fn stages_are_deleted_on_drop() {
    let (gl, driver) = headless();
    let shader = Shader::new(&gl, StageType::Compute, "void main() {}").unwrap();
    let handle = shader.handle();

    drop(shader);
    assert!(!driver.is_shader(handle));
  }
}
