use crate::FixtureResult;
use kiln::vertex_array::{Mode, VertexArray, VertexArrayError};
use kiln_glfw::{GlfwSurface, WindowDim, WindowOpt};

pub fn fixture() -> FixtureResult {
  let surface = GlfwSurface::new(
    WindowDim::Windowed(64, 64),
    "Draw no vertices",
    WindowOpt::default(),
  )?;
  let vao = VertexArray::new(&surface.functions())?;

  match vao.draw(Mode::Triangle) {
    Err(VertexArrayError::NoVertexBuffer) => Ok(()),
    other => Err(format!("expected a missing vertex buffer error, got {:?}", other).into()),
  }
}
