use glam::{Mat4, Vec3};
use kiln::buffer::{Access, BufferError, BufferKind, BufferObject, BufferUsage};
use kiln::cubemap::{CubeFace, CubeMap};
use kiln::driver::SoftwareDriver;
use kiln::framebuffer::{AttachmentKind, FrameBuffer, FrameBufferConfig};
use kiln::pixel::PixelFormat;
use kiln::program::{ShaderProgram, UniformLocation};
use kiln::shader::{Shader, StageType};
use kiln::texture::{Sampler, Texture, TextureError};
use kiln::uniform_buffer::UniformBuffer;
use kiln::{Context, GlFunctions, HeadlessSurface};

const VS: &str = "#version 330 core
uniform mat4 u_ViewProjection;
uniform mat4 u_Transform;
in vec3 a_Position;

void main() {
  gl_Position = u_ViewProjection * u_Transform * vec4(a_Position, 1.);
}
";

const FS: &str = "#version 330 core
uniform vec4 u_Color;
out vec4 frag;

void main() {
  frag = u_Color;
}
";

fn headless() -> (Context, GlFunctions, SoftwareDriver) {
  let _ = env_logger::builder().is_test(true).try_init();

  let driver = SoftwareDriver::new();
  let ctx = Context::new(HeadlessSurface, driver.clone()).unwrap();
  let gl = ctx.functions();
  driver.reset_calls();

  (ctx, gl, driver)
}

#[test]
fn partial_texture_update_must_fit_in_the_level() {
  let (_ctx, gl, driver) = headless();
  let mut texture = Texture::new(&gl, Sampler::default()).unwrap();
  texture.create([256, 256], Some(1), PixelFormat::RGBA8).unwrap();

  let pixels = vec![0xff; 64 * 64 * 4];

  texture.update(Some(&pixels), 0, [64, 64], [192, 192]).unwrap();
  assert_eq!(driver.calls("glTexSubImage2D"), 1);

  let err = texture.update(Some(&pixels), 0, [64, 64], [193, 192]).unwrap_err();
  assert!(matches!(err, TextureError::OutOfRange { .. }));
  assert_eq!(driver.calls("glTexSubImage2D"), 1);
}

#[test]
fn uniform_buffer_flushes_dirty_ranges() {
  let (_ctx, gl, driver) = headless();
  let mut ubo = UniformBuffer::new(&gl, 80, BufferUsage::DynamicDraw).unwrap();

  let transform = Mat4::from_translation(Vec3::new(1., 2., 3.));
  let light = Vec3::new(0.25, 0.5, 1.);

  ubo.set(&transform, 0).unwrap();
  ubo.set(&light, 64).unwrap();

  assert_eq!(ubo.get::<Mat4>(0).unwrap(), transform);
  assert_eq!(ubo.get::<Vec3>(64).unwrap(), light);
  assert_eq!(ubo.dirty_ranges(), &[0..76]);

  assert_eq!(ubo.flush().unwrap(), 1);
  assert_eq!(driver.calls("glBufferSubData"), 1);
  assert!(ubo.dirty_ranges().is_empty());

  let bytes = driver.buffer_bytes(ubo.buffer().handle()).unwrap();
  assert_eq!(&bytes[..64], bytemuck::bytes_of(&transform));
  assert_eq!(&bytes[64..76], bytemuck::bytes_of(&light));

  // nothing left to send
  assert_eq!(ubo.flush().unwrap(), 0);
  assert_eq!(driver.calls("glBufferSubData"), 1);
}

#[test]
fn uniform_locations_of_a_linked_program() {
  let (_ctx, gl, _driver) = headless();
  let program = ShaderProgram::from_sources(&gl, "flat", VS, FS).unwrap();

  assert!(program.uniform_location("u_Transform").unwrap().is_valid());
  assert_eq!(
    program.uniform_location("u_DoesNotExist").unwrap(),
    UniformLocation::INVALID
  );
}

#[test]
fn buffer_content_round_trip() {
  let (_ctx, gl, _driver) = headless();
  let data: Vec<u8> = (0..=255).collect();
  let buffer =
    BufferObject::with_data(&gl, BufferKind::Vertex, BufferUsage::StaticDraw, &data).unwrap();

  assert_eq!(buffer.read(0, data.len()).unwrap(), data);

  let content = buffer.content(Access::ReadWrite).unwrap();
  assert_eq!(content.get().unwrap(), data);

  content.set(&[42; 4], 16).unwrap();
  assert_eq!(content.read(14, 8).unwrap(), [14, 15, 42, 42, 42, 42, 20, 21]);
}

#[test]
fn at_most_one_live_view_per_buffer() {
  let (_ctx, gl, driver) = headless();
  let buffer =
    BufferObject::with_size(&gl, BufferKind::Uniform, BufferUsage::DynamicDraw, 64).unwrap();

  let a = buffer.content(Access::WriteOnly).unwrap();
  let b = buffer.content(Access::ReadOnly).unwrap();

  assert!(a.is_same_view(&b));
  assert_eq!(b.access(), Access::WriteOnly);
  assert_eq!(driver.calls("glMapBuffer"), 1);

  // the buffer is mapped as long as a view is alive
  drop(a);
  assert!(buffer.is_mapped());
  drop(b);
  assert!(!buffer.is_mapped());
  assert!(!driver.is_buffer_mapped(buffer.handle()));

  let c = buffer.content(Access::ReadOnly).unwrap();
  assert_eq!(c.access(), Access::ReadOnly);
  assert_eq!(driver.calls("glMapBuffer"), 2);
}

#[test]
fn invalidated_views_refuse_access() {
  let (_ctx, gl, _driver) = headless();
  let buffer =
    BufferObject::with_size(&gl, BufferKind::Uniform, BufferUsage::DynamicDraw, 16).unwrap();

  let content = buffer.content(Access::ReadWrite).unwrap();
  content.invalidate();

  assert!(!content.is_valid());
  assert!(matches!(content.get(), Err(BufferError::Invalidated)));
}

#[test]
fn invalidated_view_releases_the_buffer() {
  let (_ctx, gl, driver) = headless();
  let buffer =
    BufferObject::with_size(&gl, BufferKind::Uniform, BufferUsage::DynamicDraw, 16).unwrap();

  let stale = buffer.content(Access::ReadWrite).unwrap();
  stale.invalidate();

  // the stale handle is still held
  assert!(!driver.is_buffer_mapped(buffer.handle()));
  assert!(!buffer.is_mapped());

  buffer.sub_data(4, &[7; 4]).unwrap();
  assert_eq!(buffer.read(0, 8).unwrap(), [0, 0, 0, 0, 7, 7, 7, 7]);

  let fresh = buffer.content(Access::ReadOnly).unwrap();
  assert!(fresh.is_valid());
  assert!(!fresh.is_same_view(&stale));
  assert_eq!(fresh.read(4, 4).unwrap(), [7; 4]);
  assert!(buffer.is_mapped());

  drop(stale);
  assert!(buffer.is_mapped());
  drop(fresh);
  assert!(!buffer.is_mapped());
}

#[test]
fn cube_map_faces_stay_with_their_map_after_a_swap() {
  let (_ctx, gl, _driver) = headless();
  let mut a = CubeMap::new(&gl, [16, 16], Some(1), PixelFormat::RGBA8, Sampler::default()).unwrap();
  let mut b = CubeMap::new(&gl, [32, 32], Some(1), PixelFormat::RGBA8, Sampler::default()).unwrap();

  a.swap(&mut b);

  assert_eq!(a.size(), 32);
  assert_eq!(b.size(), 16);

  for face in CubeFace::ALL {
    assert!(a.face(face).is_owned_by(&a));
    assert!(!a.face(face).is_owned_by(&b));
    assert!(b.face(face).is_owned_by(&b));
  }

  // faces write into the texture their map now holds
  let pixels = vec![0; 32 * 32 * 4];
  a.face(CubeFace::Right)
    .update(Some(&pixels), 0, [32, 32], [0, 0])
    .unwrap();
}

#[test]
fn failed_link_keeps_reflection() {
  let (_ctx, gl, _driver) = headless();
  let mut program = ShaderProgram::from_sources(&gl, "flat", VS, FS).unwrap();
  let before = program.active_uniforms().to_vec();

  let broken = Shader::new(&gl, StageType::Geometry, "void main() {\n#error broken\n}\n").unwrap();
  assert!(!broken.is_compiled());

  program.attach(&broken).unwrap();
  assert!(program.link().is_err());

  assert!(!program.is_linked());
  assert_eq!(program.active_uniforms(), &before[..]);
}

#[test]
fn framebuffer_without_depth() {
  let (_ctx, gl, driver) = headless();
  let config = FrameBufferConfig {
    depth_bits: 0,
    ..FrameBufferConfig::new([128, 64])
  };

  let fb = FrameBuffer::with_config(&gl, &config).unwrap();

  assert!(fb.depth_attachment().is_none());
  assert_eq!(fb.color_attachment_count(), 1);
  assert_eq!(fb.color_attachments()[0].kind(), AttachmentKind::Texture);
  assert_eq!(fb.check_completion(), Ok(()));
  assert!(driver.is_framebuffer(fb.handle()));
}

#[test]
fn resources_are_released_on_drop() {
  let (_ctx, gl, driver) = headless();

  let buffer =
    BufferObject::with_size(&gl, BufferKind::Vertex, BufferUsage::StaticDraw, 32).unwrap();
  let texture = Texture::new(&gl, Sampler::default()).unwrap();
  let fb = FrameBuffer::with_config(&gl, &FrameBufferConfig::new([8, 8])).unwrap();
  let (b, t, f) = (buffer.handle(), texture.handle(), fb.handle());

  drop(buffer);
  drop(texture);
  drop(fb);

  assert!(!driver.is_buffer(b));
  assert!(!driver.is_texture(t));
  assert!(!driver.is_framebuffer(f));
}
