//! Graphics contexts and current-context tracking.
//!
//! A [`Context`] owns one OpenGL command-submission context. At most one context is current on a
//! given OS thread; a process-wide registry maps thread ids to the context current on them and a
//! thread-local slot caches the answer for the calling thread, so that currency checks made before
//! every driver call stay cheap.
//!
//! Every GPU object wrapper reaches the driver through the [`GlFunctions`] handed out by
//! [`Context::functions`]; the context stays alive as long as one of them does.

use crate::driver::{Driver, GlDriver};
use crate::functions::GlFunctions;
use crate::state::GraphicsStateCache;
use std::cell::Cell;
use std::collections::HashMap;
use std::error;
use std::fmt;
use std::os::raw::c_void;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::thread::{self, ThreadId};

// Id of the context current on this thread; 0 means none.
thread_local!(static CURRENT_CONTEXT: Cell<u64> = Cell::new(0));

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

type Registry = Mutex<HashMap<ThreadId, Weak<ContextInner>>>;

fn registry() -> MutexGuard<'static, HashMap<ThreadId, Weak<ContextInner>>> {
  static REGISTRY: OnceLock<Registry> = OnceLock::new();

  REGISTRY
    .get_or_init(Default::default)
    .lock()
    .unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Errors related to contexts.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ContextError {
  /// The driver entry-point loader could not resolve a mandatory symbol.
  LoaderFailed(String),
  /// A driver call was attempted while the owning context is not current on the calling thread.
  NotCurrent {
    /// Driver call that was refused.
    call: &'static str,
  },
}

impl ContextError {
  /// The loader failed to resolve `symbol`.
  pub fn loader_failed(symbol: impl Into<String>) -> Self {
    ContextError::LoaderFailed(symbol.into())
  }

  /// `call` was attempted without a current context.
  pub fn not_current(call: &'static str) -> Self {
    ContextError::NotCurrent { call }
  }
}

impl fmt::Display for ContextError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      ContextError::LoaderFailed(ref symbol) => {
        write!(f, "cannot load graphics driver entry point {}", symbol)
      }

      ContextError::NotCurrent { call } => write!(
        f,
        "{} issued while the owning context is not current on this thread",
        call
      ),
    }
  }
}

impl error::Error for ContextError {}

/// Window-system side of a context.
///
/// Implemented by windowing crates (see `kiln-glfw`) on whatever object can make the native
/// context current on the calling thread and present the back buffer.
pub trait Surface: Send {
  /// Make the native context current on the calling thread.
  fn make_current(&mut self);

  /// Present the back buffer.
  fn swap_buffers(&mut self);
}

/// Surface with no window behind it.
///
/// Pair it with a [`SoftwareDriver`](crate::driver::SoftwareDriver) to run the engine without a
/// GPU.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HeadlessSurface;

impl Surface for HeadlessSurface {
  fn make_current(&mut self) {}

  fn swap_buffers(&mut self) {}
}

/// Driver version, as reported by the context.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Version {
  pub major: u32,
  pub minor: u32,
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    write!(f, "{}.{}", self.major, self.minor)
  }
}

pub(crate) struct ContextInner {
  id: u64,
  version: Version,
  driver: Box<dyn Driver>,
  surface: Mutex<Box<dyn Surface>>,
  thread: Mutex<Option<ThreadId>>,
  state: Mutex<GraphicsStateCache>,
}

impl fmt::Debug for ContextInner {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.debug_struct("ContextInner")
      .field("id", &self.id)
      .field("version", &self.version)
      .field("driver", &self.driver)
      .field("thread", &self.thread)
      .finish()
  }
}

impl Drop for ContextInner {
  fn drop(&mut self) {
    let this = self as *const ContextInner;
    registry().retain(|_, ctx| ctx.as_ptr() != this);

    let id = self.id;
    let _ = CURRENT_CONTEXT.try_with(|current| {
      if current.get() == id {
        current.set(0);
      }
    });

    log::debug!("context {} destroyed", id);
  }
}

/// Graphics context.
///
/// Cloning a context is cheap and yields another handle to the same context.
#[derive(Clone, Debug)]
pub struct Context {
  inner: Arc<ContextInner>,
}

impl Context {
  /// Create a context over the real OpenGL driver.
  ///
  /// The surface is made current, `resolver` is used to load the driver entry points, and the
  /// result is [`Context::new`].
  pub fn create<S, F>(mut surface: S, resolver: F) -> Result<Self, ContextError>
  where
    S: 'static + Surface,
    F: FnMut(&str) -> *const c_void,
  {
    surface.make_current();
    let driver = GlDriver::load_with(resolver)?;

    Self::new(surface, driver)
  }

  /// Create a context from a surface and an already loaded driver.
  ///
  /// The context is made current on the calling thread and the driver version is queried.
  pub fn new<S, D>(mut surface: S, driver: D) -> Result<Self, ContextError>
  where
    S: 'static + Surface,
    D: 'static + Driver,
  {
    surface.make_current();

    let version = Version {
      major: driver.get_integer(gl::MAJOR_VERSION).max(0) as u32,
      minor: driver.get_integer(gl::MINOR_VERSION).max(0) as u32,
    };

    let inner = Arc::new(ContextInner {
      id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
      version,
      driver: Box::new(driver),
      surface: Mutex::new(Box::new(surface)),
      thread: Mutex::new(None),
      state: Mutex::new(GraphicsStateCache::new()),
    });

    let ctx = Context { inner };
    ctx.bind_to_calling_thread();

    log::info!(
      "context {} created (driver version {})",
      ctx.inner.id,
      ctx.inner.version
    );

    Ok(ctx)
  }

  /// Context current on the calling thread, if any.
  pub fn current() -> Option<Self> {
    let id = CURRENT_CONTEXT.with(Cell::get);

    if id == 0 {
      return None;
    }

    registry()
      .get(&thread::current().id())
      .and_then(Weak::upgrade)
      .filter(|inner| inner.id == id)
      .map(|inner| Context { inner })
  }

  /// Make this context current on the calling thread.
  ///
  /// Whatever context was current on this thread stops being so.
  pub fn make_current(&self) {
    lock(&self.inner.surface).make_current();
    self.bind_to_calling_thread();
  }

  /// Whether this context is current on the calling thread.
  pub fn is_current(&self) -> bool {
    CURRENT_CONTEXT.with(Cell::get) == self.inner.id
      && *lock(&self.inner.thread) == Some(thread::current().id())
  }

  /// Present the back buffer.
  pub fn swap_buffers(&self) {
    lock(&self.inner.surface).swap_buffers();
  }

  /// Driver version.
  pub fn version(&self) -> Version {
    self.inner.version
  }

  /// Dispatch table bound to this context.
  pub fn functions(&self) -> GlFunctions {
    GlFunctions::new(self.clone())
  }

  /// Whether both handles refer to the same context.
  pub fn ptr_eq(&self, other: &Context) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  pub(crate) fn driver(&self) -> &dyn Driver {
    &*self.inner.driver
  }

  pub(crate) fn state(&self) -> MutexGuard<GraphicsStateCache> {
    lock(&self.inner.state)
  }

  fn bind_to_calling_thread(&self) {
    let thread = thread::current().id();

    *lock(&self.inner.thread) = Some(thread);
    registry().insert(thread, Arc::downgrade(&self.inner));
    CURRENT_CONTEXT.with(|current| current.set(self.inner.id));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::driver::SoftwareDriver;

  fn headless() -> Context {
    Context::new(HeadlessSurface, SoftwareDriver::new()).expect("headless context")
  }

  #[test]
  fn new_context_is_current() {
    let ctx = headless();

    assert!(ctx.is_current());
    assert!(Context::current().map_or(false, |c| c.ptr_eq(&ctx)));
    assert_eq!(ctx.version(), Version { major: 3, minor: 3 });
  }

  #[test]
  fn making_another_context_current_replaces_the_first() {
    let a = headless();
    let b = headless();

    assert!(!a.is_current());
    assert!(b.is_current());

    a.make_current();
    assert!(a.is_current());
    assert!(!b.is_current());
  }

  #[test]
  fn context_is_not_current_on_other_threads() {
    let ctx = headless();
    let remote = ctx.clone();

    let current_there = thread::spawn(move || (remote.is_current(), Context::current().is_none()))
      .join()
      .expect("thread");

    assert_eq!(current_there, (false, true));
    assert!(ctx.is_current());
  }

  #[test]
  fn context_can_be_handed_off_to_another_thread() {
    let ctx = headless();
    let remote = ctx.clone();

    let current_there = thread::spawn(move || {
      remote.make_current();
      remote.is_current()
    })
    .join()
    .expect("thread");

    assert!(current_there);
    assert!(!ctx.is_current());
  }

  #[test]
  fn dropping_context_clears_registry() {
    let ctx = headless();
    drop(ctx);

    assert!(Context::current().is_none());
  }
}
