//! Kernel readiness-notification backends.
//!
//! Exactly one backend drives an event loop, bound at construction. The
//! build-time default follows the capability ladder event ports → epoll →
//! kqueue → select; the select backend is always compiled as the portable
//! floor, so any host can also exercise it explicitly through
//! [`crate::EventLoop::with_backend`].

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::event::{Fired, Interest};

#[cfg(solarish)]
mod evport;
#[cfg(solarish)]
pub use evport::EventPort;

#[cfg(linux)]
mod epoll;
#[cfg(linux)]
pub use epoll::Epoll;

#[cfg(bsd)]
mod kqueue;
#[cfg(bsd)]
pub use kqueue::Kqueue;

mod select;
pub use select::Select;

#[cfg(solarish)]
pub type DefaultBackend = EventPort;
#[cfg(linux)]
pub type DefaultBackend = Epoll;
#[cfg(bsd)]
pub type DefaultBackend = Kqueue;
#[cfg(not(any(solarish, linux, bsd)))]
pub type DefaultBackend = Select;

/// A kernel readiness primitive: arm interest per descriptor, block until
/// something is ready or a timeout lapses.
///
/// # Contract
///
/// - `add` and `remove` receive the interest delta *and* `prev`, the mask
///   the file table recorded before the change. Backends whose kernel call
///   wants the full resulting mask (epoll, event ports) derive it from the
///   two; backends with per-class arming (kqueue, select) use the delta
///   alone. Both operations are idempotent with respect to already-armed
///   bits.
/// - `poll` blocks for at most `timeout` (`None` blocks indefinitely,
///   `Duration::ZERO` is a non-blocking sweep), rewrites `ready` with the
///   satisfied descriptors and returns how many entries it wrote. At most
///   one entry per descriptor, never more than the backend's capacity.
/// - A descriptor the kernel reports errored or hung up must carry
///   [`Interest::WRITABLE`] in its fired mask, so the write callback can
///   perform the read that surfaces the error.
/// - Releasing kernel state is `Drop`.
///
/// Backends are single-threaded: no operation is ever invoked concurrently
/// with another.
pub trait Backend {
  fn add(&mut self, fd: RawFd, mask: Interest, prev: Interest)
  -> io::Result<()>;

  fn remove(
    &mut self,
    fd: RawFd,
    mask: Interest,
    prev: Interest,
  ) -> io::Result<()>;

  /// Grow or shrink to track `capacity` descriptors. Fails if the kernel
  /// primitive cannot represent the new size.
  fn resize(&mut self, capacity: usize) -> io::Result<()>;

  fn poll(
    &mut self,
    timeout: Option<Duration>,
    ready: &mut Vec<Fired>,
  ) -> io::Result<usize>;

  /// Short identifier for diagnostics, e.g. `"epoll"`.
  fn name(&self) -> &'static str;
}
