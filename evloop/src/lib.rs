//! # Evloop - Single-Threaded Event Demultiplexer
//!
//! Evloop is the reactor core of an event-driven server: one thread of
//! control multiplexing file descriptor readiness and millisecond timers
//! over the best readiness primitive the kernel offers.
//!
//! ## Key Characteristics
//!
//! - **Single-threaded**: no locks, no cross-thread wakeup; callbacks run
//!   to completion on the loop's own thread
//! - **Reentrant callbacks**: handlers may register, unregister and cancel
//!   anything, including themselves, mid-dispatch
//! - **Timers on the poll timeout**: the loop sleeps exactly until the
//!   nearest deadline, so there is no tick thread and no busy wait
//! - **Skew-tolerant**: a wall clock that jumps backwards expires every
//!   pending timer instead of stalling them
//! - **Pluggable backends**: the readiness primitive is picked at build
//!   time, and custom [`Backend`] implementations can be injected
//!
//! ## Platform Support
//!
//! | Platform           | Primitive   |
//! |--------------------|-------------|
//! | Solaris / illumos  | event ports |
//! | Linux              | epoll       |
//! | BSD / macOS        | kqueue      |
//! | Other Unix         | select      |
//!
//! ## Getting Started
//!
//! ```rust
//! use evloop::{EventLoop, Interest, TimerNext};
//!
//! let mut el = EventLoop::with_capacity(64).unwrap();
//!
//! // Watch a descriptor (any pollable fd works; sockets, pipes, ...).
//! # let (r, _w) = evloop::test_utils::pipe().unwrap();
//! # use std::os::fd::AsRawFd;
//! # let fd = r.as_raw_fd();
//! el.register(fd, Interest::READABLE, |el, fd, _fired| {
//!   // consume the readiness, or unregister and stop:
//!   el.unregister(fd, Interest::READABLE);
//! }).unwrap();
//!
//! // A one-shot timer that shuts the loop down.
//! el.add_timer(10, |el, _id| {
//!   el.stop();
//!   TimerNext::Stop
//! });
//!
//! el.run();
//! ```
//!
//! ## Dispatch Order
//!
//! Within one iteration every ready file callback runs before any timer
//! callback. File callbacks arrive in whatever order the kernel reports;
//! timers with equal deadlines fire in no particular order. A descriptor
//! registered for both directions with a single call gets its handler
//! invoked once per iteration even when both directions fire, with the
//! composite fired mask passed through.
//!
//! ## Error Reporting Quirk
//!
//! Descriptor errors and hang-ups are dispatched as *writable*, on the
//! grounds that the write-side handler owns the syscall that will surface
//! the error. Register a write handler on any descriptor whose failure you
//! care about.

#[macro_use]
mod macros;

mod backend;
mod clock;
mod error;
mod event;
mod reactor;
mod timer;
mod wait;

#[doc(hidden)]
pub mod test_utils;

pub use backend::{Backend, DefaultBackend, Select};
#[cfg(linux)]
pub use backend::Epoll;
#[cfg(solarish)]
pub use backend::EventPort;
#[cfg(bsd)]
pub use backend::Kqueue;
pub use clock::{ClockTime, SystemClock, TimeSource};
pub use error::Error;
pub use event::{Fired, Flags, Interest, TimerId, TimerNext};
pub use reactor::{EventLoop, FileCallback, TimerCallback, TimerFinalizer};
pub use wait::wait;
