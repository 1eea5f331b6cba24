//! Event masks, iterate flags and the small value types passed between the
//! event loop, its backends and user callbacks.

use std::os::fd::RawFd;

bitflags::bitflags! {
  /// The readiness classes a descriptor can be watched for, and the classes
  /// a backend reports as satisfied.
  ///
  /// An unregistered descriptor slot has an empty interest mask. Kernel
  /// error and hang-up conditions are folded into [`Interest::WRITABLE`] so
  /// that the write-side callback gets a chance to perform the failing read;
  /// see the backend contract in [`crate::Backend`].
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct Interest: u8 {
    const READABLE = 1 << 0;
    const WRITABLE = 1 << 1;
  }
}

bitflags::bitflags! {
  /// Selects what a single [`crate::EventLoop::iterate`] call processes.
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub struct Flags: u8 {
    /// Dispatch ready file descriptor callbacks.
    const FILE_EVENTS = 1 << 0;
    /// Dispatch expired timer callbacks.
    const TIME_EVENTS = 1 << 1;
    /// Never block: the poll runs with a zero timeout.
    const DONT_WAIT = 1 << 2;
    /// Both event classes, still allowed to sleep.
    const ALL = Self::FILE_EVENTS.bits() | Self::TIME_EVENTS.bits();
  }
}

/// One ready descriptor as reported by a backend poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
  pub fd: RawFd,
  /// Subset of the readiness classes the kernel reported satisfied.
  pub mask: Interest,
}

/// Handle for a scheduled timer, unique for the lifetime of its event loop.
///
/// Ids are handed out in strictly increasing order; callbacks are allowed
/// to rely on that (the dispatch pass uses it to skip timers created while
/// the pass is running).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub(crate) u64);

impl TimerId {
  pub fn as_u64(self) -> u64 {
    self.0
  }
}

impl std::fmt::Display for TimerId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

/// What a timer callback wants to happen to its timer after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerNext {
  /// One-shot: remove the timer, invoking its finalizer.
  Stop,
  /// Periodic: fire again this many milliseconds from now.
  After(u64),
}
