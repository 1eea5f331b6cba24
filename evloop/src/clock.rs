//! Millisecond wall-clock time.
//!
//! The loop's deadline arithmetic runs on `(seconds, milliseconds)` pairs
//! read from the system wall clock. The clock is *not* assumed monotonic;
//! the timer pass in [`crate::EventLoop`] detects backwards jumps and
//! expires everything pending when one happens.

use std::time::Duration;

/// An absolute wall-clock instant with millisecond precision.
///
/// Ordering is lexicographic on `(seconds, millis)`, which is exactly
/// "earlier deadline sorts first".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClockTime {
  pub seconds: i64,
  /// Always in `0..1000`.
  pub millis: i64,
}

impl ClockTime {
  /// The instant `delay_ms` milliseconds after `self`, carrying millisecond
  /// overflow into the seconds part.
  pub fn add_ms(self, delay_ms: u64) -> ClockTime {
    let mut seconds = self.seconds + (delay_ms / 1000) as i64;
    let mut millis = self.millis + (delay_ms % 1000) as i64;
    if millis >= 1000 {
      seconds += 1;
      millis -= 1000;
    }
    ClockTime { seconds, millis }
  }

  /// How long until `self`, measured from `earlier`. Zero if `self` has
  /// already passed, so the result can feed a poll timeout directly.
  pub fn saturating_duration_since(self, earlier: ClockTime) -> Duration {
    let ms = (self.seconds - earlier.seconds) * 1000
      + (self.millis - earlier.millis);
    Duration::from_millis(ms.max(0) as u64)
  }
}

/// Source of wall-clock readings.
///
/// The event loop owns one of these as a trait object so tests and
/// virtual-time setups can substitute their own via
/// [`crate::EventLoop::set_time_source`].
pub trait TimeSource {
  fn now(&self) -> ClockTime;
}

/// The real wall clock, read with `gettimeofday(2)`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
  fn now(&self) -> ClockTime {
    let mut tv = libc::timeval { tv_sec: 0, tv_usec: 0 };
    // Cannot fail with a valid pointer and a null timezone.
    let _ = syscall!(gettimeofday(&mut tv, std::ptr::null_mut()));
    ClockTime { seconds: tv.tv_sec as i64, millis: tv.tv_usec as i64 / 1000 }
  }
}
