//! One-shot blocking wait on a single descriptor, independent of any event
//! loop.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::event::Interest;

/// Blocks until `fd` satisfies part of `mask` or `timeout` lapses, using a
/// direct `poll(2)` call. `None` blocks indefinitely.
///
/// Returns the fired subset, empty on timeout. Error and hang-up conditions
/// are reported as [`Interest::WRITABLE`] regardless of the requested mask,
/// matching the event loop's dispatch convention.
pub fn wait(
  fd: RawFd,
  mask: Interest,
  timeout: Option<Duration>,
) -> io::Result<Interest> {
  let mut pfd = libc::pollfd { fd, events: 0, revents: 0 };
  if mask.contains(Interest::READABLE) {
    pfd.events |= libc::POLLIN;
  }
  if mask.contains(Interest::WRITABLE) {
    pfd.events |= libc::POLLOUT;
  }

  let timeout_ms = match timeout {
    Some(d) => d.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
    None => -1,
  };

  let n = syscall!(poll(&mut pfd, 1, timeout_ms))?;

  let mut fired = Interest::empty();
  if n == 1 {
    if pfd.revents & libc::POLLIN != 0 {
      fired |= Interest::READABLE;
    }
    if pfd.revents & (libc::POLLOUT | libc::POLLERR | libc::POLLHUP) != 0 {
      fired |= Interest::WRITABLE;
    }
  }
  Ok(fired)
}
