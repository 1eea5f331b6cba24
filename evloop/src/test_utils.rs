//! Descriptor helpers for integration tests.
//!
//! Only meant for this crate's own test suite; the API is not stable.

use std::io;
use std::os::fd::{AsRawFd, RawFd};

/// RAII wrapper closing a raw descriptor on drop.
pub struct TestFd(RawFd);

impl AsRawFd for TestFd {
  fn as_raw_fd(&self) -> RawFd {
    self.0
  }
}

impl Drop for TestFd {
  fn drop(&mut self) {
    let _ = syscall!(close(self.0));
  }
}

/// Creates a non-blocking pipe, returned as `(read_end, write_end)`.
#[doc(hidden)]
pub fn pipe() -> io::Result<(TestFd, TestFd)> {
  let mut fds = [0i32; 2];
  syscall!(pipe(fds.as_mut_ptr()))?;
  let pair = (TestFd(fds[0]), TestFd(fds[1]));
  make_nonblocking(fds[0])?;
  make_nonblocking(fds[1])?;
  Ok(pair)
}

/// Creates a connected non-blocking Unix stream socket pair.
#[doc(hidden)]
pub fn socket_pair() -> io::Result<(TestFd, TestFd)> {
  let mut fds = [0i32; 2];
  syscall!(socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()))?;
  let pair = (TestFd(fds[0]), TestFd(fds[1]));
  make_nonblocking(fds[0])?;
  make_nonblocking(fds[1])?;
  Ok(pair)
}

#[doc(hidden)]
pub fn make_nonblocking(fd: RawFd) -> io::Result<()> {
  let flags = syscall!(fcntl(fd, libc::F_GETFL))?;
  syscall!(fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK))?;
  Ok(())
}

/// Writes a single byte, making the peer readable.
#[doc(hidden)]
pub fn write_byte(fd: RawFd) -> io::Result<()> {
  let byte = 1u8;
  syscall!(write(fd, &byte as *const u8 as *const libc::c_void, 1))?;
  Ok(())
}

/// Drains one byte written by [`write_byte`].
#[doc(hidden)]
pub fn read_byte(fd: RawFd) -> io::Result<()> {
  let mut byte = 0u8;
  syscall!(read(fd, &mut byte as *mut u8 as *mut libc::c_void, 1))?;
  Ok(())
}
