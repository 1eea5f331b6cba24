use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use super::Backend;
use crate::event::{Fired, Interest};

/// Readiness backend over Linux `epoll(7)`, level-triggered.
pub struct Epoll {
  epfd: OwnedFd,
  events: Vec<libc::epoll_event>,
}

impl Epoll {
  pub fn new(capacity: usize) -> io::Result<Epoll> {
    let epfd = unsafe {
      let fd = syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?;
      OwnedFd::from_raw_fd(fd)
    };
    Ok(Epoll { epfd, events: vec![unsafe { std::mem::zeroed() }; capacity] })
  }

  fn event_bits(mask: Interest) -> u32 {
    let mut bits = 0u32;
    if mask.contains(Interest::READABLE) {
      bits |= libc::EPOLLIN as u32;
    }
    if mask.contains(Interest::WRITABLE) {
      bits |= libc::EPOLLOUT as u32;
    }
    bits
  }
}

impl Backend for Epoll {
  fn add(
    &mut self,
    fd: RawFd,
    mask: Interest,
    prev: Interest,
  ) -> io::Result<()> {
    // A slot that already has interest armed is modified, not re-added.
    let op = if prev.is_empty() {
      libc::EPOLL_CTL_ADD
    } else {
      libc::EPOLL_CTL_MOD
    };
    let mut ev = libc::epoll_event {
      events: Self::event_bits(prev | mask),
      u64: fd as u64,
    };
    syscall!(epoll_ctl(self.epfd.as_raw_fd(), op, fd, &mut ev))?;
    Ok(())
  }

  fn remove(
    &mut self,
    fd: RawFd,
    mask: Interest,
    prev: Interest,
  ) -> io::Result<()> {
    let remaining = prev & !mask;
    let mut ev = libc::epoll_event {
      events: Self::event_bits(remaining),
      u64: fd as u64,
    };
    let op = if remaining.is_empty() {
      libc::EPOLL_CTL_DEL
    } else {
      libc::EPOLL_CTL_MOD
    };
    syscall!(epoll_ctl(self.epfd.as_raw_fd(), op, fd, &mut ev))?;
    Ok(())
  }

  fn resize(&mut self, capacity: usize) -> io::Result<()> {
    self.events.resize(capacity, unsafe { std::mem::zeroed() });
    Ok(())
  }

  fn poll(
    &mut self,
    timeout: Option<Duration>,
    ready: &mut Vec<Fired>,
  ) -> io::Result<usize> {
    let timeout_ms = match timeout {
      Some(d) => d.as_millis().min(i32::MAX as u128) as i32,
      None => -1,
    };

    let n = syscall!(epoll_wait(
      self.epfd.as_raw_fd(),
      self.events.as_mut_ptr(),
      self.events.len() as i32,
      timeout_ms,
    ))? as usize;

    ready.clear();
    for ev in &self.events[..n] {
      let mut mask = Interest::empty();
      if ev.events & libc::EPOLLIN as u32 != 0 {
        mask |= Interest::READABLE;
      }
      if ev.events & libc::EPOLLOUT as u32 != 0 {
        mask |= Interest::WRITABLE;
      }
      // Errors and hang-ups surface on the write side.
      if ev.events & (libc::EPOLLERR | libc::EPOLLHUP) as u32 != 0 {
        mask |= Interest::WRITABLE;
      }
      ready.push(Fired { fd: ev.u64 as RawFd, mask });
    }
    Ok(n)
  }

  fn name(&self) -> &'static str {
    "epoll"
  }
}
