use std::io;
use std::mem::MaybeUninit;
use std::os::fd::RawFd;
use std::time::Duration;

use super::Backend;
use crate::event::{Fired, Interest};

/// Readiness backend over `select(2)`, the lowest common denominator.
///
/// Kept for kernels with nothing better and always compiled so tests can
/// exercise it anywhere. `select` hands back whole descriptor sets rather
/// than a ready list, so this backend mirrors the armed interest per fd and
/// walks `0..=max_fd` after each wake-up. Capacity is capped by
/// `FD_SETSIZE`.
pub struct Select {
  rfds: libc::fd_set,
  wfds: libc::fd_set,
  masks: Vec<Interest>,
  max_fd: RawFd,
}

fn zeroed_set() -> libc::fd_set {
  let mut set = MaybeUninit::<libc::fd_set>::uninit();
  unsafe {
    libc::FD_ZERO(set.as_mut_ptr());
    set.assume_init()
  }
}

impl Select {
  pub fn new(capacity: usize) -> io::Result<Select> {
    if capacity > libc::FD_SETSIZE {
      return Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("select supports at most {} descriptors", libc::FD_SETSIZE),
      ));
    }
    Ok(Select {
      rfds: zeroed_set(),
      wfds: zeroed_set(),
      masks: vec![Interest::empty(); capacity],
      max_fd: -1,
    })
  }
}

impl Backend for Select {
  fn add(
    &mut self,
    fd: RawFd,
    mask: Interest,
    prev: Interest,
  ) -> io::Result<()> {
    unsafe {
      if mask.contains(Interest::READABLE) {
        libc::FD_SET(fd, &mut self.rfds);
      }
      if mask.contains(Interest::WRITABLE) {
        libc::FD_SET(fd, &mut self.wfds);
      }
    }
    self.masks[fd as usize] = prev | mask;
    self.max_fd = self.max_fd.max(fd);
    Ok(())
  }

  fn remove(
    &mut self,
    fd: RawFd,
    mask: Interest,
    prev: Interest,
  ) -> io::Result<()> {
    unsafe {
      if mask.contains(Interest::READABLE) {
        libc::FD_CLR(fd, &mut self.rfds);
      }
      if mask.contains(Interest::WRITABLE) {
        libc::FD_CLR(fd, &mut self.wfds);
      }
    }
    self.masks[fd as usize] = prev & !mask;
    if fd == self.max_fd && self.masks[fd as usize].is_empty() {
      self.max_fd = (0..fd)
        .rev()
        .find(|&j| !self.masks[j as usize].is_empty())
        .unwrap_or(-1);
    }
    Ok(())
  }

  fn resize(&mut self, capacity: usize) -> io::Result<()> {
    if capacity > libc::FD_SETSIZE {
      return Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("select supports at most {} descriptors", libc::FD_SETSIZE),
      ));
    }
    self.masks.resize(capacity, Interest::empty());
    Ok(())
  }

  fn poll(
    &mut self,
    timeout: Option<Duration>,
    ready: &mut Vec<Fired>,
  ) -> io::Result<usize> {
    // select mutates its sets in place; work on copies.
    let mut rfds = self.rfds;
    let mut wfds = self.wfds;

    let mut tv = libc::timeval { tv_sec: 0, tv_usec: 0 };
    let tvp = match timeout {
      Some(d) => {
        tv.tv_sec = d.as_secs() as libc::time_t;
        tv.tv_usec = d.subsec_micros() as libc::suseconds_t;
        &mut tv as *mut libc::timeval
      }
      None => std::ptr::null_mut(),
    };

    let n = syscall!(select(
      self.max_fd + 1,
      &mut rfds,
      &mut wfds,
      std::ptr::null_mut(),
      tvp,
    ))?;

    ready.clear();
    if n > 0 {
      for fd in 0..=self.max_fd {
        let armed = self.masks[fd as usize];
        if armed.is_empty() {
          continue;
        }
        let mut fired = Interest::empty();
        unsafe {
          if armed.contains(Interest::READABLE) && libc::FD_ISSET(fd, &rfds) {
            fired |= Interest::READABLE;
          }
          if armed.contains(Interest::WRITABLE) && libc::FD_ISSET(fd, &wfds) {
            fired |= Interest::WRITABLE;
          }
        }
        if !fired.is_empty() {
          ready.push(Fired { fd, mask: fired });
        }
      }
    }
    Ok(ready.len())
  }

  fn name(&self) -> &'static str {
    "select"
  }
}
