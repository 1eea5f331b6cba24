use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;
use std::{io, ptr};

use super::Backend;
use crate::event::{Fired, Interest};

/// Readiness backend over BSD `kqueue(2)`.
///
/// Read and write interest are separate kernel filters, so one descriptor
/// with both classes satisfied comes back as two events; the fired masks
/// are merged per descriptor into the ready list.
pub struct Kqueue {
  kqfd: OwnedFd,
  events: Vec<libc::kevent>,
}

impl Kqueue {
  pub fn new(capacity: usize) -> io::Result<Kqueue> {
    let kqfd = unsafe { OwnedFd::from_raw_fd(syscall!(kqueue())?) };
    Ok(Kqueue { kqfd, events: vec![unsafe { std::mem::zeroed() }; capacity] })
  }

  fn change(
    &self,
    fd: RawFd,
    filter: i16,
    flags: u16,
  ) -> io::Result<libc::c_int> {
    let kev = libc::kevent {
      ident: fd as libc::uintptr_t,
      filter,
      flags,
      fflags: 0,
      data: 0,
      udata: ptr::null_mut(),
    };
    syscall!(kevent(
      self.kqfd.as_raw_fd(),
      &kev as *const libc::kevent,
      1,
      ptr::null_mut(),
      0,
      ptr::null(),
    ))
  }
}

impl Backend for Kqueue {
  fn add(
    &mut self,
    fd: RawFd,
    mask: Interest,
    _prev: Interest,
  ) -> io::Result<()> {
    if mask.contains(Interest::READABLE) {
      self.change(fd, libc::EVFILT_READ, libc::EV_ADD)?;
    }
    if mask.contains(Interest::WRITABLE) {
      self.change(fd, libc::EVFILT_WRITE, libc::EV_ADD)?;
    }
    Ok(())
  }

  fn remove(
    &mut self,
    fd: RawFd,
    mask: Interest,
    _prev: Interest,
  ) -> io::Result<()> {
    if mask.contains(Interest::READABLE) {
      self.change(fd, libc::EVFILT_READ, libc::EV_DELETE)?;
    }
    if mask.contains(Interest::WRITABLE) {
      self.change(fd, libc::EVFILT_WRITE, libc::EV_DELETE)?;
    }
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
    let ts;
    let tsp = match timeout {
      Some(d) => {
        ts = libc::timespec {
          tv_sec: d.as_secs() as libc::time_t,
          tv_nsec: d.subsec_nanos() as libc::c_long,
        };
        &ts as *const libc::timespec
      }
      None => ptr::null(),
    };

    let n = syscall!(kevent(
      self.kqfd.as_raw_fd(),
      ptr::null(),
      0,
      self.events.as_mut_ptr(),
      self.events.len() as libc::c_int,
      tsp,
    ))? as usize;

    ready.clear();
    for ev in &self.events[..n] {
      let fd = ev.ident as RawFd;
      let mut mask = match ev.filter {
        libc::EVFILT_READ => Interest::READABLE,
        libc::EVFILT_WRITE => Interest::WRITABLE,
        _ => Interest::empty(),
      };
      if ev.flags & libc::EV_ERROR != 0 {
        mask |= Interest::WRITABLE;
      }
      match ready.iter_mut().find(|fired| fired.fd == fd) {
        Some(fired) => fired.mask |= mask,
        None => ready.push(Fired { fd, mask }),
      }
    }
    Ok(ready.len())
  }

  fn name(&self) -> &'static str {
    "kqueue"
  }
}
