use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;
use std::{io, ptr};

use super::Backend;
use crate::event::{Fired, Interest};

/// Readiness backend over Solaris/illumos event ports.
///
/// Event ports are one-shot: a descriptor is dissociated the moment the
/// kernel reports it. The backend mirrors the armed mask per fd and keeps
/// the descriptors returned by the last wake-up on a re-association list,
/// re-arming them at the top of the next poll.
pub struct EventPort {
  port: OwnedFd,
  masks: Vec<Interest>,
  pending: Vec<RawFd>,
  events: Vec<libc::port_event>,
}

impl EventPort {
  pub fn new(capacity: usize) -> io::Result<EventPort> {
    let port = unsafe { OwnedFd::from_raw_fd(syscall!(port_create())?) };
    Ok(EventPort {
      port,
      masks: vec![Interest::empty(); capacity],
      pending: Vec::new(),
      events: vec![unsafe { std::mem::zeroed() }; capacity],
    })
  }

  fn poll_bits(mask: Interest) -> libc::c_int {
    let mut bits = 0;
    if mask.contains(Interest::READABLE) {
      bits |= libc::POLLIN as libc::c_int;
    }
    if mask.contains(Interest::WRITABLE) {
      bits |= libc::POLLOUT as libc::c_int;
    }
    bits
  }

  fn associate(&self, fd: RawFd, mask: Interest) -> io::Result<()> {
    syscall!(port_associate(
      self.port.as_raw_fd(),
      libc::PORT_SOURCE_FD,
      fd as libc::uintptr_t,
      Self::poll_bits(mask),
      ptr::null_mut(),
    ))?;
    Ok(())
  }
}

impl Backend for EventPort {
  fn add(
    &mut self,
    fd: RawFd,
    mask: Interest,
    prev: Interest,
  ) -> io::Result<()> {
    let merged = prev | mask;
    self.associate(fd, merged)?;
    self.masks[fd as usize] = merged;
    Ok(())
  }

  fn remove(
    &mut self,
    fd: RawFd,
    mask: Interest,
    prev: Interest,
  ) -> io::Result<()> {
    let remaining = prev & !mask;
    self.masks[fd as usize] = remaining;
    self.pending.retain(|&p| p != fd);
    if remaining.is_empty() {
      // The kernel may already have dissociated the fd when it fired.
      let _ = syscall!(port_dissociate(
        self.port.as_raw_fd(),
        libc::PORT_SOURCE_FD,
        fd as libc::uintptr_t,
      ));
      Ok(())
    } else {
      self.associate(fd, remaining)
    }
  }

  fn resize(&mut self, capacity: usize) -> io::Result<()> {
    self.masks.resize(capacity, Interest::empty());
    self.events.resize(capacity, unsafe { std::mem::zeroed() });
    Ok(())
  }

  fn poll(
    &mut self,
    timeout: Option<Duration>,
    ready: &mut Vec<Fired>,
  ) -> io::Result<usize> {
    // Re-arm everything the previous wake-up dissociated.
    for fd in std::mem::take(&mut self.pending) {
      let mask = self.masks[fd as usize];
      if !mask.is_empty() {
        self.associate(fd, mask)?;
      }
    }

    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    let tsp = match timeout {
      Some(d) => {
        ts.tv_sec = d.as_secs() as libc::time_t;
        ts.tv_nsec = d.subsec_nanos() as libc::c_long;
        &mut ts as *mut libc::timespec
      }
      None => ptr::null_mut(),
    };

    let mut nget: libc::c_uint = 1;
    let rv = unsafe {
      libc::port_getn(
        self.port.as_raw_fd(),
        self.events.as_mut_ptr(),
        self.events.len() as libc::c_uint,
        &mut nget,
        tsp,
      )
    };
    if rv == -1 {
      let err = io::Error::last_os_error();
      match err.raw_os_error() {
        // port_getn reports a timeout or interruption through errno even
        // when it has already delivered events; nget holds the real count.
        Some(libc::ETIME) | Some(libc::EINTR) => {}
        _ => return Err(err),
      }
    }

    ready.clear();
    for ev in &self.events[..nget as usize] {
      let fd = ev.portev_object as RawFd;
      let bits = ev.portev_events as libc::c_int;
      let mut mask = Interest::empty();
      if bits & libc::POLLIN as libc::c_int != 0 {
        mask |= Interest::READABLE;
      }
      if bits & (libc::POLLOUT | libc::POLLERR | libc::POLLHUP) as libc::c_int
        != 0
      {
        mask |= Interest::WRITABLE;
      }
      ready.push(Fired { fd, mask });
      self.pending.push(fd);
    }
    Ok(ready.len())
  }

  fn name(&self) -> &'static str {
    "evport"
  }
}
