//! The event loop: one thread of control multiplexing descriptor readiness
//! and millisecond timers.
//!
//! Each iteration computes the longest sleep that cannot miss a timer,
//! hands it to the backend poll, dispatches every ready descriptor, then
//! runs the expired timers. Callbacks run to completion on the loop's own
//! thread and may freely mutate the loop (register, unregister, cancel,
//! stop), including removing themselves; the dispatch paths re-validate
//! everything after every callback.

use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::Duration;

use crate::backend::{Backend, DefaultBackend};
use crate::clock::{SystemClock, TimeSource};
use crate::error::Error;
use crate::event::{Fired, Flags, Interest, TimerId, TimerNext};
use crate::timer::TimerSet;

/// Callback for a ready descriptor. Receives the loop, the descriptor and
/// the fired mask (which may be wider than the interest that matched).
pub type FileCallback = dyn Fn(&mut EventLoop, RawFd, Interest) + 'static;

/// Callback for an expired timer. The return value decides whether the
/// timer is removed or rescheduled.
pub type TimerCallback =
  dyn Fn(&mut EventLoop, TimerId) -> TimerNext + 'static;

/// Runs exactly once when a timer leaves the loop, whether through
/// [`TimerNext::Stop`], [`EventLoop::cancel_timer`] or teardown.
pub type TimerFinalizer = dyn FnOnce(&mut EventLoop) + 'static;

struct FileEvent {
  mask: Interest,
  read: Option<Rc<FileCallback>>,
  write: Option<Rc<FileCallback>>,
}

impl Default for FileEvent {
  fn default() -> Self {
    FileEvent { mask: Interest::empty(), read: None, write: None }
  }
}

/// A single-threaded reactor over one readiness backend.
///
/// The loop owns the file table, the timer set and the backend; callbacks
/// borrow it mutably for their whole run. It is deliberately `!Send`: all
/// registration and dispatch happen on one thread, and there is no
/// cross-thread wakeup.
pub struct EventLoop {
  capacity: usize,
  max_fd: Option<RawFd>,
  files: Vec<FileEvent>,
  ready: Vec<Fired>,
  timers: TimerSet,
  last_tick_seconds: i64,
  stop: bool,
  before_sleep: Option<Box<dyn FnMut(&mut EventLoop)>>,
  clock: Box<dyn TimeSource>,
  backend: Box<dyn Backend>,
}

impl EventLoop {
  /// Creates a loop able to track descriptors in `0..capacity`, driven by
  /// the build-time default backend.
  pub fn with_capacity(capacity: usize) -> Result<EventLoop, Error> {
    let backend = DefaultBackend::new(capacity).map_err(Error::Backend)?;
    Ok(Self::with_backend(capacity, Box::new(backend)))
  }

  /// Creates a loop over an already-constructed backend. This is the
  /// runtime-selection escape hatch; `with_capacity` is the normal path.
  pub fn with_backend(
    capacity: usize,
    backend: Box<dyn Backend>,
  ) -> EventLoop {
    let clock = Box::new(SystemClock);
    let last_tick_seconds = clock.now().seconds;
    log::debug!("event loop using {} (capacity {capacity})", backend.name());
    EventLoop {
      capacity,
      max_fd: None,
      files: std::iter::repeat_with(FileEvent::default)
        .take(capacity)
        .collect(),
      ready: Vec::with_capacity(capacity),
      timers: TimerSet::new(),
      last_tick_seconds,
      stop: false,
      before_sleep: None,
      clock,
      backend,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Short name of the readiness backend in use, for diagnostics.
  pub fn backend_name(&self) -> &'static str {
    self.backend.name()
  }

  /// Replaces the wall-clock source. Meant for tests and virtual-time
  /// setups; the default reads `gettimeofday(2)`.
  ///
  /// The new source's current reading becomes the regression baseline, so
  /// switching clocks is not itself mistaken for a backwards jump.
  pub fn set_time_source(&mut self, source: impl TimeSource + 'static) {
    self.last_tick_seconds = source.now().seconds;
    self.clock = Box::new(source);
  }

  /// Changes the file table capacity.
  ///
  /// Fails with [`Error::Busy`] while a descriptor at or above the new
  /// capacity is registered. The backend is resized before the tables are
  /// reallocated; doing it the other way around would strand backend state
  /// when the backend rejects the new size.
  pub fn resize(&mut self, capacity: usize) -> Result<(), Error> {
    if capacity == self.capacity {
      return Ok(());
    }
    if let Some(max_fd) = self.max_fd {
      if max_fd as usize >= capacity {
        return Err(Error::Busy { max_fd, requested: capacity });
      }
    }
    self.backend.resize(capacity).map_err(Error::Backend)?;
    self.files.resize_with(capacity, FileEvent::default);
    self.ready.clear();
    self.capacity = capacity;
    Ok(())
  }

  /// Watches `fd` for the readiness classes in `mask`.
  ///
  /// The mask is unioned into any existing interest. `callback` becomes the
  /// handler for every class in `mask`, so registering both classes in one
  /// call installs one handler that fires once per iteration with the
  /// composite fired mask; registering read and write separately installs
  /// two independent handlers.
  ///
  /// All-or-nothing: when the backend refuses the registration the table
  /// is left untouched.
  pub fn register<F>(
    &mut self,
    fd: RawFd,
    mask: Interest,
    callback: F,
  ) -> Result<(), Error>
  where
    F: Fn(&mut EventLoop, RawFd, Interest) + 'static,
  {
    if fd < 0 || fd as usize >= self.capacity {
      return Err(Error::OutOfRange { fd, capacity: self.capacity });
    }
    debug_assert!(!mask.is_empty(), "registration with an empty mask");
    if mask.is_empty() {
      return Ok(());
    }

    let prev = self.files[fd as usize].mask;
    self.backend.add(fd, mask, prev).map_err(Error::Backend)?;

    let callback: Rc<FileCallback> = Rc::new(callback);
    let slot = &mut self.files[fd as usize];
    slot.mask |= mask;
    if mask.contains(Interest::READABLE) {
      slot.read = Some(Rc::clone(&callback));
    }
    if mask.contains(Interest::WRITABLE) {
      slot.write = Some(callback);
    }
    if self.max_fd.is_none_or(|max_fd| fd > max_fd) {
      self.max_fd = Some(fd);
    }
    Ok(())
  }

  /// Stops watching `fd` for the classes in `mask`. A no-op for
  /// out-of-range or unregistered descriptors.
  pub fn unregister(&mut self, fd: RawFd, mask: Interest) {
    if fd < 0 || fd as usize >= self.capacity {
      return;
    }
    let prev = self.files[fd as usize].mask;
    if prev.is_empty() {
      return;
    }
    if let Err(err) = self.backend.remove(fd, mask, prev) {
      log::debug!("{}: removing fd {fd} failed: {err}", self.backend.name());
    }

    let slot = &mut self.files[fd as usize];
    slot.mask &= !mask;
    if !slot.mask.contains(Interest::READABLE) {
      slot.read = None;
    }
    if !slot.mask.contains(Interest::WRITABLE) {
      slot.write = None;
    }
    if Some(fd) == self.max_fd && slot.mask.is_empty() {
      // Unregistration is off the hot path; a downward scan is fine.
      self.max_fd = (0..fd)
        .rev()
        .find(|&j| !self.files[j as usize].mask.is_empty());
    }
  }

  /// The interest currently registered for `fd`; empty when the slot is
  /// unregistered or out of range.
  pub fn interest(&self, fd: RawFd) -> Interest {
    if fd < 0 || fd as usize >= self.capacity {
      return Interest::empty();
    }
    self.files[fd as usize].mask
  }

  /// Schedules `callback` to run `delay_ms` milliseconds from now.
  ///
  /// The callback's [`TimerNext`] return decides between one-shot removal
  /// and periodic rescheduling. Ids are unique and strictly increasing for
  /// the life of the loop.
  pub fn add_timer<F>(&mut self, delay_ms: u64, callback: F) -> TimerId
  where
    F: Fn(&mut EventLoop, TimerId) -> TimerNext + 'static,
  {
    let when = self.clock.now().add_ms(delay_ms);
    self.timers.create(when, Rc::new(callback), None)
  }

  /// Like [`EventLoop::add_timer`], with a finalizer that runs exactly once
  /// when the timer leaves the loop for any reason.
  pub fn add_timer_with_finalizer<F, G>(
    &mut self,
    delay_ms: u64,
    callback: F,
    finalizer: G,
  ) -> TimerId
  where
    F: Fn(&mut EventLoop, TimerId) -> TimerNext + 'static,
    G: FnOnce(&mut EventLoop) + 'static,
  {
    let when = self.clock.now().add_ms(delay_ms);
    self.timers.create(when, Rc::new(callback), Some(Box::new(finalizer)))
  }

  /// Removes a pending timer, running its finalizer.
  pub fn cancel_timer(&mut self, id: TimerId) -> Result<(), Error> {
    match self.timers.remove(id) {
      Some(node) => {
        let node = *node;
        if let Some(finalizer) = node.finalizer {
          finalizer(self);
        }
        Ok(())
      }
      None => Err(Error::NotFound(id)),
    }
  }

  /// Runs one iteration: compute the poll timeout, poll the backend,
  /// dispatch ready files, then dispatch expired timers. Returns how many
  /// events were processed.
  ///
  /// With [`Flags::DONT_WAIT`] the poll runs with a zero timeout and only
  /// already-due work is dispatched. A backend poll failure is not fatal:
  /// it yields zero ready descriptors for this iteration and the timer
  /// pass still runs.
  pub fn iterate(&mut self, flags: Flags) -> usize {
    let mut processed = 0;
    if !flags.intersects(Flags::ALL) {
      return 0;
    }
    let want_timers = flags.contains(Flags::TIME_EVENTS);
    let dont_wait = flags.contains(Flags::DONT_WAIT);

    // Poll even with no file events registered whenever timers may need
    // the sleep; the backend timeout is the primitive timer here.
    if self.max_fd.is_some() || (want_timers && !dont_wait) {
      let shortest = if want_timers && !dont_wait {
        self.timers.earliest()
      } else {
        None
      };
      let timeout = match shortest {
        Some(when) => {
          Some(when.saturating_duration_since(self.clock.now()))
        }
        None if dont_wait => Some(Duration::ZERO),
        None => None,
      };

      let mut ready = std::mem::take(&mut self.ready);
      let n = match self.backend.poll(timeout, &mut ready) {
        Ok(n) => n,
        Err(err) => {
          log::warn!("{}: poll failed: {err}", self.backend.name());
          0
        }
      };

      for i in 0..n {
        let Fired { fd, mask: fired } = ready[i];
        let idx = fd as usize;

        // An earlier callback in this same batch may have dropped this
        // slot's interest; only the still-armed subset is dispatched. The
        // write handler and the same-handler identity are captured before
        // the read callback runs: a handler shared by both classes must
        // fire at most once per iteration, even when its read invocation
        // unregisters part of the slot.
        let (read_cb, write_cb, same_handler) = match self.files.get(idx) {
          Some(slot) => {
            let read_cb = (slot.mask & fired)
              .contains(Interest::READABLE)
              .then(|| slot.read.clone())
              .flatten();
            let same_handler = match (&slot.read, &slot.write) {
              (Some(read), Some(write)) => Rc::ptr_eq(read, write),
              _ => false,
            };
            (read_cb, slot.write.clone(), same_handler)
          }
          None => (None, None, false),
        };

        let mut read_fired = false;
        if let Some(callback) = read_cb {
          read_fired = true;
          callback(self, fd, fired);
        }

        if let Some(callback) = write_cb {
          // The armed mask is re-read: the read callback may have dropped
          // the write interest.
          let still_armed = self.files.get(idx).is_some_and(|slot| {
            (slot.mask & fired).contains(Interest::WRITABLE)
          });
          if still_armed && (!read_fired || !same_handler) {
            callback(self, fd, fired);
          }
        }
        processed += 1;
      }
      self.ready = ready;
    }

    if want_timers {
      processed += self.process_timers();
    }
    processed
  }

  /// One timer expiration pass. Restarts from the list head after every
  /// callback (the callback may have rewritten the list arbitrarily) and
  /// skips timers created during the pass so a callback scheduling timers
  /// cannot starve the loop.
  fn process_timers(&mut self) -> usize {
    let mut processed = 0;

    // A wall clock that moved backwards would delay deadlines by the jump;
    // firing everything now is the lesser evil.
    let now_seconds = self.clock.now().seconds;
    if now_seconds < self.last_tick_seconds {
      self.timers.force_expire_all();
    }
    self.last_tick_seconds = now_seconds;

    let Some(max_id) = self.timers.latest_id() else {
      return 0;
    };
    loop {
      let now = self.clock.now();
      let Some((id, callback)) = self.timers.first_due(now, max_id) else {
        break;
      };
      let next = callback(self, id);
      processed += 1;
      match next {
        TimerNext::After(delay_ms) => {
          let when = self.clock.now().add_ms(delay_ms);
          // Gone when the callback cancelled its own timer.
          self.timers.reschedule(id, when);
        }
        TimerNext::Stop => {
          if let Some(node) = self.timers.remove(id) {
            let node = *node;
            if let Some(finalizer) = node.finalizer {
              finalizer(self);
            }
          }
        }
      }
    }
    processed
  }

  /// Dispatches events until [`EventLoop::stop`] is called, invoking the
  /// before-sleep hook at the top of every iteration.
  pub fn run(&mut self) {
    self.stop = false;
    while !self.stop {
      if let Some(mut hook) = self.before_sleep.take() {
        hook(self);
        // The hook may have installed a replacement for itself.
        if self.before_sleep.is_none() {
          self.before_sleep = Some(hook);
        }
      }
      self.iterate(Flags::ALL);
    }
  }

  /// Makes [`EventLoop::run`] return after the current iteration. Safe to
  /// call from any callback.
  pub fn stop(&mut self) {
    self.stop = true;
  }

  /// Installs a hook invoked at the top of every [`EventLoop::run`]
  /// iteration, before the poll.
  pub fn set_before_sleep<F>(&mut self, hook: F)
  where
    F: FnMut(&mut EventLoop) + 'static,
  {
    self.before_sleep = Some(Box::new(hook));
  }
}

impl Drop for EventLoop {
  fn drop(&mut self) {
    // Pending timers still get their finalizers on teardown. A finalizer
    // may schedule new timers; keep draining until the set stays empty.
    loop {
      let Some(mut head) = self.timers.take_all() else {
        break;
      };
      loop {
        let next = head.next.take();
        if let Some(finalizer) = head.finalizer.take() {
          finalizer(self);
        }
        match next {
          Some(node) => head = node,
          None => break,
        }
      }
    }
  }
}
