use std::cell::{Cell, RefCell};
use std::os::fd::AsRawFd;
use std::rc::Rc;

use evloop::test_utils::{pipe, write_byte};
use evloop::{EventLoop, Flags, Interest, TimerNext};

#[test]
fn iterate_with_no_flags_does_nothing() {
  let mut el = EventLoop::with_capacity(64).unwrap();
  assert_eq!(el.iterate(Flags::empty()), 0);
}

#[test]
fn iterate_dont_wait_on_an_empty_loop_returns_zero() {
  let mut el = EventLoop::with_capacity(64).unwrap();
  assert_eq!(el.iterate(Flags::ALL | Flags::DONT_WAIT), 0);
}

#[test]
fn single_readable_descriptor_is_dispatched() {
  let (r, w) = pipe().unwrap();
  let seen = Rc::new(Cell::new(-1));
  let slot = Rc::clone(&seen);

  let mut el = EventLoop::with_capacity(1024).unwrap();
  el.register(r.as_raw_fd(), Interest::READABLE, move |_, fd, _| {
    slot.set(fd);
  })
  .unwrap();

  write_byte(w.as_raw_fd()).unwrap();
  assert_eq!(el.iterate(Flags::FILE_EVENTS | Flags::DONT_WAIT), 1);
  assert_eq!(seen.get(), r.as_raw_fd());
}

#[test]
fn write_interest_on_a_writable_socket_fires_immediately() {
  let (a, _b) = evloop::test_utils::socket_pair().unwrap();
  let fired = Rc::new(Cell::new(Interest::empty()));
  let slot = Rc::clone(&fired);

  let mut el = EventLoop::with_capacity(1024).unwrap();
  el.register(a.as_raw_fd(), Interest::WRITABLE, move |_, _, mask| {
    slot.set(mask);
  })
  .unwrap();

  assert_eq!(el.iterate(Flags::FILE_EVENTS | Flags::DONT_WAIT), 1);
  assert!(fired.get().contains(Interest::WRITABLE));
}

#[test]
fn hangup_is_reported_to_the_write_handler() {
  let (r, w) = pipe().unwrap();
  let fired = Rc::new(Cell::new(Interest::empty()));
  let slot = Rc::clone(&fired);

  let mut el = EventLoop::with_capacity(1024).unwrap();
  // The read end of a pipe never becomes plainly writable; only the
  // peer-close condition can wake this registration up.
  el.register(r.as_raw_fd(), Interest::WRITABLE, move |_, _, mask| {
    slot.set(mask);
  })
  .unwrap();

  assert_eq!(el.iterate(Flags::FILE_EVENTS | Flags::DONT_WAIT), 0);

  drop(w);
  assert_eq!(el.iterate(Flags::FILE_EVENTS | Flags::DONT_WAIT), 1);
  assert!(fired.get().contains(Interest::WRITABLE));
}

#[test]
fn file_callbacks_run_before_timer_callbacks() {
  let (r, w) = pipe().unwrap();
  let order = Rc::new(RefCell::new(Vec::new()));

  let mut el = EventLoop::with_capacity(1024).unwrap();
  let file_order = Rc::clone(&order);
  el.register(r.as_raw_fd(), Interest::READABLE, move |_, _, _| {
    file_order.borrow_mut().push("file");
  })
  .unwrap();
  let timer_order = Rc::clone(&order);
  el.add_timer(0, move |_, _| {
    timer_order.borrow_mut().push("timer");
    TimerNext::Stop
  });

  write_byte(w.as_raw_fd()).unwrap();
  assert_eq!(el.iterate(Flags::ALL | Flags::DONT_WAIT), 2);
  assert_eq!(*order.borrow(), vec!["file", "timer"]);
}
