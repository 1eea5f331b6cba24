use std::cell::Cell;
use std::rc::Rc;

use evloop::{ClockTime, EventLoop, Flags, TimeSource, TimerNext};

/// Wall clock whose reading the test controls, with millisecond zero.
struct RewindableClock(Rc<Cell<i64>>);

impl TimeSource for RewindableClock {
  fn now(&self) -> ClockTime {
    ClockTime { seconds: self.0.get(), millis: 0 }
  }
}

fn loop_at(seconds: i64) -> (EventLoop, Rc<Cell<i64>>) {
  let time = Rc::new(Cell::new(seconds));
  let mut el = EventLoop::with_capacity(64).unwrap();
  // Installing the source adopts its reading as the regression baseline.
  el.set_time_source(RewindableClock(Rc::clone(&time)));
  (el, time)
}

#[test]
fn backwards_clock_jump_expires_every_pending_timer() {
  let (mut el, time) = loop_at(10_000);
  let fired = Rc::new(Cell::new(0));

  for delay in [1_000, 2_000] {
    let counter = Rc::clone(&fired);
    el.add_timer(delay, move |_, _| {
      counter.set(counter.get() + 1);
      TimerNext::Stop
    });
  }

  // Nothing is due at the frozen instant.
  assert_eq!(el.iterate(Flags::TIME_EVENTS | Flags::DONT_WAIT), 0);

  // Jump ten seconds into the past: both deadlines are forced due.
  time.set(9_990);
  assert_eq!(el.iterate(Flags::TIME_EVENTS | Flags::DONT_WAIT), 2);
  assert_eq!(fired.get(), 2);
}

#[test]
fn regressed_reading_becomes_the_new_baseline() {
  let (mut el, time) = loop_at(10_000);
  time.set(9_990);
  el.iterate(Flags::TIME_EVENTS | Flags::DONT_WAIT);

  // A timer scheduled against the regressed clock is not considered due:
  // the earlier jump was absorbed rather than re-detected.
  let fired = Rc::new(Cell::new(0));
  let counter = Rc::clone(&fired);
  el.add_timer(1_000, move |_, _| {
    counter.set(counter.get() + 1);
    TimerNext::Stop
  });
  assert_eq!(el.iterate(Flags::TIME_EVENTS | Flags::DONT_WAIT), 0);
  assert_eq!(fired.get(), 0);

  // Advancing past the deadline fires it normally.
  time.set(9_992);
  assert_eq!(el.iterate(Flags::TIME_EVENTS | Flags::DONT_WAIT), 1);
  assert_eq!(fired.get(), 1);
}
