use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use evloop::{EventLoop, Flags, TimerNext};

/// Drives the loop with wall-clock sleeps for roughly `ms` milliseconds.
fn run_for_ms(el: &mut EventLoop, ms: u64) {
  let deadline = Instant::now() + Duration::from_millis(ms);
  while Instant::now() < deadline {
    el.iterate(Flags::ALL);
  }
}

#[test]
fn one_shot_timer_fires_exactly_once() {
  let count = Rc::new(Cell::new(0));
  let counter = Rc::clone(&count);

  let mut el = EventLoop::with_capacity(64).unwrap();
  let id = el.add_timer(50, move |_, _| {
    counter.set(counter.get() + 1);
    TimerNext::Stop
  });

  run_for_ms(&mut el, 100);
  assert_eq!(count.get(), 1);
  assert!(el.cancel_timer(id).is_err(), "one-shot timer must be gone");
}

#[test]
fn periodic_timer_keeps_firing_at_its_interval() {
  let count = Rc::new(Cell::new(0));
  let counter = Rc::clone(&count);

  let mut el = EventLoop::with_capacity(64).unwrap();
  let id = el.add_timer(20, move |_, _| {
    counter.set(counter.get() + 1);
    TimerNext::After(20)
  });

  run_for_ms(&mut el, 110);
  let fired = count.get();
  assert!(
    (4..=6).contains(&fired),
    "expected 4..=6 firings in 110ms at a 20ms period, got {fired}"
  );
  assert!(el.cancel_timer(id).is_ok(), "periodic timer must still exist");
}

#[test]
fn timer_scheduled_by_a_callback_fires_on_a_later_pass() {
  let first = Rc::new(Cell::new(0));
  let second = Rc::new(Cell::new(0));
  let (f, s) = (Rc::clone(&first), Rc::clone(&second));

  let mut el = EventLoop::with_capacity(64).unwrap();
  el.add_timer(0, move |el, _| {
    f.set(f.get() + 1);
    let inner = Rc::clone(&s);
    el.add_timer(0, move |_, _| {
      inner.set(inner.get() + 1);
      TimerNext::Stop
    });
    TimerNext::Stop
  });

  // Both timers are due immediately, but the one created mid-pass must
  // wait for the next pass.
  assert_eq!(el.iterate(Flags::TIME_EVENTS | Flags::DONT_WAIT), 1);
  assert_eq!((first.get(), second.get()), (1, 0));
  assert_eq!(el.iterate(Flags::TIME_EVENTS | Flags::DONT_WAIT), 1);
  assert_eq!((first.get(), second.get()), (1, 1));
}

#[test]
fn finalizer_runs_when_a_oneshot_completes() {
  let finalized = Rc::new(Cell::new(0));
  let f = Rc::clone(&finalized);

  let mut el = EventLoop::with_capacity(64).unwrap();
  el.add_timer_with_finalizer(
    10,
    |_, _| TimerNext::Stop,
    move |_| f.set(f.get() + 1),
  );

  run_for_ms(&mut el, 50);
  assert_eq!(finalized.get(), 1);
}

#[test]
fn finalizer_runs_on_explicit_cancellation() {
  let finalized = Rc::new(Cell::new(0));
  let f = Rc::clone(&finalized);

  let mut el = EventLoop::with_capacity(64).unwrap();
  let id = el.add_timer_with_finalizer(
    60_000,
    |_, _| TimerNext::Stop,
    move |_| f.set(f.get() + 1),
  );
  el.cancel_timer(id).unwrap();
  assert_eq!(finalized.get(), 1);
  assert!(el.cancel_timer(id).is_err());
}

#[test]
fn stopping_from_a_timer_callback_ends_run() {
  let mut el = EventLoop::with_capacity(64).unwrap();
  el.add_timer(10, |el, _| {
    el.stop();
    TimerNext::Stop
  });

  let start = Instant::now();
  el.run();
  assert!(start.elapsed() < Duration::from_secs(5));
}
