//! The pending-timer set: an intrusive singly-linked list, unordered,
//! scanned linearly.
//!
//! Linear scans are deliberate. The set is sized for a handful of entries
//! (a server heartbeat, a few protocol timeouts), where a list beats a heap
//! on constant factors and keeps deletion-during-iteration trivial: the
//! dispatch pass in [`crate::EventLoop`] restarts from the head after every
//! callback, so no iterator ever survives a user callback.

use std::rc::Rc;

use crate::clock::ClockTime;
use crate::event::TimerId;
use crate::reactor::{TimerCallback, TimerFinalizer};

pub(crate) struct TimerEvent {
  pub id: TimerId,
  pub when: ClockTime,
  pub callback: Rc<TimerCallback>,
  pub finalizer: Option<Box<TimerFinalizer>>,
  pub next: Option<Box<TimerEvent>>,
}

pub(crate) struct TimerSet {
  head: Option<Box<TimerEvent>>,
  next_id: u64,
}

impl TimerSet {
  pub fn new() -> TimerSet {
    TimerSet { head: None, next_id: 0 }
  }

  /// Allocates a node with the next id and prepends it. O(1).
  pub fn create(
    &mut self,
    when: ClockTime,
    callback: Rc<TimerCallback>,
    finalizer: Option<Box<TimerFinalizer>>,
  ) -> TimerId {
    let id = TimerId(self.next_id);
    self.next_id += 1;
    self.head = Some(Box::new(TimerEvent {
      id,
      when,
      callback,
      finalizer,
      next: self.head.take(),
    }));
    id
  }

  /// Unlinks and returns the node with `id`, if pending. The caller owns
  /// running the finalizer (it needs the event loop handle).
  pub fn remove(&mut self, id: TimerId) -> Option<Box<TimerEvent>> {
    let mut cur = &mut self.head;
    while cur.is_some() {
      if cur.as_ref().is_some_and(|node| node.id == id) {
        let mut node = cur.take().expect("checked above");
        *cur = node.next.take();
        return Some(node);
      }
      cur = &mut cur.as_mut().expect("checked by loop condition").next;
    }
    None
  }

  /// The earliest pending deadline, or `None` when the set is empty.
  /// Ties are broken arbitrarily.
  pub fn earliest(&self) -> Option<ClockTime> {
    let mut best: Option<ClockTime> = None;
    let mut cur = self.head.as_deref();
    while let Some(node) = cur {
      if best.is_none_or(|b| node.when < b) {
        best = Some(node.when);
      }
      cur = node.next.as_deref();
    }
    best
  }

  /// First node (from the head) that is due at `now` and whose id was
  /// assigned no later than `max_id`. Returns the id and a clone of the
  /// callback so the caller can drop all borrows before invoking it.
  pub fn first_due(
    &self,
    now: ClockTime,
    max_id: TimerId,
  ) -> Option<(TimerId, Rc<TimerCallback>)> {
    let mut cur = self.head.as_deref();
    while let Some(node) = cur {
      if node.id <= max_id && node.when <= now {
        return Some((node.id, Rc::clone(&node.callback)));
      }
      cur = node.next.as_deref();
    }
    None
  }

  /// Moves `id`'s deadline. No-op (false) if the timer is gone, which
  /// happens when a callback cancels its own timer and still asks to be
  /// rescheduled.
  pub fn reschedule(&mut self, id: TimerId, when: ClockTime) -> bool {
    let mut cur = self.head.as_deref_mut();
    while let Some(node) = cur {
      if node.id == id {
        node.when = when;
        return true;
      }
      cur = node.next.as_deref_mut();
    }
    false
  }

  /// Forces every pending deadline into the past by zeroing its seconds.
  /// Used on wall-clock regression: firing early beats firing never.
  pub fn force_expire_all(&mut self) {
    let mut cur = self.head.as_deref_mut();
    while let Some(node) = cur {
      node.when.seconds = 0;
      cur = node.next.as_deref_mut();
    }
  }

  /// Largest id assigned so far, the snapshot bound for one dispatch pass.
  pub fn latest_id(&self) -> Option<TimerId> {
    self.next_id.checked_sub(1).map(TimerId)
  }

  /// Detaches the whole list, for teardown.
  pub fn take_all(&mut self) -> Option<Box<TimerEvent>> {
    self.head.take()
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    let mut n = 0;
    let mut cur = self.head.as_deref();
    while let Some(node) = cur {
      n += 1;
      cur = node.next.as_deref();
    }
    n
  }

  #[cfg(test)]
  pub fn contains(&self, id: TimerId) -> bool {
    let mut cur = self.head.as_deref();
    while let Some(node) = cur {
      if node.id == id {
        return true;
      }
      cur = node.next.as_deref();
    }
    false
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::TimerNext;

  fn at(seconds: i64, millis: i64) -> ClockTime {
    ClockTime { seconds, millis }
  }

  fn noop() -> Rc<TimerCallback> {
    Rc::new(|_, _| TimerNext::Stop)
  }

  #[test]
  fn ids_are_unique_and_increasing() {
    let mut set = TimerSet::new();
    let a = set.create(at(1, 0), noop(), None);
    let b = set.create(at(2, 0), noop(), None);
    let c = set.create(at(0, 0), noop(), None);
    assert!(a < b && b < c);
    assert_eq!(set.latest_id(), Some(c));
    assert_eq!(set.len(), 3);
  }

  #[test]
  fn remove_unlinks_head_middle_and_tail() {
    let mut set = TimerSet::new();
    let a = set.create(at(1, 0), noop(), None);
    let b = set.create(at(2, 0), noop(), None);
    let c = set.create(at(3, 0), noop(), None);

    // List order is c -> b -> a (prepend).
    assert_eq!(set.remove(b).map(|n| n.id), Some(b));
    assert_eq!(set.len(), 2);
    assert_eq!(set.remove(c).map(|n| n.id), Some(c));
    assert_eq!(set.remove(a).map(|n| n.id), Some(a));
    assert!(set.remove(a).is_none());
    assert_eq!(set.len(), 0);
  }

  #[test]
  fn earliest_scans_the_whole_list() {
    let mut set = TimerSet::new();
    assert_eq!(set.earliest(), None);
    set.create(at(5, 100), noop(), None);
    set.create(at(4, 900), noop(), None);
    set.create(at(5, 0), noop(), None);
    assert_eq!(set.earliest(), Some(at(4, 900)));
  }

  #[test]
  fn first_due_respects_the_id_snapshot() {
    let mut set = TimerSet::new();
    let old = set.create(at(1, 0), noop(), None);
    let max_id = set.latest_id().unwrap();
    let newer = set.create(at(0, 0), noop(), None);

    // `newer` is due and nearer the head, but past the snapshot.
    let due = set.first_due(at(10, 0), max_id);
    assert_eq!(due.map(|(id, _)| id), Some(old));
    let due = set.first_due(at(10, 0), newer);
    assert_eq!(due.map(|(id, _)| id), Some(newer));
  }

  #[test]
  fn force_expire_zeroes_every_deadline() {
    let mut set = TimerSet::new();
    let a = set.create(at(100, 250), noop(), None);
    let b = set.create(at(200, 0), noop(), None);
    set.force_expire_all();
    let now = at(1, 0);
    assert!(set.first_due(now, b).is_some());
    set.remove(a);
    set.remove(b);
    assert!(set.first_due(now, b).is_none());
  }

  #[test]
  fn reschedule_missing_timer_is_a_noop() {
    let mut set = TimerSet::new();
    let a = set.create(at(1, 0), noop(), None);
    set.remove(a);
    assert!(!set.reschedule(a, at(9, 0)));
  }
}
