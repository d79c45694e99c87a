//! Per-element transition bookkeeping.
//!
//! At most one transition is live per visual element. Starting a new one on
//! the same element supersedes the old one in place; nothing queues.

use crate::types::CityId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKey {
    Marker(CityId),
    PrimaryBar(String),
    RankedBar(CityId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub key: ElementKey,
    generation: u64,
}

/// Interpolation from one scalar to another over a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    pub from: f64,
    pub to: f64,
    pub duration: Duration,
}

pub fn ease_cubic_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0) * 2.0;
    if t <= 1.0 {
        t * t * t / 2.0
    } else {
        let t = t - 2.0;
        (t * t * t + 2.0) / 2.0
    }
}

impl Tween {
    pub fn new(from: f64, to: f64, duration: Duration) -> Self {
        Self { from, to, duration }
    }

    /// Eased progress in `0..=1`.
    pub fn progress(&self, elapsed: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        ease_cubic_in_out(elapsed.as_secs_f64() / self.duration.as_secs_f64())
    }

    pub fn value_at(&self, elapsed: Duration) -> f64 {
        self.from + (self.to - self.from) * self.progress(elapsed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub ticket: Ticket,
    pub tween: Tween,
}

struct Live {
    generation: u64,
    ends_at: Instant,
}

#[derive(Default)]
struct State {
    live: HashMap<ElementKey, Live>,
    next_generation: u64,
    superseded: u64,
}

/// Shared by the adapters, which start transitions, and the surfaces, which
/// ask whether the transition they are animating is still the live one.
#[derive(Clone, Default)]
pub struct TransitionScheduler {
    state: Rc<RefCell<State>>,
}

impl TransitionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transition on `key`. A transition still running on the same
    /// element is superseded; one that already ran to its end is replaced.
    pub fn begin(&self, key: ElementKey, tween: Tween) -> Transition {
        let now = Instant::now();
        let mut st = self.state.borrow_mut();
        st.next_generation += 1;
        let generation = st.next_generation;
        let live = Live {
            generation,
            ends_at: now + tween.duration,
        };
        if let Some(prev) = st.live.insert(key.clone(), live) {
            if prev.ends_at > now {
                st.superseded += 1;
                trace!(?key, "superseding in-flight transition");
            }
        }
        Transition {
            ticket: Ticket { key, generation },
            tween,
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.state
            .borrow()
            .live
            .get(&ticket.key)
            .is_some_and(|l| l.generation == ticket.generation)
    }

    /// Mark a transition finished. Returns `false` if it had already been
    /// superseded, in which case the caller should drop its final frame.
    pub fn complete(&self, ticket: &Ticket) -> bool {
        let mut st = self.state.borrow_mut();
        if st
            .live
            .get(&ticket.key)
            .is_some_and(|l| l.generation == ticket.generation)
        {
            st.live.remove(&ticket.key);
            true
        } else {
            false
        }
    }

    /// Drop every transition whose duration has elapsed. Returns how many
    /// were retired.
    pub fn retire_finished(&self) -> usize {
        let now = Instant::now();
        let mut st = self.state.borrow_mut();
        let before = st.live.len();
        st.live.retain(|_, l| l.ends_at > now);
        before - st.live.len()
    }

    /// Transitions still running.
    pub fn in_flight(&self) -> usize {
        let now = Instant::now();
        self.state
            .borrow()
            .live
            .values()
            .filter(|l| l.ends_at > now)
            .count()
    }

    pub fn superseded(&self) -> u64 {
        self.state.borrow().superseded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS800: Duration = Duration::from_millis(800);

    #[test]
    fn new_transition_supersedes_old_on_same_element() {
        let sched = TransitionScheduler::new();
        let key = ElementKey::Marker(CityId(1));
        let first = sched.begin(key.clone(), Tween::new(0.0, 1.0, MS800));
        let second = sched.begin(key, Tween::new(0.5, 0.0, MS800));
        assert!(!sched.is_current(&first.ticket));
        assert!(sched.is_current(&second.ticket));
        assert!(!sched.complete(&first.ticket));
        assert_eq!(sched.in_flight(), 1);
        assert!(sched.complete(&second.ticket));
        assert_eq!(sched.in_flight(), 0);
        assert_eq!(sched.superseded(), 1);
    }

    #[test]
    fn different_elements_run_side_by_side() {
        let sched = TransitionScheduler::new();
        let a = sched.begin(ElementKey::RankedBar(CityId(0)), Tween::new(0.0, 1.0, MS800));
        let b = sched.begin(
            ElementKey::PrimaryBar("PM".into()),
            Tween::new(0.0, 1.0, MS800),
        );
        assert!(sched.is_current(&a.ticket) && sched.is_current(&b.ticket));
        assert_eq!(sched.superseded(), 0);
    }

    #[test]
    fn finished_transitions_are_replaced_not_superseded() {
        let sched = TransitionScheduler::new();
        let key = ElementKey::Marker(CityId(3));
        let first = sched.begin(key.clone(), Tween::new(0.0, 1.0, Duration::ZERO));
        assert_eq!(sched.in_flight(), 0);
        let second = sched.begin(key, Tween::new(1.0, 0.0, Duration::ZERO));
        assert!(!sched.is_current(&first.ticket));
        assert!(sched.is_current(&second.ticket));
        assert_eq!(sched.superseded(), 0);
        assert_eq!(sched.retire_finished(), 1);
        assert!(!sched.is_current(&second.ticket));
    }

    #[test]
    fn retiring_keeps_running_transitions() {
        let sched = TransitionScheduler::new();
        let running = sched.begin(ElementKey::RankedBar(CityId(0)), Tween::new(0.0, 1.0, MS800));
        sched.begin(ElementKey::RankedBar(CityId(1)), Tween::new(0.0, 1.0, Duration::ZERO));
        assert_eq!(sched.retire_finished(), 1);
        assert!(sched.is_current(&running.ticket));
        assert_eq!(sched.in_flight(), 1);
    }

    #[test]
    fn tween_is_continuous_and_lands_on_target() {
        let tw = Tween::new(2.0, 4.0, MS800);
        assert_eq!(tw.value_at(Duration::ZERO), 2.0);
        assert!((tw.value_at(Duration::from_millis(400)) - 3.0).abs() < 1e-12);
        assert_eq!(tw.value_at(MS800), 4.0);
        assert_eq!(tw.value_at(Duration::from_secs(5)), 4.0);
        let mut prev = tw.value_at(Duration::ZERO);
        for ms in (0..=800).step_by(50) {
            let v = tw.value_at(Duration::from_millis(ms));
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn zero_duration_jumps() {
        let tw = Tween::new(1.0, 0.0, Duration::ZERO);
        assert_eq!(tw.value_at(Duration::ZERO), 0.0);
    }
}
