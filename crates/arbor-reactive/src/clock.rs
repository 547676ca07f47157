//! Deterministic timers for effects.
//!
//! Effects that schedule work (polling, animation ticks, delayed updates) take
//! a [`ManualScheduler`] handle instead of reaching for a real clock. Time
//! only moves when the owner calls [`advance`](ManualScheduler::advance) or
//! [`advance_to_next`](ManualScheduler::advance_to_next), so tests can drive
//! invalidation step by step.
//!
//! Timers due at the same instant fire in the order they were scheduled.
//! Callbacks may schedule or clear timers, including their own.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

enum Callback {
    Once(Box<dyn FnOnce()>),
    Repeat(Rc<dyn Fn()>),
}

struct Timer {
    due: u64,
    period: Option<u64>,
    callback: Callback,
}

#[derive(Default)]
struct SchedulerInner {
    now: u64,
    next_id: u64,
    timers: BTreeMap<TimerId, Timer>,
    /// Interval currently firing, and whether it was cleared while running.
    firing: Option<(TimerId, bool)>,
}

/// Single-threaded virtual clock. Clones share the same timeline.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ManualScheduler")
            .field("now", &inner.now)
            .field("pending", &inner.timers.len())
            .finish()
    }
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.inner.borrow().now
    }

    /// Number of scheduled timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    /// Run `f` once, `delay_ms` from now.
    pub fn set_timeout(&self, delay_ms: u64, f: impl FnOnce() + 'static) -> TimerId {
        self.schedule(delay_ms, None, Callback::Once(Box::new(f)))
    }

    /// Run `f` every `period_ms`, first at `now + period_ms`. A zero period is
    /// treated as one millisecond.
    pub fn set_interval(&self, period_ms: u64, f: impl Fn() + 'static) -> TimerId {
        let period = period_ms.max(1);
        self.schedule(period, Some(period), Callback::Repeat(Rc::new(f)))
    }

    /// Cancel a timer. Returns whether it was still scheduled.
    pub fn clear(&self, id: TimerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        if let Some((firing, cancelled)) = &mut inner.firing
            && *firing == id
        {
            return !std::mem::replace(cancelled, true);
        }
        inner.timers.remove(&id).is_some()
    }

    /// Move time forward by `ms`, firing every timer that comes due.
    ///
    /// Returns the number of callbacks run.
    pub fn advance(&self, ms: u64) -> usize {
        let target = self.now().saturating_add(ms);
        let mut fired = 0;
        while self.fire_next(target) {
            fired += 1;
        }
        self.inner.borrow_mut().now = target;
        fired
    }

    /// Jump to the earliest due timer and fire everything due at that
    /// instant. Returns `false` if nothing is scheduled.
    pub fn advance_to_next(&self) -> bool {
        let next = self.inner.borrow().timers.values().map(|t| t.due).min();
        match next {
            Some(due) => {
                let now = self.now();
                self.advance(due.saturating_sub(now));
                true
            }
            None => false,
        }
    }

    fn schedule(&self, delay: u64, period: Option<u64>, callback: Callback) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let id = TimerId(inner.next_id);
        inner.next_id += 1;
        let due = inner.now.saturating_add(delay);
        inner.timers.insert(id, Timer { due, period, callback });
        trace!(timer = id.0, due, "timer scheduled");
        id
    }

    /// Fire the earliest timer due at or before `target`.
    fn fire_next(&self, target: u64) -> bool {
        let (id, timer) = {
            let mut inner = self.inner.borrow_mut();
            let Some(id) = inner
                .timers
                .iter()
                .filter(|(_, t)| t.due <= target)
                .min_by_key(|(id, t)| (t.due, **id))
                .map(|(id, _)| *id)
            else {
                return false;
            };
            let Some(timer) = inner.timers.remove(&id) else {
                return false;
            };
            inner.now = timer.due;
            (id, timer)
        };

        match timer.callback {
            Callback::Once(f) => f(),
            Callback::Repeat(f) => {
                self.inner.borrow_mut().firing = Some((id, false));
                f();
                let mut inner = self.inner.borrow_mut();
                let cancelled = inner.firing.take().is_some_and(|(_, cancelled)| cancelled);
                if !cancelled && let Some(period) = timer.period {
                    let due = timer.due.saturating_add(period);
                    inner.timers.insert(
                        id,
                        Timer {
                            due,
                            period: timer.period,
                            callback: Callback::Repeat(f),
                        },
                    );
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn timeouts_fire_once_when_due() {
        let clock = ManualScheduler::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        clock.set_timeout(100, move || h.set(h.get() + 1));

        assert_eq!(clock.advance(99), 0);
        assert_eq!(hits.get(), 0);
        assert_eq!(clock.advance(1), 1);
        assert_eq!(clock.advance(1_000), 0);
        assert_eq!(hits.get(), 1);
        assert_eq!(clock.now(), 1_100);
    }

    #[test]
    fn intervals_repeat_until_cleared() {
        let clock = ManualScheduler::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let id = clock.set_interval(10, move || h.set(h.get() + 1));

        assert_eq!(clock.advance(35), 3);
        assert!(clock.clear(id));
        assert!(!clock.clear(id));
        assert_eq!(clock.advance(100), 0);
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn same_instant_fires_in_schedule_order() {
        let clock = ManualScheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let order = Rc::clone(&order);
            clock.set_timeout(5, move || order.borrow_mut().push(tag));
        }
        assert!(clock.advance_to_next());
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
        assert!(!clock.advance_to_next());
    }

    #[test]
    fn interval_can_clear_itself() {
        let clock = ManualScheduler::new();
        let hits = Rc::new(Cell::new(0));
        let slot: Rc<Cell<Option<TimerId>>> = Rc::default();
        let (h, s, c) = (Rc::clone(&hits), Rc::clone(&slot), clock.clone());
        let id = clock.set_interval(1, move || {
            h.set(h.get() + 1);
            if h.get() == 2
                && let Some(id) = s.get()
            {
                c.clear(id);
            }
        });
        slot.set(Some(id));
        clock.advance(10);
        assert_eq!(hits.get(), 2);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn callbacks_can_schedule_more_work() {
        let clock = ManualScheduler::new();
        let hits = Rc::new(Cell::new(0));
        let (h, c) = (Rc::clone(&hits), clock.clone());
        clock.set_timeout(1, move || {
            let h = Rc::clone(&h);
            c.set_timeout(1, move || h.set(h.get() + 1));
        });
        assert_eq!(clock.advance(5), 2);
        assert_eq!(hits.get(), 1);
    }
}
