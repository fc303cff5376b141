//! Tick-driven timing primitives. The engine never owns a thread or an
//! async runtime; everything time-based is either a cancellable delayed
//! task drained by the session tick, a bounded "rebuild every tick" window,
//! or an operation token that supersedes stale continuations.

use std::time::{Duration, Instant};

/// Handle to a scheduled task, used to cancel it before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Run-after-delay task queue. Tasks fire when `poll` is called at or past
/// their deadline, in deadline order.
#[derive(Debug)]
pub struct Scheduler<T> {
    next_id: u64,
    tasks: Vec<(TimerId, Instant, T)>,
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self { next_id: 0, tasks: Vec::new() }
    }

    pub fn schedule(&mut self, delay: Duration, task: T, now: Instant) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.tasks.push((id, now + delay, task));
        id
    }

    /// True when the id was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|(tid, _, _)| *tid != id);
        before != self.tasks.len()
    }

    /// Removes and returns every due task, ordered by deadline (scheduling
    /// order breaks ties).
    pub fn poll(&mut self, now: Instant) -> Vec<T> {
        if self.tasks.iter().all(|(_, at, _)| *at > now) {
            return Vec::new();
        }
        let mut fired = Vec::new();
        let mut rest = Vec::with_capacity(self.tasks.len());
        for entry in self.tasks.drain(..) {
            if entry.1 <= now {
                fired.push(entry);
            } else {
                rest.push(entry);
            }
        }
        self.tasks = rest;
        fired.sort_by_key(|(id, at, _)| (*at, id.0));
        fired.into_iter().map(|(_, _, task)| task).collect()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Earliest pending deadline; hosts can sleep until then.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.iter().map(|(_, at, _)| *at).min()
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// How far past the sync window geometry changes still apply instantly.
const INSTANT_SLACK: Duration = Duration::from_millis(120);

/// Bounded window during which the overlay rebuilds on every tick. New
/// triggers extend the end rather than restarting, so back-to-back churn
/// produces one long window that closes once triggers stop. The window
/// performs one trailing rebuild tick after its deadline passes.
#[derive(Debug, Default)]
pub struct SyncWindow {
    end_at: Option<Instant>,
    instant_until: Option<Instant>,
}

impl SyncWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, duration: Duration, now: Instant) {
        let end = now + duration;
        self.end_at = Some(self.end_at.map_or(end, |e| e.max(end)));
        let instant = end + INSTANT_SLACK;
        self.instant_until = Some(self.instant_until.map_or(instant, |i| i.max(instant)));
    }

    /// True when this tick should rebuild. The first tick at or past the
    /// deadline still reports true once, closing the window with a final
    /// converging rebuild.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        match self.end_at {
            Some(end) if now < end => true,
            Some(_) => {
                self.end_at = None;
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_at.is_some()
    }

    /// While true, geometry retargets skip their transitions.
    pub fn instant(&self, now: Instant) -> bool {
        self.instant_until.is_some_and(|t| now < t)
    }

    pub fn clear(&mut self) {
        self.end_at = None;
        self.instant_until = None;
    }
}

/// Monotonic operation counter. Beginning a new structural operation
/// invalidates every outstanding token; completions check their token and
/// drop themselves when superseded.
#[derive(Debug, Default)]
pub struct OpCounter {
    current: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpToken(u64);

impl OpCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> OpToken {
        self.current += 1;
        OpToken(self.current)
    }

    pub fn is_current(&self, token: OpToken) -> bool {
        token.0 == self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn tasks_fire_at_their_deadline_in_order() {
        let t0 = Instant::now();
        let mut sched: Scheduler<&str> = Scheduler::new();
        sched.schedule(ms(50), "late", t0);
        sched.schedule(ms(10), "early", t0);

        assert!(sched.poll(t0 + ms(5)).is_empty());
        assert_eq!(sched.poll(t0 + ms(60)), vec!["early", "late"]);
        assert!(sched.is_empty());
    }

    #[test]
    fn cancel_prevents_firing() {
        let t0 = Instant::now();
        let mut sched: Scheduler<u32> = Scheduler::new();
        let id = sched.schedule(ms(10), 1, t0);
        assert!(sched.cancel(id));
        assert!(!sched.cancel(id));
        assert!(sched.poll(t0 + ms(20)).is_empty());
    }

    #[test]
    fn rearm_replaces_the_pending_task() {
        let t0 = Instant::now();
        let mut sched: Scheduler<u32> = Scheduler::new();
        let first = sched.schedule(ms(40), 1, t0);
        // a fresh event for the same file cancels and rearms
        sched.cancel(first);
        sched.schedule(ms(40), 2, t0 + ms(10));
        assert!(sched.poll(t0 + ms(45)).is_empty());
        assert_eq!(sched.poll(t0 + ms(50)), vec![2]);
    }

    #[test]
    fn next_deadline_is_the_minimum() {
        let t0 = Instant::now();
        let mut sched: Scheduler<u32> = Scheduler::new();
        assert!(sched.next_deadline().is_none());
        sched.schedule(ms(30), 1, t0);
        sched.schedule(ms(10), 2, t0);
        assert_eq!(sched.next_deadline(), Some(t0 + ms(10)));
    }

    #[test]
    fn window_extends_instead_of_restarting() {
        let t0 = Instant::now();
        let mut win = SyncWindow::new();
        win.extend(ms(100), t0);
        win.extend(ms(50), t0 + ms(80)); // ends at t0+130
        assert!(win.on_tick(t0 + ms(120)));
        assert!(win.on_tick(t0 + ms(129)));
        // trailing tick past the deadline closes the window
        assert!(win.on_tick(t0 + ms(131)));
        assert!(!win.on_tick(t0 + ms(132)));
    }

    #[test]
    fn shorter_retrigger_never_shrinks_the_window() {
        let t0 = Instant::now();
        let mut win = SyncWindow::new();
        win.extend(ms(200), t0);
        win.extend(ms(10), t0 + ms(5));
        assert!(win.on_tick(t0 + ms(150)));
        assert!(win.is_active());
    }

    #[test]
    fn instant_horizon_outlives_the_window() {
        let t0 = Instant::now();
        let mut win = SyncWindow::new();
        win.extend(ms(100), t0);
        assert!(win.instant(t0 + ms(99)));
        assert!(win.instant(t0 + ms(219)));
        assert!(!win.instant(t0 + ms(220)));
    }

    #[test]
    fn new_operation_invalidates_old_tokens() {
        let mut ops = OpCounter::new();
        let a = ops.begin();
        assert!(ops.is_current(a));
        let b = ops.begin();
        assert!(!ops.is_current(a));
        assert!(ops.is_current(b));
    }
}
