use std::time::{Duration, Instant};

use mediaplay_traits::BusMessage;

use crate::worker::PlayerCore;

pub(crate) type Task = Box<dyn FnOnce(&mut PlayerCore) + Send>;

pub(crate) enum LoopMsg {
    /// Closure to run on the player thread.
    Task(Task),
    /// Pipeline message, tagged with the bus flush epoch it was posted in.
    Bus(u64, BusMessage),
    /// Arm the timer for seek source `source`.
    ScheduleSeek { source: u64, delay: Duration },
    Quit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct TimerId(u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum TimerKind {
    Tick,
    ReadyTimeout,
    Seek(u64),
}

struct Timer {
    id: TimerId,
    kind: TimerKind,
    deadline: Instant,
    interval: Option<Duration>,
}

/// Timeouts owned by the player thread. Every timer is addressable by
/// id and can be removed before it fires.
pub(crate) struct TimerQueue {
    next_id: u64,
    timers: Vec<Timer>,
}

impl TimerQueue {
    pub fn new() -> TimerQueue {
        TimerQueue {
            next_id: 1,
            timers: Vec::new(),
        }
    }

    fn add(&mut self, kind: TimerKind, delay: Duration, interval: Option<Duration>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            kind,
            deadline: Instant::now() + delay,
            interval,
        });
        id
    }

    pub fn add_timeout(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        self.add(kind, delay, None)
    }

    pub fn add_interval(&mut self, kind: TimerKind, interval: Duration) -> TimerId {
        self.add(kind, interval, Some(interval))
    }

    pub fn remove(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.id != id);
        self.timers.len() != before
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|timer| timer.deadline).min()
    }

    /// Takes the earliest timer due at `now`. Interval timers are re-armed
    /// one interval from `now`; one-shot timers are removed.
    pub fn pop_expired(&mut self, now: Instant) -> Option<(TimerId, TimerKind)> {
        let position = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.deadline <= now)
            .min_by_key(|(_, timer)| timer.deadline)
            .map(|(position, _)| position)?;
        let timer = &self.timers[position];
        let (fired, interval) = ((timer.id, timer.kind), timer.interval);
        match interval {
            Some(interval) => self.timers[position].deadline = now + interval,
            None => {
                self.timers.remove(position);
            }
        }
        Some(fired)
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let mut timers = TimerQueue::new();
        timers.add_timeout(TimerKind::ReadyTimeout, Duration::from_millis(20));
        timers.add_timeout(TimerKind::Seek(3), Duration::from_millis(10));
        let later = Instant::now() + Duration::from_millis(50);

        assert_eq!(timers.pop_expired(later).map(|t| t.1), Some(TimerKind::Seek(3)));
        assert_eq!(
            timers.pop_expired(later).map(|t| t.1),
            Some(TimerKind::ReadyTimeout)
        );
        assert!(timers.pop_expired(later).is_none());
        assert!(timers.is_empty());
    }

    #[test]
    fn intervals_rearm_and_can_be_removed() {
        let mut timers = TimerQueue::new();
        let tick = timers.add_interval(TimerKind::Tick, Duration::from_millis(100));
        assert!(timers.pop_expired(Instant::now()).is_none());

        let now = Instant::now() + Duration::from_millis(100);
        assert_eq!(timers.pop_expired(now), Some((tick, TimerKind::Tick)));
        assert!(timers.pop_expired(now).is_none());
        assert_eq!(
            timers.next_deadline(),
            Some(now + Duration::from_millis(100))
        );

        assert!(timers.remove(tick));
        assert!(!timers.remove(tick));
        assert_eq!(timers.next_deadline(), None);
    }
}
