//! Deferred work on a single logical thread.
//!
//! All suspension in this crate is a timer in a [`TimerQueue`]. The host
//! drives virtual time forward and dispatches whatever fires; nothing sleeps
//! or blocks.

use crate::graph::NodeId;
use ahash::AHashMap;
use std::collections::BTreeMap;

/// Handle of a scheduled timer. Tokens are never reused within a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// What a timer is for. The owning controller interprets it when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Debounced port reconciliation.
    Stabilize,
    /// Release of a temporary width override.
    WidthDecay,
    /// Deferred pass after creation or configure, once the host restored links.
    DeferredRestore,
    /// Periodic check of the group list.
    GroupPoll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    pub token: TimerToken,
    pub owner: NodeId,
    pub kind: TimerKind,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    owner: NodeId,
    kind: TimerKind,
    period: Option<u64>,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    now_ms: u64,
    next_token: u64,
    // Ordered by (due time, token) so equal deadlines fire in scheduling order.
    pending: BTreeMap<(u64, TimerToken), TimerEntry>,
    due_by_token: AHashMap<TimerToken, u64>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Schedules a one-shot timer `delay_ms` from now.
    pub fn schedule(&mut self, owner: NodeId, kind: TimerKind, delay_ms: u64) -> TimerToken {
        self.insert(owner, kind, delay_ms, None)
    }

    /// Schedules a timer that re-arms itself every `interval_ms` until cancelled.
    pub fn schedule_periodic(
        &mut self,
        owner: NodeId,
        kind: TimerKind,
        interval_ms: u64,
    ) -> TimerToken {
        let interval = interval_ms.max(1);
        self.insert(owner, kind, interval, Some(interval))
    }

    fn insert(
        &mut self,
        owner: NodeId,
        kind: TimerKind,
        delay_ms: u64,
        period: Option<u64>,
    ) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        let due = self.now_ms + delay_ms;
        self.pending
            .insert((due, token), TimerEntry { owner, kind, period });
        self.due_by_token.insert(token, due);
        token
    }

    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.due_by_token.contains_key(&token)
    }

    /// Cancels a timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        match self.due_by_token.remove(&token) {
            Some(due) => self.pending.remove(&(due, token)).is_some(),
            None => false,
        }
    }

    /// Cancels every timer owned by a node. Returns how many were cancelled.
    pub fn cancel_owned_by(&mut self, owner: NodeId) -> usize {
        let owned: Vec<(u64, TimerToken)> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(key, _)| *key)
            .collect();
        for key in &owned {
            self.pending.remove(key);
            self.due_by_token.remove(&key.1);
        }
        owned.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_for(&self, owner: NodeId, kind: TimerKind) -> usize {
        self.pending
            .values()
            .filter(|entry| entry.owner == owner && entry.kind == kind)
            .count()
    }

    /// Due time of the earliest pending one-shot timer. Periodic timers never
    /// run out, so they are ignored.
    pub fn next_one_shot_due(&self) -> Option<u64> {
        self.pending
            .iter()
            .find(|(_, entry)| entry.period.is_none())
            .map(|(&(due, _), _)| due)
    }

    /// Pops the earliest timer due at or before `until_ms`, moving the clock to its deadline.
    /// Periodic timers are re-armed under the same token before being returned.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<FiredTimer> {
        let (&(due, token), _) = self.pending.iter().next()?;
        if due > until_ms {
            return None;
        }
        let entry = self.pending.remove(&(due, token))?;
        self.due_by_token.remove(&token);
        self.now_ms = self.now_ms.max(due);

        if let Some(period) = entry.period {
            let next_due = due + period;
            self.pending.insert((next_due, token), entry);
            self.due_by_token.insert(token, next_due);
        }

        Some(FiredTimer {
            token,
            owner: entry.owner,
            kind: entry.kind,
            at_ms: due,
        })
    }

    /// Moves the clock forward without firing anything. Never moves it backwards.
    pub fn set_now(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }
}

/// Single-flight state of a debounced reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StabilizeState {
    #[default]
    Idle,
    Pending(TimerToken),
}

/// Debounces "something changed" notifications into one deferred run.
///
/// `schedule` is a no-op while a run is pending. When the timer fires the
/// state returns to `Idle` before the caller runs the reconciliation, so
/// changes made by the reconciliation itself arm a fresh timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stabilizer {
    state: StabilizeState,
}

impl Stabilizer {
    pub fn state(&self) -> StabilizeState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, StabilizeState::Pending(_))
    }

    pub fn schedule(
        &mut self,
        timers: &mut TimerQueue,
        owner: NodeId,
        delay_ms: u64,
    ) -> TimerToken {
        match self.state {
            StabilizeState::Pending(token) => token,
            StabilizeState::Idle => {
                let token = timers.schedule(owner, TimerKind::Stabilize, delay_ms);
                self.state = StabilizeState::Pending(token);
                token
            }
        }
    }

    /// Handles a fired stabilize timer. Returns `true` if the caller should reconcile now.
    pub fn fire(&mut self, token: TimerToken) -> bool {
        match self.state {
            StabilizeState::Pending(pending) if pending == token => {
                self.state = StabilizeState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self, timers: &mut TimerQueue) {
        if let StabilizeState::Pending(token) = self.state {
            timers.cancel(token);
        }
        self.state = StabilizeState::Idle;
    }
}
