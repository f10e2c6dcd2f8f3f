use std::{collections::HashMap, fmt::Debug, future::Future, hash::Hash, time::Duration};

use tokio::{
    task::AbortHandle,
    time::{interval_at, sleep_until, Instant, MissedTickBehavior},
};

/// Identifies one scheduling of a timer.
///
/// A timer callback receives its token and must [Scheduler::claim] it (or check
/// [Scheduler::is_current]) under the same lock that guards the scheduler before acting.
/// A timer that woke up right as it was being replaced then fails the check and does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug)]
struct Timer {
    token: TimerToken,
    handle: AbortHandle,
}

/// Owns the timers of one room, at most one live timer per kind.
///
/// Scheduling a kind always cancels the previous timer of that kind.
/// All timers are aborted when the scheduler is dropped.
/// Scheduling must happen within a tokio runtime.
#[derive(Debug)]
pub struct Scheduler<K>
where
    K: Eq + Hash,
{
    timers: HashMap<K, Timer>,
    next_token: u64,
}

impl<K> Scheduler<K>
where
    K: Eq + Hash + Copy + Debug,
{
    pub fn new() -> Self {
        Self {
            timers: HashMap::new(),
            next_token: 0,
        }
    }

    /// Runs `task` once after `delay`, replacing any timer of the same kind.
    pub fn schedule<F, Fut>(&mut self, kind: K, delay: Duration, task: F) -> TimerToken
    where
        F: FnOnce(TimerToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel(kind);

        let token = self.next_token();
        let fut = task(token);

        // The delay counts from now, not from when the task is first polled
        let deadline = Instant::now() + delay;

        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            fut.await
        })
        .abort_handle();

        self.timers.insert(kind, Timer { token, handle });
        token
    }

    /// Runs `task` every `period`, first after one period, replacing any timer of the same kind.
    pub fn schedule_repeating<F, Fut>(
        &mut self,
        kind: K,
        period: Duration,
        mut task: F,
    ) -> TimerToken
    where
        F: FnMut(TimerToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel(kind);

        let token = self.next_token();
        let start = Instant::now() + period;

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                task(token).await;
            }
        })
        .abort_handle();

        self.timers.insert(kind, Timer { token, handle });
        token
    }

    /// Cancels the live timer of a kind. Returns true if there was one.
    pub fn cancel(&mut self, kind: K) -> bool {
        match self.timers.remove(&kind) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancels every live timer.
    pub fn cancel_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
    }

    /// Marks a fired one-shot timer as done.
    /// Returns false if the timer was cancelled or replaced in the meantime.
    pub fn claim(&mut self, kind: K, token: TimerToken) -> bool {
        if self.is_current(kind, token) {
            self.timers.remove(&kind);
            true
        } else {
            false
        }
    }

    /// Returns true if `token` belongs to the live timer of `kind`.
    pub fn is_current(&self, kind: K, token: TimerToken) -> bool {
        self.timers
            .get(&kind)
            .map(|t| t.token == token)
            .unwrap_or(false)
    }

    pub fn is_scheduled(&self, kind: K) -> bool {
        self.timers.contains_key(&kind)
    }

    /// Returns the kinds that currently have a live timer.
    pub fn scheduled(&self) -> Vec<K> {
        self.timers.keys().copied().collect()
    }

    fn next_token(&mut self) -> TimerToken {
        self.next_token += 1;
        TimerToken(self.next_token)
    }
}

impl<K> Default for Scheduler<K>
where
    K: Eq + Hash + Copy + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for Scheduler<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
    }
}
