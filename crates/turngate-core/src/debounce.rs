//! Anti-flap gate in front of the turnstile client.

use crate::types::{DoorState, UserId};
use std::time::{Duration, Instant};

/// Last admitted actuation.
#[derive(Debug, Clone, Copy)]
struct LastActuation {
    user_id: UserId,
    direction: DoorState,
    at: Instant,
}

/// Suppresses repeat triggers for the same user inside a minimum
/// re-trigger interval, so a person lingering in a zone across
/// consecutive frames opens the door once per crossing.
///
/// The memory is updated the moment a candidate is admitted — before
/// the remote call is dispatched — so a slow controller response cannot
/// let the next frame double-trigger.
#[derive(Debug)]
pub struct Debouncer {
    min_interval: Duration,
    last: Option<LastActuation>,
}

impl Debouncer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Decide whether this candidate may actuate, recording it if so.
    ///
    /// Suppresses only when the same user re-triggers within the
    /// interval; a different user is admitted regardless of timing.
    pub fn admit(&mut self, user_id: UserId, direction: DoorState, now: Instant) -> bool {
        if let Some(last) = self.last {
            if last.user_id == user_id && now.duration_since(last.at) <= self.min_interval {
                return false;
            }
        }
        self.last = Some(LastActuation {
            user_id,
            direction,
            at: now,
        });
        true
    }

    /// The last admitted candidate, if any.
    pub fn last_admitted(&self) -> Option<(UserId, DoorState)> {
        self.last.map(|l| (l.user_id, l.direction))
    }
}
