//! At-most-one-in-flight pagination bookkeeping.
//!
//! `Idle → Paginating → Idle`. A [`PaginationGuard`] is taken when a
//! pagination starts and clears the in-flight flag when dropped, so every
//! exit path (success, failure, early return, cancelled future) lands back
//! in `Idle`.

use parking_lot::Mutex;
use tracing::trace;

use crate::navigator::Direction;
use crate::timeline::TimelineState;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaginationState {
    #[default]
    Idle,
    Paginating(Direction),
}

impl PaginationState {
    pub fn is_paginating(&self) -> bool {
        matches!(self, PaginationState::Paginating(_))
    }

    /// Move to `Paginating`. Returns false if already there.
    pub fn try_begin(&mut self, direction: Direction) -> bool {
        if self.is_paginating() {
            return false;
        }
        *self = PaginationState::Paginating(direction);
        true
    }

    pub fn finish(&mut self) {
        *self = PaginationState::Idle;
    }
}

/// Clears the in-flight pagination flag on drop.
pub(crate) struct PaginationGuard<'a> {
    state: &'a Mutex<TimelineState>,
}

impl<'a> PaginationGuard<'a> {
    /// Start a pagination on an already-locked state. Returns `None` when one
    /// is in flight.
    pub(crate) fn begin(
        state: &'a Mutex<TimelineState>,
        locked: &mut TimelineState,
        direction: Direction,
    ) -> Option<Self> {
        locked
            .pagination
            .try_begin(direction)
            .then_some(Self { state })
    }
}

impl Drop for PaginationGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().pagination.finish();
        trace!("pagination finished");
    }
}
