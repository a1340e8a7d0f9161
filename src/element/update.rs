//! Update scheduling state.
//!
//! Each element owns at most one in-flight cycle. Its completion is a shared
//! future so any number of callers can await the same cycle; it resolves to
//! `true` when no further update was requested while the cycle ran.

use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};

use crate::error::Error;

bitflags::bitflags! {
    /// Update-state word of a reactive element.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct UpdateState: u8 {
        const HAS_UPDATED = 1 << 0;
        const UPDATE_REQUESTED = 1 << 2;
        /// Writing a property to its attribute; attribute callbacks are ignored.
        const REFLECTING_TO_ATTRIBUTE = 1 << 3;
        /// Writing an attribute to its property; no reflection back.
        const REFLECTING_TO_PROPERTY = 1 << 4;
        const HAS_CONNECTED = 1 << 5;
    }
}

/// Outcome of one cycle. Errors are shared by every awaiting caller.
pub type UpdateResult = Result<bool, Rc<Error>>;

/// Completion of the element's latest cycle.
pub type UpdateComplete = Shared<LocalBoxFuture<'static, UpdateResult>>;

/// A completion that is already resolved.
pub(crate) fn resolved(value: UpdateResult) -> UpdateComplete {
    futures::future::ready(value).boxed_local().shared()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_distinct() {
        let all = [
            UpdateState::HAS_UPDATED,
            UpdateState::UPDATE_REQUESTED,
            UpdateState::REFLECTING_TO_ATTRIBUTE,
            UpdateState::REFLECTING_TO_PROPERTY,
            UpdateState::HAS_CONNECTED,
        ];
        let combined = all.iter().fold(UpdateState::empty(), |acc, flag| acc | *flag);
        assert_eq!(combined.bits().count_ones(), 5);
    }

    #[test]
    fn test_resolved_completion_is_ready() {
        let done = resolved(Ok(true));
        assert_eq!(futures::executor::block_on(done).ok(), Some(true));
    }
}
