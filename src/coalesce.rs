//! Single-slot coalescing for deferred work
//!
//! Replaces cooperative idle-queue debouncing: scheduling while a run is
//! already pending is a no-op, and the slot is cleared before the deferred
//! work executes, so a burst of triggers collapses into exactly one
//! recomputation.

/// A one-slot pending flag for deferred work.
#[derive(Debug, Default)]
pub struct Coalesce {
    pending: bool,
}

impl Coalesce {
    pub fn new() -> Self {
        Self { pending: false }
    }

    /// Claim the slot. Returns `true` when the caller should enqueue the
    /// deferred work; `false` when a run is already pending.
    pub fn schedule(&mut self) -> bool {
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    /// Release the slot. Called by the deferred work before it runs, so a
    /// trigger arriving during the run schedules a fresh pass.
    pub fn clear(&mut self) {
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}
