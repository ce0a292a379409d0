//! At-most-one-in-flight guard for attendance submissions.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reentrancy gate. [`try_enter`](Self::try_enter) succeeds for exactly one
/// caller until [`leave`](Self::leave).
#[derive(Debug, Default)]
pub struct SubmissionGate {
    in_flight: AtomicBool,
}

impl SubmissionGate {
    pub const fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
        }
    }

    /// Mark a submission in flight. Returns `false` if one already is.
    pub fn try_enter(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clear the in-flight mark unconditionally.
    pub fn leave(&self) {
        self.in_flight.store(false, Ordering::Release);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Scoped variant of [`try_enter`](Self::try_enter): the returned pass
    /// leaves the gate when dropped, including on unwind.
    pub fn pass(&self) -> Option<GatePass<'_>> {
        self.try_enter().then_some(GatePass { gate: self })
    }
}

#[must_use = "dropping the pass leaves the gate immediately"]
pub struct GatePass<'a> {
    gate: &'a SubmissionGate,
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        self.gate.leave();
    }
}
