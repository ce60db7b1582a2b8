//! Quorum resolution for bid decisions
//!
//! Each responsible party submits at most one current decision per bid. The
//! aggregate is recomputed from the stored decision counts on every
//! submission, never from counters carried across calls.

/// Approvals required are capped at 3 no matter how many responsible parties
/// the organization has.
pub const QUORUM_CAP: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Rejected,
    /// Not enough approvals yet and no rejection, the bid stays as it is.
    Pending,
}

pub fn quorum_for(responsible_count: u32) -> u32 {
    responsible_count.min(QUORUM_CAP)
}

/// Derive the outcome from the current decision counts.
///
/// A single rejection vetoes the bid regardless of how many approvals exist.
/// The asymmetry with the approval threshold is intentional.
pub fn resolve(accepts: u32, rejects: u32, responsible_count: u32) -> Outcome {
    if rejects >= 1 {
        Outcome::Rejected
    } else if accepts >= quorum_for(responsible_count) {
        Outcome::Approved
    } else {
        Outcome::Pending
    }
}
