//! Property-based tests for the status transition tables
//!
//! The tables are closed: everything not explicitly allowed must be rejected,
//! for every possible (current, requested) pair of both entity kinds. The
//! properties here pin that down against the full cartesian product so a new
//! status or a widened match arm cannot silently open a transition.

use proptest::prelude::*;
use tender_approval::{
    entity::{BidStatus, TenderStatus},
    status::{validate_bid_transition, validate_tender_transition},
};

const TENDER_STATUSES: [TenderStatus; 3] = [
    TenderStatus::Created,
    TenderStatus::Published,
    TenderStatus::Closed,
];

const BID_STATUSES: [BidStatus; 5] = [
    BidStatus::Created,
    BidStatus::Published,
    BidStatus::Canceled,
    BidStatus::Approved,
    BidStatus::Rejected,
];

fn tender_status_strategy() -> impl Strategy<Value = TenderStatus> {
    proptest::sample::select(TENDER_STATUSES.to_vec())
}

fn bid_status_strategy() -> impl Strategy<Value = BidStatus> {
    proptest::sample::select(BID_STATUSES.to_vec())
}

proptest! {
    /// Property: the only legal tender transitions are the two steps of the
    /// linear lifecycle.
    #[test]
    fn prop_tender_table_is_closed(
        from in tender_status_strategy(),
        to in tender_status_strategy(),
    ) {
        let expected = matches!(
            (from, to),
            (TenderStatus::Created, TenderStatus::Published)
                | (TenderStatus::Published, TenderStatus::Closed)
        );
        prop_assert_eq!(validate_tender_transition(from, to).is_ok(), expected);
    }

    /// Property: a tender can never transition into its current status, for
    /// any status. Validation therefore always consumes a real change.
    #[test]
    fn prop_tender_self_transitions_rejected(status in tender_status_strategy()) {
        prop_assert!(validate_tender_transition(status, status).is_err());
    }

    /// Property: the only legal direct bid transitions are publish and the
    /// two cancellation edges.
    #[test]
    fn prop_bid_table_is_closed(
        from in bid_status_strategy(),
        to in bid_status_strategy(),
    ) {
        let expected = matches!(
            (from, to),
            (BidStatus::Created, BidStatus::Published)
                | (BidStatus::Created, BidStatus::Canceled)
                | (BidStatus::Published, BidStatus::Canceled)
        );
        prop_assert_eq!(validate_bid_transition(from, to).is_ok(), expected);
    }

    /// Property: Approved and Rejected are unreachable by direct request
    /// from any status. Only the decision quorum can produce them.
    #[test]
    fn prop_quorum_outcomes_unreachable_directly(from in bid_status_strategy()) {
        prop_assert!(validate_bid_transition(from, BidStatus::Approved).is_err());
        prop_assert!(validate_bid_transition(from, BidStatus::Rejected).is_err());
    }

    /// Property: terminal bid statuses admit no outgoing transition at all.
    #[test]
    fn prop_terminal_bid_statuses_are_final(
        from in proptest::sample::select(vec![
            BidStatus::Canceled,
            BidStatus::Approved,
            BidStatus::Rejected,
        ]),
        to in bid_status_strategy(),
    ) {
        prop_assert!(validate_bid_transition(from, to).is_err());
    }
}
