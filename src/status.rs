//! Status transition rules for tenders and bids
//!
//! Transitions are validated here independently of who requested them;
//! authorization is checked separately by the service layer. The tables are
//! deliberately closed: any pair not listed is rejected.
use super::entity::{BidStatus, TenderStatus};
use super::error::{Error, Result};

/// Tender lifecycle is strictly linear: Created -> Published -> Closed.
/// Closed is terminal.
pub fn validate_tender_transition(from: TenderStatus, to: TenderStatus) -> Result<()> {
    use TenderStatus::*;

    match (from, to) {
        (Created, Published) | (Published, Closed) => Ok(()),
        _ => Err(Error::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}

/// Transitions a bid's owner may request directly. Approved and Rejected are
/// reachable only through the decision quorum, never by a direct status
/// change. Canceled, Approved and Rejected are terminal.
pub fn validate_bid_transition(from: BidStatus, to: BidStatus) -> Result<()> {
    use BidStatus::*;

    match (from, to) {
        (Created, Published) | (Created, Canceled) | (Published, Canceled) => Ok(()),
        _ => Err(Error::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn tender_table_is_strictly_linear() {
        for from in TENDER_STATUSES {
            for to in TENDER_STATUSES {
                let legal = matches!(
                    (from, to),
                    (TenderStatus::Created, TenderStatus::Published)
                        | (TenderStatus::Published, TenderStatus::Closed)
                );
                assert_eq!(
                    validate_tender_transition(from, to).is_ok(),
                    legal,
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn closed_tender_is_terminal() {
        for to in TENDER_STATUSES {
            assert!(validate_tender_transition(TenderStatus::Closed, to).is_err());
        }
    }

    #[test]
    fn bid_table_only_allows_publish_and_cancel() {
        for from in BID_STATUSES {
            for to in BID_STATUSES {
                let legal = matches!(
                    (from, to),
                    (BidStatus::Created, BidStatus::Published)
                        | (BidStatus::Created, BidStatus::Canceled)
                        | (BidStatus::Published, BidStatus::Canceled)
                );
                assert_eq!(
                    validate_bid_transition(from, to).is_ok(),
                    legal,
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn quorum_outcomes_cannot_be_requested_directly() {
        for from in BID_STATUSES {
            assert!(validate_bid_transition(from, BidStatus::Approved).is_err());
            assert!(validate_bid_transition(from, BidStatus::Rejected).is_err());
        }
    }

    #[test]
    fn terminal_bid_statuses_reject_everything() {
        for from in [BidStatus::Canceled, BidStatus::Approved, BidStatus::Rejected] {
            for to in BID_STATUSES {
                assert!(validate_bid_transition(from, to).is_err());
            }
        }
    }
}
