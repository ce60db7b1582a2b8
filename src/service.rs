//! Service layer API for tender and bid workflow operations
//!
//! Every mutation follows the same shape: resolve the caller to an identity,
//! check responsibility for the owning organization, validate the change,
//! then apply it as one version step (current-row compare-and-swap plus a
//! snapshot at the new version). A [`Error::Conflict`] from the apply step
//! means a concurrent writer won; the caller may retry from a fresh read.
use super::entity::{
    Bid, BidDraft, BidPatch, BidReview, BidStatus, Decision, DecisionRecord, Employee, ServiceType,
    Tender, TenderDraft, TenderPatch, TenderStatus, TimeStamp, validate_description, validate_name,
    validate_review,
};
use super::error::{Error, Result};
use super::quorum::{self, Outcome};
use super::status::{validate_bid_transition, validate_tender_transition};
use super::store::Store;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct TenderService {
    store: Store,
}

impl TenderService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Direct access to the underlying store, for wiring identities and
    /// organizations before workflow calls.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Resolve a caller to a registered identity.
    fn resolve_identity(&self, username: &str) -> Result<Employee> {
        self.store
            .employee_by_username(username)
            .map_err(|_| Error::Unauthenticated)
    }

    /// The authorization gate: the identity must be a responsible party of
    /// the organization. Runs before any write.
    fn authorize(&self, employee: &Employee, organization_id: u64) -> Result<()> {
        if self.store.is_responsible(employee.id, organization_id)? {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    /// One version step: bump the counter, swap the current row against the
    /// bytes read at the start of the operation, append the snapshot.
    fn apply_tender(&self, old: Tender, mut new: Tender) -> Result<Tender> {
        new.version = old.version + 1;
        self.store.put_tender(&old, &new)?;
        self.store.put_tender_snapshot(&new)?;
        debug!(tender = new.id, version = new.version, "tender updated");
        Ok(new)
    }

    fn apply_bid(&self, old: Bid, mut new: Bid) -> Result<Bid> {
        new.version = old.version + 1;
        self.store.put_bid(&old, &new)?;
        self.store.put_bid_snapshot(&new)?;
        debug!(bid = new.id, version = new.version, "bid updated");
        Ok(new)
    }

    // Tenders

    pub fn create_tender(&self, username: &str, draft: TenderDraft) -> Result<Tender> {
        draft.validate()?;
        let employee = self.resolve_identity(username)?;
        self.authorize(&employee, draft.organization_id)?;

        let tender = Tender {
            id: self.store.next_id()?,
            name: draft.name,
            description: draft.description,
            service_type: draft.service_type,
            status: TenderStatus::Created,
            organization_id: draft.organization_id,
            version: 1,
            created_at: TimeStamp::new(),
        };
        self.store.create_tender(&tender)?;
        debug!(tender = tender.id, "tender created");
        Ok(tender)
    }

    pub fn edit_tender(&self, username: &str, id: u64, patch: TenderPatch) -> Result<Tender> {
        let employee = self.resolve_identity(username)?;
        let current = self.store.get_tender(id)?;
        self.authorize(&employee, current.organization_id)?;

        let mut updated = current.clone();
        if let Some(name) = patch.name {
            validate_name(&name)?;
            updated.name = name;
        }
        if let Some(description) = patch.description {
            validate_description(&description)?;
            updated.description = description;
        }
        if let Some(service_type) = patch.service_type {
            updated.service_type = service_type;
        }
        self.apply_tender(current, updated)
    }

    pub fn change_tender_status(
        &self,
        username: &str,
        id: u64,
        status: TenderStatus,
    ) -> Result<Tender> {
        let employee = self.resolve_identity(username)?;
        let current = self.store.get_tender(id)?;
        self.authorize(&employee, current.organization_id)?;
        validate_tender_transition(current.status, status)?;

        let mut updated = current.clone();
        updated.status = status;
        self.apply_tender(current, updated)
    }

    /// Restore the mutable fields of snapshot `version` as a new version.
    /// Owning organization and creation time are preserved from current
    /// state. The snapshot is looked up before anything is written, so a
    /// missing version leaves the tender untouched.
    pub fn rollback_tender(&self, username: &str, id: u64, version: u32) -> Result<Tender> {
        if version < 1 {
            return Err(Error::Validation("version must be at least 1".into()));
        }
        let employee = self.resolve_identity(username)?;
        let current = self.store.get_tender(id)?;
        self.authorize(&employee, current.organization_id)?;
        let snapshot = self.store.get_tender_version(id, version)?;

        let mut restored = current.clone();
        restored.name = snapshot.name;
        restored.description = snapshot.description;
        restored.service_type = snapshot.service_type;
        restored.status = snapshot.status;
        self.apply_tender(current, restored)
    }

    pub fn get_tender(&self, id: u64) -> Result<Tender> {
        self.store.get_tender(id)
    }

    pub fn get_tender_version(&self, id: u64, version: u32) -> Result<Tender> {
        self.store.get_tender_version(id, version)
    }

    pub fn tender_history(&self, id: u64) -> Result<Vec<Tender>> {
        self.store.list_tender_versions(id)
    }

    pub fn list_tenders(
        &self,
        service_types: &[ServiceType],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Tender>> {
        self.store.list_tenders(service_types, limit, offset)
    }

    pub fn list_user_tenders(
        &self,
        username: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Tender>> {
        let employee = self.resolve_identity(username)?;
        self.store.list_user_tenders(employee.id, limit, offset)
    }

    // Bids

    pub fn create_bid(&self, username: &str, draft: BidDraft) -> Result<Bid> {
        draft.validate()?;
        let employee = self.resolve_identity(username)?;
        self.authorize(&employee, draft.organization_id)?;
        // The bid must target an existing tender.
        self.store.get_tender(draft.tender_id)?;

        let bid = Bid {
            id: self.store.next_id()?,
            name: draft.name,
            description: draft.description,
            status: BidStatus::Created,
            tender_id: draft.tender_id,
            organization_id: draft.organization_id,
            creator_id: employee.id,
            version: 1,
            created_at: TimeStamp::new(),
        };
        self.store.create_bid(&bid)?;
        debug!(bid = bid.id, tender = bid.tender_id, "bid created");
        Ok(bid)
    }

    /// Bid edits are the one place the organizational check can be bypassed:
    /// the bid's creator may always edit their own bid.
    pub fn edit_bid(&self, username: &str, id: u64, patch: BidPatch) -> Result<Bid> {
        let employee = self.resolve_identity(username)?;
        let current = self.store.get_bid(id)?;
        if employee.id != current.creator_id {
            self.authorize(&employee, current.organization_id)?;
        }

        let mut updated = current.clone();
        if let Some(name) = patch.name {
            validate_name(&name)?;
            updated.name = name;
        }
        if let Some(description) = patch.description {
            validate_description(&description)?;
            updated.description = description;
        }
        self.apply_bid(current, updated)
    }

    pub fn change_bid_status(&self, username: &str, id: u64, status: BidStatus) -> Result<Bid> {
        let employee = self.resolve_identity(username)?;
        let current = self.store.get_bid(id)?;
        self.authorize(&employee, current.organization_id)?;
        validate_bid_transition(current.status, status)?;

        let mut updated = current.clone();
        updated.status = status;
        self.apply_bid(current, updated)
    }

    pub fn rollback_bid(&self, username: &str, id: u64, version: u32) -> Result<Bid> {
        if version < 1 {
            return Err(Error::Validation("version must be at least 1".into()));
        }
        let employee = self.resolve_identity(username)?;
        let current = self.store.get_bid(id)?;
        self.authorize(&employee, current.organization_id)?;
        let snapshot = self.store.get_bid_version(id, version)?;

        let mut restored = current.clone();
        restored.name = snapshot.name;
        restored.description = snapshot.description;
        restored.status = snapshot.status;
        self.apply_bid(current, restored)
    }

    pub fn get_bid(&self, id: u64) -> Result<Bid> {
        self.store.get_bid(id)
    }

    pub fn get_bid_version(&self, id: u64, version: u32) -> Result<Bid> {
        self.store.get_bid_version(id, version)
    }

    pub fn bid_history(&self, id: u64) -> Result<Vec<Bid>> {
        self.store.list_bid_versions(id)
    }

    pub fn list_user_bids(&self, username: &str, limit: usize, offset: usize) -> Result<Vec<Bid>> {
        let employee = self.resolve_identity(username)?;
        self.store.list_user_bids(employee.id, limit, offset)
    }

    /// Bids on a tender visible to the caller: their own bids, plus all bids
    /// whose owning organization they are responsible for.
    pub fn list_bids_for_tender(
        &self,
        username: &str,
        tender_id: u64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Bid>> {
        let employee = self.resolve_identity(username)?;
        let mut bids = self.store.bids_for_tender(tender_id)?;
        let mut visible = Vec::new();
        for bid in bids.drain(..) {
            if bid.creator_id == employee.id
                || self.store.is_responsible(employee.id, bid.organization_id)?
            {
                visible.push(bid);
            }
        }
        Ok(visible.into_iter().skip(offset).take(limit).collect())
    }

    // Decisions

    /// Record one reviewer's decision and re-derive the bid outcome from the
    /// full decision set. Approval at quorum closes the owning tender as a
    /// best-effort side effect.
    pub fn submit_decision(&self, username: &str, bid_id: u64, decision: Decision) -> Result<Bid> {
        let employee = self.resolve_identity(username)?;
        let bid = self.store.get_bid(bid_id)?;
        self.authorize(&employee, bid.organization_id)?;

        // Decisions only apply while the bid is under review. A terminal or
        // unpublished bid cannot move to Approved/Rejected.
        if bid.status != BidStatus::Published {
            return Err(Error::InvalidTransition {
                from: bid.status.to_string(),
                to: decision_target(decision).to_string(),
            });
        }

        self.store.upsert_decision(&DecisionRecord {
            bid_id,
            reviewer_id: employee.id,
            decision,
            decided_at: TimeStamp::new(),
        })?;

        let (accepts, rejects) = self.store.count_decisions(bid_id)?;
        let responsible = self.store.responsible_count(bid.organization_id)?;

        match quorum::resolve(accepts, rejects, responsible) {
            Outcome::Rejected => {
                let mut rejected = bid.clone();
                rejected.status = BidStatus::Rejected;
                self.apply_bid(bid, rejected)
            }
            Outcome::Approved => {
                let mut approved = bid.clone();
                approved.status = BidStatus::Approved;
                let approved = self.apply_bid(bid, approved)?;
                self.close_tender_for(&approved);
                Ok(approved)
            }
            Outcome::Pending => Ok(bid),
        }
    }

    /// Close the owning tender after a bid approval. Best-effort: the bid's
    /// decision outcome stands even if the tender cannot be closed, the
    /// failure is only recorded.
    fn close_tender_for(&self, bid: &Bid) {
        let result = self.store.get_tender(bid.tender_id).and_then(|tender| {
            validate_tender_transition(tender.status, TenderStatus::Closed)?;
            let mut closed = tender.clone();
            closed.status = TenderStatus::Closed;
            self.apply_tender(tender, closed)
        });
        if let Err(err) = result {
            warn!(
                bid = bid.id,
                tender = bid.tender_id,
                error = %err,
                "failed to close tender after bid approval"
            );
        }
    }

    // Reviews

    pub fn submit_feedback(&self, username: &str, bid_id: u64, feedback: &str) -> Result<BidReview> {
        validate_review(feedback)?;
        let employee = self.resolve_identity(username)?;
        let bid = self.store.get_bid(bid_id)?;
        self.authorize(&employee, bid.organization_id)?;
        self.store.create_review(bid_id, feedback.to_owned())
    }

    /// Reviews left on an author's bids for one tender. The requester must be
    /// responsible for the tender's organization.
    pub fn list_reviews(
        &self,
        requester_username: &str,
        tender_id: u64,
        author_username: &str,
    ) -> Result<Vec<BidReview>> {
        let requester = self.resolve_identity(requester_username)?;
        let tender = self.store.get_tender(tender_id)?;
        self.authorize(&requester, tender.organization_id)?;
        let author = self.resolve_identity(author_username)?;

        let mut reviews = Vec::new();
        for bid in self.store.bids_for_tender(tender_id)? {
            if bid.creator_id == author.id {
                reviews.extend(self.store.reviews_for_bid(bid.id)?);
            }
        }
        Ok(reviews)
    }
}

fn decision_target(decision: Decision) -> BidStatus {
    match decision {
        Decision::Approved => BidStatus::Approved,
        Decision::Rejected => BidStatus::Rejected,
    }
}
