//! Sled-backed persistence for tenders, bids, decisions and identities
//!
//! Each record family lives in its own tree with big-endian integer keys, so
//! range scans come back in id (and version) order. All values are CBOR.
//!
//! The current row for an entity is only ever replaced through a
//! compare-and-swap against the previously read bytes, and snapshots are
//! inserted with a compare-and-swap against absence. Together these give the
//! lost-update detection the versioning contract relies on: two writers
//! racing from the same version produce exactly one success and one
//! [`Error::Conflict`].
use super::entity::{
    Bid, BidReview, Decision, DecisionRecord, Employee, Organization, ServiceType, Tender,
    TimeStamp,
};
use super::error::{Error, Result};
use sled::Tree;
use std::path::Path;

#[derive(Clone)]
pub struct Store {
    db: sled::Db,
    tenders: Tree,
    tender_versions: Tree,
    bids: Tree,
    bid_versions: Tree,
    decisions: Tree,
    reviews: Tree,
    employees: Tree,
    usernames: Tree,
    organizations: Tree,
    responsible: Tree,
}

fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn version_key(id: u64, version: u32) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..8].copy_from_slice(&id.to_be_bytes());
    key[8..].copy_from_slice(&version.to_be_bytes());
    key
}

fn pair_key(a: u64, b: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..].copy_from_slice(&b.to_be_bytes());
    key
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>> {
    Ok(minicbor::to_vec(value)?)
}

fn decode<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}

fn fetch<T>(tree: &Tree, key: &[u8], what: &'static str) -> Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match tree.get(key)? {
        Some(bytes) => decode(&bytes),
        None => Err(Error::NotFound(what)),
    }
}

/// Insert only if the key is absent. A duplicate key means a version was
/// about to be overwritten, which the history contract forbids.
fn insert_new(tree: &Tree, key: &[u8], value: Vec<u8>) -> Result<()> {
    tree.compare_and_swap(key, None as Option<&[u8]>, Some(value))?
        .map_err(|_| Error::Conflict)
}

/// Replace the current row only if it still holds the bytes the caller read.
fn replace(tree: &Tree, key: &[u8], old: Vec<u8>, new: Vec<u8>) -> Result<()> {
    tree.compare_and_swap(key, Some(old), Some(new))?
        .map_err(|_| Error::Conflict)
}

fn collect<T>(iter: sled::Iter) -> Result<Vec<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    let mut records = Vec::new();
    for item in iter {
        let (_, value) = item?;
        records.push(decode(&value)?);
    }
    Ok(records)
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(sled::Config::new().path(path))
    }

    pub fn open_with(config: sled::Config) -> Result<Self> {
        let db = config.open()?;
        Ok(Self {
            tenders: db.open_tree("tenders")?,
            tender_versions: db.open_tree("tender_versions")?,
            bids: db.open_tree("bids")?,
            bid_versions: db.open_tree("bid_versions")?,
            decisions: db.open_tree("decisions")?,
            reviews: db.open_tree("reviews")?,
            employees: db.open_tree("employees")?,
            usernames: db.open_tree("usernames")?,
            organizations: db.open_tree("organizations")?,
            responsible: db.open_tree("responsible")?,
            db,
        })
    }

    /// Allocate a fresh entity id. Ids start at 1, zero is reserved as an
    /// invalid id in request validation.
    pub fn next_id(&self) -> Result<u64> {
        Ok(self.db.generate_id()? + 1)
    }

    // Tenders

    pub fn create_tender(&self, tender: &Tender) -> Result<()> {
        insert_new(&self.tenders, &id_key(tender.id), encode(tender)?)?;
        self.put_tender_snapshot(tender)
    }

    pub fn get_tender(&self, id: u64) -> Result<Tender> {
        fetch(&self.tenders, &id_key(id), "tender")
    }

    pub fn put_tender(&self, old: &Tender, new: &Tender) -> Result<()> {
        replace(&self.tenders, &id_key(new.id), encode(old)?, encode(new)?)
    }

    pub fn put_tender_snapshot(&self, tender: &Tender) -> Result<()> {
        insert_new(
            &self.tender_versions,
            &version_key(tender.id, tender.version),
            encode(tender)?,
        )
    }

    pub fn get_tender_version(&self, id: u64, version: u32) -> Result<Tender> {
        fetch(&self.tender_versions, &version_key(id, version), "tender version")
    }

    /// Full snapshot history in ascending version order.
    pub fn list_tender_versions(&self, id: u64) -> Result<Vec<Tender>> {
        collect(self.tender_versions.scan_prefix(id_key(id)))
    }

    pub fn list_tenders(
        &self,
        service_types: &[ServiceType],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Tender>> {
        let mut tenders: Vec<Tender> = collect(self.tenders.iter())?;
        if !service_types.is_empty() {
            tenders.retain(|t| service_types.contains(&t.service_type));
        }
        tenders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tenders.into_iter().skip(offset).take(limit).collect())
    }

    /// Tenders belonging to organizations the user is responsible for.
    pub fn list_user_tenders(
        &self,
        user_id: u64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Tender>> {
        let mut tenders = Vec::new();
        for item in self.tenders.iter() {
            let (_, value) = item?;
            let tender: Tender = decode(&value)?;
            if self.is_responsible(user_id, tender.organization_id)? {
                tenders.push(tender);
            }
        }
        tenders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tenders.into_iter().skip(offset).take(limit).collect())
    }

    // Bids

    pub fn create_bid(&self, bid: &Bid) -> Result<()> {
        insert_new(&self.bids, &id_key(bid.id), encode(bid)?)?;
        self.put_bid_snapshot(bid)
    }

    pub fn get_bid(&self, id: u64) -> Result<Bid> {
        fetch(&self.bids, &id_key(id), "bid")
    }

    pub fn put_bid(&self, old: &Bid, new: &Bid) -> Result<()> {
        replace(&self.bids, &id_key(new.id), encode(old)?, encode(new)?)
    }

    pub fn put_bid_snapshot(&self, bid: &Bid) -> Result<()> {
        insert_new(
            &self.bid_versions,
            &version_key(bid.id, bid.version),
            encode(bid)?,
        )
    }

    pub fn get_bid_version(&self, id: u64, version: u32) -> Result<Bid> {
        fetch(&self.bid_versions, &version_key(id, version), "bid version")
    }

    pub fn list_bid_versions(&self, id: u64) -> Result<Vec<Bid>> {
        collect(self.bid_versions.scan_prefix(id_key(id)))
    }

    pub fn list_user_bids(&self, creator_id: u64, limit: usize, offset: usize) -> Result<Vec<Bid>> {
        let mut bids: Vec<Bid> = collect(self.bids.iter())?;
        bids.retain(|b| b.creator_id == creator_id);
        bids.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bids.into_iter().skip(offset).take(limit).collect())
    }

    pub fn bids_for_tender(&self, tender_id: u64) -> Result<Vec<Bid>> {
        let mut bids: Vec<Bid> = collect(self.bids.iter())?;
        bids.retain(|b| b.tender_id == tender_id);
        bids.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bids)
    }

    // Decisions

    /// Record the reviewer's latest decision. A resubmission replaces the
    /// previous one, so at most one row exists per (bid, reviewer).
    pub fn upsert_decision(&self, record: &DecisionRecord) -> Result<()> {
        self.decisions.insert(
            pair_key(record.bid_id, record.reviewer_id),
            encode(record)?,
        )?;
        Ok(())
    }

    /// Counts of (approvals, rejections) currently on file for a bid.
    pub fn count_decisions(&self, bid_id: u64) -> Result<(u32, u32)> {
        let mut accepts = 0;
        let mut rejects = 0;
        for item in self.decisions.scan_prefix(id_key(bid_id)) {
            let (_, value) = item?;
            let record: DecisionRecord = decode(&value)?;
            match record.decision {
                Decision::Approved => accepts += 1,
                Decision::Rejected => rejects += 1,
            }
        }
        Ok((accepts, rejects))
    }

    // Reviews

    pub fn create_review(&self, bid_id: u64, description: String) -> Result<BidReview> {
        let review = BidReview {
            id: self.next_id()?,
            bid_id,
            description,
            created_at: TimeStamp::new(),
        };
        insert_new(
            &self.reviews,
            &pair_key(bid_id, review.id),
            encode(&review)?,
        )?;
        Ok(review)
    }

    pub fn reviews_for_bid(&self, bid_id: u64) -> Result<Vec<BidReview>> {
        collect(self.reviews.scan_prefix(id_key(bid_id)))
    }

    // Identities and organizations

    pub fn create_employee(
        &self,
        username: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Employee> {
        let employee = Employee {
            id: self.next_id()?,
            username: username.to_owned(),
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            created_at: TimeStamp::new(),
        };
        insert_new(
            &self.usernames,
            username.as_bytes(),
            employee.id.to_be_bytes().to_vec(),
        )?;
        insert_new(&self.employees, &id_key(employee.id), encode(&employee)?)?;
        Ok(employee)
    }

    pub fn employee_by_username(&self, username: &str) -> Result<Employee> {
        let bytes = self
            .usernames
            .get(username.as_bytes())?
            .ok_or(Error::NotFound("employee"))?;
        let mut id = [0u8; 8];
        id.copy_from_slice(&bytes);
        fetch(&self.employees, &id, "employee")
    }

    pub fn create_organization(&self, name: &str, description: &str) -> Result<Organization> {
        let organization = Organization {
            id: self.next_id()?,
            name: name.to_owned(),
            description: description.to_owned(),
            created_at: TimeStamp::new(),
        };
        insert_new(
            &self.organizations,
            &id_key(organization.id),
            encode(&organization)?,
        )?;
        Ok(organization)
    }

    pub fn get_organization(&self, id: u64) -> Result<Organization> {
        fetch(&self.organizations, &id_key(id), "organization")
    }

    pub fn add_responsible(&self, organization_id: u64, user_id: u64) -> Result<()> {
        self.responsible
            .insert(pair_key(organization_id, user_id), Vec::<u8>::new())?;
        Ok(())
    }

    pub fn remove_responsible(&self, organization_id: u64, user_id: u64) -> Result<()> {
        self.responsible
            .remove(pair_key(organization_id, user_id))?;
        Ok(())
    }

    pub fn is_responsible(&self, user_id: u64, organization_id: u64) -> Result<bool> {
        Ok(self
            .responsible
            .contains_key(pair_key(organization_id, user_id))?)
    }

    pub fn responsible_count(&self, organization_id: u64) -> Result<u32> {
        let mut count = 0;
        for item in self.responsible.scan_prefix(id_key(organization_id)) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::TenderStatus;

    fn temp_store() -> Store {
        Store::open_with(sled::Config::new().temporary(true)).unwrap()
    }

    fn sample_tender(id: u64, version: u32) -> Tender {
        Tender {
            id,
            name: "Warehouse build".into(),
            description: "New storage warehouse".into(),
            service_type: ServiceType::Construction,
            status: TenderStatus::Created,
            organization_id: 1,
            version,
            created_at: TimeStamp::new_with(2024, 5, 1, 9, 0, 0),
        }
    }

    #[test]
    fn current_row_replace_detects_stale_reads() {
        let store = temp_store();
        let v1 = sample_tender(1, 1);
        store.create_tender(&v1).unwrap();

        let mut v2 = v1.clone();
        v2.version = 2;
        store.put_tender(&v1, &v2).unwrap();

        // A second writer still holding v1 must lose.
        let mut stale = v1.clone();
        stale.version = 2;
        stale.name = "Other name".into();
        assert!(matches!(store.put_tender(&v1, &stale), Err(Error::Conflict)));
    }

    #[test]
    fn snapshots_are_never_overwritten() {
        let store = temp_store();
        let v1 = sample_tender(1, 1);
        store.create_tender(&v1).unwrap();

        let mut shadow = v1.clone();
        shadow.name = "Shadow".into();
        assert!(matches!(
            store.put_tender_snapshot(&shadow),
            Err(Error::Conflict)
        ));
        assert_eq!(store.get_tender_version(1, 1).unwrap(), v1);
    }

    #[test]
    fn version_listing_is_ascending() {
        let store = temp_store();
        let v1 = sample_tender(1, 1);
        store.create_tender(&v1).unwrap();
        let mut v2 = v1.clone();
        v2.version = 2;
        store.put_tender(&v1, &v2).unwrap();
        store.put_tender_snapshot(&v2).unwrap();

        let history = store.list_tender_versions(1).unwrap();
        assert_eq!(
            history.iter().map(|t| t.version).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn decision_upsert_is_idempotent_per_reviewer() {
        let store = temp_store();
        let record = DecisionRecord {
            bid_id: 9,
            reviewer_id: 4,
            decision: Decision::Approved,
            decided_at: TimeStamp::new(),
        };
        store.upsert_decision(&record).unwrap();
        let flipped = DecisionRecord {
            decision: Decision::Rejected,
            decided_at: TimeStamp::new(),
            ..record
        };
        store.upsert_decision(&flipped).unwrap();

        assert_eq!(store.count_decisions(9).unwrap(), (0, 1));
    }

    #[test]
    fn duplicate_usernames_are_rejected() {
        let store = temp_store();
        store.create_employee("ada", "Ada", "Lovelace").unwrap();
        assert!(store.create_employee("ada", "Ada", "Byron").is_err());
    }

    #[test]
    fn responsibility_registry() {
        let store = temp_store();
        store.add_responsible(5, 10).unwrap();
        store.add_responsible(5, 11).unwrap();
        store.add_responsible(6, 10).unwrap();

        assert!(store.is_responsible(10, 5).unwrap());
        assert!(!store.is_responsible(11, 6).unwrap());
        assert_eq!(store.responsible_count(5).unwrap(), 2);
    }
}
