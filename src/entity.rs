//! Core procurement records and their field validation
use super::error::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_REVIEW_LEN: usize = 1000;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    #[n(0)]
    Construction,
    #[n(1)]
    Delivery,
    #[n(2)]
    Manufacture,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenderStatus {
    #[n(0)]
    Created,
    #[n(1)]
    Published,
    #[n(2)]
    Closed,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidStatus {
    #[n(0)]
    Created,
    #[n(1)]
    Published,
    #[n(2)]
    Canceled,
    #[n(3)]
    Approved,
    #[n(4)]
    Rejected,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    #[n(0)]
    Approved,
    #[n(1)]
    Rejected,
}

impl fmt::Display for TenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TenderStatus::Created => "Created",
            TenderStatus::Published => "Published",
            TenderStatus::Closed => "Closed",
        })
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BidStatus::Created => "Created",
            BidStatus::Published => "Published",
            BidStatus::Canceled => "Canceled",
            BidStatus::Approved => "Approved",
            BidStatus::Rejected => "Rejected",
        })
    }
}

/// A procurement tender. Current state carries the version counter; every
/// version from 1 up to `version` has a matching snapshot in the store.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Tender {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub service_type: ServiceType,
    #[n(4)]
    pub status: TenderStatus,
    #[n(5)]
    pub organization_id: u64,
    #[n(6)]
    pub version: u32,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
}

/// A supplier bid against a tender.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Bid {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub status: BidStatus,
    #[n(4)]
    pub tender_id: u64,
    #[n(5)]
    pub organization_id: u64,
    #[n(6)]
    pub creator_id: u64,
    #[n(7)]
    pub version: u32,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
}

/// One reviewer's latest decision on a bid. Resubmission replaces the prior
/// record, decisions are not history-tracked.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct DecisionRecord {
    #[n(0)]
    pub bid_id: u64,
    #[n(1)]
    pub reviewer_id: u64,
    #[n(2)]
    pub decision: Decision,
    #[n(3)]
    pub decided_at: TimeStamp<Utc>,
}

/// Free-text feedback left on a bid by a responsible party.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct BidReview {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub bid_id: u64,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub created_at: TimeStamp<Utc>,
}

/// A registered user, the identity side of authorization.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub username: String,
    #[n(2)]
    pub first_name: String,
    #[n(3)]
    pub last_name: String,
    #[n(4)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub created_at: TimeStamp<Utc>,
}

/// Input for creating a tender. Status and version are assigned by the
/// service, not taken from the caller.
#[derive(Debug, Clone)]
pub struct TenderDraft {
    pub name: String,
    pub description: String,
    pub service_type: ServiceType,
    pub organization_id: u64,
}

#[derive(Debug, Clone)]
pub struct BidDraft {
    pub name: String,
    pub description: String,
    pub tender_id: u64,
    pub organization_id: u64,
}

/// Partial update for a tender edit. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct TenderPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub service_type: Option<ServiceType>,
}

#[derive(Debug, Clone, Default)]
pub struct BidPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(Error::Validation(format!(
            "name is required and at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<()> {
    if description.is_empty() || description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(Error::Validation(format!(
            "description is required and at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_review(description: &str) -> Result<()> {
    if description.is_empty() || description.chars().count() > MAX_REVIEW_LEN {
        return Err(Error::Validation(format!(
            "feedback is required and at most {MAX_REVIEW_LEN} characters"
        )));
    }
    Ok(())
}

impl TenderDraft {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_description(&self.description)?;
        if self.organization_id == 0 {
            return Err(Error::Validation("organizationId must be positive".into()));
        }
        Ok(())
    }
}

impl BidDraft {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_description(&self.description)?;
        if self.tender_id == 0 {
            return Err(Error::Validation("tenderId must be positive".into()));
        }
        if self.organization_id == 0 {
            return Err(Error::Validation("organizationId must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl<T: TimeZone> PartialEq for TimeStamp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: TimeZone> Eq for TimeStamp<T> {}

impl<T: TimeZone> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> std::result::Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _: &mut C,
    ) -> std::result::Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
