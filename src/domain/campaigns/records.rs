//! Campaign Records

use jiff::Timestamp;
use serde::Serialize;
use thiserror::Error;

use crate::{domain::audit::Audit, ids::TypedId};

/// Campaign ID
pub type CampaignId = TypedId<CampaignRecord>;

/// Campaign Status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Created,
    Active,
    Expired,
    Disabled,
}

impl CampaignStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Disabled => "disabled",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Self::Created),
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// Discount Descriptor
///
/// Exactly one payload shape per campaign. The nullable amount/rate column
/// pair exists only at the SQL boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discount {
    /// Fixed amount off, in minor currency units.
    FixedAmount { amount: u64 },
    /// Percentage off the purchase, `1..=100`.
    Percentage { rate: u16 },
    /// Delivery fee waived; no payload.
    FreeDelivery,
}

impl Discount {
    #[must_use]
    pub const fn kind_as_str(&self) -> &'static str {
        match self {
            Self::FixedAmount { .. } => "fixed_amount",
            Self::Percentage { .. } => "percentage",
            Self::FreeDelivery => "free_delivery",
        }
    }
}

/// What deleting a campaign should actually do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionAction {
    /// No coupon was ever issued; the row can be removed.
    Delete,
    /// Issuance history exists; soft-disable instead.
    Disable,
}

/// Signals `record_issuance` on a campaign that is not eligible. This is a
/// coordination bug, not a user error: the issuance path must hold the
/// campaign row lock and re-check eligibility first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("issuance recorded against ineligible campaign {campaign}")]
pub struct IssuanceStateError {
    pub campaign: CampaignId,
}

/// Campaign Record
#[derive(Debug, Clone, Serialize)]
pub struct CampaignRecord {
    pub id: CampaignId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub discount: Discount,
    /// Minimum purchase total required to apply the discount, minor units.
    pub minimum_purchase: Option<u64>,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    /// Issuance cap; absent means unlimited.
    pub max_issuance: Option<u32>,
    pub issued_count: u32,
    pub status: CampaignStatus,
    #[serde(flatten)]
    pub audit: Audit,
}

impl CampaignRecord {
    /// Whether a new coupon may be issued against this campaign right now.
    ///
    /// True iff the campaign is `Active`, `now` lies strictly inside the
    /// validity window, and capacity remains. A campaign with
    /// `max_issuance == 0` is never eligible.
    #[must_use]
    pub fn is_eligible_for_issuance(&self, now: Timestamp) -> bool {
        self.status == CampaignStatus::Active
            && self.start_date < now
            && now < self.end_date
            && self.max_issuance.is_none_or(|cap| self.issued_count < cap)
    }

    /// Account for one issued coupon.
    ///
    /// Increments the counter and auto-expires the campaign once the cap is
    /// reached. The eligibility re-check is defensive; callers must have
    /// verified [`Self::is_eligible_for_issuance`] under the campaign row
    /// lock, so the error path indicates a coordination defect.
    pub fn record_issuance(&mut self, now: Timestamp) -> Result<(), IssuanceStateError> {
        if !self.is_eligible_for_issuance(now) {
            return Err(IssuanceStateError { campaign: self.id });
        }

        self.issued_count += 1;

        if self.max_issuance.is_some_and(|cap| self.issued_count >= cap) {
            self.status = CampaignStatus::Expired;
        }

        Ok(())
    }

    /// Decide between hard deletion and soft disabling.
    ///
    /// Kept on the record rather than in the repository so the decision is
    /// testable without storage.
    #[must_use]
    pub fn deletion_action(&self, has_historical_issuance: bool) -> DeletionAction {
        if has_historical_issuance {
            DeletionAction::Disable
        } else {
            DeletionAction::Delete
        }
    }
}
