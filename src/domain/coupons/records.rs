//! Coupon Records

use jiff::Timestamp;
use serde::Serialize;

use crate::{
    domain::{audit::Audit, campaigns::records::CampaignId},
    ids::TypedId,
};

/// Coupon ID
pub type CouponId = TypedId<CouponRecord>;

/// Marker for holder identifiers. Holders are customers of the storefront;
/// this service only ever sees their opaque numeric id.
#[derive(Debug, Clone, Copy)]
pub struct Holder;

/// Holder ID
pub type HolderId = TypedId<Holder>;

/// Coupon Status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    Issued,
    Used,
    Expired,
    Canceled,
}

impl CouponStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Used => "used",
            Self::Expired => "expired",
            Self::Canceled => "canceled",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "issued" => Some(Self::Issued),
            "used" => Some(Self::Used),
            "expired" => Some(Self::Expired),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }
}

/// Result of a redemption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionOutcome {
    /// The coupon transitioned to `Used`.
    Redeemed,
    /// The coupon had already left the `Issued` state; nothing changed.
    AlreadyFinalized,
    /// The owning campaign's window has closed; the coupon is now `Expired`.
    CampaignWindowClosed,
}

/// Result of a cancellation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationOutcome {
    /// The redemption was reversed; the coupon is `Issued` again.
    Reinstated,
    /// The coupon was not in the `Used` state; nothing changed.
    NotCurrentlyUsed,
}

/// Coupon Record
///
/// One issued coupon held by one customer. Rows are kept forever for
/// accounting, even after the owning campaign is disabled.
#[derive(Debug, Clone, Serialize)]
pub struct CouponRecord {
    pub id: CouponId,
    pub campaign_id: CampaignId,
    pub holder_id: HolderId,
    pub status: CouponStatus,
    pub issued_at: Timestamp,
    /// Set exactly while the status is `Used`.
    pub used_at: Option<Timestamp>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl CouponRecord {
    /// Mark the coupon as used at `now`.
    ///
    /// Repeat calls are no-ops with an explicit negative outcome, so callers
    /// may retry safely. A redemption attempted after the owning campaign's
    /// end date finalizes the coupon as `Expired`.
    pub fn redeem(&mut self, now: Timestamp, campaign_end: Timestamp) -> RedemptionOutcome {
        if self.status != CouponStatus::Issued {
            return RedemptionOutcome::AlreadyFinalized;
        }

        if now > campaign_end {
            self.status = CouponStatus::Expired;
            return RedemptionOutcome::CampaignWindowClosed;
        }

        self.status = CouponStatus::Used;
        self.used_at = Some(now);

        RedemptionOutcome::Redeemed
    }

    /// Reverse a redemption, returning the coupon to the `Issued` state.
    pub fn cancel_redemption(&mut self) -> CancellationOutcome {
        if self.status != CouponStatus::Used {
            return CancellationOutcome::NotCurrentlyUsed;
        }

        self.status = CouponStatus::Issued;
        self.used_at = None;

        CancellationOutcome::Reinstated
    }
}
