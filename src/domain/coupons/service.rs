//! Coupons Service
//!
//! Owns the issuance path: the check-capacity-then-increment sequence runs
//! under an exclusive lock on the campaign row so concurrent requests for the
//! same campaign serialize instead of over-issuing.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use tracing::{Span, error, info};

use crate::{
    database::Db,
    domain::{
        campaigns::{records::CampaignId, repository::PgCampaignsRepository},
        coupons::{
            CouponsServiceError,
            records::{
                CancellationOutcome, CouponId, CouponRecord, CouponStatus, HolderId,
                RedemptionOutcome,
            },
            repository::PgCouponsRepository,
        },
    },
};

#[derive(Debug, Clone)]
pub struct PgCouponsService {
    db: Db,
    campaigns: PgCampaignsRepository,
    coupons: PgCouponsRepository,
}

impl PgCouponsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            campaigns: PgCampaignsRepository::new(),
            coupons: PgCouponsRepository::new(),
        }
    }
}

#[async_trait]
impl CouponsService for PgCouponsService {
    #[tracing::instrument(
        name = "coupons.service.issue_coupon",
        skip(self),
        fields(
            campaign_id = %campaign,
            holder_id = %holder,
            coupon_id = tracing::field::Empty
        ),
        err
    )]
    async fn issue_coupon(
        &self,
        campaign: CampaignId,
        holder: HolderId,
        now: Timestamp,
    ) -> Result<CouponRecord, CouponsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        // The row lock is held until commit, so the eligibility check below
        // and the counter update form one atomic unit per campaign.
        let mut record = self.campaigns.lock_campaign(&mut tx, campaign).await?;

        if !record.is_eligible_for_issuance(now) {
            return Err(CouponsServiceError::NotEligible);
        }

        record.record_issuance(now).map_err(|source| {
            error!(campaign_id = %campaign, %source, "issuance accounting violated");
            CouponsServiceError::IllegalState(source)
        })?;

        self.campaigns.update_issuance(&mut tx, &record).await?;

        let coupon = self
            .coupons
            .create_coupon(&mut tx, campaign, holder, now)
            .await?;

        tx.commit().await?;

        Span::current().record("coupon_id", tracing::field::display(coupon.id));

        info!(
            coupon_id = %coupon.id,
            campaign_id = %campaign,
            issued_count = record.issued_count,
            "issued coupon"
        );

        Ok(coupon)
    }

    #[tracing::instrument(
        name = "coupons.service.redeem_coupon",
        skip(self),
        fields(coupon_id = %coupon, outcome = tracing::field::Empty),
        err
    )]
    async fn redeem_coupon(
        &self,
        coupon: CouponId,
        now: Timestamp,
    ) -> Result<RedemptionOutcome, CouponsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let mut record = self.coupons.lock_coupon(&mut tx, coupon).await?;

        let campaign = self
            .campaigns
            .get_campaign(&mut tx, record.campaign_id)
            .await?;

        let outcome = record.redeem(now, campaign.end_date);

        // AlreadyFinalized leaves the record untouched; nothing to write.
        if outcome != RedemptionOutcome::AlreadyFinalized {
            self.coupons.update_coupon_state(&mut tx, &record).await?;
        }

        tx.commit().await?;

        Span::current().record("outcome", tracing::field::debug(outcome));

        info!(coupon_id = %coupon, ?outcome, "redeemed coupon");

        Ok(outcome)
    }

    #[tracing::instrument(
        name = "coupons.service.cancel_redemption",
        skip(self),
        fields(coupon_id = %coupon, outcome = tracing::field::Empty),
        err
    )]
    async fn cancel_redemption(
        &self,
        coupon: CouponId,
    ) -> Result<CancellationOutcome, CouponsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let mut record = self.coupons.lock_coupon(&mut tx, coupon).await?;

        let outcome = record.cancel_redemption();

        if outcome == CancellationOutcome::Reinstated {
            self.coupons.update_coupon_state(&mut tx, &record).await?;
        }

        tx.commit().await?;

        Span::current().record("outcome", tracing::field::debug(outcome));

        info!(coupon_id = %coupon, ?outcome, "canceled redemption");

        Ok(outcome)
    }

    async fn get_coupon(&self, coupon: CouponId) -> Result<CouponRecord, CouponsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let record = self.coupons.get_coupon(&mut tx, coupon).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn list_holder_coupons(
        &self,
        holder: HolderId,
        status: CouponStatus,
    ) -> Result<Vec<CouponRecord>, CouponsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let records = self
            .coupons
            .list_by_holder_and_status(&mut tx, holder, status)
            .await?;

        tx.commit().await?;

        Ok(records)
    }

    async fn count_redeemable(
        &self,
        holder: HolderId,
        now: Timestamp,
    ) -> Result<u64, CouponsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let count = self
            .coupons
            .count_redeemable_by_holder(&mut tx, holder, now)
            .await?;

        tx.commit().await?;

        Ok(count)
    }
}

#[automock]
#[async_trait]
pub trait CouponsService: Send + Sync {
    /// Issue a coupon against a campaign's capacity.
    ///
    /// For a campaign with `max_issuance = N`, successful issuances never
    /// exceed N, regardless of concurrent call volume.
    async fn issue_coupon(
        &self,
        campaign: CampaignId,
        holder: HolderId,
        now: Timestamp,
    ) -> Result<CouponRecord, CouponsServiceError>;

    /// Mark a coupon as used at `now`.
    async fn redeem_coupon(
        &self,
        coupon: CouponId,
        now: Timestamp,
    ) -> Result<RedemptionOutcome, CouponsServiceError>;

    /// Reverse a redemption.
    async fn cancel_redemption(
        &self,
        coupon: CouponId,
    ) -> Result<CancellationOutcome, CouponsServiceError>;

    /// Retrieve a single coupon.
    async fn get_coupon(&self, coupon: CouponId) -> Result<CouponRecord, CouponsServiceError>;

    /// List a holder's coupons in the given state.
    async fn list_holder_coupons(
        &self,
        holder: HolderId,
        status: CouponStatus,
    ) -> Result<Vec<CouponRecord>, CouponsServiceError>;

    /// Count a holder's coupons that can still be redeemed.
    async fn count_redeemable(
        &self,
        holder: HolderId,
        now: Timestamp,
    ) -> Result<u64, CouponsServiceError>;
}
