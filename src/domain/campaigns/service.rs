//! Campaigns Service

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use tracing::{Span, info};

use crate::{
    database::Db,
    domain::{
        campaigns::{
            CampaignsServiceError,
            data::{CampaignUpdate, NewCampaign, Page},
            records::{CampaignId, CampaignRecord, CampaignStatus, DeletionAction},
            repository::PgCampaignsRepository,
        },
        coupons::{records::CouponStatus, repository::PgCouponsRepository},
    },
};

/// Coupon states that count as issuance history when deciding whether a
/// campaign may be hard-deleted. Expired or canceled history does not block
/// deletion; the referencing rows will still stop the `DELETE` at the
/// foreign key.
const BLOCKING_STATUSES: [CouponStatus; 2] = [CouponStatus::Issued, CouponStatus::Used];

#[derive(Debug, Clone)]
pub struct PgCampaignsService {
    db: Db,
    campaigns: PgCampaignsRepository,
    coupons: PgCouponsRepository,
}

impl PgCampaignsService {
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
impl CampaignsService for PgCampaignsService {
    #[tracing::instrument(
        name = "campaigns.service.create_campaign",
        skip(self, campaign),
        fields(
            campaign_code = %campaign.code,
            discount_kind = %campaign.discount.kind_as_str(),
            campaign_id = tracing::field::Empty
        ),
        err
    )]
    async fn create_campaign(
        &self,
        campaign: NewCampaign,
    ) -> Result<CampaignRecord, CampaignsServiceError> {
        campaign
            .validate()
            .map_err(CampaignsServiceError::Validation)?;

        let mut tx = self.db.begin_transaction().await?;

        let record = self.campaigns.create_campaign(&mut tx, campaign).await?;

        tx.commit().await?;

        Span::current().record("campaign_id", tracing::field::display(record.id));

        info!(campaign_id = %record.id, code = %record.code, "created campaign");

        Ok(record)
    }

    async fn get_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<CampaignRecord, CampaignsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let record = self.campaigns.get_campaign(&mut tx, campaign).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn get_campaign_by_code(
        &self,
        code: &str,
    ) -> Result<CampaignRecord, CampaignsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let record = self
            .campaigns
            .find_campaign_by_code(&mut tx, code)
            .await?
            .ok_or(CampaignsServiceError::NotFound)?;

        tx.commit().await?;

        Ok(record)
    }

    async fn list_campaigns(&self, page: Page) -> Result<Vec<CampaignRecord>, CampaignsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let records = self.campaigns.list_campaigns(&mut tx, page).await?;

        tx.commit().await?;

        Ok(records)
    }

    async fn list_open_campaigns(
        &self,
        now: Timestamp,
    ) -> Result<Vec<CampaignRecord>, CampaignsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let records = self.campaigns.list_open_campaigns(&mut tx, now).await?;

        tx.commit().await?;

        Ok(records)
    }

    #[tracing::instrument(
        name = "campaigns.service.update_campaign",
        skip(self, update),
        fields(campaign_id = %campaign),
        err
    )]
    async fn update_campaign(
        &self,
        campaign: CampaignId,
        update: CampaignUpdate,
    ) -> Result<CampaignRecord, CampaignsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let record = self
            .campaigns
            .update_campaign(&mut tx, campaign, update)
            .await?;

        tx.commit().await?;

        info!(campaign_id = %campaign, "updated campaign");

        Ok(record)
    }

    async fn activate_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<CampaignRecord, CampaignsServiceError> {
        self.set_status(campaign, CampaignStatus::Active).await
    }

    async fn deactivate_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<CampaignRecord, CampaignsServiceError> {
        self.set_status(campaign, CampaignStatus::Disabled).await
    }

    #[tracing::instrument(
        name = "campaigns.service.delete_campaign",
        skip(self),
        fields(campaign_id = %campaign, action = tracing::field::Empty),
        err
    )]
    async fn delete_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<DeletionAction, CampaignsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let record = self.campaigns.get_campaign(&mut tx, campaign).await?;

        let issued = self
            .coupons
            .count_by_campaign_and_status(&mut tx, campaign, &BLOCKING_STATUSES)
            .await?;

        let action = record.deletion_action(issued > 0);

        match action {
            DeletionAction::Disable => {
                self.campaigns
                    .set_campaign_status(&mut tx, campaign, CampaignStatus::Disabled)
                    .await?;
            }
            DeletionAction::Delete => {
                self.campaigns.delete_campaign(&mut tx, campaign).await?;
            }
        }

        tx.commit().await?;

        Span::current().record("action", tracing::field::debug(action));

        info!(campaign_id = %campaign, ?action, "deleted campaign");

        Ok(action)
    }
}

impl PgCampaignsService {
    async fn set_status(
        &self,
        campaign: CampaignId,
        status: CampaignStatus,
    ) -> Result<CampaignRecord, CampaignsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let record = self
            .campaigns
            .set_campaign_status(&mut tx, campaign, status)
            .await?;

        tx.commit().await?;

        info!(campaign_id = %campaign, status = status.as_str(), "set campaign status");

        Ok(record)
    }
}

#[automock]
#[async_trait]
pub trait CampaignsService: Send + Sync {
    /// Create a campaign after validating its definition.
    async fn create_campaign(
        &self,
        campaign: NewCampaign,
    ) -> Result<CampaignRecord, CampaignsServiceError>;

    /// Retrieve a single campaign.
    async fn get_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<CampaignRecord, CampaignsServiceError>;

    /// Retrieve a campaign by its human-readable code.
    async fn get_campaign_by_code(
        &self,
        code: &str,
    ) -> Result<CampaignRecord, CampaignsServiceError>;

    /// List campaigns ordered by id.
    async fn list_campaigns(&self, page: Page)
    -> Result<Vec<CampaignRecord>, CampaignsServiceError>;

    /// List campaigns currently eligible for issuance.
    async fn list_open_campaigns(
        &self,
        now: Timestamp,
    ) -> Result<Vec<CampaignRecord>, CampaignsServiceError>;

    /// Apply a partial update; absent fields keep their stored value.
    async fn update_campaign(
        &self,
        campaign: CampaignId,
        update: CampaignUpdate,
    ) -> Result<CampaignRecord, CampaignsServiceError>;

    /// Administrative override to `Active`.
    async fn activate_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<CampaignRecord, CampaignsServiceError>;

    /// Administrative override to `Disabled`.
    async fn deactivate_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<CampaignRecord, CampaignsServiceError>;

    /// Remove a campaign, or disable it when coupons were issued against it.
    async fn delete_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<DeletionAction, CampaignsServiceError>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{
        domain::{
            campaigns::{data::ValidationIssue, records::Discount},
            coupons::CouponsService,
        },
        test::{TestContext, helpers},
    };

    use super::*;

    #[tokio::test]
    async fn create_campaign_returns_persisted_record() -> TestResult {
        let ctx = TestContext::new().await;

        let campaign = ctx
            .campaigns
            .create_campaign(helpers::open_campaign("SUMMER25", Some(100)))
            .await?;

        assert_eq!(campaign.code, "SUMMER25");
        assert_eq!(campaign.discount, Discount::Percentage { rate: 25 });
        assert_eq!(campaign.max_issuance, Some(100));
        assert_eq!(campaign.issued_count, 0);
        assert_eq!(campaign.status, CampaignStatus::Created);

        Ok(())
    }

    #[tokio::test]
    async fn create_campaign_timestamps_are_set() -> TestResult {
        let ctx = TestContext::new().await;

        let before = Timestamp::now();

        let campaign = ctx
            .campaigns
            .create_campaign(helpers::open_campaign("STAMPED", None))
            .await?;

        let after = Timestamp::now();

        assert!(campaign.audit.created_at >= before);
        assert!(campaign.audit.created_at <= after);

        Ok(())
    }

    #[tokio::test]
    async fn create_campaign_duplicate_code_returns_duplicate_code() -> TestResult {
        let ctx = TestContext::new().await;

        ctx.campaigns
            .create_campaign(helpers::open_campaign("TWICE", None))
            .await?;

        let result = ctx
            .campaigns
            .create_campaign(helpers::open_campaign("TWICE", None))
            .await;

        assert!(
            matches!(result, Err(CampaignsServiceError::DuplicateCode)),
            "expected DuplicateCode, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn create_campaign_rate_out_of_range_returns_validation() {
        let ctx = TestContext::new().await;

        let mut campaign = helpers::open_campaign("TOOBIG", None);
        campaign.discount = Discount::Percentage { rate: 150 };

        let result = ctx.campaigns.create_campaign(campaign).await;

        assert!(
            matches!(
                result,
                Err(CampaignsServiceError::Validation(ref issues))
                    if issues == &[ValidationIssue::RateOutOfRange]
            ),
            "expected Validation(RateOutOfRange), got {result:?}"
        );
    }

    #[tokio::test]
    async fn get_campaign_by_code_finds_campaign() -> TestResult {
        let ctx = TestContext::new().await;

        let created = ctx
            .campaigns
            .create_campaign(helpers::open_campaign("BYCODE", None))
            .await?;

        let found = ctx.campaigns.get_campaign_by_code("BYCODE").await?;

        assert_eq!(found.id, created.id);

        Ok(())
    }

    #[tokio::test]
    async fn get_campaign_by_code_unknown_returns_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx.campaigns.get_campaign_by_code("MISSING").await;

        assert!(
            matches!(result, Err(CampaignsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn update_campaign_touches_only_given_fields() -> TestResult {
        let ctx = TestContext::new().await;

        let created = ctx
            .campaigns
            .create_campaign(helpers::open_campaign("PARTIAL", Some(10)))
            .await?;

        let updated = ctx
            .campaigns
            .update_campaign(
                created.id,
                CampaignUpdate {
                    name: Some("Renamed".to_string()),
                    minimum_purchase: Some(2_500),
                    ..CampaignUpdate::default()
                },
            )
            .await?;

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.minimum_purchase, Some(2_500));
        assert_eq!(updated.code, created.code);
        assert_eq!(updated.status, created.status);
        assert_eq!(updated.max_issuance, created.max_issuance);

        Ok(())
    }

    #[tokio::test]
    async fn update_campaign_unknown_id_returns_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx
            .campaigns
            .update_campaign(CampaignId::from_i64(9_999), CampaignUpdate::default())
            .await;

        assert!(
            matches!(result, Err(CampaignsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn activate_then_deactivate_round_trips_status() -> TestResult {
        let ctx = TestContext::new().await;

        let created = ctx
            .campaigns
            .create_campaign(helpers::open_campaign("TOGGLE", None))
            .await?;

        let active = ctx.campaigns.activate_campaign(created.id).await?;
        assert_eq!(active.status, CampaignStatus::Active);

        let disabled = ctx.campaigns.deactivate_campaign(created.id).await?;
        assert_eq!(disabled.status, CampaignStatus::Disabled);

        Ok(())
    }

    #[tokio::test]
    async fn delete_campaign_without_issuance_removes_row() -> TestResult {
        let ctx = TestContext::new().await;

        let created = ctx
            .campaigns
            .create_campaign(helpers::open_campaign("GONE", None))
            .await?;

        let action = ctx.campaigns.delete_campaign(created.id).await?;

        assert_eq!(action, DeletionAction::Delete);

        let result = ctx.campaigns.get_campaign(created.id).await;

        assert!(
            matches!(result, Err(CampaignsServiceError::NotFound)),
            "expected NotFound after deletion, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn delete_campaign_with_used_coupon_disables_instead() -> TestResult {
        let ctx = TestContext::new().await;
        let now = helpers::inside_window();

        let campaign = helpers::create_active_campaign(&ctx, "KEEPME", None).await?;

        let coupon = ctx
            .coupons
            .issue_coupon(campaign.id, helpers::holder(1), now)
            .await?;

        ctx.coupons.redeem_coupon(coupon.id, now).await?;

        let action = ctx.campaigns.delete_campaign(campaign.id).await?;

        assert_eq!(action, DeletionAction::Disable);

        let kept = ctx.campaigns.get_campaign(campaign.id).await?;

        assert_eq!(kept.status, CampaignStatus::Disabled);

        Ok(())
    }

    #[tokio::test]
    async fn delete_campaign_unknown_id_returns_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx
            .campaigns
            .delete_campaign(CampaignId::from_i64(12_345))
            .await;

        assert!(
            matches!(result, Err(CampaignsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn delete_campaign_with_only_expired_history_hits_foreign_key() -> TestResult {
        // Expired coupons do not count as blocking history in the delete
        // check, but their rows still reference the campaign, so the hard
        // delete stops at the foreign key instead of dropping audit history.
        let ctx = TestContext::new().await;
        let now = helpers::inside_window();

        let campaign = helpers::create_active_campaign(&ctx, "HISTORIC", None).await?;

        let coupon = ctx
            .coupons
            .issue_coupon(campaign.id, helpers::holder(1), now)
            .await?;

        let outcome = ctx
            .coupons
            .redeem_coupon(coupon.id, helpers::after_window())
            .await?;

        assert_eq!(
            outcome,
            crate::domain::coupons::records::RedemptionOutcome::CampaignWindowClosed
        );

        let result = ctx.campaigns.delete_campaign(campaign.id).await;

        assert!(
            matches!(result, Err(CampaignsServiceError::InvalidReference)),
            "expected InvalidReference, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn list_campaigns_pages_in_id_order() -> TestResult {
        let ctx = TestContext::new().await;

        for code in ["PAGE1", "PAGE2", "PAGE3"] {
            ctx.campaigns
                .create_campaign(helpers::open_campaign(code, None))
                .await?;
        }

        let first_two = ctx
            .campaigns
            .list_campaigns(Page {
                limit: 2,
                offset: 0,
            })
            .await?;

        assert_eq!(first_two.len(), 2);
        assert!(first_two[0].id < first_two[1].id);

        let rest = ctx
            .campaigns
            .list_campaigns(Page {
                limit: 2,
                offset: 2,
            })
            .await?;

        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].code, "PAGE3");

        Ok(())
    }

    #[tokio::test]
    async fn list_open_campaigns_filters_ineligible() -> TestResult {
        let ctx = TestContext::new().await;
        let now = helpers::inside_window();

        let open = helpers::create_active_campaign(&ctx, "OPEN", Some(5)).await?;

        // Created but never activated.
        ctx.campaigns
            .create_campaign(helpers::open_campaign("DORMANT", None))
            .await?;

        // Activated but fully issued.
        let full = helpers::create_active_campaign(&ctx, "FULL", Some(1)).await?;
        ctx.coupons
            .issue_coupon(full.id, helpers::holder(1), now)
            .await?;

        let open_campaigns = ctx.campaigns.list_open_campaigns(now).await?;
        let codes: Vec<&str> = open_campaigns.iter().map(|c| c.code.as_str()).collect();

        assert_eq!(codes, vec!["OPEN"]);
        assert_eq!(open_campaigns[0].id, open.id);

        Ok(())
    }

    #[tokio::test]
    async fn list_open_campaigns_agrees_with_issuance_at_window_bounds() -> TestResult {
        // Listing uses the same strict bounds as issuance eligibility, so a
        // campaign is never listed at an instant where issuance would refuse.
        let ctx = TestContext::new().await;

        let campaign = helpers::create_active_campaign(&ctx, "EDGES", None).await?;

        for now in [campaign.start_date, campaign.end_date] {
            let listed = ctx.campaigns.list_open_campaigns(now).await?;

            assert!(
                listed.is_empty(),
                "boundary instant {now} must not list the campaign"
            );
            assert!(!campaign.is_eligible_for_issuance(now));
        }

        let inside = ctx
            .campaigns
            .list_open_campaigns(helpers::inside_window())
            .await?;

        assert_eq!(inside.len(), 1);

        Ok(())
    }
}
