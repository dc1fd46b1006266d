//! Coupons Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar};

use crate::domain::{
    audit::Audit,
    campaigns::records::CampaignId,
    coupons::records::{CouponId, CouponRecord, CouponStatus, HolderId},
};

const CREATE_COUPON_SQL: &str = include_str!("sql/create_coupon.sql");
const GET_COUPON_SQL: &str = include_str!("sql/get_coupon.sql");
const LOCK_COUPON_SQL: &str = include_str!("sql/lock_coupon.sql");
const UPDATE_COUPON_STATE_SQL: &str = include_str!("sql/update_coupon_state.sql");
const COUNT_BY_CAMPAIGN_AND_STATUS_SQL: &str = include_str!("sql/count_by_campaign_and_status.sql");
const LIST_BY_HOLDER_AND_STATUS_SQL: &str = include_str!("sql/list_by_holder_and_status.sql");
const COUNT_REDEEMABLE_BY_HOLDER_SQL: &str = include_str!("sql/count_redeemable_by_holder.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCouponsRepository;

impl PgCouponsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaign: CampaignId,
        holder: HolderId,
        issued_at: Timestamp,
    ) -> Result<CouponRecord, sqlx::Error> {
        query_as::<Postgres, CouponRecord>(CREATE_COUPON_SQL)
            .bind(campaign.into_i64())
            .bind(holder.into_i64())
            .bind(SqlxTimestamp::from(issued_at))
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponId,
    ) -> Result<CouponRecord, sqlx::Error> {
        query_as::<Postgres, CouponRecord>(GET_COUPON_SQL)
            .bind(coupon.into_i64())
            .fetch_one(&mut **tx)
            .await
    }

    /// Load a coupon under an exclusive row lock for a state transition.
    pub(crate) async fn lock_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponId,
    ) -> Result<CouponRecord, sqlx::Error> {
        query_as::<Postgres, CouponRecord>(LOCK_COUPON_SQL)
            .bind(coupon.into_i64())
            .fetch_one(&mut **tx)
            .await
    }

    /// Persist a status/`used_at` transition produced by the record's state
    /// machine methods.
    pub(crate) async fn update_coupon_state(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: &CouponRecord,
    ) -> Result<(), sqlx::Error> {
        query(UPDATE_COUPON_STATE_SQL)
            .bind(coupon.id.into_i64())
            .bind(coupon.status.as_str())
            .bind(coupon.used_at.map(SqlxTimestamp::from))
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn count_by_campaign_and_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaign: CampaignId,
        statuses: &[CouponStatus],
    ) -> Result<u64, sqlx::Error> {
        let statuses: Vec<String> = statuses
            .iter()
            .map(|status| status.as_str().to_string())
            .collect();

        let count: i64 = query_scalar(COUNT_BY_CAMPAIGN_AND_STATUS_SQL)
            .bind(campaign.into_i64())
            .bind(statuses)
            .fetch_one(&mut **tx)
            .await?;

        try_u64_from_i64(count, "count")
    }

    pub(crate) async fn list_by_holder_and_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        holder: HolderId,
        status: CouponStatus,
    ) -> Result<Vec<CouponRecord>, sqlx::Error> {
        query_as::<Postgres, CouponRecord>(LIST_BY_HOLDER_AND_STATUS_SQL)
            .bind(holder.into_i64())
            .bind(status.as_str())
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn count_redeemable_by_holder(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        holder: HolderId,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let count: i64 = query_scalar(COUNT_REDEEMABLE_BY_HOLDER_SQL)
            .bind(holder.into_i64())
            .bind(SqlxTimestamp::from(now))
            .fetch_one(&mut **tx)
            .await?;

        try_u64_from_i64(count, "count")
    }
}

fn try_u64_from_i64(value: i64, column: &'static str) -> Result<u64, sqlx::Error> {
    u64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, PgRow> for CouponRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let status_text: String = row.try_get("status")?;

        let status = CouponStatus::parse(&status_text).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: format!("unknown coupon status: {status_text}").into(),
        })?;

        Ok(Self {
            id: CouponId::from_i64(row.try_get("id")?),
            campaign_id: CampaignId::from_i64(row.try_get("campaign_id")?),
            holder_id: HolderId::from_i64(row.try_get("holder_id")?),
            status,
            issued_at: row.try_get::<SqlxTimestamp, _>("issued_at")?.to_jiff(),
            used_at: row
                .try_get::<Option<SqlxTimestamp>, _>("used_at")?
                .map(SqlxTimestamp::to_jiff),
            audit: Audit {
                created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
                updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
            },
        })
    }
}
