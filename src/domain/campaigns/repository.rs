//! Campaigns Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::domain::{
    audit::Audit,
    campaigns::{
        data::{CampaignUpdate, NewCampaign, Page},
        records::{CampaignId, CampaignRecord, CampaignStatus, Discount},
    },
};

const COLUMN_DISCOUNT_AMOUNT: &str = "discount_amount";
const COLUMN_MINIMUM_PURCHASE: &str = "minimum_purchase";

const CREATE_CAMPAIGN_SQL: &str = include_str!("sql/create_campaign.sql");
const GET_CAMPAIGN_SQL: &str = include_str!("sql/get_campaign.sql");
const FIND_CAMPAIGN_BY_CODE_SQL: &str = include_str!("sql/find_campaign_by_code.sql");
const LIST_CAMPAIGNS_SQL: &str = include_str!("sql/list_campaigns.sql");
const LIST_OPEN_CAMPAIGNS_SQL: &str = include_str!("sql/list_open_campaigns.sql");
const UPDATE_CAMPAIGN_SQL: &str = include_str!("sql/update_campaign.sql");
const SET_CAMPAIGN_STATUS_SQL: &str = include_str!("sql/set_campaign_status.sql");
const DELETE_CAMPAIGN_SQL: &str = include_str!("sql/delete_campaign.sql");
const LOCK_CAMPAIGN_SQL: &str = include_str!("sql/lock_campaign.sql");
const UPDATE_ISSUANCE_SQL: &str = include_str!("sql/update_issuance.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCampaignsRepository;

impl PgCampaignsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_campaign(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaign: NewCampaign,
    ) -> Result<CampaignRecord, sqlx::Error> {
        let (discount_kind, discount_amount, discount_rate) =
            to_discount_sql_values(campaign.discount)?;

        let minimum_purchase =
            try_optional_i64_from_u64(campaign.minimum_purchase, COLUMN_MINIMUM_PURCHASE)?;

        query_as::<Postgres, CampaignRecord>(CREATE_CAMPAIGN_SQL)
            .bind(campaign.code)
            .bind(campaign.name)
            .bind(campaign.description)
            .bind(discount_kind)
            .bind(discount_amount)
            .bind(discount_rate)
            .bind(minimum_purchase)
            .bind(SqlxTimestamp::from(campaign.start_date))
            .bind(SqlxTimestamp::from(campaign.end_date))
            .bind(try_optional_i32_from_u32(
                campaign.max_issuance,
                "max_issuance",
            )?)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_campaign(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaign: CampaignId,
    ) -> Result<CampaignRecord, sqlx::Error> {
        query_as::<Postgres, CampaignRecord>(GET_CAMPAIGN_SQL)
            .bind(campaign.into_i64())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn find_campaign_by_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<Option<CampaignRecord>, sqlx::Error> {
        query_as::<Postgres, CampaignRecord>(FIND_CAMPAIGN_BY_CODE_SQL)
            .bind(code)
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn list_campaigns(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        page: Page,
    ) -> Result<Vec<CampaignRecord>, sqlx::Error> {
        query_as::<Postgres, CampaignRecord>(LIST_CAMPAIGNS_SQL)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn list_open_campaigns(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        now: jiff::Timestamp,
    ) -> Result<Vec<CampaignRecord>, sqlx::Error> {
        query_as::<Postgres, CampaignRecord>(LIST_OPEN_CAMPAIGNS_SQL)
            .bind(SqlxTimestamp::from(now))
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn update_campaign(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaign: CampaignId,
        update: CampaignUpdate,
    ) -> Result<CampaignRecord, sqlx::Error> {
        let minimum_purchase =
            try_optional_i64_from_u64(update.minimum_purchase, COLUMN_MINIMUM_PURCHASE)?;

        query_as::<Postgres, CampaignRecord>(UPDATE_CAMPAIGN_SQL)
            .bind(campaign.into_i64())
            .bind(update.name)
            .bind(update.description)
            .bind(minimum_purchase)
            .bind(update.status.map(CampaignStatus::as_str))
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn set_campaign_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaign: CampaignId,
        status: CampaignStatus,
    ) -> Result<CampaignRecord, sqlx::Error> {
        query_as::<Postgres, CampaignRecord>(SET_CAMPAIGN_STATUS_SQL)
            .bind(campaign.into_i64())
            .bind(status.as_str())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn delete_campaign(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaign: CampaignId,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_CAMPAIGN_SQL)
            .bind(campaign.into_i64())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Load a campaign under an exclusive row lock.
    ///
    /// Serializes concurrent issuance against the same campaign for the rest
    /// of the transaction; other campaigns are unaffected.
    pub(crate) async fn lock_campaign(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaign: CampaignId,
    ) -> Result<CampaignRecord, sqlx::Error> {
        query_as::<Postgres, CampaignRecord>(LOCK_CAMPAIGN_SQL)
            .bind(campaign.into_i64())
            .fetch_one(&mut **tx)
            .await
    }

    /// Persist the issuance counter and status produced by
    /// [`CampaignRecord::record_issuance`]. Only valid while the caller holds
    /// the row lock from [`Self::lock_campaign`].
    pub(crate) async fn update_issuance(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaign: &CampaignRecord,
    ) -> Result<(), sqlx::Error> {
        query(UPDATE_ISSUANCE_SQL)
            .bind(campaign.id.into_i64())
            .bind(try_i32_from_u32(campaign.issued_count, "issued_count")?)
            .bind(campaign.status.as_str())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}

fn to_discount_sql_values(
    discount: Discount,
) -> Result<(&'static str, Option<i64>, Option<i16>), sqlx::Error> {
    let discount_kind = discount.kind_as_str();

    match discount {
        Discount::FixedAmount { amount } => Ok((
            discount_kind,
            Some(try_i64_from_u64(amount, COLUMN_DISCOUNT_AMOUNT)?),
            None,
        )),
        Discount::Percentage { rate } => Ok((
            discount_kind,
            None,
            Some(try_i16_from_u16(rate, "discount_rate")?),
        )),
        Discount::FreeDelivery => Ok((discount_kind, None, None)),
    }
}

fn discount_from_sql_values(
    kind: &str,
    amount: Option<i64>,
    rate: Option<i16>,
) -> Result<Discount, sqlx::Error> {
    match (kind, amount, rate) {
        ("fixed_amount", Some(amount), None) => Ok(Discount::FixedAmount {
            amount: try_u64_from_i64(amount, COLUMN_DISCOUNT_AMOUNT)?,
        }),
        ("percentage", None, Some(rate)) => Ok(Discount::Percentage {
            rate: try_u16_from_i16(rate, "discount_rate")?,
        }),
        ("free_delivery", None, None) => Ok(Discount::FreeDelivery),
        _ => Err(decode_error(
            "discount_kind",
            format!("inconsistent discount columns: {kind} / {amount:?} / {rate:?}"),
        )),
    }
}

fn try_optional_i64_from_u64(
    value: Option<u64>,
    column: &'static str,
) -> Result<Option<i64>, sqlx::Error> {
    value.map(|v| try_i64_from_u64(v, column)).transpose()
}

fn try_i64_from_u64(value: u64, column: &'static str) -> Result<i64, sqlx::Error> {
    i64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn try_u64_from_i64(value: i64, column: &'static str) -> Result<u64, sqlx::Error> {
    u64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn try_optional_i32_from_u32(
    value: Option<u32>,
    column: &'static str,
) -> Result<Option<i32>, sqlx::Error> {
    value.map(|v| try_i32_from_u32(v, column)).transpose()
}

fn try_i32_from_u32(value: u32, column: &'static str) -> Result<i32, sqlx::Error> {
    i32::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn try_i16_from_u16(value: u16, column: &'static str) -> Result<i16, sqlx::Error> {
    i16::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn try_u32_from_i32(value: i32, column: &'static str) -> Result<u32, sqlx::Error> {
    u32::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn try_u16_from_i16(value: i16, column: &'static str) -> Result<u16, sqlx::Error> {
    u16::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn decode_error(column: &str, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into(),
    }
}

impl<'r> FromRow<'r, PgRow> for CampaignRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let discount_kind: String = row.try_get("discount_kind")?;
        let discount_amount: Option<i64> = row.try_get("discount_amount")?;
        let discount_rate: Option<i16> = row.try_get("discount_rate")?;

        let status_text: String = row.try_get("status")?;

        let status = CampaignStatus::parse(&status_text).ok_or_else(|| {
            decode_error("status", format!("unknown campaign status: {status_text}"))
        })?;

        let minimum_purchase = row
            .try_get::<Option<i64>, _>("minimum_purchase")?
            .map(|v| try_u64_from_i64(v, COLUMN_MINIMUM_PURCHASE))
            .transpose()?;

        let max_issuance = row
            .try_get::<Option<i32>, _>("max_issuance")?
            .map(|v| try_u32_from_i32(v, "max_issuance"))
            .transpose()?;

        Ok(Self {
            id: CampaignId::from_i64(row.try_get("id")?),
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            discount: discount_from_sql_values(&discount_kind, discount_amount, discount_rate)?,
            minimum_purchase,
            start_date: row.try_get::<SqlxTimestamp, _>("start_date")?.to_jiff(),
            end_date: row.try_get::<SqlxTimestamp, _>("end_date")?.to_jiff(),
            max_issuance,
            issued_count: try_u32_from_i32(row.try_get("issued_count")?, "issued_count")?,
            status,
            audit: Audit {
                created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
                updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
            },
        })
    }
}
