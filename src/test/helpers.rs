//! Test Helpers

use jiff::Timestamp;

use crate::{
    domain::{
        campaigns::{
            CampaignsService, CampaignsServiceError,
            data::NewCampaign,
            records::{CampaignRecord, Discount},
        },
        coupons::records::HolderId,
    },
    test::TestContext,
};

/// Validity window shared by the campaign helpers, chosen well clear of the
/// wall clock so tests control time entirely through explicit instants.
const WINDOW_START: &str = "2026-06-01T00:00:00Z";
const WINDOW_END: &str = "2026-07-01T00:00:00Z";

fn ts(value: &str) -> Timestamp {
    value.parse().expect("test timestamp must parse")
}

pub(crate) fn before_window() -> Timestamp {
    ts("2026-05-15T00:00:00Z")
}

pub(crate) fn inside_window() -> Timestamp {
    ts("2026-06-15T12:00:00Z")
}

pub(crate) fn after_window() -> Timestamp {
    ts("2026-07-02T00:00:00Z")
}

pub(crate) fn holder(id: i64) -> HolderId {
    HolderId::from_i64(id)
}

/// A valid campaign definition in the shared window, still in `Created`.
pub(crate) fn open_campaign(code: &str, max_issuance: Option<u32>) -> NewCampaign {
    NewCampaign {
        code: code.to_string(),
        name: format!("{code} campaign"),
        description: None,
        discount: Discount::Percentage { rate: 25 },
        minimum_purchase: None,
        start_date: ts(WINDOW_START),
        end_date: ts(WINDOW_END),
        max_issuance,
    }
}

/// Create and activate a campaign, ready for issuance inside the window.
pub(crate) async fn create_active_campaign(
    ctx: &TestContext,
    code: &str,
    max_issuance: Option<u32>,
) -> Result<CampaignRecord, CampaignsServiceError> {
    let campaign = ctx
        .campaigns
        .create_campaign(open_campaign(code, max_issuance))
        .await?;

    ctx.campaigns.activate_campaign(campaign.id).await
}
