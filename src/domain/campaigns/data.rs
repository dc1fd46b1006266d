//! Campaigns Data

use jiff::Timestamp;
use thiserror::Error;

use crate::domain::campaigns::records::{CampaignStatus, Discount};

/// A single reason a campaign definition was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("campaign name must not be blank")]
    BlankName,

    #[error("start date must be before end date")]
    InvertedWindow,

    #[error("fixed amount discounts need an amount greater than zero")]
    ZeroDiscountAmount,

    #[error("percentage discounts need a rate between 1 and 100")]
    RateOutOfRange,
}

/// New Campaign Data
#[derive(Debug, Clone, PartialEq)]
pub struct NewCampaign {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub discount: Discount,
    pub minimum_purchase: Option<u64>,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    pub max_issuance: Option<u32>,
}

impl NewCampaign {
    /// Check the definition against the creation invariants, collecting every
    /// violation rather than stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push(ValidationIssue::BlankName);
        }

        if self.start_date >= self.end_date {
            issues.push(ValidationIssue::InvertedWindow);
        }

        match self.discount {
            Discount::FixedAmount { amount } if amount == 0 => {
                issues.push(ValidationIssue::ZeroDiscountAmount);
            }
            Discount::Percentage { rate } if rate == 0 || rate > 100 => {
                issues.push(ValidationIssue::RateOutOfRange);
            }
            _ => {}
        }

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}

/// Campaign Update Data
///
/// Absent fields leave the stored value untouched, mirroring the partial
/// update the admin API performs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub minimum_purchase: Option<u64>,
    pub status: Option<CampaignStatus>,
}

/// Page Request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
        }
    }
}
