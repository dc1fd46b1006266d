//! Punchcard Domain Concerns

pub mod audit;
pub mod campaigns;
pub mod coupons;
