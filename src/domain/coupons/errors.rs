//! Coupons service errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::domain::campaigns::records::IssuanceStateError;

#[derive(Debug, Error)]
pub enum CouponsServiceError {
    #[error("coupon or campaign not found")]
    NotFound,

    #[error("campaign is not eligible for issuance")]
    NotEligible,

    /// Issuance accounting moved without the eligibility the coordinator is
    /// supposed to guarantee. Unreachable while the campaign row lock is
    /// honored; treated as an internal defect, not a caller error.
    #[error("issuance accounting violated")]
    IllegalState(#[source] IssuanceStateError),

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for CouponsServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            Some(ErrorKind::NotNullViolation) => Self::MissingRequiredData,
            Some(ErrorKind::CheckViolation) => Self::InvalidData,
            _ => Self::Sql(error),
        }
    }
}
