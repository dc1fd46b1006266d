//! Audit Timestamps

use jiff::Timestamp;
use serde::Serialize;

/// Creation and modification times composed into each record.
///
/// Both values are written by the persistence layer at save time (`now()` in
/// SQL), never by the record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Audit {
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
