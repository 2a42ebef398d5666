//! Shared database types

pub mod errors;

use chrono::{SecondsFormat, Utc};

pub use errors::DatabaseError;

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Public identifier handed out to clients in place of row ids.
pub fn new_public_id() -> String {
    cuid2::cuid()
}

/// Current UTC time in the fixed-width RFC 3339 form used by every table.
///
/// Fixed width keeps lexical and chronological ordering identical, which the
/// analytics range queries rely on.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_timestamp(value: chrono::DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
