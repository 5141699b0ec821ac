pub mod auth;
pub mod categories;
pub mod comments;
pub mod error;
pub mod genres;
pub mod mailer;
pub mod middleware;
pub mod policy;
pub mod query;
pub mod reviews;
pub mod routes;
pub mod titles;
pub mod users;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

/// Stored IDs are written by this service, so a parse failure means a
/// corrupt row; surface it in the log and degrade instead of failing the
/// whole response.
pub(crate) fn parse_uuid(value: &str, context: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", context, value, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(value: &str, context: &str) -> DateTime<Utc> {
    value.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt {} timestamp '{}': {}", context, value, e);
        DateTime::default()
    })
}
