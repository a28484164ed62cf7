//! Backend data gateway
//!
//! A closed set of typed repositories, one per table. Each exposes
//! insert/select/update/delete primitives; there are no retries, no caching
//! and no validation here beyond what the statements themselves enforce.
//! Table names never travel as caller-supplied strings.

mod crew;
mod tickets;

pub use crew::{CrewFilter, CrewRepo, CrewRow, CREW_STATUSES};
pub use tickets::{TicketFilter, TicketRepo, TicketRow, TICKET_STATUSES};

use serde_json::{Map, Value};

/// Pagination for select primitives. `limit` absent means no limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Read one attribute as display text, regardless of scalar type.
pub(crate) fn attr_string(attributes: &Map<String, Value>, key: &str) -> Option<String> {
    attributes.get(key).map(|value| match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}
