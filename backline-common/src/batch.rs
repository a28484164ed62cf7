//! Batch record generation
//!
//! Expands a small request payload (a parent id plus line items) into many
//! child records in one call: one record per unit of quantity per line item,
//! each carrying a freshly generated token. Validation happens up front;
//! persistence is the caller's concern and is expected to be a single
//! batched insert so one call either fully commits or fully fails.
//!
//! Concurrent independent calls against the same parent are NOT serialized
//! here or anywhere else in the application. See DESIGN.md.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Error, Result};

/// Length of the random token suffix
const TOKEN_SUFFIX_LEN: usize = 9;

/// One line of a batch request. Immutable once submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    /// Referenced definition (ticket type, crew member, ...)
    pub reference_id: Uuid,
    /// Number of records to generate for this line
    pub quantity: u32,
    /// Per-unit scalar attributes (price, role, call_time, ...)
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// A batch creation request. Exists only for the duration of one call.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub parent_id: Uuid,
    pub items: Vec<LineItem>,
}

/// Expected type of a required attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Text,
    Number,
}

impl AttrKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            AttrKind::Text => value.is_string(),
            AttrKind::Number => value.is_number(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AttrKind::Text => "string",
            AttrKind::Number => "number",
        }
    }
}

/// Static description of one record family.
///
/// The set of profiles is closed: each persisted table that supports batch
/// generation declares exactly one.
#[derive(Debug, Clone, Copy)]
pub struct BatchProfile {
    /// Token prefix, e.g. `TIX`
    pub token_prefix: &'static str,
    /// Status assigned to every freshly generated record
    pub default_status: &'static str,
    /// Attribute keys every line item must carry, with their expected type
    pub required_attributes: &'static [(&'static str, AttrKind)],
}

/// Ticket generation: one ticket per unit of quantity, priced per line.
pub const TICKET_PROFILE: BatchProfile = BatchProfile {
    token_prefix: "TIX",
    default_status: "available",
    required_attributes: &[("price", AttrKind::Number)],
};

/// Crew assignment: one assignment per member per unit of quantity.
pub const CREW_PROFILE: BatchProfile = BatchProfile {
    token_prefix: "CRW",
    default_status: "pending",
    required_attributes: &[("role", AttrKind::Text)],
};

/// One generated record, ready for a batched insert.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedRecord {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub reference_id: Uuid,
    /// Unique token within the parent scope, `<PREFIX>-<millis>-<alnum>`
    pub token: String,
    pub status: String,
    pub attributes: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

/// Expand a batch request into generated records.
///
/// Quantities q1..qn yield exactly q1+..+qn records, in line-item order.
/// Fails with `Error::Validation` on zero quantities, missing or mistyped
/// required attributes, non-scalar attribute values, or an empty item list.
pub fn expand(request: &BatchRequest, profile: &BatchProfile) -> Result<Vec<GeneratedRecord>> {
    validate(request, profile)?;

    let mut seen_tokens = HashSet::new();
    let mut records = Vec::with_capacity(request.items.iter().map(|i| i.quantity as usize).sum());

    for item in &request.items {
        for _ in 0..item.quantity {
            let mut token = generate_token(profile.token_prefix);
            // Collisions within one call are vanishingly rare but cheap to retry
            while !seen_tokens.insert(token.clone()) {
                token = generate_token(profile.token_prefix);
            }

            records.push(GeneratedRecord {
                id: Uuid::new_v4(),
                parent_id: request.parent_id,
                reference_id: item.reference_id,
                token,
                status: profile.default_status.to_string(),
                attributes: item.attributes.clone(),
                created_at: Utc::now(),
            });
        }
    }

    tracing::debug!(
        parent_id = %request.parent_id,
        items = request.items.len(),
        records = records.len(),
        "expanded batch request"
    );

    Ok(records)
}

/// Validate a batch request against a profile.
fn validate(request: &BatchRequest, profile: &BatchProfile) -> Result<()> {
    if request.items.is_empty() {
        return Err(Error::Validation("items must not be empty".to_string()));
    }

    for (index, item) in request.items.iter().enumerate() {
        if item.quantity == 0 {
            return Err(Error::Validation(format!(
                "items[{index}]: quantity must be at least 1"
            )));
        }

        for (key, kind) in profile.required_attributes {
            match item.attributes.get(*key) {
                None => {
                    return Err(Error::Validation(format!(
                        "items[{index}]: missing required attribute '{key}'"
                    )));
                }
                Some(value) if !kind.accepts(value) => {
                    return Err(Error::Validation(format!(
                        "items[{index}]: attribute '{key}' must be a {}",
                        kind.name()
                    )));
                }
                Some(_) => {}
            }
        }

        for (key, value) in &item.attributes {
            if !is_scalar(value) {
                return Err(Error::Validation(format!(
                    "items[{index}]: attribute '{key}' must be a scalar"
                )));
            }
        }
    }

    Ok(())
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Generate a token with a time-based component and a random component.
///
/// The time component makes tokens roughly sortable by creation time; the
/// random suffix avoids collision under concurrent calls.
fn generate_token(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{prefix}-{millis}-{suffix}")
}
