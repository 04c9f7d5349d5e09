//! Pure validation for requests entering the offline queue.

use serde::{Deserialize, Serialize};

/// Result of validating a value against the domain's invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationResult {
    Valid,
    Invalid { errors: Vec<String> },
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// Collapses `Invalid { errors }` into its error list, or `None` if valid.
    #[must_use]
    pub fn into_errors(self) -> Option<Vec<String>> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid { errors } => Some(errors),
        }
    }
}

/// One line item of a sale request, as submitted by the caller (pre-enqueue).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub line_total: f64,
}

/// The body of an enqueue request: a sale, return, or swap attempted while offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub store_id: String,
    pub items: Vec<RequestItem>,
}

/// Validates an enqueue request against the domain invariants.
///
/// A store id must be present and non-empty, at least one item must be present, and every
/// item must have a positive quantity, a non-negative unit price, and a non-negative line
/// total.
#[must_use]
pub fn validate_enqueue_request(request: &EnqueueRequest) -> ValidationResult {
    let mut errors = Vec::new();

    if request.store_id.trim().is_empty() {
        errors.push("storeId must be present and non-empty".to_string());
    }

    if request.items.is_empty() {
        errors.push("at least one item is required".to_string());
    }

    for (index, item) in request.items.iter().enumerate() {
        if item.quantity <= 0 {
            errors.push(format!("items[{index}].quantity must be > 0"));
        }
        if item.unit_price < 0.0 {
            errors.push(format!("items[{index}].unitPrice must be >= 0"));
        }
        if item.line_total < 0.0 {
            errors.push(format!("items[{index}].lineTotal must be >= 0"));
        }
    }

    if errors.is_empty() {
        ValidationResult::Valid
    } else {
        tracing::debug!(
            store_id = %request.store_id,
            error_count = errors.len(),
            "rejected enqueue request"
        );
        ValidationResult::Invalid { errors }
    }
}
