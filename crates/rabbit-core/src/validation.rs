//! # Validation Module
//!
//! Input checks run before an edit touches the in-memory snapshot.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Edit session (THIS MODULE)                                   │
//! │  ├── Reject bad input before the optimistic update                      │
//! │  └── A rejected edit never reaches the pending ledger                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK (price_cents >= 0)                                │
//! │  └── Foreign keys + ON DELETE CASCADE for assignments                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Percentages are deliberately not range-checked: 0–100+ and negative
//! values are all valid rates.

use crate::currency::is_known_currency;
use crate::error::{ValidationError, ValidationResult};

/// Longest description, name or tab title accepted.
pub const MAX_TEXT_LEN: usize = 200;

/// Longest rabbit name accepted.
pub const MAX_RABBIT_NAME_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an item description. Blank descriptions are allowed (a freshly
/// added row has none yet).
pub fn validate_description(description: &str) -> ValidationResult<()> {
    if description.trim().chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: MAX_TEXT_LEN,
        });
    }
    Ok(())
}

/// Validates a rabbit name.
///
/// ## Example
/// ```rust
/// use rabbit_core::validation::validate_rabbit_name;
///
/// assert!(validate_rabbit_name("Alice").is_ok());
/// assert!(validate_rabbit_name("  ").is_err());
/// ```
pub fn validate_rabbit_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_RABBIT_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_RABBIT_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a tab title.
pub fn validate_tab_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "tab name".to_string(),
        });
    }

    if name.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field: "tab name".to_string(),
            max: MAX_TEXT_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Prices are non-negative smallest-unit integers.
pub fn validate_price_cents(price_cents: i64) -> ValidationResult<()> {
    if price_cents < 0 {
        return Err(ValidationError::Negative {
            field: "price_cents".to_string(),
        });
    }
    Ok(())
}

/// Tax and tip percentages only need to be real numbers.
pub fn validate_percent(field: &str, percent: f64) -> ValidationResult<()> {
    if !percent.is_finite() {
        return Err(ValidationError::NotFinite {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Currency codes must come from the known set.
pub fn validate_currency_code(code: &str) -> ValidationResult<()> {
    if !is_known_currency(code) {
        return Err(ValidationError::Unsupported {
            field: "currency_code".to_string(),
            value: code.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_description() {
        assert!(validate_description("Burger").is_ok());
        assert!(validate_description("").is_ok());
        assert!(validate_description(&"A".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_rabbit_name() {
        assert!(validate_rabbit_name("Bun").is_ok());
        assert!(validate_rabbit_name("").is_err());
        assert!(validate_rabbit_name(&"B".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_tab_name() {
        assert!(validate_tab_name("Friday dinner").is_ok());
        assert!(validate_tab_name("   ").is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(1099).is_ok());
        assert!(validate_price_cents(-1).is_err());
    }

    #[test]
    fn test_validate_percent() {
        assert!(validate_percent("tax_percent", 8.875).is_ok());
        assert!(validate_percent("tip_percent", 150.0).is_ok());
        assert!(validate_percent("tip_percent", -3.0).is_ok());
        assert!(validate_percent("tax_percent", f64::NAN).is_err());
        assert!(validate_percent("tax_percent", f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_currency_code() {
        assert!(validate_currency_code("USD").is_ok());
        assert!(validate_currency_code("jpy").is_ok());
        assert!(validate_currency_code("XYZ").is_err());
    }
}
