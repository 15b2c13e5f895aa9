//! # Currency Model
//!
//! Currency-aware rounding, display and parsing rules.
//!
//! ## One Rule, Four Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  is_zero_decimal(code)                                                  │
//! │        │                                                                │
//! │        ├──► format_amount(units, code)     1099 → "$10.99" / "¥1,099"   │
//! │        ├──► parse_amount(input, code)      "$10.99" → 1099              │
//! │        ├──► to_major_units(units, code)    1099 → 10.99 / 1099.0        │
//! │        └──► major_units_string(units, code) 1099 → "10.99" / "1099"     │
//! │                                                                         │
//! │  All four consult the same fixed zero-decimal set, so a value that was  │
//! │  parsed with a code always formats back with the same scale.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unknown codes never fail: they fall back to a plain two-decimal format.

use crate::money::round_half_away;

/// Currencies whose smallest unit is the major unit.
///
/// Amounts in these currencies are stored without the ×100 scale.
pub const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "ISK", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND",
    "VUV", "XAF", "XOF", "XPF",
];

/// Currency used when a tab or profile does not specify one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// A supported currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Currency {
    /// ISO 4217 code, upper case.
    pub code: &'static str,
    /// Display symbol placed before the amount.
    pub symbol: &'static str,
}

/// The known currency set. Codes outside it are formatted generically.
pub const KNOWN_CURRENCIES: &[Currency] = &[
    Currency { code: "USD", symbol: "$" },
    Currency { code: "EUR", symbol: "€" },
    Currency { code: "GBP", symbol: "£" },
    Currency { code: "CAD", symbol: "CA$" },
    Currency { code: "AUD", symbol: "A$" },
    Currency { code: "NZD", symbol: "NZ$" },
    Currency { code: "CHF", symbol: "CHF " },
    Currency { code: "SEK", symbol: "SEK " },
    Currency { code: "NOK", symbol: "NOK " },
    Currency { code: "DKK", symbol: "DKK " },
    Currency { code: "PLN", symbol: "PLN " },
    Currency { code: "MXN", symbol: "MX$" },
    Currency { code: "BRL", symbol: "R$" },
    Currency { code: "INR", symbol: "₹" },
    Currency { code: "CNY", symbol: "CN¥" },
    Currency { code: "HKD", symbol: "HK$" },
    Currency { code: "SGD", symbol: "S$" },
    Currency { code: "TWD", symbol: "NT$" },
    Currency { code: "THB", symbol: "฿" },
    Currency { code: "PHP", symbol: "₱" },
    Currency { code: "ILS", symbol: "₪" },
    Currency { code: "ZAR", symbol: "R" },
    Currency { code: "JPY", symbol: "¥" },
    Currency { code: "KRW", symbol: "₩" },
    Currency { code: "VND", symbol: "₫" },
    Currency { code: "CLP", symbol: "CLP$" },
    Currency { code: "ISK", symbol: "ISK " },
    Currency { code: "PYG", symbol: "₲" },
    Currency { code: "UGX", symbol: "USh " },
    Currency { code: "XAF", symbol: "FCFA " },
    Currency { code: "XOF", symbol: "CFA " },
    Currency { code: "XPF", symbol: "CFPF " },
    Currency { code: "BIF", symbol: "FBu " },
    Currency { code: "DJF", symbol: "Fdj " },
    Currency { code: "GNF", symbol: "FG " },
    Currency { code: "KMF", symbol: "CF " },
    Currency { code: "MGA", symbol: "Ar " },
    Currency { code: "RWF", symbol: "RF " },
    Currency { code: "VUV", symbol: "VT " },
];

impl Currency {
    /// Looks up a known currency (case-insensitive).
    pub fn lookup(code: &str) -> Option<&'static Currency> {
        let code = code.trim();
        KNOWN_CURRENCIES
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
    }

    /// Returns true if this currency has no minor unit.
    pub fn is_zero_decimal(&self) -> bool {
        is_zero_decimal(self.code)
    }
}

/// Returns true if `code` names a zero-decimal currency.
pub fn is_zero_decimal(code: &str) -> bool {
    let code = code.trim();
    ZERO_DECIMAL_CURRENCIES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(code))
}

/// Returns true if `code` is in the known currency set.
pub fn is_known_currency(code: &str) -> bool {
    Currency::lookup(code).is_some()
}

/// Formats a smallest-unit amount for display.
///
/// ## Example
/// ```rust
/// use rabbit_core::currency::format_amount;
///
/// assert_eq!(format_amount(123456, "USD"), "$1,234.56");
/// assert_eq!(format_amount(1200, "JPY"), "¥1,200");
/// assert_eq!(format_amount(-550, "EUR"), "-€5.50");
/// assert_eq!(format_amount(123456, "???"), "1234.56");
/// ```
pub fn format_amount(units: i64, code: &str) -> String {
    let sign = if units < 0 { "-" } else { "" };
    let abs = units.unsigned_abs();

    let Some(currency) = Currency::lookup(code) else {
        // Generic fallback: no symbol, no grouping, two decimals.
        return format!("{}{}.{:02}", sign, abs / 100, abs % 100);
    };

    if currency.is_zero_decimal() {
        format!("{}{}{}", sign, currency.symbol, group_thousands(abs))
    } else {
        format!(
            "{}{}{}.{:02}",
            sign,
            currency.symbol,
            group_thousands(abs / 100),
            abs % 100
        )
    }
}

/// Parses free-text input into smallest units.
///
/// Every character other than digits and the first `.` is dropped, so
/// `"$1,234.5"` reads as `1234.5`. Returns `None` when no digit remains.
///
/// ## Example
/// ```rust
/// use rabbit_core::currency::parse_amount;
///
/// assert_eq!(parse_amount("$12.34", "USD"), Some(1234));
/// assert_eq!(parse_amount("1,200", "JPY"), Some(1200));
/// assert_eq!(parse_amount("abc", "USD"), None);
/// ```
pub fn parse_amount(input: &str, code: &str) -> Option<i64> {
    let mut cleaned = String::with_capacity(input.len());
    let mut seen_dot = false;
    for ch in input.chars() {
        if ch.is_ascii_digit() {
            cleaned.push(ch);
        } else if ch == '.' && !seen_dot {
            seen_dot = true;
            cleaned.push(ch);
        }
    }

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    Some(major_to_units(value, code))
}

/// Converts a major-unit decimal (as printed on a receipt) to smallest units.
pub fn major_to_units(value: f64, code: &str) -> i64 {
    if is_zero_decimal(code) {
        round_half_away(value)
    } else {
        round_half_away(value * 100.0)
    }
}

/// Converts smallest units to the major-unit decimal used by payment links.
pub fn to_major_units(units: i64, code: &str) -> f64 {
    if is_zero_decimal(code) {
        units as f64
    } else {
        units as f64 / 100.0
    }
}

/// Renders smallest units as the plain decimal string payment links expect.
///
/// No symbol, no grouping: `1099 USD → "10.99"`, `1200 JPY → "1200"`.
pub fn major_units_string(units: i64, code: &str) -> String {
    let sign = if units < 0 { "-" } else { "" };
    let abs = units.unsigned_abs();
    if is_zero_decimal(code) {
        format!("{}{}", sign, abs)
    } else {
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_decimal_detection() {
        assert!(is_zero_decimal("JPY"));
        assert!(is_zero_decimal("krw"));
        assert!(is_zero_decimal(" VND "));
        assert!(!is_zero_decimal("USD"));
        assert!(!is_zero_decimal("NOPE"));
    }

    #[test]
    fn test_format_two_decimal() {
        assert_eq!(format_amount(0, "USD"), "$0.00");
        assert_eq!(format_amount(5, "USD"), "$0.05");
        assert_eq!(format_amount(1099, "usd"), "$10.99");
        assert_eq!(format_amount(100_000_000, "GBP"), "£1,000,000.00");
        assert_eq!(format_amount(-550, "USD"), "-$5.50");
    }

    #[test]
    fn test_format_zero_decimal() {
        assert_eq!(format_amount(1200, "JPY"), "¥1,200");
        assert_eq!(format_amount(999, "KRW"), "₩999");
    }

    #[test]
    fn test_format_unknown_currency_falls_back() {
        assert_eq!(format_amount(123456, "ZZZ"), "1234.56");
        assert_eq!(format_amount(-7, ""), "-0.07");
    }

    #[test]
    fn test_parse_strips_noise() {
        assert_eq!(parse_amount("$1,234.56", "USD"), Some(123456));
        assert_eq!(parse_amount("  10.5 ", "USD"), Some(1050));
        assert_eq!(parse_amount("10.999", "USD"), Some(1100));
        assert_eq!(parse_amount("1.2.3", "USD"), Some(123));
        assert_eq!(parse_amount(".5", "EUR"), Some(50));
    }

    #[test]
    fn test_parse_zero_decimal_uses_raw_value() {
        assert_eq!(parse_amount("¥1,200", "JPY"), Some(1200));
        assert_eq!(parse_amount("1200.6", "JPY"), Some(1201));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(parse_amount("", "USD"), None);
        assert_eq!(parse_amount("free", "USD"), None);
        assert_eq!(parse_amount(".", "USD"), None);
    }

    #[test]
    fn test_parse_unknown_currency_uses_two_decimals() {
        assert_eq!(parse_amount("12.34", "ZZZ"), Some(1234));
    }

    #[test]
    fn test_major_units() {
        assert_eq!(to_major_units(1099, "USD"), 10.99);
        assert_eq!(to_major_units(1200, "JPY"), 1200.0);
        assert_eq!(major_units_string(1099, "USD"), "10.99");
        assert_eq!(major_units_string(7, "USD"), "0.07");
        assert_eq!(major_units_string(1200, "JPY"), "1200");
    }

    #[test]
    fn test_parse_format_agree() {
        let codes = ["USD", "EUR", "ZZZ"].into_iter().chain(ZERO_DECIMAL_CURRENCIES.iter().copied());
        for code in codes {
            let units = parse_amount(&format_amount(123456, code), code);
            assert_eq!(units, Some(123456), "currency {code}");
        }
    }

    #[test]
    fn test_every_zero_decimal_code_is_known() {
        for code in ZERO_DECIMAL_CURRENCIES {
            let currency = Currency::lookup(code).unwrap_or_else(|| panic!("{code} missing"));
            assert!(currency.is_zero_decimal());
            assert_eq!(to_major_units(1200, code), 1200.0);
            assert_eq!(major_units_string(1200, code), "1200");
        }
        assert_eq!(format_amount(1200, "BIF"), "FBu 1,200");
        assert_eq!(parse_amount("FBu 1,200", "BIF"), Some(1200));
    }
}
