//! # Money Module
//!
//! Provides the `Money` type for amounts in a currency's smallest unit.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  STORED vs COMPUTED                                                     │
//! │                                                                         │
//! │  Stored values are always integers in the smallest unit:                │
//! │    USD  $10.99  → 1099                                                  │
//! │    JPY  ¥1200   → 1200   (zero-decimal: no ×100)                        │
//! │                                                                         │
//! │  Split shares are real-valued (1000 / 3 = 333.33…) and are only         │
//! │  rounded ONCE, after summation, with round-half-away-from-zero.         │
//! │  Every rounding in the engine goes through `round_half_away`.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rabbit_core::money::Money;
//!
//! let burger = Money::from_units(1000);
//! let tax = burger.percent_of(8.0);
//! assert_eq!(tax.units(), 80);
//! ```

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Rounding
// =============================================================================

/// Rounds a real amount to the nearest integer, halves away from zero.
///
/// `2.5 → 3`, `-2.5 → -3`, `2.4999 → 2`. This is the only rounding rule
/// used for split shares, tax and tip.
#[inline]
pub fn round_half_away(value: f64) -> i64 {
    value.round() as i64
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents for USD, yen for JPY).
///
/// ## Design Decisions
/// - **i64 (signed)**: drift and differences can be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **No currency inside**: a tab has exactly one currency, carried on the tab
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from smallest units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units)
    }

    /// Returns the value in smallest units.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Applies a decimal percentage and rounds the result.
    ///
    /// Percentages are signed and unclamped: `150.0` is valid, so is `-5.0`.
    ///
    /// ## Example
    /// ```rust
    /// use rabbit_core::money::Money;
    ///
    /// // 1200 × 8% = 96
    /// assert_eq!(Money::from_units(1200).percent_of(8.0).units(), 96);
    /// // 125 × 10% = 12.5 → 13 (half away from zero)
    /// assert_eq!(Money::from_units(125).percent_of(10.0).units(), 13);
    /// ```
    pub fn percent_of(&self, percent: f64) -> Money {
        Money(round_half_away(self.0 as f64 * percent / 100.0))
    }

    /// Rounds a real-valued amount (e.g. a sum of split shares) into Money.
    #[inline]
    pub fn from_real(value: f64) -> Money {
        Money(round_half_away(value))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_away() {
        assert_eq!(round_half_away(2.5), 3);
        assert_eq!(round_half_away(3.5), 4);
        assert_eq!(round_half_away(-2.5), -3);
        assert_eq!(round_half_away(2.49), 2);
        assert_eq!(round_half_away(0.0), 0);
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_units(1000);
        let b = Money::from_units(400);

        assert_eq!((a + b).units(), 1400);
        assert_eq!((a - b).units(), 600);
        assert_eq!((b - a).abs().units(), 600);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.units(), 1800);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(Money::from_units(1400).percent_of(8.0).units(), 112);
        assert_eq!(Money::from_units(1400).percent_of(20.0).units(), 280);
        assert_eq!(Money::from_units(200).percent_of(8.0).units(), 16);
    }

    #[test]
    fn test_percent_of_unclamped_and_negative() {
        assert_eq!(Money::from_units(1000).percent_of(150.0).units(), 1500);
        assert_eq!(Money::from_units(1000).percent_of(-5.0).units(), -50);
    }

    #[test]
    fn test_percent_of_rounds_half_away_from_zero() {
        // 125 × 10% = 12.5
        assert_eq!(Money::from_units(125).percent_of(10.0).units(), 13);
        // 333 × 8.875% = 29.55…
        assert_eq!(Money::from_units(333).percent_of(8.875).units(), 30);
    }

    /// A three-way split of 1000 is 333.33… each; rounding each share gives
    /// 999 in total. The lost unit is expected and never redistributed.
    #[test]
    fn test_three_way_split_loses_a_unit() {
        let share = Money::from_real(1000.0 / 3.0);
        assert_eq!(share.units(), 333);
        let reconstructed = share + share + share;
        assert_eq!((Money::from_units(1000) - reconstructed).units(), 1);
    }
}
