//! Storage quantity parsing and comparison.
//!
//! Restore requests size their staging volume with Kubernetes-style
//! quantity strings (`"10Gi"`, `"500M"`, `"1073741824"`). This module
//! parses them into a byte count so capacities can be compared. The
//! original string is kept for round-tripping.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A parsed storage quantity.
///
/// Ordering and equality are defined over the byte value, not the
/// textual form, so `"1Gi"` equals `"1024Mi"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity {
    raw: String,
    bytes: u128,
}

impl Quantity {
    /// Returns the quantity as a byte count.
    #[must_use]
    pub const fn as_bytes(&self) -> u128 {
        self.bytes
    }

    /// Returns the original textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Quantity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CoreError::invalid_quantity(s, "empty quantity"));
        }

        let split = trimmed
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(trimmed.len());
        let (number, suffix) = trimmed.split_at(split);
        if number.is_empty() {
            return Err(CoreError::invalid_quantity(s, "missing numeric part"));
        }

        let multiplier = multiplier_for(suffix)
            .ok_or_else(|| CoreError::invalid_quantity(s, format!("unknown suffix {suffix:?}")))?;

        let (mantissa, frac_digits) = parse_mantissa(number)
            .ok_or_else(|| CoreError::invalid_quantity(s, "malformed numeric part"))?;

        // Scale to whole bytes, rounding any fractional remainder up the
        // way Kubernetes canonicalization does.
        let scale = 10u128
            .checked_pow(frac_digits)
            .ok_or_else(|| CoreError::invalid_quantity(s, "fractional part too long"))?;
        let scaled = mantissa
            .checked_mul(multiplier)
            .ok_or_else(|| CoreError::invalid_quantity(s, "quantity overflows"))?;
        let bytes = scaled / scale + u128::from(scaled % scale != 0);

        Ok(Self {
            raw: trimmed.to_string(),
            bytes,
        })
    }
}

impl TryFrom<String> for Quantity {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Quantity> for String {
    fn from(q: Quantity) -> Self {
        q.raw
    }
}

/// Parses the numeric part into (digits-as-integer, fractional-digit count).
fn parse_mantissa(number: &str) -> Option<(u128, u32)> {
    let mut mantissa: u128 = 0;
    let mut frac_digits: u32 = 0;
    let mut seen_dot = false;
    for c in number.chars() {
        if c == '.' {
            if seen_dot {
                return None;
            }
            seen_dot = true;
            continue;
        }
        mantissa = mantissa
            .checked_mul(10)?
            .checked_add(u128::from(c.to_digit(10)?))?;
        if seen_dot {
            frac_digits = frac_digits.checked_add(1)?;
        }
    }
    if seen_dot && frac_digits == 0 {
        return None;
    }
    Some((mantissa, frac_digits))
}

fn multiplier_for(suffix: &str) -> Option<u128> {
    let m = match suffix {
        "" => 1,
        "k" => 1_000,
        "M" => 1_000_000,
        "G" => 1_000_000_000,
        "T" => 1_000_000_000_000,
        "P" => 1_000_000_000_000_000,
        "E" => 1_000_000_000_000_000_000,
        "Ki" => 1 << 10,
        "Mi" => 1 << 20,
        "Gi" => 1 << 30,
        "Ti" => 1 << 40,
        "Pi" => 1 << 50,
        "Ei" => 1 << 60,
        _ => return None,
    };
    Some(m)
}
