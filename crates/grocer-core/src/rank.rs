//! # Rank Module
//!
//! Provides the `Rank` type: a dense, totally ordered position token used to
//! order list items without renumbering the whole list.
//!
//! ## Why Fractional Ranks?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE RENUMBERING PROBLEM                                                │
//! │                                                                         │
//! │  Integer positions:                                                     │
//! │    Milk=1, Eggs=2, Bread=3                                              │
//! │    insert "Butter" after Milk → Eggs=3, Bread=4  (every row rewritten)  │
//! │                                                                         │
//! │  Fixed floats:                                                          │
//! │    1.0, 1.5, 1.25, 1.125 ...  → out of precision after ~50 inserts      │
//! │                                                                         │
//! │  OUR SOLUTION: base-36 fractions of unbounded length                    │
//! │    "i"  ──►  between("i", "j") = "ii"  ──►  between("i", "ii") = "i9"   │
//! │    Only the inserted row gets a new rank. There is always room.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Encoding
//! A rank is a non-empty string over `0-9a-z`, read as the fraction
//! `0.d1d2d3…` in base 36. Ranks never end in `0`, which makes plain
//! byte-wise string comparison agree with numeric comparison at every length:
//! `"i" < "ii" < "j"` both as strings and as fractions.
//!
//! The implicit bounds are `0` (below every rank) and `1` (above every rank);
//! neither is itself a valid rank.
//!
//! ## Usage
//! ```rust
//! use grocer_core::rank::Rank;
//!
//! let first = Rank::middle();
//! let second = first.next();
//! let squeezed = first.between(&second).unwrap();
//!
//! assert!(first < squeezed && squeezed < second);
//! assert_eq!(squeezed.to_string().parse::<Rank>().unwrap(), squeezed);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RankError;

// =============================================================================
// Alphabet
// =============================================================================

/// Digits in ascending order. ASCII order matches digit order.
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Number of digits in the alphabet.
const BASE: u16 = 36;

/// Value of the largest digit (`z`).
const MAX_DIGIT: u8 = 35;

fn digit_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'z' => Some(byte - b'a' + 10),
        _ => None,
    }
}

fn digits_to_string(digits: &[u8]) -> String {
    digits.iter().map(|&d| ALPHABET[d as usize] as char).collect()
}

// =============================================================================
// Rank Type
// =============================================================================

/// A position token. Items are displayed in ascending rank order.
///
/// ## Invariants
/// - Non-empty, digits `0-9a-z` only, never ends in `0`
/// - `Ord` is byte-wise string order, which equals fraction order
/// - A rank never changes unless the item is explicitly re-ranked
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rank(String);

impl Rank {
    /// Returns the rank at the center of the ordering space (`"i"`).
    ///
    /// Seeds the first item of an empty list and the start of a re-rank.
    pub fn middle() -> Self {
        Self::between_bounds(None, None)
    }

    /// Returns a rank strictly greater than `self`.
    ///
    /// Increments the first digit that is not `z` and truncates everything
    /// after it, so calling `next` on the current maximum always yields a new
    /// maximum and repeated appends grow the length only once every ~18 steps:
    /// `i → j → … → z → zi → zj → …`.
    pub fn next(&self) -> Self {
        let digits = self.digits();
        match digits.iter().position(|&d| d < MAX_DIGIT) {
            Some(pos) => {
                let mut out = digits[..pos].to_vec();
                out.push(digits[pos] + 1);
                Rank(digits_to_string(&out))
            }
            None => {
                // All digits are `z`: extend toward 1.
                let mut out = digits;
                out.push(Self::middle_digit());
                Rank(digits_to_string(&out))
            }
        }
    }

    /// Returns a rank strictly between `self` and `upper`.
    ///
    /// Never runs out of room: when the two ranks are adjacent at their
    /// current length, the result is one or more digits longer.
    pub fn between(&self, upper: &Rank) -> Result<Rank, RankError> {
        if self >= upper {
            return Err(RankError::NotOrdered {
                lower: self.0.clone(),
                upper: upper.0.clone(),
            });
        }
        Ok(Self::between_bounds(Some(self), Some(upper)))
    }

    /// Returns a rank strictly less than `self` (between the minimum
    /// sentinel and `self`). Used when inserting before the first item.
    pub fn before(&self) -> Self {
        Self::between_bounds(None, Some(self))
    }

    /// Returns a rank inside the given bounds, where `None` means the
    /// open end of the ordering space.
    ///
    /// | lower     | upper     | result                  |
    /// |-----------|-----------|-------------------------|
    /// | `None`    | `None`    | [`Rank::middle`]        |
    /// | `Some(a)` | `None`    | `a.next()`              |
    /// | `None`    | `Some(b)` | between `0` and `b`     |
    /// | `Some(a)` | `Some(b)` | between `a` and `b`     |
    ///
    /// With both bounds present the caller must ensure `a < b`; use
    /// [`Rank::between`] for a checked version.
    pub fn between_bounds(lower: Option<&Rank>, upper: Option<&Rank>) -> Self {
        if let (Some(a), None) = (lower, upper) {
            return a.next();
        }

        let lower_digits = lower.map(Rank::digits).unwrap_or_default();
        let upper_digits = upper.map(Rank::digits);

        let mut out = Vec::new();
        midpoint(&lower_digits, upper_digits.as_deref(), &mut out);
        Rank(digits_to_string(&out))
    }

    /// Returns the serialized form.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of digits (grows as ranks are squeezed together).
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; ranks are never empty. Present for API symmetry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn digits(&self) -> Vec<u8> {
        // Validated at construction, so every byte maps to a digit.
        self.0.bytes().filter_map(digit_value).collect()
    }

    fn middle_digit() -> u8 {
        ((BASE + 1) / 2) as u8
    }
}

/// Writes into `out` the digits of a fraction strictly between `lower` and
/// `upper` (`None` meaning 1). `lower` may be empty (meaning 0).
///
/// Requires `lower < upper` and that neither input ends in a zero digit;
/// the output never ends in a zero digit either.
fn midpoint(mut lower: &[u8], mut upper: Option<&[u8]>, out: &mut Vec<u8>) {
    loop {
        if let Some(hi) = upper {
            // Copy the shared prefix. A missing lower digit reads as 0.
            let mut n = 0;
            while n < hi.len() && lower.get(n).copied().unwrap_or(0) == hi[n] {
                n += 1;
            }
            if n > 0 {
                out.extend_from_slice(&hi[..n]);
                lower = lower.get(n..).unwrap_or(&[]);
                upper = Some(&hi[n..]);
            }
        }

        let lo_digit = u16::from(lower.first().copied().unwrap_or(0));
        let hi_digit = match upper {
            Some(hi) => u16::from(hi[0]),
            None => BASE,
        };

        if hi_digit - lo_digit > 1 {
            // Round half up, like the reference midpoint.
            out.push(((lo_digit + hi_digit + 1) / 2) as u8);
            return;
        }

        // First digits are consecutive.
        match upper {
            Some(hi) if hi.len() > 1 => {
                out.push(hi[0]);
                return;
            }
            _ => {
                out.push(lo_digit as u8);
                lower = lower.get(1..).unwrap_or(&[]);
                upper = None;
            }
        }
    }
}

// =============================================================================
// Parsing & Formatting
// =============================================================================

impl FromStr for Rank {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(RankError::Empty);
        }

        if let Some(ch) = s.chars().find(|c| !c.is_ascii() || digit_value(*c as u8).is_none()) {
            return Err(RankError::InvalidDigit {
                rank: s.to_string(),
                ch,
            });
        }

        if s.ends_with('0') {
            return Err(RankError::TrailingZero(s.to_string()));
        }

        Ok(Rank(s.to_string()))
    }
}

impl TryFrom<String> for Rank {
    type Error = RankError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rank> for String {
    fn from(rank: Rank) -> Self {
        rank.0
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Rank {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
