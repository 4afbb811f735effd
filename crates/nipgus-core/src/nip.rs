// ── NIP (Polish tax identifier) validation and formatting ──
//
// A NIP is 10 digits. Digits 0..=8 are weighted by 6,5,7,2,3,4,5,6,7; the sum
// mod 11 must equal digit 9. A mod-11 result of 10 can never be a check digit,
// yet identifiers ending in 0 with that result are accepted.
//
// All functions here are total: no input makes them panic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of digits in a NIP.
pub const NIP_LENGTH: usize = 10;

const WEIGHTS: [u32; 9] = [6, 5, 7, 2, 3, 4, 5, 6, 7];

/// Strip every non-digit character.
pub fn clean(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// `true` when the cleaned input has between 3 and 10 digits, i.e. could be
/// a NIP in the middle of being typed.
pub fn is_potential(raw: &str) -> bool {
    (3..=NIP_LENGTH).contains(&clean(raw).len())
}

/// Full validity check on an already-cleaned string.
pub fn validate(digits: &str) -> bool {
    if digits.len() != NIP_LENGTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let bytes = digits.as_bytes();
    if bytes.iter().all(|&b| b == bytes[0]) {
        return false;
    }

    let values: Vec<u32> = bytes.iter().map(|&b| u32::from(b - b'0')).collect();
    let sum: u32 = WEIGHTS.iter().zip(&values).map(|(w, d)| w * d).sum();
    let check = sum % 11;
    let last = values[NIP_LENGTH - 1];

    if check == 10 { last == 0 } else { last == check }
}

/// `DDD-DDD-DD-DD` for exactly 10 digits, the cleaned digits otherwise.
pub fn format(digits: &str) -> String {
    let cleaned = clean(digits);
    if cleaned.len() == NIP_LENGTH {
        group(&cleaned)
    } else {
        cleaned
    }
}

/// Format input as it is being typed: keep at most 10 digits and insert
/// separators after the 3rd, 6th and 8th digit as soon as more follow.
pub fn format_partial(raw: &str) -> String {
    let mut cleaned = clean(raw);
    cleaned.truncate(NIP_LENGTH);
    group(&cleaned)
}

fn group(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + 3);
    for (i, ch) in digits.chars().enumerate() {
        if matches!(i, 3 | 6 | 8) {
            out.push('-');
        }
        out.push(ch);
    }
    out
}

// ── Validated identifier ─────────────────────────────────────────────

/// Why a string is not a NIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NipError {
    #[error("NIP is empty")]
    Empty,
    #[error("invalid NIP: expected 10 digits with a valid checksum")]
    Invalid,
}

/// A NIP that passed [`validate`]. Holds the 10 cleaned digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nip(String);

impl Nip {
    pub fn parse(raw: &str) -> Result<Self, NipError> {
        if raw.trim().is_empty() {
            return Err(NipError::Empty);
        }
        let digits = clean(raw);
        if validate(&digits) {
            Ok(Self(digits))
        } else {
            Err(NipError::Invalid)
        }
    }

    /// The 10 bare digits.
    pub fn digits(&self) -> &str {
        &self.0
    }

    pub fn formatted(&self) -> String {
        group(&self.0)
    }
}

impl fmt::Display for Nip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Nip {
    type Err = NipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Nip {
    type Error = NipError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Nip> for String {
    fn from(nip: Nip) -> Self {
        nip.0
    }
}

impl AsRef<str> for Nip {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
