//! Six-digit pairing codes.
//!
//! Codes are exchanged out-of-band by two people (read aloud, shown on
//! screen), so they are plain ASCII digits with no check digit.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::PairingError;

/// Number of digits in a pairing code.
pub const CODE_LENGTH: usize = 6;

/// Range generated codes are drawn from (900 000 values, no leading zero).
const CODE_RANGE: std::ops::Range<u32> = 100_000..1_000_000;

/// A syntactically valid pairing code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PairCode(String);

impl PairCode {
    /// Parse user input. Surrounding whitespace is ignored; anything other
    /// than exactly six ASCII digits is rejected.
    pub fn parse(input: &str) -> Result<Self, PairingError> {
        let trimmed = input.trim();
        if trimmed.len() == CODE_LENGTH && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(PairingError::InvalidCodeFormat {
                input: input.to_string(),
            })
        }
    }

    /// Draw a code uniformly at random.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let value: u32 = rng.gen_range(CODE_RANGE);
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PairCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PairCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for PairCode {
    type Err = PairingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PairCode {
    type Error = PairingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PairCode> for String {
    fn from(code: PairCode) -> Self {
        code.0
    }
}
