//! The 3-digit content code.
//!
//! [`Code`] is the only way a code enters the system. Admin captions and
//! store keys pass through [`Code::parse`]; user messages go through the
//! stricter [`Code::parse_exact`].

use lazy_regex::regex_is_match;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rejected code input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("code must be exactly three ASCII digits, got {0:?}")]
pub struct InvalidCode(pub String);

/// A validated code: exactly three ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Code(String);

impl Code {
    /// Parse a code from user or operator input.
    ///
    /// Surrounding whitespace is ignored. Only `0-9` count as digits, so
    /// full-width or other Unicode digits are rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use code_vault::code::Code;
    ///
    /// assert_eq!(Code::parse(" 007\n").map(|c| c.to_string()), Ok("007".to_string()));
    /// assert!(Code::parse("12a").is_err());
    /// assert!(Code::parse("1234").is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCode`] if the trimmed input is not three ASCII digits.
    pub fn parse(input: &str) -> Result<Self, InvalidCode> {
        let trimmed = input.trim();
        if regex_is_match!(r"^[0-9]{3}$", trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidCode(input.to_string()))
        }
    }

    /// Parse a code typed by a user.
    ///
    /// Unlike [`Code::parse`] nothing is trimmed: the whole text must be
    /// exactly three ASCII digits.
    ///
    /// ```
    /// use code_vault::code::Code;
    ///
    /// assert!(Code::parse_exact("007").is_ok());
    /// assert!(Code::parse_exact(" 007").is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCode`] if the input is not exactly three ASCII digits.
    pub fn parse_exact(input: &str) -> Result<Self, InvalidCode> {
        if regex_is_match!(r"^[0-9]{3}$", input) {
            Ok(Self(input.to_string()))
        } else {
            Err(InvalidCode(input.to_string()))
        }
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Code {
    type Err = InvalidCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
