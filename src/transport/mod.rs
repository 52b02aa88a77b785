pub mod lookup;

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::error::InvalidSearchKey;

/// A validated lookup identifier, 3 to 7 characters of `[A-Za-z0-9_]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchKey(String);

impl SearchKey {
    pub fn parse(raw: &str) -> Result<Self, InvalidSearchKey> {
        static SEARCH_KEY_RE: OnceLock<Regex> = OnceLock::new();
        let re = SEARCH_KEY_RE.get_or_init(|| {
            Regex::new(r"^[A-Za-z0-9_]{3,7}$").expect("search key pattern is valid")
        });

        if re.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidSearchKey(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
