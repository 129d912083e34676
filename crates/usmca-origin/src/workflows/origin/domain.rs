use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One line of a product's bill-of-materials origin declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentOrigin {
    pub origin_country: String,
    pub value_percentage: f64,
    #[serde(default)]
    pub description: String,
}

impl ComponentOrigin {
    pub fn new(origin_country: &str, value_percentage: f64, description: &str) -> Self {
        Self {
            origin_country: origin_country.to_string(),
            value_percentage,
            description: description.to_string(),
        }
    }

    /// Zero-valued entry appended when the user adds a row.
    pub fn placeholder() -> Self {
        Self {
            origin_country: String::new(),
            value_percentage: 0.0,
            description: String::new(),
        }
    }

    pub fn country_code(&self) -> String {
        normalize_country(&self.origin_country)
    }
}

pub(crate) fn normalize_country(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Countries whose content counts toward regional value content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeBloc {
    members: BTreeSet<String>,
}

impl TradeBloc {
    pub fn usmca() -> Self {
        Self::from_codes(["US", "CA", "MX"])
    }

    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let members = codes
            .into_iter()
            .map(|code| normalize_country(code.as_ref()))
            .filter(|code| !code.is_empty())
            .collect();
        Self { members }
    }

    /// Parses a comma separated list such as `US,CA,MX`.
    pub fn parse_list(raw: &str) -> Self {
        Self::from_codes(raw.split(','))
    }

    pub fn contains(&self, country: &str) -> bool {
        self.members.contains(&normalize_country(country))
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }
}

impl Default for TradeBloc {
    fn default() -> Self {
        Self::usmca()
    }
}

/// Harmonized System tariff code, stored as digits only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HsCode(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HsCodeError {
    #[error("HS code must not be empty")]
    Empty,
    #[error("HS code '{0}' may only contain digits, dots, and spaces")]
    InvalidCharacter(String),
    #[error("HS code '{raw}' has {digits} digits; expected 6 to 10")]
    InvalidLength { raw: String, digits: usize },
}

impl HsCode {
    pub fn parse(raw: &str) -> Result<Self, HsCodeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(HsCodeError::Empty);
        }

        let mut digits = String::with_capacity(trimmed.len());
        for ch in trimmed.chars() {
            match ch {
                '0'..='9' => digits.push(ch),
                '.' | ' ' | '-' => {}
                _ => return Err(HsCodeError::InvalidCharacter(trimmed.to_string())),
            }
        }

        if !(6..=10).contains(&digits.len()) {
            return Err(HsCodeError::InvalidLength {
                raw: trimmed.to_string(),
                digits: digits.len(),
            });
        }

        Ok(Self(digits))
    }

    pub fn digits(&self) -> &str {
        &self.0
    }

    pub fn chapter(&self) -> &str {
        &self.0[..2]
    }

    pub fn heading(&self) -> &str {
        &self.0[..4]
    }
}

impl fmt::Display for HsCode {
    /// Formats as `8708.29` or `8708.29.50` depending on precision.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = &self.0;
        write!(f, "{}.{}", &digits[..4], &digits[4..6])?;
        if digits.len() > 6 {
            write!(f, ".{}", &digits[6..])?;
        }
        Ok(())
    }
}

impl TryFrom<String> for HsCode {
    type Error = HsCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HsCode> for String {
    fn from(value: HsCode) -> Self {
        value.0
    }
}
