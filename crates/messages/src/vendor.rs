use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MessageError;

/// Vendor identifier attached to a classified invoice.
///
/// Identifiers are upper-case ASCII letters, digits, `_` or `-`. Lower-case
/// input is normalised on construction so `"acme"` and `"ACME"` compare equal.
/// [`VendorType::generic`] is the fallback when no vendor rule matched.
///
/// ```rust
/// use messages::VendorType;
///
/// let vendor: VendorType = "acme".parse().unwrap();
/// assert_eq!(vendor.as_str(), "ACME");
/// assert!("acme corp".parse::<VendorType>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VendorType(String);

impl VendorType {
    /// Identifier used when no vendor-specific handling applies.
    pub const GENERIC: &'static str = "GENERIC";

    pub fn new(raw: impl AsRef<str>) -> Result<Self, MessageError> {
        let normalized = raw.as_ref().trim().to_ascii_uppercase();
        let valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if valid {
            Ok(Self(normalized))
        } else {
            Err(MessageError::InvalidVendorType(raw.as_ref().to_string()))
        }
    }

    pub fn generic() -> Self {
        Self(Self::GENERIC.to_string())
    }

    pub fn is_generic(&self) -> bool {
        self.0 == Self::GENERIC
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VendorType {
    fn default() -> Self {
        Self::generic()
    }
}

impl fmt::Display for VendorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VendorType {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for VendorType {
    type Error = MessageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VendorType> for String {
    fn from(value: VendorType) -> Self {
        value.0
    }
}
