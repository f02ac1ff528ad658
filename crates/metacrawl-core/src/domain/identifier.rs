use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Opaque identifier of one catalogued item.
///
/// Produced by an upstream recognizer; the only rule enforced here is that it
/// is not blank. Surrounding whitespace is trimmed, case is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyIdentifier);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<String> for Identifier {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_preserves_case() {
        let parsed = Identifier::parse("  abp-123\t").expect("identifier should parse");
        assert_eq!(parsed.as_str(), "abp-123");
    }

    #[test]
    fn rejects_blank_input() {
        assert_eq!(Identifier::parse(""), Err(ValidationError::EmptyIdentifier));
        assert_eq!(Identifier::parse("   "), Err(ValidationError::EmptyIdentifier));
    }

    #[test]
    fn deserialization_goes_through_validation() {
        let err = serde_json::from_str::<Identifier>("\"  \"").expect_err("must fail");
        assert!(err.to_string().contains("identifier cannot be empty"));
    }
}
