use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque identifier of a tracked package.
///
/// Identifiers are text tokens. Front-ends that use numeric identifiers carry
/// them as their decimal text, so `42` and `"42"` name the same package. An
/// identifier is never empty and never carries leading or trailing
/// whitespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId(String);

impl PackageId {
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::EmptyPackageId);
        }
        if id.trim() != id {
            return Err(TypeError::UntrimmedPackageId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<u64> for PackageId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl FromStr for PackageId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PackageId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for PackageId {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.0
    }
}

impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageId({:?})", self.0)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_text_tokens() {
        let id = PackageId::new("pkg1").unwrap();
        assert_eq!(id.as_str(), "pkg1");
        assert_eq!(id.to_string(), "pkg1");
    }

    #[test]
    fn numeric_ids_are_decimal_text() {
        assert_eq!(PackageId::from(42u64), PackageId::new("42").unwrap());
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(PackageId::new(""), Err(TypeError::EmptyPackageId));
    }

    #[test]
    fn rejects_surrounding_whitespace() {
        assert!(matches!(
            PackageId::new(" pkg1"),
            Err(TypeError::UntrimmedPackageId(_))
        ));
        assert!(matches!(
            "pkg1\n".parse::<PackageId>(),
            Err(TypeError::UntrimmedPackageId(_))
        ));
    }

    #[test]
    fn inner_whitespace_is_kept() {
        let id = PackageId::new("box 7").unwrap();
        assert_eq!(id.as_str(), "box 7");
    }

    #[test]
    fn serde_is_a_plain_string() {
        let id = PackageId::new("pkg1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"pkg1\"");
        assert!(serde_json::from_str::<PackageId>("\"\"").is_err());
    }

    proptest! {
        #[test]
        fn trimmed_non_empty_text_is_accepted(s in "[A-Za-z0-9_-][A-Za-z0-9 _-]{0,30}[A-Za-z0-9_-]") {
            let id = PackageId::new(s.clone()).unwrap();
            prop_assert_eq!(id.into_inner(), s);
        }
    }
}
