use jsonschema::Draft;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// OpenAPI dialect of a loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpecVersion {
    #[serde(rename = "2.0")]
    Swagger2,
    #[serde(rename = "3.0")]
    V30x,
    #[serde(rename = "3.1")]
    V31x,
}

impl FromStr for SpecVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("3.1") {
            Ok(SpecVersion::V31x)
        } else if s.starts_with("3.0") {
            Ok(SpecVersion::V30x)
        } else if s.starts_with("2.") {
            Ok(SpecVersion::Swagger2)
        } else {
            Err(VersionError::unsupported_version(s))
        }
    }
}

impl SpecVersion {
    /// JSON Schema draft that schemas of this dialect are written against.
    pub fn draft(&self) -> Draft {
        match self {
            SpecVersion::Swagger2 | SpecVersion::V30x => Draft::Draft4,
            SpecVersion::V31x => Draft::Draft202012,
        }
    }
}

impl Display for SpecVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecVersion::Swagger2 => write!(f, "2.0"),
            SpecVersion::V30x => write!(f, "3.0"),
            SpecVersion::V31x => write!(f, "3.1"),
        }
    }
}

#[derive(Debug)]
pub enum VersionError {
    UnsupportedVersion(String),
}

impl VersionError {
    pub(crate) fn unsupported_version<T>(version: &T) -> Self
    where
        T: ToString + ?Sized,
    {
        VersionError::UnsupportedVersion(version.to_string())
    }
}

impl Display for VersionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionError::UnsupportedVersion(version) => {
                write!(f, "Unsupported version: {}", version)
            }
        }
    }
}

impl std::error::Error for VersionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_from_str() {
        assert_eq!(SpecVersion::from_str("2.0").unwrap(), SpecVersion::Swagger2);
        assert_eq!(SpecVersion::from_str("3.0.3").unwrap(), SpecVersion::V30x);
        assert_eq!(SpecVersion::from_str("3.1.0").unwrap(), SpecVersion::V31x);
        assert!(SpecVersion::from_str("4.0.0").is_err());
    }

    #[test]
    fn test_draft_per_dialect() {
        assert_eq!(SpecVersion::Swagger2.draft(), Draft::Draft4);
        assert_eq!(SpecVersion::V30x.draft(), Draft::Draft4);
        assert_eq!(SpecVersion::V31x.draft(), Draft::Draft202012);
    }
}
