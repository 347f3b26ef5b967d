//! Version parsing and comparison for library coordinates.

use crate::error::ModuleSystemError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A `major.minor.patch` triple parsed from a dotted version string.
///
/// Major and minor must be plain integers. The patch component only
/// contributes its leading run of digits, so `0-SNAPSHOT` reads as `0` and
/// `Final` reads as `0`. A missing patch is `0`; further components are
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }
}

impl FromStr for Version {
    type Err = ModuleSystemError;

    fn from_str(version: &str) -> Result<Self, Self::Err> {
        let malformed = || ModuleSystemError::MalformedVersion(version.to_string());
        let mut parts = version.split('.');

        let major = parts
            .next()
            .and_then(|part| part.parse::<u64>().ok())
            .ok_or_else(malformed)?;
        let minor = parts
            .next()
            .and_then(|part| part.parse::<u64>().ok())
            .ok_or_else(malformed)?;
        let patch = match parts.next() {
            Some(part) => {
                let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
                if digits.is_empty() {
                    0
                } else {
                    digits.parse::<u64>().map_err(|_| malformed())?
                }
            }
            None => 0,
        };

        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Compares two version strings component-wise.
///
/// `Ordering::Greater` means `a` is the newer version.
pub fn compare(a: &str, b: &str) -> Result<Ordering, ModuleSystemError> {
    let a = a.parse::<Version>()?;
    let b = b.parse::<Version>()?;
    Ok(a.cmp(&b))
}

/// Picks the newer of two versions, keeping `a` on a tie.
pub fn newer<'a>(a: &'a str, b: &'a str) -> Result<&'a str, ModuleSystemError> {
    Ok(match compare(a, b)? {
        Ordering::Less => b,
        Ordering::Greater | Ordering::Equal => a,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!("1.2.3".parse::<Version>().unwrap(), Version::new(1, 2, 3));
        assert_eq!("0.1".parse::<Version>().unwrap(), Version::new(0, 1, 0));
        assert_eq!(
            "2.10.1-jre".parse::<Version>().unwrap(),
            Version::new(2, 10, 1)
        );
        assert_eq!("4.1.Final".parse::<Version>().unwrap(), Version::new(4, 1, 0));
        assert_eq!("1.2.3.4".parse::<Version>().unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn test_malformed_versions() {
        for version in ["", "1", "a.2.3", "1.b", "1..2", "RELEASE"] {
            let result = version.parse::<Version>();
            assert!(
                matches!(result, Err(ModuleSystemError::MalformedVersion(_))),
                "expected {version:?} to be malformed"
            );
        }
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare("1.2.3", "1.2.3").unwrap(), Ordering::Equal);
        assert_eq!(compare("1.2.3", "1.2.10").unwrap(), Ordering::Less);
        assert_eq!(compare("1.2.10", "1.2.3").unwrap(), Ordering::Greater);
        assert_eq!(compare("1.0.0-SNAPSHOT", "1.0.1").unwrap(), Ordering::Less);
        assert_eq!(compare("2.0", "1.99.99").unwrap(), Ordering::Greater);
        assert_eq!(compare("1.3", "1.3.0").unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_compare_is_antisymmetric() {
        let versions = ["0.9.1", "1.0", "1.0.0-rc1", "1.0.2", "1.10.0", "3.2.1"];
        for a in versions {
            assert_eq!(compare(a, a).unwrap(), Ordering::Equal);
            for b in versions {
                assert_eq!(compare(a, b).unwrap(), compare(b, a).unwrap().reverse());
            }
        }
    }

    #[test]
    fn test_newer_keeps_first_on_tie() {
        assert_eq!(newer("1.3.5", "1.2.0").unwrap(), "1.3.5");
        assert_eq!(newer("1.2.0", "1.3.5").unwrap(), "1.3.5");
        assert_eq!(newer("1.0", "1.0.0").unwrap(), "1.0");
        assert!(newer("1.0", "x").is_err());
    }
}
