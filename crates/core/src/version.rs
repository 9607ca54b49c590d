//! The persisted version marker: a dotted four-part application version
//! compared numerically component by component, not as a string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileVersion([u32; 4]);

impl FileVersion {
    pub fn new(major: u32, minor: u32, patch: u32, build: u32) -> Self {
        Self([major, minor, patch, build])
    }

    /// The lowest possible version. Files without a readable marker are
    /// treated as this, which forces every version-gated check to run.
    pub fn lowest() -> Self {
        Self([0, 0, 0, 0])
    }
}

impl FromStr for FileVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut parts = [0u32; 4];
        let fields: Vec<&str> = s.trim().split('.').collect();
        if fields.is_empty() || fields.len() > 4 {
            return Err(Error::VersionUnreadable(s.to_string()));
        }
        for (slot, field) in parts.iter_mut().zip(&fields) {
            *slot = field
                .parse()
                .map_err(|_| Error::VersionUnreadable(s.to_string()))?;
        }
        Ok(Self(parts))
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_roundtrip() {
        let v: FileVersion = "2.2.5.0".parse().unwrap();
        assert_eq!(v.to_string(), "2.2.5.0");
    }

    #[test]
    fn test_short_versions_pad_with_zeros() {
        let v: FileVersion = "2.2".parse().unwrap();
        assert_eq!(v, FileVersion::new(2, 2, 0, 0));
    }

    #[test]
    fn test_comparison_is_numeric_not_lexicographic() {
        let a: FileVersion = "2.2.10.0".parse().unwrap();
        let b: FileVersion = "2.2.9.0".parse().unwrap();
        // "2.2.10.0" < "2.2.9.0" as strings; must compare the other way.
        assert!(a > b);
    }

    #[test]
    fn test_garbage_is_unreadable() {
        assert!("".parse::<FileVersion>().is_err());
        assert!("abc".parse::<FileVersion>().is_err());
        assert!("1.2.3.4.5".parse::<FileVersion>().is_err());
    }

    #[test]
    fn test_lowest_sorts_first() {
        let v: FileVersion = "0.0.0.1".parse().unwrap();
        assert!(FileVersion::lowest() < v);
    }
}
