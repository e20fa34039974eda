//! Lenient version comparison.
//!
//! Release identifiers are compared as a `(major, minor, patch)` triple:
//!
//! - a leading `v` is ignored
//! - everything after the first `-` (pre-release or build suffix) is dropped,
//!   so `1.0.0-beta` and `1.0.0-rc` compare as equal
//! - missing or non-numeric fields count as `0`
//!
//! Parsing never fails. A malformed identifier still yields a decision.

use std::fmt;

/// A normalized `(major, minor, patch)` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    /// Major component
    pub major: u64,
    /// Minor component
    pub minor: u64,
    /// Patch component
    pub patch: u64,
}

impl Version {
    /// Create a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version identifier leniently.
    ///
    /// ```rust
    /// use fkey_updater::upgrade::Version;
    ///
    /// assert_eq!(Version::parse("v1.2.3-beta"), Version::new(1, 2, 3));
    /// assert_eq!(Version::parse("1.x"), Version::new(1, 0, 0));
    /// assert_eq!(Version::parse(""), Version::new(0, 0, 0));
    /// ```
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let core = strip_v_prefix(input.trim());
        let core = core.split('-').next().unwrap_or_default();

        let mut fields = core.split('.').map(parse_field);
        Self {
            major: fields.next().unwrap_or(0),
            minor: fields.next().unwrap_or(0),
            patch: fields.next().unwrap_or(0),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Leading decimal digits of a field, or `0` when there are none.
///
/// `"3rc1"` reads as `3`, `"x"` as `0`. Values beyond `u64` saturate.
fn parse_field(field: &str) -> u64 {
    field
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u64, |acc, digit| acc.saturating_mul(10).saturating_add(u64::from(digit - b'0')))
}

/// Remove one leading `v` marker, if present.
#[must_use]
pub fn strip_v_prefix(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

/// Whether `latest` is strictly newer than `current`.
///
/// Fields are compared left to right; equal triples are not newer.
///
/// ```rust
/// use fkey_updater::upgrade::is_newer;
///
/// assert!(is_newer("1.2.0", "1.3.0"));
/// assert!(!is_newer("2.0.0", "1.9.9"));
/// assert!(!is_newer("1.0.0-beta", "1.0.0-rc"));
/// ```
#[must_use]
pub fn is_newer(current: &str, latest: &str) -> bool {
    Version::parse(latest) > Version::parse(current)
}
