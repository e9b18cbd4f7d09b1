//! Version specifiers for module requirements
//!
//! Requirement entries use PEP 440-style specifiers (`>=1.2`, `~=2.0`,
//! `>=1.0,<2.0`). Versions are mapped onto semver by padding missing
//! components with zeros, so `3.12` compares as `3.12.0`.
//!
//! ```
//! use modsync_core::version::VersionSpec;
//!
//! let spec = VersionSpec::parse(">=1.2,<2").unwrap();
//! assert!(spec.satisfies("1.4.1"));
//! assert!(!spec.satisfies("2.0"));
//! ```

use std::fmt;

/// Comparison operator of a single clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `~=`, compatible release
    Compatible,
}

#[derive(Debug, Clone)]
struct Clause {
    op: CompareOp,
    version: semver::Version,
    /// Number of components written, used by `~=`
    precision: usize,
}

impl Clause {
    fn matches(&self, candidate: &semver::Version) -> bool {
        match self.op {
            CompareOp::Gte => candidate >= &self.version,
            CompareOp::Gt => candidate > &self.version,
            CompareOp::Lte => candidate <= &self.version,
            CompareOp::Lt => candidate < &self.version,
            CompareOp::Eq => candidate == &self.version,
            CompareOp::Ne => candidate != &self.version,
            CompareOp::Compatible => {
                candidate >= &self.version && candidate < &compatible_upper_bound(&self.version, self.precision)
            }
        }
    }
}

/// `~=1.4.2` allows `<1.5.0`, `~=1.4` allows `<2.0.0`.
fn compatible_upper_bound(version: &semver::Version, precision: usize) -> semver::Version {
    if precision >= 3 {
        semver::Version::new(version.major, version.minor + 1, 0)
    } else {
        semver::Version::new(version.major + 1, 0, 0)
    }
}

/// A comma-separated set of clauses that must all match.
///
/// An empty spec matches any version.
#[derive(Debug, Clone, Default)]
pub struct VersionSpec {
    clauses: Vec<Clause>,
    raw: String,
}

impl VersionSpec {
    /// Parse a specifier string. Returns a description of the first bad
    /// clause on failure.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let raw = spec.trim().to_string();
        let mut clauses = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            clauses.push(parse_clause(part)?);
        }
        Ok(Self { clauses, raw })
    }

    /// Whether `version` satisfies every clause.
    ///
    /// Versions that cannot be read as `major[.minor[.patch]]` never match a
    /// non-empty spec.
    pub fn satisfies(&self, version: &str) -> bool {
        if self.clauses.is_empty() {
            return true;
        }
        match normalize_version(version) {
            Some((parsed, _)) => self.clauses.iter().all(|c| c.matches(&parsed)),
            None => false,
        }
    }

    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_clause(s: &str) -> Result<Clause, String> {
    let (op, version_str) = if let Some(rest) = s.strip_prefix(">=") {
        (CompareOp::Gte, rest)
    } else if let Some(rest) = s.strip_prefix("<=") {
        (CompareOp::Lte, rest)
    } else if let Some(rest) = s.strip_prefix("!=") {
        (CompareOp::Ne, rest)
    } else if let Some(rest) = s.strip_prefix("==") {
        (CompareOp::Eq, rest)
    } else if let Some(rest) = s.strip_prefix("~=") {
        (CompareOp::Compatible, rest)
    } else if let Some(rest) = s.strip_prefix('>') {
        (CompareOp::Gt, rest)
    } else if let Some(rest) = s.strip_prefix('<') {
        (CompareOp::Lt, rest)
    } else {
        return Err(format!("'{s}' has no comparison operator"));
    };

    let version_str = version_str.trim();
    let (version, precision) =
        normalize_version(version_str).ok_or_else(|| format!("invalid version '{version_str}' in '{s}'"))?;
    if op == CompareOp::Compatible && precision < 2 {
        return Err(format!("'{s}' needs at least two version components"));
    }
    Ok(Clause { op, version, precision })
}

/// Pad `1` / `1.2` to `1.0.0` / `1.2.0`; also returns the written precision.
///
/// Pre-release and local suffixes are not supported.
fn normalize_version(s: &str) -> Option<(semver::Version, usize)> {
    let parts: Vec<&str> = s.trim().split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part.parse().ok()?;
    }
    Some((semver::Version::new(numbers[0], numbers[1], numbers[2]), parts.len()))
}
