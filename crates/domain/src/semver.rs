use std::cmp::Ordering;
use std::fmt;

/// Parsed semantic version: `major.minor.patch[-prerelease][+build]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SemVer {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
    pub prerelease: String,
    pub build: String,
}

impl SemVer {
    /// Strict parse. Surrounding whitespace is trimmed; empty prerelease
    /// or build sections are rejected.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if s.is_empty() {
            return None;
        }

        let mut rest = s;
        let major = take_number(&mut rest)?;
        rest = rest.strip_prefix('.')?;
        let minor = take_number(&mut rest)?;
        rest = rest.strip_prefix('.')?;
        let patch = take_number(&mut rest)?;

        let mut v = SemVer {
            major,
            minor,
            patch,
            ..Default::default()
        };

        if let Some(after) = rest.strip_prefix('-') {
            let end = after.find('+').unwrap_or(after.len());
            v.prerelease = after[..end].to_string();
            if v.prerelease.is_empty() {
                return None;
            }
            rest = &after[end..];
        }

        if let Some(after) = rest.strip_prefix('+') {
            v.build = after.to_string();
            if v.build.is_empty() {
                return None;
            }
            rest = "";
        }

        if !rest.is_empty() {
            return None;
        }
        Some(v)
    }

    /// SemVer 2.0 precedence. Build metadata is ignored.
    pub fn compare(&self, other: &SemVer) -> Ordering {
        match (
            self.major.cmp(&other.major),
            self.minor.cmp(&other.minor),
            self.patch.cmp(&other.patch),
        ) {
            (Ordering::Equal, Ordering::Equal, Ordering::Equal) => {}
            (Ordering::Equal, Ordering::Equal, ord) => return ord,
            (Ordering::Equal, ord, _) => return ord,
            (ord, _, _) => return ord,
        }

        // A release outranks any prerelease of the same triple.
        match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare_identifiers(&self.prerelease, &other.prerelease),
        }
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.prerelease.is_empty() {
            write!(f, "-{}", self.prerelease)?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build)?;
        }
        Ok(())
    }
}

fn take_number(rest: &mut &str) -> Option<i64> {
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let value = rest[..digits].parse::<i64>().ok()?;
    *rest = &rest[digits..];
    Some(value)
}

/// Dot-separated prerelease identifiers: numeric identifiers compare as
/// integers and always rank below alphanumeric ones; a shorter identifier
/// list ranks below a longer one with an equal prefix.
fn compare_identifiers(a: &str, b: &str) -> Ordering {
    let mut ids_a = a.split('.');
    let mut ids_b = b.split('.');

    loop {
        match (ids_a.next(), ids_b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ia), Some(ib)) => {
                let na = ia.parse::<i64>().ok().filter(|_| !ia.is_empty());
                let nb = ib.parse::<i64>().ok().filter(|_| !ib.is_empty());
                let ord = match (na, nb) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => ia.cmp(ib),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}
