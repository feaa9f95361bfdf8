use std::cmp::Ordering;

/// A version string split into comparable identifiers.
///
/// Identifiers are the runs of digits and non-digits between the separators
/// `.`, `-`, `_`, `:`, `+`, `/` and spaces, and at digit/non-digit
/// boundaries. Numeric identifiers compare numerically, non-numeric ones
/// lexically, and a missing identifier compares as zero. A non-numeric
/// identifier orders before any numeric one, so a pre-release suffix makes a
/// version order before its release (`1.0.0-alpha < 1.0.0`).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Version {
    identifiers: Vec<Identifier>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Identifier {
    Numeric(u64),
    Alphanumeric(Box<str>),
}

impl Identifier {
    fn zero() -> Self {
        Identifier::Numeric(0)
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Alphanumeric(a), Identifier::Alphanumeric(b)) => {
                a.to_lowercase().cmp(&b.to_lowercase())
            }
            (Identifier::Alphanumeric(_), Identifier::Numeric(_)) => Ordering::Less,
            (Identifier::Numeric(_), Identifier::Alphanumeric(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const SEPARATORS: [char; 7] = ['.', '-', '_', ':', '+', '/', ' '];

impl Version {
    pub(crate) fn parse(string: &str) -> Self {
        let mut identifiers = Vec::new();

        for part in string.trim().split(SEPARATORS) {
            if part.is_empty() {
                continue;
            }

            let mut rest = part;
            while !rest.is_empty() {
                let is_digit_run = rest.starts_with(|c: char| c.is_ascii_digit());
                let end = rest
                    .find(|c: char| c.is_ascii_digit() != is_digit_run)
                    .unwrap_or(rest.len());

                let (run, tail) = rest.split_at(end);
                identifiers.push(if is_digit_run {
                    Identifier::Numeric(run.parse().unwrap_or(u64::MAX))
                } else {
                    Identifier::Alphanumeric(run.into())
                });

                rest = tail;
            }
        }

        Self { identifiers }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let length = self.identifiers.len().max(other.identifiers.len());

        for i in 0..length {
            let a = self.identifiers.get(i).cloned().unwrap_or_else(Identifier::zero);
            let b = other.identifiers.get(i).cloned().unwrap_or_else(Identifier::zero);

            let ordering = a.cmp(&b);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compare(a: &str, b: &str) -> Ordering {
        Version::parse(a).cmp(&Version::parse(b))
    }

    #[test]
    fn should_compare_numeric_components_numerically() {
        assert_eq!(Ordering::Less, compare("1.2", "1.10"));
        assert_eq!(Ordering::Greater, compare("2.0", "1.9.9"));
    }

    #[test]
    fn should_pad_the_shorter_version_with_zeroes() {
        assert_eq!(Ordering::Equal, compare("1.2", "1.2.0"));
        assert_eq!(Ordering::Less, compare("1.2", "1.2.1"));
    }

    #[test]
    fn should_treat_the_empty_version_as_zero() {
        assert_eq!(Ordering::Equal, compare("", "0.0.0"));
        assert_eq!(Ordering::Less, compare("", "0.0.1"));
    }

    #[test]
    fn should_order_a_pre_release_before_its_release() {
        assert_eq!(Ordering::Less, compare("1.0.0-alpha", "1.0.0"));
        assert_eq!(Ordering::Less, compare("1.0.0-alpha", "1.0.0-beta"));
    }

    #[test]
    fn should_split_identifiers_at_digit_boundaries() {
        assert_eq!(Ordering::Less, compare("1.0a", "1.0b"));
        assert_eq!(Ordering::Equal, compare("1.0a1", "1.0a1"));
        assert_eq!(Ordering::Less, compare("1.0a1", "1.0a2"));
    }

    #[test]
    fn should_compare_alphanumeric_identifiers_case_insensitively() {
        assert_eq!(Ordering::Equal, compare("1.0-RC", "1.0-rc"));
    }

    #[test]
    fn should_not_overflow_on_very_long_digit_runs() {
        assert_eq!(
            Ordering::Equal,
            compare("184467440737095516160", "184467440737095516161")
        );
    }
}
