// Minimal semver-shaped comparison, just enough for provider compatibility
// checks (`min_core_version <= core_version <= max_core_version`). The
// workspace carries no semver crate, so this stays a small parsed-tuple
// comparison rather than pulling one in for three integers.

pub fn parse(version: &str) -> Option<(u64, u64, u64)> {
    let core = version.split(['-', '+']).next().unwrap_or(version);
    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().unwrap_or("0").parse().ok()?;
    let patch = parts.next().unwrap_or("0").parse().ok()?;
    Some((major, minor, patch))
}

pub fn in_range(version: &str, min: &str, max: &str) -> bool {
    match (parse(version), parse(min), parse(max)) {
        (Some(v), Some(lo), Some(hi)) => v >= lo && v <= hi,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_versions() {
        assert_eq!(parse("1.2.3"), Some((1, 2, 3)));
        assert_eq!(parse("2"), Some((2, 0, 0)));
    }

    #[test]
    fn in_range_checks_inclusive_bounds() {
        assert!(in_range("1.0.0", "0.1.0", "99.0.0"));
        assert!(in_range("0.1.0", "0.1.0", "99.0.0"));
        assert!(in_range("99.0.0", "0.1.0", "99.0.0"));
        assert!(!in_range("100.0.0", "0.1.0", "99.0.0"));
    }

    #[test]
    fn unparseable_version_is_out_of_range() {
        assert!(!in_range("not-a-version", "0.1.0", "99.0.0"));
    }
}
