//! Package name patterns queried on every scan.
//!
//! Each entry is passed verbatim to the package manager, so shell-style wildcards work.

use crate::distro::DistroFamily;

/// Vendor product lines, same names on both ecosystems.
pub const FIRST_PARTY: &[&str] = &["percona-*", "proxysql*", "pmm*"];

/// Legacy capitalised RPM names (`Percona-Server-server-57`, `Percona-XtraDB-Cluster-57`).
pub const RHEL_FIRST_PARTY: &[&str] = &["Percona-*"];

/// Adjacent software tracked for context: coordination, proxies, PostgreSQL extensions.
pub const THIRD_PARTY: &[&str] = &["etcd*", "haproxy", "patroni", "pg*", "postgis*"];

pub const DEBIAN_THIRD_PARTY: &[&str] = &["postgresql-*"];

pub const RHEL_THIRD_PARTY: &[&str] = &["wal2json*"];

/// Whether packages matched by `pattern` belong to the vendor's own product lines.
pub fn is_first_party(pattern: &str) -> bool {
    FIRST_PARTY
        .iter()
        .chain(RHEL_FIRST_PARTY)
        .any(|candidate| *candidate == pattern)
}

/// Patterns for one distro family, first-party before third-party.
pub fn patterns_for(family: DistroFamily) -> Vec<&'static str> {
    let (first_party, third_party): (&[&str], &[&str]) = match family {
        DistroFamily::Debian => (&[], DEBIAN_THIRD_PARTY),
        DistroFamily::Rhel => (RHEL_FIRST_PARTY, RHEL_THIRD_PARTY),
        DistroFamily::Unknown => return Vec::new(),
    };

    FIRST_PARTY
        .iter()
        .chain(first_party)
        .chain(THIRD_PARTY)
        .chain(third_party)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_party_is_exact_pattern_membership() {
        assert!(is_first_party("percona-*"));
        assert!(is_first_party("proxysql*"));
        assert!(is_first_party("pmm*"));
        assert!(is_first_party("Percona-*"));
        assert!(!is_first_party("percona-server-server"));
        assert!(!is_first_party("etcd"));
        assert!(!is_first_party("haproxy"));
    }

    #[test]
    fn debian_patterns() {
        assert_eq!(
            patterns_for(DistroFamily::Debian),
            vec![
                "percona-*",
                "proxysql*",
                "pmm*",
                "etcd*",
                "haproxy",
                "patroni",
                "pg*",
                "postgis*",
                "postgresql-*",
            ]
        );
    }

    #[test]
    fn rhel_patterns() {
        let patterns = patterns_for(DistroFamily::Rhel);
        assert_eq!(&patterns[..4], &["percona-*", "proxysql*", "pmm*", "Percona-*"]);
        assert_eq!(patterns.last(), Some(&"wal2json*"));
        assert!(!patterns.contains(&"postgresql-*"));
    }

    #[test]
    fn unknown_has_no_patterns() {
        assert!(patterns_for(DistroFamily::Unknown).is_empty());
    }
}
