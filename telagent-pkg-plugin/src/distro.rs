use serde::Serialize;
use std::fmt;

const DEBIAN_PREFIXES: &[&str] = &["debian", "ubuntu"];
const RHEL_PREFIXES: &[&str] = &["el", "centos", "oracle", "rocky", "red hat", "amazon", "alma"];

/// Packaging ecosystem of the host, derived from its OS identification string.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum DistroFamily {
    Unknown,
    Debian,
    Rhel,
}

impl DistroFamily {
    /// Classifies an OS name such as `"Ubuntu 22.04.3 LTS"` or `"CentOS Linux 7 (Core)"`.
    pub fn classify(os_name: &str) -> Self {
        let name = os_name.to_lowercase();
        let has_prefix = |prefixes: &[&str]| prefixes.iter().any(|p| name.starts_with(p));

        if has_prefix(DEBIAN_PREFIXES) {
            DistroFamily::Debian
        } else if has_prefix(RHEL_PREFIXES) {
            DistroFamily::Rhel
        } else {
            DistroFamily::Unknown
        }
    }
}

impl fmt::Display for DistroFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistroFamily::Unknown => "unknown",
            DistroFamily::Debian => "debian",
            DistroFamily::Rhel => "rhel",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_known_distributions() {
        let cases = [
            ("el8", DistroFamily::Rhel),
            ("el9", DistroFamily::Rhel),
            ("Ubuntu 22.04.3 LTS", DistroFamily::Debian),
            ("CentOS Linux 7 (Core)", DistroFamily::Rhel),
            ("Debian GNU/Linux 10 (buster)", DistroFamily::Debian),
            ("Oracle Linux Server 8.9", DistroFamily::Rhel),
            ("Amazon Linux 2", DistroFamily::Rhel),
            ("CentOS Stream 8", DistroFamily::Rhel),
            ("Rocky Linux 8.9 (Green Obsidian)", DistroFamily::Rhel),
            ("Red Hat Enterprise Linux 8.9 (Ootpa)", DistroFamily::Rhel),
            ("AlmaLinux 8.9 (Midnight Oncilla)", DistroFamily::Rhel),
        ];

        for (os_name, expected) in cases {
            assert_eq!(DistroFamily::classify(os_name), expected, "{os_name}");
        }
    }

    #[test]
    fn classify_unknown() {
        assert_eq!(DistroFamily::classify("Darwin"), DistroFamily::Unknown);
        assert_eq!(DistroFamily::classify(""), DistroFamily::Unknown);
        assert_eq!(DistroFamily::classify("Windows 11"), DistroFamily::Unknown);
    }
}
