//! Canonical version strings.
//!
//! Debian reports one `[epoch:]upstream_version[-debian_revision]` string, RHEL reports
//! `version` and `release` separately. Both are reduced to the same dash-joined form so
//! that e.g. `8.0.36-28-1.jammy` and `8.0.36` / `28.1.el9` compare equal downstream.

use debian_packaging::package_version::PackageVersion;

const DFSG_MARKER: &str = "+dfsg";

/// Drops the trailing `.<distribution>` tag (`.jammy`, `.el9`, `.generic`).
fn strip_distribution_tag(value: &str) -> &str {
    match value.rfind('.') {
        Some(pos) => &value[..pos],
        None => value,
    }
}

/// Debian policy requires the upstream version to start with a digit.
fn starts_with_digit(upstream: &str) -> bool {
    upstream.starts_with(|c: char| c.is_ascii_digit())
}

/// Joins version and revision, flattening dotted sub-revisions (`1.2` -> `1-2`).
fn join_revision(version: &str, revision: &str) -> String {
    format!("{}-{}", version, revision.replace('.', "-"))
}

/// Normalizes a version reported by `dpkg-query`.
///
/// First-party versions carry a distribution codename after the last `.` which is removed
/// before parsing; their revision is kept. Third-party versions keep only the upstream part,
/// cut at any `+dfsg` repack marker. The epoch is always dropped. Unparseable input,
/// including an upstream part that does not start with a digit, is returned as is.
pub fn parse_debian_version(raw: &str, first_party: bool) -> String {
    let raw = if first_party {
        strip_distribution_tag(raw)
    } else {
        raw
    };

    let version = match PackageVersion::parse(raw) {
        Ok(version) if starts_with_digit(version.upstream_version()) => version,
        _ => return raw.to_string(),
    };
    let upstream = version.upstream_version();

    if first_party {
        return match version.debian_revision() {
            Some(revision) if !revision.is_empty() => join_revision(upstream, revision),
            _ => upstream.to_string(),
        };
    }

    match upstream.find(DFSG_MARKER) {
        Some(pos) => upstream[..pos].to_string(),
        None => upstream.to_string(),
    }
}

/// Normalizes the `version` and `release` fields reported by repoquery.
///
/// The distribution tag sits at the end of `release`, or at the end of `version` when the
/// release is empty. Only first-party packages get the release appended.
pub fn parse_rhel_version(version: &str, release: &str, first_party: bool) -> String {
    let (version, release) = if release.is_empty() {
        (strip_distribution_tag(version), release)
    } else {
        (version, strip_distribution_tag(release))
    };

    if first_party && !release.is_empty() {
        join_revision(version, release)
    } else {
        version.to_string()
    }
}
