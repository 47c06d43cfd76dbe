use crate::error::{Error, Result};
use crate::repository::parse_debian_repository_output;
use crate::version::parse_debian_version;
use crate::{command, patterns, DistroFamily, Package, PackageRepository, Plugin, ScanOptions};
use async_trait::async_trait;
use std::time::Duration;

const DPKG_QUERY: &str = "dpkg-query";
// dpkg-query prints the surrounding quotes literally since no shell strips them.
const DPKG_QUERY_FORMAT: &str = "'${db:Status-Abbrev}|${binary:Package}|${source:Version}\n'";
const APT_CACHE: &str = "apt-cache";

const NO_PACKAGES_FOUND: &str = "no packages found matching";
const INSTALLED_STATUSES: &[&str] = &["ii", "iHR"];
const LINE_TRIM: &[char] = &[' ', '\t', '\''];

/// dpkg-query for packages, apt-cache policy for their repositories.
pub struct DebianPlugin {
    timeout: Duration,
}

impl DebianPlugin {
    pub fn new(options: &ScanOptions) -> Self {
        Self {
            timeout: options.command_timeout,
        }
    }
}

#[async_trait]
impl Plugin for DebianPlugin {
    fn family(&self) -> DistroFamily {
        DistroFamily::Debian
    }

    async fn query_packages(&self, pattern: &str) -> Result<Vec<Package>> {
        let args = ["-f", DPKG_QUERY_FORMAT, "-W", pattern];
        let output = command::run(DPKG_QUERY, &args, self.timeout).await;
        parse_package_output(output, patterns::is_first_party(pattern))
    }

    async fn query_repository(
        &self,
        package_name: &str,
        first_party: bool,
    ) -> Result<Option<PackageRepository>> {
        let args = ["-q=0", "policy", package_name];
        let output = command::run(APT_CACHE, &args, self.timeout).await?;
        parse_debian_repository_output(&output, first_party).map(Some)
    }
}

/// Parses `<status>|<package>[:<arch>]|<version>` lines from dpkg-query.
///
/// A failed query whose output says nothing matched, or output without a single installed
/// package, is `Error::PackageNotFound`. Malformed lines are skipped.
pub fn parse_package_output(output: Result<String>, first_party: bool) -> Result<Vec<Package>> {
    let output = match output {
        Ok(output) => output,
        Err(Error::CommandFailed { output, .. }) if output.contains(NO_PACKAGES_FOUND) => {
            return Err(Error::PackageNotFound)
        }
        Err(err) => return Err(err),
    };

    let mut packages = Vec::new();
    for line in output.lines() {
        let line = line.trim_matches(LINE_TRIM);
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('|').collect();
        let [status, name, version] = fields[..] else {
            continue;
        };

        if !INSTALLED_STATUSES.contains(&status.trim()) {
            continue;
        }

        let name = parse_package_name(name);
        let version = parse_debian_version(version.trim(), first_party);
        if let Some(package) = Package::new(name, version, PackageRepository::default()) {
            packages.push(package);
        }
    }

    if packages.is_empty() {
        return Err(Error::PackageNotFound);
    }
    Ok(packages)
}

/// `percona-xtrabackup-81:amd64` -> `percona-xtrabackup-81`
fn parse_package_name(name: &str) -> &str {
    name.trim().split(':').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(name: &str, version: &str) -> Package {
        Package::new(name, version, PackageRepository::default()).unwrap()
    }

    fn failed(output: &str) -> Result<String> {
        Err(Error::CommandFailed {
            program: DPKG_QUERY.to_string(),
            code: Some(1),
            output: output.to_string(),
        })
    }

    #[test]
    fn first_party_full_output() {
        let output = "ii |percona-backup-mongodb|2.3.1-1.jammy
ii |percona-mongodb-mongosh|2.1.1.jammy
ii |percona-mysql-shell:amd64|8.2.0-1-1.jammy
ii |percona-pg-stat-monitor16|1:2.0.4-2.jammy
iHR |percona-pgbouncer|1:1.22.0-1.jammy
ii |percona-release|1.0-27.generic
un |percona-server-client-5.7|
ii |percona-server-server|8.2.0-1-1.jammy
un |percona-xtrabackup|
ii |percona-xtrabackup-81|8.1.0-1-1.jammy
";
        let packages = parse_package_output(Ok(output.to_string()), true).unwrap();
        assert_eq!(
            packages,
            vec![
                package("percona-backup-mongodb", "2.3.1-1"),
                package("percona-mongodb-mongosh", "2.1.1"),
                package("percona-mysql-shell", "8.2.0-1-1"),
                package("percona-pg-stat-monitor16", "2.0.4-2"),
                package("percona-pgbouncer", "1.22.0-1"),
                package("percona-release", "1.0-27"),
                package("percona-server-server", "8.2.0-1-1"),
                package("percona-xtrabackup-81", "8.1.0-1-1"),
            ]
        );
    }

    #[test]
    fn quoted_lines() {
        let output = "'ii |proxysql|1:1.5.5-1.2.jammy'\n'iHR |proxysql2|2:2.5.5-1.2.jammy'\n";
        let packages = parse_package_output(Ok(output.to_string()), true).unwrap();
        assert_eq!(
            packages,
            vec![package("proxysql", "1.5.5-1-2"), package("proxysql2", "2.5.5-1-2")]
        );
    }

    #[test]
    fn end_to_end_single_package() {
        let output = "ii |percona-server-server|8.0.36-28-1.jammy\n";
        let first_party = patterns::is_first_party("percona-*");
        let packages = parse_package_output(Ok(output.to_string()), first_party).unwrap();
        assert_eq!(packages, vec![package("percona-server-server", "8.0.36-28-1")]);
        assert_eq!(packages[0].repository(), &PackageRepository::default());
    }

    #[test]
    fn third_party_with_arch_epoch_and_dfsg() {
        let output = "ii |etcd:amd64|1:3.3.25+dfsg-7ubuntu0.22.04.1";
        let packages = parse_package_output(Ok(output.to_string()), false).unwrap();
        assert_eq!(packages, vec![package("etcd", "3.3.25")]);
    }

    #[test]
    fn malformed_line_is_skipped() {
        let output = "ii |pmm2-client|2.41.2-6.1.jammy\nii |pmm-client\n";
        let packages = parse_package_output(Ok(output.to_string()), true).unwrap();
        assert_eq!(packages, vec![package("pmm2-client", "2.41.2-6-1")]);
    }

    #[test]
    fn nothing_installed_is_not_found() {
        let output = "un |percona-xtrabackup-81|\nii |percona-xtrabackup\n";
        let err = parse_package_output(Ok(output.to_string()), true).unwrap_err();
        assert!(matches!(err, Error::PackageNotFound));

        let err = parse_package_output(Ok(String::new()), true).unwrap_err();
        assert!(matches!(err, Error::PackageNotFound));
    }

    #[test]
    fn no_match_message_is_not_found() {
        let output = failed("dpkg-query: no packages found matching percona2-*\n");
        let err = parse_package_output(output, true).unwrap_err();
        assert!(matches!(err, Error::PackageNotFound));
    }

    #[test]
    fn other_failures_propagate() {
        let err = parse_package_output(
            failed("dpkg-query: error while loading shared libraries: libapt-pkg.so.6.0"),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { code: Some(1), .. }));

        let err = parse_package_output(
            Err(Error::CommandTimeout {
                program: DPKG_QUERY.to_string(),
                timeout: Duration::from_secs(30),
            }),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { .. }));
    }

    #[test]
    fn package_name_without_arch() {
        assert_eq!(parse_package_name(" percona-xtrabackup-81:amd64"), "percona-xtrabackup-81");
        assert_eq!(parse_package_name("etcd"), "etcd");
    }
}
