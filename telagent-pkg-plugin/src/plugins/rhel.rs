use crate::error::{Error, Result};
use crate::repository::parse_rhel_repository;
use crate::version::parse_rhel_version;
use crate::{command, patterns, DistroFamily, Package, PackageRepository, Plugin, ScanOptions};
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::time::Duration;

/// Query tools in order of preference; the first one on `$PATH` wins.
const PACKAGE_MANAGERS: &[&[&str]] = &[
    &["repoquery"],
    &["yum", "repoquery"],
    &["dnf", "repoquery"],
];
const QUERY_FORMAT: &str = "'%{name}|%{version}|%{release}|%{from_repo}'";
const LINE_TRIM: &[char] = &[' ', '\t', '\''];

/// repoquery reports name, version, release and origin repository in one pass.
pub struct RhelPlugin {
    timeout: Duration,
    search_path: Option<OsString>,
}

impl RhelPlugin {
    pub fn new(options: &ScanOptions) -> Self {
        Self {
            timeout: options.command_timeout,
            search_path: None,
        }
    }

    /// Looks for the query tools in `search_path` instead of `$PATH`.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }
}

#[async_trait]
impl Plugin for RhelPlugin {
    fn family(&self) -> DistroFamily {
        DistroFamily::Rhel
    }

    async fn query_packages(&self, pattern: &str) -> Result<Vec<Package>> {
        let (program, subcommand) = match &self.search_path {
            Some(search_path) => find_package_manager_in(search_path)?,
            None => find_package_manager()?,
        };
        let mut args: Vec<&str> = subcommand.to_vec();
        args.extend(["--qf", QUERY_FORMAT, "--installed", pattern]);

        let output = command::run(program, &args, self.timeout).await;
        parse_package_output(output, patterns::is_first_party(pattern))
    }

    async fn query_repository(
        &self,
        _package_name: &str,
        _first_party: bool,
    ) -> Result<Option<PackageRepository>> {
        Ok(None)
    }
}

type PackageManager = (&'static str, &'static [&'static str]);

fn find_package_manager() -> Result<PackageManager> {
    select_package_manager(|program| which::which(program).is_ok())
}

fn find_package_manager_in(search_path: &OsStr) -> Result<PackageManager> {
    select_package_manager(|program| which::which_in(program, Some(search_path), ".").is_ok())
}

fn select_package_manager(is_installed: impl Fn(&str) -> bool) -> Result<PackageManager> {
    PACKAGE_MANAGERS
        .iter()
        .filter_map(|candidate| candidate.split_first())
        .find(|(program, _)| is_installed(program))
        .map(|(program, subcommand)| (*program, subcommand))
        .ok_or(Error::NoPackageManager)
}

/// Parses `<name>|<version>|<release>|<repository>` lines from repoquery.
///
/// repoquery exits successfully when nothing matches, so any command error is passed
/// through untouched and an empty result is `Error::PackageNotFound`.
pub fn parse_package_output(output: Result<String>, first_party: bool) -> Result<Vec<Package>> {
    let output = output?;

    let mut packages = Vec::new();
    for line in output.lines() {
        let line = line.trim_matches(LINE_TRIM);
        if line.is_empty() {
            continue;
        }

        // Presence in the output means installed, there is no status column.
        let fields: Vec<&str> = line.split('|').collect();
        let [name, version, release, repository] = fields[..] else {
            continue;
        };

        let package = Package::new(
            name,
            parse_rhel_version(version, release, first_party),
            parse_rhel_repository(repository, first_party),
        );
        if let Some(package) = package {
            packages.push(package);
        }
    }

    if packages.is_empty() {
        return Err(Error::PackageNotFound);
    }
    Ok(packages)
}
