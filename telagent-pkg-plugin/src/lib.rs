use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod command;
pub mod distro;
pub mod error;
pub mod patterns;
pub mod plugins;
pub mod repository;
pub mod version;

pub use distro::DistroFamily;
pub use error::{Error, Result};

/// Where a package was installed from. Both fields are empty for local or unknown origins.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PackageRepository {
    pub name: String,
    pub component: String,
}

impl PackageRepository {
    pub fn new(name: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component: component.into(),
        }
    }
}

/// An installed package with a canonical version.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Package {
    name: String,
    version: String,
    repository: PackageRepository,
}

impl Package {
    /// Returns `None` when either the name or the version is empty.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        repository: PackageRepository,
    ) -> Option<Self> {
        let (name, version) = (name.into(), version.into());
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self {
            name,
            version,
            repository,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn repository(&self) -> &PackageRepository {
        &self.repository
    }

    pub fn with_repository(self, repository: PackageRepository) -> Self {
        Self { repository, ..self }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Upper bound for each package manager invocation.
    pub command_timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
        }
    }
}

/// A package manager backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Plugin: Send + Sync {
    fn family(&self) -> DistroFamily;

    /// Installed packages matching `pattern`. Nothing installed is `Err(Error::PackageNotFound)`.
    async fn query_packages(&self, pattern: &str) -> Result<Vec<Package>>;

    /// Repository lookup for backends whose package query does not report it.
    /// `Ok(None)` means the package query already did.
    async fn query_repository(
        &self,
        package_name: &str,
        first_party: bool,
    ) -> Result<Option<PackageRepository>>;
}

fn get_plugins(options: &ScanOptions) -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(plugins::RhelPlugin::new(options)),
        Box::new(plugins::DebianPlugin::new(options)),
    ]
}

/// Picks the backend for `family`; `None` for hosts without a supported package system.
pub fn select_plugin(family: DistroFamily, options: &ScanOptions) -> Option<Box<dyn Plugin>> {
    get_plugins(options)
        .into_iter()
        .find(|plugin| plugin.family() == family)
}

/// Inventories vendor and related packages on a host identified by `os_name`.
///
/// Never fails: a pattern whose query errors contributes nothing and the scan moves on.
/// Dropping the returned future kills any package manager process still running.
pub async fn scrape_installed_packages(os_name: &str, options: &ScanOptions) -> Vec<Package> {
    let family = DistroFamily::classify(os_name);
    let Some(plugin) = select_plugin(family, options) else {
        warn!(os = os_name, "unsupported package system");
        return Vec::new();
    };

    let packages = scan(plugin.as_ref(), &patterns::patterns_for(family)).await;
    info!(%family, count = packages.len(), "installed packages scraped");
    packages
}

/// Queries every pattern in order and concatenates the results.
pub async fn scan(plugin: &dyn Plugin, patterns: &[&str]) -> Vec<Package> {
    let mut all_packages = Vec::new();

    for pattern in patterns {
        let packages = match plugin.query_packages(pattern).await {
            Ok(packages) => packages,
            Err(err) if err.is_not_found() => {
                debug!(pattern, "no installed packages");
                continue;
            }
            Err(Error::NoPackageManager) => {
                // Host-wide condition, every remaining pattern would fail the same way.
                warn!("no package manager found, skipping package scan");
                break;
            }
            Err(err) => {
                warn!(error = %err, package = pattern, "failed to get package info");
                continue;
            }
        };

        let first_party = patterns::is_first_party(pattern);
        for package in packages {
            let package = match plugin.query_repository(package.name(), first_party).await {
                Ok(Some(repository)) => package.with_repository(repository),
                Ok(None) => package,
                Err(err) => {
                    if err.is_not_found() {
                        debug!(package = package.name(), "package repository is not found");
                    } else {
                        warn!(
                            error = %err,
                            package = package.name(),
                            "failed to get package repository"
                        );
                    }
                    package
                }
            };
            all_packages.push(package);
        }
    }
    all_packages
}
