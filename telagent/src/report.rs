use crate::pillar::{MetricsFile, ProductFamily};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use telagent_pkg_plugin::Package;

pub const OS_KEY: &str = "OS";
pub const HARDWARE_ARCH_KEY: &str = "hardware_arch";
pub const DEPLOYMENT_KEY: &str = "deployment";
pub const INSTALLED_PACKAGES_KEY: &str = "installed_packages";

#[derive(Serialize)]
pub struct TelemetryReport {
    pub metadata: Metadata,
    pub metrics: BTreeMap<String, String>,
}

#[derive(Serialize)]
pub struct Metadata {
    // The user will provide this id, to map the agent to a host. If not provided, the hostname is used
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_family: Option<ProductFamily>,
}

pub struct HostInfo {
    pub os: String,
    pub hardware_arch: String,
}

/// Host metrics plus the package list, embedded as one JSON string value.
pub fn host_metrics(
    host: &HostInfo,
    packages: &[Package],
) -> serde_json::Result<BTreeMap<String, String>> {
    let mut metrics = BTreeMap::new();
    metrics.insert(OS_KEY.to_string(), host.os.clone());
    metrics.insert(HARDWARE_ARCH_KEY.to_string(), host.hardware_arch.clone());
    metrics.insert(DEPLOYMENT_KEY.to_string(), "PACKAGE".to_string());

    if !packages.is_empty() {
        metrics.insert(
            INSTALLED_PACKAGES_KEY.to_string(),
            serde_json::to_string(packages)?,
        );
    }
    Ok(metrics)
}

impl TelemetryReport {
    /// A report carrying only host metrics, stamped now.
    pub fn for_host(id: String, host_metrics: BTreeMap<String, String>) -> Self {
        Self {
            metadata: Metadata {
                id,
                timestamp: Utc::now(),
                product_family: None,
            },
            metrics: host_metrics,
        }
    }

    /// One report per product file: its metrics enriched with the host metrics, stamped with
    /// the time encoded in the file name. Host metrics win on key collisions.
    pub fn for_product(
        id: String,
        host_metrics: &BTreeMap<String, String>,
        file: &MetricsFile,
    ) -> Self {
        let mut metrics = file.metrics.clone();
        metrics.extend(host_metrics.iter().map(|(k, v)| (k.clone(), v.clone())));

        Self {
            metadata: Metadata {
                id,
                timestamp: file.timestamp,
                product_family: Some(file.product_family),
            },
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use telagent_pkg_plugin::PackageRepository;

    fn host() -> HostInfo {
        HostInfo {
            os: "Ubuntu 22.04".to_string(),
            hardware_arch: "x86_64".to_string(),
        }
    }

    fn packages() -> Vec<Package> {
        vec![Package::new(
            "percona-server-server",
            "8.0.36-28-1",
            PackageRepository::new("ps-80", "release"),
        )
        .unwrap()]
    }

    #[test]
    fn no_packages_omits_metric() {
        let metrics = host_metrics(&host(), &[]).unwrap();
        let report = TelemetryReport::for_host("host-1".to_string(), metrics);
        assert_eq!(report.metadata.id, "host-1");
        assert_eq!(report.metrics[OS_KEY], "Ubuntu 22.04");
        assert_eq!(report.metrics[HARDWARE_ARCH_KEY], "x86_64");
        assert_eq!(report.metrics[DEPLOYMENT_KEY], "PACKAGE");
        assert!(!report.metrics.contains_key(INSTALLED_PACKAGES_KEY));

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["metadata"].get("product_family").is_none());
    }

    #[test]
    fn packages_are_embedded_as_json_string() {
        let metrics = host_metrics(&host(), &packages()).unwrap();

        let embedded: serde_json::Value =
            serde_json::from_str(&metrics[INSTALLED_PACKAGES_KEY]).unwrap();
        assert_eq!(
            embedded,
            serde_json::json!([{
                "name": "percona-server-server",
                "version": "8.0.36-28-1",
                "repository": {"name": "ps-80", "component": "release"},
            }])
        );
    }

    #[test]
    fn product_report_combines_file_and_host_metrics() {
        let timestamp = DateTime::<Utc>::from_timestamp(1708026156, 0).unwrap();
        let file = MetricsFile {
            path: PathBuf::from("/usr/local/percona/telemetry/ps/1708026156-d7664a58.json"),
            timestamp,
            product_family: ProductFamily::Ps,
            metrics: BTreeMap::from([
                ("pillar_version".to_string(), "8.0.35-27".to_string()),
                (OS_KEY.to_string(), "spoofed".to_string()),
            ]),
        };
        let host = host_metrics(&host(), &packages()).unwrap();

        let report = TelemetryReport::for_product("host-1".to_string(), &host, &file);
        assert_eq!(report.metadata.timestamp, timestamp);
        assert_eq!(report.metadata.product_family, Some(ProductFamily::Ps));
        assert_eq!(report.metrics["pillar_version"], "8.0.35-27");
        assert_eq!(report.metrics[OS_KEY], "Ubuntu 22.04");
        assert_eq!(report.metrics[DEPLOYMENT_KEY], "PACKAGE");
        assert!(report.metrics.contains_key(INSTALLED_PACKAGES_KEY));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["metadata"]["product_family"], "PRODUCT_FAMILY_PS");
    }
}
