use crate::error::{Error, Result};
use crate::PackageRepository;
use tracing::debug;
use url::Url;

const UNABLE_TO_LOCATE: &str = "Unable to locate package";
const INSTALLED_MARKER: &str = "***";
const DPKG_STATUS_PATH: &str = "/var/lib/dpkg/status";
const LINE_TRIM: &[char] = &[' ', '\t', '\''];

/// First-party packages call the "main" channel "release".
fn canonical_component(component: &str, first_party: bool) -> String {
    if first_party && component == "main" {
        "release".to_string()
    } else {
        component.to_string()
    }
}

/// Splits a `%{from_repo}` value such as `ps-80-release-x86_64`.
///
/// Third-party repository ids are kept whole as the name. First-party ids lose their
/// architecture suffix and are split at the last `-` into name and component; ids
/// without enough segments resolve to an empty repository.
pub fn parse_rhel_repository(raw: &str, first_party: bool) -> PackageRepository {
    if raw.is_empty() {
        return PackageRepository::default();
    }

    if !first_party {
        return PackageRepository::new(raw, "");
    }

    let without_arch = match raw.rfind('-') {
        Some(pos) => &raw[..pos],
        None => raw,
    };

    match without_arch.rfind('-') {
        Some(pos) => PackageRepository::new(
            &without_arch[..pos],
            &canonical_component(&without_arch[pos + 1..], first_party),
        ),
        None => PackageRepository::default(),
    }
}

/// Finds the repository of the installed version in `apt-cache policy` output.
///
/// ```text
/// percona-server-server:
///   Installed: 8.0.36-28-1.jammy
///   Candidate: 8.0.36-28-1.jammy
///   Version table:
///  *** 8.0.36-28-1.jammy 500
///         500 http://repo.percona.com/ps-80/apt jammy/main amd64 Packages
///         100 /var/lib/dpkg/status
/// ```
///
/// The `***` row carries the priority of the installed version; the first following
/// source row with the same priority names the repository.
pub fn parse_debian_repository_output(
    output: &str,
    first_party: bool,
) -> Result<PackageRepository> {
    let mut lines = output.lines().map(|line| line.trim_matches(LINE_TRIM));

    while let Some(line) = lines.next() {
        if line.contains(UNABLE_TO_LOCATE) {
            return Err(Error::RepositoryNotFound);
        }
        if !line.starts_with(INSTALLED_MARKER) {
            continue;
        }

        // *** <version> <priority>
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [_, _, priority] = tokens[..] else {
            debug!(line, "unexpected configured package repository line");
            return Err(Error::UnexpectedConfiguredRepositoryLine(line.to_string()));
        };

        for line in lines.by_ref() {
            if line.contains(DPKG_STATUS_PATH) {
                continue;
            }
            if line.split_whitespace().next() == Some(priority) {
                return parse_debian_repository_line(line, first_party);
            }
        }
    }

    Err(Error::RepositoryNotFound)
}

/// Parses `<priority> <url> <distribution>/<component> <arch> Packages`.
fn parse_debian_repository_line(line: &str, first_party: bool) -> Result<PackageRepository> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        debug!(line, "unexpected package repository line");
        return Err(Error::UnexpectedRepositoryLine(line.to_string()));
    }

    let address = tokens[1];
    let url = Url::parse(address).map_err(|source| {
        debug!(url = address, error = %source, "failed to parse repository url");
        Error::InvalidRepositoryUrl {
            url: address.to_string(),
            source,
        }
    })?;
    let name = url.path().trim_matches('/').split('/').next().unwrap_or_default();

    let component = match tokens[2].split('/').collect::<Vec<_>>()[..] {
        [_, component] => component,
        _ => "",
    };

    Ok(PackageRepository::new(
        name,
        &canonical_component(component, first_party),
    ))
}
