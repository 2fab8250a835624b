use crate::updater::http;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::time::Duration;

/// The remote version manifest, fetched once per update check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionDescriptor {
    pub version: String,
    /// Generic download location, usually a release or landing page.
    pub url: String,
    /// Windows installer location. Absent when a rollout ships no Windows
    /// installer.
    pub win_url: Option<String>,
}

pub fn fetch_version_descriptor(
    manifest_url: &str,
    timeout: Duration,
) -> Result<VersionDescriptor, ManifestError> {
    let response =
        http::download_str(manifest_url, Some(timeout)).map_err(|_| ManifestError::Fetch)?;
    parse_version_descriptor(response.as_str())
}

pub fn parse_version_descriptor(body: &str) -> Result<VersionDescriptor, ManifestError> {
    let manifest: json::Value = json::from_str(body).map_err(|_| ManifestError::InvalidResponse)?;

    let version = manifest
        .pointer("/version")
        .ok_or(ManifestError::Version)?
        .as_str()
        .ok_or(ManifestError::Version)?;

    let url = manifest
        .pointer("/url")
        .ok_or(ManifestError::DownloadUrl)?
        .as_str()
        .ok_or(ManifestError::DownloadUrl)?;

    let win_url = match manifest.pointer("/win_url") {
        None => None,
        Some(value) if value.is_null() => None,
        Some(value) => Some(
            value
                .as_str()
                .ok_or(ManifestError::DownloadUrl)?
                .to_string(),
        ),
    };

    Ok(VersionDescriptor {
        version: version.to_string(),
        url: url.to_string(),
        win_url,
    })
}

pub enum ManifestError {
    Fetch,
    InvalidResponse,
    Version,
    DownloadUrl,
}

impl ManifestError {
    fn message(&self) -> &str {
        match self {
            Self::Fetch => "Failed to fetch the version manifest",
            Self::InvalidResponse => "Version manifest is not valid JSON",
            Self::Version => "Version manifest is missing a version string",
            Self::DownloadUrl => "Version manifest has a bad download URL",
        }
    }
}

impl Display for ManifestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.message())
    }
}

impl Debug for ManifestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.message())
    }
}

impl Error for ManifestError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_manifest() {
        let descriptor = parse_version_descriptor(
            r#"{
                "version": "2.1.0",
                "url": "https://example.com/app.AppImage",
                "win_url": "https://example.com/app-setup.exe"
            }"#,
        )
        .unwrap();

        assert_eq!(descriptor.version, "2.1.0");
        assert_eq!(descriptor.url, "https://example.com/app.AppImage");
        assert_eq!(
            descriptor.win_url.as_deref(),
            Some("https://example.com/app-setup.exe")
        );
    }

    #[test]
    fn win_url_is_optional() {
        let descriptor = parse_version_descriptor(
            r#"{"version": "2.1.0", "url": "https://example.com/app.AppImage"}"#,
        )
        .unwrap();

        assert!(descriptor.win_url.is_none());
    }

    #[test]
    fn null_win_url_reads_as_absent() {
        let descriptor = parse_version_descriptor(
            r#"{"version": "2.1.0", "url": "https://example.com/d", "win_url": null}"#,
        )
        .unwrap();

        assert!(descriptor.win_url.is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let descriptor = parse_version_descriptor(
            r#"{"version": "3.0.0", "url": "https://example.com/d", "notes": "big release"}"#,
        )
        .unwrap();

        assert_eq!(descriptor.version, "3.0.0");
    }

    #[test]
    fn rejects_a_body_that_is_not_json() {
        assert!(matches!(
            parse_version_descriptor("<html>502 Bad Gateway</html>"),
            Err(ManifestError::InvalidResponse)
        ));
    }

    #[test]
    fn rejects_a_missing_version() {
        assert!(matches!(
            parse_version_descriptor(r#"{"url": "https://example.com/d"}"#),
            Err(ManifestError::Version)
        ));
    }

    #[test]
    fn rejects_a_non_string_version() {
        assert!(matches!(
            parse_version_descriptor(r#"{"version": 2, "url": "https://example.com/d"}"#),
            Err(ManifestError::Version)
        ));
    }

    #[test]
    fn rejects_a_missing_download_url() {
        assert!(matches!(
            parse_version_descriptor(r#"{"version": "2.1.0"}"#),
            Err(ManifestError::DownloadUrl)
        ));
    }

    #[test]
    fn rejects_a_non_string_win_url() {
        assert!(matches!(
            parse_version_descriptor(
                r#"{"version": "2.1.0", "url": "https://example.com/d", "win_url": 7}"#
            ),
            Err(ManifestError::DownloadUrl)
        ));
    }
}
