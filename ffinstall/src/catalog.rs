//! The fixed catalog of upstream FFmpeg builds and its plain-text feed.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::manager::{Fetcher, ManagerError, ManagerResult};

/// Base URL of the upstream build host.
pub const BUILDS_BASE_URL: &str = "https://www.gyan.dev/ffmpeg/builds";

/// Plain-text endpoint holding the latest release version.
pub const DEFAULT_VERSION_URL: &str = "https://www.gyan.dev/ffmpeg/builds/release-version";

/// Build variants offered by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildKind {
    /// Every library and codec.
    #[default]
    Full,
    /// The commonly used subset.
    Essentials,
    /// Full build with shared libraries.
    Shared,
}

impl BuildKind {
    /// All variants, in menu order.
    pub fn all() -> [BuildKind; 3] {
        [BuildKind::Full, BuildKind::Essentials, BuildKind::Shared]
    }

    /// Config/CLI identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Essentials => "essentials",
            Self::Shared => "shared",
        }
    }

    /// Catalog entry for this variant.
    pub fn spec(&self) -> BuildSpec {
        match self {
            Self::Full => BuildSpec::hosted(
                *self,
                "Full Build",
                "ffmpeg-release-full.7z",
                "Complete build with all libraries and codecs",
                "~60 MB",
            ),
            Self::Essentials => BuildSpec::hosted(
                *self,
                "Essentials Build",
                "ffmpeg-release-essentials.7z",
                "Smaller build with the most common codecs",
                "~30 MB",
            ),
            Self::Shared => BuildSpec::hosted(
                *self,
                "Shared Build",
                "ffmpeg-release-full-shared.7z",
                "Full build with shared libraries (DLLs) for development",
                "~50 MB",
            ),
        }
    }
}

impl fmt::Display for BuildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for BuildKind {
    type Err = ManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "essentials" | "essential" => Ok(Self::Essentials),
            "shared" => Ok(Self::Shared),
            _ => Err(ManagerError::UnknownBuild(s.to_string())),
        }
    }
}

/// Immutable descriptor of one downloadable build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub kind: BuildKind,
    /// Display name.
    pub name: String,
    /// Archive download URL.
    pub download_url: String,
    /// Digest manifest URL (`<hex digest> <file name>`).
    pub digest_url: String,
    pub description: String,
    /// Approximate archive size, for display.
    pub approximate_size: String,
    /// File name the archive is stored under in the scratch area.
    pub file_name: String,
}

impl BuildSpec {
    fn hosted(
        kind: BuildKind,
        name: &str,
        file_name: &str,
        description: &str,
        approximate_size: &str,
    ) -> Self {
        let download_url = format!("{}/{}", BUILDS_BASE_URL, file_name);
        Self {
            kind,
            name: name.to_string(),
            digest_url: format!("{}.sha256", download_url),
            download_url,
            description: description.to_string(),
            approximate_size: approximate_size.to_string(),
            file_name: file_name.to_string(),
        }
    }

    /// Config/CLI identifier of the build.
    pub fn id(&self) -> &'static str {
        self.kind.id()
    }
}

/// The full catalog, in menu order.
pub fn catalog() -> Vec<BuildSpec> {
    BuildKind::all().iter().map(BuildKind::spec).collect()
}

/// Reads the plain-text version and digest endpoints.
pub struct CatalogFeed<'a> {
    fetcher: &'a dyn Fetcher,
    version_url: String,
}

impl<'a> CatalogFeed<'a> {
    /// Feed using the default version endpoint.
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self::with_version_url(fetcher, DEFAULT_VERSION_URL)
    }

    pub fn with_version_url(fetcher: &'a dyn Fetcher, version_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            version_url: version_url.into(),
        }
    }

    /// Latest released version, trimmed.
    pub fn latest_version(&self) -> ManagerResult<String> {
        let body = self.fetcher.fetch_text(&self.version_url)?;
        let version = body.trim().to_string();
        info!(version = %version, "Latest upstream version");
        Ok(version)
    }

    /// Published digest of `build`, or `None` if the manifest is empty.
    pub fn expected_digest(&self, build: &BuildSpec) -> ManagerResult<Option<String>> {
        let body = self.fetcher.fetch_text(&build.digest_url)?;
        let digest = parse_digest_manifest(&body);
        debug!(build = build.id(), digest = ?digest, "Fetched digest manifest");
        Ok(digest)
    }
}

/// First whitespace-delimited token of a digest manifest, lowercased.
pub fn parse_digest_manifest(body: &str) -> Option<String> {
    body.split_whitespace().next().map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{FetchProgress, ProgressRange};
    use std::collections::HashMap;
    use std::path::Path;

    struct TextFeed(HashMap<String, String>);

    impl Fetcher for TextFeed {
        fn fetch(
            &self,
            url: &str,
            _dest: &Path,
            _range: ProgressRange,
            _on_progress: &dyn Fn(FetchProgress),
        ) -> ManagerResult<u64> {
            panic!("unexpected archive download of {}", url)
        }

        fn fetch_text(&self, url: &str) -> ManagerResult<String> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| ManagerError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    #[test]
    fn test_catalog_entries() {
        let builds = catalog();
        assert_eq!(builds.len(), 3);

        let full = &builds[0];
        assert_eq!(full.kind, BuildKind::Full);
        assert_eq!(
            full.download_url,
            "https://www.gyan.dev/ffmpeg/builds/ffmpeg-release-full.7z"
        );
        assert_eq!(
            full.digest_url,
            "https://www.gyan.dev/ffmpeg/builds/ffmpeg-release-full.7z.sha256"
        );
        assert_eq!(full.file_name, "ffmpeg-release-full.7z");

        assert_eq!(builds[1].file_name, "ffmpeg-release-essentials.7z");
        assert_eq!(builds[2].file_name, "ffmpeg-release-full-shared.7z");
    }

    #[test]
    fn test_build_kind_parse() {
        assert_eq!("FULL".parse::<BuildKind>().unwrap(), BuildKind::Full);
        assert_eq!(" essentials ".parse::<BuildKind>().unwrap(), BuildKind::Essentials);
        assert_eq!("shared".parse::<BuildKind>().unwrap(), BuildKind::Shared);
        assert!(matches!(
            "nightly".parse::<BuildKind>(),
            Err(ManagerError::UnknownBuild(_))
        ));
        assert_eq!(BuildKind::default(), BuildKind::Full);
    }

    #[test]
    fn test_parse_digest_manifest() {
        assert_eq!(
            parse_digest_manifest("ABC123  ffmpeg-release-full.7z\n"),
            Some("abc123".to_string())
        );
        assert_eq!(parse_digest_manifest("abc123"), Some("abc123".to_string()));
        assert_eq!(parse_digest_manifest("  \n"), None);
    }

    #[test]
    fn test_feed_reads_version_and_digest() {
        let full = BuildKind::Full.spec();
        let mut bodies = HashMap::new();
        bodies.insert(DEFAULT_VERSION_URL.to_string(), "7.1\n".to_string());
        bodies.insert(
            full.digest_url.clone(),
            "DEADBEEF ffmpeg-release-full.7z".to_string(),
        );
        let fetcher = TextFeed(bodies);
        let feed = CatalogFeed::new(&fetcher);

        assert_eq!(feed.latest_version().unwrap(), "7.1");
        assert_eq!(
            feed.expected_digest(&full).unwrap(),
            Some("deadbeef".to_string())
        );
    }

    #[test]
    fn test_feed_network_failure_is_reported() {
        let fetcher = TextFeed(HashMap::new());
        let feed = CatalogFeed::new(&fetcher);

        let err = feed.expected_digest(&BuildKind::Shared.spec()).unwrap_err();
        assert_eq!(err.kind(), crate::manager::ErrorKind::Network);
    }
}
