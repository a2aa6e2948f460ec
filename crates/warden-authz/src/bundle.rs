//! Policy bundle loading.
//!
//! A bundle is a tree of Rego modules and `data.json` documents, read either
//! from a directory or from an OPA-style `.tar.gz` archive. The tree is the
//! authoritative namespace: a module at `foo/bar.rego` must declare a
//! package under `foo`, and `foo/data.json` is mounted at `data.foo`.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::{AuthzError, AuthzResult};

const MANIFEST_FILE: &str = ".manifest";
const DATA_FILE: &str = "data.json";
const REGO_EXTENSION: &str = "rego";

/// Metadata about a loaded policy bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// Bundle revision (version identifier).
    pub revision: String,
    /// Root paths in the bundle.
    pub roots: Vec<String>,
    /// Where the bundle was loaded from.
    pub source: String,
    /// When the bundle was loaded.
    pub loaded_at: DateTime<Utc>,
}

/// A loaded, not yet compiled, policy bundle.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Bundle metadata.
    pub metadata: BundleMetadata,
    /// Policy files (bundle path -> source), in load order.
    pub policies: IndexMap<String, String>,
    /// Data files (bundle path -> JSON content), in load order.
    pub data: IndexMap<String, serde_json::Value>,
}

impl Bundle {
    /// Create an empty bundle with the given revision.
    pub fn new(revision: impl Into<String>) -> Self {
        let revision = revision.into();
        Self {
            metadata: BundleMetadata {
                source: revision.clone(),
                revision,
                roots: vec![],
                loaded_at: Utc::now(),
            },
            policies: IndexMap::new(),
            data: IndexMap::new(),
        }
    }

    /// Add a policy to the bundle.
    pub fn add_policy(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.policies.insert(path.into(), content.into());
    }

    /// Add data to the bundle.
    pub fn add_data(&mut self, path: impl Into<String>, content: serde_json::Value) {
        self.data.insert(path.into(), content);
    }

    /// Get all policy file contents.
    pub fn policy_sources(&self) -> impl Iterator<Item = (&str, &str)> {
        self.policies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Check that every module declares exactly one package, that the
    /// package lies under the module's directory, and that no two modules
    /// declare the same package.
    ///
    /// Returns the declared packages, sorted.
    pub fn check_layout(&self) -> AuthzResult<Vec<String>> {
        let mut declared: HashMap<String, &str> = HashMap::new();

        for (path, source) in &self.policies {
            let package = declared_package(source).ok_or_else(|| {
                AuthzError::compile(path.as_str(), "missing or unsupported package declaration")
            })?;

            let dirs = directory_segments(path);
            let segments: Vec<&str> = package.split('.').collect();
            if !segments.starts_with(&dirs) {
                return Err(AuthzError::PackageOutsideDirectory {
                    path: path.clone(),
                    package,
                });
            }

            if let Some(first) = declared.get(&package) {
                return Err(AuthzError::DuplicatePackage {
                    package,
                    first: (*first).to_string(),
                    second: path.clone(),
                });
            }
            declared.insert(package, path);
        }

        let mut packages: Vec<String> = declared.into_keys().collect();
        packages.sort();
        Ok(packages)
    }

    fn insert_entry(&mut self, entry_path: &str, content: String) -> AuthzResult<()> {
        let file_name = entry_path.rsplit('/').next().unwrap_or(entry_path);

        if entry_path == MANIFEST_FILE {
            let manifest: OpaManifest = serde_json::from_str(&content)
                .map_err(|e| AuthzError::BundleParse(format!("invalid manifest: {}", e)))?;
            self.metadata.revision = manifest.revision.unwrap_or_default();
            self.metadata.roots = manifest.roots;
            debug!(revision = %self.metadata.revision, "found manifest");
        } else if file_name == DATA_FILE {
            let data: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
                AuthzError::BundleParse(format!("invalid data.json at {}: {}", entry_path, e))
            })?;
            debug!(path = %entry_path, "loading data");
            self.data.insert(entry_path.to_string(), data);
        } else if Path::new(file_name)
            .extension()
            .is_some_and(|ext| ext == REGO_EXTENSION)
        {
            debug!(path = %entry_path, "loading policy");
            self.policies.insert(entry_path.to_string(), content);
        }
        Ok(())
    }
}

/// Loads policy bundles from directories and archives.
pub struct BundleLoader;

impl BundleLoader {
    /// Load the rule tree rooted at `root`.
    ///
    /// Entries are visited in sorted order. Hidden files and directories are
    /// skipped, except the root `.manifest`. Symbolic links are followed, so
    /// mounted volumes whose files are links into a revision directory load
    /// as plain trees; a link cycle fails the load.
    pub fn from_dir(root: impl AsRef<Path>) -> AuthzResult<Bundle> {
        let root = root.as_ref();
        info!(path = %root.display(), "loading bundle from directory");

        if !root.is_dir() {
            return Err(AuthzError::bundle_load(root, "not a directory"));
        }

        let mut bundle = Bundle::new("");
        bundle.metadata.source = root.display().to_string();

        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry) || is_manifest(entry));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                AuthzError::bundle_load(path, format!("failed to walk directory: {}", e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = bundle_path(root, path)?;
            if !is_bundle_file(&relative) {
                continue;
            }

            let content = std::fs::read_to_string(path)
                .map_err(|e| AuthzError::bundle_load(path, format!("failed to read file: {}", e)))?;
            bundle.insert_entry(&relative, content)?;
        }

        info!(
            policies = bundle.policies.len(),
            data_files = bundle.data.len(),
            "bundle loaded"
        );

        Ok(bundle)
    }

    /// Load a bundle from a tar.gz file.
    pub async fn from_file(path: impl AsRef<Path>) -> AuthzResult<Bundle> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading bundle from file");

        let content = tokio::fs::read(path)
            .await
            .map_err(|e| AuthzError::bundle_load(path, format!("failed to read file: {}", e)))?;

        Self::from_tar_gz(&content, path.to_string_lossy().to_string())
    }

    /// Load a bundle from tar.gz bytes.
    pub fn from_tar_gz(data: &[u8], source: String) -> AuthzResult<Bundle> {
        use flate2::read::GzDecoder;
        use tar::Archive;

        let decoder = GzDecoder::new(data);
        let mut archive = Archive::new(decoder);

        let mut bundle = Bundle::new("");
        bundle.metadata.source = source;

        for entry_result in archive
            .entries()
            .map_err(|e| AuthzError::BundleParse(format!("failed to read archive: {}", e)))?
        {
            let mut entry = entry_result
                .map_err(|e| AuthzError::BundleParse(format!("failed to read entry: {}", e)))?;

            if !entry.header().entry_type().is_file() {
                continue;
            }

            let raw_path = entry
                .path()
                .map_err(|e| AuthzError::BundleParse(format!("invalid path in archive: {}", e)))?
                .to_string_lossy()
                .to_string();
            let entry_path = raw_path.trim_start_matches("./").trim_start_matches('/').to_string();

            if !is_bundle_file(&entry_path) {
                continue;
            }

            let mut content = String::new();
            entry.read_to_string(&mut content).map_err(|e| {
                AuthzError::BundleParse(format!("failed to read entry {}: {}", entry_path, e))
            })?;

            bundle.insert_entry(&entry_path, content)?;
        }

        info!(
            source = %bundle.metadata.source,
            policies = bundle.policies.len(),
            data_files = bundle.data.len(),
            "bundle loaded"
        );

        Ok(bundle)
    }
}

/// Mount a data document at the directory of its bundle path, so that
/// `foo/bar/data.json` answers `data.foo.bar`.
pub fn root_data(path: &str, document: serde_json::Value) -> serde_json::Value {
    directory_segments(path)
        .into_iter()
        .rev()
        .fold(document, |inner, segment| {
            serde_json::Value::Object(serde_json::Map::from_iter([(segment.to_string(), inner)]))
        })
}

/// The package declared by a module, e.g. `foo.bar` for `package foo.bar`.
///
/// Only dotted identifier references are supported.
pub fn declared_package(source: &str) -> Option<String> {
    source
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .find(|line| !line.is_empty())
        .and_then(|line| line.strip_prefix("package"))
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .map(str::trim)
        .filter(|package| {
            !package.is_empty()
                && package.split('.').all(|segment| {
                    let mut chars = segment.chars();
                    chars
                        .next()
                        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                })
        })
        .map(str::to_string)
}

fn directory_segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments.pop();
    segments
}

fn is_bundle_file(path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    path == MANIFEST_FILE
        || file_name == DATA_FILE
        || Path::new(file_name)
            .extension()
            .is_some_and(|ext| ext == REGO_EXTENSION)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_manifest(entry: &DirEntry) -> bool {
    entry.depth() == 1 && entry.file_name() == MANIFEST_FILE
}

fn bundle_path(root: &Path, path: &Path) -> AuthzResult<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| AuthzError::bundle_load(path, "path escapes bundle root"))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

/// OPA bundle manifest format.
#[derive(Debug, Deserialize)]
struct OpaManifest {
    /// Bundle revision.
    revision: Option<String>,
    /// Root paths.
    #[serde(default)]
    roots: Vec<String>,
}
