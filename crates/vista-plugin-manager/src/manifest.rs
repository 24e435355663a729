//! Package manifests shipped inside plugin archives.
//!
//! Generic packages carry a `package.json`:
//! ```json
//! { "name": "markdown-preview", "version": "1.2.0", "main": "index.wasm",
//!   "style": "theme.css", "css": ["extra.css"] }
//! ```
//! Legacy packages use the `.eagleplugin` extension and carry a
//! `manifest.json` with an explicit `id`.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{PluginManagerError, PluginManagerResult};

/// Manifest file of a generic package.
pub const GENERIC_MANIFEST: &str = "package.json";

/// Manifest file of a legacy package.
pub const LEGACY_MANIFEST: &str = "manifest.json";

/// Archive extension identifying legacy packages.
pub const LEGACY_EXTENSION: &str = "eagleplugin";

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("invalid regex"));

static LEGACY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("invalid regex"));

/// Package flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// Code plugin with a WASM entry.
    #[default]
    #[serde(alias = "")]
    Generic,
    /// Window plugin served over the content protocol.
    #[serde(alias = "eagle")]
    Legacy,
}

impl PluginKind {
    /// Infers the kind from an archive's extension.
    #[must_use]
    pub fn from_archive(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case(LEGACY_EXTENSION) => Self::Legacy,
            _ => Self::Generic,
        }
    }

    /// Returns the manifest file name for this kind.
    #[must_use]
    pub const fn manifest_file(self) -> &'static str {
        match self {
            Self::Generic => GENERIC_MANIFEST,
            Self::Legacy => LEGACY_MANIFEST,
        }
    }

    /// Returns the prefix of ids for this kind.
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Generic => "plugin_",
            Self::Legacy => "eagle_",
        }
    }
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generic => write!(f, "generic"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

/// One or more stylesheet paths.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Stylesheets {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct GenericManifest {
    name: String,
    version: String,
    main: Option<String>,
    entry: Option<String>,
    style: Option<String>,
    css: Option<Stylesheets>,
}

#[derive(Debug, Deserialize)]
struct LegacyManifest {
    id: String,
    name: String,
    version: String,
    main: Option<String>,
}

/// Parsed package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    /// Stable plugin id; also the name of the root directory.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Declared version.
    pub version: semver::Version,
    /// Entry file relative to the root, if declared.
    pub entry: Option<String>,
    /// Stylesheets relative to the root, in declaration order.
    pub styles: Vec<String>,
    /// Package flavour.
    pub kind: PluginKind,
}

impl PackageManifest {
    /// Parses manifest bytes of the given kind.
    ///
    /// `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::InvalidPackage`] if the JSON is malformed,
    /// the version is not semver or no usable id can be derived.
    pub fn parse(kind: PluginKind, bytes: &[u8], origin: &Path) -> PluginManagerResult<Self> {
        let invalid = |reason: String| PluginManagerError::InvalidPackage {
            path: origin.to_path_buf(),
            reason,
        };

        match kind {
            PluginKind::Generic => {
                let raw: GenericManifest = serde_json::from_slice(bytes)
                    .map_err(|e| invalid(format!("{GENERIC_MANIFEST}: {e}")))?;

                let slug = slug(&raw.name);
                if slug.is_empty() {
                    return Err(invalid(format!("unusable plugin name '{}'", raw.name)));
                }

                let mut styles: Vec<String> = raw.style.into_iter().collect();
                match raw.css {
                    Some(Stylesheets::One(css)) => styles.push(css),
                    Some(Stylesheets::Many(css)) => styles.extend(css),
                    None => {}
                }

                Ok(Self {
                    id: format!("{}{slug}", kind.id_prefix()),
                    version: parse_version(&raw.version).map_err(invalid)?,
                    name: raw.name,
                    entry: raw.entry.or(raw.main),
                    styles,
                    kind,
                })
            }
            PluginKind::Legacy => {
                let raw: LegacyManifest = serde_json::from_slice(bytes)
                    .map_err(|e| invalid(format!("{LEGACY_MANIFEST}: {e}")))?;

                if !LEGACY_ID_RE.is_match(&raw.id) {
                    return Err(invalid(format!("unusable plugin id '{}'", raw.id)));
                }

                Ok(Self {
                    id: format!("{}{}", kind.id_prefix(), raw.id),
                    version: parse_version(&raw.version).map_err(invalid)?,
                    name: raw.name,
                    entry: raw.main,
                    styles: Vec::new(),
                    kind,
                })
            }
        }
    }

    /// Reads the manifest at the root of an extracted package.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::InvalidPackage`] if the manifest file is
    /// absent or cannot be parsed.
    pub fn read(root: &Path, kind: PluginKind) -> PluginManagerResult<Self> {
        let path = root.join(kind.manifest_file());

        if !path.is_file() {
            return Err(PluginManagerError::InvalidPackage {
                path: root.to_path_buf(),
                reason: format!("missing {}", kind.manifest_file()),
            });
        }

        let bytes = std::fs::read(&path)?;
        Self::parse(kind, &bytes, &path)
    }
}

fn parse_version(version: &str) -> Result<semver::Version, String> {
    semver::Version::parse(version).map_err(|e| format!("invalid version '{version}': {e}"))
}

/// Lowercases `name` and collapses every run of other characters into `-`.
fn slug(name: &str) -> String {
    SLUG_RE
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}
