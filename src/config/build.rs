//! `[build]` section configuration.
//!
//! Contains the source/output directories, ignore globs, URL prefix and
//! render settings shared by build and preview.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in thicket.toml - content resolution and output.
///
/// # Example
/// ```toml
/// [build]
/// contents = "contents"     # Source directory
/// templates = "templates"   # Template directory
/// output = "build"          # Output directory
/// ignore = ["**/*.pdf", "drafts/**"]
/// base_url = "/blog/"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Content source directory.
    #[serde(default = "defaults::build::contents")]
    #[educe(Default = defaults::build::contents())]
    pub contents: PathBuf,

    /// Template directory.
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Views directory, watched in preview mode.
    #[serde(default)]
    pub views: Option<PathBuf>,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Glob patterns (relative to the content root) excluded from the tree.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Path prefix prepended to every leaf filename when deriving its URL.
    #[serde(default = "defaults::build::base_url")]
    #[educe(Default = defaults::build::base_url())]
    pub base_url: String,

    /// Optional JSON file merged over `[locals]`.
    #[serde(default)]
    pub locals_file: Option<PathBuf>,

    /// Render leaves on the rayon pool instead of one at a time.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub parallel: bool,

    /// Upper bound on threads used while scanning the content directory.
    #[serde(default = "defaults::build::file_limit")]
    #[educe(Default = defaults::build::file_limit())]
    pub file_limit: usize,

    /// Remove the output directory before building.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub clean: bool,
}
