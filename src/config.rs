//! Site and story configuration.
//!
//! Handles loading, validating, and merging the YAML configuration files.
//! Configuration is layered: the site config sets defaults for every story,
//! a story's `config.yaml` overrides them for that story, and chapter front
//! matter overrides both for one chapter. This module only loads the two file
//! layers; combining them per page is [`crate::resolve`]'s job.
//!
//! ## File Locations
//!
//! ```text
//! site/
//! ├── site_config.yaml             # Site config (optional)
//! ├── authors.yaml                 # Author profiles (optional)
//! └── content/
//!     └── my-awesome-web-novel/
//!         ├── config.yaml          # Story config (optional)
//!         └── chapters/
//!             ├── chapter-1.md
//!             └── fr/
//!                 └── chapter-1.md
//! ```
//!
//! ## Site Configuration Options
//!
//! ```yaml
//! # All options are optional - defaults shown below
//! site_name: "Web Novels"
//! site_url: ""                     # e.g. https://novels.example.com
//! site_description: ""
//! seo:
//!   allow_indexing: true
//! social_embeds:
//!   default_description: null
//!   default_image: null            # "/static/og.png" becomes an absolute URL
//!   title_format: "{title}"        # e.g. "{title} | Web Novels"
//!   twitter_handle: null
//!   keywords: []
//! footer:
//!   copyright: null
//!   links: []                      # [{text: "About", url: "/about/"}]
//!   additional_text: null
//! comments:
//!   enabled: false
//!   utterances_repo: null          # "owner/repo"
//!   utterances_issue_term: pathname
//!   utterances_label: null
//!   utterances_theme: preferred-color-scheme
//! author_pages:
//!   enabled: true
//!   max_recent_chapters: 10
//! epub:
//!   generate_enabled: true
//!   epub_enabled: true
//! processing:
//!   max_processes: null            # omit for auto = CPU cores
//! ```
//!
//! ## Partial Configuration
//!
//! The site file is sparse: it is deep-merged over the stock defaults, so a
//! file containing only `site_name: Foo` keeps every other default.
//!
//! ## Tolerance
//!
//! A missing or unreadable config file is the same as an empty one. A site
//! config that is not valid YAML, or fails validation, aborts the build: a
//! silently ignored typo in `site_url` would publish a broken sitemap. A
//! malformed story config is reported to the caller, which skips the story.

use crate::metadata::{CommentsOverride, SeoOverrides, SocialOverrides, scalar_bool, scalar_opt_bool, scalar_string};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// File name of the site configuration, relative to the source root.
pub const SITE_CONFIG_FILE: &str = "site_config.yaml";

/// File name of a story configuration, relative to the story directory.
pub const STORY_CONFIG_FILE: &str = "config.yaml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `site_config.yaml`.
///
/// Per-page override keys (`seo.allow_indexing`, `comments.enabled`, ...) are
/// optional here: leaving them unset lets the built-in defaults in
/// [`crate::resolve`] apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site_name: String,
    /// Base URL used for canonical links, feeds, and the sitemap. No trailing slash needed.
    pub site_url: String,
    pub site_description: String,
    pub seo: SiteSeoConfig,
    pub social_embeds: SiteSocialConfig,
    pub footer: FooterConfig,
    pub comments: CommentsConfig,
    pub author_pages: AuthorPagesConfig,
    pub epub: SiteEpubConfig,
    /// Parallel build settings.
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_name: "Web Novels".to_string(),
            site_url: String::new(),
            site_description: String::new(),
            seo: SiteSeoConfig::default(),
            social_embeds: SiteSocialConfig::default(),
            footer: FooterConfig::default(),
            comments: CommentsConfig::default(),
            author_pages: AuthorPagesConfig::default(),
            epub: SiteEpubConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.site_url.trim();
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(
                "site_url must start with http:// or https://".into(),
            ));
        }
        if !self.social_embeds.title_format.contains("{title}") {
            return Err(ConfigError::Validation(
                "social_embeds.title_format must contain {title}".into(),
            ));
        }
        if self.author_pages.max_recent_chapters == 0 {
            return Err(ConfigError::Validation(
                "author_pages.max_recent_chapters must be at least 1".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Join a site-relative path (`/story/en/toc/`) onto the base URL.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.site_url.trim_end_matches('/'), path)
    }

    /// Whether search engines may index the site at all.
    pub fn indexing_allowed(&self) -> bool {
        self.seo.allow_indexing.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSeoConfig {
    #[serde(deserialize_with = "scalar_opt_bool")]
    pub allow_indexing: Option<bool>,
}

/// Social embed (OpenGraph / Twitter card) defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSocialConfig {
    pub default_description: Option<String>,
    pub default_image: Option<String>,
    /// Template applied to every social title; `{title}` is replaced once.
    pub title_format: String,
    pub twitter_handle: Option<String>,
    pub keywords: Vec<String>,
}

impl Default for SiteSocialConfig {
    fn default() -> Self {
        Self {
            default_description: None,
            default_image: None,
            title_format: "{title}".to_string(),
            twitter_handle: None,
            keywords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FooterConfig {
    pub copyright: Option<String>,
    pub links: Vec<FooterLink>,
    pub additional_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FooterLink {
    pub text: String,
    pub url: String,
}

/// Utterances comment widget settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentsConfig {
    #[serde(deserialize_with = "scalar_opt_bool")]
    pub enabled: Option<bool>,
    /// GitHub repository (`owner/repo`) backing the comment threads.
    pub utterances_repo: Option<String>,
    pub utterances_issue_term: String,
    pub utterances_label: Option<String>,
    pub utterances_theme: String,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            utterances_repo: None,
            utterances_issue_term: "pathname".to_string(),
            utterances_label: None,
            utterances_theme: "preferred-color-scheme".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorPagesConfig {
    #[serde(deserialize_with = "scalar_bool")]
    pub enabled: bool,
    pub max_recent_chapters: usize,
}

impl Default for AuthorPagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_recent_chapters: 10,
        }
    }
}

/// Site-wide e-book switches.
///
/// - `generate_enabled`: run the e-book pass at all.
/// - `epub_enabled`: default for stories that don't set `epub.enabled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteEpubConfig {
    #[serde(deserialize_with = "scalar_bool")]
    pub generate_enabled: bool,
    #[serde(deserialize_with = "scalar_bool")]
    pub epub_enabled: bool,
}

impl Default for SiteEpubConfig {
    fn default() -> Self {
        Self {
            generate_enabled: true,
            epub_enabled: true,
        }
    }
}

/// Parallel build settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum number of stories built in parallel.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Story configuration
// =============================================================================

/// Story configuration loaded from `content/<story>/config.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    #[serde(deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub description: Option<String>,
    /// Two-letter code of the language whose files live directly in `chapters/`.
    #[serde(deserialize_with = "scalar_string")]
    pub primary_language: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub author: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub translator: Option<String>,
    /// Cover image path, relative to the story directory.
    #[serde(deserialize_with = "scalar_string")]
    pub cover_art: Option<String>,
    /// Declared reading order. Empty means "every chapter file, by name".
    pub arcs: Vec<ArcConfig>,
    pub seo: SeoOverrides,
    pub social_embeds: SocialOverrides,
    #[serde(deserialize_with = "scalar_opt_bool")]
    pub show_tags: Option<bool>,
    #[serde(deserialize_with = "scalar_opt_bool")]
    pub show_metadata: Option<bool>,
    #[serde(deserialize_with = "scalar_opt_bool")]
    pub show_translation_notes: Option<bool>,
    pub comments: CommentsOverride,
    pub footer: StoryFooterConfig,
    pub epub: StoryEpubConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArcConfig {
    pub title: String,
    #[serde(deserialize_with = "scalar_string")]
    pub cover_art: Option<String>,
    pub chapters: Vec<ChapterConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChapterConfig {
    pub id: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoryFooterConfig {
    pub copyright: Option<String>,
    pub links: Vec<FooterLink>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoryEpubConfig {
    /// Overrides the site's `epub.epub_enabled` for this story.
    #[serde(deserialize_with = "scalar_opt_bool")]
    pub enabled: Option<bool>,
    /// Also build one bundle per arc.
    #[serde(deserialize_with = "scalar_bool")]
    pub arc_bundles: bool,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a YAML mapping.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> serde_yaml::Value {
    serde_yaml::to_value(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Mappings are merged key-by-key (overlay keys override base keys).
/// - Non-mapping values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
/// - A null overlay document (an empty file) leaves base untouched.
pub fn merge_yaml(base: serde_yaml::Value, overlay: serde_yaml::Value) -> serde_yaml::Value {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(mut base_map), serde_yaml::Value::Mapping(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => merge_yaml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            serde_yaml::Value::Mapping(base_map)
        }
        (base, serde_yaml::Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Read an optional config file.
///
/// Returns `Ok(None)` if the file is missing or unreadable (logged), and
/// `Err` only when it was read but is not valid YAML.
pub fn load_raw_config(path: &Path) -> Result<Option<serde_yaml::Value>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "config unreadable, using defaults");
            return Ok(None);
        }
    };
    let value: serde_yaml::Value = serde_yaml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: serde_yaml::Value,
    overlay: Option<serde_yaml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_yaml(base, ov),
        None => base,
    };
    let config: SiteConfig = serde_yaml::from_value(merged)?;
    config.validate()?;
    Ok(config)
}

/// Load `site_config.yaml` from the source root.
///
/// Merges user values on top of stock defaults and validates the result.
pub fn load_site_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(&root.join(SITE_CONFIG_FILE))?;
    resolve_config(base, overlay)
}

/// Load a story's `config.yaml`. A missing file is an empty story config.
pub fn load_story_config(story_dir: &Path) -> Result<StoryConfig, ConfigError> {
    match load_raw_config(&story_dir.join(STORY_CONFIG_FILE))? {
        Some(serde_yaml::Value::Null) | None => Ok(StoryConfig::default()),
        Some(value) => Ok(serde_yaml::from_value(value)?),
    }
}

/// Returns a fully-commented stock `site_config.yaml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_yaml() -> &'static str {
    r##"# Quire Site Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Settings cascade: site_config.yaml -> content/<story>/config.yaml -> chapter
# front matter. The most specific layer that sets a value wins; keyword lists
# and footer links are combined across layers instead.

site_name: "Web Novels"

# Base URL of the published site. Used for canonical links, feeds and the
# sitemap. Leave empty to emit site-relative links only.
site_url: ""

site_description: ""

# ---------------------------------------------------------------------------
# Search engines
# ---------------------------------------------------------------------------
seo:
  # false writes "Disallow: /" to robots.txt and noindex to every page.
  allow_indexing: true

# ---------------------------------------------------------------------------
# Social embeds (OpenGraph / Twitter cards)
# ---------------------------------------------------------------------------
social_embeds:
  # default_description: "Serialized fiction, updated weekly."
  # Paths starting with "/" are made absolute with site_url.
  # default_image: "/static/og-image.png"
  title_format: "{title}"
  # twitter_handle: "@example"
  keywords: []

# ---------------------------------------------------------------------------
# Footer
# ---------------------------------------------------------------------------
footer:
  # copyright: "(c) 2026 Example"
  links: []
  #  - text: "About"
  #    url: "/about/"
  # additional_text: "Made with quire."

# ---------------------------------------------------------------------------
# Comments (utterances)
# ---------------------------------------------------------------------------
comments:
  enabled: false
  # utterances_repo: "owner/repo"
  utterances_issue_term: "pathname"
  # utterances_label: "comments"
  utterances_theme: "preferred-color-scheme"

# ---------------------------------------------------------------------------
# Author pages (driven by authors.yaml)
# ---------------------------------------------------------------------------
author_pages:
  enabled: true
  max_recent_chapters: 10

# ---------------------------------------------------------------------------
# E-books
# ---------------------------------------------------------------------------
epub:
  # Run the e-book pass at all.
  generate_enabled: true
  # Default for stories that don't set epub.enabled in their config.yaml.
  epub_enabled: true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
processing:
  # Maximum stories built in parallel.
  # Omit or comment out to auto-detect (= number of CPU cores).
  # max_processes: 4
"##
}
