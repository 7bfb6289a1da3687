//! Content discovery and manifest generation.
//!
//! Stage 1 of the build. Walks the source directory to discover stories, their
//! declared arcs and chapters, and their languages, producing a [`Manifest`]
//! that every later stage reads.
//!
//! ## Directory Structure
//!
//! ```text
//! site/                                # Source root
//! ├── site_config.yaml                 # Site configuration (optional)
//! ├── authors.yaml                     # Author profiles (optional)
//! └── content/
//!     ├── my-awesome-web-novel/        # Story; the directory name is its slug
//!     │   ├── config.yaml              # Title, primary language, arcs, overrides
//!     │   ├── cover.png
//!     │   └── chapters/
//!     │       ├── chapter-1.md         # Primary language
//!     │       ├── chapter-2.md
//!     │       └── fr/
//!     │           └── chapter-1.md     # Translation
//!     └── another-story/
//!         └── chapters/
//!             └── prologue.md
//! ```
//!
//! ## Reading Order
//!
//! Arcs and chapters keep exactly the order in which `config.yaml` declares
//! them; nothing is re-sorted. A story without declared arcs gets one arc,
//! titled after the story, holding every primary chapter file in file-name
//! order.
//!
//! ## Validation
//!
//! - Chapter ids must be unique within a story (they are shared by every
//!   language and form the chapter URL).
//! - Chapter ids must be a single path segment.
//! - A story whose `config.yaml` is malformed is skipped with a warning; the
//!   rest of the site still builds.

use crate::authors::{self, Authors};
use crate::config::{self, SiteConfig, StoryConfig};
use crate::language::{self, CHAPTER_EXTENSION};
use crate::naming;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory under the source root holding one subdirectory per story.
pub const CONTENT_DIR: &str = "content";

/// Directory under a story holding its chapter files.
pub const CHAPTERS_DIR: &str = "chapters";

/// Language assumed when a story config doesn't name one.
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Authors file error: {0}")]
    Authors(#[from] authors::AuthorsError),
    #[error("Duplicate chapter id {0} in story {1}")]
    DuplicateChapter(String, String),
    #[error("Invalid chapter id {0:?} in story {1}: ids must be a single path segment")]
    InvalidChapterId(String, String),
}

/// Everything the build knows about the source tree.
#[derive(Debug)]
pub struct Manifest {
    pub root: PathBuf,
    pub site: SiteConfig,
    pub authors: Authors,
    pub stories: Vec<Story>,
}

/// A story discovered under `content/`.
#[derive(Debug, Clone)]
pub struct Story {
    /// Directory name; unique, used in every URL of the story.
    pub slug: String,
    pub dir: PathBuf,
    pub chapters_dir: PathBuf,
    /// Display title: config title, or the slug with dashes as spaces.
    pub title: String,
    pub config: StoryConfig,
    pub primary_language: String,
    /// Primary language plus translation directories, sorted.
    pub languages: Vec<String>,
    pub arcs: Vec<Arc>,
    /// Cover art source file, if configured and present.
    pub cover_art: Option<PathBuf>,
}

impl Story {
    /// Every chapter in reading order, across arcs.
    pub fn chapters(&self) -> impl Iterator<Item = (usize, &Chapter)> {
        self.arcs
            .iter()
            .enumerate()
            .flat_map(|(arc_index, arc)| arc.chapters.iter().map(move |c| (arc_index, c)))
    }

    pub fn chapter_count(&self) -> usize {
        self.arcs.iter().map(|a| a.chapters.len()).sum()
    }
}

/// A named, ordered group of chapters.
#[derive(Debug, Clone)]
pub struct Arc {
    pub title: String,
    pub slug: String,
    pub cover_art: Option<PathBuf>,
    pub chapters: Vec<Chapter>,
}

/// A declared chapter. The id is stable across languages.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: String,
    /// Title from the story structure; front matter may override it per language.
    pub declared_title: Option<String>,
}

pub fn scan(root: &Path) -> Result<Manifest, ScanError> {
    let site = config::load_site_config(root)?;
    let authors = authors::load_authors(root)?;

    let content_root = root.join(CONTENT_DIR);
    let mut stories = Vec::new();
    if content_root.is_dir() {
        for story_dir in collect_story_dirs(&content_root)? {
            if let Some(story) = scan_story(&story_dir)? {
                stories.push(story);
            }
        }
    } else {
        tracing::warn!(path = %content_root.display(), "content directory not found, site has no stories");
    }

    Ok(Manifest {
        root: root.to_path_buf(),
        site,
        authors,
        stories,
    })
}

fn collect_story_dirs(content_root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(content_root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                && !p
                    .file_name()
                    .map(|n| n.to_string_lossy().starts_with('.'))
                    .unwrap_or(true)
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Scan one story directory. Returns `Ok(None)` for a story skipped because its
/// config is malformed.
fn scan_story(dir: &Path) -> Result<Option<Story>, ScanError> {
    let slug = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let config = match config::load_story_config(dir) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(story = %slug, error = %err, "malformed story config, skipping story");
            return Ok(None);
        }
    };

    let chapters_dir = dir.join(CHAPTERS_DIR);
    let primary_language = config
        .primary_language
        .clone()
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    let languages = language::available_languages(&chapters_dir, &primary_language);
    let title = config
        .title
        .clone()
        .unwrap_or_else(|| slug.replace('-', " "));

    let arcs = if config.arcs.is_empty() {
        vec![implicit_arc(&title, &chapters_dir)?]
    } else {
        config
            .arcs
            .iter()
            .map(|arc| Arc {
                title: arc.title.clone(),
                slug: naming::slugify(&arc.title),
                cover_art: existing_file(dir, arc.cover_art.as_deref(), &slug),
                chapters: arc
                    .chapters
                    .iter()
                    .map(|c| Chapter {
                        id: c.id.trim().to_string(),
                        declared_title: c.title.clone(),
                    })
                    .collect(),
            })
            .collect()
    };

    validate_chapter_ids(&slug, &arcs)?;

    Ok(Some(Story {
        cover_art: existing_file(dir, config.cover_art.as_deref(), &slug),
        slug,
        dir: dir.to_path_buf(),
        chapters_dir,
        title,
        config,
        primary_language,
        languages,
        arcs,
    }))
}

/// One arc holding every primary chapter file, by file name.
fn implicit_arc(title: &str, chapters_dir: &Path) -> Result<Arc, ScanError> {
    let mut ids: Vec<String> = if chapters_dir.is_dir() {
        fs::read_dir(chapters_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .map(|e| e.eq_ignore_ascii_case(CHAPTER_EXTENSION))
                        .unwrap_or(false)
            })
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
            .collect()
    } else {
        Vec::new()
    };
    ids.sort();

    Ok(Arc {
        title: title.to_string(),
        slug: naming::slugify(title),
        cover_art: None,
        chapters: ids
            .into_iter()
            .map(|id| Chapter {
                id,
                declared_title: None,
            })
            .collect(),
    })
}

fn validate_chapter_ids(story: &str, arcs: &[Arc]) -> Result<(), ScanError> {
    let mut seen = HashSet::new();
    for chapter in arcs.iter().flat_map(|a| &a.chapters) {
        let id = chapter.id.as_str();
        if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
            return Err(ScanError::InvalidChapterId(id.to_string(), story.to_string()));
        }
        if !seen.insert(id) {
            return Err(ScanError::DuplicateChapter(id.to_string(), story.to_string()));
        }
    }
    Ok(())
}

/// Resolve a configured file path against the story directory, keeping it
/// only if the file exists.
fn existing_file(story_dir: &Path, rel: Option<&str>, story: &str) -> Option<PathBuf> {
    let rel = rel.map(str::trim).filter(|r| !r.is_empty())?;
    let path = story_dir.join(rel.trim_start_matches('/'));
    if path.is_file() {
        Some(path)
    } else {
        tracing::warn!(story, path = %path.display(), "cover art not found, ignoring");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    #[test]
    fn scan_finds_stories_sorted_by_slug() {
        let site = SiteFixture::new();
        site.story("zeta").chapter("one", "x");
        site.story("alpha").chapter("one", "x");
        let manifest = site.scan();
        let slugs: Vec<&str> = manifest.stories.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, vec!["alpha", "zeta"]);
    }

    #[test]
    fn declared_order_is_preserved() {
        let site = SiteFixture::new();
        site.story("novel").config(
            r#"
title: Novel
arcs:
  - title: Second Arc First
    chapters:
      - id: c-9
      - id: c-1
  - title: Then This
    chapters:
      - id: c-5
"#,
        );
        let manifest = site.scan();
        let story = &manifest.stories[0];
        assert_eq!(story.title, "Novel");
        let ids: Vec<&str> = story.chapters().map(|(_, c)| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c-9", "c-1", "c-5"]);
        assert_eq!(story.arcs[1].slug, "then-this");
    }

    #[test]
    fn implicit_arc_lists_chapter_files() {
        let site = SiteFixture::new();
        site.story("my-novel")
            .chapter("b-second", "x")
            .chapter("a-first", "x")
            .translation("fr", "a-first", "x");
        let manifest = site.scan();
        let story = &manifest.stories[0];
        assert_eq!(story.title, "my novel");
        assert_eq!(story.arcs.len(), 1);
        let ids: Vec<&str> = story.chapters().map(|(_, c)| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a-first", "b-second"]);
        assert_eq!(story.languages, vec!["en", "fr"]);
    }

    #[test]
    fn primary_language_from_config() {
        let site = SiteFixture::new();
        site.story("novel")
            .config("primary_language: ja\n")
            .chapter("one", "x")
            .translation("en", "one", "x");
        let story = site.scan_story("novel");
        assert_eq!(story.primary_language, "ja");
        assert_eq!(story.languages, vec!["en", "ja"]);
    }

    #[test]
    fn duplicate_chapter_id_is_error() {
        let site = SiteFixture::new();
        site.story("novel").config(
            "arcs:\n  - title: A\n    chapters:\n      - id: one\n  - title: B\n    chapters:\n      - id: one\n",
        );
        let result = scan(site.root());
        assert!(matches!(result, Err(ScanError::DuplicateChapter(id, _)) if id == "one"));
    }

    #[test]
    fn path_like_chapter_id_is_error() {
        let site = SiteFixture::new();
        site.story("novel")
            .config("arcs:\n  - title: A\n    chapters:\n      - id: ../escape\n");
        let result = scan(site.root());
        assert!(matches!(result, Err(ScanError::InvalidChapterId(_, _))));
    }

    #[test]
    fn malformed_story_config_skips_story() {
        let site = SiteFixture::new();
        site.story("broken").config("arcs: {{{");
        site.story("fine").chapter("one", "x");
        let manifest = site.scan();
        let slugs: Vec<&str> = manifest.stories.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, vec!["fine"]);
    }

    #[test]
    fn missing_content_dir_is_empty_site() {
        let site = SiteFixture::new();
        let manifest = site.scan();
        assert!(manifest.stories.is_empty());
        assert_eq!(manifest.site.site_name, "Web Novels");
    }

    #[test]
    fn cover_art_resolved_when_present() {
        let site = SiteFixture::new();
        site.story("novel")
            .config(
                "cover_art: cover.png\narcs:\n  - title: A\n    cover_art: missing.png\n    chapters:\n      - id: one\n",
            )
            .file("cover.png", b"png bytes");
        let story = site.scan_story("novel");
        assert!(story.cover_art.as_ref().unwrap().ends_with("cover.png"));
        assert!(story.arcs[0].cover_art.is_none());
    }
}
