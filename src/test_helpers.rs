//! Shared test utilities for the quire test suite.
//!
//! Provides a throwaway source tree builder plus lookup helpers that work with
//! scan-phase data structures (`Manifest`, `Story`, `Arc`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = SiteFixture::new();
//! site.story("novel")
//!     .chapter("chapter-1", "---\ntitle: One\n---\nBody")
//!     .translation("fr", "chapter-1", "Corps");
//!
//! let story = site.scan_story("novel");
//! assert_eq!(chapter_ids(&story), vec!["chapter-1"]);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::{SITE_CONFIG_FILE, STORY_CONFIG_FILE};
use crate::scan::{self, CHAPTERS_DIR, CONTENT_DIR, Manifest, Story};

// =========================================================================
// Fixture setup
// =========================================================================

/// A source tree in a temp directory, removed on drop.
pub struct SiteFixture {
    tmp: TempDir,
}

impl SiteFixture {
    pub fn new() -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn site_config(&self, yaml: &str) -> &Self {
        fs::write(self.root().join(SITE_CONFIG_FILE), yaml).unwrap();
        self
    }

    pub fn authors(&self, yaml: &str) -> &Self {
        fs::write(self.root().join(crate::authors::AUTHORS_FILE), yaml).unwrap();
        self
    }

    /// Write an arbitrary file under the source root.
    pub fn file(&self, rel: &str, contents: &[u8]) -> &Self {
        write_file(&self.root().join(rel), contents);
        self
    }

    /// Builder for `content/<slug>/`. Creates the directory immediately.
    pub fn story(&self, slug: &str) -> StoryFixture {
        let dir = self.root().join(CONTENT_DIR).join(slug);
        fs::create_dir_all(dir.join(CHAPTERS_DIR)).unwrap();
        StoryFixture { dir }
    }

    pub fn scan(&self) -> Manifest {
        scan::scan(self.root()).unwrap()
    }

    /// Scan the site and return one story. Panics if not found.
    pub fn scan_story(&self, slug: &str) -> Story {
        let manifest = self.scan();
        find_story(&manifest, slug).clone()
    }
}

/// Writes files into one story directory.
pub struct StoryFixture {
    dir: PathBuf,
}

impl StoryFixture {
    pub fn config(&self, yaml: &str) -> &Self {
        fs::write(self.dir.join(STORY_CONFIG_FILE), yaml).unwrap();
        self
    }

    /// Primary-language chapter file.
    pub fn chapter(&self, id: &str, text: &str) -> &Self {
        write_file(
            &self.dir.join(CHAPTERS_DIR).join(format!("{id}.md")),
            text.as_bytes(),
        );
        self
    }

    pub fn translation(&self, lang: &str, id: &str, text: &str) -> &Self {
        write_file(
            &self.dir.join(CHAPTERS_DIR).join(lang).join(format!("{id}.md")),
            text.as_bytes(),
        );
        self
    }

    /// Arbitrary file relative to the story directory.
    pub fn file(&self, rel: &str, contents: &[u8]) -> &Self {
        write_file(&self.dir.join(rel), contents);
        self
    }
}

fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

// =========================================================================
// Manifest lookups (panic with the available names on miss)
// =========================================================================

/// Find a story by slug. Panics if not found.
pub fn find_story<'a>(manifest: &'a Manifest, slug: &str) -> &'a Story {
    manifest
        .stories
        .iter()
        .find(|s| s.slug == slug)
        .unwrap_or_else(|| {
            let slugs: Vec<&str> = manifest.stories.iter().map(|s| s.slug.as_str()).collect();
            panic!("story '{slug}' not found. Available: {slugs:?}")
        })
}

// =========================================================================
// Bulk extractors
// =========================================================================

/// All chapter ids of a story in reading order.
pub fn chapter_ids(story: &Story) -> Vec<&str> {
    story.chapters().map(|(_, c)| c.id.as_str()).collect()
}

/// Read a file under a build output directory. Panics with the path on miss.
pub fn read_output(output: &Path, rel: &str) -> String {
    let path = output.join(rel);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read output file {}: {e}", path.display()))
}
