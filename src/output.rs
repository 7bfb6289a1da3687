//! CLI output formatting for scan, check and build.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Every entity (story,
//! arc, chapter) leads with its positional index and title; filesystem paths
//! and states are indented context lines underneath.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Stories
//! 001 Novel (3 chapters; en, fr)
//!     Source: content/novel/
//!     A tale of lighthouses.
//!     Arc One
//!         001 chapter-1 (The Prophecy)
//!         002 chapter-2
//!
//! Config
//!     site_config.yaml
//!     authors.yaml (2 profiles)
//!     static/
//! ```
//!
//! ## Check
//!
//! ```text
//! Novel
//!     en: 1 listed, 2 skipped
//!         001 chapter-1 The Prophecy
//!         002 chapter-2 The Storm [hidden]
//!     fr: 1 listed, 2 skipped
//!         001 chapter-1 La Prophétie
//!         002 chapter-2 The Storm [hidden]
//! ```
//!
//! ## Build
//!
//! ```text
//! Novel
//!     en: 4 pages (1 listed, 3 skipped, 1 protected), 1 tag
//!     fr: 4 pages (1 listed, 3 skipped, 1 protected, 3 untranslated), 1 tag
//! E-books
//!     novel.epub
//!     novel_fr.epub
//!
//! Generated 8 chapter pages, 1 author page, 2 e-books; sitemap 6 URLs, feed 1 item
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::authors::AUTHORS_FILE;
use crate::cache::ChapterCache;
use crate::config::SITE_CONFIG_FILE;
use crate::generate::{BuildSummary, USER_STATIC_DIR};
use crate::scan::Manifest;
use crate::visibility::ChapterState;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max).collect::<String>())
    }
}

// ============================================================================
// Scan output
// ============================================================================

/// Format the discovered site structure.
pub fn format_scan_output(manifest: &Manifest, source_root: &Path) -> Vec<String> {
    let mut lines = vec!["Stories".to_string()];

    if manifest.stories.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for (i, story) in manifest.stories.iter().enumerate() {
        lines.push(format!(
            "{} {} ({}; {})",
            format_index(i + 1),
            story.title,
            plural(story.chapter_count(), "chapter", "chapters"),
            story.languages.join(", ")
        ));
        let source = story.dir.strip_prefix(source_root).unwrap_or(&story.dir);
        lines.push(format!("{}Source: {}/", indent(1), source.display()));
        if let Some(description) = &story.config.description {
            let truncated = truncate_desc(description.trim(), 60);
            if !truncated.is_empty() {
                lines.push(format!("{}{}", indent(1), truncated));
            }
        }
        for arc in &story.arcs {
            lines.push(format!("{}{}", indent(1), arc.title));
            for (pos, chapter) in arc.chapters.iter().enumerate() {
                let title = match &chapter.declared_title {
                    Some(title) => format!(" ({title})"),
                    None => String::new(),
                };
                lines.push(format!(
                    "{}{} {}{}",
                    indent(2),
                    format_index(pos + 1),
                    chapter.id,
                    title
                ));
            }
        }
    }

    lines.push(String::new());
    lines.push("Config".to_string());
    if source_root.join(SITE_CONFIG_FILE).exists() {
        lines.push(format!("{}{SITE_CONFIG_FILE}", indent(1)));
    }
    if !manifest.authors.is_empty() {
        lines.push(format!(
            "{}{AUTHORS_FILE} ({})",
            indent(1),
            plural(manifest.authors.profiles.len(), "profile", "profiles")
        ));
    }
    if source_root.join(USER_STATIC_DIR).is_dir() {
        lines.push(format!("{}{USER_STATIC_DIR}/", indent(1)));
    }

    lines
}

/// Print scan output to stdout.
pub fn print_scan_output(manifest: &Manifest, source_root: &Path) {
    for line in format_scan_output(manifest, source_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format the state of every chapter in every language.
pub fn format_check_output(manifest: &Manifest, cache: &ChapterCache) -> Vec<String> {
    let mut lines = Vec::new();
    for story in &manifest.stories {
        lines.push(story.title.clone());
        for edition in cache.editions(&story.slug) {
            let listed = edition.listed().count();
            lines.push(format!(
                "{}{}: {} listed, {} skipped",
                indent(1),
                edition.lang,
                listed,
                edition.chapters.len() - listed
            ));
            for (pos, entry) in edition.chapters.iter().enumerate() {
                let state = match entry.visibility.state {
                    ChapterState::Visible => String::new(),
                    other => format!(" [{}]", other.label()),
                };
                lines.push(format!(
                    "{}{} {} {}{}",
                    indent(2),
                    format_index(pos + 1),
                    entry.id,
                    entry.title,
                    state
                ));
            }
        }
    }
    lines
}

pub fn print_check_output(manifest: &Manifest, cache: &ChapterCache) {
    for line in format_check_output(manifest, cache) {
        println!("{}", line);
    }
}

// ============================================================================
// Build output
// ============================================================================

/// Format what a build wrote.
pub fn format_build_output(summary: &BuildSummary) -> Vec<String> {
    let mut lines = Vec::new();
    let mut chapter_pages = 0;

    for story in &summary.stories {
        lines.push(story.title.clone());
        for edition in &story.editions {
            chapter_pages += edition.listed + edition.skipped;
            let mut detail = vec![
                format!("{} listed", edition.listed),
                format!("{} skipped", edition.skipped),
            ];
            if edition.protected > 0 {
                detail.push(format!("{} protected", edition.protected));
            }
            if edition.translation_missing > 0 {
                detail.push(format!("{} untranslated", edition.translation_missing));
            }
            lines.push(format!(
                "{}{}: {} ({}), {}",
                indent(1),
                edition.lang,
                plural(edition.pages, "page", "pages"),
                detail.join(", "),
                plural(edition.tags, "tag", "tags")
            ));
        }
    }

    if !summary.epub.written.is_empty() || !summary.epub.failed.is_empty() {
        lines.push("E-books".to_string());
        for plan in &summary.epub.written {
            lines.push(format!("{}{}", indent(1), plan.file_name));
        }
        for (plan, err) in &summary.epub.failed {
            lines.push(format!("{}{} FAILED: {}", indent(1), plan.file_name, err));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Generated {}, {}, {}; sitemap {}, feed {}",
        plural(chapter_pages, "chapter page", "chapter pages"),
        plural(summary.author_pages, "author page", "author pages"),
        plural(summary.epub.written.len(), "e-book", "e-books"),
        plural(summary.sitemap_entries, "URL", "URLs"),
        plural(summary.site_feed_items, "item", "items"),
    ));
    lines
}

pub fn print_build_output(summary: &BuildSummary) {
    for line in format_build_output(summary) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::{BundlePlan, EpubSummary};
    use crate::generate::{EditionSummary, StorySummary};
    use crate::test_helpers::*;
    use crate::visibility::BuildOptions;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn truncate_desc_short() {
        assert_eq!(truncate_desc("Short text", 40), "Short text");
    }

    #[test]
    fn truncate_desc_long() {
        let text = "a".repeat(50);
        let expected = format!("{}...", "a".repeat(40));
        assert_eq!(truncate_desc(&text, 40), expected);
    }

    #[test]
    fn truncate_desc_counts_chars_not_bytes() {
        assert_eq!(truncate_desc("ééééé", 3), "ééé...");
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "tag", "tags"), "1 tag");
        assert_eq!(plural(0, "tag", "tags"), "0 tags");
    }

    // =========================================================================
    // Scan / check
    // =========================================================================

    fn site() -> SiteFixture {
        let site = SiteFixture::new();
        site.site_config("site_name: Tales\n");
        site.authors("jane:\n  name: Jane\n");
        site.story("novel")
            .config(
                "title: Novel\ndescription: A tale.\narcs:\n  - title: Arc One\n    chapters:\n      - id: chapter-1\n        title: The Prophecy\n      - id: chapter-2\n",
            )
            .chapter("chapter-1", "Text")
            .chapter("chapter-2", "---\nhidden: true\n---\n")
            .translation("fr", "chapter-1", "---\ntitle: La Prophétie\n---\n");
        site
    }

    #[test]
    fn scan_output_lists_stories_and_config() {
        let site = site();
        let lines = format_scan_output(&site.scan(), site.root());
        assert_eq!(lines[0], "Stories");
        assert_eq!(lines[1], "001 Novel (2 chapters; en, fr)");
        assert_eq!(lines[2], "    Source: content/novel/");
        assert_eq!(lines[3], "    A tale.");
        assert_eq!(lines[4], "    Arc One");
        assert_eq!(lines[5], "        001 chapter-1 (The Prophecy)");
        assert_eq!(lines[6], "        002 chapter-2");
        assert!(lines.contains(&"    site_config.yaml".to_string()));
        assert!(lines.contains(&"    authors.yaml (1 profile)".to_string()));
    }

    #[test]
    fn scan_output_empty_site() {
        let site = SiteFixture::new();
        let lines = format_scan_output(&site.scan(), site.root());
        assert_eq!(lines[1], "    (none)");
    }

    #[test]
    fn check_output_shows_states() {
        let site = site();
        let manifest = site.scan();
        let cache = ChapterCache::build(&manifest, BuildOptions::default()).unwrap();
        let lines = format_check_output(&manifest, &cache);
        assert_eq!(
            lines,
            vec![
                "Novel",
                "    en: 1 listed, 1 skipped",
                "        001 chapter-1 The Prophecy",
                "        002 chapter-2 chapter-2 [hidden]",
                "    fr: 1 listed, 1 skipped",
                "        001 chapter-1 La Prophétie",
                "        002 chapter-2 chapter-2 [hidden]",
            ]
        );
    }

    // =========================================================================
    // Build
    // =========================================================================

    #[test]
    fn build_output_summarizes() {
        let summary = BuildSummary {
            stories: vec![StorySummary {
                slug: "novel".into(),
                title: "Novel".into(),
                editions: vec![EditionSummary {
                    lang: "en".into(),
                    pages: 4,
                    listed: 1,
                    skipped: 2,
                    protected: 1,
                    translation_missing: 0,
                    tags: 1,
                }],
            }],
            author_pages: 1,
            sitemap_entries: 6,
            site_feed_items: 1,
            epub: EpubSummary {
                written: vec![BundlePlan {
                    story: "novel".into(),
                    lang: "en".into(),
                    arc: None,
                    file_name: "novel.epub".into(),
                    title: "Novel".into(),
                }],
                failed: vec![],
            },
        };
        let lines = format_build_output(&summary);
        assert_eq!(lines[0], "Novel");
        assert_eq!(lines[1], "    en: 4 pages (1 listed, 2 skipped, 1 protected), 1 tag");
        assert_eq!(lines[2], "E-books");
        assert_eq!(lines[3], "    novel.epub");
        assert_eq!(
            lines.last().unwrap(),
            "Generated 3 chapter pages, 1 author page, 1 e-book; sitemap 6 URLs, feed 1 item"
        );
    }
}
