//! Derived artifacts, planned from the chapter cache.
//!
//! Every function here reads [`LanguageEdition`]s and applies the same
//! [`ChapterEntry::skip`] predicate, so the table of contents, navigation,
//! sitemap, robots rules and feeds always agree on what is published. The
//! outputs are plain records; [`crate::feeds`] and [`crate::html`] turn them
//! into text.
//!
//! ## URLs
//!
//! ```text
//! /{story}/{lang}/toc/            table of contents
//! /{story}/{lang}/{chapter-id}/   chapter page
//! /{story}/{lang}/tags/           tag index
//! /{story}/{lang}/tags/{slug}/    tag page
//! /{story}/rss.xml                story feed
//! ```

use crate::cache::{ChapterCache, ChapterEntry, LanguageEdition};
use crate::resolve;
use crate::scan::{Manifest, Story};
use crate::tags;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Items kept in the site-wide feed.
pub const SITE_FEED_LIMIT: usize = 50;

/// Items kept in a story feed.
pub const STORY_FEED_LIMIT: usize = 20;

// ============================================================================
// URL paths
// ============================================================================

pub fn toc_path(story: &str, lang: &str) -> String {
    format!("/{story}/{lang}/toc/")
}

pub fn chapter_path(story: &str, lang: &str, chapter_id: &str) -> String {
    format!("/{story}/{lang}/{chapter_id}/")
}

pub fn tags_path(story: &str, lang: &str) -> String {
    format!("/{story}/{lang}/tags/")
}

pub fn tag_path(story: &str, lang: &str, slug: &str) -> String {
    format!("/{story}/{lang}/tags/{slug}/")
}

pub fn story_feed_path(story: &str) -> String {
    format!("/{story}/rss.xml")
}

/// Parse a front matter `published` value. Anything but `YYYY-MM-DD` is `None`.
pub fn parse_published(value: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value?.trim(), "%Y-%m-%d").ok()
}

// ============================================================================
// Table of contents and navigation
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TocArc {
    pub index: usize,
    pub title: String,
    pub slug: String,
    pub chapters: Vec<TocEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub id: String,
    pub title: String,
    pub published: Option<NaiveDate>,
    pub translation_missing: bool,
}

/// Arcs with at least one listed chapter, listing only those chapters.
pub fn toc(story: &Story, edition: &LanguageEdition) -> Vec<TocArc> {
    story
        .arcs
        .iter()
        .enumerate()
        .filter_map(|(index, arc)| {
            let chapters: Vec<TocEntry> = edition
                .listed()
                .filter(|c| c.arc_index == index)
                .map(|c| TocEntry {
                    id: c.id.clone(),
                    title: c.title.clone(),
                    published: parse_published(c.published()),
                    translation_missing: c.visibility.translation_missing,
                })
                .collect();
            (!chapters.is_empty()).then(|| TocArc {
                index,
                title: arc.title.clone(),
                slug: arc.slug.clone(),
                chapters,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavLink {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Navigation {
    pub prev: Option<NavLink>,
    pub next: Option<NavLink>,
}

/// Previous and next listed chapters around `chapter_id`.
///
/// `None` for a skipped chapter. An id the edition doesn't know is treated as
/// listed and gets an empty navigation.
pub fn navigation(edition: &LanguageEdition, chapter_id: &str) -> Option<Navigation> {
    match edition.entry(chapter_id) {
        Some(entry) if entry.skip() => return None,
        Some(_) => {}
        None => {
            tracing::warn!(story = %edition.story, chapter = chapter_id, "navigation lookup failed, keeping chapter");
            return Some(Navigation::default());
        }
    }

    let listed: Vec<&ChapterEntry> = edition.listed().collect();
    let pos = listed.iter().position(|c| c.id == chapter_id)?;
    let link = |c: &ChapterEntry| NavLink {
        id: c.id.clone(),
        title: c.title.clone(),
    };
    Some(Navigation {
        prev: pos.checked_sub(1).map(|i| link(listed[i])),
        next: listed.get(pos + 1).map(|c| link(*c)),
    })
}

// ============================================================================
// Sitemap and robots
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    /// Absolute URL (site-relative when no base URL is configured).
    pub loc: String,
    pub lastmod: Option<NaiveDate>,
}

/// Whether a story's own pages may be indexed. A story can't re-enable
/// indexing under a non-indexed site.
pub fn story_indexable(manifest: &Manifest, story: &Story) -> bool {
    manifest.site.indexing_allowed()
        && resolve::resolve_story(&manifest.site, &story.config, &story.title).allow_indexing
}

/// Effective indexing flag of a chapter page. The chapter's own
/// `seo.allow_indexing` can narrow a story or site, never widen it.
pub fn chapter_allows_indexing(manifest: &Manifest, story: &Story, entry: &ChapterEntry) -> bool {
    entry.settings.allow_indexing && story_indexable(manifest, story)
}

/// Whether a chapter belongs in the sitemap and feeds, and outside the
/// robots disallow list.
pub fn chapter_indexable(manifest: &Manifest, story: &Story, entry: &ChapterEntry) -> bool {
    !entry.skip() && chapter_allows_indexing(manifest, story, entry)
}

/// Every indexable URL: home, per-edition TOC and tag pages, listed and
/// indexable chapters, and any extra site paths (author pages).
pub fn sitemap(manifest: &Manifest, cache: &ChapterCache, extra_paths: &[String]) -> Vec<SitemapEntry> {
    let site = &manifest.site;
    let entry = |path: &str, lastmod| SitemapEntry {
        loc: site.absolute_url(path),
        lastmod,
    };

    if !site.indexing_allowed() {
        return Vec::new();
    }

    let mut entries = vec![entry("/", None)];
    for story in &manifest.stories {
        if !story_indexable(manifest, story) {
            continue;
        }
        for edition in cache.editions(&story.slug) {
            if edition.has_listed() {
                entries.push(entry(&toc_path(&story.slug, &edition.lang), None));
                let tags = tags::index(edition);
                if !tags.is_empty() {
                    entries.push(entry(&tags_path(&story.slug, &edition.lang), None));
                    for tag in &tags {
                        entries.push(entry(&tag_path(&story.slug, &edition.lang, &tag.slug), None));
                    }
                }
            }
            for chapter in edition.chapters.iter().filter(|c| chapter_indexable(manifest, story, c)) {
                entries.push(entry(
                    &chapter_path(&story.slug, &edition.lang, &chapter.id),
                    parse_published(chapter.published()),
                ));
            }
        }
    }
    entries.extend(extra_paths.iter().map(|p| entry(p.as_str(), None)));
    entries
}

#[derive(Debug, Clone, PartialEq)]
pub struct RobotsPlan {
    pub disallow_all: bool,
    /// Site-relative path prefixes, sorted.
    pub disallow: Vec<String>,
    pub sitemap: Option<String>,
}

/// Disallow non-indexed stories, and every chapter page that is skipped or
/// non-indexed, in every language.
pub fn robots(manifest: &Manifest, cache: &ChapterCache) -> RobotsPlan {
    let site = &manifest.site;
    let sitemap = (!site.site_url.trim().is_empty()).then(|| site.absolute_url("/sitemap.xml"));
    if !site.indexing_allowed() {
        return RobotsPlan {
            disallow_all: true,
            disallow: Vec::new(),
            sitemap,
        };
    }

    let mut disallow = BTreeSet::new();
    for story in &manifest.stories {
        if !story_indexable(manifest, story) {
            disallow.insert(format!("/{}/", story.slug));
            continue;
        }
        for edition in cache.editions(&story.slug) {
            for chapter in &edition.chapters {
                if !chapter_indexable(manifest, story, chapter) {
                    disallow.insert(chapter_path(&story.slug, &edition.lang, &chapter.id));
                }
            }
        }
    }

    RobotsPlan {
        disallow_all: false,
        disallow: disallow.into_iter().collect(),
        sitemap,
    }
}

// ============================================================================
// Feeds
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    /// Absolute chapter URL; doubles as the item guid.
    pub link: String,
    pub description: Option<String>,
    pub published: NaiveDate,
    pub story: String,
    pub lang: String,
}

/// Feed items of one story, newest first, at most `limit`.
pub fn story_feed(manifest: &Manifest, cache: &ChapterCache, story: &Story, limit: usize) -> Vec<FeedItem> {
    let mut items = feed_candidates(manifest, cache, story);
    sort_and_truncate(&mut items, limit);
    items
}

/// Feed items of the whole site, newest first, at most `limit`.
pub fn site_feed(manifest: &Manifest, cache: &ChapterCache, limit: usize) -> Vec<FeedItem> {
    let mut items: Vec<FeedItem> = manifest
        .stories
        .iter()
        .flat_map(|story| feed_candidates(manifest, cache, story))
        .collect();
    sort_and_truncate(&mut items, limit);
    items
}

/// Listed, indexable, dated chapters in their own language.
fn feed_candidates(manifest: &Manifest, cache: &ChapterCache, story: &Story) -> Vec<FeedItem> {
    cache
        .editions(&story.slug)
        .iter()
        .flat_map(|edition| {
            edition
                .listed()
                .filter(|c| chapter_indexable(manifest, story, c) && !c.visibility.translation_missing)
                .filter_map(|c| {
                    let published = parse_published(c.published())?;
                    Some(FeedItem {
                        title: format!("{} - {}", story.title, c.title),
                        link: manifest
                            .site
                            .absolute_url(&chapter_path(&story.slug, &edition.lang, &c.id)),
                        description: c.settings.meta_description.clone(),
                        published,
                        story: story.slug.clone(),
                        lang: edition.lang.clone(),
                    })
                })
        })
        .collect()
}

fn sort_and_truncate(items: &mut Vec<FeedItem>, limit: usize) {
    items.sort_by(|a, b| b.published.cmp(&a.published));
    items.truncate(limit);
}
