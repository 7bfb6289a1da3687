//! Site generation.
//!
//! Takes the scanned [`Manifest`] and writes the complete static site. The
//! output directory is deleted and recreated on every run.
//!
//! ## Passes
//!
//! 1. **Pages**: cover art is placed first (sequentially, it is shared across
//!    stories). Then every story is rendered in parallel: chapter pages in every
//!    language, tables of contents, tag pages and the story feed. Once all
//!    stories are done: home page, site feed, sitemap, robots rules and author
//!    pages.
//! 2. **E-books**: bundles are built from the pages written in pass 1, then
//!    every table of contents is patched with its download links.
//!
//! ## Output Structure
//!
//! ```text
//! build/
//! ├── index.html
//! ├── rss.xml
//! ├── sitemap.xml
//! ├── robots.txt
//! ├── authors/{username}/index.html
//! ├── static/
//! │   ├── style.css, theme-toggle.js, unlock.js
//! │   ├── images/{hash}-{name}          # cover art
//! │   └── epub/{story}[-{arc}][_{lang}].epub
//! └── {story}/
//!     ├── rss.xml
//!     ├── images/{chapter-id}/...       # chapter images
//!     └── {lang}/
//!         ├── toc/index.html
//!         ├── tags/index.html
//!         ├── tags/{slug}/index.html
//!         └── {chapter-id}/index.html
//! ```
//!
//! ## CSS and JavaScript
//!
//! Static assets are embedded at compile time and written to `/static/`. A
//! `static/` directory in the source root is copied over them, so a site can
//! replace the stylesheet.

use crate::authors::{self, Role};
use crate::cache::{ChapterCache, ChapterEntry, LanguageEdition};
use crate::epub::{self, EpubSummary};
use crate::feeds::{self, Channel};
use crate::html::{self, ChapterView, Credit, LanguageLink, PageMeta, Protection, StoryCard, TagLink, TagsView, TocView};
use crate::images::{self, ChapterImages};
use crate::language::LanguageError;
use crate::naming;
use crate::planner::{self, SITE_FEED_LIMIT, STORY_FEED_LIMIT};
use crate::resolve::{self, PageSettings};
use crate::scan::{Manifest, Story};
use crate::tags::{self, Tag};
use crate::visibility::BuildOptions;
use maud::Markup;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("chapter error: {0}")]
    Language(#[from] LanguageError),
    #[error("static asset error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("refusing to delete {0}: it contains the source directory")]
    UnsafeOutput(PathBuf),
}

const CSS: &str = include_str!("../static/style.css");
const THEME_JS: &str = include_str!("../static/theme-toggle.js");
const UNLOCK_JS: &str = include_str!("../static/unlock.js");

/// Directory in the source root copied into `/static/`.
pub const USER_STATIC_DIR: &str = "static";

/// Counts for one story edition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditionSummary {
    pub lang: String,
    pub pages: usize,
    pub listed: usize,
    pub skipped: usize,
    pub protected: usize,
    pub translation_missing: usize,
    pub tags: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorySummary {
    pub slug: String,
    pub title: String,
    pub editions: Vec<EditionSummary>,
}

#[derive(Debug, Default)]
pub struct BuildSummary {
    pub stories: Vec<StorySummary>,
    pub author_pages: usize,
    pub sitemap_entries: usize,
    pub site_feed_items: usize,
    pub epub: EpubSummary,
}

/// Build the whole site into `output_dir`.
pub fn generate(manifest: &Manifest, output_dir: &Path, opts: BuildOptions) -> Result<BuildSummary, GenerateError> {
    prepare_output(&manifest.root, output_dir)?;

    let cache = ChapterCache::build(manifest, opts)?;
    write_static_assets(&manifest.root, output_dir)?;
    let covers = place_covers(manifest, output_dir)?;

    // Pass 1: pages
    let ctx = Context {
        manifest,
        cache: &cache,
        output: output_dir,
        covers: &covers,
    };
    let stories = manifest
        .stories
        .par_iter()
        .map(|story| render_story(&ctx, story))
        .collect::<Result<Vec<_>, GenerateError>>()?;

    write_index(&ctx)?;
    let site_feed_items = write_site_feed(&ctx)?;
    let author_paths = write_author_pages(&ctx)?;
    let sitemap_entries = write_sitemap_and_robots(&ctx, &author_paths)?;
    tracing::info!(stories = stories.len(), "pages written");

    // Pass 2: e-books
    let epub = epub::generate_all(manifest, &cache, output_dir);
    let patched = epub::patch_toc_downloads(manifest, &cache, output_dir)?;
    tracing::debug!(patched, "tables of contents patched");

    Ok(BuildSummary {
        stories,
        author_pages: author_paths.len(),
        sitemap_entries,
        site_feed_items,
        epub,
    })
}

/// Delete and recreate the output directory.
fn prepare_output(source_root: &Path, output_dir: &Path) -> Result<(), GenerateError> {
    if output_dir.exists() {
        let output = output_dir.canonicalize()?;
        let source = source_root.canonicalize()?;
        if source.starts_with(&output) {
            return Err(GenerateError::UnsafeOutput(output_dir.to_path_buf()));
        }
        fs::remove_dir_all(output_dir)?;
    }
    fs::create_dir_all(output_dir)?;
    Ok(())
}

fn write_static_assets(source_root: &Path, output_dir: &Path) -> Result<(), GenerateError> {
    let static_dir = output_dir.join("static");
    fs::create_dir_all(&static_dir)?;
    fs::write(static_dir.join("style.css"), CSS)?;
    fs::write(static_dir.join("theme-toggle.js"), THEME_JS)?;
    fs::write(static_dir.join("unlock.js"), UNLOCK_JS)?;

    let user_static = source_root.join(USER_STATIC_DIR);
    if user_static.is_dir() {
        for entry in WalkDir::new(&user_static).min_depth(1) {
            let entry = entry?;
            let Ok(rel) = entry.path().strip_prefix(&user_static) else {
                continue;
            };
            let dest = static_dir.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)?;
            } else if entry.file_type().is_file() {
                fs::copy(entry.path(), &dest)?;
            }
        }
    }
    Ok(())
}

/// Site URLs of placed cover art.
#[derive(Debug, Default)]
struct Covers {
    stories: HashMap<String, String>,
    arcs: HashMap<(String, usize), String>,
}

fn place_covers(manifest: &Manifest, output_dir: &Path) -> Result<Covers, GenerateError> {
    let mut covers = Covers::default();
    for story in &manifest.stories {
        if let Some(source) = &story.cover_art {
            covers
                .stories
                .insert(story.slug.clone(), images::place_cover(source, output_dir)?);
        }
        for (index, arc) in story.arcs.iter().enumerate() {
            if let Some(source) = &arc.cover_art {
                covers
                    .arcs
                    .insert((story.slug.clone(), index), images::place_cover(source, output_dir)?);
            }
        }
    }
    Ok(covers)
}

struct Context<'a> {
    manifest: &'a Manifest,
    cache: &'a ChapterCache,
    output: &'a Path,
    covers: &'a Covers,
}

impl Context<'_> {
    fn meta(&self, title: String, lang: &str, path: &str, og_type: &'static str, settings: PageSettings, feed: &str) -> PageMeta {
        PageMeta {
            title,
            lang: lang.to_string(),
            canonical: self.manifest.site.absolute_url(path),
            og_type,
            settings,
            feed: Some(feed.to_string()),
        }
    }

    /// Settings of a story-level page (table of contents, tag pages).
    fn story_settings(&self, story: &Story, title: &str) -> PageSettings {
        let mut settings = resolve::resolve_story(&self.manifest.site, &story.config, title);
        settings.allow_indexing = planner::story_indexable(self.manifest, story);
        settings
    }

    fn credit(&self, role: Role, name: &str) -> Credit {
        html::credit(
            role.label(),
            name,
            &self.manifest.authors,
            self.manifest.site.author_pages.enabled,
        )
    }

    fn write_page(&self, path: &str, markup: Markup) -> std::io::Result<()> {
        let dir = self.output.join(path.trim_matches('/'));
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("index.html"), markup.into_string())?;
        tracing::debug!(path, "page written");
        Ok(())
    }
}

// ============================================================================
// Story pages
// ============================================================================

fn render_story(ctx: &Context<'_>, story: &Story) -> Result<StorySummary, GenerateError> {
    let mut images = ChapterImages::new(&ctx.output.join(&story.slug));
    let editions = ctx.cache.editions(&story.slug);
    let mut summaries = Vec::new();

    for edition in editions {
        let tags = tags::index(edition);

        let mut summary = EditionSummary {
            lang: edition.lang.clone(),
            tags: tags.len(),
            ..EditionSummary::default()
        };

        for entry in &edition.chapters {
            let links = language_links(editions, &edition.lang, |lang| {
                planner::chapter_path(&story.slug, lang, &entry.id)
            });
            render_chapter(ctx, story, edition, entry, &tags, links, &mut images)?;
            summary.pages += 1;
            if entry.skip() {
                summary.skipped += 1;
            } else {
                summary.listed += 1;
            }
            if entry.resolved.record.front.password_set() {
                summary.protected += 1;
            }
            if entry.visibility.translation_missing {
                summary.translation_missing += 1;
            }
        }

        let links = language_links(editions, &edition.lang, |lang| planner::toc_path(&story.slug, lang));
        render_toc(ctx, story, edition, !tags.is_empty(), links)?;
        summary.pages += 1;

        if !tags.is_empty() {
            let links = language_links(editions, &edition.lang, |lang| planner::tags_path(&story.slug, lang));
            summary.pages += render_tag_pages(ctx, story, edition, &tags, links)?;
        }
        tracing::debug!(story = %story.slug, lang = %edition.lang, pages = summary.pages, "edition rendered");
        summaries.push(summary);
    }

    write_story_feed(ctx, story)?;
    tracing::info!(story = %story.slug, languages = summaries.len(), "story rendered");
    Ok(StorySummary {
        slug: story.slug.clone(),
        title: story.title.clone(),
        editions: summaries,
    })
}

/// The same page in every language of the story.
fn language_links(editions: &[LanguageEdition], current: &str, path: impl Fn(&str) -> String) -> Vec<LanguageLink> {
    editions
        .iter()
        .map(|e| LanguageLink {
            lang: e.lang.clone(),
            href: path(&e.lang),
            current: e.lang == current,
        })
        .collect()
}

fn render_chapter(
    ctx: &Context<'_>,
    story: &Story,
    edition: &LanguageEdition,
    entry: &ChapterEntry,
    tags: &[Tag],
    languages: Vec<LanguageLink>,
    images: &mut ChapterImages,
) -> Result<(), GenerateError> {
    let site = &ctx.manifest.site;
    let record = &entry.resolved.record;
    let front = &record.front;

    let body = images.place(&entry.id, &record.body, record.source_dir())?;
    let path = planner::chapter_path(&story.slug, &edition.lang, &entry.id);
    let url = site.absolute_url(&path);

    let chapter_tags = front
        .tags
        .iter()
        .filter_map(|name| {
            let slug = naming::slugify(name);
            tags.iter()
                .find(|t| t.slug == slug && t.chapters.iter().any(|c| c.id == entry.id))
                .map(|t| TagLink {
                    name: t.name.clone(),
                    href: planner::tag_path(&story.slug, &edition.lang, &t.slug),
                })
        })
        .collect();

    let view = ChapterView {
        story_title: &story.title,
        story_slug: &story.slug,
        lang: &edition.lang,
        chapter_id: &entry.id,
        title: &entry.title,
        body_html: html::markdown_to_html(&body),
        published: planner::parse_published(entry.published()),
        credits: chapter_credits(ctx, story, edition, entry),
        tags: chapter_tags,
        fallback_language: entry
            .visibility
            .translation_missing
            .then_some(story.primary_language.as_str()),
        translator_commentary: front.translator_commentary.as_deref(),
        languages,
        navigation: planner::navigation(edition, &entry.id),
        protection: front
            .password
            .as_deref()
            .filter(|_| front.password_set())
            .map(|password| Protection {
                password: password.trim(),
                hint: front.password_hint.as_deref(),
            }),
        url: &url,
    };
    let mut settings = entry.settings.clone();
    settings.allow_indexing = planner::chapter_allows_indexing(ctx.manifest, story, entry);
    let meta = ctx.meta(
        format!("{} - {}", entry.title, story.title),
        &edition.lang,
        &path,
        "article",
        settings,
        &planner::story_feed_path(&story.slug),
    );
    ctx.write_page(&path, html::render_chapter(site, &meta, &view))?;
    Ok(())
}

/// Author and translator credits of one chapter edition.
fn chapter_credits(ctx: &Context<'_>, story: &Story, edition: &LanguageEdition, entry: &ChapterEntry) -> Vec<Credit> {
    let front = &entry.resolved.record.front;
    let mut credits = Vec::new();
    if let Some(author) = front.author.as_deref().or(story.config.author.as_deref()) {
        credits.push(ctx.credit(Role::Author, author));
    }
    let story_translator = story
        .config
        .translator
        .as_deref()
        .filter(|_| !edition.is_primary && !entry.visibility.translation_missing);
    if let Some(translator) = front.translator.as_deref().or(story_translator) {
        credits.push(ctx.credit(Role::Translator, translator));
    }
    credits
}

fn render_toc(
    ctx: &Context<'_>,
    story: &Story,
    edition: &LanguageEdition,
    has_tags: bool,
    languages: Vec<LanguageLink>,
) -> Result<(), GenerateError> {
    let site = &ctx.manifest.site;
    let arcs = planner::toc(story, edition);
    let mut credits = Vec::new();
    if let Some(author) = &story.config.author {
        credits.push(ctx.credit(Role::Author, author));
    }
    if let Some(translator) = story.config.translator.as_deref().filter(|_| !edition.is_primary) {
        credits.push(ctx.credit(Role::Translator, translator));
    }

    let view = TocView {
        story_title: &story.title,
        story_slug: &story.slug,
        lang: &edition.lang,
        description: story.config.description.as_deref(),
        cover: ctx.covers.stories.get(&story.slug).cloned(),
        credits,
        arcs: &arcs,
        arc_covers: (0..story.arcs.len())
            .map(|i| ctx.covers.arcs.get(&(story.slug.clone(), i)).cloned())
            .collect(),
        languages,
        has_tags,
    };
    let path = planner::toc_path(&story.slug, &edition.lang);
    let meta = ctx.meta(
        format!("{} - {}", story.title, site.site_name),
        &edition.lang,
        &path,
        "book",
        ctx.story_settings(story, &story.title),
        &planner::story_feed_path(&story.slug),
    );
    ctx.write_page(&path, html::render_toc(site, &meta, &view))?;
    Ok(())
}

/// Tag index plus one page per tag. Returns the number of pages written.
fn render_tag_pages(
    ctx: &Context<'_>,
    story: &Story,
    edition: &LanguageEdition,
    tags: &[Tag],
    languages: Vec<LanguageLink>,
) -> Result<usize, GenerateError> {
    let site = &ctx.manifest.site;
    let feed = planner::story_feed_path(&story.slug);

    let path = planner::tags_path(&story.slug, &edition.lang);
    let title = format!("Tags - {}", story.title);
    let meta = ctx.meta(
        title.clone(),
        &edition.lang,
        &path,
        "website",
        ctx.story_settings(story, &title),
        &feed,
    );
    let view = TagsView {
        story_title: &story.title,
        story_slug: &story.slug,
        lang: &edition.lang,
        tags,
        languages,
    };
    ctx.write_page(&path, html::render_tags_index(site, &meta, &view))?;

    for tag in tags {
        let path = planner::tag_path(&story.slug, &edition.lang, &tag.slug);
        let title = format!("{} - {}", tag.name, story.title);
        let meta = ctx.meta(
            title.clone(),
            &edition.lang,
            &path,
            "website",
            ctx.story_settings(story, &title),
            &feed,
        );
        ctx.write_page(
            &path,
            html::render_tag_page(site, &meta, &story.title, &story.slug, &edition.lang, tag),
        )?;
    }
    Ok(tags.len() + 1)
}

fn write_story_feed(ctx: &Context<'_>, story: &Story) -> Result<(), GenerateError> {
    let site = &ctx.manifest.site;
    let items = planner::story_feed(ctx.manifest, ctx.cache, story, STORY_FEED_LIMIT);
    let link = site.absolute_url(&planner::toc_path(&story.slug, &story.primary_language));
    let self_link = site.absolute_url(&planner::story_feed_path(&story.slug));
    let channel = Channel {
        title: &story.title,
        link: &link,
        description: story.config.description.as_deref().unwrap_or(""),
        self_link: &self_link,
    };
    let dir = ctx.output.join(&story.slug);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("rss.xml"), feeds::rss_xml(&channel, &items))?;
    Ok(())
}

// ============================================================================
// Site pages
// ============================================================================

fn write_index(ctx: &Context<'_>) -> Result<(), GenerateError> {
    let site = &ctx.manifest.site;
    let cards: Vec<StoryCard> = ctx
        .manifest
        .stories
        .iter()
        .filter_map(|story| {
            let languages: Vec<LanguageLink> = ctx
                .cache
                .editions(&story.slug)
                .iter()
                .filter(|e| e.has_listed())
                .map(|e| LanguageLink {
                    lang: e.lang.clone(),
                    href: planner::toc_path(&story.slug, &e.lang),
                    current: false,
                })
                .collect();
            (!languages.is_empty()).then(|| StoryCard {
                title: story.title.clone(),
                description: story.config.description.clone(),
                cover: ctx.covers.stories.get(&story.slug).cloned(),
                languages,
            })
        })
        .collect();

    let meta = ctx.meta(
        site.site_name.clone(),
        crate::scan::DEFAULT_LANGUAGE,
        "/",
        "website",
        resolve::resolve_story(site, &Default::default(), &site.site_name),
        "/rss.xml",
    );
    ctx.write_page("/", html::render_index(site, &meta, &cards))?;
    Ok(())
}

fn write_site_feed(ctx: &Context<'_>) -> Result<usize, GenerateError> {
    let site = &ctx.manifest.site;
    let items = planner::site_feed(ctx.manifest, ctx.cache, SITE_FEED_LIMIT);
    let link = site.absolute_url("/");
    let self_link = site.absolute_url("/rss.xml");
    let channel = Channel {
        title: &site.site_name,
        link: &link,
        description: &site.site_description,
        self_link: &self_link,
    };
    fs::write(ctx.output.join("rss.xml"), feeds::rss_xml(&channel, &items))?;
    Ok(items.len())
}

/// Returns the site paths of the author pages written.
fn write_author_pages(ctx: &Context<'_>) -> Result<Vec<String>, GenerateError> {
    let site = &ctx.manifest.site;
    if !site.author_pages.enabled {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for page in authors::plan_pages(ctx.manifest, ctx.cache) {
        let path = authors::author_path(&page.author.username);
        let mut settings = resolve::resolve_story(site, &Default::default(), &page.author.name);
        if let Some(bio) = &page.author.bio {
            settings.meta_description = Some(bio.clone());
            settings.social_description = Some(bio.clone());
        }
        let meta = ctx.meta(
            format!("{} - {}", page.author.name, site.site_name),
            crate::scan::DEFAULT_LANGUAGE,
            &path,
            "profile",
            settings,
            "/rss.xml",
        );
        ctx.write_page(&path, html::render_author_page(site, &meta, &page))?;
        paths.push(path);
    }
    Ok(paths)
}

/// Returns the number of sitemap entries.
fn write_sitemap_and_robots(ctx: &Context<'_>, extra_paths: &[String]) -> Result<usize, GenerateError> {
    let entries = planner::sitemap(ctx.manifest, ctx.cache, extra_paths);
    fs::write(ctx.output.join("sitemap.xml"), feeds::sitemap_xml(&entries))?;
    let robots = planner::robots(ctx.manifest, ctx.cache);
    fs::write(ctx.output.join("robots.txt"), feeds::robots_txt(&robots))?;
    Ok(entries.len())
}

// ============================================================================
// Tests
// ============================================================================
