//! E-book bundles, built after every page is on disk.
//!
//! For each story edition with at least one listed chapter there is a
//! whole-story bundle, plus one per arc when the story sets
//! `epub.arc_bundles`. Bundles hold only listed chapters, grouped by arc.
//!
//! Chapter HTML is read back from the rendered page (between
//! [`CONTENT_START`] and [`CONTENT_END`]); when the page is missing the
//! markdown body is rendered again. Images are copied into the package under
//! generated names, one copy per source file.
//!
//! ```text
//! static/epub/{story}.epub              primary language, whole story
//! static/epub/{story}_{lang}.epub       other languages
//! static/epub/{story}-{arc-slug}.epub   arc bundle
//! ```
//!
//! A bundle that fails is logged and skipped. Afterwards every table of
//! contents gets a download section listing the bundles that exist.

pub mod package;

use crate::cache::{ChapterCache, ChapterEntry, LanguageEdition};
use crate::config::SiteConfig;
use crate::html::{self, CONTENT_END, CONTENT_START, DOWNLOADS_MARKER, DownloadLink};
use crate::images;
use crate::naming;
use crate::scan::{Manifest, Story};
use package::{Package, PackageChapter, PackageImage, PackageSection};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Site-relative directory holding bundles.
pub const EPUB_DIR: &str = "static/epub";

#[derive(Error, Debug)]
pub enum EpubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("bundle {0} has no chapters")]
    Empty(String),
}

/// Whether a story gets bundles at all.
pub fn enabled_for(site: &SiteConfig, story: &Story) -> bool {
    site.epub.generate_enabled && story.config.epub.enabled.unwrap_or(site.epub.epub_enabled)
}

/// `{story}[-{arc-slug}][_{lang}].epub`
pub fn bundle_file_name(story: &str, arc_slug: Option<&str>, lang: &str, primary: &str) -> String {
    let mut name = story.to_string();
    if let Some(arc) = arc_slug {
        name.push('-');
        name.push_str(arc);
    }
    if lang != primary {
        name.push('_');
        name.push_str(lang);
    }
    name.push_str(".epub");
    name
}

/// One bundle to build.
#[derive(Debug, Clone, PartialEq)]
pub struct BundlePlan {
    pub story: String,
    pub lang: String,
    /// `None` for the whole story.
    pub arc: Option<usize>,
    pub file_name: String,
    pub title: String,
}

impl BundlePlan {
    pub fn output_path(&self, output: &Path) -> PathBuf {
        output.join(EPUB_DIR).join(&self.file_name)
    }

    pub fn href(&self) -> String {
        format!("/{EPUB_DIR}/{}", self.file_name)
    }
}

/// Bundles for one story edition, whole story first.
pub fn plan_edition(site: &SiteConfig, story: &Story, edition: &LanguageEdition) -> Vec<BundlePlan> {
    if !enabled_for(site, story) || !edition.has_listed() {
        return Vec::new();
    }
    let plan = |arc: Option<usize>| {
        let arc_ref = arc.map(|i| &story.arcs[i]);
        BundlePlan {
            story: story.slug.clone(),
            lang: edition.lang.clone(),
            arc,
            file_name: bundle_file_name(
                &story.slug,
                arc_ref.map(|a| a.slug.as_str()),
                &edition.lang,
                &story.primary_language,
            ),
            title: match arc_ref {
                Some(a) => format!("{} - {}", story.title, a.title),
                None => story.title.clone(),
            },
        }
    };

    let mut plans = vec![plan(None)];
    if story.config.epub.arc_bundles {
        plans.extend(
            (0..story.arcs.len())
                .filter(|i| edition.listed().any(|c| c.arc_index == *i))
                .map(|i| plan(Some(i))),
        );
    }
    plans
}

/// Every bundle of the site.
pub fn plan_bundles(manifest: &Manifest, cache: &ChapterCache) -> Vec<BundlePlan> {
    manifest
        .stories
        .iter()
        .flat_map(|story| {
            cache
                .editions(&story.slug)
                .iter()
                .flat_map(|edition| plan_edition(&manifest.site, story, edition))
        })
        .collect()
}

/// Outcome of the e-book pass.
#[derive(Debug, Default)]
pub struct EpubSummary {
    pub written: Vec<BundlePlan>,
    pub failed: Vec<(BundlePlan, String)>,
}

/// Build every planned bundle. Failures are logged and collected.
pub fn generate_all(manifest: &Manifest, cache: &ChapterCache, output: &Path) -> EpubSummary {
    let mut summary = EpubSummary::default();
    for plan in plan_bundles(manifest, cache) {
        let result = manifest
            .stories
            .iter()
            .find(|s| s.slug == plan.story)
            .zip(cache.edition(&plan.story, &plan.lang))
            .map(|(story, edition)| build_bundle(&manifest.site, story, edition, &plan, output));
        match result {
            Some(Ok(())) => {
                tracing::debug!(file = %plan.file_name, "epub written");
                summary.written.push(plan);
            }
            Some(Err(err)) => {
                tracing::error!(file = %plan.file_name, error = %err, "epub generation failed");
                summary.failed.push((plan, err.to_string()));
            }
            None => {}
        }
    }
    tracing::info!(written = summary.written.len(), failed = summary.failed.len(), "epub pass finished");
    summary
}

/// Package one bundle and write it under [`EPUB_DIR`].
pub fn build_bundle(
    site: &SiteConfig,
    story: &Story,
    edition: &LanguageEdition,
    plan: &BundlePlan,
    output: &Path,
) -> Result<(), EpubError> {
    let mut images = ImageMap::default();
    let mut sections = Vec::new();

    for (index, arc) in story.arcs.iter().enumerate() {
        if plan.arc.is_some_and(|wanted| wanted != index) {
            continue;
        }
        let chapters = edition
            .listed()
            .filter(|c| c.arc_index == index)
            .map(|entry| {
                let (body, base) = chapter_html(output, story, edition, entry);
                let body = images.rewrite(&body, base.as_deref());
                PackageChapter {
                    title: entry.title.clone(),
                    body: package::ensure_xhtml_void_tags(&body),
                }
            })
            .collect::<Vec<_>>();
        if !chapters.is_empty() {
            sections.push(PackageSection {
                title: arc.title.clone(),
                chapters,
            });
        }
    }
    if sections.is_empty() {
        return Err(EpubError::Empty(plan.file_name.clone()));
    }

    let arc_cover = plan.arc.and_then(|i| story.arcs[i].cover_art.clone());
    let translated = !edition.is_primary;
    let package = Package {
        identifier: format!(
            "urn:quire:{}",
            naming::hash_prefix(site.absolute_url(&plan.href()).as_bytes(), 32)
        ),
        title: plan.title.clone(),
        lang: plan.lang.clone(),
        creator: story.config.author.clone(),
        contributor: story.config.translator.clone().filter(|_| translated),
        description: story.config.description.clone(),
        modified: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        sections,
        images: images.into_images(),
        cover: arc_cover.or_else(|| story.cover_art.clone()),
    };
    package::write_package(&plan.output_path(output), &package)
}

/// Chapter HTML and the directory its relative image references resolve
/// against.
fn chapter_html(
    output: &Path,
    story: &Story,
    edition: &LanguageEdition,
    entry: &ChapterEntry,
) -> (String, Option<PathBuf>) {
    let page_dir = output.join(&story.slug).join(&edition.lang).join(&entry.id);
    if let Ok(page) = fs::read_to_string(page_dir.join("index.html"))
        && let Some(body) = extract_content(&page)
    {
        return (body.to_string(), Some(page_dir));
    }
    tracing::debug!(story = %story.slug, chapter = %entry.id, "rendered page unavailable, re-rendering markdown");
    let record = &entry.resolved.record;
    (
        html::markdown_to_html(&record.body),
        record.source_dir().map(Path::to_path_buf),
    )
}

/// Text between the content markers of a rendered page.
pub fn extract_content(page: &str) -> Option<&str> {
    let start = page.find(CONTENT_START)? + CONTENT_START.len();
    let end = start + page[start..].find(CONTENT_END)?;
    Some(&page[start..end])
}

/// Package-local names for images, keyed by source file.
#[derive(Debug, Default)]
struct ImageMap {
    by_source: HashMap<PathBuf, String>,
    images: Vec<PackageImage>,
}

impl ImageMap {
    fn rewrite(&mut self, html: &str, base: Option<&Path>) -> String {
        let Some(base) = base else {
            return html.to_string();
        };
        images::rewrite_sources(html, |src| {
            if !images::is_local_reference(src) {
                return None;
            }
            let source = base.join(src).canonicalize().ok().filter(|p| p.is_file())?;
            Some(self.href_for(source))
        })
    }

    fn href_for(&mut self, source: PathBuf) -> String {
        if let Some(href) = self.by_source.get(&source) {
            return href.clone();
        }
        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or_default();
        let href = format!("images/img-{}{ext}", self.images.len() + 1);
        self.images.push(PackageImage {
            href: href.clone(),
            source: source.clone(),
        });
        self.by_source.insert(source, href.clone());
        href
    }

    fn into_images(self) -> Vec<PackageImage> {
        self.images
    }
}

/// Replace the downloads marker in every table of contents with links to the
/// bundles that exist on disk. Returns the number of pages patched.
pub fn patch_toc_downloads(manifest: &Manifest, cache: &ChapterCache, output: &Path) -> std::io::Result<usize> {
    let mut patched = 0;
    for story in &manifest.stories {
        for edition in cache.editions(&story.slug) {
            let toc = output
                .join(&story.slug)
                .join(&edition.lang)
                .join("toc")
                .join("index.html");
            let Ok(page) = fs::read_to_string(&toc) else {
                continue;
            };
            if !page.contains(DOWNLOADS_MARKER) {
                continue;
            }

            let links: Vec<DownloadLink> = plan_edition(&manifest.site, story, edition)
                .into_iter()
                .filter(|plan| plan.output_path(output).is_file())
                .map(|plan| DownloadLink {
                    label: match plan.arc {
                        Some(i) => format!("{} (EPUB)", story.arcs[i].title),
                        None => "Full story (EPUB)".to_string(),
                    },
                    href: plan.href(),
                })
                .collect();
            let section = if links.is_empty() {
                String::new()
            } else {
                html::render_downloads(&links).into_string()
            };
            fs::write(&toc, page.replacen(DOWNLOADS_MARKER, &section, 1))?;
            patched += 1;
        }
    }
    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use crate::visibility::BuildOptions;
    use std::io::Read;
    use tempfile::TempDir;

    fn cache_for(site: &SiteFixture) -> (Manifest, ChapterCache) {
        let manifest = site.scan();
        let cache = ChapterCache::build(&manifest, BuildOptions::default()).unwrap();
        (manifest, cache)
    }

    fn two_arc_story(site: &SiteFixture, extra: &str) {
        site.story("novel")
            .config(&format!(
                "title: Novel\n{extra}arcs:\n  - title: Arc One\n    chapters:\n      - id: a\n      - id: b\n  - title: Arc Two\n    chapters:\n      - id: c\n"
            ))
            .chapter("a", "---\ntitle: Alpha\n---\nFirst ![map](map.png)")
            .chapter("b", "---\nhidden: true\n---\nSecret")
            .chapter("c", "Third ![map](map.png)")
            .file("chapters/map.png", b"png")
            .translation("fr", "a", "Premier");
    }

    fn entry_text(path: &Path, name: &str) -> String {
        let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
        let mut out = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn file_names() {
        assert_eq!(bundle_file_name("novel", None, "en", "en"), "novel.epub");
        assert_eq!(bundle_file_name("novel", None, "fr", "en"), "novel_fr.epub");
        assert_eq!(
            bundle_file_name("novel", Some("arc-one"), "fr", "en"),
            "novel-arc-one_fr.epub"
        );
    }

    #[test]
    fn plans_story_and_arc_bundles() {
        let site = SiteFixture::new();
        two_arc_story(&site, "epub:\n  arc_bundles: true\n");
        let (manifest, cache) = cache_for(&site);
        let names: Vec<String> = plan_bundles(&manifest, &cache)
            .into_iter()
            .map(|p| p.file_name)
            .collect();
        assert_eq!(
            names,
            vec![
                "novel.epub",
                "novel-arc-one.epub",
                "novel-arc-two.epub",
                "novel_fr.epub",
                "novel-arc-one_fr.epub",
                "novel-arc-two_fr.epub",
            ]
        );
    }

    #[test]
    fn disabled_by_story_or_site() {
        let site = SiteFixture::new();
        two_arc_story(&site, "epub:\n  enabled: false\n");
        let (manifest, cache) = cache_for(&site);
        assert!(plan_bundles(&manifest, &cache).is_empty());

        let site = SiteFixture::new();
        site.site_config("epub:\n  generate_enabled: false\n");
        two_arc_story(&site, "epub:\n  enabled: true\n");
        let (manifest, cache) = cache_for(&site);
        assert!(plan_bundles(&manifest, &cache).is_empty());
    }

    #[test]
    fn bundle_excludes_skipped_and_dedups_images() {
        let site = SiteFixture::new();
        two_arc_story(&site, "");
        let (manifest, cache) = cache_for(&site);
        let out = TempDir::new().unwrap();

        let summary = generate_all(&manifest, &cache, out.path());
        assert!(summary.failed.is_empty());
        assert_eq!(summary.written.len(), 2);

        let path = out.path().join("static/epub/novel.epub");
        let opf = entry_text(&path, "OEBPS/content.opf");
        assert_eq!(opf.matches("<itemref").count(), 2, "hidden chapter excluded");
        assert_eq!(opf.matches("images/img-").count(), 1, "one copy of the shared image");

        let first = entry_text(&path, "OEBPS/chap-1.xhtml");
        assert!(first.contains("<h1>Alpha</h1>"));
        assert!(first.contains("src=\"images/img-1.png\""));
        assert!(!entry_text(&path, "OEBPS/chap-2.xhtml").contains("Secret"));

        let fr = out.path().join("static/epub/novel_fr.epub");
        assert!(entry_text(&fr, "OEBPS/chap-1.xhtml").contains("Premier"));
    }

    #[test]
    fn reads_rendered_page_between_markers() {
        let site = SiteFixture::new();
        site.story("novel").chapter("a", "Markdown text");
        let (manifest, cache) = cache_for(&site);
        let out = TempDir::new().unwrap();
        let page_dir = out.path().join("novel/en/a");
        fs::create_dir_all(&page_dir).unwrap();
        fs::write(
            page_dir.join("index.html"),
            format!("<html>{CONTENT_START}<p>Rendered<br>text</p>{CONTENT_END}</html>"),
        )
        .unwrap();

        generate_all(&manifest, &cache, out.path());
        let chapter = entry_text(&out.path().join("static/epub/novel.epub"), "OEBPS/chap-1.xhtml");
        assert!(chapter.contains("<p>Rendered<br />text</p>"));
        assert!(!chapter.contains("Markdown text"));
    }

    #[test]
    fn extract_content_needs_both_markers() {
        assert_eq!(
            extract_content(&format!("x{CONTENT_START}body{CONTENT_END}y")),
            Some("body")
        );
        assert_eq!(extract_content(&format!("x{CONTENT_START}body")), None);
        assert_eq!(extract_content("plain"), None);
    }

    #[test]
    fn toc_patch_lists_existing_bundles_only() {
        let site = SiteFixture::new();
        two_arc_story(&site, "epub:\n  arc_bundles: true\n");
        let (manifest, cache) = cache_for(&site);
        let out = TempDir::new().unwrap();
        for lang in ["en", "fr"] {
            let dir = out.path().join("novel").join(lang).join("toc");
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("index.html"), format!("<main>{DOWNLOADS_MARKER}</main>")).unwrap();
        }
        fs::create_dir_all(out.path().join(EPUB_DIR)).unwrap();
        fs::write(out.path().join(EPUB_DIR).join("novel.epub"), b"x").unwrap();
        fs::write(out.path().join(EPUB_DIR).join("novel-arc-two.epub"), b"x").unwrap();

        assert_eq!(patch_toc_downloads(&manifest, &cache, out.path()).unwrap(), 2);

        let en = read_output(out.path(), "novel/en/toc/index.html");
        assert!(en.contains("href=\"/static/epub/novel.epub\""));
        assert!(en.contains("Arc Two (EPUB)"));
        assert!(!en.contains("novel-arc-one.epub"));
        assert!(!en.contains(DOWNLOADS_MARKER));

        let fr = read_output(out.path(), "novel/fr/toc/index.html");
        assert_eq!(fr, "<main></main>");
    }
}
