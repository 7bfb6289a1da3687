//! HTML page templates.
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! Templates are type-safe Rust code with automatic XSS escaping; the only
//! pre-escaped inputs are rendered markdown, translator commentary (HTML by
//! contract) and JSON-LD.
//!
//! Page records are built by [`crate::generate`]; this module only lays them
//! out. Every page shares [`base_document`]: SEO and social meta tags,
//! canonical link, feed link, theme toggle, and the resolved footer.
//!
//! ## Markers
//!
//! Two HTML comments are part of the output contract:
//!
//! - [`CONTENT_START`] / [`CONTENT_END`] wrap the chapter body so the e-book
//!   pass can read rendered HTML back from disk.
//! - [`DOWNLOADS_MARKER`] sits in every table of contents; the e-book pass
//!   replaces it with links to the bundles it actually wrote.

use crate::authors::{AuthorPage, author_path};
use crate::config::SiteConfig;
use crate::feeds::xml_escape;
use crate::planner::{self, Navigation, TocArc};
use crate::resolve::PageSettings;
use crate::tags::Tag;
use chrono::NaiveDate;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Options, Parser, html as md_html};

pub const CONTENT_START: &str = "<!-- quire:content:start -->";
pub const CONTENT_END: &str = "<!-- quire:content:end -->";
pub const DOWNLOADS_MARKER: &str = "<!-- quire:downloads -->";

/// Convert markdown to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    out
}

/// Head and footer inputs shared by every page.
#[derive(Debug, Clone)]
pub struct PageMeta {
    /// Text of the `<title>` element.
    pub title: String,
    pub lang: String,
    /// Absolute URL of the page.
    pub canonical: String,
    /// OpenGraph type: `website`, `book` or `article`.
    pub og_type: &'static str,
    pub settings: PageSettings,
    /// Feed advertised in the head.
    pub feed: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LanguageLink {
    pub lang: String,
    pub href: String,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credit {
    pub role: &'static str,
    pub name: String,
    /// Author page, when the name matches a profile.
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagLink {
    pub name: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadLink {
    pub label: String,
    pub href: String,
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
pub fn base_document(
    site: &SiteConfig,
    meta: &PageMeta,
    body_class: &str,
    breadcrumb: Markup,
    content: Markup,
) -> Markup {
    let s = &meta.settings;
    let card = if s.social_image.is_some() {
        "summary_large_image"
    } else {
        "summary"
    };
    html! {
        (DOCTYPE)
        html lang=(meta.lang) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (meta.title) }
                @if let Some(description) = &s.meta_description {
                    meta name="description" content=(description);
                }
                @if !s.keywords.is_empty() {
                    meta name="keywords" content=(s.keywords.join(", "));
                }
                @if !s.allow_indexing {
                    meta name="robots" content="noindex, nofollow";
                }
                link rel="canonical" href=(meta.canonical);
                meta property="og:type" content=(meta.og_type);
                meta property="og:title" content=(s.social_title);
                meta property="og:url" content=(meta.canonical);
                meta property="og:site_name" content=(site.site_name);
                meta property="og:locale" content=(meta.lang);
                @if let Some(description) = &s.social_description {
                    meta property="og:description" content=(description);
                    meta name="twitter:description" content=(description);
                }
                @if let Some(image) = &s.social_image {
                    meta property="og:image" content=(image);
                    meta name="twitter:image" content=(image);
                }
                meta name="twitter:card" content=(card);
                meta name="twitter:title" content=(s.social_title);
                @if let Some(handle) = &site.social_embeds.twitter_handle {
                    meta name="twitter:site" content=(handle);
                }
                @if let Some(feed) = &meta.feed {
                    link rel="alternate" type="application/rss+xml" title=(site.site_name) href=(feed);
                }
                link rel="stylesheet" href="/static/style.css";
                script src="/static/theme-toggle.js" defer {}
            }
            body class=(body_class) {
                header.site-header {
                    nav.breadcrumb {
                        a href="/" { (site.site_name) }
                        (breadcrumb)
                    }
                }
                (content)
                (site_footer(site, s))
            }
        }
    }
}

fn site_footer(site: &SiteConfig, settings: &PageSettings) -> Markup {
    html! {
        footer.site-footer {
            @if !settings.footer_links.is_empty() {
                nav.footer-links {
                    @for link in &settings.footer_links {
                        a href=(link.url) { (link.text) }
                    }
                }
            }
            @if let Some(copyright) = &settings.footer_copyright {
                p.copyright { (copyright) }
            }
            @if let Some(text) = &site.footer.additional_text {
                p.footer-text { (text) }
            }
        }
    }
}

fn language_switcher(languages: &[LanguageLink]) -> Markup {
    html! {
        @if languages.len() > 1 {
            nav.language-switcher aria-label="Languages" {
                @for link in languages {
                    @if link.current {
                        span.current-language { (link.lang) }
                    } @else {
                        a href=(link.href) hreflang=(link.lang) { (link.lang) }
                    }
                }
            }
        }
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Utterances comment widget. Empty unless a repository is configured.
pub fn comments_widget(site: &SiteConfig) -> Markup {
    let comments = &site.comments;
    let Some(repo) = comments.utterances_repo.as_deref().filter(|r| !r.trim().is_empty()) else {
        return html! {};
    };
    let label = comments
        .utterances_label
        .as_deref()
        .map(|l| format!(" label=\"{}\"", xml_escape(l)))
        .unwrap_or_default();
    let script = format!(
        "<script src=\"https://utteranc.es/client.js\" repo=\"{}\" issue-term=\"{}\"{} theme=\"{}\" crossorigin=\"anonymous\" async></script>",
        xml_escape(repo),
        xml_escape(&comments.utterances_issue_term),
        label,
        xml_escape(&comments.utterances_theme),
    );
    html! {
        section.comments-section {
            h2 { "Comments" }
            (PreEscaped(script))
        }
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoryCard {
    pub title: String,
    pub description: Option<String>,
    pub cover: Option<String>,
    pub languages: Vec<LanguageLink>,
}

/// Renders the home page with one card per story.
pub fn render_index(site: &SiteConfig, meta: &PageMeta, cards: &[StoryCard]) -> Markup {
    let content = html! {
        main.index-page {
            h1 { (site.site_name) }
            @if !site.site_description.is_empty() {
                p.site-description { (site.site_description) }
            }
            div.story-grid {
                @for card in cards {
                    article.story-card {
                        @if let Some(cover) = &card.cover {
                            img.story-cover src=(cover) alt=(card.title) loading="lazy";
                        }
                        h2 {
                            @if let Some(first) = card.languages.first() {
                                a href=(first.href) { (card.title) }
                            } @else {
                                (card.title)
                            }
                        }
                        @if let Some(description) = &card.description {
                            p.story-description { (description) }
                        }
                        @if card.languages.len() > 1 {
                            p.story-languages {
                                @for link in &card.languages {
                                    a href=(link.href) hreflang=(link.lang) { (link.lang) }
                                    " "
                                }
                            }
                        }
                    }
                }
            }
        }
    };
    base_document(site, meta, "index", html! {}, content)
}

#[derive(Debug, Clone)]
pub struct TocView<'a> {
    pub story_title: &'a str,
    pub story_slug: &'a str,
    pub lang: &'a str,
    pub description: Option<&'a str>,
    pub cover: Option<String>,
    pub credits: Vec<Credit>,
    pub arcs: &'a [TocArc],
    /// Arc cover URLs, by arc index.
    pub arc_covers: Vec<Option<String>>,
    pub languages: Vec<LanguageLink>,
    pub has_tags: bool,
}

/// Renders a story's table of contents in one language.
pub fn render_toc(site: &SiteConfig, meta: &PageMeta, view: &TocView<'_>) -> Markup {
    let breadcrumb = html! {
        " › "
        (view.story_title)
    };
    let content = html! {
        main.toc-page {
            header.story-header {
                @if let Some(cover) = &view.cover {
                    img.story-cover src=(cover) alt=(view.story_title);
                }
                h1 { (view.story_title) }
                (credits(&view.credits))
                @if let Some(description) = view.description {
                    p.story-description { (description) }
                }
                (language_switcher(&view.languages))
                @if view.has_tags {
                    p.tags-link {
                        a href=(planner::tags_path(view.story_slug, view.lang)) { "Browse by tag" }
                    }
                }
            }
            (PreEscaped(DOWNLOADS_MARKER))
            @for arc in view.arcs {
                section.arc {
                    h2 { (arc.title) }
                    @if let Some(Some(cover)) = view.arc_covers.get(arc.index) {
                        img.arc-cover src=(cover) alt=(arc.title) loading="lazy";
                    }
                    ol.chapter-list {
                        @for chapter in &arc.chapters {
                            li {
                                a href=(planner::chapter_path(view.story_slug, view.lang, &chapter.id)) {
                                    (chapter.title)
                                }
                                @if let Some(date) = chapter.published {
                                    " "
                                    time.published datetime=(format_date(date)) { (format_date(date)) }
                                }
                                @if chapter.translation_missing {
                                    " "
                                    span.untranslated { "(not yet translated)" }
                                }
                            }
                        }
                    }
                }
            }
            @if view.arcs.is_empty() {
                p.empty { "No chapters published yet." }
            }
        }
    };
    base_document(site, meta, "toc", breadcrumb, content)
}

/// Download section that replaces [`DOWNLOADS_MARKER`].
pub fn render_downloads(links: &[DownloadLink]) -> Markup {
    html! {
        section.downloads {
            h2 { "Downloads" }
            ul {
                @for link in links {
                    li { a href=(link.href) download { (link.label) } }
                }
            }
        }
    }
}

fn credits(credits: &[Credit]) -> Markup {
    html! {
        @if !credits.is_empty() {
            p.credits {
                @for (i, credit) in credits.iter().enumerate() {
                    @if i > 0 { " · " }
                    (credit.role) ": "
                    @if let Some(href) = &credit.href {
                        a href=(href) { (credit.name) }
                    } @else {
                        (credit.name)
                    }
                }
            }
        }
    }
}

/// A password and its hint, for protected chapters.
#[derive(Debug, Clone)]
pub struct Protection<'a> {
    pub password: &'a str,
    pub hint: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct ChapterView<'a> {
    pub story_title: &'a str,
    pub story_slug: &'a str,
    pub lang: &'a str,
    pub chapter_id: &'a str,
    pub title: &'a str,
    pub body_html: String,
    pub published: Option<NaiveDate>,
    pub credits: Vec<Credit>,
    pub tags: Vec<TagLink>,
    /// Name of the language the fallback text is in, when the translation is missing.
    pub fallback_language: Option<&'a str>,
    pub translator_commentary: Option<&'a str>,
    pub languages: Vec<LanguageLink>,
    /// `None` for chapters left out of the reading order.
    pub navigation: Option<Navigation>,
    pub protection: Option<Protection<'a>>,
    /// Canonical URL, used in structured data.
    pub url: &'a str,
}

/// Renders a chapter page, or its protected placeholder.
pub fn render_chapter(site: &SiteConfig, meta: &PageMeta, view: &ChapterView<'_>) -> Markup {
    let s = &meta.settings;
    let inner = chapter_inner(site, s, view);

    let body = match &view.protection {
        Some(protection) => protected_placeholder(&inner.into_string(), protection),
        None => inner,
    };

    let breadcrumb = html! {
        " › "
        a href=(planner::toc_path(view.story_slug, view.lang)) { (view.story_title) }
        " › "
        (view.title)
    };
    let content = html! {
        main.chapter-page {
            (language_switcher(&view.languages))
            article.chapter {
                h1.chapter-title { (view.title) }
                (body)
            }
            (chapter_nav(view))
        }
        script type="application/ld+json" { (PreEscaped(json_ld(view))) }
    };
    base_document(site, meta, "chapter", breadcrumb, content)
}

/// Everything a reader sees inside the article. For protected chapters this
/// is the text that gets obfuscated.
fn chapter_inner(site: &SiteConfig, s: &PageSettings, view: &ChapterView<'_>) -> Markup {
    html! {
        @if s.show_metadata && (view.published.is_some() || !view.credits.is_empty()) {
            div.chapter-meta {
                @if let Some(date) = view.published {
                    time.published datetime=(format_date(date)) { (format_date(date)) }
                }
                (credits(&view.credits))
            }
        }
        @if s.show_tags && !view.tags.is_empty() {
            ul.chapter-tags {
                @for tag in &view.tags {
                    li { a href=(tag.href) { (tag.name) } }
                }
            }
        }
        @if let Some(original) = view.fallback_language {
            p.translation-missing role="note" {
                "This chapter has not been translated into " (view.lang)
                " yet. Showing the original (" (original) ") text."
            }
        }
        div.chapter-body {
            (PreEscaped(CONTENT_START))
            (PreEscaped(view.body_html.as_str()))
            (PreEscaped(CONTENT_END))
        }
        @if s.show_translation_notes {
            @if let Some(notes) = view.translator_commentary {
                aside.translator-notes {
                    h2 { "Translator's Notes" }
                    (PreEscaped(notes))
                }
            }
        }
        @if s.comments_enabled {
            (comments_widget(site))
        }
    }
}

fn protected_placeholder(inner_html: &str, protection: &Protection<'_>) -> Markup {
    let ciphertext = crate::cipher::encrypt(inner_html, protection.password);
    let verify = crate::cipher::verification_hash(protection.password);
    html! {
        div.protected-chapter id="protected-content" data-ciphertext=(ciphertext) data-verify=(verify) {
            p.protected-notice { "This chapter is password protected." }
            @if let Some(hint) = protection.hint {
                p.password-hint { "Hint: " (hint) }
            }
            form.unlock-form id="unlock-form" {
                label for="chapter-password" { "Password" }
                input type="password" id="chapter-password" autocomplete="off";
                button type="submit" { "Unlock" }
            }
            p.unlock-error id="unlock-error" hidden { "Incorrect password." }
            div.unlocked-content id="unlocked-content" {}
        }
        script src="/static/unlock.js" defer {}
    }
}

fn chapter_nav(view: &ChapterView<'_>) -> Markup {
    let toc = planner::toc_path(view.story_slug, view.lang);
    html! {
        nav.chapter-nav {
            @if let Some(nav) = &view.navigation {
                @if let Some(prev) = &nav.prev {
                    a.prev rel="prev" href=(planner::chapter_path(view.story_slug, view.lang, &prev.id)) {
                        "← " (prev.title)
                    }
                }
            }
            a.toc href=(toc) { "Table of Contents" }
            @if let Some(nav) = &view.navigation {
                @if let Some(next) = &nav.next {
                    a.next rel="next" href=(planner::chapter_path(view.story_slug, view.lang, &next.id)) {
                        (next.title) " →"
                    }
                }
            }
        }
    }
}

fn json_ld(view: &ChapterView<'_>) -> String {
    let mut data = serde_json::json!({
        "@context": "https://schema.org",
        "@type": "Chapter",
        "name": view.title,
        "inLanguage": view.lang,
        "url": view.url,
        "isPartOf": {
            "@type": "Book",
            "name": view.story_title,
        },
    });
    if let Some(date) = view.published {
        data["datePublished"] = serde_json::Value::String(format_date(date));
    }
    if let Some(author) = view.credits.iter().find(|c| c.role == "Author") {
        data["author"] = serde_json::json!({ "@type": "Person", "name": author.name });
    }
    // `</script>` inside a string would end the element early
    data.to_string().replace("</", "<\\/")
}

#[derive(Debug, Clone)]
pub struct TagsView<'a> {
    pub story_title: &'a str,
    pub story_slug: &'a str,
    pub lang: &'a str,
    pub tags: &'a [Tag],
    pub languages: Vec<LanguageLink>,
}

/// Renders the tag index of a story edition.
pub fn render_tags_index(site: &SiteConfig, meta: &PageMeta, view: &TagsView<'_>) -> Markup {
    let breadcrumb = html! {
        " › "
        a href=(planner::toc_path(view.story_slug, view.lang)) { (view.story_title) }
        " › Tags"
    };
    let content = html! {
        main.tags-page {
            h1 { "Tags" }
            (language_switcher(&view.languages))
            @if view.tags.is_empty() {
                p.empty { "No tags yet." }
            } @else {
                ul.tag-cloud {
                    @for tag in view.tags {
                        li {
                            a href=(planner::tag_path(view.story_slug, view.lang, &tag.slug)) { (tag.name) }
                            " "
                            span.count { "(" (tag.chapters.len()) ")" }
                        }
                    }
                }
            }
        }
    };
    base_document(site, meta, "tags", breadcrumb, content)
}

/// Renders the chapters carrying one tag.
pub fn render_tag_page(
    site: &SiteConfig,
    meta: &PageMeta,
    story_title: &str,
    story_slug: &str,
    lang: &str,
    tag: &Tag,
) -> Markup {
    let breadcrumb = html! {
        " › "
        a href=(planner::toc_path(story_slug, lang)) { (story_title) }
        " › "
        a href=(planner::tags_path(story_slug, lang)) { "Tags" }
        " › "
        (tag.name)
    };
    let content = html! {
        main.tag-page {
            h1 { "Tag: " (tag.name) }
            ol.chapter-list {
                @for chapter in &tag.chapters {
                    li {
                        a href=(planner::chapter_path(story_slug, lang, &chapter.id)) { (chapter.title) }
                    }
                }
            }
        }
    };
    base_document(site, meta, "tag", breadcrumb, content)
}

/// Renders an author profile page.
pub fn render_author_page(site: &SiteConfig, meta: &PageMeta, page: &AuthorPage) -> Markup {
    let author = &page.author;
    let breadcrumb = html! {
        " › "
        (author.name)
    };
    let content = html! {
        main.author-page id=(author.username) {
            h1 { (author.name) }
            @if let Some(bio) = &author.bio {
                p.author-bio { (bio) }
            }
            @if let Some(url) = &author.url {
                p.author-url { a href=(url) rel="me" { (url) } }
            }
            @if !page.stories.is_empty() {
                section.author-stories {
                    h2 { "Stories" }
                    ul {
                        @for story in &page.stories {
                            li {
                                a href=(story.path) { (story.title) }
                                " ("
                                @for (i, role) in story.roles.iter().enumerate() {
                                    @if i > 0 { ", " }
                                    (role.label())
                                }
                                ")"
                            }
                        }
                    }
                }
            }
            @if !page.recent.is_empty() {
                section.author-recent {
                    h2 { "Recent Chapters" }
                    ol {
                        @for chapter in &page.recent {
                            li {
                                a href=(chapter.path) hreflang=(chapter.lang) {
                                    (chapter.story_title) ": " (chapter.title)
                                }
                                " "
                                time datetime=(format_date(chapter.published)) { (format_date(chapter.published)) }
                            }
                        }
                    }
                }
            }
        }
    };
    base_document(site, meta, "author", breadcrumb, content)
}

/// Link to an author page for `name`, if it matches a profile.
pub fn credit(role: &'static str, name: &str, authors: &crate::authors::Authors, pages_enabled: bool) -> Credit {
    Credit {
        role,
        name: name.to_string(),
        href: authors
            .find(name)
            .filter(|_| pages_enabled)
            .map(|a| author_path(&a.username)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{NavLink, TocEntry};

    fn settings() -> PageSettings {
        crate::resolve::resolve_story(
            &SiteConfig::default(),
            &crate::config::StoryConfig::default(),
            "Title",
        )
    }

    fn meta() -> PageMeta {
        PageMeta {
            title: "Title".into(),
            lang: "en".into(),
            canonical: "https://e.com/x/".into(),
            og_type: "article",
            settings: settings(),
            feed: Some("/rss.xml".into()),
        }
    }

    fn chapter_view<'a>() -> ChapterView<'a> {
        ChapterView {
            story_title: "Novel",
            story_slug: "novel",
            lang: "en",
            chapter_id: "chapter-1",
            title: "The Prophecy",
            body_html: "<p>Once upon a time.</p>".into(),
            published: NaiveDate::from_ymd_opt(2024, 3, 1),
            credits: vec![Credit {
                role: "Author",
                name: "Jane".into(),
                href: Some("/authors/jane/".into()),
            }],
            tags: vec![TagLink {
                name: "prophecy".into(),
                href: "/novel/en/tags/prophecy/".into(),
            }],
            fallback_language: None,
            translator_commentary: Some("<em>Note</em>"),
            languages: vec![],
            navigation: Some(Navigation {
                prev: None,
                next: Some(NavLink {
                    id: "chapter-2".into(),
                    title: "Next One".into(),
                }),
            }),
            protection: None,
            url: "https://e.com/novel/en/chapter-1/",
        }
    }

    #[test]
    fn markdown_converts_with_extensions() {
        let html = markdown_to_html("# Title\n\n~~gone~~\n\n| a |\n|---|\n| b |\n");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn base_document_includes_meta() {
        let mut meta = meta();
        meta.settings.allow_indexing = false;
        meta.settings.keywords = vec!["a".into(), "b".into()];
        let doc = base_document(&SiteConfig::default(), &meta, "x", html! {}, html! { p { "body" } })
            .into_string();
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains(r#"<meta name="robots" content="noindex, nofollow">"#));
        assert!(doc.contains(r#"<meta name="keywords" content="a, b">"#));
        assert!(doc.contains(r#"<link rel="canonical" href="https://e.com/x/">"#));
        assert!(doc.contains(r#"type="application/rss+xml""#));
        assert!(doc.contains(r#"content="summary""#));
    }

    #[test]
    fn chapter_page_wraps_body_in_markers() {
        let doc = render_chapter(&SiteConfig::default(), &meta(), &chapter_view()).into_string();
        let start = doc.find(CONTENT_START).unwrap();
        let end = doc.find(CONTENT_END).unwrap();
        assert_eq!(
            &doc[start + CONTENT_START.len()..end],
            "<p>Once upon a time.</p>"
        );
        assert!(doc.contains("/novel/en/chapter-2/"));
        assert!(!doc.contains(r#"rel="prev""#));
        assert!(doc.contains("<em>Note</em>"));
        assert!(doc.contains("application/ld+json"));
        assert!(doc.contains(r#""datePublished":"2024-03-01""#));
    }

    #[test]
    fn display_flags_hide_sections() {
        let mut meta = meta();
        meta.settings.show_tags = false;
        meta.settings.show_translation_notes = false;
        meta.settings.show_metadata = false;
        let doc = render_chapter(&SiteConfig::default(), &meta, &chapter_view()).into_string();
        assert!(!doc.contains("chapter-tags"));
        assert!(!doc.contains("translator-notes"));
        assert!(!doc.contains("chapter-meta"));
    }

    #[test]
    fn missing_translation_banner() {
        let mut view = chapter_view();
        view.lang = "fr";
        view.fallback_language = Some("en");
        let doc = render_chapter(&SiteConfig::default(), &meta(), &view).into_string();
        assert!(doc.contains("has not been translated into fr"));
    }

    #[test]
    fn protected_chapter_embeds_only_ciphertext() {
        let mut view = chapter_view();
        view.protection = Some(Protection {
            password: "pw",
            hint: Some("the usual"),
        });
        let doc = render_chapter(&SiteConfig::default(), &meta(), &view).into_string();
        assert!(!doc.contains("Once upon a time"));
        assert!(!doc.contains(CONTENT_START));
        assert!(doc.contains("Hint: the usual"));
        assert!(doc.contains(&format!(
            r#"data-verify="{}""#,
            crate::cipher::verification_hash("pw")
        )));

        let start = doc.find(r#"data-ciphertext=""#).unwrap() + r#"data-ciphertext=""#.len();
        let len = doc[start..].find('"').unwrap();
        let plain = crate::cipher::decrypt(&doc[start..start + len], "pw").unwrap();
        assert!(plain.contains("Once upon a time"));
        assert!(plain.contains(CONTENT_START));
    }

    #[test]
    fn comments_widget_requires_repo_and_enabled() {
        let mut site = SiteConfig::default();
        site.comments.utterances_repo = Some("owner/repo".into());
        let doc = render_chapter(&site, &meta(), &chapter_view()).into_string();
        assert!(!doc.contains("utteranc.es"));

        let mut meta = meta();
        meta.settings.comments_enabled = true;
        let doc = render_chapter(&site, &meta, &chapter_view()).into_string();
        assert!(doc.contains(r#"repo="owner/repo""#));
        assert!(doc.contains(r#"issue-term="pathname""#));

        assert!(comments_widget(&SiteConfig::default()).into_string().is_empty());
    }

    #[test]
    fn toc_lists_arcs_and_marker() {
        let arcs = vec![TocArc {
            index: 0,
            title: "Arc 1".into(),
            slug: "arc-1".into(),
            chapters: vec![TocEntry {
                id: "chapter-1".into(),
                title: "One".into(),
                published: None,
                translation_missing: true,
            }],
        }];
        let view = TocView {
            story_title: "Novel",
            story_slug: "novel",
            lang: "fr",
            description: Some("A tale"),
            cover: None,
            credits: vec![],
            arcs: &arcs,
            arc_covers: vec![None],
            languages: vec![],
            has_tags: true,
        };
        let doc = render_toc(&SiteConfig::default(), &meta(), &view).into_string();
        assert!(doc.contains(DOWNLOADS_MARKER));
        assert!(doc.contains(r#"href="/novel/fr/chapter-1/""#));
        assert!(doc.contains("not yet translated"));
        assert!(doc.contains(r#"href="/novel/fr/tags/""#));
    }

    #[test]
    fn escapes_user_text() {
        let mut view = chapter_view();
        view.title = "<script>alert(1)</script>";
        let doc = render_chapter(&SiteConfig::default(), &meta(), &view).into_string();
        assert!(doc.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!doc.contains("<script>alert(1)"));
    }
}
