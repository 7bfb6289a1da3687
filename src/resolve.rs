//! Effective per-page settings from the site → story → chapter layers.
//!
//! Two kinds of keys:
//!
//! - **Override keys** (indexing, display flags, comments, social title,
//!   description and image, meta description, footer copyright): the most
//!   specific layer that sets the key wins. Unset keys fall through.
//! - **Accumulating keys** (social keywords, footer links): every layer
//!   contributes, most specific first.
//!
//! Story-level pages (table of contents, tag pages) resolve story → site only.

use crate::config::{FooterLink, SiteConfig, StoryConfig};
use crate::metadata::FrontMatter;

/// Settings one rendered page uses.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSettings {
    pub allow_indexing: bool,
    pub show_tags: bool,
    pub show_metadata: bool,
    pub show_translation_notes: bool,
    pub comments_enabled: bool,
    /// Social title with the site's `title_format` applied.
    pub social_title: String,
    pub social_description: Option<String>,
    /// Absolute when the configured path was site-rooted.
    pub social_image: Option<String>,
    pub meta_description: Option<String>,
    pub keywords: Vec<String>,
    pub footer_copyright: Option<String>,
    pub footer_links: Vec<FooterLink>,
}

/// Settings for a chapter page.
pub fn resolve_chapter(
    site: &SiteConfig,
    story: &StoryConfig,
    front: &FrontMatter,
    page_title: &str,
) -> PageSettings {
    resolve_layers(site, story, Some(front), page_title)
}

/// Settings for a story-level page (table of contents, tag index, tag page).
pub fn resolve_story(site: &SiteConfig, story: &StoryConfig, page_title: &str) -> PageSettings {
    resolve_layers(site, story, None, page_title)
}

fn resolve_layers(
    site: &SiteConfig,
    story: &StoryConfig,
    front: Option<&FrontMatter>,
    page_title: &str,
) -> PageSettings {
    let meta_description = first_text(&[
        front.and_then(|f| f.seo.meta_description.as_deref()),
        story.seo.meta_description.as_deref(),
        story.description.as_deref(),
        site.social_embeds.default_description.as_deref(),
        Some(site.site_description.as_str()),
    ]);

    let social_description = first_text(&[
        front.and_then(|f| f.social_embeds.description.as_deref()),
        story.social_embeds.description.as_deref(),
        meta_description.as_deref(),
    ]);

    let social_image = first_text(&[
        front.and_then(|f| f.social_embeds.image.as_deref()),
        story.social_embeds.image.as_deref(),
        site.social_embeds.default_image.as_deref(),
    ])
    .map(|image| absolute_image(site, &image));

    let title = first_text(&[
        front.and_then(|f| f.social_embeds.title.as_deref()),
        if front.is_none() {
            story.social_embeds.title.as_deref()
        } else {
            None
        },
        Some(page_title),
    ])
    .unwrap_or_default();

    let mut keywords: Vec<String> = Vec::new();
    let layers = [
        front.map(|f| f.social_embeds.keywords.as_slice()).unwrap_or(&[]),
        story.social_embeds.keywords.as_slice(),
        site.social_embeds.keywords.as_slice(),
    ];
    for keyword in layers.into_iter().flatten() {
        let keyword = keyword.trim();
        if !keyword.is_empty() && !keywords.iter().any(|k| k == keyword) {
            keywords.push(keyword.to_string());
        }
    }

    let mut footer_links = story.footer.links.clone();
    footer_links.extend(site.footer.links.iter().cloned());

    PageSettings {
        allow_indexing: first_set(&[
            front.and_then(|f| f.seo.allow_indexing),
            story.seo.allow_indexing,
            site.seo.allow_indexing,
        ])
        .unwrap_or(true),
        show_tags: first_set(&[front.and_then(|f| f.show_tags), story.show_tags]).unwrap_or(true),
        show_metadata: first_set(&[front.and_then(|f| f.show_metadata), story.show_metadata])
            .unwrap_or(true),
        show_translation_notes: first_set(&[
            front.and_then(|f| f.show_translation_notes),
            story.show_translation_notes,
        ])
        .unwrap_or(true),
        comments_enabled: first_set(&[
            front.and_then(|f| f.comments.enabled),
            story.comments.enabled,
            site.comments.enabled,
        ])
        .unwrap_or(false),
        social_title: format_title(&site.social_embeds.title_format, &title),
        social_description,
        social_image,
        meta_description,
        keywords,
        footer_copyright: first_text(&[
            story.footer.copyright.as_deref(),
            site.footer.copyright.as_deref(),
        ]),
        footer_links,
    }
}

/// First set value, most specific layer first.
fn first_set<T: Copy>(layers: &[Option<T>]) -> Option<T> {
    layers.iter().find_map(|v| *v)
}

/// First non-empty string, trimmed.
fn first_text(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .filter_map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .next()
}

/// Make a site-rooted image path (`/static/og.png`) absolute with the base URL.
/// Anything else passes through unchanged.
pub fn absolute_image(site: &SiteConfig, image: &str) -> String {
    if image.starts_with('/') && !image.starts_with("//") {
        site.absolute_url(image)
    } else {
        image.to_string()
    }
}

/// Apply a `{title}` template. Only the first placeholder is substituted.
pub fn format_title(template: &str, title: &str) -> String {
    template.replacen("{title}", title, 1)
}
