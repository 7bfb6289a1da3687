//! Tag index for one (story, language) edition.
//!
//! Only listed chapters contribute tags; a hidden, excluded draft, or
//! password-protected chapter never shows up on a tag page. Tags whose slugs
//! collide are merged under the first-seen display name.

use crate::cache::LanguageEdition;
use crate::naming;

/// A chapter reference on a tag page.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedChapter {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    pub slug: String,
    /// Reading order.
    pub chapters: Vec<TaggedChapter>,
}

/// Tags of an edition, sorted by slug.
pub fn index(edition: &LanguageEdition) -> Vec<Tag> {
    let mut tags: Vec<Tag> = Vec::new();
    for entry in edition.listed() {
        for name in &entry.resolved.record.front.tags {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let slug = naming::slugify(name);
            let position = match tags.iter().position(|t| t.slug == slug) {
                Some(pos) => pos,
                None => {
                    tags.push(Tag {
                        name: name.to_string(),
                        slug,
                        chapters: Vec::new(),
                    });
                    tags.len() - 1
                }
            };
            let tag = &mut tags[position];
            if !tag.chapters.iter().any(|c| c.id == entry.id) {
                tag.chapters.push(TaggedChapter {
                    id: entry.id.clone(),
                    title: entry.title.clone(),
                });
            }
        }
    }
    tags.sort_by(|a, b| a.slug.cmp(&b.slug));
    tags
}
