//! Author profiles and author pages.
//!
//! `authors.yaml` at the source root maps usernames to profiles:
//!
//! ```yaml
//! jane:
//!   name: Jane Doe
//!   bio: Writes about lighthouses.
//!   url: https://jane.example.com
//! pierre:
//!   name: Pierre Martin
//!   languages: [fr]          # other keys are ignored
//! ```
//!
//! Stories and chapters credit people by display name (`author:`,
//! `translator:`). A credit matches a profile by exact name first, then
//! case-insensitively. Every profile gets a page at
//! `/authors/{username}/` listing the stories they contributed to and their
//! most recent published chapters.

use crate::cache::{ChapterCache, ChapterEntry, LanguageEdition};
use crate::planner;
use crate::scan::{Manifest, Story};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// File name of the authors file, relative to the source root.
pub const AUTHORS_FILE: &str = "authors.yaml";

#[derive(Error, Debug)]
pub enum AuthorsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
struct AuthorEntry {
    name: Option<String>,
    bio: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub username: String,
    /// Display name; the username when the profile has none.
    pub name: String,
    pub bio: Option<String>,
    pub url: Option<String>,
}

/// All profiles, sorted by username.
#[derive(Debug, Clone, Default)]
pub struct Authors {
    pub profiles: Vec<Author>,
}

impl Authors {
    /// Profile credited under `display_name`.
    pub fn find(&self, display_name: &str) -> Option<&Author> {
        let wanted = display_name.trim();
        if wanted.is_empty() {
            return None;
        }
        self.profiles
            .iter()
            .find(|a| a.name == wanted)
            .or_else(|| {
                let lower = wanted.to_lowercase();
                self.profiles.iter().find(|a| a.name.to_lowercase() == lower)
            })
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Load `authors.yaml`. Missing or empty file means no profiles.
pub fn load_authors(root: &Path) -> Result<Authors, AuthorsError> {
    let path = root.join(AUTHORS_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Authors::default()),
        Err(err) => return Err(err.into()),
    };
    let entries: Option<BTreeMap<String, Option<AuthorEntry>>> = serde_yaml::from_str(&content)?;
    let profiles = entries
        .unwrap_or_default()
        .into_iter()
        .map(|(username, entry)| {
            let entry = entry.unwrap_or(AuthorEntry {
                name: None,
                bio: None,
                url: None,
            });
            Author {
                name: entry
                    .name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| username.clone()),
                username,
                bio: entry.bio,
                url: entry.url,
            }
        })
        .collect();
    Ok(Authors { profiles })
}

pub fn author_path(username: &str) -> String {
    format!("/authors/{username}/")
}

// ============================================================================
// Author pages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Author,
    Translator,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Author => "Author",
            Role::Translator => "Translator",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoryCredit {
    pub slug: String,
    pub title: String,
    pub roles: Vec<Role>,
    /// TOC of the story's primary language.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentChapter {
    pub story_title: String,
    pub title: String,
    pub path: String,
    pub published: NaiveDate,
    pub lang: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorPage {
    pub author: Author,
    pub stories: Vec<StoryCredit>,
    pub recent: Vec<RecentChapter>,
}

/// One page per profile. Recent chapters are listed, dated, in their own
/// language, newest first.
pub fn plan_pages(manifest: &Manifest, cache: &ChapterCache) -> Vec<AuthorPage> {
    let limit = manifest.site.author_pages.max_recent_chapters;
    manifest
        .authors
        .profiles
        .iter()
        .map(|author| {
            let mut stories = Vec::new();
            let mut recent = Vec::new();
            for story in &manifest.stories {
                let mut roles = Vec::new();
                for edition in cache.editions(&story.slug) {
                    for entry in &edition.chapters {
                        let chapter_roles = credited_roles(&manifest.authors, author, story, edition, entry);
                        for role in &chapter_roles {
                            if !roles.contains(role) {
                                roles.push(*role);
                            }
                        }
                        if chapter_roles.is_empty()
                            || entry.skip()
                            || entry.visibility.translation_missing
                        {
                            continue;
                        }
                        if let Some(published) = planner::parse_published(entry.published()) {
                            recent.push(RecentChapter {
                                story_title: story.title.clone(),
                                title: entry.title.clone(),
                                path: planner::chapter_path(&story.slug, &edition.lang, &entry.id),
                                published,
                                lang: edition.lang.clone(),
                            });
                        }
                    }
                }
                for (credit, role) in [
                    (story.config.author.as_deref(), Role::Author),
                    (story.config.translator.as_deref(), Role::Translator),
                ] {
                    if credit.is_some_and(|c| is_credited(&manifest.authors, author, c)) && !roles.contains(&role) {
                        roles.push(role);
                    }
                }
                if !roles.is_empty() {
                    roles.sort_by_key(|r| *r == Role::Translator);
                    stories.push(StoryCredit {
                        slug: story.slug.clone(),
                        title: story.title.clone(),
                        roles,
                        path: planner::toc_path(&story.slug, &story.primary_language),
                    });
                }
            }
            recent.sort_by(|a, b| b.published.cmp(&a.published));
            recent.truncate(limit);
            AuthorPage {
                author: author.clone(),
                stories,
                recent,
            }
        })
        .collect()
}

/// Roles `author` holds for one chapter edition. Chapter credits override the
/// story's; the story translator is credited only in translated editions.
fn credited_roles(
    authors: &Authors,
    author: &Author,
    story: &Story,
    edition: &LanguageEdition,
    entry: &ChapterEntry,
) -> Vec<Role> {
    let front = &entry.resolved.record.front;
    let mut roles = Vec::new();

    let writer = front.author.as_deref().or(story.config.author.as_deref());
    if writer.is_some_and(|w| is_credited(authors, author, w)) {
        roles.push(Role::Author);
    }

    let translator = front.translator.as_deref().or_else(|| {
        (!edition.is_primary && !entry.visibility.translation_missing)
            .then_some(story.config.translator.as_deref())
            .flatten()
    });
    if translator.is_some_and(|t| is_credited(authors, author, t)) {
        roles.push(Role::Translator);
    }
    roles
}

fn is_credited(authors: &Authors, author: &Author, credit: &str) -> bool {
    authors
        .find(credit)
        .is_some_and(|found| found.username == author.username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use crate::visibility::BuildOptions;

    const AUTHORS: &str = "jane:\n  name: Jane Doe\n  bio: Lighthouses.\n  twitter: '@jane'\npierre:\n  name: Pierre Martin\nghost:\n";

    #[test]
    fn load_profiles_sorted_with_name_fallback() {
        let site = SiteFixture::new();
        site.authors(AUTHORS);
        let authors = load_authors(site.root()).unwrap();
        let names: Vec<&str> = authors.profiles.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["ghost", "Jane Doe", "Pierre Martin"]);
        assert_eq!(authors.profiles[1].bio.as_deref(), Some("Lighthouses."));
    }

    #[test]
    fn missing_file_is_empty() {
        let site = SiteFixture::new();
        assert!(load_authors(site.root()).unwrap().is_empty());
    }

    #[test]
    fn malformed_file_is_error() {
        let site = SiteFixture::new();
        site.authors("jane: [unclosed");
        assert!(matches!(load_authors(site.root()), Err(AuthorsError::Yaml(_))));
    }

    #[test]
    fn find_exact_then_case_insensitive() {
        let site = SiteFixture::new();
        site.authors(AUTHORS);
        let authors = load_authors(site.root()).unwrap();
        assert_eq!(authors.find("Jane Doe").unwrap().username, "jane");
        assert_eq!(authors.find("  jane doe ").unwrap().username, "jane");
        assert!(authors.find("Nobody").is_none());
        assert!(authors.find("").is_none());
    }

    #[test]
    fn pages_credit_stories_and_recent_chapters() {
        let site = SiteFixture::new();
        site.authors(AUTHORS);
        site.site_config("author_pages:\n  max_recent_chapters: 2\n");
        site.story("novel")
            .config("title: Novel\nauthor: Jane Doe\ntranslator: pierre martin\n")
            .chapter("a", "---\npublished: 2024-01-01\n---\n")
            .chapter("b", "---\npublished: 2024-02-01\n---\n")
            .chapter("c", "---\npublished: 2024-03-01\nhidden: true\n---\n")
            .chapter("d", "---\npublished: 2024-04-01\n---\n")
            .translation("fr", "a", "---\npublished: 2024-05-01\n---\n");
        let manifest = site.scan();
        let cache = ChapterCache::build(&manifest, BuildOptions::default()).unwrap();
        let pages = plan_pages(&manifest, &cache);
        assert_eq!(pages.len(), 3);

        let jane = pages.iter().find(|p| p.author.username == "jane").unwrap();
        assert_eq!(jane.stories.len(), 1);
        assert_eq!(jane.stories[0].roles, vec![Role::Author]);
        assert_eq!(jane.stories[0].path, "/novel/en/toc/");
        let recent: Vec<&str> = jane.recent.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(recent, vec!["/novel/fr/a/", "/novel/en/d/"]);

        let pierre = pages.iter().find(|p| p.author.username == "pierre").unwrap();
        assert_eq!(pierre.stories[0].roles, vec![Role::Translator]);
        let recent: Vec<&str> = pierre.recent.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(recent, vec!["/novel/fr/a/"]);

        let ghost = pages.iter().find(|p| p.author.username == "ghost").unwrap();
        assert!(ghost.stories.is_empty());
        assert!(ghost.recent.is_empty());
    }
}
