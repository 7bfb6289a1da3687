//! # Quire
//!
//! A static site generator for serialized web novels. Stories are directories
//! under `content/`, chapters are markdown files with YAML front matter, and
//! translations live in two-letter language subdirectories.
//!
//! # Architecture: Scan, Resolve, Generate
//!
//! ```text
//! 1. Scan      source/   →  Manifest       (filesystem → structured data)
//! 2. Resolve   Manifest  →  ChapterCache   (language fallback + visibility, once per chapter)
//! 3. Generate  cache     →  output/        (HTML, feeds, sitemap, EPUB)
//! ```
//!
//! Every page, feed and e-book is derived from the same [`cache::ChapterCache`],
//! so a chapter that is hidden from the table of contents is hidden from the
//! tag index, the RSS feed and the EPUB too. Classification happens in exactly
//! one place: [`visibility::classify`].
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Loads site config, authors and story configs into a [`scan::Manifest`] |
//! | [`metadata`] | Front-matter splitting and typed chapter metadata |
//! | [`language`] | Per-chapter language resolution with primary-language fallback |
//! | [`config`] | Site and story config types, stock defaults, display-setting cascade |
//! | [`resolve`] | Effective settings, SEO fields and navigation for a chapter |
//! | [`visibility`] | Chapter states and the listing rule |
//! | [`cache`] | Resolved chapters and per-edition listings, built in parallel |
//! | [`tags`] | Tag index over listed chapters |
//! | [`images`] | Chapter image addressing, copying and cover placement |
//! | [`cipher`] | Password-derived XOR cipher for protected chapter bodies |
//! | [`planner`] | Output paths and per-story artifact plans |
//! | [`naming`] | Slugs for tags and arcs, hash prefixes |
//! | [`authors`] | Author profiles and per-author pages |
//! | [`feeds`] | RSS, sitemap and robots.txt |
//! | [`html`] | Maud page templates |
//! | [`epub`] | EPUB planning, assembly and download links |
//! | [`generate`] | Orchestrates the full build into the output directory |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | `tracing` subscriber setup for the binary |
//!
//! # Design Decisions
//!
//! ## Pages for Everything, Listings for Some
//!
//! Every declared chapter gets a page in every language, including hidden and
//! draft chapters, so that direct links keep working. Only *listed* chapters
//! (visible, or draft with `--include-drafts`) appear in tables of contents,
//! navigation, tags, feeds, the sitemap and e-books.
//!
//! ## Protected Chapters Are Encrypted at Rest
//!
//! A chapter with a password is rendered as ciphertext plus a short verifier.
//! The reader's browser derives the key with SubtleCrypto and decrypts in place.
//! This keeps casual readers out, nothing more: the key is a plain SHA-256 of
//! the password.
//!
//! ## Maud Templates
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/). Interpolation is
//! auto-escaped and templates are checked at compile time.

pub mod authors;
pub mod cache;
pub mod cipher;
pub mod config;
pub mod epub;
pub mod feeds;
pub mod generate;
pub mod html;
pub mod images;
pub mod language;
pub mod logging;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod planner;
pub mod resolve;
pub mod scan;
pub mod tags;
pub mod visibility;

#[cfg(test)]
pub(crate) mod test_helpers;
