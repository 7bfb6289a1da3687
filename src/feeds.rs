//! Text serializers for `robots.txt`, `sitemap.xml` and RSS 2.0 feeds.
//!
//! Inputs are the plain records from [`crate::planner`]; every interpolated
//! value goes through [`xml_escape`].

use crate::planner::{FeedItem, RobotsPlan, SitemapEntry};
use chrono::{NaiveDate, NaiveTime};

/// Channel-level fields of a feed.
#[derive(Debug, Clone)]
pub struct Channel<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub description: &'a str,
    /// Absolute URL of the feed itself, for the atom self link.
    pub self_link: &'a str,
}

pub fn robots_txt(plan: &RobotsPlan) -> String {
    let mut out = String::from("User-agent: *\n");
    if plan.disallow_all {
        out.push_str("Disallow: /\n");
    } else {
        out.push_str("Allow: /\n");
        for path in &plan.disallow {
            out.push_str(&format!("Disallow: {path}\n"));
        }
    }
    if let Some(sitemap) = &plan.sitemap {
        out.push_str(&format!("\nSitemap: {sitemap}\n"));
    }
    out
}

pub fn sitemap_xml(entries: &[SitemapEntry]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for entry in entries {
        out.push_str("  <url>\n");
        out.push_str(&format!("    <loc>{}</loc>\n", xml_escape(&entry.loc)));
        if let Some(lastmod) = entry.lastmod {
            out.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod.format("%Y-%m-%d")));
        }
        out.push_str("  </url>\n");
    }
    out.push_str("</urlset>\n");
    out
}

pub fn rss_xml(channel: &Channel<'_>, items: &[FeedItem]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\" xmlns:atom=\"http://www.w3.org/2005/Atom\">\n<channel>\n",
    );
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(channel.title)));
    out.push_str(&format!("  <link>{}</link>\n", xml_escape(channel.link)));
    out.push_str(&format!(
        "  <description>{}</description>\n",
        xml_escape(channel.description)
    ));
    out.push_str(&format!(
        "  <atom:link href=\"{}\" rel=\"self\" type=\"application/rss+xml\"/>\n",
        xml_escape(channel.self_link)
    ));
    if let Some(latest) = items.iter().map(|i| i.published).max() {
        out.push_str(&format!("  <lastBuildDate>{}</lastBuildDate>\n", rfc2822(latest)));
    }
    for item in items {
        out.push_str("  <item>\n");
        out.push_str(&format!("    <title>{}</title>\n", xml_escape(&item.title)));
        out.push_str(&format!("    <link>{}</link>\n", xml_escape(&item.link)));
        out.push_str(&format!(
            "    <guid isPermaLink=\"true\">{}</guid>\n",
            xml_escape(&item.link)
        ));
        if let Some(description) = &item.description {
            out.push_str(&format!(
                "    <description>{}</description>\n",
                xml_escape(description)
            ));
        }
        out.push_str(&format!("    <pubDate>{}</pubDate>\n", rfc2822(item.published)));
        out.push_str("  </item>\n");
    }
    out.push_str("</channel>\n</rss>\n");
    out
}

/// Midnight UTC of `date`, RFC 2822 formatted.
pub fn rfc2822(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN).and_utc().to_rfc2822()
}

pub fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
