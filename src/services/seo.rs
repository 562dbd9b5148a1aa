//! Search-engine metadata
//!
//! Page titles, Open Graph and Twitter card values, Person JSON-LD for public
//! profiles, and the crawler files (`sitemap.xml`, `robots.txt`, web manifest).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::services::profile::PublicProfileView;

pub const SITE_NAME: &str = "Mouth Metrics";
pub const SITE_DESCRIPTION: &str = "Elevate Your Professional Profile";

/// Routes listed in the sitemap
pub const SITEMAP_ROUTES: [&str; 5] = ["/", "/login", "/signup", "/forgot-password", "/profile"];

/// Metadata rendered into a page's `<head>`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub canonical_url: String,
    /// `og:type`
    pub og_type: String,
    pub image: Option<String>,
    /// `twitter:card`
    pub twitter_card: String,
    /// `noindex` for private pages
    pub noindex: bool,
}

impl PageMeta {
    /// Metadata for a plain page. `title` of `None` yields the site name alone.
    pub fn page(base_url: &str, path: &str, title: Option<&str>) -> Self {
        Self {
            title: match title {
                Some(t) => format!("{} | {}", t, SITE_NAME),
                None => SITE_NAME.to_string(),
            },
            description: SITE_DESCRIPTION.to_string(),
            canonical_url: absolute_url(base_url, path),
            og_type: "website".to_string(),
            image: None,
            twitter_card: "summary".to_string(),
            noindex: false,
        }
    }

    /// Signed-in pages are kept out of search indexes
    pub fn private(mut self) -> Self {
        self.noindex = true;
        self
    }

    /// Metadata for a public profile page
    pub fn profile(base_url: &str, view: &PublicProfileView) -> Self {
        let image = view.photo_url.clone();
        Self {
            title: format!("{} | {}", display_name(view), SITE_NAME),
            description: profile_description(view),
            canonical_url: profile_url(base_url, &view.slug),
            og_type: "profile".to_string(),
            twitter_card: if image.is_some() { "summary_large_image" } else { "summary" }.to_string(),
            image,
            noindex: false,
        }
    }
}

fn display_name(view: &PublicProfileView) -> &str {
    if view.name.is_empty() {
        "Profile"
    } else {
        &view.name
    }
}

fn absolute_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

pub fn profile_url(base_url: &str, slug: &str) -> String {
    absolute_url(base_url, &format!("/user/{}", urlencoding::encode(slug)))
}

/// The bio, or a sentence built from the profession labels
pub fn profile_description(view: &PublicProfileView) -> String {
    if !view.bio.trim().is_empty() {
        return view.bio.trim().to_string();
    }
    let name = display_name(view);
    let professions: Vec<&str> = view.professions.iter().map(|p| p.label.as_str()).collect();
    if professions.is_empty() {
        format!("View the professional profile of {} on {}.", name, SITE_NAME)
    } else {
        format!("{} ({}) on {}.", name, professions.join(", "), SITE_NAME)
    }
}

/// schema.org Person for a public profile
pub fn person_json_ld(base_url: &str, view: &PublicProfileView) -> Value {
    let mut person = json!({
        "@context": "https://schema.org",
        "@type": "Person",
        "name": view.name,
        "url": profile_url(base_url, &view.slug),
    });

    let job_title = view
        .professions
        .iter()
        .map(|p| p.label.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let honorific_suffix = view
        .qualifications
        .iter()
        .map(|q| q.label.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let links = &view.links;
    let same_as: Vec<&String> = [&links.linkedin, &links.twitter, &links.facebook, &links.pinterest, &links.website]
        .into_iter()
        .flatten()
        .collect();

    if let Some(obj) = person.as_object_mut() {
        if let Some(image) = &view.photo_url {
            obj.insert("image".to_string(), json!(image));
        }
        if !view.bio.is_empty() {
            obj.insert("description".to_string(), json!(view.bio));
        }
        if !job_title.is_empty() {
            obj.insert("jobTitle".to_string(), json!(job_title));
        }
        if !honorific_suffix.is_empty() {
            obj.insert("honorificSuffix".to_string(), json!(honorific_suffix));
        }
        obj.insert("sameAs".to_string(), json!(same_as));
    }
    person
}

/// Serialize JSON for a `<script type="application/ld+json">` body.
///
/// `<`, `>` and `&` are written as unicode escapes so the content can never
/// close the script element.
pub fn json_ld_script(value: &Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            other => out.push(other),
        }
    }
    out
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Sitemap of the static routes. Profiles are not listed: the users API has
/// no listing endpoint.
pub fn sitemap_xml(base_url: &str, last_modified: DateTime<Utc>) -> String {
    let lastmod = last_modified.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for route in SITEMAP_ROUTES {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", xml_escape(&absolute_url(base_url, route))));
        xml.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod));
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

pub fn robots_txt(base_url: &str) -> String {
    format!(
        "User-agent: *\nAllow: /\n\nSitemap: {}\n",
        absolute_url(base_url, "/sitemap.xml")
    )
}

pub fn web_manifest() -> Value {
    json!({
        "name": SITE_NAME,
        "short_name": SITE_NAME,
        "description": SITE_DESCRIPTION,
        "start_url": "/",
        "display": "standalone",
        "background_color": "#F5F5F5",
        "theme_color": "#7373B3",
        "icons": [
            { "src": "/static/icons/icon-192x192.png", "sizes": "192x192", "type": "image/png" },
            { "src": "/static/icons/icon-512x512.png", "sizes": "512x512", "type": "image/png" }
        ]
    })
}
