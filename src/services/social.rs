//! Social profile links
//!
//! The editor stores only the path part ("slug") of a social profile URL and
//! rebuilds a full URL on save.

use serde::Serialize;

/// Supported social networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    LinkedIn,
    Twitter,
    Facebook,
    Pinterest,
}

impl Network {
    pub fn domain(self) -> &'static str {
        match self {
            Network::LinkedIn => "linkedin.com",
            Network::Twitter => "twitter.com",
            Network::Facebook => "facebook.com",
            Network::Pinterest => "pinterest.com",
        }
    }
}

/// Strip `http(s)://` and `www.` from the front of a prefix
fn bare_prefix(prefix: &str) -> &str {
    let rest = prefix
        .strip_prefix("https://")
        .or_else(|| prefix.strip_prefix("http://"))
        .unwrap_or(prefix);
    rest.strip_prefix("www.").unwrap_or(rest)
}

/// Extract the slug of `url` relative to `prefix` (e.g. `linkedin.com`).
///
/// The scheme and `www.` are optional in the URL. URLs that do not start
/// with the prefix are returned unchanged.
pub fn extract_slug(url: Option<&str>, prefix: &str) -> String {
    let url = match url {
        Some(u) if !u.is_empty() => u,
        _ => return String::new(),
    };

    let mut consistent = prefix.to_string();
    if !consistent.ends_with('/') {
        consistent.push('/');
    }
    let bare = bare_prefix(&consistent);

    for scheme in ["https://", "http://", ""] {
        let Some(rest) = url.strip_prefix(scheme) else {
            continue;
        };
        for www in ["www.", ""] {
            if let Some(slug) = rest.strip_prefix(www).and_then(|r| r.strip_prefix(bare)) {
                return slug.to_string();
            }
        }
    }
    url.to_string()
}

/// Full profile URL for a slug; an empty slug clears the link
pub fn build_url(network: Network, slug: &str) -> String {
    if slug.is_empty() {
        String::new()
    } else {
        format!("https://{}/{}", network.domain(), slug)
    }
}

/// Website links without a scheme get `https://`
pub fn full_website_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Avatar initials: first letters of the first and last word, or the first
/// two characters of a single word. `None` when there is no name.
pub fn initials(name: Option<&str>) -> Option<String> {
    let name = name.filter(|n| !n.is_empty())?;
    let words: Vec<&str> = name.split(' ').collect();
    if words.len() > 1 {
        let first = words[0].chars().next();
        let last = words[words.len() - 1].chars().next();
        Some(first.into_iter().chain(last).collect())
    } else {
        Some(name.chars().take(2).collect())
    }
}
