//! User record model
//!
//! Shapes exchanged with the remote users API. Field names follow the
//! camelCase names the API uses on the wire.

use serde::{Deserialize, Deserializer, Serialize};

/// User record as returned by `GET /users/{uid}` and `GET /users/slug/{slug}`.
///
/// Every field is optional; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(rename = "slugURL", default, skip_serializing_if = "Option::is_none")]
    pub slug_url: Option<String>,
    /// Qualification values, normalized from an array or a comma-separated string
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub qualification: Vec<String>,
    /// Profession values, normalized like `qualification`
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub profession: Vec<String>,
    #[serde(rename = "linkedinURL", default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(rename = "twitterURL", default, skip_serializing_if = "Option::is_none")]
    pub twitter_url: Option<String>,
    #[serde(rename = "websiteURL", default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(rename = "facebookURL", default, skip_serializing_if = "Option::is_none")]
    pub facebook_url: Option<String>,
    #[serde(rename = "pinterestURL", default, skip_serializing_if = "Option::is_none")]
    pub pinterest_url: Option<String>,
}

/// Body of `PUT /users`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Body of `PATCH /users/{uid}`. The uid travels in the path only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub qualification: Vec<String>,
    pub profession: Vec<String>,
    #[serde(rename = "linkedinURL")]
    pub linkedin_url: String,
    #[serde(rename = "twitterURL")]
    pub twitter_url: String,
    #[serde(rename = "websiteURL")]
    pub website_url: String,
    #[serde(rename = "facebookURL")]
    pub facebook_url: String,
    #[serde(rename = "pinterestURL")]
    pub pinterest_url: String,
    #[serde(rename = "confirmationText", default, skip_serializing_if = "Option::is_none")]
    pub confirmation_text: Option<String>,
    /// RFC 3339 timestamp of the confirmation
    #[serde(rename = "confirmationTimestamp", default, skip_serializing_if = "Option::is_none")]
    pub confirmation_timestamp: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStringList {
    List(Vec<Option<String>>),
    Joined(String),
}

/// Normalize a list of raw values: trim every entry and drop empty ones.
pub fn normalize_list<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Split a comma-separated string into a normalized list.
pub fn split_list(joined: &str) -> Vec<String> {
    normalize_list(joined.split(','))
}

fn deserialize_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawStringList>::deserialize(deserializer)?;
    Ok(match raw {
        None => Vec::new(),
        Some(RawStringList::Joined(s)) => split_list(&s),
        Some(RawStringList::List(items)) => normalize_list(items.into_iter().flatten()),
    })
}
