//! Profile service
//!
//! Business logic for the profile editor, the public profile page and the
//! one-time account sync with the users API:
//! - Editor: fetch the record and present social links as slugs
//! - Save: confirmation required, reference values checked, links rebuilt
//! - Public profile: fetched by slug and cached
//! - Sync: create the remote record once per account

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheLayer, MemoryCache};
use crate::models::reference::{self, is_profession, is_qualification};
use crate::models::{normalize_list, NewUser, ProfileUpdate, Session, UserRecord};
use crate::services::social::{build_url, extract_slug, full_website_url, initials, Network};
use crate::users_api::{UserDirectory, UsersApiError};

/// Text the user agrees to before a save goes through
pub const CONFIRMATION_TEXT: &str = "I agree that this is personal data.";

/// Synced accounts are remembered for this long
const SYNC_MEMORY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

fn profile_key(slug: &str) -> String {
    format!("profile:{}", slug)
}

/// Request slugs that resolved to the record whose slugURL is `slug`
fn profile_aliases_key(slug: &str) -> String {
    format!("profile-aliases:{}", slug)
}

fn synced_key(uid: &str) -> String {
    format!("synced:{}", uid)
}

/// Error types for profile operations
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Please confirm that this information is personal data before saving.")]
    ConfirmationRequired,

    #[error("Unknown qualification: {0}")]
    UnknownQualification(String),

    #[error("Unknown profession: {0}")]
    UnknownProfession(String),

    /// Message from the users API
    #[error("{0}")]
    Api(#[from] UsersApiError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl ProfileError {
    /// Errors the user can fix by changing the form
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ProfileError::ConfirmationRequired
                | ProfileError::UnknownQualification(_)
                | ProfileError::UnknownProfession(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProfileError::Api(e) if e.is_not_found())
    }
}

/// Profile editor state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditorView {
    pub name: String,
    pub email: String,
    pub slug: Option<String>,
    pub initials: String,
    pub qualifications: Vec<String>,
    pub professions: Vec<String>,
    pub linkedin_slug: String,
    pub twitter_slug: String,
    pub facebook_slug: String,
    pub pinterest_slug: String,
    pub website_url: String,
}

impl EditorView {
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            name: record.name.clone().unwrap_or_default(),
            email: record.email.clone().unwrap_or_default(),
            slug: record.slug_url.clone().filter(|s| !s.is_empty()),
            initials: initials(record.name.as_deref()).unwrap_or_else(|| "..".to_string()),
            qualifications: record.qualification.clone(),
            professions: record.profession.clone(),
            linkedin_slug: extract_slug(record.linkedin_url.as_deref(), Network::LinkedIn.domain()),
            twitter_slug: extract_slug(record.twitter_url.as_deref(), Network::Twitter.domain()),
            facebook_slug: extract_slug(record.facebook_url.as_deref(), Network::Facebook.domain()),
            pinterest_slug: extract_slug(record.pinterest_url.as_deref(), Network::Pinterest.domain()),
            website_url: record.website_url.clone().unwrap_or_default(),
        }
    }
}

/// Submitted editor form
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileForm {
    #[serde(default)]
    pub qualification: Vec<String>,
    #[serde(default)]
    pub profession: Vec<String>,
    #[serde(default)]
    pub linkedin_slug: String,
    #[serde(default)]
    pub twitter_slug: String,
    #[serde(default)]
    pub facebook_slug: String,
    #[serde(default)]
    pub pinterest_slug: String,
    #[serde(rename = "websiteURL", default)]
    pub website_url: String,
    /// Personal-data confirmation checkbox
    #[serde(default)]
    pub confirmed: bool,
}

impl ProfileForm {
    /// Build from urlencoded pairs, where multi-selects repeat their key
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut form = ProfileForm::default();
        for (key, value) in pairs {
            match key.as_str() {
                "qualification" => form.qualification.push(value.clone()),
                "profession" => form.profession.push(value.clone()),
                "linkedinSlug" => form.linkedin_slug = value.clone(),
                "twitterSlug" => form.twitter_slug = value.clone(),
                "facebookSlug" => form.facebook_slug = value.clone(),
                "pinterestSlug" => form.pinterest_slug = value.clone(),
                "websiteURL" => form.website_url = value.clone(),
                "confirmed" => form.confirmed = matches!(value.as_str(), "on" | "true" | "1" | "yes"),
                _ => {}
            }
        }
        form
    }

    /// Editor state to re-render after a rejected save
    pub fn to_editor(&self, base: &EditorView) -> EditorView {
        EditorView {
            qualifications: normalize_list(&self.qualification),
            professions: normalize_list(&self.profession),
            linkedin_slug: self.linkedin_slug.trim().to_string(),
            twitter_slug: self.twitter_slug.trim().to_string(),
            facebook_slug: self.facebook_slug.trim().to_string(),
            pinterest_slug: self.pinterest_slug.trim().to_string(),
            website_url: self.website_url.trim().to_string(),
            ..base.clone()
        }
    }

    /// Validate and convert into the users API update body
    pub fn into_update(self) -> Result<ProfileUpdate, ProfileError> {
        if !self.confirmed {
            return Err(ProfileError::ConfirmationRequired);
        }

        let qualification = normalize_list(&self.qualification);
        if let Some(unknown) = qualification.iter().find(|q| !is_qualification(q)) {
            return Err(ProfileError::UnknownQualification(unknown.clone()));
        }
        let profession = normalize_list(&self.profession);
        if let Some(unknown) = profession.iter().find(|p| !is_profession(p)) {
            return Err(ProfileError::UnknownProfession(unknown.clone()));
        }

        Ok(ProfileUpdate {
            qualification,
            profession,
            linkedin_url: build_url(Network::LinkedIn, self.linkedin_slug.trim()),
            twitter_url: build_url(Network::Twitter, self.twitter_slug.trim()),
            website_url: self.website_url.trim().to_string(),
            facebook_url: build_url(Network::Facebook, self.facebook_slug.trim()),
            pinterest_url: build_url(Network::Pinterest, self.pinterest_slug.trim()),
            confirmation_text: Some(CONFIRMATION_TEXT.to_string()),
            confirmation_timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        })
    }
}

/// A reference value with its display label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Labeled {
    pub value: String,
    pub label: String,
}

/// Links shown on the public profile; empty values are omitted
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SocialLinks {
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub facebook: Option<String>,
    pub pinterest: Option<String>,
    /// Website with a scheme added when missing
    pub website: Option<String>,
}

impl SocialLinks {
    pub fn is_empty(&self) -> bool {
        self.linkedin.is_none()
            && self.twitter.is_none()
            && self.facebook.is_none()
            && self.pinterest.is_none()
            && self.website.is_none()
    }
}

/// Public profile page state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicProfileView {
    pub name: String,
    pub bio: String,
    pub photo_url: Option<String>,
    pub initials: Option<String>,
    pub slug: String,
    pub professions: Vec<Labeled>,
    pub qualifications: Vec<Labeled>,
    pub links: SocialLinks,
    pub has_links: bool,
    /// Nothing beyond name and bio to show
    pub no_details: bool,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

impl PublicProfileView {
    pub fn from_record(record: &UserRecord, slug: &str) -> Self {
        let links = SocialLinks {
            linkedin: non_empty(&record.linkedin_url),
            twitter: non_empty(&record.twitter_url),
            facebook: non_empty(&record.facebook_url),
            pinterest: non_empty(&record.pinterest_url),
            website: non_empty(&record.website_url).map(|w| full_website_url(&w)),
        };
        let no_details = record.profession.is_empty()
            && record.qualification.is_empty()
            && links.linkedin.is_none()
            && links.twitter.is_none()
            && links.website.is_none();

        Self {
            name: record.name.clone().unwrap_or_default(),
            bio: record.bio.clone().unwrap_or_default(),
            photo_url: non_empty(&record.photo_url),
            initials: initials(record.name.as_deref()),
            slug: record.slug_url.clone().unwrap_or_else(|| slug.to_string()),
            professions: record
                .profession
                .iter()
                .map(|p| Labeled {
                    value: p.clone(),
                    label: reference::profession_label(p).to_string(),
                })
                .collect(),
            qualifications: record
                .qualification
                .iter()
                .map(|q| Labeled {
                    value: q.clone(),
                    label: reference::qualification_label(q).to_string(),
                })
                .collect(),
            has_links: !links.is_empty(),
            links,
            no_details,
        }
    }
}

/// Result of an account sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Created,
    /// The remote service already had the record
    AlreadyExists,
    /// Synced earlier by this process; nothing sent
    Skipped,
}

/// Profile service
pub struct ProfileService {
    users: Arc<dyn UserDirectory>,
    cache: Arc<MemoryCache>,
    profile_ttl: Duration,
}

impl ProfileService {
    pub fn new(users: Arc<dyn UserDirectory>, cache: Arc<MemoryCache>, profile_ttl_seconds: u64) -> Self {
        Self {
            users,
            cache,
            profile_ttl: Duration::from_secs(profile_ttl_seconds),
        }
    }

    /// Load the editor state for an account
    pub async fn load_editor(&self, uid: &str) -> Result<EditorView, ProfileError> {
        let record = self.users.get_user(uid).await?;
        Ok(EditorView::from_record(&record))
    }

    /// Save the editor form. Returns the refreshed editor state.
    pub async fn save(&self, uid: &str, form: ProfileForm) -> Result<EditorView, ProfileError> {
        let update = form.into_update()?;
        self.users.update_user(uid, &update).await?;
        tracing::info!(uid = %uid, "Profile updated");

        match self.users.get_user(uid).await {
            Ok(record) => {
                if let Some(slug) = record.slug_url.as_deref().filter(|s| !s.is_empty()) {
                    self.invalidate_public_profile(slug).await?;
                }
                Ok(EditorView::from_record(&record))
            }
            Err(e) => {
                tracing::warn!(uid = %uid, "Could not reload profile after save: {}", e);
                self.cache.delete_pattern("profile:*").await?;
                Ok(EditorView {
                    qualifications: update.qualification,
                    professions: update.profession,
                    linkedin_slug: extract_slug(Some(&update.linkedin_url), Network::LinkedIn.domain()),
                    twitter_slug: extract_slug(Some(&update.twitter_url), Network::Twitter.domain()),
                    facebook_slug: extract_slug(Some(&update.facebook_url), Network::Facebook.domain()),
                    pinterest_slug: extract_slug(Some(&update.pinterest_url), Network::Pinterest.domain()),
                    website_url: update.website_url,
                    initials: "..".to_string(),
                    ..Default::default()
                })
            }
        }
    }

    /// Fetch a public profile record by slug, served from cache when fresh
    pub async fn public_profile(&self, slug: &str) -> Result<UserRecord, ProfileError> {
        let key = profile_key(slug);
        if let Some(record) = self.cache.get::<UserRecord>(&key).await? {
            tracing::debug!(slug = %slug, "Public profile cache hit");
            return Ok(record);
        }

        let record = self.users.get_by_slug(slug).await?;
        self.cache.set(&key, &record, self.profile_ttl).await?;
        if let Some(canonical) = record.slug_url.as_deref().filter(|s| !s.is_empty() && *s != slug) {
            let aliases_key = profile_aliases_key(canonical);
            let mut aliases: Vec<String> = self.cache.get(&aliases_key).await?.unwrap_or_default();
            if !aliases.iter().any(|a| a == slug) {
                aliases.push(slug.to_string());
            }
            // outlives every alias entry it lists
            self.cache.set(&aliases_key, &aliases, self.profile_ttl).await?;
        }
        Ok(record)
    }

    /// Drop the cached record under its slugURL and every alias it was fetched by
    async fn invalidate_public_profile(&self, slug: &str) -> Result<(), ProfileError> {
        self.cache.delete(&profile_key(slug)).await?;
        let aliases_key = profile_aliases_key(slug);
        if let Some(aliases) = self.cache.get::<Vec<String>>(&aliases_key).await? {
            for alias in aliases {
                self.cache.delete(&profile_key(&alias)).await?;
            }
            self.cache.delete(&aliases_key).await?;
        }
        Ok(())
    }

    /// Create the remote record for a signed-in account, once per uid
    pub async fn sync_account(&self, session: &Session) -> Result<SyncOutcome, ProfileError> {
        let key = synced_key(&session.uid);
        if self.cache.get::<bool>(&key).await?.unwrap_or(false) {
            return Ok(SyncOutcome::Skipped);
        }

        let user = NewUser {
            uid: session.uid.clone(),
            email: Some(session.email.clone()).filter(|e| !e.is_empty()),
            name: session.display_name.clone(),
        };

        let outcome = match self.users.create_user(&user).await {
            Ok(_) => SyncOutcome::Created,
            Err(e) if e.to_string().contains("User already exists") => SyncOutcome::AlreadyExists,
            Err(e) => {
                tracing::error!(uid = %session.uid, "Account sync failed: {}", e);
                return Err(e.into());
            }
        };

        self.cache.set(&key, &true, SYNC_MEMORY).await?;
        tracing::info!(uid = %session.uid, outcome = ?outcome, "Account synced");
        Ok(outcome)
    }
}
