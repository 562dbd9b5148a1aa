//! In-memory users API and identity provider for service and router tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::identity::{
    AccountInfo, AuthTokens, GoogleOAuth, IdentityError, IdentityProvider, RefreshedTokens,
    DEFAULT_TOKEN_LIFETIME_SECS,
};
use crate::models::{NewUser, ProfileUpdate, UserRecord};
use crate::users_api::{UserDirectory, UsersApiError};

#[derive(Default)]
struct DirectoryState {
    records: HashMap<String, UserRecord>,
    created: Vec<NewUser>,
    updates: Vec<(String, ProfileUpdate)>,
    slug_calls: usize,
    fail_updates: Option<String>,
    fail_creates: Option<String>,
}

/// Users API backed by a map of records
#[derive(Default)]
pub struct FakeDirectory {
    state: Mutex<DirectoryState>,
}

impl FakeDirectory {
    pub fn with_record(record: UserRecord) -> Self {
        let dir = Self::default();
        dir.insert(record);
        dir
    }

    pub fn insert(&self, record: UserRecord) {
        let uid = record.uid.clone().unwrap_or_default();
        self.state.lock().unwrap().records.insert(uid, record);
    }

    pub fn created(&self) -> Vec<NewUser> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn updates(&self) -> Vec<(String, ProfileUpdate)> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn slug_calls(&self) -> usize {
        self.state.lock().unwrap().slug_calls
    }

    pub fn fail_updates(&self, message: &str) {
        self.state.lock().unwrap().fail_updates = Some(message.to_string());
    }

    pub fn fail_creates(&self, message: &str) {
        self.state.lock().unwrap().fail_creates = Some(message.to_string());
    }
}

fn remote(status: u16, message: &str) -> UsersApiError {
    UsersApiError::Remote {
        status,
        message: message.to_string(),
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn create_user(&self, user: &NewUser) -> Result<serde_json::Value, UsersApiError> {
        let mut state = self.state.lock().unwrap();
        state.created.push(user.clone());
        if let Some(message) = &state.fail_creates {
            return Err(remote(409, message));
        }
        let record = UserRecord {
            uid: Some(user.uid.clone()),
            email: user.email.clone(),
            name: user.name.clone(),
            ..Default::default()
        };
        state.records.entry(user.uid.clone()).or_insert(record);
        Ok(serde_json::json!({ "uid": user.uid }))
    }

    async fn update_user(&self, uid: &str, update: &ProfileUpdate) -> Result<serde_json::Value, UsersApiError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_updates {
            return Err(remote(400, message));
        }
        state.updates.push((uid.to_string(), update.clone()));
        let record = state
            .records
            .get_mut(uid)
            .ok_or_else(|| remote(404, "An error occurred while updating your profile. Status: 404"))?;
        record.qualification = update.qualification.clone();
        record.profession = update.profession.clone();
        record.linkedin_url = Some(update.linkedin_url.clone());
        record.twitter_url = Some(update.twitter_url.clone());
        record.website_url = Some(update.website_url.clone());
        record.facebook_url = Some(update.facebook_url.clone());
        record.pinterest_url = Some(update.pinterest_url.clone());
        Ok(serde_json::json!({ "uid": uid }))
    }

    async fn get_user(&self, uid: &str) -> Result<UserRecord, UsersApiError> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(uid)
            .cloned()
            .ok_or_else(|| remote(404, "Error fetching user data. Status: 404"))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<UserRecord, UsersApiError> {
        let mut state = self.state.lock().unwrap();
        state.slug_calls += 1;
        state
            .records
            .values()
            .find(|r| r.slug_url.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(slug)))
            .cloned()
            .ok_or_else(|| remote(404, "Could not find user."))
    }
}

#[derive(Clone)]
struct FakeAccount {
    uid: String,
    email: String,
    password: String,
    verified: bool,
    display_name: Option<String>,
    /// Bumped when issued ID tokens are revoked
    generation: u32,
    /// Created through Google; has no password
    federated: bool,
}

impl FakeAccount {
    fn new(email: &str, password: &str, verified: bool) -> Self {
        FakeAccount {
            uid: format!("uid-{}", email),
            email: email.to_string(),
            password: password.to_string(),
            verified,
            display_name: None,
            generation: 0,
            federated: false,
        }
    }

    fn id_token(&self) -> String {
        match self.generation {
            0 => format!("token-{}", self.uid),
            n => format!("token-{}-{}", self.uid, n),
        }
    }

    fn refresh_token(&self) -> String {
        format!("refresh-{}", self.uid)
    }
}

#[derive(Default)]
struct IdentityState {
    accounts: Vec<FakeAccount>,
    /// Google ID token -> (email, name)
    google_tokens: HashMap<String, (String, Option<String>)>,
    token_lifetime: Option<u64>,
    refresh_calls: usize,
    verify_codes: HashMap<String, String>,
    reset_codes: HashMap<String, String>,
    expired_codes: HashSet<String>,
    verification_emails: Vec<(String, String)>,
    reset_emails: Vec<String>,
    failure: Option<IdentityError>,
}

impl IdentityState {
    fn check(&self) -> Result<(), IdentityError> {
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Revoked and unknown tokens are both rejected as expired
    fn by_token(&mut self, id_token: &str) -> Result<&mut FakeAccount, IdentityError> {
        self.accounts
            .iter_mut()
            .find(|a| a.id_token() == id_token)
            .ok_or(IdentityError::TokenExpired)
    }

    fn tokens(&self, account: &FakeAccount) -> AuthTokens {
        AuthTokens {
            uid: account.uid.clone(),
            email: account.email.clone(),
            display_name: account.display_name.clone(),
            id_token: account.id_token(),
            refresh_token: account.refresh_token(),
            expires_in: self.token_lifetime.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
        }
    }

    fn by_email(&mut self, email: &str) -> Option<&mut FakeAccount> {
        self.accounts.iter_mut().find(|a| a.email.eq_ignore_ascii_case(email))
    }

    fn code_email(&self, codes: &HashMap<String, String>, code: &str) -> Result<String, IdentityError> {
        if self.expired_codes.contains(code) {
            return Err(IdentityError::ExpiredActionCode);
        }
        codes.get(code).cloned().ok_or(IdentityError::InvalidActionCode)
    }
}

/// Identity provider with accounts and action codes held in memory
#[derive(Default)]
pub struct FakeIdentity {
    state: Mutex<IdentityState>,
}

impl FakeIdentity {
    pub fn add_account(&self, email: &str, password: &str, verified: bool) {
        self.state
            .lock()
            .unwrap()
            .accounts
            .push(FakeAccount::new(email, password, verified));
    }

    /// Lifetime reported for ID tokens issued from now on
    pub fn set_token_lifetime(&self, seconds: u64) {
        self.state.lock().unwrap().token_lifetime = Some(seconds);
    }

    /// Revoke every ID token issued for `email`; the refresh token stays valid
    pub fn expire_tokens(&self, email: &str) {
        if let Some(account) = self.state.lock().unwrap().by_email(email) {
            account.generation += 1;
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.lock().unwrap().refresh_calls
    }

    /// Accept `google_token` as a Google ID token for `email`
    pub fn add_google_token(&self, google_token: &str, email: &str, name: Option<&str>) {
        self.state
            .lock()
            .unwrap()
            .google_tokens
            .insert(google_token.to_string(), (email.to_string(), name.map(String::from)));
    }

    /// Every later call fails with `error`
    pub fn fail_with(&self, error: IdentityError) {
        self.state.lock().unwrap().failure = Some(error);
    }

    pub fn add_verify_code(&self, code: &str, email: &str) {
        self.state
            .lock()
            .unwrap()
            .verify_codes
            .insert(code.to_string(), email.to_string());
    }

    pub fn add_reset_code(&self, code: &str, email: &str) {
        self.state
            .lock()
            .unwrap()
            .reset_codes
            .insert(code.to_string(), email.to_string());
    }

    pub fn add_expired_code(&self, code: &str) {
        self.state.lock().unwrap().expired_codes.insert(code.to_string());
    }

    pub fn set_verified(&self, email: &str) {
        if let Some(account) = self.state.lock().unwrap().by_email(email) {
            account.verified = true;
        }
    }

    pub fn is_verified(&self, email: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .by_email(email)
            .map(|a| a.verified)
            .unwrap_or(false)
    }

    pub fn display_name(&self, email: &str) -> Option<String> {
        self.state.lock().unwrap().by_email(email).and_then(|a| a.display_name.clone())
    }

    /// (email, continue URL) per verification email sent
    pub fn verification_emails(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().verification_emails.clone()
    }

    pub fn reset_emails(&self) -> Vec<String> {
        self.state.lock().unwrap().reset_emails.clone()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthTokens, IdentityError> {
        let mut state = self.state.lock().unwrap();
        state.check()?;
        match state.by_email(email) {
            Some(account) if !account.federated && account.password == password => {
                let account = account.clone();
                Ok(state.tokens(&account))
            }
            _ => Err(IdentityError::InvalidCredentials),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthTokens, IdentityError> {
        let mut state = self.state.lock().unwrap();
        state.check()?;
        if state.by_email(email).is_some() {
            return Err(IdentityError::EmailExists);
        }
        let account = FakeAccount::new(email, password, false);
        let result = state.tokens(&account);
        state.accounts.push(account);
        Ok(result)
    }

    async fn update_display_name(&self, id_token: &str, display_name: &str) -> Result<(), IdentityError> {
        let mut state = self.state.lock().unwrap();
        state.check()?;
        state.by_token(id_token)?.display_name = Some(display_name.to_string());
        Ok(())
    }

    async fn lookup(&self, id_token: &str) -> Result<AccountInfo, IdentityError> {
        let mut state = self.state.lock().unwrap();
        state.check()?;
        let account = state.by_token(id_token)?;
        Ok(AccountInfo {
            uid: account.uid.clone(),
            email: account.email.clone(),
            email_verified: account.verified,
            display_name: account.display_name.clone(),
            photo_url: None,
        })
    }

    async fn send_email_verification(&self, id_token: &str, continue_url: &str) -> Result<(), IdentityError> {
        let mut state = self.state.lock().unwrap();
        state.check()?;
        let email = state.by_token(id_token)?.email.clone();
        state.verification_emails.push((email, continue_url.to_string()));
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, _continue_url: &str) -> Result<(), IdentityError> {
        let mut state = self.state.lock().unwrap();
        state.check()?;
        state.reset_emails.push(email.to_string());
        Ok(())
    }

    async fn verify_password_reset_code(&self, oob_code: &str) -> Result<String, IdentityError> {
        let state = self.state.lock().unwrap();
        state.check()?;
        state.code_email(&state.reset_codes, oob_code)
    }

    async fn confirm_password_reset(&self, oob_code: &str, new_password: &str) -> Result<(), IdentityError> {
        let mut state = self.state.lock().unwrap();
        state.check()?;
        let email = state.code_email(&state.reset_codes, oob_code)?;
        state.reset_codes.remove(oob_code);
        if let Some(account) = state.by_email(&email) {
            account.password = new_password.to_string();
        }
        Ok(())
    }

    async fn apply_action_code(&self, oob_code: &str) -> Result<(), IdentityError> {
        let mut state = self.state.lock().unwrap();
        state.check()?;
        let email = state.code_email(&state.verify_codes, oob_code)?;
        state.verify_codes.remove(oob_code);
        if let Some(account) = state.by_email(&email) {
            account.verified = true;
        }
        Ok(())
    }

    async fn refresh_id_token(&self, refresh_token: &str) -> Result<RefreshedTokens, IdentityError> {
        let mut state = self.state.lock().unwrap();
        state.check()?;
        state.refresh_calls += 1;
        let lifetime = state.token_lifetime.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.refresh_token() == refresh_token)
            .ok_or_else(|| IdentityError::Provider("INVALID_REFRESH_TOKEN".to_string()))?;
        account.generation += 1;
        Ok(RefreshedTokens {
            id_token: account.id_token(),
            refresh_token: account.refresh_token(),
            expires_in: lifetime,
        })
    }

    async fn sign_in_with_google(&self, google_id_token: &str, _request_uri: &str) -> Result<AuthTokens, IdentityError> {
        let mut state = self.state.lock().unwrap();
        state.check()?;
        let (email, name) = state
            .google_tokens
            .get(google_id_token)
            .cloned()
            .ok_or_else(|| IdentityError::Provider("INVALID_IDP_RESPONSE".to_string()))?;
        let account = match state.by_email(&email) {
            Some(existing) if !existing.federated => {
                return Err(IdentityError::AccountExistsWithDifferentCredential)
            }
            Some(existing) => existing.clone(),
            None => {
                let mut account = FakeAccount::new(&email, "", true);
                account.federated = true;
                account.display_name = name;
                state.accounts.push(account.clone());
                account
            }
        };
        Ok(state.tokens(&account))
    }
}

/// Google consent flow that maps authorization codes to Google ID tokens
#[derive(Default)]
pub struct FakeGoogle {
    codes: Mutex<HashMap<String, String>>,
}

impl FakeGoogle {
    pub fn add_code(&self, code: &str, google_token: &str) {
        self.codes
            .lock()
            .unwrap()
            .insert(code.to_string(), google_token.to_string());
    }
}

#[async_trait]
impl GoogleOAuth for FakeGoogle {
    fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "https://accounts.google.test/auth?redirect_uri={}&state={}",
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<String, IdentityError> {
        self.codes
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| IdentityError::Provider("invalid_grant".to_string()))
    }
}
