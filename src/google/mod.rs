//! Google Workspace read-only clients.
//!
//! One authenticated HTTP client shared by the Docs, Sheets, and Drive
//! modules. Authentication is the service-account JWT grant: sign a
//! short-lived RS256 assertion, exchange it at the token endpoint, and
//! cache the bearer token until shortly before expiry.

pub mod docs;
pub mod drive;
pub mod sheets;

use anyhow::{Context, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::credentials::GoogleServiceAccount;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &str = "https://www.googleapis.com/auth/drive.readonly \
     https://www.googleapis.com/auth/documents.readonly \
     https://www.googleapis.com/auth/spreadsheets.readonly";

/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    fetched_at: Instant,
    ttl: Duration,
}

pub struct GoogleClient {
    http: reqwest::Client,
    account: GoogleServiceAccount,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleClient {
    pub fn new(http: reqwest::Client, account: GoogleServiceAccount) -> Self {
        Self {
            http,
            account,
            token: Mutex::new(None),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// A valid bearer token, reusing the cached one when it has more
    /// than [`EXPIRY_MARGIN`] left.
    pub async fn bearer_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.fetched_at.elapsed() + EXPIRY_MARGIN < cached.ttl {
                return Ok(cached.token.clone());
            }
        }

        let assertion = self.sign_assertion()?;
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("Failed to reach Google token endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Google token exchange failed ({}): {}", status, body);
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse Google token response")?;

        let bearer = token.access_token.clone();
        *guard = Some(CachedToken {
            token: token.access_token,
            fetched_at: Instant::now(),
            ttl: Duration::from_secs(token.expires_in),
        });
        Ok(bearer)
    }

    fn sign_assertion(&self) -> Result<String> {
        // Keys stored as JSON often carry literal \n escapes.
        let pem = self.account.private_key.replace("\\n", "\n");
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .context("Invalid service-account private key")?;

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .context("System clock before the epoch")?
            .as_secs();
        let claims = Claims {
            iss: &self.account.client_email,
            scope: SCOPES,
            aud: TOKEN_URL,
            iat: now,
            exp: now + 3600,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .context("Failed to sign service-account assertion")
    }
}
