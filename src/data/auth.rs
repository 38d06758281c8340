//! Azure AD B2C refresh-token exchange for the WattiVahti portal.

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;

const TENANT: &str = "pesv";
const CLIENT_ID: &str = "84ebdb93-9ea6-42c7-bd7d-302abf7556fa";
const POLICY: &str = "B2C_1_Tunnistus_SignInv2";
const SCOPE: &str = "https://pesv.onmicrosoft.com/salpa/customer.read openid profile offline_access";

/// Tokens returned by a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    /// Present when the identity provider rotated the refresh token.
    pub refresh_token: Option<String>,
}

impl TokenSet {
    /// The rotated refresh token, if it differs from `previous`.
    pub fn rotated_from(&self, previous: &str) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .filter(|t| !t.is_empty() && *t != previous)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct B2cClient {
    client: Client,
    endpoint: String,
}

impl B2cClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_endpoint(token_endpoint())
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::auth(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Exchange `refresh_token` for a fresh access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AppError> {
        info!("Refreshing access token");
        let resp = self
            .client
            .post(&self.endpoint)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", CLIENT_ID),
                ("scope", SCOPE),
                ("refresh_token", refresh_token),
            ])
            .send()
            .map_err(|e| AppError::auth(format!("Token refresh request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| AppError::auth(format!("Failed to read token response: {e}")))?;

        if !status.is_success() {
            return Err(AppError::auth(format!(
                "Token refresh failed with status {status}: {}",
                describe_error(&body)
            )));
        }

        parse_token_response(&body)
    }
}

pub fn token_endpoint() -> String {
    format!("https://{TENANT}.b2clogin.com/{TENANT}.onmicrosoft.com/{POLICY}/oauth2/v2.0/token")
}

/// The portal accepts the ID token as a bearer when no access token is issued.
pub fn parse_token_response(body: &str) -> Result<TokenSet, AppError> {
    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|e| AppError::auth(format!("Failed to parse token response: {e}")))?;

    let access_token = parsed
        .access_token
        .filter(|t| !t.is_empty())
        .or(parsed.id_token.filter(|t| !t.is_empty()))
        .ok_or_else(|| AppError::auth("Token response contained neither access_token nor id_token."))?;

    Ok(TokenSet {
        access_token,
        refresh_token: parsed.refresh_token.filter(|t| !t.is_empty()),
    })
}

fn describe_error(body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(TokenErrorResponse {
            error_description: Some(desc),
            ..
        }) => desc.lines().next().unwrap_or_default().to_string(),
        Ok(TokenErrorResponse { error: Some(err), .. }) => err,
        _ => body.chars().take(200).collect(),
    }
}
