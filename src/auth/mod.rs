//! Firebase Authentication client.
//!
//! Talks to the Identity Toolkit and Secure Token APIs with the project's web
//! API key, the same way browser clients do. Server code that receives ID
//! tokens from those clients can check them with [`verifier::IdTokenVerifier`].

pub mod keys;
pub mod models;
pub mod verifier;

use crate::auth::models::{
    expiry_from_now, IdTokenRequest, LookupResponse, OobCodeRequest, ProfileUpdate,
    RefreshTokenResponse, SignInRequest, SignInResponse, UpdateAccountRequest, UserCredential,
    UserRecord,
};
use crate::auth::verifier::IdTokenVerifier;
use crate::core::{parse_error_response, ApiClients};
use crate::FirebaseApp;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;


#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("User not found")]
    UserNotFound,
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct FirebaseAuth {
    clients: ApiClients,
    project_id: String,
    identity_url: String,
    token_url: String,
}

impl FirebaseAuth {
    /// Derives the auth client from an app. No request is sent until an
    /// operation is called.
    pub fn new(app: &FirebaseApp) -> Self {
        let endpoints = app.endpoints();
        Self {
            clients: ApiClients::new(app.api_key(), None),
            project_id: app.project_id().to_string(),
            identity_url: endpoints.identity_toolkit.clone(),
            token_url: endpoints.secure_token.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn new_with_client(client: ClientWithMiddleware, base_url: String) -> Self {
        Self {
            clients: ApiClients::from_client(client),
            project_id: "test-project".to_string(),
            identity_url: format!("{}/identitytoolkit/v1", base_url),
            token_url: format!("{}/securetoken/v1", base_url),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Creates a verifier for ID tokens issued to this project.
    pub fn id_token_verifier(&self) -> IdTokenVerifier {
        IdTokenVerifier::new(self.project_id.clone())
    }

    async fn post<B, R>(&self, url: &str, body: &B, context: &str) -> Result<R, AuthError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        send_json(&self.clients.retrying, url, body, context).await
    }

    /// Like `post`, but never retried: the call creates an account or sends
    /// an email.
    async fn post_once<B, R>(&self, url: &str, body: &B, context: &str) -> Result<R, AuthError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        send_json(&self.clients.single_attempt, url, body, context).await
    }


    fn accounts_url(&self, method: &str) -> String {
        format!("{}/accounts:{}", self.identity_url, method)
    }

    pub async fn sign_up_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserCredential, AuthError> {
        let request = SignInRequest {
            email: Some(email),
            password: Some(password),
            return_secure_token: true,
        };
        let response: SignInResponse = self
            .post_once(&self.accounts_url("signUp"), &request, "Sign up failed")
            .await?;
        credential_from(response, true)
    }

    pub async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserCredential, AuthError> {
        let request = SignInRequest {
            email: Some(email),
            password: Some(password),
            return_secure_token: true,
        };
        let response: SignInResponse = self
            .post(
                &self.accounts_url("signInWithPassword"),
                &request,
                "Sign in failed",
            )
            .await?;
        credential_from(response, false)
    }

    /// Creates a new anonymous account and signs it in.
    pub async fn sign_in_anonymously(&self) -> Result<UserCredential, AuthError> {
        let request = SignInRequest {
            return_secure_token: true,
            ..Default::default()
        };
        let response: SignInResponse = self
            .post_once(&self.accounts_url("signUp"), &request, "Anonymous sign in failed")
            .await?;
        credential_from(response, true)
    }

    /// Exchanges a refresh token for a fresh ID token.
    pub async fn refresh_id_token(&self, refresh_token: &str) -> Result<UserCredential, AuthError> {
        let url = format!("{}/token", self.token_url);
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token)
            .finish();

        let response = self
            .clients
            .retrying
            .post(&url)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::ApiError(
                parse_error_response(response, "Token refresh failed").await,
            ));
        }

        let result: RefreshTokenResponse = response.json().await?;
        let expires_at = expiry_from_now(&result.expires_in).ok_or_else(|| {
            AuthError::ApiError(format!("Invalid expires_in: {}", result.expires_in))
        })?;

        Ok(UserCredential {
            local_id: result.user_id,
            email: None,
            id_token: result.id_token,
            refresh_token: result.refresh_token,
            expires_at,
            is_new_user: false,
        })
    }

    /// Fetches the account the ID token belongs to.
    pub async fn lookup(&self, id_token: &str) -> Result<UserRecord, AuthError> {
        let result: LookupResponse = self
            .post(
                &self.accounts_url("lookup"),
                &IdTokenRequest { id_token },
                "Lookup failed",
            )
            .await?;

        result
            .users
            .and_then(|mut users| users.pop())
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn send_password_reset_email(&self, email: &str) -> Result<(), AuthError> {
        let request = OobCodeRequest {
            request_type: "PASSWORD_RESET",
            email: Some(email),
            id_token: None,
        };
        let _: serde_json::Value = self
            .post_once(
                &self.accounts_url("sendOobCode"),
                &request,
                "Send password reset email failed",
            )
            .await?;
        Ok(())
    }

    pub async fn send_email_verification(&self, id_token: &str) -> Result<(), AuthError> {
        let request = OobCodeRequest {
            request_type: "VERIFY_EMAIL",
            email: None,
            id_token: Some(id_token),
        };
        let _: serde_json::Value = self
            .post_once(
                &self.accounts_url("sendOobCode"),
                &request,
                "Send email verification failed",
            )
            .await?;
        Ok(())
    }

    pub async fn update_profile(
        &self,
        id_token: &str,
        update: &ProfileUpdate,
    ) -> Result<UserRecord, AuthError> {
        let request = UpdateAccountRequest {
            id_token,
            display_name: update.display_name.as_deref(),
            photo_url: update.photo_url.as_deref(),
            return_secure_token: false,
        };
        self.post(&self.accounts_url("update"), &request, "Update profile failed")
            .await
    }

    /// Deletes the account the ID token belongs to.
    pub async fn delete_account(&self, id_token: &str) -> Result<(), AuthError> {
        let _: serde_json::Value = self
            .post(
                &self.accounts_url("delete"),
                &IdTokenRequest { id_token },
                "Delete account failed",
            )
            .await?;
        Ok(())
    }
}

async fn send_json<B, R>(
    client: &ClientWithMiddleware,
    url: &str,
    body: &B,
    context: &str,
) -> Result<R, AuthError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client
        .post(url)
        .header(header::CONTENT_TYPE, "application/json")
        .body(serde_json::to_vec(body)?)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AuthError::ApiError(parse_error_response(response, context).await));
    }

    Ok(response.json().await?)
}

fn credential_from(response: SignInResponse, is_new_user: bool) -> Result<UserCredential, AuthError> {
    let expires_at = expiry_from_now(&response.expires_in)
        .ok_or_else(|| AuthError::ApiError(format!("Invalid expiresIn: {}", response.expires_in)))?;

    Ok(UserCredential {
        local_id: response.local_id,
        email: response.email,
        id_token: response.id_token,
        refresh_token: response.refresh_token,
        expires_at,
        is_new_user: is_new_user && response.registered != Some(true),
    })
}
