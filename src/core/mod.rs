pub mod middleware;

use self::middleware::{ApiKeyMiddleware, BearerTokenMiddleware};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;

#[cfg(test)]
mod tests;

/// Error envelope returned by Google REST APIs.
#[derive(Debug, Deserialize)]
pub struct FirebaseErrorResponse {
    pub error: FirebaseErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorDetails {
    pub code: u16,
    pub message: String,
    pub status: Option<String>,
    pub errors: Option<Vec<FirebaseSubError>>,
}

#[derive(Debug, Deserialize)]
pub struct FirebaseSubError {
    pub message: String,
    pub domain: Option<String>,
    pub reason: Option<String>,
}

impl FirebaseErrorResponse {
    pub fn display_message(&self) -> String {
        format!("{} (code: {})", self.error.message, self.error.code)
    }
}

pub async fn parse_error_response(response: reqwest::Response, default_msg: &str) -> String {
    let status = response.status();
    let message = match response.json::<FirebaseErrorResponse>().await {
        Ok(error_resp) => error_resp.display_message(),
        Err(_) => format!("{}: {}", default_msg, status),
    };
    tracing::debug!(%status, %message, "firebase API call failed");
    message
}

/// HTTP clients shared by the auth and firestore handles.
///
/// `retrying` retries transient failures with exponential backoff and is
/// used for reads and idempotent writes. `single_attempt` sends each request
/// once; it carries calls that create something server-side (new accounts,
/// documents with generated ids, outgoing emails), where a retry after an
/// ambiguous failure would create a duplicate.
#[derive(Clone)]
pub(crate) struct ApiClients {
    pub retrying: ClientWithMiddleware,
    pub single_attempt: ClientWithMiddleware,
}

impl ApiClients {
    /// Attaches the API key to every request when non-empty, and the bearer
    /// token when given.
    pub fn new(api_key: &str, id_token: Option<&str>) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let retrying = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy));

        Self {
            retrying: with_credentials(retrying, api_key, id_token).build(),
            single_attempt: with_credentials(ClientBuilder::new(Client::new()), api_key, id_token)
                .build(),
        }
    }

    #[cfg(test)]
    pub fn from_client(client: ClientWithMiddleware) -> Self {
        Self {
            retrying: client.clone(),
            single_attempt: client,
        }
    }
}

fn with_credentials(mut builder: ClientBuilder, api_key: &str, id_token: Option<&str>) -> ClientBuilder {
    if !api_key.is_empty() {
        builder = builder.with(ApiKeyMiddleware::new(api_key));
    }
    if let Some(token) = id_token {
        builder = builder.with(BearerTokenMiddleware::new(token));
    }
    builder
}
