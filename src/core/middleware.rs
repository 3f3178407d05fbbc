use http::Extensions;
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next};

/// Appends the project's web API key as the `key` query parameter.
///
/// This is how browser-side Firebase clients identify the project to
/// Identity Toolkit, Secure Token and Firestore.
#[derive(Clone)]
pub struct ApiKeyMiddleware {
    api_key: String,
}

impl ApiKeyMiddleware {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

#[async_trait::async_trait]
impl Middleware for ApiKeyMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        req.url_mut()
            .query_pairs_mut()
            .append_pair("key", &self.api_key);

        next.run(req, extensions).await
    }
}

/// Sends requests on behalf of a signed-in user.
#[derive(Clone)]
pub struct BearerTokenMiddleware {
    id_token: String,
}

impl BearerTokenMiddleware {
    pub fn new(id_token: impl Into<String>) -> Self {
        Self {
            id_token: id_token.into(),
        }
    }
}

#[async_trait::async_trait]
impl Middleware for BearerTokenMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let value = header::HeaderValue::from_str(&format!("Bearer {}", self.id_token))
            .map_err(|e| {
                reqwest_middleware::Error::Middleware(anyhow::anyhow!(
                    "Invalid ID token header: {}",
                    e
                ))
            })?;

        req.headers_mut().insert(header::AUTHORIZATION, value);

        next.run(req, extensions).await
    }
}
