pub mod access;
pub mod auth;
pub mod config;
pub mod core;
pub mod firestore;

pub use access::{use_firebase, FirebaseHandles};
pub use config::{ConfigError, FirebaseOptions, RuntimeConfig};

use auth::FirebaseAuth;
use config::OptionField;
use firestore::FirebaseFirestore;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use url::Url;

pub const DEFAULT_APP_NAME: &str = "[DEFAULT]";

const IDENTITY_TOOLKIT_V1_API: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_V1_API: &str = "https://securetoken.googleapis.com/v1";
const FIRESTORE_V1_API: &str = "https://firestore.googleapis.com/v1";

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Error, Debug)]
pub enum AppError {
    #[error("failed to initialize firebase app `{name}`: {source}")]
    InvalidConfig {
        name: String,
        #[source]
        source: ConfigError,
    },
    #[error("invalid endpoint `{url}`: {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

/// Root URLs of the REST APIs the derived clients talk to.
///
/// Overridable so the clients can be pointed at emulators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub identity_toolkit: String,
    pub secure_token: String,
    pub firestore: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            identity_toolkit: IDENTITY_TOOLKIT_V1_API.to_string(),
            secure_token: SECURE_TOKEN_V1_API.to_string(),
            firestore: FIRESTORE_V1_API.to_string(),
        }
    }
}

/// One initialized Firebase session.
///
/// Every call to [`FirebaseApp::initialize`] creates a new instance with its
/// own `instance_id`; nothing is cached between calls. Clones share the id.
#[derive(Debug, Clone)]
pub struct FirebaseApp {
    name: String,
    instance_id: u64,
    options: FirebaseOptions,
    api_key: String,
    project_id: String,
    endpoints: Endpoints,
    firestore_documents: Url,
}

impl FirebaseApp {
    pub fn initialize(options: &FirebaseOptions) -> Result<Self, AppError> {
        Self::initialize_named(options, DEFAULT_APP_NAME)
    }

    pub fn initialize_named(options: &FirebaseOptions, name: &str) -> Result<Self, AppError> {
        let invalid = |source: ConfigError| AppError::InvalidConfig {
            name: name.to_string(),
            source,
        };

        options.validate().map_err(invalid)?;
        let api_key = options.require(OptionField::ApiKey).map_err(invalid)?.to_string();
        let project_id = options
            .require(OptionField::ProjectId)
            .map_err(invalid)?
            .to_string();

        let endpoints = Endpoints::default();
        let firestore_documents = documents_root(&endpoints.firestore, &project_id)?;

        let instance_id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(app = name, instance_id, project_id = %project_id, "initialized firebase app");

        Ok(Self {
            name: name.to_string(),
            instance_id,
            options: options.clone(),
            api_key,
            project_id,
            endpoints,
            firestore_documents,
        })
    }

    /// Points the derived clients at different API roots.
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Result<Self, AppError> {
        self.firestore_documents = documents_root(&endpoints.firestore, &self.project_id)?;
        self.endpoints = endpoints;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn options(&self) -> &FirebaseOptions {
        &self.options
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// The URL this app's Firestore documents live under.
    pub fn firestore_documents(&self) -> &Url {
        &self.firestore_documents
    }

    pub fn auth(&self) -> FirebaseAuth {
        FirebaseAuth::new(self)
    }

    pub fn firestore(&self) -> FirebaseFirestore {
        FirebaseFirestore::new(self)
    }
}

fn documents_root(firestore: &str, project_id: &str) -> Result<Url, AppError> {
    let invalid = |reason: String| AppError::InvalidEndpoint {
        url: firestore.to_string(),
        reason,
    };

    let mut url = Url::parse(firestore).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("not a base URL".to_string()))?
        .pop_if_empty()
        .extend(["projects", project_id, "databases", "(default)", "documents"]);
    Ok(url)
}
