//! Runtime configuration.
//!
//! Firebase credentials are read from the environment once, at process start,
//! into a [`RuntimeConfig`]. Two copies exist: a private one for server-side
//! code and a public one that is safe to hand to client code. The public copy
//! is the one [`use_firebase`](crate::access::use_firebase) initializes from.
//!
//! # Database URL source
//!
//! The public copy reads its database URL from `DA` while the private copy
//! reads `DATABASE_URL`. This is kept as-is and reported by
//! [`RuntimeConfig::discrepancies`] until the intended source is confirmed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use url::Url;


/// The environment variables the private copy is read from.
pub const PRIVATE_ENV: [(OptionField, &str); 8] = [
    (OptionField::ApiKey, "API_KEY"),
    (OptionField::AuthDomain, "AUTH_DOMAIN"),
    (OptionField::DatabaseUrl, "DATABASE_URL"),
    (OptionField::ProjectId, "PROJECT_ID"),
    (OptionField::StorageBucket, "STORAGE_BUCKET"),
    (OptionField::MessagingSenderId, "MESSAGING_SENDER_ID"),
    (OptionField::AppId, "APP_ID"),
    (OptionField::MeasurementId, "MEASUREMENT_ID"),
];

/// The environment variables the public copy is read from.
pub const PUBLIC_ENV: [(OptionField, &str); 8] = [
    (OptionField::ApiKey, "API_KEY"),
    (OptionField::AuthDomain, "AUTH_DOMAIN"),
    (OptionField::DatabaseUrl, "DA"),
    (OptionField::ProjectId, "PROJECT_ID"),
    (OptionField::StorageBucket, "STORAGE_BUCKET"),
    (OptionField::MessagingSenderId, "MESSAGING_SENDER_ID"),
    (OptionField::AppId, "APP_ID"),
    (OptionField::MeasurementId, "MEASUREMENT_ID"),
];

/// Fields an app cannot be initialized without.
pub const REQUIRED_FIELDS: [OptionField; 4] = [
    OptionField::ApiKey,
    OptionField::AuthDomain,
    OptionField::ProjectId,
    OptionField::AppId,
];

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// One or more required options are absent or blank.
    #[error("missing required firebase options: {}", join_fields(.0))]
    MissingFields(Vec<OptionField>),
    /// An option is present but cannot be used.
    #[error("invalid firebase option `{field}`: {reason}")]
    InvalidField { field: OptionField, reason: String },
    /// The dotenv file could not be read or parsed.
    #[error("failed to read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

fn join_fields(fields: &[OptionField]) -> String {
    fields
        .iter()
        .map(|f| f.key())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One entry of the credential mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionField {
    ApiKey,
    AuthDomain,
    DatabaseUrl,
    ProjectId,
    StorageBucket,
    MessagingSenderId,
    AppId,
    MeasurementId,
}

impl OptionField {
    pub const ALL: [OptionField; 8] = [
        OptionField::ApiKey,
        OptionField::AuthDomain,
        OptionField::DatabaseUrl,
        OptionField::ProjectId,
        OptionField::StorageBucket,
        OptionField::MessagingSenderId,
        OptionField::AppId,
        OptionField::MeasurementId,
    ];

    /// The name the web SDK uses for this option.
    pub fn key(&self) -> &'static str {
        match self {
            OptionField::ApiKey => "apiKey",
            OptionField::AuthDomain => "authDomain",
            OptionField::DatabaseUrl => "databaseURL",
            OptionField::ProjectId => "projectId",
            OptionField::StorageBucket => "storageBucket",
            OptionField::MessagingSenderId => "messagingSenderId",
            OptionField::AppId => "appId",
            OptionField::MeasurementId => "measurementId",
        }
    }
}

impl fmt::Display for OptionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The credential mapping an app is initialized from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_domain: Option<String>,
    #[serde(default, rename = "databaseURL", skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging_sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_id: Option<String>,
}

impl FirebaseOptions {
    pub fn get(&self, field: OptionField) -> Option<&str> {
        match field {
            OptionField::ApiKey => self.api_key.as_deref(),
            OptionField::AuthDomain => self.auth_domain.as_deref(),
            OptionField::DatabaseUrl => self.database_url.as_deref(),
            OptionField::ProjectId => self.project_id.as_deref(),
            OptionField::StorageBucket => self.storage_bucket.as_deref(),
            OptionField::MessagingSenderId => self.messaging_sender_id.as_deref(),
            OptionField::AppId => self.app_id.as_deref(),
            OptionField::MeasurementId => self.measurement_id.as_deref(),
        }
    }

    pub fn set(&mut self, field: OptionField, value: Option<String>) {
        let slot = match field {
            OptionField::ApiKey => &mut self.api_key,
            OptionField::AuthDomain => &mut self.auth_domain,
            OptionField::DatabaseUrl => &mut self.database_url,
            OptionField::ProjectId => &mut self.project_id,
            OptionField::StorageBucket => &mut self.storage_bucket,
            OptionField::MessagingSenderId => &mut self.messaging_sender_id,
            OptionField::AppId => &mut self.app_id,
            OptionField::MeasurementId => &mut self.measurement_id,
        };
        *slot = value;
    }

    /// Returns a required option, treating blank values as missing.
    pub fn require(&self, field: OptionField) -> Result<&str, ConfigError> {
        match self.get(field) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::MissingFields(vec![field])),
        }
    }

    /// Checks that every required option is present and no option is malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<OptionField> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| self.require(*field).is_err())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing));
        }

        for field in OptionField::ALL {
            if let Some(value) = self.get(field).filter(|v| !v.trim().is_empty()) {
                check_field(field, value)?;
            }
        }

        Ok(())
    }

    fn from_sources<F>(sources: &[(OptionField, &str)], lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        for (field, var) in sources {
            let value = lookup(var).filter(|v| !v.trim().is_empty());
            options.set(*field, value);
        }
        options
    }
}

fn check_field(field: OptionField, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidField {
        field,
        reason: reason.to_string(),
    };

    if value.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain whitespace"));
    }

    match field {
        OptionField::AuthDomain if value.contains("://") || value.contains('/') => {
            Err(invalid("expected a bare host name such as `my-app.firebaseapp.com`"))
        }
        OptionField::ProjectId if value.contains('/') => {
            Err(invalid("must not contain `/`"))
        }
        OptionField::DatabaseUrl => match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            Ok(url) => Err(invalid(&format!("unsupported scheme `{}`", url.scheme()))),
            Err(e) => Err(invalid(&e.to_string())),
        },
        _ => Ok(()),
    }
}

/// Client-exposed part of the runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicRuntimeConfig {
    pub firebase: FirebaseOptions,
}

/// Environment-sourced configuration, constructed once at startup and passed
/// explicitly to whatever needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub firebase: FirebaseOptions,
    pub public: PublicRuntimeConfig,
}

/// A field whose private and public copies do not agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDiscrepancy {
    pub field: OptionField,
    pub private_source: &'static str,
    pub public_source: &'static str,
    pub values_differ: bool,
}

impl fmt::Display for ConfigDiscrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.private_source != self.public_source {
            write!(
                f,
                "`{}` is read from {} in the private config but from {} in the public config",
                self.field, self.private_source, self.public_source
            )?;
        } else {
            write!(f, "`{}` was overridden in one of the copies", self.field)?;
        }
        if self.values_differ {
            f.write_str(" (values differ)")?;
        }
        Ok(())
    }
}

impl RuntimeConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration from a dotenv file.
    ///
    /// The process environment is not modified; variables missing from the
    /// file are taken from it.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut vars = HashMap::new();
        for item in dotenvy::from_path_iter(path.as_ref())? {
            let (key, value) = item?;
            vars.insert(key, value);
        }

        Self::from_lookup(|name| vars.get(name).cloned().or_else(|| std::env::var(name).ok()))
    }

    /// Loads the configuration through an arbitrary variable lookup.
    ///
    /// The public copy is validated, since it is what the app is initialized
    /// from. Discrepancies between the copies are logged, not rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            firebase: FirebaseOptions::from_sources(&PRIVATE_ENV, &lookup),
            public: PublicRuntimeConfig {
                firebase: FirebaseOptions::from_sources(&PUBLIC_ENV, &lookup),
            },
        };

        for discrepancy in config.discrepancies() {
            tracing::warn!(field = %discrepancy.field, "runtime config discrepancy: {}", discrepancy);
        }

        config.public.firebase.validate()?;
        Ok(config)
    }

    /// Lists every field whose private and public copies differ in source
    /// variable or in value.
    pub fn discrepancies(&self) -> Vec<ConfigDiscrepancy> {
        PRIVATE_ENV
            .iter()
            .zip(PUBLIC_ENV.iter())
            .filter_map(|((field, private_source), (_, public_source))| {
                let values_differ =
                    self.firebase.get(*field) != self.public.firebase.get(*field);
                if private_source != public_source || values_differ {
                    Some(ConfigDiscrepancy {
                        field: *field,
                        private_source: *private_source,
                        public_source: *public_source,
                        values_differ,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}
