//! The single entry point application code uses to reach Firebase.

use crate::auth::FirebaseAuth;
use crate::config::RuntimeConfig;
use crate::firestore::FirebaseFirestore;
use crate::{AppError, FirebaseApp};


/// The three handles returned by [`use_firebase`].
#[derive(Clone)]
pub struct FirebaseHandles {
    pub auth: FirebaseAuth,
    pub app: FirebaseApp,
    pub db: FirebaseFirestore,
}

/// Initializes a new app from the public copy of `config` and derives the
/// auth and firestore clients from it.
///
/// Each call creates a fresh app; nothing is shared between calls. No network
/// request is made until one of the clients is used.
pub fn use_firebase(config: &RuntimeConfig) -> Result<FirebaseHandles, AppError> {
    let app = FirebaseApp::initialize(&config.public.firebase)?;
    let auth = app.auth();
    let db = app.firestore();

    Ok(FirebaseHandles { auth, app, db })
}
