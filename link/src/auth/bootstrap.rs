//! Startup session check.
//!
//! Decides once per application load whether a persisted token still
//! represents a valid session.

use crate::client::TryoutLinkClient;
use crate::models::{MeResponse, User};
use log::{debug, warn};
use tokio::sync::OnceCell;

/// Result of the startup check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// No persisted token; nothing was checked.
    Anonymous,
    /// The persisted token is valid and belongs to this user.
    Authenticated(User),
    /// A persisted token existed but the profile fetch failed; the session
    /// was cleared.
    Invalidated,
}

impl BootstrapOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, BootstrapOutcome::Authenticated(_))
    }
}

/// One-shot session validator. Later calls return the first outcome without
/// touching the network.
#[derive(Debug)]
pub struct AuthBootstrap {
    me_path: String,
    outcome: OnceCell<BootstrapOutcome>,
}

impl AuthBootstrap {
    pub fn new(me_path: impl Into<String>) -> Self {
        Self {
            me_path: me_path.into(),
            outcome: OnceCell::new(),
        }
    }

    pub async fn run(&self, client: &TryoutLinkClient) -> BootstrapOutcome {
        self.outcome
            .get_or_init(|| self.check(client))
            .await
            .clone()
    }

    async fn check(&self, client: &TryoutLinkClient) -> BootstrapOutcome {
        let session = client.session();

        if session.access_token().is_none() {
            debug!("[BOOTSTRAP] No persisted access token");
            session.set_loading(false);
            return BootstrapOutcome::Anonymous;
        }

        session.set_loading(true);
        // Goes through the pipeline so an expired access token is refreshed.
        match client.get::<MeResponse>(&self.me_path).await {
            Ok(MeResponse { user }) => {
                debug!("[BOOTSTRAP] Session valid for user {}", user.id);
                session.update_user(user.clone());
                session.set_loading(false);
                BootstrapOutcome::Authenticated(user)
            },
            Err(e) => {
                warn!("[BOOTSTRAP] Persisted session rejected: {}", e);
                session.clear_auth();
                session.set_loading(false);
                BootstrapOutcome::Invalidated
            },
        }
    }
}
