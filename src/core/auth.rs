// ─── AuthProvider ───
// External account collaborator. Login flows, token refresh and storage live
// outside the core; the launch pipeline only consumes the resulting session
// as an opaque credential for placeholder substitution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::LauncherResult;

pub const OFFLINE_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Validated session handed to the launch pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub player_name: String,
    pub uuid: String,
    pub access_token: String,
    pub online: bool,
}

impl SessionToken {
    /// Fill any blank field with a safe offline default.
    pub fn sanitized(mut self) -> Self {
        if self.player_name.trim().is_empty() {
            self.player_name = "Player".into();
        }
        if self.uuid.trim().is_empty() {
            self.uuid = OFFLINE_UUID.into();
        }
        if self.access_token.trim().is_empty() {
            self.access_token = "offline_access_token".into();
        }
        self
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Produce a usable session, refreshing upstream credentials if the
    /// implementation supports that.
    async fn session(&self) -> LauncherResult<SessionToken>;
}

/// Provider for accounts that never talk to an authentication server.
pub struct OfflineAuth {
    username: String,
}

impl OfflineAuth {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

#[async_trait]
impl AuthProvider for OfflineAuth {
    async fn session(&self) -> LauncherResult<SessionToken> {
        Ok(SessionToken {
            player_name: self.username.trim().to_string(),
            uuid: OFFLINE_UUID.into(),
            access_token: "offline_access_token".into(),
            online: false,
        }
        .sanitized())
    }
}
