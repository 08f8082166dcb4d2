//! Control messages from the settings surface.

use serde::{Deserialize, Serialize};

use crate::app::SharedState;
use crate::config::validation::validate_check_interval;
use crate::scheduler::PollTrigger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlMessage {
    /// Drop the token, fetch a new one, then check every channel.
    RefreshToken,
    /// Forget stored credentials along with the in-memory caches.
    ClearSettings,
    /// Older clients: clear the in-memory credential and token caches only.
    ClearToken,
    #[serde(rename_all = "camelCase")]
    CheckChannelStatus {
        #[serde(default)]
        channel_name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    UpdateSettings { check_interval: u32 },
    UpdatePlayerPatterns,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlReply {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_players: Option<Vec<String>>,
}

impl ControlReply {
    fn ok() -> Self {
        Self {
            status: "ok",
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub async fn handle_control(
    state: &SharedState,
    message: ControlMessage,
) -> Result<ControlReply, ControlError> {
    tracing::debug!(?message, "Control message");
    match message {
        ControlMessage::RefreshToken => {
            let token = state.credentials().refresh_token().await;
            state.scheduler().trigger(PollTrigger::TokenRefreshed);
            Ok(ControlReply {
                token_available: Some(token.is_some()),
                ..ControlReply::ok()
            })
        }
        ControlMessage::ClearSettings => {
            state.settings().clear_credentials()?;
            state.credentials().clear().await;
            Ok(ControlReply::ok())
        }
        ControlMessage::ClearToken => {
            state.credentials().clear().await;
            Ok(ControlReply::ok())
        }
        ControlMessage::CheckChannelStatus { channel_name } => {
            let channel_name = channel_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty());
            state
                .scheduler()
                .trigger(PollTrigger::Manual(channel_name));
            Ok(ControlReply::ok())
        }
        ControlMessage::UpdateSettings { check_interval } => {
            validate_check_interval(check_interval)
                .map_err(|e| ControlError::InvalidInput(format!("checkInterval {e}")))?;
            state.settings().set_check_interval(check_interval)?;
            state.scheduler().reconfigure_if_changed(check_interval);
            state.reload_config().await?;
            Ok(ControlReply {
                check_interval: Some(check_interval),
                ..ControlReply::ok()
            })
        }
        ControlMessage::UpdatePlayerPatterns => {
            let added = state
                .reconciler()
                .matcher()
                .detect_installed_players()
                .await
                .map_err(anyhow::Error::from)?;
            Ok(ControlReply {
                detected_players: Some(added),
                ..ControlReply::ok()
            })
        }
    }
}
