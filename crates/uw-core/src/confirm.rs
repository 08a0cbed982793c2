//! Save confirmation
//!
//! The management page sends the edited blacklist to a content script and
//! waits for its reply. The write itself is not cancelled on timeout.

use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use futures::future::{select, Either};
use serde_json::Value;

use crate::message::{PublishError, SaveResponse};

pub const SAVE_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub enum SaveConfirmation {
    Confirmed { switched_to_local: bool },
    /// The writer reported a failed save
    Failed,
    Unexpected(Value),
    TimedOut,
    SendFailed(String),
}

impl SaveConfirmation {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    pub fn from_response(response: &Value) -> Self {
        if !response.get("success").is_some_and(Value::is_boolean) {
            return Self::Unexpected(response.clone());
        }
        match serde_json::from_value::<SaveResponse>(response.clone()) {
            Ok(SaveResponse { success: true, switched_to_local, .. }) => Self::Confirmed { switched_to_local },
            Ok(_) => Self::Failed,
            Err(_) => Self::Unexpected(response.clone()),
        }
    }
}

/// Race the reply against `timeout`, whichever finishes first decides.
pub async fn await_save_confirmation<R, T>(response: R, timeout: T) -> SaveConfirmation
where
    R: Future<Output = Result<Value, PublishError>>,
    T: Future<Output = ()>,
{
    let response = pin!(response);
    let timeout = pin!(timeout);

    let outcome = match select(response, timeout).await {
        Either::Left((Ok(value), _)) => SaveConfirmation::from_response(&value),
        Either::Left((Err(e), _)) => SaveConfirmation::SendFailed(e.to_string()),
        Either::Right(((), _)) => SaveConfirmation::TimedOut,
    };

    match &outcome {
        SaveConfirmation::Confirmed { switched_to_local: true } => {
            log::info!("Save successful, but mode was switched to local storage")
        }
        SaveConfirmation::Confirmed { .. } => log::info!("Blacklist saved successfully"),
        SaveConfirmation::Failed => log::error!("Content script reported save failed"),
        SaveConfirmation::Unexpected(value) => log::error!("Unexpected save confirmation: {value}"),
        SaveConfirmation::TimedOut => log::error!("Timeout waiting for save confirmation"),
        SaveConfirmation::SendFailed(e) => log::error!("Error sending blacklist message: {e}"),
    }
    outcome
}
