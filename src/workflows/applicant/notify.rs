use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::WizardId;

pub const VALIDATION_FAILED: &str = "Please review the highlighted fields";
pub const SUBMISSION_SUCCEEDED: &str = "Application submitted successfully";

/// The two outward signals the wizard emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Failure,
    Success,
}

/// Display-ready message for whatever surface presents notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub wizard_id: WizardId,
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn failure(wizard_id: WizardId) -> Self {
        Self {
            wizard_id,
            kind: NoticeKind::Failure,
            message: VALIDATION_FAILED.to_string(),
        }
    }

    pub fn success(wizard_id: WizardId) -> Self {
        Self {
            wizard_id,
            kind: NoticeKind::Success,
            message: SUBMISSION_SUCCEEDED.to_string(),
        }
    }
}

/// Outbound hook for notices (toasts, e-mail, websocket push...).
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

/// Writes notices to the log. Used when no presentation layer is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) -> Result<(), NotifyError> {
        info!(
            wizard_id = %notice.wizard_id,
            kind = ?notice.kind,
            message = %notice.message,
            "wizard notice"
        );
        Ok(())
    }
}
