use anyhow::Context;
use serde::Serialize;
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

pub const OUTBOX_DIR: &str = "outbox";
pub const OUTBOX_FILE: &str = "notifications.ndjson";

/// Who registered, as passed to the administrator alert.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationNotice {
    pub user_email: String,
    pub full_name: String,
    pub role: String,
    pub profile_id: String,
}

pub trait Notifier {
    fn notify_registration(&self, notice: &RegistrationNotice) -> anyhow::Result<()>;
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify_registration(&self, notice: &RegistrationNotice) -> anyhow::Result<()> {
        tracing::debug!(profile_id = %notice.profile_id, "notifications disabled");
        Ok(())
    }
}

/// Appends one message per line to `<workspace>/outbox/notifications.ndjson`;
/// the mail relay picks them up from there.
pub struct OutboxNotifier {
    dir: PathBuf,
    admin_email: String,
}

impl OutboxNotifier {
    pub fn new(workspace: PathBuf, admin_email: impl Into<String>) -> Self {
        OutboxNotifier {
            dir: workspace.join(OUTBOX_DIR),
            admin_email: admin_email.into(),
        }
    }

    pub fn outbox_path(&self) -> PathBuf {
        self.dir.join(OUTBOX_FILE)
    }
}

impl Notifier for OutboxNotifier {
    fn notify_registration(&self, notice: &RegistrationNotice) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create outbox {}", self.dir.display()))?;
        let message = json!({
            "to": [self.admin_email],
            "subject": format!("New User Registration - {}", notice.full_name),
            "template": "new-user-registration",
            "queuedAt": crate::model::now_rfc3339(),
            "data": notice,
        });
        let path = self.outbox_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open outbox {}", path.display()))?;
        writeln!(file, "{}", message).context("failed to append notification")?;
        Ok(())
    }
}

/// Deliver without letting a failure reach the caller.
pub fn fire_and_forget(notifier: &dyn Notifier, notice: &RegistrationNotice) {
    match notifier.notify_registration(notice) {
        Ok(()) => tracing::info!(profile_id = %notice.profile_id, "registration notice queued"),
        Err(e) => tracing::warn!(
            profile_id = %notice.profile_id,
            error = %format!("{e:#}"),
            "failed to deliver registration notice"
        ),
    }
}
