//! Operator notifications.
//!
//! Delivery (mail, chat) lives outside the core behind [`Notifier`]; the rig
//! only decides what to say. Every send is best-effort: a failed
//! notification is logged and never interrupts a run.
use rig_traits::DynError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Progress or completion message.
    Update(String),
    /// A run stopped on an error.
    Crash(String),
    /// The vial tray needs emptying before the run can continue.
    TrayFull(String),
}

impl Notice {
    pub fn subject(&self, platform: &str) -> String {
        match self {
            Notice::Update(_) => format!("{platform} Update"),
            Notice::Crash(_) => format!("CRASH -- {platform} Error"),
            Notice::TrayFull(_) => format!("{platform} -- Vial Tray Full"),
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Notice::Update(b) | Notice::Crash(b) | Notice::TrayFull(b) => b,
        }
    }
}

pub trait Notifier {
    fn notify(&mut self, notice: &Notice) -> Result<(), DynError>;
}

/// Writes notices to the log instead of delivering them.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    platform: String,
    recipients: Vec<String>,
}

impl LogNotifier {
    pub fn new(platform: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            platform: platform.into(),
            recipients,
        }
    }
}

impl From<&rig_config::NotifyCfg> for LogNotifier {
    fn from(c: &rig_config::NotifyCfg) -> Self {
        Self::new(c.platform.clone(), c.recipients.clone())
    }
}

impl Notifier for LogNotifier {
    fn notify(&mut self, notice: &Notice) -> Result<(), DynError> {
        let subject = notice.subject(&self.platform);
        match notice {
            Notice::Crash(_) => tracing::error!(%subject, recipients = ?self.recipients, body = notice.body(), "notice"),
            _ => tracing::info!(%subject, recipients = ?self.recipients, body = notice.body(), "notice"),
        }
        Ok(())
    }
}

/// Send `notice`, logging instead of returning any failure.
pub fn notify_best_effort(notifier: &mut dyn Notifier, notice: &Notice) {
    if let Err(e) = notifier.notify(notice) {
        tracing::warn!(error = %e, body = notice.body(), "notification not delivered");
    }
}
