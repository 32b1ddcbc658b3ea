use crate::error::AppError;
use std::sync::Arc;
#[cfg(test)]
use std::sync::Mutex;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::LinuxNotifier;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::WindowsNotifier;

const DISABLE_ENV_VAR: &str = "REMINDAPP_DISABLE_NOTIFICATIONS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Repeated deliveries with the same tag describe the same reminder
    /// instance, so the notification surface may collapse them.
    pub tag: String,
    /// Activation argument passed back to the binary when clicked.
    pub action: Option<String>,
}

pub trait Notifier: Send + Sync {
    fn show(&self, notification: &Notification) -> Result<(), AppError>;
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn show(&self, _notification: &Notification) -> Result<(), AppError> {
        Ok(())
    }
}

/// Keeps every notification it is asked to show.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown
            .lock()
            .map(|shown| shown.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn show(&self, notification: &Notification) -> Result<(), AppError> {
        self.shown
            .lock()
            .map_err(|_| AppError::io("notification log poisoned"))?
            .push(notification.clone());
        Ok(())
    }
}

pub fn notifier_from_env() -> Result<Arc<dyn Notifier>, AppError> {
    if std::env::var(DISABLE_ENV_VAR).is_ok() {
        return Ok(Arc::new(NoopNotifier));
    }

    match platform_notifier() {
        Ok(notifier) => Ok(notifier),
        Err(err) => match err {
            AppError::InvalidData(_) => Ok(Arc::new(NoopNotifier)),
            other => Err(other),
        },
    }
}

/// Stable, non-zero replacement id for a dedupe tag (32-bit FNV-1a).
///
/// Notification servers replace an on-screen notification that carries the
/// same id, so repeated deliveries for one reminder collapse into one.
pub fn notification_id(tag: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let hash = tag.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(PRIME)
    });
    hash.max(1)
}

const ACTION_PREFIX: &str = "show:";

pub fn activation_argument(task_id: &str) -> String {
    format!("{ACTION_PREFIX}{task_id}")
}

pub fn parse_activation_argument(argument: &str) -> Option<String> {
    argument
        .strip_prefix(ACTION_PREFIX)
        .map(|id| id.to_string())
}

pub fn launch_show(task_id: &str) -> Result<(), AppError> {
    let exe = std::env::current_exe().map_err(|err| AppError::io(err.to_string()))?;
    std::process::Command::new(exe)
        .arg("show")
        .arg(task_id)
        .spawn()
        .map_err(|err| AppError::io(err.to_string()))?;
    Ok(())
}

#[cfg(target_os = "linux")]
pub fn platform_notifier() -> Result<Arc<dyn Notifier>, AppError> {
    Ok(Arc::new(LinuxNotifier))
}

#[cfg(windows)]
pub fn platform_notifier() -> Result<Arc<dyn Notifier>, AppError> {
    Ok(Arc::new(WindowsNotifier))
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn platform_notifier() -> Result<Arc<dyn Notifier>, AppError> {
    Err(AppError::invalid_data(
        "notifications are not supported on this platform",
    ))
}
