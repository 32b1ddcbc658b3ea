use crate::error::AppError;
use crate::notify::{Notification, Notifier, launch_show, parse_activation_argument};
use tauri_winrt_notification::Toast;

pub struct WindowsNotifier;

impl Notifier for WindowsNotifier {
    fn show(&self, notification: &Notification) -> Result<(), AppError> {
        let action_value = notification.action.clone().unwrap_or_default();
        let mut toast = Toast::new(Toast::POWERSHELL_APP_ID)
            .title(&notification.title)
            .text1(&notification.body);

        if !action_value.trim().is_empty() {
            toast = toast.add_button("Open", &action_value);
        }

        let default_task = parse_activation_argument(&action_value);
        toast
            .on_activated(move |args| {
                let target = args
                    .as_deref()
                    .and_then(parse_activation_argument)
                    .or_else(|| default_task.clone());
                if let Some(task_id) = target {
                    let _ = launch_show(&task_id);
                }
                Ok(())
            })
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        Ok(())
    }
}
