use crate::error::AppError;
use crate::notify::{
    Notification, Notifier, launch_show, notification_id, parse_activation_argument,
};

pub struct LinuxNotifier;

impl Notifier for LinuxNotifier {
    fn show(&self, notification: &Notification) -> Result<(), AppError> {
        let mut desktop = notify_rust::Notification::new();
        desktop.appname("remind");
        desktop.summary(&notification.title);
        desktop.body(&notification.body);
        // Same id replaces the visible notification instead of stacking it.
        desktop.id(notification_id(&notification.tag));
        if let Some(action) = notification.action.as_deref() {
            desktop.action(action, "Open");
        }

        let handle = desktop
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;

        if let Some(action) = notification.action.clone()
            && let Some(task_id) = parse_activation_argument(&action)
        {
            std::thread::spawn(move || {
                handle.wait_for_action(|selected| {
                    if selected == action || selected == "default" {
                        let _ = launch_show(&task_id);
                    }
                });
            });
        }

        Ok(())
    }
}
