use crate::error::AppError;
use crate::model::Task;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SCHEMA_VERSION: u32 = 2;
const STORE_FILE_NAME: &str = "tasks.json";
const STORE_ENV_VAR: &str = "REMINDAPP_STORE_PATH";

#[derive(Debug, Serialize, Deserialize)]
struct StoredTasks {
    schema_version: u32,
    tasks: Vec<Task>,
}

pub fn store_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    Ok(app_dir()?.join(STORE_FILE_NAME))
}

/// Per-user application directory shared by the task store, the worker
/// mirror and the config file.
pub fn app_dir() -> Result<PathBuf, AppError> {
    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("remindapp"))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home).join(".config").join("remindapp"))
    }
}

/// Load the authoritative task list. A missing file is an empty list.
/// Schema 1 predates reminders; its tasks load with an empty reminder list.
pub fn load_tasks(path: &Path) -> Result<Vec<Task>, AppError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|err| AppError::io(err.to_string()))?;
    let stored: StoredTasks =
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))?;

    if !(1..=SCHEMA_VERSION).contains(&stored.schema_version) {
        return Err(AppError::invalid_data("schema_version mismatch"));
    }

    debug!(path = %path.display(), tasks = stored.tasks.len(), "loaded task store");
    Ok(stored.tasks)
}

pub fn save_tasks(path: &Path, tasks: &[Task]) -> Result<(), AppError> {
    let stored = StoredTasks {
        schema_version: SCHEMA_VERSION,
        tasks: tasks.to_vec(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    write_atomic(path, &content)
}

/// Write through a sibling temp file and rename, so a reader never sees a
/// half-written store.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, content).map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, permissions)
            .map_err(|err| AppError::io(err.to_string()))?;
    }

    std::fs::rename(&tmp_path, path).map_err(|err| AppError::io(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{SCHEMA_VERSION, load_tasks, save_tasks};
    use crate::model::{Reminder, Task, TaskStatus};
    use std::fs;

    fn demo_task() -> Task {
        Task {
            id: "task-1".to_string(),
            title: "demo".to_string(),
            description: "details".to_string(),
            status: TaskStatus::Pending,
            created_at: "2025-12-20T00:00:00Z".to_string(),
            completed_at: None,
            reminders: vec![Reminder::one_time(), Reminder::recurring()],
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        let task = demo_task();

        save_tasks(&path, std::slice::from_ref(&task)).unwrap();
        let loaded = load_tasks(&path).unwrap();

        assert_eq!(loaded, vec![task]);
        assert!(!dir.path().join("tasks.json.tmp").exists());
    }

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_tasks(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn accepts_v1_schema_without_reminders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1-schema.json");
        let content = "{\n  \"schema_version\": 1,\n  \"tasks\": [\n    {\n      \"id\": \"task-1\",\n      \"title\": \"demo\",\n      \"status\": \"pending\",\n      \"created_at\": \"2025-12-20T00:00:00Z\"\n    }\n  ]\n}";
        fs::write(&path, content).unwrap();

        let loaded = load_tasks(&path).unwrap();

        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].reminders.is_empty());
        assert_eq!(loaded[0].completed_at, None);
    }

    #[test]
    fn rejects_unknown_reminder_unit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad-unit.json");
        let content = serde_json::json!({
            "schema_version": 2,
            "tasks": [{
                "id": "task-1",
                "title": "demo",
                "status": "pending",
                "created_at": "2025-12-20T00:00:00Z",
                "reminders": [{
                    "type": "recurring",
                    "id": "r1",
                    "unit": "fortnights",
                    "every": 1,
                    "time": "09:00"
                }]
            }]
        });
        fs::write(&path, content.to_string()).unwrap();

        let err = load_tasks(&path).unwrap_err();
        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn schema_version_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad-schema.json");
        let bad = format!(
            "{{\n  \"schema_version\": {},\n  \"tasks\": []\n}}",
            SCHEMA_VERSION + 1
        );
        fs::write(&path, bad).unwrap();

        let err = load_tasks(&path).unwrap_err();
        assert_eq!(err.code(), "invalid_data");
    }
}
