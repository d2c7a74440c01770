use std::path::PathBuf;

use directories::ProjectDirs;

pub const APP_NAME: &str = "mnemo";
pub const CONFIG_FILE: &str = "mnemo.toml";

/// Directory holding the index database. `MNEMO_DATA_DIR` wins over the
/// platform default.
pub fn data_dir() -> PathBuf {
    data_dir_with(&env_lookup)
}

/// Directory searched for `mnemo.toml`. `MNEMO_CONFIG_DIR` wins over the
/// platform default.
pub fn config_dir() -> PathBuf {
    config_dir_with(&env_lookup)
}

pub fn data_dir_with(lookup: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = lookup("MNEMO_DATA_DIR").filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".mnemo"))
}

pub fn config_dir_with(lookup: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = lookup("MNEMO_CONFIG_DIR").filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    project_dirs()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".mnemo"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

pub(crate) fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_win() {
        let lookup = |key: &str| match key {
            "MNEMO_DATA_DIR" => Some("/srv/mnemo/data".to_string()),
            "MNEMO_CONFIG_DIR" => Some("/srv/mnemo/etc".to_string()),
            _ => None,
        };
        assert_eq!(data_dir_with(&lookup), PathBuf::from("/srv/mnemo/data"));
        assert_eq!(config_dir_with(&lookup), PathBuf::from("/srv/mnemo/etc"));
    }

    #[test]
    fn empty_override_is_ignored() {
        let lookup = |_: &str| Some(String::new());
        assert_ne!(data_dir_with(&lookup), PathBuf::new());
    }
}
