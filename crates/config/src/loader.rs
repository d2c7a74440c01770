//! Config discovery, parsing and environment overrides.

use std::path::{Path, PathBuf};

use {secrecy::Secret, tracing::info};

use crate::{
    paths::{CONFIG_FILE, config_dir_with, data_dir_with, env_lookup},
    schema::MnemoConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

/// Load from `explicit` if given, else `<config_dir>/mnemo.toml` if it exists,
/// else defaults. Environment overrides are applied last.
pub fn load(explicit: Option<&Path>) -> Result<MnemoConfig> {
    load_with(explicit, &env_lookup)
}

pub fn load_with(
    explicit: Option<&Path>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<MnemoConfig> {
    let mut config = match explicit {
        Some(path) => load_from(path)?,
        None => {
            let discovered = config_dir_with(lookup).join(CONFIG_FILE);
            if discovered.is_file() {
                load_from(&discovered)?
            } else {
                info!(path = %discovered.display(), "no config file, using defaults");
                MnemoConfig::default()
            }
        },
    };
    apply_env_overrides(&mut config, lookup);
    if config.memory.db_path.is_none() {
        config.memory.db_path = Some(data_dir_with(lookup).join("memory.db"));
    }
    Ok(config)
}

/// Parse a specific file without applying overrides.
pub fn load_from(path: &Path) -> Result<MnemoConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// `MNEMO_MEMORY_ROOT`, `MNEMO_DB_PATH`, then the API key from
/// `MNEMO_EMBEDDINGS_API_KEY` or `OPENAI_API_KEY`.
pub fn apply_env_overrides(config: &mut MnemoConfig, lookup: &dyn Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(root) = non_empty("MNEMO_MEMORY_ROOT") {
        config.memory.root = Some(PathBuf::from(root));
    }
    if let Some(db) = non_empty("MNEMO_DB_PATH") {
        config.memory.db_path = Some(PathBuf::from(db));
    }
    if let Some(key) = non_empty("MNEMO_EMBEDDINGS_API_KEY").or_else(|| non_empty("OPENAI_API_KEY"))
    {
        config.embeddings.remote_api_key = Some(Secret::new(key));
    }
}

#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret, std::collections::HashMap};

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_string_lossy().into_owned();
        let lookup = lookup_from(&[
            ("MNEMO_CONFIG_DIR", dir_str.as_str()),
            ("MNEMO_DATA_DIR", dir_str.as_str()),
        ]);
        let config = load_with(None, &lookup).unwrap();
        assert_eq!(config.memory.chunk_tokens, 400);
        assert_eq!(config.memory.chunk_overlap, 80);
        assert_eq!(config.memory.max_results, 6);
        assert!((config.memory.min_score - 0.35).abs() < f32::EPSILON);
        assert!(config.memory.watch);
        assert_eq!(config.embeddings.remote_model, "text-embedding-3-small");
        assert_eq!(config.embeddings.fallback_model, "nomic-embed-text");
        assert!(config.embeddings.remote_api_key.is_none());
        assert_eq!(config.memory.db_path, Some(dir.path().join("memory.db")));
    }

    #[test]
    fn discovers_file_in_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[memory]\nroot = \"/home/me/notes\"\nmax_results = 3\n",
        )
        .unwrap();
        let dir_str = dir.path().to_string_lossy().into_owned();
        let lookup = lookup_from(&[("MNEMO_CONFIG_DIR", dir_str.as_str())]);

        let config = load_with(None, &lookup).unwrap();
        assert_eq!(config.memory.root, Some(PathBuf::from("/home/me/notes")));
        assert_eq!(config.memory.max_results, 3);
        // Unspecified keys keep their defaults.
        assert_eq!(config.memory.chunk_tokens, 400);
    }

    #[test]
    fn parses_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[memory]
db_path = "/var/lib/mnemo/index.db"
chunk_tokens = 256
vector_weight = 0.5
text_weight = 0.5
watch = false
cache_max_entries = 10000

[embeddings]
local_model_path = "/models/embed.gguf"
remote_base_url = "https://proxy.example.com/v2"
remote_api_key = "sk-from-file"
fallback_enabled = false
"#,
        )
        .unwrap();

        let config = load_with(Some(&path), &lookup_from(&[])).unwrap();
        assert_eq!(
            config.memory.db_path,
            Some(PathBuf::from("/var/lib/mnemo/index.db"))
        );
        assert_eq!(config.memory.chunk_tokens, 256);
        assert!(!config.memory.watch);
        assert_eq!(config.memory.cache_max_entries, Some(10000));
        assert_eq!(
            config.embeddings.local_model_path,
            Some(PathBuf::from("/models/embed.gguf"))
        );
        assert_eq!(
            config.embeddings.remote_base_url,
            "https://proxy.example.com/v2"
        );
        assert_eq!(
            config
                .embeddings
                .remote_api_key
                .as_ref()
                .map(|k| k.expose_secret().as_str()),
            Some("sk-from-file")
        );
        assert!(!config.embeddings.fallback_enabled);
    }

    #[test]
    fn env_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mnemo.toml");
        std::fs::write(&path, "[embeddings]\nremote_api_key = \"sk-file\"\n").unwrap();

        let lookup = lookup_from(&[
            ("MNEMO_MEMORY_ROOT", "/ws"),
            ("MNEMO_DB_PATH", "/tmp/idx.db"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("MNEMO_EMBEDDINGS_API_KEY", "sk-mnemo"),
        ]);
        let config = load_with(Some(&path), &lookup).unwrap();
        assert_eq!(config.memory.root, Some(PathBuf::from("/ws")));
        assert_eq!(config.memory.db_path, Some(PathBuf::from("/tmp/idx.db")));
        assert_eq!(
            config
                .embeddings
                .remote_api_key
                .as_ref()
                .map(|k| k.expose_secret().as_str()),
            Some("sk-mnemo")
        );
    }

    #[test]
    fn openai_key_used_when_no_mnemo_key() {
        let mut config = MnemoConfig::default();
        apply_env_overrides(
            &mut config,
            &lookup_from(&[("OPENAI_API_KEY", "sk-openai"), ("MNEMO_EMBEDDINGS_API_KEY", " ")]),
        );
        assert_eq!(
            config
                .embeddings
                .remote_api_key
                .as_ref()
                .map(|k| k.expose_secret().as_str()),
            Some("sk-openai")
        );
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[memory\nroot = ").unwrap();
        assert!(matches!(
            load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_explicit_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_with(Some(&dir.path().join("absent.toml")), &lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
