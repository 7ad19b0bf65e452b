// Configuration for the server, read once from the environment at startup

use std::path::PathBuf;

use tts_core::{DevicePreference, ModelSource};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CACHE_DIR: &str = "/opt/hf_cache";
pub const DEFAULT_VOICE: &str = "en_US-lessac-medium";
pub const DEFAULT_MODEL_REPO: &str = "rhasspy/piper-voices";
pub const DEFAULT_MODEL_REPO_PATH: &str = "en/en_US/lessac/medium";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// `HF_HOME`; `TRANSFORMERS_CACHE` and `HF_DATASETS_CACHE` default to it.
    pub cache_dir: PathBuf,
    pub transformers_cache: PathBuf,
    pub datasets_cache: PathBuf,
    pub hf_token: Option<String>,
    pub voice: String,
    pub model_repo: Option<String>,
    pub model_repo_path: String,
    pub device: DevicePreference,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = get("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let cache_dir = get("HF_HOME")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
        let transformers_cache = get("TRANSFORMERS_CACHE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| cache_dir.clone());
        let datasets_cache = get("HF_DATASETS_CACHE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| cache_dir.clone());

        let hf_token = get("HUGGINGFACE_TOKEN").filter(|v| !v.trim().is_empty());

        let voice = get("TTS_VOICE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_VOICE.to_string());

        // Set but empty disables downloads
        let model_repo = match get("TTS_MODEL_REPO") {
            Some(repo) if repo.trim().is_empty() => None,
            Some(repo) => Some(repo.trim().to_string()),
            None => Some(DEFAULT_MODEL_REPO.to_string()),
        };
        let model_repo_path =
            get("TTS_MODEL_REPO_PATH").unwrap_or_else(|| DEFAULT_MODEL_REPO_PATH.to_string());

        let device = get("TTS_DEVICE")
            .map(|v| DevicePreference::parse(&v))
            .unwrap_or_default();

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Self {
            port,
            cache_dir,
            transformers_cache,
            datasets_cache,
            hf_token,
            voice,
            model_repo,
            model_repo_path,
            device,
            cors_allowed_origins,
        }
    }

    /// Publish the cache locations (and token, if any) to the process
    /// environment so the model runtime sees the same values.
    /// Publish the cache locations and token to the process environment.
    /// Call from `main` before the tokio runtime spawns any thread.
    pub fn export_env(&self) {
        std::env::set_var("HF_HOME", &self.cache_dir);
        std::env::set_var("TRANSFORMERS_CACHE", &self.transformers_cache);
        std::env::set_var("HF_DATASETS_CACHE", &self.datasets_cache);
        if let Some(token) = &self.hf_token {
            std::env::set_var("HUGGINGFACE_TOKEN", token);
            std::env::set_var("HF_TOKEN", token);
        }
    }

    pub fn model_source(&self) -> ModelSource {
        ModelSource {
            cache_dir: self.cache_dir.clone(),
            voice: self.voice.clone(),
            repo: self.model_repo.clone(),
            repo_path: self.model_repo_path.clone(),
            token: self.hf_token.clone(),
        }
    }
}
