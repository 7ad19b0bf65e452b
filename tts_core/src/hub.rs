//! Locating voice artifacts in the model cache.
//!
//! A voice is a pair of files, `<voice>.onnx` and `<voice>.onnx.json`, which
//! must live side by side. The cache is checked first; if the voice is not
//! there and a remote repository is configured the files are fetched into the
//! Hugging Face cache under the same root.

use std::path::{Path, PathBuf};

use anyhow::Context;
use hf_hub::{api::sync::ApiBuilder, Repo, RepoType};
use tracing::{debug, info};

/// Resolved on-disk locations of a voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub model: PathBuf,
    pub config: PathBuf,
}

impl ModelFiles {
    fn in_dir(dir: &Path, voice: &str) -> Self {
        Self {
            model: dir.join(format!("{voice}.onnx")),
            config: dir.join(format!("{voice}.onnx.json")),
        }
    }

    pub fn exist(&self) -> bool {
        self.model.is_file() && self.config.is_file()
    }
}

/// Where a voice comes from.
#[derive(Debug, Clone)]
pub struct ModelSource {
    /// Cache root (`HF_HOME`).
    pub cache_dir: PathBuf,
    pub voice: String,
    /// Remote repository id; `None` disables downloads.
    pub repo: Option<String>,
    /// Directory of the voice inside `repo`.
    pub repo_path: String,
    pub token: Option<String>,
}

impl ModelSource {
    /// Files as they would be laid out in `<cache>/piper/`.
    pub fn local_files(&self) -> ModelFiles {
        ModelFiles::in_dir(&self.cache_dir.join("piper"), &self.voice)
    }

    fn remote_file(&self, name: &str) -> String {
        let dir = self.repo_path.trim_matches('/');
        if dir.is_empty() {
            name.to_string()
        } else {
            format!("{dir}/{name}")
        }
    }

    /// Find the voice locally, downloading it when allowed.
    pub fn resolve(&self) -> anyhow::Result<ModelFiles> {
        let local = self.local_files();
        if local.exist() {
            debug!("Using cached voice at {}", local.config.display());
            return Ok(local);
        }

        let Some(repo) = self.repo.as_deref() else {
            anyhow::bail!(
                "voice '{}' not found at {} and no model repository configured",
                self.voice,
                local.config.display()
            );
        };

        info!("Voice '{}' not cached, fetching from {repo}", self.voice);
        let api = ApiBuilder::new()
            .with_cache_dir(self.cache_dir.join("hub"))
            .with_token(self.token.clone())
            .build()
            .context("Failed to create model hub client")?;
        let repo_api = api.repo(Repo::new(repo.to_string(), RepoType::Model));

        let config_name = self.remote_file(&format!("{}.onnx.json", self.voice));
        let model_name = self.remote_file(&format!("{}.onnx", self.voice));
        let config = repo_api
            .get(&config_name)
            .with_context(|| format!("Failed to download {config_name} from {repo}"))?;
        let model = repo_api
            .get(&model_name)
            .with_context(|| format!("Failed to download {model_name} from {repo}"))?;

        info!("Fetched voice '{}' into {}", self.voice, config.display());
        Ok(ModelFiles { model, config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source(cache_dir: PathBuf, repo: Option<&str>) -> ModelSource {
        ModelSource {
            cache_dir,
            voice: "en_US-test-low".to_string(),
            repo: repo.map(str::to_string),
            repo_path: "/en/en_US/test/low/".to_string(),
            token: None,
        }
    }

    #[test]
    fn test_local_layout() {
        let src = source(PathBuf::from("/opt/hf_cache"), None);
        let files = src.local_files();
        assert_eq!(files.model, PathBuf::from("/opt/hf_cache/piper/en_US-test-low.onnx"));
        assert_eq!(files.config, PathBuf::from("/opt/hf_cache/piper/en_US-test-low.onnx.json"));
    }

    #[test]
    fn test_remote_file_joins_repo_path() {
        let src = source(PathBuf::from("/tmp"), Some("org/voices"));
        assert_eq!(src.remote_file("a.onnx"), "en/en_US/test/low/a.onnx");

        let flat = ModelSource { repo_path: String::new(), ..src };
        assert_eq!(flat.remote_file("a.onnx"), "a.onnx");
    }

    #[test]
    fn test_resolve_prefers_cache() {
        let dir = TempDir::new().unwrap();
        let piper_dir = dir.path().join("piper");
        std::fs::create_dir_all(&piper_dir).unwrap();
        std::fs::write(piper_dir.join("en_US-test-low.onnx"), b"onnx").unwrap();
        std::fs::write(piper_dir.join("en_US-test-low.onnx.json"), b"{}").unwrap();

        // A repo is configured but must not be contacted
        let src = source(dir.path().to_path_buf(), Some("org/does-not-exist"));
        let files = src.resolve().unwrap();
        assert_eq!(files, src.local_files());
    }

    #[test]
    fn test_resolve_missing_without_repo_fails() {
        let dir = TempDir::new().unwrap();
        let src = source(dir.path().to_path_buf(), None);
        let err = src.resolve().unwrap_err();
        assert!(err.to_string().contains("no model repository configured"));
    }

    #[test]
    fn test_half_present_voice_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let piper_dir = dir.path().join("piper");
        std::fs::create_dir_all(&piper_dir).unwrap();
        std::fs::write(piper_dir.join("en_US-test-low.onnx.json"), b"{}").unwrap();

        let src = source(dir.path().to_path_buf(), None);
        assert!(!src.local_files().exist());
        assert!(src.resolve().is_err());
    }
}
