use std::env;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PORT: u16 = 8888;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub static_dir: PathBuf,
    pub generated_dir: PathBuf,
    pub uploads_dir: PathBuf,
    /// When unset, deleted images go to the OS recycle bin.
    pub trash_dir: Option<PathBuf>,
    pub locked_naming: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: Option<u16>,
    pub gemini: GeminiConfig,
    pub storage: StorageConfig,
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: None,
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let api_key = non_empty_env("GOOGLE_API_KEY").or_else(|| non_empty_env("GEMINI_API_KEY"));
        let model = non_empty_env("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_base =
            non_empty_env("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let timeout_secs = non_empty_env("GEMINI_TIMEOUT_SECS").and_then(|s| s.parse().ok());

        GeminiConfig {
            api_key,
            model,
            api_base,
            timeout_secs,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = Some(seconds);
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::rooted_at("static")
    }
}

impl StorageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lays out `generated/` and `uploads/` under the given static directory.
    pub fn rooted_at(static_dir: impl Into<PathBuf>) -> Self {
        let static_dir = static_dir.into();
        StorageConfig {
            generated_dir: static_dir.join("generated"),
            uploads_dir: static_dir.join("uploads"),
            static_dir,
            trash_dir: None,
            locked_naming: true,
        }
    }

    pub fn from_env() -> Self {
        let mut storage = Self::rooted_at(non_empty_env("STATIC_DIR").unwrap_or_else(|| "static".into()));
        if let Some(dir) = non_empty_env("GENERATED_DIR") {
            storage.generated_dir = dir.into();
        }
        if let Some(dir) = non_empty_env("UPLOADS_DIR") {
            storage.uploads_dir = dir.into();
        }
        storage.trash_dir = non_empty_env("TRASH_DIR").map(PathBuf::from);
        storage.locked_naming = non_empty_env("LOCKED_NAMING").map_or(true, |val| val != "false");
        storage
    }

    pub fn with_generated_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.generated_dir = dir.into();
        self
    }

    pub fn with_uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.uploads_dir = dir.into();
        self
    }

    pub fn with_trash_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trash_dir = Some(dir.into());
        self
    }

    pub fn with_locked_naming(mut self, enabled: bool) -> Self {
        self.locked_naming = enabled;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: None,
            gemini: GeminiConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let host = non_empty_env("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = non_empty_env("PORT").and_then(|port| port.parse().ok());

        Config {
            host,
            port,
            gemini: GeminiConfig::from_env(),
            storage: StorageConfig::from_env(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_gemini(mut self, config: GeminiConfig) -> Self {
        self.gemini = config;
        self
    }

    pub fn with_storage(mut self, config: StorageConfig) -> Self {
        self.storage = config;
        self
    }
}
