use std::env;

use crate::error::AppError;

/// Environment variable names are part of the external contract.
pub const ENV_EMBEDDINGS_API_KEY: &str = "EMBEDDINGS_API_KEY";
pub const ENV_VECTOR_INDEX_API_KEY: &str = "VECTOR_INDEX_API_KEY";
pub const ENV_VECTOR_INDEX_URL: &str = "VECTOR_INDEX_URL";
pub const ENV_COMPLETIONS_API_KEY: &str = "COMPLETIONS_API_KEY";

/// Tunables with defaults. All overridable from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Tunables {
    pub similarity_threshold: f32,
    pub partial_info_threshold: f32,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_message_length: usize,
    pub max_history_messages: usize,
    pub request_timeout_secs: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            partial_info_threshold: 0.5,
            top_k: 3,
            chunk_size: 1000,
            chunk_overlap: 200,
            max_message_length: 5000,
            max_history_messages: 50,
            request_timeout_secs: 30,
        }
    }
}

impl Tunables {
    pub fn from_env() -> Result<Self, AppError> {
        let d = Tunables::default();
        let out = Self {
            similarity_threshold: env_f32("SIMILARITY_THRESHOLD", d.similarity_threshold)?,
            partial_info_threshold: env_f32("PARTIAL_INFO_THRESHOLD", d.partial_info_threshold)?,
            top_k: env_usize("TOP_K", d.top_k)?,
            chunk_size: env_usize("CHUNK_SIZE", d.chunk_size)?,
            chunk_overlap: env_usize("CHUNK_OVERLAP", d.chunk_overlap)?,
            max_message_length: env_usize("MAX_MESSAGE_LENGTH", d.max_message_length)?,
            max_history_messages: env_usize("MAX_HISTORY_MESSAGES", d.max_history_messages)?,
            request_timeout_secs: env_u64("REQUEST_TIMEOUT_SECS", d.request_timeout_secs)?,
        };
        out.validate()?;
        Ok(out)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(AppError::new(
                "CONFIG_ENV_INVALID",
                "SIMILARITY_THRESHOLD must be within [0, 1]",
            )
            .with_details(format!("value={}", self.similarity_threshold)));
        }
        if !(0.0..=1.0).contains(&self.partial_info_threshold) {
            return Err(AppError::new(
                "CONFIG_ENV_INVALID",
                "PARTIAL_INFO_THRESHOLD must be within [0, 1]",
            )
            .with_details(format!("value={}", self.partial_info_threshold)));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::new(
                "CONFIG_ENV_INVALID",
                "CHUNK_OVERLAP must be smaller than CHUNK_SIZE",
            )
            .with_details(format!(
                "chunk_size={}; chunk_overlap={}",
                self.chunk_size, self.chunk_overlap
            )));
        }
        if self.top_k == 0 {
            return Err(AppError::new("CONFIG_ENV_INVALID", "TOP_K must be >= 1"));
        }
        Ok(())
    }
}

/// Full runtime configuration. Keys are read lazily as optionals so that
/// flows which do not need a provider (e.g. scrape-only ingestion) can run
/// without it; `require_*` accessors surface an actionable fatal error at
/// the point a provider becomes mandatory.
#[derive(Debug, Clone)]
pub struct Config {
    pub embeddings_api_key: Option<String>,
    pub embeddings_url: String,
    pub embedding_model: String,
    pub vector_index_api_key: Option<String>,
    pub vector_index_url: Option<String>,
    pub completions_api_key: Option<String>,
    pub completions_url: String,
    pub completion_model: String,
    pub tunables: Tunables,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            embeddings_api_key: env_opt(ENV_EMBEDDINGS_API_KEY),
            embeddings_url: env_or(
                "EMBEDDINGS_URL",
                "https://api.openai.com/v1/embeddings",
            ),
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            vector_index_api_key: env_opt(ENV_VECTOR_INDEX_API_KEY),
            vector_index_url: env_opt(ENV_VECTOR_INDEX_URL),
            completions_api_key: env_opt(ENV_COMPLETIONS_API_KEY),
            completions_url: env_or(
                "COMPLETIONS_URL",
                "https://api.openai.com/v1/chat/completions",
            ),
            completion_model: env_or("COMPLETION_MODEL", "gpt-4o-mini"),
            tunables: Tunables::from_env()?,
        })
    }

    pub fn require_embeddings_key(&self) -> Result<&str, AppError> {
        require(self.embeddings_api_key.as_deref(), ENV_EMBEDDINGS_API_KEY)
    }

    pub fn require_vector_index_key(&self) -> Result<&str, AppError> {
        require(
            self.vector_index_api_key.as_deref(),
            ENV_VECTOR_INDEX_API_KEY,
        )
    }

    pub fn require_vector_index_url(&self) -> Result<&str, AppError> {
        require(self.vector_index_url.as_deref(), ENV_VECTOR_INDEX_URL)
    }

    pub fn require_completions_key(&self) -> Result<&str, AppError> {
        require(self.completions_api_key.as_deref(), ENV_COMPLETIONS_API_KEY)
    }
}

fn require<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::new(
            "CONFIG_ENV_MISSING",
            format!("Environment variable {name} is required but not set"),
        )
        .with_details(format!("set {name} in the environment or .env file"))),
    }
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_f32(name: &str, default: f32) -> Result<f32, AppError> {
    match env_opt(name) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| {
            AppError::new("CONFIG_ENV_INVALID", format!("{name} must be a number"))
                .with_details(format!("value={v}"))
        }),
    }
}

fn env_usize(name: &str, default: usize) -> Result<usize, AppError> {
    match env_opt(name) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| {
            AppError::new("CONFIG_ENV_INVALID", format!("{name} must be an integer"))
                .with_details(format!("value={v}"))
        }),
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64, AppError> {
    match env_opt(name) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| {
            AppError::new("CONFIG_ENV_INVALID", format!("{name} must be an integer"))
                .with_details(format!("value={v}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let t = Tunables::default();
        assert_eq!(t.similarity_threshold, 0.75);
        assert_eq!(t.partial_info_threshold, 0.5);
        assert_eq!(t.top_k, 3);
        assert_eq!(t.chunk_size, 1000);
        assert_eq!(t.chunk_overlap, 200);
        assert_eq!(t.max_message_length, 5000);
        assert_eq!(t.max_history_messages, 50);
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let t = Tunables {
            chunk_overlap: 1000,
            ..Tunables::default()
        };
        let err = t.validate().unwrap_err();
        assert_eq!(err.code, "CONFIG_ENV_INVALID");
    }

    #[test]
    fn missing_required_key_is_actionable() {
        let err = require(None, "EMBEDDINGS_API_KEY").unwrap_err();
        assert_eq!(err.code, "CONFIG_ENV_MISSING");
        assert!(err.message.contains("EMBEDDINGS_API_KEY"));
    }
}
