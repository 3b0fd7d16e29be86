use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// How many times a manager re-runs a read-modify-write after losing an
    /// optimistic version race before surfacing `Conflict`.
    pub max_write_retries: u32,
    pub max_name_len: usize,
    pub max_message_len: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();

        let max_write_retries = env::var("CHAT_MAX_WRITE_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);
        let max_name_len = env::var("CHAT_MAX_NAME_LEN")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(255);
        let max_message_len = env::var("CHAT_MAX_MESSAGE_LEN")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(4096);

        if max_write_retries == 0 {
            return Err(crate::error::AppError::Config(
                "CHAT_MAX_WRITE_RETRIES must be at least 1".into(),
            ));
        }

        Ok(Self {
            max_write_retries,
            max_name_len,
            max_message_len,
        })
    }

    pub fn test_defaults() -> Self {
        Self {
            max_write_retries: 3,
            max_name_len: 255,
            max_message_len: 4096,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::test_defaults()
    }
}
