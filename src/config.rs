use anyhow::{Context, Result};

use std::path::PathBuf;

const DEFAULT_DATABASE_PATH: &str = "steward.db";
const DEFAULT_LEADERBOARD_LIMIT: usize = 50;

/// Where the object store lives and the key to reach it with.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    /// Profile to sign in as on startup.
    pub user_id: Option<i64>,
    pub storage: Option<StorageConfig>,
    pub leaderboard_limit: usize,
}

impl Config {
    /// Reads the configuration from the environment (load `.env` first to include it).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_path = lookup("STEWARD_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        let user_id = lookup("STEWARD_USER")
            .map(|id| id.trim().parse::<i64>())
            .transpose()
            .context("Expected 'STEWARD_USER=<profile id>' to be a number.")?;

        let storage = match (lookup("STEWARD_STORAGE_URL"), lookup("STEWARD_STORAGE_KEY")) {
            (Some(url), Some(api_key)) => Some(StorageConfig { url, api_key }),
            (None, None) => None,
            _ => {
                log::warn!("Photo storage needs both $STEWARD_STORAGE_URL and \
                            $STEWARD_STORAGE_KEY; photo uploads are disabled.");
                None
            }
        };

        let leaderboard_limit = lookup("STEWARD_LEADERBOARD_LIMIT")
            .map(|limit| limit.trim().parse::<usize>())
            .transpose()
            .context("Expected 'STEWARD_LEADERBOARD_LIMIT' to be a number.")?
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT);

        Ok(Self { database_path, user_id, storage, leaderboard_limit })
    }
}
