use crate::core::{HistoryError, RecordKey, Result};
use crate::storage::{DurabilityMode, FileRecordStore, InMemoryRecordStore, RecordStore};
use std::path::PathBuf;

const URL_SCHEME: &str = "history://";

/// Deployment configuration for a token's history record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Address of the tracked token; also the key of its history record
    pub token: RecordKey,

    /// Directory for the WAL and snapshot; `None` keeps records in memory
    pub data_dir: Option<PathBuf>,

    /// How hard writes are pushed to disk
    pub durability: DurabilityMode,

    /// WAL entries between automatic snapshots
    pub checkpoint_threshold: usize,
}

impl HistoryConfig {
    pub fn new(token: RecordKey) -> Self {
        Self {
            token,
            data_dir: None,
            durability: DurabilityMode::default(),
            checkpoint_threshold: 1000,
        }
    }

    /// Set the data directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    pub fn checkpoint_threshold(mut self, threshold: usize) -> Self {
        self.checkpoint_threshold = threshold;
        self
    }

    /// Parse from a history URL
    ///
    /// Format: `history://<token>[@<data_dir>][?durability=<mode>&checkpoint=<n>]`
    ///
    /// ```
    /// # use token_history::{DurabilityMode, HistoryConfig};
    /// let config = HistoryConfig::from_url(
    ///     "history://0x6b175474e89094c44da98b954eedeac495271d0f@/var/lib/history?durability=sync",
    /// )
    /// .unwrap();
    /// assert_eq!(config.durability, DurabilityMode::Sync);
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| HistoryError::ConfigError(format!("URL must start with '{}'", URL_SCHEME)))?;

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };

        let (token, data_dir) = match location.split_once('@') {
            Some((token, dir)) if !dir.is_empty() => (token, Some(dir)),
            Some((token, _)) => (token, None),
            None => (location, None),
        };

        let mut config = Self::new(RecordKey::from_hex(token)?);
        if let Some(dir) = data_dir {
            config = config.data_dir(dir);
        }

        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| HistoryError::ConfigError(format!("Invalid query parameter '{}'", pair)))?;
            match name {
                "durability" => config.durability = value.parse()?,
                "checkpoint" => {
                    config.checkpoint_threshold = value.parse().map_err(|_| {
                        HistoryError::ConfigError(format!("Invalid checkpoint threshold '{}'", value))
                    })?
                }
                other => {
                    return Err(HistoryError::ConfigError(format!("Unknown parameter '{}'", other)));
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Convert to a history URL
    pub fn to_url(&self) -> String {
        let mut url = format!("{}{}", URL_SCHEME, self.token);
        if let Some(dir) = &self.data_dir {
            url.push('@');
            url.push_str(&dir.to_string_lossy());
        }
        let durability = match self.durability {
            DurabilityMode::Sync => "sync",
            DurabilityMode::Async => "async",
            DurabilityMode::None => "none",
        };
        url.push_str(&format!("?durability={}&checkpoint={}", durability, self.checkpoint_threshold));
        url
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint_threshold == 0 {
            return Err(HistoryError::ConfigError("checkpoint threshold must be > 0".to_string()));
        }
        Ok(())
    }

    /// Open the record store this configuration describes
    pub fn open_store(&self) -> Result<Box<dyn RecordStore>> {
        self.validate()?;
        match &self.data_dir {
            Some(dir) => Ok(Box::new(FileRecordStore::open_with_threshold(
                dir,
                self.durability,
                self.checkpoint_threshold,
            )?)),
            None => Ok(Box::new(InMemoryRecordStore::new())),
        }
    }
}
