use crate::error::{EngineError, EngineErrorExt};
use config::{Config, Environment, File};
use filekit_codec::ThumbnailSpec;
use filekit_storage::validate_key;
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use tracing::info;

/// Most directory entries a FAT32 directory can hold.
pub const DEFAULT_MAX_FILES_PER_SHARD: u64 = 65_535;
pub const DEFAULT_NAME_ATTEMPTS: u32 = 16;
pub const DEFAULT_NAME_LENGTH: usize = 32;

/// How many files a shard may hold before new saves roll over to the next one.
///
/// In configuration this is a positive integer, `"unlimited"`, or `-1` (also unlimited).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardPolicy {
    Limited(u64),
    Unlimited,
}

impl Default for ShardPolicy {
    fn default() -> Self {
        Self::Limited(DEFAULT_MAX_FILES_PER_SHARD)
    }
}

impl ShardPolicy {
    fn from_signed(value: i64) -> Result<Self, String> {
        match value {
            -1 => Ok(Self::Unlimited),
            n if n > 0 => Ok(Self::Limited(n.unsigned_abs())),
            n => Err(format!("max files per shard must be positive or -1, got {n}")),
        }
    }

    fn from_text(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("unlimited") {
            return Ok(Self::Unlimited);
        }
        value
            .parse::<i64>()
            .map_err(|_| format!("expected a number or \"unlimited\", got {value:?}"))
            .and_then(Self::from_signed)
    }
}

impl Serialize for ShardPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Limited(n) => serializer.serialize_u64(*n),
            Self::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

impl<'de> Deserialize<'de> for ShardPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Signed(i64),
            Unsigned(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Signed(n) => Self::from_signed(n),
            Raw::Unsigned(n) => Ok(Self::Limited(n)),
            Raw::Text(s) => Self::from_text(&s),
        }
        .map_err(de::Error::custom)
    }
}

/// Engine settings.
///
/// ```rust
/// use filekit_engine::{EngineConfig, ShardPolicy};
///
/// let cfg: EngineConfig = serde_json::from_str(
///     r#"{ "target_dir": "media", "max_files_per_shard": "unlimited",
///          "thumbnails": [{ "width": 200, "height": 200 }] }"#,
/// ).unwrap();
///
/// assert_eq!(cfg.max_files_per_shard, ShardPolicy::Unlimited);
/// assert_eq!(cfg.name_attempts, 16);
/// cfg.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Key prefix every shard lives under.
    pub target_dir: String,
    pub max_files_per_shard: ShardPolicy,
    /// Derivatives to produce for every save, in order. Empty disables thumbnails.
    pub thumbnails: Vec<ThumbnailSpec>,
    /// Random names tried before giving up with `NameAllocationExhausted`.
    pub name_attempts: u32,
    pub name_length: usize,
    /// Where video frames are staged; the OS temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_dir: "uploads".to_owned(),
            max_files_per_shard: ShardPolicy::default(),
            thumbnails: Vec::new(),
            name_attempts: DEFAULT_NAME_ATTEMPTS,
            name_length: DEFAULT_NAME_LENGTH,
            temp_dir: None,
        }
    }
}

impl EngineConfig {
    /// Checks the settings the engine cannot recover from at runtime.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |field: &'static str, reason: String| EngineError::InvalidConfig {
            message: reason.into(),
            context: Some(field.into()),
        };

        validate_key(&self.target_dir)
            .map_err(|err| invalid("target_dir", err.to_string()))?;
        if self.target_dir.split('/').any(|segment| segment == "thumbnails") {
            return Err(invalid("target_dir", "must not contain a `thumbnails` segment".to_owned()));
        }
        if self.max_files_per_shard == ShardPolicy::Limited(0) {
            return Err(invalid("max_files_per_shard", "must be positive".to_owned()));
        }
        if let Some(spec) = self.thumbnails.iter().find(|spec| spec.is_empty()) {
            return Err(invalid("thumbnails", format!("{spec} has a zero dimension")));
        }
        if self.name_attempts == 0 {
            return Err(invalid("name_attempts", "must be at least 1".to_owned()));
        }
        if self.name_length == 0 {
            return Err(invalid("name_length", "must be at least 1".to_owned()));
        }
        Ok(())
    }
}

/// Loads `T` from a configuration file, overlaid with `FILEKIT__`-prefixed environment
/// variables (`FILEKIT__ENGINE__TARGET_DIR` maps to `engine.target_dir`).
///
/// The file format follows the extension (`.toml`, `.yaml`, `.json`, ...); a path without
/// one is probed for each supported extension.
///
/// # Errors
/// Returns [`EngineError::Config`] if the file is missing or does not match `T`.
pub fn load_config<T>(path: impl AsRef<Path>) -> Result<T, EngineError>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    info!(path = %path.display(), "Loading configuration");

    Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("FILEKIT")
                .prefix_separator("__")
                .separator("__")
                .convert_case(config::Case::Snake),
        )
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(json: &str) -> Result<ShardPolicy, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[test]
    fn shard_policy_accepts_all_spellings() {
        assert_eq!(policy("100").unwrap(), ShardPolicy::Limited(100));
        assert_eq!(policy("-1").unwrap(), ShardPolicy::Unlimited);
        assert_eq!(policy("\"unlimited\"").unwrap(), ShardPolicy::Unlimited);
        assert_eq!(policy("\"UNLIMITED\"").unwrap(), ShardPolicy::Unlimited);
        assert_eq!(policy("\"250\"").unwrap(), ShardPolicy::Limited(250));
        assert!(policy("0").is_err());
        assert!(policy("-7").is_err());
        assert!(policy("\"lots\"").is_err());
    }

    #[test]
    fn shard_policy_serializes_back() {
        assert_eq!(serde_json::to_string(&ShardPolicy::Limited(9)).unwrap(), "9");
        assert_eq!(serde_json::to_string(&ShardPolicy::Unlimited).unwrap(), "\"unlimited\"");
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.target_dir, "uploads");
        assert_eq!(cfg.max_files_per_shard, ShardPolicy::Limited(65_535));
        cfg.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let bad = [
            EngineConfig { target_dir: String::new(), ..EngineConfig::default() },
            EngineConfig { target_dir: "/abs".to_owned(), ..EngineConfig::default() },
            EngineConfig { target_dir: "a/../b".to_owned(), ..EngineConfig::default() },
            EngineConfig { target_dir: "a/thumbnails".to_owned(), ..EngineConfig::default() },
            EngineConfig { thumbnails: vec![ThumbnailSpec::new(0, 5)], ..EngineConfig::default() },
            EngineConfig { name_attempts: 0, ..EngineConfig::default() },
            EngineConfig { name_length: 0, ..EngineConfig::default() },
        ];
        for cfg in bad {
            assert!(
                matches!(cfg.validate(), Err(EngineError::InvalidConfig { .. })),
                "{cfg:?} should be rejected"
            );
        }
    }
}
