use filekit_storage::StorageError;
use std::borrow::Cow;

/// Failures of a save or delete call.
///
/// Backend failures surface unchanged as [`EngineError::Storage`]. A create-if-absent
/// write that finds the key taken is not an error; see
/// [`SaveOutcome::Rejected`](crate::SaveOutcome::Rejected).
#[filekit_derive::filekit_error]
pub enum EngineError {
    #[error("Storage backend failure{}: {source}", format_context(.context))]
    Storage { source: StorageError, context: Option<Cow<'static, str>> },

    /// Every generated name was already taken.
    #[error("No free file name after {attempts} attempts{}", format_context(.context))]
    NameAllocationExhausted { attempts: u32, context: Option<Cow<'static, str>> },

    /// The shard counter kept changing underneath concurrent writers.
    #[error("Shard counter contention{}: {message}", format_context(.context))]
    ShardContention { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid shard counter{}: {message}", format_context(.context))]
    InvalidCounter { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid file name{}: {message}", format_context(.context))]
    InvalidFileName { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Operation cancelled{}: {message}", format_context(.context))]
    Cancelled { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },

    #[error("Invalid configuration{}: {message}", format_context(.context))]
    InvalidConfig { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
