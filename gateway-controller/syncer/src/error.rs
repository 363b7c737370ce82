use gateway_controller_core::{ResourceKey, ValidationError};
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Translation produced invalid configuration. The store is unchanged.
    #[error("snapshot rejected: {0}")]
    Rejected(#[from] ValidationError),

    #[error("failed to reconcile proxies: {0:#}")]
    Reconcile(anyhow::Error),

    /// Some proxies' statuses are not being propagated. All other proxies are.
    #[error(transparent)]
    Watch(#[from] WatchErrors),
}

#[derive(Debug, thiserror::Error)]
#[error("creating watch for proxy {proxy}: {error:#}")]
pub struct WatchSetupError {
    pub proxy: ResourceKey,
    error: anyhow::Error,
}

/// Collects the watch failures of a single sync.
#[derive(Debug, Default)]
pub struct WatchErrors(Vec<WatchSetupError>);

// === impl SyncError ===

impl SyncError {
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Rejected(error) => Some(error),
            _ => None,
        }
    }

    pub(crate) fn as_label(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "rejected",
            Self::Reconcile(_) => "reconcile_error",
            Self::Watch(_) => "watch_error",
        }
    }
}

// === impl WatchSetupError ===

impl WatchSetupError {
    pub(crate) fn new(proxy: ResourceKey, error: anyhow::Error) -> Self {
        Self { proxy, error }
    }
}

// === impl WatchErrors ===

impl WatchErrors {
    pub(crate) fn push(&mut self, error: WatchSetupError) {
        self.0.push(error);
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchSetupError> + '_ {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn into_result(self) -> Result<(), Self> {
        if self.0.is_empty() {
            return Ok(());
        }
        Err(self)
    }
}

impl fmt::Display for WatchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [error] => write!(f, "{error}"),
            errors => {
                write!(f, "{} watches failed:", errors.len())?;
                for error in errors {
                    write!(f, "\n\t* {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for WatchErrors {}
