//! Delivery callbacks.

use crate::artifact::{Artifact, LoadedFrom};
use crate::download::FetchError;
use crate::key::{DisplayConfig, RequestKey};
use crate::loader::consumer::ConsumerHandle;
use std::fmt;
use tracing::{debug, warn};

/// Why a request ended in `on_failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    /// The request carried a blank source identifier.
    EmptySource,
    /// The downloader could not produce the artifact.
    Fetch(FetchError),
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySource => write!(f, "empty source"),
            Self::Fetch(e) => write!(f, "{}", e),
        }
    }
}

/// Receives the events of a request that was not superseded.
///
/// For every such request `on_started` fires once, followed by exactly one
/// of `on_completed` or `on_failed`. A blank source skips `on_started`.
/// Superseded or cancelled requests receive nothing.
///
/// Events are serialised across the whole loader. Implementations may call
/// back into the loader for any consumer, but must not block waiting on
/// another callback.
pub trait LoadCallback: Send + Sync {
    /// Resolution has begun. Fires before any blocking work.
    ///
    /// `config.loading_artifact` is the placeholder to show meanwhile.
    fn on_started(&self, key: &RequestKey, consumer: &ConsumerHandle, config: &DisplayConfig) {
        let _ = (key, consumer, config);
    }

    /// The artifact was resolved from `from`.
    fn on_completed(
        &self,
        key: &RequestKey,
        consumer: &ConsumerHandle,
        artifact: &Artifact,
        config: &DisplayConfig,
        from: LoadedFrom,
    );

    /// Resolution failed; `fallback` is the configured failure artifact.
    fn on_failed(
        &self,
        key: &RequestKey,
        consumer: &ConsumerHandle,
        fallback: Option<&Artifact>,
        failure: &LoadFailure,
    );
}

/// Callback that only logs. Used when no callback is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCallback;

impl LoadCallback for LoggingCallback {
    fn on_completed(
        &self,
        key: &RequestKey,
        consumer: &ConsumerHandle,
        artifact: &Artifact,
        _config: &DisplayConfig,
        from: LoadedFrom,
    ) {
        debug!(
            key = %key,
            consumer = %consumer.id(),
            bytes = artifact.len(),
            from = %from,
            "Artifact loaded"
        );
    }

    fn on_failed(
        &self,
        key: &RequestKey,
        consumer: &ConsumerHandle,
        _fallback: Option<&Artifact>,
        failure: &LoadFailure,
    ) {
        warn!(key = %key, consumer = %consumer.id(), error = %failure, "Artifact load failed");
    }
}
