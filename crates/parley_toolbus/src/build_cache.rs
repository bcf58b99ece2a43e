//! Build artifact reuse keyed by tool id and dependency set.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parley_core::AgentTool;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::executor::ExecutionError;

/// Identity of one build: SHA-256 over the tool id, build image, build command
/// and the sorted, de-duplicated dependency set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildKey(String);

impl BuildKey {
    /// `None` when the tool has no build step.
    pub fn for_tool(tool: &AgentTool) -> Option<Self> {
        let build = tool.build_configuration.as_ref()?;

        let mut dependencies = build.dependencies.clone();
        dependencies.sort();
        dependencies.dedup();

        let mut hasher = Sha256::new();
        for part in [&tool.id, &build.base_image, &build.build_command] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        for dependency in &dependencies {
            hasher.update(format!("{:?}", dependency.kind).as_bytes());
            hasher.update([b':']);
            hasher.update(dependency.value.as_bytes());
            hasher.update([0u8]);
        }
        Some(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BuildKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Build-once cache for executors. Concurrent callers with the same key wait
/// on a single build; a failed build is not cached and the next caller retries.
pub struct BuildCache<A> {
    entries: Mutex<HashMap<BuildKey, Arc<OnceCell<A>>>>,
}

impl<A> Default for BuildCache<A> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<A: Clone + Send + Sync> BuildCache<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_build<F, Fut>(&self, key: &BuildKey, build: F) -> Result<A, ExecutionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<A, ExecutionError>>,
    {
        let cell = {
            let mut entries = self.entries.lock().await;
            Arc::clone(entries.entry(key.clone()).or_default())
        };
        if cell.initialized() {
            debug!(build.key = %key, "Reusing cached build artifact");
        }
        cell.get_or_try_init(build).await.cloned()
    }

    /// Whether a successful build is cached for `key`.
    pub async fn contains(&self, key: &BuildKey) -> bool {
        self.entries
            .lock()
            .await
            .get(key)
            .is_some_and(|cell| cell.initialized())
    }
}
