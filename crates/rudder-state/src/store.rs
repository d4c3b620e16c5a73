//! RuntimeStateStore: the process-wide operating configuration.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::patch::RuntimeStatePatch;
use crate::state::RuntimeState;

/// Shared, copy-on-write runtime state.
///
/// Writers are serialized by `writer`; each merge builds a fresh
/// `RuntimeState` and swaps the `Arc`, so readers always see either the
/// old or the new snapshot and never a half-applied merge.
///
/// Thread-safe: share via `Arc<RuntimeStateStore>`.
pub struct RuntimeStateStore {
    current: RwLock<Arc<RuntimeState>>,
    writer: Mutex<()>,
    version: AtomicU64,
}

impl Default for RuntimeStateStore {
    fn default() -> Self {
        Self::new(RuntimeState::default())
    }
}

impl RuntimeStateStore {
    #[must_use]
    pub fn new(initial: RuntimeState) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            writer: Mutex::new(()),
            version: AtomicU64::new(0),
        }
    }

    /// Consistent snapshot of the current state.
    #[must_use]
    pub fn get(&self) -> Arc<RuntimeState> {
        Arc::clone(&self.current.read())
    }

    /// Merge `patch` into the state and return the resulting snapshot.
    ///
    /// A patch that changes nothing leaves both the state and the
    /// version untouched, so repeated toggles are idempotent.
    pub fn set(&self, patch: RuntimeStatePatch) -> Arc<RuntimeState> {
        match self.try_set(patch, |_| Ok::<(), Infallible>(())) {
            Ok(next) => next,
            Err(never) => match never {},
        }
    }

    /// Merge `patch` only if `validate` accepts the merged candidate.
    ///
    /// Validation runs under the writer lock, so no other merge can land
    /// between the check and the swap. On `Err` the state is unchanged.
    pub fn try_set<E>(
        &self,
        patch: RuntimeStatePatch,
        validate: impl FnOnce(&RuntimeState) -> Result<(), E>,
    ) -> Result<Arc<RuntimeState>, E> {
        let _guard = self.writer.lock();
        let current = self.get();

        let mut next = (*current).clone();
        patch.apply_to(&mut next);

        if next == *current {
            debug!("State patch is a no-op, keeping current snapshot");
            return Ok(current);
        }

        validate(&next)?;

        if next.global_stop && !current.global_stop {
            warn!("Global stop engaged");
        }

        let next = Arc::new(next);
        // Bump first: a reader that sees the new snapshot also sees its version.
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        *self.current.write() = Arc::clone(&next);

        info!(
            version,
            auto_mode = next.auto_mode,
            global_stop = next.global_stop,
            trading_on = next.trading_on,
            cap_pct = %next.ops.capital.cap_pct,
            "Runtime state updated"
        );
        Ok(next)
    }

    /// Number of state-changing merges applied so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}
