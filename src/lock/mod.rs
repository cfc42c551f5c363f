//! # Distributed Lock
//!
//! Lease-based mutual exclusion over an [`AtomicStore`]. The lock record is
//! a single key holding the current [`HolderToken`] with a store-enforced
//! expiry:
//!
//! ```text
//!     Unlocked ──try_lock (set_nx_px)──► Locked
//!        ▲                                 │
//!        ├──── unlock (compare_and_delete) ┤
//!        └──── lease expires ──────────────┘
//! ```
//!
//! Every mutation after acquisition is guarded by the token, so a holder
//! whose lease already expired can never delete or extend someone else's
//! lock. Exclusivity lasts for the lease only; [`LeaseGuard`] extends it in
//! the background for critical sections of unknown length.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use warden::{DistributedLock, HolderToken, MemoryStore};
//!
//! let lock = DistributedLock::new(Arc::new(MemoryStore::new()), "jobs:nightly");
//! let mine = HolderToken::new();
//! let theirs = HolderToken::new();
//!
//! assert!(lock.try_lock(&mine).unwrap());
//! assert!(!lock.try_lock(&theirs).unwrap());
//! assert!(!lock.unlock(&theirs).unwrap());
//! assert!(lock.unlock(&mine).unwrap());
//! ```

mod token;
mod watchdog;

pub use token::HolderToken;

use crate::error::{ConfigError, LockError, StoreResult};
use crate::store::{AtomicStore, KeyTtl};
use std::sync::Arc;
use tracing::{debug, warn};
use watchdog::Watchdog;

/// Default lease duration.
pub const DEFAULT_LEASE_MS: u64 = 30_000;

/// Lease and renewal timing for a [`DistributedLock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    /// Expiry attached to the key on acquisition and on every renewal.
    pub lease_ms: u64,
    /// Period of the watchdog's renewals. Must be shorter than the lease.
    pub renew_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self::with_lease_ms(DEFAULT_LEASE_MS)
    }
}

impl LockConfig {
    /// Lease of `lease_ms`, renewed every third of it.
    pub fn with_lease_ms(lease_ms: u64) -> Self {
        Self {
            lease_ms,
            renew_interval_ms: lease_ms / 3,
        }
    }

    /// Overrides the renewal period.
    pub fn with_renew_interval_ms(mut self, renew_interval_ms: u64) -> Self {
        self.renew_interval_ms = renew_interval_ms;
        self
    }

    /// Validates the timing.
    ///
    /// # Errors
    ///
    /// Rejects a zero lease, a zero renewal period, and a renewal period
    /// that is not shorter than the lease.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lease_ms == 0 {
            return Err(ConfigError::Zero { field: "lease_ms" });
        }
        if self.renew_interval_ms == 0 {
            return Err(ConfigError::Zero { field: "renew_interval_ms" });
        }
        if self.renew_interval_ms >= self.lease_ms {
            return Err(ConfigError::Inconsistent(
                "renew_interval_ms must be shorter than lease_ms",
            ));
        }
        Ok(())
    }
}

/// Lease lock on one store key.
///
/// The lock itself is stateless beyond the store handle; all ownership lives
/// in the store and in the caller's [`HolderToken`].
pub struct DistributedLock<S: AtomicStore + ?Sized> {
    store: Arc<S>,
    key: String,
    config: LockConfig,
}

impl<S: AtomicStore + ?Sized> DistributedLock<S> {
    /// Lock on `key` with the default 30s lease.
    pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            config: LockConfig::default(),
        }
    }

    /// Lock on `key` with custom lease timing.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not validate.
    pub fn with_config(
        store: Arc<S>,
        key: impl Into<String>,
        config: LockConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            key: key.into(),
            config,
        })
    }

    /// Installs `token` if nobody holds the lock. One atomic store command.
    ///
    /// Returns `Ok(true)` iff this call acquired the lock.
    pub fn try_lock(&self, token: &HolderToken) -> StoreResult<bool> {
        let acquired = self
            .store
            .set_nx_px(&self.key, token.as_str(), self.config.lease_ms)?;
        if acquired {
            debug!("Acquired lock '{}' (lease: {}ms)", self.key, self.config.lease_ms);
        }
        Ok(acquired)
    }

    /// Releases the lock if `token` still holds it.
    ///
    /// `Ok(false)` means the lease was already gone (expired or taken over);
    /// the caller must not assume its critical section ran exclusively.
    pub fn unlock(&self, token: &HolderToken) -> StoreResult<bool> {
        let released = self.store.compare_and_delete(&self.key, token.as_str())?;
        if released {
            debug!("Released lock '{}'", self.key);
        } else {
            warn!("Unlock of '{}' found the lease no longer held", self.key);
        }
        Ok(released)
    }

    /// Resets the lease to its full duration if `token` still holds it.
    pub fn renew(&self, token: &HolderToken) -> StoreResult<bool> {
        self.store
            .compare_and_pexpire(&self.key, token.as_str(), self.config.lease_ms)
    }

    /// Whether `token` is the current holder.
    pub fn is_held_by(&self, token: &HolderToken) -> StoreResult<bool> {
        Ok(self.store.get(&self.key)?.as_deref() == Some(token.as_str()))
    }

    /// Remaining lease of whoever holds the lock.
    pub fn remaining_lease(&self) -> StoreResult<KeyTtl> {
        self.store.pttl(&self.key)
    }

    /// Store key of the lock record.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Lease timing in use.
    pub fn config(&self) -> &LockConfig {
        &self.config
    }
}

impl<S: AtomicStore + ?Sized + 'static> DistributedLock<S> {
    /// Acquires with `token` and keeps the lease alive in the background.
    ///
    /// Returns `Ok(None)` if the lock is held by someone else. The returned
    /// guard renews every `renew_interval_ms` until it is unlocked, dropped,
    /// or the renewal finds the lease lost.
    ///
    /// # Errors
    ///
    /// [`LockError::Store`] if acquisition failed at the store, and
    /// [`LockError::Spawn`] if the renewal thread could not start (the lock
    /// is released again before returning).
    pub fn lock_with_watchdog(&self, token: HolderToken) -> Result<Option<LeaseGuard<S>>, LockError> {
        if !self.try_lock(&token)? {
            return Ok(None);
        }

        let watchdog = match Watchdog::spawn(
            self.store.clone(),
            self.key.clone(),
            token.clone(),
            self.config.lease_ms,
            self.config.renew_interval_ms,
        ) {
            Ok(watchdog) => watchdog,
            Err(e) => {
                if let Err(release_err) = self.store.compare_and_delete(&self.key, token.as_str()) {
                    warn!("Failed to release '{}' after spawn failure: {}", self.key, release_err);
                }
                return Err(LockError::Spawn(e));
            }
        };

        Ok(Some(LeaseGuard {
            store: self.store.clone(),
            key: self.key.clone(),
            token,
            watchdog,
            released: false,
        }))
    }
}

impl<S: AtomicStore + ?Sized> std::fmt::Debug for DistributedLock<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedLock")
            .field("key", &self.key)
            .field("config", &self.config)
            .finish()
    }
}

/// A held lease whose renewal runs on a background thread.
///
/// Dropping the guard stops renewal and releases the lock best-effort.
/// Call [`unlock`](Self::unlock) to learn whether the lease survived.
pub struct LeaseGuard<S: AtomicStore + ?Sized> {
    store: Arc<S>,
    key: String,
    token: HolderToken,
    watchdog: Watchdog,
    released: bool,
}

impl<S: AtomicStore + ?Sized> LeaseGuard<S> {
    /// Stops renewal, then deletes the lock if this guard still holds it.
    ///
    /// `Ok(false)` means the lease had been lost at some point.
    pub fn unlock(mut self) -> StoreResult<bool> {
        self.watchdog.stop();
        self.released = true;
        let released = self.store.compare_and_delete(&self.key, self.token.as_str())?;
        if released {
            debug!("Released lock '{}'", self.key);
        } else {
            warn!("Lease on '{}' was lost before unlock", self.key);
        }
        Ok(released)
    }

    /// Stops renewal but keeps the lock until its lease runs out.
    pub fn stop_renewal(&mut self) {
        self.watchdog.stop();
    }

    /// Whether the watchdog is still renewing.
    ///
    /// Turns false once renewal finds the lease lost.
    pub fn is_renewing(&self) -> bool {
        self.watchdog.is_running()
    }

    /// Token this guard holds the lock with.
    pub fn token(&self) -> &HolderToken {
        &self.token
    }

    /// Store key of the lock record.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<S: AtomicStore + ?Sized> Drop for LeaseGuard<S> {
    fn drop(&mut self) {
        self.watchdog.stop();
        if self.released {
            return;
        }
        match self.store.compare_and_delete(&self.key, self.token.as_str()) {
            Ok(true) => debug!("Released lock '{}' on drop", self.key),
            Ok(false) => warn!("Lease on '{}' was lost before drop", self.key),
            Err(e) => warn!("Failed to release '{}' on drop: {}", self.key, e),
        }
    }
}

impl<S: AtomicStore + ?Sized> std::fmt::Debug for LeaseGuard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseGuard")
            .field("key", &self.key)
            .field("token", &self.token)
            .field("renewing", &self.is_renewing())
            .finish()
    }
}
