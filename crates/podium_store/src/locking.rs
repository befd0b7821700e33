//! Per-identifier locking.
//!
//! [`LockingResourceStore`] holds locks keyed by identifier for the whole
//! duration of each inner store call, so condition evaluation and commit
//! cannot interleave with another write to the same resource. Reads share
//! the lock of their target; writes are exclusive.
//!
//! A write holds every identifier it may modify. An auxiliary resource only
//! stamps its subject and is locked through it. Any other write locks its
//! target and, when the target is new, each ancestor up to and including
//! the first one that exists, since those are created or stamped. Deletes
//! lock the target and its parent. Locks are always taken outermost first,
//! so two writes never wait on each other in a cycle.

use crate::auxiliary::AuxiliaryStrategy;
use crate::conditions::Conditions;
use crate::identifier::ResourceIdentifier;
use crate::patch::Patch;
use crate::preferences::RepresentationPreferences;
use crate::representation::Representation;
use crate::store::{ModifiedResource, ResourceStore};
use async_trait::async_trait;
use dashmap::DashMap;
use log::{trace, warn};
use podium_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Number of lock entries above which idle entries are pruned.
const DEFAULT_PRUNE_THRESHOLD: usize = 1024;

/// A table of read/write locks keyed by resource identifier.
pub struct ResourceLocker {
    locks: DashMap<String, Arc<RwLock<()>>>,
    timeout: Option<Duration>,
    prune_threshold: usize,
}

impl ResourceLocker {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
            timeout: None,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
        }
    }

    /// Fails acquisitions that wait longer than `timeout` with [`Error::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_prune_threshold(mut self, threshold: usize) -> Self {
        self.prune_threshold = threshold;
        self
    }

    /// Number of lock entries currently held in the table.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn lock_for(&self, identifier: &ResourceIdentifier) -> Arc<RwLock<()>> {
        if self.locks.len() > self.prune_threshold {
            self.prune();
        }
        self.locks
            .entry(identifier.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Drops entries nobody holds or waits for.
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Acquires the shared lock of `identifier`.
    pub async fn read(&self, identifier: &ResourceIdentifier) -> Result<OwnedRwLockReadGuard<()>> {
        let lock = self.lock_for(identifier);
        trace!("read lock {}", identifier);
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, lock.read_owned())
                .await
                .map_err(|_| timed_out(identifier)),
            None => Ok(lock.read_owned().await),
        }
    }

    /// Acquires the exclusive locks of `identifiers` in the given order.
    ///
    /// Callers pass ancestors before descendants.
    pub async fn write_all(
        &self,
        identifiers: &[ResourceIdentifier],
    ) -> Result<Vec<OwnedRwLockWriteGuard<()>>> {
        let mut guards = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            guards.push(self.write(identifier).await?);
        }
        Ok(guards)
    }

    /// Acquires the exclusive lock of `identifier`.
    pub async fn write(&self, identifier: &ResourceIdentifier) -> Result<OwnedRwLockWriteGuard<()>> {
        let lock = self.lock_for(identifier);
        trace!("write lock {}", identifier);
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, lock.write_owned())
                .await
                .map_err(|_| timed_out(identifier)),
            None => Ok(lock.write_owned().await),
        }
    }
}

impl Default for ResourceLocker {
    fn default() -> Self {
        Self::new()
    }
}

fn timed_out(identifier: &ResourceIdentifier) -> Error {
    warn!("Timed out waiting for lock on {}", identifier);
    Error::Timeout(format!("lock on {}", identifier))
}

/// Serialises conflicting calls to an inner store per identifier.
pub struct LockingResourceStore<S> {
    inner: S,
    locker: ResourceLocker,
    auxiliary: Arc<dyn AuxiliaryStrategy>,
}

impl<S: ResourceStore> LockingResourceStore<S> {
    pub fn new(inner: S, auxiliary: Arc<dyn AuxiliaryStrategy>) -> Self {
        Self::with_locker(inner, auxiliary, ResourceLocker::new())
    }

    pub fn with_locker(
        inner: S,
        auxiliary: Arc<dyn AuxiliaryStrategy>,
        locker: ResourceLocker,
    ) -> Self {
        Self {
            inner,
            locker,
            auxiliary,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn locker(&self) -> &ResourceLocker {
        &self.locker
    }

    /// Auxiliaries are locked through their subject.
    fn lock_key(&self, identifier: &ResourceIdentifier) -> ResourceIdentifier {
        self.auxiliary
            .subject_of(identifier)
            .unwrap_or_else(|| identifier.clone())
    }

    /// Locks everything a write to `target` may create or stamp.
    ///
    /// The chain grows towards the root until its outermost member exists.
    /// Existence is checked while the chain is held, and nobody can create
    /// or remove a held identifier.
    async fn lock_for_write(
        &self,
        target: &ResourceIdentifier,
    ) -> Result<Vec<OwnedRwLockWriteGuard<()>>> {
        if let Some(subject) = self.auxiliary.subject_of(target) {
            return Ok(vec![self.locker.write(&subject).await?]);
        }
        let mut chain = vec![target.clone()];
        loop {
            let guards = self.locker.write_all(&chain).await?;
            let Some(parent) = chain[0].parent() else {
                return Ok(guards);
            };
            if self.inner.resource_exists(&chain[0], None).await? {
                return Ok(guards);
            }
            drop(guards);
            trace!("{} does not exist, extending lock to {}", chain[0], parent);
            chain.insert(0, parent);
        }
    }

    /// Locks the target of a delete and the parent it stamps.
    async fn lock_for_delete(
        &self,
        target: &ResourceIdentifier,
    ) -> Result<Vec<OwnedRwLockWriteGuard<()>>> {
        if let Some(subject) = self.auxiliary.subject_of(target) {
            return Ok(vec![self.locker.write(&subject).await?]);
        }
        let chain: Vec<_> = target.parent().into_iter().chain([target.clone()]).collect();
        self.locker.write_all(&chain).await
    }
}

#[async_trait]
impl<S: ResourceStore> ResourceStore for LockingResourceStore<S> {
    async fn resource_exists(
        &self,
        identifier: &ResourceIdentifier,
        conditions: Option<&Conditions>,
    ) -> Result<bool> {
        let _guard = self.locker.read(&self.lock_key(identifier)).await?;
        self.inner.resource_exists(identifier, conditions).await
    }

    async fn get_representation(
        &self,
        identifier: &ResourceIdentifier,
        preferences: &RepresentationPreferences,
        conditions: Option<&Conditions>,
    ) -> Result<Representation> {
        let _guard = self.locker.read(&self.lock_key(identifier)).await?;
        self.inner
            .get_representation(identifier, preferences, conditions)
            .await
    }

    async fn set_representation(
        &self,
        identifier: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> Result<Vec<ModifiedResource>> {
        let _guards = self.lock_for_write(identifier).await?;
        self.inner
            .set_representation(identifier, representation, conditions)
            .await
    }

    async fn add_resource(
        &self,
        container: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> Result<Vec<ModifiedResource>> {
        let _guards = self.lock_for_write(container).await?;
        self.inner
            .add_resource(container, representation, conditions)
            .await
    }

    async fn delete_resource(
        &self,
        identifier: &ResourceIdentifier,
        conditions: Option<&Conditions>,
    ) -> Result<Vec<ModifiedResource>> {
        let _guards = self.lock_for_delete(identifier).await?;
        self.inner.delete_resource(identifier, conditions).await
    }

    async fn modify_resource(
        &self,
        identifier: &ResourceIdentifier,
        patch: Patch,
        conditions: Option<&Conditions>,
    ) -> Result<Vec<ModifiedResource>> {
        let _guards = self.lock_for_write(identifier).await?;
        self.inner.modify_resource(identifier, patch, conditions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ResourceIdentifier {
        ResourceIdentifier::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_shared_reads() {
        let locker = ResourceLocker::new();
        let first = locker.read(&id("http://h/a")).await.unwrap();
        let second = locker.read(&id("http://h/a")).await.unwrap();
        drop((first, second));
    }

    #[tokio::test]
    async fn test_write_timeout() {
        let locker = ResourceLocker::new().with_timeout(Duration::from_millis(20));
        let _held = locker.write(&id("http://h/a")).await.unwrap();
        let err = locker.write(&id("http://h/a")).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));

        // other identifiers are unaffected
        assert!(locker.write(&id("http://h/b")).await.is_ok());
    }

    #[tokio::test]
    async fn test_write_all_holds_every_lock() {
        let locker = ResourceLocker::new().with_timeout(Duration::from_millis(20));
        let _held = locker
            .write_all(&[id("http://h/c/"), id("http://h/c/doc")])
            .await
            .unwrap();
        assert!(locker.write(&id("http://h/c/")).await.is_err());
        assert!(locker.read(&id("http://h/c/doc")).await.is_err());
        assert!(locker.write(&id("http://h/")).await.is_ok());
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locker = ResourceLocker::new();
        let held = locker.write(&id("http://h/a")).await.unwrap();
        drop(locker.write(&id("http://h/b")).await.unwrap());
        assert_eq!(locker.len(), 2);

        locker.prune();
        assert_eq!(locker.len(), 1);
        drop(held);
        locker.prune();
        assert!(locker.is_empty());
    }
}
