//! Cooperative advisory lock manager.
//!
//! Grants per-entity read/write locks scoped to user names (or the reserved
//! `server` owner), retries conflicting acquisitions a fixed number of times,
//! and reports every acquisition/release on a notification channel the server
//! turns into `ObjectsLocked` / `ObjectsUnlocked` events. Locks are advisory:
//! mutating RPCs assert `is_write_locked` before touching an entity.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::error::{HubError, Result};

/// Pseudo-id locking the whole open scene.
pub const SCENE_LOCK_ID: &str = "@scene";
/// Pseudo-id locking the whole open project.
pub const PROJECT_LOCK_ID: &str = "@project";
/// Reserved owner for hub-initiated exclusive operations; not assignable to users.
pub const SERVER_OWNER: &str = "server";

/// Attempts per acquisition before giving up with `CannotLock`.
pub const LOCK_RETRIES: u32 = 10;
/// Fixed delay between attempts.
pub const RETRY_WAIT: Duration = Duration::from_millis(100);

/// One lock acquisition/release, published to the notification worker.
#[derive(Clone, Debug, PartialEq)]
pub struct LockNotification {
    pub object_ids: Vec<String>,
    pub owner: String,
    pub locked: bool,
}

#[derive(Clone, Debug)]
enum Entry {
    Read(Vec<String>),
    Write { owner: String, tree: bool },
}

pub struct LockManager {
    entries: Mutex<HashMap<String, Entry>>,
    notify_tx: mpsc::UnboundedSender<LockNotification>,
    retries: u32,
    retry_wait: Duration,
}

impl LockManager {
    /// Returns the manager and the receiver end of its notification channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LockNotification>) {
        Self::with_retry_policy(LOCK_RETRIES, RETRY_WAIT)
    }

    pub fn with_retry_policy(
        retries: u32,
        retry_wait: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<LockNotification>) {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        (
            Self {
                entries: Mutex::new(HashMap::new()),
                notify_tx,
                retries,
                retry_wait,
            },
            notify_rx,
        )
    }

    fn notify(&self, object_ids: Vec<String>, owner: &str, locked: bool) {
        if object_ids.is_empty() {
            return;
        }
        let _ = self.notify_tx.send(LockNotification {
            object_ids,
            owner: owner.to_string(),
            locked,
        });
    }

    /// Single atomic attempt; `false` on conflict, nothing acquired.
    pub async fn try_read_lock(&self, ids: &[String], owner: &str) -> bool {
        let mut entries = self.entries.lock().await;
        for id in ids {
            if let Some(Entry::Write { owner: held, .. }) = entries.get(id) {
                if held != owner {
                    return false;
                }
            }
        }
        for id in ids {
            match entries.get_mut(id) {
                Some(Entry::Read(owners)) => owners.push(owner.to_string()),
                Some(Entry::Write { .. }) => {}
                None => {
                    entries.insert(id.clone(), Entry::Read(vec![owner.to_string()]));
                }
            }
        }
        drop(entries);
        self.notify(ids.to_vec(), owner, true);
        true
    }

    /// Single atomic attempt; `false` on conflict, nothing acquired.
    pub async fn try_write_lock(&self, ids: &[String], owner: &str, tree: bool) -> bool {
        let mut entries = self.entries.lock().await;
        for id in ids {
            match entries.get(id) {
                Some(Entry::Write { owner: held, .. }) if held != owner => return false,
                Some(Entry::Read(owners)) if owners.iter().any(|o| o != owner) => return false,
                _ => {}
            }
        }
        for id in ids {
            entries.insert(
                id.clone(),
                Entry::Write {
                    owner: owner.to_string(),
                    tree,
                },
            );
        }
        drop(entries);
        self.notify(ids.to_vec(), owner, true);
        true
    }

    /// Retries [`Self::try_read_lock`] with the configured policy.
    pub async fn read_lock(&self, ids: &[String], owner: &str) -> Result<()> {
        self.retrying(move || self.try_read_lock(ids, owner)).await
    }

    /// Retries [`Self::try_write_lock`] with the configured policy.
    pub async fn write_lock(&self, ids: &[String], owner: &str, tree: bool) -> Result<()> {
        self.retrying(move || self.try_write_lock(ids, owner, tree))
            .await
    }

    async fn retrying<F, Fut>(&self, mut attempt: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        for i in 0..self.retries {
            if attempt().await {
                return Ok(());
            }
            if i + 1 < self.retries {
                tokio::time::sleep(self.retry_wait).await;
            }
        }
        Err(HubError::cannot_lock())
    }

    pub async fn read_unlock(&self, ids: &[String], owner: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        for id in ids {
            match entries.get_mut(id) {
                Some(Entry::Read(owners)) if owners.iter().any(|o| o == owner) => {
                    if let Some(pos) = owners.iter().position(|o| o == owner) {
                        owners.remove(pos);
                    }
                    if owners.is_empty() {
                        entries.remove(id);
                    }
                }
                _ => return Err(HubError::cannot_unlock()),
            }
        }
        drop(entries);
        self.notify(ids.to_vec(), owner, false);
        Ok(())
    }

    pub async fn write_unlock(&self, ids: &[String], owner: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        for id in ids {
            match entries.get(id) {
                Some(Entry::Write { owner: held, .. }) if held == owner => {
                    entries.remove(id);
                }
                _ => return Err(HubError::cannot_unlock()),
            }
        }
        drop(entries);
        self.notify(ids.to_vec(), owner, false);
        Ok(())
    }

    pub async fn is_write_locked(&self, id: &str, owner: &str) -> bool {
        matches!(
            self.entries.lock().await.get(id),
            Some(Entry::Write { owner: held, .. }) if held == owner
        )
    }

    /// Number of write locks held by anybody but the hub itself. Used to
    /// refuse scene start while UIs hold edit locks.
    pub async fn user_write_locks(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| matches!(e, Entry::Write { owner, .. } if owner != SERVER_OWNER))
            .count()
    }

    /// Releases everything `owner` holds (both kinds); used on disconnect.
    /// Returns the released ids.
    pub async fn release_all(&self, owner: &str) -> Vec<String> {
        let mut entries = self.entries.lock().await;
        let mut released = Vec::new();
        entries.retain(|id, entry| match entry {
            Entry::Write { owner: held, .. } => {
                if held == owner {
                    released.push(id.clone());
                    false
                } else {
                    true
                }
            }
            Entry::Read(owners) => {
                if owners.iter().any(|o| o == owner) {
                    owners.retain(|o| o != owner);
                    released.push(id.clone());
                }
                !owners.is_empty()
            }
        });
        drop(entries);
        self.notify(released.clone(), owner, false);
        released
    }

    /// Runs `f` with `ids` write-locked. On success the locks are kept unless
    /// `auto_unlock`; on error (or `dry_run`) they are always released.
    pub async fn with_write_lock<T, F, Fut>(
        &self,
        ids: &[String],
        owner: &str,
        auto_unlock: bool,
        dry_run: bool,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.write_lock(ids, owner, false).await?;
        let out = f().await;
        if dry_run || auto_unlock || out.is_err() {
            let _ = self.write_unlock(ids, owner).await;
        }
        out
    }

    /// Read-lock variant of [`Self::with_write_lock`].
    pub async fn with_read_lock<T, F, Fut>(
        &self,
        ids: &[String],
        owner: &str,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.read_lock(ids, owner).await?;
        let out = f().await;
        let _ = self.read_unlock(ids, owner).await;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn fast() -> (LockManager, mpsc::UnboundedReceiver<LockNotification>) {
        LockManager::with_retry_policy(2, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn write_lock_conflicts_with_other_owner() {
        let (lock, _rx) = fast();
        assert!(lock.try_write_lock(&ids(&["o1"]), "alice", false).await);
        assert!(!lock.try_write_lock(&ids(&["o1"]), "bob", false).await);
        assert!(lock.try_write_lock(&ids(&["o1"]), "alice", false).await);
    }

    #[tokio::test]
    async fn readers_share_but_block_writer() {
        let (lock, _rx) = fast();
        assert!(lock.try_read_lock(&ids(&["o1"]), "alice").await);
        assert!(lock.try_read_lock(&ids(&["o1"]), "bob").await);
        assert!(!lock.try_write_lock(&ids(&["o1"]), "carol", false).await);
        lock.read_unlock(&ids(&["o1"]), "alice").await.unwrap();
        assert!(!lock.try_write_lock(&ids(&["o1"]), "carol", false).await);
        lock.read_unlock(&ids(&["o1"]), "bob").await.unwrap();
        assert!(lock.try_write_lock(&ids(&["o1"]), "carol", false).await);
    }

    #[tokio::test]
    async fn atomic_acquire_leaves_nothing_on_conflict() {
        let (lock, _rx) = fast();
        assert!(lock.try_write_lock(&ids(&["o2"]), "bob", false).await);
        assert!(!lock.try_write_lock(&ids(&["o1", "o2"]), "alice", false).await);
        // o1 must not have been acquired by the failed attempt
        assert!(lock.try_write_lock(&ids(&["o1"]), "carol", false).await);
    }

    #[tokio::test]
    async fn retries_exhausted_is_cannot_lock() {
        let (lock, _rx) = fast();
        assert!(lock.try_write_lock(&ids(&["o1"]), "bob", false).await);
        let err = lock.write_lock(&ids(&["o1"]), "alice", false).await;
        assert!(matches!(err, Err(HubError::Locking(_))));
    }

    #[tokio::test]
    async fn unlock_of_unheld_is_error() {
        let (lock, _rx) = fast();
        assert!(matches!(
            lock.write_unlock(&ids(&["o1"]), "alice").await,
            Err(HubError::Locking(_))
        ));
    }

    #[tokio::test]
    async fn release_all_frees_both_kinds() {
        let (lock, _rx) = fast();
        lock.try_write_lock(&ids(&["w1"]), "alice", false).await;
        lock.try_read_lock(&ids(&["r1"]), "alice").await;
        lock.try_read_lock(&ids(&["r1"]), "bob").await;
        let mut released = lock.release_all("alice").await;
        released.sort();
        assert_eq!(released, ids(&["r1", "w1"]));
        // bob still reads r1
        assert!(!lock.try_write_lock(&ids(&["r1"]), "carol", false).await);
        assert!(lock.try_write_lock(&ids(&["w1"]), "carol", false).await);
    }

    #[tokio::test]
    async fn user_write_locks_ignores_server() {
        let (lock, _rx) = fast();
        lock.try_write_lock(&ids(&[SCENE_LOCK_ID]), SERVER_OWNER, false)
            .await;
        lock.try_write_lock(&ids(&["o1"]), "alice", false).await;
        assert_eq!(lock.user_write_locks().await, 1);
    }

    #[tokio::test]
    async fn notifications_carry_ids_and_owner() {
        let (lock, mut rx) = fast();
        lock.try_write_lock(&ids(&["o1", "o2"]), "alice", true).await;
        let n = rx.recv().await.unwrap();
        assert!(n.locked);
        assert_eq!(n.owner, "alice");
        assert_eq!(n.object_ids, ids(&["o1", "o2"]));
        lock.write_unlock(&ids(&["o1", "o2"]), "alice").await.unwrap();
        let n = rx.recv().await.unwrap();
        assert!(!n.locked);
    }

    #[tokio::test]
    async fn scoped_write_lock_releases_on_error_and_dry_run() {
        let (lock, _rx) = fast();
        let r: Result<()> = lock
            .with_write_lock(&ids(&["o1"]), "alice", false, false, || async {
                Err(HubError::validation("boom"))
            })
            .await;
        assert!(r.is_err());
        assert!(lock.try_write_lock(&ids(&["o1"]), "bob", false).await);
        lock.write_unlock(&ids(&["o1"]), "bob").await.unwrap();

        let r: Result<()> = lock
            .with_write_lock(&ids(&["o1"]), "alice", false, true, || async { Ok(()) })
            .await;
        assert!(r.is_ok());
        assert!(lock.try_write_lock(&ids(&["o1"]), "bob", false).await);
    }

    #[tokio::test]
    async fn scoped_write_lock_keeps_lock_without_auto_unlock() {
        let (lock, _rx) = fast();
        let r: Result<()> = lock
            .with_write_lock(&ids(&["o1"]), "alice", false, false, || async { Ok(()) })
            .await;
        assert!(r.is_ok());
        assert!(lock.is_write_locked("o1", "alice").await);
    }
}
