//! User/session manager: maps client channels to user names.
//!
//! Names must be unique among live sessions. Before rejecting a duplicate
//! login the registry probes the old channel with a liveness ping and, on
//! failure, evicts the stale entry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use uuid::Uuid;

use crate::error::{HubError, Result};
use crate::notifications::ClientRegistry;

/// How long the old channel gets to prove it is alive.
pub const LOGIN_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Default)]
pub struct Users {
    inner: Mutex<Maps>,
}

#[derive(Default)]
struct Maps {
    by_name: HashMap<String, Uuid>,
    by_client: HashMap<Uuid, String>,
}

impl Users {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `user_name` with `client`. A duplicate name is accepted only
    /// when the previous holder fails the liveness probe.
    pub async fn login(
        &self,
        user_name: &str,
        client: Uuid,
        registry: &ClientRegistry,
    ) -> Result<()> {
        if user_name.is_empty() {
            return Err(HubError::validation("Empty user name."));
        }
        if user_name == crate::lock::SERVER_OWNER {
            return Err(HubError::validation("Reserved user name."));
        }

        let old = {
            let maps = self.inner.lock().expect("users mutex");
            maps.by_name.get(user_name).copied()
        };

        if let Some(old_client) = old {
            if old_client != client {
                if self.probe(old_client, registry).await {
                    return Err(HubError::validation("Username already exists"));
                }
                self.logout(old_client);
            }
        }

        let mut maps = self.inner.lock().expect("users mutex");
        if let Some(previous) = maps.by_client.insert(client, user_name.to_string()) {
            maps.by_name.remove(&previous);
        }
        maps.by_name.insert(user_name.to_string(), client);
        Ok(())
    }

    /// Pings the old channel; a channel that cannot even accept the ping
    /// within the probe timeout is considered dead.
    async fn probe(&self, client: Uuid, registry: &ClientRegistry) -> bool {
        if !registry.contains(client) {
            return false;
        }
        tokio::time::timeout(LOGIN_PROBE_TIMEOUT, async { registry.ping(client) })
            .await
            .unwrap_or(false)
    }

    /// Forgets the client; returns the user name it held, if any.
    pub fn logout(&self, client: Uuid) -> Option<String> {
        let mut maps = self.inner.lock().expect("users mutex");
        let name = maps.by_client.remove(&client)?;
        maps.by_name.remove(&name);
        Some(name)
    }

    /// Name registered for the channel; every lock-taking RPC requires it.
    pub fn user_name(&self, client: Uuid) -> Result<String> {
        self.inner
            .lock()
            .expect("users mutex")
            .by_client
            .get(&client)
            .cloned()
            .ok_or_else(|| HubError::precondition("User not logged in."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn login_and_lookup() {
        let users = Users::new();
        let reg = ClientRegistry::new();
        let c = Uuid::new_v4();
        let _rx = reg.add(c);
        users.login("alice", c, &reg).await.unwrap();
        assert_eq!(users.user_name(c).unwrap(), "alice");
    }

    #[tokio::test]
    async fn empty_and_reserved_names_rejected() {
        let users = Users::new();
        let reg = ClientRegistry::new();
        let c = Uuid::new_v4();
        let _rx = reg.add(c);
        assert!(users.login("", c, &reg).await.is_err());
        assert!(users.login("server", c, &reg).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_name_with_live_holder_rejected() {
        let users = Users::new();
        let reg = ClientRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let _rx_a = reg.add(a);
        let _rx_b = reg.add(b);
        users.login("alice", a, &reg).await.unwrap();
        assert!(users.login("alice", b, &reg).await.is_err());
    }

    #[tokio::test]
    async fn stale_holder_is_evicted() {
        let users = Users::new();
        let reg = ClientRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let rx_a = reg.add(a);
        let _rx_b = reg.add(b);
        users.login("alice", a, &reg).await.unwrap();
        drop(rx_a); // a's channel is dead, ping will fail
        users.login("alice", b, &reg).await.unwrap();
        assert_eq!(users.user_name(b).unwrap(), "alice");
        assert!(users.user_name(a).is_err());
    }

    #[tokio::test]
    async fn logout_frees_the_name() {
        let users = Users::new();
        let reg = ClientRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let _rx_a = reg.add(a);
        let _rx_b = reg.add(b);
        users.login("alice", a, &reg).await.unwrap();
        assert_eq!(users.logout(a).as_deref(), Some("alice"));
        users.login("alice", b, &reg).await.unwrap();
    }
}
