//! Login interactions.
//!
//! An interaction tracks one agent's way through the account pages, from the
//! moment a client sends it there until it returns to `return_to`.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use podium_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name of the cookie carrying the interaction id.
pub const INTERACTION_COOKIE: &str = "_interaction";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionParams {
    /// Set once the agent was offered to continue with another account.
    pub has_been_asked_to_switch_accounts: bool,
}

/// The outcome of a finished login step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResult {
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    /// Where the agent goes once the interaction ends.
    pub return_to: String,
    pub expires_at: DateTime<Utc>,
    pub params: InteractionParams,
    pub result: Option<LoginResult>,
}

impl Interaction {
    /// Time left before the interaction expires.
    pub fn remaining_ttl(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Interactions in memory, dropped on expiry.
pub struct InteractionStore {
    entries: DashMap<String, Interaction>,
    ttl: Duration,
}

impl InteractionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Starts an interaction returning to `return_to`.
    pub fn create(&self, return_to: impl Into<String>) -> Result<Interaction> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| Error::Internal(format!("invalid interaction ttl: {}", e)))?;
        let interaction = Interaction {
            id: uuid::Uuid::new_v4().simple().to_string(),
            return_to: return_to.into(),
            expires_at: Utc::now() + ttl,
            params: InteractionParams::default(),
            result: None,
        };
        self.entries
            .insert(interaction.id.clone(), interaction.clone());
        Ok(interaction)
    }

    /// Returns the interaction `id` unless it is unknown or expired.
    pub fn find(&self, id: &str) -> Option<Interaction> {
        let interaction = self.entries.get(id)?.clone();
        if interaction.expires_at <= Utc::now() {
            self.entries.remove(id);
            return None;
        }
        Some(interaction)
    }

    /// Stores `interaction` so that it expires `ttl` from now.
    pub fn save(&self, mut interaction: Interaction, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| Error::Internal(format!("invalid interaction ttl: {}", e)))?;
        interaction.expires_at = Utc::now() + ttl;
        self.entries.insert(interaction.id.clone(), interaction);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Option<Interaction> {
        self.entries.remove(id).map(|(_, interaction)| interaction)
    }

    /// Drops expired interactions.
    pub fn prune(&self) {
        let now = Utc::now();
        self.entries.retain(|_, interaction| interaction.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_find() {
        let store = InteractionStore::new(Duration::from_secs(60));
        let interaction = store.create("https://app.example/cb").unwrap();
        let found = store.find(&interaction.id).unwrap();
        assert_eq!(found.return_to, "https://app.example/cb");
        assert!(!found.params.has_been_asked_to_switch_accounts);
        assert!(found.remaining_ttl() <= Duration::from_secs(60));
        assert!(store.find("unknown").is_none());
    }

    #[test]
    fn test_expired_interactions_vanish() {
        let store = InteractionStore::new(Duration::from_secs(60));
        let interaction = store.create("https://app.example/cb").unwrap();
        store.save(interaction.clone(), Duration::ZERO).unwrap();

        assert!(store.find(&interaction.id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_prune() {
        let store = InteractionStore::new(Duration::from_secs(60));
        let stale = store.create("a").unwrap();
        store.create("b").unwrap();
        store.save(stale, Duration::ZERO).unwrap();

        store.prune();
        assert_eq!(store.len(), 1);
    }
}
