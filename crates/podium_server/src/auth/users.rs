//! Accounts and credential validation

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use podium_core::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// May read, append and write any resource.
pub const ROLE_WRITER: &str = "writer";
/// May additionally change access control resources.
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// Account record
#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Name confirmed by an identity verification, if any.
    pub display_name: Option<String>,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Account store (in-memory)
pub struct UserStore {
    users: RwLock<HashMap<String, User>>,
}

fn poisoned<E: std::fmt::Display>(err: E) -> Error {
    Error::Internal(format!("user store lock poisoned: {}", err))
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new account with a hashed password
    pub fn create_user(&self, username: &str, password: &str, roles: Vec<String>) -> Result<User> {
        let password_hash = hash_password(password)?;
        self.insert(username, Some(password_hash), None, roles)
    }

    fn insert(
        &self,
        username: &str,
        password_hash: Option<String>,
        display_name: Option<String>,
        roles: Vec<String>,
    ) -> Result<User> {
        let mut users = self.users.write().map_err(poisoned)?;

        if users.values().any(|u| u.username == username) {
            return Err(Error::Conflict(format!("username {} already exists", username)));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            display_name,
            password_hash,
            roles,
            created_at: Utc::now(),
            active: true,
        };

        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    /// Returns the account of a verified identity, registering it on first use.
    ///
    /// Such accounts have no password; they can only sign in through another
    /// verification.
    pub fn register_verified(&self, subject: &str, name: &str) -> Result<User> {
        if let Some(mut user) = self.get_user_by_username(subject) {
            if user.display_name.as_deref() != Some(name) {
                let mut users = self.users.write().map_err(poisoned)?;
                if let Some(stored) = users.get_mut(&user.id) {
                    stored.display_name = Some(name.to_string());
                }
                user.display_name = Some(name.to_string());
            }
            return Ok(user);
        }
        self.insert(
            subject,
            None,
            Some(name.to_string()),
            vec![ROLE_USER.to_string(), ROLE_WRITER.to_string()],
        )
    }

    /// Validate credentials and return the account if valid
    pub fn validate_credentials(&self, username: &str, password: &str) -> Result<User> {
        let users = self.users.read().map_err(poisoned)?;
        let invalid = || Error::Unauthorized("invalid credentials".to_string());

        let user = users
            .values()
            .find(|u| u.username == username && u.active)
            .ok_or_else(invalid)?;
        let hash = user.password_hash.as_deref().ok_or_else(invalid)?;

        if verify_password(password, hash)? {
            Ok(user.clone())
        } else {
            Err(invalid())
        }
    }

    /// Get account by ID
    pub fn get_user(&self, id: &str) -> Option<User> {
        self.users.read().ok()?.get(id).cloned()
    }

    /// Get account by username
    pub fn get_user_by_username(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .ok()?
            .values()
            .find(|u| u.username == username)
            .cloned()
    }

    pub fn deactivate_user(&self, id: &str) -> Result<()> {
        let mut users = self.users.write().map_err(poisoned)?;
        match users.get_mut(id) {
            Some(user) => {
                user.active = false;
                Ok(())
            }
            None => Err(Error::NotFound(format!("user {}", id))),
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Initialize the `admin` account
    pub fn init_admin(&self, password: &str) -> Result<User> {
        self.create_user(
            "admin",
            password,
            vec![ROLE_ADMIN.into(), ROLE_WRITER.into(), ROLE_USER.into()],
        )
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a password using argon2
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("failed to hash password: {}", e)))
}

/// Verify a password against a hash
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| Error::Internal(format!("corrupt password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_creation_and_validation() {
        let store = UserStore::new();

        let user = store
            .create_user("testuser", "password123", vec![ROLE_USER.into()])
            .unwrap();
        assert_eq!(user.username, "testuser");

        let validated = store
            .validate_credentials("testuser", "password123")
            .unwrap();
        assert_eq!(validated.id, user.id);

        let invalid = store.validate_credentials("testuser", "wrongpassword");
        assert!(matches!(invalid, Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_duplicate_username() {
        let store = UserStore::new();
        store
            .create_user("testuser", "password123", vec![])
            .unwrap();

        let duplicate = store.create_user("testuser", "password456", vec![]);
        assert!(matches!(duplicate, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_password_hashing() {
        let hash1 = hash_password("password123").unwrap();
        let hash2 = hash_password("password123").unwrap();

        // Same password should produce different hashes (due to random salt)
        assert_ne!(hash1, hash2);
        assert!(verify_password("password123", &hash1).unwrap());
        assert!(verify_password("password123", &hash2).unwrap());
    }

    #[test]
    fn test_user_deactivation() {
        let store = UserStore::new();
        let user = store
            .create_user("testuser", "password123", vec![])
            .unwrap();

        store.deactivate_user(&user.id).unwrap();
        assert!(store.validate_credentials("testuser", "password123").is_err());
        assert!(store.deactivate_user("missing").is_err());
    }

    #[test]
    fn test_register_verified_is_idempotent() {
        let store = UserStore::new();
        let first = store.register_verified("199001011234", "Ada Lovelace").unwrap();
        let second = store.register_verified("199001011234", "Ada King").unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.display_name.as_deref(), Some("Ada King"));
        assert!(second.has_role(ROLE_WRITER));
        assert_eq!(store.len(), 1);

        // verified accounts cannot sign in with a password
        assert!(store.validate_credentials("199001011234", "").is_err());
    }
}
