//! Identity model and storage.

use std::path::Path;

use chrono::{DateTime, Utc};
use evently_core::{UserId, ValidationError};
use serde::{Deserialize, Serialize};

use super::AuthError;
use super::password::hash_password;

/// Role for access control.
///
/// On the wire roles keep their numeric codes: `"0"` owner, `"1"` organizer,
/// `"2"` standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Platform owner.
    #[serde(rename = "0")]
    Owner,
    /// Creates and manages their own events.
    #[serde(rename = "1")]
    Organizer,
    /// Regular attendee account.
    #[serde(rename = "2")]
    Standard,
}

impl Role {
    /// All roles, in code order.
    pub const ALL: [Self; 3] = [Self::Owner, Self::Organizer, Self::Standard];

    /// Numeric wire code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Owner => "0",
            Self::Organizer => "1",
            Self::Standard => "2",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::Organizer => write!(f, "organizer"),
            Self::Standard => write!(f, "standard"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "0" | "owner" => Ok(Self::Owner),
            "1" | "organizer" => Ok(Self::Organizer),
            "2" | "standard" => Ok(Self::Standard),
            _ => Err(ValidationError::InvalidRole(s.to_string())),
        }
    }
}

/// Identity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identity ID.
    pub id: UserId,
    /// Normalized (lowercase) email, unique.
    pub email: String,
    /// Ten-digit phone number.
    pub phone_number: String,
    /// Argon2 password hash. Never exposed through `PublicUser`.
    password_hash: String,
    /// Role.
    pub role: Role,
    /// The single live refresh token, if any.
    refresh_token: Option<String>,
    /// When the identity was created.
    pub created_at: DateTime<Utc>,
    /// When the identity was last modified.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new identity. Inputs are expected to be validated already.
    ///
    /// Hashes the password, so this blocks for the duration of one Argon2 run.
    ///
    /// # Errors
    ///
    /// Returns error if password hashing fails.
    pub fn new(
        email: impl Into<String>,
        password: &str,
        phone_number: impl Into<String>,
        role: Role,
    ) -> Result<Self, AuthError> {
        let password_hash = hash_password(password)?;
        Ok(Self::with_hash(email, password_hash, phone_number, role))
    }

    /// Create a new identity from an already computed password hash.
    #[must_use]
    pub fn with_hash(
        email: impl Into<String>,
        password_hash: String,
        phone_number: impl Into<String>,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::generate(),
            email: email.into(),
            phone_number: phone_number.into(),
            password_hash,
            role,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The stored password hash.
    #[must_use]
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// The stored refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Verify a password against this identity's hash.
    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        super::password::verify_password(password, &self.password_hash)
    }

    /// Replace the password. The only mutation that rehashes.
    ///
    /// # Errors
    ///
    /// Returns error if password hashing fails.
    pub fn set_password(&mut self, password: &str) -> Result<(), AuthError> {
        self.password_hash = hash_password(password)?;
        self.touch();
        Ok(())
    }

    /// Change the role.
    pub fn set_role(&mut self, role: Role) {
        self.role = role;
        self.touch();
    }

    /// Change the phone number.
    pub fn set_phone_number(&mut self, phone_number: impl Into<String>) {
        self.phone_number = phone_number.into();
        self.touch();
    }

    /// Record (or clear) the live refresh token, replacing any previous one.
    pub fn set_refresh_token(&mut self, token: Option<String>) {
        self.refresh_token = token;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Create a safe version of the identity for responses and request context.
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Sanitized identity: no password hash, no refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    /// Unique identity ID.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// Phone number.
    pub phone_number: String,
    /// Role.
    pub role: Role,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last modified.
    pub updated_at: DateTime<Utc>,
}

/// Identity store backed by sled.
///
/// Records are keyed by ID; an `idx:email:` entry maps each email to its ID
/// and is claimed atomically to enforce uniqueness.
pub struct UserStore {
    db: sled::Db,
    tree: sled::Tree,
}

const EMAIL_INDEX_PREFIX: &str = "idx:email:";

fn email_index_key(email: &str) -> String {
    format!("{EMAIL_INDEX_PREFIX}{}", email.trim().to_lowercase())
}

impl UserStore {
    /// Open or create a user store at the given path.
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, AuthError> {
        let db = sled::open(path.join("evently.db"))
            .map_err(|e| AuthError::Storage(format!("Failed to open database: {e}")))?;

        Self::with_db(db)
    }

    /// Create a new user store with an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if tree cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, AuthError> {
        let tree = db
            .open_tree("users")
            .map_err(|e| AuthError::Storage(format!("Failed to open users tree: {e}")))?;

        Ok(Self { db, tree })
    }

    /// Get the underlying sled database.
    #[must_use]
    pub const fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Check if any identities exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Count identities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.tree
            .iter()
            .filter(|r| {
                r.as_ref()
                    .map(|(k, _)| !k.starts_with(b"idx:"))
                    .unwrap_or(false)
            })
            .count()
    }

    /// Persist a new identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailTaken` if the email is already registered,
    /// or a storage error.
    pub fn create(&self, user: &User) -> Result<(), AuthError> {
        let index_key = email_index_key(&user.email);

        // Claim the email atomically; concurrent registrations race here
        let claimed = self
            .tree
            .compare_and_swap(
                index_key.as_bytes(),
                None as Option<&[u8]>,
                Some(user.id.as_ref().as_bytes()),
            )
            .map_err(|e| AuthError::Storage(format!("Index error: {e}")))?;

        if claimed.is_err() {
            return Err(AuthError::EmailTaken);
        }

        if let Err(e) = self.put(user) {
            // Release the claim so the email is not locked out
            let _ = self.tree.remove(index_key.as_bytes());
            return Err(e);
        }

        self.flush()
    }

    /// Get an identity by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get(&self, id: &UserId) -> Result<Option<User>, AuthError> {
        match self.tree.get(id.as_ref().as_bytes()) {
            Ok(Some(value)) => {
                let user: User = serde_json::from_slice(&value)
                    .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))?;
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("Get error: {e}"))),
        }
    }

    /// Get the sanitized projection of an identity by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_public(&self, id: &UserId) -> Result<Option<PublicUser>, AuthError> {
        Ok(self.get(id)?.map(|u| u.to_public()))
    }

    /// Get an identity by email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        match self.tree.get(email_index_key(email).as_bytes()) {
            Ok(Some(id_bytes)) => {
                let id = String::from_utf8_lossy(&id_bytes);
                self.get(&UserId::new(id))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("Index lookup error: {e}"))),
        }
    }

    /// Update an existing identity. Email changes are not supported here.
    ///
    /// # Errors
    ///
    /// Returns error if the identity doesn't exist or storage fails.
    pub fn update(&self, user: &User) -> Result<(), AuthError> {
        if self.get(&user.id)?.is_none() {
            return Err(AuthError::NotFound("User".to_string()));
        }

        self.put(user)?;
        self.flush()
    }

    /// Replace the stored refresh token. Last writer wins.
    ///
    /// # Errors
    ///
    /// Returns error if the identity doesn't exist or storage fails.
    pub fn set_refresh_token(&self, id: &UserId, token: Option<String>) -> Result<(), AuthError> {
        let mut user = self
            .get(id)?
            .ok_or_else(|| AuthError::NotFound("User".to_string()))?;

        user.set_refresh_token(token);
        self.put(&user)?;
        self.flush()
    }

    /// Delete an identity.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete(&self, id: &UserId) -> Result<bool, AuthError> {
        if let Some(user) = self.get(id)? {
            self.tree
                .remove(email_index_key(&user.email).as_bytes())
                .map_err(|e| AuthError::Storage(format!("Index remove error: {e}")))?;
        }

        let removed = self
            .tree
            .remove(id.as_ref().as_bytes())
            .map_err(|e| AuthError::Storage(format!("Delete error: {e}")))?
            .is_some();

        self.flush()?;
        Ok(removed)
    }

    /// List all identities.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list(&self) -> Result<Vec<User>, AuthError> {
        let mut users = Vec::new();

        for result in self.tree.iter() {
            let (key, value) = result.map_err(|e| AuthError::Storage(format!("Iter error: {e}")))?;

            if key.starts_with(b"idx:") {
                continue;
            }

            let user: User = serde_json::from_slice(&value)
                .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))?;
            users.push(user);
        }

        Ok(users)
    }

    fn put(&self, user: &User) -> Result<(), AuthError> {
        let value = serde_json::to_vec(user)
            .map_err(|e| AuthError::Storage(format!("Serialization error: {e}")))?;

        self.tree
            .insert(user.id.as_ref().as_bytes(), value)
            .map_err(|e| AuthError::Storage(format!("Insert error: {e}")))?;

        Ok(())
    }

    fn flush(&self) -> Result<(), AuthError> {
        self.tree
            .flush()
            .map_err(|e| AuthError::Storage(format!("Flush error: {e}")))?;
        Ok(())
    }
}
