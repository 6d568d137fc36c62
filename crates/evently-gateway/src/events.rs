//! Event records owned by organizers.

use chrono::{DateTime, Utc};
use evently_core::validation::{check_length, limits::MAX_TEXT_LENGTH, require_field};
use evently_core::{EventId, UserId};
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;

/// An event listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event ID.
    pub id: EventId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Date, as entered by the organizer.
    pub date: Option<String>,
    /// Time, as entered by the organizer.
    pub time: String,
    /// Organizer display name.
    pub organizer: String,
    /// Identity that created the event.
    pub owner_id: UserId,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last modified.
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating an event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEvent {
    /// Display name (required).
    #[serde(default)]
    pub name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Date.
    #[serde(default)]
    pub date: Option<String>,
    /// Time (required).
    #[serde(default)]
    pub time: Option<String>,
    /// Organizer display name (required).
    #[serde(default)]
    pub organizer: Option<String>,
}

/// Partial update. Absent or empty fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventUpdate {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Date.
    #[serde(default)]
    pub date: Option<String>,
    /// Time.
    #[serde(default)]
    pub time: Option<String>,
    /// Organizer display name.
    #[serde(default)]
    pub organizer: Option<String>,
}

fn optional_text(field: &str, value: Option<&str>) -> Result<Option<String>, AuthError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => {
            check_length(field, v, MAX_TEXT_LENGTH)?;
            Ok(Some(v.to_string()))
        }
        None => Ok(None),
    }
}

fn required_text(field: &str, value: Option<&str>) -> Result<String, AuthError> {
    let v = require_field(field, value)?;
    check_length(field, v, MAX_TEXT_LENGTH)?;
    Ok(v.to_string())
}

impl Event {
    /// Build a new event owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if name, time or organizer is missing.
    pub fn new(input: &NewEvent, owner_id: UserId) -> Result<Self, AuthError> {
        let now = Utc::now();
        Ok(Self {
            id: EventId::generate(),
            name: required_text("name", input.name.as_deref())?,
            description: optional_text("description", input.description.as_deref())?,
            date: optional_text("date", input.date.as_deref())?,
            time: required_text("time", input.time.as_deref())?,
            organizer: required_text("organizer", input.organizer.as_deref())?,
            owner_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a field is too long.
    pub fn apply(&mut self, update: &EventUpdate) -> Result<(), AuthError> {
        if let Some(name) = optional_text("name", update.name.as_deref())? {
            self.name = name;
        }
        if let Some(description) = optional_text("description", update.description.as_deref())? {
            self.description = Some(description);
        }
        if let Some(date) = optional_text("date", update.date.as_deref())? {
            self.date = Some(date);
        }
        if let Some(time) = optional_text("time", update.time.as_deref())? {
            self.time = time;
        }
        if let Some(organizer) = optional_text("organizer", update.organizer.as_deref())? {
            self.organizer = organizer;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Event store backed by a sled tree.
pub struct EventStore {
    tree: sled::Tree,
}

impl EventStore {
    /// Open the event tree in an existing database.
    ///
    /// # Errors
    ///
    /// Returns error if the tree cannot be opened.
    pub fn with_db(db: &sled::Db) -> Result<Self, AuthError> {
        let tree = db
            .open_tree("events")
            .map_err(|e| AuthError::Storage(format!("Failed to open events tree: {e}")))?;
        Ok(Self { tree })
    }

    /// Persist a new event.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn create(&self, event: &Event) -> Result<(), AuthError> {
        self.put(event)?;
        tracing::info!(event_id = %event.id, owner = %event.owner_id, "Created event");
        Ok(())
    }

    /// Get an event by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get(&self, id: &EventId) -> Result<Option<Event>, AuthError> {
        let Some(value) = self
            .tree
            .get(id.as_ref().as_bytes())
            .map_err(|e| AuthError::Storage(format!("Get error: {e}")))?
        else {
            return Ok(None);
        };

        serde_json::from_slice(&value)
            .map(Some)
            .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))
    }

    /// Overwrite an existing event.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn update(&self, event: &Event) -> Result<(), AuthError> {
        self.put(event)
    }

    /// Delete an event. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete(&self, id: &EventId) -> Result<bool, AuthError> {
        let removed = self
            .tree
            .remove(id.as_ref().as_bytes())
            .map_err(|e| AuthError::Storage(format!("Delete error: {e}")))?
            .is_some();
        self.flush()?;
        Ok(removed)
    }

    /// All events, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list(&self) -> Result<Vec<Event>, AuthError> {
        let mut events = Vec::new();
        for result in self.tree.iter() {
            let (_, value) = result.map_err(|e| AuthError::Storage(format!("Iter error: {e}")))?;
            let event: Event = serde_json::from_slice(&value)
                .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))?;
            events.push(event);
        }
        events.sort_by_key(|e| e.created_at);
        Ok(events)
    }

    /// Events created by one identity.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list_by_owner(&self, owner_id: &UserId) -> Result<Vec<Event>, AuthError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|e| &e.owner_id == owner_id)
            .collect())
    }

    fn put(&self, event: &Event) -> Result<(), AuthError> {
        let value = serde_json::to_vec(event)
            .map_err(|e| AuthError::Storage(format!("Serialization error: {e}")))?;
        self.tree
            .insert(event.id.as_ref().as_bytes(), value)
            .map_err(|e| AuthError::Storage(format!("Insert error: {e}")))?;
        self.flush()
    }

    fn flush(&self) -> Result<(), AuthError> {
        self.tree
            .flush()
            .map_err(|e| AuthError::Storage(format!("Flush error: {e}")))?;
        Ok(())
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("count", &self.tree.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evently_core::ValidationError;
    use tempfile::TempDir;

    fn new_event(name: &str) -> NewEvent {
        NewEvent {
            name: Some(name.to_string()),
            description: Some("A meetup".to_string()),
            date: Some("2026-11-01".to_string()),
            time: Some("18:00".to_string()),
            organizer: Some("Rust Club".to_string()),
        }
    }

    fn store(dir: &TempDir) -> EventStore {
        let db = sled::open(dir.path().join("evently.db")).unwrap();
        EventStore::with_db(&db).unwrap()
    }

    #[test]
    fn test_required_fields() {
        let mut input = new_event("Meetup");
        input.time = Some("  ".to_string());
        assert!(matches!(
            Event::new(&input, UserId::generate()),
            Err(AuthError::Validation(ValidationError::MissingField(f))) if f == "time"
        ));

        let input = NewEvent {
            name: Some("Meetup".to_string()),
            time: Some("18:00".to_string()),
            organizer: Some("Rust Club".to_string()),
            ..NewEvent::default()
        };
        let event = Event::new(&input, UserId::generate()).unwrap();
        assert!(event.description.is_none());
    }

    #[test]
    fn test_partial_update_ignores_empty() {
        let mut event = Event::new(&new_event("Meetup"), UserId::generate()).unwrap();
        event
            .apply(&EventUpdate {
                name: Some("Renamed".to_string()),
                time: Some(String::new()),
                ..EventUpdate::default()
            })
            .unwrap();
        assert_eq!(event.name, "Renamed");
        assert_eq!(event.time, "18:00");
        assert_eq!(event.organizer, "Rust Club");
    }

    #[test]
    fn test_store_crud() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let owner = UserId::generate();

        let mut event = Event::new(&new_event("Meetup"), owner.clone()).unwrap();
        store.create(&event).unwrap();
        assert_eq!(store.get(&event.id).unwrap().unwrap(), event);

        event.name = "Changed".to_string();
        store.update(&event).unwrap();
        assert_eq!(store.get(&event.id).unwrap().unwrap().name, "Changed");

        assert!(store.delete(&event.id).unwrap());
        assert!(store.get(&event.id).unwrap().is_none());
        assert!(!store.delete(&event.id).unwrap());
    }

    #[test]
    fn test_list_by_owner() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let alice = UserId::generate();
        let bob = UserId::generate();

        store
            .create(&Event::new(&new_event("One"), alice.clone()).unwrap())
            .unwrap();
        store
            .create(&Event::new(&new_event("Two"), bob.clone()).unwrap())
            .unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
        let mine = store.list_by_owner(&alice).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "One");
        assert!(store.list_by_owner(&UserId::generate()).unwrap().is_empty());
    }
}
