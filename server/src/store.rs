//! Persistence boundary for the NoteHub server.
//!
//! Handlers only see the [`NoteStore`] trait: opaque async operations that
//! either succeed with a value or fail with a [`StoreError`]. Transport
//! faults from a backend surface through the same error taxonomy as every
//! other failure (`StoreError::Unavailable` becomes `AsyncError` at the
//! dispatcher), so a failed suspended store call is observable exactly
//! like a synchronous raise.
//!
//! The shipped backend is [`MemoryStore`], an in-process map. Document
//! store internals are not this crate's concern; anything that implements
//! the trait plugs in.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;
use tracing::trace;
use uuid::Uuid;

use crate::types::{Note, UserRecord};

/// Failures a store operation can produce.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An entity with the same unique key already exists.
    #[error("duplicate key: {key}")]
    Duplicate {
        /// The conflicting unique key.
        key: String,
    },

    /// The addressed entity does not exist.
    #[error("entity not found")]
    NotFound,

    /// The backend could not be reached or failed mid-operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Async persistence operations the handlers depend on.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Looks up a user by sign-in email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Persists a new user.
    ///
    /// # Errors
    ///
    /// [`StoreError::Duplicate`] if the email is already taken. The check
    /// and the insert are one atomic step.
    async fn create_user(&self, record: UserRecord) -> Result<(), StoreError>;

    /// Persists a new note.
    async fn create_note(&self, note: Note) -> Result<(), StoreError>;

    /// Looks up a note by id.
    async fn find_note(&self, id: Uuid) -> Result<Option<Note>, StoreError>;

    /// Assigns a grade to an existing note and returns the updated note.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no note has the given id.
    async fn set_note_grade(&self, id: Uuid, grade: u8) -> Result<Note, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    users: HashMap<String, UserRecord>,
    notes: HashMap<Uuid, Note>,
}

/// In-process store backed by maps behind a read-write lock.
///
/// Locks are held only for the map operation itself, never across an
/// await point.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.inner.read().unwrap().users.len()
    }

    /// Number of stored notes.
    pub fn note_count(&self) -> usize {
        self.inner.read().unwrap().notes.len()
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.users.get(email).cloned())
    }

    async fn create_user(&self, record: UserRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();

        if inner.users.contains_key(&record.email) {
            return Err(StoreError::Duplicate {
                key: record.email.clone(),
            });
        }

        trace!(user_id = %record.id, email = %record.email, "storing user");
        inner.users.insert(record.email.clone(), record);
        Ok(())
    }

    async fn create_note(&self, note: Note) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        trace!(note_id = %note.id, author_id = %note.author_id, "storing note");
        inner.notes.insert(note.id, note);
        Ok(())
    }

    async fn find_note(&self, id: Uuid) -> Result<Option<Note>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.notes.get(&id).cloned())
    }

    async fn set_note_grade(&self, id: Uuid, grade: u8) -> Result<Note, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let note = inner.notes.get_mut(&id).ok_or(StoreError::NotFound)?;
        note.grade = Some(grade);
        Ok(note.clone())
    }
}

/// Store double whose every operation fails with a transport fault.
///
/// Lets tests drive the `AsyncError` path without a real backend.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct UnavailableStore;

#[cfg(test)]
#[async_trait]
impl NoteStore for UnavailableStore {
    async fn find_user_by_email(&self, _email: &str) -> Result<Option<UserRecord>, StoreError> {
        Err(StoreError::Unavailable("backend down".to_string()))
    }

    async fn create_user(&self, _record: UserRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("backend down".to_string()))
    }

    async fn create_note(&self, _note: Note) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("backend down".to_string()))
    }

    async fn find_note(&self, _id: Uuid) -> Result<Option<Note>, StoreError> {
        Err(StoreError::Unavailable("backend down".to_string()))
    }

    async fn set_note_grade(&self, _id: Uuid, _grade: u8) -> Result<Note, StoreError> {
        Err(StoreError::Unavailable("backend down".to_string()))
    }
}
