//! Game identifier generation.
//!
//! The [`Manager`](crate::Manager) draws candidate identifiers from an
//! [`IdGenerator`]. Production uses random UUIDs; tests script the exact
//! sequence to force collisions.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Produces candidate game identifiers.
pub trait IdGenerator: Send + Sync + 'static {
    fn generate(&self) -> String;
}

/// Random v4 UUIDs, e.g. `"67e55044-10b1-426f-9247-bb680e5fe0c8"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Replays a fixed list of identifiers, then yields empty strings.
#[derive(Debug, Default)]
pub struct ScriptedIdGenerator {
    values: Vec<String>,
    next: AtomicUsize,
}

impl ScriptedIdGenerator {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            next: AtomicUsize::new(0),
        }
    }
}

impl IdGenerator for ScriptedIdGenerator {
    fn generate(&self) -> String {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        self.values.get(index).cloned().unwrap_or_default()
    }
}
