// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::{Arc, Mutex};

/// An append-only record of named events, shared between clones.
///
/// Hand a clone to every callback or middleware under test and let each record what it did;
/// the test then asserts the order.
///
/// # Examples
///
/// ```
/// use testing_aids::Journal;
///
/// let journal = Journal::new();
/// let writer = journal.clone();
///
/// writer.record("before");
/// writer.record("after");
///
/// journal.assert_entries(&["before", "after"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    ///
    /// # Panics
    ///
    /// Panics if another thread panicked while recording.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    /// All entries, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if another thread panicked while recording.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// How many entries equal `entry`.
    #[must_use]
    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|recorded| *recorded == entry).count()
    }

    /// Forgets every entry.
    ///
    /// # Panics
    ///
    /// Panics if another thread panicked while recording.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Asserts that exactly `expected` was recorded, in this order.
    ///
    /// # Panics
    ///
    /// Panics if the recorded entries differ.
    pub fn assert_entries(&self, expected: &[&str]) {
        let entries = self.entries();
        assert_eq!(entries, expected, "journal entries differ");
    }
}
