//! Branded ID newtypes for type safety.
//!
//! Tasks and notifications both key on strings, and a notification ID is
//! derived from a task ID. Wrapping each in its own newtype keeps a task ID
//! from being handed to the notifier where a notification ID is expected.
//!
//! Task IDs are UUID v7 (time-ordered) generated via [`uuid::Uuid::now_v7`].

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Suffix appended to a task ID to key its overdue alert.
const OVERDUE_SUFFIX: &str = "-overdue";

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a task. Immutable once assigned.
    TaskId
}

branded_id! {
    /// Identifier under which a notification is submitted to the delivery
    /// collaborator. Scheduling under an existing ID replaces it.
    NotificationId
}

impl TaskId {
    /// Create a new random ID (UUID v7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationId {
    /// ID of the due-date reminder for a task. Same string as the task ID.
    #[must_use]
    pub fn reminder(task_id: &TaskId) -> Self {
        Self(task_id.as_str().to_owned())
    }

    /// ID of the overdue alert for a task: `<task-id>-overdue`.
    ///
    /// Distinct from [`NotificationId::reminder`] so cancelling one never
    /// touches the other.
    #[must_use]
    pub fn overdue(task_id: &TaskId) -> Self {
        Self(format!("{task_id}{OVERDUE_SUFFIX}"))
    }

    /// Whether this ID keys an overdue alert.
    #[must_use]
    pub fn is_overdue_alert(&self) -> bool {
        self.0.ends_with(OVERDUE_SUFFIX)
    }
}
