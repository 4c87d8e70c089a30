// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::Status;

/// A human readable explanation attached to an [`Outcome`](crate::Outcome).
///
/// Empty by default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Cow<'static, str>);

impl Message {
    /// Returns the message text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty message.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&'static str> for Message {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for Message {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A machine readable identifier attached to an [`Outcome`](crate::Outcome).
///
/// Each status has a default code, see [`Code::default_for`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Code(Cow<'static, str>);

impl Code {
    /// The code an outcome carries when none was given.
    ///
    /// # Examples
    ///
    /// ```
    /// use jsend::{Code, Status};
    ///
    /// assert_eq!(Code::default_for(Status::Failure), "default_failure");
    /// ```
    #[must_use]
    pub const fn default_for(status: Status) -> Self {
        match status {
            Status::Success => Self(Cow::Borrowed("default_success")),
            Status::Failure => Self(Cow::Borrowed("default_failure")),
            Status::Error => Self(Cow::Borrowed("default_error")),
        }
    }

    /// Returns the code text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when this is the default code of one of the statuses.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self.as_str(), "default_success" | "default_failure" | "default_error")
    }
}

impl From<&'static str> for Code {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for Code {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for Code {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_codes_follow_status() {
        for status in [Status::Success, Status::Failure, Status::Error] {
            let code = Code::default_for(status);

            assert!(code.is_default());
            assert!(code.as_str().ends_with(status.as_str()));
        }
    }

    #[test]
    fn custom_code_is_not_default() {
        assert!(!Code::from(String::from("user_not_found")).is_default());
    }

    #[test]
    fn message_defaults_to_empty() {
        assert!(Message::default().is_empty());
        assert_eq!(Message::from("boom"), "boom");
    }
}
