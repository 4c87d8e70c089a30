// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CastError, Code, Data, Message, Status};

/// Where an [`Outcome`] was produced: the service type and, for pipelines, the step.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin {
    service: Cow<'static, str>,
    step: Option<usize>,
}

impl Origin {
    /// An outcome produced directly by a service.
    #[must_use]
    pub fn service(service: impl Into<Cow<'static, str>>) -> Self {
        Self {
            service: service.into(),
            step: None,
        }
    }

    /// An outcome produced by step `index` of an organizer service.
    #[must_use]
    pub fn step(service: impl Into<Cow<'static, str>>, index: usize) -> Self {
        Self {
            service: service.into(),
            step: Some(index),
        }
    }

    /// The name of the service type.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service
    }

    /// The index of the step, if the outcome came out of a pipeline.
    #[must_use]
    pub const fn step_index(&self) -> Option<usize> {
        self.step
    }
}

/// A JSend-shaped result: a status plus data, message and code.
///
/// Outcomes are immutable; the `with_*` methods return modified copies. Two outcomes are
/// equal when their status, data, message, code and originating service are equal. The
/// step index and the `unchecked` / `negated` markers do not take part in equality.
///
/// # Examples
///
/// ```
/// use jsend::{Data, Outcome, Status};
///
/// let outcome = Outcome::success(Data::from([("id", 42)]));
///
/// assert!(outcome.is_success());
/// assert_eq!(outcome.code(), &"default_success");
///
/// let rejected = Outcome::failure(Data::new()).with_message("name is blank");
///
/// assert_eq!(rejected.status(), Status::Failure);
/// assert_eq!(rejected.message(), &"name is blank");
/// ```
#[derive(Clone, Debug, Serialize)]
pub struct Outcome {
    status: Status,
    data: Data,
    message: Message,
    code: Code,
    #[serde(skip)]
    origin: Option<Origin>,
    #[serde(skip)]
    unchecked: bool,
    #[serde(skip)]
    negated: bool,
}

impl Outcome {
    /// Creates an outcome with the given status, empty data, empty message and the status' default code.
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            status,
            data: Data::new(),
            message: Message::default(),
            code: Code::default_for(status),
            origin: None,
            unchecked: false,
            negated: false,
        }
    }

    /// Creates a successful outcome carrying `data`.
    #[must_use]
    pub fn success(data: impl Into<Data>) -> Self {
        Self::new(Status::Success).with_data(data)
    }

    /// Creates a failed outcome carrying `data`.
    #[must_use]
    pub fn failure(data: impl Into<Data>) -> Self {
        Self::new(Status::Failure).with_data(data)
    }

    /// Creates an error outcome with `message`.
    #[must_use]
    pub fn error(message: impl Into<Message>) -> Self {
        Self::new(Status::Error).with_message(message)
    }

    /// The status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// The data.
    #[must_use]
    pub const fn data(&self) -> &Data {
        &self.data
    }

    /// The message.
    #[must_use]
    pub const fn message(&self) -> &Message {
        &self.message
    }

    /// The code.
    #[must_use]
    pub const fn code(&self) -> &Code {
        &self.code
    }

    /// Where this outcome was produced, when known.
    #[must_use]
    pub const fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Returns `true` for a successful outcome.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns `true` for a failed outcome.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Returns `true` for an error outcome.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.status.is_error()
    }

    /// Returns `true` when the status was adopted without being checked, as a try
    /// fallback does.
    #[must_use]
    pub const fn is_unchecked(&self) -> bool {
        self.unchecked
    }

    /// Returns `true` when this outcome is the negation of another one.
    #[must_use]
    pub const fn is_negated(&self) -> bool {
        self.negated
    }

    /// Replaces the status.
    ///
    /// A code that was the default of the old status becomes the default of the new one.
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        if self.code.is_default() {
            self.code = Code::default_for(status);
        }
        self.status = status;
        self
    }

    /// Replaces the data.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<Data>) -> Self {
        self.data = data.into();
        self
    }

    /// Replaces the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<Message>) -> Self {
        self.message = message.into();
        self
    }

    /// Replaces the code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<Code>) -> Self {
        self.code = code.into();
        self
    }

    /// Replaces the origin.
    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Marks the status as adopted without being checked.
    #[must_use]
    pub fn unchecked(mut self) -> Self {
        self.unchecked = true;
        self
    }

    /// Returns the negation of this outcome.
    ///
    /// Success becomes failure and failure becomes success; data, message and code are kept.
    /// An error stays an error, but is still marked as negated.
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.status = self.status.negated();
        self.negated = !self.negated;
        self
    }
}

impl PartialEq for Outcome {
    fn eq(&self, other: &Self) -> bool {
        self.status == other.status
            && self.data == other.data
            && self.message == other.message
            && self.code == other.code
            && self.origin.as_ref().map(Origin::service_name) == other.origin.as_ref().map(Origin::service_name)
    }
}

impl Eq for Outcome {}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.status, self.code)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if !self.data.is_empty() {
            write!(f, " {}", self.data)?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawOutcome {
    status: Status,
    #[serde(default)]
    data: Data,
    #[serde(default)]
    message: Message,
    code: Option<Code>,
}

impl TryFrom<Value> for Outcome {
    type Error = CastError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let raw: RawOutcome = serde_json::from_value(value)?;
        let outcome = Self::new(raw.status).with_data(raw.data).with_message(raw.message);

        Ok(match raw.code {
            Some(code) => outcome.with_code(code),
            None => outcome,
        })
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Outcome: Send, Sync, Clone, std::fmt::Debug);
    }

    #[test]
    fn with_status_moves_default_code() {
        let outcome = Outcome::success(Data::new()).with_status(Status::Failure);

        assert_eq!(outcome.code(), &"default_failure");
    }

    #[test]
    fn with_status_keeps_custom_code() {
        let outcome = Outcome::success(Data::new()).with_code("cached").with_status(Status::Failure);

        assert_eq!(outcome.code(), &"cached");
    }

    #[test]
    fn negation_keeps_default_codes() {
        let failed = Outcome::success(Data::new()).negated();
        let succeeded = Outcome::failure(Data::new()).negated();

        assert!(failed.is_failure());
        assert_eq!(failed.code(), &"default_success");
        assert!(succeeded.is_success());
        assert_eq!(succeeded.code(), &"default_failure");
    }

    #[test]
    fn negation_twice_restores_marker() {
        let outcome = Outcome::failure(Data::new()).negated().negated();

        assert!(outcome.is_failure());
        assert!(!outcome.is_negated());
    }

    #[test]
    fn equality_ignores_step_and_markers() {
        let left = Outcome::success(Data::new()).with_origin(Origin::step("Organizer", 0));
        let right = Outcome::success(Data::new()).with_origin(Origin::step("Organizer", 3)).unchecked();

        assert_eq!(left, right);
    }

    #[test]
    fn equality_compares_service() {
        let left = Outcome::success(Data::new()).with_origin(Origin::service("A"));
        let right = Outcome::success(Data::new()).with_origin(Origin::service("B"));

        assert_ne!(left, right);
    }

    #[test]
    fn casts_from_json() {
        let outcome = Outcome::try_from(json!({ "status": "failure", "data": { "field": "name" } })).unwrap();

        assert!(outcome.is_failure());
        assert_eq!(outcome.data().get("field"), Some(&json!("name")));
        assert_eq!(outcome.code(), &"default_failure");
    }

    #[test]
    fn display_lists_parts() {
        let outcome = Outcome::error("boom").with_data(Data::from([("retry", false)]));

        assert_eq!(outcome.to_string(), r#"error (default_error): boom {"retry":false}"#);
    }
}
