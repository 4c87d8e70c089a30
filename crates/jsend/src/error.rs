// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// An error raised when a raw value cannot be cast into one of the JSend value objects.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CastError {
    /// The status label is not one of `success`, `failure` or `error`.
    #[error("`{0}` is not a status, expected one of `success`, `failure`, `error`")]
    UnknownStatus(String),

    /// Data must be a JSON object.
    #[error("data must be a JSON object, got `{0}`")]
    NotAnObject(serde_json::Value),

    /// The value does not have the shape of an outcome.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(CastError: Send, Sync, std::error::Error);
    }

    #[test]
    fn not_an_object_shows_value() {
        let error = CastError::NotAnObject(serde_json::json!([1, 2]));

        assert_eq!(error.to_string(), "data must be a JSON object, got `[1,2]`");
    }
}
