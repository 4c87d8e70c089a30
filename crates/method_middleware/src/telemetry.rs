// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Names of the `tracing` events emitted when logging is enabled through
//! [`Options::use_logs`](crate::Options::use_logs).
//!
//! Event fields are dot-separated and values prefer `snake_case`:
//!
//! - `config.name`: the name of the class;
//! - `trigger`: what caused a commit, see [`Trigger`](crate::Trigger);
//! - `scope` and `method`: the method a caller was defined for.

/// A config was committed.
pub const COMMIT_EVENT: &str = "method_middleware.commit";

/// The middleware caller of a method was defined.
pub const DEFINE_EVENT: &str = "method_middleware.define";

/// Dispatch gave up committing a config implicitly.
pub const AUTO_COMMIT_EVENT: &str = "method_middleware.auto_commit";
