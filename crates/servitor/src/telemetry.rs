// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Names of the events services emit when logging is enabled through
//! [`Options::use_logs`](method_middleware::Options::use_logs).

/// A step was evaluated. Logged at `DEBUG` with `service`, `step.index` and `status`.
pub const STEP_EVENT: &str = "servitor.step";

/// A try step adopted its fallback. Logged at `INFO` with `service`, `step.index` and `status`.
pub const TRY_FALLBACK_EVENT: &str = "servitor.try_fallback";

/// An error was rescued into an `error` outcome. Logged at `WARN` with `method` and `error`.
pub const RESCUE_EVENT: &str = "servitor.rescue";
