// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An unpublished crate containing testing utilities for use within this repo.
//!
//! - [`LogCapture`] collects formatted `tracing` output of the current thread.
//! - [`Journal`] records named events from callbacks and middlewares so tests can assert
//!   the order they ran in.

mod journal;
mod log;

pub use journal::*;
pub use log::*;
