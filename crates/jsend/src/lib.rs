// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! JSend-shaped result value objects.
//!
//! A service reports what happened through an [`Outcome`]: exactly one [`Status`]
//! (success, failure or error) plus [`Data`], a [`Message`] and a [`Code`]. Each part
//! can be cast from raw JSON or strings and compared on its own.
//!
//! Business failures are values, not Rust errors. That keeps outcomes composable: a
//! pipeline can look at a failed outcome and decide to try something else.
//!
//! # Examples
//!
//! ```
//! use jsend::{Data, Outcome};
//! use serde_json::json;
//!
//! let outcome = Outcome::try_from(json!({
//!     "status": "success",
//!     "data": { "id": 1 },
//! }))
//! .unwrap();
//!
//! assert_eq!(outcome, Outcome::success(Data::from([("id", 1)])));
//! assert_eq!(outcome.negated().status(), jsend::Status::Failure);
//! ```

mod data;
mod error;
mod outcome;
mod status;
mod text;

pub use data::Data;
pub use error::CastError;
pub use outcome::{Origin, Outcome};
pub use status::Status;
pub use text::{Code, Message};
