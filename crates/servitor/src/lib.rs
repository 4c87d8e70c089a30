// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Service objects returning JSend outcomes.
//!
//! A [`Service`] is built from [`Arguments`](method_middleware::Arguments) for every call and
//! answers with an [`Outcome`](jsend::Outcome). Its `result` either comes from its own code or
//! from a pipeline of [steps](Step) combined by a boolean [`Expression`]: each step calls
//! another service or a method of the organizer, reads its inputs from the organizer's
//! attributes and from earlier steps' outputs, and exposes the data keys it declares.
//!
//! Every service has a class, created on first use and committed once. The class carries
//! the method configuration of [`method_middleware`], so services get callbacks,
//! middlewares and concerns on `result` and on each `step`:
//!
//! ```text
//! call ──► class `result` ──► new ──► instance `result` ──► callbacks ──► steps
//!                                                                          │
//!                             step ◄── try fallback ◄── callbacks ◄────────┘
//! ```
//!
//! # Examples
//!
//! ```
//! use jsend::{Data, Outcome};
//! use method_middleware::{Arguments, Error, Result};
//! use serde_json::json;
//! use servitor::{Instance, Service, ServiceDeclarations, ServiceExt, Step};
//!
//! #[derive(Debug)]
//! struct FindUser;
//!
//! impl Service for FindUser {
//!     fn new(_: &Arguments) -> Result<Self> {
//!         Ok(Self)
//!     }
//!
//!     fn result(instance: &Instance<Self>) -> Result<Outcome> {
//!         let id = instance.arguments().kwarg_value("id").cloned().unwrap_or_default();
//!         Ok(Outcome::success(Data::from([("user", json!({ "id": id, "name": "Ada" }))])))
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct Welcome {
//!     id: u64,
//! }
//!
//! impl Service for Welcome {
//!     fn new(arguments: &Arguments) -> Result<Self> {
//!         let id = arguments.kwarg_value("id").and_then(|id| id.as_u64()).ok_or_else(|| Error::other("id is required"))?;
//!         Ok(Self { id })
//!     }
//!
//!     fn configure(declarations: &mut ServiceDeclarations<'_, Self>) {
//!         declarations.attribute("id", |welcome| json!(welcome.id));
//!         declarations.steps().step(Step::service::<FindUser>().input("id").out("user"));
//!     }
//! }
//!
//! let outcome = Welcome::call(Arguments::null().kwarg("id", 7)).unwrap();
//!
//! assert!(outcome.is_success());
//! assert_eq!(outcome.data().get("user").unwrap()["name"], "Ada");
//! ```

mod class;
mod expression;
mod instance;
pub mod middlewares;
mod registry;
mod service;
mod step;
mod steps;
pub mod telemetry;
pub mod utils;

pub use class::{RESULT, STEP, ServiceClass, TRY_RESULT};
pub use expression::Expression;
pub use instance::Instance;
pub use service::{Attributes, Service, ServiceDeclarations, ServiceExt};
pub use step::{Action, Input, Output, Step};
pub use steps::StepCollection;
