// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Per-method middleware for classes assembled at runtime.
//!
//! A class is described by a [`Config`]: its methods, the middleware stack of each method,
//! `before`/`after`/`around` [callbacks](callbacks) and the [concerns](concern) it mixes in.
//! Declarations stay open until the config is committed. Committing mixes in the concerns,
//! layers the method table and turns each stack into a shared list of frames; afterwards
//! every call runs through its method's frames before reaching the implementation.
//!
//! Independently authored middlewares wrap the same method in declaration order, the first
//! declared being the outermost:
//!
//! ```text
//! call ──► middleware 1 ──► middleware 2 ──► closest implementation ──► super ...
//! ```
//!
//! # Examples
//!
//! ```
//! use method_middleware::{Arguments, Config, Entity, Options};
//!
//! #[derive(Debug)]
//! struct Account {
//!     balance: i64,
//! }
//!
//! impl Entity for Account {
//!     type Class = ();
//!     type Output = i64;
//! }
//!
//! let config = Config::<Account>::new("Account", Options::new());
//! config
//!     .declare(|declarations| {
//!         declarations
//!             .define_method("balance", |account, _| Ok(account.balance))
//!             .middlewares("balance", |stack| {
//!                 stack
//!                     .use_callbacks()
//!                     .use_fn(|account, env, chain| Ok(chain.next(account, env)? * 100));
//!             })
//!             .after("balance", |_, cents, _| {
//!                 assert_eq!(*cents, 700);
//!                 Ok(())
//!             });
//!     })
//!     .unwrap();
//!
//! config.commit().unwrap();
//!
//! let cents = config.call(&Account { balance: 7 }, "balance", Arguments::null()).unwrap();
//! assert_eq!(cents, 700);
//! ```
//!
//! Callbacks run where the method's stack includes the [`Callbacks`](callbacks::Callbacks)
//! middleware; they see the value returned by the frames below it.

mod arguments;
pub mod cache;
pub mod callbacks;
pub mod concern;
mod config;
mod dispatch;
mod error;
mod method;
pub mod stack;
pub mod telemetry;

pub use arguments::{Arguments, Block};
pub use config::{Config, Declarations, Entity, Options, ScopeDeclarations, Trigger};
pub use error::{Error, Result};
pub use method::{BoundMethod, Env, Method, Scope, SuperMethod};
