// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use jsend::Outcome;
use method_middleware::stack::{Chain, Middleware, Stack};
use method_middleware::{Env, Error, Result};

use crate::telemetry::RESCUE_EVENT;
use crate::utils;

/// Turns errors raised by user code into `error` outcomes.
///
/// Only [`Error::Other`] is rescued. Configuration and protocol errors still propagate.
/// The message names the error, the method and the arguments of the failed call.
///
/// # Examples
///
/// ```
/// use jsend::Outcome;
/// use method_middleware::stack::{Chain, Middleware};
/// use method_middleware::{Arguments, Env, Error, Result};
/// use servitor::middlewares::RescuesErrors;
///
/// let frames: [std::sync::Arc<dyn Middleware<(), Outcome>>; 1] = [std::sync::Arc::new(RescuesErrors::new())];
/// let terminal = |_: &(), _: Env| -> Result<Outcome> { Err(Error::other("disk full")) };
///
/// let outcome = Chain::new(&frames, &terminal).next(&(), Env::new("save", Arguments::null().arg(3))).unwrap();
///
/// assert!(outcome.is_error());
/// assert_eq!(outcome.message().as_str(), "disk full (`save` called with 3)");
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct RescuesErrors {
    logs_enabled: bool,
}

impl RescuesErrors {
    /// Creates the middleware with logging off.
    #[must_use]
    pub const fn new() -> Self {
        Self { logs_enabled: false }
    }

    /// Logs every rescued error.
    #[must_use]
    pub const fn use_logs(self) -> Self {
        Self { logs_enabled: true }
    }
}

impl<R> Middleware<R, Outcome> for RescuesErrors {
    fn call(&self, receiver: &R, env: Env, chain: Chain<'_, R, Outcome>) -> Result<Outcome> {
        let method = env.method().to_owned();
        let arguments = env.arguments().clone();

        match chain.next(receiver, env) {
            Err(Error::Other(error)) => {
                if self.logs_enabled {
                    tracing::event!(
                        name: RESCUE_EVENT,
                        tracing::Level::WARN,
                        method = %method,
                        error = %error,
                    );
                }

                Ok(Outcome::error(format!(
                    "{error} (`{method}` called with {})",
                    utils::format_arguments(&arguments)
                )))
            }
            result => result,
        }
    }
}

/// Stack shortcuts for service middlewares.
pub trait StackExt {
    /// Appends [`RescuesErrors`], logging when the class has logs enabled.
    fn use_rescues_errors(&mut self) -> &mut Self;
}

impl<R: 'static> StackExt for Stack<R, Outcome> {
    fn use_rescues_errors(&mut self) -> &mut Self {
        self.use_factory(|setup| {
            let middleware = if setup.options().logs_enabled() {
                RescuesErrors::new().use_logs()
            } else {
                RescuesErrors::new()
            };
            let middleware: Arc<dyn Middleware<R, Outcome>> = Arc::new(middleware);
            Ok(middleware)
        })
    }
}
