// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use jsend::Outcome;
use method_middleware::stack::{Chain, Middleware};
use method_middleware::{Env, Result};

use crate::class::step_index;
use crate::telemetry::TRY_FALLBACK_EVENT;
use crate::{Instance, Service, Step};

/// Replaces the outcome of a [tried](crate::Step::tried) step with its fallback when the
/// step did not succeed.
///
/// The fallback is adopted whatever its status and is marked
/// [unchecked](jsend::Outcome::is_unchecked).
#[derive(Clone, Copy, Debug, Default)]
pub struct CanBeTried;

impl<S: Service> Middleware<Instance<S>, Outcome> for CanBeTried {
    fn call(&self, receiver: &Instance<S>, env: Env, chain: Chain<'_, Instance<S>, Outcome>) -> Result<Outcome> {
        let index = step_index(env.arguments())?;
        let tried = receiver.class().steps().get(index).is_some_and(Step::is_tried);

        let outcome = chain.next(receiver, env)?;
        if !tried || outcome.is_success() {
            return Ok(outcome);
        }

        let fallback = receiver.run_step_fallback(index)?.unchecked();

        if receiver.class().config().options().logs_enabled() {
            tracing::event!(
                name: TRY_FALLBACK_EVENT,
                tracing::Level::INFO,
                service = %receiver.class().name(),
                step.index = index,
                primary = %outcome.status(),
                status = %fallback.status(),
            );
        }

        Ok(fallback)
    }
}
