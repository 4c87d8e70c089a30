// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

use jsend::{Origin, Outcome};
use method_middleware::cache::{ArrayStorage, Cache, CacheKey};
use method_middleware::{Arguments, Entity, Error, Result};
use parking_lot::Mutex;
use serde_json::Value;

use crate::class::{RESULT, STEP, TRY_RESULT};
use crate::telemetry::STEP_EVENT;
use crate::{Action, Input, Service, ServiceClass, Step, utils};

type StepResults = Cache<usize, Outcome, ArrayStorage<usize, Outcome>>;

/// One constructed service: the value built by [`Service::new`], the arguments it was built
/// from and everything it memoized while running.
///
/// Dereferences to the service, so its fields and methods are available directly.
pub struct Instance<S: Service> {
    service: S,
    arguments: Arguments,
    class: Arc<ServiceClass<S>>,
    return_values: Cache<CacheKey, Outcome>,
    step_results: StepResults,
    evaluated: Mutex<Vec<usize>>,
}

impl<S: Service> Entity for Instance<S> {
    type Class = ServiceClass<S>;
    type Output = Outcome;
}

impl<S: Service> Instance<S> {
    pub(crate) fn new(class: Arc<ServiceClass<S>>, service: S, arguments: Arguments) -> Self {
        Self {
            service,
            arguments,
            class,
            return_values: Cache::new(),
            step_results: Cache::new(),
            evaluated: Mutex::new(Vec::new()),
        }
    }

    /// The service value.
    #[must_use]
    pub const fn service(&self) -> &S {
        &self.service
    }

    /// The arguments the service was built from.
    #[must_use]
    pub const fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// The class of the service.
    #[must_use]
    pub const fn class(&self) -> &Arc<ServiceClass<S>> {
        &self.class
    }

    /// The outcome of the service, computed on the first call and memoized.
    ///
    /// # Errors
    ///
    /// Returns the error of [`Service::result`] or of the middlewares around it.
    pub fn result(&self) -> Result<Outcome> {
        self.call(RESULT, Arguments::null())
    }

    /// The fallback outcome of the service, computed on the first call and memoized.
    ///
    /// # Errors
    ///
    /// Returns the error of [`Service::try_result`] or of the middlewares around it.
    pub fn try_result(&self) -> Result<Outcome> {
        self.call(TRY_RESULT, Arguments::null())
    }

    /// Calls an instance method through its middlewares.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMethod`] for unknown methods and whatever the method or its
    /// middlewares raise.
    pub fn call(&self, method: &str, arguments: Arguments) -> Result<Outcome> {
        self.class.config().call(self, method, arguments)
    }

    /// Evaluates the declared steps. This is what [`Service::result`] does by default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResultIsNotOverridden`] when no steps are declared, and the first
    /// error a step raises.
    pub fn run_steps(&self) -> Result<Outcome> {
        let steps = self.class.steps();
        if steps.is_empty() {
            return Err(Error::ResultIsNotOverridden {
                service: self.class.name().to_owned(),
            });
        }

        steps.expression().evaluate(&mut |index| self.step_result(index))
    }

    /// The outcome of the step at `index`, running it on first use.
    ///
    /// The step runs through the organizer's `step` method, so callbacks and middlewares
    /// declared for `step` apply. Its outcome keeps only the declared outputs and carries the
    /// step as its origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StepIsNotDefined`] for unknown indexes, input and output errors, and
    /// the errors of the step's action.
    pub fn step_result(&self, index: usize) -> Result<Outcome> {
        self.step_results.try_fetch(index, || self.evaluate_step(index))
    }

    fn evaluate_step(&self, index: usize) -> Result<Outcome> {
        let step = self.step(index)?;
        self.evaluated.lock().push(index);

        let outcome = self.call(STEP, Arguments::null().kwarg("index", index))?;
        let outcome = step
            .project(self.class.name(), outcome)?
            .with_origin(Origin::step(S::name(), index));

        if self.class.config().options().logs_enabled() {
            tracing::event!(
                name: STEP_EVENT,
                tracing::Level::DEBUG,
                service = %self.class.name(),
                step.index = index,
                step.action = %step.action().name(),
                status = %outcome.status(),
            );
        }

        Ok(outcome)
    }

    /// Runs the action of the step at `index` with its resolved inputs.
    pub(crate) fn run_step_action(&self, index: usize) -> Result<Outcome> {
        let step = self.step(index)?;
        let arguments = self.resolve_inputs(step)?;

        match step.action() {
            Action::Service { result, .. } => result(arguments),
            Action::Method(method) => self.call(method, arguments),
        }
    }

    /// Runs the fallback of the step at `index` with its resolved inputs.
    pub(crate) fn run_step_fallback(&self, index: usize) -> Result<Outcome> {
        let step = self.step(index)?;
        let arguments = self.resolve_inputs(step)?;

        match step.action() {
            Action::Service { try_result, .. } => try_result(arguments),
            Action::Method(method) => self.call(&utils::try_method_name(method), arguments),
        }
    }

    fn step(&self, index: usize) -> Result<&Step<S>> {
        self.class.steps().get(index).ok_or_else(|| Error::StepIsNotDefined {
            service: self.class.name().to_owned(),
            step: index,
        })
    }

    /// The keyword arguments the step receives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InputMethodIsNotDefinedInContainer`] when an input names neither an
    /// attribute nor an output, and the errors of reading outputs and computing inputs.
    pub fn resolve_inputs(&self, step: &Step<S>) -> Result<Arguments> {
        let mut arguments = Arguments::null();

        for input in step.inputs() {
            let value = match input {
                Input::Name(source) | Input::Alias { source, .. } => self.read(source)?,
                Input::Raw { value, .. } => value.clone(),
                Input::Computed { compute, .. } => compute(self)?,
            };
            arguments = arguments.kwarg(input.param(), value);
        }

        Ok(arguments)
    }

    fn read(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.attribute(name) {
            return Ok(value);
        }

        self.output(name)
    }

    /// Reads a declared attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.class.attributes().read(&self.service, name)
    }

    /// Reads a step output. When several steps expose `name`, the last declared one that ran
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InputMethodIsNotDefinedInContainer`] when no step exposes `name`,
    /// [`Error::StepOutputIsNotComputed`] when none of them ran yet, and
    /// [`Error::StepResultDataNotExistingAttribute`] when the step did not succeed.
    pub fn output(&self, name: &str) -> Result<Value> {
        let exposing: Vec<&Step<S>> = self.class.steps().iter().filter(|step| step.exposes(name)).collect();
        if exposing.is_empty() {
            return Err(Error::InputMethodIsNotDefinedInContainer {
                service: self.class.name().to_owned(),
                input: name.to_owned(),
            });
        }

        let computed = exposing
            .iter()
            .rev()
            .find_map(|step| self.step_results.read(&step.index()).map(|outcome| (step.index(), outcome)));

        let Some((index, outcome)) = computed else {
            return Err(Error::StepOutputIsNotComputed {
                service: self.class.name().to_owned(),
                output: name.to_owned(),
            });
        };

        outcome.data().get(name).cloned().ok_or_else(|| Error::StepResultDataNotExistingAttribute {
            service: self.class.name().to_owned(),
            step: index,
            key: name.to_owned(),
        })
    }

    /// The indexes of the steps evaluated so far, in evaluation order.
    #[must_use]
    pub fn evaluated_steps(&self) -> Vec<usize> {
        self.evaluated.lock().clone()
    }

    /// Visits the steps evaluated so far with their outcomes, in evaluation order.
    pub fn each_evaluated_step(&self, mut visit: impl FnMut(&Step<S>, &Outcome)) {
        for index in self.evaluated_steps() {
            if let (Some(step), Some(outcome)) = (self.class.steps().get(index), self.step_results.read(&index)) {
                visit(step, &outcome);
            }
        }
    }

    /// Visits every declared step, evaluated or not.
    pub fn each_step(&self, visit: impl FnMut(&Step<S>)) {
        self.class.steps().each_step(visit);
    }

    pub(crate) const fn return_values(&self) -> &Cache<CacheKey, Outcome> {
        &self.return_values
    }
}

impl<S: Service> Deref for Instance<S> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.service
    }
}

impl<S: Service> Debug for Instance<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("service", &self.class.name())
            .field("arguments", &self.arguments)
            .field("evaluated", &self.evaluated_steps())
            .finish_non_exhaustive()
    }
}
