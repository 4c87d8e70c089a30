// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use jsend::{Origin, Outcome};
use method_middleware::{Arguments, Config, Declarations, Error, Result};

use crate::middlewares::{CachesReturnValue, CanBeTried};
use crate::service::{Attributes, ServiceDeclarations};
use crate::{Instance, Service, StepCollection, registry};

/// The method computing a service's outcome.
pub const RESULT: &str = "result";

/// The method computing a service's fallback outcome.
pub const TRY_RESULT: &str = "try_result";

/// The organizer method every step runs through. Receives the step index as the `index`
/// keyword argument.
pub const STEP: &str = "step";

/// The class of a service type: its committed configuration, attributes and steps.
///
/// Obtained through [`ServiceExt::class`](crate::ServiceExt::class).
pub struct ServiceClass<S: Service> {
    config: Config<Instance<S>>,
    steps: StepCollection<S>,
    attributes: Attributes<S>,
}

impl<S: Service> ServiceClass<S> {
    pub(crate) fn declare() -> Result<Self> {
        let config = Config::new(S::name(), S::options());
        let mut steps = StepCollection::new();
        let mut attributes = Attributes::new();

        config.declare(|declarations| {
            declare_defaults::<S>(declarations);
            S::configure(&mut ServiceDeclarations::new(declarations, &mut steps, &mut attributes));
        })?;

        Ok(Self {
            config,
            steps,
            attributes,
        })
    }

    /// The name of the service.
    #[must_use]
    pub fn name(&self) -> &str {
        self.config.name()
    }

    /// The method configuration of the service.
    #[must_use]
    pub const fn config(&self) -> &Config<Instance<S>> {
        &self.config
    }

    /// The declared steps.
    #[must_use]
    pub const fn steps(&self) -> &StepCollection<S> {
        &self.steps
    }

    /// The declared attributes.
    #[must_use]
    pub const fn attributes(&self) -> &Attributes<S> {
        &self.attributes
    }

    /// Commits the steps and the method configuration. Returns `false` when both were
    /// already committed.
    ///
    /// # Errors
    ///
    /// Returns the errors of step definitions, concern hooks and middleware factories.
    pub fn commit(&self) -> Result<bool> {
        let steps = self.steps.commit(self.name(), &self.attributes)?;
        let config = self.config.commit()?;
        Ok(steps || config)
    }

    /// Constructs the service and returns its `result`, through the class-level `result`
    /// middlewares.
    ///
    /// # Errors
    ///
    /// Returns construction, configuration and dispatch errors, and errors raised by the
    /// service itself.
    pub fn call(&self, arguments: Arguments) -> Result<Outcome> {
        self.steps.commit(self.name(), &self.attributes)?;
        self.config.call_class(self, RESULT, arguments)
    }

    /// Constructs the service and returns its `try_result`.
    ///
    /// # Errors
    ///
    /// Like [`ServiceClass::call`].
    pub fn try_call(&self, arguments: Arguments) -> Result<Outcome> {
        self.steps.commit(self.name(), &self.attributes)?;
        self.config.call_class(self, TRY_RESULT, arguments)
    }

    /// Constructs an instance without calling it. The steps are checked and frozen first.
    ///
    /// # Errors
    ///
    /// Returns the step definition errors and the error of [`Service::new`].
    pub fn instantiate(self: &Arc<Self>, arguments: Arguments) -> Result<Instance<S>> {
        self.steps.commit(self.name(), &self.attributes)?;
        let service = S::new(&arguments)?;
        Ok(Instance::new(Arc::clone(self), service, arguments))
    }
}

impl<S: Service> Debug for ServiceClass<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClass")
            .field("config", &self.config)
            .field("steps", &self.steps)
            .field("attributes", &self.attributes)
            .finish()
    }
}

fn with_service_origin<S: Service>(outcome: Outcome) -> Outcome {
    if outcome.origin().is_some() {
        outcome
    } else {
        outcome.with_origin(Origin::service(S::name()))
    }
}

/// The index a `step` call carries.
pub(crate) fn step_index(arguments: &Arguments) -> Result<usize> {
    arguments
        .kwarg_value("index")
        .and_then(serde_json::Value::as_u64)
        .and_then(|index| usize::try_from(index).ok())
        .ok_or_else(|| Error::other("`step` takes the step position as its `index` keyword argument"))
}

/// Methods and middlewares every service has before its own configuration runs.
fn declare_defaults<S: Service>(declarations: &mut Declarations<Instance<S>>) {
    declarations
        .define_method(RESULT, |instance, _| S::result(instance).map(with_service_origin::<S>))
        .define_method(TRY_RESULT, |instance, _| S::try_result(instance).map(with_service_origin::<S>))
        .define_method(STEP, |instance, arguments| instance.run_step_action(step_index(arguments)?))
        .middlewares(RESULT, |stack| {
            stack.use_middleware(CachesReturnValue).use_callbacks();
        })
        .middlewares(TRY_RESULT, |stack| {
            stack.use_middleware(CachesReturnValue).use_callbacks();
        })
        .middlewares(STEP, |stack| {
            stack.use_callbacks().use_middleware(CanBeTried);
        });

    declarations
        .class()
        .method(RESULT, |_, arguments| registry::service_class::<S>()?.instantiate(arguments.clone())?.result())
        .method(TRY_RESULT, |_, arguments| {
            registry::service_class::<S>()?.instantiate(arguments.clone())?.try_result()
        });
}
