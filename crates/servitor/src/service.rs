// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use jsend::Outcome;
use method_middleware::{Arguments, Declarations, Error, Options, Result};
use serde_json::Value;

use crate::class::ServiceClass;
use crate::{Instance, StepCollection, registry, utils};

/// A service object: a type with a `result` method producing an [`Outcome`].
///
/// A service is constructed from [`Arguments`] for every call. Its class-level
/// configuration (callbacks, middlewares, concerns, attributes and steps) is declared once
/// in [`Service::configure`] and committed on first use or through
/// [`ServiceExt::commit_config`].
///
/// # Examples
///
/// ```
/// use jsend::{Data, Outcome};
/// use method_middleware::{Arguments, Error, Result};
/// use servitor::{Instance, Service, ServiceExt};
///
/// #[derive(Debug)]
/// struct Greet {
///     name: String,
/// }
///
/// impl Service for Greet {
///     fn new(arguments: &Arguments) -> Result<Self> {
///         let name = arguments.kwarg_value("name").and_then(|name| name.as_str()).ok_or_else(|| Error::other("name is required"))?;
///         Ok(Self { name: name.to_owned() })
///     }
///
///     fn result(instance: &Instance<Self>) -> Result<Outcome> {
///         Ok(Outcome::success(Data::from([("greeting", format!("Hello, {}!", instance.name))])))
///     }
/// }
///
/// let outcome = Greet::call(Arguments::null().kwarg("name", "Ada")).unwrap();
///
/// assert_eq!(outcome.data().get("greeting").unwrap(), "Hello, Ada!");
/// ```
pub trait Service: Sized + Send + Sync + 'static {
    /// Builds the service from the arguments of a call.
    ///
    /// # Errors
    ///
    /// Returns an error when the arguments do not describe a valid service.
    fn new(arguments: &Arguments) -> Result<Self>;

    /// The name used in messages, logs and outcome origins.
    #[must_use]
    fn name() -> &'static str {
        utils::short_type_name::<Self>()
    }

    /// The options of the service's class.
    #[must_use]
    fn options() -> Options {
        Options::new()
    }

    /// Declares the class-level configuration. Runs once per service type.
    fn configure(_declarations: &mut ServiceDeclarations<'_, Self>) {}

    /// Computes the outcome. By default, evaluates the declared steps.
    ///
    /// # Errors
    ///
    /// The default returns [`Error::ResultIsNotOverridden`] when no steps are declared.
    fn result(instance: &Instance<Self>) -> Result<Outcome> {
        instance.run_steps()
    }

    /// Computes the outcome a try step falls back to.
    ///
    /// # Errors
    ///
    /// The default returns [`Error::TryResultIsNotOverridden`].
    fn try_result(instance: &Instance<Self>) -> Result<Outcome> {
        Err(Error::TryResultIsNotOverridden {
            service: instance.class().name().to_owned(),
        })
    }
}

/// Class-level operations of every [`Service`].
pub trait ServiceExt: Service {
    /// Constructs the service and returns its `result`.
    ///
    /// # Errors
    ///
    /// Returns construction, configuration and dispatch errors, and errors raised by the
    /// service itself.
    fn call(arguments: Arguments) -> Result<Outcome> {
        Self::class()?.call(arguments)
    }

    /// Constructs the service and returns its `try_result`.
    ///
    /// # Errors
    ///
    /// Like [`ServiceExt::call`], plus [`Error::TryResultIsNotOverridden`].
    fn try_call(arguments: Arguments) -> Result<Outcome> {
        Self::class()?.try_call(arguments)
    }

    /// Commits the class. Returns `false` when it was already committed.
    ///
    /// # Errors
    ///
    /// Returns the errors of concern hooks, middleware factories and step definitions.
    fn commit_config() -> Result<bool> {
        Self::class()?.commit()
    }

    /// The class of the service, created on first use.
    ///
    /// # Errors
    ///
    /// Returns an error when the class cannot be declared.
    fn class() -> Result<Arc<ServiceClass<Self>>> {
        registry::service_class::<Self>()
    }
}

impl<S: Service> ServiceExt for S {}

type AttributeFn<S> = dyn Fn(&S) -> Value + Send + Sync;

/// Named readers of a service, available to steps as inputs.
pub struct Attributes<S> {
    readers: BTreeMap<String, Arc<AttributeFn<S>>>,
}

impl<S> Attributes<S> {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { readers: BTreeMap::new() }
    }

    /// Declares an attribute, replacing an earlier one with the same name.
    pub fn define(&mut self, name: impl Into<String>, read: impl Fn(&S) -> Value + Send + Sync + 'static) -> &mut Self {
        self.readers.insert(name.into(), Arc::new(read));
        self
    }

    /// Returns `true` when `name` is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.readers.contains_key(name)
    }

    /// Reads the attribute `name` of `service`.
    #[must_use]
    pub fn read(&self, service: &S, name: &str) -> Option<Value> {
        self.readers.get(name).map(|read| read(service))
    }

    /// The declared names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.readers.keys().map(String::as_str)
    }
}

impl<S> Default for Attributes<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Debug for Attributes<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// What [`Service::configure`] declares: the class's methods, middlewares, callbacks and
/// concerns (through [`Deref`] to [`Declarations`]), plus its attributes and steps.
pub struct ServiceDeclarations<'a, S: Service> {
    declarations: &'a mut Declarations<Instance<S>>,
    steps: &'a mut StepCollection<S>,
    attributes: &'a mut Attributes<S>,
}

impl<'a, S: Service> ServiceDeclarations<'a, S> {
    pub(crate) const fn new(
        declarations: &'a mut Declarations<Instance<S>>,
        steps: &'a mut StepCollection<S>,
        attributes: &'a mut Attributes<S>,
    ) -> Self {
        Self {
            declarations,
            steps,
            attributes,
        }
    }

    /// The step pipeline.
    pub const fn steps(&mut self) -> &mut StepCollection<S> {
        &mut *self.steps
    }

    /// Declares an attribute readable by steps.
    pub fn attribute(&mut self, name: impl Into<String>, read: impl Fn(&S) -> Value + Send + Sync + 'static) -> &mut Self {
        self.attributes.define(name, read);
        self
    }
}

impl<S: Service> Deref for ServiceDeclarations<'_, S> {
    type Target = Declarations<Instance<S>>;

    fn deref(&self) -> &Self::Target {
        &*self.declarations
    }
}

impl<S: Service> DerefMut for ServiceDeclarations<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.declarations
    }
}

impl<S: Service> Debug for ServiceDeclarations<'_, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDeclarations")
            .field("declarations", &self.declarations)
            .field("steps", &self.steps)
            .field("attributes", &self.attributes)
            .finish()
    }
}
