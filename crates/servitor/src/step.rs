// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use jsend::{Data, Outcome};
use method_middleware::{Arguments, Error, Result};
use serde_json::Value;

use crate::service::{Attributes, Service, ServiceExt};
use crate::Instance;

type ServiceFn = fn(Arguments) -> Result<Outcome>;
type ComputeFn<S> = dyn Fn(&Instance<S>) -> Result<Value> + Send + Sync;

/// What a step runs.
#[derive(Clone, Debug)]
pub enum Action {
    /// Another service, called with the step's inputs as keyword arguments.
    Service {
        /// The name of the service.
        name: &'static str,
        /// Calls the service's `result`.
        result: ServiceFn,
        /// Calls the service's `try_result`.
        try_result: ServiceFn,
    },

    /// An instance method of the organizer returning an outcome. Its try variant is
    /// `try_<name>`.
    Method(String),
}

impl Action {
    /// The name of the service or of the method.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Service { name, .. } => name,
            Self::Method(name) => name.as_str(),
        }
    }
}

/// Where a step input comes from.
pub enum Input<S: Service> {
    /// An organizer attribute or an earlier step's output, passed under its own name.
    Name(String),

    /// An organizer attribute or an earlier step's output, passed as `param`.
    Alias {
        /// The keyword the step receives.
        param: String,
        /// The attribute or output to read.
        source: String,
    },

    /// A fixed value.
    Raw {
        /// The keyword the step receives.
        param: String,
        /// The value.
        value: Value,
    },

    /// A value computed from the organizer when the step runs.
    Computed {
        /// The keyword the step receives.
        param: String,
        /// Computes the value.
        compute: Arc<ComputeFn<S>>,
    },
}

impl<S: Service> Input<S> {
    /// The keyword the step receives the input as.
    #[must_use]
    pub fn param(&self) -> &str {
        match self {
            Self::Name(param) | Self::Alias { param, .. } | Self::Raw { param, .. } | Self::Computed { param, .. } => param,
        }
    }

    /// The attribute or output the input reads, if it reads one.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Name(source) | Self::Alias { source, .. } => Some(source),
            Self::Raw { .. } | Self::Computed { .. } => None,
        }
    }
}

impl<S: Service> Clone for Input<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Name(name) => Self::Name(name.clone()),
            Self::Alias { param, source } => Self::Alias {
                param: param.clone(),
                source: source.clone(),
            },
            Self::Raw { param, value } => Self::Raw {
                param: param.clone(),
                value: value.clone(),
            },
            Self::Computed { param, compute } => Self::Computed {
                param: param.clone(),
                compute: Arc::clone(compute),
            },
        }
    }
}

impl<S: Service> Debug for Input<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Alias { param, source } => f.debug_struct("Alias").field("param", param).field("source", source).finish(),
            Self::Raw { param, value } => f.debug_struct("Raw").field("param", param).field("value", value).finish(),
            Self::Computed { param, .. } => f.debug_struct("Computed").field("param", param).finish_non_exhaustive(),
        }
    }
}

/// A data key a step exposes to the organizer and to later steps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Output {
    /// The data key, exposed under its own name.
    Key(String),

    /// The data key `key`, exposed as `name`.
    Alias {
        /// The key in the step's result data.
        key: String,
        /// The name it is exposed as.
        name: String,
    },

    /// A raw value. Always rejected when the organizer is committed.
    Raw(Value),
}

impl Output {
    /// The name the output is exposed as.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Key(name) | Self::Alias { name, .. } => Some(name.as_str()),
            Self::Raw(_) => None,
        }
    }

    fn key(&self) -> Option<&str> {
        match self {
            Self::Key(key) | Self::Alias { key, .. } => Some(key.as_str()),
            Self::Raw(_) => None,
        }
    }
}

/// One unit of work of a pipeline: an action plus the data flowing in and out of it.
///
/// # Examples
///
/// ```
/// use jsend::Outcome;
/// use method_middleware::{Arguments, Result};
/// use servitor::{Service, Step};
///
/// #[derive(Debug)]
/// struct Greet;
///
/// impl Service for Greet {
///     fn new(_: &Arguments) -> Result<Self> {
///         Ok(Self)
///     }
/// }
///
/// #[derive(Debug)]
/// struct Welcome;
///
/// impl Service for Welcome {
///     fn new(_: &Arguments) -> Result<Self> {
///         Ok(Self)
///     }
/// }
///
/// let step = Step::<Welcome>::service::<Greet>().input_as("name", "login").out("greeting").tried();
///
/// assert_eq!(step.action().name(), "Greet");
/// assert!(step.is_tried());
/// ```
pub struct Step<S: Service> {
    index: usize,
    action: Action,
    inputs: Vec<Input<S>>,
    outputs: Vec<Output>,
    tried: bool,
}

impl<S: Service> Step<S> {
    /// A step calling the service `T`.
    #[must_use]
    pub fn service<T: Service>() -> Self {
        Self::new(Action::Service {
            name: T::name(),
            result: <T as ServiceExt>::call,
            try_result: <T as ServiceExt>::try_call,
        })
    }

    /// A step calling the organizer's instance method `name`.
    #[must_use]
    pub fn method(name: impl Into<String>) -> Self {
        Self::new(Action::Method(name.into()))
    }

    fn new(action: Action) -> Self {
        Self {
            index: 0,
            action,
            inputs: Vec::new(),
            outputs: Vec::new(),
            tried: false,
        }
    }

    /// Passes an attribute or earlier output under its own name.
    #[must_use]
    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(Input::Name(name.into()));
        self
    }

    /// Passes the attribute or earlier output `source` as `param`.
    #[must_use]
    pub fn input_as(mut self, param: impl Into<String>, source: impl Into<String>) -> Self {
        self.inputs.push(Input::Alias {
            param: param.into(),
            source: source.into(),
        });
        self
    }

    /// Passes a fixed value as `param`.
    #[must_use]
    pub fn input_raw(mut self, param: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.push(Input::Raw {
            param: param.into(),
            value: value.into(),
        });
        self
    }

    /// Passes a value computed from the organizer as `param`.
    #[must_use]
    pub fn input_with(
        mut self,
        param: impl Into<String>,
        compute: impl Fn(&Instance<S>) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.inputs.push(Input::Computed {
            param: param.into(),
            compute: Arc::new(compute),
        });
        self
    }

    /// Exposes the result data key `key`.
    #[must_use]
    pub fn out(mut self, key: impl Into<String>) -> Self {
        self.outputs.push(Output::Key(key.into()));
        self
    }

    /// Exposes the result data key `key` as `name`.
    #[must_use]
    pub fn out_as(mut self, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.outputs.push(Output::Alias {
            key: key.into(),
            name: name.into(),
        });
        self
    }

    /// Declares a raw value as an output. The organizer refuses to commit with it.
    #[must_use]
    pub fn out_raw(mut self, value: impl Into<Value>) -> Self {
        self.outputs.push(Output::Raw(value.into()));
        self
    }

    /// Falls back to the action's `try_result` when its `result` is not a success.
    #[must_use]
    pub const fn tried(mut self) -> Self {
        self.tried = true;
        self
    }

    /// The position of the step in its organizer, in declaration order.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    pub(crate) const fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// What the step runs.
    #[must_use]
    pub const fn action(&self) -> &Action {
        &self.action
    }

    /// The declared inputs.
    #[must_use]
    pub fn inputs(&self) -> &[Input<S>] {
        &self.inputs
    }

    /// The declared outputs.
    #[must_use]
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Returns `true` when the step falls back to `try_result`.
    #[must_use]
    pub const fn is_tried(&self) -> bool {
        self.tried
    }

    /// Returns `true` when the step exposes an output called `name`.
    #[must_use]
    pub fn exposes(&self, name: &str) -> bool {
        self.outputs.iter().any(|output| output.name() == Some(name))
    }

    /// Checks the outputs against the organizer, and that every input read names an attribute
    /// or one of `outputs`.
    pub(crate) fn define(&self, service: &str, attributes: &Attributes<S>, outputs: &HashSet<&str>) -> Result<()> {
        for output in &self.outputs {
            let Some(name) = output.name() else {
                return Err(Error::OutputMethodRawValue {
                    service: service.to_owned(),
                    step: self.index,
                });
            };

            if attributes.contains(name) {
                return Err(Error::OutputMethodIsDefinedInContainer {
                    service: service.to_owned(),
                    output: name.to_owned(),
                });
            }
        }

        for source in self.inputs.iter().filter_map(Input::source) {
            if !attributes.contains(source) && !outputs.contains(source) {
                return Err(Error::InputMethodIsNotDefinedInContainer {
                    service: service.to_owned(),
                    input: source.to_owned(),
                });
            }
        }

        Ok(())
    }

    /// Keeps only the declared outputs of a successful outcome.
    pub(crate) fn project(&self, service: &str, outcome: Outcome) -> Result<Outcome> {
        if self.outputs.is_empty() || !outcome.is_success() {
            return Ok(outcome);
        }

        let mut data = Data::new();
        for output in &self.outputs {
            let (Some(key), Some(name)) = (output.key(), output.name()) else {
                return Err(Error::OutputMethodRawValue {
                    service: service.to_owned(),
                    step: self.index,
                });
            };

            let value = outcome.data().get(key).cloned().ok_or_else(|| Error::StepResultDataNotExistingAttribute {
                service: service.to_owned(),
                step: self.index,
                key: key.to_owned(),
            })?;
            data.insert(name, value);
        }

        Ok(outcome.with_data(data))
    }
}

impl<S: Service> Debug for Step<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("index", &self.index)
            .field("action", &self.action)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("tried", &self.tried)
            .finish()
    }
}
