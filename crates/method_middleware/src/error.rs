// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::panic::Location;

use crate::Trigger;

/// The result for fallible operations that use the [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// An error raised while declaring, committing or dispatching methods.
///
/// Business failures are never reported through this type; they are values returned by the
/// methods themselves. Errors here mean the configuration or the call protocol was violated,
/// with the exception of [`Error::Other`], which carries errors raised by user code.
///
/// # Examples
///
/// ```
/// use method_middleware::Error;
///
/// let error = Error::NoSuperMethod {
///     method: "result".to_owned(),
///     class: "Greeter".to_owned(),
/// };
///
/// assert_eq!(error.to_string(), "super: no superclass method `result' for Greeter");
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Dispatch tried to commit the config implicitly more often than allowed.
    #[error(
        "`{config}` tried to commit its config more than {max} times from {trigger}; call `commit_config` on it before use"
    )]
    TooManyCommitsFromMethodMissing {
        /// The name of the config.
        config: String,
        /// Where the commit attempts came from.
        trigger: Trigger,
        /// The configured maximum.
        max: usize,
    },

    /// A second, different `included` hook was set on a concern.
    #[error("concern `{concern}` already has an `included` hook; merge both into one")]
    MultipleIncludedBlocks {
        /// The name of the concern.
        concern: String,
    },

    /// A second, different `prepended` hook was set on a concern.
    #[error("concern `{concern}` already has a `prepended` hook; merge both into one")]
    MultiplePrependBlocks {
        /// The name of the concern.
        concern: String,
    },

    /// A concern without a name defines nested method sets.
    #[error("a concern without a name cannot define instance, class or singleton class methods; give it a name")]
    NestingUnderAnonymousNamespace,

    /// The config was changed after it was committed.
    #[error("config of `{config}` is already committed and cannot be changed")]
    ConfigAlreadyCommitted {
        /// The name of the config.
        config: String,
    },

    /// An `around` callback returned without continuing the chain.
    #[error("around callback for `{method}` declared at {location} did not call `chain.call`")]
    AroundCallbackChainIsNotContinued {
        /// The wrapped method.
        method: String,
        /// Where the callback was declared.
        location: &'static Location<'static>,
    },

    /// A method that nothing defines was called.
    #[error("undefined method `{method}' for {class}")]
    NoMethod {
        /// The called method.
        method: String,
        /// The name of the receiver's class.
        class: String,
    },

    /// `super` was called with nothing below the caller.
    #[error("super: no superclass method `{method}' for {class}")]
    NoSuperMethod {
        /// The called method.
        method: String,
        /// The name of the receiver's class.
        class: String,
    },

    /// A step declares an output its result data does not have.
    #[error("step {step} of `{service}` declares output `{key}`, which its result data does not have")]
    StepResultDataNotExistingAttribute {
        /// The organizer.
        service: String,
        /// The index of the step.
        step: usize,
        /// The missing data key.
        key: String,
    },

    /// A raw value was used where an output name is expected.
    #[error("step {step} of `{service}` uses a raw value as an output; outputs must be names")]
    OutputMethodRawValue {
        /// The organizer.
        service: String,
        /// The index of the step.
        step: usize,
    },

    /// A step input is neither an organizer attribute nor a previous step's output.
    #[error("input `{input}` is neither an attribute of `{service}` nor an output of an earlier step")]
    InputMethodIsNotDefinedInContainer {
        /// The organizer.
        service: String,
        /// The unresolved input.
        input: String,
    },

    /// A step output shadows an organizer attribute.
    #[error("output `{output}` is already an attribute of `{service}`; alias it with `out_as`")]
    OutputMethodIsDefinedInContainer {
        /// The organizer.
        service: String,
        /// The colliding output.
        output: String,
    },

    /// A step output was read before its step ran.
    #[error("output `{output}` of `{service}` is read before its step ran")]
    StepOutputIsNotComputed {
        /// The organizer.
        service: String,
        /// The output that was read.
        output: String,
    },

    /// A step index that the organizer does not declare.
    #[error("`{service}` has no step {step}")]
    StepIsNotDefined {
        /// The organizer.
        service: String,
        /// The requested index.
        step: usize,
    },

    /// A service has neither steps nor its own `result`.
    #[error("`{service}` has no steps; implement `Service::result` or declare steps")]
    ResultIsNotOverridden {
        /// The service.
        service: String,
    },

    /// A service is run as a `try` step without its own `try_result`.
    #[error("`{service}` is used as a try step; implement `Service::try_result`")]
    TryResultIsNotOverridden {
        /// The service.
        service: String,
    },

    /// An error raised by user code.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Wraps an error raised by user code.
    pub fn other(error: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Other(error.into())
    }
}
