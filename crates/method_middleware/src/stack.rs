// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-method middleware stacks.
//!
//! A [`Stack`] is an ordered list of middleware creators declared for one method of one
//! scope of a class. When the class is committed, each creator is turned into a
//! [`Middleware`] and the resulting frames are shared by every call of the method. The first
//! declared middleware is the outermost; the method itself is the innermost frame.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::callbacks::{CallbackCollection, Callbacks};
use crate::{Arguments, Env, Options, Result, Scope};

/// A wrapper around a method call.
///
/// Implementations call [`Chain::next`] to continue with the next frame and may change the
/// environment or the returned value on the way.
///
/// # Examples
///
/// ```
/// use method_middleware::stack::{Chain, Middleware};
/// use method_middleware::{Env, Result};
///
/// #[derive(Debug)]
/// struct Shout;
///
/// impl Middleware<(), String> for Shout {
///     fn call(&self, receiver: &(), env: Env, chain: Chain<'_, (), String>) -> Result<String> {
///         Ok(chain.next(receiver, env)?.to_uppercase())
///     }
/// }
/// ```
pub trait Middleware<R, O>: Send + Sync {
    /// Handles one call.
    ///
    /// # Errors
    ///
    /// Returns the error of the rest of the chain, or one raised by the middleware.
    fn call(&self, receiver: &R, env: Env, chain: Chain<'_, R, O>) -> Result<O>;
}

/// A middleware made of a closure.
pub struct MiddlewareFn<F>(F);

impl<F> MiddlewareFn<F> {
    /// Wraps a closure.
    pub const fn new<R, O>(body: F) -> Self
    where
        F: Fn(&R, Env, Chain<'_, R, O>) -> Result<O> + Send + Sync,
    {
        Self(body)
    }
}

impl<R, O, F> Middleware<R, O> for MiddlewareFn<F>
where
    F: Fn(&R, Env, Chain<'_, R, O>) -> Result<O> + Send + Sync,
{
    fn call(&self, receiver: &R, env: Env, chain: Chain<'_, R, O>) -> Result<O> {
        (self.0)(receiver, env, chain)
    }
}

impl<F> Debug for MiddlewareFn<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MiddlewareFn").finish_non_exhaustive()
    }
}

pub(crate) type Frames<R, O> = Arc<[Arc<dyn Middleware<R, O>>]>;

/// The remaining frames of one call.
///
/// Each call gets its own cursor over the shared frames; the last frame is the method.
pub struct Chain<'a, R, O> {
    frames: &'a [Arc<dyn Middleware<R, O>>],
    terminal: &'a dyn Fn(&R, Env) -> Result<O>,
}

impl<'a, R, O> Chain<'a, R, O> {
    /// Creates a chain over `frames` ending in `terminal`.
    pub fn new(frames: &'a [Arc<dyn Middleware<R, O>>], terminal: &'a dyn Fn(&R, Env) -> Result<O>) -> Self {
        Self { frames, terminal }
    }

    /// Continues with the next frame.
    ///
    /// # Errors
    ///
    /// Returns the error of the rest of the chain.
    pub fn next(self, receiver: &R, env: Env) -> Result<O> {
        match self.frames.split_first() {
            Some((frame, frames)) => frame.call(
                receiver,
                env,
                Chain {
                    frames,
                    terminal: self.terminal,
                },
            ),
            None => (self.terminal)(receiver, env),
        }
    }

    /// The number of frames left before the method.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl<R, O> Clone for Chain<'_, R, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, O> Copy for Chain<'_, R, O> {}

impl<R, O> Debug for Chain<'_, R, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("remaining", &self.frames.len()).finish_non_exhaustive()
    }
}

/// What a middleware factory knows about the method it builds a middleware for.
pub struct Setup<'a, R, O> {
    pub(crate) class_name: &'a str,
    pub(crate) scope: Scope,
    pub(crate) method: &'a str,
    pub(crate) arguments: &'a Arguments,
    pub(crate) callbacks: &'a CallbackCollection<R, O>,
    pub(crate) options: &'a Options,
}

impl<'a, R, O> Setup<'a, R, O> {
    /// The name of the class owning the method.
    #[must_use]
    pub const fn class_name(&self) -> &'a str {
        self.class_name
    }

    /// The scope of the method.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// The wrapped method.
    #[must_use]
    pub const fn method(&self) -> &'a str {
        self.method
    }

    /// The arguments bound with [`Stack::use_with`]; empty otherwise.
    #[must_use]
    pub const fn arguments(&self) -> &'a Arguments {
        self.arguments
    }

    /// The callbacks declared in the method's scope.
    #[must_use]
    pub const fn callbacks(&self) -> &'a CallbackCollection<R, O> {
        self.callbacks
    }

    /// The options of the class.
    #[must_use]
    pub const fn options(&self) -> &'a Options {
        self.options
    }

    fn with_arguments(&self, arguments: &'a Arguments) -> Self {
        Self {
            class_name: self.class_name,
            scope: self.scope,
            method: self.method,
            arguments,
            callbacks: self.callbacks,
            options: self.options,
        }
    }
}

impl<R, O> Debug for Setup<'_, R, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Setup")
            .field("class_name", &self.class_name)
            .field("scope", &self.scope)
            .field("method", &self.method)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

type Factory<R, O> = dyn Fn(&Setup<'_, R, O>) -> Result<Arc<dyn Middleware<R, O>>> + Send + Sync;

struct Creator<R, O> {
    arguments: Arguments,
    factory: Arc<Factory<R, O>>,
}

impl<R, O> Clone for Creator<R, O> {
    fn clone(&self) -> Self {
        Self {
            arguments: self.arguments.clone(),
            factory: Arc::clone(&self.factory),
        }
    }
}

/// The ordered middleware creators of one method.
///
/// Declarations are additive: configuring the same method again appends to its stack.
///
/// # Examples
///
/// ```
/// use method_middleware::stack::Stack;
///
/// let mut stack: Stack<(), String> = Stack::new();
/// stack.use_fn(|receiver, env, chain| Ok(format!("[{}]", chain.next(receiver, env)?)));
/// let observations = stack.observe();
///
/// assert_eq!(stack.len(), 2);
/// assert!(observations.is_empty());
/// ```
pub struct Stack<R, O> {
    creators: Vec<Creator<R, O>>,
}

impl<R: 'static, O: 'static> Stack<R, O> {
    /// Creates an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self { creators: Vec::new() }
    }

    /// Appends a middleware shared by every call.
    pub fn use_middleware(&mut self, middleware: impl Middleware<R, O> + 'static) -> &mut Self {
        let middleware: Arc<dyn Middleware<R, O>> = Arc::new(middleware);
        self.use_factory(move |_| Ok(Arc::clone(&middleware)))
    }

    /// Appends a middleware made of a closure.
    pub fn use_fn(&mut self, body: impl Fn(&R, Env, Chain<'_, R, O>) -> Result<O> + Send + Sync + 'static) -> &mut Self {
        self.use_middleware(MiddlewareFn(body))
    }

    /// Appends a middleware built when the class is committed.
    pub fn use_factory(
        &mut self,
        factory: impl Fn(&Setup<'_, R, O>) -> Result<Arc<dyn Middleware<R, O>>> + Send + Sync + 'static,
    ) -> &mut Self {
        self.use_with(Arguments::null(), factory)
    }

    /// Appends a middleware built with bound arguments, available through [`Setup::arguments`].
    pub fn use_with(
        &mut self,
        arguments: Arguments,
        factory: impl Fn(&Setup<'_, R, O>) -> Result<Arc<dyn Middleware<R, O>>> + Send + Sync + 'static,
    ) -> &mut Self {
        self.creators.push(Creator {
            arguments,
            factory: Arc::new(factory),
        });
        self
    }

    /// Appends the middleware running the method's callbacks.
    pub fn use_callbacks(&mut self) -> &mut Self
    where
        R: Send + Sync,
        O: Clone + Send + Sync,
    {
        self.use_factory(|setup| {
            let callbacks: Arc<dyn Middleware<R, O>> = Arc::new(Callbacks::from_setup(setup));
            Ok(callbacks)
        })
    }

    /// Appends a middleware recording every call that reaches it.
    pub fn observe(&mut self) -> Observations {
        let observations = Observations::default();
        self.use_middleware(Observe {
            observations: observations.clone(),
        });
        observations
    }
}

impl<R, O> Stack<R, O> {
    /// The number of creators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.creators.len()
    }

    /// Returns `true` when nothing was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }

    pub(crate) fn build(&self, setup: &Setup<'_, R, O>) -> Result<Frames<R, O>> {
        self.creators
            .iter()
            .map(|creator| (creator.factory)(&setup.with_arguments(&creator.arguments)))
            .collect()
    }
}

impl<R: 'static, O: 'static> Default for Stack<R, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, O> Clone for Stack<R, O> {
    fn clone(&self) -> Self {
        Self {
            creators: self.creators.clone(),
        }
    }
}

impl<R, O> Debug for Stack<R, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack").field("len", &self.creators.len()).finish()
    }
}

/// The calls recorded by an observing middleware, shared with the stack it was added to.
#[derive(Clone, Debug, Default)]
pub struct Observations(Arc<Mutex<Vec<Env>>>);

impl Observations {
    /// Every recorded call, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<Env> {
        self.0.lock().clone()
    }

    /// The most recent call.
    #[must_use]
    pub fn last(&self) -> Option<Env> {
        self.0.lock().last().cloned()
    }

    /// The number of recorded calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Returns `true` when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// A middleware recording the method and arguments of each call before passing it on.
#[derive(Debug)]
pub struct Observe {
    observations: Observations,
}

impl Observe {
    /// Creates a middleware recording into `observations`.
    #[must_use]
    pub const fn new(observations: Observations) -> Self {
        Self { observations }
    }
}

impl<R, O> Middleware<R, O> for Observe {
    fn call(&self, receiver: &R, env: Env, chain: Chain<'_, R, O>) -> Result<O> {
        self.observations.0.lock().push(env.clone());
        chain.next(receiver, env)
    }
}
