// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! `before`, `after` and `around` callbacks for individual methods.
//!
//! Callbacks are declared per method name and run by the [`Callbacks`] middleware when the
//! method is dispatched:
//!
//! 1. `before` callbacks, in declaration order;
//! 2. `around` callbacks, nested so that the first declared one is the outermost;
//! 3. the method itself;
//! 4. `after` callbacks, in reverse declaration order.
//!
//! The value returned by the method is what the call returns; callbacks only observe it.

use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Display, Formatter};
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::stack::{Chain, Middleware, Setup};
use crate::{Arguments, Env, Error, Result};

/// When a callback runs relative to the wrapped method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before the method.
    Before,

    /// After the method, with its return value.
    After,

    /// Around the method, deciding when to continue.
    Around,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Around => "around",
        })
    }
}

type BeforeFn<R> = dyn Fn(&R, &Arguments) -> Result<()> + Send + Sync;
type AfterFn<R, O> = dyn Fn(&R, &O, &Arguments) -> Result<()> + Send + Sync;
type AroundFn<R, O> = dyn Fn(&R, AroundChain<'_, R, O>, &Arguments) -> Result<()> + Send + Sync;

enum Body<R, O> {
    Before(Arc<BeforeFn<R>>),
    After(Arc<AfterFn<R, O>>),
    Around(Arc<AroundFn<R, O>>),
}

impl<R, O> Body<R, O> {
    const fn phase(&self) -> Phase {
        match self {
            Self::Before(_) => Phase::Before,
            Self::After(_) => Phase::After,
            Self::Around(_) => Phase::Around,
        }
    }

    fn address(&self) -> *const () {
        match self {
            Self::Before(body) => Arc::as_ptr(body).cast::<()>(),
            Self::After(body) => Arc::as_ptr(body).cast::<()>(),
            Self::Around(body) => Arc::as_ptr(body).cast::<()>(),
        }
    }
}

/// A callback bound to one phase of one method.
///
/// Two callbacks are equal when they have the same phase, method, body and source location.
pub struct Callback<R, O> {
    method: String,
    body: Body<R, O>,
    location: &'static Location<'static>,
    called: AtomicBool,
}

impl<R, O> Callback<R, O> {
    /// Creates a callback that runs before `method`.
    #[track_caller]
    pub fn before(method: impl Into<String>, body: impl Fn(&R, &Arguments) -> Result<()> + Send + Sync + 'static) -> Self {
        Self::with_body(method.into(), Body::Before(Arc::new(body)))
    }

    /// Creates a callback that runs after `method` with its return value.
    #[track_caller]
    pub fn after(method: impl Into<String>, body: impl Fn(&R, &O, &Arguments) -> Result<()> + Send + Sync + 'static) -> Self {
        Self::with_body(method.into(), Body::After(Arc::new(body)))
    }

    /// Creates a callback that runs around `method`.
    ///
    /// The body must call [`AroundChain::call`] exactly once to continue.
    #[track_caller]
    pub fn around(
        method: impl Into<String>,
        body: impl Fn(&R, AroundChain<'_, R, O>, &Arguments) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self::with_body(method.into(), Body::Around(Arc::new(body)))
    }

    #[track_caller]
    fn with_body(method: String, body: Body<R, O>) -> Self {
        Self {
            method,
            body,
            location: Location::caller(),
            called: AtomicBool::new(false),
        }
    }

    /// The phase this callback runs in.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.body.phase()
    }

    /// The method this callback wraps.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Where the callback was declared.
    #[must_use]
    pub const fn source_location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Returns `true` once the callback ran at least once.
    #[must_use]
    pub fn is_called(&self) -> bool {
        self.called.load(Ordering::Relaxed)
    }

    fn mark_called(&self) {
        self.called.store(true, Ordering::Relaxed);
    }
}

impl<R, O> PartialEq for Callback<R, O> {
    fn eq(&self, other: &Self) -> bool {
        self.phase() == other.phase()
            && self.method == other.method
            && self.body.address() == other.body.address()
            && self.location == other.location
    }
}

impl<R, O> Debug for Callback<R, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback")
            .field("phase", &self.phase())
            .field("method", &self.method)
            .field("location", &self.location)
            .field("called", &self.is_called())
            .finish()
    }
}

/// The callbacks of one scope of a class, in declaration order.
pub struct CallbackCollection<R, O> {
    callbacks: Vec<Arc<Callback<R, O>>>,
}

impl<R, O> CallbackCollection<R, O> {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { callbacks: Vec::new() }
    }

    /// Appends a callback.
    pub fn push(&mut self, callback: Callback<R, O>) {
        self.callbacks.push(Arc::new(callback));
    }

    /// The callbacks for `method` in `phase`, in declaration order.
    pub fn for_types<'a>(&'a self, phase: Phase, method: &'a str) -> impl Iterator<Item = &'a Arc<Callback<R, O>>> {
        self.callbacks
            .iter()
            .filter(move |callback| callback.phase() == phase && callback.method == method)
    }

    /// All callbacks, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Callback<R, O>>> {
        self.callbacks.iter()
    }

    /// The number of callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Returns `true` when there are no callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl<R, O> Default for CallbackCollection<R, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, O> Clone for CallbackCollection<R, O> {
    fn clone(&self) -> Self {
        Self {
            callbacks: self.callbacks.clone(),
        }
    }
}

impl<R, O> Debug for CallbackCollection<R, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.callbacks).finish()
    }
}

struct AroundState<O> {
    value: RefCell<Option<O>>,
    last_called: Cell<Option<&'static Location<'static>>>,
}

/// The rest of an `around` chain, handed to each `around` callback.
pub struct AroundChain<'a, R, O> {
    method: &'a str,
    rest: &'a [Arc<Callback<R, O>>],
    innermost: &'a dyn Fn(&R) -> Result<O>,
    arguments: &'a Arguments,
    state: &'a AroundState<O>,
}

impl<R, O: Clone> AroundChain<'_, R, O> {
    /// Runs the next `around` callback, or the method itself when none is left.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AroundCallbackChainIsNotContinued`] when a callback further down did
    /// not continue, or the error of the method.
    pub fn call(&self, receiver: &R) -> Result<O> {
        let Some((callback, rest)) = self.rest.split_first() else {
            let value = (self.innermost)(receiver)?;
            *self.state.value.borrow_mut() = Some(value.clone());
            return Ok(value);
        };

        let Body::Around(body) = &callback.body else {
            return AroundChain { rest, ..*self }.call(receiver);
        };

        callback.mark_called();
        self.state.last_called.set(Some(callback.location));
        body(receiver, AroundChain { rest, ..*self }, self.arguments)?;

        self.state.value.borrow().clone().ok_or_else(|| Error::AroundCallbackChainIsNotContinued {
            method: self.method.to_owned(),
            location: self.state.last_called.get().unwrap_or(callback.location),
        })
    }
}

impl<R, O> Clone for AroundChain<'_, R, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, O> Copy for AroundChain<'_, R, O> {}

impl<R, O> Debug for AroundChain<'_, R, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AroundChain")
            .field("method", &self.method)
            .field("remaining", &self.rest.len())
            .finish_non_exhaustive()
    }
}

/// A middleware running the callbacks declared for the method it wraps.
pub struct Callbacks<R, O> {
    before: Vec<Arc<Callback<R, O>>>,
    around: Vec<Arc<Callback<R, O>>>,
    after: Vec<Arc<Callback<R, O>>>,
}

impl<R, O> Callbacks<R, O> {
    /// Selects the callbacks of `method` from `collection`.
    #[must_use]
    pub fn new(collection: &CallbackCollection<R, O>, method: &str) -> Self {
        let select = |phase| collection.for_types(phase, method).map(Arc::clone).collect();

        Self {
            before: select(Phase::Before),
            around: select(Phase::Around),
            after: select(Phase::After),
        }
    }

    /// Selects the callbacks of the method a stack is built for.
    #[must_use]
    pub fn from_setup(setup: &Setup<'_, R, O>) -> Self {
        Self::new(setup.callbacks(), setup.method())
    }
}

impl<R, O> Middleware<R, O> for Callbacks<R, O>
where
    R: Send + Sync,
    O: Clone + Send + Sync,
{
    fn call(&self, receiver: &R, env: Env, chain: Chain<'_, R, O>) -> Result<O> {
        let arguments = env.arguments().clone();

        for callback in &self.before {
            if let Body::Before(body) = &callback.body {
                callback.mark_called();
                body(receiver, &arguments)?;
            }
        }

        let value = if self.around.is_empty() {
            chain.next(receiver, env)?
        } else {
            let innermost = |receiver: &R| chain.next(receiver, env.clone());
            let state = AroundState {
                value: RefCell::new(None),
                last_called: Cell::new(None),
            };

            AroundChain {
                method: env.method(),
                rest: &self.around,
                innermost: &innermost,
                arguments: &arguments,
                state: &state,
            }
            .call(receiver)?
        };

        for callback in self.after.iter().rev() {
            if let Body::After(body) = &callback.body {
                callback.mark_called();
                body(receiver, &value, &arguments)?;
            }
        }

        Ok(value)
    }
}

impl<R, O> Debug for Callbacks<R, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("before", &self.before.len())
            .field("around", &self.around.len())
            .field("after", &self.after.len())
            .finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Callback<(), String>: Send, Sync, Debug);
        static_assertions::assert_impl_all!(CallbackCollection<(), String>: Send, Sync, Debug, Clone);
        static_assertions::assert_impl_all!(Callbacks<(), String>: Send, Sync, Debug);
    }

    #[test]
    fn for_types_filters_by_phase_and_method() {
        let mut collection: CallbackCollection<(), String> = CallbackCollection::new();
        collection.push(Callback::before("result", |_, _| Ok(())));
        collection.push(Callback::after("result", |_, _, _| Ok(())));
        collection.push(Callback::before("call", |_, _| Ok(())));
        collection.push(Callback::before("result", |_, _| Ok(())));

        let before_result: Vec<_> = collection.for_types(Phase::Before, "result").collect();

        assert_eq!(before_result.len(), 2);
        assert!(before_result.iter().all(|callback| callback.method() == "result"));
        assert_eq!(collection.for_types(Phase::Around, "result").count(), 0);
        assert_eq!(collection.len(), 4);
    }

    #[test]
    fn identity_includes_location() {
        let first: Callback<(), String> = Callback::before("result", |_, _| Ok(()));
        let second: Callback<(), String> = Callback::before("result", |_, _| Ok(()));

        assert_eq!(first, first);
        assert_ne!(first, second);
        assert_eq!(first.source_location().file(), file!());
    }

    #[test]
    fn callbacks_start_uncalled() {
        let callback: Callback<(), String> = Callback::after("result", |_, _, _| Ok(()));

        assert!(!callback.is_called());
        assert_eq!(callback.phase(), Phase::After);
        assert_eq!(callback.phase().to_string(), "after");
    }
}
