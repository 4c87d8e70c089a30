// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

use parking_lot::RwLock;

use crate::callbacks::CallbackCollection;
use crate::method::{BoundMethod, MethodTable};
use crate::stack::{Chain, Frames, Setup, Stack};
use crate::telemetry::DEFINE_EVENT;
use crate::{Arguments, Env, Error, Options, Result, Scope};

/// Dispatches the methods of one scope of a committed class.
///
/// Methods with a defined caller run through their middleware frames first; the last frame
/// calls the topmost implementation in the method table.
pub(crate) struct Dispatcher<R, O> {
    scope: Scope,
    table: MethodTable<R, O>,
    stacks: BTreeMap<String, Stack<R, O>>,
    callbacks: CallbackCollection<R, O>,
    callers: RwLock<BTreeMap<String, Frames<R, O>>>,
    options: Options,
}

impl<R, O> Dispatcher<R, O> {
    pub(crate) fn new(
        scope: Scope,
        table: MethodTable<R, O>,
        stacks: BTreeMap<String, Stack<R, O>>,
        callbacks: CallbackCollection<R, O>,
        options: Options,
    ) -> Self {
        Self {
            scope,
            table,
            stacks,
            callbacks,
            callers: RwLock::new(BTreeMap::new()),
            options,
        }
    }

    /// Defines the caller of every method with a declared stack.
    pub(crate) fn define_all(&self) -> Result<()> {
        for method in self.stacks.keys() {
            self.define(method)?;
        }

        Ok(())
    }

    pub(crate) fn define(&self, method: &str) -> Result<bool> {
        if self.callers.read().contains_key(method) {
            return Ok(false);
        }

        let empty = Arguments::null();
        let setup = Setup {
            class_name: self.table.class_name(),
            scope: self.scope,
            method,
            arguments: &empty,
            callbacks: &self.callbacks,
            options: &self.options,
        };

        let frames = match self.stacks.get(method) {
            Some(stack) => stack.build(&setup)?,
            None => Frames::from([]),
        };

        let mut callers = self.callers.write();
        if callers.contains_key(method) {
            return Ok(false);
        }

        if self.options.logs_enabled() {
            tracing::event!(
                name: DEFINE_EVENT,
                tracing::Level::TRACE,
                config.name = self.table.class_name(),
                scope = %self.scope,
                method,
                frames = frames.len(),
            );
        }

        callers.insert(method.to_owned(), frames);
        Ok(true)
    }

    pub(crate) fn undefine(&self, method: &str) -> bool {
        self.callers.write().remove(method).is_some()
    }

    pub(crate) fn responds_to(&self, method: &str) -> bool {
        self.table.contains(method) || self.callers.read().contains_key(method)
    }

    pub(crate) fn resolve_super_method<'a>(&'a self, receiver: &'a R, method: &'a str) -> Option<BoundMethod<'a, R, O>> {
        let top = self.table.top(method);
        top.exists().then(|| BoundMethod::new(receiver, top))
    }

    pub(crate) fn call(&self, receiver: &R, method: &str, arguments: Arguments) -> Result<O> {
        let frames = self.callers.read().get(method).cloned();

        match frames {
            Some(frames) => {
                let terminal = |receiver: &R, env: Env| self.table.top(env.method()).call(receiver, env.arguments());
                Chain::new(&frames, &terminal).next(receiver, Env::new(method, arguments))
            }
            None if self.table.contains(method) => self.table.top(method).call(receiver, &arguments),
            None => Err(Error::NoMethod {
                method: method.to_owned(),
                class: self.table.class_name().to_owned(),
            }),
        }
    }
}

impl<R, O> Debug for Dispatcher<R, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("scope", &self.scope)
            .field("table", &self.table)
            .field("callers", &self.callers.read().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
