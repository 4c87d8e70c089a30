// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use crate::{Arguments, Error, Result};

/// Which side of a class a method lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// Methods called on instances.
    Instance,

    /// Methods called on the class itself.
    Class,
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Instance => "instance",
            Self::Class => "class",
        })
    }
}

/// The method being called and the arguments it is called with.
///
/// Middlewares receive the environment by value and pass it on, possibly changed, to the
/// next frame of the chain.
#[derive(Clone, Debug, PartialEq)]
pub struct Env {
    method: String,
    arguments: Arguments,
}

impl Env {
    /// Creates an environment for a call of `method`.
    #[must_use]
    pub fn new(method: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// The called method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The call's arguments.
    #[must_use]
    pub const fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Replaces the call's arguments.
    #[must_use]
    pub fn with_arguments(self, arguments: Arguments) -> Self {
        Self { arguments, ..self }
    }
}

type MethodBody<R, O> = dyn Fn(&R, &Arguments, SuperMethod<'_, R, O>) -> Result<O> + Send + Sync;

/// A method implementation: a shared closure over the receiver and the call's arguments.
///
/// Implementations created with [`Method::with_super`] can call the implementation they
/// override.
pub struct Method<R, O>(Arc<MethodBody<R, O>>);

impl<R: 'static, O: 'static> Method<R, O> {
    /// Creates a method that does not call `super`.
    pub fn new(body: impl Fn(&R, &Arguments) -> Result<O> + Send + Sync + 'static) -> Self {
        Self(Arc::new(move |receiver: &R, arguments: &Arguments, _: SuperMethod<'_, R, O>| {
            body(receiver, arguments)
        }))
    }

    /// Creates a method that receives the implementation it overrides.
    pub fn with_super(body: impl Fn(&R, &Arguments, SuperMethod<'_, R, O>) -> Result<O> + Send + Sync + 'static) -> Self {
        Self(Arc::new(body))
    }
}

impl<R, O> Method<R, O> {
    fn invoke(&self, receiver: &R, arguments: &Arguments, super_method: SuperMethod<'_, R, O>) -> Result<O> {
        (self.0)(receiver, arguments, super_method)
    }
}

impl<R, O> Clone for Method<R, O> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<R, O> Debug for Method<R, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Method").finish_non_exhaustive()
    }
}

/// A set of methods contributed by one owner: the class itself or one concern.
pub(crate) struct Layer<R, O> {
    pub(crate) owner: String,
    pub(crate) methods: BTreeMap<String, Method<R, O>>,
}

impl<R, O> Layer<R, O> {
    pub(crate) fn new(owner: impl Into<String>, methods: BTreeMap<String, Method<R, O>>) -> Self {
        Self {
            owner: owner.into(),
            methods,
        }
    }
}

/// The method lookup chain of one scope of a class, closest layer first.
pub(crate) struct MethodTable<R, O> {
    class_name: String,
    layers: Vec<Layer<R, O>>,
}

impl<R, O> MethodTable<R, O> {
    pub(crate) fn new(class_name: impl Into<String>, layers: Vec<Layer<R, O>>) -> Self {
        Self {
            class_name: class_name.into(),
            layers: layers.into_iter().filter(|layer| !layer.methods.is_empty()).collect(),
        }
    }

    pub(crate) fn class_name(&self) -> &str {
        &self.class_name
    }

    pub(crate) fn contains(&self, method: &str) -> bool {
        self.find(method, 0).is_some()
    }

    /// The closest implementation of `method` at or below layer `from`.
    fn find(&self, method: &str, from: usize) -> Option<(usize, &Layer<R, O>, &Method<R, O>)> {
        self.layers
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(index, layer)| layer.methods.get(method).map(|found| (index, layer, found)))
    }

    /// The topmost implementation of `method`, seen from the callers layer.
    pub(crate) fn top<'a>(&'a self, method: &'a str) -> SuperMethod<'a, R, O> {
        SuperMethod {
            table: self,
            method,
            from: 0,
        }
    }

    pub(crate) fn method_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().flat_map(|layer| layer.methods.keys().map(String::as_str))
    }
}

impl<R, O> Debug for MethodTable<R, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("class_name", &self.class_name)
            .field("owners", &self.layers.iter().map(|layer| layer.owner.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

/// The implementation a method overrides, resolved lazily through the method table.
pub struct SuperMethod<'a, R, O> {
    table: &'a MethodTable<R, O>,
    method: &'a str,
    from: usize,
}

impl<R, O> SuperMethod<'_, R, O> {
    /// Returns `true` when there is an implementation to call.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.table.find(self.method, self.from).is_some()
    }

    /// The owner of the implementation that would be called: a concern name or the class name.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.table.find(self.method, self.from).map(|(_, layer, _)| layer.owner.as_str())
    }

    /// Calls the implementation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuperMethod`] when nothing is below, or the error of the implementation.
    pub fn call(&self, receiver: &R, arguments: &Arguments) -> Result<O> {
        match self.table.find(self.method, self.from) {
            Some((index, _, method)) => method.invoke(
                receiver,
                arguments,
                SuperMethod {
                    table: self.table,
                    method: self.method,
                    from: index + 1,
                },
            ),
            None => Err(Error::NoSuperMethod {
                method: self.method.to_owned(),
                class: self.table.class_name().to_owned(),
            }),
        }
    }
}

impl<R, O> Clone for SuperMethod<'_, R, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, O> Copy for SuperMethod<'_, R, O> {}

impl<R, O> Debug for SuperMethod<'_, R, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuperMethod")
            .field("method", &self.method)
            .field("owner", &self.owner())
            .finish()
    }
}

/// A resolved implementation bound to its receiver.
pub struct BoundMethod<'a, R, O> {
    receiver: &'a R,
    method: SuperMethod<'a, R, O>,
}

impl<'a, R, O> BoundMethod<'a, R, O> {
    pub(crate) const fn new(receiver: &'a R, method: SuperMethod<'a, R, O>) -> Self {
        Self { receiver, method }
    }

    /// The owner of the bound implementation.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.method.owner()
    }

    /// Calls the bound implementation.
    ///
    /// # Errors
    ///
    /// Returns the error of the implementation.
    pub fn call(&self, arguments: &Arguments) -> Result<O> {
        self.method.call(self.receiver, arguments)
    }
}

impl<R, O> Debug for BoundMethod<'_, R, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundMethod").field("method", &self.method).finish_non_exhaustive()
    }
}
