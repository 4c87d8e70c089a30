// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Reusable bundles of methods and configuration.
//!
//! A [`Concern`] carries up to one `included` and one `prepended` hook plus sets of instance,
//! class and singleton class methods. When a class is committed, its concerns are mixed in:
//! dependencies first, then the hook runs against the class's declarations, then the concern's
//! methods become a layer of the method table. Mixing the same concern twice has no effect.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::config::{Declarations, Entity};
use crate::method::{Layer, Method};
use crate::{Error, Result};

type HookFn<E> = dyn Fn(&mut Declarations<E>) -> Result<()> + Send + Sync;

/// A closure configuring the class a concern is mixed into.
pub struct Hook<E: Entity>(Arc<HookFn<E>>);

impl<E: Entity> Hook<E> {
    /// Creates a hook.
    pub fn new(body: impl Fn(&mut Declarations<E>) -> Result<()> + Send + Sync + 'static) -> Self {
        Self(Arc::new(body))
    }

    fn run(&self, declarations: &mut Declarations<E>) -> Result<()> {
        (self.0)(declarations)
    }

    fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<E: Entity> Clone for Hook<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E: Entity> Debug for Hook<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Hook").finish_non_exhaustive()
    }
}

type InstanceMethods<E> = BTreeMap<String, Method<E, <E as Entity>::Output>>;
type ClassMethods<E> = BTreeMap<String, Method<<E as Entity>::Class, <E as Entity>::Output>>;

struct Parts<E: Entity> {
    name: String,
    dependencies: Vec<Concern<E>>,
    included: Option<Hook<E>>,
    prepended: Option<Hook<E>>,
    instance_methods: InstanceMethods<E>,
    class_methods: ClassMethods<E>,
    singleton_class_methods: ClassMethods<E>,
}

/// A named, immutable unit of composition. Cloning shares the concern.
///
/// # Examples
///
/// ```
/// use method_middleware::concern::{Concern, Hook};
/// use method_middleware::{Entity, Method};
///
/// #[derive(Debug)]
/// struct Greeter;
///
/// impl Entity for Greeter {
///     type Class = ();
///     type Output = String;
/// }
///
/// let polite = Concern::<Greeter>::builder("Polite")
///     .included(Hook::new(|declarations| {
///         declarations.before("greet", |_, _| Ok(()));
///         Ok(())
///     }))
///     .unwrap()
///     .instance_method("greet", Method::new(|_, _| Ok("good day".to_owned())))
///     .build()
///     .unwrap();
///
/// assert_eq!(polite.name(), "Polite");
/// ```
pub struct Concern<E: Entity>(Arc<Parts<E>>);

impl<E: Entity> Concern<E> {
    /// Starts building a concern with a name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ConcernBuilder<E> {
        ConcernBuilder {
            parts: Parts {
                name: name.into(),
                dependencies: Vec::new(),
                included: None,
                prepended: None,
                instance_methods: BTreeMap::new(),
                class_methods: BTreeMap::new(),
                singleton_class_methods: BTreeMap::new(),
            },
        }
    }

    /// Starts building a concern without a name. It may only carry hooks and dependencies.
    #[must_use]
    pub fn anonymous() -> ConcernBuilder<E> {
        Self::builder(String::new())
    }

    /// The name of the concern; empty for anonymous concerns.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The concerns mixed in before this one.
    pub fn dependencies(&self) -> impl Iterator<Item = &Self> {
        self.0.dependencies.iter()
    }

    /// Returns `true` when both handles refer to the same concern.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn display_name(&self) -> &str {
        if self.0.name.is_empty() { "<anonymous>" } else { &self.0.name }
    }
}

impl<E: Entity> Clone for Concern<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E: Entity> Debug for Concern<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Concern")
            .field("name", &self.display_name())
            .field("dependencies", &self.0.dependencies.iter().map(Self::display_name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builds a [`Concern`].
pub struct ConcernBuilder<E: Entity> {
    parts: Parts<E>,
}

impl<E: Entity> ConcernBuilder<E> {
    /// Mixes `concern` in before this one.
    #[must_use]
    pub fn depends_on(mut self, concern: &Concern<E>) -> Self {
        self.parts.dependencies.push(concern.clone());
        self
    }

    /// Sets the hook run when the concern is included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MultipleIncludedBlocks`] when a different hook is already set.
    pub fn included(mut self, hook: Hook<E>) -> Result<Self> {
        match &self.parts.included {
            Some(existing) if !existing.same_as(&hook) => Err(Error::MultipleIncludedBlocks {
                concern: self.parts.name.clone(),
            }),
            _ => {
                self.parts.included = Some(hook);
                Ok(self)
            }
        }
    }

    /// Sets the hook run when the concern is prepended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MultiplePrependBlocks`] when a different hook is already set.
    pub fn prepended(mut self, hook: Hook<E>) -> Result<Self> {
        match &self.parts.prepended {
            Some(existing) if !existing.same_as(&hook) => Err(Error::MultiplePrependBlocks {
                concern: self.parts.name.clone(),
            }),
            _ => {
                self.parts.prepended = Some(hook);
                Ok(self)
            }
        }
    }

    /// Adds an instance method.
    #[must_use]
    pub fn instance_method(mut self, name: impl Into<String>, method: Method<E, E::Output>) -> Self {
        self.parts.instance_methods.insert(name.into(), method);
        self
    }

    /// Adds a class method, placed below the class's own class methods when included.
    #[must_use]
    pub fn class_method(mut self, name: impl Into<String>, method: Method<E::Class, E::Output>) -> Self {
        self.parts.class_methods.insert(name.into(), method);
        self
    }

    /// Adds a class method placed above the class's own class methods.
    #[must_use]
    pub fn singleton_class_method(mut self, name: impl Into<String>, method: Method<E::Class, E::Output>) -> Self {
        self.parts.singleton_class_methods.insert(name.into(), method);
        self
    }

    /// Finishes the concern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NestingUnderAnonymousNamespace`] when an anonymous concern carries
    /// methods.
    pub fn build(self) -> Result<Concern<E>> {
        let parts = self.parts;
        let has_methods =
            !(parts.instance_methods.is_empty() && parts.class_methods.is_empty() && parts.singleton_class_methods.is_empty());

        if parts.name.is_empty() && has_methods {
            return Err(Error::NestingUnderAnonymousNamespace);
        }

        Ok(Concern(Arc::new(parts)))
    }
}

impl<E: Entity> Debug for ConcernBuilder<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcernBuilder").field("name", &self.parts.name).finish_non_exhaustive()
    }
}

/// How a concern is mixed into a class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inclusion {
    /// Below the class's own methods.
    Include,

    /// Above the class's own methods.
    Prepend,
}

/// The concerns a class declares, in declaration order.
pub struct ConcernStack<E: Entity> {
    entries: Vec<(Inclusion, Concern<E>)>,
}

impl<E: Entity> ConcernStack<E> {
    pub(crate) const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Includes a concern.
    pub fn include(&mut self, concern: &Concern<E>) -> &mut Self {
        self.entries.push((Inclusion::Include, concern.clone()));
        self
    }

    /// Prepends a concern.
    pub fn prepend(&mut self, concern: &Concern<E>) -> &mut Self {
        self.entries.push((Inclusion::Prepend, concern.clone()));
        self
    }

    /// The declared concerns.
    pub fn iter(&self) -> impl Iterator<Item = (Inclusion, &Concern<E>)> {
        self.entries.iter().map(|(inclusion, concern)| (*inclusion, concern))
    }

    /// The number of declared concerns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no concern is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get(&self, index: usize) -> Option<(Inclusion, Concern<E>)> {
        self.entries.get(index).map(|(inclusion, concern)| (*inclusion, concern.clone()))
    }
}

impl<E: Entity> Clone for ConcernStack<E> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<E: Entity> Debug for ConcernStack<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(inclusion, concern)| (inclusion, concern.display_name()))).finish()
    }
}

/// The concerns mixed into a class, in the order they were mixed in.
pub(crate) struct Composition<E: Entity> {
    mixed: Vec<(Inclusion, Concern<E>)>,
}

impl<E: Entity> Composition<E> {
    /// Mixes every declared concern into `declarations`.
    ///
    /// Hooks may declare more concerns; those are mixed in as well.
    pub(crate) fn compose(declarations: &mut Declarations<E>) -> Result<Self> {
        let mut composition = Self { mixed: Vec::new() };
        let mut index = 0;

        while let Some((inclusion, concern)) = declarations.concern_stack().get(index) {
            composition.mix(declarations, inclusion, &concern)?;
            index += 1;
        }

        Ok(composition)
    }

    fn mix(&mut self, declarations: &mut Declarations<E>, inclusion: Inclusion, concern: &Concern<E>) -> Result<()> {
        if self.contains(concern) {
            return Ok(());
        }

        for dependency in &concern.0.dependencies {
            self.mix(declarations, Inclusion::Include, dependency)?;
        }

        self.mixed.push((inclusion, concern.clone()));

        let hook = match inclusion {
            Inclusion::Include => concern.0.included.as_ref(),
            Inclusion::Prepend => concern.0.prepended.as_ref(),
        };

        match hook {
            Some(hook) => hook.run(declarations),
            None => Ok(()),
        }
    }

    fn contains(&self, concern: &Concern<E>) -> bool {
        self.mixed.iter().any(|(_, mixed)| mixed.same_as(concern))
    }

    fn named(&self, inclusion: Inclusion) -> impl DoubleEndedIterator<Item = &Concern<E>> {
        self.mixed
            .iter()
            .filter(move |(mixed_as, _)| *mixed_as == inclusion)
            .map(|(_, concern)| concern)
    }

    /// The names of the mixed concerns, in mix order.
    pub(crate) fn names(&self) -> Vec<String> {
        self.mixed.iter().map(|(_, concern)| concern.display_name().to_owned()).collect()
    }

    /// Instance method layers, closest first: prepended concerns, the class, included concerns.
    pub(crate) fn instance_layers(&self, class_name: &str, own: InstanceMethods<E>) -> Vec<Layer<E, E::Output>> {
        let layer = |concern: &Concern<E>| Layer::new(concern.display_name(), concern.0.instance_methods.clone());

        let mut layers: Vec<_> = self.named(Inclusion::Prepend).rev().map(layer).collect();
        layers.push(Layer::new(class_name, own));
        layers.extend(self.named(Inclusion::Include).rev().map(layer));
        layers
    }

    /// Class method layers, closest first: singleton class methods, prepended concerns, the
    /// class, included concerns.
    pub(crate) fn class_layers(&self, class_name: &str, own: ClassMethods<E>) -> Vec<Layer<E::Class, E::Output>> {
        let singleton = |concern: &Concern<E>| Layer::new(concern.display_name(), concern.0.singleton_class_methods.clone());
        let layer = |concern: &Concern<E>| Layer::new(concern.display_name(), concern.0.class_methods.clone());

        let mut layers: Vec<_> = self.mixed.iter().rev().map(|(_, concern)| singleton(concern)).collect();
        layers.extend(self.named(Inclusion::Prepend).rev().map(layer));
        layers.push(Layer::new(class_name, own));
        layers.extend(self.named(Inclusion::Include).rev().map(layer));
        layers
    }
}
