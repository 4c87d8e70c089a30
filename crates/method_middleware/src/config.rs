// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

use crate::callbacks::{AroundChain, Callback, CallbackCollection};
use crate::concern::{Composition, ConcernStack};
use crate::dispatch::Dispatcher;
use crate::method::{BoundMethod, Method, MethodTable, SuperMethod};
use crate::stack::Stack;
use crate::telemetry::{AUTO_COMMIT_EVENT, COMMIT_EVENT};
use crate::{Arguments, Error, Result, Scope};

pub(crate) const DEFAULT_MAX_AUTO_COMMITS: usize = 10;

/// A type whose methods are dispatched through a [`Config`].
///
/// Instance methods receive `&Self`, class methods receive `&Self::Class`. Every method of
/// both scopes returns `Self::Output`.
pub trait Entity: Send + Sync + 'static {
    /// The receiver of class methods.
    type Class: Send + Sync + 'static;

    /// The value every method returns.
    type Output: Clone + Send + Sync + 'static;
}

/// Options of a [`Config`].
///
/// # Examples
///
/// ```
/// use method_middleware::Options;
///
/// let options = Options::new().max_auto_commits(3).use_logs();
///
/// assert_eq!(options.auto_commit_limit(), 3);
/// assert!(options.logs_enabled());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    max_auto_commits: usize,
    logs_enabled: bool,
}

impl Options {
    /// Default options: at most 10 implicit commits per trigger, no logs.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_auto_commits: DEFAULT_MAX_AUTO_COMMITS,
            logs_enabled: false,
        }
    }

    /// Sets how often dispatch may run into a commit in progress on its own thread, per
    /// trigger, before failing with [`Error::TooManyCommitsFromMethodMissing`].
    #[must_use]
    pub const fn max_auto_commits(self, max: usize) -> Self {
        Self {
            max_auto_commits: max,
            ..self
        }
    }

    /// Enables structured logging of commits and dispatch events.
    #[must_use]
    pub const fn use_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }

    /// How often dispatch may try to commit implicitly, per trigger.
    #[must_use]
    pub const fn auto_commit_limit(&self) -> usize {
        self.max_auto_commits
    }

    /// Returns `true` when logging is enabled.
    #[must_use]
    pub const fn logs_enabled(&self) -> bool {
        self.logs_enabled
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

/// What caused a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// An explicit `commit_config`.
    User,

    /// Dispatch of an instance method on an uncommitted config.
    InstanceMethodMissing,

    /// Dispatch of a class method on an uncommitted config.
    ClassMethodMissing,
}

impl Display for Trigger {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::InstanceMethodMissing => "instance_method_missing",
            Self::ClassMethodMissing => "class_method_missing",
        })
    }
}

/// Methods, middleware stacks and callbacks declared for one scope of a class.
pub struct ScopeDeclarations<R, O> {
    methods: BTreeMap<String, Method<R, O>>,
    stacks: BTreeMap<String, Stack<R, O>>,
    callbacks: CallbackCollection<R, O>,
}

impl<R: 'static, O: 'static> ScopeDeclarations<R, O> {
    fn new() -> Self {
        Self {
            methods: BTreeMap::new(),
            stacks: BTreeMap::new(),
            callbacks: CallbackCollection::new(),
        }
    }

    /// Defines a method, replacing an earlier definition of the same name.
    pub fn define_method(&mut self, name: impl Into<String>, method: Method<R, O>) -> &mut Self {
        self.methods.insert(name.into(), method);
        self
    }

    /// Defines a method from a closure.
    pub fn method(&mut self, name: impl Into<String>, body: impl Fn(&R, &Arguments) -> Result<O> + Send + Sync + 'static) -> &mut Self {
        self.define_method(name, Method::new(body))
    }

    /// Appends to the middleware stack of a method.
    pub fn middlewares(&mut self, name: impl Into<String>, configure: impl FnOnce(&mut Stack<R, O>)) -> &mut Self {
        configure(self.stacks.entry(name.into()).or_default());
        self
    }

    /// Declares a callback running before a method.
    #[track_caller]
    pub fn before(&mut self, name: impl Into<String>, body: impl Fn(&R, &Arguments) -> Result<()> + Send + Sync + 'static) -> &mut Self {
        self.callbacks.push(Callback::before(name, body));
        self
    }

    /// Declares a callback running after a method.
    #[track_caller]
    pub fn after(&mut self, name: impl Into<String>, body: impl Fn(&R, &O, &Arguments) -> Result<()> + Send + Sync + 'static) -> &mut Self {
        self.callbacks.push(Callback::after(name, body));
        self
    }

    /// Declares a callback running around a method.
    #[track_caller]
    pub fn around(
        &mut self,
        name: impl Into<String>,
        body: impl Fn(&R, AroundChain<'_, R, O>, &Arguments) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.callbacks.push(Callback::around(name, body));
        self
    }
}

impl<R, O> ScopeDeclarations<R, O> {
    /// Returns `true` when the class itself defines `name`.
    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// The middleware stack of a method, if one was declared.
    #[must_use]
    pub fn stack(&self, name: &str) -> Option<&Stack<R, O>> {
        self.stacks.get(name)
    }

    /// The callbacks declared so far.
    #[must_use]
    pub const fn callbacks(&self) -> &CallbackCollection<R, O> {
        &self.callbacks
    }
}

impl<R, O> Clone for ScopeDeclarations<R, O> {
    fn clone(&self) -> Self {
        Self {
            methods: self.methods.clone(),
            stacks: self.stacks.clone(),
            callbacks: self.callbacks.clone(),
        }
    }
}

impl<R, O> Debug for ScopeDeclarations<R, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeDeclarations")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("stacks", &self.stacks)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

/// Everything a class declares before it is committed.
///
/// The shortcuts on this type declare in the instance scope; use [`Declarations::class`] for
/// class methods.
pub struct Declarations<E: Entity> {
    instance: ScopeDeclarations<E, E::Output>,
    class: ScopeDeclarations<E::Class, E::Output>,
    concerns: ConcernStack<E>,
}

impl<E: Entity> Declarations<E> {
    /// Creates empty declarations.
    #[must_use]
    pub fn new() -> Self {
        Self {
            instance: ScopeDeclarations::new(),
            class: ScopeDeclarations::new(),
            concerns: ConcernStack::new(),
        }
    }

    /// Declarations of instance methods.
    pub const fn instance(&mut self) -> &mut ScopeDeclarations<E, E::Output> {
        &mut self.instance
    }

    /// Declarations of class methods.
    pub const fn class(&mut self) -> &mut ScopeDeclarations<E::Class, E::Output> {
        &mut self.class
    }

    /// Declares concerns to mix in at commit.
    pub fn concerns(&mut self, configure: impl FnOnce(&mut ConcernStack<E>)) -> &mut Self {
        configure(&mut self.concerns);
        self
    }

    /// Defines an instance method from a closure.
    pub fn define_method(
        &mut self,
        name: impl Into<String>,
        body: impl Fn(&E, &Arguments) -> Result<E::Output> + Send + Sync + 'static,
    ) -> &mut Self {
        self.instance.method(name, body);
        self
    }

    /// Defines an instance method that can call the implementation it overrides.
    pub fn define_method_with_super(
        &mut self,
        name: impl Into<String>,
        body: impl Fn(&E, &Arguments, SuperMethod<'_, E, E::Output>) -> Result<E::Output> + Send + Sync + 'static,
    ) -> &mut Self {
        self.instance.define_method(name, Method::with_super(body));
        self
    }

    /// Defines a class method from a closure.
    pub fn define_class_method(
        &mut self,
        name: impl Into<String>,
        body: impl Fn(&E::Class, &Arguments) -> Result<E::Output> + Send + Sync + 'static,
    ) -> &mut Self {
        self.class.method(name, body);
        self
    }

    /// Appends to the middleware stack of an instance method.
    pub fn middlewares(&mut self, name: impl Into<String>, configure: impl FnOnce(&mut Stack<E, E::Output>)) -> &mut Self {
        self.instance.middlewares(name, configure);
        self
    }

    /// Appends to the middleware stack of a class method.
    pub fn class_middlewares(
        &mut self,
        name: impl Into<String>,
        configure: impl FnOnce(&mut Stack<E::Class, E::Output>),
    ) -> &mut Self {
        self.class.middlewares(name, configure);
        self
    }

    /// Declares a callback running before an instance method.
    #[track_caller]
    pub fn before(&mut self, name: impl Into<String>, body: impl Fn(&E, &Arguments) -> Result<()> + Send + Sync + 'static) -> &mut Self {
        self.instance.before(name, body);
        self
    }

    /// Declares a callback running after an instance method.
    #[track_caller]
    pub fn after(
        &mut self,
        name: impl Into<String>,
        body: impl Fn(&E, &E::Output, &Arguments) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.instance.after(name, body);
        self
    }

    /// Declares a callback running around an instance method.
    #[track_caller]
    pub fn around(
        &mut self,
        name: impl Into<String>,
        body: impl Fn(&E, AroundChain<'_, E, E::Output>, &Arguments) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.instance.around(name, body);
        self
    }

    pub(crate) const fn concern_stack(&self) -> &ConcernStack<E> {
        &self.concerns
    }
}

impl<E: Entity> Default for Declarations<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Clone for Declarations<E> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance.clone(),
            class: self.class.clone(),
            concerns: self.concerns.clone(),
        }
    }
}

impl<E: Entity> Debug for Declarations<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Declarations")
            .field("instance", &self.instance)
            .field("class", &self.class)
            .field("concerns", &self.concerns)
            .finish()
    }
}

enum State<E: Entity> {
    Pending(Box<Declarations<E>>),
    Committing(ThreadId),
    Committed,
}

struct Compiled<E: Entity> {
    instance: Dispatcher<E, E::Output>,
    class: Dispatcher<E::Class, E::Output>,
    concerns: Vec<String>,
}

/// The configuration of one class: its declarations until commit, its dispatchers after.
///
/// Committing mixes in the concerns, layers the method tables and builds every declared
/// middleware stack. It happens exactly once, either explicitly through [`Config::commit`]
/// or implicitly on the first dispatch. When several threads commit at once, one commits
/// and the others wait for it.
///
/// # Examples
///
/// ```
/// use method_middleware::{Arguments, Config, Entity, Options};
///
/// #[derive(Debug)]
/// struct Greeter;
///
/// impl Entity for Greeter {
///     type Class = ();
///     type Output = String;
/// }
///
/// let config = Config::<Greeter>::new("Greeter", Options::new());
/// config
///     .declare(|declarations| {
///         declarations
///             .define_method("greet", |_, _| Ok("hello".to_owned()))
///             .middlewares("greet", |stack| {
///                 stack.use_fn(|greeter, env, chain| Ok(format!("{}!", chain.next(greeter, env)?)));
///             });
///     })
///     .unwrap();
///
/// assert!(config.commit().unwrap());
/// assert!(!config.commit().unwrap());
/// assert_eq!(config.call(&Greeter, "greet", Arguments::null()).unwrap(), "hello!");
/// ```
pub struct Config<E: Entity> {
    name: String,
    options: Options,
    state: Mutex<State<E>>,
    committed: Condvar,
    compiled: OnceLock<Compiled<E>>,
    instance_auto_commits: AtomicUsize,
    class_auto_commits: AtomicUsize,
}

impl<E: Entity> Config<E> {
    /// Creates an uncommitted config with empty declarations.
    #[must_use]
    pub fn new(name: impl Into<String>, options: Options) -> Self {
        Self {
            name: name.into(),
            options,
            state: Mutex::new(State::Pending(Box::default())),
            committed: Condvar::new(),
            compiled: OnceLock::new(),
            instance_auto_commits: AtomicUsize::new(0),
            class_auto_commits: AtomicUsize::new(0),
        }
    }

    /// The name of the class.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The options of the class.
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// Adds declarations. Can be called any number of times before commit.
    ///
    /// `configure` must not use this config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigAlreadyCommitted`] once the config is committed or being committed.
    pub fn declare(&self, configure: impl FnOnce(&mut Declarations<E>)) -> Result<()> {
        let mut state = self.state.lock();
        match &mut *state {
            State::Pending(declarations) => {
                configure(declarations);
                Ok(())
            }
            State::Committing(_) | State::Committed => Err(Error::ConfigAlreadyCommitted { config: self.name.clone() }),
        }
    }

    /// Commits the config. Returns `true` when this call committed it, `false` when it was
    /// already committed.
    ///
    /// # Errors
    ///
    /// Returns the error of a concern hook or of a middleware factory. The config stays
    /// uncommitted in that case.
    pub fn commit(&self) -> Result<bool> {
        self.commit_with(Trigger::User)
    }

    /// Returns `true` once the config is committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// How often dispatch from `trigger` ran into the commit in progress on its own thread,
    /// counted since that commit started. These attempts are bounded by
    /// [`Options::max_auto_commits`]; threads waiting for another thread's commit are not
    /// counted.
    #[must_use]
    pub fn auto_commits(&self, trigger: Trigger) -> usize {
        self.auto_commit_counter(trigger).map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    /// Dispatches an instance method, committing first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMethod`] for unknown methods, the error of the method or of a
    /// middleware, or a commit error.
    pub fn call(&self, receiver: &E, method: &str, arguments: Arguments) -> Result<E::Output> {
        self.ensure_committed(Trigger::InstanceMethodMissing)?
            .instance
            .call(receiver, method, arguments)
    }

    /// Dispatches a class method, committing first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMethod`] for unknown methods, the error of the method or of a
    /// middleware, or a commit error.
    pub fn call_class(&self, receiver: &E::Class, method: &str, arguments: Arguments) -> Result<E::Output> {
        self.ensure_committed(Trigger::ClassMethodMissing)?
            .class
            .call(receiver, method, arguments)
    }

    /// The closest implementation of an instance method below its middleware stack, bound to
    /// `receiver`.
    ///
    /// # Errors
    ///
    /// Returns a commit error.
    pub fn resolve_super_method<'a>(&'a self, receiver: &'a E, method: &'a str) -> Result<Option<BoundMethod<'a, E, E::Output>>> {
        Ok(self
            .ensure_committed(Trigger::InstanceMethodMissing)?
            .instance
            .resolve_super_method(receiver, method))
    }

    /// The closest implementation of a class method below its middleware stack, bound to
    /// `receiver`.
    ///
    /// # Errors
    ///
    /// Returns a commit error.
    pub fn resolve_class_super_method<'a>(
        &'a self,
        receiver: &'a E::Class,
        method: &'a str,
    ) -> Result<Option<BoundMethod<'a, E::Class, E::Output>>> {
        Ok(self
            .ensure_committed(Trigger::ClassMethodMissing)?
            .class
            .resolve_super_method(receiver, method))
    }

    /// Returns `true` when a method of `scope` can be dispatched.
    ///
    /// # Errors
    ///
    /// Returns a commit error.
    pub fn responds_to(&self, scope: Scope, method: &str) -> Result<bool> {
        let compiled = self.ensure_committed(Self::trigger_for(scope))?;
        Ok(match scope {
            Scope::Instance => compiled.instance.responds_to(method),
            Scope::Class => compiled.class.responds_to(method),
        })
    }

    /// Builds the middleware caller of a method. Returns `false` when it is already defined.
    ///
    /// # Errors
    ///
    /// Returns the error of a middleware factory, or a commit error.
    pub fn define(&self, scope: Scope, method: &str) -> Result<bool> {
        let compiled = self.ensure_committed(Self::trigger_for(scope))?;
        match scope {
            Scope::Instance => compiled.instance.define(method),
            Scope::Class => compiled.class.define(method),
        }
    }

    /// Removes the middleware caller of a method, so calls reach the method directly.
    /// Returns `false` when no caller was defined.
    ///
    /// # Errors
    ///
    /// Returns a commit error.
    pub fn undefine(&self, scope: Scope, method: &str) -> Result<bool> {
        let compiled = self.ensure_committed(Self::trigger_for(scope))?;
        Ok(match scope {
            Scope::Instance => compiled.instance.undefine(method),
            Scope::Class => compiled.class.undefine(method),
        })
    }

    /// The names of the mixed-in concerns, in the order they were mixed in.
    ///
    /// # Errors
    ///
    /// Returns a commit error.
    pub fn concern_names(&self) -> Result<&[String]> {
        Ok(&self.ensure_committed(Trigger::InstanceMethodMissing)?.concerns)
    }

    const fn trigger_for(scope: Scope) -> Trigger {
        match scope {
            Scope::Instance => Trigger::InstanceMethodMissing,
            Scope::Class => Trigger::ClassMethodMissing,
        }
    }

    const fn auto_commit_counter(&self, trigger: Trigger) -> Option<&AtomicUsize> {
        match trigger {
            Trigger::User => None,
            Trigger::InstanceMethodMissing => Some(&self.instance_auto_commits),
            Trigger::ClassMethodMissing => Some(&self.class_auto_commits),
        }
    }

    fn ensure_committed(&self, trigger: Trigger) -> Result<&Compiled<E>> {
        loop {
            if let Some(compiled) = self.compiled.get() {
                return Ok(compiled);
            }

            // Threads waiting for another thread's commit are not charged.
            if self.is_committing_on_current_thread() {
                let attempts = self
                    .auto_commit_counter(trigger)
                    .map_or(0, |counter| counter.fetch_add(1, Ordering::Relaxed) + 1);

                if attempts > self.options.max_auto_commits {
                    if self.options.logs_enabled {
                        tracing::event!(
                            name: AUTO_COMMIT_EVENT,
                            tracing::Level::WARN,
                            config.name = %self.name,
                            trigger = %trigger,
                            attempts,
                        );
                    }

                    return Err(Error::TooManyCommitsFromMethodMissing {
                        config: self.name.clone(),
                        trigger,
                        max: self.options.max_auto_commits,
                    });
                }

                continue;
            }

            self.commit_with(trigger)?;
        }
    }

    fn is_committing_on_current_thread(&self) -> bool {
        matches!(&*self.state.lock(), State::Committing(owner) if *owner == thread::current().id())
    }

    fn commit_with(&self, trigger: Trigger) -> Result<bool> {
        let current = thread::current().id();
        let mut state = self.state.lock();

        let declarations = loop {
            match std::mem::replace(&mut *state, State::Committing(current)) {
                State::Pending(declarations) => {
                    self.instance_auto_commits.store(0, Ordering::Relaxed);
                    self.class_auto_commits.store(0, Ordering::Relaxed);
                    break declarations;
                }
                State::Committing(owner) if owner != current => {
                    *state = State::Committing(owner);
                    self.committed.wait(&mut state);
                }
                previous => {
                    *state = previous;
                    return Ok(false);
                }
            }
        };
        drop(state);

        let mut guard = RestoreOnFailure {
            config: self,
            snapshot: Some(declarations.clone()),
        };

        let compiled = self.compile(*declarations)?;
        self.compiled.get_or_init(|| compiled);

        guard.snapshot = None;
        *self.state.lock() = State::Committed;
        self.committed.notify_all();

        if self.options.logs_enabled {
            tracing::event!(
                name: COMMIT_EVENT,
                tracing::Level::DEBUG,
                config.name = %self.name,
                trigger = %trigger,
            );
        }

        Ok(true)
    }

    fn compile(&self, mut declarations: Declarations<E>) -> Result<Compiled<E>> {
        let composition = Composition::compose(&mut declarations)?;
        let Declarations { instance, class, .. } = declarations;

        let instance = Dispatcher::new(
            Scope::Instance,
            MethodTable::new(&self.name, composition.instance_layers(&self.name, instance.methods)),
            instance.stacks,
            instance.callbacks,
            self.options.clone(),
        );
        let class = Dispatcher::new(
            Scope::Class,
            MethodTable::new(&self.name, composition.class_layers(&self.name, class.methods)),
            class.stacks,
            class.callbacks,
            self.options.clone(),
        );

        instance.define_all()?;
        class.define_all()?;

        Ok(Compiled {
            instance,
            class,
            concerns: composition.names(),
        })
    }
}

impl<E: Entity> Debug for Config<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("committed", &self.is_committed())
            .finish_non_exhaustive()
    }
}

/// Puts the declarations back when a commit fails or panics, and wakes up waiting threads.
struct RestoreOnFailure<'a, E: Entity> {
    config: &'a Config<E>,
    snapshot: Option<Box<Declarations<E>>>,
}

impl<E: Entity> Drop for RestoreOnFailure<'_, E> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.config.state.lock() = State::Pending(snapshot);
            self.config.committed.notify_all();
        }
    }
}
