// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Service classes: construction, memoization, callbacks, middlewares and concerns.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use jsend::{Data, Origin, Outcome};
use method_middleware::concern::{Concern, Hook};
use method_middleware::{Arguments, Error, Options, Result, Trigger};
use serde_json::{Value, json};
use servitor::middlewares::StackExt;
use servitor::{Instance, Service, ServiceDeclarations, ServiceExt, Step};
use testing_aids::{Journal, LogCapture};
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug)]
struct Committed;

impl Service for Committed {
    fn new(_: &Arguments) -> Result<Self> {
        Ok(Self)
    }

    fn result(_: &Instance<Self>) -> Result<Outcome> {
        Ok(Outcome::success(Data::new()))
    }
}

#[test]
fn commit_config_twice_commits_once() {
    assert!(Committed::commit_config().unwrap());
    assert!(!Committed::commit_config().unwrap());

    let class = Committed::class().unwrap();
    assert!(class.config().is_committed());
    assert!(class.steps().is_committed());

    Committed::call(Arguments::null()).unwrap();
    assert_eq!(class.config().auto_commits(Trigger::ClassMethodMissing), 0);
}

#[derive(Debug)]
struct Greeter {
    name: String,
}

impl Service for Greeter {
    fn new(arguments: &Arguments) -> Result<Self> {
        let name = arguments.kwarg_value("name").and_then(Value::as_str).unwrap_or("stranger");
        Ok(Self { name: name.to_owned() })
    }

    fn result(instance: &Instance<Self>) -> Result<Outcome> {
        Ok(Outcome::success(Data::from([("greeting", format!("Hello, {}!", instance.name))])))
    }
}

#[test]
fn call_builds_from_arguments() {
    let outcome = Greeter::call(Arguments::null().kwarg("name", "Ada")).unwrap();

    let expected = Outcome::success(Data::from([("greeting", "Hello, Ada!")])).with_origin(Origin::service("Greeter"));
    assert_eq!(outcome, expected);
    assert_eq!(outcome.origin().unwrap().step_index(), None);
}

#[test]
fn try_call_without_try_result_is_reported() {
    let error = Greeter::try_call(Arguments::null()).unwrap_err();

    assert!(matches!(error, Error::TryResultIsNotOverridden { ref service } if service == "Greeter"));
}

#[derive(Debug)]
struct NoSteps;

impl Service for NoSteps {
    fn new(_: &Arguments) -> Result<Self> {
        Ok(Self)
    }
}

#[test]
fn service_without_steps_or_result_is_reported() {
    let error = NoSteps::call(Arguments::null()).unwrap_err();

    assert!(matches!(error, Error::ResultIsNotOverridden { ref service } if service == "NoSteps"));
}

static RESULT_RUNS: AtomicUsize = AtomicUsize::new(0);
static STEP_RUNS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
struct Memoized;

impl Service for Memoized {
    fn new(_: &Arguments) -> Result<Self> {
        Ok(Self)
    }

    fn configure(declarations: &mut ServiceDeclarations<'_, Self>) {
        declarations.define_method("load", |_, _| {
            STEP_RUNS.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::success(Data::new()))
        });
        declarations.steps().step(Step::method("load"));
    }

    fn result(instance: &Instance<Self>) -> Result<Outcome> {
        RESULT_RUNS.fetch_add(1, Ordering::SeqCst);
        instance.run_steps()
    }
}

#[test]
fn instance_memoizes_result_and_steps() {
    let instance = Memoized::class().unwrap().instantiate(Arguments::null()).unwrap();

    let first = instance.result().unwrap();
    let second = instance.result().unwrap();
    instance.step_result(0).unwrap();

    assert_eq!(first, second);
    assert_eq!(RESULT_RUNS.load(Ordering::SeqCst), 1);
    assert_eq!(STEP_RUNS.load(Ordering::SeqCst), 1);

    let error = instance.step_result(9).unwrap_err();
    assert!(matches!(error, Error::StepIsNotDefined { step: 9, .. }));
}

static RESULT_JOURNAL: LazyLock<Journal> = LazyLock::new(Journal::new);

#[derive(Debug)]
struct Audited;

impl Service for Audited {
    fn new(_: &Arguments) -> Result<Self> {
        Ok(Self)
    }

    fn configure(declarations: &mut ServiceDeclarations<'_, Self>) {
        declarations
            .before("result", |_, _| {
                RESULT_JOURNAL.record("before");
                Ok(())
            })
            .around("result", |instance, chain, _| {
                RESULT_JOURNAL.record("around-before");
                chain.call(instance)?;
                RESULT_JOURNAL.record("around-after");
                Ok(())
            })
            .after("result", |_, outcome, _| {
                RESULT_JOURNAL.record(format!("after {}", outcome.status()));
                Ok(())
            });
    }

    fn result(_: &Instance<Self>) -> Result<Outcome> {
        RESULT_JOURNAL.record("result");
        Ok(Outcome::success(Data::new()))
    }
}

#[test]
fn result_callbacks_run_once_per_instance() {
    let instance = Audited::class().unwrap().instantiate(Arguments::null()).unwrap();

    instance.result().unwrap();
    instance.result().unwrap();

    RESULT_JOURNAL.assert_entries(&["before", "around-before", "result", "around-after", "after success"]);
}

#[derive(Debug)]
struct Rescued;

impl Service for Rescued {
    fn new(_: &Arguments) -> Result<Self> {
        Ok(Self)
    }

    fn options() -> Options {
        Options::new().use_logs()
    }

    fn configure(declarations: &mut ServiceDeclarations<'_, Self>) {
        declarations
            .define_method("save", |_, _| Err(Error::other("disk full")))
            .middlewares("save", |stack| {
                stack.use_rescues_errors();
            });
    }

    fn result(instance: &Instance<Self>) -> Result<Outcome> {
        instance.call("save", Arguments::null().kwarg("path", "/tmp/report"))
    }
}

#[test]
fn rescued_errors_become_error_outcomes() {
    let log_capture = LogCapture::new();
    let _guard = log_capture.subscriber().set_default();

    let outcome = Rescued::call(Arguments::null()).unwrap();

    assert!(outcome.is_error());
    assert_eq!(outcome.message().as_str(), r#"disk full (`save` called with path: "/tmp/report")"#);
    log_capture.assert_contains("WARN");
    log_capture.assert_contains("method=save");
    log_capture.assert_contains("error=disk full");
}

#[derive(Debug)]
struct Unrescued;

impl Service for Unrescued {
    fn new(_: &Arguments) -> Result<Self> {
        Ok(Self)
    }

    fn configure(declarations: &mut ServiceDeclarations<'_, Self>) {
        declarations.middlewares("missing", |stack| {
            stack.use_rescues_errors();
        });
    }

    fn result(instance: &Instance<Self>) -> Result<Outcome> {
        instance.call("missing", Arguments::null())
    }
}

#[test]
fn protocol_errors_are_not_rescued() {
    let error = Unrescued::call(Arguments::null()).unwrap_err();

    assert!(matches!(error, Error::NoSuperMethod { ref method, .. } if method == "missing"));
}

#[derive(Debug)]
struct Wrapped;

impl Service for Wrapped {
    fn new(_: &Arguments) -> Result<Self> {
        Ok(Self)
    }

    fn configure(declarations: &mut ServiceDeclarations<'_, Self>) {
        declarations.class_middlewares("result", |stack| {
            stack.use_fn(|class, env, chain| {
                let outcome = chain.next(class, env)?;
                Ok(outcome.with_code("wrapped"))
            });
        });
    }

    fn result(_: &Instance<Self>) -> Result<Outcome> {
        Ok(Outcome::success(Data::new()))
    }
}

#[test]
fn class_middlewares_wrap_call() {
    let outcome = Wrapped::call(Arguments::null()).unwrap();

    assert_eq!(outcome.code().as_str(), "wrapped");
}

fn stamped() -> Concern<Instance<Stamped>> {
    Concern::<Instance<Stamped>>::builder("Stamped")
        .included(Hook::<Instance<Stamped>>::new(|declarations| {
            declarations.middlewares("result", |stack| {
                stack.use_fn(|instance, env, chain| {
                    let outcome = chain.next(instance, env)?;
                    Ok(outcome.with_message("stamped"))
                });
            });
            Ok(())
        }))
        .unwrap()
        .build()
        .unwrap()
}

#[derive(Debug)]
struct Stamped;

impl Service for Stamped {
    fn new(_: &Arguments) -> Result<Self> {
        Ok(Self)
    }

    fn configure(declarations: &mut ServiceDeclarations<'_, Self>) {
        let concern = stamped();
        declarations.concerns(|concerns| {
            concerns.include(&concern);
        });
    }

    fn result(_: &Instance<Self>) -> Result<Outcome> {
        Ok(Outcome::success(Data::from([("id", json!(3))])))
    }
}

#[test]
fn concerns_extend_services() {
    let outcome = Stamped::call(Arguments::null()).unwrap();

    assert_eq!(outcome.message().as_str(), "stamped");
    assert_eq!(outcome.data(), &Data::from([("id", 3)]));
    assert_eq!(Stamped::class().unwrap().config().concern_names().unwrap(), ["Stamped"]);
}
