// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Middleware stacks declared through a config.

use std::sync::Arc;

use method_middleware::stack::{Chain, Middleware};
use method_middleware::{Arguments, Config, Entity, Env, Error, Options, Result, Scope};
use serde_json::{Value, json};

#[derive(Debug)]
struct Calculator;

impl Entity for Calculator {
    type Class = ();
    type Output = Value;
}

#[derive(Debug)]
struct Tag(String);

impl Middleware<Calculator, Value> for Tag {
    fn call(&self, receiver: &Calculator, env: Env, chain: Chain<'_, Calculator, Value>) -> Result<Value> {
        let value = chain.next(receiver, env)?;
        Ok(json!(format!("{}({value})", self.0)))
    }
}

fn calculator() -> Config<Calculator> {
    let config = Config::new("Calculator", Options::new());
    config
        .declare(|declarations| {
            declarations.define_method("double", |_, arguments| {
                let value = arguments.args().first().and_then(Value::as_i64).unwrap_or_default();
                Ok(json!(value * 2))
            });
        })
        .unwrap();
    config
}

#[test]
fn first_declared_middleware_is_outermost() {
    let config = calculator();
    config
        .declare(|declarations| {
            declarations.middlewares("double", |stack| {
                stack.use_middleware(Tag("outer".to_owned()));
            });
        })
        .unwrap();
    config
        .declare(|declarations| {
            declarations.middlewares("double", |stack| {
                stack.use_middleware(Tag("inner".to_owned()));
            });
        })
        .unwrap();

    let value = config.call(&Calculator, "double", Arguments::null().arg(4)).unwrap();

    assert_eq!(value, json!("outer(\"inner(8)\")"));
}

#[test]
fn middleware_may_change_arguments() {
    let config = calculator();
    config
        .declare(|declarations| {
            declarations.middlewares("double", |stack| {
                stack.use_fn(|calculator, env, chain| {
                    let arguments = Arguments::null().arg(10);
                    chain.next(calculator, env.with_arguments(arguments))
                });
            });
        })
        .unwrap();

    assert_eq!(config.call(&Calculator, "double", Arguments::null().arg(1)).unwrap(), json!(20));
}

#[test]
fn factory_sees_bound_arguments_and_method() {
    let config = calculator();
    config
        .declare(|declarations| {
            declarations.middlewares("double", |stack| {
                stack.use_with(Arguments::null().kwarg("label", "twice"), |setup| {
                    let label = setup.arguments().kwarg_value("label").and_then(Value::as_str).unwrap_or_default();
                    let tag: Arc<dyn Middleware<Calculator, Value>> = Arc::new(Tag(format!("{label}:{}", setup.method())));
                    Ok(tag)
                });
            });
        })
        .unwrap();

    let value = config.call(&Calculator, "double", Arguments::null().arg(3)).unwrap();

    assert_eq!(value, json!("twice:double(6)"));
}

#[test]
fn observed_calls_carry_arguments() {
    let config = calculator();
    let mut observations = None;
    config
        .declare(|declarations| {
            declarations.middlewares("double", |stack| {
                observations = Some(stack.observe());
            });
        })
        .unwrap();
    let observations = observations.unwrap();

    config.call(&Calculator, "double", Arguments::null().arg(5)).unwrap();
    config.call(&Calculator, "double", Arguments::null().arg(6)).unwrap();

    assert_eq!(observations.len(), 2);
    let last = observations.last().unwrap();
    assert_eq!(last.method(), "double");
    assert_eq!(last.arguments().args(), [json!(6)]);
}

#[test]
fn undefined_caller_can_be_defined_again() {
    let config = calculator();
    config
        .declare(|declarations| {
            declarations.middlewares("double", |stack| {
                stack.use_middleware(Tag("tagged".to_owned()));
            });
        })
        .unwrap();

    assert!(config.undefine(Scope::Instance, "double").unwrap());
    assert_eq!(config.call(&Calculator, "double", Arguments::null().arg(1)).unwrap(), json!(2));

    assert!(config.define(Scope::Instance, "double").unwrap());
    assert!(!config.define(Scope::Instance, "double").unwrap());
    assert_eq!(config.call(&Calculator, "double", Arguments::null().arg(1)).unwrap(), json!("tagged(2)"));
}

#[test]
fn failing_factory_fails_the_commit() {
    let config = calculator();
    config
        .declare(|declarations| {
            declarations.middlewares("double", |stack| {
                stack.use_factory(|setup| Err(Error::other(format!("cannot wrap {}", setup.method()))));
            });
        })
        .unwrap();

    assert_eq!(config.commit().unwrap_err().to_string(), "cannot wrap double");
    assert!(!config.is_committed());
}

#[test]
fn stack_for_missing_method_reports_super() {
    let config = calculator();
    config
        .declare(|declarations| {
            declarations.middlewares("triple", |stack| {
                stack.use_middleware(Tag("tagged".to_owned()));
            });
        })
        .unwrap();

    let error = config.call(&Calculator, "triple", Arguments::null()).unwrap_err();

    assert!(matches!(error, Error::NoSuperMethod { ref method, .. } if method == "triple"), "{error}");
    assert!(config.responds_to(Scope::Instance, "triple").unwrap());
}
