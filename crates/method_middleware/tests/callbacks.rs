// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Ordering and protocol of `before`, `after` and `around` callbacks.

use method_middleware::{Arguments, Config, Declarations, Entity, Error, Options};
use testing_aids::Journal;

#[derive(Debug, Default)]
struct Order {
    journal: Journal,
}

impl Entity for Order {
    type Class = Journal;
    type Output = String;
}

fn config(declare: impl FnOnce(&mut Declarations<Order>)) -> Config<Order> {
    let config = Config::<Order>::new("Order", Options::new());
    config
        .declare(|declarations| {
            declarations
                .define_method("place", |order, _| {
                    order.journal.record("original");
                    Ok("placed".to_owned())
                })
                .middlewares("place", |stack| {
                    stack.use_callbacks();
                });
            declare(declarations);
        })
        .unwrap();
    config
}

#[test]
fn before_in_declaration_order_after_in_reverse() {
    let config = config(|declarations| {
        declarations
            .before("place", |order, _| {
                order.journal.record("before 1");
                Ok(())
            })
            .before("place", |order, _| {
                order.journal.record("before 2");
                Ok(())
            })
            .after("place", |order, value, _| {
                order.journal.record(format!("after 1 saw {value}"));
                Ok(())
            })
            .after("place", |order, _, _| {
                order.journal.record("after 2");
                Ok(())
            });
    });
    let order = Order::default();

    let value = config.call(&order, "place", Arguments::null()).unwrap();

    assert_eq!(value, "placed");
    order
        .journal
        .assert_entries(&["before 1", "before 2", "original", "after 2", "after 1 saw placed"]);
}

#[test]
fn around_callbacks_nest_first_declared_outermost() {
    let config = config(|declarations| {
        for name in ["A", "B", "C"] {
            declarations.around("place", move |order, chain, _| {
                order.journal.record(format!("{name}-before"));
                chain.call(order)?;
                order.journal.record(format!("{name}-after"));
                Ok(())
            });
        }
    });
    let order = Order::default();

    config.call(&order, "place", Arguments::null()).unwrap();

    order
        .journal
        .assert_entries(&["A-before", "B-before", "C-before", "original", "C-after", "B-after", "A-after"]);
}

#[test]
fn around_sees_value_of_inner_layers() {
    let config = config(|declarations| {
        declarations.around("place", |order, chain, _| {
            let value = chain.call(order)?;
            order.journal.record(format!("around saw {value}"));
            Ok(())
        });
    });
    let order = Order::default();

    assert_eq!(config.call(&order, "place", Arguments::null()).unwrap(), "placed");
    order.journal.assert_entries(&["original", "around saw placed"]);
}

#[test]
fn around_that_does_not_continue_is_reported() {
    let expected_line = line!() + 2;
    let config = config(|declarations| {
        declarations.around("place", |_, _, _| Ok(()));
    });
    let order = Order::default();

    let error = config.call(&order, "place", Arguments::null()).unwrap_err();

    let Error::AroundCallbackChainIsNotContinued { method, location } = error else {
        panic!("unexpected error: {error}");
    };
    assert_eq!(method, "place");
    assert_eq!(location.file(), file!());
    assert_eq!(location.line(), expected_line);
    assert!(order.journal.entries().is_empty());
}

#[test]
fn inner_around_that_does_not_continue_is_reported() {
    let config = config(|declarations| {
        declarations.around("place", |order, chain, _| {
            order.journal.record("outer");
            chain.call(order)?;
            Ok(())
        });
    });
    let expected_line = line!() + 2;
    config
        .declare(|declarations| {
            declarations.around("place", |_, _, _| Ok(()));
        })
        .unwrap();
    let order = Order::default();

    let error = config.call(&order, "place", Arguments::null()).unwrap_err();

    assert!(
        matches!(error, Error::AroundCallbackChainIsNotContinued { location, .. } if location.line() == expected_line),
        "{error}"
    );
    order.journal.assert_entries(&["outer"]);
}

#[test]
fn failing_before_stops_the_call() {
    let config = config(|declarations| {
        declarations
            .before("place", |_, _| Err(Error::other("out of stock")))
            .after("place", |order, _, _| {
                order.journal.record("after");
                Ok(())
            });
    });
    let order = Order::default();

    let error = config.call(&order, "place", Arguments::null()).unwrap_err();

    assert_eq!(error.to_string(), "out of stock");
    assert!(order.journal.entries().is_empty());
}

#[test]
fn callbacks_receive_call_arguments() {
    let config = config(|declarations| {
        declarations.before("place", |order, arguments| {
            order.journal.record(format!("quantity {}", arguments.kwarg_value("quantity").unwrap()));
            Ok(())
        });
    });
    let order = Order::default();

    config.call(&order, "place", Arguments::null().kwarg("quantity", 3)).unwrap();

    order.journal.assert_entries(&["quantity 3", "original"]);
}

#[test]
fn callbacks_of_other_methods_do_not_run() {
    let config = config(|declarations| {
        declarations.before("cancel", |order, _| {
            order.journal.record("cancel");
            Ok(())
        });
    });
    let order = Order::default();

    config.call(&order, "place", Arguments::null()).unwrap();

    order.journal.assert_entries(&["original"]);
}

#[test]
fn class_callbacks_are_separate_from_instance_callbacks() {
    let config = config(|declarations| {
        declarations
            .define_class_method("create", |journal, _| {
                journal.record("create");
                Ok("created".to_owned())
            })
            .class_middlewares("create", |stack| {
                stack.use_callbacks();
            });
        declarations.class().before("create", |journal, _| {
            journal.record("class before");
            Ok(())
        });
        declarations.before("create", |order, _| {
            order.journal.record("instance before");
            Ok(())
        });
    });
    let class_journal = Journal::new();

    config.call_class(&class_journal, "create", Arguments::null()).unwrap();

    class_journal.assert_entries(&["class before", "create"]);
}
