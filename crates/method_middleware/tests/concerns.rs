// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mixing concerns into a class: layering, super calls and hooks.

use method_middleware::concern::{Concern, Hook};
use method_middleware::{Arguments, Config, Entity, Method, Options, Scope};
use testing_aids::Journal;

#[derive(Debug)]
struct Report;

impl Entity for Report {
    type Class = ();
    type Output = String;
}

fn named(name: &str, method: &str, value: &'static str) -> Concern<Report> {
    Concern::builder(name)
        .instance_method(method, Method::new(move |_, _| Ok(value.to_owned())))
        .build()
        .unwrap()
}

fn call(config: &Config<Report>, method: &str) -> String {
    config.call(&Report, method, Arguments::null()).unwrap()
}

#[test]
fn own_method_overrides_included_concern() {
    let titled = named("Titled", "title", "from concern");
    let config = Config::<Report>::new("Report", Options::new());
    config
        .declare(|declarations| {
            declarations
                .concerns(|concerns| {
                    concerns.include(&titled);
                })
                .define_method("title", |_, _| Ok("own".to_owned()));
        })
        .unwrap();

    assert_eq!(call(&config, "title"), "own");
}

#[test]
fn last_included_concern_wins() {
    let first = named("First", "title", "first");
    let second = named("Second", "title", "second");
    let config = Config::<Report>::new("Report", Options::new());
    config
        .declare(|declarations| {
            declarations.concerns(|concerns| {
                concerns.include(&first).include(&second);
            });
        })
        .unwrap();

    assert_eq!(call(&config, "title"), "second");
    assert_eq!(config.concern_names().unwrap(), ["First", "Second"]);
}

#[test]
fn prepended_concern_wraps_own_method() {
    let bracketed = Concern::builder("Bracketed")
        .instance_method(
            "title",
            Method::with_super(|report: &Report, arguments: &Arguments, super_method| {
                Ok(format!("[{}]", super_method.call(report, arguments)?))
            }),
        )
        .build()
        .unwrap();
    let config = Config::<Report>::new("Report", Options::new());
    config
        .declare(|declarations| {
            declarations
                .define_method("title", |_, _| Ok("own".to_owned()))
                .concerns(|concerns| {
                    concerns.prepend(&bracketed);
                });
        })
        .unwrap();

    assert_eq!(call(&config, "title"), "[own]");
}

#[test]
fn super_reaches_through_the_layers() {
    let base = named("Base", "title", "base");
    let config = Config::<Report>::new("Report", Options::new());
    config
        .declare(|declarations| {
            declarations
                .concerns(|concerns| {
                    concerns.include(&base);
                })
                .define_method_with_super("title", |report, arguments, super_method| {
                    assert_eq!(super_method.owner(), Some("Base"));
                    Ok(format!("own over {}", super_method.call(report, arguments)?))
                });
        })
        .unwrap();

    assert_eq!(call(&config, "title"), "own over base");
}

#[test]
fn super_without_implementation_fails() {
    let config = Config::<Report>::new("Report", Options::new());
    config
        .declare(|declarations| {
            declarations.define_method_with_super("title", |report, arguments, super_method| {
                assert!(!super_method.exists());
                super_method.call(report, arguments)
            });
        })
        .unwrap();

    let error = config.call(&Report, "title", Arguments::null()).unwrap_err();

    assert_eq!(error.to_string(), "super: no superclass method `title' for Report");
}

#[test]
fn singleton_class_methods_sit_above_own_class_methods() {
    let versioned = Concern::<Report>::builder("Versioned")
        .class_method("version", Method::new(|_, _| Ok("concern".to_owned())))
        .class_method("kind", Method::new(|_, _| Ok("concern kind".to_owned())))
        .singleton_class_method("version", Method::new(|_, _| Ok("singleton".to_owned())))
        .build()
        .unwrap();
    let config = Config::<Report>::new("Report", Options::new());
    config
        .declare(|declarations| {
            declarations
                .define_class_method("version", |_, _| Ok("own".to_owned()))
                .define_class_method("kind", |_, _| Ok("own kind".to_owned()))
                .concerns(|concerns| {
                    concerns.include(&versioned);
                });
        })
        .unwrap();

    assert_eq!(config.call_class(&(), "version", Arguments::null()).unwrap(), "singleton");
    assert_eq!(config.call_class(&(), "kind", Arguments::null()).unwrap(), "own kind");
}

#[test]
fn dependencies_hooks_run_first() {
    let journal = Journal::new();
    let hook = |name: &'static str| {
        let journal = journal.clone();
        Hook::new(move |_| {
            journal.record(name);
            Ok(())
        })
    };
    let storage = Concern::<Report>::builder("Storage").included(hook("storage")).unwrap().build().unwrap();
    let caching = Concern::builder("Caching")
        .depends_on(&storage)
        .included(hook("caching"))
        .unwrap()
        .build()
        .unwrap();
    let config = Config::<Report>::new("Report", Options::new());
    config
        .declare(|declarations| {
            declarations.concerns(|concerns| {
                concerns.include(&caching).include(&storage);
            });
        })
        .unwrap();

    config.commit().unwrap();

    journal.assert_entries(&["storage", "caching"]);
    assert_eq!(config.concern_names().unwrap(), ["Storage", "Caching"]);
}

#[test]
fn prepend_hook_runs_only_when_prepended() {
    let journal = Journal::new();
    let included = {
        let journal = journal.clone();
        Hook::new(move |_| {
            journal.record("included");
            Ok(())
        })
    };
    let prepended = {
        let journal = journal.clone();
        Hook::new(move |_| {
            journal.record("prepended");
            Ok(())
        })
    };
    let audited = Concern::<Report>::builder("Audited")
        .included(included)
        .unwrap()
        .prepended(prepended)
        .unwrap()
        .build()
        .unwrap();
    let config = Config::<Report>::new("Report", Options::new());
    config
        .declare(|declarations| {
            declarations.concerns(|concerns| {
                concerns.prepend(&audited);
            });
        })
        .unwrap();

    config.commit().unwrap();

    journal.assert_entries(&["prepended"]);
}

#[test]
fn hook_declares_middleware_and_callbacks() {
    let journal = Journal::new();
    let shouting = Concern::<Report>::builder("Shouting")
        .included(Hook::<Report>::new({
            let journal = journal.clone();
            move |declarations| {
                let journal = journal.clone();
                declarations
                    .middlewares("title", |stack| {
                        stack
                            .use_callbacks()
                            .use_fn(|report, env, chain| Ok(chain.next(report, env)?.to_uppercase()));
                    })
                    .before("title", move |_, _| {
                        journal.record("before title");
                        Ok(())
                    });
                Ok(())
            }
        }))
        .unwrap()
        .build()
        .unwrap();
    let config = Config::<Report>::new("Report", Options::new());
    config
        .declare(|declarations| {
            declarations
                .define_method("title", |_, _| Ok("quiet".to_owned()))
                .concerns(|concerns| {
                    concerns.include(&shouting);
                });
        })
        .unwrap();

    assert_eq!(call(&config, "title"), "QUIET");
    journal.assert_entries(&["before title"]);
}

#[test]
fn hook_may_include_more_concerns() {
    let titled = named("Titled", "title", "nested");
    let outer = Concern::<Report>::builder("Outer")
        .included(Hook::new(move |declarations| {
            declarations.concerns(|concerns| {
                concerns.include(&titled);
            });
            Ok(())
        }))
        .unwrap()
        .build()
        .unwrap();
    let config = Config::<Report>::new("Report", Options::new());
    config
        .declare(|declarations| {
            declarations.concerns(|concerns| {
                concerns.include(&outer);
            });
        })
        .unwrap();

    assert_eq!(call(&config, "title"), "nested");
    assert!(config.responds_to(Scope::Instance, "title").unwrap());
    assert_eq!(config.concern_names().unwrap(), ["Outer", "Titled"]);
}

#[test]
fn super_method_resolution_skips_middleware() {
    let config = Config::<Report>::new("Report", Options::new());
    config
        .declare(|declarations| {
            declarations
                .define_method("title", |_, _| Ok("plain".to_owned()))
                .middlewares("title", |stack| {
                    stack.use_fn(|report, env, chain| Ok(format!("*{}*", chain.next(report, env)?)));
                });
        })
        .unwrap();

    let bound = config.resolve_super_method(&Report, "title").unwrap().unwrap();

    assert_eq!(bound.owner(), Some("Report"));
    assert_eq!(bound.call(&Arguments::null()).unwrap(), "plain");
    assert_eq!(call(&config, "title"), "*plain*");
}
