// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! One class per service type, created on first use and kept for the life of the process.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use method_middleware::{Error, Result};
use parking_lot::RwLock;

use crate::Service;
use crate::class::ServiceClass;

type Classes = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

static CLASSES: LazyLock<Classes> = LazyLock::new(Classes::default);

/// Returns the class of `S`, declaring it first if needed.
///
/// Declaration runs without the registry locked, so [`Service::configure`] may look up other
/// classes. When two threads declare the same class at once, the first to register wins.
pub(crate) fn service_class<S: Service>() -> Result<Arc<ServiceClass<S>>> {
    let id = TypeId::of::<S>();

    let existing = CLASSES.read().get(&id).cloned();
    let class = match existing {
        Some(class) => class,
        None => {
            let declared: Arc<dyn Any + Send + Sync> = Arc::new(ServiceClass::<S>::declare()?);
            Arc::clone(CLASSES.write().entry(id).or_insert(declared))
        }
    };

    match class.downcast::<ServiceClass<S>>() {
        Ok(class) => Ok(class),
        Err(_) => Err(Error::other(format!("the class registered for `{}` has another type", S::name()))),
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use method_middleware::Arguments;

    use super::*;

    #[derive(Debug)]
    struct Registered;

    impl Service for Registered {
        fn new(_: &Arguments) -> Result<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn same_class_is_returned() {
        let first = service_class::<Registered>().unwrap();
        let second = service_class::<Registered>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "Registered");
    }
}
