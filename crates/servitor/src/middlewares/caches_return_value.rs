// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use jsend::Outcome;
use method_middleware::cache::CacheKey;
use method_middleware::stack::{Chain, Middleware};
use method_middleware::{Env, Result};

use crate::{Instance, Service};

/// Memoizes what a method returns, per instance and call signature.
///
/// Errors are not memoized; the next call runs the method again.
#[derive(Clone, Copy, Debug, Default)]
pub struct CachesReturnValue;

impl<S: Service> Middleware<Instance<S>, Outcome> for CachesReturnValue {
    fn call(&self, receiver: &Instance<S>, env: Env, chain: Chain<'_, Instance<S>, Outcome>) -> Result<Outcome> {
        let key = CacheKey::with_arguments(env.method().to_owned(), env.arguments());
        receiver.return_values().try_fetch(key, || chain.next(receiver, env))
    }
}
