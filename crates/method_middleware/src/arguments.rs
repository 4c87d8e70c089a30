// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::panic::Location;
use std::sync::Arc;

use serde_json::Value;

/// A callable passed along with a method call, remembered with the place it was created.
///
/// Two blocks are equal only when they are the same closure created at the same location.
#[derive(Clone)]
pub struct Block {
    body: Arc<dyn Fn(&Arguments) -> Value + Send + Sync>,
    location: &'static Location<'static>,
}

impl Block {
    /// Creates a block, capturing the caller's source location.
    #[track_caller]
    pub fn new(body: impl Fn(&Arguments) -> Value + Send + Sync + 'static) -> Self {
        Self {
            body: Arc::new(body),
            location: Location::caller(),
        }
    }

    /// Calls the block.
    pub fn call(&self, arguments: &Arguments) -> Value {
        (self.body)(arguments)
    }

    /// Where the block was created.
    #[must_use]
    pub fn source_location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.body).cast::<()>() == Arc::as_ptr(&other.body).cast::<()>() && self.location == other.location
    }
}

impl Debug for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block").field("location", &self.location).finish_non_exhaustive()
    }
}

/// The normalized signature of a method call: positional arguments, keyword arguments
/// and an optional [`Block`].
///
/// # Examples
///
/// ```
/// use method_middleware::Arguments;
/// use serde_json::json;
///
/// let arguments = Arguments::null().arg(1).kwarg("name", "Ada");
///
/// assert_eq!(arguments.args(), &[json!(1)]);
/// assert_eq!(arguments.kwarg_value("name"), Some(&json!("Ada")));
/// assert_ne!(arguments, Arguments::null());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments {
    args: Vec<Value>,
    kwargs: BTreeMap<String, Value>,
    block: Option<Block>,
}

impl Arguments {
    /// Arguments of a call that passes nothing.
    #[must_use]
    pub fn null() -> Self {
        Self::default()
    }

    /// Creates arguments from all three parts.
    #[must_use]
    pub fn new(args: Vec<Value>, kwargs: BTreeMap<String, Value>, block: Option<Block>) -> Self {
        Self { args, kwargs, block }
    }

    /// Creates arguments holding only keyword arguments.
    #[must_use]
    pub fn from_kwargs<K: Into<String>, V: Into<Value>>(kwargs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            kwargs: kwargs.into_iter().map(|(key, value)| (key.into(), value.into())).collect(),
            ..Self::default()
        }
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Adds or replaces a keyword argument.
    #[must_use]
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Attaches a block.
    #[must_use]
    pub fn block(mut self, block: Block) -> Self {
        self.block = Some(block);
        self
    }

    /// Positional arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Keyword arguments.
    #[must_use]
    pub const fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.kwargs
    }

    /// Looks up one keyword argument.
    #[must_use]
    pub fn kwarg_value(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }

    /// The block, if one was passed.
    #[must_use]
    pub const fn block_ref(&self) -> Option<&Block> {
        self.block.as_ref()
    }

    /// Returns `true` when nothing is passed.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty() && self.block.is_none()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Arguments: Send, Sync, Clone, Debug);
        static_assertions::assert_impl_all!(Block: Send, Sync, Clone, Debug);
    }

    #[test]
    fn blocks_compare_by_identity() {
        let block = Block::new(|_| json!(1));
        let same_body_elsewhere = Block::new(|_| json!(1));

        assert_eq!(block, block.clone());
        assert_ne!(block, same_body_elsewhere);
    }

    #[test]
    fn block_receives_arguments() {
        let block = Block::new(|arguments| arguments.args().first().cloned().unwrap_or_default());

        assert_eq!(block.call(&Arguments::null().arg("x")), json!("x"));
    }

    #[test]
    fn keyword_order_is_irrelevant() {
        let left = Arguments::null().kwarg("a", 1).kwarg("b", 2);
        let right = Arguments::from_kwargs([("b", 2), ("a", 1)]);

        assert_eq!(left, right);
    }

    #[test]
    fn null_arguments() {
        assert!(Arguments::null().is_null());
        assert!(!Arguments::null().arg(Value::Null).is_null());
    }
}
