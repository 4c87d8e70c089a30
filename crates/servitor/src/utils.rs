// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Small helpers shared by services and middlewares.

use method_middleware::Arguments;
use serde_json::Value;

/// The last path segment of a type's name, without generic arguments.
///
/// # Examples
///
/// ```
/// use servitor::utils::short_type_name;
///
/// struct Register;
///
/// assert_eq!(short_type_name::<Register>(), "Register");
/// assert_eq!(short_type_name::<Vec<String>>(), "Vec");
/// ```
#[must_use]
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let name = std::any::type_name::<T>();
    let name = name.split_once('<').map_or(name, |(outer, _)| outer);
    name.rsplit("::").next().unwrap_or(name)
}

/// The name of the fallback of `method`.
#[must_use]
pub fn try_method_name(method: &str) -> String {
    format!("try_{method}")
}

/// Renders arguments the way they appear in messages: positional values first, then
/// `key: value` pairs, then the block's location.
///
/// # Examples
///
/// ```
/// use method_middleware::Arguments;
/// use servitor::utils::format_arguments;
///
/// let arguments = Arguments::null().arg(1).kwarg("name", "Ada");
///
/// assert_eq!(format_arguments(&arguments), r#"1, name: "Ada""#);
/// assert_eq!(format_arguments(&Arguments::null()), "");
/// ```
#[must_use]
pub fn format_arguments(arguments: &Arguments) -> String {
    let args = arguments.args().iter().map(Value::to_string);
    let kwargs = arguments.kwargs().iter().map(|(key, value)| format!("{key}: {value}"));
    let block = arguments.block_ref().map(|block| {
        let location = block.source_location();
        format!("&block at {}:{}", location.file(), location.line())
    });

    args.chain(kwargs).chain(block).collect::<Vec<_>>().join(", ")
}
