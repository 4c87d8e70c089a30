// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Middlewares services install on their methods.
//!
//! Every service gets [`CachesReturnValue`] on `result` and `try_result` and [`CanBeTried`]
//! on `step`. [`RescuesErrors`] is opt-in, through [`StackExt::use_rescues_errors`].

mod caches_return_value;
mod can_be_tried;
mod rescues_errors;

pub use caches_return_value::CachesReturnValue;
pub use can_be_tried::CanBeTried;
pub use rescues_errors::{RescuesErrors, StackExt};
