// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CastError;

/// The status of an [`Outcome`](crate::Outcome).
///
/// Exactly one of three labels, as JSend prescribes. Only [`Status::Success`] is
/// truthy when outcomes are combined with boolean operators.
///
/// # Examples
///
/// ```
/// use jsend::Status;
///
/// let status: Status = "failure".parse().unwrap();
///
/// assert!(!status.is_success());
/// assert_eq!(status.negated(), Status::Success);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The operation produced what it promised.
    Success,

    /// The operation was rejected, usually because of its inputs.
    Failure,

    /// The operation could not be carried out.
    Error,
}

impl Status {
    /// Returns `true` for [`Status::Success`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns `true` for [`Status::Failure`].
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failure)
    }

    /// Returns `true` for [`Status::Error`].
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }

    /// Swaps success and failure. An error stays an error.
    #[must_use]
    pub const fn negated(self) -> Self {
        match self {
            Self::Success => Self::Failure,
            Self::Failure => Self::Success,
            Self::Error => Self::Error,
        }
    }

    /// The lowercase label used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "error" => Ok(Self::Error),
            other => Err(CastError::UnknownStatus(other.to_owned())),
        }
    }
}

impl TryFrom<&str> for Status {
    type Error = CastError;

    fn try_from(value: &str) -> Result<Self, CastError> {
        value.parse()
    }
}

impl PartialEq<&str> for Status {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
