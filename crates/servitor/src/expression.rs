// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Display, Formatter};

use jsend::{Data, Outcome};
use method_middleware::Result;

/// A boolean expression over the steps of a pipeline.
///
/// Steps are referred to by index. A success counts as `true`, anything else as `false`;
/// evaluation short-circuits the way `&&` and `||` do, so a skipped step never runs.
///
/// # Examples
///
/// ```
/// use jsend::{Data, Outcome};
/// use servitor::Expression;
///
/// let expression = Expression::Scalar(0).and(Expression::Scalar(1)).or(Expression::Scalar(2));
/// let mut ran = Vec::new();
///
/// let outcome = expression
///     .evaluate(&mut |index| {
///         ran.push(index);
///         Ok(if index == 0 { Outcome::failure(Data::new()) } else { Outcome::success(Data::new()) })
///     })
///     .unwrap();
///
/// assert!(outcome.is_success());
/// assert_eq!(ran, [0, 2]);
/// assert_eq!(expression.to_string(), "0 && 1 || 2");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Expression {
    /// No steps.
    #[default]
    Empty,

    /// A single step.
    Scalar(usize),

    /// Both sides must succeed; the right side runs only after the left one succeeded.
    And(Box<Self>, Box<Self>),

    /// Either side must succeed; the right side runs only after the left one did not.
    Or(Box<Self>, Box<Self>),

    /// Inverts success and failure.
    Not(Box<Self>),

    /// A parenthesized sub-expression, combined with its neighbours as one operand.
    Group(Box<Self>),
}

impl Expression {
    /// Combines with `right` through `and`. An empty expression yields `right` itself.
    #[must_use]
    pub fn and(self, right: Self) -> Self {
        match self {
            Self::Empty => right,
            left => Self::And(Box::new(left), Box::new(right)),
        }
    }

    /// Combines with `right` through `or`. An empty expression yields `right` itself.
    #[must_use]
    pub fn or(self, right: Self) -> Self {
        match self {
            Self::Empty => right,
            left => Self::Or(Box::new(left), Box::new(right)),
        }
    }

    /// Wraps in `not`.
    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Wraps in a group.
    #[must_use]
    pub fn group(self) -> Self {
        Self::Group(Box::new(self))
    }

    /// Returns `true` for [`Expression::Empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The indexes of the steps the expression refers to, left to right.
    #[must_use]
    pub fn steps(&self) -> Vec<usize> {
        let mut steps = Vec::new();
        self.collect_steps(&mut steps);
        steps
    }

    fn collect_steps(&self, steps: &mut Vec<usize>) {
        match self {
            Self::Empty => {}
            Self::Scalar(index) => steps.push(*index),
            Self::And(left, right) | Self::Or(left, right) => {
                left.collect_steps(steps);
                right.collect_steps(steps);
            }
            Self::Not(inner) | Self::Group(inner) => inner.collect_steps(steps),
        }
    }

    /// Evaluates the expression, running steps through `run` as they are reached.
    ///
    /// An empty expression evaluates to a success without data.
    ///
    /// # Errors
    ///
    /// Returns the first error `run` returns; nothing after it is evaluated.
    pub fn evaluate(&self, run: &mut dyn FnMut(usize) -> Result<Outcome>) -> Result<Outcome> {
        match self {
            Self::Empty => Ok(Outcome::success(Data::new())),
            Self::Scalar(index) => run(*index),
            Self::And(left, right) => {
                let left = left.evaluate(run)?;
                if left.is_success() { right.evaluate(run) } else { Ok(left) }
            }
            Self::Or(left, right) => {
                let left = left.evaluate(run)?;
                if left.is_success() { Ok(left) } else { right.evaluate(run) }
            }
            Self::Not(inner) => Ok(inner.evaluate(run)?.negated()),
            Self::Group(inner) => inner.evaluate(run),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Scalar(index) => write!(f, "{index}"),
            Self::And(left, right) => write!(f, "{left} && {right}"),
            Self::Or(left, right) => write!(f, "{left} || {right}"),
            Self::Not(inner) => write!(f, "!{inner}"),
            Self::Group(inner) => write!(f, "({inner})"),
        }
    }
}
