// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::sync::OnceLock;

use method_middleware::Result;

use crate::service::{Attributes, Service};
use crate::{Expression, Output, Step};

/// The steps of an organizer service and the expression combining them.
///
/// Every directive appends to the expression, combining the new node with everything
/// declared before it, left to right. Steps are numbered in declaration order, groups
/// included. The collection is frozen when the organizer is committed.
///
/// # Examples
///
/// ```
/// use method_middleware::{Arguments, Result};
/// use servitor::{Service, Step, StepCollection};
///
/// #[derive(Debug)]
/// struct Checkout;
///
/// impl Service for Checkout {
///     fn new(_: &Arguments) -> Result<Self> {
///         Ok(Self)
///     }
/// }
///
/// let mut steps = StepCollection::<Checkout>::new();
/// steps
///     .step(Step::method("validate"))
///     .and_group(|steps| {
///         steps.step(Step::method("charge_card")).or_step(Step::method("charge_wallet"));
///     })
///     .and_not_step(Step::method("is_fraud"));
///
/// assert_eq!(steps.len(), 4);
/// assert_eq!(steps.expression().to_string(), "0 && (1 || 2) && !3");
/// ```
pub struct StepCollection<S: Service> {
    steps: Vec<Step<S>>,
    expression: Expression,
    committed: OnceLock<()>,
}

impl<S: Service> StepCollection<S> {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            steps: Vec::new(),
            expression: Expression::Empty,
            committed: OnceLock::new(),
        }
    }

    fn push(&mut self, mut step: Step<S>) -> Expression {
        let index = self.steps.len();
        step.set_index(index);
        self.steps.push(step);
        Expression::Scalar(index)
    }

    fn combine(&mut self, node: Expression, or: bool) -> &mut Self {
        let expression = std::mem::take(&mut self.expression);
        self.expression = if or { expression.or(node) } else { expression.and(node) };
        self
    }

    fn nested(&mut self, build: impl FnOnce(&mut Self)) -> Expression {
        let outer = std::mem::take(&mut self.expression);
        build(self);
        std::mem::replace(&mut self.expression, outer).group()
    }

    /// Appends a step; same as [`StepCollection::and_step`].
    pub fn step(&mut self, step: Step<S>) -> &mut Self {
        self.and_step(step)
    }

    /// Appends a step that runs only when everything before it succeeded.
    pub fn and_step(&mut self, step: Step<S>) -> &mut Self {
        let node = self.push(step);
        self.combine(node, false)
    }

    /// Appends a step that runs only when everything before it did not succeed.
    pub fn or_step(&mut self, step: Step<S>) -> &mut Self {
        let node = self.push(step);
        self.combine(node, true)
    }

    /// Appends an inverted step; same as [`StepCollection::and_not_step`].
    pub fn not_step(&mut self, step: Step<S>) -> &mut Self {
        self.and_not_step(step)
    }

    /// Appends an inverted step combined through `and`.
    pub fn and_not_step(&mut self, step: Step<S>) -> &mut Self {
        let node = self.push(step).not();
        self.combine(node, false)
    }

    /// Appends an inverted step combined through `or`.
    pub fn or_not_step(&mut self, step: Step<S>) -> &mut Self {
        let node = self.push(step).not();
        self.combine(node, true)
    }

    /// Appends a group; same as [`StepCollection::and_group`].
    pub fn group(&mut self, build: impl FnOnce(&mut Self)) -> &mut Self {
        self.and_group(build)
    }

    /// Appends the steps declared by `build` as one operand combined through `and`.
    pub fn and_group(&mut self, build: impl FnOnce(&mut Self)) -> &mut Self {
        let node = self.nested(build);
        self.combine(node, false)
    }

    /// Appends the steps declared by `build` as one operand combined through `or`.
    pub fn or_group(&mut self, build: impl FnOnce(&mut Self)) -> &mut Self {
        let node = self.nested(build);
        self.combine(node, true)
    }

    /// Appends an inverted group; same as [`StepCollection::and_not_group`].
    pub fn not_group(&mut self, build: impl FnOnce(&mut Self)) -> &mut Self {
        self.and_not_group(build)
    }

    /// Appends an inverted group combined through `and`.
    pub fn and_not_group(&mut self, build: impl FnOnce(&mut Self)) -> &mut Self {
        let node = self.nested(build).not();
        self.combine(node, false)
    }

    /// Appends an inverted group combined through `or`.
    pub fn or_not_group(&mut self, build: impl FnOnce(&mut Self)) -> &mut Self {
        let node = self.nested(build).not();
        self.combine(node, true)
    }

    /// Freezes the collection, checking every step's outputs against the organizer's
    /// attributes and every input read against the attributes and declared outputs. Returns
    /// `false` when it was already frozen.
    ///
    /// # Errors
    ///
    /// Returns the first invalid output or input; the collection stays unfrozen.
    pub fn commit(&self, service: &str, attributes: &Attributes<S>) -> Result<bool> {
        if self.is_committed() {
            return Ok(false);
        }

        let outputs: HashSet<&str> = self.steps.iter().flat_map(|step| step.outputs().iter().filter_map(Output::name)).collect();
        for step in &self.steps {
            step.define(service, attributes, &outputs)?;
        }

        Ok(self.committed.set(()).is_ok())
    }

    /// Returns `true` once the collection is frozen.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.committed.get().is_some()
    }

    /// The expression combining the steps.
    #[must_use]
    pub const fn expression(&self) -> &Expression {
        &self.expression
    }

    /// The step at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Step<S>> {
        self.steps.get(index)
    }

    /// The steps in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Step<S>> {
        self.steps.iter()
    }

    /// Visits every step, evaluated or not, in declaration order.
    pub fn each_step(&self, mut visit: impl FnMut(&Step<S>)) {
        for step in &self.steps {
            visit(step);
        }
    }

    /// The number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` when no step is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<S: Service> Default for StepCollection<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Service> Debug for StepCollection<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepCollection")
            .field("steps", &self.steps)
            .field("expression", &self.expression.to_string())
            .field("committed", &self.is_committed())
            .finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use method_middleware::{Arguments, Error};
    use serde_json::json;

    use super::*;

    #[derive(Debug)]
    struct Organizer;

    impl Service for Organizer {
        fn new(_: &Arguments) -> Result<Self> {
            Ok(Self)
        }
    }

    fn method(name: &str) -> Step<Organizer> {
        Step::method(name)
    }

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(StepCollection<Organizer>: Send, Sync, Debug);
    }

    #[test]
    fn directives_combine_left_to_right() {
        let mut steps = StepCollection::new();
        steps
            .step(method("a"))
            .or_step(method("b"))
            .and_step(method("c"))
            .not_step(method("d"))
            .or_not_step(method("e"));

        assert_eq!(
            steps.expression(),
            &Expression::Scalar(0)
                .or(Expression::Scalar(1))
                .and(Expression::Scalar(2))
                .and(Expression::Scalar(3).not())
                .or(Expression::Scalar(4).not())
        );
    }

    #[test]
    fn groups_number_steps_in_declaration_order() {
        let mut steps = StepCollection::new();
        steps
            .group(|steps| {
                steps.step(method("a")).and_step(method("b"));
            })
            .or_group(|steps| {
                steps.step(method("c")).or_step(method("d"));
            })
            .not_group(|steps| {
                steps.step(method("e"));
            })
            .or_not_group(|steps| {
                steps.step(method("f"));
            });

        assert_eq!(steps.expression().to_string(), "(0 && 1) || (2 || 3) && !(4) || !(5)");
        let names: Vec<_> = steps.iter().map(|step| step.action().name().to_owned()).collect();
        assert_eq!(names, ["a", "b", "c", "d", "e", "f"]);
        assert!(steps.iter().enumerate().all(|(index, step)| step.index() == index));
    }

    #[test]
    fn first_or_directive_starts_the_expression() {
        let mut steps = StepCollection::new();
        steps.or_step(method("a"));

        assert_eq!(steps.expression(), &Expression::Scalar(0));
    }

    #[test]
    fn commit_freezes_once() {
        let mut steps = StepCollection::new();
        steps.step(method("a").out("id"));

        assert!(steps.commit("Organizer", &Attributes::new()).unwrap());
        assert!(!steps.commit("Organizer", &Attributes::new()).unwrap());
        assert!(steps.is_committed());
    }

    #[test]
    fn failed_commit_stays_open() {
        let mut attributes = Attributes::new();
        attributes.define("id", |_: &Organizer| json!(1));
        let mut steps = StepCollection::new();
        steps.step(method("a").out("id"));

        let error = steps.commit("Organizer", &attributes).unwrap_err();

        assert!(matches!(error, Error::OutputMethodIsDefinedInContainer { .. }));
        assert!(!steps.is_committed());
    }

    #[test]
    fn inputs_may_read_outputs_of_any_step() {
        let mut steps = StepCollection::new();
        steps.step(method("a").input("total")).and_step(method("b").out("total"));

        assert!(steps.commit("Organizer", &Attributes::new()).unwrap());
    }

    #[test]
    fn each_step_visits_everything() {
        let mut steps = StepCollection::new();
        steps.step(method("a")).or_step(method("b"));
        let mut visited = Vec::new();

        steps.each_step(|step| visited.push(step.index()));

        assert_eq!(visited, [0, 1]);
    }
}
