//! Transformation aggregate: term bindings, operations, and the reference
//! graph between them.
//!
//! The reference graph must be acyclic. We validate with DFS coloring and
//! evaluate in deterministic topological order (BTreeMap keying keeps ties
//! stable), pushing each computed payload into the operations that
//! reference it.

use crate::error::EngineError;
use crate::ops::Operation;
use crate::path::Path;
use crate::problems::Problems;
use crate::value::{Payload, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Per-operation evaluation outcome. `Invalid` carries the Problems that
/// blocked the result; `Failed` is an evaluation-time failure (division by
/// zero, an upstream that produced no value, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(Payload),
    Invalid(Problems),
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct Transformation {
    operations: BTreeMap<Path, Operation>,
    terms: BTreeMap<Path, Value>,
    /// producer -> consumers.
    consumers: BTreeMap<Path, Vec<Path>>,
    /// consumer -> producers.
    producers: BTreeMap<Path, Vec<Path>>,
    problems: Problems,
}

impl Transformation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a term value. Term paths are unique across the transformation.
    pub fn bind_term(&mut self, value: Value) -> Result<(), EngineError> {
        if self.terms.contains_key(&value.path) || self.operations.contains_key(&value.path) {
            return Err(EngineError::DuplicatePath(value.path));
        }
        self.terms.insert(value.path.clone(), value);
        self.revalidate();
        Ok(())
    }

    pub fn term(&self, path: &Path) -> Option<&Value> {
        self.terms.get(path)
    }

    pub fn terms(&self) -> &BTreeMap<Path, Value> {
        &self.terms
    }

    /// Add an operation. Its id must not collide with another operation or
    /// a bound term.
    pub fn add_operation(&mut self, op: Operation) -> Result<(), EngineError> {
        let id = op.id().clone();
        if self.operations.contains_key(&id) || self.terms.contains_key(&id) {
            return Err(EngineError::DuplicatePath(id));
        }
        self.operations.insert(id, op);
        self.revalidate();
        Ok(())
    }

    pub fn operation(&self, id: &Path) -> Option<&Operation> {
        self.operations.get(id)
    }

    pub fn operation_mut(&mut self, id: &Path) -> Option<&mut Operation> {
        self.operations.get_mut(id)
    }

    pub fn operations(&self) -> &BTreeMap<Path, Operation> {
        &self.operations
    }

    /// Operations consuming `producer`'s result.
    pub fn consumers_of(&self, producer: &Path) -> &[Path] {
        self.consumers.get(producer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Operations whose results `consumer` references.
    pub fn producers_of(&self, consumer: &Path) -> &[Path] {
        self.producers.get(consumer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Remove an operation. Refused while another operation still
    /// references its result.
    pub fn remove_operation(&mut self, id: &Path) -> Result<Operation, EngineError> {
        if !self.operations.contains_key(id) {
            return Err(EngineError::UnknownOperation(id.clone()));
        }
        if let Some(consumer) = self.consumers.get(id).and_then(|cs| cs.first()) {
            return Err(EngineError::StillReferenced {
                op: id.clone(),
                consumer: consumer.clone(),
            });
        }

        // Drop edges where this operation was the consumer.
        if let Some(prods) = self.producers.remove(id) {
            for p in prods {
                if let Some(cs) = self.consumers.get_mut(&p) {
                    cs.retain(|c| c != id);
                }
            }
        }
        self.consumers.remove(id);

        let op = self
            .operations
            .remove(id)
            .ok_or_else(|| EngineError::UnknownOperation(id.clone()))?;
        self.revalidate();
        Ok(op)
    }

    /// Feed a bound term into an operation slot.
    pub fn add_term_input(
        &mut self,
        op: &Path,
        slot: &str,
        term: &Path,
    ) -> Result<(), EngineError> {
        let value = self
            .terms
            .get(term)
            .cloned()
            .ok_or_else(|| EngineError::UnknownTerm(term.clone()))?;
        let operation = self
            .operations
            .get_mut(op)
            .ok_or_else(|| EngineError::UnknownOperation(op.clone()))?;
        operation.add_input(slot, value)?;
        self.revalidate();
        Ok(())
    }

    /// Feed an inline literal into an operation slot.
    pub fn add_literal_input(
        &mut self,
        op: &Path,
        slot: &str,
        value: Value,
    ) -> Result<(), EngineError> {
        let operation = self
            .operations
            .get_mut(op)
            .ok_or_else(|| EngineError::UnknownOperation(op.clone()))?;
        operation.add_input(slot, value)?;
        self.revalidate();
        Ok(())
    }

    /// Wire `producer`'s result into `consumer`'s slot as a deferred
    /// reference. Cycles are caught by `check_acyclic` / `evaluate`.
    pub fn link(&mut self, producer: &Path, consumer: &Path, slot: &str) -> Result<(), EngineError> {
        if producer == consumer {
            return Err(EngineError::SelfReference(producer.clone()));
        }
        let result_kinds = self
            .operations
            .get(producer)
            .ok_or_else(|| EngineError::UnknownOperation(producer.clone()))?
            .descriptor()
            .result_kinds;
        let cop = self
            .operations
            .get_mut(consumer)
            .ok_or_else(|| EngineError::UnknownOperation(consumer.clone()))?;
        cop.add_ref(slot, producer.clone(), result_kinds)?;

        self.consumers
            .entry(producer.clone())
            .or_default()
            .push(consumer.clone());
        self.producers
            .entry(consumer.clone())
            .or_default()
            .push(producer.clone());
        Ok(())
    }

    /// Transformation-level problems (currently: terms no operation consumes).
    pub fn problems(&self) -> &Problems {
        &self.problems
    }

    /// DFS coloring over consumer edges; errors with the cycle path.
    pub fn check_acyclic(&self) -> Result<(), EngineError> {
        #[derive(Copy, Clone, PartialEq, Eq)]
        enum Mark {
            Temp,
            Perm,
        }

        fn dfs(
            v: &Path,
            consumers: &BTreeMap<Path, Vec<Path>>,
            marks: &mut BTreeMap<Path, Mark>,
            stack: &mut Vec<Path>,
        ) -> Result<(), EngineError> {
            if let Some(Mark::Perm) = marks.get(v) {
                return Ok(());
            }
            if let Some(Mark::Temp) = marks.get(v) {
                // v is in the current recursion stack => cycle
                stack.push(v.clone());
                return Err(EngineError::cycle(stack));
            }

            marks.insert(v.clone(), Mark::Temp);
            stack.push(v.clone());

            if let Some(next) = consumers.get(v) {
                for n in next {
                    dfs(n, consumers, marks, stack)?;
                }
            }

            stack.pop();
            marks.insert(v.clone(), Mark::Perm);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        let mut stack = Vec::new();
        for id in self.operations.keys() {
            stack.clear();
            dfs(id, &self.consumers, &mut marks, &mut stack)?;
        }
        Ok(())
    }

    // Kahn's algorithm with a BTreeSet frontier: deterministic order, and
    // check_acyclic has already ruled out cycles.
    fn topo_order(&self) -> Result<Vec<Path>, EngineError> {
        self.check_acyclic()?;

        let mut indegree: BTreeMap<Path, usize> = self
            .operations
            .keys()
            .map(|k| (k.clone(), 0))
            .collect();
        for (consumer, prods) in &self.producers {
            if let Some(d) = indegree.get_mut(consumer) {
                *d = prods.len();
            }
        }

        let mut ready: BTreeSet<Path> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(k, _)| k.clone())
            .collect();

        let mut order = Vec::with_capacity(self.operations.len());
        while let Some(next) = ready.iter().next().cloned() {
            ready.remove(&next);
            for c in self.consumers_of(&next).to_vec() {
                if let Some(d) = indegree.get_mut(&c) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(c);
                    }
                }
            }
            order.push(next);
        }

        if order.len() != self.operations.len() {
            return Err(EngineError::internal(
                "topological order incomplete after acyclicity check",
            ));
        }
        Ok(order)
    }

    /// Evaluate every operation in topological order. Structural failures
    /// (cycles) error out; per-operation failures land in the outcome map so
    /// one bad operation does not hide the rest of the graph.
    pub fn evaluate(&mut self) -> Result<BTreeMap<Path, Outcome>, EngineError> {
        let order = self.topo_order()?;
        let mut outcomes: BTreeMap<Path, Outcome> = BTreeMap::new();

        for id in order {
            let outcome = {
                let op = self
                    .operations
                    .get_mut(&id)
                    .ok_or_else(|| EngineError::UnknownOperation(id.clone()))?;
                if op.problems().has_errors() {
                    Outcome::Invalid(op.problems().clone())
                } else if op.has_unresolved_refs() {
                    // An upstream produced no value; topological order means
                    // it has already been reported in `outcomes`.
                    let sources = op
                        .unresolved_sources()
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    Outcome::Failed(format!("reference {} produced no value", sources))
                } else {
                    match op.result() {
                        Ok(p) => Outcome::Value(p.clone()),
                        Err(e) => Outcome::Failed(e.to_string()),
                    }
                }
            };

            if let Outcome::Value(payload) = &outcome {
                for c in self.consumers_of(&id).to_vec() {
                    if let Some(cop) = self.operations.get_mut(&c) {
                        if cop.has_pending_ref(&id) {
                            cop.resolve_ref(&id, payload.clone())?;
                        }
                    }
                }
            }
            outcomes.insert(id, outcome);
        }
        Ok(outcomes)
    }

    // Unconsumed-term warnings, recomputed on every structural mutation.
    fn revalidate(&mut self) {
        let mut consumed: BTreeSet<Path> = BTreeSet::new();
        for op in self.operations.values() {
            for values in op.inputs().values() {
                for v in values {
                    consumed.insert(v.path.clone());
                }
            }
        }

        self.problems.clear();
        for path in self.terms.keys() {
            if !consumed.contains(path) {
                self.problems
                    .warning(path.as_str(), "term is not consumed by any operation");
            }
        }
    }
}
