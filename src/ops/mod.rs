//! Operation instances: named input lists, the validation protocol, and the
//! lazily computed result.
//!
//! The protocol: every mutation (add/remove input, add/resolve reference)
//! clears the result cache and recomputes Problems against the kind's
//! descriptor: arity per slot, payload kind per value, kind overlap per
//! deferred reference. `result()` refuses to run while Problems holds an
//! error and caches the payload until the next mutation.

mod kind;

pub use kind::{DESCRIPTORS, Descriptor, InputSlot, OpKind};

use crate::error::EngineError;
use crate::path::Path;
use crate::problems::{Problems, State};
use crate::value::{Payload, Value, ValueKind};
use std::collections::BTreeMap;

/// Input values per slot id.
pub type SlotValues = BTreeMap<String, Vec<Value>>;

/// A deferred input: the result of another operation, wired in at
/// evaluation time. Counts toward slot arity from the moment it is added.
#[derive(Debug, Clone)]
pub struct RefInput {
    pub source: Path,
    kinds: &'static [ValueKind],
}

#[derive(Debug, Clone)]
pub struct Operation {
    id: Path,
    kind: OpKind,
    inputs: SlotValues,
    refs: BTreeMap<String, Vec<RefInput>>,
    problems: Problems,
    result: Option<Payload>,
}

impl Operation {
    /// A fresh operation validates immediately: slots with min > 0 start out
    /// with arity errors until inputs arrive.
    pub fn new(id: Path, kind: OpKind) -> Self {
        let mut op = Self {
            id,
            kind,
            inputs: SlotValues::new(),
            refs: BTreeMap::new(),
            problems: Problems::new(),
            result: None,
        };
        op.revalidate();
        op
    }

    pub fn id(&self) -> &Path {
        &self.id
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn descriptor(&self) -> &'static Descriptor {
        self.kind.descriptor()
    }

    pub fn inputs(&self) -> &SlotValues {
        &self.inputs
    }

    pub fn problems(&self) -> &Problems {
        &self.problems
    }

    pub fn state(&self) -> State {
        self.problems.state()
    }

    fn check_slot(&self, slot: &str) -> Result<(), EngineError> {
        if self.descriptor().slot(slot).is_none() {
            return Err(EngineError::UnknownSlot {
                op: self.id.clone(),
                slot: slot.to_string(),
            });
        }
        Ok(())
    }

    /// Add a value to a named slot. Unknown slot ids are rejected eagerly;
    /// arity/type violations land in Problems instead.
    pub fn add_input(&mut self, slot: &str, value: Value) -> Result<(), EngineError> {
        self.check_slot(slot)?;
        self.inputs.entry(slot.to_string()).or_default().push(value);
        self.mutated();
        Ok(())
    }

    /// Remove the first input on `slot` bound to `path`.
    pub fn remove_input(&mut self, slot: &str, path: &Path) -> Result<Value, EngineError> {
        self.check_slot(slot)?;
        let values = self.inputs.entry(slot.to_string()).or_default();
        let pos = values.iter().position(|v| &v.path == path).ok_or_else(|| {
            EngineError::InputNotFound {
                op: self.id.clone(),
                slot: slot.to_string(),
                path: path.clone(),
            }
        })?;
        let removed = values.remove(pos);
        self.mutated();
        Ok(removed)
    }

    /// Register a deferred reference to an upstream operation's result.
    /// `source_kinds` are the upstream kind's possible result kinds; they are
    /// checked statically against the slot's accepted kinds.
    pub fn add_ref(
        &mut self,
        slot: &str,
        source: Path,
        source_kinds: &'static [ValueKind],
    ) -> Result<(), EngineError> {
        self.check_slot(slot)?;
        self.refs.entry(slot.to_string()).or_default().push(RefInput {
            source,
            kinds: source_kinds,
        });
        self.mutated();
        Ok(())
    }

    /// Replace the deferred reference to `source` with its computed payload.
    pub fn resolve_ref(&mut self, source: &Path, payload: Payload) -> Result<(), EngineError> {
        let found = self.refs.iter().find_map(|(slot, refs)| {
            refs.iter()
                .position(|r| &r.source == source)
                .map(|pos| (slot.clone(), pos))
        });
        let Some((slot, pos)) = found else {
            return Err(EngineError::internal(format!(
                "operation {} has no pending reference to {}",
                self.id, source
            )));
        };
        if let Some(refs) = self.refs.get_mut(&slot) {
            refs.remove(pos);
        }
        self.inputs
            .entry(slot)
            .or_default()
            .push(Value::new(source.clone(), payload));
        self.mutated();
        Ok(())
    }

    pub fn has_unresolved_refs(&self) -> bool {
        self.refs.values().any(|v| !v.is_empty())
    }

    pub fn has_pending_ref(&self, source: &Path) -> bool {
        self.refs
            .values()
            .any(|v| v.iter().any(|r| &r.source == source))
    }

    /// Sources of still-unresolved references, in slot order.
    pub fn unresolved_sources(&self) -> Vec<&Path> {
        self.refs
            .values()
            .flat_map(|v| v.iter().map(|r| &r.source))
            .collect()
    }

    /// Result cached by a previous `result()` call, if still valid.
    pub fn cached_result(&self) -> Option<&Payload> {
        self.result.as_ref()
    }

    /// Lazily compute the result. Fails while Problems holds an error or a
    /// reference is still unresolved; evaluation failures (division by zero,
    /// overflow, ...) surface as their own variants.
    pub fn result(&mut self) -> Result<&Payload, EngineError> {
        if self.problems.has_errors() {
            return Err(EngineError::invalid_state(&self.id, &self.problems));
        }
        if self.has_unresolved_refs() {
            return Err(EngineError::UnresolvedRefs(self.id.clone()));
        }
        if self.result.is_none() {
            self.result = Some(self.kind.apply(&self.id, &self.inputs)?);
        }
        match &self.result {
            Some(p) => Ok(p),
            None => Err(EngineError::internal("result cache empty after compute")),
        }
    }

    fn mutated(&mut self) {
        self.result = None;
        self.revalidate();
    }

    // The protocol core: recompute Problems from scratch against the
    // descriptor. Never lazy.
    fn revalidate(&mut self) {
        self.problems.clear();
        let desc = self.kind.descriptor();

        for slot in desc.slots {
            let values = self.inputs.get(slot.id).map(Vec::as_slice).unwrap_or_default();
            let refs = self.refs.get(slot.id).map(Vec::as_slice).unwrap_or_default();
            let actual = values.len() + refs.len();

            // 1) Arity against declared bounds.
            if actual < slot.min {
                self.problems.error(
                    slot.id,
                    format!("requires at least {} value(s), has {}", slot.min, actual),
                );
            }
            if let Some(max) = slot.max {
                if actual > max {
                    self.problems.error(
                        slot.id,
                        format!("accepts at most {} value(s), has {}", max, actual),
                    );
                }
            }

            // 2) Each value's runtime kind against the accepted set.
            let mut has_int = false;
            let mut has_float = false;
            for v in values {
                let k = v.kind();
                if !slot.kinds.contains(&k) {
                    self.problems.error(
                        slot.id,
                        format!("does not accept {} value {}", k, v.path),
                    );
                }
                has_int |= k == ValueKind::Int;
                has_float |= k == ValueKind::Float;
            }

            // 3) Deferred references: their possible result kinds must
            // overlap the accepted set.
            for r in refs {
                if !r.kinds.iter().any(|k| slot.kinds.contains(k)) {
                    self.problems.error(
                        slot.id,
                        format!(
                            "reference {} produces {} but slot accepts {}",
                            r.source,
                            kind_list(r.kinds),
                            kind_list(slot.kinds)
                        ),
                    );
                }
            }

            if has_int
                && has_float
                && slot.kinds.contains(&ValueKind::Int)
                && slot.kinds.contains(&ValueKind::Float)
            {
                self.problems
                    .warning(slot.id, "mixed int and float inputs promote to float");
            }
        }
    }
}

fn kind_list(kinds: &[ValueKind]) -> String {
    kinds
        .iter()
        .map(|k| k.name())
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn val(path: &str, payload: Payload) -> Value {
        Value::new(p(path), payload)
    }

    #[test]
    fn fresh_operation_reports_missing_arity() {
        let op = Operation::new(p("/calc/total"), OpKind::Add);
        assert_eq!(op.state(), State::Error);
        let messages: Vec<_> = op.problems().iter().map(|pr| pr.message.clone()).collect();
        assert_eq!(messages, vec!["requires at least 2 value(s), has 0"]);
    }

    #[test]
    fn problems_clear_as_inputs_arrive() {
        let mut op = Operation::new(p("/calc/total"), OpKind::Add);
        op.add_input("terms", val("/t/a", Payload::Int(1))).unwrap();
        assert_eq!(op.state(), State::Error);
        op.add_input("terms", val("/t/b", Payload::Int(2))).unwrap();
        assert_eq!(op.state(), State::Ok);
    }

    #[test]
    fn unknown_slot_is_rejected_eagerly() {
        let mut op = Operation::new(p("/calc/total"), OpKind::Add);
        let err = op
            .add_input("addends", val("/t/a", Payload::Int(1)))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownSlot { .. }));
        // The failed mutation left no trace.
        assert!(op.inputs().is_empty());
    }

    #[test]
    fn type_violation_is_a_problem_not_a_rejection() {
        let mut op = Operation::new(p("/calc/total"), OpKind::Add);
        op.add_input("terms", val("/t/a", Payload::Int(1))).unwrap();
        op.add_input("terms", val("/t/b", Payload::Text("x".into())))
            .unwrap();
        assert_eq!(op.state(), State::Error);
        assert!(
            op.problems()
                .iter()
                .any(|pr| pr.message.contains("does not accept text value /t/b"))
        );
    }

    #[test]
    fn mixed_numeric_kinds_warn() {
        let mut op = Operation::new(p("/calc/total"), OpKind::Add);
        op.add_input("terms", val("/t/a", Payload::Int(1))).unwrap();
        op.add_input("terms", val("/t/b", Payload::Float(0.5))).unwrap();
        assert_eq!(op.state(), State::Warning);
        assert_eq!(op.result().unwrap(), &Payload::Float(1.5));
    }

    #[test]
    fn too_many_inputs_is_an_error() {
        let mut op = Operation::new(p("/calc/abs"), OpKind::AbsoluteValue);
        op.add_input("terms", val("/t/a", Payload::Int(-1))).unwrap();
        op.add_input("terms", val("/t/b", Payload::Int(2))).unwrap();
        assert_eq!(op.state(), State::Error);
        assert!(
            op.problems()
                .iter()
                .any(|pr| pr.message == "accepts at most 1 value(s), has 2")
        );
    }

    #[test]
    fn result_fails_while_problems_hold_an_error() {
        let mut op = Operation::new(p("/calc/total"), OpKind::Add);
        op.add_input("terms", val("/t/a", Payload::Int(1))).unwrap();
        let err = op.result().unwrap_err();
        match err {
            EngineError::InvalidState { op: id, problems } => {
                assert_eq!(id.as_str(), "/calc/total");
                assert!(problems.has_errors());
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[test]
    fn result_is_cached_until_mutation() {
        let mut op = Operation::new(p("/calc/total"), OpKind::Add);
        op.add_input("terms", val("/t/a", Payload::Int(1))).unwrap();
        op.add_input("terms", val("/t/b", Payload::Int(2))).unwrap();
        assert_eq!(op.result().unwrap(), &Payload::Int(3));
        assert_eq!(op.cached_result(), Some(&Payload::Int(3)));

        op.add_input("terms", val("/t/c", Payload::Int(4))).unwrap();
        assert_eq!(op.cached_result(), None);
        assert_eq!(op.result().unwrap(), &Payload::Int(7));
    }

    #[test]
    fn remove_input_revalidates() {
        let mut op = Operation::new(p("/calc/total"), OpKind::Add);
        op.add_input("terms", val("/t/a", Payload::Int(1))).unwrap();
        op.add_input("terms", val("/t/b", Payload::Int(2))).unwrap();
        assert_eq!(op.state(), State::Ok);

        let removed = op.remove_input("terms", &p("/t/b")).unwrap();
        assert_eq!(removed.payload, Payload::Int(2));
        assert_eq!(op.state(), State::Error);

        let err = op.remove_input("terms", &p("/t/missing")).unwrap_err();
        assert!(matches!(err, EngineError::InputNotFound { .. }));
    }

    #[test]
    fn refs_count_toward_arity_and_resolve_to_values() {
        let mut op = Operation::new(p("/calc/total"), OpKind::Add);
        op.add_input("terms", val("/t/a", Payload::Int(1))).unwrap();
        op.add_ref("terms", p("/calc/tax"), kind::NUMERIC).unwrap();
        // Arity satisfied, but the value is not there yet.
        assert_eq!(op.state(), State::Ok);
        assert!(matches!(
            op.result(),
            Err(EngineError::UnresolvedRefs(_))
        ));

        op.resolve_ref(&p("/calc/tax"), Payload::Int(5)).unwrap();
        assert_eq!(op.result().unwrap(), &Payload::Int(6));
    }

    #[test]
    fn ref_with_disjoint_kinds_is_an_error() {
        let mut op = Operation::new(p("/calc/total"), OpKind::Add);
        op.add_input("terms", val("/t/a", Payload::Int(1))).unwrap();
        // concat produces text; a numeric slot can never accept it.
        op.add_ref("terms", p("/calc/label"), OpKind::Concat.descriptor().result_kinds)
            .unwrap();
        assert_eq!(op.state(), State::Error);
        assert!(
            op.problems()
                .iter()
                .any(|pr| pr.message.contains("produces text but slot accepts int|float"))
        );
    }

    #[test]
    fn evaluation_failure_is_not_a_problem() {
        let mut op = Operation::new(p("/calc/ratio"), OpKind::Divide);
        op.add_input("terms", val("/t/a", Payload::Int(1))).unwrap();
        op.add_input("terms", val("/t/b", Payload::Int(0))).unwrap();
        assert_eq!(op.state(), State::Ok);
        assert!(matches!(
            op.result(),
            Err(EngineError::DivisionByZero(_))
        ));
    }
}
