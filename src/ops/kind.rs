//! Operation kinds: descriptors and reducers.
//!
//! Every kind declares its input slots up front: slot id, arity bounds, and
//! the payload kinds it accepts. The validation protocol in `ops` checks
//! actual inputs against these tables; the reducers here assume validated
//! input and only fail on value-dependent conditions (division by zero,
//! overflow, negative square root).
//!
//! Numeric rule: all-int input stays int (checked arithmetic), any float in
//! the mix promotes the computation to float.

use super::SlotValues;
use crate::error::EngineError;
use crate::path::Path;
use crate::value::{Payload, Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

pub const NUMERIC: &[ValueKind] = &[ValueKind::Int, ValueKind::Float];
pub const ANY: &[ValueKind] = &[
    ValueKind::Int,
    ValueKind::Float,
    ValueKind::Bool,
    ValueKind::Text,
];
const INT_ONLY: &[ValueKind] = &[ValueKind::Int];
const FLOAT_ONLY: &[ValueKind] = &[ValueKind::Float];
const TEXT_ONLY: &[ValueKind] = &[ValueKind::Text];

/// Arity bounds + accepted kinds for one named input list.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InputSlot {
    pub id: &'static str,
    pub min: usize,
    /// None = unbounded.
    pub max: Option<usize>,
    pub kinds: &'static [ValueKind],
}

/// Static description of an operation kind.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Descriptor {
    pub kind: OpKind,
    pub name: &'static str,
    pub description: &'static str,
    pub slots: &'static [InputSlot],
    /// Kinds the reducer can produce. Used to pre-check deferred references.
    pub result_kinds: &'static [ValueKind],
}

impl Descriptor {
    pub fn slot(&self, id: &str) -> Option<&'static InputSlot> {
        self.slots.iter().find(|s| s.id == id)
    }

    /// Default slot for spec inputs that do not name one.
    pub fn first_slot(&self) -> &'static InputSlot {
        &self.slots[0]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Power,
    AbsoluteValue,
    SquareRoot,
    Ceiling,
    Floor,
    Round,
    Count,
    Average,
    Median,
    Mode,
    Min,
    Max,
    Concat,
}

const TERMS_2N_NUMERIC: &[InputSlot] = &[InputSlot {
    id: "terms",
    min: 2,
    max: None,
    kinds: NUMERIC,
}];

const TERMS_1N_NUMERIC: &[InputSlot] = &[InputSlot {
    id: "terms",
    min: 1,
    max: None,
    kinds: NUMERIC,
}];

const TERMS_1_NUMERIC: &[InputSlot] = &[InputSlot {
    id: "terms",
    min: 1,
    max: Some(1),
    kinds: NUMERIC,
}];

static ADD: Descriptor = Descriptor {
    kind: OpKind::Add,
    name: "add",
    description: "Sum of the input terms",
    slots: TERMS_2N_NUMERIC,
    result_kinds: NUMERIC,
};

static SUBTRACT: Descriptor = Descriptor {
    kind: OpKind::Subtract,
    name: "subtract",
    description: "Left fold of subtraction over the input terms",
    slots: TERMS_2N_NUMERIC,
    result_kinds: NUMERIC,
};

static MULTIPLY: Descriptor = Descriptor {
    kind: OpKind::Multiply,
    name: "multiply",
    description: "Product of the input terms",
    slots: TERMS_2N_NUMERIC,
    result_kinds: NUMERIC,
};

static DIVIDE: Descriptor = Descriptor {
    kind: OpKind::Divide,
    name: "divide",
    description: "Left fold of division over the input terms",
    slots: TERMS_2N_NUMERIC,
    result_kinds: FLOAT_ONLY,
};

static MODULUS: Descriptor = Descriptor {
    kind: OpKind::Modulus,
    name: "modulus",
    description: "Remainder of dividend / divisor",
    slots: &[
        InputSlot {
            id: "dividend",
            min: 1,
            max: Some(1),
            kinds: NUMERIC,
        },
        InputSlot {
            id: "divisor",
            min: 1,
            max: Some(1),
            kinds: NUMERIC,
        },
    ],
    result_kinds: NUMERIC,
};

static POWER: Descriptor = Descriptor {
    kind: OpKind::Power,
    name: "power",
    description: "Base raised to the exponent",
    slots: &[
        InputSlot {
            id: "base",
            min: 1,
            max: Some(1),
            kinds: NUMERIC,
        },
        InputSlot {
            id: "exponent",
            min: 1,
            max: Some(1),
            kinds: NUMERIC,
        },
    ],
    result_kinds: NUMERIC,
};

static ABSOLUTE_VALUE: Descriptor = Descriptor {
    kind: OpKind::AbsoluteValue,
    name: "absolute-value",
    description: "Absolute value of the single input term",
    slots: TERMS_1_NUMERIC,
    result_kinds: NUMERIC,
};

static SQUARE_ROOT: Descriptor = Descriptor {
    kind: OpKind::SquareRoot,
    name: "square-root",
    description: "Square root of the single input term",
    slots: TERMS_1_NUMERIC,
    result_kinds: FLOAT_ONLY,
};

static CEILING: Descriptor = Descriptor {
    kind: OpKind::Ceiling,
    name: "ceiling",
    description: "Smallest integer not below the input term",
    slots: TERMS_1_NUMERIC,
    result_kinds: INT_ONLY,
};

static FLOOR: Descriptor = Descriptor {
    kind: OpKind::Floor,
    name: "floor",
    description: "Largest integer not above the input term",
    slots: TERMS_1_NUMERIC,
    result_kinds: INT_ONLY,
};

static ROUND: Descriptor = Descriptor {
    kind: OpKind::Round,
    name: "round",
    description: "Round half away from zero, optionally to a digit count",
    slots: &[
        InputSlot {
            id: "value",
            min: 1,
            max: Some(1),
            kinds: NUMERIC,
        },
        InputSlot {
            id: "digits",
            min: 0,
            max: Some(1),
            kinds: INT_ONLY,
        },
    ],
    result_kinds: NUMERIC,
};

static COUNT: Descriptor = Descriptor {
    kind: OpKind::Count,
    name: "count",
    description: "Number of input terms",
    slots: &[InputSlot {
        id: "terms",
        min: 0,
        max: None,
        kinds: ANY,
    }],
    result_kinds: INT_ONLY,
};

static AVERAGE: Descriptor = Descriptor {
    kind: OpKind::Average,
    name: "average",
    description: "Arithmetic mean of the input terms",
    slots: TERMS_1N_NUMERIC,
    result_kinds: FLOAT_ONLY,
};

static MEDIAN: Descriptor = Descriptor {
    kind: OpKind::Median,
    name: "median",
    description: "Middle value; mean of the middle two for an even count",
    slots: TERMS_1N_NUMERIC,
    result_kinds: FLOAT_ONLY,
};

static MODE: Descriptor = Descriptor {
    kind: OpKind::Mode,
    name: "mode",
    description: "Most frequent value; ties break to the smallest",
    slots: TERMS_1N_NUMERIC,
    result_kinds: NUMERIC,
};

static MIN: Descriptor = Descriptor {
    kind: OpKind::Min,
    name: "min",
    description: "Smallest input term",
    slots: TERMS_1N_NUMERIC,
    result_kinds: NUMERIC,
};

static MAX: Descriptor = Descriptor {
    kind: OpKind::Max,
    name: "max",
    description: "Largest input term",
    slots: TERMS_1N_NUMERIC,
    result_kinds: NUMERIC,
};

static CONCAT: Descriptor = Descriptor {
    kind: OpKind::Concat,
    name: "concat",
    description: "Concatenation of the input terms' canonical text",
    slots: &[InputSlot {
        id: "terms",
        min: 2,
        max: None,
        kinds: ANY,
    }],
    result_kinds: TEXT_ONLY,
};

/// Every registered descriptor, in kind-listing order.
pub static DESCRIPTORS: &[&Descriptor] = &[
    &ADD,
    &SUBTRACT,
    &MULTIPLY,
    &DIVIDE,
    &MODULUS,
    &POWER,
    &ABSOLUTE_VALUE,
    &SQUARE_ROOT,
    &CEILING,
    &FLOOR,
    &ROUND,
    &COUNT,
    &AVERAGE,
    &MEDIAN,
    &MODE,
    &MIN,
    &MAX,
    &CONCAT,
];

impl OpKind {
    pub fn descriptor(self) -> &'static Descriptor {
        match self {
            OpKind::Add => &ADD,
            OpKind::Subtract => &SUBTRACT,
            OpKind::Multiply => &MULTIPLY,
            OpKind::Divide => &DIVIDE,
            OpKind::Modulus => &MODULUS,
            OpKind::Power => &POWER,
            OpKind::AbsoluteValue => &ABSOLUTE_VALUE,
            OpKind::SquareRoot => &SQUARE_ROOT,
            OpKind::Ceiling => &CEILING,
            OpKind::Floor => &FLOOR,
            OpKind::Round => &ROUND,
            OpKind::Count => &COUNT,
            OpKind::Average => &AVERAGE,
            OpKind::Median => &MEDIAN,
            OpKind::Mode => &MODE,
            OpKind::Min => &MIN,
            OpKind::Max => &MAX,
            OpKind::Concat => &CONCAT,
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Resolve a kind by its spec name ("add", "absolute-value", ...).
    pub fn parse(name: &str) -> Result<Self, EngineError> {
        DESCRIPTORS
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.kind)
            .ok_or_else(|| EngineError::UnknownKind(name.to_string()))
    }

    /// Run the reducer over validated inputs.
    pub(crate) fn apply(self, op: &Path, inputs: &SlotValues) -> Result<Payload, EngineError> {
        match self {
            OpKind::Add => fold_numeric(op, terms(inputs), i64::checked_add, |a, b| a + b),
            OpKind::Subtract => fold_numeric(op, terms(inputs), i64::checked_sub, |a, b| a - b),
            OpKind::Multiply => fold_numeric(op, terms(inputs), i64::checked_mul, |a, b| a * b),
            OpKind::Divide => divide(op, terms(inputs)),
            OpKind::Modulus => modulus(op, inputs),
            OpKind::Power => power(op, inputs),
            OpKind::AbsoluteValue => absolute_value(op, single(op, inputs, "terms")?),
            OpKind::SquareRoot => square_root(op, single(op, inputs, "terms")?),
            OpKind::Ceiling => to_int(op, single(op, inputs, "terms")?, f64::ceil),
            OpKind::Floor => to_int(op, single(op, inputs, "terms")?, f64::floor),
            OpKind::Round => round(op, inputs),
            OpKind::Count => Ok(Payload::Int(terms(inputs).len() as i64)),
            OpKind::Average => average(op, terms(inputs)),
            OpKind::Median => median(op, terms(inputs)),
            OpKind::Mode => mode(op, terms(inputs)),
            OpKind::Min => extremum(op, terms(inputs), Ordering::Less),
            OpKind::Max => extremum(op, terms(inputs), Ordering::Greater),
            OpKind::Concat => Ok(Payload::Text(
                terms(inputs)
                    .iter()
                    .map(|v| v.payload.canonical_text())
                    .collect::<String>(),
            )),
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn terms(inputs: &SlotValues) -> &[Value] {
    slot(inputs, "terms")
}

fn slot<'a>(inputs: &'a SlotValues, id: &str) -> &'a [Value] {
    inputs.get(id).map(Vec::as_slice).unwrap_or_default()
}

fn single<'a>(op: &Path, inputs: &'a SlotValues, id: &str) -> Result<&'a Payload, EngineError> {
    match slot(inputs, id) {
        [v] => Ok(&v.payload),
        other => Err(EngineError::internal(format!(
            "operation {op}: slot {id:?} expected exactly 1 validated value, has {}",
            other.len()
        ))),
    }
}

fn numeric(op: &Path, p: &Payload) -> Result<f64, EngineError> {
    p.as_f64().ok_or_else(|| {
        EngineError::internal(format!(
            "operation {op}: non-numeric payload survived validation: {p:?}"
        ))
    })
}

fn all_ints(values: &[Value]) -> Option<Vec<i64>> {
    values
        .iter()
        .map(|v| match v.payload {
            Payload::Int(i) => Some(i),
            _ => None,
        })
        .collect()
}

fn floats(op: &Path, values: &[Value]) -> Result<Vec<f64>, EngineError> {
    values.iter().map(|v| numeric(op, &v.payload)).collect()
}

/// Int fold when every input is int (checked), float fold otherwise.
fn fold_numeric(
    op: &Path,
    values: &[Value],
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Payload, EngineError> {
    if let Some(ints) = all_ints(values) {
        let (first, rest) = ints
            .split_first()
            .ok_or_else(|| EngineError::internal(format!("operation {op}: empty fold")))?;
        let mut acc = *first;
        for v in rest {
            acc = int_op(acc, *v).ok_or_else(|| EngineError::Overflow(op.clone()))?;
        }
        return Ok(Payload::Int(acc));
    }

    let fs = floats(op, values)?;
    let (first, rest) = fs
        .split_first()
        .ok_or_else(|| EngineError::internal(format!("operation {op}: empty fold")))?;
    let mut acc = *first;
    for v in rest {
        acc = float_op(acc, *v);
    }
    Ok(Payload::Float(acc))
}

// Division always produces float; every divisor is checked against zero.
fn divide(op: &Path, values: &[Value]) -> Result<Payload, EngineError> {
    let fs = floats(op, values)?;
    let (first, rest) = fs
        .split_first()
        .ok_or_else(|| EngineError::internal(format!("operation {op}: empty fold")))?;
    let mut acc = *first;
    for v in rest {
        if *v == 0.0 {
            return Err(EngineError::DivisionByZero(op.clone()));
        }
        acc /= *v;
    }
    Ok(Payload::Float(acc))
}

fn modulus(op: &Path, inputs: &SlotValues) -> Result<Payload, EngineError> {
    let dividend = single(op, inputs, "dividend")?;
    let divisor = single(op, inputs, "divisor")?;
    match (dividend, divisor) {
        (Payload::Int(a), Payload::Int(b)) => {
            if *b == 0 {
                return Err(EngineError::DivisionByZero(op.clone()));
            }
            a.checked_rem(*b)
                .map(Payload::Int)
                .ok_or_else(|| EngineError::Overflow(op.clone()))
        }
        _ => {
            let a = numeric(op, dividend)?;
            let b = numeric(op, divisor)?;
            if b == 0.0 {
                return Err(EngineError::DivisionByZero(op.clone()));
            }
            Ok(Payload::Float(a % b))
        }
    }
}

fn power(op: &Path, inputs: &SlotValues) -> Result<Payload, EngineError> {
    let base = single(op, inputs, "base")?;
    let exponent = single(op, inputs, "exponent")?;
    match (base, exponent) {
        (Payload::Int(b), Payload::Int(e)) if *e >= 0 => {
            let e = u32::try_from(*e).map_err(|_| EngineError::Overflow(op.clone()))?;
            b.checked_pow(e)
                .map(Payload::Int)
                .ok_or_else(|| EngineError::Overflow(op.clone()))
        }
        _ => {
            let b = numeric(op, base)?;
            let e = numeric(op, exponent)?;
            Ok(Payload::Float(b.powf(e)))
        }
    }
}

fn absolute_value(op: &Path, p: &Payload) -> Result<Payload, EngineError> {
    match p {
        Payload::Int(v) => v
            .checked_abs()
            .map(Payload::Int)
            .ok_or_else(|| EngineError::Overflow(op.clone())),
        _ => Ok(Payload::Float(numeric(op, p)?.abs())),
    }
}

fn square_root(op: &Path, p: &Payload) -> Result<Payload, EngineError> {
    let v = numeric(op, p)?;
    if v < 0.0 {
        return Err(EngineError::NegativeSquareRoot {
            op: op.clone(),
            value: v,
        });
    }
    Ok(Payload::Float(v.sqrt()))
}

// Ceiling/floor: ints pass through, floats land on an int after range check.
fn to_int(op: &Path, p: &Payload, f: impl Fn(f64) -> f64) -> Result<Payload, EngineError> {
    match p {
        Payload::Int(v) => Ok(Payload::Int(*v)),
        _ => int_from_f64(op, f(numeric(op, p)?)).map(Payload::Int),
    }
}

fn int_from_f64(op: &Path, v: f64) -> Result<i64, EngineError> {
    if v.is_finite() && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
        Ok(v as i64)
    } else {
        Err(EngineError::OutOfRange {
            op: op.clone(),
            value: v,
        })
    }
}

fn round(op: &Path, inputs: &SlotValues) -> Result<Payload, EngineError> {
    let value = single(op, inputs, "value")?;
    let digits = match slot(inputs, "digits") {
        [] => None,
        [d] => Some(&d.payload),
        other => {
            return Err(EngineError::internal(format!(
                "operation {op}: slot \"digits\" expected at most 1 validated value, has {}",
                other.len()
            )));
        }
    };

    match (value, digits) {
        (Payload::Int(v), None) => Ok(Payload::Int(*v)),
        (p, None) => int_from_f64(op, numeric(op, p)?.round()).map(Payload::Int),
        (p, Some(Payload::Int(d))) => {
            let d = i32::try_from(*d).map_err(|_| EngineError::OutOfRange {
                op: op.clone(),
                value: *d as f64,
            })?;
            let factor = 10f64.powi(d);
            let v = numeric(op, p)?;
            Ok(Payload::Float((v * factor).round() / factor))
        }
        (_, Some(d)) => Err(EngineError::internal(format!(
            "operation {op}: non-int digits survived validation: {d:?}"
        ))),
    }
}

fn average(op: &Path, values: &[Value]) -> Result<Payload, EngineError> {
    let fs = floats(op, values)?;
    if fs.is_empty() {
        return Err(EngineError::internal(format!(
            "operation {op}: average over empty input"
        )));
    }
    Ok(Payload::Float(fs.iter().sum::<f64>() / fs.len() as f64))
}

fn median(op: &Path, values: &[Value]) -> Result<Payload, EngineError> {
    let mut fs = floats(op, values)?;
    if fs.is_empty() {
        return Err(EngineError::internal(format!(
            "operation {op}: median over empty input"
        )));
    }
    fs.sort_by(f64::total_cmp);
    let mid = fs.len() / 2;
    let m = if fs.len() % 2 == 1 {
        fs[mid]
    } else {
        (fs[mid - 1] + fs[mid]) / 2.0
    };
    Ok(Payload::Float(m))
}

// Most frequent value; ties break to the numerically smallest. The winning
// run's first payload is returned, so an all-int run stays int.
fn mode(op: &Path, values: &[Value]) -> Result<Payload, EngineError> {
    let mut keyed: Vec<(f64, &Payload)> = values
        .iter()
        .map(|v| Ok((numeric(op, &v.payload)?, &v.payload)))
        .collect::<Result<_, EngineError>>()?;
    if keyed.is_empty() {
        return Err(EngineError::internal(format!(
            "operation {op}: mode over empty input"
        )));
    }
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut best: Option<(usize, &Payload)> = None;
    let mut i = 0;
    while i < keyed.len() {
        let run_start = i;
        while i < keyed.len() && keyed[i].0.total_cmp(&keyed[run_start].0) == Ordering::Equal {
            i += 1;
        }
        let run_len = i - run_start;
        // Strictly-greater keeps the smallest value on ties.
        if best.map(|(n, _)| run_len > n).unwrap_or(true) {
            best = Some((run_len, keyed[run_start].1));
        }
    }
    match best {
        Some((_, p)) => Ok(p.clone()),
        None => Err(EngineError::internal(format!(
            "operation {op}: mode found no runs"
        ))),
    }
}

fn extremum(op: &Path, values: &[Value], keep: Ordering) -> Result<Payload, EngineError> {
    let mut best: Option<(f64, &Payload)> = None;
    for v in values {
        let f = numeric(op, &v.payload)?;
        // Strict comparison keeps the first-seen payload on ties.
        let replace = match best {
            None => true,
            Some((b, _)) => f.total_cmp(&b) == keep,
        };
        if replace {
            best = Some((f, &v.payload));
        }
    }
    match best {
        Some((_, p)) => Ok(p.clone()),
        None => Err(EngineError::internal(format!(
            "operation {op}: extremum over empty input"
        ))),
    }
}
