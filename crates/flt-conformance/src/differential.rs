//! Fixture-driven differential run: primary execution through an injected
//! `LayerExecutor` against direct reference evaluation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use flt_dtype::{InputTensor, TensorData};
use flt_graph::{
    build_unary_graph, GraphError, LayerExecutor, UnaryOp, GRAPH_FORMAT_VERSION, INPUT_SLOT_NAME,
};
use flt_rng::DeterministicRng;

use crate::domain::select_inputs;
use crate::gating::{classify_case, Device, PlatformInfo, Precision, TestDisposition};
use crate::{maybe_append_case_log, CaseLogEntry};

pub const DIFFERENTIAL_REASON_CODES: [&str; 5] = [
    "unary_domain_rejected",
    "unary_execution_failed",
    "unary_shape_mismatch",
    "unary_element_type_mismatch",
    "unary_value_mismatch",
];

#[derive(Debug, Clone, Deserialize)]
pub struct UnaryCase {
    pub id: String,
    pub op: UnaryOp,
    pub shape: Vec<usize>,
    pub seed: u64,
    pub device: Device,
    pub precision: Precision,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub env_fingerprint: String,
    #[serde(default)]
    pub artifact_refs: Vec<String>,
    #[serde(default)]
    pub reason_code: String,
}

pub fn load_unary_cases(path: &Path) -> Result<Vec<UnaryCase>, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed reading {}: {err}", path.display()))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid json: {err}"))
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseFailure {
    pub id: String,
    pub op: UnaryOp,
    pub seed: u64,
    pub reason_code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnaryDifferentialReport {
    pub suite: &'static str,
    pub total_cases: usize,
    pub passed_cases: usize,
    pub skipped_cases: usize,
    pub expected_failure_cases: usize,
    pub failed_cases: usize,
    pub failures: Vec<CaseFailure>,
}

/// Reference path: direct elementwise evaluation, no graph in between.
fn reference_output(op: UnaryOp, input: &InputTensor) -> Result<InputTensor, GraphError> {
    let expected = op.element_type();
    let actual = input.element_type();
    let mismatch = || GraphError::ElementTypeMismatch {
        op,
        expected,
        actual,
    };

    let data = match input.data() {
        TensorData::F32(values) => TensorData::F32(
            values
                .iter()
                .map(|&x| op.apply_f32(x).ok_or_else(mismatch))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        TensorData::I32(values) => TensorData::I32(
            values
                .iter()
                .map(|&x| op.apply_i32(x).ok_or_else(mismatch))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        TensorData::Bool(values) => TensorData::Bool(
            values
                .iter()
                .map(|&x| op.apply_bool(x).ok_or_else(mismatch))
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };

    InputTensor::new(input.shape().to_vec(), data).map_err(GraphError::from)
}

/// Compares the primary output against the reference output. Float values
/// pass when `|actual - expected| <= abs_tol + rel_tol * |expected|`;
/// integer and boolean values must match exactly.
#[must_use]
pub fn compare_outputs(
    actual: &InputTensor,
    expected: &InputTensor,
    abs_tol: f64,
    rel_tol: f64,
) -> Option<(&'static str, String)> {
    if actual.shape() != expected.shape() {
        return Some((
            "unary_shape_mismatch",
            format!(
                "shape mismatch expected={:?} actual={:?}",
                expected.shape(),
                actual.shape()
            ),
        ));
    }
    if actual.element_type() != expected.element_type() {
        return Some((
            "unary_element_type_mismatch",
            format!(
                "element type mismatch expected={} actual={}",
                expected.element_type().name(),
                actual.element_type().name()
            ),
        ));
    }

    match (actual.data(), expected.data()) {
        (TensorData::F32(lhs), TensorData::F32(rhs)) => {
            for (index, (&a, &e)) in lhs.iter().zip(rhs.iter()).enumerate() {
                let a = f64::from(a);
                let e = f64::from(e);
                if a == e || (a.is_nan() && e.is_nan()) {
                    continue;
                }
                let abs_err = (a - e).abs();
                if abs_err > abs_tol + rel_tol * e.abs() {
                    return Some((
                        "unary_value_mismatch",
                        format!("index {index}: expected={e} actual={a} abs_err={abs_err}"),
                    ));
                }
            }
            None
        }
        (TensorData::I32(lhs), TensorData::I32(rhs)) => lhs
            .iter()
            .zip(rhs.iter())
            .position(|(a, e)| a != e)
            .map(|index| {
                (
                    "unary_value_mismatch",
                    format!("index {index}: expected={} actual={}", rhs[index], lhs[index]),
                )
            }),
        (TensorData::Bool(lhs), TensorData::Bool(rhs)) => lhs
            .iter()
            .zip(rhs.iter())
            .position(|(a, e)| a != e)
            .map(|index| {
                (
                    "unary_value_mismatch",
                    format!("index {index}: expected={} actual={}", rhs[index], lhs[index]),
                )
            }),
        _ => Some((
            "unary_element_type_mismatch",
            "storage kind mismatch".to_string(),
        )),
    }
}

fn evaluate_run_case(
    case: &UnaryCase,
    executor: &dyn LayerExecutor,
) -> Result<(), (&'static str, String)> {
    let mut rng = DeterministicRng::new(case.seed);
    let mut requests = BTreeMap::new();
    requests.insert(INPUT_SLOT_NAME.to_string(), case.shape.clone());

    let batch = select_inputs(case.op, &requests, &mut rng)
        .map_err(|err| ("unary_domain_rejected", err.to_string()))?;

    let (graph, _reference_graph) = build_unary_graph(case.op, &case.shape, GRAPH_FORMAT_VERSION)
        .map_err(|err| ("unary_execution_failed", err.to_string()))?;

    let primary = executor
        .execute(&graph, &batch.tensors)
        .map_err(|err| ("unary_execution_failed", err.to_string()))?;

    let input = batch
        .tensor(INPUT_SLOT_NAME)
        .ok_or_else(|| ("unary_domain_rejected", "input slot missing".to_string()))?;
    let expected = reference_output(case.op, input)
        .map_err(|err| ("unary_execution_failed", err.to_string()))?;

    let tolerance = case.precision.tolerance();
    match compare_outputs(&primary, &expected, tolerance, tolerance) {
        None => Ok(()),
        Some(mismatch) => Err(mismatch),
    }
}

/// Runs every fixture case: gate first, then generate, execute, and compare.
/// Skipped and expected-failure cases are tallied but never fail the report.
pub fn run_differential(
    cases: &[UnaryCase],
    executor: &dyn LayerExecutor,
    platform: &PlatformInfo,
) -> Result<UnaryDifferentialReport, String> {
    let mut report = UnaryDifferentialReport {
        suite: "unary_differential",
        total_cases: cases.len(),
        passed_cases: 0,
        skipped_cases: 0,
        expected_failure_cases: 0,
        failed_cases: 0,
        failures: Vec::new(),
    };

    for case in cases {
        let disposition = classify_case(case.op, &case.shape, case.device, platform);

        let outcome = match disposition {
            TestDisposition::Skip { .. } => {
                report.skipped_cases += 1;
                Ok(())
            }
            TestDisposition::ExpectedFailure { .. } => {
                report.expected_failure_cases += 1;
                Ok(())
            }
            TestDisposition::Run => match evaluate_run_case(case, executor) {
                Ok(()) => {
                    report.passed_cases += 1;
                    Ok(())
                }
                Err((reason_code, message)) => {
                    report.failed_cases += 1;
                    report.failures.push(CaseFailure {
                        id: case.id.clone(),
                        op: case.op,
                        seed: case.seed,
                        reason_code: reason_code.to_string(),
                        message: message.clone(),
                    });
                    Err((reason_code, message))
                }
            },
        };

        let reason_code = match (&outcome, disposition) {
            (Err((reason_code, _)), _) => (*reason_code).to_string(),
            (Ok(()), TestDisposition::Run) => String::new(),
            (Ok(()), gated) => gated.reason_code().to_string(),
        };
        maybe_append_case_log(&CaseLogEntry {
            fixture_id: case.id.clone(),
            op: case.op.name().to_string(),
            seed: case.seed,
            mode: case.mode.clone(),
            env_fingerprint: case.env_fingerprint.clone(),
            artifact_refs: case.artifact_refs.clone(),
            reason_code,
            disposition: disposition.name(),
        })?;
    }

    Ok(report)
}

pub fn write_report(path: &Path, report: &UnaryDifferentialReport) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }
    let payload = serde_json::to_string_pretty(report)
        .map_err(|err| format!("failed serializing differential report: {err}"))?;
    fs::write(path, payload.as_bytes())
        .map_err(|err| format!("failed writing {}: {err}", path.display()))
}
