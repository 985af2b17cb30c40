#![forbid(unsafe_code)]

//! Conformance harness for the unary layer surface: domain-aware input
//! selection, device/platform gating, and the fixture-driven differential
//! suite.

pub mod differential;
pub mod domain;
pub mod gating;

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use serde::Serialize;

use flt_graph::{GraphInterpreter, UnaryOp, ALL_OPS, INPUT_SLOT_NAME};
use flt_rng::DeterministicRng;

use crate::domain::{domain_policy, select_inputs, ValueKind};
use crate::gating::{classify_case, Device, PlatformInfo, CANONICAL_SHAPES, PRECOMMIT_SHAPES};

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub fixture_root: PathBuf,
    pub report_root: PathBuf,
    pub strict_mode: bool,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        Self {
            fixture_root: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures"),
            report_root: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("reports"),
            strict_mode: true,
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessReport {
    pub suite: &'static str,
    pub fixture_count: usize,
    pub strict_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteReport {
    pub suite: &'static str,
    pub case_count: usize,
    pub pass_count: usize,
    pub failures: Vec<String>,
}

impl SuiteReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.case_count == self.pass_count && self.failures.is_empty()
    }
}

fn record_suite_check(report: &mut SuiteReport, passed: bool, failure: String) {
    report.case_count += 1;
    if passed {
        report.pass_count += 1;
    } else {
        report.failures.push(failure);
    }
}

static CASE_LOG_PATH: OnceLock<Mutex<Option<PathBuf>>> = OnceLock::new();

pub fn set_case_log_path(path: Option<PathBuf>) {
    let cell = CASE_LOG_PATH.get_or_init(|| Mutex::new(None));
    if let Ok(mut slot) = cell.lock() {
        *slot = path;
    }
}

/// One JSON line per evaluated fixture case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseLogEntry {
    pub fixture_id: String,
    pub op: String,
    pub seed: u64,
    pub mode: String,
    pub env_fingerprint: String,
    pub artifact_refs: Vec<String>,
    pub reason_code: String,
    pub disposition: &'static str,
}

pub(crate) fn maybe_append_case_log(entry: &CaseLogEntry) -> Result<(), String> {
    let configured = CASE_LOG_PATH
        .get()
        .and_then(|cell| cell.lock().ok())
        .and_then(|slot| slot.clone());
    let from_env = std::env::var_os("FLT_CASE_LOG_PATH").map(PathBuf::from);
    let Some(path) = configured.or(from_env) else {
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| format!("failed opening {}: {err}", path.display()))?;
    let line = serde_json::to_string(entry)
        .map_err(|err| format!("failed serializing case log entry: {err}"))?;
    let mut payload = line.into_bytes();
    payload.push(b'\n');
    file.write_all(&payload)
        .map_err(|err| format!("failed appending case log {}: {err}", path.display()))
}

#[must_use]
pub fn run_smoke(config: &HarnessConfig) -> HarnessReport {
    let fixture_count = fs::read_dir(&config.fixture_root)
        .ok()
        .into_iter()
        .flat_map(|it| it.filter_map(Result::ok))
        .count();

    HarnessReport {
        suite: "smoke",
        fixture_count,
        strict_mode: config.strict_mode,
    }
}

/// Sweeps every operator across representative shapes and asserts the
/// generation properties: interval bounds, element type, and the
/// constant-false boolean stream.
pub fn run_domain_suite(_config: &HarnessConfig) -> Result<SuiteReport, String> {
    let mut report = SuiteReport {
        suite: "domain",
        case_count: 0,
        pass_count: 0,
        failures: Vec::new(),
    };

    let shapes: [&[usize]; 2] = [&[10, 12], PRECOMMIT_SHAPES[0]];

    for (index, op) in ALL_OPS.into_iter().enumerate() {
        for shape in shapes {
            let policy = domain_policy(op);
            let mut rng = DeterministicRng::new(1_000 + index as u64);
            let mut requests = BTreeMap::new();
            requests.insert(INPUT_SLOT_NAME.to_string(), shape.to_vec());

            let batch = match select_inputs(op, &requests, &mut rng) {
                Ok(batch) => batch,
                Err(err) => {
                    record_suite_check(
                        &mut report,
                        false,
                        format!("{op}: selection failed: {err} reason_code={}", err.reason_code()),
                    );
                    continue;
                }
            };

            let Some(tensor) = batch.tensor(INPUT_SLOT_NAME) else {
                record_suite_check(&mut report, false, format!("{op}: input slot missing"));
                continue;
            };

            let type_ok = tensor.element_type() == op.element_type();
            let shape_ok = tensor.shape() == shape;
            let values_ok = match (policy.value_kind, tensor.data()) {
                (ValueKind::Real, flt_dtype::TensorData::F32(values)) => values
                    .iter()
                    .all(|&x| policy.lower <= f64::from(x) && f64::from(x) < policy.upper),
                (ValueKind::Integer, flt_dtype::TensorData::I32(values)) => values
                    .iter()
                    .all(|&x| policy.lower as i64 <= i64::from(x) && i64::from(x) < policy.upper as i64),
                (ValueKind::Boolean, flt_dtype::TensorData::Bool(values)) => {
                    values.iter().all(|&b| !b)
                }
                _ => false,
            };

            record_suite_check(
                &mut report,
                type_ok && shape_ok && values_ok,
                format!(
                    "{op}: shape={shape:?} type_ok={type_ok} shape_ok={shape_ok} values_ok={values_ok}"
                ),
            );
        }
    }

    Ok(report)
}

/// Asserts the gate dispositions for the canonical parameter surface.
pub fn run_gating_suite(_config: &HarnessConfig) -> Result<SuiteReport, String> {
    let mut report = SuiteReport {
        suite: "gating",
        case_count: 0,
        pass_count: 0,
        failures: Vec::new(),
    };

    let linux_x86 = PlatformInfo {
        os: "linux".to_string(),
        arch: "x86_64".to_string(),
        addons_available: false,
    };
    let linux_x86_addons = PlatformInfo {
        addons_available: true,
        ..linux_x86.clone()
    };
    let macos = PlatformInfo {
        os: "macos".to_string(),
        ..linux_x86.clone()
    };
    let linux_arm = PlatformInfo {
        arch: "aarch64".to_string(),
        ..linux_x86.clone()
    };

    let scenarios: [(UnaryOp, &[usize], Device, &PlatformInfo, &str); 7] = [
        (UnaryOp::Tanh, &[10, 12], Device::Cpu, &linux_x86, "run"),
        (UnaryOp::Tanh, &[4, 6, 8, 10, 12], Device::Gpu, &linux_x86, "skip"),
        (UnaryOp::Tanh, &[6, 8, 10, 12], Device::Gpu, &linux_x86, "run"),
        (UnaryOp::Sqrt, &[10, 12], Device::Cpu, &macos, "skip"),
        (UnaryOp::Sqrt, &[10, 12], Device::Cpu, &linux_arm, "expected_failure"),
        (UnaryOp::Mish, &[10, 12], Device::Cpu, &linux_x86, "skip"),
        (UnaryOp::Mish, &[10, 12], Device::Cpu, &linux_x86_addons, "run"),
    ];

    for (op, shape, device, platform, expected) in scenarios {
        let disposition = classify_case(op, shape, device, platform);
        record_suite_check(
            &mut report,
            disposition.name() == expected,
            format!(
                "{op}: shape={shape:?} device={device} os={} arch={} expected={expected} actual={}",
                platform.os,
                platform.arch,
                disposition.name()
            ),
        );
    }

    for shape in CANONICAL_SHAPES {
        let disposition = classify_case(UnaryOp::Abs, shape, Device::Cpu, &linux_x86);
        record_suite_check(
            &mut report,
            disposition.is_run(),
            format!("canonical shape {shape:?} must run on cpu/linux/x86_64"),
        );
    }

    Ok(report)
}

/// Fixture-driven differential run against the in-process interpreter,
/// gated on the actual host platform. Writes the report artifact.
pub fn run_unary_differential_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let fixture_path = config.fixture_root.join("unary_cases.json");
    let cases = differential::load_unary_cases(&fixture_path)?;
    let platform = PlatformInfo::host();
    let report = differential::run_differential(&cases, &GraphInterpreter, &platform)?;

    let report_path = config.report_root.join("unary_differential_report.json");
    differential::write_report(&report_path, &report)?;

    let failures = report
        .failures
        .iter()
        .map(|failure| {
            format!(
                "{}: op={} seed={} reason_code={} {}",
                failure.id,
                failure.op.name(),
                failure.seed,
                failure.reason_code,
                failure.message
            )
        })
        .collect();

    Ok(SuiteReport {
        suite: "unary_differential",
        case_count: report.total_cases,
        pass_count: report.total_cases - report.failed_cases,
        failures,
    })
}

pub fn run_all_core_suites(config: &HarnessConfig) -> Result<Vec<SuiteReport>, String> {
    Ok(vec![
        run_domain_suite(config)?,
        run_gating_suite(config)?,
        run_unary_differential_suite(config)?,
    ])
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{
        run_all_core_suites, run_domain_suite, run_gating_suite, run_smoke,
        run_unary_differential_suite, set_case_log_path, HarnessConfig, SuiteReport,
    };

    #[test]
    fn smoke_sees_the_fixture_directory() {
        let cfg = HarnessConfig::default_paths();
        let report = run_smoke(&cfg);
        assert_eq!(report.suite, "smoke");
        assert!(report.strict_mode);
        assert!(report.fixture_count > 0, "fixtures directory should not be empty");
    }

    #[test]
    fn all_passed_requires_full_pass_count() {
        let clean = SuiteReport {
            suite: "x",
            case_count: 2,
            pass_count: 2,
            failures: Vec::new(),
        };
        assert!(clean.all_passed());

        let short = SuiteReport {
            suite: "x",
            case_count: 2,
            pass_count: 1,
            failures: vec!["one failed".to_string()],
        };
        assert!(!short.all_passed());
    }

    #[test]
    fn domain_suite_passes() {
        let cfg = HarnessConfig::default_paths();
        let report = run_domain_suite(&cfg).expect("domain suite");
        assert!(report.all_passed(), "failures: {:?}", report.failures);
        assert_eq!(report.case_count, 40);
    }

    #[test]
    fn gating_suite_passes() {
        let cfg = HarnessConfig::default_paths();
        let report = run_gating_suite(&cfg).expect("gating suite");
        assert!(report.all_passed(), "failures: {:?}", report.failures);
    }

    #[test]
    fn differential_suite_passes_and_writes_artifact() {
        let cfg = HarnessConfig::default_paths();
        let report = run_unary_differential_suite(&cfg).expect("differential suite");
        assert!(report.all_passed(), "failures: {:?}", report.failures);
        assert!(cfg.report_root.join("unary_differential_report.json").exists());
    }

    #[test]
    fn core_suites_cover_domain_gating_and_differential() {
        let cfg = HarnessConfig::default_paths();
        let reports = run_all_core_suites(&cfg).expect("core suites");
        let names: Vec<&str> = reports.iter().map(|r| r.suite).collect();
        assert_eq!(names, vec!["domain", "gating", "unary_differential"]);
        for report in &reports {
            assert!(report.all_passed(), "{}: {:?}", report.suite, report.failures);
        }
    }

    #[test]
    fn case_log_collects_one_line_per_case() {
        let log_path = std::env::temp_dir().join("flt_case_log_test.jsonl");
        let _ = std::fs::remove_file(&log_path);
        set_case_log_path(Some(PathBuf::from(&log_path)));

        let cfg = HarnessConfig::default_paths();
        let report = run_unary_differential_suite(&cfg).expect("differential suite");

        set_case_log_path(None);

        let raw = std::fs::read_to_string(&log_path).expect("log file");
        let lines: Vec<&str> = raw.lines().collect();
        // Suites in sibling tests may append concurrently; at least our own
        // run's lines must be present.
        assert!(lines.len() >= report.case_count);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).expect("json line");
            assert!(value.get("fixture_id").is_some());
            assert!(value.get("disposition").is_some());
        }
        let _ = std::fs::remove_file(&log_path);
    }
}
