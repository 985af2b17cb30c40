#![forbid(unsafe_code)]

use flt_conformance::differential::{load_unary_cases, run_differential, write_report};
use flt_conformance::gating::PlatformInfo;
use flt_conformance::HarnessConfig;
use flt_graph::GraphInterpreter;

fn main() {
    if let Err(err) = run() {
        eprintln!("run_unary_differential failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cfg = HarnessConfig::default_paths();
    let fixture_path = cfg.fixture_root.join("unary_cases.json");
    let report_path = cfg.report_root.join("unary_differential_report.json");

    let cases = load_unary_cases(&fixture_path)?;
    let report = run_differential(&cases, &GraphInterpreter, &PlatformInfo::host())?;
    write_report(&report_path, &report)?;

    println!(
        "unary differential: total={} passed={} skipped={} expected_failures={} failed={}",
        report.total_cases,
        report.passed_cases,
        report.skipped_cases,
        report.expected_failure_cases,
        report.failed_cases
    );
    println!("wrote {}", report_path.display());

    if report.failed_cases > 0 {
        return Err(format!("{} case(s) failed", report.failed_cases));
    }
    Ok(())
}
