#![forbid(unsafe_code)]

use flt_conformance::{run_domain_suite, run_gating_suite, HarnessConfig};

fn main() {
    if let Err(err) = run() {
        eprintln!("run_domain_gate failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cfg = HarnessConfig::default_paths();
    let reports = vec![run_domain_suite(&cfg)?, run_gating_suite(&cfg)?];

    let mut failed = false;
    for report in &reports {
        println!(
            "{}: cases={} passed={} failures={}",
            report.suite,
            report.case_count,
            report.pass_count,
            report.failures.len()
        );
        for failure in &report.failures {
            eprintln!("  {failure}");
        }
        failed |= !report.all_passed();
    }

    if failed {
        return Err("one or more suites failed".to_string());
    }
    Ok(())
}
