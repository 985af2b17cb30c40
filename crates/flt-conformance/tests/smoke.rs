#![forbid(unsafe_code)]

use flt_conformance::{run_all_core_suites, run_smoke, HarnessConfig};

#[test]
fn smoke_finds_fixtures() {
    let cfg = HarnessConfig::default_paths();
    let report = run_smoke(&cfg);
    assert_eq!(report.suite, "smoke");
    assert!(report.fixture_count > 0);
    assert!(report.strict_mode);
}

#[test]
fn core_suites_pass_end_to_end() {
    let cfg = HarnessConfig::default_paths();
    let reports = run_all_core_suites(&cfg).expect("core suites");
    assert_eq!(reports.len(), 3);
    for report in &reports {
        assert!(
            report.all_passed(),
            "{} failed: {:?}",
            report.suite,
            report.failures
        );
    }
}
