use std::fs;
use std::path::{Path, PathBuf};

use drift_gate::drift::{
    check_and_report, exit_code_for_error, load_and_check, reconcile, run_check, CheckOutcome,
    CheckStatus, DriftSettings, EXIT_LOAD_ERROR,
};
use drift_gate::output::write_report;
use drift_gate::snapshot::{load_snapshot, LoadError, LoadOptions};
use tempfile::TempDir;

fn write_csv(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).expect("write fixture");
    path
}

fn check(baseline: &Path, current: &Path, threshold: f64) -> CheckOutcome {
    let settings = DriftSettings {
        threshold,
        ..DriftSettings::default()
    };
    load_and_check(baseline, current, &LoadOptions::default(), &settings).expect("check runs")
}

const BOOKINGS: &str = "hotel,lead_time,adults,is_repeated_guest,arrival_date\n\
Resort Hotel,342,2,false,2017-07-01\n\
City Hotel,7,1,false,2017-07-02\n\
Resort Hotel,13,2,true,2017-07-03\n\
City Hotel,14,2,false,2017-07-04\n\
City Hotel,0,3,false,2017-07-05\n\
Resort Hotel,9,2,true,2017-07-06\n";

#[test]
fn identical_snapshots_pass() {
    let dir = TempDir::new().expect("tempdir");
    let baseline = write_csv(&dir, "baseline.csv", BOOKINGS);
    let current = write_csv(&dir, "current.csv", BOOKINGS);

    let outcome = check(&baseline, &current, 0.01);
    let CheckOutcome::Evaluated { report, decision } = &outcome else {
        panic!("expected evaluated outcome, got {outcome:?}");
    };
    assert_eq!(report.scores.len(), 5);
    assert!(report.scores.iter().all(|s| s.value.abs() < 1e-9));
    assert!(decision.passed);
    assert_eq!(outcome.exit_code(), 0);
}

#[test]
fn disjoint_shift_is_offending() {
    let dir = TempDir::new().expect("tempdir");
    let baseline = write_csv(&dir, "baseline.csv", "price\n0\n0\n0\n0\n");
    let current = write_csv(&dir, "current.csv", "price\n100\n100\n100\n100\n");

    let outcome = check(&baseline, &current, 0.05);
    let CheckOutcome::Evaluated { report, decision } = &outcome else {
        panic!("expected evaluated outcome, got {outcome:?}");
    };
    let score = report.score_for("price").expect("price scored");
    assert!(score.value > 0.05);
    assert!(decision.is_offending("price"));
    assert_eq!(outcome.status(), CheckStatus::DriftDetected);
}

#[test]
fn hotel_and_lead_time_shift_fails_the_gate() {
    let dir = TempDir::new().expect("tempdir");
    let baseline = write_csv(&dir, "baseline.csv", "hotel,lead_time\nA,10\nA,12\nB,11\n");
    let current = write_csv(&dir, "current.csv", "hotel,lead_time\nB,50\nB,52\nB,51\n");

    let outcome = check(&baseline, &current, 0.3);
    let CheckOutcome::Evaluated { decision, .. } = &outcome else {
        panic!("expected evaluated outcome, got {outcome:?}");
    };
    let offending: Vec<&str> = decision
        .offending
        .iter()
        .map(|o| o.feature_name.as_str())
        .collect();
    assert_eq!(offending, vec!["hotel", "lead_time"]);
    assert_eq!(outcome.exit_code(), 1);
}

#[test]
fn excluded_and_empty_columns_leave_nothing_to_evaluate() {
    let dir = TempDir::new().expect("tempdir");
    let baseline = write_csv(
        &dir,
        "baseline.csv",
        "reservation_status_date,agent,company\n2017-07-01,,\n2017-07-02,NA,\n",
    );
    let current = write_csv(
        &dir,
        "current.csv",
        "reservation_status_date,agent,company\n2017-08-01,9,\n2017-08-02,,\n",
    );

    let outcome = check(&baseline, &current, 0.3);
    assert_eq!(outcome.status(), CheckStatus::NoEvaluableFeatures);
    assert_eq!(outcome.exit_code(), 0);
    let CheckOutcome::NoEvaluableFeatures(empty) = &outcome else {
        panic!("expected no evaluable features");
    };
    assert_eq!(empty.dropped.len(), 3);
}

#[test]
fn reruns_are_deterministic() {
    let dir = TempDir::new().expect("tempdir");
    let baseline = write_csv(&dir, "baseline.csv", BOOKINGS);
    let shifted = BOOKINGS.replace("City Hotel,7,", "Resort Hotel,70,");
    let current = write_csv(&dir, "current.csv", &shifted);

    let first = check(&baseline, &current, 0.3);
    let second = check(&baseline, &current, 0.3);
    let (
        CheckOutcome::Evaluated {
            report: a,
            decision: da,
        },
        CheckOutcome::Evaluated {
            report: b,
            decision: db,
        },
    ) = (&first, &second)
    else {
        panic!("expected evaluated outcomes");
    };
    assert_eq!(a.scores, b.scores);
    assert_eq!(da, db);
}

#[test]
fn reconciling_twice_keeps_the_same_columns() {
    let dir = TempDir::new().expect("tempdir");
    let baseline_path = write_csv(&dir, "baseline.csv", BOOKINGS);
    let current_path = write_csv(
        &dir,
        "current.csv",
        "hotel,lead_time,children\nCity Hotel,3,\nResort Hotel,40,\n",
    );
    let options = LoadOptions::default();
    let baseline = load_snapshot("baseline", &baseline_path, &options).expect("baseline");
    let current = load_snapshot("current", &current_path, &options).expect("current");

    let first = reconcile(&baseline, &current, &[]);
    let second = reconcile(&first.baseline, &first.current, &[]);
    assert_eq!(first.column_names(), vec!["hotel", "lead_time"]);
    assert_eq!(first.column_names(), second.column_names());
}

#[test]
fn unreadable_snapshot_is_a_load_error() {
    let dir = TempDir::new().expect("tempdir");
    let baseline = write_csv(&dir, "baseline.csv", BOOKINGS);
    let missing = dir.path().join("missing.csv");
    let err = load_and_check(
        &baseline,
        &missing,
        &LoadOptions::default(),
        &DriftSettings::default(),
    )
    .expect_err("missing file must fail");
    assert!(matches!(err, LoadError::Io { .. }));

    let unsupported = write_csv(&dir, "current.xlsx", "not a table");
    let err = load_and_check(
        &baseline,
        &unsupported,
        &LoadOptions::default(),
        &DriftSettings::default(),
    )
    .expect_err("unknown extension must fail");
    assert!(matches!(err, LoadError::UnsupportedFormat { .. }));
}

#[test]
fn report_is_written_only_for_evaluated_runs() {
    let dir = TempDir::new().expect("tempdir");
    let baseline_path = write_csv(&dir, "baseline.csv", "hotel,lead_time\nA,10\nA,12\nB,11\n");
    let current_path = write_csv(&dir, "current.csv", "hotel,lead_time\nB,50\nB,52\nB,51\n");
    let options = LoadOptions::default();
    let baseline = load_snapshot("baseline", &baseline_path, &options).expect("baseline");
    let current = load_snapshot("current", &current_path, &options).expect("current");

    let outcome = run_check(&baseline, &current, &DriftSettings::default());
    let CheckOutcome::Evaluated { report, decision } = &outcome else {
        panic!("expected evaluated outcome");
    };
    let report_path = dir.path().join("reports/drift.html");
    write_report(&report_path, report, decision, None).expect("write report");
    let html = fs::read_to_string(&report_path).expect("read report");
    assert!(html.contains("lead_time"));
    assert!(html.contains("FAILED"));

    let json_path = dir.path().join("drift.json");
    write_report(&json_path, report, decision, None).expect("write json");
    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).expect("read json")).expect("json");
    assert_eq!(parsed["decision"]["passed"], serde_json::Value::Bool(false));
}

#[test]
fn empty_comparison_leaves_an_existing_report_untouched() {
    let dir = TempDir::new().expect("tempdir");
    let baseline = write_csv(&dir, "baseline.csv", "reservation_status_date,agent\n2017-07-01,\n");
    let current = write_csv(&dir, "current.csv", "reservation_status_date,agent\n2017-08-01,\n");
    let report_path = write_csv(&dir, "drift.html", "<html>yesterday's report</html>");
    let before = fs::read(&report_path).expect("read report");

    let outcome = check_and_report(
        &baseline,
        &current,
        Some(&report_path),
        &LoadOptions::default(),
        &DriftSettings::default(),
        None,
    )
    .expect("check runs");
    assert_eq!(outcome.status(), CheckStatus::NoEvaluableFeatures);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(fs::read(&report_path).expect("read report"), before);
}

#[test]
fn load_failures_and_drift_exit_differently() {
    let dir = TempDir::new().expect("tempdir");
    let baseline = write_csv(&dir, "baseline.csv", "hotel,lead_time\nA,10\nA,12\nB,11\n");
    let current = write_csv(&dir, "current.csv", "hotel,lead_time\nB,50\nB,52\nB,51\n");
    let report_path = dir.path().join("drift.json");

    let err = check_and_report(
        &baseline,
        &dir.path().join("missing.csv"),
        Some(&report_path),
        &LoadOptions::default(),
        &DriftSettings::default(),
        None,
    )
    .expect_err("missing snapshot must fail");
    assert_eq!(exit_code_for_error(&err), EXIT_LOAD_ERROR);
    assert!(!report_path.exists());

    let outcome = check_and_report(
        &baseline,
        &current,
        Some(&report_path),
        &LoadOptions::default(),
        &DriftSettings::default(),
        None,
    )
    .expect("check runs");
    assert_eq!(outcome.exit_code(), 1);
    assert!(report_path.exists());
}
