//! End-to-end tests for the transform runner lifecycle.

use std::sync::Arc;
use std::time::Duration;

use retab_core::{
    BackendError, FailureCategory, ReconciliationResult, RunPhase, RunRequest, StartError,
    TransformRunner,
};
use retab_test_utils::{ScriptedBackend, char_splits};

/// Reference backend output for the end-to-end scenario.
const SCENARIO_OUTPUT: &str = "2024/01/01\tA\t5\n2024/01/01\tB\t3\n[[MISSING: 无]]";

fn scenario_request() -> RunRequest {
    RunRequest {
        report_text: "今日 A 完成 5，B 完成 3。".to_string(),
        columns: vec!["日期".to_string(), "姓名".to_string(), "数量".to_string()],
        hint: String::new(),
        roster: vec!["A".to_string(), "B".to_string()],
    }
}

fn scenario_rows() -> Vec<Vec<String>> {
    vec![
        vec!["2024/01/01".to_string(), "A".to_string(), "5".to_string()],
        vec!["2024/01/01".to_string(), "B".to_string(), "3".to_string()],
    ]
}

/// Poll until the runner leaves `Running` (and any cooldown has been
/// entered). Panics if it never settles.
async fn wait_not_running(runner: &TransformRunner) {
    for _ in 0..500 {
        if runner.phase() != RunPhase::Running {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("runner did not leave the running phase");
}

#[tokio::test]
async fn scenario_holds_for_every_three_fragment_split() {
    for split in char_splits(SCENARIO_OUTPUT, 3) {
        let fragments: Vec<&str> = split.iter().map(String::as_str).collect();
        let backend = Arc::new(ScriptedBackend::fragments(fragments.clone()));
        let runner = TransformRunner::new(backend);
        runner.start(scenario_request()).expect("start");
        wait_not_running(&runner).await;

        assert_eq!(runner.phase(), RunPhase::Idle, "split {fragments:?}");
        assert!(runner.last_failure().is_none(), "split {fragments:?}");
        assert_eq!(runner.rows(), scenario_rows(), "split {fragments:?}");
        assert_eq!(
            runner.reconciliation(),
            ReconciliationResult::Complete,
            "split {fragments:?}"
        );
        // The control marker never leaks into the exportable text.
        assert_eq!(
            runner.clean_snapshot(),
            "2024/01/01\tA\t5\n2024/01/01\tB\t3",
            "split {fragments:?}"
        );
    }
}

#[tokio::test]
async fn missing_roster_members_surface_as_incomplete() {
    let backend = Arc::new(ScriptedBackend::text(
        "2024/01/01\tA\t5\n[[MISSING: 张三, 李四]]",
    ));
    let runner = TransformRunner::new(backend);
    runner.start(scenario_request()).expect("start");
    wait_not_running(&runner).await;

    assert_eq!(
        runner.reconciliation(),
        ReconciliationResult::Incomplete(vec!["张三".to_string(), "李四".to_string()])
    );
}

#[tokio::test]
async fn reconciliation_stays_unknown_without_a_marker() {
    let backend = Arc::new(ScriptedBackend::text("2024/01/01\tA\t5\n"));
    let runner = TransformRunner::new(backend);
    runner.start(scenario_request()).expect("start");
    wait_not_running(&runner).await;

    assert_eq!(runner.reconciliation(), ReconciliationResult::Unknown);
    assert_eq!(runner.rows().len(), 1);
}

#[tokio::test]
async fn empty_input_is_rejected_before_any_backend_call() {
    let backend = Arc::new(ScriptedBackend::text("should never stream"));
    let runner = TransformRunner::new(backend.clone());

    let err = runner
        .start(RunRequest {
            report_text: "   \n\t".to_string(),
            ..scenario_request()
        })
        .unwrap_err();
    assert_eq!(err, StartError::EmptyInput);
    assert_eq!(runner.phase(), RunPhase::Idle);
    assert!(backend.instructions().is_empty(), "no request may be issued");
}

#[tokio::test]
async fn second_start_while_running_is_rejected_without_side_effects() {
    let backend = Arc::new(
        ScriptedBackend::fragments(["first\trun\n"]).with_delay(Duration::from_millis(50)),
    );
    let runner = TransformRunner::new(backend.clone());
    runner.start(scenario_request()).expect("first start");

    let err = runner.start(scenario_request()).unwrap_err();
    assert_eq!(err, StartError::AlreadyRunning);

    wait_not_running(&runner).await;
    assert_eq!(
        runner.rows(),
        vec![vec!["first".to_string(), "run".to_string()]]
    );
    // Exactly one backend invocation took place.
    assert_eq!(backend.instructions().len(), 1);
}

#[tokio::test]
async fn failed_run_keeps_its_accumulator_and_next_run_replaces_it() {
    let backend = Arc::new(
        ScriptedBackend::fragments(["stale\tdata\n"])
            .then_error(BackendError::Api {
                status: 401,
                message: "invalid credential".to_string(),
            })
            .push(&["fresh\trow\n"], None),
    );
    let runner = TransformRunner::new(backend);
    runner.start(scenario_request()).expect("start");
    wait_not_running(&runner).await;

    // auth_invalid carries no cooldown; the runner is idle again with the
    // failed run's output intact for inspection.
    let failure = runner.last_failure().expect("failure recorded");
    assert_eq!(failure.category, FailureCategory::AuthInvalid);
    assert_eq!(failure.cooldown_secs, 0);
    assert_eq!(runner.phase(), RunPhase::Idle);
    assert_eq!(runner.raw_text(), "stale\tdata\n");

    runner.start(scenario_request()).expect("retry allowed");
    wait_not_running(&runner).await;

    assert!(runner.last_failure().is_none());
    assert_eq!(runner.rows(), vec![vec!["fresh".to_string(), "row".to_string()]]);
    assert!(!runner.raw_text().contains("stale"));
}

#[tokio::test]
async fn missing_credential_fails_fast() {
    let backend = Arc::new(ScriptedBackend::failing(BackendError::MissingCredential(
        "GEMINI_API_KEY is not set".to_string(),
    )));
    let runner = TransformRunner::new(backend);
    runner.start(scenario_request()).expect("start");
    wait_not_running(&runner).await;

    let failure = runner.last_failure().expect("failure recorded");
    assert_eq!(failure.category, FailureCategory::MissingCredential);
    assert_eq!(runner.phase(), RunPhase::Idle);
    assert!(runner.rows().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rate_limit_gates_retry_behind_a_cooldown() {
    let backend = Arc::new(
        ScriptedBackend::fragments(["partial\t"])
            .then_error(BackendError::Api {
                status: 429,
                message: "Resource has been exhausted".to_string(),
            })
            .push(&["after\tcooldown\n"], None),
    );
    let runner = TransformRunner::new(backend);
    runner.start(scenario_request()).expect("start");
    wait_not_running(&runner).await;

    let failure = runner.last_failure().expect("failure recorded");
    assert_eq!(failure.category, FailureCategory::RateLimited);
    assert!(failure.cooldown_secs > 0);
    assert!(matches!(runner.phase(), RunPhase::Cooldown { .. }));

    // Starts during cooldown are rejected without touching anything.
    let err = runner.start(scenario_request()).unwrap_err();
    assert!(matches!(err, StartError::CoolingDown { .. }), "got: {err:?}");
    assert_eq!(runner.raw_text(), "partial\t");

    // The countdown decrements once per second.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let RunPhase::Cooldown { remaining_secs } = runner.phase() else {
        panic!("expected cooldown to still be ticking");
    };
    assert!(remaining_secs < failure.cooldown_secs);

    // After the countdown the runner accepts a new run.
    tokio::time::sleep(Duration::from_secs(u64::from(failure.cooldown_secs) + 1)).await;
    assert_eq!(runner.phase(), RunPhase::Idle);
    runner.start(scenario_request()).expect("retry after cooldown");
    wait_not_running(&runner).await;
    assert_eq!(
        runner.rows(),
        vec![vec!["after".to_string(), "cooldown".to_string()]]
    );
}

#[tokio::test]
async fn transient_error_before_first_fragment_leaves_empty_views() {
    let backend = Arc::new(ScriptedBackend::failing(BackendError::Transport {
        message: "connection reset".to_string(),
        timeout: false,
    }));
    let runner = TransformRunner::new(backend);
    runner.start(scenario_request()).expect("start");
    wait_not_running(&runner).await;

    let failure = runner.last_failure().expect("failure recorded");
    assert_eq!(failure.category, FailureCategory::TransientUnknown);
    assert!(runner.rows().is_empty());
    assert_eq!(runner.clean_snapshot(), "");
    assert_eq!(runner.reconciliation(), ReconciliationResult::Unknown);
}

#[tokio::test]
async fn instruction_carries_columns_hint_and_roster() {
    let backend = Arc::new(ScriptedBackend::text("x\n"));
    let runner = TransformRunner::new(backend.clone());
    let mut request = scenario_request();
    request.hint = "日期统一为 YYYY/MM/DD。".to_string();
    runner.start(request).expect("start");
    wait_not_running(&runner).await;

    let instructions = backend.instructions();
    assert_eq!(instructions.len(), 1);
    let prompt = &instructions[0];
    assert!(prompt.contains("日期\t姓名\t数量"));
    assert!(prompt.contains("日期统一为 YYYY/MM/DD。"));
    assert!(prompt.contains("[[MISSING:"));
    assert!(prompt.contains("今日 A 完成 5，B 完成 3。"));
}
