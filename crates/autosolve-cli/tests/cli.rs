use assert_cmd::Command;
use predicates::prelude::*;

fn autosolve() -> Command {
    Command::cargo_bin("autosolve").expect("binary builds")
}

#[test]
fn run_reports_solved_nodes_as_json() {
    autosolve()
        .args([
            "run",
            "--node",
            "shot_a=3.2,2.1,1.4,0.8",
            "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"solved\""))
        .stdout(predicate::str::contains("\"camera\": \"cam_shot_a\""))
        .stdout(predicate::str::contains("\"succeeded\": true"));
}

#[test]
fn best_effort_run_still_succeeds() {
    autosolve()
        .args(["run", "--node", "shot_b=3.0", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_iterations_reached"))
        .stdout(predicate::str::contains("\"iterations\": 5"));
}

#[test]
fn failing_node_halts_the_batch_and_exits_nonzero() {
    autosolve()
        .args([
            "run",
            "--node",
            "shot_a=0.5",
            "--node",
            "broken=",
            "--node",
            "shot_c=0.5",
            "--json",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"status\": \"failed\""))
        .stdout(predicate::str::contains("shot_c").not());
}

#[test]
fn malformed_node_spec_is_rejected() {
    autosolve()
        .args(["run", "--node", "missing_equals"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid node spec"));
}

#[test]
fn tools_lists_the_static_registry() {
    autosolve()
        .arg("tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("auto_solve"))
        .stdout(predicate::str::contains("Auto Solve"));
}
