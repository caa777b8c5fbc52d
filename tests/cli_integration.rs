use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        let dir = TempDir::new().expect("create tempdir");
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        Self { dir }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("taskbroker").expect("find taskbroker binary");
        cmd.current_dir(self.dir.path());
        cmd.env("TASKBROKER_DB", self.dir.path().join(".taskbroker").join("taskbroker.db"));
        cmd.env("TASKBROKER_STATE_DIR", self.dir.path().join(".taskbroker").join("state"));
        cmd
    }

    fn write_doc(&self, name: &str, content: &str) {
        fs::write(self.dir.path().join("docs").join(name), content).unwrap();
    }

    fn write_ready_docs(&self) {
        let filler = "word ".repeat(200);
        let bullets = "- point one\n- point two\n- point three\n- point four\n- point five\n- point six\n";
        self.write_doc(
            "PRD.md",
            &format!("## Goals\n## User Stories\n## Success Metrics\n{bullets}\n{filler}"),
        );
        self.write_doc(
            "SPEC.md",
            &format!("## Data Model\n## API\n## Security\n{bullets}\n{filler}"),
        );
        self.write_doc(
            "DECISION_LOG.md",
            &format!(
                "## Records\n\n| Date | Type | Decision | Rationale |\n|---|---|---|---|\n| 2026-01-01 | ARCH | chose sqlite | durable and simple |\n\n{filler}"
            ),
        );
    }

    fn write_plan(&self, name: &str, contents: &str) -> std::path::PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }
}

fn simple_plan_json(plan_name: &str) -> String {
    format!(
        r#"{{
            "name": "{plan_name}",
            "title": "Example Plan",
            "tasks": [
                {{"id": "t1", "lane": "backend", "title": "Build the thing", "priority": 10}},
                {{"id": "t2", "lane": "frontend", "title": "Render the thing", "priority": 10, "after": ["t1"]}}
            ]
        }}"#
    )
}

#[test]
fn init_creates_store() {
    let env = TestEnv::new();
    env.cmd().arg("init").assert().success();
    assert!(env.dir.path().join(".taskbroker").join("taskbroker.db").exists());
}

#[test]
fn readiness_reports_bootstrap_without_docs() {
    let env = TestEnv::new();
    env.cmd().arg("init").assert().success();
    env.cmd()
        .args(["--json", "readiness"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BOOTSTRAP"));
}

#[test]
fn readiness_reports_execution_with_complete_docs() {
    let env = TestEnv::new();
    env.cmd().arg("init").assert().success();
    env.write_ready_docs();
    env.cmd()
        .args(["--json", "readiness"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EXECUTION"));
}

#[test]
fn plan_accept_blocked_without_ready_docs() {
    let env = TestEnv::new();
    env.cmd().arg("init").assert().success();
    let plan_path = env.write_plan("plan.json", &simple_plan_json("p1"));
    env.cmd()
        .args(["--json", "plan", "accept"])
        .arg(&plan_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("BlockedBootstrap"));
}

#[test]
fn plan_accept_creates_tasks_when_ready() {
    let env = TestEnv::new();
    env.cmd().arg("init").assert().success();
    env.write_ready_docs();
    let plan_path = env.write_plan("plan.json", &simple_plan_json("p2"));

    env.cmd()
        .args(["--json", "plan", "accept"])
        .arg(&plan_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    env.cmd()
        .args(["--json", "plan", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("p2"));
}

#[test]
fn plan_accept_is_idempotent_by_hash() {
    let env = TestEnv::new();
    env.cmd().arg("init").assert().success();
    env.write_ready_docs();
    let plan_path = env.write_plan("plan.json", &simple_plan_json("p3"));

    env.cmd().args(["plan", "accept"]).arg(&plan_path).assert().success();
    env.cmd()
        .args(["--json", "plan", "accept"])
        .arg(&plan_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("AlreadyAccepted"));
}

#[test]
fn next_respects_dependency_order() {
    let env = TestEnv::new();
    env.cmd().arg("init").assert().success();
    env.write_ready_docs();
    let plan_path = env.write_plan("plan.json", &simple_plan_json("p4"));
    env.cmd().args(["plan", "accept"]).arg(&plan_path).assert().success();

    // t2 depends on t1 (still pending), so the first pick must be t1's lane.
    env.cmd()
        .args(["--json", "next", "--claim", "--worker-id", "w1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"backend\""));
}

#[test]
fn next_with_no_work_exits_two() {
    let env = TestEnv::new();
    env.cmd().arg("init").assert().success();
    env.write_ready_docs();
    let plan_path = env.write_plan("empty_plan.json", r#"{"name": "empty", "title": "Empty Plan", "tasks": []}"#);
    env.cmd().args(["plan", "accept"]).arg(&plan_path).assert().success();
    env.cmd().args(["next", "--claim", "--worker-id", "w1"]).assert().code(2);
}

#[test]
fn complete_then_review_approve_round_trip() {
    let env = TestEnv::new();
    env.cmd().arg("init").assert().success();
    env.write_ready_docs();
    let plan_path = env.write_plan("plan.json", &simple_plan_json("p5"));
    env.cmd().args(["plan", "accept"]).arg(&plan_path).assert().success();

    let pick = env
        .cmd()
        .args(["--json", "next", "--claim", "--worker-id", "w1"])
        .output()
        .unwrap();
    let pick_json: serde_json::Value = serde_json::from_slice(&pick.stdout).unwrap();
    let data = &pick_json["data"]["Picked"];
    let task_id = data["task"]["id"].as_str().unwrap();
    let lease_id = data["lease_id"].as_str().unwrap();

    env.cmd()
        .args(["complete", task_id, "--worker-id", "w1", "--lease-id", lease_id, "--ok", "--output", "done"])
        .assert()
        .success();

    env.cmd()
        .args([
            "review",
            task_id,
            "--decision",
            "APPROVE",
            "--notes",
            "Entropy Check: Passed. Verify: 10/100",
            "--actor",
            "HUMAN",
        ])
        .assert()
        .success();

    env.cmd()
        .args(["--json", "plan", "show", "p5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));
}

#[test]
fn heartbeat_on_unowned_task_is_not_an_error() {
    let env = TestEnv::new();
    env.cmd().arg("init").assert().success();
    env.write_ready_docs();
    env.cmd()
        .args(["heartbeat", "--worker-id", "ghost", "--task", "nonexistent-task-id"])
        .assert()
        .success();
}
