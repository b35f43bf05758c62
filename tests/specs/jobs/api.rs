//! Job API specs
//!
//! Verify request validation, status codes, and response bodies of the
//! HTTP job API.

use crate::prelude::*;

#[test]
fn submit_returns_message_and_id() {
    let runner = Runner::start(1);
    let response = runner.post("/jobs", &json!({ "name": "build", "commands": ["true"] }));
    assert_eq!(response.status, 200);

    let body = response.json();
    assert_eq!(body["message"], "Job Submitted");
    assert!(body["id"].is_u64(), "got: {body}");
}

#[test]
fn submitted_ids_are_unique_and_increasing() {
    let runner = Runner::start(2);
    let first = runner.submit("a", &["true"]);
    let second = runner.submit("b", &["true"]);
    let third = runner.submit("c", &["true"]);
    assert!(first < second && second < third);
}

#[test]
fn submit_without_name_is_rejected() {
    let runner = Runner::start(1);
    for body in [json!({ "commands": ["true"] }), json!({ "name": "  " })] {
        let response = runner.post("/jobs", &body);
        assert_eq!(response.status, 400);
        assert_eq!(response.json(), json!({ "error": "No job name specified." }));
    }
}

#[test]
fn submit_with_malformed_json_is_rejected() {
    let runner = Runner::start(1);
    let response = runner.request("POST", "/jobs", Some("{not json"));
    assert_eq!(response.status, 400);
    assert_eq!(response.json(), json!({ "error": "Could not parse json." }));
}

#[test]
fn list_shows_submitted_jobs_in_order() {
    let runner = Runner::start(1);
    let first = runner.submit("first", &["true"]);
    let second = runner.submit("second", &["echo hi"]);
    runner.wait_for_finish(second);

    let response = runner.get("/jobs");
    assert_eq!(response.status, 200);
    let jobs = response.json();
    let jobs = jobs.as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["id"], first);
    assert_eq!(jobs[0]["name"], "first");
    assert_eq!(jobs[1]["id"], second);
    assert_eq!(jobs[1]["commands"], json!(["echo hi"]));
}

#[test]
fn show_reports_status_and_snapshot() {
    let runner = Runner::start(1);
    let id = runner.submit("check", &["exit 4"]);
    let job = runner.wait_for_finish(id);

    assert_eq!(job["id"], id);
    assert_eq!(job["name"], "check");
    assert_eq!(job["status"], "error");
    assert_eq!(job["snapshot"]["exit_code"], 4);
    assert_eq!(job["snapshot"]["complete"], true);
    // Finished jobs no longer belong to a worker
    assert!(job.get("worker").is_none(), "got: {job}");
}

#[test]
fn unknown_job_is_not_found() {
    let runner = Runner::start(1);
    for path in ["/jobs/9999", "/jobs/9999/log"] {
        let response = runner.get(path);
        assert_eq!(response.status, 404, "{path}");
        assert!(response.json()["error"].is_string());
    }
    let response = runner.post("/jobs/9999/stop", &json!({}));
    assert_eq!(response.status, 404);
}

#[test]
fn malformed_job_id_is_bad_request() {
    let runner = Runner::start(1);
    let response = runner.get("/jobs/not-a-number");
    assert_eq!(response.status, 400);
}

#[test]
fn queued_job_has_no_log_yet() {
    let runner = Runner::start(1);
    let busy = runner.submit("busy", &["sleep 2"]);
    runner.wait_for_status(busy, "running");
    let queued = runner.submit("queued", &["true"]);

    assert_eq!(runner.job(queued)["status"], "idle");
    let response = runner.get(&format!("/jobs/{queued}/log"));
    assert_eq!(response.status, 404);
    assert_eq!(response.json(), json!({ "error": "Job has no log yet" }));

    runner.post(&format!("/jobs/{busy}/stop"), &json!({}));
}

#[test]
fn full_queue_refuses_submissions() {
    let runner = Runner::start_with(1, &["--queue-capacity", "1"]);
    let busy = runner.submit("busy", &["sleep 5"]);
    runner.wait_for_status(busy, "running");

    // One job fits in the queue (plus one parked in the dispatcher);
    // beyond that the runner refuses.
    let statuses: Vec<u16> = (0..4)
        .map(|i| {
            runner
                .post("/jobs", &json!({ "name": format!("extra-{i}"), "commands": ["true"] }))
                .status
        })
        .collect();
    assert!(statuses.contains(&503), "got: {statuses:?}");
    assert!(statuses.iter().all(|s| *s == 200 || *s == 503));

    runner.post(&format!("/jobs/{busy}/stop"), &json!({}));
}
