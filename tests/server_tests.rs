mod common;

use std::sync::Arc;

use actix_web::dev::{Service, ServiceResponse};
use actix_web::{App, test, web};
use judged::config::JudgeConfig;
use judged::routes::{get_job_handler, json_error_handler, post_job_handler};
use judged::sandbox::testing::{FakeContainer, FakeRuntime};
use judged::scheduler::Scheduler;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use uuid::Uuid;

async fn spawn_app(
    scheduler: Arc<Scheduler>,
) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(scheduler))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(post_job_handler)
            .service(get_job_handler),
    )
    .await
}

fn scheduler_with(runtime: Arc<FakeRuntime>) -> Arc<Scheduler> {
    Scheduler::new(common::context(runtime), &JudgeConfig::default())
}

#[actix_web::test]
async fn malformed_json_is_rejected() {
    let app = spawn_app(scheduler_with(Arc::new(FakeRuntime::default()))).await;

    let req = test::TestRequest::post()
        .uri("/jobs")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["reason"], "ERR_INVALID_ARGUMENT");
    assert_eq!(body["code"], 1);
}

#[actix_web::test]
async fn invalid_submission_reports_the_reason() {
    let app = spawn_app(scheduler_with(Arc::new(FakeRuntime::default()))).await;

    let req = test::TestRequest::post()
        .uri("/jobs")
        .set_json(json!({
            "testee": { "language": "py", "source": "print(1)" },
            "checker": { "language": "py", "source": "exit(0)" },
            "samples": [],
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["reason"], "ERR_INVALID_ARGUMENT");
    assert_eq!(body["message"], "need samples array, but not found");
}

#[actix_web::test]
async fn unsupported_language_is_a_request_error() {
    let app = spawn_app(scheduler_with(Arc::new(FakeRuntime::default()))).await;

    let req = test::TestRequest::post()
        .uri("/jobs")
        .set_json(json!({
            "testee": { "language": "cobol", "source": "DISPLAY '1'." },
            "checker": { "language": "py", "source": "exit(0)" },
            "samples": ["1"],
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "testee: unknown language \"cobol\"");
}

#[actix_web::test]
async fn submitted_job_can_be_polled_to_completion() {
    let runtime = Arc::new(FakeRuntime::new(vec![
        FakeContainer::success(&["sample: 1", "mem: 2048;time: 0.05"]),
        FakeContainer::success(&["sample: 1"]),
    ]));
    let scheduler = scheduler_with(runtime);
    let app = spawn_app(Arc::clone(&scheduler)).await;

    let req = test::TestRequest::post()
        .uri("/jobs")
        .set_json(json!({
            "testee": { "language": "py", "source": "print(int(input()) * 2)" },
            "checker": { "language": "py", "source": "import sys; sys.exit(0)" },
            "samples": ["21"],
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    let id: Uuid = serde_json::from_value(body["id"].clone()).unwrap();

    common::wait_for_status(&scheduler, id, "success").await;

    let req = test::TestRequest::get().uri(&format!("/jobs/{id}")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["run_samples"], 1);
    assert_eq!(body["mem_max"], 2048);
}

#[actix_web::test]
async fn unknown_job_is_a_404() {
    let app = spawn_app(scheduler_with(Arc::new(FakeRuntime::default()))).await;

    let id = Uuid::new_v4();
    let req = test::TestRequest::get().uri(&format!("/jobs/{id}")).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 404);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["reason"], "ERR_NOT_FOUND");
    assert_eq!(body["code"], 3);
    assert_eq!(body["message"], format!("Job {id} not found."));
}
