use std::sync::Arc;

use actix_web::{HttpResponse, Responder, get, post, web};
use serde::Serialize;
use uuid::Uuid;

use super::ErrorResponseWithMessage;
use crate::job::JobConfig;
use crate::scheduler::Scheduler;

#[derive(Serialize)]
struct SubmitResponse {
    id: Uuid,
}

/// Submission intake. Validation happens here, before the scheduler
/// ever sees the job: configuration errors are request-level failures
/// and are never retried.
#[post("/jobs")]
pub async fn post_job_handler(
    scheduler: web::Data<Arc<Scheduler>>,
    body: web::Json<JobConfig>,
) -> impl Responder {
    let config = body.into_inner();
    if let Err(e) = config.validate() {
        log::info!("rejected submission: {e}");
        return HttpResponse::BadRequest().json(ErrorResponseWithMessage {
            reason: "ERR_INVALID_ARGUMENT",
            code: 1,
            message: e.to_string(),
        });
    }

    let id = scheduler.submit(config);
    HttpResponse::Ok().json(SubmitResponse { id })
}

/// Status polling: the job's current snapshot, or 404 once it has been
/// garbage-collected (or never existed).
#[get("/jobs/{id}")]
pub async fn get_job_handler(
    scheduler: web::Data<Arc<Scheduler>>,
    path: web::Path<(Uuid,)>,
) -> impl Responder {
    let id = path.into_inner().0;
    match scheduler.status(id) {
        Some(snapshot) => HttpResponse::Ok().json(snapshot),
        None => HttpResponse::NotFound().json(ErrorResponseWithMessage {
            reason: "ERR_NOT_FOUND",
            code: 3,
            message: format!("Job {id} not found."),
        }),
    }
}
