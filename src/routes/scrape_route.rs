use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{
    domain::{criteria::SearchCriteria, progress::format_progress},
    error::PipelineError,
    services::ProcessRegistry,
};

#[derive(Deserialize)]
struct StartScrapeBody {
    user_id: String,
    business_type: String,
    location: Option<String>,
    max_results: Option<usize>,
}

#[post("")]
async fn start_scrape(
    registry: web::Data<ProcessRegistry>,
    body: web::Json<StartScrapeBody>,
) -> HttpResponse {
    let body = body.into_inner();
    let criteria = SearchCriteria {
        business_type: body.business_type,
        location: body.location.filter(|l| !l.trim().is_empty()),
        max_results: body.max_results,
    };

    match registry.start(&body.user_id, criteria) {
        Ok(handle) => HttpResponse::Accepted().json(handle),
        Err(e @ PipelineError::InvalidCriteria(_)) => {
            HttpResponse::BadRequest().json(json!({ "error": e.to_string() }))
        }
        Err(e @ PipelineError::AlreadyRunning(_)) => {
            HttpResponse::Conflict().json(json!({ "error": e.to_string() }))
        }
        Err(e) => HttpResponse::InternalServerError().json(json!({ "error": e.to_string() })),
    }
}

#[get("/progress/{user_id}")]
async fn get_progress(
    registry: web::Data<ProcessRegistry>,
    user_id: web::Path<String>,
) -> HttpResponse {
    match registry.progress(&user_id) {
        Some(progress) => HttpResponse::Ok().json(format_progress(&progress)),
        None => HttpResponse::NotFound().json(json!({ "error": "no run found for user" })),
    }
}

#[get("/result/{user_id}")]
async fn get_result(
    registry: web::Data<ProcessRegistry>,
    user_id: web::Path<String>,
) -> HttpResponse {
    match registry.result(&user_id) {
        Some(output) => HttpResponse::Ok().json(output),
        None => HttpResponse::NotFound().json(json!({ "error": "no finished run for user" })),
    }
}

#[post("/cancel/{user_id}")]
async fn cancel_scrape(
    registry: web::Data<ProcessRegistry>,
    user_id: web::Path<String>,
) -> HttpResponse {
    match registry.cancel(&user_id) {
        true => HttpResponse::Accepted().finish(),
        false => HttpResponse::NotFound().json(json!({ "error": "no live run for user" })),
    }
}
