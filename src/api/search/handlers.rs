use actix_web::{
    HttpResponse, get, post,
    web::{Data, Path, ServiceConfig, scope},
};
use actix_web_validator::{Json, Query};

use super::dto::{CancelResponse, ProgressQuery, ResultsQuery};
use super::service::{SearchService, ServiceError};
use crate::engine::search::SearchFilters;

#[post("")]
async fn create_search(
    service: Data<SearchService>,
    filters: Json<SearchFilters>,
) -> Result<HttpResponse, ServiceError> {
    let accepted = service.start_search(filters.into_inner())?;
    Ok(HttpResponse::Accepted().json(accepted))
}

#[get("/{id}/progress")]
async fn get_progress(
    service: Data<SearchService>,
    id: Path<String>,
    query: Query<ProgressQuery>,
) -> Result<HttpResponse, ServiceError> {
    let progress = service.progress(&id, query.wait_secs).await?;
    Ok(HttpResponse::Ok().json(progress))
}

#[get("/{id}/results")]
async fn get_results(
    service: Data<SearchService>,
    id: Path<String>,
    query: Query<ResultsQuery>,
) -> Result<HttpResponse, ServiceError> {
    let page = service.results(&id, &query)?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/{id}/stats")]
async fn get_stats(
    service: Data<SearchService>,
    id: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let stats = service.stats(&id)?;
    Ok(HttpResponse::Ok().json(stats))
}

#[post("/{id}/cancel")]
async fn cancel_search(
    service: Data<SearchService>,
    id: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let search_id = service.cancel(&id)?;
    Ok(HttpResponse::Accepted().json(CancelResponse {
        search_id,
        message: "Cancellation requested".to_string(),
    }))
}

#[get("/sources")]
async fn list_sources(service: Data<SearchService>) -> HttpResponse {
    HttpResponse::Ok().json(service.sources())
}

pub fn search_config(config: &mut ServiceConfig) {
    config.service(list_sources).service(
        scope("/searches")
            .service(create_search)
            .service(get_progress)
            .service(get_results)
            .service(get_stats)
            .service(cancel_search),
    );
}
