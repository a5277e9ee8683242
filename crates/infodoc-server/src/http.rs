//! HTTP adapter
//!
//! Routes:
//! - `GET /resource` lists every resource as a JSON-LD collection
//! - `GET /resource/{id}` returns one representation with its `ETag`
//! - `PUT /resource/{id}` replaces a resource from a JSON body
//!
//! A PUT body must declare its `Content-Length` and stay under the
//! configured ceiling; both are checked before the body is read. Every
//! response carries an `x-request-id` header.

use crate::app::AppState;
use crate::error::ApiError;
use infodoc_artifact::{ContentHash, ResourceId};
use infodoc_composition::Merged;
use infodoc_store::Snapshot;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::Instrument;
use ulid::Ulid;
use warp::http::header::{HeaderName, HeaderValue, CONTENT_TYPE, ETAG};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Media type of every response body
pub const LD_JSON: &str = "application/ld+json";

/// Header carrying the per-request ULID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Collection IRI
const COLLECTION_PATH: &str = "/resource";

/// All routes, with rejections turned into JSON error responses
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let body_limit = state.body_limit();
    let with_state = warp::any().map(move || Arc::clone(&state));

    let list = warp::path!("resource")
        .and(warp::get())
        .and(with_state.clone())
        .and_then(list_resources);

    let get_one = warp::path!("resource" / String)
        .and(warp::get())
        .and(with_state.clone())
        .and_then(get_resource);

    let put_one = warp::path!("resource" / String)
        .and(warp::put())
        .and(warp::header::optional::<String>("if-match"))
        .and(warp::body::content_length_limit(body_limit))
        .and(warp::body::bytes())
        .and(with_state)
        .and_then(put_resource);

    list.or(get_one)
        .unify()
        .or(put_one)
        .unify()
        .recover(move |rejection| handle_rejection(rejection, body_limit))
        .unify()
        .with(warp::trace::request())
}

async fn list_resources(state: Arc<AppState>) -> Result<Response, Rejection> {
    let request_id = Ulid::new();
    let span = tracing::info_span!("list_resources", %request_id);
    let response = async {
        let snapshots = state.store().list().await?;
        let members: Vec<_> = snapshots
            .iter()
            .map(|s| s.resource.to_representation(state.resource_type()))
            .collect();
        let body = json!({
            "@context": format!("/contexts/{}", state.resource_type()),
            "@id": COLLECTION_PATH,
            "@type": "Collection",
            "totalItems": members.len(),
            "member": members,
        });
        Ok::<_, ApiError>(ld_json(StatusCode::OK, &body))
    }
    .instrument(span)
    .await
    .unwrap_or_else(|e| error_response(&e));
    Ok(with_request_id(response, request_id))
}

async fn get_resource(id: String, state: Arc<AppState>) -> Result<Response, Rejection> {
    let request_id = Ulid::new();
    let span = tracing::info_span!("get_resource", %request_id, resource = %id);
    let response = async {
        let id = parse_id(&id)?;
        let snapshot = state.store().get(&id).await?;
        Ok::<_, ApiError>(resource_response(&snapshot, state.resource_type()))
    }
    .instrument(span)
    .await
    .unwrap_or_else(|e| error_response(&e));
    Ok(with_request_id(response, request_id))
}

async fn put_resource(
    id: String,
    if_match: Option<String>,
    body: Bytes,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let request_id = Ulid::new();
    let span = tracing::info_span!("put_resource", %request_id, resource = %id, body_bytes = body.len());
    let response = replace(&id, if_match.as_deref(), &body, &state)
        .instrument(span)
        .await
        .unwrap_or_else(|e| error_response(&e));
    Ok(with_request_id(response, request_id))
}

async fn replace(
    id: &str,
    if_match: Option<&str>,
    body: &[u8],
    state: &AppState,
) -> Result<Response, ApiError> {
    let id = parse_id(id)?;
    let expected = expected_revision(if_match, state)?;
    let engine = state.engine();
    let snapshot = state
        .store()
        .replace_with(&id, expected, |stored| {
            engine.merge_slice(stored, body).map(Merged::into_resource)
        })
        .await?;
    Ok(resource_response(&snapshot, state.resource_type()))
}

/// Revision a replace must match, when revision checks are on
fn expected_revision(
    if_match: Option<&str>,
    state: &AppState,
) -> Result<Option<ContentHash>, ApiError> {
    if !state.store().config().optimistic_concurrency {
        return Ok(None);
    }
    match if_match.map(str::trim) {
        None | Some("*") => Ok(None),
        Some(tag) => ContentHash::from_etag(tag)
            .map(Some)
            .map_err(|_| ApiError::Conflict(format!("If-Match {tag} does not name a revision"))),
    }
}

fn parse_id(raw: &str) -> Result<ResourceId, ApiError> {
    ResourceId::new(raw).map_err(|_| ApiError::NotFound(format!("resource {raw} not found")))
}

fn resource_response(snapshot: &Snapshot, resource_type: &str) -> Response {
    let mut response = ld_json(
        StatusCode::OK,
        &snapshot.resource.to_representation(resource_type),
    );
    if let Ok(etag) = HeaderValue::from_str(&snapshot.revision.to_etag()) {
        response.headers_mut().insert(ETAG, etag);
    }
    response
}

fn ld_json<T: Serialize>(status: StatusCode, body: &T) -> Response {
    let mut response = warp::reply::with_status(warp::reply::json(body), status).into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(LD_JSON));
    response
}

fn error_response(err: &ApiError) -> Response {
    let status = err.status();
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    } else if let ApiError::Merge(merge) = err {
        let locator = merge.attachment().map(|a| a.locator());
        tracing::warn!(
            code = err.code(),
            rule = merge.attachment().map(|a| a.rule().as_str()),
            index = locator.map(|l| l.index),
            attachment = locator.and_then(|l| l.id.as_deref()),
            "replace rejected: {err}"
        );
    } else {
        tracing::debug!(code = err.code(), "request refused: {err}");
    }
    ld_json(status, &err.body())
}

fn with_request_id(mut response: Response, request_id: Ulid) -> Response {
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

async fn handle_rejection(rejection: Rejection, body_limit: u64) -> Result<Response, Infallible> {
    let err = if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        ApiError::PayloadTooLarge { limit: body_limit }
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        ApiError::LengthRequired
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiError::MethodNotAllowed
    } else if rejection.is_not_found() {
        ApiError::NotFound("no such route".to_string())
    } else {
        ApiError::Internal(format!("unhandled rejection: {rejection:?}"))
    };
    Ok(with_request_id(error_response(&err), Ulid::new()))
}
