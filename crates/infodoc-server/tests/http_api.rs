//! HTTP contract of the resource routes
//!
//! Replaces are all-or-nothing: a rejected PUT leaves the stored resource
//! exactly as a GET returned it before. Every response is JSON-LD and
//! carries a request id.

use infodoc_artifact::DEFAULT_MAX_ATTACHMENT_BYTES;
use infodoc_server::{http, AppState, LimitsConfig, ServerConfig};
use infodoc_store::{ResourceStore, StoreConfig};
use infodoc_test_utils::{
    attachment_json, attachment_of_len, documents_payload, seeded_store, FailingBackend,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;

type Reply = warp::http::Response<Bytes>;

async fn state(config: &ServerConfig) -> Arc<AppState> {
    let store = seeded_store(&["1"], config.store_config()).await;
    Arc::new(AppState::new(store, config))
}

fn body(res: &Reply) -> Value {
    serde_json::from_slice(res.body()).unwrap()
}

async fn get(state: &Arc<AppState>, path: &str) -> Reply {
    warp::test::request()
        .method("GET")
        .path(path)
        .reply(&http::routes(Arc::clone(state)))
        .await
}

async fn put(state: &Arc<AppState>, path: &str, payload: &Value) -> Reply {
    warp::test::request()
        .method("PUT")
        .path(path)
        .header("content-type", "application/ld+json")
        .body(serde_json::to_vec(payload).unwrap())
        .reply(&http::routes(Arc::clone(state)))
        .await
}

fn document_ids(representation: &Value) -> Vec<String> {
    representation["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn get_returns_json_ld_representation() {
    let state = state(&ServerConfig::default()).await;
    let res = get(&state, "/resource/1").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/ld+json");
    assert!(res.headers().contains_key("etag"));
    assert_eq!(res.headers()[http::REQUEST_ID_HEADER].len(), 26);

    let rep = body(&res);
    assert_eq!(rep["@context"], json!("/contexts/GeneralInfo"));
    assert_eq!(rep["@id"], json!("/resource/1"));
    assert_eq!(rep["@type"], json!("GeneralInfo"));
    assert_eq!(rep["id"], json!("1"));
    assert_eq!(rep["documents"], json!([]));
    assert_eq!(rep["activeNews"], json!([{"title": "Opening", "active": true}]));
}

#[tokio::test]
async fn unknown_resource_is_404() {
    let state = state(&ServerConfig::default()).await;
    for path in ["/resource/2", "/resource/..hidden", "/nowhere"] {
        let res = get(&state, path).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body(&res)["error"]["code"], json!("not_found"));
        assert!(res.headers().contains_key(http::REQUEST_ID_HEADER));
    }
}

#[tokio::test]
async fn put_to_unknown_resource_is_404_and_creates_nothing() {
    let state = state(&ServerConfig::default()).await;
    let payload = documents_payload(vec![attachment_json("doc-1", "a.txt", b"a")]);
    let res = put(&state, "/resource/2", &payload).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(&res)["error"]["code"], json!("not_found"));

    let res = get(&state, "/resource/2").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_then_get_sees_new_attachment() {
    let state = state(&ServerConfig::default()).await;
    let payload = documents_payload(vec![attachment_json("doc-1", "hello.txt", b"Hello World")]);
    let res = put(&state, "/resource/1", &payload).await;
    assert_eq!(res.status(), StatusCode::OK);
    let put_etag = res.headers()["etag"].clone();

    let res = get(&state, "/resource/1").await;
    assert_eq!(document_ids(&body(&res)), vec!["doc-1"]);
    assert_eq!(res.headers()["etag"], put_etag);
    assert_eq!(
        body(&res)["documents"][0]["fileUrl"],
        json!("data:application/octet-stream;base64,SGVsbG8gV29ybGQ=")
    );
}

#[tokio::test]
async fn fetched_representation_can_be_sent_back() {
    let state = state(&ServerConfig::default()).await;
    let payload = documents_payload(vec![attachment_json("a", "a.pdf", b"%PDF")]);
    put(&state, "/resource/1", &payload).await;

    let fetched = get(&state, "/resource/1").await;
    let mut sent_back = body(&fetched);
    sent_back["id"] = json!("999");
    sent_back["@id"] = json!("/resource/999");
    let res = put(&state, "/resource/1", &sent_back).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(&res), body(&fetched));
    assert_eq!(res.headers()["etag"], fetched.headers()["etag"]);
}

#[tokio::test]
async fn special_file_name_round_trips() {
    let state = state(&ServerConfig::default()).await;
    let mut doc = attachment_json("t", "tést file @#.txt", b"content");
    doc["name"] = json!("Test Accents é à ç");
    put(&state, "/resource/1", &documents_payload(vec![doc])).await;

    let rep = body(&get(&state, "/resource/1").await);
    assert_eq!(rep["documents"][0]["fileName"], json!("tést file @#.txt"));
    assert_eq!(rep["documents"][0]["name"], json!("Test Accents é à ç"));
}

#[tokio::test]
async fn empty_file_is_accepted() {
    let state = state(&ServerConfig::default()).await;
    let doc = json!({
        "id": "empty",
        "name": "Empty",
        "date": "2024-01-01",
        "fileName": "empty.txt",
        "fileUrl": "data:text/plain;base64,"
    });
    let res = put(&state, "/resource/1", &documents_payload(vec![doc])).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(&res)["documents"][0]["fileUrl"], json!("data:text/plain;base64,"));
}

#[tokio::test]
async fn size_ceiling_boundary() {
    let state = state(&ServerConfig::default()).await;
    let under = documents_payload(vec![attachment_of_len("under", DEFAULT_MAX_ATTACHMENT_BYTES - 1)]);
    assert_eq!(put(&state, "/resource/1", &under).await.status(), StatusCode::OK);

    let over = documents_payload(vec![attachment_of_len("over", DEFAULT_MAX_ATTACHMENT_BYTES + 1)]);
    let res = put(&state, "/resource/1", &over).await;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let err = body(&res);
    assert_eq!(err["error"]["code"], json!("size_limit_exceeded"));
    assert_eq!(err["error"]["rule"], json!("size_limit"));
    assert_eq!(err["error"]["attachment"], json!({"index": 0, "id": "over"}));

    let rep = body(&get(&state, "/resource/1").await);
    assert_eq!(document_ids(&rep), vec!["under"]);
}

#[tokio::test]
async fn one_invalid_attachment_adds_nothing() {
    let state = state(&ServerConfig::default()).await;
    let payload = documents_payload(vec![
        attachment_json("ok", "ok.txt", b"fine"),
        json!({"id": "broken", "fileName": "broken.txt"}),
    ]);
    let res = put(&state, "/resource/1", &payload).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err = body(&res);
    assert_eq!(err["error"]["code"], json!("missing_field"));
    assert_eq!(err["error"]["field"], json!("fileUrl"));
    assert_eq!(err["error"]["attachment"], json!({"index": 1, "id": "broken"}));

    let rep = body(&get(&state, "/resource/1").await);
    assert!(document_ids(&rep).is_empty());
    assert_eq!(rep["companyName"], json!("Acme Renovation"));
}

#[tokio::test]
async fn duplicate_ids_are_rejected() {
    let state = state(&ServerConfig::default()).await;
    let payload = documents_payload(vec![
        attachment_json("same", "a.txt", b"a"),
        attachment_json("same", "b.txt", b"b"),
    ]);
    let res = put(&state, "/resource/1", &payload).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body(&res)["error"]["code"], json!("duplicate_identifier"));
}

#[tokio::test]
async fn malformed_encoding_is_422() {
    let state = state(&ServerConfig::default()).await;
    let mut doc = attachment_json("x", "x.txt", b"x");
    doc["fileUrl"] = json!("https://example.com/x.txt");
    let res = put(&state, "/resource/1", &documents_payload(vec![doc])).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body(&res)["error"]["code"], json!("malformed_encoding"));
}

#[tokio::test]
async fn malformed_payloads_are_400() {
    let state = state(&ServerConfig::default()).await;
    let res = warp::test::request()
        .method("PUT")
        .path("/resource/1")
        .body("{\"documents\": [")
        .reply(&http::routes(Arc::clone(&state)))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&res)["error"]["code"], json!("malformed_payload"));

    let res = put(&state, "/resource/1", &json!({"documents": "none"})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&res)["error"]["field"], json!("documents"));
}

#[tokio::test]
async fn missing_content_length_is_411() {
    let state = state(&ServerConfig::default()).await;
    let res = warp::test::request()
        .method("PUT")
        .path("/resource/1")
        .reply(&http::routes(Arc::clone(&state)))
        .await;
    assert_eq!(res.status(), StatusCode::LENGTH_REQUIRED);
    assert_eq!(body(&res)["error"]["code"], json!("length_required"));
}

#[tokio::test]
async fn oversize_declared_body_is_413_before_reading() {
    let config = ServerConfig::default().with_limits(LimitsConfig {
        max_attachment_bytes: 16,
        max_total_bytes: 32,
        max_body_bytes: Some(1024),
    });
    let state = state(&config).await;
    let res = warp::test::request()
        .method("PUT")
        .path("/resource/1")
        .header("content-length", "1048576")
        .reply(&http::routes(Arc::clone(&state)))
        .await;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body(&res)["error"]["code"], json!("payload_too_large"));
}

#[tokio::test]
async fn unsupported_method_is_405() {
    let state = state(&ServerConfig::default()).await;
    let res = warp::test::request()
        .method("DELETE")
        .path("/resource/1")
        .reply(&http::routes(Arc::clone(&state)))
        .await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn collection_lists_members() {
    let config = ServerConfig::default().with_resource_type("SiteInfo");
    let store = seeded_store(&["1", "2"], StoreConfig::default()).await;
    let state = Arc::new(AppState::new(store, &config));
    let res = get(&state, "/resource").await;
    assert_eq!(res.status(), StatusCode::OK);
    let collection = body(&res);
    assert_eq!(collection["@type"], json!("Collection"));
    assert_eq!(collection["@context"], json!("/contexts/SiteInfo"));
    assert_eq!(collection["totalItems"], json!(2));
    assert_eq!(collection["member"][1]["@id"], json!("/resource/2"));
    assert_eq!(collection["member"][0]["@type"], json!("SiteInfo"));
}

#[tokio::test]
async fn if_match_is_ignored_by_default() {
    let state = state(&ServerConfig::default()).await;
    let res = warp::test::request()
        .method("PUT")
        .path("/resource/1")
        .header("if-match", "\"deadbeef\"")
        .json(&json!({}))
        .reply(&http::routes(Arc::clone(&state)))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn stale_if_match_conflicts_when_enabled() {
    let config = ServerConfig::default().with_optimistic_concurrency(true);
    let state = state(&config).await;
    let etag = get(&state, "/resource/1").await.headers()["etag"]
        .to_str()
        .unwrap()
        .to_string();

    let replace = |tag: String| {
        let state = Arc::clone(&state);
        async move {
            warp::test::request()
                .method("PUT")
                .path("/resource/1")
                .header("if-match", tag)
                .json(&json!({"heroText": "changed"}))
                .reply(&http::routes(state))
                .await
        }
    };

    assert_eq!(replace(etag.clone()).await.status(), StatusCode::OK);
    let res = replace(etag).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body(&res)["error"]["code"], json!("conflict"));
    assert_eq!(replace("*".to_string()).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn backend_failure_is_500() {
    let config = ServerConfig::default();
    let store = Arc::new(ResourceStore::new(Arc::new(FailingBackend)));
    let state = Arc::new(AppState::new(store, &config));
    let res = get(&state, "/resource/1").await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body(&res),
        json!({"error": {"code": "internal", "message": "internal server error"}})
    );
}
