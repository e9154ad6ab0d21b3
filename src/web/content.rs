//! JSON API handlers for portal content
//!
//! Each collection is mounted at its own path; request bodies are the plain
//! record (no `kind` tag), the collection comes from the route.

use axum::{
    extract::{rejection::JsonRejection, Json, Path, Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde_json::Value;

use crate::content::{
    Amendment, ContentBody, ContentEntry, ContentFilter, ContentKind, Leader, Ministry, NewsItem,
};

use super::api::MessageResponse;
use super::error::ApiError;
use super::extract::CurrentUser;
use super::server::AppState;

/// URL segment of a collection
pub fn collection_path(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Ministry => "ministries",
        ContentKind::News => "news",
        ContentKind::Amendment => "amendments",
        ContentKind::Leader => "leadership",
    }
}

/// Routes for one collection: `/{collection}` and `/{collection}/{id}`
pub fn routes(kind: ContentKind) -> Router<AppState> {
    let base = format!("/{}", collection_path(kind));
    let item = format!("{}/{{id}}", base);

    Router::new()
        .route(
            &base,
            get(move |state: State<AppState>, query: Query<ContentFilter>| {
                list(state, kind, query)
            })
            .post(
                move |state: State<AppState>, user: CurrentUser, payload: Payload| {
                    create(state, user, kind, payload)
                },
            ),
        )
        .route(
            &item,
            get(move |state: State<AppState>, id: Path<String>| fetch(state, kind, id))
                .put(
                    move |state: State<AppState>,
                          user: CurrentUser,
                          id: Path<String>,
                          payload: Payload| { update(state, user, kind, id, payload) },
                )
                .delete(
                    move |state: State<AppState>, user: CurrentUser, id: Path<String>| {
                        remove(state, user, kind, id)
                    },
                ),
        )
}

type Payload = Result<Json<Value>, JsonRejection>;

/// Decode a plain record into the body of the given kind
fn parse_body(kind: ContentKind, value: Value) -> Result<ContentBody, ApiError> {
    let parsed = match kind {
        ContentKind::Ministry => serde_json::from_value::<Ministry>(value).map(ContentBody::Ministry),
        ContentKind::News => serde_json::from_value::<NewsItem>(value).map(ContentBody::News),
        ContentKind::Amendment => {
            serde_json::from_value::<Amendment>(value).map(ContentBody::Amendment)
        }
        ContentKind::Leader => serde_json::from_value::<Leader>(value).map(ContentBody::Leader),
    };

    parsed.map_err(|e| ApiError::bad_request(format!("Invalid {} payload: {}", kind, e)))
}

async fn list(
    State(state): State<AppState>,
    kind: ContentKind,
    Query(filter): Query<ContentFilter>,
) -> Result<Json<Vec<ContentEntry>>, ApiError> {
    Ok(Json(state.desk.list(kind, filter).await?))
}

async fn fetch(
    State(state): State<AppState>,
    kind: ContentKind,
    Path(id): Path<String>,
) -> Result<Json<ContentEntry>, ApiError> {
    Ok(Json(state.desk.get(kind, &id).await?))
}

async fn create(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    kind: ContentKind,
    payload: Payload,
) -> Result<(StatusCode, Json<ContentEntry>), ApiError> {
    let Json(value) = payload?;
    let body = parse_body(kind, value)?;
    let entry = state.desk.create(&actor, body).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    kind: ContentKind,
    Path(id): Path<String>,
    payload: Payload,
) -> Result<Json<ContentEntry>, ApiError> {
    let Json(value) = payload?;
    let body = parse_body(kind, value)?;
    Ok(Json(state.desk.update(&actor, kind, &id, body).await?))
}

async fn remove(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    kind: ContentKind,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.desk.delete(&actor, kind, &id).await?;
    Ok(Json(MessageResponse {
        message: format!("{} deleted", kind),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_body() {
        let body = parse_body(
            ContentKind::News,
            serde_json::json!({"title": "Budget", "content": "Passed"}),
        )
        .unwrap();
        assert_eq!(body.kind(), ContentKind::News);

        let err = parse_body(ContentKind::Leader, serde_json::json!({"title": "x"})).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_collection_paths() {
        let paths: Vec<_> = ContentKind::ALL.iter().map(|k| collection_path(*k)).collect();
        assert_eq!(paths, vec!["ministries", "news", "amendments", "leadership"]);
    }
}
