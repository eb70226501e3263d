// routes.rs
use axum::{
    routing::{delete, get, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::normalize_path::NormalizePath;

use crate::handlers;

pub fn create_routes(pool: SqlitePool) -> Router {
    let admin: Router<SqlitePool> = Router::new()
        .route(
            "/questions",
            get(handlers::admin_questions).post(handlers::create_question),
        )
        .route("/questions/{question_id}", delete(handlers::delete_question))
        .route("/questions/{question_id}/choices", post(handlers::add_choice));

    let polls: Router<SqlitePool> = Router::new()
        .route("/", get(handlers::index))
        .route("/{question_id}", get(handlers::detail))
        .route("/{question_id}/results", get(handlers::results))
        .route("/{question_id}/vote", post(handlers::vote))
        .nest("/admin", admin);

    Router::new()
        .route("/", get(handlers::root))
        .nest("/polls", polls)
        .with_state(pool)
}

/// `/polls/5/vote/` reaches the same handler as `/polls/5/vote`. Must wrap the
/// router from the outside, routing happens before any `Router::layer` runs.
pub fn trim_trailing_slash(router: Router) -> NormalizePath<Router> {
    NormalizePath::trim_trailing_slash(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use axum::body::{to_bytes, Body};
    use http::{
        header::{CONTENT_TYPE, LOCATION},
        Request, StatusCode,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(pool: &SqlitePool, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let app = trim_trailing_slash(create_routes(pool.clone()));
        let response = app.oneshot(request).await.unwrap();

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, location, body)
    }

    fn get_uri(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn form_request(uri: &str, body: String) -> Request<Body> {
        Request::post(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    async fn create(pool: &SqlitePool, text: &str) -> Value {
        let (status, _, body) = send(
            pool,
            json_request(
                "POST",
                "/polls/admin/questions",
                json!({ "question_text": text, "choices": ["Not much", "The sky", ""] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    async fn tallies(pool: &SqlitePool, question_id: i64) -> Vec<i64> {
        let (status, _, body) = send(pool, get_uri(&format!("/polls/{question_id}/results"))).await;
        assert_eq!(status, StatusCode::OK);
        body["choices"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["votes"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn routes_register_without_conflicts() {
        let db = test_db().await;
        let _router: Router = create_routes(db.pool.clone());
    }

    #[tokio::test]
    async fn form_vote_redirects_to_results() {
        let db = test_db().await;
        let pool = db.pool.clone();
        let created = create(&pool, "What's up?").await;
        let question_id = created["question"]["id"].as_i64().unwrap();
        let choice_id = created["choices"][1]["id"].as_i64().unwrap();

        let request = form_request(&format!("/polls/{question_id}/vote"), format!("choice={choice_id}"));
        let (status, location, _) = send(&pool, request).await;

        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some(format!("/polls/{question_id}/results").as_str()));
        assert_eq!(tallies(&pool, question_id).await, vec![0, 1]);
    }

    #[tokio::test]
    async fn form_vote_without_choice_field_is_rejected() {
        let db = test_db().await;
        let pool = db.pool.clone();
        let created = create(&pool, "What's up?").await;
        let question_id = created["question"]["id"].as_i64().unwrap();

        let request = form_request(&format!("/polls/{question_id}/vote"), String::new());
        let (status, _, body) = send(&pool, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_message"], handlers::NO_CHOICE_MESSAGE);
        assert_eq!(tallies(&pool, question_id).await, vec![0, 0]);
    }

    #[tokio::test]
    async fn json_vote_body_counts_as_missing_choice() {
        let db = test_db().await;
        let pool = db.pool.clone();
        let created = create(&pool, "What's up?").await;
        let question_id = created["question"]["id"].as_i64().unwrap();
        let choice_id = created["choices"][0]["id"].as_i64().unwrap();

        let request = json_request(
            "POST",
            &format!("/polls/{question_id}/vote"),
            json!({ "choice": choice_id.to_string() }),
        );
        let (status, location, body) = send(&pool, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(location, None);
        assert_eq!(body["error_message"], handlers::NO_CHOICE_MESSAGE);
        assert_eq!(body["question"]["id"], question_id);
        assert_eq!(tallies(&pool, question_id).await, vec![0, 0]);
    }

    #[tokio::test]
    async fn index_lists_questions_with_and_without_trailing_slash() {
        let db = test_db().await;
        let pool = db.pool.clone();
        create(&pool, "First?").await;
        create(&pool, "Second?").await;

        for uri in ["/polls", "/polls/"] {
            let (status, _, body) = send(&pool, get_uri(uri)).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body.as_array().unwrap().len(), 2, "{uri}");
        }
    }

    #[tokio::test]
    async fn trailing_slash_reaches_detail_and_vote() {
        let db = test_db().await;
        let pool = db.pool.clone();
        let created = create(&pool, "What's up?").await;
        let question_id = created["question"]["id"].as_i64().unwrap();
        let choice_id = created["choices"][0]["id"].as_i64().unwrap();

        let (status, _, body) = send(&pool, get_uri(&format!("/polls/{question_id}/"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["question"]["question_text"], "What's up?");

        let request = form_request(&format!("/polls/{question_id}/vote/"), format!("choice={choice_id}"));
        let (status, _, _) = send(&pool, request).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(tallies(&pool, question_id).await, vec![1, 0]);
    }

    #[tokio::test]
    async fn non_numeric_or_oversized_question_ids_are_not_found() {
        let db = test_db().await;
        let pool = db.pool.clone();

        for uri in ["/polls/abc", "/polls/99999999999999999999", "/polls/abc/results"] {
            let (status, _, body) = send(&pool, get_uri(uri)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["error"], "NOT_FOUND", "{uri}");
        }

        for uri in ["/polls/abc/vote", "/polls/0/vote"] {
            let (status, _, body) = send(&pool, form_request(uri, "choice=1".to_string())).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["error"], "NOT_FOUND", "{uri}");
        }

        let request = Request::delete("/polls/admin/questions/abc").body(Body::empty()).unwrap();
        let (status, _, _) = send(&pool, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_create_list_delete_round_trip() {
        let db = test_db().await;
        let pool = db.pool.clone();
        let created = create(&pool, "Favourite colour?").await;
        let question_id = created["question"]["id"].as_i64().unwrap();
        assert_eq!(created["choices"].as_array().unwrap().len(), 2);

        let (status, _, hits) = send(&pool, get_uri("/polls/admin/questions?q=colour&published=today")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert_eq!(hits[0]["id"], question_id);

        let (status, _, choice) = send(
            &pool,
            json_request(
                "POST",
                &format!("/polls/admin/questions/{question_id}/choices"),
                json!({ "choice_text": "Blue" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(choice["question_id"], question_id);

        let delete_request = || {
            Request::delete(format!("/polls/admin/questions/{question_id}"))
                .body(Body::empty())
                .unwrap()
        };
        let (status, _, _) = send(&pool, delete_request()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _, _) = send(&pool, delete_request()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = send(&pool, get_uri(&format!("/polls/{question_id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, _, listing) = send(&pool, get_uri("/polls/admin/questions")).await;
        assert!(listing.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_listing_filter_is_a_json_validation_error() {
        let db = test_db().await;
        let pool = db.pool.clone();

        let (status, _, body) = send(&pool, get_uri("/polls/admin/questions?published=someday")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn blank_question_payload_is_rejected() {
        let db = test_db().await;
        let pool = db.pool.clone();

        let request = json_request("POST", "/polls/admin/questions", json!({ "question_text": "  " }));
        let (status, _, body) = send(&pool, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }
}
