use axum::{
    Router,
    routing::{get, post, put},
};

use std::sync::Arc;

use crate::{accounts, funds, transfers};
use engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// All routes, bound to `engine`.
pub fn router(engine: Engine) -> Router {
    let state = ServerState {
        engine: Arc::new(engine),
    };

    Router::new()
        .route("/accounts", post(accounts::account_new))
        .route("/accounts/{id}", get(accounts::get))
        .route("/accounts/{id}/fund/{fund_id}", put(accounts::associate_fund))
        .route("/accounts/{id}/invest", post(transfers::invest))
        .route("/accounts/{id}/transfers", get(transfers::list))
        .route("/transfers/{id}", get(transfers::get))
        .route("/funds", post(funds::fund_new).get(funds::list))
        .route("/funds/{id}", get(funds::get).put(funds::fund_update))
        .with_state(state)
}

pub async fn run(engine: Engine) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(engine)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use engine::MemoryStore;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    async fn app() -> Router {
        let engine = Engine::builder()
            .store(Arc::new(MemoryStore::new()))
            .build()
            .await
            .unwrap();
        router(engine)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Account with `cash` associated with a fresh fund; returns both ids.
    async fn seed(app: &Router, cash: &str) -> (String, String) {
        let (status, fund) = send(
            app,
            Method::POST,
            "/funds",
            Some(json!({
                "name": "World",
                "description": "Global equity",
                "category": "Equity",
                "risk": "High",
                "total": "10000"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let fund_id = fund["id"].as_str().unwrap().to_string();

        let (status, account) = send(
            app,
            Method::POST,
            "/accounts",
            Some(json!({ "owner_id": "alice", "cash_balance": cash })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let account_id = account["id"].as_str().unwrap().to_string();

        let (status, account) = send(
            app,
            Method::PUT,
            &format!("/accounts/{account_id}/fund/{fund_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(account["fund_id"], json!(fund_id));

        (account_id, fund_id)
    }

    #[tokio::test]
    async fn invest_then_replay() {
        let app = app().await;
        let (account_id, fund_id) = seed(&app, "25000").await;
        let body = json!({ "fund_id": fund_id, "amount": "25000", "idempotency_key": "k-1" });

        let (status, first) = send(
            &app,
            Method::POST,
            &format!("/accounts/{account_id}/invest"),
            Some(body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["replayed"], json!(false));
        assert_eq!(first["transfer"]["amount"], json!("25000"));

        let (status, second) = send(
            &app,
            Method::POST,
            &format!("/accounts/{account_id}/invest"),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["replayed"], json!(true));
        assert_eq!(second["transfer"]["id"], first["transfer"]["id"]);

        let (_, account) = send(&app, Method::GET, &format!("/accounts/{account_id}"), None).await;
        assert_eq!(account["cash_balance"], json!("0"));
        assert_eq!(account["invested_total"], json!("25000"));

        let (_, fund) = send(&app, Method::GET, &format!("/funds/{fund_id}"), None).await;
        assert_eq!(fund["total"], json!("35000"));

        let (_, list) = send(
            &app,
            Method::GET,
            &format!("/accounts/{account_id}/transfers"),
            None,
        )
        .await;
        assert_eq!(list["transfers"].as_array().unwrap().len(), 1);

        let transfer_id = first["transfer"]["id"].as_str().unwrap();
        let (status, transfer) =
            send(&app, Method::GET, &format!("/transfers/{transfer_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(transfer["account_id"], json!(account_id));
    }

    #[tokio::test]
    async fn insufficient_balance_is_422() {
        let app = app().await;
        let (account_id, fund_id) = seed(&app, "500").await;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/accounts/{account_id}/invest"),
            Some(json!({ "fund_id": fund_id, "amount": "10000" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], json!("INSUFFICIENT_BALANCE"));

        let (_, account) = send(&app, Method::GET, &format!("/accounts/{account_id}"), None).await;
        assert_eq!(account["cash_balance"], json!("500"));
    }

    #[tokio::test]
    async fn second_association_is_422() {
        let app = app().await;
        let (account_id, fund_id) = seed(&app, "1").await;

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/accounts/{account_id}/fund/{fund_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], json!("FUND_ALREADY_ASSOCIATED"));
    }

    #[tokio::test]
    async fn unknown_records_are_404() {
        let app = app().await;
        let id = uuid::Uuid::new_v4();

        for uri in [
            format!("/accounts/{id}"),
            format!("/accounts/{id}/transfers"),
            format!("/funds/{id}"),
            format!("/transfers/{id}"),
        ] {
            let (status, _) = send(&app, Method::GET, &uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        }

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/accounts/{id}/invest"),
            Some(json!({ "fund_id": id, "amount": "1" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], json!("ACCOUNT_NOT_FOUND"));
    }

    #[tokio::test]
    async fn malformed_requests_are_400() {
        let app = app().await;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/accounts")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            Method::POST,
            "/funds",
            Some(json!({ "name": "x", "description": "y", "category": "Crypto", "risk": "Low" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("BAD_REQUEST"));

        for uri in [
            "/accounts/not-a-uuid",
            "/funds/not-a-uuid",
            "/transfers/not-a-uuid",
            "/accounts/not-a-uuid/transfers",
        ] {
            let (status, body) = send(&app, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["code"], json!("BAD_REQUEST"), "{uri}");
            assert!(body["error"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn invalid_amount_text_is_422() {
        let app = app().await;
        let (account_id, fund_id) = seed(&app, "10").await;

        for amount in ["abc", "0", "-5"] {
            let (status, body) = send(
                &app,
                Method::POST,
                &format!("/accounts/{account_id}/invest"),
                Some(json!({ "fund_id": fund_id, "amount": amount })),
            )
            .await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{amount}");
            assert_eq!(body["code"], json!("INVALID_AMOUNT"));
        }
    }

    #[tokio::test]
    async fn funds_are_listed_and_edited() {
        let app = app().await;
        for name in ["Gilts", "Asia"] {
            let (status, _) = send(
                &app,
                Method::POST,
                "/funds",
                Some(json!({
                    "name": name,
                    "description": "desc",
                    "category": "Bond",
                    "risk": "Low",
                    "performance": "3.5"
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, list) = send(&app, Method::GET, "/funds", None).await;
        let funds = list["funds"].as_array().unwrap();
        assert_eq!(funds[0]["name"], json!("Asia"));
        assert_eq!(funds[1]["name"], json!("Gilts"));
        assert_eq!(funds[0]["total"], json!("0"));
        assert_eq!(funds[0]["performance"], json!("3.5"));

        let fund_id = funds[0]["id"].as_str().unwrap();
        let (status, fund) = send(
            &app,
            Method::PUT,
            &format!("/funds/{fund_id}"),
            Some(json!({ "name": "Asia Pacific", "description": "Ex-Japan" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fund["name"], json!("Asia Pacific"));
        assert_eq!(fund["revision"], json!(1));

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/funds/{fund_id}"),
            Some(json!({ "name": " ", "description": "Ex-Japan" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], json!("INVALID_INPUT"));
    }
}
