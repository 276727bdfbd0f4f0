#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::common::testing::{test_config, test_issuer, test_state};
    use crate::users::{NewAccount, Role};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use futures_util::{SinkExt, Stream, StreamExt};
    use http_body_util::BodyExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tower::ServiceExt;

    async fn setup() -> (Router, Arc<RwLock<AppState>>) {
        let shared = Arc::new(RwLock::new(test_state().await));
        (build_router(shared.clone(), &test_config()), shared)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn with_bearer(mut request: Request<Body>, token: &str) -> Request<Body> {
        request.headers_mut().insert(
            "authorization",
            format!("Bearer {}", token).parse().unwrap(),
        );
        request
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn register(app: &Router, email: &str) -> (String, String) {
        let (status, body) = send(
            app,
            post_json(
                "/api/auth/register",
                json!({ "email": email, "password": "secret1", "firstName": "Ada" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        (
            body["accessToken"].as_str().unwrap().to_string(),
            body["refreshToken"].as_str().unwrap().to_string(),
        )
    }

    async fn admin_token(shared: &Arc<RwLock<AppState>>) -> String {
        let state = shared.read().await.clone();
        let admin = state
            .store
            .create(NewAccount {
                email: "admin@example.com".to_string(),
                role: Role::Admin,
                ..Default::default()
            })
            .await
            .unwrap();
        test_issuer().issue_pair(&admin).unwrap().access_token
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (app, _) = setup().await;
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_register_login_profile_flow() {
        let (app, _) = setup().await;
        let (access, _) = register(&app, "ada@example.com").await;

        let (status, body) = send(
            &app,
            post_json(
                "/api/auth/register",
                json!({ "email": "ada@example.com", "password": "secret1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "User with this email already exists");

        let (status, _) = send(
            &app,
            post_json(
                "/api/auth/login",
                json!({ "email": "ada@example.com", "password": "wrong-password" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, with_bearer(get("/api/auth/profile"), &access)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(body["firstName"], "Ada");
        assert_eq!(body["role"], "user");
        assert!(body.get("passwordHash").is_none());
        assert!(body.get("refreshToken").is_none());
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (app, _) = setup().await;
        let (status, body) = send(
            &app,
            post_json(
                "/api/auth/register",
                json!({ "email": "not-an-email", "password": "123" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let (app, _) = setup().await;

        let (status, _) = send(&app, get("/api/auth/profile")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, with_bearer(get("/api/auth/profile"), "garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Routes missing from the capability table are not public
        let (status, _) = send(&app, get("/api/auth/twitter")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_rotation_and_logout() {
        let (app, _) = setup().await;
        let (access, refresh) = register(&app, "rot@example.com").await;

        let (status, body) = send(
            &app,
            post_json("/api/auth/refresh", json!({ "refreshToken": refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rotated = body["refreshToken"].as_str().unwrap().to_string();
        assert_ne!(rotated, refresh);

        // The superseded token no longer works
        let (status, body) = send(
            &app,
            post_json("/api/auth/refresh", json!({ "refreshToken": refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid refresh token");

        let (status, _) = send(
            &app,
            with_bearer(post_json("/api/auth/logout", json!({})), &access),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(
            &app,
            post_json("/api/auth/refresh", json!({ "refreshToken": rotated })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_notification_endpoints_require_admin() {
        let (app, shared) = setup().await;
        let (user_access, _) = register(&app, "shopper@example.com").await;

        let request = post_json("/api/notifications/broadcast", json!({ "message": "hi" }));
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = with_bearer(
            post_json("/api/notifications/broadcast", json!({ "message": "hi" })),
            &user_access,
        );
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = admin_token(&shared).await;
        let request = with_bearer(
            post_json("/api/notifications/broadcast", json!({ "message": "hi" })),
            &admin,
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["delivered"], 0);

        let request = with_bearer(
            post_json("/api/notifications/orders/1", json!({ "status": "shipped" })),
            &admin,
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["delivered"], 0);
    }

    #[tokio::test]
    async fn test_oauth_start_and_callback_state() {
        let (app, _) = setup().await;

        let response = app.clone().oneshot(get("/api/auth/google")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()["location"].to_str().unwrap();
        assert!(location.starts_with("https://accounts.google.com/"));
        assert!(location.contains("client_id=google-client"));
        let cookie = response.headers()["set-cookie"].to_str().unwrap();
        assert!(cookie.starts_with("oauth_state="));

        // Facebook has no credentials in the test configuration
        let (status, _) = send(&app, get("/api/auth/facebook")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let request = Request::builder()
            .uri("/api/auth/google/callback?code=abc&state=forged")
            .header("cookie", "oauth_state=expected")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // ==================== Account management ====================

    #[tokio::test]
    async fn test_account_management_requires_admin_for_writes() {
        let (app, _) = setup().await;
        let (user_access, _) = register(&app, "shopper@example.com").await;

        let body = json!({ "email": "new@example.com", "password": "secret1" });
        let (status, _) = send(&app, post_json("/api/users", body.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, with_bearer(post_json("/api/users", body), &user_access)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let request = json_request("PATCH", "/api/users/1", json!({ "role": "admin" }));
        let (status, _) = send(&app, with_bearer(request, &user_access)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, with_bearer(delete("/api/users/1"), &user_access)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Reads only need a signed-in account
        let (status, _) = send(&app, get("/api/users")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, body) = send(&app, with_bearer(get("/api/users"), &user_access)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn test_admin_account_lifecycle() {
        let (app, shared) = setup().await;
        let admin = admin_token(&shared).await;

        let request = post_json(
            "/api/users",
            json!({
                "email": "clerk@example.com",
                "password": "secret1",
                "firstName": "Clerk",
                "role": "guest"
            }),
        );
        let (status, created) = send(&app, with_bearer(request, &admin)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["email"], "clerk@example.com");
        assert_eq!(created["role"], "guest");
        assert!(created.get("passwordHash").is_none());
        let id = created["id"].as_i64().unwrap();

        // The new account can sign in with the password the admin set
        let (status, _) = send(
            &app,
            post_json(
                "/api/auth/login",
                json!({ "email": "clerk@example.com", "password": "secret1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let request = post_json("/api/users", json!({ "email": "clerk@example.com" }));
        let (status, body) = send(&app, with_bearer(request, &admin)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "User with this email already exists");

        let uri = format!("/api/users/{}", id);
        let request = json_request(
            "PATCH",
            &uri,
            json!({ "lastName": "Kent", "role": "user", "isActive": false }),
        );
        let (status, updated) = send(&app, with_bearer(request, &admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["firstName"], "Clerk");
        assert_eq!(updated["lastName"], "Kent");
        assert_eq!(updated["role"], "user");
        assert_eq!(updated["isActive"], false);

        let (status, fetched) = send(&app, with_bearer(get(&uri), &admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["lastName"], "Kent");

        let (status, body) = send(&app, with_bearer(delete(&uri), &admin)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, body) = send(&app, with_bearer(get(&uri), &admin)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], format!("User with ID {} not found", id));

        let (status, _) = send(&app, with_bearer(delete(&uri), &admin)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_account_list_filters_and_pages() {
        let (app, shared) = setup().await;
        let admin = admin_token(&shared).await;
        for (email, first_name) in [
            ("ann@example.com", "Ann"),
            ("bob@example.com", "Bob"),
            ("cat@example.com", "Cat"),
        ] {
            let request = post_json(
                "/api/users",
                json!({ "email": email, "firstName": first_name }),
            );
            let (status, _) = send(&app, with_bearer(request, &admin)).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(
            &app,
            with_bearer(get("/api/users?sortBy=email&sortOrder=asc&limit=2"), &admin),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 4);
        assert_eq!(body["page"], 1);
        assert_eq!(body["limit"], 2);
        assert_eq!(body["totalPages"], 2);
        assert_eq!(body["data"][0]["email"], "admin@example.com");
        assert_eq!(body["data"][1]["email"], "ann@example.com");

        let (_, body) = send(
            &app,
            with_bearer(get("/api/users?sortBy=email&sortOrder=ASC&limit=2&page=2"), &admin),
        )
        .await;
        let emails: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["email"].as_str().unwrap())
            .collect();
        assert_eq!(emails, vec!["bob@example.com", "cat@example.com"]);

        let (_, body) = send(&app, with_bearer(get("/api/users?search=bo"), &admin)).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["firstName"], "Bob");

        let (_, body) = send(&app, with_bearer(get("/api/users?role=admin"), &admin)).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["role"], "admin");

        for query in ["page=0", "limit=500", "sortBy=password_hash", "sortOrder=up", "role=root"] {
            let uri = format!("/api/users?{}", query);
            let (status, body) = send(&app, with_bearer(get(&uri), &admin)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", query);
            assert_eq!(body["code"], "VALIDATION_ERROR");
        }
    }

    // ==================== WebSocket gateway ====================

    async fn spawn_server() -> (String, Arc<RwLock<AppState>>) {
        let (app, shared) = setup().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });
        (format!("ws://{}/ws", addr), shared)
    }

    async fn next_json<S>(socket: &mut S) -> Value
    where
        S: Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            match socket.next().await.unwrap().unwrap() {
                WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
                WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_websocket_gateway_round_trip() {
        let (url, shared) = spawn_server().await;
        let state = shared.read().await.clone();
        let account = state
            .store
            .create(NewAccount {
                email: "ws@example.com".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let token = test_issuer().issue_pair(&account).unwrap().access_token;

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("{}?token={}", url, token))
            .await
            .unwrap();

        let connected = next_json(&mut socket).await;
        assert_eq!(connected["type"], "connected");
        assert_eq!(connected["room"], format!("user_{}", account.id));

        socket
            .send(WsMessage::Text(json!({ "type": "ping" }).to_string()))
            .await
            .unwrap();
        assert_eq!(next_json(&mut socket).await["type"], "pong");

        let delivered = state
            .gateway
            .send_order_update(account.id, json!({ "orderId": 9 }))
            .await;
        assert_eq!(delivered, 1);
        let update = next_json(&mut socket).await;
        assert_eq!(update["type"], "order_update");
        assert_eq!(update["data"]["orderId"], 9);

        socket
            .send(WsMessage::Text("{not json".to_string()))
            .await
            .unwrap();
        let error = next_json(&mut socket).await;
        assert_eq!(error["type"], "error");
        assert_eq!(error["code"], "INVALID_MESSAGE");
    }

    #[tokio::test]
    async fn test_websocket_rejects_invalid_token() {
        let (url, shared) = spawn_server().await;

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("{}?token=bogus", url))
            .await
            .unwrap();

        match socket.next().await {
            None | Some(Ok(WsMessage::Close(_))) | Some(Err(_)) => {}
            Some(Ok(other)) => panic!("expected close, got {:?}", other),
        }

        let state = shared.read().await.clone();
        assert_eq!(state.gateway.registry().connection_count().await, 0);
    }
}
