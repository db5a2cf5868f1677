use std::net::SocketAddr;
use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::state::AppState;
use crate::{auth, ingredients, nutrition, planner, recipes, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest("/api",
              Router::new()
                  .merge(auth::router())
                  .merge(recipes::router())
                  .merge(ingredients::router())
                  .merge(nutrition::router())
                  .merge(planner::router())
                  .merge(users::router())
                  .route("/health", get(|| async { "ok" }))
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis();
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod api_tests {
    use super::*;
    use crate::planner::week::{current_week_key, today_day_index};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    async fn signed_up(app: &Router, username: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({"username": username, "password": "secret123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["access_token"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, Method::GET, "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("ok"));
    }

    #[tokio::test]
    async fn signup_validates_and_rejects_duplicates() {
        let app = build_app(AppState::fake());

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({"username": "al", "password": "secret123"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!("Username must be at least 3 characters"));

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({"username": "alice", "password": "123"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        signed_up(&app, "alice").await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({"username": "alice", "password": "secret123"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn login_checks_password() {
        let app = build_app(AppState::fake());
        signed_up(&app, "alice").await;

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"username": "alice", "password": "wrong-pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"username": "alice", "password": "secret123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "alice");
        assert!(body["refresh_token"].as_str().is_some());
    }

    #[tokio::test]
    async fn legacy_plaintext_password_is_upgraded_on_login() {
        let state = AppState::fake();
        let record = crate::users::repo_types::UserRecord::new("oldpass1".into(), state.now());
        state.store.insert("legacy", record).await.unwrap();
        let app = build_app(state.clone());

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"username": "legacy", "password": "oldpass1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let stored = state.store.get("legacy").await.unwrap().password_hash;
        assert!(stored.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn refresh_issues_new_tokens() {
        let app = build_app(AppState::fake());
        let (_, body) = call(
            &app,
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({"username": "alice", "password": "secret123"})),
        )
        .await;
        let refresh = body["refresh_token"].as_str().unwrap().to_owned();
        let access = body["access_token"].as_str().unwrap().to_owned();

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({"refresh_token": refresh})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({"refresh_token": access})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn tokens_for_unknown_users_are_refused() {
        use crate::auth::services::{JwtKeys, TokenKind};
        use axum::extract::FromRef;

        let state = AppState::fake();
        let app = build_app(state.clone());
        let keys = JwtKeys::from_ref(&state);

        let refresh = keys.sign("ghost", TokenKind::Refresh).unwrap();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({"refresh_token": refresh})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!("User not found"));

        let access = keys.sign("ghost", TokenKind::Access).unwrap();
        let (status, body) = call(&app, Method::GET, "/api/ingredients", Some(&access), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!("User not found"));
    }

    #[tokio::test]
    async fn private_routes_require_a_token() {
        let app = build_app(AppState::fake());
        for uri in ["/api/ingredients", "/api/nutrition", "/api/meal-plans", "/api/user/profile"] {
            let (status, _) = call(&app, Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        }
        let (status, _) = call(&app, Method::GET, "/api/ingredients", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn recipes_filter_and_lookup() {
        let app = build_app(AppState::fake());

        let (status, body) = call(&app, Method::GET, "/api/recipes?diet=vegan", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["name"], "Lentil Curry");

        let (status, body) =
            call(&app, Method::GET, "/api/recipes?max_time=all&search=chicken", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], 2);

        let (status, _) = call(&app, Method::GET, "/api/recipes?max_time=soon", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, Method::GET, "/api/recipe/1", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nutrition"]["protein"], 18);

        let (status, body) = call(&app, Method::GET, "/api/recipe/404", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!("Recipe not found"));
    }

    #[tokio::test]
    async fn ingredient_ids_are_not_reused_after_delete() {
        let app = build_app(AppState::fake());
        let token = signed_up(&app, "alice").await;

        for name in ["eggs", "milk"] {
            let (status, body) = call(
                &app,
                Method::POST,
                "/api/ingredients",
                Some(&token),
                Some(json!({"name": name, "quantity": "2", "id": 99})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert_eq!(body["ingredient"]["name"], name);
        }

        let (status, _) = call(&app, Method::DELETE, "/api/ingredients/2", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::DELETE, "/api/ingredients/2", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = call(
            &app,
            Method::POST,
            "/api/ingredients",
            Some(&token),
            Some(json!({"name": "flour"})),
        )
        .await;
        assert_eq!(body["ingredient"]["id"], 3);

        let (_, body) = call(&app, Method::GET, "/api/ingredients", Some(&token), None).await;
        let ids: Vec<u64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn nutrition_log_add_and_delete() {
        let app = build_app(AppState::fake());
        let token = signed_up(&app, "alice").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/nutrition",
            Some(&token),
            Some(json!({"food": "Banana", "calories": 105})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entry"]["id"], 1);
        assert!(body["entry"]["timestamp"].is_string());

        let (_, body) = call(&app, Method::GET, "/api/nutrition", Some(&token), None).await;
        assert_eq!(body["log"].as_array().unwrap().len(), 1);
        assert_eq!(body["log"][0]["food"], "Banana");

        let (status, _) = call(&app, Method::DELETE, "/api/nutrition/1", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) =
            call(&app, Method::DELETE, "/api/nutrition/1", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!("Entry not found"));
    }

    #[tokio::test]
    async fn empty_plan_gives_zero_progress() {
        let app = build_app(AppState::fake());
        let token = signed_up(&app, "alice").await;

        let (status, body) = call(&app, Method::GET, "/api/nutrition", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        for nutrient in ["calories", "protein", "carbs", "fat"] {
            assert_eq!(body["totals"][nutrient], 0.0);
            assert_eq!(body["percentages"][nutrient], 0.0);
        }
        assert_eq!(body["targets"]["calories"], 2000.0);
        assert_eq!(body["targets"]["fat"], 67.0);
    }

    #[tokio::test]
    async fn todays_planned_meals_drive_nutrition_totals() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let token = signed_up(&app, "alice").await;

        let now = state.now();
        let week = current_week_key(now);
        let today = today_day_index(now);
        let other = (today + 3) % 7;
        let plan = json!({
            format!("{today}_breakfast"): {"name": "Oats", "calories": 300, "protein": 10, "carbs": 50, "fat": 6},
            format!("{today}_lunch"): {"name": "Salad", "calories": 500, "protein": 40, "carbs": 20, "fat": 20},
            format!("{other}_dinner"): {"name": "Curry", "calories": 700, "protein": 30, "carbs": 80, "fat": 25},
        });

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/meal-plans",
            Some(&token),
            Some(json!({"weekKey": week, "plan": plan})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["weekKey"], week.as_str());

        let (_, body) = call(&app, Method::GET, "/api/nutrition", Some(&token), None).await;
        assert_eq!(body["totals"]["calories"], 800.0);
        assert_eq!(body["totals"]["protein"], 50.0);
        assert_eq!(body["percentages"]["calories"], 40.0);
        assert_eq!(body["percentages"]["protein"], 50.0);

        let (_, body) = call(
            &app,
            Method::GET,
            &format!("/api/meal-plans/{week}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body.as_object().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn meal_plan_week_key_is_snapped_to_monday() {
        let app = build_app(AppState::fake());
        let token = signed_up(&app, "alice").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/meal-plans",
            Some(&token),
            Some(json!({"weekKey": "2024-06-06", "plan": {"0_lunch": {"calories": 400}}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["weekKey"], "2024-06-03");

        let (_, body) = call(&app, Method::GET, "/api/meal-plans", Some(&token), None).await;
        assert!(body.get("2024-06-03").is_some());

        let (_, body) =
            call(&app, Method::GET, "/api/meal-plans/2024-06-05", Some(&token), None).await;
        assert_eq!(body["0_lunch"]["calories"], 400.0);

        let (_, body) =
            call(&app, Method::GET, "/api/meal-plans/2030-01-07", Some(&token), None).await;
        assert_eq!(body, json!({}));
    }

    #[tokio::test]
    async fn invalid_meal_plans_are_rejected() {
        let app = build_app(AppState::fake());
        let token = signed_up(&app, "alice").await;

        for payload in [
            json!({"plan": {"0_lunch": {"calories": 400}}}),
            json!({"weekKey": "2024-06-03"}),
            json!({"weekKey": "2024-06-03", "plan": {}}),
            json!({"weekKey": "next week", "plan": {"0_lunch": {"calories": 400}}}),
            json!({"weekKey": "2024-06-03", "plan": {"0_lunch": {"calories": -5}}}),
            json!({"weekKey": "2024-06-03", "plan": {"0_lunch": "pasta"}}),
            json!({"weekKey": "2024-06-03", "plan": {"0_lunch": null}}),
        ] {
            let (status, _) =
                call(&app, Method::POST, "/api/meal-plans", Some(&token), Some(payload.clone()))
                    .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
        }
    }

    #[tokio::test]
    async fn cleared_plan_slots_are_dropped_on_save() {
        let app = build_app(AppState::fake());
        let token = signed_up(&app, "alice").await;

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/meal-plans",
            Some(&token),
            Some(json!({"weekKey": "2024-06-03", "plan": {"0_lunch": {"calories": 400}, "1_lunch": null}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) =
            call(&app, Method::GET, "/api/meal-plans/2024-06-03", Some(&token), None).await;
        assert_eq!(body.as_object().unwrap().len(), 1);
        assert!(body.get("1_lunch").is_none());
    }

    #[tokio::test]
    async fn profile_hides_credentials_and_reports_statistics() {
        let app = build_app(AppState::fake());
        let token = signed_up(&app, "alice").await;
        call(
            &app,
            Method::POST,
            "/api/ingredients",
            Some(&token),
            Some(json!({"name": "rice"})),
        )
        .await;

        let (status, body) = call(&app, Method::GET, "/api/user/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("password_hash").is_none());
        assert!(body.get("password").is_none());
        assert_eq!(body["username"], "alice");
        assert_eq!(body["statistics"]["ingredient_count"], 1);
        assert_eq!(body["statistics"]["nutrition_entries"], 0);
        assert_eq!(body["statistics"]["meal_plans_count"], 0);
        assert_eq!(body["statistics"]["account_age_days"], 0);
        assert_eq!(body["diet_preferences"]["diet_type"], "balanced");
    }

    #[tokio::test]
    async fn preferences_update_changes_calorie_target() {
        let app = build_app(AppState::fake());
        let token = signed_up(&app, "alice").await;

        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/user/preferences",
            Some(&token),
            Some(json!({"diet_type": "vegan", "calorie_target": 1800, "allergies": [" peanuts ", ""]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["diet_type"], "vegan");
        assert_eq!(body["allergies"], json!(["peanuts"]));

        let (_, body) = call(&app, Method::GET, "/api/nutrition", Some(&token), None).await;
        assert_eq!(body["targets"]["calories"], 1800.0);

        let (status, _) = call(
            &app,
            Method::PUT,
            "/api/user/preferences",
            Some(&token),
            Some(json!({"calorie_target": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
