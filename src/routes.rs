//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod activities;
mod auth;
mod bookings;
mod dashboard;
mod deals;
mod extract;
mod leads;
mod relations;
mod tasks;
mod users;

use crate::auth::auth_middleware;
use crate::config::Settings;
use crate::error::AppError;
use crate::middleware::rate_limit_middleware;
use crate::state::SharedState;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, Method, Uri},
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Serialize;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::{warn, Level};

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password));

    let protected = Router::new()
        // Session
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/change-password", post(auth::change_password))

        // Leads
        .route("/leads", get(leads::list_leads).post(leads::create_lead))
        .route("/leads/stats/overview", get(leads::lead_stats))
        .route(
            "/leads/{id}",
            get(leads::get_lead).put(leads::update_lead).delete(leads::delete_lead),
        )
        .route("/leads/{id}/score", patch(leads::update_score))

        // Deals
        .route("/deals", get(deals::list_deals).post(deals::create_deal))
        .route("/deals/pipeline/overview", get(deals::pipeline_overview))
        .route("/deals/stats/overview", get(deals::deal_stats))
        .route(
            "/deals/{id}",
            get(deals::get_deal).put(deals::update_deal).delete(deals::delete_deal),
        )

        // Users
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user).put(users::update_user))
        .route("/users/{id}/role", patch(users::update_role))
        .route("/users/{id}/status", patch(users::update_status))
        .route("/users/{id}/stats", get(users::user_stats))

        // Activities, tasks and bookings
        .route(
            "/activities",
            get(activities::list_activities).post(activities::create_activity),
        )
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/tasks/{id}", put(tasks::update_task))
        .route(
            "/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )

        // Dashboard
        .route("/dashboard/overview", get(dashboard::overview))
        .route("/dashboard/revenue-chart", get(dashboard::revenue_chart))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    // Build the router
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", public.merge(protected))
        .fallback(route_not_found)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins).allow_credentials(true)
    }
}

#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    timestamp: String,
    environment: String,
    version: &'static str,
    database: &'static str,
    store: &'static str,
    redis: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<SharedState>) -> Json<HealthReport> {
    let database = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            warn!("Health check: datastore unreachable: {}", e);
            "disconnected"
        }
    };

    let redis = match &state.cache {
        None => "disabled",
        Some(cache) => match cache.ping().await {
            Ok(()) => "connected",
            Err(e) => {
                warn!("Health check: redis unreachable: {}", e);
                "disconnected"
            }
        },
    };

    Json(HealthReport {
        status: "OK",
        timestamp: chrono::Utc::now().to_rfc3339(),
        environment: state.environment.clone(),
        version: env!("CARGO_PKG_VERSION"),
        database,
        store: state.store.backend(),
        redis,
    })
}

async fn route_not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Not found - {}", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::state::AppState;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let settings = Settings::default();
        let state = Arc::new(AppState::new(Arc::new(MemoryStore::new()), None, &settings));
        create_router(state, &settings)
    }

    async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Registers a user and returns their access token
    async fn register(app: &Router, email: &str, role: &str) -> String {
        let response = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": email,
                "password": "hunter22",
                "firstName": "Sam",
                "lastName": "Seller",
                "role": role
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        body["data"]["accessToken"].as_str().unwrap().to_string()
    }

    async fn create_lead(app: &Router, token: &str, email: &str) -> String {
        let response = send(
            app,
            Method::POST,
            "/api/leads",
            Some(token),
            Some(json!({"firstName": "Lee", "lastName": "Buyer", "email": email})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_reports_store() {
        let app = app();
        let response = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("ratelimit-limit"));

        let body = json_body(response).await;
        assert_eq!(body["status"], "OK");
        assert_eq!(body["store"], "memory");
        assert_eq!(body["redis"], "disabled");
    }

    #[tokio::test]
    async fn test_protected_routes_need_token() {
        let app = app();
        let response = send(&app, Method::GET, "/api/leads", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);

        let response = send(&app, Method::GET, "/api/leads", Some("garbage"), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_login_and_me() {
        let app = app();
        register(&app, "rep@example.com", "SALES_REP").await;

        let response = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": "REP@Example.com",
                "password": "another1",
                "firstName": "Dup",
                "lastName": "Licate"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "rep@example.com", "password": "wrong-pass"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "rep@example.com", "password": "hunter22"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Login successful");
        assert!(body["data"]["user"].get("passwordHash").is_none());
        let token = body["data"]["accessToken"].as_str().unwrap().to_string();
        let refresh = body["data"]["refreshToken"].as_str().unwrap().to_string();

        let response = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        let body = json_body(response).await;
        assert_eq!(body["data"]["user"]["email"], "rep@example.com");
        assert_eq!(body["data"]["user"]["role"], "SALES_REP");

        let response = send(
            &app,
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({"refreshToken": refresh})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // a refresh token is not an access token
        let response = send(&app, Method::GET, "/api/auth/me", Some(&refresh), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_validation_errors_list_fields() {
        let app = app();
        let response = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "not-an-email", "password": "123", "firstName": "A", "lastName": "B"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"password"));
    }

    #[tokio::test]
    async fn test_deal_lifecycle_moves_lead() {
        let app = app();
        let token = register(&app, "closer@example.com", "SALES_REP").await;
        let lead_id = create_lead(&app, &token, "lee@buyer.io").await;

        let response = send(
            &app,
            Method::POST,
            "/api/deals",
            Some(&token),
            Some(json!({"title": "Annual plan", "leadId": lead_id, "value": 12000})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let deal_id = json_body(response).await["data"]["id"].as_str().unwrap().to_string();

        let lead_uri = format!("/api/leads/{}", lead_id);
        let lead = json_body(send(&app, Method::GET, &lead_uri, Some(&token), None).await).await;
        assert_eq!(lead["data"]["status"], "QUALIFIED");
        assert_eq!(lead["data"]["deal"]["id"], deal_id.as_str());

        // one deal per lead
        let response = send(
            &app,
            Method::POST,
            "/api/deals",
            Some(&token),
            Some(json!({"title": "Second", "leadId": lead_id, "value": 1})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let deal_uri = format!("/api/deals/{}", deal_id);
        let response = send(
            &app,
            Method::PUT,
            &deal_uri,
            Some(&token),
            Some(json!({"stage": "CLOSED_WON", "actualCloseDate": "2001-01-01T00:00:00Z"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let deal = json_body(response).await;
        assert_eq!(deal["data"]["stage"], "CLOSED_WON");
        assert_ne!(deal["data"]["actualCloseDate"], "2001-01-01T00:00:00Z");

        let lead = json_body(send(&app, Method::GET, &lead_uri, Some(&token), None).await).await;
        assert_eq!(lead["data"]["status"], "CLOSED_WON");

        let chart = json_body(
            send(&app, Method::GET, "/api/dashboard/revenue-chart", Some(&token), None).await,
        )
        .await;
        let points = chart["data"].as_array().unwrap();
        assert_eq!(points.len(), 6);
        assert_eq!(points[5]["revenue"], 12000.0);

        let response = send(&app, Method::DELETE, &deal_uri, Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let lead = json_body(send(&app, Method::GET, &lead_uri, Some(&token), None).await).await;
        assert_eq!(lead["data"]["status"], "QUALIFIED");
        assert_eq!(lead["data"]["deal"], Value::Null);
    }

    #[tokio::test]
    async fn test_pagination_past_end_is_empty() {
        let app = app();
        let token = register(&app, "pager@example.com", "MARKETING").await;
        for i in 0..3 {
            create_lead(&app, &token, &format!("lead{}@example.com", i)).await;
        }

        let body = json_body(send(&app, Method::GET, "/api/leads?limit=2", Some(&token), None).await).await;
        assert_eq!(body["data"]["leads"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["pagination"], json!({"page": 1, "limit": 2, "total": 3, "pages": 2}));

        let response = send(&app, Method::GET, "/api/leads?limit=2&page=3", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["data"]["leads"].as_array().unwrap().is_empty());

        let response = send(&app, Method::GET, "/api/leads?limit=500", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_user_management_roles() {
        let app = app();
        let rep = register(&app, "rep@example.com", "SALES_REP").await;
        let admin = register(&app, "boss@example.com", "ADMIN").await;

        let response = send(&app, Method::GET, "/api/users", Some(&rep), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = json_body(send(&app, Method::GET, "/api/users", Some(&admin), None).await).await;
        let users = body["data"]["users"].as_array().unwrap();
        assert_eq!(users.len(), 2);
        let rep_id = users
            .iter()
            .find(|u| u["email"] == "rep@example.com")
            .and_then(|u| u["id"].as_str())
            .unwrap()
            .to_string();
        let admin_id = users
            .iter()
            .find(|u| u["email"] == "boss@example.com")
            .and_then(|u| u["id"].as_str())
            .unwrap()
            .to_string();

        // reps may only look at themselves
        let response = send(&app, Method::GET, &format!("/api/users/{}", admin_id), Some(&rep), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response = send(&app, Method::GET, &format!("/api/users/{}/stats", rep_id), Some(&rep), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app,
            Method::PATCH,
            &format!("/api/users/{}/status", rep_id),
            Some(&admin),
            Some(json!({"isActive": false})),
        )
        .await;
        assert_eq!(json_body(response).await["message"], "User deactivated successfully");

        // deactivated accounts lose access immediately
        let response = send(&app, Method::GET, "/api/auth/me", Some(&rep), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_task_completion_and_bookings() {
        let app = app();
        let token = register(&app, "doer@example.com", "SALES_REP").await;

        let response = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&token),
            Some(json!({"title": "Send proposal", "priority": "HIGH"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let task_id = json_body(response).await["data"]["id"].as_str().unwrap().to_string();

        let response = send(
            &app,
            Method::PUT,
            &format!("/api/tasks/{}", task_id),
            Some(&token),
            Some(json!({"status": "COMPLETED"})),
        )
        .await;
        let task = json_body(response).await;
        assert_eq!(task["data"]["status"], "COMPLETED");
        assert!(task["data"]["completedAt"].is_string());

        let response = send(
            &app,
            Method::POST,
            "/api/bookings",
            Some(&token),
            Some(json!({
                "title": "Demo",
                "startTime": "2030-03-02T10:00:00Z",
                "endTime": "2030-03-02T09:00:00Z",
                "attendeeEmail": "buyer@example.com",
                "attendeeName": "Pat Buyer"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(
            body["errors"],
            json!([{"field": "body", "message": "End time must be after start time"}])
        );

        let response = send(
            &app,
            Method::POST,
            "/api/bookings",
            Some(&token),
            Some(json!({
                "title": "Demo",
                "startTime": "2030-03-02T10:00:00Z",
                "endTime": "2030-03-02T11:00:00Z",
                "attendeeEmail": "buyer@example.com",
                "attendeeName": "Pat Buyer"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let overview = json_body(send(&app, Method::GET, "/api/dashboard/overview", Some(&token), None).await).await;
        assert_eq!(overview["data"]["upcomingBookings"].as_array().unwrap().len(), 1);
        assert!(overview["data"]["pendingTasks"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lists_embed_related_records() {
        let app = app();
        let token = register(&app, "owner@example.com", "SALES_REP").await;
        let lead_id = create_lead(&app, &token, "lee@buyer.io").await;

        // numeric strings are accepted for money amounts
        let response = send(
            &app,
            Method::POST,
            "/api/deals",
            Some(&token),
            Some(json!({"title": "Pilot", "leadId": lead_id, "value": "10"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["data"]["value"], 10.0);
        assert_eq!(created["data"]["lead"]["firstName"], "Lee");
        assert_eq!(created["data"]["assignedTo"]["lastName"], "Seller");
        let deal_id = created["data"]["id"].as_str().unwrap().to_string();

        let response = send(
            &app,
            Method::PUT,
            &format!("/api/deals/{}", deal_id),
            Some(&token),
            Some(json!({"stage": "PROPOSAL"})),
        )
        .await;
        assert_eq!(json_body(response).await["data"]["lead"]["email"], "lee@buyer.io");

        let response = send(
            &app,
            Method::POST,
            "/api/activities",
            Some(&token),
            Some(json!({"type": "CALL", "title": "Intro call", "leadId": lead_id, "dealId": deal_id})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let response = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&token),
            Some(json!({"title": "Follow up", "dealId": deal_id})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let deals = json_body(send(&app, Method::GET, "/api/deals", Some(&token), None).await).await;
        let row = &deals["data"]["deals"][0];
        assert_eq!(row["lead"]["firstName"], "Lee");
        assert_eq!(row["assignedTo"]["firstName"], "Sam");
        assert_eq!(row["activities"][0]["title"], "Intro call");
        assert_eq!(row["tasks"][0]["title"], "Follow up");

        let leads = json_body(send(&app, Method::GET, "/api/leads", Some(&token), None).await).await;
        let row = &leads["data"]["leads"][0];
        assert_eq!(row["deal"]["id"], deal_id.as_str());
        assert_eq!(row["createdBy"]["firstName"], "Sam");
        assert_eq!(row["assignedTo"]["lastName"], "Seller");
        assert_eq!(row["activities"].as_array().unwrap().len(), 1);

        let tasks = json_body(send(&app, Method::GET, "/api/tasks", Some(&token), None).await).await;
        assert_eq!(tasks["data"]["tasks"][0]["deal"]["title"], "Pilot");

        let overview = json_body(send(&app, Method::GET, "/api/dashboard/overview", Some(&token), None).await).await;
        let activity = &overview["data"]["recentActivities"][0];
        assert_eq!(activity["lead"]["firstName"], "Lee");
        assert_eq!(activity["deal"]["title"], "Pilot");
        assert_eq!(overview["data"]["pendingTasks"][0]["deal"]["title"], "Pilot");
    }

    #[tokio::test]
    async fn test_malformed_requests() {
        let app = app();
        let token = register(&app, "strict@example.com", "SALES_REP").await;

        let response = send(&app, Method::GET, "/api/leads/not-a-uuid", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/leads")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);

        let response = send(&app, Method::GET, "/api/nowhere", None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
