use axum::http::{HeaderName, HeaderValue, Method};
use axum::{
    extract::DefaultBodyLimit,
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{error::AppError, state::AppState};

pub mod admin;
pub mod auth;
pub mod health;
pub mod photos;
pub mod rallies;
pub mod users;
pub mod votes;

const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

pub fn create_router(state: AppState) -> Router<()> {
    let cors = build_cors(state.config.cors_allowed_origins.as_deref());
    let body_limit = state.config.max_body_bytes;

    let rally_routes = Router::new()
        .route("/current", get(rallies::current_rally))
        .route(
            "/config",
            get(rallies::get_config).put(rallies::update_config),
        );

    let photo_routes = Router::new()
        .route("/", get(photos::list_photos).post(photos::upload_photo))
        .route(
            "/:id",
            get(photos::get_photo)
                .put(photos::update_photo)
                .delete(photos::delete_photo),
        )
        .route("/:id/votes", get(votes::photo_votes));

    let admin_routes = Router::new()
        .route(
            "/users",
            get(admin::list_users).put(admin::update_user),
        )
        .route("/users/:id", delete(admin::delete_user));

    Router::new()
        .route("/", get(health::liveness))
        .route("/health", get(health::health_check))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route(
            "/user/profile",
            get(users::get_profile)
                .put(users::update_profile)
                .delete(users::delete_profile),
        )
        .nest("/rally", rally_routes.clone())
        .nest("/rallies", rally_routes)
        .nest("/photos", photo_routes)
        .route(
            "/user_votes_control",
            get(votes::list_user_votes).post(votes::record_user_vote),
        )
        .route(
            "/anonymous_votes_control",
            post(votes::record_anonymous_vote),
        )
        .route("/rankings", get(votes::rankings))
        .nest("/admin", admin_routes)
        .fallback(|| async { AppError::not_found() })
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
}

fn build_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, X_REQUESTED_WITH])
        .allow_credentials(true);

    match allowed_origins {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|value| {
                    let trimmed = value.trim();
                    if trimmed.is_empty() {
                        return None;
                    }
                    match trimmed.parse::<HeaderValue>() {
                        Ok(header) => Some(header),
                        Err(_) => {
                            tracing::warn!(origin = trimmed, "ignoring invalid CORS origin");
                            None
                        }
                    }
                })
                .collect();
            base.allow_origin(AllowOrigin::list(headers))
        }
        None => base.allow_origin(AllowOrigin::mirror_request()),
    }
}
