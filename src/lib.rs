// Library re-exports for integration tests.
// The binary crate (main.rs) uses these modules directly via `mod`.

pub mod api;
pub mod authz;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod services;
pub mod store;
pub mod verify;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};

use config::AppConfig;
use realtime::EventBus;
use services::{directory::Directory, feed::Feed, groups::Groups, membership::Membership, messages::Messages};
use store::DocumentStore;
use verify::IdentityVerifier;

// ─── Application State ─────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub events: EventBus,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub directory: Directory,
    pub membership: Membership,
    pub messages: Messages,
    pub groups: Groups,
    pub feed: Feed,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        events: EventBus,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let admin_email = config.admin_email.clone();
        Self {
            directory: Directory::new(store.clone()),
            membership: Membership::new(store.clone(), admin_email.clone()),
            messages: Messages::new(
                store.clone(),
                events.clone(),
                admin_email.clone(),
                config.message_page_size,
            ),
            groups: Groups::new(store.clone(), admin_email.clone()),
            feed: Feed::new(store.clone(), admin_email),
            config,
            store,
            events,
            verifier,
        }
    }
}

// ─── Router ────────────────────────────────────────────

pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.cors_origins == "*" {
        CorsLayer::new()
            .allow_origin(AllowOrigin::any())
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
    };

    let user_routes = Router::new()
        .route("/register", post(api::users::register))
        .route("/me", get(api::users::me).put(api::users::update_me))
        .route("/:uid", get(api::users::get_user));

    let community_routes = Router::new()
        .route("/", get(api::communities::list))
        .route("/:id", get(api::communities::get))
        .route("/:id/join", post(api::communities::join))
        .route("/:id/leave", post(api::communities::leave))
        .route(
            "/:id/announcements",
            get(api::communities::announcements).post(api::communities::post_announcement),
        )
        .route(
            "/:id/super-admins/:uid",
            post(api::communities::add_super_admin).delete(api::communities::remove_super_admin),
        )
        .route("/:id/subgroups", post(api::communities::create_sub_group));

    let sub_group_routes = Router::new()
        .route(
            "/:id",
            get(api::subgroups::get)
                .put(api::subgroups::update)
                .delete(api::subgroups::delete),
        )
        .route("/:id/request-join", post(api::subgroups::request_join))
        .route("/:id/requests", get(api::subgroups::pending_requests))
        .route(
            "/:id/requests/:request_id/approve",
            post(api::subgroups::approve_request),
        )
        .route(
            "/:id/requests/:request_id/reject",
            post(api::subgroups::reject_request),
        )
        .route("/:id/promote/:uid", post(api::subgroups::promote))
        .route("/:id/demote/:uid", post(api::subgroups::demote))
        .route(
            "/:id/members/:uid",
            post(api::subgroups::add_member).delete(api::subgroups::remove_member),
        )
        .route(
            "/:id/admins/:uid",
            post(api::subgroups::add_admin).delete(api::subgroups::remove_admin),
        )
        .route("/:id/leave", post(api::subgroups::leave))
        .route(
            "/:id/messages",
            get(api::subgroups::messages).post(api::subgroups::send_message),
        )
        .route("/:id/read", post(api::subgroups::mark_read))
        .route("/:id/delivered", post(api::subgroups::mark_delivered))
        .route("/:id/typing", post(api::subgroups::typing));

    let message_routes = Router::new()
        .route("/private", post(api::messages::send_private))
        .route("/private/:uid", get(api::messages::private_history))
        .route("/private/:uid/read", post(api::messages::mark_private_read))
        .route(
            "/private/:uid/delivered",
            post(api::messages::mark_private_delivered),
        )
        .route("/private/:uid/typing", post(api::messages::private_typing))
        .route("/:id", put(api::messages::edit))
        .route("/:id/react", post(api::messages::react))
        .route("/:id/pin", post(api::messages::pin))
        .route("/:id/delete-for-me", post(api::messages::delete_for_me))
        .route(
            "/:id/delete-for-everyone",
            post(api::messages::delete_for_everyone),
        );

    let group_routes = Router::new()
        .route("/", get(api::groups::list).post(api::groups::create))
        .route(
            "/:id",
            get(api::groups::get)
                .put(api::groups::update)
                .delete(api::groups::delete),
        )
        .route("/:id/join", post(api::groups::join))
        .route("/:id/leave", post(api::groups::leave))
        .route(
            "/:id/messages",
            get(api::groups::messages).post(api::groups::send_message),
        )
        .route("/:id/read", post(api::groups::mark_read))
        .route("/:id/delivered", post(api::groups::mark_delivered))
        .route("/:id/typing", post(api::groups::typing))
        .route("/:id/pins", get(api::groups::pins))
        .route("/:id/ban/:uid", post(api::groups::ban))
        .route("/:id/unban/:uid", post(api::groups::unban))
        .route("/:id/restrict/:uid", post(api::groups::restrict))
        .route("/:id/unrestrict/:uid", post(api::groups::unrestrict))
        .route("/:id/kick/:uid", post(api::groups::kick))
        .route(
            "/:id/admins/:uid",
            post(api::groups::add_admin).delete(api::groups::remove_admin),
        )
        .route(
            "/:id/messages/:uid",
            delete(api::groups::delete_user_messages),
        )
        .route(
            "/:id/polls",
            get(api::groups::list_polls).post(api::groups::create_poll),
        );

    let feed_routes = Router::new()
        .route("/posts", get(api::feed::list_posts).post(api::feed::create_post))
        .route("/posts/:id", delete(api::feed::delete_post))
        .route("/posts/:id/like", post(api::feed::like_post))
        .route("/posts/:id/share", post(api::feed::share_post))
        .route(
            "/posts/:id/comments",
            get(api::feed::list_comments).post(api::feed::create_comment),
        )
        .route("/comments/:id", delete(api::feed::delete_comment))
        .route("/comments/:id/like", post(api::feed::like_comment))
        .route(
            "/services",
            get(api::feed::list_services).post(api::feed::create_service),
        )
        .route("/services/:id", delete(api::feed::delete_service))
        .route("/polls/:id/vote", post(api::feed::vote))
        .route("/polls/:id", delete(api::feed::delete_poll));

    let admin_routes = Router::new()
        .route("/stats", get(api::admin::stats))
        .route("/users", get(api::admin::list_users))
        .route("/users/:uid/admin", put(api::admin::set_admin))
        .route("/users/:uid", delete(api::admin::delete_user))
        .route(
            "/users/:uid/super-admin-everywhere",
            post(api::admin::super_admin_everywhere),
        )
        .route(
            "/initialize-communities",
            post(api::admin::initialize_communities),
        )
        .route(
            "/settings",
            get(api::admin::get_settings).put(api::admin::update_settings),
        );

    let api = Router::new()
        .nest("/users", user_routes)
        .nest("/communities", community_routes)
        .nest("/subgroups", sub_group_routes)
        .nest("/messages", message_routes)
        .nest("/groups", group_routes)
        .merge(feed_routes)
        .route("/upload", post(api::uploads::upload))
        .nest("/admin", admin_routes);

    Router::new()
        .nest("/api", api)
        .route("/health", get(health_check))
        .layer(
            TraceLayer::new_for_http()
                .on_response(DefaultOnResponse::new().level(tracing::Level::DEBUG)),
        )
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}
