use crate::config::rate_limit::{RateLimitConfig, RateLimitRule};
use crate::handlers::{self, category, post, topic};
use crate::middleware::auth_middleware;
use axum::{middleware, routing, Router};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

pub fn create_routes() -> Router {
    Router::new().nest("/api", api_routes(&RateLimitConfig::from_env()))
}

fn api_routes(config: &RateLimitConfig) -> Router {
    let auth = auth_routes(config);
    let public_read = public_read_routes(config);
    let protected = protected_routes(config).layer(middleware::from_fn(auth_middleware));

    auth.merge(public_read).merge(protected)
}

/// Register and login.
fn auth_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/auth/register", routing::post(handlers::register))
        .route("/auth/login", routing::post(handlers::login));

    with_optional_rate_limit(router, config.enabled, config.auth)
}

/// Anonymous reads.
fn public_read_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route(
            "/forum/categories",
            routing::get(category::list_categories),
        )
        .route(
            "/forum/categories/{slug}",
            routing::get(category::get_category),
        )
        .route("/forum/topics", routing::get(topic::list_topics))
        .route("/forum/topics/{slug}", routing::get(topic::get_topic))
        .route(
            "/forum/topics/{slug}/posts",
            routing::get(post::list_posts),
        )
        .route("/forum/posts/{id}", routing::get(post::get_post));

    with_optional_rate_limit(router, config.enabled, config.public_read)
}

/// Everything that needs a signed-in user.
fn protected_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/auth/me", routing::get(handlers::get_current_user))
        .route("/auth/logout", routing::post(handlers::logout))
        // Categories (admin only, checked in the service)
        .route(
            "/forum/categories",
            routing::post(category::create_category),
        )
        .route(
            "/forum/categories/{slug}",
            routing::put(category::update_category).delete(category::delete_category),
        )
        // Topics
        .route("/forum/topics", routing::post(topic::create_topic))
        .route(
            "/forum/topics/{slug}",
            routing::put(topic::update_topic).delete(topic::delete_topic),
        )
        // Posts
        .route(
            "/forum/topics/{slug}/posts",
            routing::post(post::create_post),
        )
        .route(
            "/forum/posts/{id}",
            routing::put(post::update_post).delete(post::delete_post),
        )
        .route(
            "/forum/posts/{id}/reactions",
            routing::post(post::toggle_reaction),
        );

    with_optional_rate_limit(router, config.enabled, config.protected)
}

fn with_optional_rate_limit(router: Router, enabled: bool, rule: RateLimitRule) -> Router {
    if !enabled {
        return router;
    }

    // RateLimitRule parsing rejects zero values, so the builder cannot fail.
    let Some(governor_conf) = GovernorConfigBuilder::default()
        .per_second(rule.per_second)
        .burst_size(rule.burst_size)
        .finish()
    else {
        tracing::warn!(?rule, "Rate limit rule rejected, group left unlimited");
        return router;
    };

    router.layer(GovernorLayer::new(governor_conf))
}
