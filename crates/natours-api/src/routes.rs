//! API route definitions
//!
//! Public and guarded methods of one path share a `MethodRouter`; guards are
//! attached per method with `route_layer`, `protect` outermost so the caller
//! is resolved before any role policy runs. Every review route needs a
//! session, reads included. When rate limiting is on, the whole tree shares
//! one per-IP budget and the credential endpoints get a tighter one on top.

use crate::auth::middleware::{is_logged_in, protect, restrict_to, RolePolicy};
use crate::handlers::{auth, reviews, tours, users};
use crate::middleware::limited;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use natours_core::Role;
use std::sync::Arc;

type Route = MethodRouter<Arc<AppState>>;

/// Require a session
fn logged_in(state: &Arc<AppState>, route: Route) -> Route {
    route.route_layer(middleware::from_fn_with_state(state.clone(), protect))
}

/// Require a session whose role is in `policy`
fn restricted(state: &Arc<AppState>, policy: &RolePolicy, route: Route) -> Route {
    logged_in(
        state,
        route.route_layer(middleware::from_fn_with_state(policy.clone(), restrict_to)),
    )
}

/// Routes mounted under `/api/v1`
pub fn api_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let admin = RolePolicy::new([Role::Admin]);
    let staff = RolePolicy::new([Role::Admin, Role::LeadGuide]);
    let reviewer = RolePolicy::new([Role::User]);
    let review_editor = RolePolicy::new([Role::User, Role::Admin]);

    let limits = &state.config.rate_limit;
    let throttle = |router: Router<Arc<AppState>>, limit| {
        if limits.enabled {
            limited(router, limit)
        } else {
            router
        }
    };

    let credential_routes = throttle(
        Router::new()
            .route("/signup", post(auth::signup))
            .route("/login", post(auth::login))
            .route("/forgotPassword", post(auth::forgot_password))
            .route("/resetPassword/:token", patch(auth::reset_password)),
        limits.auth,
    );
    let reset_route = throttle(
        Router::new().route("/resetPassword/:token", patch(auth::reset_password)),
        limits.auth,
    );

    let user_routes = Router::new()
        .merge(credential_routes)
        .route("/logout", get(auth::logout))
        .route(
            "/session",
            get(auth::session).route_layer(middleware::from_fn_with_state(
                state.clone(),
                is_logged_in,
            )),
        )
        .route(
            "/updateMyPassword",
            logged_in(state, patch(auth::update_my_password)),
        )
        .route("/me", logged_in(state, get(users::get_me)))
        .route("/updateMe", logged_in(state, patch(users::update_me)))
        .route("/deleteMe", logged_in(state, delete(users::delete_me)))
        .route(
            "/",
            restricted(
                state,
                &admin,
                get(users::get_all_users).post(users::create_user),
            ),
        )
        .route(
            "/:id",
            restricted(
                state,
                &admin,
                get(users::get_user)
                    .patch(users::update_user)
                    .delete(users::delete_user),
            ),
        );

    let tour_routes = Router::new()
        .route(
            "/",
            get(tours::get_all_tours).merge(restricted(state, &staff, post(tours::create_tour))),
        )
        .route("/top-5-cheap", get(tours::top_five_cheap))
        .route(
            "/:id",
            get(tours::get_tour).merge(restricted(
                state,
                &staff,
                patch(tours::update_tour).delete(tours::delete_tour),
            )),
        )
        .route(
            "/:id/reviews",
            logged_in(state, get(reviews::get_tour_reviews)).merge(restricted(
                state,
                &reviewer,
                post(reviews::create_tour_review),
            )),
        );

    let review_routes = Router::new()
        .route(
            "/",
            logged_in(state, get(reviews::get_all_reviews)).merge(restricted(
                state,
                &reviewer,
                post(reviews::create_review),
            )),
        )
        .route(
            "/:id",
            logged_in(state, get(reviews::get_review)).merge(restricted(
                state,
                &review_editor,
                patch(reviews::update_review).delete(reviews::delete_review),
            )),
        );

    let api = Router::new()
        .merge(reset_route)
        .nest("/users", user_routes)
        .nest("/tours", tour_routes)
        .nest("/reviews", review_routes);
    throttle(api, limits.api)
}
