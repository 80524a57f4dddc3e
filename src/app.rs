use std::{future::Future, net::SocketAddr};

use axum::{middleware, response::Redirect, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::auth::{role_gate, roles, RoleGate};
use crate::identity::Role;
use crate::state::AppState;
use crate::{admin, auth, dashboard};

fn gated(routes: Router<AppState>, state: &AppState, allowed: &'static [Role]) -> Router<AppState> {
    routes.route_layer(middleware::from_fn_with_state(
        RoleGate::new(state, allowed),
        role_gate,
    ))
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(gated(admin::router(), &state, roles::ADMIN_ONLY))
        .merge(gated(dashboard::seller_routes(), &state, roles::SELLER_ONLY))
        .merge(gated(dashboard::customer_routes(), &state, roles::CUSTOMER_ONLY))
        .merge(gated(dashboard::profile_routes(), &state, roles::ANY_ROLE))
        .route("/", get(|| async { Redirect::to("/login") }))
        .route("/health", get(|| async { "ok" }))
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
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

/// Serves `app` until `shutdown` resolves, letting in-flight requests finish.
pub async fn serve(
    app: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "marketgate listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
