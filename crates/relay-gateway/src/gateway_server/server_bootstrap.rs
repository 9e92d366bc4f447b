use super::*;

/// Builds the router serving the websocket entry and the status snapshot.
pub fn build_gateway_router(config: GatewayServerConfig) -> Router {
    let state = Arc::new(GatewayServerState::new(config));
    Router::new()
        .route(GATEWAY_ENTRY_ENDPOINT, get(handle_gateway_entry))
        .route(GATEWAY_STATUS_ENDPOINT, get(handle_gateway_status))
        .with_state(state)
}

/// Binds `config.bind` and serves until ctrl-c.
pub async fn run_gateway_server(config: GatewayServerConfig) -> Result<()> {
    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid bind address '{}'", config.bind))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind relay gateway on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound relay gateway address")?;

    tracing::info!(
        addr = %local_addr,
        allowed_origin = %config.allowed_origin,
        model = %config.model,
        allow_listed_subjects = config.allow_list.len(),
        "relay gateway listening"
    );

    let app = build_gateway_router(config);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("relay gateway server exited unexpectedly")?;

    tracing::info!(addr = %local_addr, "relay gateway stopped");
    Ok(())
}
