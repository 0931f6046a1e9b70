/// HTTP Listener
///
/// Actix Web front end for the dispatcher. Each POST carries exactly one
/// JSON-RPC object; the dispatcher runs on actix's blocking pool because a
/// host-bound call parks its thread until the host loop answers.
///
/// Routes:
/// - POST / and /mcp: JSON-RPC endpoint
/// - GET /health: liveness, never touches the host thread
/// - GET /: server banner and endpoint list
/// - GET /tools: the tools/list payload, for quick inspection
use std::time::Duration;

use actix_web::{
    App, HttpResponse, HttpServer,
    middleware::{Compress, DefaultHeaders, Logger},
    web,
};
use bytes::Bytes;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::core::config::ServerConfig;
use crate::core::dispatcher::Dispatcher;
use crate::core::error::RpcError;
use crate::core::protocol::{MCP_PROTOCOL_VERSION, Request, Response};
use crate::core::registry::Category;

/// Register all listener routes. The caller provides `web::Data<Dispatcher>`.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/tools", web::get().to(tools_handler))
        .route("/mcp", web::post().to(mcp_handler))
        .route("/", web::post().to(mcp_handler))
        .route("/", web::get().to(banner));
}

async fn health(dispatcher: web::Data<Dispatcher>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": dispatcher.info().name
    }))
}

async fn banner(dispatcher: web::Data<Dispatcher>) -> HttpResponse {
    let info = dispatcher.info();
    HttpResponse::Ok().json(json!({
        "name": info.name,
        "version": info.version,
        "protocol": format!("MCP {MCP_PROTOCOL_VERSION} over JSON-RPC 2.0"),
        "endpoints": {
            "POST /": "JSON-RPC requests",
            "POST /mcp": "JSON-RPC requests",
            "GET /health": "liveness check",
            "GET /tools": "registered tools"
        }
    }))
}

async fn tools_handler(dispatcher: web::Data<Dispatcher>) -> HttpResponse {
    HttpResponse::Ok().json(dispatcher.tools_list())
}

/// JSON-RPC endpoint.
///
/// Non-JSON bodies get 400 with a parse error, notifications get 202 with
/// no body, and everything else gets 200 whatever the JSON-RPC outcome.
async fn mcp_handler(dispatcher: web::Data<Dispatcher>, body: Bytes) -> HttpResponse {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return HttpResponse::BadRequest()
                .json(Response::error(Value::Null, &RpcError::Parse(e.to_string())));
        }
    };

    let request = match Request::from_value(value) {
        Ok(r) => r,
        Err(response) => return HttpResponse::Ok().json(response),
    };

    let echo = request.id.clone().unwrap_or(Value::Null);
    let dispatcher = dispatcher.into_inner();
    match web::block(move || dispatcher.handle(request)).await {
        Ok(Some(response)) => HttpResponse::Ok().json(response),
        Ok(None) => HttpResponse::Accepted().finish(),
        Err(e) => {
            error!(error = %e, "dispatch did not complete");
            HttpResponse::Ok().json(Response::error(
                echo,
                &RpcError::Internal("request processing was interrupted".into()),
            ))
        }
    }
}

/// Run the listener until the process is signalled to stop.
///
/// # Configuration
/// - Worker threads: from `config.workers`
/// - Max request body: `config.max_body_bytes`
/// - Keep-alive: 30 seconds
/// - Request timeout: 30 seconds
/// - Shutdown timeout: 10 seconds
pub async fn run_server_http(config: &ServerConfig, dispatcher: Dispatcher) -> std::io::Result<()> {
    let bind_addr = config.bind_addr();
    let max_body = config.max_body_bytes;

    info!(
        name = %dispatcher.info().name,
        version = %dispatcher.info().version,
        bind = %bind_addr,
        workers = config.workers,
        tools = dispatcher.registry().list(Category::Tool).count(),
        "listener starting"
    );

    let dispatcher = web::Data::new(dispatcher);

    HttpServer::new(move || {
        App::new()
            .app_data(dispatcher.clone())
            .app_data(web::PayloadConfig::new(max_body))
            // Enable compression for JSON responses (gzip/brotli)
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY")),
            )
            // %r = request line, %s = status, %Dms = duration in milliseconds
            .wrap(Logger::new("%r %s %Dms"))
            .configure(routes)
    })
    .workers(config.workers)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}
