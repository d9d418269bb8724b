//! 网关路由模块

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, State},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

use common::errors::{AppError, AppResult};
use common::middleware::request_id::{request_id_middleware, RequestId};
use common::response::ApiResponse;

use crate::state::AppState;
use crate::tools::{self, Tool, ToolInfo, ToolOutput};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Database Query Gateway",
        version = "0.1.0",
        description = "Uniform query access to PostgreSQL, MySQL, Oracle and MongoDB by alias"
    ),
    paths(health_check, list_tools, call_tool),
    components(schemas(
        HealthResponse,
        ToolInfo,
        ToolOutput,
        tools::AliasList,
        tools::StatusMessage,
        tools::CollectionList,
        common::models::AliasSummary,
        common::models::QueryResult,
        common::models::QueryRequest,
        common::models::AddDatabaseRequest,
        common::models::RemoveDatabaseRequest,
        common::models::ListCollectionsRequest,
    )),
    tags(
        (name = "tools", description = "Tool invocation"),
        (name = "health", description = "Health check")
    )
)]
pub struct ApiDoc;

/// Full application router with middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/tools", get(list_tools))
        .route("/api/tools/{name}", post(call_tool))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// 网关健康检查
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Gateway is up", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Lists the available tools.
#[utoipa::path(
    get,
    path = "/api/tools",
    tag = "tools",
    responses(
        (status = 200, description = "Tool catalogue", body = ApiResponse<Vec<ToolInfo>>)
    )
)]
pub async fn list_tools(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<ToolInfo>>> {
    let catalogue = Tool::ALL.iter().map(Tool::info).collect();
    Json(ApiResponse::ok_with_service(catalogue, state.config.service_name.clone()).with_request_id(request_id.as_str()))
}

/// Invokes a tool with a JSON argument object. An empty body means no arguments.
#[utoipa::path(
    post,
    path = "/api/tools/{name}",
    tag = "tools",
    params(
        ("name" = String, Path, description = "Tool name, e.g. execute_query")
    ),
    request_body(content = Object, description = "Tool arguments"),
    responses(
        (status = 200, description = "Tool output", body = ApiResponse<ToolOutput>),
        (status = 400, description = "Invalid arguments"),
        (status = 404, description = "Unknown tool or alias"),
        (status = 502, description = "The database engine failed")
    )
)]
pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> AppResult<Json<ApiResponse<ToolOutput>>> {
    let started = Instant::now();
    let tool: Tool = name.parse()?;
    let args = parse_arguments(&body)?;

    let output = tools::invoke(&state, tool, args).await?;
    tracing::debug!(tool = %tool, "Tool call completed");

    Ok(Json(
        ApiResponse::ok_with_service(output, state.config.service_name.clone())
            .with_request_id(request_id.as_str())
            .with_duration(started.elapsed().as_millis() as u64),
    ))
}

fn parse_arguments(body: &[u8]) -> AppResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// 服务状态
    pub status: String,
    /// 服务名称
    pub service: String,
    /// 服务版本
    pub version: String,
    /// 当前时间戳
    pub timestamp: DateTime<Utc>,
}
