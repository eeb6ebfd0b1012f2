//! OpenAPI specification generation
//!
//! Configures the OpenAPI document for the Splice API.

use utoipa::OpenApi;

/// API documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Splice API",
        version = "0.1.0",
        description = "HTTP workflow orchestration engine: declarative API-call workflows with data-binding expressions.",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/v1", description = "API v1")
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "workflows", description = "Workflow lifecycle and advisory helpers"),
        (name = "apis", description = "API config lifecycle"),
        (name = "runs", description = "Run results"),
        (name = "execute", description = "Workflow execution"),
        (name = "tenant", description = "Tenant administration"),
        (name = "logs", description = "Realtime execution logs")
    )
)]
pub struct ApiDoc;
