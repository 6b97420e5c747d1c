/// OpenAPI documentation for the Lattice CMS Service
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lattice CMS Service API",
        version = "1.0.0",
        description = "Headless content-management service: posts with locales, translations and tree hierarchy; a typed module-block system with global instances, per-post overrides and review/AI-review staging; module groups; media management with WebP optimization and derivative variants; menus; forms; role-based permissions; and webhook/LLM content assistants.",
        contact(
            name = "Lattice Team",
            email = "team@lattice.dev"
        ),
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8084", description = "Development server"),
        (url = "https://cms-api.lattice.dev", description = "Production server"),
    ),
    tags(
        (name = "health", description = "Service health checks"),
        (name = "posts", description = "Post lifecycle, translations, composition, canonical import/export"),
        (name = "modules", description = "Module types, attachments, overrides, shared instances"),
        (name = "module-groups", description = "Reusable module templates"),
        (name = "media", description = "Uploads, optimization, derivative variants"),
        (name = "menus", description = "Navigation menus"),
        (name = "forms", description = "Form definitions and submissions"),
        (name = "agents", description = "Webhook/LLM content assistants"),
        (name = "settings", description = "Site settings"),
        (name = "public", description = "Unauthenticated site surface"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token from the identity provider"))
                        .build(),
                ),
            )
        }
    }
}
