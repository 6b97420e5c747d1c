//! Seed CLI - bootstraps a fresh database with an admin user, baseline site
//! settings, a default module group per post type, and a sample page.
//!
//! Usage: `cms-seed` (reads DATABASE_URL from the environment / .env)

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/lattice".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    // Admin user
    let admin_id: uuid::Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO users (email, display_name, role)
        VALUES ('admin@lattice.dev', 'Administrator', 'admin')
        ON CONFLICT (email) DO UPDATE SET role = 'admin'
        RETURNING id
        "#,
    )
    .fetch_one(&pool)
    .await?;
    tracing::info!(%admin_id, "admin user ready");

    // Baseline settings
    for (key, value) in [
        ("site.title", json!("Lattice")),
        ("site.default_locale", json!("en")),
        ("site.locales", json!(["en", "de", "fr"])),
    ] {
        sqlx::query(
            "INSERT INTO site_settings (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .bind(&value)
        .execute(&pool)
        .await?;
    }
    tracing::info!("baseline settings ready");

    // Default module group for pages
    let group_id: Option<uuid::Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO module_groups (name, post_type, description)
        VALUES ('Page defaults', 'page', 'Modules seeded onto every new page')
        ON CONFLICT (name) DO NOTHING
        RETURNING id
        "#,
    )
    .fetch_optional(&pool)
    .await?;

    if let Some(group_id) = group_id {
        for (index, (module_type, props)) in [
            ("hero", json!({ "heading": "Untitled" })),
            ("prose", json!({ "body": "" })),
        ]
        .iter()
        .enumerate()
        {
            sqlx::query(
                "INSERT INTO module_group_modules (module_group_id, module_type, default_props, order_index)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(group_id)
            .bind(module_type)
            .bind(props)
            .bind(index as i32)
            .execute(&pool)
            .await?;
        }
        tracing::info!("default page module group ready");
    }

    // Shared footer as a global module instance
    sqlx::query(
        r#"
        INSERT INTO module_instances (module_type, scope, global_slug, props)
        VALUES ('prose', 'global', 'site-footer', $1)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(json!({ "body": "© Lattice" }))
    .execute(&pool)
    .await?;

    tracing::info!("seed complete");
    Ok(())
}
