use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use chrono::Utc;
use cms_service::cache::PageCache;
use cms_service::handlers::{self, media::MediaState, public::PublicState};
use cms_service::jobs::scheduled_publisher::ScheduledPublisher;
use cms_service::middleware;
use cms_service::openapi::ApiDoc;
use cms_service::services::SettingsService;
use cms_service::storage;
use db_pool::{create_pool as create_pg_pool, DbConfig as DbPoolConfig};
use redis::aio::ConnectionManager;
use redis::RedisError;
use redis_utils::RedisPool;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

struct HealthState {
    db_pool: sqlx::Pool<sqlx::Postgres>,
    redis_manager: Arc<Mutex<ConnectionManager>>,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct ComponentCheck {
    status: ComponentStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    status: ComponentStatus,
    checks: HashMap<String, ComponentCheck>,
    timestamp: String,
}

impl HealthState {
    fn new(db_pool: sqlx::Pool<sqlx::Postgres>, redis_manager: Arc<Mutex<ConnectionManager>>) -> Self {
        Self {
            db_pool,
            redis_manager,
        }
    }

    async fn check_postgres(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.db_pool)
            .await
            .map(|_| ())
    }

    async fn check_redis(&self) -> Result<(), RedisError> {
        let mut conn = self.redis_manager.lock().await;
        let pong: String = redis::cmd("PING").query_async(&mut *conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(RedisError::from((
                redis::ErrorKind::ResponseError,
                "unexpected PING response",
            )))
        }
    }
}

async fn health_summary(state: web::Data<HealthState>) -> HttpResponse {
    match state.check_postgres().await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "cms-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "cms-service"
        })),
    }
}

async fn readiness_summary(state: web::Data<HealthState>) -> HttpResponse {
    let mut checks = HashMap::new();
    let mut ready = true;

    let start = Instant::now();
    let pg_result = state.check_postgres().await;
    let pg_latency = Some(start.elapsed().as_millis() as u64);
    let postgres_check = match pg_result {
        Ok(_) => ComponentCheck {
            status: ComponentStatus::Healthy,
            message: "PostgreSQL connection successful".to_string(),
            latency_ms: pg_latency,
        },
        Err(e) => {
            ready = false;
            ComponentCheck {
                status: ComponentStatus::Unhealthy,
                message: format!("PostgreSQL connection failed: {}", e),
                latency_ms: pg_latency,
            }
        }
    };
    checks.insert("postgresql".to_string(), postgres_check);

    let start = Instant::now();
    let redis_result = state.check_redis().await;
    let redis_latency = Some(start.elapsed().as_millis() as u64);
    let redis_check = match redis_result {
        Ok(_) => ComponentCheck {
            status: ComponentStatus::Healthy,
            message: "Redis ping successful".to_string(),
            latency_ms: redis_latency,
        },
        Err(e) => {
            ready = false;
            ComponentCheck {
                status: ComponentStatus::Unhealthy,
                message: format!("Redis ping failed: {}", e),
                latency_ms: redis_latency,
            }
        }
    };
    checks.insert("redis".to_string(), redis_check);

    let status = if ready {
        ComponentStatus::Healthy
    } else {
        ComponentStatus::Unhealthy
    };

    let response = ReadinessResponse {
        ready,
        status,
        checks,
        timestamp: Utc::now().to_rfc3339(),
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"alive": true}))
}

async fn openapi_json(doc: web::Data<utoipa::openapi::OpenApi>) -> actix_web::Result<HttpResponse> {
    let body = serde_json::to_string(&*doc).map_err(|e| {
        tracing::error!("OpenAPI serialization failed: {}", e);
        actix_web::error::ErrorInternalServerError("OpenAPI serialization error")
    })?;

    Ok(HttpResponse::Ok()
        .content_type("application/json")
        .body(body))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match cms_service::Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting cms-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    // Initialize database connection pool (standardized)
    let mut db_cfg = DbPoolConfig::from_env("cms-service").unwrap_or_default();
    if db_cfg.database_url.is_empty() {
        db_cfg.database_url = config.database.url.clone();
    }
    if db_cfg.max_connections < config.database.max_connections {
        db_cfg.max_connections = config.database.max_connections;
    }

    db_cfg.log_config();
    let db_pool = match create_pg_pool(db_cfg).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database pool creation failed: {:#}", e);
            eprintln!("ERROR: Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Connected to database via db-pool crate");

    // Run migrations
    if let Err(e) = sqlx::migrate!("./migrations").run(&db_pool).await {
        tracing::error!("Database migration failed: {:#}", e);
        return Err(io::Error::new(io::ErrorKind::Other, e.to_string()));
    }
    tracing::info!("Database migrations up to date");

    // Initialize Redis
    let redis_pool = RedisPool::connect(&config.cache.url).await.map_err(|e| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Failed to initialize Redis connection: {e}"),
        )
    })?;

    let page_cache = Arc::new(PageCache::new(
        redis_pool.manager(),
        config.cache.page_ttl_secs,
    ));

    // Object storage backend
    let storage_backend = storage::init_storage(&config.storage).await.map_err(|e| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Failed to initialize storage backend: {e}"),
        )
    })?;
    tracing::info!(backend = %config.storage.backend, "Storage backend ready");

    // Cached site settings
    let settings = Arc::new(SettingsService::load(db_pool.clone()).await.map_err(|e| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Failed to load site settings: {e}"),
        )
    })?);

    let rate_limiter = middleware::RateLimiter::new(
        redis_pool.manager(),
        middleware::RateLimitConfig {
            max_requests: config.rate_limit.max_requests,
            window_seconds: config.rate_limit.window_secs,
        },
    );
    let rate_limit_mw = middleware::RateLimitMiddleware::new(rate_limiter);
    let jwt_mw = middleware::JwtAuthMiddleware::new(&config.auth.jwt_secret);

    let page_cache_data = web::Data::new(page_cache.clone());
    let settings_data = web::Data::new(settings.clone());
    let media_state = web::Data::new(MediaState {
        storage: storage_backend.clone(),
        config: config.media.clone(),
    });
    let public_state = web::Data::new(PublicState {
        base_url: config.app.public_base_url.clone(),
    });
    let health_state = web::Data::new(HealthState::new(db_pool.clone(), redis_pool.manager()));

    let http_bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", http_bind_address);

    let publisher = ScheduledPublisher::new(
        db_pool.clone(),
        page_cache.clone(),
        config.publisher.interval_secs,
    );

    let db_pool_http = db_pool.clone();
    let cors_origins = config.cors.allowed_origins.clone();

    // Create HTTP server
    let server = HttpServer::new(move || {
        // Build CORS configuration
        let mut cors = Cors::default();
        for origin in cors_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        let openapi_doc = ApiDoc::openapi();

        App::new()
            .app_data(web::Data::new(openapi_doc.clone()))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api/v1/openapi.json", openapi_doc.clone()),
            )
            .route("/api/v1/openapi.json", web::get().to(openapi_json))
            .app_data(web::Data::new(db_pool_http.clone()))
            .app_data(page_cache_data.clone())
            .app_data(settings_data.clone())
            .app_data(media_state.clone())
            .app_data(public_state.clone())
            .app_data(health_state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/metrics", web::get().to(cms_service::metrics::serve_metrics))
            // Health check endpoints
            .route("/api/v1/health", web::get().to(health_summary))
            .route("/api/v1/health/ready", web::get().to(readiness_summary))
            .route("/api/v1/health/live", web::get().to(liveness_check))
            // Crawler endpoints
            .route("/robots.txt", web::get().to(handlers::public::robots))
            .route("/sitemap.xml", web::get().to(handlers::public::sitemap))
            // Public site surface, rate limited, no auth
            .service(
                web::scope("/api/v1/public")
                    .wrap(rate_limit_mw.clone())
                    .route("/resolve", web::get().to(handlers::public::resolve))
                    .route(
                        "/forms/{form_id}/submissions",
                        web::post().to(handlers::forms::submit_form),
                    ),
            )
            // Authenticated admin API
            .service(
                web::scope("/api/v1")
                    .wrap(middleware::MetricsMiddleware)
                    .wrap(jwt_mw.clone())
                    .route(
                        "/module-types",
                        web::get().to(handlers::modules::list_module_types),
                    )
                    .service(
                        web::scope("/posts")
                            .service(
                                web::resource("")
                                    .route(web::post().to(handlers::posts::create_post))
                                    .route(web::get().to(handlers::posts::list_posts)),
                            )
                            .route("/import", web::post().to(handlers::posts::import_post))
                            .service(
                                web::resource("/{post_id}")
                                    .route(web::get().to(handlers::posts::get_post))
                                    .route(web::put().to(handlers::posts::update_post))
                                    .route(web::delete().to(handlers::posts::delete_post)),
                            )
                            .route(
                                "/{post_id}/publish",
                                web::post().to(handlers::posts::publish_post),
                            )
                            .route(
                                "/{post_id}/archive",
                                web::post().to(handlers::posts::archive_post),
                            )
                            .route(
                                "/{post_id}/restore",
                                web::post().to(handlers::posts::restore_post),
                            )
                            .route(
                                "/{post_id}/purge",
                                web::delete().to(handlers::posts::purge_post),
                            )
                            .service(
                                web::resource("/{post_id}/translations")
                                    .route(web::get().to(handlers::posts::list_translations))
                                    .route(web::post().to(handlers::posts::create_translation)),
                            )
                            .route(
                                "/{post_id}/compose",
                                web::get().to(handlers::posts::compose_post),
                            )
                            .route(
                                "/{post_id}/export",
                                web::get().to(handlers::posts::export_post),
                            )
                            .route(
                                "/{post_id}/modules",
                                web::post().to(handlers::modules::attach_module),
                            )
                            .route(
                                "/{post_id}/modules/reorder",
                                web::post().to(handlers::modules::reorder_modules),
                            ),
                    )
                    .service(
                        web::scope("/post-modules")
                            .service(
                                web::resource("/{post_module_id}")
                                    .route(web::patch().to(handlers::modules::patch_post_module))
                                    .route(web::delete().to(handlers::modules::detach_module)),
                            )
                            .route(
                                "/{post_module_id}/promote",
                                web::post().to(handlers::modules::promote_overrides),
                            )
                            .route(
                                "/{post_module_id}/discard",
                                web::post().to(handlers::modules::discard_overrides),
                            ),
                    )
                    .service(
                        web::scope("/module-instances")
                            .service(
                                web::resource("")
                                    .route(web::get().to(handlers::modules::list_instances))
                                    .route(
                                        web::post().to(handlers::modules::create_global_instance),
                                    ),
                            )
                            .service(
                                web::resource("/{instance_id}")
                                    .route(web::get().to(handlers::modules::get_instance))
                                    .route(web::put().to(handlers::modules::update_instance))
                                    .route(web::delete().to(handlers::modules::delete_instance)),
                            ),
                    )
                    .service(
                        web::scope("/module-groups")
                            .service(
                                web::resource("")
                                    .route(web::get().to(handlers::module_groups::list_groups))
                                    .route(web::post().to(handlers::module_groups::create_group)),
                            )
                            .service(
                                web::resource("/{group_id}")
                                    .route(web::get().to(handlers::module_groups::get_group))
                                    .route(web::put().to(handlers::module_groups::update_group))
                                    .route(web::delete().to(handlers::module_groups::delete_group)),
                            ),
                    )
                    .service(
                        web::scope("/media")
                            .service(
                                web::resource("")
                                    .route(web::post().to(handlers::media::upload_media))
                                    .route(web::get().to(handlers::media::list_media)),
                            )
                            .service(
                                web::resource("/{asset_id}")
                                    .route(web::get().to(handlers::media::get_media))
                                    .route(web::patch().to(handlers::media::update_media))
                                    .route(web::delete().to(handlers::media::delete_media)),
                            )
                            .route(
                                "/{asset_id}/optimize",
                                web::post().to(handlers::media::optimize_media),
                            )
                            .route(
                                "/{asset_id}/variants",
                                web::post().to(handlers::media::generate_variants),
                            )
                            .route(
                                "/{asset_id}/rename",
                                web::post().to(handlers::media::rename_media),
                            ),
                    )
                    .service(
                        web::scope("/menus")
                            .service(
                                web::resource("")
                                    .route(web::get().to(handlers::menus::list_menus))
                                    .route(web::post().to(handlers::menus::create_menu)),
                            )
                            .service(
                                web::resource("/{menu_id}")
                                    .route(web::get().to(handlers::menus::get_menu))
                                    .route(web::put().to(handlers::menus::update_menu))
                                    .route(web::delete().to(handlers::menus::delete_menu)),
                            ),
                    )
                    .service(
                        web::scope("/forms")
                            .service(
                                web::resource("")
                                    .route(web::get().to(handlers::forms::list_forms))
                                    .route(web::post().to(handlers::forms::create_form)),
                            )
                            .service(
                                web::resource("/{form_id}")
                                    .route(web::get().to(handlers::forms::get_form))
                                    .route(web::put().to(handlers::forms::update_form))
                                    .route(web::delete().to(handlers::forms::delete_form)),
                            )
                            .route(
                                "/{form_id}/submissions",
                                web::get().to(handlers::forms::list_submissions),
                            ),
                    )
                    .service(
                        web::scope("/agents")
                            .service(
                                web::resource("")
                                    .route(web::get().to(handlers::agents::list_agents))
                                    .route(web::post().to(handlers::agents::create_agent)),
                            )
                            .service(
                                web::resource("/{agent_id}")
                                    .route(web::get().to(handlers::agents::get_agent))
                                    .route(web::put().to(handlers::agents::update_agent))
                                    .route(web::delete().to(handlers::agents::delete_agent)),
                            )
                            .route(
                                "/{agent_id}/invoke",
                                web::post().to(handlers::agents::invoke_agent),
                            ),
                    )
                    .service(
                        web::scope("/settings")
                            .route("", web::get().to(handlers::settings::list_settings))
                            .route("/{key}", web::put().to(handlers::settings::put_setting)),
                    )
                    .service(
                        web::scope("/users")
                            .service(
                                web::resource("")
                                    .route(web::get().to(handlers::users::list_users))
                                    .route(web::post().to(handlers::users::create_user)),
                            )
                            .route("/{user_id}", web::patch().to(handlers::users::update_user)),
                    )
                    .route(
                        "/activity",
                        web::get().to(handlers::activity::list_activity),
                    ),
            )
    })
    .bind(&http_bind_address)?
    .workers(4)
    .run();

    let server_handle = server.handle();

    // Spawn the HTTP server and background jobs
    let mut tasks: JoinSet<io::Result<()>> = JoinSet::new();

    tasks.spawn(async move {
        tracing::info!("HTTP server is running");
        server.await
    });

    tasks.spawn(async move {
        publisher.run().await;
        Ok(())
    });

    let mut first_error: Option<io::Error> = None;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = tasks.join_next() => {
                match result {
                    Some(Ok(Ok(_))) => {
                        tracing::info!("Background task completed");
                    }
                    Some(Ok(Err(e))) => {
                        tracing::error!("Task returned error: {}", e);
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                        server_handle.stop(true).await;
                        tasks.shutdown().await;
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!("Task join error: {}", e);
                        if first_error.is_none() {
                            first_error = Some(io::Error::new(io::ErrorKind::Other, e.to_string()));
                        }
                        server_handle.stop(true).await;
                        tasks.shutdown().await;
                        break;
                    }
                    None => break,
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                server_handle.stop(true).await;
                tasks.shutdown().await;
                break;
            }
        }
    }

    tracing::info!("cms-service shutting down");

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
