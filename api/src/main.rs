use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

mod config;
mod db;
mod error;
mod extract;
mod middleware;
mod registry;
mod routes;
mod state;

use config::{Config, DatabaseConfig};
use db::Database;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mugo API",
        version = "0.1.0",
        description = "Gateway between the Mugo nutrition chat app, the agent service and Postgres."
    ),
    paths(
        routes::health::health_check,
        routes::greeting::greet,
        routes::conversation::converse,
        routes::agents::list_agents,
        routes::agents::weather,
        routes::agents::nutrition,
        routes::users::create_user,
        routes::users::list_users,
        routes::users::get_user,
        routes::users::get_user_by_username,
        routes::users::update_user_metadata,
        routes::users::delete_user,
        routes::meals::create_meal,
        routes::meals::list_meals,
        routes::meals::list_meals_by_date,
        routes::meals::list_meals_by_range,
        routes::meals::list_meals_by_conversation,
        routes::meals::get_meal,
        routes::meals::delete_meal,
        routes::conversations::create_conversation,
        routes::conversations::list_conversations,
        routes::conversations::get_conversation_by_session,
        routes::conversations::get_conversation,
        routes::conversations::update_conversation_title,
        routes::conversations::delete_conversation,
        routes::analytics::daily_summary,
        routes::analytics::daily_range,
        routes::analytics::daily_history,
        routes::analytics::weekly_summary,
        routes::analytics::weekly_range,
        routes::debug::list_sessions,
        routes::debug::list_messages,
        routes::debug::get_agent_session,
        routes::debug::delete_agent_session,
    ),
    components(schemas(
        HealthResponse,
        mugo_core::error::ApiError,
        mugo_core::models::User,
        mugo_core::models::Conversation,
        mugo_core::models::Macros,
        mugo_core::models::Assumption,
        mugo_core::models::NutritionPayload,
        mugo_core::models::MealType,
        mugo_core::models::FoodSource,
        mugo_core::models::MealLog,
        mugo_core::models::DailyNutritionSummary,
        mugo_core::models::WeeklyNutritionSummary,
        routes::greeting::GreetingResponse,
        routes::conversation::ConverseRequest,
        routes::conversation::ConverseResponse,
        routes::agents::AgentListResponse,
        routes::agents::WeatherRequest,
        routes::agents::WeatherResponse,
        routes::agents::NutritionRequest,
        routes::agents::NutritionResponse,
        routes::users::CreateUserRequest,
        routes::users::UpdateUserMetadataRequest,
        routes::users::UserResponse,
        routes::users::UserListResponse,
        routes::meals::CreateMealRequest,
        routes::meals::MealResponse,
        routes::meals::MealListResponse,
        routes::conversations::CreateConversationRequest,
        routes::conversations::UpdateTitleRequest,
        routes::conversations::ConversationResponse,
        routes::conversations::ConversationListResponse,
        routes::analytics::DailySummaryResponse,
        routes::analytics::DailySummaryListResponse,
        routes::analytics::WeeklySummaryResponse,
        routes::analytics::WeeklySummaryListResponse,
        routes::debug::SessionIdsResponse,
        routes::debug::MessagesResponse,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// "ok", "unreachable" or "disabled"
    pub database: String,
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mugo_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let db = connect_database(&config.database).await;

    let agents = match mugo_adk::AgentClient::with_timeout(&config.adk.base_url, config.adk.timeout) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, "invalid agent service configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        adk_url = %agents.base_url(),
        nutrition_app = %config.adk.apps.nutrition,
        weather_app = %config.adk.apps.weather,
        conversation_app = %config.adk.apps.conversation,
        "agent service configured"
    );

    let app_state = state::AppState {
        db,
        database_configured: config.database.url.is_some(),
        agents,
        apps: config.adk.apps.clone(),
        registry: Arc::new(registry::SessionRegistry::new()),
    };

    let app = Router::new()
        .route("/api-doc/openapi.json", get(openapi_json))
        .merge(routes::health::router())
        .merge(routes::greeting::router())
        .merge(routes::conversation::router())
        .merge(routes::agents::router())
        .merge(routes::users::router())
        .merge(routes::meals::router())
        .merge(routes::conversations::router())
        .merge(routes::analytics::router())
        .merge(routes::debug::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::cors::build_cors_layer(&config.cors_origins)),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Mugo API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app).await.expect("Server error");
}

/// Connect and migrate. Exits the process on failure when fail-fast is on;
/// otherwise logs and continues without persistence.
async fn connect_database(config: &DatabaseConfig) -> Option<Database> {
    let Some(url) = config.url.as_deref() else {
        if config.fail_fast {
            tracing::error!("DATABASE_URL must be set (or set DB_FAIL_FAST=false to run without persistence)");
            std::process::exit(1);
        }
        tracing::warn!("DATABASE_URL not set, running without persistence");
        return None;
    };

    let db = match Database::connect(url, config).await {
        Ok(db) => db,
        Err(err) if config.fail_fast => {
            tracing::error!(error = %err, "failed to connect to database");
            std::process::exit(1);
        }
        Err(err) => {
            tracing::warn!(error = %err, "database unreachable, running without persistence");
            return None;
        }
    };

    if config.run_migrations {
        if let Err(err) = db.migrate().await {
            if config.fail_fast {
                tracing::error!(error = %err, "failed to run migrations");
                std::process::exit(1);
            }
            tracing::warn!(error = %err, "failed to run migrations, continuing with existing schema");
        }
    }

    tracing::info!(
        min_connections = config.min_connections,
        max_connections = config.max_connections,
        "database connected"
    );
    Some(db)
}
