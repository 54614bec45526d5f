use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_api::auth::{self, AppState, AppStateInner};
use parley_api::middleware::require_auth;
use parley_api::{groups, members, messages, topics};
use parley_gateway::connection;
use parley_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    db: Arc<parley_db::Database>,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("PARLEY_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("PARLEY_DB_PATH").unwrap_or_else(|_| "parley.db".into());
    let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PARLEY_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(parley_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        jwt_secret: jwt_secret.clone(),
        dispatcher: dispatcher.clone(),
    });

    let server_state = ServerState {
        dispatcher,
        db,
        jwt_secret,
    };

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/auth/profile", get(auth::profile))
        .route("/users", get(auth::list_users))
        .route("/groups", post(groups::create_group).get(groups::list_groups))
        .route("/groups/public", get(groups::list_public_groups))
        .route("/groups/join", post(groups::join_group))
        .route(
            "/groups/{group_id}",
            get(groups::get_group)
                .patch(groups::update_group)
                .delete(groups::delete_group),
        )
        .route("/groups/{group_id}/leave", post(groups::leave_group))
        .route(
            "/groups/{group_id}/members",
            get(members::list_members).post(members::add_member),
        )
        .route(
            "/groups/{group_id}/members/{user_id}",
            delete(members::remove_member),
        )
        .route(
            "/groups/{group_id}/members/{user_id}/promote",
            post(members::promote_member),
        )
        .route(
            "/groups/{group_id}/members/{user_id}/demote",
            post(members::demote_member),
        )
        .route(
            "/groups/{group_id}/members/{user_id}/permissions",
            patch(members::update_permissions),
        )
        .route(
            "/groups/{group_id}/topics",
            get(topics::list_topics).post(topics::create_topic),
        )
        .route(
            "/groups/{group_id}/topics/{topic_id}",
            patch(topics::update_topic).delete(topics::delete_topic),
        )
        .route(
            "/groups/{group_id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route(
            "/groups/{group_id}/messages/{message_id}",
            patch(messages::update_message).delete(messages::delete_message),
        )
        .route(
            "/groups/{group_id}/messages/{message_id}/reactions",
            post(messages::react_to_message),
        )
        .route(
            "/groups/{group_id}/messages/{message_id}/reactions/{emoji}",
            delete(messages::remove_reaction),
        )
        .route(
            "/groups/{group_id}/messages/{message_id}/seen",
            post(messages::mark_seen),
        )
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(server_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.db, state.jwt_secret)
    })
}
