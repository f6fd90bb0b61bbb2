use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, Method},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use colis_core::auth::{self, Identity};
use colis_core::bordereau::{self, DocumentRenderer};
use colis_core::directory;
use colis_core::lifecycle;
use colis_core::mailer::MailSender;
use colis_store::{AddressInput, Agent, Database, Parcel, ParcelStatus, Role, User};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::sessions::{bearer_token, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub sessions: SessionStore,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub mailer: Arc<dyn MailSender>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/auth/register", post(auth_register))
        .route("/auth/login", post(auth_login))
        .route("/auth/logout", post(auth_logout))
        .route("/parcels", post(parcel_create).get(parcel_list))
        .route("/parcels/mine", get(parcel_mine))
        .route("/parcels/unassigned", get(parcel_unassigned))
        .route("/parcels/claim", post(parcel_claim))
        .route("/parcels/track/{tracking_number}", get(parcel_track))
        .route(
            "/parcels/{id}",
            get(parcel_get).put(parcel_edit).delete(parcel_delete),
        )
        .route("/parcels/{id}/assign", post(parcel_assign))
        .route("/parcels/{id}/status", post(parcel_status))
        .route("/parcels/{id}/deliver", post(parcel_deliver))
        .route("/parcels/{id}/bordereau", get(parcel_bordereau))
        .route("/clients", get(client_list))
        .route("/agents", get(agent_list).post(agent_create))
        .route(
            "/agents/{id}",
            get(agent_get).put(agent_update).delete(agent_delete),
        )
        .route("/agents/{id}/parcels", get(agent_parcels))
        .route("/agents/{id}/stats", get(agent_stats))
        .route("/admin/stats", get(admin_stats))
        .route("/admin/migrate-passwords", post(admin_migrate_passwords))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    registration_open: bool,
}

#[derive(Deserialize)]
struct RegisterRequest {
    nom: String,
    prenom: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: Uuid,
    identity: Identity,
}

#[derive(Deserialize)]
struct CreateParcelRequest {
    description: String,
    weight: f64,
    address: AddressInput,
}

#[derive(Deserialize)]
struct EditParcelRequest {
    description: String,
    weight: f64,
    status: ParcelStatus,
    address: AddressInput,
}

#[derive(Deserialize)]
struct AssignRequest {
    agent_id: i64,
}

#[derive(Deserialize)]
struct StatusRequest {
    status: ParcelStatus,
}

#[derive(Deserialize)]
struct ClaimRequest {
    tracking_number: String,
}

#[derive(Deserialize)]
struct CreateAgentRequest {
    nom: String,
    prenom: String,
    email: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Deserialize)]
struct UpdateAgentRequest {
    nom: String,
    prenom: String,
    email: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    /// When present, replaces the agent's password.
    password: Option<String>,
}

/// Agent joined with the public fields of its user account.
#[derive(Serialize)]
struct AgentResponse {
    id: i64,
    user_id: i64,
    nom: String,
    prenom: String,
    email: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    available: bool,
}

impl AgentResponse {
    fn from_pair(agent: &Agent, user: &User) -> Self {
        Self {
            id: agent.id,
            user_id: agent.user_id,
            nom: user.nom.clone(),
            prenom: user.prenom.clone(),
            email: user.email.clone(),
            latitude: agent.latitude,
            longitude: agent.longitude,
            available: agent.available,
        }
    }
}

#[derive(Serialize)]
struct AgentStatsResponse {
    total: i64,
    delivered: i64,
    in_transit: i64,
    recent: Vec<Parcel>,
}

#[derive(Serialize)]
struct AdminStatsResponse {
    delivered_today: i64,
    delivered_this_week: i64,
    in_transit: i64,
    per_status: HashMap<String, i64>,
}

#[derive(Serialize)]
struct MigrateResponse {
    migrated: usize,
}

// ---------------------------------------------------------------------------
// Access helpers
// ---------------------------------------------------------------------------

async fn require_identity(state: &AppState, headers: &HeaderMap) -> Result<Identity, ServerError> {
    state
        .sessions
        .identity_from_headers(headers)
        .await
        .ok_or(ServerError::Unauthorized)
}

fn require_admin(identity: &Identity) -> Result<(), ServerError> {
    if identity.role != Role::Admin {
        return Err(ServerError::Forbidden("admin role required".into()));
    }
    Ok(())
}

/// Admin, the owning client, or the assigned agent may see a parcel.
fn authorize_parcel_access(identity: &Identity, parcel: &Parcel) -> Result<(), ServerError> {
    if identity.role == Role::Admin
        || parcel.owner_id == Some(identity.user_id)
        || (identity.agent_id.is_some() && identity.agent_id == parcel.agent_id)
    {
        return Ok(());
    }
    Err(ServerError::Forbidden("not your parcel".into()))
}

/// Admin or the agent themselves.
fn authorize_agent_access(identity: &Identity, agent_id: i64) -> Result<(), ServerError> {
    if identity.role == Role::Admin || identity.agent_id == Some(agent_id) {
        return Ok(());
    }
    Err(ServerError::Forbidden("not your agent record".into()))
}

/// Constant-time comparison of the `/admin/*` bearer token.
fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ServerError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Health & info
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        registration_open: state.config.registration_open,
    })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

async fn auth_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Identity>, ServerError> {
    if !state.config.registration_open {
        return Err(ServerError::Forbidden("registration is closed".into()));
    }

    let db = state.db.lock().await;
    // Self-service accounts are always clients; agent and admin accounts
    // are provisioned through the directory.
    let user = auth::register(
        &db,
        &req.nom,
        &req.prenom,
        &req.email,
        &req.password,
        Role::Client,
    )?;

    Ok(Json(Identity {
        user_id: user.id,
        email: user.email,
        role: user.role,
        agent_id: None,
    }))
}

async fn auth_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    let identity = {
        let db = state.db.lock().await;
        auth::authenticate(&db, &req.email, &req.password)?
    };

    let token = state.sessions.issue(identity.clone()).await;
    Ok(Json(LoginResponse { token, identity }))
}

async fn auth_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ServerError> {
    let token = bearer_token(&headers).ok_or(ServerError::Unauthorized)?;
    let revoked = state.sessions.revoke(token).await;
    Ok(Json(serde_json::json!({ "logged_out": revoked })))
}

// ---------------------------------------------------------------------------
// Parcels
// ---------------------------------------------------------------------------

async fn parcel_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateParcelRequest>,
) -> Result<Json<Parcel>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    // Clients own what they create; admin-created parcels wait to be
    // claimed by tracking number.
    let owner = (identity.role == Role::Client).then_some(identity.user_id);

    let db = state.db.lock().await;
    let parcel = lifecycle::create_parcel(&db, &req.description, req.weight, &req.address, owner)?;
    Ok(Json(parcel))
}

async fn parcel_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Parcel>>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    require_admin(&identity)?;

    let db = state.db.lock().await;
    Ok(Json(db.list_active_parcels()?))
}

/// The calling account's own parcels, newest first.
async fn parcel_mine(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Parcel>>, ServerError> {
    let identity = require_identity(&state, &headers).await?;

    let db = state.db.lock().await;
    Ok(Json(db.list_parcels_for_owner(identity.user_id)?))
}

async fn parcel_unassigned(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Parcel>>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    require_admin(&identity)?;

    let db = state.db.lock().await;
    Ok(Json(db.list_unassigned_parcels()?))
}

/// Public tracking lookup.  The tracking number is an unguessable bearer
/// secret, so no session is required here.
async fn parcel_track(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> Result<Json<Parcel>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(db.get_parcel_by_tracking_number(&tracking_number)?))
}

async fn parcel_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Parcel>, ServerError> {
    let identity = require_identity(&state, &headers).await?;

    let db = state.db.lock().await;
    let parcel = db.get_parcel(id)?;
    authorize_parcel_access(&identity, &parcel)?;
    Ok(Json(parcel))
}

async fn parcel_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<EditParcelRequest>,
) -> Result<Json<Parcel>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    require_admin(&identity)?;

    let mut db = state.db.lock().await;
    let parcel = lifecycle::edit_parcel(
        &mut db,
        id,
        &req.description,
        req.weight,
        req.status,
        &req.address,
    )?;
    Ok(Json(parcel))
}

async fn parcel_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let identity = require_identity(&state, &headers).await?;

    let db = state.db.lock().await;
    let parcel = db.get_parcel(id)?;
    if identity.role != Role::Admin && parcel.owner_id != Some(identity.user_id) {
        return Err(ServerError::Forbidden("not your parcel".into()));
    }

    lifecycle::soft_delete(&db, id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn parcel_claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<Parcel>, ServerError> {
    let identity = require_identity(&state, &headers).await?;

    let db = state.db.lock().await;
    let parcel = lifecycle::claim_parcel(&db, &req.tracking_number, identity.user_id)?;
    Ok(Json(parcel))
}

async fn parcel_assign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<Parcel>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    require_admin(&identity)?;

    let mut db = state.db.lock().await;
    lifecycle::assign_parcel(&mut db, id, req.agent_id)?;

    info!(parcel_id = id, agent_id = req.agent_id, "parcel assigned via API");
    Ok(Json(db.get_parcel(id)?))
}

async fn parcel_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Parcel>, ServerError> {
    let identity = require_identity(&state, &headers).await?;

    let mut db = state.db.lock().await;
    let parcel = db.get_parcel(id)?;
    if identity.role != Role::Admin
        && (identity.agent_id.is_none() || identity.agent_id != parcel.agent_id)
    {
        return Err(ServerError::Forbidden(
            "only the assigned agent may update this parcel".into(),
        ));
    }

    lifecycle::update_status(&mut db, id, req.status)?;
    Ok(Json(db.get_parcel(id)?))
}

async fn parcel_deliver(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Parcel>, ServerError> {
    let identity = require_identity(&state, &headers).await?;

    let mut db = state.db.lock().await;
    let parcel = db.get_parcel(id)?;
    if identity.role != Role::Admin
        && (identity.agent_id.is_none() || identity.agent_id != parcel.agent_id)
    {
        return Err(ServerError::Forbidden(
            "only the assigned agent may deliver this parcel".into(),
        ));
    }

    lifecycle::complete_delivery(&mut db, id)?;
    Ok(Json(db.get_parcel(id)?))
}

async fn parcel_bordereau(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ServerError> {
    let identity = require_identity(&state, &headers).await?;

    let data = {
        let db = state.db.lock().await;
        let parcel = db.get_parcel(id)?;
        authorize_parcel_access(&identity, &parcel)?;
        bordereau::issue_note(&db, id)?
    };

    let bytes = state
        .renderer
        .render(&data)
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    let filename = bordereau::attachment_filename(&data.parcel);

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

/// Directory of client accounts.  `User` serialization skips the password
/// hash, so the response carries profile fields only.
async fn client_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    require_admin(&identity)?;

    let db = state.db.lock().await;
    Ok(Json(db.list_users_with_role(Role::Client)?))
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

async fn agent_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AgentResponse>>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    require_admin(&identity)?;

    let db = state.db.lock().await;
    let agents = db
        .list_agents()?
        .iter()
        .map(|(agent, user)| AgentResponse::from_pair(agent, user))
        .collect();
    Ok(Json(agents))
}

async fn agent_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateAgentRequest>,
) -> Result<Json<AgentResponse>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    require_admin(&identity)?;

    let mut db = state.db.lock().await;
    let (user, agent) = directory::create_agent(
        &mut db,
        state.mailer.as_ref(),
        &req.nom,
        &req.prenom,
        &req.email,
        req.latitude,
        req.longitude,
    )?;
    Ok(Json(AgentResponse::from_pair(&agent, &user)))
}

async fn agent_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<AgentResponse>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    authorize_agent_access(&identity, id)?;

    let db = state.db.lock().await;
    let agent = db.get_agent(id)?;
    let user = db.get_user(agent.user_id)?;
    Ok(Json(AgentResponse::from_pair(&agent, &user)))
}

async fn agent_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAgentRequest>,
) -> Result<Json<AgentResponse>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    require_admin(&identity)?;

    let db = state.db.lock().await;
    let agent = directory::update_agent(
        &db,
        id,
        &req.nom,
        &req.prenom,
        &req.email,
        req.latitude,
        req.longitude,
        req.password.as_deref(),
    )?;
    let user = db.get_user(agent.user_id)?;
    Ok(Json(AgentResponse::from_pair(&agent, &user)))
}

async fn agent_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    require_admin(&identity)?;

    let mut db = state.db.lock().await;
    directory::delete_agent(&mut db, id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn agent_parcels(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Parcel>>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    authorize_agent_access(&identity, id)?;

    let db = state.db.lock().await;
    Ok(Json(db.list_parcels_for_agent(id)?))
}

async fn agent_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<AgentStatsResponse>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    authorize_agent_access(&identity, id)?;

    let db = state.db.lock().await;
    // NotFound for unknown agents rather than a row of zeros.
    db.get_agent(id)?;

    Ok(Json(AgentStatsResponse {
        total: db.count_parcels_for_agent(id)?,
        delivered: db.count_parcels_for_agent_with_status(id, ParcelStatus::Delivered)?,
        in_transit: db.count_parcels_for_agent_with_status(id, ParcelStatus::InTransit)?,
        recent: db.recent_parcels_for_agent(id, 5)?,
    }))
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

async fn admin_stats(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<AdminStatsResponse>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let now = Utc::now();
    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let week = now
        .date_naive()
        .week(Weekday::Mon)
        .first_day()
        .and_time(NaiveTime::MIN)
        .and_utc();

    let db = state.db.lock().await;
    let per_status = db
        .count_parcels_per_status()?
        .into_iter()
        .map(|(status, count)| (status.as_str().to_string(), count))
        .collect();

    Ok(Json(AdminStatsResponse {
        delivered_today: db.count_delivered_since(today)?,
        delivered_this_week: db.count_delivered_since(week)?,
        in_transit: db.count_with_status(ParcelStatus::InTransit)?,
        per_status,
    }))
}

async fn admin_migrate_passwords(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<MigrateResponse>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let db = state.db.lock().await;
    let migrated = auth::rehash_legacy_passwords(&db)?;

    info!(migrated, "password migration triggered via admin API");
    Ok(Json(MigrateResponse { migrated }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_state(admin_token: Option<&str>) -> AppState {
        let config = ServerConfig {
            admin_token: admin_token.map(String::from),
            ..ServerConfig::default()
        };
        AppState {
            db: Arc::new(Mutex::new(Database::open_in_memory().unwrap())),
            sessions: SessionStore::new(),
            renderer: Arc::new(crate::pdf::PdfRenderer),
            mailer: Arc::new(crate::mail::LogMailer),
            config: Arc::new(config),
        }
    }

    async fn seed_identity(state: &AppState, role: Role) -> (Uuid, Identity) {
        let identity = {
            let db = state.db.lock().await;
            let user = db
                .insert_user("Test", "User", &format!("{:?}@colis.test", role), "$h", role)
                .unwrap();
            Identity {
                user_id: user.id,
                email: user.email,
                role,
                agent_id: None,
            }
        };
        let token = state.sessions.issue(identity.clone()).await;
        (token, identity)
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_router(test_state(None));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn parcel_create_requires_a_session() {
        let app = build_router(test_state(None));
        let request = Request::post("/parcels")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"description":"x","weight":1.0,
                    "address":{"rue":"r","ville":"v","code_postal":"c","pays":"p"}}"#,
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn client_creates_and_tracks_a_parcel() {
        let state = test_state(None);
        let (token, identity) = seed_identity(&state, Role::Client).await;
        let app = build_router(state.clone());

        let request = Request::post("/parcels")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(
                r#"{"description":"Laptop","weight":2.5,
                    "address":{"rue":"r","ville":"v","code_postal":"c","pays":"p"}}"#,
            ))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The parcel is owned by its creator and publicly trackable.
        let parcel = {
            let db = state.db.lock().await;
            db.list_active_parcels().unwrap().remove(0)
        };
        assert_eq!(parcel.owner_id, Some(identity.user_id));

        let request = Request::get(format!("/parcels/track/{}", parcel.tracking_number))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn mine_lists_only_the_callers_parcels() {
        let state = test_state(None);
        let (token_a, identity_a) = seed_identity(&state, Role::Client).await;
        let (_, identity_b) = seed_identity(&state, Role::Admin).await;

        {
            let db = state.db.lock().await;
            let address = AddressInput {
                rue: "r".into(),
                ville: "v".into(),
                code_postal: "c".into(),
                pays: "p".into(),
            };
            lifecycle::create_parcel(&db, "mine", 1.0, &address, Some(identity_a.user_id))
                .unwrap();
            lifecycle::create_parcel(&db, "theirs", 1.0, &address, Some(identity_b.user_id))
                .unwrap();
            lifecycle::create_parcel(&db, "nobody's", 1.0, &address, None).unwrap();
        }

        let app = build_router(state);
        let request = Request::get("/parcels/mine")
            .header("authorization", format!("Bearer {token_a}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parcels: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(parcels.len(), 1);
        assert_eq!(parcels[0]["description"], "mine");
    }

    #[tokio::test]
    async fn client_directory_is_admin_only_and_hides_hashes() {
        let state = test_state(None);
        let (client_token, _) = seed_identity(&state, Role::Client).await;
        let (admin_token, _) = seed_identity(&state, Role::Admin).await;
        let app = build_router(state);

        let request = Request::get("/clients")
            .header("authorization", format!("Bearer {client_token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let request = Request::get("/clients")
            .header("authorization", format!("Bearer {admin_token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let clients: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0]["role"], "CLIENT");
        assert!(clients[0].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn parcel_listing_is_admin_only() {
        let state = test_state(None);
        let (client_token, _) = seed_identity(&state, Role::Client).await;
        let (admin_token, _) = seed_identity(&state, Role::Admin).await;
        let app = build_router(state);

        let request = Request::get("/parcels")
            .header("authorization", format!("Bearer {client_token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let request = Request::get("/parcels")
            .header("authorization", format!("Bearer {admin_token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn bordereau_downloads_as_pdf_attachment() {
        let state = test_state(None);
        let (token, identity) = seed_identity(&state, Role::Client).await;

        let parcel = {
            let db = state.db.lock().await;
            lifecycle::create_parcel(
                &db,
                "Laptop",
                2.5,
                &AddressInput {
                    rue: "r".into(),
                    ville: "v".into(),
                    code_postal: "c".into(),
                    pays: "p".into(),
                },
                Some(identity.user_id),
            )
            .unwrap()
        };

        let app = build_router(state);
        let request = Request::get(format!("/parcels/{}/bordereau", parcel.id))
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/pdf"
        );
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains(&format!("bordereau_{}.pdf", parcel.tracking_number)));
    }

    #[tokio::test]
    async fn admin_endpoints_reject_bad_tokens() {
        let app = build_router(test_state(Some("sekrit")));

        let request = Request::get("/admin/stats")
            .header("authorization", "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let request = Request::get("/admin/stats")
            .header("authorization", "Bearer sekrit")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_api_disabled_without_token() {
        let app = build_router(test_state(None));
        let request = Request::get("/admin/stats")
            .header("authorization", "Bearer anything")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
