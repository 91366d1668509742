//! Lock HTTP handlers
//!
//! Thin adapters: validate the request, call the manager, map the outcome.
//! Business outcomes (denied, not owned) are 200 responses carrying data.

use actix_web::{HttpResponse, web};
use tracing::{debug, warn};

use editlock_api::{
    ACQUIRE_PATH, AcquireRequest, AcquireResponse, ActiveLock, HEALTH_PATH, HealthResponse,
    LOCKS_PATH, LockHolder, LockInfo, OkResponse, RELEASE_PATH, RENEW_PATH, ReleaseRequest,
    RenewRequest, SETTINGS_PATH, STATUS_PATH, StatusQuery, StatusResponse,
};
use editlock_core::{AcquireOutcome, LockOwner, LockRecord, LockStatus, RenewOutcome};

use crate::metrics::{Timer, record_http_request};
use crate::model::AppState;
use crate::model::response::http_error;

fn observe(method: &'static str, path: &'static str, timer: Timer, resp: HttpResponse) -> HttpResponse {
    record_http_request(method, path, resp.status().as_u16(), timer.elapsed_secs());
    resp
}

fn lock_info(owner: &LockOwner) -> LockInfo {
    LockInfo {
        owner_id: owner.owner_id.clone(),
        owner_name: owner.owner_name.clone(),
        acquired_at: owner.acquired_at,
        expires_at: owner.expires_at,
    }
}

fn acquire_response(outcome: AcquireOutcome) -> AcquireResponse {
    match outcome {
        AcquireOutcome::Granted { record, .. } => {
            let info = lock_info(&record.owner());
            AcquireResponse::granted(record.token, info)
        }
        AcquireOutcome::Denied { holder } => AcquireResponse::denied(lock_info(&holder)),
    }
}

fn status_response(status: LockStatus) -> StatusResponse {
    match status.holder {
        Some(holder) => StatusResponse {
            is_locked: true,
            is_own_lock: status.is_own_lock,
            expires_at: Some(holder.expires_at),
            locked_by: Some(LockHolder {
                owner_id: holder.owner_id,
                owner_name: holder.owner_name,
            }),
        },
        None => StatusResponse::unlocked(),
    }
}

fn active_lock(record: LockRecord) -> ActiveLock {
    ActiveLock {
        resource_type: record.key.resource_type.to_string(),
        resource_id: record.key.resource_id,
        owner_id: record.owner_id,
        owner_name: record.owner_name,
        acquired_at: record.acquired_at,
        last_heartbeat_at: record.last_heartbeat_at,
        expires_at: record.expires_at,
    }
}

/// POST /locks/acquire
pub async fn acquire(data: web::Data<AppState>, body: web::Json<AcquireRequest>) -> HttpResponse {
    let timer = Timer::new();
    let key = match body.validate() {
        Ok(key) => key,
        Err(e) => {
            debug!(error = %e, "Rejected acquire request");
            return observe("POST", ACQUIRE_PATH, timer, http_error(&e));
        }
    };

    let resp = match data
        .lock_manager
        .acquire(&key, &body.owner_id, &body.owner_name)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(acquire_response(outcome)),
        Err(e) => {
            warn!(
                resource_type = %key.resource_type,
                resource_id = %key.resource_id,
                owner_id = %body.owner_id,
                error = %e,
                "Acquire failed"
            );
            http_error(&e)
        }
    };
    observe("POST", ACQUIRE_PATH, timer, resp)
}

/// POST /locks/renew
pub async fn renew(data: web::Data<AppState>, body: web::Json<RenewRequest>) -> HttpResponse {
    let timer = Timer::new();
    let key = match body.validate() {
        Ok(key) => key,
        Err(e) => {
            debug!(error = %e, "Rejected renew request");
            return observe("POST", RENEW_PATH, timer, http_error(&e));
        }
    };

    if !body.has_well_formed_token() {
        debug!(key = %key, "Renew with malformed token, not owned");
        return observe(
            "POST",
            RENEW_PATH,
            timer,
            HttpResponse::Ok().json(OkResponse { ok: false }),
        );
    }

    let resp = match data.lock_manager.renew(&key, &body.token).await {
        Ok(outcome) => HttpResponse::Ok().json(OkResponse {
            ok: matches!(outcome, RenewOutcome::Renewed { .. }),
        }),
        Err(e) => {
            warn!(key = %key, error = %e, "Renew failed");
            http_error(&e)
        }
    };
    observe("POST", RENEW_PATH, timer, resp)
}

/// POST /locks/release. Answers `ok: true` whether or not anything was held.
pub async fn release(data: web::Data<AppState>, body: web::Json<ReleaseRequest>) -> HttpResponse {
    let timer = Timer::new();
    let key = match body.validate() {
        Ok(key) => key,
        Err(e) => {
            debug!(error = %e, "Rejected release request");
            return observe("POST", RELEASE_PATH, timer, http_error(&e));
        }
    };

    if !body.has_well_formed_token() {
        debug!(key = %key, "Release with malformed token, nothing held");
        return observe(
            "POST",
            RELEASE_PATH,
            timer,
            HttpResponse::Ok().json(OkResponse { ok: true }),
        );
    }

    let resp = match data.lock_manager.release(&key, &body.token).await {
        Ok(_) => HttpResponse::Ok().json(OkResponse { ok: true }),
        Err(e) => {
            warn!(key = %key, error = %e, "Release failed");
            http_error(&e)
        }
    };
    observe("POST", RELEASE_PATH, timer, resp)
}

/// GET /locks/status
pub async fn status(data: web::Data<AppState>, query: web::Query<StatusQuery>) -> HttpResponse {
    let timer = Timer::new();
    let key = match query.validate() {
        Ok(key) => key,
        Err(e) => return observe("GET", STATUS_PATH, timer, http_error(&e)),
    };

    let resp = match data.lock_manager.status(&key, &query.caller_id).await {
        Ok(status) => HttpResponse::Ok().json(status_response(status)),
        Err(e) => {
            warn!(key = %key, error = %e, "Status lookup failed");
            http_error(&e)
        }
    };
    observe("GET", STATUS_PATH, timer, resp)
}

/// GET /locks
pub async fn list(data: web::Data<AppState>) -> HttpResponse {
    let timer = Timer::new();
    let resp = match data.lock_manager.list_active().await {
        Ok(records) => HttpResponse::Ok().json(
            records
                .into_iter()
                .map(active_lock)
                .collect::<Vec<ActiveLock>>(),
        ),
        Err(e) => {
            warn!(error = %e, "Listing locks failed");
            http_error(&e)
        }
    };
    observe("GET", LOCKS_PATH, timer, resp)
}

/// GET /locks/settings
pub async fn settings(data: web::Data<AppState>) -> HttpResponse {
    let timer = Timer::new();
    observe(
        "GET",
        SETTINGS_PATH,
        timer,
        HttpResponse::Ok().json(data.settings_view()),
    )
}

/// GET /health
pub async fn health(data: web::Data<AppState>) -> HttpResponse {
    let store = data.lock_manager.store();
    let uptime_seconds = data.uptime_seconds();
    match store.health_check().await {
        Ok(()) => HttpResponse::Ok().json(HealthResponse {
            status: "UP".to_string(),
            store: store.backend().to_string(),
            uptime_seconds,
        }),
        Err(e) => {
            warn!(error = %e, path = HEALTH_PATH, "Lock store health check failed");
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: "DOWN".to_string(),
                store: store.backend().to_string(),
                uptime_seconds,
            })
        }
    }
}
