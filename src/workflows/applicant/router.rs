use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{EntryId, WizardId};
use super::engine::{TransitionError, WizardError};
use super::lookup::AddressLookup;
use super::notify::{Notifier, SUBMISSION_SUCCEEDED, VALIDATION_FAILED};
use super::service::{WizardService, WizardServiceError};
use super::views::SubmissionReceipt;

#[derive(Debug, Deserialize)]
pub struct FieldUpdate {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct RegulationUpdate {
    pub accepted: bool,
}

/// Router builder exposing the wizard over HTTP.
pub fn wizard_router<L, N>(service: Arc<WizardService<L, N>>) -> Router
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/v1/wizards", post(start_handler::<L, N>))
        .route("/api/v1/wizards/:wizard_id", get(view_handler::<L, N>))
        .route(
            "/api/v1/wizards/:wizard_id/fields",
            put(field_handler::<L, N>),
        )
        .route(
            "/api/v1/wizards/:wizard_id/regulation",
            put(regulation_handler::<L, N>),
        )
        .route(
            "/api/v1/wizards/:wizard_id/education",
            post(add_education_handler::<L, N>),
        )
        .route(
            "/api/v1/wizards/:wizard_id/education/:entry_id",
            put(education_field_handler::<L, N>).delete(remove_education_handler::<L, N>),
        )
        .route(
            "/api/v1/wizards/:wizard_id/address/lookup",
            post(lookup_handler::<L, N>),
        )
        .route(
            "/api/v1/wizards/:wizard_id/advance",
            post(advance_handler::<L, N>),
        )
        .route(
            "/api/v1/wizards/:wizard_id/retreat",
            post(retreat_handler::<L, N>),
        )
        .route(
            "/api/v1/wizards/:wizard_id/submit",
            post(submit_handler::<L, N>),
        )
        .with_state(service)
}

pub(crate) async fn start_handler<L, N>(
    State(service): State<Arc<WizardService<L, N>>>,
) -> Response
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    let view = service.start();
    (StatusCode::CREATED, axum::Json(view)).into_response()
}

pub(crate) async fn view_handler<L, N>(
    State(service): State<Arc<WizardService<L, N>>>,
    Path(wizard_id): Path<String>,
) -> Response
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    match service.view(&WizardId(wizard_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn field_handler<L, N>(
    State(service): State<Arc<WizardService<L, N>>>,
    Path(wizard_id): Path<String>,
    axum::Json(update): axum::Json<FieldUpdate>,
) -> Response
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    match service.set_field(&WizardId(wizard_id), &update.field, update.value) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn regulation_handler<L, N>(
    State(service): State<Arc<WizardService<L, N>>>,
    Path(wizard_id): Path<String>,
    axum::Json(update): axum::Json<RegulationUpdate>,
) -> Response
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    match service.set_accepted_regulation(&WizardId(wizard_id), update.accepted) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn add_education_handler<L, N>(
    State(service): State<Arc<WizardService<L, N>>>,
    Path(wizard_id): Path<String>,
) -> Response
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    match service.add_education(&WizardId(wizard_id)) {
        Ok(entry_id) => {
            let payload = json!({ "entry_id": entry_id.to_string() });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn education_field_handler<L, N>(
    State(service): State<Arc<WizardService<L, N>>>,
    Path((wizard_id, entry_id)): Path<(String, String)>,
    axum::Json(update): axum::Json<FieldUpdate>,
) -> Response
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    let entry: EntryId = match entry_id.parse() {
        Ok(entry) => entry,
        Err(error) => return error_response(WizardError::from(error).into()),
    };
    match service.set_education_field(&WizardId(wizard_id), entry, &update.field, &update.value) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn remove_education_handler<L, N>(
    State(service): State<Arc<WizardService<L, N>>>,
    Path((wizard_id, entry_id)): Path<(String, String)>,
) -> Response
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    let entry: EntryId = match entry_id.parse() {
        Ok(entry) => entry,
        Err(error) => return error_response(WizardError::from(error).into()),
    };
    match service.remove_education(&WizardId(wizard_id), entry) {
        Ok(removed) => (StatusCode::OK, axum::Json(json!({ "removed": removed }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn lookup_handler<L, N>(
    State(service): State<Arc<WizardService<L, N>>>,
    Path(wizard_id): Path<String>,
) -> Response
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    match service.lookup_address(&WizardId(wizard_id)).await {
        Ok((outcome, view)) => {
            let payload = json!({
                "lookup": outcome,
                "wizard": view,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn advance_handler<L, N>(
    State(service): State<Arc<WizardService<L, N>>>,
    Path(wizard_id): Path<String>,
) -> Response
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    match service.advance(&WizardId(wizard_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn retreat_handler<L, N>(
    State(service): State<Arc<WizardService<L, N>>>,
    Path(wizard_id): Path<String>,
) -> Response
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    match service.retreat(&WizardId(wizard_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<L, N>(
    State(service): State<Arc<WizardService<L, N>>>,
    Path(wizard_id): Path<String>,
) -> Response
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    let id = WizardId(wizard_id);
    match service.submit(&id) {
        Ok(record) => {
            let receipt = SubmissionReceipt::new(id, &record);
            let payload = json!({
                "message": SUBMISSION_SUCCEEDED,
                "receipt": receipt,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: WizardServiceError) -> Response {
    match error {
        WizardServiceError::NotFound(id) => {
            let payload = json!({
                "error": format!("wizard {id} not found"),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        WizardServiceError::Transition(TransitionError::Invalid { step, errors }) => {
            let payload = json!({
                "error": VALIDATION_FAILED,
                "step": step,
                "errors": errors,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        WizardServiceError::Wizard(WizardError::FieldLocked(field)) => {
            let payload = json!({
                "error": format!("field {} is locked", field.path()),
                "field": field.path(),
            });
            (StatusCode::LOCKED, axum::Json(payload)).into_response()
        }
        WizardServiceError::Wizard(WizardError::EntryNotFound(entry)) => {
            let payload = json!({
                "error": format!("education entry {entry} not found"),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        WizardServiceError::Wizard(WizardError::AlreadySubmitted)
        | WizardServiceError::Transition(TransitionError::AlreadySubmitted) => {
            let payload = json!({
                "error": "wizard already submitted",
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        other => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
    }
}
