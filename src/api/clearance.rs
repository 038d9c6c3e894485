use axum::{
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;
use crate::db::queries::clearance::*;

pub fn clearance_routes() -> Router<AppState> {
    Router::new()
        .route("/clearance/submit-request", post(submit_request))
        .route("/clearance/requests", get(list_requests))
        .route("/clearance/requests/{id}", get(get_request))
        .route("/clearance/requests/{id}/approve", post(approve_request))
        .route("/clearance/requests/{id}/reject", post(reject_request))
        .route("/clearance/requests/{id}/request-info", post(request_info))
        .route("/clearance/requests/{id}/undo-rejection", post(undo_rejection))
        .route("/clearance/requests/{id}/provide-info", post(provide_info))
        .route("/clearance/summary", get(get_summary))
        .route("/clearance/workflow", get(get_workflow))
        .route("/clearance/workflows", get(list_workflows))
        .route("/clearance/termination-reasons", get(termination_reasons))
        .route("/clearance/id-replacement-reasons", get(id_replacement_reasons))
}
