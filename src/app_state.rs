use std::sync::Arc;

use crate::config::Config;
use crate::utils::notification::NotificationCenter;
use crate::workflow::service::ClearanceService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ClearanceService>,
    pub notifications: Arc<NotificationCenter>,
    pub config: Arc<Config>,
}
