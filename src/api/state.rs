use std::sync::Arc;
use crate::{
    config::Settings,
    service::ServiceContext,
};

#[derive(Clone)]
pub struct AppState {
    pub service_context: Arc<ServiceContext>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        service_context: Arc<ServiceContext>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            service_context,
            settings,
        }
    }
}
