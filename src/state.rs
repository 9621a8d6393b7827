//! Shared application state handed to every handler.

use crate::services::{
    admin_service::AdminService, backends::AssetBackend, record_assembler::RecordAssembler,
};
use std::sync::Arc;

/// Everything the HTTP layer needs, constructed once at startup.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn AssetBackend>,
    pub assembler: RecordAssembler,
    pub admin: AdminService,
    /// Bearer token for `/api/v1/admin`. `None` disables the admin surface.
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(assembler: RecordAssembler, admin_token: Option<String>) -> Self {
        Self {
            backend: assembler.backend().clone(),
            admin: AdminService::new(assembler.clone()),
            assembler,
            admin_token: admin_token.map(Arc::from),
        }
    }
}
