pub mod admin_service;
pub mod backends;
pub mod bucket_import;
pub mod database_overlay;
pub mod metadata_extractor;
pub mod naming;
pub mod record_assembler;
