pub mod backend;
pub mod commission_service;
pub mod http_backend;
pub mod memory_backend;

pub use backend::{
    BackendError, Backends, CommissionFields, CommissionSelector, CommissionStore,
    CommissionSync, PartnerDirectory,
};
pub use commission_service::{CommissionPage, CommissionService, ReconcileError};
pub use http_backend::HttpBackend;
pub use memory_backend::{BackendCall, MemoryBackend};
