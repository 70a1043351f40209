// Protected handlers. Every route here runs behind forward_auth_middleware,
// which injects the RequestContext extension.
pub mod commission;
