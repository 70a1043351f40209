// handlers/mod.rs - Handler tiers
//
// Public (no auth) and protected (bearer token forwarded to the backends).
pub mod public;
pub mod protected;
