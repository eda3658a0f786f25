// handlers/mod.rs - three access tiers
//
// Public (no token) -> Protected (any valid token) -> Elevated (admin token).
// Handlers stay thin: extract, call one service, wrap the result in the envelope.

pub mod elevated;
pub mod protected;
pub mod public;
