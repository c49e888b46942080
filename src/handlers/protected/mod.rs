// handlers/protected/mod.rs - Handlers that require a token
//
// Every handler here takes an `AuthUser`, so a missing or invalid token is
// rejected with 401 before the body is read.

pub mod account;
pub mod payment;
