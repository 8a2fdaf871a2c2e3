//! HTTP layer: JWT auth, routes, and the websocket price stream.

pub mod auth;
pub mod routes;
pub mod ws;
