// Application layer - fetch cycles, background worker and chart sessions
pub mod data_server;
pub mod errors;
pub mod fetch_coordinator;
pub mod renderer;
pub mod session;
pub mod worker;
