pub mod apis;
pub mod auth_strategies;
pub mod catalog_services;
pub mod common;
pub mod control_planes;
pub mod diff;
pub mod event_gateways;
pub mod gateway_services;
pub mod orchestrator;
pub mod portals;
pub mod protection;
pub mod types;
