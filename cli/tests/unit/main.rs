//! Unit tests for the bootchain CLI
//!
//! These tests use an in-memory store and mocked launchers and run fast
//! without external I/O.

mod commands;
mod deploy_service;
mod graph_properties;
mod mocks;
mod status_stop_services;
