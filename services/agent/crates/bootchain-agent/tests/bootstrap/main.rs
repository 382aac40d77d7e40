//! Bootstrap scenarios for several agents sharing one in-memory store.
//!
//! Every agent runs in the test task with fake processes, so these tests are
//! fast and need no Valkey.

mod fakes;
mod scenarios;
