//! End-to-end tests against a deterministic in-memory gateway.

mod mock_gateway;
mod scenarios;
