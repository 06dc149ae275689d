//! End-to-end tests across config, app, and the fake engine.
//!
//! Everything except the real session runner: scenario files are loaded from
//! disk, resolved, run, rendered, and exported.

mod demo_config;
mod pipeline;
