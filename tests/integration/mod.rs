//! Integration test suite for shoal.
//!
//! These tests run build targets end to end against temporary projects and
//! verify that the scheduler, pipeline steps, watch mode and motion model
//! work together correctly.
//!
//! # Test Categories
//!
//! - `build_pipeline`: Full and partial builds, incremental assets, failures
//! - `lint_modes`: Development versus production lint behaviour
//! - `watch_reload`: Group rebuilds, the file watcher and live reload
//! - `motion`: Headless runs of the fish scene
//!
//! # CI Compatibility
//!
//! A fake toolchain replaces pug, sass, esbuild and the linters, so no
//! Node.js install is needed.

mod fixtures;

mod build_pipeline;
mod lint_modes;
mod watch_reload;
mod motion;
