//! Integration tests for the toolchain pipeline.
//!
//! These run the full orchestrator against a scripted in-process backend,
//! no network required.
