//! Application-level orchestration.
//!
//! This module owns the session lifecycle (generate, deploy, status polling,
//! cleanup). UI/CLI layers send commands into it and render the events it emits,
//! which keeps the state machine independent of any presentation.

mod controller;
mod poller;

pub(crate) use controller::{run_controller, Controller, UiCommand};
