#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod config;
pub mod error;
pub mod event;
pub mod host;
pub mod obs;
pub mod plugin;
pub mod router;
pub mod state;
