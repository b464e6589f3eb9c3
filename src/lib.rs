#![allow(clippy::new_without_default)]

pub mod api;
pub mod cache;
pub mod config;
pub mod health;
pub mod logger;
pub mod messaging;
pub mod nuki;
pub mod pending;
pub mod poller;
pub mod reservations;
pub mod telegram;
