#![forbid(unsafe_code)]

//! HTTP gateway in front of `yt-dlp`: metadata lookup and direct URL
//! resolution, with optional API-key auth and cookie-jar injection.

pub mod api;
pub mod command;
pub mod config;
pub mod error;
pub mod runner;
pub mod security;
