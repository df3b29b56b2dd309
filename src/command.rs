#![forbid(unsafe_code)]

//! Argument vectors for the yt-dlp invocations the gateway performs.
//!
//! Every value is kept as its own element and handed to the process
//! directly, so URLs never pass through a shell.

use std::path::{Path, PathBuf};

use crate::config::GatewayConfig;

pub const NO_PLAYLIST_FLAG: &str = "--no-playlist";
pub const COOKIES_FLAG: &str = "--cookies";
pub const DUMP_JSON_FLAG: &str = "-J";
pub const GET_URL_FLAG: &str = "-g";
pub const FORMAT_FLAG: &str = "-f";
pub const DEFAULT_FORMAT: &str = "best";

#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: String,
    cookies_path: Option<PathBuf>,
}

impl CommandBuilder {
    pub fn new(program: impl Into<String>, cookies_path: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cookies_path: cookies_path.filter(|path| !path.as_os_str().is_empty()),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.ytdlp_program.clone(), config.cookies_path.clone())
    }

    /// Returns the cookie jar path only when the file is on disk right now.
    /// Checked on every call so a jar dropped in or removed while the
    /// service runs is picked up by the next request.
    pub fn active_cookies(&self) -> Option<&Path> {
        self.cookies_path
            .as_deref()
            .filter(|path| path.exists())
    }

    pub fn cookies_file_present(&self) -> bool {
        self.active_cookies().is_some()
    }

    pub fn base_args(&self) -> Vec<String> {
        let mut args = vec![self.program.clone(), NO_PLAYLIST_FLAG.to_string()];
        if let Some(cookies) = self.active_cookies() {
            args.push(COOKIES_FLAG.to_string());
            args.push(cookies.to_string_lossy().into_owned());
        }
        args
    }

    /// `yt-dlp --no-playlist [--cookies P] -J <url>`
    pub fn info_args(&self, url: &str) -> Vec<String> {
        let mut args = self.base_args();
        args.push(DUMP_JSON_FLAG.to_string());
        args.push(url.to_string());
        args
    }

    /// `yt-dlp --no-playlist [--cookies P] -g -f <format> <url>`
    pub fn extract_args(&self, url: &str, format: Option<&str>) -> Vec<String> {
        let mut args = self.base_args();
        args.push(GET_URL_FLAG.to_string());
        args.push(FORMAT_FLAG.to_string());
        args.push(format_selector(format).to_string());
        args.push(url.to_string());
        args
    }
}

/// Falls back to `best` when the caller left the format out or blank.
pub fn format_selector(format: Option<&str>) -> &str {
    match format.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => DEFAULT_FORMAT,
    }
}
