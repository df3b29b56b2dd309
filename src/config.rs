#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    net::IpAddr,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_GATEWAY_PORT: u16 = 8000;
pub const DEFAULT_GATEWAY_HOST: &str = "127.0.0.1";
pub const DEFAULT_YTDLP_PROGRAM: &str = "yt-dlp";

/// Process-wide settings, resolved once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Expected `X-API-Key` value. `None` leaves `/info` and `/extract` open.
    pub api_key: Option<String>,
    /// Cookie jar handed to yt-dlp when the file exists at request time.
    pub cookies_path: Option<PathBuf>,
    pub ytdlp_program: String,
    pub host: IpAddr,
    pub port: u16,
}

impl GatewayConfig {
    pub fn api_key_required(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub cookies_path: Option<PathBuf>,
    pub ytdlp_program: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_config(overrides: ConfigOverrides) -> Result<GatewayConfig> {
    let env_path = overrides
        .env_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(&env_path)?;
    build_config_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<GatewayConfig> {
    build_config_with_overrides(file_vars, env_lookup, ConfigOverrides::default())
}

fn build_config_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: ConfigOverrides,
) -> Result<GatewayConfig> {
    // Only an empty key disables auth; whitespace is part of the key.
    let api_key = non_empty(overrides.api_key)
        .or_else(|| lookup_value("API_KEY", file_vars, &env_lookup));
    let cookies_path = non_blank(
        overrides
            .cookies_path
            .map(|path| path.to_string_lossy().into_owned()),
    )
    .or_else(|| non_blank(lookup_value("COOKIES_PATH", file_vars, &env_lookup)))
    .map(PathBuf::from);
    let ytdlp_program = non_blank(overrides.ytdlp_program)
        .or_else(|| non_blank(lookup_value("YTDLP_BIN", file_vars, &env_lookup)))
        .unwrap_or_else(|| DEFAULT_YTDLP_PROGRAM.to_string());
    let port = overrides
        .port
        .or_else(|| {
            lookup_value("GATEWAY_PORT", file_vars, &env_lookup)
                .and_then(|value| value.trim().parse::<u16>().ok())
        })
        .unwrap_or(DEFAULT_GATEWAY_PORT);
    let host = non_blank(overrides.host)
        .or_else(|| non_blank(lookup_value("GATEWAY_HOST", file_vars, &env_lookup)))
        .unwrap_or_else(|| DEFAULT_GATEWAY_HOST.to_string());
    let host = parse_host(&host)?;

    Ok(GatewayConfig {
        api_key,
        cookies_path,
        ytdlp_program,
        host,
        port,
    })
}

pub fn parse_host(value: &str) -> Result<IpAddr> {
    value
        .trim()
        .parse::<IpAddr>()
        .with_context(|| format!("expected a valid IPv4 or IPv6 address, got {value:?}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn env_var_string(key: &str) -> Option<String> {
    non_empty(env::var(key).ok())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| non_empty(file_vars.get(key).cloned()))
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_env_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn config_from(contents: &str) -> GatewayConfig {
        let file = make_env_file(contents);
        let vars = read_env_file(file.path()).unwrap();
        build_config(&vars, |_| None).unwrap()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = build_config(&HashMap::new(), |_| None).unwrap();
        assert_eq!(config.api_key, None);
        assert_eq!(config.cookies_path, None);
        assert_eq!(config.ytdlp_program, DEFAULT_YTDLP_PROGRAM);
        assert_eq!(config.port, DEFAULT_GATEWAY_PORT);
        assert_eq!(config.host.to_string(), DEFAULT_GATEWAY_HOST);
        assert!(!config.api_key_required());
    }

    #[test]
    fn env_file_supplies_every_setting() {
        let config = config_from(
            "API_KEY=\"secret\"\nCOOKIES_PATH=\"/run/cookies.txt\"\nYTDLP_BIN=\"/opt/yt-dlp\"\nGATEWAY_HOST=\"0.0.0.0\"\nGATEWAY_PORT=\"9000\"\n",
        );
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.cookies_path, Some(PathBuf::from("/run/cookies.txt")));
        assert_eq!(config.ytdlp_program, "/opt/yt-dlp");
        assert_eq!(config.host.to_string(), "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert!(config.api_key_required());
    }

    #[test]
    fn empty_api_key_disables_auth() {
        let config = config_from("API_KEY=\"\"\nCOOKIES_PATH=\"  \"\n");
        assert_eq!(config.api_key, None);
        assert_eq!(config.cookies_path, None);
        assert!(!config.api_key_required());
    }

    #[test]
    fn whitespace_api_key_still_requires_auth() {
        let config = config_from("API_KEY=\"   \"\n");
        assert_eq!(config.api_key.as_deref(), Some("   "));
        assert!(config.api_key_required());

        let config = build_config(&HashMap::new(), |key| {
            (key == "API_KEY").then(|| " k ".to_string())
        })
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some(" k "));
    }

    #[test]
    fn env_wins_over_file() {
        let file = make_env_file("API_KEY=\"from-file\"\n");
        let vars = read_env_file(file.path()).unwrap();
        let config = build_config(&vars, |key| {
            if key == "API_KEY" {
                Some("from-env".to_string())
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn overrides_win_over_env_and_file() {
        let mut vars = HashMap::new();
        vars.insert("API_KEY".to_string(), "file-key".to_string());
        vars.insert("COOKIES_PATH".to_string(), "/file/cookies.txt".to_string());
        vars.insert("GATEWAY_PORT".to_string(), "7000".to_string());
        vars.insert("GATEWAY_HOST".to_string(), "10.0.0.1".to_string());

        let overrides = ConfigOverrides {
            api_key: Some("cli-key".into()),
            cookies_path: None,
            ytdlp_program: Some("/usr/local/bin/yt-dlp".into()),
            host: Some("::1".into()),
            port: Some(9100),
            env_path: None,
        };

        let config = build_config_with_overrides(
            &vars,
            |key| {
                if key == "COOKIES_PATH" {
                    Some("/env/cookies.txt".to_string())
                } else if key == "GATEWAY_PORT" {
                    Some("8100".to_string())
                } else {
                    None
                }
            },
            overrides,
        )
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("cli-key"));
        assert_eq!(config.cookies_path, Some(PathBuf::from("/env/cookies.txt")));
        assert_eq!(config.ytdlp_program, "/usr/local/bin/yt-dlp");
        assert_eq!(config.host.to_string(), "::1");
        assert_eq!(config.port, 9100);
    }

    #[test]
    fn blank_override_falls_through() {
        let config = build_config_with_overrides(
            &HashMap::new(),
            |key| (key == "API_KEY").then(|| "env-key".to_string()),
            ConfigOverrides {
                api_key: Some("".into()),
                host: Some("  ".into()),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.host.to_string(), DEFAULT_GATEWAY_HOST);
    }

    #[test]
    fn invalid_port_defaults() {
        let config = config_from("GATEWAY_PORT=\"nope\"\n");
        assert_eq!(config.port, DEFAULT_GATEWAY_PORT);
    }

    #[test]
    fn invalid_host_is_an_error() {
        let file = make_env_file("GATEWAY_HOST=\"not-an-ip\"\n");
        let vars = read_env_file(file.path()).unwrap();
        let err = build_config(&vars, |_| None).unwrap_err();
        assert!(err.to_string().contains("not-an-ip"));
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let file = make_env_file(
            r#"
            export API_KEY="k1"
            COOKIES_PATH='/c/cookies.txt'
            GATEWAY_HOST =  "0.0.0.0"
            GATEWAY_PORT=9090
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(file.path()).unwrap();
        assert_eq!(vars.get("API_KEY").unwrap(), "k1");
        assert_eq!(vars.get("COOKIES_PATH").unwrap(), "/c/cookies.txt");
        assert_eq!(vars.get("GATEWAY_HOST").unwrap(), "0.0.0.0");
        assert_eq!(vars.get("GATEWAY_PORT").unwrap(), "9090");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn read_env_file_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn resolve_config_reads_explicit_env_path() {
        let file = make_env_file("YTDLP_BIN=\"/srv/bin/yt-dlp\"\nGATEWAY_PORT=\"54321\"\n");
        let vars = read_env_file(file.path()).unwrap();
        let config = build_config_with_overrides(
            &vars,
            |_| None,
            ConfigOverrides {
                env_path: Some(file.path().to_path_buf()),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.ytdlp_program, "/srv/bin/yt-dlp");
        assert_eq!(config.port, 54321);

        let resolved = resolve_config(ConfigOverrides {
            env_path: Some(file.path().to_path_buf()),
            port: Some(1234),
            ..ConfigOverrides::default()
        })
        .unwrap();
        assert_eq!(resolved.port, 1234);
    }
}
