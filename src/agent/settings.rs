use anyhow::{anyhow, bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::DEFAULT_COMPOSE_FILE;

pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub compose_files: Vec<String>,
    pub interval: String,
    pub webhook: Option<String>,
    pub name: String,
    pub log_level: String,
    pub registry: RegistrySettings,
    pub docker: DockerSettings,
    pub compose: ComposeSettings,
    pub error_report: ErrorReportSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            compose_files: vec![DEFAULT_COMPOSE_FILE.to_string()],
            interval: "15s".to_string(),
            webhook: None,
            name: "default".to_string(),
            log_level: "info".to_string(),
            registry: RegistrySettings::default(),
            docker: DockerSettings::default(),
            compose: ComposeSettings::default(),
            error_report: ErrorReportSettings::default(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for RegistrySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrySettings")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RegistrySettings {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerSettings {
    /// Engine socket; the local default is used when unset
    pub socket: Option<String>,
    pub timeout_secs: u64,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            socket: None,
            timeout_secs: 300,
        }
    }
}

impl DockerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeSettings {
    /// Program and leading arguments of the compose tool
    pub command: Vec<String>,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            command: vec!["docker".to_string(), "compose".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorReportSettings {
    pub url: Option<String>,
    pub token: Option<String>,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.compose_files.is_empty() {
            bail!("at least one compose file must be given");
        }

        let interval = self.interval()?;
        if interval.is_zero() {
            bail!("interval must be greater than 0");
        }

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            bail!(
                "log_level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.log_level
            );
        }

        if self.name.trim().is_empty() {
            bail!("name must not be empty");
        }

        if let Some(url) = &self.webhook {
            check_http_url("webhook", url)?;
        }
        if let Some(url) = &self.error_report.url {
            check_http_url("error_report.url", url)?;
        }

        if self.registry.username.is_some() != self.registry.password.is_some() {
            bail!("registry username and password must be given together");
        }

        if self.docker.timeout_secs == 0 {
            bail!("docker.timeout_secs must be greater than 0");
        }

        if self.compose.command.is_empty() {
            bail!("compose.command must name a program");
        }

        Ok(())
    }

    pub fn interval(&self) -> Result<Duration> {
        parse_duration(&self.interval)
    }

    pub fn compose_paths(&self) -> Vec<PathBuf> {
        self.compose_files.iter().map(PathBuf::from).collect()
    }

    pub fn apply_cli_overrides(&mut self, matches: &ArgMatches) {
        if let Some(files) = matches.get_many::<String>("file") {
            self.compose_files = files.cloned().collect();
        }

        if let Some(interval) = matches.get_one::<String>("interval") {
            self.interval = interval.clone();
        }

        if let Some(webhook) = matches.get_one::<String>("webhook") {
            self.webhook = Some(webhook.clone());
        }

        if let Some(name) = matches.get_one::<String>("name") {
            self.name = name.clone();
        }

        if let Some(username) = matches.get_one::<String>("username") {
            self.registry.username = Some(username.clone());
        }

        if let Some(password) = matches.get_one::<String>("password") {
            self.registry.password = Some(password.clone());
        }

        if let Some(log_level) = matches.get_one::<String>("log-level") {
            self.log_level = log_level.clone();
        }
    }
}

fn check_http_url(field: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("{field} must be an http(s) URL, got {url:?}"))
    }
}

/// Parse `500ms`, `15s`, `1m30s`, `2h`, or a bare number of seconds
pub fn parse_duration(input: &str) -> Result<Duration> {
    let text = input.trim();
    if text.is_empty() {
        bail!("empty duration");
    }
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            bail!("invalid duration {input:?}: expected a number before {rest:?}");
        }
        let value: u64 = rest[..digits]
            .parse()
            .with_context(|| format!("invalid duration {input:?}"))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            "" => bail!("invalid duration {input:?}: missing unit after {value}"),
            other => bail!("invalid duration {input:?}: unknown unit {other:?}"),
        };
        total = total
            .checked_add(part)
            .ok_or_else(|| anyhow!("invalid duration {input:?}: too large"))?;
    }

    Ok(total)
}

/// Command-line interface of the agent
pub fn command() -> Command {
    Command::new("fastdeploy")
        .version(crate::RELEASE)
        .about("Restarts docker compose services when their images change upstream")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("PATH")
                .help("Compose file to watch (repeatable, default docker-compose.yml)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .value_name("DURATION")
                .help("Time between checks, e.g. 15s or 1m30s"),
        )
        .arg(
            Arg::new("webhook")
                .short('w')
                .long("webhook")
                .value_name("URL")
                .help("Webhook notified after a deployment"),
        )
        .arg(
            Arg::new("name")
                .short('n')
                .long("name")
                .value_name("NAME")
                .help("Deployment name used in notifications"),
        )
        .arg(
            Arg::new("username")
                .short('u')
                .long("username")
                .value_name("USER")
                .help("Registry username"),
        )
        .arg(
            Arg::new("password")
                .short('p')
                .long("password")
                .value_name("PASSWORD")
                .help("Registry password"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(LOG_LEVELS)
                .help("Log level"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML settings file"),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .action(ArgAction::SetTrue)
                .help("Run a single cycle and exit"),
        )
        .arg(
            Arg::new("sample-config")
                .long("sample-config")
                .value_name("PATH")
                .help("Write a default settings file and exit"),
        )
}

/// Defaults, then the optional TOML file, then `FASTDEPLOY_*` variables
pub fn load(config_path: Option<&str>) -> Result<Settings> {
    let mut builder = config::Config::builder().add_source(
        config::Config::try_from(&Settings::default()).context("Failed to encode defaults")?,
    );

    if let Some(path) = config_path {
        builder = builder
            .add_source(config::File::new(path, config::FileFormat::Toml).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("FASTDEPLOY")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("compose_files")
            .with_list_parse_key("compose.command")
            .try_parsing(true),
    );

    builder
        .build()
        .context("Failed to read settings")?
        .try_deserialize()
        .context("Failed to parse settings")
}

/// Load configuration: CLI args > env vars > config file > defaults
pub fn load_settings(matches: &ArgMatches) -> Result<Settings> {
    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut settings = load(config_path)?;
    settings.apply_cli_overrides(matches);

    settings
        .validate()
        .context("Configuration validation failed")?;

    Ok(settings)
}

/// Create a sample configuration file
pub fn create_sample_config(path: &str) -> Result<()> {
    let settings = Settings::default();
    let toml_content =
        toml::to_string_pretty(&settings).context("Failed to serialize default settings")?;

    fs::write(path, toml_content)
        .with_context(|| format!("Failed to write sample settings to: {path}"))?;

    println!("Sample settings written to: {path}");
    Ok(())
}
