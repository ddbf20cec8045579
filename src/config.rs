use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

pub const DEFAULT_I2C_BUS: &str = "/dev/i2c-0";
pub const DEFAULT_I2C_ADDRESS: u8 = 0x3f;
pub const DEFAULT_INTERFACE: &str = "eth0";
pub const DEFAULT_PING_TARGET: &str = "8.8.8.8";

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    /// panel geometry & wiring
    pub display: Option<DisplayConfig>,
    /// what the status loop shows and how often
    pub status: Option<StatusConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub backlight: Option<bool>,
    pub transport: Option<TransportKind>, // <- raw writes or SMBus blocks
    pub bus: Option<BusConfig>,
}

impl DisplayConfig {
    pub fn width(&self) -> u32 { self.width.unwrap_or(16) }
    pub fn height(&self) -> u32 { self.height.unwrap_or(2) }
    pub fn backlight(&self) -> bool { self.backlight.unwrap_or(true) }
    pub fn transport_kind(&self) -> TransportKind { self.transport.unwrap_or_default() }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub bus: String,        // e.g. "/dev/i2c-1"
    pub address: u8,        // e.g. 0x3F (7-bit)
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { bus: DEFAULT_I2C_BUS.to_string(), address: DEFAULT_I2C_ADDRESS }
    }
}

/// How port bytes reach the backpack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// one write(2) per port byte
    Raw,
    /// SMBus block writes, 32 bytes at a time
    #[default]
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatusConfig {
    pub interface: Option<String>,
    pub ping_target: Option<String>,
    pub switch_delay_secs: Option<u64>,
    /// present => show the clock page, shifted by this many hours
    pub time_offset_hours: Option<i32>,
}

impl StatusConfig {
    pub fn interface(&self) -> &str { self.interface.as_deref().unwrap_or(DEFAULT_INTERFACE) }
    pub fn ping_target(&self) -> &str { self.ping_target.as_deref().unwrap_or(DEFAULT_PING_TARGET) }
    pub fn switch_delay_secs(&self) -> u64 { self.switch_delay_secs.unwrap_or(1) }
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "netlcd", version, about = "Network status on an I2C character LCD")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Enable debug log level
    #[arg(short = 'v', long = "debug", alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    /// I2C bus device (default /dev/i2c-0)
    #[arg(short = 'D', long = "device", value_hint = ValueHint::FilePath)]
    pub device: Option<String>,
    /// I2C chip address in hex (default 3f)
    #[arg(short = 'a', long = "address", value_parser = parse_address)]
    pub address: Option<u8>,
    /// LCD width in characters (default 16)
    #[arg(short = 'w', long)]
    pub width: Option<u32>,
    /// LCD height in lines (default 2)
    #[arg(short = 'H', long)]
    pub height: Option<u32>,
    #[arg(long, action = ArgAction::Set)]
    pub backlight: Option<bool>,
    #[arg(long, value_enum)]
    pub transport: Option<TransportKind>,
    /// Network interface to report (default eth0)
    #[arg(short = 'i', long)]
    pub interface: Option<String>,
    #[arg(long)]
    pub ping_target: Option<String>,
    /// Show the current time too, shifted by this many hours
    #[arg(short = 't', long = "time-offset", allow_hyphen_values = true)]
    pub time_offset: Option<i32>,
    /// Seconds between page switches (default 1)
    #[arg(short = 'd', long = "delay")]
    pub delay: Option<u64>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Hex chip address, with or without a 0x prefix.
pub fn parse_address(s: &str) -> Result<u8, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    let value = u8::from_str_radix(digits, 16)
        .map_err(|e| format!("invalid I2C address '{}': {}", s, e))?;
    if value > 0x7f {
        return Err(format!("I2C address 0x{:02x} is not a 7-bit address", value));
    }
    Ok(value)
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    let cfg = load_from(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Layer defaults, YAML and the given CLI, then validate.
pub fn load_from(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/netlcd/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/netlcd/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/netlcd.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["netlcd.yaml", "config/netlcd.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    // top-level
    if src.log_level.is_some()      { dst.log_level = src.log_level; }
    // display
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => merge_display(d, s),
        _ => {}
    }
    // status
    match (&mut dst.status, src.status) {
        (None, Some(c)) => dst.status = Some(c),
        (Some(d), Some(s)) => merge_status(d, s),
        _ => {}
    }
}

fn merge_display(dst: &mut DisplayConfig, src: DisplayConfig) {
    if src.width.is_some()       { dst.width = src.width; }
    if src.height.is_some()      { dst.height = src.height; }
    if src.backlight.is_some()   { dst.backlight = src.backlight; }
    if src.transport.is_some()   { dst.transport = src.transport; }
    if src.bus.is_some()         { dst.bus = src.bus; }
}

fn merge_status(dst: &mut StatusConfig, src: StatusConfig) {
    if src.interface.is_some()         { dst.interface = src.interface; }
    if src.ping_target.is_some()       { dst.ping_target = src.ping_target; }
    if src.switch_delay_secs.is_some() { dst.switch_delay_secs = src.switch_delay_secs; }
    if src.time_offset_hours.is_some() { dst.time_offset_hours = src.time_offset_hours; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()       { cfg.log_level = cli.log_level.clone(); }
    if cli.debug                     { cfg.log_level = Some("debug".to_string()); }

    let display = cfg.display.get_or_insert_with(DisplayConfig::default);
    if cli.width.is_some()       { display.width = cli.width; }
    if cli.height.is_some()      { display.height = cli.height; }
    if cli.backlight.is_some()   { display.backlight = cli.backlight; }
    if cli.transport.is_some()   { display.transport = cli.transport; }
    if cli.device.is_some() || cli.address.is_some() {
        let bus = display.bus.get_or_insert_with(BusConfig::default);
        if let Some(device) = cli.device.as_ref() { bus.bus = device.to_ascii_lowercase(); }
        if let Some(address) = cli.address       { bus.address = address; }
    }

    let status = cfg.status.get_or_insert_with(StatusConfig::default);
    if cli.interface.is_some()   { status.interface = cli.interface.clone(); }
    if cli.ping_target.is_some() { status.ping_target = cli.ping_target.clone(); }
    if cli.delay.is_some()       { status.switch_delay_secs = cli.delay; }
    if cli.time_offset.is_some() { status.time_offset_hours = cli.time_offset; }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(display) = cfg.display.as_ref() {
        if !(1..=40).contains(&display.width()) {
            return Err(ConfigError::Validation("display width must be 1..=40".into()));
        }
        match display.height() {
            1 | 2 | 4 => {},
            _ => return Err(ConfigError::Validation("display height must be 1|2|4".into()))
        }
        if let Some(bus) = display.bus.as_ref() {
            if bus.address > 0x7f {
                return Err(ConfigError::Validation("I2C address must be 7-bit".into()));
            }
            if bus.bus.is_empty() {
                return Err(ConfigError::Validation("I2C bus path must not be empty".into()));
            }
        }
    }
    if let Some(status) = cfg.status.as_ref() {
        if status.switch_delay_secs() == 0 {
            return Err(ConfigError::Validation("status switch_delay_secs must be > 0".into()));
        }
        if let Some(offset) = status.time_offset_hours {
            if !(-24..=24).contains(&offset) {
                return Err(ConfigError::Validation("time offset must be within ±24 hours".into()));
            }
        }
    }
    Ok(())
}
