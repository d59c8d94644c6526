//! Node configuration: optional TOML file, environment overrides, validation.
//!
//! Resolution order (later wins):
//!
//! 1. built-in defaults
//! 2. `CONFIG_PATH` (default `node.toml`), skipped when the file is absent
//! 3. `NODE_ID`, `MQTT_HOST`, `MQTT_PORT`, `MQTT_USER`, `MQTT_PASSWORD`,
//!    `TICK_MS`, `NODE_FEATURES`
//!
//! The resulting value, including [`FeatureFlags`], is immutable for the
//! lifetime of the process.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Highest single-ended ADS1115 input index.
const MAX_ADC_CHANNEL: u8 = 3;

// ---------------------------------------------------------------------------
// Config structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub node_id: String,
    pub mqtt: MqttSection,
    pub timing: TimingSection,
    pub features: FeatureFlags,
    pub hardware: HardwareSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MqttSection {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    /// Capacity of the outgoing request queue. A full queue fails the
    /// publish instead of blocking the tick.
    pub queue_capacity: usize,
    /// Delay before the transport retries a lost session on its own.
    pub reconnect_secs: u64,
    /// `host:port` probed for network reachability. Defaults to the broker.
    pub probe_addr: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingSection {
    pub tick_ms: u64,
    /// Upper bound for one tag-reader poll. Must stay below `tick_ms`.
    pub tag_timeout_ms: u64,
    pub probe_interval_ms: u64,
    pub probe_timeout_ms: u64,
}

/// One switch per optional subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureFlags {
    pub pulse: bool,
    pub tag: bool,
    pub level: bool,
    pub display: bool,
    pub digital_output: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HardwareSection {
    /// BCM pin driving the status output.
    pub output_pin: u8,
    pub adc_address: u16,
    pub adc_channel: u8,
    /// I2C bus carrying the RGB LCD.
    pub lcd_bus: u8,
    /// Activity level of the simulated drivers: "quiet" or "busy".
    pub sim_profile: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "node-1".to_string(),
            mqtt: MqttSection::default(),
            timing: TimingSection::default(),
            features: FeatureFlags::default(),
            hardware: HardwareSection::default(),
        }
    }
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            username: None,
            password: None,
            keep_alive_secs: 30,
            queue_capacity: 10,
            reconnect_secs: 5,
            probe_addr: None,
        }
    }
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            tick_ms: 200,
            tag_timeout_ms: 50,
            probe_interval_ms: 2000,
            probe_timeout_ms: 1000,
        }
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        // Pulse and tag polling together degrade pulse responsiveness, so the
        // tag reader is opt-in.
        Self {
            pulse: true,
            tag: false,
            level: true,
            display: true,
            digital_output: true,
            verbose: false,
        }
    }
}

impl Default for HardwareSection {
    fn default() -> Self {
        Self {
            output_pin: 16,
            adc_address: 0x48,
            adc_channel: 0,
            lcd_bus: 1,
            sim_profile: "quiet".into(),
        }
    }
}

impl MqttSection {
    pub fn reconnect(&self) -> Duration {
        Duration::from_secs(self.reconnect_secs)
    }
}

impl TimingSection {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn tag_timeout(&self) -> Duration {
        Duration::from_millis(self.tag_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl FeatureFlags {
    /// Parse a comma-separated list of enabled features, e.g.
    /// `"pulse,level,display"`. Everything not listed is off.
    pub fn parse_list(list: &str) -> Result<Self> {
        let mut flags = Self {
            pulse: false,
            tag: false,
            level: false,
            display: false,
            digital_output: false,
            verbose: false,
        };

        for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token {
                "pulse" | "ir" => flags.pulse = true,
                "tag" | "nfc" => flags.tag = true,
                "level" | "sound" => flags.level = true,
                "display" | "lcd" => flags.display = true,
                "digital_output" | "led" => flags.digital_output = true,
                "verbose" | "debug" => flags.verbose = true,
                other => bail!("unknown feature in NODE_FEATURES: {other:?}"),
            }
        }

        Ok(flags)
    }

    /// Names of the enabled features, for the startup log.
    pub fn enabled(&self) -> Vec<&'static str> {
        [
            (self.pulse, "pulse"),
            (self.tag, "tag"),
            (self.level, "level"),
            (self.display, "display"),
            (self.digital_output, "digital_output"),
            (self.verbose, "verbose"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

impl NodeConfig {
    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("NODE_ID") {
            self.node_id = v;
        }
        if let Some(v) = lookup("MQTT_HOST") {
            self.mqtt.host = v;
        }
        if let Some(v) = lookup("MQTT_PORT") {
            self.mqtt.port = v
                .trim()
                .parse()
                .with_context(|| format!("invalid MQTT_PORT: {v:?}"))?;
        }
        if let Some(v) = lookup("MQTT_USER") {
            self.mqtt.username = Some(v);
        }
        if let Some(v) = lookup("MQTT_PASSWORD") {
            self.mqtt.password = Some(v);
        }
        if let Some(v) = lookup("TICK_MS") {
            self.timing.tick_ms = v
                .trim()
                .parse()
                .with_context(|| format!("invalid TICK_MS: {v:?}"))?;
        }
        if let Some(v) = lookup("NODE_FEATURES") {
            self.features = FeatureFlags::parse_list(&v)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl NodeConfig {
    /// Validate every field. Reports all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // ── Identity ────────────────────────────────────────────
        if self.node_id.trim().is_empty() {
            errors.push("node_id is empty".to_string());
        } else if self.node_id.contains(['/', '+', '#']) {
            errors.push(format!(
                "node_id {:?} must not contain '/', '+' or '#'",
                self.node_id
            ));
        }

        // ── Broker ──────────────────────────────────────────────
        if self.mqtt.host.trim().is_empty() {
            errors.push("mqtt.host is empty".to_string());
        }
        if self.mqtt.port == 0 {
            errors.push("mqtt.port must be non-zero".to_string());
        }
        if self.mqtt.queue_capacity == 0 {
            errors.push("mqtt.queue_capacity must be non-zero".to_string());
        }
        if self.mqtt.reconnect_secs == 0 {
            errors.push("mqtt.reconnect_secs must be positive".to_string());
        }
        if let Some(addr) = &self.mqtt.probe_addr {
            if !addr.contains(':') {
                errors.push(format!("mqtt.probe_addr {addr:?} must be host:port"));
            }
        }
        if self.mqtt.username.is_some() != self.mqtt.password.is_some() {
            errors.push("mqtt.username and mqtt.password must be set together".to_string());
        }

        // ── Timing ──────────────────────────────────────────────
        let t = &self.timing;
        if t.tick_ms == 0 {
            errors.push("timing.tick_ms must be positive".to_string());
        }
        if t.tag_timeout_ms == 0 {
            errors.push("timing.tag_timeout_ms must be positive".to_string());
        } else if t.tag_timeout_ms >= t.tick_ms {
            errors.push(format!(
                "timing.tag_timeout_ms ({}) must be below timing.tick_ms ({})",
                t.tag_timeout_ms, t.tick_ms
            ));
        }
        if t.probe_interval_ms == 0 {
            errors.push("timing.probe_interval_ms must be positive".to_string());
        }
        if t.probe_timeout_ms == 0 {
            errors.push("timing.probe_timeout_ms must be positive".to_string());
        }

        // ── Hardware ────────────────────────────────────────────
        if self.hardware.adc_channel > MAX_ADC_CHANNEL {
            errors.push(format!(
                "hardware.adc_channel {} out of range (0-{MAX_ADC_CHANNEL})",
                self.hardware.adc_channel
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    /// `host:port` of the broker.
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.mqtt.host, self.mqtt.port)
    }

    /// Target of the reachability probe: `mqtt.probe_addr`, else the broker.
    pub fn probe_addr(&self) -> String {
        self.mqtt
            .probe_addr
            .clone()
            .unwrap_or_else(|| self.broker_addr())
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

pub fn parse(contents: &str) -> Result<NodeConfig> {
    toml::from_str(contents).context("failed to parse config")
}

/// Read `path` (if present), apply environment overrides, validate.
pub fn load(path: &str) -> Result<NodeConfig> {
    let mut config = if Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;
        parse(&contents).with_context(|| format!("in {path}"))?
    } else {
        tracing::info!(path, "no config file, using defaults");
        NodeConfig::default()
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
