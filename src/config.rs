use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use cross_xdg::BaseDirs;

use crate::machine::IoPolicy;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "BFVM_CONFIG";
/// Environment fallback for `--delay`.
pub const DELAY_ENV: &str = "BFVM_DELAY_MS";
/// Environment fallback for `--io-policy`.
pub const IO_POLICY_ENV: &str = "BFVM_IO_POLICY";

/// How the CLI wires up and paces a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Pause between steps; `None` runs flat out.
    pub delay_ms: Option<u64>,
    /// Connect stdin as the byte source.
    pub input: bool,
    /// Connect stdout as the byte sink.
    pub output: bool,
    pub io_policy: IoPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            delay_ms: None,
            input: true,
            output: true,
            io_policy: IoPolicy::Report,
        }
    }
}

impl RunSettings {
    /// Settings from the config file (if any) with environment overrides applied.
    pub fn load() -> Self {
        let mut settings = config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .map(|content| Self::from_toml(&content))
            .unwrap_or_default();
        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(Duration::from_millis)
    }

    /// Read the `[run]` section of a config file. Unknown keys and
    /// unparsable values are skipped.
    pub fn from_toml(content: &str) -> Self {
        let map = section_entries(content, "run");
        let mut cfg = RunSettings::default();

        macro_rules! set {
            ($field:ident, $key:literal, $parse:expr) => {
                if let Some(v) = map.get($key).and_then(|s| $parse(s.as_str())) { cfg.$field = v; }
            };
        }

        set!(delay_ms, "delay_ms", |s: &str| s.parse::<u64>().ok().map(Some));
        set!(input, "input", parse_bool);
        set!(output, "output", parse_bool);
        set!(io_policy, "io_policy", |s: &str| s.parse::<IoPolicy>().ok());

        cfg
    }

    /// Override fields from environment variables looked up through `var`.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ms) = var(DELAY_ENV).and_then(|s| s.trim().parse::<u64>().ok()) {
            self.delay_ms = Some(ms);
        }
        if let Some(policy) = var(IO_POLICY_ENV).and_then(|s| s.parse::<IoPolicy>().ok()) {
            self.io_policy = policy;
        }
    }
}

/// Collect `key = value` pairs under `[section]`.
///
/// This is a tiny subset of TOML: one pair per line, values may be wrapped
/// in double quotes, `#` starts a comment line.
fn section_entries(content: &str, section: &str) -> HashMap<String, String> {
    let mut current: Option<&str> = None;
    let mut entries = HashMap::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = Some(name.trim());
            continue;
        }
        if current != Some(section) {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        entries.insert(key.trim().to_string(), value.to_string());
    }
    entries
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }

    // On Linux: resolves to /home/<user>/.config
    // On Windows: resolves to C:\Users\<user>\.config
    // On macOS: resolves to /Users/<user>/.config
    let base_dirs = BaseDirs::new().ok()?;
    let mut path = PathBuf::from(base_dirs.config_home());
    path.push("bfvm.toml");
    Some(path)
}
