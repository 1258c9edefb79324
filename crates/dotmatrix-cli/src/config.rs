use dotmatrix_core::config::EmulatorConfig;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What a headless run does once the machine is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Frames delivered to the video output before the run stops.
    pub frames: u64,
    /// Wall-clock limit for the whole run.
    pub timeout_secs: u64,
    /// Write the last delivered frame here as PNG.
    pub screenshot: Option<PathBuf>,
    /// Print bytes sent over the serial port when the run ends.
    pub serial: bool,
    /// Report peak levels per sound channel.
    pub audio_report: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            timeout_secs: 60,
            screenshot: None,
            serial: false,
            audio_report: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub emulator: EmulatorConfig,
    pub run: RunConfig,
}

pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("dotmatrix").join("dotmatrix.toml");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("dotmatrix").join("dotmatrix.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("dotmatrix")
            .join("dotmatrix.toml");
    }

    PathBuf::from("dotmatrix.toml")
}

pub fn load_from_file(path: &Path) -> CliConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return CliConfig::default(),
    };

    match toml::from_str::<CliConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse config {}: {e}; using defaults",
                path.display()
            );
            CliConfig::default()
        }
    }
}

pub fn save_to_file(path: &Path, cfg: &CliConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let text = toml::to_string_pretty(cfg).map_err(std::io::Error::other)?;
    std::fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dotmatrix_core::config::ModelPreference;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let cfg = load_from_file(&dir.path().join("absent.toml"));
        assert_eq!(cfg, CliConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dotmatrix.toml");
        std::fs::write(
            &path,
            r#"
[emulator]
model = "force-cgb"
sample_rate = 48000

[run]
frames = 30
serial = true
"#,
        )
        .unwrap();

        let cfg = load_from_file(&path);
        assert_eq!(cfg.emulator.model, ModelPreference::ForceCgb);
        assert_eq!(cfg.emulator.sample_rate, 48_000);
        assert!(cfg.emulator.frame_limit);
        assert_eq!(cfg.run.frames, 30);
        assert!(cfg.run.serial);
        assert_eq!(cfg.run.timeout_secs, 60);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dotmatrix.toml");
        std::fs::write(&path, "[emulator\nmodel = 3").unwrap();
        assert_eq!(load_from_file(&path), CliConfig::default());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dotmatrix.toml");
        let mut cfg = CliConfig::default();
        cfg.emulator.model = ModelPreference::ForceDmg;
        cfg.emulator.shades = Some([[0xE0, 0xF8, 0xD0], [0x88, 0xC0, 0x70], [0x34, 0x68, 0x56], [0x08, 0x18, 0x20]]);
        cfg.run.screenshot = Some(PathBuf::from("last.png"));
        save_to_file(&path, &cfg).unwrap();
        assert_eq!(load_from_file(&path), cfg);
    }
}
