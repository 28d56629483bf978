// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file to read
    #[arg(long, default_value = "lumen.toml")]
    pub config: PathBuf,

    /// OBJ model to place in the scene; repeat for more
    #[arg(long = "model", value_name = "PATH")]
    pub models: Vec<PathBuf>,

    /// Present with FIFO even when MAILBOX is available
    #[arg(long)]
    pub no_mailbox: bool,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowCfg,
    pub render: RenderCfg,
    pub scene: SceneCfg,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowCfg {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Lumen".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub prefer_mailbox: bool,
    /// Directory of `.spv` files that replace the built-in shaders.
    pub shader_dir: Option<PathBuf>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        Self {
            clear_color: [0.01, 0.01, 0.01, 1.0],
            prefer_mailbox: true,
            shader_dir: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SceneCfg {
    pub models: Vec<PathBuf>,
    pub point_lights: bool,
}

impl Default for SceneCfg {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            point_lights: true,
        }
    }
}

impl AppConfig {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Missing file or bad TOML both fall back to defaults.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match Self::parse(&text) {
                Ok(cfg) => {
                    info!("config loaded from {}", path.display());
                    cfg
                }
                Err(e) => {
                    warn!("ignoring {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("cannot read {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Command-line models replace the configured list.
    pub fn apply_args(&mut self, args: &Args) {
        if !args.models.is_empty() {
            self.scene.models = args.models.clone();
        }
        if args.no_mailbox {
            self.render.prefer_mailbox = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(AppConfig::parse("").unwrap(), AppConfig::default());
        let d = AppConfig::default();
        assert_eq!((d.window.width, d.window.height), (800, 600));
        assert_eq!(d.window.title, "Lumen");
        assert!(d.render.prefer_mailbox);
        assert!(d.scene.point_lights);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let cfg = AppConfig::parse(
            r#"
            [window]
            width = 1280

            [render]
            clear_color = [0.1, 0.2, 0.3, 1.0]
            shader_dir = "spv"

            [scene]
            models = ["models/flat_vase.obj", "models/smooth_vase.obj"]
            point_lights = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.width, 1280);
        assert_eq!(cfg.window.height, 600);
        assert_eq!(cfg.render.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(cfg.render.shader_dir, Some(PathBuf::from("spv")));
        assert!(cfg.render.prefer_mailbox);
        assert_eq!(cfg.scene.models.len(), 2);
        assert!(!cfg.scene.point_lights);
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(AppConfig::parse("[window\nwidth = ").is_err());
        assert!(AppConfig::parse("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("lumen-config-that-does-not-exist.toml");
        assert_eq!(AppConfig::load(&path), AppConfig::default());
    }

    #[test]
    fn cli_overrides_config() {
        let args = Args::parse_from([
            "lumen",
            "--model",
            "a.obj",
            "--model",
            "b.obj",
            "--no-mailbox",
        ]);
        assert_eq!(args.config, PathBuf::from("lumen.toml"));

        let mut cfg = AppConfig::default();
        cfg.scene.models = vec![PathBuf::from("from_file.obj")];
        cfg.apply_args(&args);
        assert_eq!(
            cfg.scene.models,
            vec![PathBuf::from("a.obj"), PathBuf::from("b.obj")]
        );
        assert!(!cfg.render.prefer_mailbox);
    }

    #[test]
    fn no_cli_models_keeps_configured_ones() {
        let args = Args::parse_from(["lumen"]);
        let mut cfg = AppConfig::default();
        cfg.scene.models = vec![PathBuf::from("from_file.obj")];
        cfg.apply_args(&args);
        assert_eq!(cfg.scene.models, vec![PathBuf::from("from_file.obj")]);
        assert!(cfg.render.prefer_mailbox);
    }
}
