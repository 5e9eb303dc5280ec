//! INI configuration file handling.
//!
//! The wire format is deliberately INI, not TOML (spec §6) — this daemon
//! runs alongside desktops that hand-edit `xdg-desktop-portal-wlr/config`,
//! and the original C core (`src/core/config.c`) parses the same format
//! with the same section/key names, which this module preserves exactly.

use std::path::{Path, PathBuf};

use ini::Ini;
use tracing::{debug, trace, warn};

/// `[screencast]` section, field-for-field equivalent to
/// `struct config_screencast` in `include/config.h`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreencastConfig {
    pub output_name: Option<String>,
    pub max_fps: f64,
    pub exec_before: Option<String>,
    pub exec_after: Option<String>,
    pub chooser_cmd: Option<String>,
    pub chooser_type: ChooserType,
    pub force_mod_linear: bool,
    pub cropmode: CropMode,
    pub region: FrameCrop,
    /// CLI-only (`-p`/`--pixelformat`): forces the fourcc advertised to the
    /// PipeWire consumer. Not an INI key — doesn't round-trip through
    /// `to_ini_string`/`merge_ini_file`, set directly by `main.rs`.
    pub forced_pixel_format: Option<ForcedPixelFormat>,
}

impl Default for ScreencastConfig {
    fn default() -> Self {
        Self {
            output_name: None,
            max_fps: 0.0,
            exec_before: None,
            exec_after: None,
            chooser_cmd: None,
            chooser_type: ChooserType::Default,
            force_mod_linear: false,
            cropmode: CropMode::None,
            region: FrameCrop::default(),
            forced_pixel_format: None,
        }
    }
}

/// Target chooser strategy, per spec §4.E "Target selection".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChooserType {
    #[default]
    Default,
    None,
    Simple,
    Dmenu,
}

impl ChooserType {
    fn parse(value: &str) -> Self {
        match value {
            "none" => ChooserType::None,
            "simple" => ChooserType::Simple,
            "dmenu" => ChooserType::Dmenu,
            "default" => ChooserType::Default,
            other => {
                warn!("config: unknown chooser_type '{other}', falling back to default");
                ChooserType::Default
            }
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ChooserType::Default => "default",
            ChooserType::None => "none",
            ChooserType::Simple => "simple",
            ChooserType::Dmenu => "dmenu",
        }
    }
}

/// Crop strategy applied to captured frames, per spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropMode {
    #[default]
    None,
    Wlroots,
    Pipewire,
}

impl CropMode {
    fn parse(value: &str) -> Self {
        match value {
            "wlroots" => CropMode::Wlroots,
            "pipewire" => CropMode::Pipewire,
            "none" => CropMode::None,
            other => {
                warn!("config: unknown cropmode '{other}', falling back to none");
                CropMode::None
            }
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            CropMode::None => "none",
            CropMode::Wlroots => "wlroots",
            CropMode::Pipewire => "pipewire",
        }
    }
}

/// Cropping rectangle, format `x,y:WxH` in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCrop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FrameCrop {
    fn parse(value: &str) -> Option<Self> {
        let (xy, wh) = value.split_once(':')?;
        let (x, y) = xy.split_once(',')?;
        let (w, h) = wh.split_once('x')?;
        Some(FrameCrop {
            x: x.trim().parse().ok()?,
            y: y.trim().parse().ok()?,
            width: w.trim().parse().ok()?,
            height: h.trim().parse().ok()?,
        })
    }
}

/// The CLI-forced pixel format (`-p`/`--pixelformat`), layered on top of
/// the file config since it doesn't live in the INI file (spec §6 CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedPixelFormat {
    Bgrx,
    Rgbx,
}

impl ForcedPixelFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BGRx" => Some(ForcedPixelFormat::Bgrx),
            "RGBx" => Some(ForcedPixelFormat::Rgbx),
            _ => None,
        }
    }
}

/// Top-level configuration, mirroring `struct xdpw_config`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub screencast: ScreencastConfig,
}

impl Config {
    /// Locate and parse the configuration file, following the XDG cascade
    /// described in spec §6: for each of `$XDG_CONFIG_HOME` (falling back
    /// to `$HOME/.config`) then `$SYSCONFDIR/xdg`, try
    /// `<prefix>/xdg-desktop-portal-wlr/<desktop>` for each colon-separated
    /// entry of `$XDG_CURRENT_DESKTOP`, then `<prefix>/xdg-desktop-portal-wlr/config`.
    pub fn load(explicit_path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit_path {
            Some(p) => Some(p.to_path_buf()),
            None => find_config_path(),
        };

        let mut config = Config::default();
        match path {
            Some(path) => {
                debug!("config: loading {}", path.display());
                config.merge_ini_file(&path)?;
            }
            None => {
                debug!("config: no config file found, using defaults");
            }
        }
        Ok(config)
    }

    fn merge_ini_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let ini = Ini::load_from_file(path)?;
        if let Some(section) = ini.section(Some("screencast")) {
            for (key, value) in section.iter() {
                self.apply_screencast_key(key, value);
            }
        }
        Ok(())
    }

    fn apply_screencast_key(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            trace!("config: skipping empty value for key {key}");
            return;
        }
        let sc = &mut self.screencast;
        match key {
            "output_name" => sc.output_name = Some(value.to_string()),
            "max_fps" => {
                if let Ok(v) = value.parse() {
                    sc.max_fps = v;
                }
            }
            "exec_before" => sc.exec_before = Some(value.to_string()),
            "exec_after" => sc.exec_after = Some(value.to_string()),
            "chooser_cmd" => sc.chooser_cmd = Some(value.to_string()),
            "chooser_type" => sc.chooser_type = ChooserType::parse(value),
            "force_mod_linear" => sc.force_mod_linear = value == "1",
            "cropmode" => sc.cropmode = CropMode::parse(value),
            "region" => {
                if let Some(region) = FrameCrop::parse(value) {
                    sc.region = region;
                } else {
                    warn!("config: malformed region value '{value}'");
                }
            }
            _ => trace!("config: skipping unknown key '{key}' in [screencast]"),
        }
    }

    /// Render the canonical INI representation (spec §8, "config-file round-trip").
    pub fn to_ini_string(&self) -> String {
        let sc = &self.screencast;
        format!(
            "[screencast]\n\
             output_name={}\n\
             max_fps={}\n\
             exec_before={}\n\
             exec_after={}\n\
             chooser_cmd={}\n\
             chooser_type={}\n\
             force_mod_linear={}\n\
             cropmode={}\n\
             region={},{}:{}x{}\n",
            sc.output_name.as_deref().unwrap_or(""),
            sc.max_fps,
            sc.exec_before.as_deref().unwrap_or(""),
            sc.exec_after.as_deref().unwrap_or(""),
            sc.chooser_cmd.as_deref().unwrap_or(""),
            sc.chooser_type.as_str(),
            if sc.force_mod_linear { 1 } else { 0 },
            sc.cropmode.as_str(),
            sc.region.x, sc.region.y, sc.region.width, sc.region.height,
        )
    }
}

fn config_home() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
}

fn sysconfdir_xdg() -> PathBuf {
    PathBuf::from(option_env!("SYSCONFDIR").unwrap_or("/etc")).join("xdg")
}

fn find_config_path() -> Option<PathBuf> {
    let prefixes = [config_home(), Some(sysconfdir_xdg())];
    let current_desktop = std::env::var("XDG_CURRENT_DESKTOP").ok();

    for prefix in prefixes.into_iter().flatten() {
        if let Some(desktops) = &current_desktop {
            for desktop in desktops.split(':').filter(|d| !d.is_empty()) {
                let path = prefix.join("xdg-desktop-portal-wlr").join(desktop);
                trace!("config: trying {}", path.display());
                if path.is_file() {
                    return Some(path);
                }
            }
        }
        let path = prefix.join("xdg-desktop-portal-wlr").join("config");
        trace!("config: trying {}", path.display());
        if path.is_file() {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_matches_original_defaults() {
        let config = Config::default();
        assert_eq!(config.screencast.max_fps, 0.0);
        assert_eq!(config.screencast.chooser_type, ChooserType::Default);
        assert_eq!(config.screencast.cropmode, CropMode::None);
    }

    #[test]
    fn max_fps_zero_or_negative_disables_limiting() {
        let config = Config::default();
        assert!(config.screencast.max_fps <= 0.0);
    }

    #[test]
    fn region_parses_x_y_width_height() {
        let region = FrameCrop::parse("10,20:640x480").unwrap();
        assert_eq!(region, FrameCrop { x: 10, y: 20, width: 640, height: 480 });
    }

    #[test]
    fn region_rejects_malformed_value() {
        assert!(FrameCrop::parse("not-a-region").is_none());
    }

    #[test]
    fn ini_round_trip_is_canonical() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[screencast]\noutput_name=DP-1\nmax_fps=30\nchooser_type=dmenu\nforce_mod_linear=1\nregion=0,0:1920x1080\n"
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.screencast.output_name.as_deref(), Some("DP-1"));
        assert_eq!(config.screencast.max_fps, 30.0);
        assert_eq!(config.screencast.chooser_type, ChooserType::Dmenu);
        assert!(config.screencast.force_mod_linear);

        let rendered = config.to_ini_string();
        let reparsed_ini = Ini::load_from_str(&rendered).unwrap();
        let mut reparsed = Config::default();
        for (key, value) in reparsed_ini.section(Some("screencast")).unwrap().iter() {
            reparsed.apply_screencast_key(key, value);
        }
        assert_eq!(config, reparsed);
    }

    #[test]
    fn forced_pixel_format_parses_known_values() {
        assert_eq!(ForcedPixelFormat::parse("BGRx"), Some(ForcedPixelFormat::Bgrx));
        assert_eq!(ForcedPixelFormat::parse("RGBx"), Some(ForcedPixelFormat::Rgbx));
        assert_eq!(ForcedPixelFormat::parse("nope"), None);
    }
}
