//! Configuration
//!
//! Shell policy, keybindings, output layout and launcher settings, loaded
//! from a TOML file. Every field has a default, so an empty file (or no file
//! at all) gives a usable shell.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;

use crate::input::{Action, KeyChord, Keybinding};
use crate::shell::{FocusOnMap, OutputDescriptor, OutputLayout, WindowPlacement};

/// File name of the shell's own log inside `log_dir`
pub const SHELL_LOG: &str = "v128-shell.log";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Pointer button press focuses the surface under the pointer
    pub focus_follows_click: bool,

    /// When a newly mapped window takes keyboard focus
    pub focus_on_map: FocusOnMap,

    /// Raise windows when they gain focus from a click or cycling
    pub raise_on_focus: bool,

    /// Geometry given to newly mapped windows
    pub new_window_placement: WindowPlacement,

    /// Directory for `v128-shell.log` and `subprogram.N.log` files; output
    /// goes to the terminal when unset
    pub log_dir: Option<PathBuf>,

    /// Commands launched once the shell has started
    pub autostart: Vec<String>,

    /// Environment exported to launched programs
    pub environment: BTreeMap<String, String>,

    /// Explicit output positions keyed by connector name
    pub layout: HashMap<String, Position>,

    /// Keybindings
    pub bindings: Vec<BindingConfig>,

    /// Outputs of the headless backend
    pub headless: Vec<HeadlessOutput>,
}

/// Logical position of an output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// A single `[[bindings]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BindingConfig {
    /// Chord such as `Super+Return`
    pub chord: String,

    #[serde(flatten)]
    pub action: Action,
}

impl BindingConfig {
    pub fn new(chord: impl Into<String>, action: Action) -> Self {
        Self {
            chord: chord.into(),
            action,
        }
    }
}

/// A single `[[headless]]` output
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeadlessOutput {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "HeadlessOutput::default_scale")]
    pub scale: f64,
}

impl HeadlessOutput {
    fn default_scale() -> f64 {
        1.0
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            focus_follows_click: true,
            focus_on_map: FocusOnMap::default(),
            raise_on_focus: true,
            new_window_placement: WindowPlacement::default(),
            log_dir: None,
            autostart: Vec::new(),
            environment: Self::default_environment(),
            layout: HashMap::new(),
            bindings: Self::default_bindings(),
            headless: vec![HeadlessOutput {
                name: "HEADLESS-1".to_string(),
                width: 1920,
                height: 1080,
                scale: 1.0,
            }],
        }
    }
}

impl ShellConfig {
    fn default_bindings() -> Vec<BindingConfig> {
        vec![
            BindingConfig::new("Alt+q", Action::Quit),
            BindingConfig::new("Alt+bracketright", Action::CycleFocus),
            BindingConfig::new(
                "Alt+t",
                Action::Spawn {
                    command: "cool-retro-term".to_string(),
                },
            ),
            BindingConfig::new(
                "Alt+v",
                Action::Spawn {
                    command: "x128".to_string(),
                },
            ),
        ]
    }

    fn default_environment() -> BTreeMap<String, String> {
        [
            ("SDL_VIDEODRIVER", "wayland"),
            ("XDG_SESSION_TYPE", "wayland"),
            ("QT_QPA_PLATFORM", "wayland"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    /// Load from `path` if given, otherwise use the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: ShellConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for binding in &self.bindings {
            KeyChord::parse(&binding.chord)
                .with_context(|| format!("Invalid keybinding chord {:?}", binding.chord))?;
            if let Action::Spawn { command } = &binding.action {
                if command.trim().is_empty() {
                    anyhow::bail!("Keybinding {:?} spawns an empty command", binding.chord);
                }
            }
        }

        for output in &self.headless {
            if output.width == 0 || output.height == 0 {
                anyhow::bail!("Headless output {} has an empty mode", output.name);
            }
            if !output.scale.is_finite() || output.scale <= 0.0 {
                anyhow::bail!("Headless output {} has invalid scale {}", output.name, output.scale);
            }
        }

        Ok(())
    }

    /// Open `<log_dir>/v128-shell.log` for the shell's own log output
    pub fn open_shell_log(&self) -> Result<Option<fs::File>> {
        let Some(dir) = &self.log_dir else {
            return Ok(None);
        };
        let path = dir.join(SHELL_LOG);
        let file = fs::File::create(&path)
            .with_context(|| format!("Failed to open {} for writing", path.display()))?;
        Ok(Some(file))
    }

    /// Resolved keybindings; entries with invalid chords are skipped
    pub fn keybindings(&self) -> Vec<Keybinding> {
        self.bindings
            .iter()
            .filter_map(|binding| match KeyChord::parse(&binding.chord) {
                Ok(chord) => Some(Keybinding::new(chord, binding.action.clone())),
                Err(e) => {
                    warn!("Skipping keybinding {:?}: {}", binding.chord, e);
                    None
                }
            })
            .collect()
    }

    /// Output layout policy
    pub fn output_layout(&self) -> OutputLayout {
        self.layout
            .iter()
            .fold(OutputLayout::append_right(), |layout, (name, pos)| {
                layout.with_position(name.clone(), pos.x, pos.y)
            })
    }

    /// Descriptors for the headless backend's outputs
    pub fn headless_outputs(&self) -> Vec<OutputDescriptor> {
        self.headless
            .iter()
            .map(|output| {
                let mut descriptor =
                    OutputDescriptor::new(output.name.clone(), output.width, output.height);
                descriptor.scale = output.scale;
                descriptor
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ShellConfig::default();
        assert!(config.focus_follows_click);
        assert!(config.raise_on_focus);
        assert_eq!(config.focus_on_map, FocusOnMap::WhenUnfocused);
        assert_eq!(config.new_window_placement, WindowPlacement::AsRequested);
        assert_eq!(config.headless.len(), 1);
        assert_eq!(config.keybindings().len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = ShellConfig::from_toml("").unwrap();
        assert_eq!(config, ShellConfig::default());
    }

    #[test]
    fn test_full_document() -> Result<()> {
        let config = ShellConfig::from_toml(
            r#"
focus_follows_click = false
focus_on_map = "always"
raise_on_focus = false
new_window_placement = "fill-output"
log_dir = "/tmp/v128-shell"
autostart = ["x128"]

[environment]
SDL_VIDEODRIVER = "wayland"

[layout]
"HDMI-A-1" = { x = 0, y = 0 }
"DP-1" = { x = 1920, y = 0 }

[[bindings]]
chord = "Super+Return"
action = "spawn"
command = "foot"

[[bindings]]
chord = "Super+Shift+q"
action = "quit"

[[headless]]
name = "HEADLESS-1"
width = 1280
height = 720
scale = 2.0
"#,
        )?;

        assert!(!config.focus_follows_click);
        assert_eq!(config.focus_on_map, FocusOnMap::Always);
        assert_eq!(config.new_window_placement, WindowPlacement::FillOutput);
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/v128-shell")));
        assert_eq!(config.autostart, vec!["x128".to_string()]);
        assert_eq!(config.environment.len(), 1);
        assert_eq!(
            config.bindings,
            vec![
                BindingConfig::new(
                    "Super+Return",
                    Action::Spawn {
                        command: "foot".to_string()
                    }
                ),
                BindingConfig::new("Super+Shift+q", Action::Quit),
            ]
        );

        let layout = config.output_layout();
        assert_eq!(layout.position_of("DP-1"), Some((1920, 0)));
        assert_eq!(layout.position_of("eDP-1"), None);

        let outputs = config.headless_outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!((outputs[0].width, outputs[0].height), (1280, 720));
        assert_eq!(outputs[0].scale, 2.0);
        Ok(())
    }

    #[test]
    fn test_invalid_chord_rejected() {
        let result = ShellConfig::from_toml(
            r#"
[[bindings]]
chord = "Hyper+x"
action = "close"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result = ShellConfig::from_toml(
            r#"
[[bindings]]
chord = "Super+x"
action = "explode"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_headless_output_rejected() {
        let result = ShellConfig::from_toml(
            r#"
[[headless]]
name = "HEADLESS-1"
width = 0
height = 1080
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "raise_on_focus = false")?;

        let config = ShellConfig::load(file.path())?;
        assert!(!config.raise_on_focus);
        assert!(config.focus_follows_click);
        Ok(())
    }

    #[test]
    fn test_open_shell_log() -> Result<()> {
        assert!(ShellConfig::default().open_shell_log()?.is_none());

        let dir = tempfile::tempdir()?;
        let config = ShellConfig {
            log_dir: Some(dir.path().to_path_buf()),
            ..ShellConfig::default()
        };
        let mut file = config.open_shell_log()?.expect("log file");
        writeln!(file, "hello")?;
        assert_eq!(fs::read_to_string(dir.path().join(SHELL_LOG))?, "hello\n");

        let missing = ShellConfig {
            log_dir: Some(dir.path().join("missing")),
            ..ShellConfig::default()
        };
        assert!(missing.open_shell_log().is_err());
        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        let err = ShellConfig::load("/nonexistent/v128-shell.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_skips_invalid_programmatic_binding() {
        let config = ShellConfig {
            bindings: vec![
                BindingConfig::new("Super+Return", Action::Close),
                BindingConfig::new("Nope+Return", Action::Close),
            ],
            ..ShellConfig::default()
        };
        assert_eq!(config.keybindings().len(), 1);
    }
}
