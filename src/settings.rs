use anyhow::Result;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::fmt;

use crate::fit::{FitOptions, MAX_WEDGE_ANGLE};
use crate::stack::Stack;

/// Refractive index assigned to a mirror when the configuration omits one.
pub const DEFAULT_REFR_INDEX: f64 = 1.5;
/// Refractive index of the surrounding medium when the configuration omits one.
pub const DEFAULT_AMBIENT_REFR_INDEX: f64 = 1.0;

/// Runtime configuration for the application.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    /// Refractive index of the medium surrounding the stack.
    #[serde(default = "default_ambient")]
    pub ambient_refr_index: f64,
    /// Incident ray angle against the optical axis, in radians.
    #[serde(default)]
    pub incident: f64,
    /// Use exact Snell's law rather than the small-angle approximation.
    #[serde(default)]
    pub exact: bool,
    /// Fit bound: every recovered wedge angle lies within this magnitude.
    #[serde(default = "default_max_wedge_angle")]
    pub max_wedge_angle: f64,
    /// Recover the wedges back from the computed reflections as a self-check.
    #[serde(default)]
    pub run_fit: bool,
    /// Mirror elements in physical propagation order.
    pub mirrors: Vec<MirrorSettings>,
    /// Minimizer knobs for the inverse solver.
    #[serde(default)]
    pub fit: FitSettings,
}

/// One mirror element as configured.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MirrorSettings {
    pub front_wedge: f64,
    pub back_wedge: f64,
    #[serde(default = "default_refr_index")]
    pub refr_index: f64,
}

/// Subset of [`FitOptions`] exposed through the configuration file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FitSettings {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for FitSettings {
    fn default() -> Self {
        let options = FitOptions::default();
        Self {
            max_iterations: options.max_iterations,
            tolerance: options.tolerance,
        }
    }
}

impl FitSettings {
    pub fn to_options(&self) -> FitOptions {
        FitOptions {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            ..FitOptions::default()
        }
    }
}

fn default_ambient() -> f64 {
    DEFAULT_AMBIENT_REFR_INDEX
}

fn default_refr_index() -> f64 {
    DEFAULT_REFR_INDEX
}

fn default_max_wedge_angle() -> f64 {
    MAX_WEDGE_ANGLE
}

impl Settings {
    /// Builds the scalar-wedge stack described by the configuration.
    pub fn build_stack(&self) -> Stack<f64> {
        let mut stack = Stack::new(self.ambient_refr_index);
        for mirror in &self.mirrors {
            stack.add_mirror(mirror.front_wedge, mirror.back_wedge, mirror.refr_index);
        }
        stack
    }

    /// The per-mirror refractive index sequence.
    pub fn refr_indices(&self) -> Vec<f64> {
        self.mirrors.iter().map(|m| m.refr_index).collect()
    }
}

pub fn load_default_config() -> Result<Settings> {
    let project_dir = retrieve_project_root();
    let default_config_file = project_dir.join("config/default.toml");

    let settings: Config = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()?;

    let config: Settings = settings.try_deserialize()?;

    validate_config(&config);

    Ok(config)
}

pub fn load_config() -> Result<Settings> {
    // Try to find the project directory in different ways
    let project_dir = retrieve_project_root();

    let default_config_file = project_dir.join("config/default.toml");
    let local_config = project_dir.join("config/local.toml");

    // Check if local config exists, if not use default
    let config_file = if local_config.exists() {
        println!("Using local configuration: {:?}", local_config);
        local_config
    } else {
        println!("Using default configuration: {:?}", default_config_file);
        default_config_file
    };

    let settings: Config = Config::builder()
        .add_source(File::from(config_file).required(true))
        .add_source(Environment::with_prefix("wedgetrace"))
        .build()?;

    let mut config: Settings = settings.try_deserialize()?;

    // Parse command-line arguments and override values
    let args = CliArgs::parse();

    if let Some(incident) = args.incident {
        config.incident = incident;
    }
    if args.exact {
        config.exact = true;
    }
    if args.fit {
        config.run_fit = true;
    }
    if let Some(ambient) = args.n0 {
        config.ambient_refr_index = ambient;
    }
    if let Some(indices) = args.ri {
        // Assign per mirror; the last given value fills the remainder.
        for (i, mirror) in config.mirrors.iter_mut().enumerate() {
            mirror.refr_index = *indices
                .get(i)
                .unwrap_or_else(|| indices.last().expect("at least one index"));
        }
    }
    if let Some(max_angle) = args.max_angle {
        config.max_wedge_angle = max_angle;
    }
    if let Some(max_iterations) = args.max_iter {
        config.fit.max_iterations = max_iterations;
    }

    validate_config(&config);

    println!("{:#?}", config);

    Ok(config)
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the WEDGETRACE_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
/// If none of these methods work, the function will panic.
fn retrieve_project_root() -> std::path::PathBuf {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        // When running through cargo (e.g. cargo run, cargo test)
        std::path::PathBuf::from(manifest_dir)
    } else if let Ok(path) = env::var("WEDGETRACE_ROOT_DIR") {
        // Allow explicit configuration via environment variable
        std::path::PathBuf::from(path)
    } else {
        // Fallback: try to find the nearest directory containing a "config"
        // subdirectory, starting from the executable directory and walking up
        let exe_path = env::current_exe().expect("Failed to get current executable path");
        let mut current_dir = exe_path
            .parent()
            .expect("Failed to get executable directory")
            .to_path_buf();

        loop {
            if current_dir.join("config").is_dir() {
                return current_dir;
            }
            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => panic!("Could not find project root directory"),
            }
        }
    }
}

fn validate_config(config: &Settings) {
    assert!(
        !config.mirrors.is_empty(),
        "Configuration must contain at least one mirror"
    );
    assert!(
        config.ambient_refr_index > 0.0,
        "Ambient refractive index must be greater than 0"
    );
    for mirror in &config.mirrors {
        assert!(
            mirror.refr_index > 0.0,
            "Mirror refractive index must be greater than 0"
        );
    }
    assert!(
        config.max_wedge_angle > 0.0,
        "Maximum wedge angle must be greater than 0"
    );
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "WEDGETRACE - Wedged mirror stack angle tracing and wedge retrieval"
)]
pub struct CliArgs {
    /// Incident ray angle in radians.
    #[arg(short, long)]
    incident: Option<f64>,

    /// Use exact Snell's law instead of the small-angle approximation.
    #[arg(long)]
    exact: bool,

    /// Recover the wedges back from the computed reflection angles and
    /// report the fit alongside the forward results.
    #[arg(long)]
    fit: bool,

    /// The refractive index of the surrounding medium.
    #[arg(long)]
    n0: Option<f64>,

    /// The refractive index of the mirror/s, separated by spaces.
    /// If fewer values are provided than the number of mirrors, the last
    /// value will be used for the remaining mirrors.
    #[arg(short, long, value_parser, num_args = 1.., value_delimiter = ' ')]
    ri: Option<Vec<f64>>,

    /// Bound on fitted wedge angles, in radians.
    #[arg(long)]
    max_angle: Option<f64>,

    /// Maximum number of minimizer iterations for the fit.
    #[arg(long)]
    max_iter: Option<usize>,
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Incident Angle: {:.6}
  - Exact Mode: {}
  - Ambient Refractive Index: {:.6}
  - Mirrors: {}
  - Max Wedge Angle: {:.6}
  ",
            self.incident,
            self.exact,
            self.ambient_refr_index,
            self.mirrors.len(),
            self.max_wedge_angle,
        )
    }
}
