//! Effective settings for `gbs run`.
//!
//! Each setting comes from the first source that provides it:
//! command-line flag, then environment variable, then built-in default.
//!
//! | Setting   | Flag          | Environment     | Default       |
//! |-----------|---------------|-----------------|---------------|
//! | backend   | `--backend`   | `GBS_BACKEND`   | `interpreter` |
//! | step cap  | `--max-steps` | `GBS_MAX_STEPS` | none          |

use crate::error::CliError;
use clap::ValueEnum;
use std::fmt;
use std::str::FromStr;

pub const ENV_BACKEND: &str = "GBS_BACKEND";
pub const ENV_MAX_STEPS: &str = "GBS_MAX_STEPS";

/// Which engine executes the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Backend {
    #[default]
    Interpreter,
    /// x86-64 machine code; falls back to the interpreter where it cannot run.
    Native,
}

impl FromStr for Backend {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interpreter" => Ok(Backend::Interpreter),
            "native" => Ok(Backend::Native),
            other => Err(CliError::Config(format!(
                "unknown backend '{other}' (expected interpreter or native)"
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Interpreter => "interpreter",
            Backend::Native => "native",
        })
    }
}

/// Board and engine settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub backend: Backend,
    pub max_steps: Option<u64>,
    pub width: u32,
    pub height: u32,
    pub head: (u32, u32),
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Interpreter,
            max_steps: None,
            width: 9,
            height: 9,
            head: (0, 0),
        }
    }
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    pub backend: Option<Backend>,
    pub max_steps: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub head: Option<(u32, u32)>,
}

impl RunConfig {
    /// Resolve against the process environment.
    pub fn resolve(flags: &RunFlags) -> Result<Self, CliError> {
        Self::resolve_with(flags, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with(
        flags: &RunFlags,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CliError> {
        let defaults = Self::default();

        let backend = match flags.backend {
            Some(backend) => backend,
            None => match env(ENV_BACKEND).filter(|v| !v.trim().is_empty()) {
                Some(value) => value.parse()?,
                None => defaults.backend,
            },
        };

        let max_steps = match flags.max_steps {
            Some(n) => Some(n),
            None => match env(ENV_MAX_STEPS).filter(|v| !v.trim().is_empty()) {
                Some(value) => Some(value.trim().parse::<u64>().map_err(|_| {
                    CliError::Config(format!("{ENV_MAX_STEPS} must be a number, got '{value}'"))
                })?),
                None => defaults.max_steps,
            },
        };

        let config = Self {
            backend,
            max_steps,
            width: flags.width.unwrap_or(defaults.width),
            height: flags.height.unwrap_or(defaults.height),
            head: flags.head.unwrap_or(defaults.head),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), CliError> {
        if self.width == 0 || self.height == 0 {
            return Err(CliError::Config(format!(
                "board must be at least 1x1, got {}x{}",
                self.width, self.height
            )));
        }
        let (x, y) = self.head;
        if x >= self.width || y >= self.height {
            return Err(CliError::Config(format!(
                "head ({x},{y}) is outside a {}x{} board",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Parse a head position written `X,Y`.
pub fn parse_head(text: &str) -> Result<(u32, u32), String> {
    let (x, y) = text
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{text}'"))?;
    let coord = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|_| format!("'{}' is not a coordinate", s.trim()))
    };
    Ok((coord(x)?, coord(y)?))
}
