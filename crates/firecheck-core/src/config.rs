//! Test-case parameters loaded from a JSON file.
//!
//! ```json
//! {
//!   "referenceDir": "fad/",
//!   "thresholds": { "worldLocation": 0.1, "orientation": 0.1, "velocity": 1.0,
//!                   "acceleration": 0.1, "angularVelocity": 0.1 },
//!   "waitingPeriod": 10,
//!   "velocityPolicy": "advisory",
//!   "mode": "aggregate-all"
//! }
//! ```
//!
//! `referenceDir`, `thresholds` and `waitingPeriod` are required, as is
//! every one of the five threshold keys.  A relative `referenceDir` is
//! resolved against the directory holding the config file.

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors from loading a test-case config.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("failed to read config {}: {source}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("config is not valid JSON: {source}"))]
    Syntax { source: serde_json::Error },

    #[snafu(display("config must be a JSON object"))]
    NotAnObject,

    #[snafu(display("missing required key `{key}`"))]
    MissingKey { key: String },

    #[snafu(display("key `{key}` has the wrong type: {source}"))]
    WrongType {
        key: String,
        source: serde_json::Error,
    },

    #[snafu(display("threshold `{key}` must be finite and non-negative, got {value}"))]
    InvalidThreshold { key: &'static str, value: f64 },
}

// ═══════════════════════════════════════════════════════════════════════
//  Policies
// ═══════════════════════════════════════════════════════════════════════

/// How initial-velocity tolerance violations count toward the verdict.
///
/// Federates commonly disagree on the reference frame of the velocity
/// vector, so by default a violation is reported as a warning and never
/// fails the run.  Switch to `Enforced` only once the SUT's velocity
/// convention is known to match the reference dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VelocityPolicy {
    #[default]
    Advisory,
    Enforced,
}

/// How comparison stages are sequenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationMode {
    /// Run every stage for every entry and report everything.
    #[default]
    AggregateAll,
    /// Stop after the first stage (identity, parameters, spatial) that
    /// produced a hard failure.
    FailFast,
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AggregateAll => write!(f, "aggregate-all"),
            Self::FailFast => write!(f, "fail-fast"),
        }
    }
}

impl fmt::Display for VelocityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advisory => write!(f, "advisory"),
            Self::Enforced => write!(f, "enforced"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Thresholds
// ═══════════════════════════════════════════════════════════════════════

/// Absolute per-axis tolerances, one per dimension group.
///
/// `orientation`, `acceleration` and `angularVelocity` are carried for
/// parity with entity-state checks; `WeaponFire` only exercises
/// `worldLocation` and `velocity`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub world_location: f64,
    pub orientation: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub angular_velocity: f64,
}

impl ThresholdConfig {
    pub const KEYS: [&'static str; 5] = [
        "worldLocation",
        "orientation",
        "velocity",
        "acceleration",
        "angularVelocity",
    ];

    /// Same tolerance for every group.
    pub const fn uniform(tolerance: f64) -> Self {
        Self {
            world_location: tolerance,
            orientation: tolerance,
            velocity: tolerance,
            acceleration: tolerance,
            angular_velocity: tolerance,
        }
    }

    fn values(&self) -> [f64; 5] {
        [
            self.world_location,
            self.orientation,
            self.velocity,
            self.acceleration,
            self.angular_velocity,
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in Self::KEYS.into_iter().zip(self.values()) {
            ensure!(
                value.is_finite() && value >= 0.0,
                InvalidThresholdSnafu { key, value }
            );
        }
        Ok(())
    }

    fn from_object(object: &Map<String, Value>) -> Result<Self, ConfigError> {
        for key in object.keys() {
            if !Self::KEYS.contains(&key.as_str()) {
                warn!("Ignoring unknown threshold `{}`", key);
            }
        }
        let get = |key: &str| -> Result<f64, ConfigError> {
            let value = object.get(key).context(MissingKeySnafu {
                key: format!("thresholds.{}", key),
            })?;
            f64::deserialize(value).context(WrongTypeSnafu {
                key: format!("thresholds.{}", key),
            })
        };
        let thresholds = Self {
            world_location: get("worldLocation")?,
            orientation: get("orientation")?,
            velocity: get("velocity")?,
            acceleration: get("acceleration")?,
            angular_velocity: get("angularVelocity")?,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Test-case config
// ═══════════════════════════════════════════════════════════════════════

/// Everything one run of the WeaponFire test case needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConfig {
    pub reference_dir: PathBuf,
    pub thresholds: ThresholdConfig,
    /// Length of the observation window in seconds.
    pub waiting_period: u64,
    pub velocity_policy: VelocityPolicy,
    pub mode: AggregationMode,
}

impl CheckConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).context(ReadSnafu { path })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_json(&json, base)
    }

    /// Parse a config, resolving a relative `referenceDir` against `base`.
    pub fn from_json(json: &str, base: &Path) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json).context(SyntaxSnafu)?;
        let object = value.as_object().context(NotAnObjectSnafu)?;

        let reference_dir: PathBuf = required(object, "referenceDir")?;
        let reference_dir = if reference_dir.is_relative() {
            base.join(reference_dir)
        } else {
            reference_dir
        };

        let thresholds = object
            .get("thresholds")
            .context(MissingKeySnafu { key: "thresholds" })?;
        let thresholds = Map::<String, Value>::deserialize(thresholds)
            .context(WrongTypeSnafu { key: "thresholds" })?;
        let thresholds = ThresholdConfig::from_object(&thresholds)?;

        Ok(Self {
            reference_dir,
            thresholds,
            waiting_period: required(object, "waitingPeriod")?,
            velocity_policy: optional(object, "velocityPolicy")?.unwrap_or_default(),
            mode: optional(object, "mode")?.unwrap_or_default(),
        })
    }
}

fn required<T: DeserializeOwned>(
    object: &Map<String, Value>,
    key: &str,
) -> Result<T, ConfigError> {
    optional(object, key)?.context(MissingKeySnafu { key })
}

fn optional<T: DeserializeOwned>(
    object: &Map<String, Value>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    object
        .get(key)
        .map(|value| T::deserialize(value).context(WrongTypeSnafu { key }))
        .transpose()
}
