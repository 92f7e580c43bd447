// Parameter registry: immutable tuning bundles keyed by hardware variant
//
// Built once at startup (see `ParameterRegistry::standard`) and shared
// read-only with every module through an `Arc`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::actuator::Role;
use super::error::ConfigError;
use crate::config;

/// Motor-controller family behind a variant. Variants of the same family
/// share the physical device on a given CAN id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controller {
    SparkMax,
    TalonFx,
}

/// Driving hardware: one REV family (Neo) and three CTRE profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrivingVariant {
    Neo,
    KrakenX60,
    KrakenX60Foc,
    Falcon,
}

impl DrivingVariant {
    pub const ALL: [DrivingVariant; 4] = [
        DrivingVariant::Neo,
        DrivingVariant::KrakenX60,
        DrivingVariant::KrakenX60Foc,
        DrivingVariant::Falcon,
    ];

    pub fn controller(self) -> Controller {
        match self {
            DrivingVariant::Neo => Controller::SparkMax,
            DrivingVariant::KrakenX60 | DrivingVariant::KrakenX60Foc | DrivingVariant::Falcon => {
                Controller::TalonFx
            }
        }
    }
}

impl fmt::Display for DrivingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DrivingVariant::Neo => "NEO",
            DrivingVariant::KrakenX60 => "Kraken X60",
            DrivingVariant::KrakenX60Foc => "Kraken X60 FOC",
            DrivingVariant::Falcon => "Falcon",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurningVariant {
    Neo550,
    Falcon,
}

impl TurningVariant {
    pub const ALL: [TurningVariant; 2] = [TurningVariant::Neo550, TurningVariant::Falcon];

    pub fn controller(self) -> Controller {
        match self {
            TurningVariant::Neo550 => Controller::SparkMax,
            TurningVariant::Falcon => Controller::TalonFx,
        }
    }
}

impl fmt::Display for TurningVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurningVariant::Neo550 => "NEO 550",
            TurningVariant::Falcon => "Falcon",
        };
        f.write_str(name)
    }
}

/// Registry key: a variant together with the role it fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKey {
    Driving(DrivingVariant),
    Turning(TurningVariant),
}

impl VariantKey {
    pub fn role(&self) -> Role {
        match self {
            VariantKey::Driving(_) => Role::Driving,
            VariantKey::Turning(_) => Role::Turning,
        }
    }

    /// Every variant the hardware layer knows how to drive
    pub fn all() -> impl Iterator<Item = VariantKey> {
        DrivingVariant::ALL
            .into_iter()
            .map(VariantKey::Driving)
            .chain(TurningVariant::ALL.into_iter().map(VariantKey::Turning))
    }

    fn variant_name(&self) -> String {
        match self {
            VariantKey::Driving(v) => v.to_string(),
            VariantKey::Turning(v) => v.to_string(),
        }
    }
}

impl From<DrivingVariant> for VariantKey {
    fn from(variant: DrivingVariant) -> Self {
        VariantKey::Driving(variant)
    }
}

impl From<TurningVariant> for VariantKey {
    fn from(variant: TurningVariant) -> Self {
        VariantKey::Turning(variant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Velocity feed-forward
    pub kv: f64,
    pub ka: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentLimit {
    pub enabled: bool,
    /// Amps
    pub limit: f64,
    /// Amps, applied after `lower_time` seconds at `limit`
    pub lower_limit: f64,
    pub lower_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleMode {
    Brake,
    Coast,
}

/// Closed-loop input range for continuous angle wrapping (radians)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WrapRange {
    pub min: f64,
    pub max: f64,
}

/// Tuning for one (role, variant) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterBundle {
    pub gains: Gains,
    pub output_range: OutputRange,
    pub current_limit: CurrentLimit,
    /// Normalized units (meters or radians) per encoder unit
    pub position_factor: f64,
    pub velocity_factor: f64,
    pub sensor_to_mechanism_ratio: f64,
    pub idle_mode: IdleMode,
    pub encoder_inverted: bool,
    /// Field-oriented commutation on velocity requests (driving only)
    pub foc: bool,
    /// Continuous wrap (turning only)
    pub wrap: Option<WrapRange>,
}

impl ParameterBundle {
    /// Check the bundle's invariants for the given role
    pub fn validate(&self, role: Role) -> Result<(), String> {
        let OutputRange { min, max } = self.output_range;
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(format!("output range [{}, {}] is not ordered", min, max));
        }

        let limit = &self.current_limit;
        for (name, value) in [
            ("limit", limit.limit),
            ("lower_limit", limit.lower_limit),
            ("lower_time", limit.lower_time),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(format!("current {} must be non-negative, got {}", name, value));
            }
        }

        for (name, value) in [
            ("position_factor", self.position_factor),
            ("velocity_factor", self.velocity_factor),
            ("sensor_to_mechanism_ratio", self.sensor_to_mechanism_ratio),
        ] {
            if value == 0.0 || !value.is_finite() {
                return Err(format!("{} must be non-zero, got {}", name, value));
            }
        }

        match (role, self.wrap) {
            (Role::Driving, Some(_)) => {
                return Err("continuous wrap is only valid for turning".to_string());
            }
            (Role::Turning, Some(WrapRange { min, max })) if !(min < max) => {
                return Err(format!("wrap range [{}, {}] is empty", min, max));
            }
            _ => {}
        }

        if role == Role::Turning && self.foc {
            return Err("FOC is only valid for driving".to_string());
        }

        Ok(())
    }
}

/// Immutable lookup from (role, variant) to tuning
#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    bundles: HashMap<VariantKey, ParameterBundle>,
}

impl ParameterRegistry {
    /// Build a registry, validating every bundle
    pub fn new(
        bundles: impl IntoIterator<Item = (VariantKey, ParameterBundle)>,
    ) -> Result<Self, ConfigError> {
        let bundles: HashMap<_, _> = bundles.into_iter().collect();

        for (key, bundle) in &bundles {
            bundle
                .validate(key.role())
                .map_err(|reason| ConfigError::InvalidBundle {
                    role: key.role(),
                    variant: key.variant_name(),
                    reason,
                })?;
        }

        Ok(Self { bundles })
    }

    /// Registry populated from the tuning constants in `config`
    pub fn standard() -> Result<Self, ConfigError> {
        let registry = Self::new([
            (VariantKey::Driving(DrivingVariant::Neo), config::NEO_DRIVING),
            (VariantKey::Driving(DrivingVariant::KrakenX60), config::KRAKEN_X60_DRIVING),
            (VariantKey::Driving(DrivingVariant::KrakenX60Foc), config::KRAKEN_X60_FOC_DRIVING),
            (VariantKey::Driving(DrivingVariant::Falcon), config::FALCON_DRIVING),
            (VariantKey::Turning(TurningVariant::Neo550), config::NEO_550_TURNING),
            (VariantKey::Turning(TurningVariant::Falcon), config::FALCON_TURNING),
        ])?;
        registry.require_complete()?;
        Ok(registry)
    }

    /// Fail on the first declared variant without a bundle
    pub fn require_complete(&self) -> Result<(), ConfigError> {
        for key in VariantKey::all() {
            self.bundle_for(key)?;
        }
        Ok(())
    }

    pub fn bundle_for(&self, key: impl Into<VariantKey>) -> Result<&ParameterBundle, ConfigError> {
        let key = key.into();
        self.bundles.get(&key).ok_or_else(|| ConfigError::MissingBundle {
            role: key.role(),
            variant: key.variant_name(),
        })
    }
}
