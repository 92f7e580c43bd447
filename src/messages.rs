// Message types exchanged by the runtime

use serde::{Deserialize, Serialize};

use crate::swerve::{DrivingVariant, ModuleState, TurningVariant};

// Per-module target from the drivetrain -> runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleCommand {
    pub module: String,
    pub speed: f64,   // m/s
    pub heading: f64, // rad, chassis-relative
}

impl From<&ModuleCommand> for ModuleState {
    fn from(cmd: &ModuleCommand) -> Self {
        Self {
            speed: cmd.speed,
            heading: cmd.heading,
        }
    }
}

// Hardware swap request from operator/diagnostic tools
// `module: None` addresses every module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantRequest {
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub driving: Option<DrivingVariant>,
    #[serde(default)]
    pub turning: Option<TurningVariant>,
}

/// Health status of one module
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ModuleHealth {
    Ok,
    CmdStale,
    /// Too many consecutive failed ticks
    Degraded,
}

/// Telemetry published by the runtime each tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleTelemetry {
    pub module: String,
    pub health: ModuleHealth,
    pub driving: DrivingVariant,
    pub turning: TurningVariant,
    pub consecutive_failures: u32,
    // None when the readback itself failed
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub distance: Option<f64>,
    pub last_error: Option<String>,
}
