// Error taxonomy for the swerve module core

use super::actuator::Role;
use super::vendor::DeviceError;

/// Bad or incomplete tuning configuration. Fatal at startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("No parameter bundle declared for {role} variant {variant}")]
    MissingBundle { role: Role, variant: String },

    #[error("Invalid parameter bundle for {role} variant {variant}: {reason}")]
    InvalidBundle {
        role: Role,
        variant: String,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SwerveError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// An actuator could not be brought up while constructing a module
    #[error("Failed to set up {role} actuator {variant} on CAN {can_id}: {source}")]
    ActuatorSetup {
        role: Role,
        variant: String,
        can_id: u8,
        #[source]
        source: DeviceError,
    },

    /// The previous binding is still installed
    #[error("Hot-swap of {role} actuator to {requested} failed, keeping {kept}: {source}")]
    HotSwap {
        role: Role,
        requested: String,
        kept: String,
        #[source]
        source: DeviceError,
    },

    #[error("Command to {role} actuator on CAN {can_id} failed: {source}")]
    Command {
        role: Role,
        can_id: u8,
        #[source]
        source: DeviceError,
    },

    #[error("Invalid target: speed={speed}, heading={heading}")]
    InvalidTarget { speed: f64, heading: f64 },
}

pub type Result<T> = std::result::Result<T, SwerveError>;
