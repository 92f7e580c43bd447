// Swerve module control core
//
// Provides:
// - Parameter registry of per-variant tuning bundles
// - Actuator capability interface with REV and CTRE adapters
// - Heading optimization
// - Module controller with runtime hardware hot-swap
// - Simulated vendor devices

pub mod actuator;
mod error;
pub mod module;
pub mod optimize;
pub mod params;
pub mod sim;
mod spark;
mod talon;
pub mod vendor;

pub use actuator::{Actuator, Role};
pub use error::{ConfigError, SwerveError};
pub use module::{ModuleIdentity, ModulePosition, ModuleState, SwerveModule};
pub use optimize::{optimize, wrap_angle};
pub use params::{DrivingVariant, ParameterBundle, ParameterRegistry, TurningVariant};
pub use sim::SimBus;
pub use vendor::{DeviceError, DeviceProvider};
