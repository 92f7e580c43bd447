// Actuator capability interface
//
// Every hardware variant is a concrete type behind `Actuator`. Units are
// normalized at this boundary: driving actuators speak meters and m/s,
// turning actuators speak radians and rad/s.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::params::{DrivingVariant, ParameterBundle, TurningVariant};
use super::spark::{SparkDriving, SparkTurning};
use super::talon::{TalonDriving, TalonTurning};
use super::vendor::{DeviceProvider, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Driving,
    Turning,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Driving => f.write_str("driving"),
            Role::Turning => f.write_str("turning"),
        }
    }
}

pub trait Actuator: Send {
    /// Apply `bundle` to the device. Driving actuators also zero their
    /// accumulated position.
    fn configure(&mut self, bundle: &ParameterBundle) -> Result<()>;

    fn position(&self) -> Result<f64>;
    fn velocity(&self) -> Result<f64>;

    fn command_velocity(&mut self, velocity: f64) -> Result<()>;
    fn command_position(&mut self, position: f64) -> Result<()>;

    /// Drop any closed-loop target. The only call made on an actuator
    /// that is about to be discarded.
    fn disable(&mut self) -> Result<()>;

    fn can_id(&self) -> u8;
}

/// Open and configure the driving actuator for `variant`
pub fn open_driving(
    provider: &dyn DeviceProvider,
    variant: DrivingVariant,
    can_id: u8,
    bundle: &ParameterBundle,
) -> Result<Box<dyn Actuator>> {
    let mut actuator: Box<dyn Actuator> = match variant {
        DrivingVariant::Neo => Box::new(SparkDriving::new(provider.open_spark(can_id)?, can_id)),
        DrivingVariant::KrakenX60 | DrivingVariant::KrakenX60Foc | DrivingVariant::Falcon => {
            Box::new(TalonDriving::new(provider.open_talon(can_id)?, can_id))
        }
    };
    actuator.configure(bundle)?;
    Ok(actuator)
}

/// Open and configure the turning actuator for `variant`
pub fn open_turning(
    provider: &dyn DeviceProvider,
    variant: TurningVariant,
    can_id: u8,
    bundle: &ParameterBundle,
) -> Result<Box<dyn Actuator>> {
    let mut actuator: Box<dyn Actuator> = match variant {
        TurningVariant::Neo550 => Box::new(SparkTurning::new(provider.open_spark(can_id)?, can_id)),
        TurningVariant::Falcon => Box::new(TalonTurning::new(provider.open_talon(can_id)?, can_id)),
    };
    actuator.configure(bundle)?;
    Ok(actuator)
}
