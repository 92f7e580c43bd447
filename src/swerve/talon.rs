// Adapters for the CTRE-style TalonFX family
//
// TalonFX reports mechanism rotations, so the adapters scale by the
// bundle's conversion factors in both directions.

use tracing::debug;

use super::actuator::Actuator;
use super::params::{IdleMode, ParameterBundle};
use super::vendor::{
    CurrentLimitsConfigs, DeviceError, NeutralMode, Result, Slot0, TalonConfig, TalonFxApi,
    TalonRequest,
};

fn talon_config(bundle: &ParameterBundle) -> TalonConfig {
    let limit = &bundle.current_limit;
    TalonConfig {
        sensor_to_mechanism_ratio: bundle.sensor_to_mechanism_ratio,
        current_limits: CurrentLimitsConfigs {
            supply_current_limit_enable: limit.enabled,
            supply_current_limit: limit.limit,
            supply_current_lower_limit: limit.lower_limit,
            supply_current_lower_time: limit.lower_time,
        },
        slot0: Slot0 {
            k_p: bundle.gains.kp,
            k_i: bundle.gains.ki,
            k_d: bundle.gains.kd,
            k_v: bundle.gains.kv,
            k_a: bundle.gains.ka,
        },
        neutral_mode: match bundle.idle_mode {
            IdleMode::Brake => NeutralMode::Brake,
            IdleMode::Coast => NeutralMode::Coast,
        },
        peak_forward_duty_cycle: bundle.output_range.max,
        peak_reverse_duty_cycle: bundle.output_range.min,
        continuous_wrap: bundle.wrap.is_some(),
    }
}

/// Normalized units per mechanism rotation, captured on configure
#[derive(Debug, Clone, Copy)]
struct Scaling {
    position: f64,
    velocity: f64,
    foc: bool,
}

impl Scaling {
    fn from_bundle(bundle: &ParameterBundle) -> Self {
        Self {
            position: bundle.position_factor,
            velocity: bundle.velocity_factor,
            foc: bundle.foc,
        }
    }
}

/// Shared plumbing for both TalonFX roles
struct Talon {
    device: Box<dyn TalonFxApi>,
    can_id: u8,
    scaling: Option<Scaling>,
}

impl Talon {
    fn configure(&mut self, bundle: &ParameterBundle) -> Result<()> {
        self.device.apply(&talon_config(bundle))?;
        self.device.set_position(0.0)?;
        self.scaling = Some(Scaling::from_bundle(bundle));
        Ok(())
    }

    fn scaling(&self) -> Result<Scaling> {
        self.scaling
            .ok_or(DeviceError::NotConfigured { can_id: self.can_id })
    }

    fn position(&self) -> Result<f64> {
        let scaling = self.scaling()?;
        Ok(self.device.position()? * scaling.position)
    }

    fn velocity(&self) -> Result<f64> {
        let scaling = self.scaling()?;
        Ok(self.device.velocity()? * scaling.velocity)
    }

    fn command_velocity(&mut self, velocity: f64) -> Result<()> {
        let scaling = self.scaling()?;
        self.device.set_control(TalonRequest::VelocityVoltage {
            velocity: velocity / scaling.velocity,
            enable_foc: scaling.foc,
        })
    }

    fn command_position(&mut self, position: f64) -> Result<()> {
        let scaling = self.scaling()?;
        self.device.set_control(TalonRequest::PositionVoltage {
            position: position / scaling.position,
            enable_foc: scaling.foc,
        })
    }
}

/// VariantB/C/D: Kraken X60, Kraken X60 FOC and Falcon driving.
/// The profiles differ only in their bundles.
pub struct TalonDriving(Talon);

impl TalonDriving {
    pub fn new(device: Box<dyn TalonFxApi>, can_id: u8) -> Self {
        Self(Talon {
            device,
            can_id,
            scaling: None,
        })
    }
}

impl Actuator for TalonDriving {
    fn configure(&mut self, bundle: &ParameterBundle) -> Result<()> {
        debug!("Configuring TalonFX {} for driving", self.0.can_id);
        self.0.configure(bundle)
    }

    fn position(&self) -> Result<f64> {
        self.0.position()
    }

    fn velocity(&self) -> Result<f64> {
        self.0.velocity()
    }

    fn command_velocity(&mut self, velocity: f64) -> Result<()> {
        self.0.command_velocity(velocity)
    }

    fn command_position(&mut self, position: f64) -> Result<()> {
        self.0.command_position(position)
    }

    fn disable(&mut self) -> Result<()> {
        self.0.device.disable()
    }

    fn can_id(&self) -> u8 {
        self.0.can_id
    }
}

/// VariantF: Falcon turning on the integrated encoder, zeroed on configure
pub struct TalonTurning(Talon);

impl TalonTurning {
    pub fn new(device: Box<dyn TalonFxApi>, can_id: u8) -> Self {
        Self(Talon {
            device,
            can_id,
            scaling: None,
        })
    }
}

impl Actuator for TalonTurning {
    fn configure(&mut self, bundle: &ParameterBundle) -> Result<()> {
        debug!("Configuring TalonFX {} for turning", self.0.can_id);
        self.0.configure(bundle)
    }

    fn position(&self) -> Result<f64> {
        self.0.position()
    }

    fn velocity(&self) -> Result<f64> {
        self.0.velocity()
    }

    fn command_velocity(&mut self, velocity: f64) -> Result<()> {
        self.0.command_velocity(velocity)
    }

    fn command_position(&mut self, position: f64) -> Result<()> {
        self.0.command_position(position)
    }

    fn disable(&mut self) -> Result<()> {
        self.0.device.disable()
    }

    fn can_id(&self) -> u8 {
        self.0.can_id
    }
}
