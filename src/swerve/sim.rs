// Simulated vendor devices
//
// Ideal actuators behind both vendor APIs: position references are reached
// immediately, velocity references integrate into position on `step`. Every
// device keeps a command log and call counters and can be told to fail, which
// is what the tests and the runtime's simulated bus rely on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use super::vendor::{
    DeviceError, DeviceProvider, Result, SparkConfig, SparkControlType, SparkMaxApi, TalonConfig,
    TalonFxApi, TalonRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    Spark,
    Talon,
}

/// A command as it reached the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimCommand {
    Spark { value: f64, control: SparkControlType },
    Talon(TalonRequest),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Setpoint {
    Velocity(f64),
    Position(f64),
}

#[derive(Debug, Default)]
pub struct SimState {
    /// Device units: converted units for SPARK, mechanism rotations for TalonFX
    pub position: f64,
    pub velocity: f64,
    pub spark_config: Option<SparkConfig>,
    pub talon_config: Option<TalonConfig>,
    pub commands: Vec<SimCommand>,
    pub open_count: u32,
    pub configure_count: u32,
    pub disable_count: u32,

    // Fault injection
    pub offline: bool,
    pub fail_configure: bool,
    pub fail_commands: bool,
    pub fail_reads: bool,
    pub fail_disable: bool,
    /// Only resetting the position fails; configuration itself is accepted
    pub fail_zeroing: bool,

    setpoint: Option<Setpoint>,
}

impl SimState {
    pub fn is_configured(&self) -> bool {
        self.spark_config.is_some() || self.talon_config.is_some()
    }

    /// True while a closed-loop reference is being followed
    pub fn is_active(&self) -> bool {
        self.setpoint.is_some()
    }

    fn follow(&mut self, setpoint: Setpoint) {
        match setpoint {
            Setpoint::Velocity(v) => self.velocity = v,
            Setpoint::Position(p) => {
                self.position = p;
                self.velocity = 0.0;
            }
        }
        self.setpoint = Some(setpoint);
    }

    fn step(&mut self, dt: f64) {
        if let Some(Setpoint::Velocity(v)) = self.setpoint {
            self.position += v * dt;
        }
    }
}

/// Shared handle onto one simulated device
#[derive(Debug, Clone, Default)]
pub struct SimHandle {
    can_id: u8,
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    pub fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, value: impl FnOnce(&SimState) -> f64) -> Result<f64> {
        let state = self.lock();
        if state.fail_reads {
            return Err(DeviceError::Timeout { can_id: self.can_id });
        }
        Ok(value(&state))
    }

    fn command(&self, command: SimCommand, setpoint: Setpoint) -> Result<()> {
        let mut state = self.lock();
        if state.fail_commands {
            return Err(DeviceError::Timeout { can_id: self.can_id });
        }
        if !state.is_configured() {
            return Err(DeviceError::NotConfigured { can_id: self.can_id });
        }
        state.commands.push(command);
        state.follow(setpoint);
        Ok(())
    }

    fn disable(&self) -> Result<()> {
        let mut state = self.lock();
        if state.fail_disable {
            return Err(DeviceError::Timeout { can_id: self.can_id });
        }
        state.disable_count += 1;
        state.setpoint = None;
        state.velocity = 0.0;
        Ok(())
    }

    fn check_configure(&self) -> Result<MutexGuard<'_, SimState>> {
        let mut state = self.lock();
        if state.fail_configure {
            return Err(DeviceError::Rejected {
                can_id: self.can_id,
                reason: "configuration not acknowledged".to_string(),
            });
        }
        state.configure_count += 1;
        state.setpoint = None;
        Ok(state)
    }

    fn set_position(&self, position: f64) -> Result<()> {
        let mut state = self.lock();
        if state.fail_configure || state.fail_zeroing {
            return Err(DeviceError::Timeout { can_id: self.can_id });
        }
        state.position = position;
        Ok(())
    }
}

pub struct SimSpark(SimHandle);

impl SparkMaxApi for SimSpark {
    fn configure(&mut self, config: &SparkConfig) -> Result<()> {
        let mut state = self.0.check_configure()?;
        state.spark_config = Some(config.clone());
        Ok(())
    }

    fn encoder_position(&self) -> Result<f64> {
        self.0.read(|s| s.position)
    }

    fn encoder_velocity(&self) -> Result<f64> {
        self.0.read(|s| s.velocity)
    }

    fn set_encoder_position(&mut self, position: f64) -> Result<()> {
        self.0.set_position(position)
    }

    fn absolute_encoder_position(&self) -> Result<f64> {
        self.0.read(|s| s.position)
    }

    fn absolute_encoder_velocity(&self) -> Result<f64> {
        self.0.read(|s| s.velocity)
    }

    fn set_reference(&mut self, value: f64, control: SparkControlType) -> Result<()> {
        let setpoint = match control {
            SparkControlType::Velocity => Setpoint::Velocity(value),
            SparkControlType::Position => Setpoint::Position(value),
        };
        self.0.command(SimCommand::Spark { value, control }, setpoint)
    }

    fn disable(&mut self) -> Result<()> {
        self.0.disable()
    }
}

pub struct SimTalon(SimHandle);

impl TalonFxApi for SimTalon {
    fn apply(&mut self, config: &TalonConfig) -> Result<()> {
        let mut state = self.0.check_configure()?;
        state.talon_config = Some(config.clone());
        Ok(())
    }

    fn position(&self) -> Result<f64> {
        self.0.read(|s| s.position)
    }

    fn velocity(&self) -> Result<f64> {
        self.0.read(|s| s.velocity)
    }

    fn set_position(&mut self, rotations: f64) -> Result<()> {
        self.0.set_position(rotations)
    }

    fn set_control(&mut self, request: TalonRequest) -> Result<()> {
        let setpoint = match request {
            TalonRequest::VelocityVoltage { velocity, .. } => Setpoint::Velocity(velocity),
            TalonRequest::PositionVoltage { position, .. } => Setpoint::Position(position),
        };
        self.0.command(SimCommand::Talon(request), setpoint)
    }

    fn disable(&mut self) -> Result<()> {
        self.0.disable()
    }
}

/// Simulated CAN bus. One device per (family, CAN id); reopening an id
/// returns a new handle onto the same device.
#[derive(Debug, Default)]
pub struct SimBus {
    devices: Mutex<HashMap<(DeviceFamily, u8), SimHandle>>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle onto a device, creating it if nothing has touched it yet
    pub fn device(&self, family: DeviceFamily, can_id: u8) -> SimHandle {
        let mut devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        devices
            .entry((family, can_id))
            .or_insert_with(|| SimHandle {
                can_id,
                ..SimHandle::default()
            })
            .clone()
    }

    /// Advance every device by `dt`
    pub fn step(&self, dt: Duration) {
        let devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in devices.values() {
            handle.lock().step(dt.as_secs_f64());
        }
    }

    fn open(&self, family: DeviceFamily, can_id: u8) -> Result<SimHandle> {
        let handle = self.device(family, can_id);
        let mut state = handle.lock();
        if state.offline {
            return Err(DeviceError::Disconnected { can_id });
        }
        state.open_count += 1;
        debug!("Opened simulated {:?} device {}", family, can_id);
        drop(state);
        Ok(handle)
    }
}

impl DeviceProvider for SimBus {
    fn open_spark(&self, can_id: u8) -> Result<Box<dyn SparkMaxApi>> {
        Ok(Box::new(SimSpark(self.open(DeviceFamily::Spark, can_id)?)))
    }

    fn open_talon(&self, can_id: u8) -> Result<Box<dyn TalonFxApi>> {
        Ok(Box::new(SimTalon(self.open(DeviceFamily::Talon, can_id)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::swerve::actuator::Actuator;
    use crate::swerve::spark::SparkDriving;
    use crate::swerve::talon::TalonDriving;

    #[test]
    fn test_commands_require_configuration() {
        let bus = SimBus::new();
        let mut spark = bus.open_spark(1).unwrap();
        assert_eq!(
            spark.set_reference(1.0, SparkControlType::Velocity),
            Err(DeviceError::NotConfigured { can_id: 1 })
        );
    }

    #[test]
    fn test_velocity_integrates_on_step() {
        let bus = SimBus::new();
        let mut actuator = TalonDriving::new(bus.open_talon(4).unwrap(), 4);
        actuator.configure(&config::FALCON_DRIVING).unwrap();

        actuator.command_velocity(2.0).unwrap();
        bus.step(Duration::from_millis(500));
        assert!((actuator.position().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disable_drops_reference() {
        let bus = SimBus::new();
        let mut actuator = SparkDriving::new(bus.open_spark(5).unwrap(), 5);
        actuator.configure(&config::NEO_DRIVING).unwrap();

        let handle = bus.device(DeviceFamily::Spark, 5);
        actuator.command_velocity(3.0).unwrap();
        assert!(handle.lock().is_active());

        actuator.disable().unwrap();
        let state = handle.lock();
        assert!(!state.is_active());
        assert_eq!(state.velocity, 0.0);
        assert_eq!(state.disable_count, 1);
    }

    #[test]
    fn test_offline_device_cannot_open() {
        let bus = SimBus::new();
        bus.device(DeviceFamily::Talon, 9).lock().offline = true;
        assert_eq!(
            bus.open_talon(9).err(),
            Some(DeviceError::Disconnected { can_id: 9 })
        );
    }
}
