// Adapters for the REV-style SPARK MAX family
//
// Conversion factors are pushed into the controller on configure, so the
// device already reports and accepts meters (driving) or radians (turning).

use tracing::debug;

use super::actuator::Actuator;
use super::params::{IdleMode, ParameterBundle, WrapRange};
use super::vendor::{FeedbackSensor, Result, SparkConfig, SparkControlType, SparkIdleMode, SparkMaxApi};

fn spark_config(bundle: &ParameterBundle, feedback_sensor: FeedbackSensor) -> SparkConfig {
    SparkConfig {
        idle_mode: match bundle.idle_mode {
            IdleMode::Brake => SparkIdleMode::Brake,
            IdleMode::Coast => SparkIdleMode::Coast,
        },
        // Smart current limit takes whole amps
        smart_current_limit: bundle.current_limit.limit.round() as u32,
        position_conversion_factor: bundle.position_factor,
        velocity_conversion_factor: bundle.velocity_factor,
        encoder_inverted: bundle.encoder_inverted,
        feedback_sensor,
        p: bundle.gains.kp,
        i: bundle.gains.ki,
        d: bundle.gains.kd,
        ff: bundle.gains.kv,
        min_output: bundle.output_range.min,
        max_output: bundle.output_range.max,
        position_wrapping: bundle.wrap.map(|w| (w.min, w.max)),
    }
}

/// VariantA: NEO driving on the primary (relative) encoder
pub struct SparkDriving {
    device: Box<dyn SparkMaxApi>,
    can_id: u8,
}

impl SparkDriving {
    pub fn new(device: Box<dyn SparkMaxApi>, can_id: u8) -> Self {
        Self { device, can_id }
    }
}

impl Actuator for SparkDriving {
    fn configure(&mut self, bundle: &ParameterBundle) -> Result<()> {
        debug!("Configuring SPARK MAX {} for driving", self.can_id);
        self.device
            .configure(&spark_config(bundle, FeedbackSensor::PrimaryEncoder))?;
        self.device.set_encoder_position(0.0)
    }

    fn position(&self) -> Result<f64> {
        self.device.encoder_position()
    }

    fn velocity(&self) -> Result<f64> {
        self.device.encoder_velocity()
    }

    fn command_velocity(&mut self, velocity: f64) -> Result<()> {
        self.device.set_reference(velocity, SparkControlType::Velocity)
    }

    fn command_position(&mut self, position: f64) -> Result<()> {
        self.device.set_reference(position, SparkControlType::Position)
    }

    fn disable(&mut self) -> Result<()> {
        self.device.disable()
    }

    fn can_id(&self) -> u8 {
        self.can_id
    }
}

/// VariantE: NEO 550 turning on the absolute encoder
pub struct SparkTurning {
    device: Box<dyn SparkMaxApi>,
    can_id: u8,
    wrap: Option<WrapRange>,
}

impl SparkTurning {
    pub fn new(device: Box<dyn SparkMaxApi>, can_id: u8) -> Self {
        Self {
            device,
            can_id,
            wrap: None,
        }
    }
}

impl Actuator for SparkTurning {
    fn configure(&mut self, bundle: &ParameterBundle) -> Result<()> {
        debug!("Configuring SPARK MAX {} for turning", self.can_id);
        self.device
            .configure(&spark_config(bundle, FeedbackSensor::AbsoluteEncoder))?;
        self.wrap = bundle.wrap;
        Ok(())
    }

    fn position(&self) -> Result<f64> {
        self.device.absolute_encoder_position()
    }

    fn velocity(&self) -> Result<f64> {
        self.device.absolute_encoder_velocity()
    }

    fn command_velocity(&mut self, velocity: f64) -> Result<()> {
        self.device.set_reference(velocity, SparkControlType::Velocity)
    }

    /// The absolute encoder only covers the wrap range, so references are
    /// folded into it before they are sent.
    fn command_position(&mut self, position: f64) -> Result<()> {
        let reference = match self.wrap {
            Some(WrapRange { min, max }) => min + (position - min).rem_euclid(max - min),
            None => position,
        };
        self.device.set_reference(reference, SparkControlType::Position)
    }

    fn disable(&mut self) -> Result<()> {
        self.device.disable()
    }

    fn can_id(&self) -> u8 {
        self.can_id
    }
}
