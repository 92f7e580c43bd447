// Vendor device APIs
//
// The two motor-controller families expose functionally equivalent but
// incompatible interfaces. They are modelled here as opaque capability traits
// so the adapters in spark.rs and talon.rs can be written against them and the
// transport behind them (real CAN bus or sim.rs) stays swappable.

/// Error types for vendor device communication
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    #[error("Timeout waiting for device {can_id}")]
    Timeout { can_id: u8 },

    #[error("Device {can_id} rejected request: {reason}")]
    Rejected { can_id: u8, reason: String },

    #[error("Device {can_id} is not on the bus")]
    Disconnected { can_id: u8 },

    #[error("Device {can_id} has not been configured")]
    NotConfigured { can_id: u8 },
}

pub type Result<T> = std::result::Result<T, DeviceError>;

// === REV-style controller (SPARK MAX) ===

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SparkIdleMode {
    Brake,
    Coast,
}

/// Which sensor closes the on-board loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedbackSensor {
    PrimaryEncoder,
    AbsoluteEncoder,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SparkControlType {
    Velocity,
    Position,
}

/// Full SPARK MAX configuration. Conversion factors are applied on the
/// controller, so every reading and reference is already in user units.
#[derive(Debug, Clone, PartialEq)]
pub struct SparkConfig {
    pub idle_mode: SparkIdleMode,
    pub smart_current_limit: u32,
    pub position_conversion_factor: f64,
    pub velocity_conversion_factor: f64,
    pub encoder_inverted: bool,
    pub feedback_sensor: FeedbackSensor,
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub ff: f64,
    pub min_output: f64,
    pub max_output: f64,
    /// Input range for position wrapping, if enabled
    pub position_wrapping: Option<(f64, f64)>,
}

pub trait SparkMaxApi: Send {
    /// Reset to safe parameters, then apply and persist `config`
    fn configure(&mut self, config: &SparkConfig) -> Result<()>;

    fn encoder_position(&self) -> Result<f64>;
    fn encoder_velocity(&self) -> Result<f64>;
    fn set_encoder_position(&mut self, position: f64) -> Result<()>;

    fn absolute_encoder_position(&self) -> Result<f64>;
    fn absolute_encoder_velocity(&self) -> Result<f64>;

    fn set_reference(&mut self, value: f64, control: SparkControlType) -> Result<()>;

    /// Stop output and drop the active reference
    fn disable(&mut self) -> Result<()>;
}

// === CTRE-style controller (TalonFX) ===

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NeutralMode {
    Brake,
    Coast,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Slot0 {
    pub k_p: f64,
    pub k_i: f64,
    pub k_d: f64,
    pub k_v: f64,
    pub k_a: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CurrentLimitsConfigs {
    pub supply_current_limit_enable: bool,
    pub supply_current_limit: f64,
    pub supply_current_lower_limit: f64,
    pub supply_current_lower_time: f64,
}

/// TalonFX configuration. Readings are in mechanism rotations after
/// `sensor_to_mechanism_ratio`.
#[derive(Debug, Clone, PartialEq)]
pub struct TalonConfig {
    pub sensor_to_mechanism_ratio: f64,
    pub current_limits: CurrentLimitsConfigs,
    pub slot0: Slot0,
    pub neutral_mode: NeutralMode,
    pub peak_forward_duty_cycle: f64,
    pub peak_reverse_duty_cycle: f64,
    pub continuous_wrap: bool,
}

/// Closed-loop control requests, in mechanism rotations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TalonRequest {
    VelocityVoltage { velocity: f64, enable_foc: bool },
    PositionVoltage { position: f64, enable_foc: bool },
}

pub trait TalonFxApi: Send {
    fn apply(&mut self, config: &TalonConfig) -> Result<()>;

    /// Mechanism rotations
    fn position(&self) -> Result<f64>;
    /// Mechanism rotations per second
    fn velocity(&self) -> Result<f64>;
    fn set_position(&mut self, rotations: f64) -> Result<()>;

    fn set_control(&mut self, request: TalonRequest) -> Result<()>;

    fn disable(&mut self) -> Result<()>;
}

/// Opens vendor devices on the bus by CAN id
pub trait DeviceProvider: Send + Sync {
    fn open_spark(&self, can_id: u8) -> Result<Box<dyn SparkMaxApi>>;
    fn open_talon(&self, can_id: u8) -> Result<Box<dyn TalonFxApi>>;
}
