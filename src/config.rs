// Timeouts, topics, module layout and standard tuning values
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::time::Duration;

use crate::swerve::params::{
    CurrentLimit, Gains, IdleMode, OutputRange, ParameterBundle, WrapRange,
};
use crate::swerve::{DrivingVariant, ModuleIdentity, TurningVariant};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for the per-module watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Consecutive failed ticks before a module is reported degraded
pub const DEGRADED_AFTER_FAILURES: u32 = 10;

// Below this speed (m/s) the wheel keeps its current heading
pub const SPEED_EPSILON: f64 = 1e-3;

// Zenoh topics
pub const TOPIC_CMD_MODULE: &str = "swerve/cmd/module"; // per-module targets
pub const TOPIC_CMD_VARIANT: &str = "swerve/cmd/variant"; // hot-swap requests
pub const TOPIC_STATE_MODULES: &str = "swerve/state/modules"; // telemetry

// Hardware bound at module construction
pub const DEFAULT_DRIVING_VARIANT: DrivingVariant = DrivingVariant::Neo;
pub const DEFAULT_TURNING_VARIANT: TurningVariant = TurningVariant::Neo550;

/// CAN ids and mounting offsets of the four corners
pub fn module_identities() -> [ModuleIdentity; 4] {
    [
        ModuleIdentity::new("front_left", 2, 3, -FRAC_PI_2),
        ModuleIdentity::new("front_right", 4, 5, 0.0),
        ModuleIdentity::new("rear_left", 6, 7, PI),
        ModuleIdentity::new("rear_right", 8, 9, FRAC_PI_2),
    ]
}

// Wheel geometry shared by every driving variant
const WHEEL_DIAMETER_M: f64 = 0.0762;
const WHEEL_CIRCUMFERENCE_M: f64 = WHEEL_DIAMETER_M * PI;
// 14T pinion, 22T spur, 45:15 bevel
const DRIVING_REDUCTION: f64 = (45.0 * 22.0) / (14.0 * 15.0);
// Falcon turning stage
const TURNING_REDUCTION: f64 = 150.0 / 7.0;

// NEO free speed: 5676 rpm
const NEO_FREE_SPEED_MPS: f64 = 5676.0 / 60.0 * WHEEL_CIRCUMFERENCE_M / DRIVING_REDUCTION;

/// VariantA: NEO on a SPARK MAX, primary encoder
pub const NEO_DRIVING: ParameterBundle = ParameterBundle {
    gains: Gains { kp: 0.04, ki: 0.0, kd: 0.0, kv: 1.0 / NEO_FREE_SPEED_MPS, ka: 0.0 },
    output_range: OutputRange { min: -1.0, max: 1.0 },
    current_limit: CurrentLimit { enabled: true, limit: 50.0, lower_limit: 50.0, lower_time: 0.0 },
    // meters per motor rotation, m/s per rpm
    position_factor: WHEEL_CIRCUMFERENCE_M / DRIVING_REDUCTION,
    velocity_factor: WHEEL_CIRCUMFERENCE_M / DRIVING_REDUCTION / 60.0,
    sensor_to_mechanism_ratio: 1.0,
    idle_mode: IdleMode::Brake,
    encoder_inverted: false,
    foc: false,
    wrap: None,
};

/// VariantB: Kraken X60 on a TalonFX
pub const KRAKEN_X60_DRIVING: ParameterBundle = ParameterBundle {
    gains: Gains { kp: 0.1, ki: 0.0, kd: 0.0, kv: 0.12, ka: 0.01 },
    output_range: OutputRange { min: -1.0, max: 1.0 },
    current_limit: CurrentLimit { enabled: true, limit: 70.0, lower_limit: 40.0, lower_time: 1.0 },
    // meters per wheel rotation
    position_factor: WHEEL_CIRCUMFERENCE_M,
    velocity_factor: WHEEL_CIRCUMFERENCE_M,
    sensor_to_mechanism_ratio: DRIVING_REDUCTION,
    idle_mode: IdleMode::Brake,
    encoder_inverted: false,
    foc: false,
    wrap: None,
};

/// VariantC: Kraken X60 with field-oriented commutation
pub const KRAKEN_X60_FOC_DRIVING: ParameterBundle = ParameterBundle {
    gains: Gains { kp: 0.12, ki: 0.0, kd: 0.0, kv: 0.125, ka: 0.01 },
    output_range: OutputRange { min: -1.0, max: 1.0 },
    current_limit: CurrentLimit { enabled: true, limit: 70.0, lower_limit: 40.0, lower_time: 1.0 },
    position_factor: WHEEL_CIRCUMFERENCE_M,
    velocity_factor: WHEEL_CIRCUMFERENCE_M,
    sensor_to_mechanism_ratio: DRIVING_REDUCTION,
    idle_mode: IdleMode::Brake,
    encoder_inverted: false,
    foc: true,
    wrap: None,
};

/// VariantD: Falcon 500 on a TalonFX
pub const FALCON_DRIVING: ParameterBundle = ParameterBundle {
    gains: Gains { kp: 0.1, ki: 0.0, kd: 0.0, kv: 0.11, ka: 0.0 },
    output_range: OutputRange { min: -1.0, max: 1.0 },
    current_limit: CurrentLimit { enabled: true, limit: 60.0, lower_limit: 40.0, lower_time: 1.0 },
    position_factor: WHEEL_CIRCUMFERENCE_M,
    velocity_factor: WHEEL_CIRCUMFERENCE_M,
    sensor_to_mechanism_ratio: DRIVING_REDUCTION,
    idle_mode: IdleMode::Brake,
    encoder_inverted: false,
    foc: false,
    wrap: None,
};

/// VariantE: NEO 550 on a SPARK MAX, through-bore absolute encoder
pub const NEO_550_TURNING: ParameterBundle = ParameterBundle {
    gains: Gains { kp: 1.0, ki: 0.0, kd: 0.0, kv: 0.0, ka: 0.0 },
    output_range: OutputRange { min: -1.0, max: 1.0 },
    current_limit: CurrentLimit { enabled: true, limit: 20.0, lower_limit: 20.0, lower_time: 0.0 },
    // radians, rad/s
    position_factor: TAU,
    velocity_factor: TAU / 60.0,
    sensor_to_mechanism_ratio: 1.0,
    idle_mode: IdleMode::Brake,
    // output shaft rotates opposite the steering motor
    encoder_inverted: true,
    foc: false,
    wrap: Some(WrapRange { min: 0.0, max: TAU }),
};

/// VariantF: Falcon 500 on a TalonFX, integrated encoder
pub const FALCON_TURNING: ParameterBundle = ParameterBundle {
    gains: Gains { kp: 24.0, ki: 0.0, kd: 0.1, kv: 0.0, ka: 0.0 },
    output_range: OutputRange { min: -1.0, max: 1.0 },
    current_limit: CurrentLimit { enabled: true, limit: 30.0, lower_limit: 20.0, lower_time: 0.5 },
    // radians per module rotation
    position_factor: TAU,
    velocity_factor: TAU,
    sensor_to_mechanism_ratio: TURNING_REDUCTION,
    idle_mode: IdleMode::Brake,
    encoder_inverted: false,
    foc: false,
    wrap: Some(WrapRange { min: -PI, max: PI }),
};
