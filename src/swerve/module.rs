// Swerve module controller
//
// Owns the active driving and turning actuators of one corner. The runtime
// calls `apply_target` once per tick; hot-swaps replace an actuator in place
// without touching the rest of the loop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::actuator::{open_driving, open_turning, Actuator, Role};
use super::error::{Result, SwerveError};
use super::optimize::{optimize, wrap_angle};
use super::params::{DrivingVariant, ParameterRegistry, TurningVariant, VariantKey};
use super::vendor::{DeviceError, DeviceProvider};
use crate::config::{DEFAULT_DRIVING_VARIANT, DEFAULT_TURNING_VARIANT, SPEED_EPSILON};

/// Wheel speed (m/s, signed) and chassis-relative heading (radians)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleState {
    pub speed: f64,
    pub heading: f64,
}

/// Distance travelled (m) and chassis-relative heading (radians)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModulePosition {
    pub distance: f64,
    pub heading: f64,
}

/// Hardware addresses and mounting offset of one corner
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleIdentity {
    pub name: String,
    pub driving_can_id: u8,
    pub turning_can_id: u8,
    /// Angle of the turning actuator's zero relative to chassis forward
    pub angular_offset: f64,
}

impl ModuleIdentity {
    pub fn new(
        name: impl Into<String>,
        driving_can_id: u8,
        turning_can_id: u8,
        angular_offset: f64,
    ) -> Self {
        Self {
            name: name.into(),
            driving_can_id,
            turning_can_id,
            angular_offset,
        }
    }
}

/// An actuator together with the variant it was built for
struct Binding<V> {
    variant: V,
    actuator: Box<dyn Actuator>,
}

pub struct SwerveModule {
    identity: ModuleIdentity,
    registry: Arc<ParameterRegistry>,
    provider: Arc<dyn DeviceProvider>,
    driving: Binding<DrivingVariant>,
    turning: Binding<TurningVariant>,
}

impl SwerveModule {
    /// Bring up a module on the default hardware
    pub fn new(
        identity: ModuleIdentity,
        registry: Arc<ParameterRegistry>,
        provider: Arc<dyn DeviceProvider>,
    ) -> Result<Self> {
        Self::with_variants(
            identity,
            registry,
            provider,
            DEFAULT_DRIVING_VARIANT,
            DEFAULT_TURNING_VARIANT,
        )
    }

    /// Bring up a module on the given hardware
    ///
    /// Both bundles are looked up before any device is opened, so a missing
    /// bundle fails without side effects.
    pub fn with_variants(
        identity: ModuleIdentity,
        registry: Arc<ParameterRegistry>,
        provider: Arc<dyn DeviceProvider>,
        driving: DrivingVariant,
        turning: TurningVariant,
    ) -> Result<Self> {
        let driving_bundle = registry.bundle_for(driving)?;
        let turning_bundle = registry.bundle_for(turning)?;

        info!(
            "Bringing up module {} (driving {} on CAN {}, turning {} on CAN {})",
            identity.name, driving, identity.driving_can_id, turning, identity.turning_can_id
        );

        let driving_actuator = open_driving(
            provider.as_ref(),
            driving,
            identity.driving_can_id,
            driving_bundle,
        )
        .map_err(|source| SwerveError::ActuatorSetup {
            role: Role::Driving,
            variant: driving.to_string(),
            can_id: identity.driving_can_id,
            source,
        })?;

        let turning_actuator = match open_turning(
            provider.as_ref(),
            turning,
            identity.turning_can_id,
            turning_bundle,
        ) {
            Ok(actuator) => actuator,
            Err(source) => {
                // Don't leave the driving side holding a configuration
                let mut driving_actuator = driving_actuator;
                if let Err(e) = driving_actuator.disable() {
                    warn!("Failed to disable driving actuator after setup error: {}", e);
                }
                return Err(SwerveError::ActuatorSetup {
                    role: Role::Turning,
                    variant: turning.to_string(),
                    can_id: identity.turning_can_id,
                    source,
                });
            }
        };

        Ok(Self {
            identity,
            registry,
            provider,
            driving: Binding {
                variant: driving,
                actuator: driving_actuator,
            },
            turning: Binding {
                variant: turning,
                actuator: turning_actuator,
            },
        })
    }

    pub fn identity(&self) -> &ModuleIdentity {
        &self.identity
    }

    pub fn driving_variant(&self) -> DrivingVariant {
        self.driving.variant
    }

    pub fn turning_variant(&self) -> TurningVariant {
        self.turning.variant
    }

    fn command_error(role: Role, can_id: u8) -> impl FnOnce(DeviceError) -> SwerveError {
        move |source| SwerveError::Command {
            role,
            can_id,
            source,
        }
    }

    /// Turning actuator angle minus the mounting offset, canonicalized
    fn heading(&self) -> Result<f64> {
        let actuator = &self.turning.actuator;
        let raw = actuator
            .position()
            .map_err(Self::command_error(Role::Turning, actuator.can_id()))?;
        Ok(wrap_angle(raw - self.identity.angular_offset))
    }

    /// Distance driven since the driving actuator was configured, and heading
    pub fn position(&self) -> Result<ModulePosition> {
        let actuator = &self.driving.actuator;
        let distance = actuator
            .position()
            .map_err(Self::command_error(Role::Driving, actuator.can_id()))?;
        Ok(ModulePosition {
            distance,
            heading: self.heading()?,
        })
    }

    pub fn state(&self) -> Result<ModuleState> {
        let actuator = &self.driving.actuator;
        let speed = actuator
            .velocity()
            .map_err(Self::command_error(Role::Driving, actuator.can_id()))?;
        Ok(ModuleState {
            speed,
            heading: self.heading()?,
        })
    }

    /// Drive towards `target`. The driving command is issued before the
    /// turning command; a failure stops the tick at that point.
    pub fn apply_target(&mut self, target: ModuleState) -> Result<()> {
        if !target.speed.is_finite() || !target.heading.is_finite() {
            return Err(SwerveError::InvalidTarget {
                speed: target.speed,
                heading: target.heading,
            });
        }

        let current = self.position()?.heading;
        let mut corrected = optimize(target, current);

        // Hold the wheel where it is when barely moving
        if corrected.speed.abs() < SPEED_EPSILON {
            corrected.heading = current;
        }

        debug!(
            "Module {}: target {:?} -> speed {:.3} m/s, heading {:.3} rad",
            self.identity.name, target, corrected.speed, corrected.heading
        );

        let driving = &mut self.driving.actuator;
        let can_id = driving.can_id();
        driving
            .command_velocity(corrected.speed)
            .map_err(Self::command_error(Role::Driving, can_id))?;

        let turning = &mut self.turning.actuator;
        let can_id = turning.can_id();
        turning
            .command_position(corrected.heading + self.identity.angular_offset)
            .map_err(Self::command_error(Role::Turning, can_id))
    }

    /// Zero speed, heading held
    pub fn stop(&mut self) -> Result<()> {
        self.apply_target(ModuleState::default())
    }

    /// Disable both actuators
    pub fn disable(&mut self) -> Result<()> {
        info!("Disabling module {}", self.identity.name);
        let driving = &mut self.driving.actuator;
        let can_id = driving.can_id();
        let driving_result = driving
            .disable()
            .map_err(Self::command_error(Role::Driving, can_id));

        let turning = &mut self.turning.actuator;
        let can_id = turning.can_id();
        turning
            .disable()
            .map_err(Self::command_error(Role::Turning, can_id))?;
        driving_result
    }

    /// Replace the driving actuator. On failure the previous binding stays
    /// installed and resumes on its next command.
    pub fn set_driving_variant(&mut self, variant: DrivingVariant) -> Result<()> {
        let bundle = self.registry.bundle_for(variant)?;
        let kept = self.driving.variant;
        let can_id = self.identity.driving_can_id;

        info!(
            "Module {}: swapping driving {} -> {}",
            self.identity.name, kept, variant
        );

        let swap_error = |source| SwerveError::HotSwap {
            role: Role::Driving,
            requested: variant.to_string(),
            kept: kept.to_string(),
            source,
        };

        self.driving.actuator.disable().map_err(swap_error)?;

        let actuator = match open_driving(self.provider.as_ref(), variant, can_id, bundle) {
            Ok(actuator) => actuator,
            Err(source) => {
                warn!(
                    "Module {}: driving {} failed to configure, keeping {}: {}",
                    self.identity.name, variant, kept, source
                );
                // A partial configure may have landed on the kept device
                if variant.controller() == kept.controller() {
                    self.restore_tuning(Role::Driving, kept.into());
                }
                return Err(swap_error(source));
            }
        };

        self.driving = Binding { variant, actuator };
        Ok(())
    }

    /// Replace the turning actuator. On failure the previous binding stays
    /// installed and resumes on its next command.
    pub fn set_turning_variant(&mut self, variant: TurningVariant) -> Result<()> {
        let bundle = self.registry.bundle_for(variant)?;
        let kept = self.turning.variant;
        let can_id = self.identity.turning_can_id;

        info!(
            "Module {}: swapping turning {} -> {}",
            self.identity.name, kept, variant
        );

        let swap_error = |source| SwerveError::HotSwap {
            role: Role::Turning,
            requested: variant.to_string(),
            kept: kept.to_string(),
            source,
        };

        self.turning.actuator.disable().map_err(swap_error)?;

        let actuator = match open_turning(self.provider.as_ref(), variant, can_id, bundle) {
            Ok(actuator) => actuator,
            Err(source) => {
                warn!(
                    "Module {}: turning {} failed to configure, keeping {}: {}",
                    self.identity.name, variant, kept, source
                );
                if variant.controller() == kept.controller() {
                    self.restore_tuning(Role::Turning, kept.into());
                }
                return Err(swap_error(source));
            }
        };

        self.turning = Binding { variant, actuator };
        Ok(())
    }

    /// Reapply the kept variant's bundle after a failed swap on a shared device
    fn restore_tuning(&mut self, role: Role, kept: VariantKey) {
        let bundle = match self.registry.bundle_for(kept) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("Module {}: cannot restore {} tuning: {}", self.identity.name, role, e);
                return;
            }
        };
        let actuator = match role {
            Role::Driving => &mut self.driving.actuator,
            Role::Turning => &mut self.turning.actuator,
        };
        match actuator.configure(bundle) {
            Ok(()) => info!("Module {}: restored {} tuning", self.identity.name, role),
            Err(e) => warn!(
                "Module {}: failed to restore {} tuning: {}",
                self.identity.name, role, e
            ),
        }
    }
}

impl Drop for SwerveModule {
    fn drop(&mut self) {
        // Safety measure: nothing keeps following a stale reference
        if let Err(e) = self.disable() {
            warn!("Failed to disable module {} on drop: {}", self.identity.name, e);
        }
    }
}
