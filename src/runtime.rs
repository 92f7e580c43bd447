// Fixed-rate loop driving every swerve module, with a per-module watchdog
// Note: each module only ever sees the commands addressed to it; a module whose
// commands go stale is stopped in place while the others keep running

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{info, warn};

// local imports
use crate::config::{
    module_identities, DEGRADED_AFTER_FAILURES, TOPIC_CMD_MODULE, TOPIC_CMD_VARIANT,
    TOPIC_STATE_MODULES,
};
use crate::messages::{ModuleCommand, ModuleHealth, ModuleTelemetry, VariantRequest};
use crate::swerve::{
    DeviceProvider, ModuleIdentity, ModuleState, ParameterRegistry, SimBus, SwerveError,
    SwerveModule,
};

/// Loop settings, overridable from the command line
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    pub loop_hz: u64,
    pub cmd_timeout: Duration,
}

impl RuntimeConfig {
    pub fn period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.loop_hz.max(1))
    }
}

struct ModuleSlot {
    module: SwerveModule,
    latest_cmd: Option<ModuleState>,
    cmd_received_at: Option<Instant>,
    health: ModuleHealth,
    consecutive_failures: u32,
    last_error: Option<String>,
}

impl ModuleSlot {
    fn new(module: SwerveModule) -> Self {
        Self {
            module,
            latest_cmd: None,
            cmd_received_at: None,
            health: ModuleHealth::CmdStale, // Start stale until first cmd
            consecutive_failures: 0,
            last_error: None,
        }
    }

    fn name(&self) -> &str {
        &self.module.identity().name
    }

    /// Latest command if it is still fresh
    fn fresh_target(&self, now: Instant, timeout: Duration) -> Option<ModuleState> {
        let received_at = self.cmd_received_at?;
        if now.saturating_duration_since(received_at) > timeout {
            return None;
        }
        self.latest_cmd
    }

    fn record(&mut self, result: Result<(), SwerveError>, fresh: bool) {
        match result {
            Ok(()) => {
                if self.health == ModuleHealth::Degraded {
                    info!("Module {} recovered", self.name());
                }
                self.consecutive_failures = 0;
                self.last_error = None;
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    "Module {} tick failed ({} in a row): {}",
                    self.name(),
                    self.consecutive_failures,
                    e
                );
                self.last_error = Some(e.to_string());
            }
        }

        let health = if self.consecutive_failures >= DEGRADED_AFTER_FAILURES {
            ModuleHealth::Degraded
        } else if fresh {
            ModuleHealth::Ok
        } else {
            ModuleHealth::CmdStale
        };

        if health != self.health {
            match health {
                ModuleHealth::Degraded => warn!(
                    "Module {} degraded after {} failed ticks",
                    self.name(),
                    self.consecutive_failures
                ),
                ModuleHealth::CmdStale => warn!("Module {} command stale, stopping", self.name()),
                ModuleHealth::Ok => {}
            }
        }
        self.health = health;
    }

    fn telemetry(&self) -> ModuleTelemetry {
        let state = self.module.state().ok();
        let position = self.module.position().ok();
        ModuleTelemetry {
            module: self.name().to_string(),
            health: self.health,
            driving: self.module.driving_variant(),
            turning: self.module.turning_variant(),
            consecutive_failures: self.consecutive_failures,
            speed: state.map(|s| s.speed),
            heading: state.map(|s| s.heading),
            distance: position.map(|p| p.distance),
            last_error: self.last_error.clone(),
        }
    }
}

pub struct Runtime {
    slots: Vec<ModuleSlot>,
    cmd_timeout: Duration,
}

impl Runtime {
    pub fn new(modules: Vec<SwerveModule>, cmd_timeout: Duration) -> Self {
        Self {
            slots: modules.into_iter().map(ModuleSlot::new).collect(),
            cmd_timeout,
        }
    }

    /// Construct every module. Any failure here is fatal.
    pub fn bring_up(
        identities: impl IntoIterator<Item = ModuleIdentity>,
        registry: Arc<ParameterRegistry>,
        provider: Arc<dyn DeviceProvider>,
        cmd_timeout: Duration,
    ) -> Result<Self, SwerveError> {
        let modules = identities
            .into_iter()
            .map(|identity| SwerveModule::new(identity, registry.clone(), provider.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(modules, cmd_timeout))
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut ModuleSlot> {
        self.slots.iter_mut().find(|slot| slot.name() == name)
    }

    /// Process incoming command
    pub fn on_command(&mut self, cmd: &ModuleCommand, now: Instant) {
        match self.slot_mut(&cmd.module) {
            Some(slot) => {
                slot.latest_cmd = Some(ModuleState::from(cmd));
                slot.cmd_received_at = Some(now);
            }
            None => warn!("Command for unknown module {}", cmd.module),
        }
    }

    /// Hot-swap hardware on the addressed modules. Failures are logged and
    /// the module keeps its previous hardware.
    pub fn on_variant_request(&mut self, request: &VariantRequest) {
        let mut matched = false;
        for slot in &mut self.slots {
            if request.module.as_deref().is_some_and(|m| m != slot.name()) {
                continue;
            }
            matched = true;

            if let Some(variant) = request.driving {
                if let Err(e) = slot.module.set_driving_variant(variant) {
                    warn!("{}", e);
                    slot.last_error = Some(e.to_string());
                }
            }
            if let Some(variant) = request.turning {
                if let Err(e) = slot.module.set_turning_variant(variant) {
                    warn!("{}", e);
                    slot.last_error = Some(e.to_string());
                }
            }
        }

        if !matched {
            warn!("Variant request for unknown module {:?}", request.module);
        }
    }

    /// Run one control tick on every module and report their telemetry
    pub fn tick(&mut self, now: Instant) -> Vec<ModuleTelemetry> {
        let timeout = self.cmd_timeout;
        self.slots
            .iter_mut()
            .map(|slot| {
                let fresh = slot.fresh_target(now, timeout);
                // Watchdog: zero speed holds the current heading
                let target = fresh.unwrap_or_default();
                let result = slot.module.apply_target(target);
                slot.record(result, fresh.is_some());
                slot.telemetry()
            })
            .collect()
    }
}

pub async fn run(config: RuntimeConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = Arc::new(ParameterRegistry::standard()?);

    // The vendor transport is external; run against simulated devices
    info!("Bringing up modules on the simulated bus...");
    let bus = Arc::new(SimBus::new());
    let mut runtime = Runtime::bring_up(
        module_identities(),
        registry,
        bus.clone(),
        config.cmd_timeout,
    )?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_module = session.declare_subscriber(TOPIC_CMD_MODULE).await?;
    let sub_variant = session.declare_subscriber(TOPIC_CMD_VARIANT).await?;
    let pub_state = session.declare_publisher(TOPIC_STATE_MODULES).await?;

    let period = config.period();
    let mut tick = interval(period);

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        config.loop_hz,
        config.cmd_timeout.as_millis()
    );
    info!("Subscribed to: {}, {}", TOPIC_CMD_MODULE, TOPIC_CMD_VARIANT);
    info!("Publishing to: {}", TOPIC_STATE_MODULES);

    loop {
        tick.tick().await;
        let now = Instant::now();

        // 1. Drain all pending commands (non-blocking), keep latest per module
        while let Ok(Some(sample)) = sub_module.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<ModuleCommand>(&payload) {
                Ok(cmd) => runtime.on_command(&cmd, now),
                Err(e) => warn!("Failed to parse module command: {}", e),
            }
        }

        // 2. Hot-swaps happen between ticks, never during one
        while let Ok(Some(sample)) = sub_variant.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<VariantRequest>(&payload) {
                Ok(request) => runtime.on_variant_request(&request),
                Err(e) => warn!("Failed to parse variant request: {}", e),
            }
        }

        // 3. Advance the simulated hardware and run the control tick
        bus.step(period);
        let telemetry = runtime.tick(now);

        // 4. Publish telemetry
        for entry in &telemetry {
            let json = serde_json::to_string(entry)?;
            pub_state.put(json).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swerve::sim::{DeviceFamily, SimCommand};
    use crate::swerve::vendor::SparkControlType;
    use crate::swerve::{DrivingVariant, TurningVariant};

    const TIMEOUT: Duration = Duration::from_millis(250);

    fn setup() -> (Arc<SimBus>, Runtime) {
        let bus = Arc::new(SimBus::new());
        let registry = Arc::new(ParameterRegistry::standard().unwrap());
        let runtime = Runtime::bring_up(module_identities(), registry, bus.clone(), TIMEOUT).unwrap();
        (bus, runtime)
    }

    fn command(module: &str, speed: f64, heading: f64) -> ModuleCommand {
        ModuleCommand {
            module: module.to_string(),
            speed,
            heading,
        }
    }

    fn last_velocity(bus: &SimBus, can_id: u8) -> Option<f64> {
        match bus.device(DeviceFamily::Spark, can_id).lock().commands.last() {
            Some(SimCommand::Spark { value, control: SparkControlType::Velocity }) => Some(*value),
            _ => None,
        }
    }

    #[test]
    fn test_no_command_is_stale_and_stopped() {
        let (bus, mut runtime) = setup();
        let telemetry = runtime.tick(Instant::now());

        assert_eq!(telemetry.len(), 4);
        assert!(telemetry.iter().all(|t| t.health == ModuleHealth::CmdStale));
        assert_eq!(last_velocity(&bus, 2), Some(0.0));
    }

    #[test]
    fn test_fresh_command_routed_to_its_module_only() {
        let (bus, mut runtime) = setup();
        let now = Instant::now();

        runtime.on_command(&command("front_right", 1.0, 0.0), now);
        let telemetry = runtime.tick(now);

        assert_eq!(telemetry[1].module, "front_right");
        assert_eq!(telemetry[1].health, ModuleHealth::Ok);
        assert_eq!(telemetry[0].health, ModuleHealth::CmdStale);
        assert_eq!(last_velocity(&bus, 4), Some(1.0));
        assert_eq!(last_velocity(&bus, 2), Some(0.0));
    }

    #[test]
    fn test_watchdog_stops_stale_module() {
        let (bus, mut runtime) = setup();
        let start = Instant::now();

        runtime.on_command(&command("front_right", 1.5, 0.0), start);
        runtime.tick(start);
        assert_eq!(last_velocity(&bus, 4), Some(1.5));

        let telemetry = runtime.tick(start + TIMEOUT + Duration::from_millis(1));
        assert_eq!(telemetry[1].health, ModuleHealth::CmdStale);
        assert_eq!(last_velocity(&bus, 4), Some(0.0));
    }

    #[test]
    fn test_degraded_after_consecutive_failures_and_recovers() {
        let (bus, mut runtime) = setup();
        let now = Instant::now();
        bus.device(DeviceFamily::Spark, 6).lock().fail_commands = true;

        for i in 1..=DEGRADED_AFTER_FAILURES {
            runtime.on_command(&command("rear_left", 1.0, 0.0), now);
            let telemetry = runtime.tick(now);
            assert_eq!(telemetry[2].consecutive_failures, i);
            assert!(telemetry[2].last_error.is_some());
            // Other modules are unaffected
            assert_eq!(telemetry[0].consecutive_failures, 0);
        }
        let telemetry = runtime.tick(now);
        assert_eq!(telemetry[2].health, ModuleHealth::Degraded);

        bus.device(DeviceFamily::Spark, 6).lock().fail_commands = false;
        let telemetry = runtime.tick(now);
        assert_eq!(telemetry[2].health, ModuleHealth::Ok);
        assert_eq!(telemetry[2].consecutive_failures, 0);
    }

    #[test]
    fn test_read_failures_count_towards_degraded() {
        let (bus, mut runtime) = setup();
        let now = Instant::now();
        bus.device(DeviceFamily::Spark, 7).lock().fail_reads = true;

        runtime.on_command(&command("rear_left", 1.0, 0.0), now);
        for _ in 1..DEGRADED_AFTER_FAILURES {
            runtime.tick(now);
        }
        let telemetry = runtime.tick(now);
        assert_eq!(telemetry[2].health, ModuleHealth::Degraded);
        assert_eq!(telemetry[2].consecutive_failures, DEGRADED_AFTER_FAILURES);
        assert_eq!(telemetry[2].heading, None);
        // Never moved while its heading was unknown
        assert!(bus.device(DeviceFamily::Spark, 6).lock().commands.is_empty());
        assert!(bus.device(DeviceFamily::Spark, 7).lock().commands.is_empty());
    }

    #[test]
    fn test_variant_request_for_all_modules() {
        let (bus, mut runtime) = setup();
        runtime.on_variant_request(&VariantRequest {
            module: None,
            driving: Some(DrivingVariant::KrakenX60Foc),
            turning: None,
        });

        let telemetry = runtime.tick(Instant::now());
        assert!(telemetry.iter().all(|t| t.driving == DrivingVariant::KrakenX60Foc));
        assert!(telemetry.iter().all(|t| t.turning == TurningVariant::Neo550));
        for can_id in [2, 4, 6, 8] {
            assert_eq!(bus.device(DeviceFamily::Spark, can_id).lock().disable_count, 1);
            assert!(bus.device(DeviceFamily::Talon, can_id).lock().is_configured());
        }
    }

    #[test]
    fn test_failed_variant_request_keeps_module_running() {
        let (bus, mut runtime) = setup();
        bus.device(DeviceFamily::Talon, 9).lock().fail_configure = true;

        runtime.on_variant_request(&VariantRequest {
            module: Some("rear_right".to_string()),
            driving: None,
            turning: Some(TurningVariant::Falcon),
        });

        let now = Instant::now();
        // Within a quarter turn of the current -π/2 heading
        runtime.on_command(&command("rear_right", 0.5, -1.2), now);
        let telemetry = runtime.tick(now);
        assert_eq!(telemetry[3].turning, TurningVariant::Neo550);
        assert_eq!(telemetry[3].health, ModuleHealth::Ok);
        assert_eq!(telemetry[3].speed, Some(0.5));
        assert!((telemetry[3].heading.unwrap() + 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_variant_request_parses_from_json() {
        let request: VariantRequest =
            serde_json::from_str(r#"{"module":"front_left","driving":"kraken_x60"}"#).unwrap();
        assert_eq!(request.driving, Some(DrivingVariant::KrakenX60));
        assert_eq!(request.turning, None);
    }
}
