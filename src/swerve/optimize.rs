// Heading optimization
//
// A wheel driven backwards at the opposite heading moves the chassis the same
// way, so the steering never has to turn more than a quarter revolution.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use super::module::ModuleState;

/// Canonicalize an angle into [-π, π)
pub fn wrap_angle(radians: f64) -> f64 {
    let wrapped = (radians + PI).rem_euclid(TAU) - PI;
    // rem_euclid may round up to TAU
    if wrapped >= PI { -PI } else { wrapped }
}

/// Signed shortest rotation from `from` to `to`, in [-π, π)
pub fn angle_between(from: f64, to: f64) -> f64 {
    wrap_angle(to - from)
}

/// Pick whichever of `target` and its reversed twin is closer to
/// `current_heading`. Only the sign of the speed and the heading change.
pub fn optimize(target: ModuleState, current_heading: f64) -> ModuleState {
    let delta = angle_between(current_heading, target.heading);

    if delta.abs() > FRAC_PI_2 {
        ModuleState {
            speed: -target.speed,
            heading: wrap_angle(target.heading + PI),
        }
    } else {
        ModuleState {
            speed: target.speed,
            heading: wrap_angle(target.heading),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn deg(degrees: f64) -> f64 {
        degrees.to_radians()
    }

    #[test]
    fn test_wrap_angle_range() {
        assert!((wrap_angle(deg(190.0)) - deg(-170.0)).abs() < TOLERANCE);
        assert!((wrap_angle(deg(-190.0)) - deg(170.0)).abs() < TOLERANCE);
        assert!((wrap_angle(TAU * 3.0)).abs() < TOLERANCE);
        // π itself maps to the closed end of the range
        assert!((wrap_angle(PI) + PI).abs() < TOLERANCE);

        // Just below -π rounds onto TAU inside rem_euclid
        let below = f64::from_bits((-PI).to_bits() + 1);
        assert!(below < -PI);
        let wrapped = wrap_angle(below);
        assert!((-PI..PI).contains(&wrapped), "{} out of range", wrapped);
    }

    #[test]
    fn test_optimized_heading_stays_half_open() {
        let below = f64::from_bits((-PI).to_bits() + 1);
        let corrected = optimize(ModuleState { speed: 1.0, heading: below }, -PI);
        assert!(corrected.heading >= -PI && corrected.heading < PI);
        assert_eq!(corrected.speed, 1.0);
    }

    #[test]
    fn test_reverses_past_quarter_turn() {
        let target = ModuleState { speed: 2.0, heading: deg(170.0) };
        let corrected = optimize(target, 0.0);

        assert!((corrected.speed + 2.0).abs() < TOLERANCE);
        assert!((corrected.heading - deg(-10.0)).abs() < TOLERANCE);
    }

    #[test]
    fn test_keeps_target_within_quarter_turn() {
        let target = ModuleState { speed: 1.0, heading: deg(60.0) };
        let corrected = optimize(target, deg(10.0));
        assert_eq!(corrected.speed, 1.0);
        assert!((corrected.heading - deg(60.0)).abs() < TOLERANCE);
    }

    #[test]
    fn test_exact_quarter_turn_not_flipped() {
        let corrected = optimize(ModuleState { speed: 1.0, heading: FRAC_PI_2 }, 0.0);
        assert_eq!(corrected.speed, 1.0);
    }

    #[test]
    fn test_difference_measured_across_wrap() {
        // 170° and -170° are only 20° apart
        let corrected = optimize(ModuleState { speed: 1.5, heading: deg(-170.0) }, deg(170.0));
        assert_eq!(corrected.speed, 1.5);
        assert!((corrected.heading - deg(-170.0)).abs() < TOLERANCE);
    }

    #[test]
    fn test_never_requires_more_than_quarter_turn() {
        for target_deg in (-360..=360).step_by(7) {
            for current_deg in (-180..180).step_by(11) {
                let target = ModuleState { speed: 1.0, heading: deg(target_deg as f64) };
                let current = deg(current_deg as f64);
                let corrected = optimize(target, current);

                let rotation = angle_between(current, corrected.heading).abs();
                assert!(
                    rotation <= FRAC_PI_2 + TOLERANCE,
                    "target {}° from {}° needs {}°",
                    target_deg,
                    current_deg,
                    rotation.to_degrees()
                );
                assert!(corrected.heading >= -PI && corrected.heading < PI);
            }
        }
    }

    #[test]
    fn test_same_chassis_motion_and_idempotent() {
        for target_deg in (-180..180).step_by(13) {
            for current_deg in (-180..180).step_by(17) {
                let target = ModuleState { speed: 2.0, heading: deg(target_deg as f64) };
                let corrected = optimize(target, deg(current_deg as f64));

                // Velocity vectors match
                let (tx, ty) = (target.speed * target.heading.cos(), target.speed * target.heading.sin());
                let (cx, cy) = (
                    corrected.speed * corrected.heading.cos(),
                    corrected.speed * corrected.heading.sin(),
                );
                assert!((tx - cx).abs() < 1e-9 && (ty - cy).abs() < 1e-9);

                // Re-optimizing from the corrected heading changes nothing
                let again = optimize(corrected, corrected.heading);
                assert_eq!(again.speed, corrected.speed);
                assert!(angle_between(again.heading, corrected.heading).abs() < TOLERANCE);
            }
        }
    }
}
