// Pairing eligibility predicates
//
// A close pair is only worth tracking when the predicate accepts both points.
// Vertical separation lives here rather than in the space-time metric.

use crate::config::PairingConfig;
use crate::point::Point;

/// Accept/reject test applied to each close pair before it opens a track pair
pub trait PairPredicate: Send {
    fn accepts(&self, a: &Point, b: &Point) -> bool;

    /// Both predicates must accept
    fn and<P: PairPredicate>(self, other: P) -> And<Self, P>
    where
        Self: Sized,
    {
        And(self, other)
    }
}

impl<F> PairPredicate for F
where
    F: Fn(&Point, &Point) -> bool + Send,
{
    fn accepts(&self, a: &Point, b: &Point) -> bool {
        self(a, b)
    }
}

/// Accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl PairPredicate for AcceptAll {
    fn accepts(&self, _a: &Point, _b: &Point) -> bool {
        true
    }
}

/// Both points must carry a usable horizontal position
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidGeometry;

impl PairPredicate for ValidGeometry {
    fn accepts(&self, a: &Point, b: &Point) -> bool {
        a.has_valid_geometry() && b.has_valid_geometry()
    }
}

/// Altitudes must be within `max_feet` of each other.
///
/// A pair is kept when either altitude is unknown: without it the aircraft
/// cannot be shown to be vertically separated.
#[derive(Debug, Clone, Copy)]
pub struct VerticalSeparation {
    pub max_feet: f64,
}

impl PairPredicate for VerticalSeparation {
    fn accepts(&self, a: &Point, b: &Point) -> bool {
        match (a.altitude_ft, b.altitude_ft) {
            (Some(x), Some(y)) => (x - y).abs() <= self.max_feet,
            _ => true,
        }
    }
}

/// Conjunction of two predicates
#[derive(Debug, Clone, Copy)]
pub struct And<A, B>(pub A, pub B);

impl<A: PairPredicate, B: PairPredicate> PairPredicate for And<A, B> {
    fn accepts(&self, a: &Point, b: &Point) -> bool {
        self.0.accepts(a, b) && self.1.accepts(a, b)
    }
}

/// Predicate implied by the configuration: valid geometry, plus vertical
/// separation when a limit is set.
pub fn from_config(config: &PairingConfig) -> Box<dyn PairPredicate> {
    match config.max_vertical_separation_ft {
        Some(max_feet) => Box::new(ValidGeometry.and(VerticalSeparation { max_feet })),
        None => Box::new(ValidGeometry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::test_support::*;

    #[test]
    fn test_valid_geometry() {
        let good = pt("A", 0, 0.0, 0.0);
        let bad = pt("B", 0, f64::NAN, 0.0);
        assert!(ValidGeometry.accepts(&good, &good));
        assert!(!ValidGeometry.accepts(&good, &bad));
        assert!(!ValidGeometry.accepts(&bad, &good));
    }

    #[test]
    fn test_vertical_separation() {
        let gate = VerticalSeparation { max_feet: 1000.0 };
        let low = pt("A", 0, 0.0, 0.0).with_altitude(5000.0);
        let near = pt("B", 0, 0.0, 0.0).with_altitude(5900.0);
        let far = pt("C", 0, 0.0, 0.0).with_altitude(9000.0);
        let unknown = pt("D", 0, 0.0, 0.0);

        assert!(gate.accepts(&low, &near));
        assert!(!gate.accepts(&low, &far));
        assert!(gate.accepts(&low, &unknown));
    }

    #[test]
    fn test_closures_and_combinators() {
        let not_ground = |a: &Point, b: &Point| {
            a.speed_kts.unwrap_or(0.0) > 40.0 && b.speed_kts.unwrap_or(0.0) > 40.0
        };
        let combined = ValidGeometry.and(not_ground);

        let fast = pt("A", 0, 0.0, 0.0).with_velocity(250.0, 90.0);
        let taxiing = pt("B", 0, 0.0, 0.0).with_velocity(12.0, 90.0);
        assert!(combined.accepts(&fast, &fast));
        assert!(!combined.accepts(&fast, &taxiing));
        assert!(AcceptAll.accepts(&fast, &taxiing));
    }

    #[test]
    fn test_from_config() {
        let mut config = PairingConfig::default();
        let a = pt("A", 0, 0.0, 0.0).with_altitude(1000.0);
        let b = pt("B", 0, 0.0, 0.0).with_altitude(30000.0);
        assert!(from_config(&config).accepts(&a, &b));

        config.max_vertical_separation_ft = Some(2000.0);
        assert!(!from_config(&config).accepts(&a, &b));
    }
}
