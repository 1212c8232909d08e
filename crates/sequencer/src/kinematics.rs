//! Kinematic helpers for a motion under constant acceleration.
//!
//! Position after `d` seconds: `p + v·d + ½·a·d²`; velocity: `v + a·d`.

use contracts::{Direction, Interval, MotionVector, PointInfo};

/// Extrapolate `vector` to clock time `ts`.
pub fn calculate_vector(vector: &MotionVector, ts: f64) -> MotionVector {
    let d = ts - vector.timestamp;
    MotionVector {
        position: vector.position + vector.velocity * d + 0.5 * vector.acceleration * d * d,
        velocity: vector.velocity + vector.acceleration * d,
        acceleration: vector.acceleration,
        timestamp: ts,
    }
}

pub fn is_moving(vector: &MotionVector) -> bool {
    vector.velocity != 0.0 || vector.acceleration != 0.0
}

/// Sign of the velocity at `ts`, falling back to the sign of acceleration.
pub fn direction_at(vector: &MotionVector, ts: f64) -> Direction {
    let fresh = calculate_vector(vector, ts);
    match Direction::from_sign(fresh.velocity) {
        Direction::NoDirection => Direction::from_sign(vector.acceleration),
        direction => direction,
    }
}

/// Real roots `d` of `p + v·d + ½·a·d² = x`, ascending.
pub fn real_solutions(p: f64, v: f64, a: f64, x: f64) -> Vec<f64> {
    if a == 0.0 && v == 0.0 {
        return if p == x { vec![0.0] } else { Vec::new() };
    }
    if a == 0.0 {
        return vec![(x - p) / v];
    }
    let discriminant = v * v - 2.0 * a * (p - x);
    if discriminant < 0.0 || discriminant.is_nan() {
        return Vec::new();
    }
    if discriminant == 0.0 {
        return vec![-v / a];
    }
    let sqrt = discriminant.sqrt();
    let d1 = (-v + sqrt) / a;
    let d2 = (-v - sqrt) / a;
    vec![d1.min(d2), d1.max(d2)]
}

/// Strictly positive roots, ascending.
pub fn positive_real_solutions(p: f64, v: f64, a: f64, x: f64) -> Vec<f64> {
    real_solutions(p, v, a, x)
        .into_iter()
        .filter(|d| *d > 0.0)
        .collect()
}

pub fn min_positive_real_solution(p: f64, v: f64, a: f64, x: f64) -> Option<f64> {
    positive_real_solutions(p, v, a, x).into_iter().next()
}

/// Time until the motion first hits a finite bound of `range`, with that bound.
pub fn range_violation(vector: &MotionVector, range: &Interval) -> Option<(f64, f64)> {
    let (p, v, a) = (vector.position, vector.velocity, vector.acceleration);
    [range.low(), range.high()]
        .into_iter()
        .filter(|bound| bound.is_finite())
        .filter_map(|bound| min_positive_real_solution(p, v, a, bound).map(|d| (d, bound)))
        .min_by(|x, y| x.0.total_cmp(&y.0))
}

/// Every crossing of a point in `points` within `[0, d]`, sorted by time.
pub fn solutions_in_interval(
    vector: &MotionVector,
    d: f64,
    points: Vec<PointInfo>,
) -> Vec<(f64, PointInfo)> {
    let (p, v, a) = (vector.position, vector.velocity, vector.acceleration);
    let mut solutions = Vec::new();
    for info in points {
        for t in real_solutions(p, v, a, info.point) {
            if (0.0..=d).contains(&t) {
                solutions.push((t, info.clone()));
            }
        }
    }
    solutions.sort_by(|x, y| x.0.total_cmp(&y.0));
    solutions
}

/// Tight `(min, max)` of positions reached during `[0, d]`.
pub fn position_interval(vector: &MotionVector, d: f64) -> (f64, f64) {
    let (p0, v0, a0) = (vector.position, vector.velocity, vector.acceleration);
    let p1 = p0 + v0 * d + 0.5 * a0 * d * d;
    if a0 != 0.0 {
        let d_turning = -v0 / a0;
        if (0.0..=d).contains(&d_turning) {
            let p_turning = p0 - 0.5 * v0 * v0 / a0;
            return if a0 > 0.0 {
                (p_turning, p0.max(p1))
            } else {
                (p0.min(p1), p_turning)
            };
        }
    }
    (p0.min(p1), p0.max(p1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CueKey, PointType};

    fn vector(p: f64, v: f64, a: f64) -> MotionVector {
        MotionVector::new(p, v, a, 10.0)
    }

    fn point(key: &str, x: f64) -> PointInfo {
        PointInfo {
            key: CueKey::from(key),
            interval: Interval::singular(x).unwrap(),
            point: x,
            point_type: PointType::Singular,
            data: None,
        }
    }

    #[test]
    fn test_calculate_vector() {
        let v = calculate_vector(&vector(1.0, 2.0, 2.0), 12.0);
        assert_eq!(v.position, 1.0 + 4.0 + 4.0);
        assert_eq!(v.velocity, 6.0);
        assert_eq!(v.timestamp, 12.0);
    }

    #[test]
    fn test_direction_falls_back_to_acceleration() {
        assert_eq!(direction_at(&vector(0.0, 1.0, 0.0), 11.0), Direction::Forwards);
        assert_eq!(direction_at(&vector(0.0, 0.0, -1.0), 10.0), Direction::Backwards);
        assert_eq!(direction_at(&vector(0.0, 0.0, 0.0), 10.0), Direction::NoDirection);
        // velocity flips sign after the turning point
        assert_eq!(direction_at(&vector(0.0, 1.0, -1.0), 12.0), Direction::Backwards);
    }

    #[test]
    fn test_real_solutions_degenerate_cases() {
        assert!(real_solutions(0.0, 0.0, 0.0, 1.0).is_empty());
        assert_eq!(real_solutions(1.0, 0.0, 0.0, 1.0), vec![0.0]);
        assert_eq!(real_solutions(0.0, 2.0, 0.0, 4.0), vec![2.0]);
        assert!(real_solutions(0.0, 0.0, -2.0, 1.0).is_empty());
        assert_eq!(real_solutions(0.0, 2.0, -2.0, 1.0), vec![1.0]);
    }

    #[test]
    fn test_real_solutions_quadratic() {
        // 0.5 * 2 * d^2 = 4  =>  d = ±2
        assert_eq!(real_solutions(0.0, 0.0, 2.0, 4.0), vec![-2.0, 2.0]);
        assert_eq!(positive_real_solutions(0.0, 0.0, 2.0, 4.0), vec![2.0]);
        assert_eq!(min_positive_real_solution(0.0, 0.0, 2.0, -4.0), None);
    }

    #[test]
    fn test_range_violation_picks_first_bound() {
        let range = Interval::closed(-10.0, 5.0).unwrap();
        assert_eq!(range_violation(&vector(0.0, 1.0, 0.0), &range), Some((5.0, 5.0)));
        assert_eq!(
            range_violation(&vector(0.0, -2.0, 0.0), &range),
            Some((5.0, -10.0))
        );
        assert_eq!(range_violation(&vector(0.0, 1.0, 0.0), &Interval::unbounded()), None);
    }

    #[test]
    fn test_solutions_in_interval_sorted() {
        let v = vector(0.0, 1.0, 0.0);
        let found = solutions_in_interval(
            &v,
            5.0,
            vec![point("far", 4.0), point("near", 1.0), point("late", 7.0), point("zero", 0.0)],
        );
        let keys: Vec<(f64, &str)> = found.iter().map(|(t, p)| (*t, p.key.as_str())).collect();
        assert_eq!(keys, vec![(0.0, "zero"), (1.0, "near"), (4.0, "far")]);
    }

    #[test]
    fn test_solutions_twice_through_turning_point() {
        // up to 1.0 at d=1, back through 0.5 twice
        let v = vector(0.0, 2.0, -2.0);
        let found = solutions_in_interval(&v, 3.0, vec![point("p", 0.5)]);
        assert_eq!(found.len(), 2);
        assert!(found[0].0 < 1.0 && found[1].0 > 1.0);
    }

    #[test]
    fn test_position_interval_with_turning_point() {
        assert_eq!(position_interval(&vector(0.0, 1.0, 0.0), 5.0), (0.0, 5.0));
        assert_eq!(position_interval(&vector(0.0, -1.0, 0.0), 2.0), (-2.0, 0.0));
        // decelerating: peaks at 1.0 then returns to 0.0 at d=2
        assert_eq!(position_interval(&vector(0.0, 2.0, -2.0), 2.0), (0.0, 1.0));
        // accelerating from a backwards start: minimum at -1.0
        assert_eq!(position_interval(&vector(0.0, -2.0, 2.0), 3.0), (-1.0, 3.0));
    }
}
