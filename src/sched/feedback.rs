/*!
 * Feedback Priority Engine
 * Multi-level-feedback formulas over 17.14 fixed point
 *
 * priority   = clamp(PRI_MAX - recent_cpu/4 - 2*nice, PRI_MIN, PRI_MAX)
 * load_avg   = (59*load_avg + ready_threads) / 60, once per second
 * recent_cpu = (2*load_avg * recent_cpu) / (2*load_avg + 1) + nice
 *
 * The recent_cpu decay multiplies before dividing so no precision is lost
 * in the coefficient.
 */

use crate::core::fixed::Fixed;
use crate::core::types::{Priority, PRI_MAX, PRI_MIN};

/// Effective priority from decayed CPU usage and niceness
pub fn mlfqs_priority(recent_cpu: Fixed, nice: i32) -> Priority {
    let raw = (Fixed::from_int(PRI_MAX) - recent_cpu.div_int(4) - Fixed::from_int(2 * nice)).to_int();
    raw.clamp(PRI_MIN, PRI_MAX)
}

/// Exponential moving average of the ready-thread count, decay 59/60
pub fn load_average(load_avg: Fixed, ready_threads: usize) -> Fixed {
    (load_avg.mul_int(59) + Fixed::from_int(ready_threads as i32)).div_int(60)
}

/// Once-per-second usage decay by 2*load/(2*load + 1), plus the niceness bias
pub fn decay_recent_cpu(load_avg: Fixed, recent_cpu: Fixed, nice: i32) -> Fixed {
    let twice_load = load_avg.mul_int(2);
    twice_load.mul(recent_cpu).div(twice_load.add_int(1)).add_int(nice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_fresh_thread() {
        // recent_cpu 0, nice 0 -> PRI_MAX
        assert_eq!(mlfqs_priority(Fixed::ZERO, 0), PRI_MAX);
    }

    #[test]
    fn test_priority_formula() {
        // recent_cpu 40, nice 2: 63 - 10 - 4 = 49
        assert_eq!(mlfqs_priority(Fixed::from_int(40), 2), 49);
        // nice -20, usage 0: clamped at PRI_MAX
        assert_eq!(mlfqs_priority(Fixed::ZERO, -20), PRI_MAX);
        // huge usage clamps at PRI_MIN
        assert_eq!(mlfqs_priority(Fixed::from_int(1000), 20), PRI_MIN);
    }

    #[test]
    fn test_priority_deterministic() {
        let a = mlfqs_priority(Fixed::from_raw(123_456), 5);
        for _ in 0..100 {
            assert_eq!(mlfqs_priority(Fixed::from_raw(123_456), 5), a);
        }
    }

    #[test]
    fn test_load_average_converges_upward() {
        let mut load = Fixed::ZERO;
        for _ in 0..600 {
            load = load_average(load, 2);
        }
        // Converges toward 2.00
        let x100 = load.mul_int(100).to_int_nearest();
        assert!(x100 > 190 && x100 <= 200, "load {x100}");
    }

    #[test]
    fn test_load_average_one_step() {
        // From zero with one ready thread: 1/60
        let load = load_average(Fixed::ZERO, 1);
        assert_eq!(load.raw(), Fixed::from_int(1).div_int(60).raw());
    }

    #[test]
    fn test_decay_zero_load_clears_usage() {
        // coefficient 0/(0+1) = 0, so only the niceness bias remains
        let decayed = decay_recent_cpu(Fixed::ZERO, Fixed::from_int(50), 3);
        assert_eq!(decayed, Fixed::from_int(3));
    }

    #[test]
    fn test_decay_shrinks_usage() {
        let load = Fixed::from_int(1);
        let decayed = decay_recent_cpu(load, Fixed::from_int(30), 0);
        // 2/(2+1) * 30 = 20
        assert_eq!(decayed.to_int(), 20);
    }
}
