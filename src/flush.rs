//! Utilization-aware batched flush sizing policy.
//!
//! Pure arithmetic, no I/O: given the current map size, the configured upper bound and a
//! disk-utilization reading, compute how many entries a flush should drain.

/// Minimum map size to consider flushing at all.
pub const FLUSH_THRESHOLD: usize = 4096;
/// Low watermark, percent of `MaxMapSize`.
pub const LWM: u32 = 60;
/// High watermark, percent of `MaxMapSize`.
pub const HWM: u32 = 80;

/// Disk utilization as reported by the oracle, or unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utilization {
    /// A `%util` reading in `0..=100`.
    Percent(u8),
    /// The oracle has no current reading for this filesystem.
    Unavailable,
}

/// Computes the number of entries a flush should drain.
///
/// `size` is the current map occupancy, `max_size` is the configured `MaxMapSize`. Mirrors the
/// rule table in full: idle-disk preemption, at-cap drain, high/low watermark blending.
pub(crate) fn compute_flush_count(size: usize, max_size: u64, utilization: Utilization) -> usize {
    if size <= FLUSH_THRESHOLD {
        return 0;
    }

    let max_size = max_size.max(1);
    let filling = ((size as u128 * 100) / max_size as u128).min(100) as u32;

    let idle = matches!(utilization, Utilization::Percent(u) if u < 50);
    if idle {
        return size / 4;
    }

    if filling == 100 {
        return size / 2;
    }
    if filling > HWM {
        return size / 4;
    }
    if filling > LWM {
        let span = (HWM - LWM) as u128;
        let numerator = (filling - LWM) as u128 * size as u128;
        return (numerator / span / 4) as usize;
    }

    0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn below_threshold_short_circuits() {
        assert_eq!(compute_flush_count(4000, 10_000, Utilization::Percent(0)), 0);
    }

    #[test]
    fn idle_disk_preempts_watermarks() {
        // filling = 50, below LWM, but idle disk still drains a quarter.
        assert_eq!(compute_flush_count(5_000, 10_000, Utilization::Percent(10)), 1_250);
    }

    #[test]
    fn high_watermark_drains_a_quarter() {
        assert_eq!(compute_flush_count(8_500, 10_000, Utilization::Percent(75)), 2_125);
    }

    #[test]
    fn at_cap_drains_half() {
        assert_eq!(compute_flush_count(10_000, 10_000, Utilization::Percent(75)), 5_000);
    }

    #[test]
    fn between_watermarks_blends_linearly() {
        // filling = 70, halfway between LWM=60 and HWM=80 -> half of the quarter-drain.
        let n = compute_flush_count(7_000, 10_000, Utilization::Percent(90));
        assert_eq!(n, 875);
    }

    #[test]
    fn below_low_watermark_with_busy_disk_does_nothing() {
        // filling = 55, busy disk, below LWM.
        assert_eq!(compute_flush_count(5_500, 10_000, Utilization::Percent(90)), 0);
    }

    #[test]
    fn unavailable_utilization_is_not_treated_as_idle() {
        let n = compute_flush_count(5_000, 10_000, Utilization::Unavailable);
        assert_eq!(n, 0);
    }

    #[test]
    fn sizing_is_monotonic_crossing_watermarks() {
        let busy = Utilization::Percent(90);
        let below_lwm = compute_flush_count(5_900, 10_000, busy);
        let between = compute_flush_count(7_000, 10_000, busy);
        let above_hwm = compute_flush_count(8_500, 10_000, busy);
        let at_cap = compute_flush_count(10_000, 10_000, busy);
        assert!(below_lwm <= between);
        assert!(between <= above_hwm);
        assert!(above_hwm <= at_cap);
    }
}
