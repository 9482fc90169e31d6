//! Rate and buffer planning
//!
//! Maps transfer length and owner tier onto concrete limiter parameters.
//! Base rates are deliberately conservative and step down as transfers grow,
//! keeping large downloads smooth rather than fast.

use stratus_core::domain::Tier;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Burst bounds for per-connection buckets, chosen to cover common buffer
/// sizes without letting the first burst run away.
const MIN_BURST: u64 = 4 * MIB;
const MAX_BURST: u64 = 8 * MIB;

/// Rate and burst for one token bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePlan {
    pub rate: u64,
    pub burst: u64,
}

/// Base per-connection rate by transfer length, before tier scaling.
pub fn base_rate_for_length(length: u64) -> u64 {
    match length {
        l if l <= 500 * MIB => 5 * MIB,
        l if l <= 2 * GIB => 4 * MIB,
        _ => 3 * MIB,
    }
}

/// Per-connection plan: length-derived base rate scaled by tier and capped
/// at the tier ceiling; burst is half the rate clamped to [4 MiB, 8 MiB].
pub fn connection_plan(length: u64, tier: Tier) -> RatePlan {
    let base = base_rate_for_length(length);
    let scaled = (base as f64 * tier.multiplier()) as u64;
    let rate = scaled.min(tier.max_rate());
    let burst = (rate / 2).clamp(MIN_BURST, MAX_BURST);
    RatePlan { rate, burst }
}

/// Global plan: burst is 10% of the sustained rate, floored at 4 MiB.
pub fn global_plan(global_bytes_per_sec: u64) -> RatePlan {
    RatePlan {
        rate: global_bytes_per_sec,
        burst: (global_bytes_per_sec / 10).max(MIN_BURST),
    }
}

/// Progress-scaled rate: conservative through the first 10%, a push over the
/// final 20%, the base rate in between.
pub fn adjusted_rate(base_rate: u64, progress: f64) -> u64 {
    if progress < 0.1 {
        (base_rate as f64 * 0.9) as u64
    } else if progress > 0.8 {
        (base_rate as f64 * 1.1) as u64
    } else {
        base_rate
    }
}

/// Copy-buffer size by transfer length.
pub fn buffer_size_for(length: u64) -> usize {
    let size = match length {
        l if l <= 100 * MIB => MIB,
        l if l <= 500 * MIB => 4 * MIB,
        l if l <= 2 * GIB => 8 * MIB,
        l if l <= 10 * GIB => 12 * MIB,
        _ => 20 * MIB,
    };
    size as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_rate_steps_down() {
        assert_eq!(base_rate_for_length(MIB), 5 * MIB);
        assert_eq!(base_rate_for_length(500 * MIB), 5 * MIB);
        assert_eq!(base_rate_for_length(500 * MIB + 1), 4 * MIB);
        assert_eq!(base_rate_for_length(2 * GIB), 4 * MIB);
        assert_eq!(base_rate_for_length(3 * GIB), 3 * MIB);
    }

    #[test]
    fn test_connection_plan_tiers() {
        // free: base rate already at the tier cap
        let plan = connection_plan(100 * MIB, Tier::Free);
        assert_eq!(plan.rate, 5 * MIB);
        assert_eq!(plan.burst, 4 * MIB); // rate/2 clamped up to the floor

        // vip doubles, capped at 10 MiB/s
        let plan = connection_plan(100 * MIB, Tier::Vip);
        assert_eq!(plan.rate, 10 * MIB);
        assert_eq!(plan.burst, 5 * MIB);

        // svip on a huge file: 3 MiB/s * 3 = 9 MiB/s, under the 15 cap
        let plan = connection_plan(20 * GIB, Tier::Svip);
        assert_eq!(plan.rate, 9 * MIB);

        // svip on a small file: 15 MiB/s cap, burst clamped to 8 MiB
        let plan = connection_plan(MIB, Tier::Svip);
        assert_eq!(plan.rate, 15 * MIB);
        assert_eq!(plan.burst, MAX_BURST);
    }

    #[test]
    fn test_global_plan_burst() {
        assert_eq!(global_plan(100 * MIB).burst, 10 * MIB);
        // small global rates keep the 4 MiB floor
        assert_eq!(global_plan(10 * MIB).burst, 4 * MIB);
    }

    #[test]
    fn test_adjusted_rate_curve() {
        let base = 100;
        assert_eq!(adjusted_rate(base, 0.05), 90);
        assert_eq!(adjusted_rate(base, 0.5), 100);
        assert_eq!(adjusted_rate(base, 0.9), 110);
        // boundaries belong to the flat middle
        assert_eq!(adjusted_rate(base, 0.1), 100);
        assert_eq!(adjusted_rate(base, 0.8), 100);
    }

    #[test]
    fn test_buffer_table() {
        assert_eq!(buffer_size_for(MIB), MIB as usize);
        assert_eq!(buffer_size_for(100 * MIB), MIB as usize);
        assert_eq!(buffer_size_for(200 * MIB), 4 * MIB as usize);
        assert_eq!(buffer_size_for(GIB), 8 * MIB as usize);
        assert_eq!(buffer_size_for(5 * GIB), 12 * MIB as usize);
        assert_eq!(buffer_size_for(20 * GIB), 20 * MIB as usize);
    }
}
