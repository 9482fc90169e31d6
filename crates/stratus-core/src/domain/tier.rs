//! Service tiers
//!
//! The tier scales the per-connection download rate and caps its maximum.
//! It is resolved by the out-of-scope auth layer and handed to the download
//! engine alongside the owner id.

use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Subscription tier of the requesting owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Vip,
    Svip,
}

impl Tier {
    /// Multiplier applied to the length-derived base rate.
    pub fn multiplier(self) -> f64 {
        match self {
            Tier::Free => 1.0,
            Tier::Vip => 2.0,
            Tier::Svip => 3.0,
        }
    }

    /// Hard ceiling on the per-connection rate, bytes per second.
    pub fn max_rate(self) -> u64 {
        match self {
            Tier::Free => 5 * MIB,
            Tier::Vip => 10 * MIB,
            Tier::Svip => 15 * MIB,
        }
    }

    /// Parses the tier header value; unknown values fall back to Free.
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "vip" => Tier::Vip,
            "svip" => Tier::Svip,
            _ => Tier::Free,
        }
    }
}
