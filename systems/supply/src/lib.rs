#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Supply cadence system deciding when command centers dispatch packets.

use std::time::Duration;

use log::debug;
use ooze_defence_core::{BuildingId, Event, PacketType};

/// Configuration parameters required to construct the supply system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    interval: Duration,
    quotas: [usize; 3],
}

impl Config {
    /// Creates a new configuration using the provided cadence and per-type quotas.
    #[must_use]
    pub const fn new(
        interval: Duration,
        building_quota: usize,
        ammo_quota: usize,
        energy_quota: usize,
    ) -> Self {
        Self {
            interval,
            quotas: [building_quota, ammo_quota, energy_quota],
        }
    }

    /// Time between two dispatch rounds.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Packets of the provided type each source may send per round.
    #[must_use]
    pub const fn quota(&self, packet_type: PacketType) -> usize {
        self.quotas[packet_type.index()]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 2, 2, 1)
    }
}

/// Request for a single `propagate` call on the packet manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupplyRequest {
    /// Command center that should dispatch packets.
    pub source: BuildingId,
    /// Maximum number of packets to dispatch.
    pub quota: usize,
    /// Payload to dispatch.
    pub packet_type: PacketType,
}

/// Pure system that turns elapsed time into dispatch requests.
#[derive(Debug)]
pub struct Supply {
    config: Config,
    accumulator: Duration,
}

impl Supply {
    /// Creates a new supply system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            accumulator: Duration::ZERO,
        }
    }

    /// Consumes world events and the current sources to emit dispatch requests.
    ///
    /// Rounds that elapsed within the same batch of events are coalesced into
    /// one, since each request already lets a source fill every free slot.
    pub fn handle(
        &mut self,
        events: &[Event],
        sources: &[BuildingId],
        out: &mut Vec<SupplyRequest>,
    ) {
        if self.config.interval.is_zero() {
            return;
        }

        let mut accumulated = Duration::ZERO;
        for event in events {
            if let Event::TimeAdvanced { dt } = event {
                accumulated = accumulated.saturating_add(*dt);
            }
        }
        if accumulated.is_zero() {
            return;
        }

        self.accumulator = self.accumulator.saturating_add(accumulated);
        if self.accumulator < self.config.interval {
            return;
        }
        let interval = self.config.interval.as_nanos();
        let elapsed = self.accumulator.as_nanos();
        let rounds = elapsed / interval;
        self.accumulator = duration_from_nanos(elapsed % interval);
        if rounds > 1 {
            debug!("coalescing {rounds} supply rounds into one");
        }

        for &source in sources {
            for packet_type in PacketType::ALL {
                let quota = self.config.quota(packet_type);
                if quota == 0 {
                    continue;
                }
                out.push(SupplyRequest {
                    source,
                    quota,
                    packet_type,
                });
            }
        }
    }
}

/// Converts a nanosecond count that is known to be below some `Duration`.
fn duration_from_nanos(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
    // always below one billion
    let subsec = (nanos % NANOS_PER_SEC) as u32;
    Duration::new(secs, subsec)
}

impl Default for Supply {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_never_requests() {
        let mut supply = Supply::new(Config::new(Duration::ZERO, 1, 1, 1));
        let mut out = Vec::new();
        supply.handle(
            &[Event::TimeAdvanced {
                dt: Duration::from_secs(5),
            }],
            &[BuildingId::new(0)],
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn large_steps_coalesce_rounds() {
        let mut supply = Supply::new(Config::new(Duration::from_millis(100), 1, 0, 0));
        let mut out = Vec::new();
        supply.handle(
            &[Event::TimeAdvanced {
                dt: Duration::from_millis(450),
            }],
            &[BuildingId::new(0)],
            &mut out,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(supply.accumulator, Duration::from_millis(50));
    }

    #[test]
    fn huge_steps_keep_only_the_remainder() {
        let mut supply = Supply::new(Config::new(Duration::from_nanos(3), 1, 0, 0));
        let mut out = Vec::new();
        supply.handle(
            &[Event::TimeAdvanced {
                dt: Duration::from_secs(86_400 * 365),
            }],
            &[BuildingId::new(0)],
            &mut out,
        );
        assert_eq!(out.len(), 1);
        let expected = Duration::from_secs(86_400 * 365).as_nanos() % 3;
        assert_eq!(supply.accumulator.as_nanos(), expected);
    }
}
