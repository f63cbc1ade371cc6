use std::time::{Duration, Instant};

use powerflow_raw::rapl::energy_delta;
use powerflow_raw::scale;

use crate::backend::Capabilities;
use crate::error::Result;
use crate::readings::{EnergyReading, PowerReading};

struct Sample {
    at: Instant,
    energy: Vec<EnergyReading>,
}

impl Sample {
    fn take(table: &dyn Capabilities) -> Result<Self> {
        Ok(Self {
            at: Instant::now(),
            energy: table.energy()?,
        })
    }
}

/// Derives average power from consecutive energy counter samples
///
/// The previous sample is kept between calls, so each reading covers the
/// interval since the last query. The first query has nothing to diff
/// against and waits `interval` after taking a baseline.
#[derive(Default)]
pub struct PowerSampler {
    previous: Option<Sample>,
}

impl PowerSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Power since the previous sample
    ///
    /// A failed read keeps the previous sample, so the next call still
    /// diffs against it instead of taking a new baseline.
    pub fn sample(
        &mut self,
        table: &dyn Capabilities,
        interval: Duration,
    ) -> Result<Vec<PowerReading>> {
        let baseline = match self.previous.take() {
            Some(previous) => previous,
            None => {
                let baseline = Sample::take(table)?;
                std::thread::sleep(interval);
                baseline
            }
        };

        let current = match Sample::take(table) {
            Ok(current) => current,
            Err(e) => {
                self.previous = Some(baseline);
                return Err(e);
            }
        };
        let elapsed = current.at.duration_since(baseline.at).as_secs_f64();
        let readings = power_between(&baseline.energy, &current.energy, elapsed);

        self.previous = Some(current);
        Ok(readings)
    }
}

/// Average power per socket between two energy snapshots
///
/// Sockets missing from `previous` report zero; a non-positive interval
/// reports zero rather than dividing by it.
pub fn power_between(
    previous: &[EnergyReading],
    current: &[EnergyReading],
    elapsed_sec: f64,
) -> Vec<PowerReading> {
    let watts = |prev: u64, cur: u64, exp: u8| scale(energy_delta(prev, cur), exp) / elapsed_sec;

    current
        .iter()
        .map(|cur| {
            let (pkg_watts, dram_watts) = match previous.iter().find(|p| p.socket == cur.socket) {
                Some(prev) if elapsed_sec > 0.0 => (
                    watts(prev.pkg_raw, cur.pkg_raw, cur.pkg_energy_exp),
                    watts(prev.dram_raw, cur.dram_raw, cur.dram_energy_exp),
                ),
                _ => (0.0, 0.0),
            };

            PowerReading {
                socket: cur.socket,
                pkg_watts,
                dram_watts,
                elapsed_sec,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn energy(socket: u32, pkg_raw: u64, dram_raw: u64) -> EnergyReading {
        EnergyReading {
            socket,
            pkg_raw,
            dram_raw,
            pkg_energy_exp: 14,
            dram_energy_exp: 16,
            pkg_joules: scale(pkg_raw, 14),
            dram_joules: scale(dram_raw, 16),
        }
    }

    #[test]
    fn test_power_from_energy_delta() {
        let prev = [energy(0, 0, 0)];
        let cur = [energy(0, 16384 * 10, 65536 * 2)];
        let power = power_between(&prev, &cur, 0.5);
        assert_eq!(power[0].pkg_watts, 20.0);
        assert_eq!(power[0].dram_watts, 4.0);
    }

    #[test]
    fn test_power_across_counter_wrap() {
        let prev = [energy(0, 0xFFFF_C000, 0)];
        let cur = [energy(0, 0x4000 * 3, 0)];
        let power = power_between(&prev, &cur, 1.0);
        assert_eq!(power[0].pkg_watts, 4.0);
    }

    #[test]
    fn test_zero_interval_reports_zero() {
        let prev = [energy(0, 0, 0)];
        let cur = [energy(0, 16384, 0)];
        assert_eq!(power_between(&prev, &cur, 0.0)[0].pkg_watts, 0.0);
    }

    #[test]
    fn test_unknown_socket_reports_zero() {
        let cur = [energy(1, 16384, 0)];
        let power = power_between(&[], &cur, 1.0);
        assert_eq!(power[0].socket, 1);
        assert_eq!(power[0].pkg_watts, 0.0);
    }
}
