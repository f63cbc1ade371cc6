//! Row-per-call power logs
//!
//! Both logs print their column header on the first call only, so repeated
//! calls against the same sink produce one table.

use std::io::{self, Write};
use std::time::Instant;

use crate::readings::{ClockReading, Counters, PowerLimits, PowerReading};

/// One monitoring row's worth of readings
pub struct MonitorSample<'a> {
    pub power: &'a [PowerReading],
    pub limits: &'a PowerLimits,
    pub counters: &'a Counters,
    pub clocks: &'a [ClockReading],
}

#[derive(Default)]
pub struct PollState {
    started: Option<Instant>,
    power_header: bool,
    monitor_header: bool,
    fixed_counters_enabled: bool,
}

impl PollState {
    /// Seconds since the first poll of this engine
    pub fn elapsed(&mut self) -> f64 {
        self.started.get_or_insert_with(Instant::now).elapsed().as_secs_f64()
    }

    pub fn fixed_counters_enabled(&self) -> bool {
        self.fixed_counters_enabled
    }

    pub fn mark_fixed_counters_enabled(&mut self) {
        self.fixed_counters_enabled = true;
    }

    pub fn write_power_row(
        &mut self,
        out: &mut dyn Write,
        host: &str,
        elapsed: f64,
        power: &[PowerReading],
        limits: &PowerLimits,
    ) -> io::Result<()> {
        if !std::mem::replace(&mut self.power_header, true) {
            write_power_header(out, power)?;
            writeln!(out)?;
        }
        write_power_columns(out, host, elapsed, power, limits)?;
        writeln!(out)
    }

    pub fn write_monitor_row(
        &mut self,
        out: &mut dyn Write,
        host: &str,
        elapsed: f64,
        sample: &MonitorSample<'_>,
    ) -> io::Result<()> {
        let power = sample.power;
        if !std::mem::replace(&mut self.monitor_header, true) {
            write_power_header(out, power)?;
            for p in power {
                let s = p.socket;
                write!(
                    out,
                    " inst_{s} core_cycles_{s} ref_cycles_{s} aperf_{s} mperf_{s} tsc_{s}"
                )?;
            }
            writeln!(out)?;
        }

        write_power_columns(out, host, elapsed, power, sample.limits)?;
        for p in power {
            let mut fixed = [0u64; 3];
            for thread in sample.counters.threads.iter().filter(|t| t.socket == p.socket) {
                for (sum, value) in fixed.iter_mut().zip(thread.fixed) {
                    *sum = sum.wrapping_add(value);
                }
            }
            let (mut aperf, mut mperf, mut tsc) = (0u64, 0u64, 0u64);
            for clock in sample.clocks.iter().filter(|c| c.socket == p.socket) {
                aperf = aperf.wrapping_add(clock.aperf);
                mperf = mperf.wrapping_add(clock.mperf);
                tsc = tsc.wrapping_add(clock.tsc);
            }
            write!(
                out,
                " {} {} {} {aperf} {mperf} {tsc}",
                fixed[0], fixed[1], fixed[2]
            )?;
        }
        writeln!(out)
    }
}

fn write_power_header(out: &mut dyn Write, power: &[PowerReading]) -> io::Result<()> {
    write!(out, "_POWER_POLL host elapsed_sec")?;
    for p in power {
        let s = p.socket;
        write!(out, " pkg_watts_{s} pkg_limit_watts_{s} dram_watts_{s} dram_limit_watts_{s}")?;
    }
    Ok(())
}

fn write_power_columns(
    out: &mut dyn Write,
    host: &str,
    elapsed: f64,
    power: &[PowerReading],
    limits: &PowerLimits,
) -> io::Result<()> {
    write!(out, "_POWER_POLL {host} {elapsed:.6}")?;
    for p in power {
        let pkg_limit = limits
            .package
            .iter()
            .find(|l| l.socket == p.socket)
            .map_or(0.0, |l| l.pl1_watts);
        let dram_limit = limits
            .dram
            .iter()
            .find(|l| l.socket == p.socket)
            .map_or(0.0, |l| l.watts);
        write!(
            out,
            " {:.6} {:.6} {:.6} {:.6}",
            p.pkg_watts, pkg_limit, p.dram_watts, dram_limit
        )?;
    }
    Ok(())
}
