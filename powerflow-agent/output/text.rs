//! Human-readable rendering
//!
//! Terse mode prints one header line per table followed by space-separated
//! rows, each prefixed with the table tag so output can be grepped. Verbose
//! mode prints one self-describing `Field: value unit` line per reading.

use std::io::{self, Write};

use crate::readings::{
    ClockReading, Counters, EnergyReading, FrequencyReading, PowerLimits, PowerReading,
    ThermalReading, TurboStatus,
};

pub fn power_limits(
    out: &mut dyn Write,
    host: &str,
    limits: &PowerLimits,
    long_ver: bool,
) -> io::Result<()> {
    if long_ver {
        for pkg in &limits.package {
            writeln!(
                out,
                "_PACKAGE_POWER_LIMIT Host: {host}, Socket: {}, Bits: 0x{:016x}, PowerLimit1: {:.6} W, TimeWindow1: {:.6} sec, Enable1: {}, Clamp1: {}, PowerLimit2: {:.6} W, TimeWindow2: {:.6} sec, Enable2: {}, Clamp2: {}, Lock: {}",
                pkg.socket,
                pkg.raw,
                pkg.pl1_watts,
                pkg.pl1_seconds,
                u8::from(pkg.pl1_enabled),
                u8::from(pkg.pl1_clamped),
                pkg.pl2_watts,
                pkg.pl2_seconds,
                u8::from(pkg.pl2_enabled),
                u8::from(pkg.pl2_clamped),
                u8::from(pkg.locked),
            )?;
        }
        for dram in &limits.dram {
            writeln!(
                out,
                "_DRAM_POWER_LIMIT Host: {host}, Socket: {}, Bits: 0x{:016x}, PowerLimit: {:.6} W, TimeWindow: {:.6} sec, Enable: {}, Lock: {}",
                dram.socket,
                dram.raw,
                dram.watts,
                dram.seconds,
                u8::from(dram.enabled),
                u8::from(dram.locked),
            )?;
        }
        for (tag, infos) in [
            ("_PACKAGE_POWER_INFO", &limits.package_info),
            ("_DRAM_POWER_INFO", &limits.dram_info),
        ] {
            for info in infos {
                writeln!(
                    out,
                    "{tag} Host: {host}, Socket: {}, Bits: 0x{:016x}, MaxPower: {:.6} W, MinPower: {:.6} W, MaxTimeWindow: {:.6} sec, ThermPower: {:.6} W",
                    info.socket,
                    info.raw,
                    info.max_watts,
                    info.min_watts,
                    info.max_time_window_sec,
                    info.tdp_watts,
                )?;
            }
        }
        writeln!(
            out,
            "_RAPL_POWER_UNITS Host: {host}, Bits: 0x{:016x}, PowerUnit: {:.6} W, EnergyUnit: {:.8} J, TimeUnit: {:.8} sec",
            limits.units_raw,
            limits.units.watts(1),
            limits.units.joules(1),
            limits.units.seconds(1),
        )?;
        return Ok(());
    }

    writeln!(
        out,
        "_PACKAGE_POWER_LIMITS Host Socket Bits PowerLimit1_W TimeWindow1_sec PowerLimit2_W TimeWindow2_sec"
    )?;
    for pkg in &limits.package {
        writeln!(
            out,
            "_PACKAGE_POWER_LIMITS {host} {} 0x{:x} {:.6} {:.6} {:.6} {:.6}",
            pkg.socket,
            pkg.raw,
            pkg.pl1_watts,
            pkg.pl1_seconds,
            pkg.pl2_watts,
            pkg.pl2_seconds
        )?;
    }
    writeln!(out, "_DRAM_POWER_LIMIT Host Socket Bits PowerLimit_W TimeWindow_sec")?;
    for dram in &limits.dram {
        writeln!(
            out,
            "_DRAM_POWER_LIMIT {host} {} 0x{:x} {:.6} {:.6}",
            dram.socket, dram.raw, dram.watts, dram.seconds
        )?;
    }
    for (tag, infos) in [
        ("_PACKAGE_POWER_INFO", &limits.package_info),
        ("_DRAM_POWER_INFO", &limits.dram_info),
    ] {
        writeln!(
            out,
            "{tag} Host Socket Bits MaxPower_W MinPower_W MaxWindow_sec ThermPower_W"
        )?;
        for info in infos {
            writeln!(
                out,
                "{tag} {host} {} 0x{:x} {:.6} {:.6} {:.6} {:.6}",
                info.socket,
                info.raw,
                info.max_watts,
                info.min_watts,
                info.max_time_window_sec,
                info.tdp_watts
            )?;
        }
    }
    writeln!(out, "_RAPL_POWER_UNITS Host Bits PowerUnit_W EnergyUnit_J TimeUnit_sec")?;
    writeln!(
        out,
        "_RAPL_POWER_UNITS {host} 0x{:x} {:.6} {:.8} {:.8}",
        limits.units_raw,
        limits.units.watts(1),
        limits.units.joules(1),
        limits.units.seconds(1)
    )
}

pub fn features(out: &mut dyn Write, entries: &[(String, u64)]) -> io::Result<()> {
    let width = entries.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, addr) in entries {
        writeln!(out, "{name:<width$} = 0x{addr:x}")?;
    }
    Ok(())
}

pub fn thermals(
    out: &mut dyn Write,
    host: &str,
    readings: &[ThermalReading],
    long_ver: bool,
) -> io::Result<()> {
    if !long_ver {
        writeln!(out, "_PACKAGE_TEMPERATURES Host Socket TjMax_C Temp_C")?;
        for r in readings {
            writeln!(
                out,
                "_PACKAGE_TEMPERATURES {host} {} {} {}",
                r.socket, r.tjmax_celsius, r.package_celsius
            )?;
        }
        writeln!(out, "_CORE_TEMPERATURES Host Socket Core CPU Temp_C Valid")?;
        for r in readings {
            for core in &r.cores {
                writeln!(
                    out,
                    "_CORE_TEMPERATURES {host} {} {} {} {} {}",
                    r.socket,
                    core.core,
                    core.cpu,
                    core.celsius,
                    u8::from(core.valid)
                )?;
            }
        }
        return Ok(());
    }

    for r in readings {
        writeln!(
            out,
            "_PACKAGE_TEMPERATURE Host: {host}, Socket: {}, TjMax: {} C, Temp: {} C",
            r.socket, r.tjmax_celsius, r.package_celsius
        )?;
        for core in &r.cores {
            writeln!(
                out,
                "_CORE_TEMPERATURE Host: {host}, Socket: {}, Core: {}, CPU: {}, Temp: {} C, ReadingValid: {}",
                r.socket,
                core.core,
                core.cpu,
                core.celsius,
                u8::from(core.valid)
            )?;
        }
    }
    Ok(())
}

pub fn counters(
    out: &mut dyn Write,
    host: &str,
    counters: &Counters,
    long_ver: bool,
) -> io::Result<()> {
    if long_ver {
        for t in &counters.threads {
            write!(
                out,
                "_COUNTERS Host: {host}, Socket: {}, CPU: {}, InstRet: {}, Cycles: {}, RefCycles: {}",
                t.socket, t.cpu, t.fixed[0], t.fixed[1], t.fixed[2]
            )?;
            for (i, (evtsel, pmc)) in t.perfevtsel.iter().zip(&t.pmc).enumerate() {
                write!(out, ", PerfEvtSel{i}: 0x{evtsel:x}, PMC{i}: {pmc}")?;
            }
            writeln!(out)?;
        }
        for p in &counters.pcu {
            write!(out, "_PCU_COUNTERS Host: {host}, Socket: {}", p.socket)?;
            for (i, evtsel) in p.evtsel.iter().enumerate() {
                write!(out, ", PcuEvtSel{i}: 0x{evtsel:x}")?;
            }
            writeln!(out)?;
        }
        return Ok(());
    }

    let npmc = counters.threads.first().map_or(0, |t| t.pmc.len());
    write!(out, "_COUNTERS Host Socket CPU InstRet Cycles RefCycles")?;
    for i in 0..npmc {
        write!(out, " PMC{i}")?;
    }
    writeln!(out)?;
    for t in &counters.threads {
        write!(
            out,
            "_COUNTERS {host} {} {} {} {} {}",
            t.socket, t.cpu, t.fixed[0], t.fixed[1], t.fixed[2]
        )?;
        for pmc in &t.pmc {
            write!(out, " {pmc}")?;
        }
        writeln!(out)?;
    }
    writeln!(out, "_PCU_COUNTERS Host Socket EvtSel0 EvtSel1 EvtSel2 EvtSel3")?;
    for p in &counters.pcu {
        write!(out, "_PCU_COUNTERS {host} {}", p.socket)?;
        for evtsel in &p.evtsel {
            write!(out, " 0x{evtsel:x}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn clocks(
    out: &mut dyn Write,
    host: &str,
    readings: &[ClockReading],
    long_ver: bool,
) -> io::Result<()> {
    if !long_ver {
        writeln!(out, "_CLOCKS_DATA Host Socket APERF MPERF TSC CurrFreq_MHz AvgFreq_MHz")?;
    }
    for c in readings {
        if long_ver {
            writeln!(
                out,
                "_CLOCKS_DATA Host: {host}, Socket: {}, CPU: {}, APERF: {}, MPERF: {}, TSC: {}, CurrFreq: {} MHz, AvgFreq: {:.6} MHz",
                c.socket, c.cpu, c.aperf, c.mperf, c.tsc, c.current_mhz, c.average_mhz
            )?;
        } else {
            writeln!(
                out,
                "_CLOCKS_DATA {host} {} {} {} {} {} {:.6}",
                c.socket, c.aperf, c.mperf, c.tsc, c.current_mhz, c.average_mhz
            )?;
        }
    }
    Ok(())
}

pub fn power(
    out: &mut dyn Write,
    host: &str,
    readings: &[PowerReading],
    long_ver: bool,
) -> io::Result<()> {
    if !long_ver {
        writeln!(out, "_PACKAGE_ENERGY_STATUS Host Socket Elapsed_sec Pkg_W DRAM_W")?;
    }
    for p in readings {
        if long_ver {
            writeln!(
                out,
                "_PACKAGE_ENERGY_STATUS Host: {host}, Socket: {}, Elapsed: {:.6} sec, PkgPower: {:.6} W, DRAMPower: {:.6} W",
                p.socket, p.elapsed_sec, p.pkg_watts, p.dram_watts
            )?;
        } else {
            writeln!(
                out,
                "_PACKAGE_ENERGY_STATUS {host} {} {:.6} {:.6} {:.6}",
                p.socket, p.elapsed_sec, p.pkg_watts, p.dram_watts
            )?;
        }
    }
    Ok(())
}

pub fn energy(
    out: &mut dyn Write,
    host: &str,
    readings: &[EnergyReading],
    long_ver: bool,
) -> io::Result<()> {
    if !long_ver {
        writeln!(out, "_ENERGY_STATUS Host Socket Pkg_J DRAM_J")?;
    }
    for e in readings {
        if long_ver {
            writeln!(
                out,
                "_ENERGY_STATUS Host: {host}, Socket: {}, PkgBits: 0x{:x}, PkgEnergy: {:.6} J, DRAMBits: 0x{:x}, DRAMEnergy: {:.6} J",
                e.socket, e.pkg_raw, e.pkg_joules, e.dram_raw, e.dram_joules
            )?;
        } else {
            writeln!(
                out,
                "_ENERGY_STATUS {host} {} {:.6} {:.6}",
                e.socket, e.pkg_joules, e.dram_joules
            )?;
        }
    }
    Ok(())
}

pub fn turbo_status(out: &mut dyn Write, host: &str, readings: &[TurboStatus]) -> io::Result<()> {
    for t in readings {
        writeln!(
            out,
            "Turbo {} on socket {} ({host}), IA32_MISC_ENABLE = 0x{:x}",
            if t.enabled { "Enabled" } else { "Disabled" },
            t.socket,
            t.raw
        )?;
    }
    Ok(())
}

pub fn frequencies(out: &mut dyn Write, readings: &[FrequencyReading]) -> io::Result<()> {
    for f in readings {
        writeln!(out, "=== Socket {} ===", f.socket)?;
        writeln!(out, "Min Operating Frequency = {} MHz", f.min_mhz)?;
        writeln!(out, "Max Efficiency Frequency = {} MHz", f.efficient_mhz)?;
        writeln!(out, "Base Frequency = {} MHz", f.base_mhz)?;
        writeln!(out, "Non-Turbo Frequencies (MHz):")?;
        write_list(out, &f.non_turbo_mhz)?;
        writeln!(out, "Turbo Frequencies (MHz):")?;
        write_list(out, &f.turbo_mhz)?;
    }
    Ok(())
}

fn write_list(out: &mut dyn Write, values: &[u32]) -> io::Result<()> {
    let line: Vec<String> = values.iter().map(u32::to_string).collect();
    writeln!(out, "  {}", line.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readings::CoreTemperature;

    fn render(f: impl FnOnce(&mut dyn Write) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_features_are_aligned() {
        let text = render(|out| {
            features(
                out,
                &[("ia32_mperf".to_string(), 0xE7), ("msr_rapl_power_unit".to_string(), 0x606)],
            )
        });
        assert_eq!(
            text,
            "ia32_mperf          = 0xe7\nmsr_rapl_power_unit = 0x606\n"
        );
    }

    #[test]
    fn test_terse_thermals_have_one_header_per_table() {
        let readings = vec![ThermalReading {
            socket: 0,
            tjmax_celsius: 95,
            package_celsius: 55,
            cores: vec![CoreTemperature {
                core: 0,
                cpu: 0,
                celsius: 50,
                valid: true,
            }],
        }];

        let text = render(|out| thermals(out, "node01", &readings, false));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "_PACKAGE_TEMPERATURES node01 0 95 55");
        assert_eq!(lines[3], "_CORE_TEMPERATURES node01 0 0 0 50 1");
    }

    #[test]
    fn test_verbose_power_is_self_describing() {
        let readings = [PowerReading {
            socket: 1,
            pkg_watts: 80.5,
            dram_watts: 12.0,
            elapsed_sec: 0.1,
        }];
        let text = render(|out| power(out, "node01", &readings, true));
        assert!(text.starts_with("_PACKAGE_ENERGY_STATUS Host: node01, Socket: 1"));
        assert!(text.contains("PkgPower: 80.500000 W"));
    }
}
