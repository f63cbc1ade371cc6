//! Stable key layout of every structured result
//!
//! Per-socket data lives under `socket_<n>`; every top-level result also
//! carries `host` and `timestamp_us`.

use powerflow_raw::pmu::PerfEvtSel;
use powerflow_raw::{RegisterLayout, ScalingUnits};

use super::structured::{ObjectBuilder, StructuredValue};
use super::socket_key;
use crate::readings::{
    ClockReading, Counters, EnergyReading, FrequencyReading, PowerDomainInfo, PowerInfoReading,
    PowerLimitReading, PowerLimits, PowerReading, ThermalReading, TurboStatus,
};

pub fn rapl_unit(units: &ScalingUnits) -> ObjectBuilder {
    StructuredValue::builder()
        .field("power_unit_exp", units.power_unit_exp)
        .field("energy_unit_exp", units.energy_unit_exp)
        .field("time_unit_exp", units.time_unit_exp)
}

pub fn power_info(info: &PowerInfoReading) -> ObjectBuilder {
    StructuredValue::builder()
        .field("min_watts", info.min_watts)
        .field("max_watts", info.max_watts)
        .field("tdp_watts", info.tdp_watts)
        .field("time_window_sec", info.max_time_window_sec)
        .field("raw", info.raw)
}

pub fn package_limit(limit: &PowerLimitReading) -> ObjectBuilder {
    StructuredValue::builder()
        .field("pl1_watts", limit.pl1_watts)
        .field("pl1_time_window_sec", limit.pl1_seconds)
        .field("pl1_enabled", limit.pl1_enabled)
        .field("pl1_clamped", limit.pl1_clamped)
        .field("pl2_watts", limit.pl2_watts)
        .field("pl2_time_window_sec", limit.pl2_seconds)
        .field("pl2_enabled", limit.pl2_enabled)
        .field("pl2_clamped", limit.pl2_clamped)
        .field("locked", limit.locked)
        .field("raw", limit.raw)
}

pub fn power_limits(limits: &PowerLimits, out: &mut ObjectBuilder) {
    out.insert("rapl_unit", rapl_unit(&limits.units).field("raw", limits.units_raw));

    for (i, pkg) in limits.package.iter().enumerate() {
        let mut socket = StructuredValue::builder()
            .field("pkg_power_limit", package_limit(pkg));

        if let Some(dram) = limits.dram.get(i) {
            socket.insert(
                "dram_power_limit",
                StructuredValue::builder()
                    .field("watts", dram.watts)
                    .field("time_window_sec", dram.seconds)
                    .field("enabled", dram.enabled)
                    .field("locked", dram.locked)
                    .field("raw", dram.raw),
            );
        }
        if let Some(info) = limits.package_info.get(i) {
            socket.insert("pkg_power_info", power_info(info));
        }
        if let Some(info) = limits.dram_info.get(i) {
            socket.insert("dram_power_info", power_info(info));
        }

        out.insert(socket_key(pkg.socket), socket);
    }
}

pub fn domain_info(info: &PowerDomainInfo, out: &mut ObjectBuilder) {
    out.insert("pkg_power_info", power_info(&info.package_info));
    out.insert("dram_power_info", power_info(&info.dram_info));
    out.insert("rapl_unit", rapl_unit(&info.units));
    out.insert("pkg_power_limit", package_limit(&info.package_limit));
}

pub fn features(entries: &[(String, u64)], out: &mut ObjectBuilder) {
    let mut registers = StructuredValue::builder();
    for (name, addr) in entries {
        registers.insert(name.as_str(), *addr);
    }
    out.insert("registers", registers);
}

pub fn thermals(readings: &[ThermalReading], out: &mut ObjectBuilder) {
    for reading in readings {
        let mut socket = StructuredValue::builder()
            .field("tjmax_celsius", reading.tjmax_celsius)
            .field("package_celsius", reading.package_celsius);
        for core in &reading.cores {
            socket.insert(
                format!("core_{}", core.core),
                StructuredValue::builder()
                    .field("celsius", core.celsius)
                    .field("cpu", core.cpu)
                    .field("reading_valid", core.valid),
            );
        }
        out.insert(socket_key(reading.socket), socket);
    }
}

/// Per-core clocks grouped under their socket
pub fn clocks(readings: &[ClockReading], out: &mut ObjectBuilder) {
    let mut sockets: std::collections::BTreeMap<u32, ObjectBuilder> = Default::default();

    for clock in readings {
        let entry = StructuredValue::builder()
            .field("cpu", clock.cpu)
            .field("aperf", clock.aperf)
            .field("mperf", clock.mperf)
            .field("tsc", clock.tsc)
            .field("current_mhz", clock.current_mhz)
            .field("average_mhz", clock.average_mhz);
        let key = match clock.core {
            Some(core) => format!("core_{core}"),
            None => format!("cpu_{}", clock.cpu),
        };
        sockets.entry(clock.socket).or_default().insert(key, entry);
    }

    for (socket, fields) in sockets {
        out.insert(socket_key(socket), fields);
    }
}

pub fn counters(counters: &Counters, out: &mut ObjectBuilder) {
    let mut sockets: std::collections::BTreeMap<u32, ObjectBuilder> = Default::default();

    for thread in &counters.threads {
        let mut entry = StructuredValue::builder()
            .field("instructions_retired", thread.fixed[0])
            .field("core_cycles", thread.fixed[1])
            .field("ref_cycles", thread.fixed[2]);
        for (i, (pmc, evtsel)) in thread.pmc.iter().zip(&thread.perfevtsel).enumerate() {
            entry.insert(format!("pmc{i}"), *pmc);
            entry.insert(format!("perfevtsel{i}"), *evtsel);

            let sel = PerfEvtSel::from_msr_value(*evtsel);
            entry.insert(format!("pmc{i}_event"), sel.event_select);
            entry.insert(format!("pmc{i}_umask"), sel.umask);
            entry.insert(format!("pmc{i}_enabled"), sel.enable);
        }
        sockets
            .entry(thread.socket)
            .or_default()
            .insert(format!("cpu_{}", thread.cpu), entry);
    }

    for pcu in &counters.pcu {
        let socket = sockets.entry(pcu.socket).or_default();
        for (i, evtsel) in pcu.evtsel.iter().enumerate() {
            socket.insert(format!("pcu_evtsel{i}"), *evtsel);
        }
    }

    for (socket, fields) in sockets {
        out.insert(socket_key(socket), fields);
    }
}

pub fn power(readings: &[PowerReading], limits: &[PowerLimitReading], out: &mut ObjectBuilder) {
    let mut node_watts = 0.0;

    for reading in readings {
        node_watts += reading.pkg_watts + reading.dram_watts;
        let mut socket = StructuredValue::builder()
            .field("pkg_watts", reading.pkg_watts)
            .field("dram_watts", reading.dram_watts)
            .field("elapsed_sec", reading.elapsed_sec);
        if let Some(limit) = limits.iter().find(|l| l.socket == reading.socket) {
            socket.insert("pkg_pl1_watts", limit.pl1_watts);
        }
        out.insert(socket_key(reading.socket), socket);
    }

    out.insert("node_watts", node_watts);
}

pub fn energy(readings: &[EnergyReading], out: &mut ObjectBuilder) {
    socket_objects!(out, readings, |reading| StructuredValue::builder()
        .field("pkg_joules", reading.pkg_joules)
        .field("dram_joules", reading.dram_joules)
        .field("pkg_raw", reading.pkg_raw)
        .field("dram_raw", reading.dram_raw)
        .field("pkg_energy_unit_exp", reading.pkg_energy_exp)
        .field("dram_energy_unit_exp", reading.dram_energy_exp));
}

pub fn turbo_status(readings: &[TurboStatus], out: &mut ObjectBuilder) {
    socket_objects!(out, readings, |status| StructuredValue::builder()
        .field("turbo_enabled", status.enabled)
        .field("misc_enable_raw", status.raw));
}

pub fn frequencies(readings: &[FrequencyReading], out: &mut ObjectBuilder) {
    socket_objects!(out, readings, |freq| StructuredValue::builder()
        .field("min_mhz", freq.min_mhz)
        .field("efficient_mhz", freq.efficient_mhz)
        .field("base_mhz", freq.base_mhz)
        .field("non_turbo_mhz", freq.non_turbo_mhz.clone())
        .field("turbo_mhz", freq.turbo_mhz.clone()));
}
