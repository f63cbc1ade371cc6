//! Uniform call surface over the active capability table
//!
//! [`Powerflow`] resolves the table once at construction. Every call logs its
//! capability name when verbose tracing is configured, and every failure is
//! reported once through [`report_error`] before being returned.

pub mod capping;
pub mod poll;
pub mod sampler;

use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

use crate::backend::Capabilities;
use crate::common::{identify, ArchitectureId, Msr};
use crate::config::Config;
use crate::error::{report_error, PowerflowError, Result, HOSTNAME};
use crate::output::{self, schema, text, ObjectBuilder, StructuredValue};
use crate::readings::ClockScope;
use crate::registry;
use crate::topology::SysfsTopology;

use poll::{MonitorSample, PollState};
use sampler::PowerSampler;

named_enum! {
    pub enum Capability {
        GetPowerLimits => "get_power_limits",
        CapPowerLimits => "cap_power_limits",
        GetFeatures => "get_features",
        GetThermals => "get_thermals",
        GetCounters => "get_counters",
        GetClocks => "get_clocks",
        GetPower => "get_power",
        GetEnergy => "get_energy",
        EnableTurbo => "enable_turbo",
        DisableTurbo => "disable_turbo",
        GetTurboStatus => "get_turbo_status",
        PollPower => "poll_power",
        Monitoring => "monitoring",
        CapBestEffortNodePowerLimit => "cap_best_effort_node_power_limit",
        GetFrequencies => "get_frequencies",
        GetGpuPowerRatio => "get_gpu_power_ratio",
        GetPowerLimitsJson => "get_power_limits_json",
        GetFeaturesJson => "get_features_json",
        GetThermalsJson => "get_thermals_json",
        GetCountersJson => "get_counters_json",
        GetClocksJson => "get_clocks_json",
        GetPowerJson => "get_power_json",
        GetEnergyJson => "get_energy_json",
        GetTurboStatusJson => "get_turbo_status_json",
        GetFrequenciesJson => "get_frequencies_json",
        GetNodePowerDomainInfoJson => "get_node_power_domain_info_json",
    }
}

pub struct Powerflow {
    config: Config,
    table: Arc<dyn Capabilities>,
    sampler: Mutex<PowerSampler>,
    poll: Mutex<PollState>,
}

impl Powerflow {
    /// Identify the processor and bind the matching capability table
    pub fn init(config: Config) -> Result<Self> {
        let table = identify()
            .and_then(|id| {
                registry::resolve(
                    &id,
                    Arc::new(Msr::instance()),
                    Arc::new(SysfsTopology::default()),
                )
            })
            .map_err(|e| {
                report_error(&e, "init");
                e
            })?;

        Ok(Self::with_backend(config, table))
    }

    pub fn with_backend(config: Config, table: Arc<dyn Capabilities>) -> Self {
        Self {
            config,
            table,
            sampler: Mutex::new(PowerSampler::new()),
            poll: Mutex::new(PollState::default()),
        }
    }

    pub fn arch(&self) -> ArchitectureId {
        self.table.arch()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn host(&self) -> &'static str {
        HOSTNAME.as_str()
    }

    fn invoke<T>(
        &self,
        capability: Capability,
        call: impl FnOnce(&dyn Capabilities) -> Result<T>,
    ) -> Result<T> {
        if self.config.verbose {
            tracing::info!("Running {capability}");
        }

        call(self.table.as_ref()).map_err(|e| {
            report_error(&e, capability.name());
            e
        })
    }

    /// Build a complete result object and merge it into `target` only on success
    fn populate(
        &self,
        capability: Capability,
        target: &mut StructuredValue,
        fill: impl FnOnce(&dyn Capabilities, &mut ObjectBuilder) -> Result<()>,
    ) -> Result<()> {
        self.invoke(capability, |table| {
            if !target.is_object() {
                return Err(PowerflowError::OutputSerialization(
                    "structured output target must be an object".into(),
                ));
            }

            let mut result = output::envelope(self.host());
            fill(table, &mut result)?;
            target.merge(result.into_fields())
        })
    }

    pub fn print_power_limits(&self, out: &mut dyn Write, long_ver: bool) -> Result<()> {
        self.invoke(Capability::GetPowerLimits, |table| {
            let limits = table.power_limits()?;
            text::power_limits(out, self.host(), &limits, long_ver)?;
            Ok(())
        })
    }

    /// Program the same package limit on every socket
    pub fn cap_power_limits(&self, package_watts: u32) -> Result<()> {
        self.invoke(Capability::CapPowerLimits, |table| {
            table.cap_package_power_limit(package_watts)
        })
    }

    pub fn print_features(&self, out: &mut dyn Write) -> Result<()> {
        self.invoke(Capability::GetFeatures, |table| {
            text::features(out, &table.features()?)?;
            Ok(())
        })
    }

    pub fn print_thermals(&self, out: &mut dyn Write, long_ver: bool) -> Result<()> {
        self.invoke(Capability::GetThermals, |table| {
            text::thermals(out, self.host(), &table.thermals()?, long_ver)?;
            Ok(())
        })
    }

    pub fn print_counters(&self, out: &mut dyn Write, long_ver: bool) -> Result<()> {
        self.invoke(Capability::GetCounters, |table| {
            text::counters(out, self.host(), &table.counters()?, long_ver)?;
            Ok(())
        })
    }

    pub fn print_clocks(&self, out: &mut dyn Write, long_ver: bool) -> Result<()> {
        self.invoke(Capability::GetClocks, |table| {
            text::clocks(out, self.host(), &table.clocks(ClockScope::Socket)?, long_ver)?;
            Ok(())
        })
    }

    pub fn print_power(&self, out: &mut dyn Write, long_ver: bool) -> Result<()> {
        self.invoke(Capability::GetPower, |table| {
            let power = self
                .sampler
                .lock()
                .sample(table, self.config.sample_interval)?;
            text::power(out, self.host(), &power, long_ver)?;
            Ok(())
        })
    }

    pub fn print_energy(&self, out: &mut dyn Write, long_ver: bool) -> Result<()> {
        self.invoke(Capability::GetEnergy, |table| {
            text::energy(out, self.host(), &table.energy()?, long_ver)?;
            Ok(())
        })
    }

    pub fn enable_turbo(&self) -> Result<()> {
        self.invoke(Capability::EnableTurbo, |table| table.enable_turbo())
    }

    pub fn disable_turbo(&self) -> Result<()> {
        self.invoke(Capability::DisableTurbo, |table| table.disable_turbo())
    }

    pub fn print_turbo_status(&self, out: &mut dyn Write) -> Result<()> {
        self.invoke(Capability::GetTurboStatus, |table| {
            text::turbo_status(out, self.host(), &table.turbo_status()?)?;
            Ok(())
        })
    }

    /// Append one row of per-socket power and limits, with a header on the first call
    pub fn poll_power(&self, out: &mut dyn Write) -> Result<()> {
        self.invoke(Capability::PollPower, |table| {
            let power = self
                .sampler
                .lock()
                .sample(table, self.config.sample_interval)?;
            let limits = table.power_limits()?;

            let mut poll = self.poll.lock();
            let elapsed = poll.elapsed();
            poll.write_power_row(out, self.host(), elapsed, &power, &limits)?;
            Ok(())
        })
    }

    /// Like [`Powerflow::poll_power`] with fixed counter and clock sums per socket
    ///
    /// Fixed counters are enabled on the first call.
    pub fn monitoring(&self, out: &mut dyn Write) -> Result<()> {
        self.invoke(Capability::Monitoring, |table| {
            if !self.poll.lock().fixed_counters_enabled() {
                table.enable_fixed_counters()?;
                self.poll.lock().mark_fixed_counters_enabled();
            }

            let power = self
                .sampler
                .lock()
                .sample(table, self.config.sample_interval)?;
            let limits = table.power_limits()?;
            let counters = table.counters()?;
            let clocks = table.clocks(ClockScope::Core)?;

            let mut poll = self.poll.lock();
            let elapsed = poll.elapsed();
            poll.write_monitor_row(
                out,
                self.host(),
                elapsed,
                &MonitorSample {
                    power: &power,
                    limits: &limits,
                    counters: &counters,
                    clocks: &clocks,
                },
            )?;
            Ok(())
        })
    }

    /// Split `node_limit_watts` evenly across sockets, rounding down
    pub fn cap_best_effort_node_power_limit(&self, node_limit_watts: u32) -> Result<()> {
        self.invoke(Capability::CapBestEffortNodePowerLimit, |table| {
            let topology = table.topology()?;
            let per_socket = capping::split_node_limit(node_limit_watts, topology.nsockets)?;
            tracing::info!(
                "Capping node to {node_limit_watts} W as {per_socket} W on each of {} sockets",
                topology.nsockets
            );
            table.cap_package_power_limit(per_socket)
        })
    }

    pub fn print_frequencies(&self, out: &mut dyn Write) -> Result<()> {
        self.invoke(Capability::GetFrequencies, |table| {
            text::frequencies(out, &table.frequencies()?)?;
            Ok(())
        })
    }

    pub fn print_gpu_power_ratio(&self, out: &mut dyn Write) -> Result<()> {
        self.invoke(Capability::GetGpuPowerRatio, |table| {
            let ratios = table.gpu_power_ratio()?;
            writeln!(out, "_GPU_POWER_RATIO Host Socket Ratio_pct")?;
            for ratio in ratios {
                writeln!(
                    out,
                    "_GPU_POWER_RATIO {} {} {:.2}",
                    self.host(),
                    ratio.socket,
                    ratio.ratio_percent
                )?;
            }
            Ok(())
        })
    }

    pub fn power_limits_json(&self, target: &mut StructuredValue) -> Result<()> {
        self.populate(Capability::GetPowerLimitsJson, target, |table, out| {
            schema::power_limits(&table.power_limits()?, out);
            Ok(())
        })
    }

    pub fn features_json(&self, target: &mut StructuredValue) -> Result<()> {
        self.populate(Capability::GetFeaturesJson, target, |table, out| {
            schema::features(&table.features()?, out);
            Ok(())
        })
    }

    pub fn thermals_json(&self, target: &mut StructuredValue) -> Result<()> {
        self.populate(Capability::GetThermalsJson, target, |table, out| {
            schema::thermals(&table.thermals()?, out);
            Ok(())
        })
    }

    pub fn counters_json(&self, target: &mut StructuredValue) -> Result<()> {
        self.populate(Capability::GetCountersJson, target, |table, out| {
            schema::counters(&table.counters()?, out);
            Ok(())
        })
    }

    /// Per-core clocks
    pub fn clocks_json(&self, target: &mut StructuredValue) -> Result<()> {
        self.populate(Capability::GetClocksJson, target, |table, out| {
            schema::clocks(&table.clocks(ClockScope::Core)?, out);
            Ok(())
        })
    }

    pub fn power_json(&self, target: &mut StructuredValue) -> Result<()> {
        self.populate(Capability::GetPowerJson, target, |table, out| {
            let power = self
                .sampler
                .lock()
                .sample(table, self.config.sample_interval)?;
            let limits = table.power_limits()?;
            schema::power(&power, &limits.package, out);
            Ok(())
        })
    }

    pub fn energy_json(&self, target: &mut StructuredValue) -> Result<()> {
        self.populate(Capability::GetEnergyJson, target, |table, out| {
            schema::energy(&table.energy()?, out);
            Ok(())
        })
    }

    pub fn turbo_status_json(&self, target: &mut StructuredValue) -> Result<()> {
        self.populate(Capability::GetTurboStatusJson, target, |table, out| {
            schema::turbo_status(&table.turbo_status()?, out);
            Ok(())
        })
    }

    pub fn frequencies_json(&self, target: &mut StructuredValue) -> Result<()> {
        self.populate(Capability::GetFrequenciesJson, target, |table, out| {
            schema::frequencies(&table.frequencies()?, out);
            Ok(())
        })
    }

    pub fn node_power_domain_info_json(&self, target: &mut StructuredValue) -> Result<()> {
        self.populate(Capability::GetNodePowerDomainInfoJson, target, |table, out| {
            schema::domain_info(&table.power_domain_info()?, out);
            Ok(())
        })
    }
}

#[cfg(all(test, feature = "ivybridge-ep", feature = "skylake-sp"))]
mod tests {
    use super::*;
    use crate::backend::testing::{FakeMsr, FixedTopology};
    use crate::backend::IntelCpu;
    use crate::common::Vendor;
    use crate::topology::Topology;
    use powerflow_raw::arch::ivybridge_ep;
    use powerflow_raw::rapl::RaplPowerLimit;
    use powerflow_raw::{RegisterLayout, ScalingUnits};
    use std::time::Duration;

    const UNITS: ScalingUnits = ScalingUnits {
        power_unit_exp: 3,
        energy_unit_exp: 14,
        time_unit_exp: 10,
    };

    fn engine(topology: Topology) -> (Arc<FakeMsr>, Powerflow) {
        let msr = Arc::new(FakeMsr::new());
        for socket in 0..topology.nsockets {
            msr.set(topology.first_cpu(socket), 0x606, UNITS.to_msr_value());
        }
        let table = IntelCpu::new(
            ArchitectureId::from_signature(Vendor::Intel, 0x0003_06E4),
            &ivybridge_ep::REGISTERS,
            msr.clone(),
            Arc::new(FixedTopology(topology)),
        );
        let config = Config::default()
            .with_verbose(true)
            .with_sample_interval(Duration::ZERO);
        (msr, Powerflow::with_backend(config, Arc::new(table)))
    }

    #[test]
    fn test_node_cap_splits_evenly_and_rounds_down() {
        let (msr, flow) = engine(Topology::new(2, 4, 8));
        flow.cap_best_effort_node_power_limit(101).unwrap();

        let writes = msr.writes();
        assert_eq!(writes.len(), 2);
        let cpus: Vec<u32> = writes.iter().map(|w| w.0).collect();
        assert_eq!(cpus, vec![0, 2]);
        for (_, addr, value) in writes {
            assert_eq!(addr, 0x610);
            assert_eq!(RaplPowerLimit::from_msr_value(value).power_limit_1, 50 * 8);
        }
    }

    #[test]
    fn test_node_cap_with_zero_sockets_writes_nothing() {
        let (msr, flow) = engine(Topology::new(0, 0, 0));
        let err = flow.cap_best_effort_node_power_limit(100).unwrap_err();
        assert!(matches!(err, PowerflowError::InvalidTopology(_)));
        assert_eq!(err.code(), 5);
        assert!(msr.writes().is_empty());
    }

    #[test]
    fn test_domain_info_schema() {
        let (msr, flow) = engine(Topology::new(1, 2, 2));
        msr.set(0, 0x614, ((60 * 8) << 16) | (115 * 8));

        let mut target = StructuredValue::object();
        flow.node_power_domain_info_json(&mut target).unwrap();

        assert!(target.get("host").is_some());
        assert!(target.get("timestamp_us").is_some());
        assert_eq!(
            target
                .pointer(["pkg_power_info", "tdp_watts"])
                .and_then(StructuredValue::as_f64),
            Some(115.0)
        );
        assert_eq!(
            target
                .pointer(["pkg_power_info", "min_watts"])
                .and_then(StructuredValue::as_f64),
            Some(60.0)
        );
        assert_eq!(
            target
                .pointer(["rapl_unit", "energy_unit_exp"])
                .and_then(StructuredValue::as_u64),
            Some(14)
        );
        assert_eq!(
            target
                .pointer(["pkg_power_info", "raw"])
                .and_then(StructuredValue::as_u64),
            Some(((60 * 8) << 16) | (115 * 8))
        );
        for key in ["dram_power_info", "pkg_power_limit"] {
            assert!(target.get(key).is_some(), "missing {key}");
        }
        assert!(target.pointer(["pkg_power_limit", "raw"]).is_some());
    }

    #[test]
    fn test_failed_power_sample_keeps_baseline() {
        let (msr, flow) = engine(Topology::new(1, 1, 1));
        let mut out = Vec::new();
        flow.print_power(&mut out, false).unwrap();

        msr.deny(0x611);
        assert!(flow.print_power(&mut out, false).is_err());
        msr.allow(0x611);

        // One energy snapshot (unit, package and DRAM registers), no new baseline
        let before = msr.read_count();
        flow.print_power(&mut out, false).unwrap();
        assert_eq!(msr.read_count() - before, 3);
    }

    #[test]
    fn test_counters_json_decodes_event_selects() {
        let (msr, flow) = engine(Topology::new(1, 1, 1));
        msr.set(0, 0x186, 0x0043_013C);

        let mut target = StructuredValue::object();
        flow.counters_json(&mut target).unwrap();

        let cpu = target.pointer(["socket_0", "cpu_0"]).unwrap();
        assert_eq!(cpu.get("pmc0_event").and_then(StructuredValue::as_u64), Some(0x3C));
        assert_eq!(cpu.get("pmc0_umask").and_then(StructuredValue::as_u64), Some(1));
        assert_eq!(cpu.get("pmc0_enabled").and_then(StructuredValue::as_bool), Some(true));
        assert_eq!(cpu.get("pmc1_enabled").and_then(StructuredValue::as_bool), Some(false));
    }

    #[test]
    fn test_thermals_json_carries_core_detail() {
        let (msr, flow) = engine(Topology::new(1, 2, 4));
        msr.set(0, 0x1A2, 95 << 16);
        msr.set(1, 0x19C, (1 << 31) | (30 << 16));

        let mut target = StructuredValue::object();
        flow.thermals_json(&mut target).unwrap();

        let core = target.pointer(["socket_0", "core_1"]).unwrap();
        assert_eq!(core.get("celsius").and_then(StructuredValue::as_f64), Some(65.0));
        assert_eq!(core.get("cpu").and_then(StructuredValue::as_u64), Some(1));
        assert_eq!(
            core.get("reading_valid").and_then(StructuredValue::as_bool),
            Some(true)
        );
        assert_eq!(
            target
                .pointer(["socket_0", "core_0", "reading_valid"])
                .and_then(StructuredValue::as_bool),
            Some(false)
        );
    }

    #[test]
    fn test_failed_structured_call_leaves_target_untouched() {
        let (msr, flow) = engine(Topology::new(2, 4, 8));
        msr.deny(0x1A2);

        let mut target = StructuredValue::builder().field("caller", 1u32).build();
        let before = target.clone();
        let err = flow.thermals_json(&mut target).unwrap_err();

        assert!(matches!(err, PowerflowError::RegisterAccess(_)));
        assert_eq!(target, before);
    }

    #[test]
    fn test_non_object_target_is_rejected_before_reading() {
        let (msr, flow) = engine(Topology::new(1, 1, 1));
        let mut target = StructuredValue::Bool(true);
        assert!(matches!(
            flow.energy_json(&mut target),
            Err(PowerflowError::OutputSerialization(_))
        ));
        assert_eq!(msr.read_count(), 0);
    }

    #[test]
    fn test_power_json_has_every_socket() {
        let (msr, flow) = engine(Topology::new(2, 4, 8));
        msr.set(2, 0x611, 16384);

        let mut target = StructuredValue::object();
        flow.power_json(&mut target).unwrap();

        for key in ["socket_0", "socket_1", "node_watts"] {
            assert!(target.get(key).is_some(), "missing {key}");
        }
        assert!(target.pointer(["socket_1", "pkg_pl1_watts"]).is_some());
    }

    #[test]
    fn test_power_reflects_energy_between_calls() {
        let (msr, flow) = engine(Topology::new(1, 1, 1));
        let mut sink = Vec::new();
        flow.print_power(&mut sink, false).unwrap();

        msr.set(0, 0x611, 16384 * 5);
        let mut target = StructuredValue::object();
        flow.power_json(&mut target).unwrap();

        let watts = target
            .pointer(["socket_0", "pkg_watts"])
            .and_then(StructuredValue::as_f64)
            .unwrap();
        assert!(watts > 0.0);
    }

    #[test]
    fn test_gpu_power_ratio_is_unimplemented_on_cpu() {
        let (_, flow) = engine(Topology::new(1, 1, 1));
        let mut sink = Vec::new();
        let err = flow.print_gpu_power_ratio(&mut sink).unwrap_err();
        assert!(matches!(err, PowerflowError::CapabilityUnimplemented { .. }));
        assert_eq!(err.code(), 3);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_poll_power_writes_header_once() {
        let (_, flow) = engine(Topology::new(2, 4, 8));
        let mut sink = Vec::new();
        flow.poll_power(&mut sink).unwrap();
        flow.poll_power(&mut sink).unwrap();

        let text = String::from_utf8(sink).unwrap();
        let headers = text.lines().filter(|l| l.contains("elapsed_sec")).count();
        assert_eq!(headers, 1);
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_monitoring_enables_fixed_counters_once() {
        let (msr, flow) = engine(Topology::new(1, 1, 1));
        let mut sink = Vec::new();
        flow.monitoring(&mut sink).unwrap();
        flow.monitoring(&mut sink).unwrap();

        let ctrl_writes = msr.writes().iter().filter(|w| w.1 == 0x38D).count();
        assert_eq!(ctrl_writes, 1);
        assert_eq!(msr.get(0, 0x38D), 0x333);
    }

    #[test]
    fn test_turbo_round_trip_through_engine() {
        let (_, flow) = engine(Topology::new(2, 4, 8));
        flow.disable_turbo().unwrap();

        let mut target = StructuredValue::object();
        flow.turbo_status_json(&mut target).unwrap();
        assert_eq!(
            target
                .pointer(["socket_1", "turbo_enabled"])
                .and_then(StructuredValue::as_bool),
            Some(false)
        );

        flow.enable_turbo().unwrap();
        let mut sink = Vec::new();
        flow.print_turbo_status(&mut sink).unwrap();
        assert!(String::from_utf8(sink).unwrap().contains("Turbo Enabled"));
    }

    #[test]
    fn test_capability_names() {
        assert_eq!(
            Capability::CapBestEffortNodePowerLimit.name(),
            "cap_best_effort_node_power_limit"
        );
        assert_eq!(Capability::all().len(), 26);
    }
}
