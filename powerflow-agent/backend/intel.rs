// Intel family 6 capability table
//
// One implementation serves every supported Intel model; the model only
// selects which RegisterMap is injected at construction.

use std::sync::Arc;

use powerflow_raw::clocks::{self, PlatformInfo, TurboRatioLimit};
use powerflow_raw::pmu::{FixedCtrCtrl, COUNTER_VALUE, GLOBAL_FIXED_ENABLE, PERFMON_COUNTERS};
use powerflow_raw::rapl::{
    pkg_limit, DramPowerLimit, RaplPowerInfo, RaplPowerLimit, ENERGY_COUNTER,
};
use powerflow_raw::thermal::{self, ThermStatus};
use powerflow_raw::{decode_units, RegisterLayout, RegisterMap, ScalingUnits};

use crate::backend::{unimplemented, Capabilities};
use crate::common::{cpuid, ArchitectureId, RegisterAccess};
use crate::error::{PowerflowError, Result};
use crate::readings::{
    ClockReading, ClockScope, CoreTemperature, CounterReading, Counters, DramPowerLimitReading,
    EnergyReading, FrequencyReading, GpuPowerRatio, PcuReading, PowerDomainInfo, PowerInfoReading,
    PowerLimitReading, PowerLimits, ThermalReading, TurboStatus,
};
use crate::topology::{ComponentClass, Topology, TopologyProvider};

pub struct IntelCpu {
    arch: ArchitectureId,
    registers: &'static RegisterMap,
    access: Arc<dyn RegisterAccess>,
    topology: Arc<dyn TopologyProvider>,
    perfmon_counters: usize,
}

impl IntelCpu {
    pub fn new(
        arch: ArchitectureId,
        registers: &'static RegisterMap,
        access: Arc<dyn RegisterAccess>,
        topology: Arc<dyn TopologyProvider>,
    ) -> Self {
        Self {
            arch,
            registers,
            access,
            topology,
            perfmon_counters: PERFMON_COUNTERS,
        }
    }

    /// Limit general-purpose counter reads to what CPUID leaf 0xA reports
    pub fn with_detected_perfmon_counters(mut self) -> Self {
        if let Some(count) = cpuid::perfmon_counter_count() {
            self.perfmon_counters = count.min(PERFMON_COUNTERS);
        }
        self
    }

    fn read(&self, cpu: u32, addr: u64) -> Result<u64> {
        self.access.read(cpu, addr)
    }

    fn units(&self, cpu: u32) -> Result<(u64, ScalingUnits)> {
        let raw = self.read(cpu, self.registers.msr_rapl_power_unit)?;
        Ok((raw, decode_units(raw)))
    }

    fn dram_units(&self, units: ScalingUnits) -> ScalingUnits {
        match self.registers.dram_energy_unit_exp {
            Some(exp) => units.with_energy_unit_exp(exp),
            None => units,
        }
    }

    fn package_limit(
        &self,
        socket: u32,
        cpu: u32,
        units: &ScalingUnits,
    ) -> Result<PowerLimitReading> {
        let raw = self.read(cpu, self.registers.msr_pkg_power_limit)?;
        let limit = RaplPowerLimit::from_msr_value(raw);

        Ok(PowerLimitReading {
            socket,
            raw,
            pl1_watts: units.watts(u64::from(limit.power_limit_1)),
            pl1_seconds: units.time_window_seconds(limit.time_window_1),
            pl1_enabled: limit.enable_1,
            pl1_clamped: limit.clamp_1,
            pl2_watts: units.watts(u64::from(limit.power_limit_2)),
            pl2_seconds: units.time_window_seconds(limit.time_window_2),
            pl2_enabled: limit.enable_2,
            pl2_clamped: limit.clamp_2,
            locked: limit.lock,
        })
    }

    fn dram_limit(
        &self,
        socket: u32,
        cpu: u32,
        units: &ScalingUnits,
    ) -> Result<DramPowerLimitReading> {
        let raw = self.read(cpu, self.registers.msr_dram_power_limit)?;
        let limit = DramPowerLimit::from_msr_value(raw);

        Ok(DramPowerLimitReading {
            socket,
            raw,
            watts: units.watts(u64::from(limit.power_limit)),
            seconds: units.time_window_seconds(limit.time_window),
            enabled: limit.enable,
            locked: limit.lock,
        })
    }

    fn power_info(
        &self,
        socket: u32,
        cpu: u32,
        addr: u64,
        units: &ScalingUnits,
    ) -> Result<PowerInfoReading> {
        let raw = self.read(cpu, addr)?;
        let info = RaplPowerInfo::from_msr_value(raw);

        Ok(PowerInfoReading {
            socket,
            raw,
            tdp_watts: units.watts(u64::from(info.thermal_spec_power)),
            min_watts: units.watts(u64::from(info.min_power)),
            max_watts: units.watts(u64::from(info.max_power)),
            max_time_window_sec: units.seconds(u64::from(info.max_time_window)),
        })
    }

    fn set_turbo_disable(&self, disable: bool) -> Result<()> {
        let topology = self.topology()?;
        let misc_enable = self.registers.ia32_misc_enable;

        for socket in 0..topology.nsockets {
            for cpu in topology.socket_threads(socket) {
                let raw = self.read(cpu, misc_enable)?;
                let value = self
                    .registers
                    .turbo_mode_disable
                    .insert(raw, u64::from(disable));
                self.access.write(cpu, misc_enable, value)?;
            }
        }
        Ok(())
    }

    fn clock_reading(
        &self,
        socket: u32,
        core: Option<u32>,
        cpu: u32,
        base_ratio: u8,
    ) -> Result<ClockReading> {
        let aperf = self.read(cpu, self.registers.ia32_aperf)?;
        let mperf = self.read(cpu, self.registers.ia32_mperf)?;
        let tsc = self.read(cpu, self.registers.ia32_time_stamp_counter)?;
        let perf_status = self.read(cpu, self.registers.ia32_perf_status)?;
        let bus = self.registers.bus_clock_mhz;

        Ok(ClockReading {
            socket,
            core,
            cpu,
            aperf,
            mperf,
            tsc,
            current_mhz: clocks::current_frequency_mhz(perf_status, bus),
            average_mhz: clocks::average_frequency_mhz(aperf, mperf, base_ratio, bus),
        })
    }
}

impl Capabilities for IntelCpu {
    fn arch(&self) -> ArchitectureId {
        self.arch
    }

    fn topology(&self) -> Result<Topology> {
        let topology = self.topology.topology(ComponentClass::Cpu)?;
        topology.validate()?;
        Ok(topology)
    }

    fn features(&self) -> Result<Vec<(String, u64)>> {
        Ok(self.registers.entries())
    }

    fn power_limits(&self) -> Result<PowerLimits> {
        let topology = self.topology()?;
        let (units_raw, units) = self.units(topology.first_cpu(0))?;

        let mut limits = PowerLimits {
            units_raw,
            units,
            package: Vec::new(),
            dram: Vec::new(),
            package_info: Vec::new(),
            dram_info: Vec::new(),
        };

        for socket in 0..topology.nsockets {
            let cpu = topology.first_cpu(socket);
            let (_, units) = self.units(cpu)?;

            limits.package.push(self.package_limit(socket, cpu, &units)?);
            limits.dram.push(self.dram_limit(socket, cpu, &units)?);
            limits.package_info.push(self.power_info(
                socket,
                cpu,
                self.registers.msr_pkg_power_info,
                &units,
            )?);
            limits.dram_info.push(self.power_info(
                socket,
                cpu,
                self.registers.msr_dram_power_info,
                &units,
            )?);
        }

        Ok(limits)
    }

    fn cap_package_power_limit(&self, watts: u32) -> Result<()> {
        let topology = self.topology()?;
        let addr = self.registers.msr_pkg_power_limit;

        // Compute every socket's new value before writing any of them
        let mut pending = Vec::with_capacity(topology.nsockets as usize);
        for socket in 0..topology.nsockets {
            let cpu = topology.first_cpu(socket);
            let (_, units) = self.units(cpu)?;
            let raw = self.read(cpu, addr)?;
            let mut limit = RaplPowerLimit::from_msr_value(raw);

            if limit.lock {
                return Err(PowerflowError::RegisterAccess(format!(
                    "package power limit on socket {socket} is locked (MSR 0x{addr:X} = 0x{raw:016X})"
                )));
            }

            let pl1 = units.power_raw(f64::from(watts));
            if !pkg_limit::POWER_LIMIT_1.fits(pl1) {
                return Err(PowerflowError::InvalidArgument(format!(
                    "{watts} W does not fit the 15-bit power limit field at 1/{} W resolution",
                    1u32 << units.power_unit_exp
                )));
            }

            limit.power_limit_1 = pl1 as u16;
            limit.enable_1 = true;
            limit.clamp_1 = true;
            pending.push((cpu, limit.to_msr_value()));
        }

        for (cpu, value) in pending {
            tracing::info!("Capping package power on CPU {cpu} to {watts} W");
            self.access.write(cpu, addr, value)?;
        }
        Ok(())
    }

    fn power_domain_info(&self) -> Result<PowerDomainInfo> {
        let topology = self.topology()?;
        let cpu = topology.first_cpu(0);
        let (_, units) = self.units(cpu)?;

        Ok(PowerDomainInfo {
            units,
            package_info: self.power_info(0, cpu, self.registers.msr_pkg_power_info, &units)?,
            dram_info: self.power_info(0, cpu, self.registers.msr_dram_power_info, &units)?,
            package_limit: self.package_limit(0, cpu, &units)?,
        })
    }

    fn energy(&self) -> Result<Vec<EnergyReading>> {
        let topology = self.topology()?;
        let mut readings = Vec::with_capacity(topology.nsockets as usize);

        for socket in 0..topology.nsockets {
            let cpu = topology.first_cpu(socket);
            let (_, units) = self.units(cpu)?;
            let dram_units = self.dram_units(units);

            let pkg_raw =
                ENERGY_COUNTER.extract(self.read(cpu, self.registers.msr_pkg_energy_status)?);
            let dram_raw =
                ENERGY_COUNTER.extract(self.read(cpu, self.registers.msr_dram_energy_status)?);

            readings.push(EnergyReading {
                socket,
                pkg_raw,
                dram_raw,
                pkg_energy_exp: units.energy_unit_exp,
                dram_energy_exp: dram_units.energy_unit_exp,
                pkg_joules: units.joules(pkg_raw),
                dram_joules: dram_units.joules(dram_raw),
            });
        }

        Ok(readings)
    }

    fn thermals(&self) -> Result<Vec<ThermalReading>> {
        let topology = self.topology()?;
        let mut readings = Vec::with_capacity(topology.nsockets as usize);

        for socket in 0..topology.nsockets {
            let first = topology.first_cpu(socket);
            let tjmax =
                thermal::tjmax_celsius(self.read(first, self.registers.msr_temperature_target)?);
            let package = ThermStatus::from_msr_value(
                self.read(first, self.registers.ia32_package_therm_status)?,
            );

            let mut cores = Vec::new();
            for (core, cpu) in topology.socket_cores(socket) {
                let status =
                    ThermStatus::from_msr_value(self.read(cpu, self.registers.ia32_therm_status)?);
                cores.push(CoreTemperature {
                    core,
                    cpu,
                    celsius: thermal::temperature_celsius(tjmax, &status),
                    valid: status.reading_valid,
                });
            }

            readings.push(ThermalReading {
                socket,
                tjmax_celsius: tjmax,
                package_celsius: thermal::temperature_celsius(tjmax, &package),
                cores,
            });
        }

        Ok(readings)
    }

    fn clocks(&self, scope: ClockScope) -> Result<Vec<ClockReading>> {
        let topology = self.topology()?;
        let mut readings = Vec::new();

        for socket in 0..topology.nsockets {
            let first = topology.first_cpu(socket);
            let platform =
                PlatformInfo::from_msr_value(self.read(first, self.registers.msr_platform_info)?);
            let base_ratio = platform.max_non_turbo_ratio;

            match scope {
                ClockScope::Socket => {
                    readings.push(self.clock_reading(socket, None, first, base_ratio)?);
                }
                ClockScope::Core => {
                    for (core, cpu) in topology.socket_cores(socket) {
                        readings.push(self.clock_reading(socket, Some(core), cpu, base_ratio)?);
                    }
                }
            }
        }

        Ok(readings)
    }

    fn counters(&self) -> Result<Counters> {
        let topology = self.topology()?;
        let registers = self.registers;
        let mut counters = Counters {
            threads: Vec::new(),
            pcu: Vec::new(),
        };

        for socket in 0..topology.nsockets {
            for cpu in topology.socket_threads(socket) {
                let mut fixed = [0u64; powerflow_raw::pmu::FIXED_COUNTERS];
                for (slot, &addr) in fixed.iter_mut().zip(&registers.ia32_fixed_counters) {
                    *slot = COUNTER_VALUE.extract(self.read(cpu, addr)?);
                }

                let mut perfevtsel = Vec::with_capacity(self.perfmon_counters);
                let mut pmc = Vec::with_capacity(self.perfmon_counters);
                for i in 0..self.perfmon_counters {
                    perfevtsel.push(self.read(cpu, registers.ia32_perfevtsel_counters[i])?);
                    pmc.push(COUNTER_VALUE.extract(
                        self.read(cpu, registers.ia32_perfmon_counters[i])?,
                    ));
                }

                counters.threads.push(CounterReading {
                    socket,
                    cpu,
                    fixed,
                    perfevtsel,
                    pmc,
                });
            }

            let first = topology.first_cpu(socket);
            let mut evtsel = [0u64; powerflow_raw::pmu::PCU_EVENT_SELECTS];
            for (slot, &addr) in evtsel.iter_mut().zip(&registers.msrs_pcu_pmon_evtsel) {
                *slot = self.read(first, addr)?;
            }
            counters.pcu.push(PcuReading { socket, evtsel });
        }

        Ok(counters)
    }

    fn enable_fixed_counters(&self) -> Result<()> {
        let topology = self.topology()?;
        let ctrl = FixedCtrCtrl::all_rings().to_msr_value();

        for socket in 0..topology.nsockets {
            for cpu in topology.socket_threads(socket) {
                self.access
                    .write(cpu, self.registers.ia32_fixed_ctr_ctrl, ctrl)?;
                let global = self.read(cpu, self.registers.ia32_perf_global_ctrl)?;
                self.access.write(
                    cpu,
                    self.registers.ia32_perf_global_ctrl,
                    GLOBAL_FIXED_ENABLE.insert(global, GLOBAL_FIXED_ENABLE.mask()),
                )?;
            }
        }
        Ok(())
    }

    fn frequencies(&self) -> Result<Vec<FrequencyReading>> {
        let topology = self.topology()?;
        let bus = self.registers.bus_clock_mhz;
        let mut readings = Vec::with_capacity(topology.nsockets as usize);

        for socket in 0..topology.nsockets {
            let cpu = topology.first_cpu(socket);
            let platform =
                PlatformInfo::from_msr_value(self.read(cpu, self.registers.msr_platform_info)?);
            let base = platform.max_non_turbo_ratio;
            let efficient = match platform.max_efficiency_ratio {
                0 => base,
                ratio => ratio.min(base),
            };

            let non_turbo_mhz = (efficient..=base)
                .rev()
                .map(|ratio| u32::from(ratio) * bus)
                .collect();

            let turbo = self.read(cpu, self.registers.msr_turbo_ratio_limit)?;
            let mut ratios = TurboRatioLimit::from_msr_value(turbo).ratios.to_vec();
            if let Some(addr) = self.registers.msr_turbo_ratio_limit1 {
                ratios.extend(TurboRatioLimit::from_msr_value(self.read(cpu, addr)?).ratios);
            }

            let mut turbo_mhz: Vec<u32> = ratios
                .into_iter()
                .filter(|&ratio| ratio > base)
                .map(|ratio| u32::from(ratio) * bus)
                .collect();
            turbo_mhz.sort_unstable_by(|a, b| b.cmp(a));
            turbo_mhz.dedup();

            readings.push(FrequencyReading {
                socket,
                min_mhz: u32::from(platform.min_operating_ratio) * bus,
                efficient_mhz: u32::from(efficient) * bus,
                base_mhz: u32::from(base) * bus,
                non_turbo_mhz,
                turbo_mhz,
            });
        }

        Ok(readings)
    }

    fn enable_turbo(&self) -> Result<()> {
        self.set_turbo_disable(false)
    }

    fn disable_turbo(&self) -> Result<()> {
        self.set_turbo_disable(true)
    }

    fn turbo_status(&self) -> Result<Vec<TurboStatus>> {
        let topology = self.topology()?;

        (0..topology.nsockets)
            .map(|socket| {
                let raw = self.read(topology.first_cpu(socket), self.registers.ia32_misc_enable)?;
                Ok(TurboStatus {
                    socket,
                    raw,
                    enabled: !self.registers.turbo_mode_disable.is_set(raw),
                })
            })
            .collect()
    }

    fn gpu_power_ratio(&self) -> Result<Vec<GpuPowerRatio>> {
        Err(unimplemented("get_gpu_power_ratio", &self.arch))
    }
}
