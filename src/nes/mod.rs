pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod controller;
pub mod cpu;
pub mod dma;
pub mod interrupt;
pub mod mapper;
pub mod opcodes;
pub mod palette;
pub mod ppu;
pub mod ppu_bus;
pub mod ram;

use std::collections::VecDeque;

use serde::Serialize;

use apu::Apu;
use bus::{BusCounters, CpuBus, DmcReader, WORK_RAM_SIZE};
use cartridge::Cartridge;
use controller::Controller;
use cpu::{Cpu, CpuRegisters};
use dma::OamDma;
use interrupt::InterruptRouter;
use mapper::{Mapper, create_mapper, mapper_name};
use ppu::{FRAME_HEIGHT, FRAME_WIDTH, Ppu, PpuDebugCounters};
use ram::Ram;

use crate::config::NesConfig;
use crate::error::NesError;

pub const BUTTON_A: u8 = 0x80;
pub const BUTTON_B: u8 = 0x40;
pub const BUTTON_SELECT: u8 = 0x20;
pub const BUTTON_START: u8 = 0x10;
pub const BUTTON_UP: u8 = 0x08;
pub const BUTTON_DOWN: u8 = 0x04;
pub const BUTTON_LEFT: u8 = 0x02;
pub const BUTTON_RIGHT: u8 = 0x01;

const MAX_DEBUG_EVENTS: usize = 512;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NesDebugCounters {
    pub ticks: u64,
    pub frame_count: u64,
    pub cpu_clocks: u64,
    pub instructions: u64,
    pub nmi_serviced: u64,
    pub irq_serviced: u64,
    pub irq_dropped: u64,
    pub ppu_cycles: u64,
    pub apu_clocks: u64,
    pub audio_samples: u64,
    pub dropped_samples: u64,
    pub dma_transfers: u64,
    pub dma_stall_cycles: u64,
    pub dmc_fetches: u64,
    pub dmc_stall_cycles: u64,
    pub enforced_stall_cycles: u64,
    pub cpu_reads: u64,
    pub cpu_writes: u64,
}

type FrameCallback = Box<dyn FnMut(&[u8])>;
type SampleCallback = Box<dyn FnMut(f32)>;

/// The whole console. Owns every component; each tick lends them to each
/// other through short-lived buses.
pub struct Nes {
    cpu: Cpu,
    ram: Ram,
    ppu: Ppu,
    apu: Apu,
    mapper: Box<dyn Mapper>,
    controllers: [Controller; 2],
    dma: OamDma,
    interrupts: InterruptRouter,
    bus_counters: BusCounters,

    config: NesConfig,
    mapper_id: u8,
    mapper_name: String,
    has_battery: bool,
    fault: Option<NesError>,

    on_frame: Option<FrameCallback>,
    on_sample: Option<SampleCallback>,
    samples: VecDeque<f32>,
    sample_queue_limit: usize,

    debug: NesDebugCounters,
    debug_events: VecDeque<String>,
}

impl Nes {
    /// Parses an iNES image, seeds battery RAM from `sram` and resets the CPU.
    pub fn new(rom: &[u8], sram: Option<&[u8]>, config: NesConfig) -> Result<Self, NesError> {
        let cart = Cartridge::from_bytes(rom, sram)?;
        Self::from_cartridge(cart, config)
    }

    pub fn from_cartridge(cart: Cartridge, config: NesConfig) -> Result<Self, NesError> {
        let config = config.sanitized();
        let mapper_id = cart.mapper_id;
        let has_battery = cart.has_battery;
        let mapper = create_mapper(cart)?;
        let sample_queue_limit = config.sample_rate as usize;

        let mut nes = Self {
            cpu: Cpu::new(),
            ram: Ram::new(WORK_RAM_SIZE, 0),
            ppu: Ppu::new(),
            apu: Apu::from_config(&config),
            mapper,
            controllers: [Controller::new(), Controller::new()],
            dma: OamDma::new(),
            interrupts: InterruptRouter::new(),
            bus_counters: BusCounters::default(),
            config,
            mapper_id,
            mapper_name: format!("{} (mapper {mapper_id})", mapper_name(mapper_id)),
            has_battery,
            fault: None,
            on_frame: None,
            on_sample: None,
            samples: VecDeque::with_capacity(4096),
            sample_queue_limit,
            debug: NesDebugCounters::default(),
            debug_events: VecDeque::with_capacity(MAX_DEBUG_EVENTS),
        };
        tracing::debug!(mapper = %nes.mapper_name, has_battery, "cartridge inserted");
        nes.push_debug_event(format!("ROM loaded: {}", nes.mapper_name));
        nes.reset();
        Ok(nes)
    }

    /// Reloads PC from the reset vector and clears a stored fault.
    pub fn reset(&mut self) {
        let cpu_cycle = self.cpu.clocks();
        let mut bus = CpuBus {
            ram: &mut self.ram,
            ppu: &mut self.ppu,
            apu: &mut self.apu,
            mapper: self.mapper.as_mut(),
            controllers: &mut self.controllers,
            dma: &mut self.dma,
            counters: &mut self.bus_counters,
            cpu_cycle,
        };
        self.cpu.reset(&mut bus);
        self.fault = None;
        let pc = self.cpu.registers().pc;
        self.push_debug_event(format!("CPU reset, PC=${pc:04X}"));
    }

    pub fn set_on_frame<F>(&mut self, callback: F)
    where
        F: FnMut(&[u8]) + 'static,
    {
        self.on_frame = Some(Box::new(callback));
    }

    /// Samples go to the callback once one is installed; until then they
    /// queue for `take_audio_samples`. The queue holds one second of audio by
    /// default and drops the oldest samples past that.
    pub fn set_on_sample<F>(&mut self, callback: F)
    where
        F: FnMut(f32) + 'static,
    {
        self.on_sample = Some(Box::new(callback));
    }

    /// One CPU clock, one APU clock, three PPU clocks.
    pub fn tick(&mut self) -> Result<(), NesError> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        self.debug.ticks = self.debug.ticks.wrapping_add(1);

        let cpu_cycle = self.cpu.clocks();
        let result = {
            let mut bus = CpuBus {
                ram: &mut self.ram,
                ppu: &mut self.ppu,
                apu: &mut self.apu,
                mapper: self.mapper.as_mut(),
                controllers: &mut self.controllers,
                dma: &mut self.dma,
                counters: &mut self.bus_counters,
                cpu_cycle,
            };
            self.cpu.clock(&mut bus, &mut self.interrupts)
        };
        if let Err(err) = result {
            tracing::warn!(%err, "emulation halted");
            self.push_debug_event(format!("Fault: {err}"));
            self.fault = Some(err.clone());
            return Err(err);
        }

        let dma_stall = self.dma.take_pending_stall();
        if dma_stall > 0 {
            self.push_debug_event(format!(
                "OAM DMA page=${:02X} stall={dma_stall}",
                self.dma.last_page().unwrap_or(0)
            ));
            self.charge_stall(dma_stall);
        }

        {
            let mut reader = DmcReader {
                ram: &self.ram,
                mapper: self.mapper.as_mut(),
            };
            self.apu.clock(&mut reader, &mut self.interrupts);
        }
        let dmc_stall = self.apu.take_stall_cycles();
        if dmc_stall > 0 {
            self.debug.dmc_stall_cycles = self.debug.dmc_stall_cycles.wrapping_add(dmc_stall.into());
            self.charge_stall(dmc_stall);
        }
        self.deliver_samples();

        let frame = self.ppu.frame();
        for _ in 0..3 {
            self.ppu.clock(self.mapper.as_mut(), &mut self.interrupts);
        }
        if self.ppu.frame() != frame {
            self.debug.frame_count = self.debug.frame_count.wrapping_add(1);
            if let Some(callback) = self.on_frame.as_mut() {
                callback(self.ppu.frame_buffer());
            }
        }
        Ok(())
    }

    /// Ticks until the PPU frame counter moves.
    pub fn run_frame(&mut self) -> Result<(), NesError> {
        let frame = self.ppu.frame();
        while self.ppu.frame() == frame {
            self.tick()?;
        }
        Ok(())
    }

    fn charge_stall(&mut self, cycles: u32) {
        if self.config.enforce_dma_stall {
            self.cpu.suspend(cycles);
            self.debug.enforced_stall_cycles =
                self.debug.enforced_stall_cycles.wrapping_add(cycles.into());
        }
    }

    fn deliver_samples(&mut self) {
        for sample in self.apu.drain_samples() {
            if let Some(callback) = self.on_sample.as_mut() {
                callback(sample);
                continue;
            }
            if self.samples.len() >= self.sample_queue_limit {
                self.samples.pop_front();
                self.debug.dropped_samples = self.debug.dropped_samples.wrapping_add(1);
            }
            self.samples.push_back(sample);
        }
    }

    /// Caps the pull queue; a zero limit discards every queued sample.
    pub fn set_sample_queue_limit(&mut self, limit: usize) {
        self.sample_queue_limit = limit;
        while self.samples.len() > limit {
            self.samples.pop_front();
            self.debug.dropped_samples = self.debug.dropped_samples.wrapping_add(1);
        }
    }

    pub fn set_buttons(&mut self, port: usize, mask: u8) {
        if let Some(pad) = self.controllers.get_mut(port) {
            pad.set_buttons(mask);
        }
    }

    pub fn cpu_registers(&self) -> CpuRegisters {
        self.cpu.registers()
    }

    /// Battery RAM contents, for the host to persist.
    pub fn sram(&self) -> &[u8] {
        self.mapper.save_ram()
    }

    pub fn has_battery(&self) -> bool {
        self.has_battery
    }

    pub fn mapper_id(&self) -> u8 {
        self.mapper_id
    }

    pub fn mapper_name(&self) -> &str {
        &self.mapper_name
    }

    pub fn config(&self) -> &NesConfig {
        &self.config
    }

    /// The stored runtime fault, if emulation has stopped.
    pub fn fault(&self) -> Option<&NesError> {
        self.fault.as_ref()
    }

    pub fn frame_count(&self) -> u64 {
        self.ppu.frame()
    }

    /// 256x240 colour indices from the last rendered frame.
    pub fn frame_buffer(&self) -> &[u8] {
        self.ppu.frame_buffer()
    }

    pub fn frame_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(FRAME_WIDTH * FRAME_HEIGHT * 4);
        for &index in self.ppu.frame_buffer() {
            rgba.extend_from_slice(&palette::to_rgba(index));
        }
        rgba
    }

    pub fn take_audio_samples(&mut self) -> Vec<f32> {
        self.samples.drain(..).collect()
    }

    pub fn peek_ram(&self, addr: u16) -> u8 {
        self.ram.read(addr & 0x07FF)
    }

    pub fn debug_ppu_position(&self) -> (u16, u16) {
        self.ppu.position()
    }

    pub fn debug_ppu_counters(&self) -> PpuDebugCounters {
        self.ppu.debug_counters()
    }

    pub fn debug_mapper_state(&self) -> String {
        let state = self.mapper.debug_state();
        if state.is_empty() {
            self.mapper_name.clone()
        } else {
            state
        }
    }

    pub fn debug_counters(&self) -> NesDebugCounters {
        let apu = self.apu.debug_counters();
        NesDebugCounters {
            cpu_clocks: self.cpu.clocks(),
            instructions: self.cpu.instructions(),
            nmi_serviced: self.cpu.nmi_serviced(),
            irq_serviced: self.cpu.irq_serviced(),
            irq_dropped: self.cpu.irq_dropped(),
            ppu_cycles: self.ppu.debug_counters().cycles,
            apu_clocks: apu.clocks,
            audio_samples: apu.samples,
            dma_transfers: self.dma.transfers(),
            dma_stall_cycles: self.dma.total_stall_cycles(),
            dmc_fetches: apu.dmc_fetches,
            cpu_reads: self.bus_counters.reads,
            cpu_writes: self.bus_counters.writes,
            ..self.debug
        }
    }

    /// Most recent events first.
    pub fn debug_recent_events(&self, limit: usize) -> Vec<String> {
        self.debug_events
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    fn push_debug_event<S: Into<String>>(&mut self, event: S) {
        if self.debug_events.len() >= MAX_DEBUG_EVENTS {
            self.debug_events.pop_front();
        }
        self.debug_events.push_back(event.into());
    }
}
