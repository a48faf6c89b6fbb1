use super::apu::{Apu, SampleSource};
use super::controller::Controller;
use super::dma::{self, OamDma};
use super::mapper::Mapper;
use super::ppu::Ppu;
use super::ram::Ram;

pub const WORK_RAM_SIZE: usize = 2 * 1024;

/// Byte-wide memory as seen by the CPU core.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusCounters {
    pub reads: u64,
    pub writes: u64,
    pub ppu_register_accesses: u64,
    pub apu_io_accesses: u64,
    pub cart_reads: u64,
    pub cart_writes: u64,
    pub last_read_addr: u16,
    pub last_write_addr: u16,
    pub last_write_value: u8,
}

/// CPU address decoder, built fresh for every clock from borrows of the
/// console's parts.
pub struct CpuBus<'a> {
    pub ram: &'a mut Ram,
    pub ppu: &'a mut Ppu,
    pub apu: &'a mut Apu,
    pub mapper: &'a mut dyn Mapper,
    pub controllers: &'a mut [Controller; 2],
    pub dma: &'a mut OamDma,
    pub counters: &'a mut BusCounters,
    /// CPU clock the access happens on; decides the OAM DMA stall parity.
    pub cpu_cycle: u64,
}

impl Bus for CpuBus<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        self.counters.reads = self.counters.reads.wrapping_add(1);
        self.counters.last_read_addr = addr;
        match addr {
            0x0000..=0x1FFF => self.ram.read(addr & 0x07FF),
            0x2000..=0x3FFF => {
                self.counters.ppu_register_accesses =
                    self.counters.ppu_register_accesses.wrapping_add(1);
                self.ppu.read_register(addr & 0x2007, self.mapper)
            }
            0x4000..=0x401F => {
                self.counters.apu_io_accesses = self.counters.apu_io_accesses.wrapping_add(1);
                match addr {
                    0x4015 => self.apu.read_status(),
                    0x4016 => self.controllers[0].read(),
                    0x4017 => self.controllers[1].read(),
                    _ => 0,
                }
            }
            _ => {
                self.counters.cart_reads = self.counters.cart_reads.wrapping_add(1);
                self.mapper.cpu_read(addr)
            }
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.counters.writes = self.counters.writes.wrapping_add(1);
        self.counters.last_write_addr = addr;
        self.counters.last_write_value = value;
        match addr {
            0x0000..=0x1FFF => self.ram.write(addr & 0x07FF, value),
            0x2000..=0x3FFF => {
                self.counters.ppu_register_accesses =
                    self.counters.ppu_register_accesses.wrapping_add(1);
                self.ppu.write_register(addr & 0x2007, value, self.mapper);
            }
            0x4000..=0x401F => {
                self.counters.apu_io_accesses = self.counters.apu_io_accesses.wrapping_add(1);
                match addr {
                    0x4014 => self.oam_dma(value),
                    0x4016 => {
                        for pad in self.controllers.iter_mut() {
                            pad.write(value);
                        }
                    }
                    0x4000..=0x4017 => self.apu.write_register(addr, value),
                    _ => {}
                }
            }
            _ => {
                self.counters.cart_writes = self.counters.cart_writes.wrapping_add(1);
                self.mapper.cpu_write(addr, value);
            }
        }
    }
}

impl CpuBus<'_> {
    fn oam_dma(&mut self, page: u8) {
        let bytes = dma::read_page(self, page);
        self.ppu.dma_copy(&bytes);
        self.dma.record(page, self.cpu_cycle);
    }
}

/// What the DMC memory reader can reach: work RAM and cartridge space.
pub struct DmcReader<'a> {
    pub ram: &'a Ram,
    pub mapper: &'a mut dyn Mapper,
}

impl SampleSource for DmcReader<'_> {
    fn read_sample(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram.read(addr & 0x07FF),
            0x8000..=0xFFFF => self.mapper.cpu_read(addr),
            _ => 0,
        }
    }
}
