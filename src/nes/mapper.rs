use super::cartridge::Cartridge;
use super::interrupt::InterruptRouter;
use crate::error::NesError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    OneScreenLower,
    OneScreenUpper,
    FourScreen,
}

/// Cartridge-side view of both buses.
///
/// CPU accesses cover 0x4020-0xFFFF (work RAM at 0x6000, PRG at 0x8000);
/// PPU accesses cover the 0x0000-0x1FFF pattern tables.
pub trait Mapper {
    fn cpu_read(&mut self, addr: u16) -> u8;
    fn cpu_write(&mut self, addr: u16, value: u8);
    fn ppu_read(&mut self, addr: u16) -> u8;
    fn ppu_write(&mut self, addr: u16, value: u8);
    fn mirroring(&self) -> Mirroring;
    /// Called after every PPU cycle while rendering is enabled.
    fn on_ppu_cycle(&mut self, _scanline: u16, _cycle: u16, _interrupts: &mut InterruptRouter) {}
    /// Battery-backed (or plain work) RAM mapped at 0x6000.
    fn save_ram(&self) -> &[u8];
    fn debug_state(&self) -> String {
        String::new()
    }
}

pub fn mapper_name(mapper_id: u8) -> &'static str {
    match mapper_id {
        0 => "NROM",
        1 => "MMC1",
        2 => "UxROM",
        3 => "CNROM",
        4 => "MMC3",
        74 => "MMC3 + CHR RAM",
        242 => "Wai Xing Zhan Shi",
        _ => "Unsupported",
    }
}

pub fn create_mapper(cart: Cartridge) -> Result<Box<dyn Mapper>, NesError> {
    let mapper: Box<dyn Mapper> = match cart.mapper_id {
        0 => Box::new(Mapper0::new(cart)),
        1 => Box::new(Mapper1::new(cart)),
        2 => Box::new(Mapper2::new(cart)),
        3 => Box::new(Mapper3::new(cart)),
        4 => Box::new(Mapper4::new(cart)),
        74 => Box::new(Mapper4::with_chr_ram(cart)),
        242 => Box::new(Mapper242::new(cart)),
        id => return Err(NesError::UnsupportedMapper(id)),
    };
    Ok(mapper)
}

fn sram_read(sram: &[u8], addr: u16) -> u8 {
    sram[(addr as usize - 0x6000) % sram.len()]
}

fn sram_write(sram: &mut [u8], addr: u16, value: u8) {
    let idx = (addr as usize - 0x6000) % sram.len();
    sram[idx] = value;
}

struct Mapper0 {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    sram: Vec<u8>,
    mirroring: Mirroring,
}

impl Mapper0 {
    fn new(cart: Cartridge) -> Self {
        Self {
            prg_rom: cart.prg_rom,
            chr: cart.chr_data,
            chr_is_ram: cart.chr_is_ram,
            sram: cart.sram,
            mirroring: cart.mirroring,
        }
    }
}

impl Mapper for Mapper0 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => sram_read(&self.sram, addr),
            // A single 16 KiB bank shows up twice.
            0x8000..=0xFFFF => self.prg_rom[(addr as usize - 0x8000) % self.prg_rom.len()],
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        if (0x6000..=0x7FFF).contains(&addr) {
            sram_write(&mut self.sram, addr, value);
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.chr[addr as usize % self.chr.len()]
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            let idx = addr as usize % self.chr.len();
            self.chr[idx] = value;
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn save_ram(&self) -> &[u8] {
        &self.sram
    }
}

struct Mapper1 {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    sram: Vec<u8>,

    shift_register: u8,
    control: u8,
    chr_bank0: u8,
    chr_bank1: u8,
    prg_bank: u8,
}

impl Mapper1 {
    fn new(cart: Cartridge) -> Self {
        Self {
            prg_rom: cart.prg_rom,
            chr: cart.chr_data,
            chr_is_ram: cart.chr_is_ram,
            sram: cart.sram,
            shift_register: 0x10,
            control: 0x0C,
            chr_bank0: 0,
            chr_bank1: 0,
            prg_bank: 0,
        }
    }

    fn prg_bank_count_16k(&self) -> usize {
        (self.prg_rom.len() / 0x4000).max(1)
    }

    fn chr_bank_count_4k(&self) -> usize {
        (self.chr.len() / 0x1000).max(1)
    }

    fn read_prg_bank(&self, bank: usize, offset: usize) -> u8 {
        let bank = bank % self.prg_bank_count_16k();
        self.prg_rom[(bank * 0x4000 + offset) % self.prg_rom.len()]
    }

    fn load_register(&mut self, addr: u16, value: u8) {
        if (value & 0x80) != 0 {
            self.shift_register = 0x10;
            self.control |= 0x0C;
            return;
        }

        // The marker bit reaching bit 0 means this is the fifth write.
        let commit = (self.shift_register & 0x01) != 0;
        self.shift_register >>= 1;
        self.shift_register |= (value & 0x01) << 4;

        if commit {
            let data = self.shift_register;
            match addr {
                0x8000..=0x9FFF => self.control = data,
                0xA000..=0xBFFF => self.chr_bank0 = data & 0x1F,
                0xC000..=0xDFFF => self.chr_bank1 = data & 0x1F,
                _ => self.prg_bank = data & 0x0F,
            }
            tracing::trace!(
                addr = format_args!("${addr:04X}"),
                data = format_args!("${data:02X}"),
                "MMC1 register commit"
            );
            self.shift_register = 0x10;
        }
    }

    fn chr_index(&self, addr: u16) -> usize {
        let addr = addr as usize & 0x1FFF;
        let (bank, offset) = if (self.control & 0x10) == 0 {
            ((self.chr_bank0 as usize & 0x1E) % self.chr_bank_count_4k(), addr)
        } else if addr < 0x1000 {
            (self.chr_bank0 as usize % self.chr_bank_count_4k(), addr)
        } else {
            (self.chr_bank1 as usize % self.chr_bank_count_4k(), addr - 0x1000)
        };
        (bank * 0x1000 + offset) % self.chr.len()
    }
}

impl Mapper for Mapper1 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => sram_read(&self.sram, addr),
            0x8000..=0xFFFF => {
                let bank = self.prg_bank as usize;
                let offset_16k = addr as usize & 0x3FFF;
                match (self.control >> 2) & 0x03 {
                    0 | 1 => {
                        let idx = (bank & !1) * 0x4000 + (addr as usize - 0x8000);
                        self.prg_rom[idx % self.prg_rom.len()]
                    }
                    2 if addr < 0xC000 => self.read_prg_bank(0, offset_16k),
                    2 => self.read_prg_bank(bank, offset_16k),
                    _ if addr < 0xC000 => self.read_prg_bank(bank, offset_16k),
                    _ => self.read_prg_bank(self.prg_bank_count_16k() - 1, offset_16k),
                }
            }
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => sram_write(&mut self.sram, addr, value),
            0x8000..=0xFFFF => self.load_register(addr, value),
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.chr[self.chr_index(addr)]
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            let idx = self.chr_index(addr);
            self.chr[idx] = value;
        }
    }

    fn mirroring(&self) -> Mirroring {
        match self.control & 0x03 {
            0 => Mirroring::OneScreenLower,
            1 => Mirroring::OneScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }

    fn save_ram(&self) -> &[u8] {
        &self.sram
    }

    fn debug_state(&self) -> String {
        format!(
            "MMC1 control=${:02X} prg=${:02X} chr0=${:02X} chr1=${:02X} shift=${:02X}",
            self.control, self.prg_bank, self.chr_bank0, self.chr_bank1, self.shift_register
        )
    }
}

struct Mapper2 {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    sram: Vec<u8>,
    bank_select: u8,
    mirroring: Mirroring,
}

impl Mapper2 {
    fn new(cart: Cartridge) -> Self {
        Self {
            prg_rom: cart.prg_rom,
            chr: cart.chr_data,
            chr_is_ram: cart.chr_is_ram,
            sram: cart.sram,
            bank_select: 0,
            mirroring: cart.mirroring,
        }
    }

    fn prg_banks(&self) -> usize {
        (self.prg_rom.len() / 0x4000).max(1)
    }

    fn read_prg(&self, bank: usize, offset: usize) -> u8 {
        let bank = bank % self.prg_banks();
        self.prg_rom[(bank * 0x4000 + offset) % self.prg_rom.len()]
    }
}

impl Mapper for Mapper2 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => sram_read(&self.sram, addr),
            0x8000..=0xBFFF => self.read_prg(self.bank_select as usize, addr as usize - 0x8000),
            0xC000..=0xFFFF => self.read_prg(self.prg_banks() - 1, addr as usize - 0xC000),
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => sram_write(&mut self.sram, addr, value),
            0x8000..=0xFFFF => self.bank_select = value & 0x0F,
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.chr[addr as usize % self.chr.len()]
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            let idx = addr as usize % self.chr.len();
            self.chr[idx] = value;
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn save_ram(&self) -> &[u8] {
        &self.sram
    }
}

struct Mapper3 {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    sram: Vec<u8>,
    chr_bank_select: u8,
    mirroring: Mirroring,
}

impl Mapper3 {
    fn new(cart: Cartridge) -> Self {
        Self {
            prg_rom: cart.prg_rom,
            chr: cart.chr_data,
            chr_is_ram: cart.chr_is_ram,
            sram: cart.sram,
            chr_bank_select: 0,
            mirroring: cart.mirroring,
        }
    }

    fn chr_index(&self, addr: u16) -> usize {
        let banks = (self.chr.len() / 0x2000).max(1);
        let bank = self.chr_bank_select as usize % banks;
        (bank * 0x2000 + (addr as usize & 0x1FFF)) % self.chr.len()
    }
}

impl Mapper for Mapper3 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => sram_read(&self.sram, addr),
            0x8000..=0xFFFF => self.prg_rom[(addr as usize - 0x8000) % self.prg_rom.len()],
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => sram_write(&mut self.sram, addr, value),
            0x8000..=0xFFFF => self.chr_bank_select = value & 0x03,
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.chr[self.chr_index(addr)]
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            let idx = self.chr_index(addr);
            self.chr[idx] = value;
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn save_ram(&self) -> &[u8] {
        &self.sram
    }
}

/// 1 KiB CHR slots per bank-select mode; R0 and R1 cover two slots each.
const MMC3_CHR_SLOTS: [[usize; 8]; 2] = [[0, 0, 1, 1, 2, 3, 4, 5], [2, 3, 4, 5, 0, 0, 1, 1]];
/// 8 KiB PRG windows per PRG mode. Negative entries count back from the last bank.
const MMC3_PRG_SLOTS: [[i32; 4]; 2] = [[6, 7, -2, -1], [-2, 7, 6, -1]];
const MMC74_CHR_RAM_SIZE: usize = 2 * 1024;

struct Mapper4 {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    sram: Vec<u8>,
    /// Mapper 74 only: banks 8 and 9 select this RAM instead of CHR ROM.
    chr_ram: Option<Vec<u8>>,
    register_select: u8,
    bank_regs: [u8; 8],
    prg_mode: usize,
    chr_inversion: usize,
    mirroring: Mirroring,
    four_screen: bool,

    irq_latch: u8,
    irq_counter: u8,
    irq_enabled: bool,
    irq_clocks: u64,
}

impl Mapper4 {
    fn new(cart: Cartridge) -> Self {
        Self {
            prg_rom: cart.prg_rom,
            chr: cart.chr_data,
            chr_is_ram: cart.chr_is_ram,
            sram: cart.sram,
            chr_ram: None,
            register_select: 0,
            bank_regs: [0; 8],
            prg_mode: 0,
            chr_inversion: 0,
            mirroring: cart.mirroring,
            four_screen: cart.four_screen,
            irq_latch: 0,
            irq_counter: 0,
            irq_enabled: false,
            irq_clocks: 0,
        }
    }

    fn with_chr_ram(cart: Cartridge) -> Self {
        Self {
            chr_ram: Some(vec![0; MMC74_CHR_RAM_SIZE]),
            ..Self::new(cart)
        }
    }

    fn prg_bank_count_8k(&self) -> usize {
        (self.prg_rom.len() / 0x2000).max(1)
    }

    fn prg_index(&self, addr: u16) -> usize {
        let window = (addr as usize - 0x8000) / 0x2000;
        let count = self.prg_bank_count_8k() as i32;
        let bank = match MMC3_PRG_SLOTS[self.prg_mode][window] {
            reg @ 0..=7 => i32::from(self.bank_regs[reg as usize]),
            from_end => count + from_end,
        };
        let bank = bank.rem_euclid(count) as usize;
        bank * 0x2000 + (addr as usize & 0x1FFF)
    }

    /// 1 KiB CHR bank number for a pattern-table address.
    fn chr_bank(&self, addr: u16) -> usize {
        let slot = (addr as usize & 0x1FFF) / 0x0400;
        let reg = MMC3_CHR_SLOTS[self.chr_inversion][slot];
        let mut bank = self.bank_regs[reg] as usize;
        if reg < 2 && slot % 2 == 1 {
            bank += 1;
        }
        bank
    }

    fn chr_rom_index(&self, bank: usize, addr: u16) -> usize {
        let count = (self.chr.len() / 0x0400).max(1);
        ((bank % count) * 0x0400 + (addr as usize & 0x03FF)) % self.chr.len()
    }

    fn write_register(&mut self, addr: u16, value: u8) {
        let even = (addr & 0x01) == 0;
        match (addr, even) {
            (0x8000..=0x9FFF, true) => {
                self.register_select = value & 0x07;
                self.prg_mode = usize::from((value & 0x40) != 0);
                self.chr_inversion = usize::from((value & 0x80) != 0);
            }
            (0x8000..=0x9FFF, false) => {
                let reg = self.register_select as usize;
                self.bank_regs[reg] = match reg {
                    0 | 1 => value & 0xFE,
                    6 | 7 => value & 0x3F,
                    _ => value,
                };
            }
            (0xA000..=0xBFFF, true) => {
                if !self.four_screen {
                    self.mirroring = if (value & 0x01) != 0 {
                        Mirroring::Horizontal
                    } else {
                        Mirroring::Vertical
                    };
                }
            }
            // PRG RAM protect is not modelled.
            (0xA000..=0xBFFF, false) => {}
            (0xC000..=0xDFFF, true) => self.irq_latch = value,
            (0xC000..=0xDFFF, false) => self.irq_counter = 0,
            (0xE000..=0xFFFF, true) => self.irq_enabled = false,
            (0xE000..=0xFFFF, false) => self.irq_enabled = true,
            _ => {}
        }
    }
}

impl Mapper for Mapper4 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => sram_read(&self.sram, addr),
            0x8000..=0xFFFF => self.prg_rom[self.prg_index(addr) % self.prg_rom.len()],
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => sram_write(&mut self.sram, addr, value),
            0x8000..=0xFFFF => self.write_register(addr, value),
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        let bank = self.chr_bank(addr);
        match self.chr_ram.as_ref() {
            Some(ram) if bank == 8 || bank == 9 => {
                ram[(bank - 8) * 0x0400 + (addr as usize & 0x03FF)]
            }
            _ => self.chr[self.chr_rom_index(bank, addr)],
        }
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        let bank = self.chr_bank(addr);
        if let Some(ram) = self.chr_ram.as_mut().filter(|_| bank == 8 || bank == 9) {
            ram[(bank - 8) * 0x0400 + (addr as usize & 0x03FF)] = value;
        } else if self.chr_is_ram {
            let idx = self.chr_rom_index(bank, addr);
            self.chr[idx] = value;
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn on_ppu_cycle(&mut self, scanline: u16, cycle: u16, interrupts: &mut InterruptRouter) {
        if cycle != 260 || (240..=260).contains(&scanline) {
            return;
        }
        self.irq_clocks = self.irq_clocks.wrapping_add(1);
        if self.irq_counter == 0 {
            self.irq_counter = self.irq_latch;
            return;
        }
        self.irq_counter -= 1;
        if self.irq_counter == 0 && self.irq_enabled {
            tracing::trace!(scanline, "MMC3 scanline IRQ");
            interrupts.irq();
        }
    }

    fn save_ram(&self) -> &[u8] {
        &self.sram
    }

    fn debug_state(&self) -> String {
        format!(
            "MMC3 select={} prg_mode={} chr_inv={} regs={:02X?} irq_latch={} irq_counter={} irq_enabled={} irq_clocks={}",
            self.register_select,
            self.prg_mode,
            self.chr_inversion,
            self.bank_regs,
            self.irq_latch,
            self.irq_counter,
            self.irq_enabled,
            self.irq_clocks
        )
    }
}

struct Mapper242 {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    sram: Vec<u8>,
    prg_bank_select: u8,
    mirroring: Mirroring,
}

impl Mapper242 {
    fn new(cart: Cartridge) -> Self {
        Self {
            prg_rom: cart.prg_rom,
            chr: cart.chr_data,
            chr_is_ram: cart.chr_is_ram,
            sram: cart.sram,
            prg_bank_select: 0,
            mirroring: cart.mirroring,
        }
    }

    fn prg_bank_count_32k(&self) -> usize {
        (self.prg_rom.len() / 0x8000).max(1)
    }
}

impl Mapper for Mapper242 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => sram_read(&self.sram, addr),
            0x8000..=0xFFFF => {
                let bank = self.prg_bank_select as usize % self.prg_bank_count_32k();
                let idx = bank * 0x8000 + (addr as usize & 0x7FFF);
                self.prg_rom[idx % self.prg_rom.len()]
            }
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => sram_write(&mut self.sram, addr, value),
            0x8000..=0xFFFF => {
                self.prg_bank_select = (value >> 3) & 0x0F;
                self.mirroring = if (value & 0x02) != 0 {
                    Mirroring::Vertical
                } else {
                    Mirroring::Horizontal
                };
            }
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.chr[addr as usize % self.chr.len()]
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            let idx = addr as usize % self.chr.len();
            self.chr[idx] = value;
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn save_ram(&self) -> &[u8] {
        &self.sram
    }
}
