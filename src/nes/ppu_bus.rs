use super::mapper::{Mapper, Mirroring};
use super::ram::Ram;

const NAMETABLE_SIZE: usize = 4 * 1024;
const PALETTE_SIZE: usize = 16;

/// Folds a 0x2000-0x2FFF nametable address onto the physical layout selected
/// by the cartridge.
pub fn fold_nametable_address(addr: u16, mirroring: Mirroring) -> u16 {
    match mirroring {
        Mirroring::Horizontal => {
            (addr & 0x23FF) | if (addr & 0x0800) != 0 { 0x0400 } else { 0 }
        }
        Mirroring::Vertical => addr & 0x27FF,
        Mirroring::FourScreen => addr,
        Mirroring::OneScreenLower => addr & 0x23FF,
        Mirroring::OneScreenUpper => (addr & 0x23FF) | 0x0400,
    }
}

/// Memory the PPU owns outright: nametable VRAM and palette RAM.
/// Pattern-table accesses are forwarded to the mapper passed per call.
#[derive(Debug, Clone)]
pub struct PpuMemory {
    nametables: Ram,
    background_palette: Ram,
    sprite_palette: Ram,
}

impl Default for PpuMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl PpuMemory {
    pub fn new() -> Self {
        Self {
            nametables: Ram::new(NAMETABLE_SIZE, 0x2000),
            background_palette: Ram::new(PALETTE_SIZE, 0x3F00),
            sprite_palette: Ram::new(PALETTE_SIZE, 0x3F10),
        }
    }

    pub fn read(&self, addr: u16, mapper: &mut dyn Mapper) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => mapper.ppu_read(addr),
            0x2000..=0x2FFF => self
                .nametables
                .read(fold_nametable_address(addr, mapper.mirroring())),
            0x3000..=0x3EFF => self.read(addr - 0x1000, mapper),
            _ => {
                let (palette, index) = self.palette_slot(addr);
                if palette {
                    self.sprite_palette.read(index)
                } else {
                    self.background_palette.read(index)
                }
            }
        }
    }

    pub fn write(&mut self, addr: u16, value: u8, mapper: &mut dyn Mapper) {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => mapper.ppu_write(addr, value),
            0x2000..=0x2FFF => self
                .nametables
                .write(fold_nametable_address(addr, mapper.mirroring()), value),
            0x3000..=0x3EFF => self.write(addr - 0x1000, value, mapper),
            _ => {
                let (palette, index) = self.palette_slot(addr);
                if palette {
                    self.sprite_palette.write(index, value);
                } else {
                    self.background_palette.write(index, value);
                }
            }
        }
    }

    /// Resolves a palette address to (is sprite palette, address). Sprite
    /// entries 0/4/8/C alias the background ones.
    fn palette_slot(&self, addr: u16) -> (bool, u16) {
        let addr = addr & 0x3F1F;
        if addr < 0x3F10 {
            (false, addr)
        } else if (addr & 0x03) == 0 {
            (false, addr - 0x10)
        } else {
            (true, addr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nes::interrupt::InterruptRouter;

    struct FixedMirroring {
        mirroring: Mirroring,
        chr: Vec<u8>,
    }

    impl Mapper for FixedMirroring {
        fn cpu_read(&mut self, _addr: u16) -> u8 {
            0
        }
        fn cpu_write(&mut self, _addr: u16, _value: u8) {}
        fn ppu_read(&mut self, addr: u16) -> u8 {
            self.chr[addr as usize]
        }
        fn ppu_write(&mut self, addr: u16, value: u8) {
            self.chr[addr as usize] = value;
        }
        fn mirroring(&self) -> Mirroring {
            self.mirroring
        }
        fn on_ppu_cycle(&mut self, _: u16, _: u16, _: &mut InterruptRouter) {}
        fn save_ram(&self) -> &[u8] {
            &[]
        }
    }

    fn mapper(mirroring: Mirroring) -> FixedMirroring {
        FixedMirroring {
            mirroring,
            chr: vec![0; 0x2000],
        }
    }

    #[test]
    fn folds_follow_each_mirroring_mode() {
        use Mirroring::*;
        assert_eq!(fold_nametable_address(0x2400, Horizontal), 0x2000);
        assert_eq!(fold_nametable_address(0x2800, Horizontal), 0x2400);
        assert_eq!(fold_nametable_address(0x2C05, Horizontal), 0x2405);
        assert_eq!(fold_nametable_address(0x2800, Vertical), 0x2000);
        assert_eq!(fold_nametable_address(0x2C05, Vertical), 0x2405);
        assert_eq!(fold_nametable_address(0x2C05, FourScreen), 0x2C05);
        assert_eq!(fold_nametable_address(0x2C05, OneScreenLower), 0x2005);
        assert_eq!(fold_nametable_address(0x2805, OneScreenUpper), 0x2405);
    }

    #[test]
    fn nametable_writes_land_on_their_mirror() {
        let mut mem = PpuMemory::new();
        let mut cart = mapper(Mirroring::Vertical);
        mem.write(0x2005, 0x11, &mut cart);
        assert_eq!(mem.read(0x2805, &mut cart), 0x11);
        assert_eq!(mem.read(0x2405, &mut cart), 0x00);
        // 0x3000-0x3EFF repeats 0x2000-0x2EFF.
        assert_eq!(mem.read(0x3005, &mut cart), 0x11);
    }

    #[test]
    fn sprite_palette_backdrop_entries_alias_background() {
        let mut mem = PpuMemory::new();
        let mut cart = mapper(Mirroring::Horizontal);
        mem.write(0x3F10, 0x2A, &mut cart);
        assert_eq!(mem.read(0x3F00, &mut cart), 0x2A);
        mem.write(0x3F04, 0x15, &mut cart);
        assert_eq!(mem.read(0x3F14, &mut cart), 0x15);
        mem.write(0x3F11, 0x30, &mut cart);
        assert_eq!(mem.read(0x3F01, &mut cart), 0x00);
        assert_eq!(mem.read(0x3F31, &mut cart), 0x30);
    }

    #[test]
    fn pattern_space_goes_to_the_cartridge() {
        let mut mem = PpuMemory::new();
        let mut cart = mapper(Mirroring::Horizontal);
        mem.write(0x1234, 0x77, &mut cart);
        assert_eq!(cart.chr[0x1234], 0x77);
        assert_eq!(mem.read(0x5234, &mut cart), 0x77);
    }
}
