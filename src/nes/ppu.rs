use super::interrupt::InterruptRouter;
use super::mapper::Mapper;
use super::ppu_bus::PpuMemory;

pub const FRAME_WIDTH: usize = 256;
pub const FRAME_HEIGHT: usize = 240;

const CTRL_NMI_ENABLE: u8 = 0x80;
const CTRL_SPRITE_SIZE_16: u8 = 0x20;
const CTRL_BG_TABLE: u8 = 0x10;
const CTRL_SPRITE_TABLE: u8 = 0x08;
const CTRL_VRAM_INC_32: u8 = 0x04;

const MASK_SHOW_BG_LEFT: u8 = 0x02;
const MASK_SHOW_SPRITE_LEFT: u8 = 0x04;
const MASK_SHOW_BG: u8 = 0x08;
const MASK_SHOW_SPRITES: u8 = 0x10;

const STATUS_SPRITE_OVERFLOW: u8 = 0x20;
const STATUS_SPRITE_ZERO_HIT: u8 = 0x40;
const STATUS_VBLANK: u8 = 0x80;

const SPRITE_ATTR_FLIP_V: u8 = 0x80;
const SPRITE_ATTR_FLIP_H: u8 = 0x40;
const SPRITE_ATTR_BEHIND: u8 = 0x20;

// Layout of a sprite_pixels entry.
const PIXEL_PALETTE: u8 = 0x3F;
const PIXEL_BEHIND_BG: u8 = 0x40;
const PIXEL_ZERO: u8 = 0x80;

/// PPU cycles between VBlank start and the NMI request.
const NMI_DELAY_CYCLES: u8 = 15;
const PRE_RENDER_LINE: u16 = 261;
const LAST_CYCLE: u16 = 340;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PpuDebugCounters {
    pub cycles: u64,
    pub vblank_entries: u64,
    pub nmi_requests: u64,
    pub sprite0_hits: u64,
    pub sprite_overflows: u64,
    pub status_reads: u64,
    pub data_reads: u64,
    pub data_writes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SpriteSlot {
    y: u8,
    tile: u8,
    attributes: u8,
    x: u8,
    is_zero: bool,
}

impl SpriteSlot {
    const EMPTY: Self = Self {
        y: 0xFF,
        tile: 0xFF,
        attributes: 0xFF,
        x: 0xFF,
        is_zero: false,
    };
}

/// Bytes fetched during the 8-cycle background cadence, waiting to be loaded
/// into the shifters.
#[derive(Debug, Clone, Copy, Default)]
struct TileLatch {
    nametable: u8,
    attribute: u8,
    pattern_lo: u8,
    pattern_hi: u8,
}

pub struct Ppu {
    ctrl: u8,
    mask: u8,
    status: u8,

    oam_addr: u8,
    oam: [u8; 256],
    secondary_oam: [SpriteSlot; 8],
    sprite_pixels: [u8; FRAME_WIDTH],

    memory: PpuMemory,

    v: u16,
    t: u16,
    fine_x: u8,
    write_toggle: bool,
    read_buffer: u8,
    /// Low five bits of the last register write, visible through $2002.
    latch_low: u8,

    latch: TileLatch,
    bg_shift_pattern_lo: u16,
    bg_shift_pattern_hi: u16,
    bg_shift_attr_lo: u16,
    bg_shift_attr_hi: u16,

    scanline: u16,
    cycle: u16,
    frame: u64,
    nmi_delay: Option<u8>,

    pixels: Box<[u8]>,
    debug: PpuDebugCounters,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            ctrl: 0,
            mask: 0,
            status: 0,
            oam_addr: 0,
            oam: [0; 256],
            secondary_oam: [SpriteSlot::EMPTY; 8],
            sprite_pixels: [0; FRAME_WIDTH],
            memory: PpuMemory::new(),
            v: 0,
            t: 0,
            fine_x: 0,
            write_toggle: false,
            read_buffer: 0,
            latch_low: 0,
            latch: TileLatch::default(),
            bg_shift_pattern_lo: 0,
            bg_shift_pattern_hi: 0,
            bg_shift_attr_lo: 0,
            bg_shift_attr_hi: 0,
            scanline: 240,
            cycle: LAST_CYCLE,
            frame: 0,
            nmi_delay: None,
            pixels: vec![0; FRAME_WIDTH * FRAME_HEIGHT].into_boxed_slice(),
            debug: PpuDebugCounters::default(),
        }
    }

    /// Completed frames since power-on.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn position(&self) -> (u16, u16) {
        (self.scanline, self.cycle)
    }

    /// 256x240 colour indices (0..=63), row-major.
    pub fn frame_buffer(&self) -> &[u8] {
        &self.pixels
    }

    /// Status flags without the read side effects of $2002.
    pub fn peek_status(&self) -> u8 {
        self.status
    }

    pub fn debug_counters(&self) -> PpuDebugCounters {
        self.debug
    }

    pub fn debug_peek_oam(&self, index: u8) -> u8 {
        self.oam[index as usize]
    }

    pub fn read_register(&mut self, addr: u16, mapper: &mut dyn Mapper) -> u8 {
        match 0x2000 | (addr & 0x0007) {
            0x2000 => self.ctrl,
            0x2001 => self.mask,
            0x2002 => {
                let value = self.status | self.latch_low;
                self.status &= !STATUS_VBLANK;
                self.write_toggle = false;
                self.debug.status_reads = self.debug.status_reads.wrapping_add(1);
                value
            }
            0x2004 => self.oam[self.oam_addr as usize],
            0x2007 => {
                self.debug.data_reads = self.debug.data_reads.wrapping_add(1);
                let addr = self.v & 0x3FFF;
                let value = if addr <= 0x3EFF {
                    let buffered = self.read_buffer;
                    self.read_buffer = self.memory.read(addr, mapper);
                    buffered
                } else {
                    // Palette reads are direct; the buffer picks up the
                    // nametable byte underneath.
                    self.read_buffer = self.memory.read(addr.wrapping_sub(0x1000), mapper);
                    self.memory.read(addr, mapper)
                };
                self.increment_vram_addr();
                value
            }
            _ => 0,
        }
    }

    pub fn write_register(&mut self, addr: u16, value: u8, mapper: &mut dyn Mapper) {
        self.latch_low = value & 0x1F;
        match 0x2000 | (addr & 0x0007) {
            0x2000 => {
                let nmi_was_enabled = (self.ctrl & CTRL_NMI_ENABLE) != 0;
                self.ctrl = value;
                self.t = (self.t & 0xF3FF) | (u16::from(value & 0x03) << 10);
                if !nmi_was_enabled
                    && (value & CTRL_NMI_ENABLE) != 0
                    && (self.status & STATUS_VBLANK) != 0
                {
                    self.nmi_delay = Some(0);
                }
            }
            0x2001 => self.mask = value,
            0x2003 => self.oam_addr = value,
            0x2004 => {
                self.oam[self.oam_addr as usize] = value;
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            0x2005 => {
                if !self.write_toggle {
                    self.t = (self.t & 0xFFE0) | u16::from(value >> 3);
                    self.fine_x = value & 0x07;
                } else {
                    self.t = (self.t & 0x0C1F)
                        | (u16::from(value & 0x07) << 12)
                        | (u16::from(value & 0xF8) << 2);
                }
                self.write_toggle = !self.write_toggle;
            }
            0x2006 => {
                if !self.write_toggle {
                    self.t = (self.t & 0x80FF) | (u16::from(value & 0x3F) << 8);
                } else {
                    self.t = (self.t & 0xFF00) | u16::from(value);
                    self.v = self.t;
                }
                self.write_toggle = !self.write_toggle;
            }
            0x2007 => {
                self.debug.data_writes = self.debug.data_writes.wrapping_add(1);
                self.memory.write(self.v, value, mapper);
                self.increment_vram_addr();
            }
            _ => {}
        }
    }

    /// OAM DMA: 256 bytes land starting at the current OAM address.
    pub fn dma_copy(&mut self, data: &[u8; 256]) {
        for (i, &byte) in data.iter().enumerate() {
            let slot = (i + self.oam_addr as usize) & 0xFF;
            self.oam[slot] = byte;
        }
    }

    pub fn clock(&mut self, mapper: &mut dyn Mapper, interrupts: &mut InterruptRouter) {
        if self.scanline == PRE_RENDER_LINE
            && self.cycle == 339
            && (self.frame & 1) != 0
            && self.rendering_enabled()
        {
            self.update_cycle(mapper, interrupts);
        }
        self.update_cycle(mapper, interrupts);

        if !self.rendering_enabled() {
            return;
        }

        let cycle = self.cycle;
        match self.scanline {
            0..=239 => {
                if cycle == 1 {
                    self.clear_secondary_oam();
                }
                if cycle == 65 {
                    self.evaluate_sprites();
                }
                if (1..=256).contains(&cycle) {
                    self.shift_background();
                    self.render_pixel(mapper);
                    self.fetch_tile_data(mapper);
                }
                if cycle == 256 {
                    self.increment_y();
                }
                if cycle == 257 {
                    self.copy_horizontal_bits();
                    self.fetch_sprites(mapper);
                }
                if (321..=336).contains(&cycle) {
                    self.shift_background();
                    self.fetch_tile_data(mapper);
                }
            }
            PRE_RENDER_LINE => {
                if (1..=256).contains(&cycle) || (321..=336).contains(&cycle) {
                    self.shift_background();
                    self.fetch_tile_data(mapper);
                }
                if cycle == 256 {
                    self.increment_y();
                }
                if cycle == 257 {
                    self.copy_horizontal_bits();
                }
                if (280..=304).contains(&cycle) {
                    self.copy_vertical_bits();
                }
            }
            _ => {}
        }
    }

    fn update_cycle(&mut self, mapper: &mut dyn Mapper, interrupts: &mut InterruptRouter) {
        if (self.status & STATUS_VBLANK) != 0 && (self.ctrl & CTRL_NMI_ENABLE) != 0 {
            match self.nmi_delay {
                Some(0) => {
                    self.nmi_delay = None;
                    self.debug.nmi_requests = self.debug.nmi_requests.wrapping_add(1);
                    tracing::trace!(frame = self.frame, "ppu nmi");
                    interrupts.nmi();
                }
                Some(n) => self.nmi_delay = Some(n - 1),
                None => {}
            }
        }

        self.debug.cycles = self.debug.cycles.wrapping_add(1);
        self.cycle += 1;
        if self.cycle > LAST_CYCLE {
            self.cycle = 0;
            self.scanline += 1;
            if self.scanline > PRE_RENDER_LINE {
                self.scanline = 0;
                self.frame = self.frame.wrapping_add(1);
            }
        }

        if self.scanline == 241 && self.cycle == 1 {
            self.status |= STATUS_VBLANK;
            self.debug.vblank_entries = self.debug.vblank_entries.wrapping_add(1);
            if (self.ctrl & CTRL_NMI_ENABLE) != 0 {
                self.nmi_delay = Some(NMI_DELAY_CYCLES);
            }
        }

        if self.scanline == PRE_RENDER_LINE && self.cycle == 1 {
            self.status &=
                !(STATUS_VBLANK | STATUS_SPRITE_ZERO_HIT | STATUS_SPRITE_OVERFLOW);
        }

        if self.rendering_enabled() {
            mapper.on_ppu_cycle(self.scanline, self.cycle, interrupts);
        }
    }

    fn rendering_enabled(&self) -> bool {
        (self.mask & (MASK_SHOW_BG | MASK_SHOW_SPRITES)) != 0
    }

    fn show_background(&self) -> bool {
        (self.mask & MASK_SHOW_BG) != 0
    }

    fn show_sprites(&self) -> bool {
        (self.mask & MASK_SHOW_SPRITES) != 0
    }

    fn background_table(&self) -> u16 {
        if (self.ctrl & CTRL_BG_TABLE) != 0 {
            0x1000
        } else {
            0x0000
        }
    }

    fn sprite_table(&self) -> u16 {
        if (self.ctrl & CTRL_SPRITE_TABLE) != 0 {
            0x1000
        } else {
            0x0000
        }
    }

    fn sprite_height(&self) -> u16 {
        if (self.ctrl & CTRL_SPRITE_SIZE_16) != 0 {
            16
        } else {
            8
        }
    }

    fn increment_vram_addr(&mut self) {
        let step = if (self.ctrl & CTRL_VRAM_INC_32) != 0 {
            32
        } else {
            1
        };
        self.v = self.v.wrapping_add(step) & 0x7FFF;
    }

    fn fetch_tile_data(&mut self, mapper: &mut dyn Mapper) {
        if !self.show_background() {
            return;
        }

        let fine_y = (self.v >> 12) & 0x07;
        match self.cycle & 0x07 {
            1 => {
                self.load_background_shifters();
                let addr = 0x2000 | (self.v & 0x0FFF);
                self.latch.nametable = self.memory.read(addr, mapper);
            }
            3 => {
                let addr = 0x23C0
                    | (self.v & 0x0C00)
                    | ((self.v >> 4) & 0x38)
                    | ((self.v >> 2) & 0x07);
                let quadrant = (if (self.v & 0x40) != 0 { 2 } else { 0 })
                    | (if (self.v & 0x02) != 0 { 1 } else { 0 });
                self.latch.attribute = (self.memory.read(addr, mapper) >> (quadrant << 1)) & 0x03;
            }
            5 => {
                let addr = self.background_table() + u16::from(self.latch.nametable) * 16 + fine_y;
                self.latch.pattern_lo = self.memory.read(addr, mapper);
            }
            7 => {
                let addr =
                    self.background_table() + u16::from(self.latch.nametable) * 16 + fine_y + 8;
                self.latch.pattern_hi = self.memory.read(addr, mapper);
            }
            0 => self.increment_coarse_x(),
            _ => {}
        }
    }

    fn load_background_shifters(&mut self) {
        let fill = |bit: bool| -> u16 { if bit { 0x00FF } else { 0x0000 } };
        self.bg_shift_pattern_lo =
            (self.bg_shift_pattern_lo & 0xFF00) | u16::from(self.latch.pattern_lo);
        self.bg_shift_pattern_hi =
            (self.bg_shift_pattern_hi & 0xFF00) | u16::from(self.latch.pattern_hi);
        self.bg_shift_attr_lo =
            (self.bg_shift_attr_lo & 0xFF00) | fill((self.latch.attribute & 0x01) != 0);
        self.bg_shift_attr_hi =
            (self.bg_shift_attr_hi & 0xFF00) | fill((self.latch.attribute & 0x02) != 0);
    }

    fn shift_background(&mut self) {
        if !self.show_background() {
            return;
        }
        self.bg_shift_pattern_lo <<= 1;
        self.bg_shift_pattern_hi <<= 1;
        self.bg_shift_attr_lo <<= 1;
        self.bg_shift_attr_hi <<= 1;
    }

    fn increment_coarse_x(&mut self) {
        if (self.v & 0x001F) == 31 {
            self.v &= !0x001F;
            self.v ^= 0x0400;
        } else {
            self.v += 1;
        }
    }

    fn increment_y(&mut self) {
        if (self.v & 0x7000) != 0x7000 {
            self.v += 0x1000;
            return;
        }

        self.v &= !0x7000;
        let mut coarse_y = (self.v & 0x03E0) >> 5;
        match coarse_y {
            29 => {
                coarse_y = 0;
                self.v ^= 0x0800;
            }
            31 => coarse_y = 0,
            _ => coarse_y += 1,
        }
        self.v = (self.v & !0x03E0) | (coarse_y << 5);
    }

    fn copy_horizontal_bits(&mut self) {
        self.v = (self.v & 0xFBE0) | (self.t & 0x041F);
    }

    fn copy_vertical_bits(&mut self) {
        self.v = (self.v & 0x841F) | (self.t & 0x7BE0);
    }

    fn render_pixel(&mut self, mapper: &mut dyn Mapper) {
        let x = (self.cycle - 1) as usize;
        let y = self.scanline as usize;

        let bit = 0x8000u16 >> self.fine_x;
        let plane = |reg: u16, shift: u8| u8::from((reg & bit) != 0) << shift;
        let bg_index = plane(self.bg_shift_attr_hi, 3)
            | plane(self.bg_shift_attr_lo, 2)
            | plane(self.bg_shift_pattern_hi, 1)
            | plane(self.bg_shift_pattern_lo, 0);

        let sprite_pixel = self.sprite_pixels[x];
        let sprite_index = sprite_pixel & PIXEL_PALETTE;

        let sprite_transparent = sprite_index % 4 == 0 || !self.show_sprites();
        let bg_transparent = bg_index % 4 == 0 || !self.show_background();

        let addr = match (bg_transparent, sprite_transparent) {
            (true, true) => 0x3F00,
            (true, false) => 0x3F10 + u16::from(sprite_index),
            (false, true) => 0x3F00 + u16::from(bg_index),
            (false, false) => {
                if (sprite_pixel & PIXEL_ZERO) != 0 && self.sprite_zero_hit_allowed(x) {
                    if (self.status & STATUS_SPRITE_ZERO_HIT) == 0 {
                        self.debug.sprite0_hits = self.debug.sprite0_hits.wrapping_add(1);
                    }
                    self.status |= STATUS_SPRITE_ZERO_HIT;
                }
                if (sprite_pixel & PIXEL_BEHIND_BG) != 0 {
                    0x3F00 + u16::from(bg_index)
                } else {
                    0x3F10 + u16::from(sprite_index)
                }
            }
        };

        self.pixels[x + y * FRAME_WIDTH] = self.memory.read(addr, mapper) & 0x3F;
    }

    fn sprite_zero_hit_allowed(&self, x: usize) -> bool {
        let left_clipped = (self.mask & MASK_SHOW_BG_LEFT) == 0
            || (self.mask & MASK_SHOW_SPRITE_LEFT) == 0;
        self.show_background() && self.show_sprites() && !(x <= 7 && left_clipped) && x != 255
    }

    fn clear_secondary_oam(&mut self) {
        if !self.show_sprites() {
            return;
        }
        self.secondary_oam = [SpriteSlot::EMPTY; 8];
    }

    fn evaluate_sprites(&mut self) {
        if !self.show_sprites() {
            return;
        }

        let height = self.sprite_height();
        let mut count = 0;
        for i in 0..64 {
            let base = i * 4;
            let y = self.oam[base];
            let top = u16::from(y);
            if self.scanline < top || self.scanline >= top + height {
                continue;
            }

            if count == self.secondary_oam.len() {
                if (self.status & STATUS_SPRITE_OVERFLOW) == 0 {
                    self.debug.sprite_overflows = self.debug.sprite_overflows.wrapping_add(1);
                }
                self.status |= STATUS_SPRITE_OVERFLOW;
                break;
            }

            self.secondary_oam[count] = SpriteSlot {
                y,
                tile: self.oam[base + 1],
                attributes: self.oam[base + 2],
                x: self.oam[base + 3],
                is_zero: i == 0,
            };
            count += 1;
        }
    }

    fn fetch_sprites(&mut self, mapper: &mut dyn Mapper) {
        if !self.show_sprites() {
            return;
        }

        self.sprite_pixels = [0; FRAME_WIDTH];
        let height = self.sprite_height();
        let tall = height == 16;

        for slot in (0..self.secondary_oam.len()).rev() {
            let sprite = self.secondary_oam[slot];
            if sprite.y >= 0xEF {
                continue;
            }

            let flip_v = (sprite.attributes & SPRITE_ATTR_FLIP_V) != 0;
            let flip_h = (sprite.attributes & SPRITE_ATTR_FLIP_H) != 0;
            let row = self.scanline.wrapping_sub(u16::from(sprite.y));
            if row >= height {
                continue;
            }

            let addr = if tall {
                let table = if (sprite.tile & 0x01) != 0 { 0x1000 } else { 0x0000 };
                let base = table + (u16::from(sprite.tile & 0xFE) << 4);
                let offset = if flip_v { 15 - row } else { row };
                base + offset % 8 + (offset / 8) * 16
            } else {
                let base = self.sprite_table() + (u16::from(sprite.tile) << 4);
                base + if flip_v { 7 - row } else { row }
            };

            let pattern_lo = self.memory.read(addr, mapper);
            let pattern_hi = self.memory.read(addr + 8, mapper);
            let palette = (sprite.attributes & 0x03) << 2;
            let behind = if (sprite.attributes & SPRITE_ATTR_BEHIND) != 0 {
                PIXEL_BEHIND_BG
            } else {
                0
            };
            let flags = behind | if sprite.is_zero { PIXEL_ZERO } else { 0 };

            for j in 0..8u8 {
                let x = sprite.x as usize + j as usize;
                if x >= FRAME_WIDTH {
                    break;
                }
                let mask = if flip_h { 0x01 << j } else { 0x80 >> j };
                let index = palette
                    | (u8::from((pattern_hi & mask) != 0) << 1)
                    | u8::from((pattern_lo & mask) != 0);

                // A transparent pixel never covers an opaque one from a
                // lower-priority slot.
                if index % 4 == 0 && (self.sprite_pixels[x] & PIXEL_PALETTE) % 4 != 0 {
                    continue;
                }
                self.sprite_pixels[x] = index | flags;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nes::mapper::Mirroring;

    const PPU_CYCLES_PER_FRAME: u64 = 341 * 262;

    struct ChrRam {
        chr: Vec<u8>,
    }

    impl Mapper for ChrRam {
        fn cpu_read(&mut self, _addr: u16) -> u8 {
            0
        }
        fn cpu_write(&mut self, _addr: u16, _value: u8) {}
        fn ppu_read(&mut self, addr: u16) -> u8 {
            self.chr[addr as usize & 0x1FFF]
        }
        fn ppu_write(&mut self, addr: u16, value: u8) {
            self.chr[addr as usize & 0x1FFF] = value;
        }
        fn mirroring(&self) -> Mirroring {
            Mirroring::Horizontal
        }
        fn save_ram(&self) -> &[u8] {
            &[]
        }
    }

    fn chr_ram() -> ChrRam {
        ChrRam {
            chr: vec![0; 0x2000],
        }
    }

    fn run_until(
        ppu: &mut Ppu,
        mapper: &mut ChrRam,
        irq: &mut InterruptRouter,
        scanline: u16,
        cycle: u16,
    ) -> u64 {
        let mut clocks = 0;
        while ppu.position() != (scanline, cycle) {
            ppu.clock(mapper, irq);
            clocks += 1;
            assert!(clocks < 4 * PPU_CYCLES_PER_FRAME, "never reached {scanline}/{cycle}");
        }
        clocks
    }

    fn set_address(ppu: &mut Ppu, mapper: &mut ChrRam, addr: u16) {
        ppu.write_register(0x2006, (addr >> 8) as u8, mapper);
        ppu.write_register(0x2006, addr as u8, mapper);
    }

    #[test]
    fn vblank_sets_on_241_and_clears_on_pre_render() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();
        let mut irq = InterruptRouter::new();

        run_until(&mut ppu, &mut cart, &mut irq, 241, 0);
        assert_eq!(ppu.peek_status() & STATUS_VBLANK, 0);
        ppu.clock(&mut cart, &mut irq);
        assert_ne!(ppu.peek_status() & STATUS_VBLANK, 0);

        run_until(&mut ppu, &mut cart, &mut irq, 261, 0);
        assert_ne!(ppu.peek_status() & STATUS_VBLANK, 0);
        ppu.clock(&mut cart, &mut irq);
        assert_eq!(ppu.peek_status() & STATUS_VBLANK, 0);
    }

    #[test]
    fn frame_length_is_fixed_with_rendering_off() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();
        let mut irq = InterruptRouter::new();

        run_until(&mut ppu, &mut cart, &mut irq, 0, 0);
        for _ in 0..2 {
            let frame = ppu.frame();
            let mut clocks = 0;
            while ppu.frame() == frame {
                ppu.clock(&mut cart, &mut irq);
                clocks += 1;
            }
            assert_eq!(clocks, PPU_CYCLES_PER_FRAME);
        }
    }

    #[test]
    fn odd_frames_skip_a_cycle_with_rendering_on() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();
        let mut irq = InterruptRouter::new();
        ppu.write_register(0x2001, MASK_SHOW_BG, &mut cart);

        run_until(&mut ppu, &mut cart, &mut irq, 0, 0);
        assert_eq!(ppu.frame(), 1);

        let mut lengths = Vec::new();
        for _ in 0..2 {
            let frame = ppu.frame();
            let mut clocks = 0;
            while ppu.frame() == frame {
                ppu.clock(&mut cart, &mut irq);
                clocks += 1;
            }
            lengths.push(clocks);
        }
        assert_eq!(lengths, vec![PPU_CYCLES_PER_FRAME - 1, PPU_CYCLES_PER_FRAME]);
    }

    #[test]
    fn nmi_follows_vblank_after_delay() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();
        let mut irq = InterruptRouter::new();
        ppu.write_register(0x2000, CTRL_NMI_ENABLE, &mut cart);

        run_until(&mut ppu, &mut cart, &mut irq, 241, 1);
        for _ in 0..NMI_DELAY_CYCLES {
            ppu.clock(&mut cart, &mut irq);
            assert_eq!(irq.take_nmi(), 0);
        }
        ppu.clock(&mut cart, &mut irq);
        assert_eq!(irq.take_nmi(), 1);

        run_until(&mut ppu, &mut cart, &mut irq, 261, 0);
        assert_eq!(irq.take_nmi(), 0);
    }

    #[test]
    fn enabling_nmi_during_vblank_requests_one() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();
        let mut irq = InterruptRouter::new();

        run_until(&mut ppu, &mut cart, &mut irq, 245, 0);
        assert_eq!(irq.take_nmi(), 0);
        ppu.write_register(0x2000, CTRL_NMI_ENABLE, &mut cart);
        ppu.clock(&mut cart, &mut irq);
        assert_eq!(irq.take_nmi(), 1);

        // Rewriting with NMI already enabled is not a rising edge.
        ppu.write_register(0x2000, CTRL_NMI_ENABLE, &mut cart);
        ppu.clock(&mut cart, &mut irq);
        assert_eq!(irq.take_nmi(), 0);
    }

    #[test]
    fn status_read_clears_vblank_and_write_toggle() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();
        let mut irq = InterruptRouter::new();
        run_until(&mut ppu, &mut cart, &mut irq, 241, 1);

        ppu.write_register(0x2006, 0x21, &mut cart);
        let status = ppu.read_register(0x2002, &mut cart);
        assert_eq!(status, STATUS_VBLANK | 0x01);
        assert_eq!(ppu.peek_status() & STATUS_VBLANK, 0);

        // The toggle was reset, so this pair is a fresh high/low write.
        set_address(&mut ppu, &mut cart, 0x2345);
        assert_eq!(ppu.v, 0x2345);
    }

    #[test]
    fn data_reads_are_buffered_below_palette() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();

        set_address(&mut ppu, &mut cart, 0x2000);
        ppu.write_register(0x2007, 0xAA, &mut cart);
        ppu.write_register(0x2007, 0xBB, &mut cart);

        set_address(&mut ppu, &mut cart, 0x2000);
        let _stale = ppu.read_register(0x2007, &mut cart);
        assert_eq!(ppu.read_register(0x2007, &mut cart), 0xAA);
        assert_eq!(ppu.read_register(0x2007, &mut cart), 0xBB);

        set_address(&mut ppu, &mut cart, 0x3F00);
        ppu.write_register(0x2007, 0x21, &mut cart);
        set_address(&mut ppu, &mut cart, 0x3F00);
        assert_eq!(ppu.read_register(0x2007, &mut cart), 0x21);
        // The buffer now holds the nametable byte under the palette (0x2F00).
        assert_eq!(ppu.read_buffer, 0x00);
    }

    #[test]
    fn data_port_increment_follows_ctrl() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();

        ppu.write_register(0x2000, CTRL_VRAM_INC_32, &mut cart);
        set_address(&mut ppu, &mut cart, 0x2000);
        ppu.write_register(0x2007, 0x01, &mut cart);
        assert_eq!(ppu.v, 0x2020);

        ppu.write_register(0x2000, 0, &mut cart);
        ppu.write_register(0x2007, 0x01, &mut cart);
        assert_eq!(ppu.v, 0x2021);
    }

    #[test]
    fn scroll_writes_fill_t_and_fine_x() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();

        ppu.write_register(0x2000, 0x03, &mut cart);
        ppu.write_register(0x2005, 0x7D, &mut cart);
        ppu.write_register(0x2005, 0x5E, &mut cart);
        assert_eq!(ppu.fine_x, 0x05);
        assert_eq!(ppu.t, 0x0C00 | 0x0F | (0x0B << 5) | (0x06 << 12));
    }

    #[test]
    fn pre_render_line_reloads_vertical_scroll() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();
        let mut irq = InterruptRouter::new();

        // Nametable 2, coarse Y 10, fine Y 5.
        ppu.write_register(0x2000, 0x02, &mut cart);
        ppu.write_register(0x2005, 0x00, &mut cart);
        ppu.write_register(0x2005, (10 << 3) | 5, &mut cart);
        ppu.write_register(0x2001, MASK_SHOW_BG, &mut cart);

        run_until(&mut ppu, &mut cart, &mut irq, PRE_RENDER_LINE, 279);
        ppu.v = 0;
        ppu.clock(&mut cart, &mut irq);
        assert_eq!(ppu.v & 0x7BE0, ppu.t & 0x7BE0);
        assert_eq!(ppu.v & 0x041F, 0);

        ppu.v = 0;
        run_until(&mut ppu, &mut cart, &mut irq, PRE_RENDER_LINE, 304);
        assert_eq!(ppu.v, 0x5000 | 0x0800 | (10 << 5));
        ppu.v = 0;
        run_until(&mut ppu, &mut cart, &mut irq, PRE_RENDER_LINE, 320);
        assert_eq!(ppu.v, 0);
    }

    #[test]
    fn vertical_reload_needs_rendering() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();
        let mut irq = InterruptRouter::new();
        ppu.write_register(0x2005, 0x00, &mut cart);
        ppu.write_register(0x2005, 0xFF, &mut cart);

        run_until(&mut ppu, &mut cart, &mut irq, PRE_RENDER_LINE, 279);
        ppu.v = 0;
        run_until(&mut ppu, &mut cart, &mut irq, PRE_RENDER_LINE, 320);
        assert_eq!(ppu.v, 0);
    }

    #[test]
    fn oam_data_reads_do_not_advance_the_address() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();

        ppu.write_register(0x2003, 0x10, &mut cart);
        for byte in [0x20, 0x05, 0x43, 0x80] {
            ppu.write_register(0x2004, byte, &mut cart);
        }
        ppu.write_register(0x2003, 0x12, &mut cart);
        assert_eq!(ppu.read_register(0x2004, &mut cart), 0x43);
        assert_eq!(ppu.read_register(0x2004, &mut cart), 0x43);
        // Mirrored register.
        assert_eq!(ppu.read_register(0x3FFC, &mut cart), 0x43);

        ppu.write_register(0x2003, 0x13, &mut cart);
        assert_eq!(ppu.read_register(0x2004, &mut cart), 0x80);
    }

    #[test]
    fn dma_copy_starts_at_oam_address() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();
        ppu.write_register(0x2003, 0xFE, &mut cart);

        let mut page = [0u8; 256];
        for (i, byte) in page.iter_mut().enumerate() {
            *byte = i as u8;
        }
        ppu.dma_copy(&page);
        assert_eq!(ppu.debug_peek_oam(0xFE), 0x00);
        assert_eq!(ppu.debug_peek_oam(0xFF), 0x01);
        assert_eq!(ppu.debug_peek_oam(0x00), 0x02);
    }

    #[test]
    fn coarse_y_wraps_into_next_nametable() {
        let mut ppu = Ppu::new();
        ppu.v = 0x7000 | (29 << 5);
        ppu.increment_y();
        assert_eq!(ppu.v, 0x0800);

        ppu.v = 0x7000 | (31 << 5);
        ppu.increment_y();
        assert_eq!(ppu.v, 0x0000);
    }

    #[test]
    fn sprite_zero_over_opaque_background_sets_hit() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();
        let mut irq = InterruptRouter::new();

        // Tile 1 is solid colour 1. The first two tile rows of the nametable
        // use it, so the background is opaque on lines 0-15.
        for row in 0..8 {
            cart.chr[0x0010 + row] = 0xFF;
        }
        set_address(&mut ppu, &mut cart, 0x2000);
        for _ in 0..64 {
            ppu.write_register(0x2007, 0x01, &mut cart);
        }
        set_address(&mut ppu, &mut cart, 0x3F01);
        ppu.write_register(0x2007, 0x16, &mut cart);

        // Sprite 0 at (40, 4), tile 1.
        ppu.write_register(0x2003, 0, &mut cart);
        for byte in [4, 1, 0, 40] {
            ppu.write_register(0x2004, byte, &mut cart);
        }
        set_address(&mut ppu, &mut cart, 0x0000);
        ppu.write_register(0x2005, 0, &mut cart);
        ppu.write_register(0x2005, 0, &mut cart);
        ppu.write_register(
            0x2001,
            MASK_SHOW_BG | MASK_SHOW_SPRITES | MASK_SHOW_BG_LEFT | MASK_SHOW_SPRITE_LEFT,
            &mut cart,
        );

        run_until(&mut ppu, &mut cart, &mut irq, 0, 0);
        assert_eq!(ppu.peek_status() & STATUS_SPRITE_ZERO_HIT, 0);
        run_until(&mut ppu, &mut cart, &mut irq, 10, 0);
        assert_ne!(ppu.peek_status() & STATUS_SPRITE_ZERO_HIT, 0);
        assert_eq!(ppu.debug_counters().sprite0_hits, 1);
        assert_eq!(ppu.frame_buffer()[5 * FRAME_WIDTH + 20], 0x16);

        run_until(&mut ppu, &mut cart, &mut irq, 261, 2);
        assert_eq!(ppu.peek_status() & STATUS_SPRITE_ZERO_HIT, 0);
    }

    #[test]
    fn ninth_sprite_on_a_line_sets_overflow() {
        let mut ppu = Ppu::new();
        let mut cart = chr_ram();
        let mut irq = InterruptRouter::new();

        ppu.write_register(0x2003, 0, &mut cart);
        for i in 0..64u8 {
            let y = if i < 9 { 20 } else { 0xF0 };
            for byte in [y, 0, 0, i.wrapping_mul(8)] {
                ppu.write_register(0x2004, byte, &mut cart);
            }
        }
        ppu.write_register(0x2001, MASK_SHOW_SPRITES, &mut cart);

        run_until(&mut ppu, &mut cart, &mut irq, 0, 0);
        run_until(&mut ppu, &mut cart, &mut irq, 19, 100);
        assert_eq!(ppu.peek_status() & STATUS_SPRITE_OVERFLOW, 0);
        run_until(&mut ppu, &mut cart, &mut irq, 20, 100);
        assert_ne!(ppu.peek_status() & STATUS_SPRITE_OVERFLOW, 0);
        assert_eq!(ppu.debug_counters().sprite_overflows, 1);
    }
}
