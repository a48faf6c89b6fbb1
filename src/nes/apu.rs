use rand::{Rng, SeedableRng, rngs::StdRng};

use super::interrupt::InterruptRouter;
use crate::config::{NesConfig, NoiseMode};

const CPU_CLOCK_HZ: u32 = 1_789_773;
/// CPU clocks per frame sequencer step (240 Hz).
const FRAME_STEP_CLOCKS: u64 = (CPU_CLOCK_HZ / 240) as u64;
/// CPU cycles the DMC steals per sample byte fetch.
const DMC_FETCH_STALL: u32 = 4;

const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1],
    [0, 0, 0, 0, 0, 0, 1, 1],
    [0, 0, 0, 0, 1, 1, 1, 1],
    [1, 1, 1, 1, 1, 1, 0, 0],
];

const TRI_TABLE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12,
    13, 14, 15,
];

const NOISE_PERIOD_TABLE: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

const DMC_RATE_TABLE: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

/// Uniform randomness for the noise channel.
pub trait NoiseSource {
    /// A value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;
}

pub struct SeededNoise {
    rng: StdRng,
}

impl SeededNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl NoiseSource for SeededNoise {
    fn next_unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// CPU-side memory the DMC pulls sample bytes from.
pub trait SampleSource {
    fn read_sample(&mut self, addr: u16) -> u8;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApuDebugCounters {
    pub clocks: u64,
    pub samples: u64,
    pub frame_steps: u64,
    pub frame_irqs: u64,
    pub dmc_fetches: u64,
    pub dmc_irqs: u64,
}

pub struct Apu {
    pulse1: PulseChannel,
    pulse2: PulseChannel,
    triangle: TriangleChannel,
    noise: NoiseChannel,
    dmc: DmcChannel,

    five_step: bool,
    frame_irq_inhibit: bool,
    frame_irq_flag: bool,
    frame_origin: u64,
    frame_step: u64,

    clocks: u64,
    sample_divider: u64,
    sample_counter: u64,
    samples: Vec<f32>,
    pending_stall: u32,
    debug: ApuDebugCounters,
}

impl Apu {
    pub fn new(sample_rate: u32, noise_mode: NoiseMode, noise_source: Box<dyn NoiseSource>) -> Self {
        Self {
            pulse1: PulseChannel::new(true),
            pulse2: PulseChannel::new(false),
            triangle: TriangleChannel::default(),
            noise: NoiseChannel::new(noise_mode, noise_source),
            dmc: DmcChannel::new(),
            five_step: false,
            frame_irq_inhibit: false,
            frame_irq_flag: false,
            frame_origin: 0,
            frame_step: 0,
            clocks: 0,
            sample_divider: u64::from((CPU_CLOCK_HZ / sample_rate.max(1)).max(1)),
            sample_counter: 0,
            samples: Vec::with_capacity(2048),
            pending_stall: 0,
            debug: ApuDebugCounters::default(),
        }
    }

    pub fn from_config(config: &NesConfig) -> Self {
        Self::new(
            config.sample_rate,
            config.noise_mode,
            Box::new(SeededNoise::new(config.noise_seed)),
        )
    }

    pub fn write_register(&mut self, addr: u16, value: u8) {
        match addr {
            0x4000..=0x4003 => self.pulse1.write(addr - 0x4000, value),
            0x4004..=0x4007 => self.pulse2.write(addr - 0x4004, value),
            0x4008..=0x400B => self.triangle.write(addr - 0x4008, value),
            0x400C..=0x400F => self.noise.write(addr - 0x400C, value),
            0x4010..=0x4013 => self.dmc.write(addr - 0x4010, value),
            0x4015 => self.write_status(value),
            0x4017 => self.write_frame_counter(value),
            _ => {}
        }
    }

    pub fn read_status(&mut self) -> u8 {
        let mut status = 0u8;
        if self.pulse1.length_counter > 0 {
            status |= 0x01;
        }
        if self.pulse2.length_counter > 0 {
            status |= 0x02;
        }
        if self.triangle.length_counter > 0 {
            status |= 0x04;
        }
        if self.noise.length_counter > 0 {
            status |= 0x08;
        }
        if self.dmc.bytes_remaining > 0 {
            status |= 0x10;
        }
        if self.frame_irq_flag {
            status |= 0x40;
        }
        if self.dmc.irq_flag {
            status |= 0x80;
        }

        self.frame_irq_flag = false;
        status
    }

    pub fn clock(&mut self, memory: &mut dyn SampleSource, interrupts: &mut InterruptRouter) {
        self.clocks = self.clocks.wrapping_add(1);
        self.debug.clocks = self.clocks;

        if (self.clocks & 1) != 0 {
            self.pulse1.clock_timer();
            self.pulse2.clock_timer();
            self.noise.clock_timer();
        }
        if let Some(fetch) = self.dmc.clock(memory) {
            self.debug.dmc_fetches = self.debug.dmc_fetches.wrapping_add(1);
            self.pending_stall += DMC_FETCH_STALL;
            if fetch.raised_irq {
                self.debug.dmc_irqs = self.debug.dmc_irqs.wrapping_add(1);
                interrupts.irq();
            }
        }
        self.triangle.clock_timer();

        let count = self.clocks / self.sample_divider;
        if count != self.sample_counter {
            self.sample_counter = count;
            self.samples.push(self.mix());
            self.debug.samples = self.debug.samples.wrapping_add(1);
        }

        let step = (self.clocks - self.frame_origin) / FRAME_STEP_CLOCKS;
        if step != self.frame_step {
            self.frame_step = step;
            self.clock_frame_sequencer(interrupts);
        }
    }

    pub fn take_samples(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.samples)
    }

    /// Hands out queued samples, keeping the buffer's allocation.
    pub fn drain_samples(&mut self) -> std::vec::Drain<'_, f32> {
        self.samples.drain(..)
    }

    /// CPU cycles owed for DMC fetches since the last call.
    pub fn take_stall_cycles(&mut self) -> u32 {
        std::mem::take(&mut self.pending_stall)
    }

    pub fn debug_counters(&self) -> ApuDebugCounters {
        self.debug
    }

    fn write_status(&mut self, value: u8) {
        self.dmc.irq_flag = false;
        self.pulse1.set_enabled((value & 0x01) != 0);
        self.pulse2.set_enabled((value & 0x02) != 0);
        self.triangle.set_enabled((value & 0x04) != 0);
        self.noise.set_enabled((value & 0x08) != 0);
        self.dmc.set_enabled((value & 0x10) != 0);
    }

    fn write_frame_counter(&mut self, value: u8) {
        self.five_step = (value & 0x80) != 0;
        self.frame_irq_inhibit = (value & 0x40) != 0;
        if self.frame_irq_inhibit {
            self.frame_irq_flag = false;
        }
        self.frame_origin = self.clocks;
        self.frame_step = 0;
        if self.five_step {
            self.clock_quarter_frame();
            self.clock_half_frame();
        }
    }

    fn clock_frame_sequencer(&mut self, interrupts: &mut InterruptRouter) {
        self.debug.frame_steps = self.debug.frame_steps.wrapping_add(1);
        if self.five_step {
            match self.frame_step % 5 {
                0 | 2 => self.clock_quarter_frame(),
                1 | 4 => {
                    self.clock_half_frame();
                    self.clock_quarter_frame();
                }
                _ => {}
            }
        } else {
            match self.frame_step % 4 {
                0 | 2 => self.clock_quarter_frame(),
                1 => {
                    self.clock_half_frame();
                    self.clock_quarter_frame();
                }
                _ => {
                    if !self.frame_irq_inhibit {
                        self.frame_irq_flag = true;
                        self.debug.frame_irqs = self.debug.frame_irqs.wrapping_add(1);
                        interrupts.irq();
                    }
                    self.clock_half_frame();
                    self.clock_quarter_frame();
                }
            }
        }
    }

    fn clock_quarter_frame(&mut self) {
        self.pulse1.envelope.clock(self.pulse1.length_halt);
        self.pulse2.envelope.clock(self.pulse2.length_halt);
        self.noise.envelope.clock(self.noise.length_halt);
        self.triangle.clock_linear_counter();
    }

    fn clock_half_frame(&mut self) {
        self.pulse1.clock_length_counter();
        self.pulse2.clock_length_counter();
        self.triangle.clock_length_counter();
        self.noise.clock_length_counter();
        self.pulse1.clock_sweep();
        self.pulse2.clock_sweep();
    }

    fn mix(&self) -> f32 {
        let pulse = 0.00752 * (f64::from(self.pulse1.output()) + f64::from(self.pulse2.output()));
        let tnd = 0.00851 * f64::from(self.triangle.output())
            + 0.00494 * f64::from(self.noise.output())
            + 0.00335 * f64::from(self.dmc.output_level);
        (pulse + tnd) as f32
    }
}

/// Divider-driven decay shared by the pulse and noise channels.
#[derive(Debug, Clone, Copy, Default)]
struct Envelope {
    constant_volume: bool,
    period: u8,
    volume: u8,
    counter: u32,
}

impl Envelope {
    fn write(&mut self, value: u8) {
        self.constant_volume = (value & 0x10) != 0;
        self.period = value & 0x0F;
        self.volume = 15;
        self.counter = 0;
    }

    fn clock(&mut self, looping: bool) {
        if self.constant_volume {
            return;
        }
        if self.counter % (u32::from(self.period) + 1) == 0 {
            self.volume = match self.volume {
                0 if looping => 15,
                0 => 0,
                v => v - 1,
            };
        }
        self.counter = self.counter.wrapping_add(1);
    }

    fn level(&self) -> u8 {
        if self.constant_volume {
            self.period
        } else {
            self.volume
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PulseChannel {
    channel1: bool,
    enabled: bool,
    duty: u8,
    step: u8,
    length_halt: bool,
    length_counter: u8,
    envelope: Envelope,

    sweep_enabled: bool,
    sweep_period: u8,
    sweep_negate: bool,
    sweep_shift: u8,
    sweep_counter: u32,

    timer: u16,
    timer_counter: u16,
    volume: u8,
}

impl PulseChannel {
    fn new(channel1: bool) -> Self {
        Self {
            channel1,
            enabled: false,
            duty: 0,
            step: 0,
            length_halt: false,
            length_counter: 0,
            envelope: Envelope::default(),
            sweep_enabled: false,
            sweep_period: 0,
            sweep_negate: false,
            sweep_shift: 0,
            sweep_counter: 0,
            timer: 0,
            timer_counter: 0,
            volume: 0,
        }
    }

    fn write(&mut self, offset: u16, value: u8) {
        match offset {
            0 => {
                self.duty = value >> 6;
                self.length_halt = (value & 0x20) != 0;
                self.envelope.write(value);
            }
            1 => {
                self.sweep_enabled = (value & 0x80) != 0;
                self.sweep_period = (value >> 4) & 0x07;
                self.sweep_negate = (value & 0x08) != 0;
                self.sweep_shift = value & 0x07;
                self.sweep_counter = 0;
            }
            2 => self.timer = (self.timer & 0xFF00) | u16::from(value),
            _ => {
                self.timer = (self.timer & 0x00FF) | (u16::from(value & 0x07) << 8);
                if self.enabled {
                    self.length_counter = LENGTH_TABLE[(value >> 3) as usize];
                }
                self.timer_counter = 0;
            }
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.length_counter = 0;
        }
    }

    fn clock_timer(&mut self) {
        if !self.enabled {
            return;
        }
        if self.timer_counter == 0 {
            self.timer_counter = self.timer;
            self.step_sequencer();
        } else {
            self.timer_counter -= 1;
        }
    }

    fn output(&self) -> u8 {
        if self.length_counter == 0 {
            0
        } else {
            self.volume
        }
    }

    fn step_sequencer(&mut self) {
        self.step = (self.step + 1) & 0x07;
        self.volume = if self.length_counter == 0 || !(8..=0x7FF).contains(&self.timer) {
            0
        } else {
            self.envelope.level() * DUTY_TABLE[self.duty as usize][self.step as usize]
        };
    }

    fn clock_length_counter(&mut self) {
        if !self.length_halt && self.length_counter > 0 {
            self.length_counter -= 1;
        }
    }

    fn clock_sweep(&mut self) {
        if !self.sweep_enabled {
            return;
        }
        if self.sweep_counter % (u32::from(self.sweep_period) + 1) == 0 {
            let change = self.timer >> self.sweep_shift;
            if self.sweep_negate {
                self.timer = self.timer.saturating_sub(change);
            } else {
                self.timer = self.timer.saturating_add(change);
            }
            // Pulse 1 negates with ones' complement.
            if self.channel1 && (self.sweep_negate || change == 0) {
                self.timer = self.timer.saturating_sub(1);
            }
        }
        self.sweep_counter = self.sweep_counter.wrapping_add(1);
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TriangleChannel {
    enabled: bool,
    control: bool,
    linear_reload_value: u8,
    linear_reload: bool,
    linear_counter: u8,
    length_counter: u8,
    timer: u16,
    timer_counter: u16,
    phase: u8,
    volume: u8,
}

impl TriangleChannel {
    fn write(&mut self, offset: u16, value: u8) {
        match offset {
            0 => {
                self.control = (value & 0x80) != 0;
                self.linear_reload_value = value & 0x7F;
            }
            1 => {}
            2 => self.timer = (self.timer & 0xFF00) | u16::from(value),
            _ => {
                self.timer = (self.timer & 0x00FF) | (u16::from(value & 0x07) << 8);
                if self.enabled {
                    self.length_counter = LENGTH_TABLE[(value >> 3) as usize];
                }
                self.linear_reload = true;
                self.timer_counter = 0;
            }
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.length_counter = 0;
        }
    }

    fn clock_timer(&mut self) {
        if !self.enabled {
            return;
        }
        if self.timer_counter == 0 {
            self.timer_counter = self.timer;
            if self.length_counter > 0 && self.linear_counter > 0 {
                self.phase = (self.phase + 1) & 0x1F;
            }
            self.volume = TRI_TABLE[self.phase as usize];
        } else {
            self.timer_counter -= 1;
        }
    }

    fn output(&self) -> u8 {
        if self.length_counter == 0 {
            0
        } else {
            self.volume
        }
    }

    fn clock_linear_counter(&mut self) {
        if self.linear_reload {
            self.linear_counter = self.linear_reload_value;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }
        if !self.control {
            self.linear_reload = false;
        }
    }

    fn clock_length_counter(&mut self) {
        if !self.control && self.length_counter > 0 {
            self.length_counter -= 1;
        }
    }
}

struct NoiseChannel {
    enabled: bool,
    mode: NoiseMode,
    source: Box<dyn NoiseSource>,
    length_halt: bool,
    length_counter: u8,
    envelope: Envelope,
    short_mode: bool,
    shift_register: u16,
    timer: u16,
    timer_counter: u16,
    volume: u8,
}

impl NoiseChannel {
    fn new(mode: NoiseMode, source: Box<dyn NoiseSource>) -> Self {
        Self {
            enabled: false,
            mode,
            source,
            length_halt: false,
            length_counter: 0,
            envelope: Envelope::default(),
            short_mode: false,
            shift_register: 1,
            timer: 0,
            timer_counter: 0,
            volume: 0,
        }
    }

    fn write(&mut self, offset: u16, value: u8) {
        match offset {
            0 => {
                self.length_halt = (value & 0x20) != 0;
                self.envelope.write(value);
            }
            1 => {}
            2 => {
                self.short_mode = (value & 0x80) != 0;
                self.timer = NOISE_PERIOD_TABLE[(value & 0x0F) as usize];
                self.timer_counter = 0;
            }
            _ => {
                if self.enabled {
                    self.length_counter = LENGTH_TABLE[(value >> 3) as usize];
                }
            }
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.length_counter = 0;
        }
    }

    fn clock_timer(&mut self) {
        if !self.enabled {
            return;
        }
        if self.timer_counter == 0 {
            self.timer_counter = self.timer;
            self.step();
        } else {
            self.timer_counter -= 1;
        }
    }

    fn output(&self) -> u8 {
        if self.length_counter == 0 {
            0
        } else {
            self.volume
        }
    }

    fn step(&mut self) {
        let level = self.envelope.level();
        if self.length_counter == 0 {
            self.volume = 0;
            return;
        }
        self.volume = match self.mode {
            NoiseMode::Random => (self.source.next_unit() * f64::from(level)).floor() as u8,
            NoiseMode::Lfsr => {
                let tap = if self.short_mode { 6 } else { 1 };
                let feedback = (self.shift_register ^ (self.shift_register >> tap)) & 0x0001;
                self.shift_register = (self.shift_register >> 1) | (feedback << 14);
                if (self.shift_register & 0x0001) == 0 {
                    level
                } else {
                    0
                }
            }
        };
    }

    fn clock_length_counter(&mut self) {
        if !self.length_halt && self.length_counter > 0 {
            self.length_counter -= 1;
        }
    }
}

/// Outcome of a DMC sample byte fetch.
struct DmcFetch {
    raised_irq: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct DmcChannel {
    enabled: bool,
    irq_enabled: bool,
    irq_flag: bool,
    looping: bool,
    rate_index: u8,
    clocks: u32,

    sample_addr: u16,
    sample_length: u16,
    current_addr: u16,
    bytes_remaining: u16,

    sample_buffer: u8,
    bits_remaining: u8,
    muted: bool,
    output_level: u8,
}

impl DmcChannel {
    fn new() -> Self {
        Self {
            muted: true,
            ..Self::default()
        }
    }

    fn write(&mut self, offset: u16, value: u8) {
        match offset {
            0 => {
                self.irq_enabled = (value & 0x80) != 0;
                self.looping = (value & 0x40) != 0;
                self.rate_index = value & 0x0F;
                self.clocks = 0;
                if !self.irq_enabled {
                    self.irq_flag = false;
                }
            }
            1 => self.output_level = value & 0x7F,
            2 => self.sample_addr = 0xC000 + u16::from(value) * 64,
            _ => self.sample_length = u16::from(value) * 16 + 1,
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.bytes_remaining = 0;
        } else if self.bytes_remaining == 0 {
            self.restart();
        }
    }

    fn restart(&mut self) {
        self.current_addr = self.sample_addr;
        self.bytes_remaining = self.sample_length;
        self.muted = self.bytes_remaining == 0;
    }

    fn clock(&mut self, memory: &mut dyn SampleSource) -> Option<DmcFetch> {
        if !self.enabled {
            return None;
        }
        let period = u32::from(DMC_RATE_TABLE[self.rate_index as usize]) + 1;
        let fetch = if self.clocks % period == 0 {
            self.clock_output_unit(memory)
        } else {
            None
        };
        self.clocks = self.clocks.wrapping_add(1);
        fetch
    }

    fn clock_output_unit(&mut self, memory: &mut dyn SampleSource) -> Option<DmcFetch> {
        let mut fetch = None;
        if self.bits_remaining == 0 {
            if self.muted || self.bytes_remaining == 0 {
                // Silence: the level holds.
                self.muted = true;
                return None;
            }
            fetch = self.read_next_byte(memory);
            self.bits_remaining = 8;
        }

        if (self.sample_buffer & 0x01) != 0 {
            if self.output_level <= 125 {
                self.output_level += 2;
            }
        } else if self.output_level >= 2 {
            self.output_level -= 2;
        }
        self.sample_buffer >>= 1;
        self.bits_remaining -= 1;
        fetch
    }

    fn read_next_byte(&mut self, memory: &mut dyn SampleSource) -> Option<DmcFetch> {
        if self.bytes_remaining == 0 {
            return None;
        }

        self.sample_buffer = memory.read_sample(self.current_addr);
        self.current_addr = if self.current_addr == 0xFFFF {
            0x8000
        } else {
            self.current_addr + 1
        };

        self.bytes_remaining -= 1;
        let mut raised_irq = false;
        if self.bytes_remaining == 0 {
            if self.looping {
                self.restart();
            } else {
                self.muted = true;
                if self.irq_enabled {
                    self.irq_flag = true;
                    raised_irq = true;
                }
            }
        }
        Some(DmcFetch { raised_irq })
    }
}
