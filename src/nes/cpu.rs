use super::bus::Bus;
use super::interrupt::InterruptRouter;
use super::opcodes::{AddressingMode, Instruction, Opcode, decode};
use crate::error::NesError;

pub const FLAG_CARRY: u8 = 0x01;
pub const FLAG_ZERO: u8 = 0x02;
pub const FLAG_INTERRUPT: u8 = 0x04;
pub const FLAG_DECIMAL: u8 = 0x08;
pub const FLAG_BREAK: u8 = 0x10;
pub const FLAG_UNUSED: u8 = 0x20;
pub const FLAG_OVERFLOW: u8 = 0x40;
pub const FLAG_NEGATIVE: u8 = 0x80;

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

const INTERRUPT_CYCLES: u32 = 7;
const RESET_CYCLES: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuRegisters {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: u8,
    pub sp: u8,
    pub pc: u16,
}

#[derive(Debug, Clone, Copy, Default)]
struct Operand {
    addr: u16,
    page_crossed: bool,
}

/// 6502 core without decimal mode.
///
/// Instructions execute whole on the clock where the deferred-cycle counter
/// reaches zero; the remaining cycles are then burned one per clock.
/// `suspend` freezes the core entirely, which is how DMA stalls are charged.
#[derive(Debug, Clone, Default)]
pub struct Cpu {
    a: u8,
    x: u8,
    y: u8,
    p: u8,
    sp: u8,
    pc: u16,
    defer: u32,
    suspend: u32,
    clocks: u64,
    instructions: u64,
    nmi_serviced: u64,
    irq_serviced: u64,
    irq_dropped: u64,
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset<B: Bus>(&mut self, bus: &mut B) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.p = 0;
        self.sp = 0xFD;
        self.pc = read_word(bus, RESET_VECTOR);
        self.defer = RESET_CYCLES;
        self.suspend = 0;
        self.clocks = 0;
        tracing::debug!(pc = format_args!("${:04X}", self.pc), "cpu reset");
    }

    /// Advances the core by one CPU cycle.
    ///
    /// Interrupt requests raised since the previous clock are serviced first.
    /// A fault leaves PC on the offending opcode.
    pub fn clock<B: Bus>(
        &mut self,
        bus: &mut B,
        interrupts: &mut InterruptRouter,
    ) -> Result<(), NesError> {
        self.service_interrupts(bus, interrupts);
        self.clocks = self.clocks.wrapping_add(1);

        if self.suspend > 0 {
            self.suspend -= 1;
            return Ok(());
        }
        if self.defer == 0 {
            self.step(bus)?;
        }
        self.defer = self.defer.saturating_sub(1);
        Ok(())
    }

    /// Stalls the core for `cycles` clocks on top of any pending work.
    pub fn suspend(&mut self, cycles: u32) {
        self.suspend = self.suspend.saturating_add(cycles);
    }

    pub fn nmi<B: Bus>(&mut self, bus: &mut B) {
        self.enter_interrupt(bus, NMI_VECTOR);
        self.nmi_serviced += 1;
        tracing::trace!(pc = format_args!("${:04X}", self.pc), "nmi serviced");
    }

    /// Maskable interrupt; dropped while the I flag is set.
    pub fn irq<B: Bus>(&mut self, bus: &mut B) -> bool {
        if self.flag(FLAG_INTERRUPT) {
            self.irq_dropped += 1;
            return false;
        }
        self.enter_interrupt(bus, IRQ_VECTOR);
        self.irq_serviced += 1;
        tracing::trace!(pc = format_args!("${:04X}", self.pc), "irq serviced");
        true
    }

    pub fn registers(&self) -> CpuRegisters {
        CpuRegisters {
            a: self.a,
            x: self.x,
            y: self.y,
            p: self.p,
            sp: self.sp,
            pc: self.pc,
        }
    }

    pub fn clocks(&self) -> u64 {
        self.clocks
    }

    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    pub fn nmi_serviced(&self) -> u64 {
        self.nmi_serviced
    }

    pub fn irq_serviced(&self) -> u64 {
        self.irq_serviced
    }

    pub fn irq_dropped(&self) -> u64 {
        self.irq_dropped
    }

    /// True between instructions, when the next clock will fetch.
    pub fn at_instruction_boundary(&self) -> bool {
        self.defer == 0 && self.suspend == 0
    }

    fn service_interrupts<B: Bus>(&mut self, bus: &mut B, interrupts: &mut InterruptRouter) {
        for _ in 0..interrupts.take_nmi() {
            self.nmi(bus);
        }
        // Requests raised in the same cycle collapse into one entry.
        let irqs = interrupts.take_irq();
        if irqs > 0 {
            self.irq(bus);
            self.irq_dropped += u64::from(irqs - 1);
        }
    }

    fn enter_interrupt<B: Bus>(&mut self, bus: &mut B, vector: u16) {
        self.push_word(bus, self.pc);
        self.push(bus, (self.p | FLAG_UNUSED) & !FLAG_BREAK);
        self.set_flag(FLAG_INTERRUPT, true);
        self.pc = read_word(bus, vector);
        self.defer += INTERRUPT_CYCLES;
    }

    fn step<B: Bus>(&mut self, bus: &mut B) -> Result<(), NesError> {
        let opcode_pc = self.pc;
        let opcode = self.fetch_byte(bus);
        let Some(entry) = decode(opcode) else {
            self.pc = opcode_pc;
            tracing::warn!(
                opcode = format_args!("${opcode:02X}"),
                pc = format_args!("${opcode_pc:04X}"),
                "illegal instruction"
            );
            return Err(NesError::IllegalInstruction {
                opcode,
                pc: opcode_pc,
            });
        };

        let operand = self.resolve(bus, entry.mode);
        let mut cycles = u32::from(entry.cycles);
        if operand.page_crossed {
            cycles += u32::from(entry.page_cycles);
        }
        cycles += self.execute(bus, &entry, operand);

        self.defer += cycles;
        self.instructions += 1;
        Ok(())
    }

    fn resolve<B: Bus>(&mut self, bus: &mut B, mode: AddressingMode) -> Operand {
        match mode {
            AddressingMode::Implicit | AddressingMode::Accumulator => Operand::default(),
            AddressingMode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                Operand {
                    addr,
                    page_crossed: false,
                }
            }
            AddressingMode::ZeroPage => unindexed(u16::from(self.fetch_byte(bus))),
            AddressingMode::ZeroPageX => {
                unindexed(u16::from(self.fetch_byte(bus).wrapping_add(self.x)))
            }
            AddressingMode::ZeroPageY => {
                unindexed(u16::from(self.fetch_byte(bus).wrapping_add(self.y)))
            }
            AddressingMode::Absolute => unindexed(self.fetch_word(bus)),
            AddressingMode::AbsoluteX => {
                let base = self.fetch_word(bus);
                indexed(base, base.wrapping_add(u16::from(self.x)))
            }
            AddressingMode::AbsoluteY => {
                let base = self.fetch_word(bus);
                indexed(base, base.wrapping_add(u16::from(self.y)))
            }
            AddressingMode::Indirect => {
                let ptr = self.fetch_word(bus);
                // The high byte never leaves the pointer's page.
                let lo = u16::from(bus.read(ptr));
                let hi = u16::from(bus.read((ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF)));
                unindexed((hi << 8) | lo)
            }
            AddressingMode::IndirectX => {
                let zp = self.fetch_byte(bus).wrapping_add(self.x);
                unindexed(read_zero_page_word(bus, zp))
            }
            AddressingMode::IndirectY => {
                let zp = self.fetch_byte(bus);
                let base = read_zero_page_word(bus, zp);
                indexed(base, base.wrapping_add(u16::from(self.y)))
            }
            AddressingMode::Relative => {
                let offset = self.fetch_byte(bus) as i8;
                let target = self.pc.wrapping_add(offset as i16 as u16);
                indexed(self.pc, target)
            }
        }
    }

    /// Runs one decoded instruction; returns cycles beyond the table cost.
    fn execute<B: Bus>(&mut self, bus: &mut B, entry: &Opcode, operand: Operand) -> u32 {
        let addr = operand.addr;
        match entry.instruction {
            Instruction::Adc => {
                let value = bus.read(addr);
                self.adc(value);
            }
            Instruction::And => {
                let value = bus.read(addr);
                self.and(value);
            }
            Instruction::Asl => self.modify(bus, entry.mode, addr, Self::asl),
            Instruction::Bcc => return self.branch(!self.flag(FLAG_CARRY), operand),
            Instruction::Bcs => return self.branch(self.flag(FLAG_CARRY), operand),
            Instruction::Beq => return self.branch(self.flag(FLAG_ZERO), operand),
            Instruction::Bmi => return self.branch(self.flag(FLAG_NEGATIVE), operand),
            Instruction::Bne => return self.branch(!self.flag(FLAG_ZERO), operand),
            Instruction::Bpl => return self.branch(!self.flag(FLAG_NEGATIVE), operand),
            Instruction::Bvc => return self.branch(!self.flag(FLAG_OVERFLOW), operand),
            Instruction::Bvs => return self.branch(self.flag(FLAG_OVERFLOW), operand),
            Instruction::Bit => {
                let value = bus.read(addr);
                self.set_flag(FLAG_ZERO, (self.a & value) == 0);
                self.set_flag(FLAG_NEGATIVE, (value & 0x80) != 0);
                self.set_flag(FLAG_OVERFLOW, (value & 0x40) != 0);
            }
            Instruction::Brk => {
                self.push_word(bus, self.pc);
                self.push(bus, self.p | FLAG_BREAK | FLAG_UNUSED);
                self.set_flag(FLAG_INTERRUPT, true);
                self.pc = read_word(bus, IRQ_VECTOR);
            }
            Instruction::Clc => self.set_flag(FLAG_CARRY, false),
            Instruction::Cld => self.set_flag(FLAG_DECIMAL, false),
            Instruction::Cli => self.set_flag(FLAG_INTERRUPT, false),
            Instruction::Clv => self.set_flag(FLAG_OVERFLOW, false),
            Instruction::Sec => self.set_flag(FLAG_CARRY, true),
            Instruction::Sed => self.set_flag(FLAG_DECIMAL, true),
            Instruction::Sei => self.set_flag(FLAG_INTERRUPT, true),
            Instruction::Cmp => {
                let value = bus.read(addr);
                self.compare(self.a, value);
            }
            Instruction::Cpx => {
                let value = bus.read(addr);
                self.compare(self.x, value);
            }
            Instruction::Cpy => {
                let value = bus.read(addr);
                self.compare(self.y, value);
            }
            Instruction::Dec => self.modify(bus, entry.mode, addr, Self::dec),
            Instruction::Inc => self.modify(bus, entry.mode, addr, Self::inc),
            Instruction::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.update_zn(self.x);
            }
            Instruction::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.update_zn(self.y);
            }
            Instruction::Inx => {
                self.x = self.x.wrapping_add(1);
                self.update_zn(self.x);
            }
            Instruction::Iny => {
                self.y = self.y.wrapping_add(1);
                self.update_zn(self.y);
            }
            Instruction::Eor => {
                let value = bus.read(addr);
                self.eor(value);
            }
            Instruction::Ora => {
                let value = bus.read(addr);
                self.ora(value);
            }
            Instruction::Jmp => self.pc = addr,
            Instruction::Jsr => {
                self.push_word(bus, self.pc.wrapping_sub(1));
                self.pc = addr;
            }
            Instruction::Rts => self.pc = self.pop_word(bus).wrapping_add(1),
            Instruction::Rti => {
                let status = self.pop(bus);
                self.p = (status & !FLAG_BREAK) | FLAG_UNUSED;
                self.pc = self.pop_word(bus);
            }
            Instruction::Lda => {
                self.a = bus.read(addr);
                self.update_zn(self.a);
            }
            Instruction::Ldx => {
                self.x = bus.read(addr);
                self.update_zn(self.x);
            }
            Instruction::Ldy => {
                self.y = bus.read(addr);
                self.update_zn(self.y);
            }
            Instruction::Lsr => self.modify(bus, entry.mode, addr, Self::lsr),
            Instruction::Rol => self.modify(bus, entry.mode, addr, Self::rol),
            Instruction::Ror => self.modify(bus, entry.mode, addr, Self::ror),
            Instruction::Nop => {}
            Instruction::Pha => self.push(bus, self.a),
            Instruction::Php => self.push(bus, self.p | FLAG_BREAK | FLAG_UNUSED),
            Instruction::Pla => {
                self.a = self.pop(bus);
                self.update_zn(self.a);
            }
            Instruction::Plp => {
                let status = self.pop(bus);
                self.p = (status & !FLAG_BREAK) | FLAG_UNUSED;
            }
            Instruction::Sbc => {
                let value = bus.read(addr);
                self.sbc(value);
            }
            Instruction::Sta => bus.write(addr, self.a),
            Instruction::Stx => bus.write(addr, self.x),
            Instruction::Sty => bus.write(addr, self.y),
            Instruction::Tax => {
                self.x = self.a;
                self.update_zn(self.x);
            }
            Instruction::Tay => {
                self.y = self.a;
                self.update_zn(self.y);
            }
            Instruction::Tsx => {
                self.x = self.sp;
                self.update_zn(self.x);
            }
            Instruction::Txa => {
                self.a = self.x;
                self.update_zn(self.a);
            }
            Instruction::Txs => self.sp = self.x,
            Instruction::Tya => {
                self.a = self.y;
                self.update_zn(self.a);
            }
            Instruction::Slo => {
                let value = self.modify_memory(bus, addr, Self::asl);
                self.ora(value);
            }
            Instruction::Rla => {
                let value = self.modify_memory(bus, addr, Self::rol);
                self.and(value);
            }
            Instruction::Sre => {
                let value = self.modify_memory(bus, addr, Self::lsr);
                self.eor(value);
            }
            Instruction::Rra => {
                let value = self.modify_memory(bus, addr, Self::ror);
                self.adc(value);
            }
            Instruction::Dcp => {
                let value = self.modify_memory(bus, addr, Self::dec);
                self.compare(self.a, value);
            }
            Instruction::Isc => {
                let value = self.modify_memory(bus, addr, Self::inc);
                self.sbc(value);
            }
            Instruction::Sax => bus.write(addr, self.a & self.x),
            Instruction::Lax => {
                let value = bus.read(addr);
                self.a = value;
                self.x = value;
                self.update_zn(value);
            }
        }
        0
    }

    fn branch(&mut self, condition: bool, operand: Operand) -> u32 {
        if !condition {
            return 0;
        }
        self.pc = operand.addr;
        if operand.page_crossed { 2 } else { 1 }
    }

    fn modify<B: Bus>(
        &mut self,
        bus: &mut B,
        mode: AddressingMode,
        addr: u16,
        op: fn(&mut Self, u8) -> u8,
    ) {
        if mode == AddressingMode::Accumulator {
            self.a = op(self, self.a);
        } else {
            self.modify_memory(bus, addr, op);
        }
    }

    fn modify_memory<B: Bus>(
        &mut self,
        bus: &mut B,
        addr: u16,
        op: fn(&mut Self, u8) -> u8,
    ) -> u8 {
        let value = bus.read(addr);
        let result = op(self, value);
        bus.write(addr, result);
        result
    }

    fn fetch_byte<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let byte = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn fetch_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = u16::from(self.fetch_byte(bus));
        let hi = u16::from(self.fetch_byte(bus));
        (hi << 8) | lo
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        bus.write(0x0100 | u16::from(self.sp), value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop<B: Bus>(&mut self, bus: &mut B) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x0100 | u16::from(self.sp))
    }

    fn push_word<B: Bus>(&mut self, bus: &mut B, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, value as u8);
    }

    fn pop_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = u16::from(self.pop(bus));
        let hi = u16::from(self.pop(bus));
        (hi << 8) | lo
    }

    fn set_flag(&mut self, flag: u8, value: bool) {
        if value {
            self.p |= flag;
        } else {
            self.p &= !flag;
        }
    }

    fn flag(&self, flag: u8) -> bool {
        (self.p & flag) != 0
    }

    fn update_zn(&mut self, value: u8) {
        self.set_flag(FLAG_ZERO, value == 0);
        self.set_flag(FLAG_NEGATIVE, (value & 0x80) != 0);
    }

    fn ora(&mut self, value: u8) {
        self.a |= value;
        self.update_zn(self.a);
    }

    fn and(&mut self, value: u8) {
        self.a &= value;
        self.update_zn(self.a);
    }

    fn eor(&mut self, value: u8) {
        self.a ^= value;
        self.update_zn(self.a);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.set_flag(FLAG_CARRY, register >= value);
        self.update_zn(register.wrapping_sub(value));
    }

    fn adc(&mut self, value: u8) {
        let sum = u16::from(self.a) + u16::from(value) + u16::from(self.flag(FLAG_CARRY));
        let out = sum as u8;
        self.set_flag(FLAG_CARRY, sum > 0xFF);
        self.set_flag(FLAG_OVERFLOW, ((self.a ^ out) & (value ^ out) & 0x80) != 0);
        self.a = out;
        self.update_zn(out);
    }

    fn sbc(&mut self, value: u8) {
        self.adc(value ^ 0xFF);
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_CARRY, (value & 0x80) != 0);
        let result = value << 1;
        self.update_zn(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_CARRY, (value & 0x01) != 0);
        let result = value >> 1;
        self.update_zn(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.flag(FLAG_CARRY));
        self.set_flag(FLAG_CARRY, (value & 0x80) != 0);
        let result = (value << 1) | carry_in;
        self.update_zn(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let carry_in = if self.flag(FLAG_CARRY) { 0x80 } else { 0 };
        self.set_flag(FLAG_CARRY, (value & 0x01) != 0);
        let result = (value >> 1) | carry_in;
        self.update_zn(result);
        result
    }

    fn inc(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.update_zn(result);
        result
    }

    fn dec(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.update_zn(result);
        result
    }
}

fn unindexed(addr: u16) -> Operand {
    Operand {
        addr,
        page_crossed: false,
    }
}

fn indexed(base: u16, addr: u16) -> Operand {
    Operand {
        addr,
        page_crossed: (base & 0xFF00) != (addr & 0xFF00),
    }
}

fn read_word<B: Bus>(bus: &mut B, addr: u16) -> u16 {
    let lo = u16::from(bus.read(addr));
    let hi = u16::from(bus.read(addr.wrapping_add(1)));
    (hi << 8) | lo
}

fn read_zero_page_word<B: Bus>(bus: &mut B, zp: u8) -> u16 {
    let lo = u16::from(bus.read(u16::from(zp)));
    let hi = u16::from(bus.read(u16::from(zp.wrapping_add(1))));
    (hi << 8) | lo
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatBus {
        mem: Vec<u8>,
    }

    impl FlatBus {
        fn with_program(origin: u16, program: &[u8]) -> Self {
            let mut mem = vec![0u8; 0x10000];
            let start = origin as usize;
            mem[start..start + program.len()].copy_from_slice(program);
            mem[RESET_VECTOR as usize] = origin as u8;
            mem[RESET_VECTOR as usize + 1] = (origin >> 8) as u8;
            mem[NMI_VECTOR as usize] = 0x00;
            mem[NMI_VECTOR as usize + 1] = 0x90;
            mem[IRQ_VECTOR as usize] = 0x00;
            mem[IRQ_VECTOR as usize + 1] = 0xA0;
            Self { mem }
        }
    }

    impl Bus for FlatBus {
        fn read(&mut self, addr: u16) -> u8 {
            self.mem[addr as usize]
        }

        fn write(&mut self, addr: u16, value: u8) {
            self.mem[addr as usize] = value;
        }
    }

    fn boot(origin: u16, program: &[u8]) -> (Cpu, FlatBus, InterruptRouter) {
        let mut bus = FlatBus::with_program(origin, program);
        let mut cpu = Cpu::new();
        let mut router = InterruptRouter::new();
        cpu.reset(&mut bus);
        while cpu.defer > 0 {
            cpu.clock(&mut bus, &mut router).unwrap();
        }
        (cpu, bus, router)
    }

    /// Clocks through one instruction and reports what it cost.
    fn run_instruction(cpu: &mut Cpu, bus: &mut FlatBus, router: &mut InterruptRouter) -> u32 {
        cpu.clock(bus, router).unwrap();
        let mut cycles = 1;
        while cpu.defer > 0 {
            cpu.clock(bus, router).unwrap();
            cycles += 1;
        }
        cycles
    }

    #[test]
    fn reset_waits_eight_cycles_before_fetching() {
        let mut bus = FlatBus::with_program(0x8000, &[0xE8]);
        let mut cpu = Cpu::new();
        let mut router = InterruptRouter::new();
        cpu.reset(&mut bus);
        assert_eq!(cpu.registers().sp, 0xFD);
        assert_eq!(cpu.registers().pc, 0x8000);
        for _ in 0..8 {
            cpu.clock(&mut bus, &mut router).unwrap();
        }
        assert_eq!(cpu.registers().x, 0);
        cpu.clock(&mut bus, &mut router).unwrap();
        assert_eq!(cpu.registers().x, 1);
        assert_eq!(cpu.registers().pc, 0x8001);
    }

    #[test]
    fn adc_sets_overflow_when_crossing_into_negative() {
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0xA9, 0x7F, 0x69, 0x01]);
        run_instruction(&mut cpu, &mut bus, &mut router);
        run_instruction(&mut cpu, &mut bus, &mut router);
        let regs = cpu.registers();
        assert_eq!(regs.a, 0x80);
        assert_ne!(regs.p & FLAG_OVERFLOW, 0);
        assert_ne!(regs.p & FLAG_NEGATIVE, 0);
        assert_eq!(regs.p & FLAG_CARRY, 0);
    }

    #[test]
    fn sbc_borrows_below_zero() {
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0x38, 0xA9, 0x00, 0xE9, 0x01]);
        for _ in 0..3 {
            run_instruction(&mut cpu, &mut bus, &mut router);
        }
        let regs = cpu.registers();
        assert_eq!(regs.a, 0xFF);
        assert_eq!(regs.p & FLAG_CARRY, 0);
        assert_ne!(regs.p & FLAG_NEGATIVE, 0);
        assert_eq!(regs.p & FLAG_OVERFLOW, 0);
    }

    #[test]
    fn branch_cost_depends_on_outcome_and_page() {
        // Not taken.
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0xA9, 0x01, 0xF0, 0x10]);
        run_instruction(&mut cpu, &mut bus, &mut router);
        assert_eq!(run_instruction(&mut cpu, &mut bus, &mut router), 2);
        assert_eq!(cpu.registers().pc, 0x8004);

        // Taken within the page.
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0xA9, 0x00, 0xF0, 0x10]);
        run_instruction(&mut cpu, &mut bus, &mut router);
        assert_eq!(run_instruction(&mut cpu, &mut bus, &mut router), 3);
        assert_eq!(cpu.registers().pc, 0x8014);

        // Taken across a page boundary.
        let (mut cpu, mut bus, mut router) = boot(0x80F0, &[0xA9, 0x00, 0xF0, 0x20]);
        run_instruction(&mut cpu, &mut bus, &mut router);
        assert_eq!(run_instruction(&mut cpu, &mut bus, &mut router), 4);
        assert_eq!(cpu.registers().pc, 0x8114);
    }

    #[test]
    fn indexed_read_pays_for_page_cross() {
        let (mut cpu, mut bus, mut router) =
            boot(0x8000, &[0xA2, 0x01, 0xBD, 0xFF, 0x80, 0xBD, 0x00, 0x80]);
        run_instruction(&mut cpu, &mut bus, &mut router);
        assert_eq!(run_instruction(&mut cpu, &mut bus, &mut router), 5);
        assert_eq!(run_instruction(&mut cpu, &mut bus, &mut router), 4);
    }

    #[test]
    fn illegal_opcode_faults_without_moving_pc() {
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0xEA, 0x02]);
        run_instruction(&mut cpu, &mut bus, &mut router);
        let err = cpu.clock(&mut bus, &mut router).unwrap_err();
        assert_eq!(
            err,
            NesError::IllegalInstruction {
                opcode: 0x02,
                pc: 0x8001
            }
        );
        assert_eq!(cpu.registers().pc, 0x8001);
        assert!(cpu.clock(&mut bus, &mut router).is_err());
    }

    #[test]
    fn indirect_jump_wraps_within_the_pointer_page() {
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0x6C, 0xFF, 0x10]);
        bus.mem[0x10FF] = 0x34;
        bus.mem[0x1000] = 0x12;
        bus.mem[0x1100] = 0x56;
        assert_eq!(run_instruction(&mut cpu, &mut bus, &mut router), 5);
        assert_eq!(cpu.registers().pc, 0x1234);
    }

    #[test]
    fn brk_pushes_return_address_and_break_flag() {
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0x00, 0xFF]);
        assert_eq!(run_instruction(&mut cpu, &mut bus, &mut router), 7);
        let regs = cpu.registers();
        assert_eq!(regs.pc, 0xA000);
        assert_eq!(regs.sp, 0xFA);
        assert_ne!(regs.p & FLAG_INTERRUPT, 0);
        assert_eq!(bus.mem[0x01FD], 0x80);
        assert_eq!(bus.mem[0x01FC], 0x02);
        assert_eq!(bus.mem[0x01FB], FLAG_BREAK | FLAG_UNUSED);
    }

    #[test]
    fn php_plp_round_trip_masks_break() {
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0x38, 0x08, 0x18, 0x28]);
        for _ in 0..2 {
            run_instruction(&mut cpu, &mut bus, &mut router);
        }
        assert_eq!(bus.mem[0x01FD], FLAG_CARRY | FLAG_BREAK | FLAG_UNUSED);
        run_instruction(&mut cpu, &mut bus, &mut router);
        run_instruction(&mut cpu, &mut bus, &mut router);
        assert_eq!(cpu.registers().p, FLAG_CARRY | FLAG_UNUSED);
    }

    #[test]
    fn masked_irq_is_dropped_but_nmi_is_taken() {
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0x78, 0xEA, 0xEA, 0xEA]);
        run_instruction(&mut cpu, &mut bus, &mut router);

        router.irq();
        run_instruction(&mut cpu, &mut bus, &mut router);
        assert_eq!(cpu.registers().sp, 0xFD);
        assert_eq!(cpu.irq_dropped(), 1);

        router.nmi();
        run_instruction(&mut cpu, &mut bus, &mut router);
        let regs = cpu.registers();
        assert_eq!(regs.pc, 0x9000);
        assert_eq!(regs.sp, 0xFA);
        assert_eq!(bus.mem[0x01FB] & FLAG_BREAK, 0);
        assert_eq!(cpu.nmi_serviced(), 1);
    }

    #[test]
    fn irq_enters_handler_when_unmasked() {
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0xEA]);
        router.irq();
        router.irq();
        assert_eq!(run_instruction(&mut cpu, &mut bus, &mut router), 7);
        assert_eq!(cpu.registers().pc, 0xA000);
        assert_eq!(cpu.irq_serviced(), 1);
        assert_eq!(cpu.irq_dropped(), 1);
    }

    #[test]
    fn dcp_decrements_then_compares() {
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0xA9, 0x0F, 0xC7, 0x40]);
        bus.mem[0x40] = 0x10;
        run_instruction(&mut cpu, &mut bus, &mut router);
        assert_eq!(run_instruction(&mut cpu, &mut bus, &mut router), 5);
        assert_eq!(bus.mem[0x40], 0x0F);
        let p = cpu.registers().p;
        assert_ne!(p & FLAG_ZERO, 0);
        assert_ne!(p & FLAG_CARRY, 0);
    }

    #[test]
    fn undocumented_nop_does_not_touch_memory() {
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0x0C, 0x00, 0x20]);
        assert_eq!(run_instruction(&mut cpu, &mut bus, &mut router), 4);
        assert_eq!(cpu.registers().pc, 0x8003);
    }

    #[test]
    fn jsr_rts_returns_past_the_call() {
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0x20, 0x10, 0x80]);
        bus.mem[0x8010] = 0x60;
        assert_eq!(run_instruction(&mut cpu, &mut bus, &mut router), 6);
        assert_eq!(cpu.registers().pc, 0x8010);
        assert_eq!(run_instruction(&mut cpu, &mut bus, &mut router), 6);
        assert_eq!(cpu.registers().pc, 0x8003);
    }

    #[test]
    fn suspend_freezes_execution() {
        let (mut cpu, mut bus, mut router) = boot(0x8000, &[0xE8]);
        cpu.suspend(3);
        for _ in 0..3 {
            cpu.clock(&mut bus, &mut router).unwrap();
        }
        assert_eq!(cpu.registers().x, 0);
        cpu.clock(&mut bus, &mut router).unwrap();
        assert_eq!(cpu.registers().x, 1);
    }
}
