//! Static 6502 decode table.
//!
//! Every one of the 256 opcode bytes maps to either a fully described
//! [`Opcode`] or `None`. `None` is the illegal marker: the CPU reports it as
//! a fault instead of guessing at a behaviour.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Pla,
    Plp,
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sta,
    Stx,
    Sty,
    Tax,
    Tay,
    Tsx,
    Txa,
    Txs,
    Tya,
    // Stable undocumented opcodes.
    Dcp,
    Isc,
    Lax,
    Rla,
    Rra,
    Sax,
    Slo,
    Sre,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Implicit,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
}

impl AddressingMode {
    /// Instruction length including the opcode byte.
    pub const fn len(self) -> u8 {
        match self {
            Self::Implicit | Self::Accumulator => 1,
            Self::Absolute | Self::AbsoluteX | Self::AbsoluteY | Self::Indirect => 3,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub instruction: Instruction,
    pub mode: AddressingMode,
    pub bytes: u8,
    pub cycles: u8,
    /// Extra cycles charged when the effective address crosses a page.
    pub page_cycles: u8,
}

const fn op(
    instruction: Instruction,
    mode: AddressingMode,
    bytes: u8,
    cycles: u8,
    page_cycles: u8,
) -> Option<Opcode> {
    Some(Opcode {
        instruction,
        mode,
        bytes,
        cycles,
        page_cycles,
    })
}

pub fn decode(opcode: u8) -> Option<Opcode> {
    OPCODE_TABLE[opcode as usize]
}

pub static OPCODE_TABLE: [Option<Opcode>; 256] = {
    use AddressingMode::*;
    use Instruction::*;
    let mut t: [Option<Opcode>; 256] = [None; 256];

    t[0x69] = op(Adc, Immediate, 2, 2, 0);
    t[0x65] = op(Adc, ZeroPage, 2, 3, 0);
    t[0x75] = op(Adc, ZeroPageX, 2, 4, 0);
    t[0x6D] = op(Adc, Absolute, 3, 4, 0);
    t[0x7D] = op(Adc, AbsoluteX, 3, 4, 1);
    t[0x79] = op(Adc, AbsoluteY, 3, 4, 1);
    t[0x61] = op(Adc, IndirectX, 2, 6, 0);
    t[0x71] = op(Adc, IndirectY, 2, 5, 1);

    t[0x29] = op(And, Immediate, 2, 2, 0);
    t[0x25] = op(And, ZeroPage, 2, 3, 0);
    t[0x35] = op(And, ZeroPageX, 2, 4, 0);
    t[0x2D] = op(And, Absolute, 3, 4, 0);
    t[0x3D] = op(And, AbsoluteX, 3, 4, 1);
    t[0x39] = op(And, AbsoluteY, 3, 4, 1);
    t[0x21] = op(And, IndirectX, 2, 6, 0);
    t[0x31] = op(And, IndirectY, 2, 5, 1);

    t[0x0A] = op(Asl, Accumulator, 1, 2, 0);
    t[0x06] = op(Asl, ZeroPage, 2, 5, 0);
    t[0x16] = op(Asl, ZeroPageX, 2, 6, 0);
    t[0x0E] = op(Asl, Absolute, 3, 6, 0);
    t[0x1E] = op(Asl, AbsoluteX, 3, 7, 0);

    t[0x90] = op(Bcc, Relative, 2, 2, 0);
    t[0xB0] = op(Bcs, Relative, 2, 2, 0);
    t[0xF0] = op(Beq, Relative, 2, 2, 0);
    t[0x30] = op(Bmi, Relative, 2, 2, 0);
    t[0xD0] = op(Bne, Relative, 2, 2, 0);
    t[0x10] = op(Bpl, Relative, 2, 2, 0);
    t[0x50] = op(Bvc, Relative, 2, 2, 0);
    t[0x70] = op(Bvs, Relative, 2, 2, 0);

    t[0x24] = op(Bit, ZeroPage, 2, 3, 0);
    t[0x2C] = op(Bit, Absolute, 3, 4, 0);

    // The byte after BRK is padding; Immediate consumes it.
    t[0x00] = op(Brk, Immediate, 2, 7, 0);

    t[0x18] = op(Clc, Implicit, 1, 2, 0);
    t[0xD8] = op(Cld, Implicit, 1, 2, 0);
    t[0x58] = op(Cli, Implicit, 1, 2, 0);
    t[0xB8] = op(Clv, Implicit, 1, 2, 0);

    t[0xC9] = op(Cmp, Immediate, 2, 2, 0);
    t[0xC5] = op(Cmp, ZeroPage, 2, 3, 0);
    t[0xD5] = op(Cmp, ZeroPageX, 2, 4, 0);
    t[0xCD] = op(Cmp, Absolute, 3, 4, 0);
    t[0xDD] = op(Cmp, AbsoluteX, 3, 4, 1);
    t[0xD9] = op(Cmp, AbsoluteY, 3, 4, 1);
    t[0xC1] = op(Cmp, IndirectX, 2, 6, 0);
    t[0xD1] = op(Cmp, IndirectY, 2, 5, 1);

    t[0xE0] = op(Cpx, Immediate, 2, 2, 0);
    t[0xE4] = op(Cpx, ZeroPage, 2, 3, 0);
    t[0xEC] = op(Cpx, Absolute, 3, 4, 0);
    t[0xC0] = op(Cpy, Immediate, 2, 2, 0);
    t[0xC4] = op(Cpy, ZeroPage, 2, 3, 0);
    t[0xCC] = op(Cpy, Absolute, 3, 4, 0);

    t[0xC6] = op(Dec, ZeroPage, 2, 5, 0);
    t[0xD6] = op(Dec, ZeroPageX, 2, 6, 0);
    t[0xCE] = op(Dec, Absolute, 3, 6, 0);
    t[0xDE] = op(Dec, AbsoluteX, 3, 7, 0);
    t[0xCA] = op(Dex, Implicit, 1, 2, 0);
    t[0x88] = op(Dey, Implicit, 1, 2, 0);

    t[0x49] = op(Eor, Immediate, 2, 2, 0);
    t[0x45] = op(Eor, ZeroPage, 2, 3, 0);
    t[0x55] = op(Eor, ZeroPageX, 2, 4, 0);
    t[0x4D] = op(Eor, Absolute, 3, 4, 0);
    t[0x5D] = op(Eor, AbsoluteX, 3, 4, 1);
    t[0x59] = op(Eor, AbsoluteY, 3, 4, 1);
    t[0x41] = op(Eor, IndirectX, 2, 6, 0);
    t[0x51] = op(Eor, IndirectY, 2, 5, 1);

    t[0xE6] = op(Inc, ZeroPage, 2, 5, 0);
    t[0xF6] = op(Inc, ZeroPageX, 2, 6, 0);
    t[0xEE] = op(Inc, Absolute, 3, 6, 0);
    t[0xFE] = op(Inc, AbsoluteX, 3, 7, 0);
    t[0xE8] = op(Inx, Implicit, 1, 2, 0);
    t[0xC8] = op(Iny, Implicit, 1, 2, 0);

    t[0x4C] = op(Jmp, Absolute, 3, 3, 0);
    t[0x6C] = op(Jmp, Indirect, 3, 5, 0);
    t[0x20] = op(Jsr, Absolute, 3, 6, 0);

    t[0xA9] = op(Lda, Immediate, 2, 2, 0);
    t[0xA5] = op(Lda, ZeroPage, 2, 3, 0);
    t[0xB5] = op(Lda, ZeroPageX, 2, 4, 0);
    t[0xAD] = op(Lda, Absolute, 3, 4, 0);
    t[0xBD] = op(Lda, AbsoluteX, 3, 4, 1);
    t[0xB9] = op(Lda, AbsoluteY, 3, 4, 1);
    t[0xA1] = op(Lda, IndirectX, 2, 6, 0);
    t[0xB1] = op(Lda, IndirectY, 2, 5, 1);

    t[0xA2] = op(Ldx, Immediate, 2, 2, 0);
    t[0xA6] = op(Ldx, ZeroPage, 2, 3, 0);
    t[0xB6] = op(Ldx, ZeroPageY, 2, 4, 0);
    t[0xAE] = op(Ldx, Absolute, 3, 4, 0);
    t[0xBE] = op(Ldx, AbsoluteY, 3, 4, 1);

    t[0xA0] = op(Ldy, Immediate, 2, 2, 0);
    t[0xA4] = op(Ldy, ZeroPage, 2, 3, 0);
    t[0xB4] = op(Ldy, ZeroPageX, 2, 4, 0);
    t[0xAC] = op(Ldy, Absolute, 3, 4, 0);
    t[0xBC] = op(Ldy, AbsoluteX, 3, 4, 1);

    t[0x4A] = op(Lsr, Accumulator, 1, 2, 0);
    t[0x46] = op(Lsr, ZeroPage, 2, 5, 0);
    t[0x56] = op(Lsr, ZeroPageX, 2, 6, 0);
    t[0x4E] = op(Lsr, Absolute, 3, 6, 0);
    t[0x5E] = op(Lsr, AbsoluteX, 3, 7, 0);

    t[0xEA] = op(Nop, Implicit, 1, 2, 0);

    t[0x09] = op(Ora, Immediate, 2, 2, 0);
    t[0x05] = op(Ora, ZeroPage, 2, 3, 0);
    t[0x15] = op(Ora, ZeroPageX, 2, 4, 0);
    t[0x0D] = op(Ora, Absolute, 3, 4, 0);
    t[0x1D] = op(Ora, AbsoluteX, 3, 4, 1);
    t[0x19] = op(Ora, AbsoluteY, 3, 4, 1);
    t[0x01] = op(Ora, IndirectX, 2, 6, 0);
    t[0x11] = op(Ora, IndirectY, 2, 5, 1);

    t[0x48] = op(Pha, Implicit, 1, 3, 0);
    t[0x08] = op(Php, Implicit, 1, 3, 0);
    t[0x68] = op(Pla, Implicit, 1, 4, 0);
    t[0x28] = op(Plp, Implicit, 1, 4, 0);

    t[0x2A] = op(Rol, Accumulator, 1, 2, 0);
    t[0x26] = op(Rol, ZeroPage, 2, 5, 0);
    t[0x36] = op(Rol, ZeroPageX, 2, 6, 0);
    t[0x2E] = op(Rol, Absolute, 3, 6, 0);
    t[0x3E] = op(Rol, AbsoluteX, 3, 7, 0);

    t[0x6A] = op(Ror, Accumulator, 1, 2, 0);
    t[0x66] = op(Ror, ZeroPage, 2, 5, 0);
    t[0x76] = op(Ror, ZeroPageX, 2, 6, 0);
    t[0x6E] = op(Ror, Absolute, 3, 6, 0);
    t[0x7E] = op(Ror, AbsoluteX, 3, 7, 0);

    t[0x40] = op(Rti, Implicit, 1, 6, 0);
    t[0x60] = op(Rts, Implicit, 1, 6, 0);

    t[0xE9] = op(Sbc, Immediate, 2, 2, 0);
    t[0xEB] = op(Sbc, Immediate, 2, 2, 0);
    t[0xE5] = op(Sbc, ZeroPage, 2, 3, 0);
    t[0xF5] = op(Sbc, ZeroPageX, 2, 4, 0);
    t[0xED] = op(Sbc, Absolute, 3, 4, 0);
    t[0xFD] = op(Sbc, AbsoluteX, 3, 4, 1);
    t[0xF9] = op(Sbc, AbsoluteY, 3, 4, 1);
    t[0xE1] = op(Sbc, IndirectX, 2, 6, 0);
    t[0xF1] = op(Sbc, IndirectY, 2, 5, 1);

    t[0x38] = op(Sec, Implicit, 1, 2, 0);
    t[0xF8] = op(Sed, Implicit, 1, 2, 0);
    t[0x78] = op(Sei, Implicit, 1, 2, 0);

    t[0x85] = op(Sta, ZeroPage, 2, 3, 0);
    t[0x95] = op(Sta, ZeroPageX, 2, 4, 0);
    t[0x8D] = op(Sta, Absolute, 3, 4, 0);
    t[0x9D] = op(Sta, AbsoluteX, 3, 5, 0);
    t[0x99] = op(Sta, AbsoluteY, 3, 5, 0);
    t[0x81] = op(Sta, IndirectX, 2, 6, 0);
    t[0x91] = op(Sta, IndirectY, 2, 6, 0);

    t[0x86] = op(Stx, ZeroPage, 2, 3, 0);
    t[0x96] = op(Stx, ZeroPageY, 2, 4, 0);
    t[0x8E] = op(Stx, Absolute, 3, 4, 0);
    t[0x84] = op(Sty, ZeroPage, 2, 3, 0);
    t[0x94] = op(Sty, ZeroPageX, 2, 4, 0);
    t[0x8C] = op(Sty, Absolute, 3, 4, 0);

    t[0xAA] = op(Tax, Implicit, 1, 2, 0);
    t[0xA8] = op(Tay, Implicit, 1, 2, 0);
    t[0xBA] = op(Tsx, Implicit, 1, 2, 0);
    t[0x8A] = op(Txa, Implicit, 1, 2, 0);
    t[0x9A] = op(Txs, Implicit, 1, 2, 0);
    t[0x98] = op(Tya, Implicit, 1, 2, 0);

    // Undocumented NOPs: they decode their operand but touch nothing.
    t[0x04] = op(Nop, ZeroPage, 2, 3, 0);
    t[0x44] = op(Nop, ZeroPage, 2, 3, 0);
    t[0x64] = op(Nop, ZeroPage, 2, 3, 0);
    t[0x0C] = op(Nop, Absolute, 3, 4, 0);
    t[0x14] = op(Nop, ZeroPageX, 2, 4, 0);
    t[0x34] = op(Nop, ZeroPageX, 2, 4, 0);
    t[0x54] = op(Nop, ZeroPageX, 2, 4, 0);
    t[0x74] = op(Nop, ZeroPageX, 2, 4, 0);
    t[0xD4] = op(Nop, ZeroPageX, 2, 4, 0);
    t[0xF4] = op(Nop, ZeroPageX, 2, 4, 0);
    t[0x1A] = op(Nop, Implicit, 1, 2, 0);
    t[0x3A] = op(Nop, Implicit, 1, 2, 0);
    t[0x5A] = op(Nop, Implicit, 1, 2, 0);
    t[0x7A] = op(Nop, Implicit, 1, 2, 0);
    t[0xDA] = op(Nop, Implicit, 1, 2, 0);
    t[0xFA] = op(Nop, Implicit, 1, 2, 0);
    t[0x1C] = op(Nop, AbsoluteX, 3, 4, 1);
    t[0x3C] = op(Nop, AbsoluteX, 3, 4, 1);
    t[0x5C] = op(Nop, AbsoluteX, 3, 4, 1);
    t[0x7C] = op(Nop, AbsoluteX, 3, 4, 1);
    t[0xDC] = op(Nop, AbsoluteX, 3, 4, 1);
    t[0xFC] = op(Nop, AbsoluteX, 3, 4, 1);
    t[0x80] = op(Nop, Immediate, 2, 2, 0);
    t[0x82] = op(Nop, Immediate, 2, 2, 0);

    t[0x03] = op(Slo, IndirectX, 2, 8, 0);
    t[0x07] = op(Slo, ZeroPage, 2, 5, 0);
    t[0x0F] = op(Slo, Absolute, 3, 6, 0);
    t[0x13] = op(Slo, IndirectY, 2, 8, 0);
    t[0x17] = op(Slo, ZeroPageX, 2, 6, 0);
    t[0x1B] = op(Slo, AbsoluteY, 3, 7, 0);
    t[0x1F] = op(Slo, AbsoluteX, 3, 7, 0);

    t[0x23] = op(Rla, IndirectX, 2, 8, 0);
    t[0x27] = op(Rla, ZeroPage, 2, 5, 0);
    t[0x2F] = op(Rla, Absolute, 3, 6, 0);
    t[0x33] = op(Rla, IndirectY, 2, 8, 0);
    t[0x37] = op(Rla, ZeroPageX, 2, 6, 0);
    t[0x3B] = op(Rla, AbsoluteY, 3, 7, 0);
    t[0x3F] = op(Rla, AbsoluteX, 3, 7, 0);

    t[0x43] = op(Sre, IndirectX, 2, 8, 0);
    t[0x47] = op(Sre, ZeroPage, 2, 5, 0);
    t[0x4F] = op(Sre, Absolute, 3, 6, 0);
    t[0x53] = op(Sre, IndirectY, 2, 8, 0);
    t[0x57] = op(Sre, ZeroPageX, 2, 6, 0);
    t[0x5B] = op(Sre, AbsoluteY, 3, 7, 0);
    t[0x5F] = op(Sre, AbsoluteX, 3, 7, 0);

    t[0x63] = op(Rra, IndirectX, 2, 8, 0);
    t[0x67] = op(Rra, ZeroPage, 2, 5, 0);
    t[0x6F] = op(Rra, Absolute, 3, 6, 0);
    t[0x73] = op(Rra, IndirectY, 2, 8, 0);
    t[0x77] = op(Rra, ZeroPageX, 2, 6, 0);
    t[0x7B] = op(Rra, AbsoluteY, 3, 7, 0);
    t[0x7F] = op(Rra, AbsoluteX, 3, 7, 0);

    t[0xC3] = op(Dcp, IndirectX, 2, 8, 0);
    t[0xC7] = op(Dcp, ZeroPage, 2, 5, 0);
    t[0xCF] = op(Dcp, Absolute, 3, 6, 0);
    t[0xD3] = op(Dcp, IndirectY, 2, 8, 0);
    t[0xD7] = op(Dcp, ZeroPageX, 2, 6, 0);
    t[0xDB] = op(Dcp, AbsoluteY, 3, 7, 0);
    t[0xDF] = op(Dcp, AbsoluteX, 3, 7, 0);

    t[0xE3] = op(Isc, IndirectX, 2, 8, 0);
    t[0xE7] = op(Isc, ZeroPage, 2, 5, 0);
    t[0xEF] = op(Isc, Absolute, 3, 6, 0);
    t[0xF3] = op(Isc, IndirectY, 2, 8, 0);
    t[0xF7] = op(Isc, ZeroPageX, 2, 6, 0);
    t[0xFB] = op(Isc, AbsoluteY, 3, 7, 0);
    t[0xFF] = op(Isc, AbsoluteX, 3, 7, 0);

    t[0x83] = op(Sax, IndirectX, 2, 6, 0);
    t[0x87] = op(Sax, ZeroPage, 2, 3, 0);
    t[0x8F] = op(Sax, Absolute, 3, 4, 0);
    t[0x97] = op(Sax, ZeroPageY, 2, 4, 0);

    t[0xA3] = op(Lax, IndirectX, 2, 6, 0);
    t[0xA7] = op(Lax, ZeroPage, 2, 3, 0);
    t[0xAF] = op(Lax, Absolute, 3, 4, 0);
    t[0xB3] = op(Lax, IndirectY, 2, 5, 1);
    t[0xB7] = op(Lax, ZeroPageY, 2, 4, 0);
    t[0xBF] = op(Lax, AbsoluteY, 3, 4, 1);

    t
};
