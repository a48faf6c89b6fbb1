use thiserror::Error;

/// Fatal conditions surfaced by the emulation core.
///
/// Load-time variants reject construction outright. `IllegalInstruction`
/// stops a running session; the orchestrator keeps returning it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NesError {
    #[error("invalid ROM: {0}")]
    InvalidRom(String),
    #[error("unsupported ROM format: NES 2.0 headers are not handled")]
    UnsupportedFormat,
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u8),
    #[error("illegal instruction ${opcode:02X} at ${pc:04X}")]
    IllegalInstruction { opcode: u8, pc: u16 },
}

impl NesError {
    pub fn is_load_error(&self) -> bool {
        !matches!(self, Self::IllegalInstruction { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_instruction_message_carries_opcode_and_pc() {
        let err = NesError::IllegalInstruction {
            opcode: 0x02,
            pc: 0xC123,
        };
        assert_eq!(err.to_string(), "illegal instruction $02 at $C123");
        assert!(!err.is_load_error());
        assert!(NesError::UnsupportedMapper(9).is_load_error());
    }
}
