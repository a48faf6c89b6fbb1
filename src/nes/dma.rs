use super::bus::Bus;

pub const OAM_PAGE_SIZE: usize = 256;
const DMA_BASE_STALL: u32 = 513;

/// CPU cycles an OAM DMA started on `cpu_cycle` holds the CPU for: one
/// alignment cycle, one more on odd cycles, then 256 read/write pairs.
pub fn stall_cycles(cpu_cycle: u64) -> u32 {
    DMA_BASE_STALL + (cpu_cycle & 1) as u32
}

/// Reads `page << 8 ..= page << 8 | 0xFF` through the CPU bus.
pub fn read_page<B: Bus + ?Sized>(bus: &mut B, page: u8) -> [u8; OAM_PAGE_SIZE] {
    let base = u16::from(page) << 8;
    let mut bytes = [0u8; OAM_PAGE_SIZE];
    for (offset, slot) in bytes.iter_mut().enumerate() {
        *slot = bus.read(base.wrapping_add(offset as u16));
    }
    bytes
}

/// Bookkeeping for $4014 transfers. The copy itself happens on the bus; this
/// tracks the stall owed to the CPU.
#[derive(Debug, Clone, Default)]
pub struct OamDma {
    transfers: u64,
    total_stall_cycles: u64,
    pending_stall: u32,
    last_page: Option<u8>,
}

impl OamDma {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes a completed transfer and returns its stall length.
    pub fn record(&mut self, page: u8, cpu_cycle: u64) -> u32 {
        let stall = stall_cycles(cpu_cycle);
        self.transfers = self.transfers.wrapping_add(1);
        self.total_stall_cycles = self.total_stall_cycles.wrapping_add(u64::from(stall));
        self.pending_stall = self.pending_stall.saturating_add(stall);
        self.last_page = Some(page);
        tracing::trace!(page = format_args!("${page:02X}"), stall, "oam dma");
        stall
    }

    pub fn take_pending_stall(&mut self) -> u32 {
        std::mem::take(&mut self.pending_stall)
    }

    pub fn transfers(&self) -> u64 {
        self.transfers
    }

    pub fn total_stall_cycles(&self) -> u64 {
        self.total_stall_cycles
    }

    pub fn last_page(&self) -> Option<u8> {
        self.last_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting;

    impl Bus for Counting {
        fn read(&mut self, addr: u16) -> u8 {
            (addr as u8) ^ ((addr >> 8) as u8)
        }

        fn write(&mut self, _addr: u16, _value: u8) {}
    }

    #[test]
    fn stall_depends_on_cycle_parity() {
        assert_eq!(stall_cycles(10), 513);
        assert_eq!(stall_cycles(11), 514);
    }

    #[test]
    fn reads_the_whole_page() {
        let bytes = read_page(&mut Counting, 0x02);
        assert_eq!(bytes[0], 0x02);
        assert_eq!(bytes[0xFF], 0xFD);
    }

    #[test]
    fn records_accumulate_until_taken() {
        let mut dma = OamDma::new();
        assert_eq!(dma.record(0x02, 0), 513);
        assert_eq!(dma.record(0x03, 1), 514);
        assert_eq!(dma.transfers(), 2);
        assert_eq!(dma.total_stall_cycles(), 1027);
        assert_eq!(dma.last_page(), Some(0x03));
        assert_eq!(dma.take_pending_stall(), 1027);
        assert_eq!(dma.take_pending_stall(), 0);
    }
}
