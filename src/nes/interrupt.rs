/// Collects interrupt requests raised by the PPU, mapper and APU.
///
/// Sources call `nmi()` / `irq()` directly; the CPU drains the router at the
/// start of its next clock. Every request is counted, nothing is merged.
#[derive(Debug, Clone, Default)]
pub struct InterruptRouter {
    nmi_requests: u32,
    irq_requests: u32,
}

impl InterruptRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nmi(&mut self) {
        self.nmi_requests = self.nmi_requests.wrapping_add(1);
    }

    pub fn irq(&mut self) {
        self.irq_requests = self.irq_requests.wrapping_add(1);
    }

    pub fn take_nmi(&mut self) -> u32 {
        std::mem::take(&mut self.nmi_requests)
    }

    pub fn take_irq(&mut self) -> u32 {
        std::mem::take(&mut self.irq_requests)
    }

    pub fn has_pending(&self) -> bool {
        self.nmi_requests > 0 || self.irq_requests > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_accumulate_until_taken() {
        let mut router = InterruptRouter::new();
        router.irq();
        router.irq();
        router.nmi();
        assert!(router.has_pending());
        assert_eq!(router.take_irq(), 2);
        assert_eq!(router.take_nmi(), 1);
        assert_eq!(router.take_irq(), 0);
        assert!(!router.has_pending());
    }
}
