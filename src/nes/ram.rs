/// Flat byte block addressed relative to `offset`.
///
/// Out-of-range accesses wrap inside the block, so mirrored windows can hand
/// over raw bus addresses after subtracting nothing but the base.
#[derive(Debug, Clone)]
pub struct Ram {
    data: Vec<u8>,
    offset: u16,
}

impl Ram {
    pub fn new(size: usize, offset: u16) -> Self {
        Self::filled(size, offset, 0)
    }

    pub fn filled(size: usize, offset: u16, value: u8) -> Self {
        Self {
            data: vec![value; size.max(1)],
            offset,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.data[self.index(addr)]
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        let idx = self.index(addr);
        self.data[idx] = value;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn index(&self, addr: u16) -> usize {
        (addr.wrapping_sub(self.offset) as usize) % self.data.len()
    }
}
