use super::BUTTON_A;

/// Standard pad shift register as seen through $4016/$4017.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    buttons: u8,
    offset: u8,
    strobe: bool,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_buttons(&mut self, mask: u8) {
        self.buttons = mask;
    }

    pub fn buttons(&self) -> u8 {
        self.buttons
    }

    pub fn write(&mut self, value: u8) {
        if (value & 0x01) != 0 {
            self.strobe = true;
        } else {
            self.offset = 0;
            self.strobe = false;
        }
    }

    /// Next button bit, A first. Reports 1 once all eight have been shifted out.
    pub fn read(&mut self) -> u8 {
        if self.strobe {
            return u8::from((self.buttons & BUTTON_A) != 0);
        }
        if self.offset >= 8 {
            return 1;
        }
        let bit = (self.buttons >> (7 - self.offset)) & 0x01;
        self.offset += 1;
        bit
    }
}
