use anyhow::{Context, Result};
use std::{fs, path::Path};

use super::mapper::Mirroring;
use crate::error::NesError;

pub const PRG_BANK_SIZE: usize = 16 * 1024;
pub const CHR_BANK_SIZE: usize = 8 * 1024;
pub const SRAM_SIZE: usize = 8 * 1024;
const HEADER_SIZE: usize = 16;
const TRAINER_SIZE: usize = 512;

/// Parsed iNES image plus the battery RAM the host handed in.
#[derive(Debug, Clone)]
pub struct Cartridge {
    pub mapper_id: u8,
    pub mirroring: Mirroring,
    pub four_screen: bool,
    pub has_battery: bool,
    pub trainer: Option<Vec<u8>>,
    pub prg_banks: u8,
    pub chr_banks: u8,
    pub prg_rom: Vec<u8>,
    pub chr_data: Vec<u8>,
    pub chr_is_ram: bool,
    pub sram: Vec<u8>,
}

impl Cartridge {
    pub fn from_file(path: &Path, sram: Option<&[u8]>) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("failed to read ROM: {}", path.display()))?;
        Self::from_bytes(&bytes, sram)
            .with_context(|| format!("failed to load ROM: {}", path.display()))
    }

    pub fn from_bytes(bytes: &[u8], sram: Option<&[u8]>) -> Result<Self, NesError> {
        if bytes.len() < HEADER_SIZE {
            return Err(NesError::InvalidRom(
                "image is too small to contain an iNES header".into(),
            ));
        }
        if &bytes[0..4] != b"NES\x1A" {
            return Err(NesError::InvalidRom(
                "invalid iNES header magic, expected NES<EOF>".into(),
            ));
        }

        let flags6 = bytes[6];
        let flags7 = bytes[7];
        if (flags7 & 0x0C) == 0x08 {
            return Err(NesError::UnsupportedFormat);
        }

        let mapper_id = (flags6 >> 4) | (flags7 & 0xF0);
        let four_screen = (flags6 & 0x08) != 0;
        let mirroring = if four_screen {
            Mirroring::FourScreen
        } else if (flags6 & 0x01) != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let has_battery = (flags6 & 0x02) != 0;
        let has_trainer = (flags6 & 0x04) != 0;

        let prg_banks = bytes[4];
        let chr_banks = bytes[5];
        if prg_banks == 0 {
            return Err(NesError::InvalidRom("header declares no PRG ROM".into()));
        }
        let prg_size = prg_banks as usize * PRG_BANK_SIZE;
        let chr_size = chr_banks as usize * CHR_BANK_SIZE;

        let mut cursor = HEADER_SIZE;
        let trainer = if has_trainer {
            let end = cursor + TRAINER_SIZE;
            let block = bytes
                .get(cursor..end)
                .ok_or_else(|| NesError::InvalidRom("trainer truncated".into()))?;
            cursor = end;
            Some(block.to_vec())
        } else {
            None
        };

        let prg_rom = bytes
            .get(cursor..cursor + prg_size)
            .ok_or_else(|| {
                NesError::InvalidRom(format!(
                    "PRG ROM truncated: expected {prg_size} bytes after offset {cursor}"
                ))
            })?
            .to_vec();
        cursor += prg_size;

        let (chr_data, chr_is_ram) = if chr_size == 0 {
            (vec![0; CHR_BANK_SIZE], true)
        } else {
            let chr = bytes.get(cursor..cursor + chr_size).ok_or_else(|| {
                NesError::InvalidRom(format!(
                    "CHR ROM truncated: expected {chr_size} bytes after offset {cursor}"
                ))
            })?;
            (chr.to_vec(), false)
        };

        let mut battery_ram = vec![0; SRAM_SIZE];
        if let Some(saved) = sram {
            let len = saved.len().min(SRAM_SIZE);
            battery_ram[..len].copy_from_slice(&saved[..len]);
        }

        tracing::debug!(
            mapper_id,
            prg_banks,
            chr_banks,
            ?mirroring,
            has_battery,
            "parsed iNES header"
        );

        Ok(Self {
            mapper_id,
            mirroring,
            four_screen,
            has_battery,
            trainer,
            prg_banks,
            chr_banks,
            prg_rom,
            chr_data,
            chr_is_ram,
            sram: battery_ram,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds an iNES image with the given flags and zero-filled payloads.
    pub(crate) fn ines_image(prg_banks: u8, chr_banks: u8, flags6: u8, flags7: u8) -> Vec<u8> {
        let mut rom = vec![0u8; HEADER_SIZE];
        rom[0..4].copy_from_slice(b"NES\x1A");
        rom[4] = prg_banks;
        rom[5] = chr_banks;
        rom[6] = flags6;
        rom[7] = flags7;
        if (flags6 & 0x04) != 0 {
            rom.extend(std::iter::repeat_n(0xEE, TRAINER_SIZE));
        }
        rom.extend(std::iter::repeat_n(0, prg_banks as usize * PRG_BANK_SIZE));
        rom.extend(std::iter::repeat_n(0, chr_banks as usize * CHR_BANK_SIZE));
        rom
    }

    #[test]
    fn parses_header_fields() {
        let rom = ines_image(2, 1, 0x13, 0x40);
        let cart = Cartridge::from_bytes(&rom, None).unwrap();
        assert_eq!(cart.mapper_id, 0x41);
        assert_eq!(cart.mirroring, Mirroring::Vertical);
        assert!(cart.has_battery);
        assert_eq!(cart.prg_rom.len(), 2 * PRG_BANK_SIZE);
        assert_eq!(cart.chr_data.len(), CHR_BANK_SIZE);
        assert!(!cart.chr_is_ram);
        assert!(cart.trainer.is_none());
    }

    #[test]
    fn skips_trainer_and_provides_chr_ram() {
        let mut rom = ines_image(1, 0, 0x04, 0);
        rom[HEADER_SIZE + TRAINER_SIZE] = 0xA9;
        let cart = Cartridge::from_bytes(&rom, None).unwrap();
        assert_eq!(cart.trainer.as_deref().map(<[u8]>::len), Some(TRAINER_SIZE));
        assert_eq!(cart.prg_rom[0], 0xA9);
        assert!(cart.chr_is_ram);
        assert_eq!(cart.chr_data.len(), CHR_BANK_SIZE);
    }

    #[test]
    fn four_screen_wins_over_mirroring_bit() {
        let rom = ines_image(1, 1, 0x09, 0);
        let cart = Cartridge::from_bytes(&rom, None).unwrap();
        assert_eq!(cart.mirroring, Mirroring::FourScreen);
        assert!(cart.four_screen);
    }

    #[test]
    fn rejects_bad_images() {
        assert!(matches!(
            Cartridge::from_bytes(b"NES", None),
            Err(NesError::InvalidRom(_))
        ));

        let mut bad_magic = ines_image(1, 1, 0, 0);
        bad_magic[3] = 0;
        assert!(matches!(
            Cartridge::from_bytes(&bad_magic, None),
            Err(NesError::InvalidRom(_))
        ));

        let nes2 = ines_image(1, 1, 0, 0x08);
        assert_eq!(
            Cartridge::from_bytes(&nes2, None).unwrap_err(),
            NesError::UnsupportedFormat
        );

        let mut truncated = ines_image(2, 1, 0, 0);
        truncated.truncate(HEADER_SIZE + PRG_BANK_SIZE);
        assert!(matches!(
            Cartridge::from_bytes(&truncated, None),
            Err(NesError::InvalidRom(_))
        ));
    }

    #[test]
    fn seeds_battery_ram_from_saved_bytes() {
        let rom = ines_image(1, 1, 0x02, 0);
        let saved = [0x11u8, 0x22, 0x33];
        let cart = Cartridge::from_bytes(&rom, Some(&saved)).unwrap();
        assert_eq!(cart.sram.len(), SRAM_SIZE);
        assert_eq!(&cart.sram[..3], &saved);
        assert_eq!(cart.sram[3], 0);
    }
}
