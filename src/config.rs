use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// How the noise channel turns its volume level into an output sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseMode {
    /// `floor(rng * level)` per timer step, drawn from a seeded generator.
    #[default]
    Random,
    /// 15-bit feedback shift register; level is output while bit 0 is clear.
    Lfsr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NesConfig {
    pub sample_rate: u32,
    pub noise_mode: NoiseMode,
    pub noise_seed: u64,
    /// Suspend the CPU for the OAM DMA and DMC fetch stall cycles.
    pub enforce_dma_stall: bool,
}

impl Default for NesConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            noise_mode: NoiseMode::default(),
            noise_seed: 0x4E45_531A,
            enforce_dma_stall: false,
        }
    }
}

impl NesConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(text).context("failed to parse emulator config")?;
        Ok(cfg.sanitized())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// The sample divider is `1789773 / sample_rate`, so the rate must stay
    /// well below the CPU clock.
    pub fn sanitized(mut self) -> Self {
        self.sample_rate = self.sample_rate.clamp(8_000, 192_000);
        self
    }
}
