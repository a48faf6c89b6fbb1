pub mod config;
pub mod error;
pub mod nes;

pub use config::{NesConfig, NoiseMode};
pub use error::NesError;
pub use nes::Nes;
