use serde::{Deserialize, Serialize};

use crate::cartridge::CartridgeHeader;
use crate::hardware::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ModelPreference {
    #[default]
    Auto,
    ForceDmg,
    ForceCgb,
}

impl ModelPreference {
    /// Pick the model for a cartridge: `Auto` honours the header's color flag.
    pub fn resolve(self, header: &CartridgeHeader) -> Model {
        match self {
            ModelPreference::ForceDmg => Model::Dmg,
            ModelPreference::ForceCgb => Model::Cgb,
            ModelPreference::Auto if header.cgb_supported() => Model::Cgb,
            ModelPreference::Auto => Model::Dmg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    pub model: ModelPreference,
    /// Wait for the pacing source between frames.
    pub frame_limit: bool,
    /// Pause the scheduler when the machine records a fault.
    pub break_on_fault: bool,
    /// Monochrome shades from lightest to darkest, RGB.
    pub shades: Option<[[u8; 3]; 4]>,
    /// Sample rate of the audio queues created by `GameBoy::connect_audio`.
    pub sample_rate: u32,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            model: ModelPreference::Auto,
            frame_limit: true,
            break_on_fault: false,
            shades: None,
            sample_rate: 44_100,
        }
    }
}
