pub mod fade;

use crate::error::{PluginError, Result};
use crate::event::Settings;
use std::fmt;

pub use fade::{execute, PRE_ROLL, SETTLE};

/// Scene and item a key press fades to, read from one settings snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FadeTarget {
    pub scene: String,
    pub source: String,
}

impl FadeTarget {
    /// # Errors
    /// Returns `PluginError::MissingSetting` if `scene` or `source` is unset.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            scene: settings.scene().ok_or(PluginError::MissingSetting("scene"))?,
            source: settings
                .source()
                .ok_or(PluginError::MissingSetting("source"))?,
        })
    }
}

/// The mutating steps of a fade, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ShowInCurrent,
    ShowInTarget,
    SwitchScene,
    HideInOriginal,
    HideInTarget,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ShowInCurrent => "show item in current scene",
            Self::ShowInTarget => "show item in target scene",
            Self::SwitchScene => "switch scene",
            Self::HideInOriginal => "hide item in original scene",
            Self::HideInTarget => "hide item in target scene",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct StepReport {
    pub step: Step,
    pub result: Result<()>,
}

/// Per-step results of a fade that got past the lookups.
#[derive(Debug)]
pub struct FadeOutcome {
    pub target: FadeTarget,
    pub original_scene: String,
    /// Id of the faded item in the original scene.
    pub original_item: String,
    pub steps: Vec<StepReport>,
}

impl FadeOutcome {
    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(|s| s.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.result.is_err())
    }
}
