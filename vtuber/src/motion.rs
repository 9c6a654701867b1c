//! Motion cues for the character renderer.
//!
//! The renderer is an external collaborator. It receives discrete motion
//! commands and an audio-active flag; nothing comes back.

use std::{fmt, str::FromStr, sync::Arc};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Motion {
    /// Acknowledge a question.
    TapBody1,
    /// Wave hello.
    TapBody3,
    SpecialHeart,
    SpecialRabbitMagic,
}

impl Motion {
    pub const ALL: [Motion; 4] = [
        Motion::TapBody1,
        Motion::TapBody3,
        Motion::SpecialHeart,
        Motion::SpecialRabbitMagic,
    ];

    /// Identifier understood by the renderer.
    pub fn key(self) -> &'static str {
        match self {
            Motion::TapBody1 => "TAP_BODY_1",
            Motion::TapBody3 => "TAP_BODY_3",
            Motion::SpecialHeart => "SPECIAL_HEART",
            Motion::SpecialRabbitMagic => "SPECIAL_RABBIT_MAGIC",
        }
    }
}

impl fmt::Display for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Motion {
    type Err = AppError;

    /// Accepts renderer keys (`SPECIAL_HEART`) and short names (`heart`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        let motion = match wanted.as_str() {
            "ACK" => Motion::TapBody1,
            "GREET" | "WAVE" => Motion::TapBody3,
            "HEART" => Motion::SpecialHeart,
            "MAGIC" | "RABBIT" => Motion::SpecialRabbitMagic,
            key => Motion::ALL
                .into_iter()
                .find(|m| m.key() == key)
                .ok_or_else(|| AppError::UnknownMotion(s.to_string()))?,
        };
        Ok(motion)
    }
}

/// Adapter to the character renderer.
pub trait MotionActuator: Send + Sync {
    fn play(&self, motion: Motion);

    fn set_audio_active(&self, active: bool);
}

/// Actuator that only logs, for running without a renderer.
#[derive(Debug, Default)]
pub struct LoggingActuator;

impl MotionActuator for LoggingActuator {
    fn play(&self, motion: Motion) {
        info!(target: "motion", "play {}", motion);
    }

    fn set_audio_active(&self, active: bool) {
        debug!(target: "motion", "audio active: {}", active);
    }
}

/// Mirror the speaking flag onto the actuator until the flag's sender is
/// dropped.
pub fn forward_speaking(mut speaking: watch::Receiver<bool>, actuator: Arc<dyn MotionActuator>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let initial = *speaking.borrow_and_update();
        actuator.set_audio_active(initial);
        while speaking.changed().await.is_ok() {
            let active = *speaking.borrow_and_update();
            actuator.set_audio_active(active);
        }
    })
}
