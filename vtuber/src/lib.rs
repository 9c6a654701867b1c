pub mod attachment;
pub mod config;
pub mod consumer;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod motion;
pub mod speech;
pub mod transcript;
pub mod validation;

pub use attachment::{Attachment, AttachmentRef, Composer};
pub use config::AppConfig;
pub use consumer::{StreamConsumer, TurnSummary};
pub use controller::{ControllerState, ConversationController, SendOutcome, TurnHandle, TurnOutcome};
pub use error::AppError;
pub use metrics::{MetricsSnapshot, TurnMetrics};
pub use motion::{forward_speaking, LoggingActuator, Motion, MotionActuator};
pub use transcript::{Message, MessageStatus, Role, TranscriptEvent, TranscriptStore};
pub use validation::InputRejection;
