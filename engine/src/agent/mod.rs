//! Conversation Agent
//!
//! Turns free-form utterances into structured intents and drives the session
//! state machine: origin onboarding, slot clarification, planning, ranking
//! and feedback.

pub mod context;
pub mod intent;
pub mod onboarding;
pub mod orchestrator;
pub mod slots;

pub use context::{ConversationContext, Turn};
pub use intent::{FeedbackPolarity, IntentKind, IntentParser, StructuredIntent};
pub use onboarding::{validate_origin, OnboardingOutcome, ONBOARDING_PROMPT};
pub use orchestrator::{Orchestrator, SessionState, TurnResponse};
pub use slots::Slot;
