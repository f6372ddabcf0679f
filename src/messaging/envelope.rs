//! The rendered, addressed message handed to a transport provider.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::Context;

/// Whether a delivery runs inline or on a task queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DeliveryMode {
    Immediate,
    Queued { queue: String },
}

/// A fully rendered message ready for transport
///
/// Built once per `deliver` call and shared behind an `Arc`; nothing mutates
/// it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub sender: String,
    pub receiver: String,
    pub subject: String,
    pub body_html: Option<String>,
    pub body_text: Option<String>,
    /// Message id of the message this one replies to
    pub in_reply_to: Option<String>,
    /// Thread references
    pub references: Option<String>,
    /// Context the bodies were rendered with
    pub context: Context,
    pub mode: DeliveryMode,
    pub created_at: Timestamp,
}

impl Envelope {
    pub fn is_queued(&self) -> bool {
        matches!(self.mode, DeliveryMode::Queued { .. })
    }
}
