//! # Gateway Client
//!
//! Typed calls against the gateway surface plus the supersession controller
//! that keeps only the latest search and chat result.

mod api;
pub mod supersession;
pub mod types;

pub use api::GatewayClient;
pub use supersession::{InFlightSlot, Outcome, Slot, SupersessionController, Ticket};
pub use types::{
    ChatCitation, ChatRequest, ChatResponse, EvalResult, LabelAssistRequest, LabelAssistResponse,
    LabelCandidate, SearchFilters, SearchHit, SearchRequest, SearchResponse,
};
