//! Shared protocol types for the chat client, the HTTP gateway and the test runner.
//!
//! This crate defines the serializable message/envelope/test-run structures
//! and the strongly-typed error enums shared across the workspace. It has no
//! runtime dependencies so the browser client can use it too.

pub mod error;
pub mod message;
pub mod testrun;

/// Re-export of all protocol error types.
pub use error::*;
/// Re-export of chat message and envelope types.
pub use message::{AiEnvelope, AiReply, AiRequest, ChatMessage, ErrorBody, Role};
/// Re-export of test-run types.
pub use testrun::{
    AggregateReport, CommandResult, TestRunRequest, TestRunResponse, TestStep, TestSuite,
    TestTarget,
};
