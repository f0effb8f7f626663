//! Startup-time configuration errors.
//!
//! Everything else in the error taxonomy (bad client envelopes,
//! protocol-policy rejections, transient transport errors, logic-violation
//! requests) is handled inline where it happens — logged, dropped, or
//! turned into an `{type:"error", message}` envelope — and never becomes a
//! `Result` threaded through a room actor. This type exists only for the
//! one error surface that legitimately aborts the process: failing to read
//! a usable configuration before the listener binds.

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is set to {value:?}, which is not a valid port number")]
    InvalidPort { var: &'static str, value: String },
}
