//! Shared diagnostics: uniform error strings + warning output.
//!
//! Validation errors are logged at error level and returned to the caller
//! so every `bail!` site both surfaces and records the message.

pub fn error_message(msg: impl Into<String>) -> String {
    let msg = msg.into();
    tracing::error!("{msg}");
    msg
}

pub fn warn(msg: impl AsRef<str>) {
    tracing::warn!("{}", msg.as_ref());
}
