//! Result type definition and extension traits.
//!
//! Provides combinators for logging failures at the edge where they are
//! reported, without unwrap/expect/panic.

use crate::error::Error;

/// The standard Result type for tendril operations.
///
/// All fallible operations in tendril return this type.
///
/// # Examples
///
/// ```ignore
/// fn render_twice(engine: &mut Engine<MemoryHost>) -> Result<()> {
///     engine.render(tree.clone(), mount)?;
///     engine.flush()?;
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait providing logging combinators for Results.
pub trait ResultExt<T> {
    /// Log the error (if any) at `warn` level with the given context,
    /// returning the Result unchanged.
    fn log_failure(self, context: &str) -> Self;

    /// Inspect the error without consuming the Result.
    fn inspect_error<F: FnOnce(&Error)>(self, f: F) -> Self;
}

impl<T> ResultExt<T> for Result<T> {
    fn log_failure(self, context: &str) -> Self {
        if let Err(ref e) = self {
            tracing::warn!(error = %e, "{context}");
        }
        self
    }

    fn inspect_error<F: FnOnce(&Error)>(self, f: F) -> Self {
        if let Err(ref e) = self {
            f(e);
        }
        self
    }
}
