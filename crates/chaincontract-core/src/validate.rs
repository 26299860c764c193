//! First-present-value resolution for required transaction fields.

/// Return the first present candidate, or `failure` when every candidate is absent.
///
/// Candidates are probed in order, so callers list the most specific source
/// first (call-site override, then stored default).
///
/// ```
/// use chaincontract_core::{validate::resolve, SessionError};
///
/// let stored = Some("0x6080");
/// let bytecode = resolve([None, stored], SessionError::MissingBinary).unwrap();
/// assert_eq!(bytecode, "0x6080");
/// ```
pub fn resolve<T, E>(candidates: impl IntoIterator<Item = Option<T>>, failure: E) -> Result<T, E> {
    candidates.into_iter().flatten().next().ok_or(failure)
}
