use thiserror::Error;

/// Errors that can occur when working with owning pointers.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A weak reference was promoted to a strong one after the value it refers to had
    /// already been destroyed (or the weak reference never referred to a value).
    #[error("weak reference has expired: the value has already been destroyed")]
    Expired,
}

/// A specialized `Result` type for owning pointer operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug, std::error::Error);

    #[test]
    fn expired_has_message() {
        let result: Result<()> = Err(Error::Expired);

        let error = result.unwrap_err();
        assert_eq!(
            error.to_string(),
            "weak reference has expired: the value has already been destroyed"
        );
    }
}
