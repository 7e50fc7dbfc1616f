//! Credential scopes for repository host handles
//!
//! A handle is tagged with the scope of the credential it carries. Functions
//! that must only ever see one kind of credential take
//! `&dyn RepositoryHost<CallerScope>` or `&dyn RepositoryHost<ServiceScope>`,
//! so passing the wrong handle is a type error.

mod sealed {
    pub trait Sealed {}
}

/// Marker for a credential scope
pub trait Scope: sealed::Sealed + Send + Sync + 'static {
    /// Short name used in logs
    const LABEL: &'static str;
}

/// The logged-in caller's own OAuth token. Read and verify only.
#[derive(Debug)]
pub enum CallerScope {}

/// The broker's service token. Secret listing and mutation only.
#[derive(Debug)]
pub enum ServiceScope {}

impl sealed::Sealed for CallerScope {}
impl sealed::Sealed for ServiceScope {}

impl Scope for CallerScope {
    const LABEL: &'static str = "caller";
}

impl Scope for ServiceScope {
    const LABEL: &'static str = "service";
}
