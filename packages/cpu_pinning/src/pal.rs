//! Platform Abstraction Layer (PAL). Both backends compile on every platform because they only
//! talk to their binding traits; only the real bindings are specific to one operating system.

mod abstractions;
pub use abstractions::*;

mod group_based;
pub use group_based::*;

mod mask_based;
pub use mask_based::*;

#[cfg(test)]
pub(crate) mod fakes;

/// The backend used by [`Affinity::new()`][crate::Affinity::new] on the build target.
#[cfg(windows)]
pub type PlatformBackend = GroupBackend;

/// The backend used by [`Affinity::new()`][crate::Affinity::new] on the build target.
#[cfg(not(windows))]
pub type PlatformBackend = MaskBackend;

/// Creates the backend of the build target, connected to the real operating system.
#[cfg(windows)]
pub(crate) fn platform_backend() -> crate::Result<PlatformBackend> {
    GroupBackend::new()
}

/// Creates the backend of the build target, connected to the real operating system.
#[cfg(not(windows))]
#[allow(
    clippy::unnecessary_wraps,
    reason = "matches the Windows signature, where topology discovery can fail"
)]
pub(crate) fn platform_backend() -> crate::Result<PlatformBackend> {
    Ok(MaskBackend::new())
}
