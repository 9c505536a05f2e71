/// Platform specific network code.
pub mod platform;

/// A network socket.
pub mod socket;

/// The platform specific socket type.
pub use platform::{PlatformImpl, SocketImpl};

/// Describe the host's addresses.
pub mod host;
