//! Scoped raw network privilege.
//!
//! Opening a raw `ICMP` socket requires `CAP_NET_RAW` on Linux (or root
//! elsewhere). The daemon clears the privilege at startup and only raises it
//! for the short window in which a raw socket is being created:
//!
//! - [`PrivilegeManager::acquire`] raises `CAP_NET_RAW` into the effective set if it is in the
//!   permitted set and returns a [`Grant`]
//! - [`Grant::release`] (or dropping the grant) lowers it again, exactly once
//! - [`PrivilegeManager::drop_privileges`] clears the effective set
//! - [`executable_file_caps`] reads the capabilities granted to the running
//!   executable by `setcap`
//!
//! On Unix platforms other than Linux the effective user being root is
//! treated as holding the privilege and raising or lowering it is a no-op.
//!
//! Only one grant may be live in the process at a time, a second
//! [`PrivilegeManager::acquire`] blocks until the first grant is released.
//!
//! # Examples
//!
//! ```rust
//! # fn main() -> anyhow::Result<()> {
//! use internetz_privilege::PrivilegeManager;
//!
//! let privilege = PrivilegeManager::system();
//! let grant = privilege.acquire();
//! if grant.is_acquired() {
//!     println!("CAP_NET_RAW is effective, a raw socket can be opened");
//! }
//! grant.release()?;
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

use parking_lot::{const_mutex, Mutex, MutexGuard};
use std::fmt::{Debug, Formatter};
use tracing::{debug, error, warn};

/// A privilege error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A privilege error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[cfg(target_os = "linux")]
    #[error("caps error: {0}")]
    CapsError(#[from] caps::errors::CapsError),
    #[error("CAP_NET_RAW still effective after lowering")]
    StillEffective,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid security.capability attribute: {0}")]
    InvalidFileCaps(&'static str),
}

mod file;

pub use file::{executable_file_caps, FileCaps};

/// Serialises privileged windows across the process.
static PRIVILEGE_LOCK: Mutex<()> = const_mutex(());

/// Inspect and mutate the raw network privilege of the current process.
#[cfg_attr(test, mockall::automock)]
pub trait Capabilities {
    /// Is the privilege in the effective set?
    fn is_effective(&self) -> Result<bool>;

    /// Is the privilege in the permitted set?
    fn is_permitted(&self) -> Result<bool>;

    /// Raise the privilege into the effective set.
    fn raise(&self) -> Result<()>;

    /// Remove the privilege from the effective set.
    fn lower(&self) -> Result<()>;

    /// Clear the whole effective set.
    fn clear(&self) -> Result<()> {
        self.lower()
    }
}

/// The `CAP_NET_RAW` capability of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetRaw;

#[cfg(target_os = "linux")]
impl Capabilities for NetRaw {
    fn is_effective(&self) -> Result<bool> {
        Ok(caps::has_cap(
            None,
            caps::CapSet::Effective,
            caps::Capability::CAP_NET_RAW,
        )?)
    }

    fn is_permitted(&self) -> Result<bool> {
        Ok(caps::has_cap(
            None,
            caps::CapSet::Permitted,
            caps::Capability::CAP_NET_RAW,
        )?)
    }

    fn raise(&self) -> Result<()> {
        caps::raise(None, caps::CapSet::Effective, caps::Capability::CAP_NET_RAW)?;
        Ok(())
    }

    fn lower(&self) -> Result<()> {
        caps::drop(None, caps::CapSet::Effective, caps::Capability::CAP_NET_RAW)?;
        if self.is_effective()? {
            Err(Error::StillEffective)
        } else {
            Ok(())
        }
    }

    fn clear(&self) -> Result<()> {
        caps::clear(None, caps::CapSet::Effective)?;
        Ok(())
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
impl Capabilities for NetRaw {
    fn is_effective(&self) -> Result<bool> {
        Ok(nix::unistd::Uid::effective().is_root())
    }

    fn is_permitted(&self) -> Result<bool> {
        self.is_effective()
    }

    fn raise(&self) -> Result<()> {
        Ok(())
    }

    fn lower(&self) -> Result<()> {
        Ok(())
    }
}

/// A snapshot of the privilege state, for diagnostics.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PrivilegeState {
    pub effective: bool,
    pub permitted: bool,
}

/// Acquires and releases the raw network privilege.
#[derive(Debug, Clone, Default)]
pub struct PrivilegeManager<C = NetRaw> {
    capabilities: C,
}

impl PrivilegeManager<NetRaw> {
    /// A manager for the `CAP_NET_RAW` capability of this process.
    #[must_use]
    pub const fn system() -> Self {
        Self {
            capabilities: NetRaw,
        }
    }
}

impl<C: Capabilities> PrivilegeManager<C> {
    #[must_use]
    pub const fn new(capabilities: C) -> Self {
        Self { capabilities }
    }

    /// Current effective and permitted state.
    pub fn state(&self) -> Result<PrivilegeState> {
        Ok(PrivilegeState {
            effective: self.capabilities.is_effective()?,
            permitted: self.capabilities.is_permitted()?,
        })
    }

    /// Raise the privilege for the lifetime of the returned [`Grant`].
    ///
    /// Never fails: if the privilege could not be made effective the grant
    /// reports [`Grant::is_acquired`] as `false`. The grant must still be
    /// released (or dropped), which lowers the privilege unconditionally.
    pub fn acquire(&self) -> Grant<'_, C> {
        let lock = PRIVILEGE_LOCK.lock();
        self.log_state("before acquire");
        let acquired = match self.raise_if_permitted() {
            Ok(acquired) => acquired,
            Err(err) => {
                warn!(error = %err, "failed to raise CAP_NET_RAW");
                false
            }
        };
        self.log_state("after acquire");
        debug!(acquired, "raw network privilege grant created");
        Grant {
            capabilities: &self.capabilities,
            acquired,
            pending: true,
            _lock: lock,
        }
    }

    /// Clear the effective set so the privilege is only held inside a [`Grant`].
    pub fn drop_privileges(&self) -> Result<()> {
        let _lock = PRIVILEGE_LOCK.lock();
        self.capabilities.clear()
    }

    fn raise_if_permitted(&self) -> Result<bool> {
        if self.capabilities.is_effective()? {
            return Ok(true);
        }
        if !self.capabilities.is_permitted()? {
            return Ok(false);
        }
        self.capabilities.raise()?;
        self.capabilities.is_effective()
    }

    fn log_state(&self, when: &'static str) {
        match self.state() {
            Ok(PrivilegeState {
                effective,
                permitted,
            }) => debug!(when, effective, permitted, "CAP_NET_RAW state"),
            Err(err) => debug!(when, error = %err, "CAP_NET_RAW state unavailable"),
        }
    }
}

/// A scoped raw network privilege.
///
/// The privilege is lowered exactly once, by [`Grant::release`] or on drop.
/// The process-wide privilege lock is held until then.
#[must_use = "dropping a grant lowers the privilege immediately"]
pub struct Grant<'a, C: Capabilities> {
    capabilities: &'a C,
    acquired: bool,
    pending: bool,
    _lock: MutexGuard<'static, ()>,
}

impl<C: Capabilities> Grant<'_, C> {
    /// Was the privilege effective when the grant was created?
    #[must_use]
    pub const fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// Lower the privilege, reporting failure to the caller.
    pub fn release(mut self) -> Result<()> {
        self.pending = false;
        self.capabilities.lower()
    }
}

impl<C: Capabilities> Drop for Grant<'_, C> {
    fn drop(&mut self) {
        if self.pending {
            self.pending = false;
            if let Err(err) = self.capabilities.lower() {
                error!(error = %err, "failed to lower CAP_NET_RAW, elevated privilege leaked");
            }
        }
    }
}

impl<C: Capabilities> Debug for Grant<'_, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grant")
            .field("acquired", &self.acquired)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use test_case::test_case;

    fn mock(effective: bool, permitted: bool) -> MockCapabilities {
        let mut caps = MockCapabilities::new();
        caps.expect_is_effective().returning(move || Ok(effective));
        caps.expect_is_permitted().returning(move || Ok(permitted));
        caps
    }

    #[test]
    fn test_acquire_raises_permitted() -> anyhow::Result<()> {
        let mut seq = Sequence::new();
        let mut caps = MockCapabilities::new();
        caps.expect_is_permitted().returning(|| Ok(true));
        caps.expect_is_effective()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|| Ok(false));
        caps.expect_raise()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        caps.expect_is_effective()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|| Ok(true));
        caps.expect_lower().times(1).returning(|| Ok(()));
        let privilege = PrivilegeManager::new(caps);
        let grant = privilege.acquire();
        assert!(grant.is_acquired());
        grant.release()?;
        Ok(())
    }

    #[test]
    fn test_acquire_not_permitted() -> anyhow::Result<()> {
        let mut caps = mock(false, false);
        caps.expect_raise().never();
        caps.expect_lower().times(1).returning(|| Ok(()));
        let privilege = PrivilegeManager::new(caps);
        let grant = privilege.acquire();
        assert!(!grant.is_acquired());
        grant.release()?;
        Ok(())
    }

    #[test]
    fn test_acquire_already_effective() -> anyhow::Result<()> {
        let mut caps = mock(true, true);
        caps.expect_raise().never();
        caps.expect_lower().times(1).returning(|| Ok(()));
        let privilege = PrivilegeManager::new(caps);
        let grant = privilege.acquire();
        assert!(grant.is_acquired());
        grant.release()?;
        Ok(())
    }

    #[test]
    fn test_acquire_raise_fails() {
        let mut caps = mock(false, true);
        caps.expect_raise()
            .times(1)
            .returning(|| Err(Error::StillEffective));
        caps.expect_lower().times(1).returning(|| Ok(()));
        let privilege = PrivilegeManager::new(caps);
        let grant = privilege.acquire();
        assert!(!grant.is_acquired());
    }

    #[test]
    fn test_drop_lowers_once() {
        let mut caps = mock(true, true);
        caps.expect_lower().times(1).returning(|| Ok(()));
        let privilege = PrivilegeManager::new(caps);
        drop(privilege.acquire());
    }

    #[test]
    fn test_release_failure_is_reported() {
        let mut caps = mock(true, true);
        caps.expect_lower()
            .times(1)
            .returning(|| Err(Error::StillEffective));
        let privilege = PrivilegeManager::new(caps);
        let err = privilege.acquire().release().unwrap_err();
        assert!(matches!(err, Error::StillEffective));
    }

    #[test]
    fn test_drop_failure_does_not_panic() {
        let mut caps = mock(true, true);
        caps.expect_lower()
            .times(1)
            .returning(|| Err(Error::StillEffective));
        let privilege = PrivilegeManager::new(caps);
        drop(privilege.acquire());
    }

    #[test]
    fn test_sequential_grants() -> anyhow::Result<()> {
        let mut caps = mock(false, false);
        caps.expect_lower().times(2).returning(|| Ok(()));
        let privilege = PrivilegeManager::new(caps);
        privilege.acquire().release()?;
        privilege.acquire().release()?;
        Ok(())
    }

    #[test_case(true, true; "effective and permitted")]
    #[test_case(false, true; "permitted only")]
    #[test_case(false, false; "neither")]
    fn test_state(effective: bool, permitted: bool) -> anyhow::Result<()> {
        let privilege = PrivilegeManager::new(mock(effective, permitted));
        assert_eq!(
            PrivilegeState {
                effective,
                permitted
            },
            privilege.state()?
        );
        Ok(())
    }

    #[test]
    fn test_drop_privileges_clears() -> anyhow::Result<()> {
        let mut caps = MockCapabilities::new();
        caps.expect_clear().times(1).returning(|| Ok(()));
        PrivilegeManager::new(caps).drop_privileges()?;
        Ok(())
    }
}
