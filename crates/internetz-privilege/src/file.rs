use crate::{Error, Result};

/// The extended attribute holding the file capabilities of an executable.
#[cfg(target_os = "linux")]
const CAPABILITY_XATTR: &str = "security.capability";

const CAP_NET_RAW: u32 = 13;

const VFS_CAP_REVISION_MASK: u32 = 0xFF00_0000;
const VFS_CAP_FLAGS_EFFECTIVE: u32 = 0x0000_0001;
const VFS_CAP_REVISION_1: u32 = 0x0100_0000;
const VFS_CAP_REVISION_2: u32 = 0x0200_0000;
const VFS_CAP_REVISION_3: u32 = 0x0300_0000;

/// The capabilities granted to an executable by `setcap`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FileCaps {
    /// The permitted capability set, one bit per capability.
    pub permitted: u64,
    /// The inheritable capability set, one bit per capability.
    pub inheritable: u64,
    /// Are the permitted capabilities raised into the effective set on exec?
    pub effective: bool,
    /// The user namespace root the capabilities apply to (revision 3 only).
    pub root_id: Option<u32>,
}

impl FileCaps {
    /// Decode a `security.capability` attribute value.
    ///
    /// The layout is a little endian `magic_etc` word (revision and flags)
    /// followed by `permitted` and `inheritable` word pairs, one pair for
    /// revision 1 and two for revisions 2 and 3. Revision 3 ends with the
    /// namespace root id.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let magic = word(data, 0).ok_or(Error::InvalidFileCaps("truncated header"))?;
        let (pairs, expected_len) = match magic & VFS_CAP_REVISION_MASK {
            VFS_CAP_REVISION_1 => (1, 12),
            VFS_CAP_REVISION_2 => (2, 20),
            VFS_CAP_REVISION_3 => (2, 24),
            _ => return Err(Error::InvalidFileCaps("unknown revision")),
        };
        if data.len() != expected_len {
            return Err(Error::InvalidFileCaps("unexpected length for revision"));
        }
        let mut permitted = 0_u64;
        let mut inheritable = 0_u64;
        for pair in 0..pairs {
            let offset = 4 + pair * 8;
            let shift = 32 * pair;
            permitted |= u64::from(word(data, offset).unwrap_or_default()) << shift;
            inheritable |= u64::from(word(data, offset + 4).unwrap_or_default()) << shift;
        }
        let root_id = (magic & VFS_CAP_REVISION_MASK == VFS_CAP_REVISION_3)
            .then(|| word(data, 20))
            .flatten();
        Ok(Self {
            permitted,
            inheritable,
            effective: magic & VFS_CAP_FLAGS_EFFECTIVE != 0,
            root_id,
        })
    }

    /// Is `CAP_NET_RAW` in the permitted set?
    #[must_use]
    pub const fn has_net_raw(&self) -> bool {
        self.permitted & (1 << CAP_NET_RAW) != 0
    }
}

fn word(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u32::from_le_bytes)
}

/// The file capabilities of the running executable, if it has any.
#[cfg(target_os = "linux")]
pub fn executable_file_caps() -> Result<Option<FileCaps>> {
    let exe = std::env::current_exe()?;
    xattr::get(&exe, CAPABILITY_XATTR)?
        .map(|data| FileCaps::decode(&data))
        .transpose()
}

/// File capabilities are Linux only.
#[cfg(not(target_os = "linux"))]
pub fn executable_file_caps() -> Result<Option<FileCaps>> {
    Ok(None)
}
