use thiserror::Error;

/// A packet error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A packet error.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    /// Attempting to create a packet with an insufficient buffer size.
    #[error("insufficient buffer for {0} packet, minimum={1}, provided={2}")]
    InsufficientPacketBuffer(String, usize, usize),
    /// The `IPv4` header length field does not fit the buffer.
    #[error("invalid header length for {0} packet, header={1}, provided={2}")]
    InvalidHeaderLength(String, usize, usize),
    /// The stored checksum does not match the checksum of the bytes.
    #[error("invalid checksum for {0} packet, expected={1:#06x}, actual={2:#06x}")]
    InvalidChecksum(String, u16, u16),
}
