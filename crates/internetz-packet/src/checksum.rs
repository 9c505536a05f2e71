//! Internet checksum (RFC 1071) for `ICMPv4` messages and `IPv4` headers.
//!
//! This code is derived from [`libpnet`] which is available under the Apache 2.0 license.
//!
//! [`libpnet`]: https://github.com/libpnet/libpnet

/// Calculate the checksum for an `Ipv4` header.
#[cfg(test)]
#[must_use]
pub(crate) fn ipv4_header_checksum(data: &[u8]) -> u16 {
    checksum(data, 5)
}

/// Calculate the checksum for an `Ipv4` `ICMP` packet.
///
/// The checksum word itself (bytes 2..4) is skipped so the result may be
/// compared directly with the stored value of a received message.
#[must_use]
pub fn icmp_ipv4_checksum(data: &[u8]) -> u16 {
    checksum(data, 1)
}

fn checksum(data: &[u8], ignore_word: usize) -> u16 {
    if data.is_empty() {
        return 0;
    }
    finalize_checksum(sum_be_words(data, ignore_word))
}

fn sum_be_words(data: &[u8], ignore_word: usize) -> u32 {
    let mut chunks = data.chunks_exact(2);
    let mut sum = chunks
        .by_ref()
        .enumerate()
        .filter(|(i, _)| *i != ignore_word)
        .map(|(_, word)| u32::from(u16::from_be_bytes([word[0], word[1]])))
        .sum::<u32>();
    if let [last] = chunks.remainder() {
        if data.len() / 2 != ignore_word {
            sum += u32::from(*last) << 8;
        }
    }
    sum
}

const fn finalize_checksum(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum >> 16) + (sum & 0xFFFF);
    }
    !sum as u16
}
