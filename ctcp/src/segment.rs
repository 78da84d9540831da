//! The cTCP segment wire format, spec.md §3.1: a fixed header followed by a variable-
//! length payload. Mirrors the shape of `net/src/udp/mod.rs`'s `Header` (a
//! `#[derive(Cast)] #[repr(C)]` struct of big-endian integers) but sized for cTCP's
//! own fields rather than real UDP.

use utils::bytes::{self, Cast};
use utils::endian::{u16be, u32be};
use wire::Checksum;

/// Acknowledgment field is significant.
pub const ACK: u32 = 1 << 0;
/// No more data from sender.
pub const FIN: u32 = 1 << 1;

#[derive(Clone, Cast)]
#[repr(C)]
pub struct Header {
	/// Sequence number of the first data byte in this segment (1-based).
	pub seqno: u32be,
	/// Next expected seqno from the peer.
	pub ackno: u32be,
	/// Total segment length, including this header.
	pub len: u16be,
	/// `ACK` / `FIN`; all other bits reserved and must be zero.
	pub flags: u32be,
	/// Advertised receive window, in bytes.
	pub window: u16be,
	/// Internet checksum over header + payload, with this field zeroed.
	pub cksum: [u8; 2],
}

pub const HEADER_LEN: usize = core::mem::size_of::<Header>();

impl Header {
	pub fn has(&self, flag: u32) -> bool {
		self.flags.get() & flag != 0
	}
}

/// Builds a complete segment (header + payload) with a correct checksum and length.
/// Per spec's design note §9/invariant §8, the returned bytes are never mutated again;
/// a retransmit resends this exact buffer.
pub fn build(seqno: u32, ackno: u32, flags: u32, window: u16, payload: &[u8]) -> Vec<u8> {
	let len = HEADER_LEN + payload.len();
	let mut buf = vec![0u8; len];

	{
		let header: &mut Header = bytes::cast_mut(&mut buf[..HEADER_LEN]);
		header.seqno = seqno.into();
		header.ackno = ackno.into();
		header.len = (len as u16).into();
		header.flags = flags.into();
		header.window = window.into();
		header.cksum = [0, 0];
	}

	buf[HEADER_LEN..].copy_from_slice(payload);

	let csum = Checksum::of(&buf).end();
	bytes::cast_mut::<Header, _>(&mut buf[..HEADER_LEN]).cksum = csum;

	buf
}

/// Parses and validates a received segment. Returns `None` if the buffer is shorter
/// than a header, its `len` field disagrees with the actual buffer length, or its
/// checksum fails to verify -- the three ways a segment can be corrupt per spec §3.1.
pub fn parse(buf: &[u8]) -> Option<&Header> {
	if buf.len() < HEADER_LEN {
		return None;
	}

	let header: &Header = bytes::cast(&buf[..HEADER_LEN]);

	if header.len.get() as usize != buf.len() {
		return None;
	}

	let mut copy = buf.to_vec();
	bytes::cast_mut::<Header, _>(&mut copy[..HEADER_LEN]).cksum = [0, 0];

	if Checksum::of(&copy).end() != header.cksum {
		return None;
	}

	Some(header)
}

pub fn payload(buf: &[u8]) -> &[u8] {
	&buf[HEADER_LEN..]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn build_then_parse_roundtrip() {
		let seg = build(1, 1, ACK, 3072, b"HELLO");
		let header = parse(&seg).expect("segment should verify");
		assert_eq!(header.seqno.get(), 1);
		assert!(header.has(ACK));
		assert!(!header.has(FIN));
		assert_eq!(payload(&seg), b"HELLO");
	}

	#[test]
	fn corrupted_payload_fails_checksum() {
		let mut seg = build(1, 1, ACK, 3072, b"HELLO");
		let last = seg.len() - 1;
		seg[last] ^= 0xff;
		assert!(parse(&seg).is_none());
	}

	#[test]
	fn truncated_length_is_rejected() {
		let seg = build(1, 1, ACK, 3072, b"HELLO");
		assert!(parse(&seg[..seg.len() - 1]).is_none());
	}
}
