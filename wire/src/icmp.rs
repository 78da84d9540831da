//! ICMPv4 (RFC 792), restricted to the subset spec.md calls for: echo request/reply,
//! destination unreachable, and time exceeded.

use utils::bytes::Cast;
use utils::endian::u16be;

use crate::Checksum;

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Type {
	EchoReply = 0,
	DestUnreachable = 3,
	EchoRequest = 8,
	TimeExceeded = 11,
}

pub mod unreachable_code {
	pub const NET: u8 = 0;
	pub const HOST: u8 = 1;
	pub const PORT: u8 = 3;
}

pub const TIME_EXCEEDED_CODE: u8 = 0;

/// The common 4-byte ICMP header: `type`, `code`, `checksum`. The 4 bytes that follow
/// differ per message type (echo carries `id`/`seq`; unreachable/time-exceeded carry an
/// unused field), so they are represented separately per variant below.
#[derive(Clone, Cast)]
#[repr(C)]
pub struct Header {
	pub ty: u8,
	pub code: u8,
	pub csum: [u8; 2],
}

pub const HEADER_LEN: usize = core::mem::size_of::<Header>();

/// An echo request/reply message header (`type`/`code`/`csum` plus `id`/`seq`); `data`
/// (the echoed payload) follows immediately.
#[derive(Clone, Cast)]
#[repr(C)]
pub struct Echo {
	pub header: Header,
	pub id: u16be,
	pub seq: u16be,
}

pub const ECHO_HEADER_LEN: usize = core::mem::size_of::<Echo>();

/// A destination-unreachable/time-exceeded header (`type`/`code`/`csum` plus 4 unused
/// bytes); per spec §3.3, the payload that follows is the original IP header plus 8
/// bytes of its transport payload.
#[derive(Clone, Cast)]
#[repr(C)]
pub struct Error {
	pub header: Header,
	pub unused: u32,
}

pub const ERROR_HEADER_LEN: usize = core::mem::size_of::<Error>();

/// The number of bytes of the original datagram's payload carried in an ICMP error
/// message, per spec §3.3.
pub const ERROR_PAYLOAD_LEN: usize = 8;

pub fn parse_echo(buf: &[u8]) -> Option<&Echo> {
	if buf.len() < ECHO_HEADER_LEN {
		return None;
	}

	Some(utils::bytes::cast(&buf[..ECHO_HEADER_LEN]))
}

pub fn parse_echo_mut(buf: &mut [u8]) -> Option<&mut Echo> {
	if buf.len() < ECHO_HEADER_LEN {
		return None;
	}

	Some(utils::bytes::cast_mut(&mut buf[..ECHO_HEADER_LEN]))
}

impl Header {
	pub fn fix_checksum(buf: &mut [u8]) {
		utils::bytes::cast_mut::<Header, _>(buf).csum = [0, 0];
		let csum = Checksum::of(buf).end();
		utils::bytes::cast_mut::<Header, _>(buf).csum = csum;
	}

	pub fn checksum_valid(buf: &[u8]) -> bool {
		let mut copy = buf.to_vec();
		utils::bytes::cast_mut::<Header, _>(&mut copy).csum = [0, 0];
		Checksum::of(&copy).end() == utils::bytes::cast::<Header, _>(buf).csum
	}
}
