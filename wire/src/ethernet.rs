//! The Ethernet II frame header (IEEE 802.3, DIX framing).

use utils::bytes::Cast;
use utils::endian::u16be;

/// A 6-octet link-layer (MAC) address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Cast)]
#[repr(C)]
pub struct Mac(pub [u8; 6]);

impl Mac {
	pub const BROADCAST: Mac = Mac([0xff; 6]);
	pub const ZERO: Mac = Mac([0; 6]);

	pub fn is_broadcast(&self) -> bool {
		*self == Self::BROADCAST
	}
}

impl core::fmt::Display for Mac {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		let [a, b, c, d, e, g] = self.0;
		write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
	}
}

impl core::fmt::Debug for Mac {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		<Self as core::fmt::Display>::fmt(self, f)
	}
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum EtherType {
	Ip = 0x0800,
	Arp = 0x0806,
}

impl EtherType {
	pub fn from_u16(v: u16) -> Option<Self> {
		match v {
			0x0800 => Some(Self::Ip),
			0x0806 => Some(Self::Arp),
			_ => None,
		}
	}
}

/// The fixed 14-byte Ethernet II header. `data` (the frame payload) follows immediately.
#[derive(Cast)]
#[repr(C)]
pub struct Header {
	pub dst: Mac,
	pub src: Mac,
	pub ethertype: u16be,
}

pub const HEADER_LEN: usize = core::mem::size_of::<Header>();
