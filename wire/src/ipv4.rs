//! The IPv4 header (RFC 791). Options, fragmentation, and IPv6 are out of scope (spec
//! Non-goals); any incoming fragment or options-bearing header is rejected rather than
//! reassembled or parsed, matching `net/src/ip/v4.rs`'s `more()/ofst()` guard but made a
//! hard error here since this router never forwards fragments.

use core::net::Ipv4Addr;

use bilge::prelude::*;
use utils::bytes::Cast;
use utils::endian::{b, u16be};

use crate::Checksum;

#[bitsize(4)]
#[derive(FromBits, PartialEq, Eq)]
pub enum Version {
	V4 = 4,
	#[fallback]
	Other,
}

#[bitsize(8)]
#[derive(FromBits, Cast)]
#[repr(C)]
pub struct Meta {
	pub ihl: u4,
	pub ver: Version,
}

#[bitsize(8)]
#[derive(Clone, Copy, FromBits, Cast)]
#[repr(C)]
pub struct ToS {
	ecn: u2,
	ds: u6,
}

impl Default for ToS {
	fn default() -> Self {
		Self::new(u2::new(0), u6::new(0))
	}
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Protocol {
	Icmp = 1,
	Tcp = 6,
	Udp = 17,
}

impl Protocol {
	pub fn from_u8(v: u8) -> Option<Self> {
		match v {
			1 => Some(Self::Icmp),
			6 => Some(Self::Tcp),
			17 => Some(Self::Udp),
			_ => None,
		}
	}
}

#[bitsize(32)]
#[derive(FromBits)]
pub struct Fragment {
	pub ofst: u13,
	pub more: bool,
	pub dont: bool,
	pub reserved: bool,
	pub idnt: u16,
}

/// The fixed 20-byte IPv4 header (no options). `len` is the total datagram length
/// including this header; `data` (the transport payload) follows immediately.
#[derive(Clone, Cast)]
#[repr(C)]
pub struct Header {
	pub ver: Meta,
	pub tos: ToS,
	pub len: u16be,
	pub frg: b<Fragment>,
	pub ttl: u8,
	pub proto: u8,
	pub csm: [u8; 2],
	pub src: Ipv4Addr,
	pub dst: Ipv4Addr,
}

pub const HEADER_LEN: usize = core::mem::size_of::<Header>();

impl Header {
	/// Recompute `csm` over the header with `csm` zeroed, per spec §3.3: "IP checksum
	/// covers only the IP header, recomputed after any field mutation."
	pub fn fix_checksum(&mut self) {
		self.csm = [0, 0];
		self.csm = Checksum::of(utils::bytes::as_slice(&*self)).end();
	}

	pub fn checksum_valid(&self) -> bool {
		let mut copy = self.clone();
		copy.csm = [0, 0];
		Checksum::of(utils::bytes::as_slice(&copy)).end() == self.csm
	}

	/// The pseudo-header checksum accumulator used by TCP/UDP/ICMP-over-IP checksums
	/// (`{src_ip, dst_ip, 0, proto, length}`), per spec §3.3.
	pub fn pseudo_checksum(&self, transport_len: u16) -> Checksum {
		let mut csum = Checksum::with(utils::bytes::cast(&self.src));
		csum.push(utils::bytes::as_slice(&self.dst));
		csum.push(&[0, self.proto]);
		csum.push(&transport_len.to_be_bytes());
		csum
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn checksum_roundtrip() {
		let mut h = Header {
			ver: Meta::new(u4::new(5), Version::V4),
			tos: ToS::default(),
			len: 20u16.into(),
			frg: Fragment::new(u13::new(0), false, true, 0).into(),
			ttl: 64,
			proto: Protocol::Tcp as u8,
			csm: [0, 0],
			src: Ipv4Addr::new(10, 0, 0, 1),
			dst: Ipv4Addr::new(10, 0, 0, 2),
		};

		h.fix_checksum();
		assert!(h.checksum_valid());

		h.ttl -= 1;
		assert!(!h.checksum_valid());

		h.fix_checksum();
		assert!(h.checksum_valid());
	}
}
