//! A minimal TCP header: ports and the flags NAT needs to observe SYN/SYN+ACK/FIN
//! transitions (spec.md §4.5's open question on tracking per-mapping connection
//! state). Options are never parsed (spec Non-goals: no window scaling, SACK).

use bilge::prelude::*;
use utils::bytes::{self, Cast};
use utils::endian::{u16be, u32be};

use crate::Checksum;

#[bitsize(8)]
#[derive(Clone, Copy, FromBits, Cast)]
#[repr(C)]
pub struct Flags {
	pub fin: bool,
	pub syn: bool,
	pub rst: bool,
	pub psh: bool,
	pub ack: bool,
	pub urg: bool,
	pub ece: bool,
	pub cwr: bool,
}

#[bitsize(8)]
#[derive(Clone, Copy, FromBits, Cast)]
#[repr(C)]
pub struct Offset {
	pub reserved: u4,
	pub words: u4,
}

#[derive(Clone, Cast)]
#[repr(C)]
pub struct Header {
	pub src_port: u16be,
	pub dst_port: u16be,
	pub seq: u32be,
	pub ack: u32be,
	pub offset: Offset,
	pub flags: Flags,
	pub window: u16be,
	pub checksum: [u8; 2],
	pub urgent: u16be,
}

pub const HEADER_LEN: usize = core::mem::size_of::<Header>();

impl Header {
	pub fn fix_checksum(buf: &mut [u8], mut pseudo: Checksum) {
		{
			let header: &mut Header = bytes::cast_mut(&mut buf[..HEADER_LEN]);
			header.checksum = [0, 0];
		}

		pseudo.push(buf);
		let csum = pseudo.end();

		bytes::cast_mut::<Header, _>(&mut buf[..HEADER_LEN]).checksum = csum;
	}

	pub fn checksum_valid(buf: &[u8], mut pseudo: Checksum) -> bool {
		let mut copy = buf.to_vec();
		let expected = bytes::cast::<Header, _>(&buf[..HEADER_LEN]).checksum;
		bytes::cast_mut::<Header, _>(&mut copy[..HEADER_LEN]).checksum = [0, 0];

		pseudo.push(&copy);
		pseudo.end() == expected
	}
}

pub fn parse(buf: &[u8]) -> Option<&Header> {
	if buf.len() < HEADER_LEN {
		return None;
	}

	Some(bytes::cast(&buf[..HEADER_LEN]))
}

#[cfg(test)]
mod tests {
	use core::net::Ipv4Addr;

	use super::*;
	use crate::ipv4;

	#[test]
	fn checksum_roundtrip_with_pseudo_header() {
		let mut buf = vec![0u8; HEADER_LEN];

		{
			let header: &mut Header = bytes::cast_mut(&mut buf[..HEADER_LEN]);
			header.src_port = 5000u16.into();
			header.dst_port = 80u16.into();
			header.seq = 1u32.into();
			header.ack = 0u32.into();
			header.flags = Flags::new(false, true, false, false, false, false, false, false);
			header.window = 65535u16.into();
		}

		let ip = ipv4::Header {
			ver: ipv4::Meta::new(bilge::prelude::u4::new(5), ipv4::Version::V4),
			tos: ipv4::ToS::default(),
			len: (ipv4::HEADER_LEN as u16 + HEADER_LEN as u16).into(),
			frg: ipv4::Fragment::new(bilge::prelude::u13::new(0), false, true, 0).into(),
			ttl: 64,
			proto: ipv4::Protocol::Tcp as u8,
			csm: [0, 0],
			src: Ipv4Addr::new(10, 0, 0, 2),
			dst: Ipv4Addr::new(8, 8, 8, 8),
		};

		Header::fix_checksum(&mut buf, ip.pseudo_checksum(HEADER_LEN as u16));
		assert!(Header::checksum_valid(&buf, ip.pseudo_checksum(HEADER_LEN as u16)));

		buf[0] ^= 1;
		assert!(!Header::checksum_valid(&buf, ip.pseudo_checksum(HEADER_LEN as u16)));
	}
}
