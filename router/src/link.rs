//! The host-provided link layer, mirroring `sr_send_packet` (spec.md §6). Real frame
//! transmission, interface enumeration, and the VNS wire protocol are external
//! collaborators out of scope (spec.md §1); expressing this as a trait lets
//! [`crate::dispatch::Router`] be built and tested against a fake.

#[derive(Clone, Debug)]
pub struct Iface {
	pub name: String,
	pub ip: std::net::Ipv4Addr,
	pub mac: wire::ethernet::Mac,
}

pub trait Link {
	/// Transmits a complete Ethernet frame out of the named interface.
	fn send_packet(&mut self, frame: &[u8], iface: &str);
}
