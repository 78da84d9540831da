//! The Router Core: per-packet classifier dispatching Ethernet/ARP/IP traffic
//! (spec.md §4.3).

use std::net::Ipv4Addr;
use std::time::Instant;

use log::{debug, info, warn};
use wire::ethernet::{EtherType, Mac};
use wire::ipv4::Protocol;
use wire::{arp as warp, ethernet, icmp, ipv4};

use crate::arp::{Cache, Sweep};
use crate::link::{Iface, Link};
use crate::nat::{self, Kind};
use crate::routing::Table as RoutingTable;

pub struct Router {
	pub ifaces: Vec<Iface>,
	pub routing: RoutingTable,
	pub arp: Cache,
	pub nat: Option<nat::Table>,
	/// The interface NAT treats as "internal" (spec.md §4.5: "conventionally eth1").
	pub internal_iface: String,
}

impl Router {
	pub fn new(ifaces: Vec<Iface>, routing: RoutingTable, nat: Option<nat::Table>) -> Self {
		Self { ifaces, routing, arp: Cache::default(), nat, internal_iface: "eth1".to_string() }
	}

	fn iface_by_name(&self, name: &str) -> Option<&Iface> {
		self.ifaces.iter().find(|i| i.name == name)
	}

	fn iface_by_ip(&self, ip: Ipv4Addr) -> Option<&Iface> {
		self.ifaces.iter().find(|i| i.ip == ip)
	}

	/// Drives any ARP pending requests that have gone stale, emitting the broadcast
	/// request frames the caller should send. Wired to a one-second recurring timer
	/// and to the moment a new request is queued (spec.md §4.4).
	pub fn sweep_arp(&mut self, link: &mut impl Link, now: Instant) {
		for outcome in self.arp.sweep(now) {
			match outcome {
				Sweep::Resend { ip, iface } => {
					if let Some(frame) = self.build_arp_request(ip, &iface) {
						link.send_packet(&frame, &iface);
					}
				}
				Sweep::Exhausted { queued } => {
					for (frame, iface) in queued {
						self.send_host_unreachable(link, &frame, &iface);
					}
				}
			}
		}
	}

	pub fn sweep_nat(&mut self, now: Instant) {
		if let Some(nat) = &mut self.nat {
			nat.sweep(now);
		}
	}

	fn build_arp_request(&self, target: Ipv4Addr, iface: &str) -> Option<Vec<u8>> {
		let iface = self.iface_by_name(iface)?;

		let arp_header = warp::Header {
			htype: warp::HTYPE_ETHERNET.into(),
			ptype: warp::PTYPE_IPV4.into(),
			hlen: 6,
			plen: 4,
			oper: (warp::Op::Request as u16).into(),
			sha: iface.mac,
			spa: iface.ip,
			tha: Mac::ZERO,
			tpa: target,
		};

		Some(frame_with(Mac::BROADCAST, iface.mac, EtherType::Arp, &utils::bytes::as_slice(&arp_header).to_vec()))
	}

	/// spec.md §4.3's dispatch, given a fully received Ethernet frame.
	pub fn handle_packet(&mut self, link: &mut impl Link, frame: &[u8], iface: &str, now: Instant) {
		if frame.len() < ethernet::HEADER_LEN {
			return debug!("Dropping undersized Ethernet frame ({} bytes)", frame.len());
		}

		let eth: &ethernet::Header = utils::bytes::cast(&frame[..ethernet::HEADER_LEN]);
		let payload = &frame[ethernet::HEADER_LEN..];

		match EtherType::from_u16(eth.ethertype.get()) {
			Some(EtherType::Arp) => self.handle_arp(link, payload, iface, now),
			Some(EtherType::Ip) => self.handle_ip(link, payload, iface, now),
			None => debug!("Dropping frame with unknown ethertype {:#06x}", eth.ethertype.get()),
		}
	}

	fn handle_arp(&mut self, link: &mut impl Link, payload: &[u8], iface: &str, now: Instant) {
		if payload.len() < warp::HEADER_LEN {
			return debug!("Dropping undersized ARP packet");
		}

		let header: &warp::Header = utils::bytes::cast(&payload[..warp::HEADER_LEN]);

		if !header.is_well_formed() {
			return debug!("Dropping malformed ARP packet");
		}

		let Some(op) = warp::Op::from_u16(header.oper.get()) else {
			return debug!("Dropping ARP packet with unknown opcode");
		};

		let (sha, spa, tpa) = (header.sha, header.spa, header.tpa);

		match op {
			warp::Op::Request => {
				let Some(local) = self.iface_by_ip(tpa) else {
					return debug!("Ignoring ARP request for non-local target {tpa}");
				};

				self.arp.insert(spa, sha, now);

				let reply = warp::Header {
					htype: warp::HTYPE_ETHERNET.into(),
					ptype: warp::PTYPE_IPV4.into(),
					hlen: 6,
					plen: 4,
					oper: (warp::Op::Reply as u16).into(),
					sha: local.mac,
					spa: tpa,
					tha: sha,
					tpa: spa,
				};

				let frame = frame_with(sha, local.mac, EtherType::Arp, &utils::bytes::as_slice(&reply).to_vec());
				link.send_packet(&frame, iface);
			}
			warp::Op::Reply => {
				info!("Resolved {spa} -> {sha}");

				if let Some(pending) = self.arp.insert(spa, sha, now) {
					for (queued_frame, queued_iface) in pending.queued {
						let Some(local) = self.iface_by_name(&queued_iface) else { continue };
						let frame = frame_with(sha, local.mac, EtherType::Ip, &queued_frame);
						link.send_packet(&frame, &queued_iface);
					}
				}
			}
		}
	}

	fn handle_ip(&mut self, link: &mut impl Link, payload: &[u8], iface: &str, now: Instant) {
		if payload.len() < ipv4::HEADER_LEN {
			return debug!("Dropping undersized IP packet");
		}

		if !is_unfragmented_no_options(&payload[..ipv4::HEADER_LEN]) {
			return debug!("Dropping fragmented or options-bearing IP packet");
		}

		let mut packet = payload.to_vec();

		if self.apply_nat(&mut packet, iface, now).is_none() && self.nat.is_some() {
			return debug!("Dropping packet with no NAT mapping on inbound");
		}

		let ttl = {
			let header: &mut ipv4::Header = utils::bytes::cast_mut(&mut packet[..ipv4::HEADER_LEN]);
			header.ttl -= 1;
			header.fix_checksum();
			header.ttl
		};

		if ttl == 0 {
			let src_mac = self.ingress_mac(iface);
			return self.send_icmp_error(link, iface, src_mac, icmp::Type::TimeExceeded as u8, icmp::TIME_EXCEEDED_CODE, &packet);
		}

		let header: &ipv4::Header = utils::bytes::cast(&packet[..ipv4::HEADER_LEN]);
		let dst = header.dst;

		if let Some(local) = self.iface_by_ip(dst) {
			return self.handle_local(link, iface, local.ip, &packet);
		}

		let Some(route) = self.routing.lookup(dst).cloned() else {
			let src_mac = self.ingress_mac(iface);
			return self.send_icmp_error(link, iface, src_mac, icmp::Type::DestUnreachable as u8, icmp::unreachable_code::NET, &packet);
		};

		match self.arp.lookup(route.gw) {
			Some(mac) => {
				let Some(out_iface) = self.iface_by_name(&route.iface) else { return warn!("Routing table references unknown interface {}", route.iface) };
				let eth_frame = frame_with(mac, out_iface.mac, EtherType::Ip, &packet);
				link.send_packet(&eth_frame, &route.iface);
			}
			None => {
				self.arp.queue_request(route.gw, packet, route.iface.clone());
				self.sweep_arp(link, now);
			}
		}
	}

	fn handle_local(&mut self, link: &mut impl Link, iface: &str, local_ip: Ipv4Addr, packet: &[u8]) {
		let header: &ipv4::Header = utils::bytes::cast(&packet[..ipv4::HEADER_LEN]);
		let src_mac = self.ingress_mac(iface);

		if Protocol::from_u8(header.proto) == Some(Protocol::Icmp) {
			let body = &packet[ipv4::HEADER_LEN..];

			if body.len() >= icmp::ECHO_HEADER_LEN && body[0] == icmp::Type::EchoRequest as u8 && body[1] == 0 && icmp::Header::checksum_valid(body) {
				return self.send_icmp_echo_reply(link, iface, src_mac, local_ip, header.src, body);
			}
		}

		self.send_icmp_error(link, iface, src_mac, icmp::Type::DestUnreachable as u8, icmp::unreachable_code::PORT, packet);
	}

	fn send_icmp_echo_reply(&mut self, link: &mut impl Link, iface: &str, dst_mac: Mac, local_ip: Ipv4Addr, dst_ip: Ipv4Addr, request: &[u8]) {
		let mut body = request.to_vec();
		body[0] = icmp::Type::EchoReply as u8;
		icmp::Header::fix_checksum(&mut body);

		self.send_ip(link, iface, dst_mac, local_ip, dst_ip, Protocol::Icmp, &body);
	}

	fn send_icmp_error(&mut self, link: &mut impl Link, iface: &str, dst_mac: Mac, ty: u8, code: u8, original: &[u8]) {
		let Some(local) = self.iface_by_name(iface) else { return };

		let trunc = original.len().min(ipv4::HEADER_LEN + icmp::ERROR_PAYLOAD_LEN);
		let mut body = vec![0u8; icmp::ERROR_HEADER_LEN + trunc];

		{
			let header: &mut icmp::Error = utils::bytes::cast_mut(&mut body[..icmp::ERROR_HEADER_LEN]);
			header.header.ty = ty;
			header.header.code = code;
			header.header.csum = [0, 0];
			header.unused = 0;
		}

		body[icmp::ERROR_HEADER_LEN..].copy_from_slice(&original[..trunc]);
		icmp::Header::fix_checksum(&mut body);

		let original_header: &ipv4::Header = utils::bytes::cast(&original[..ipv4::HEADER_LEN]);
		let dst_ip = original_header.src;

		self.send_ip(link, iface, dst_mac, local.ip, dst_ip, Protocol::Icmp, &body);
	}

	fn send_ip(&mut self, link: &mut impl Link, iface: &str, dst_mac: Mac, src_ip: Ipv4Addr, dst_ip: Ipv4Addr, proto: Protocol, body: &[u8]) {
		let Some(local) = self.iface_by_name(iface) else { return };

		let mut header = ipv4::Header {
			ver: ipv4::Meta::new(bilge::prelude::u4::new(5), ipv4::Version::V4),
			tos: ipv4::ToS::default(),
			len: ((ipv4::HEADER_LEN + body.len()) as u16).into(),
			frg: ipv4::Fragment::new(bilge::prelude::u13::new(0), false, true, 0).into(),
			ttl: 64,
			proto: proto as u8,
			csm: [0, 0],
			src: src_ip,
			dst: dst_ip,
		};

		header.fix_checksum();

		let mut packet = utils::bytes::as_slice(&header).to_vec();
		packet.extend_from_slice(body);

		let frame = frame_with(dst_mac, local.mac, EtherType::Ip, &packet);
		link.send_packet(&frame, iface);
	}

	fn ingress_mac(&self, iface: &str) -> Mac {
		self.iface_by_name(iface).map(|i| i.mac).unwrap_or(Mac::ZERO)
	}

	fn send_host_unreachable(&mut self, link: &mut impl Link, original: &[u8], iface: &str) {
		if original.len() < ethernet::HEADER_LEN + ipv4::HEADER_LEN {
			return;
		}

		let ip_packet = &original[ethernet::HEADER_LEN..];
		let src_mac = self.ingress_mac(iface);
		self.send_icmp_error(link, iface, src_mac, icmp::Type::DestUnreachable as u8, icmp::unreachable_code::HOST, ip_packet);
	}

	/// Applies §4.5 translation in place if NAT is enabled. Returns `Some(())` if the
	/// packet should continue through the pipeline, `None` on an inbound miss (which
	/// the caller must drop).
	fn apply_nat(&mut self, packet: &mut [u8], iface: &str, now: Instant) -> Option<()> {
		let nat = self.nat.as_mut()?;

		let header: &ipv4::Header = utils::bytes::cast(&packet[..ipv4::HEADER_LEN]);
		let proto = Protocol::from_u8(header.proto);

		let kind = match proto {
			Some(Protocol::Icmp) => Kind::Icmp,
			Some(Protocol::Tcp) => Kind::Tcp,
			_ => return Some(()),
		};

		let outbound = iface == self.internal_iface;
		let ip_src = header.src;
		let transport_len = packet.len() - ipv4::HEADER_LEN;

		if outbound {
			let aux_int = read_aux(kind, true, &packet[ipv4::HEADER_LEN..])?;
			let idx = nat.lookup_or_insert_outbound(kind, ip_src, aux_int, now);

			if kind == Kind::Tcp {
				let (syn, ack, fin) = read_tcp_flags(&packet[ipv4::HEADER_LEN..]);
				nat.mapping_mut(idx).observe_tcp(syn, ack, fin);
			}

			let mapping = nat.mapping(idx);
			let (ip_ext, aux_ext) = (mapping.ip_ext, mapping.aux_ext);

			rewrite_nat_fields(packet, ip_ext, aux_ext, true, kind, transport_len);
		} else {
			let aux_ext = read_aux(kind, false, &packet[ipv4::HEADER_LEN..])?;
			let idx = nat.lookup_inbound(kind, aux_ext, now)?;

			if kind == Kind::Tcp {
				let (syn, ack, fin) = read_tcp_flags(&packet[ipv4::HEADER_LEN..]);
				nat.mapping_mut(idx).observe_tcp(syn, ack, fin);
			}

			let mapping = nat.mapping(idx);
			let (ip_int, aux_int) = (mapping.ip_int, mapping.aux_int);

			rewrite_nat_fields(packet, ip_int, aux_int, false, kind, transport_len);
		}

		Some(())
	}
}

/// Reads the `(type, aux)` identifier NAT keys off of, per spec.md §4.5. For TCP the
/// identifier lives in a different field depending on direction: `src_port` outbound
/// (the internal host's own port, `aux_int`) but `dst_port` inbound (the external
/// NAT-allocated port the peer is replying to, `aux_ext`). ICMP's echo `id` is
/// direction-independent.
fn read_aux(kind: Kind, outbound: bool, transport: &[u8]) -> Option<u16> {
	match kind {
		Kind::Icmp => icmp::parse_echo(transport).map(|echo| echo.id.get()),
		Kind::Tcp => wire::tcp::parse(transport).map(|h| if outbound { h.src_port.get() } else { h.dst_port.get() }),
	}
}

fn read_tcp_flags(transport: &[u8]) -> (bool, bool, bool) {
	let Some(h) = wire::tcp::parse(transport) else { return (false, false, false) };
	(h.flags.syn(), h.flags.ack(), h.flags.fin())
}

fn rewrite_nat_fields(packet: &mut [u8], new_ip: Ipv4Addr, new_aux: u16, outbound: bool, kind: Kind, transport_len: usize) {
	{
		let header: &mut ipv4::Header = utils::bytes::cast_mut(&mut packet[..ipv4::HEADER_LEN]);
		if outbound {
			header.src = new_ip;
		} else {
			header.dst = new_ip;
		}
		header.fix_checksum();
	}

	let pseudo = {
		let header: &ipv4::Header = utils::bytes::cast(&packet[..ipv4::HEADER_LEN]);
		header.pseudo_checksum(transport_len as u16)
	};

	let transport = &mut packet[ipv4::HEADER_LEN..];

	match kind {
		Kind::Icmp => {
			if let Some(echo) = icmp::parse_echo_mut(transport) {
				echo.id = new_aux.into();
			}
			icmp::Header::fix_checksum(transport);
		}
		Kind::Tcp => {
			{
				let header: &mut wire::tcp::Header = utils::bytes::cast_mut(&mut transport[..wire::tcp::HEADER_LEN]);
				if outbound {
					header.src_port = new_aux.into();
				} else {
					header.dst_port = new_aux.into();
				}
			}
			wire::tcp::Header::fix_checksum(transport, pseudo);
		}
	}
}

/// Rejects any IP header carrying options (`ihl != 5`) or naming a fragment (the
/// more-fragments bit set or a nonzero fragment offset), per `wire::ipv4`'s module doc:
/// this router never reassembles or forwards fragments (spec Non-goals).
fn is_unfragmented_no_options(header_bytes: &[u8]) -> bool {
	let header: &ipv4::Header = utils::bytes::cast(header_bytes);

	if header.ver.ihl().value() != 5 {
		return false;
	}

	let frag = header.frg.get();
	!frag.more() && frag.ofst().value() == 0
}

fn frame_with(dst: Mac, src: Mac, ethertype: EtherType, payload: &[u8]) -> Vec<u8> {
	let mut frame = vec![0u8; ethernet::HEADER_LEN + payload.len()];

	{
		let header: &mut ethernet::Header = utils::bytes::cast_mut(&mut frame[..ethernet::HEADER_LEN]);
		header.dst = dst;
		header.src = src;
		header.ethertype = (ethertype as u16).into();
	}

	frame[ethernet::HEADER_LEN..].copy_from_slice(payload);
	frame
}

#[cfg(test)]
mod tests {
	use bilge::prelude::{u13, u4};

	use super::*;
	use crate::routing::Entry;

	#[derive(Default)]
	struct FakeLink {
		sent: Vec<(Vec<u8>, String)>,
	}

	impl Link for FakeLink {
		fn send_packet(&mut self, frame: &[u8], iface: &str) {
			self.sent.push((frame.to_vec(), iface.to_string()));
		}
	}

	fn ip_packet(src: Ipv4Addr, dst: Ipv4Addr, ttl: u8, proto: Protocol, transport: &[u8]) -> Vec<u8> {
		let mut header = ipv4::Header {
			ver: ipv4::Meta::new(u4::new(5), ipv4::Version::V4),
			tos: ipv4::ToS::default(),
			len: ((ipv4::HEADER_LEN + transport.len()) as u16).into(),
			frg: ipv4::Fragment::new(u13::new(0), false, true, 0).into(),
			ttl,
			proto: proto as u8,
			csm: [0, 0],
			src,
			dst,
		};
		header.fix_checksum();

		let mut packet = utils::bytes::as_slice(&header).to_vec();
		packet.extend_from_slice(transport);
		packet
	}

	fn tcp_segment(src_port: u16, dst_port: u16, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Vec<u8> {
		let mut buf = vec![0u8; wire::tcp::HEADER_LEN];

		{
			let header: &mut wire::tcp::Header = utils::bytes::cast_mut(&mut buf);
			header.src_port = src_port.into();
			header.dst_port = dst_port.into();
			header.seq = 1u32.into();
			header.ack = 0u32.into();
			header.flags = wire::tcp::Flags::new(false, false, false, false, true, false, false, false);
			header.window = 65535u16.into();
		}

		let pseudo = ipv4::Header {
			ver: ipv4::Meta::new(u4::new(5), ipv4::Version::V4),
			tos: ipv4::ToS::default(),
			len: 0u16.into(),
			frg: ipv4::Fragment::new(u13::new(0), false, true, 0).into(),
			ttl: 64,
			proto: Protocol::Tcp as u8,
			csm: [0, 0],
			src: src_ip,
			dst: dst_ip,
		}
		.pseudo_checksum(wire::tcp::HEADER_LEN as u16);

		wire::tcp::Header::fix_checksum(&mut buf, pseudo);
		buf
	}

	/// spec.md §8 scenario 4: a frame destined for a route whose gateway is already in
	/// the ARP cache is forwarded immediately, with MACs rewritten and the TTL decremented.
	#[test]
	fn forwards_with_cached_arp_entry() {
		let eth1 = Iface { name: "eth1".into(), ip: "10.0.2.1".parse().unwrap(), mac: Mac([0, 0, 0, 0, 1, 1]) };
		let eth2 = Iface { name: "eth2".into(), ip: "192.168.2.2".parse().unwrap(), mac: Mac([0, 0, 0, 0, 2, 2]) };

		let mut routing = RoutingTable::default();
		routing.insert(Entry { dest: "10.0.1.0".parse().unwrap(), mask: "255.255.255.0".parse().unwrap(), gw: "192.168.2.1".parse().unwrap(), iface: "eth2".into() });

		let mut router = Router::new(vec![eth1.clone(), eth2.clone()], routing, None);
		let now = Instant::now();
		let gw_mac = Mac([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
		router.arp.insert("192.168.2.1".parse().unwrap(), gw_mac, now);

		let packet = ip_packet("203.0.113.5".parse().unwrap(), "10.0.1.5".parse().unwrap(), 10, Protocol::Udp, &[]);
		let frame = eth1_frame(eth1.mac, &packet);

		let mut link = FakeLink::default();
		router.handle_packet(&mut link, &frame, "eth1", now);

		assert_eq!(link.sent.len(), 1);
		let (out_frame, out_iface) = &link.sent[0];
		assert_eq!(out_iface, "eth2");

		let eth: &ethernet::Header = utils::bytes::cast(&out_frame[..ethernet::HEADER_LEN]);
		assert_eq!(eth.dst, gw_mac);
		assert_eq!(eth.src, eth2.mac);

		let ip: &ipv4::Header = utils::bytes::cast(&out_frame[ethernet::HEADER_LEN..ethernet::HEADER_LEN + ipv4::HEADER_LEN]);
		assert_eq!(ip.ttl, 9);
		assert!(ip.checksum_valid());
	}

	/// spec.md §8 scenario 5: a packet whose TTL reaches zero is never forwarded; the
	/// router instead returns an ICMP Time Exceeded to the sender.
	#[test]
	fn ttl_expiry_emits_icmp_time_exceeded_instead_of_forwarding() {
		let eth1 = Iface { name: "eth1".into(), ip: "10.0.2.1".parse().unwrap(), mac: Mac([0, 0, 0, 0, 1, 1]) };
		let eth2 = Iface { name: "eth2".into(), ip: "192.168.2.2".parse().unwrap(), mac: Mac([0, 0, 0, 0, 2, 2]) };

		let mut routing = RoutingTable::default();
		routing.insert(Entry { dest: "10.0.1.0".parse().unwrap(), mask: "255.255.255.0".parse().unwrap(), gw: "192.168.2.1".parse().unwrap(), iface: "eth2".into() });

		let mut router = Router::new(vec![eth1.clone(), eth2.clone()], routing, None);
		let now = Instant::now();

		let src_ip: Ipv4Addr = "203.0.113.5".parse().unwrap();
		let packet = ip_packet(src_ip, "10.0.1.5".parse().unwrap(), 1, Protocol::Udp, &[1, 2, 3, 4, 5, 6, 7, 8]);
		let frame = eth1_frame(eth1.mac, &packet);

		let mut link = FakeLink::default();
		router.handle_packet(&mut link, &frame, "eth1", now);

		assert_eq!(link.sent.len(), 1, "only the ICMP error should be sent, not the original packet");
		let (out_frame, out_iface) = &link.sent[0];
		assert_eq!(out_iface, "eth1", "the error returns through the ingress interface");

		let ip: &ipv4::Header = utils::bytes::cast(&out_frame[ethernet::HEADER_LEN..ethernet::HEADER_LEN + ipv4::HEADER_LEN]);
		assert_eq!(ip.proto, Protocol::Icmp as u8);
		assert_eq!(ip.dst, src_ip);

		let icmp_body = &out_frame[ethernet::HEADER_LEN + ipv4::HEADER_LEN..];
		assert_eq!(icmp_body[0], icmp::Type::TimeExceeded as u8);
		assert_eq!(icmp_body[1], icmp::TIME_EXCEEDED_CODE);
	}

	/// spec.md §8 scenario 6: an internal host's outbound TCP segment is rewritten to the
	/// external address/port, and the peer's reply is rewritten back to the internal
	/// host untouched by direction. Exercises the `read_aux` direction split directly.
	#[test]
	fn nat_outbound_then_inbound_round_trips_tcp() {
		let eth0 = Iface { name: "eth0".into(), ip: "203.0.113.9".parse().unwrap(), mac: Mac([1, 1, 1, 1, 1, 1]) };
		let eth1 = Iface { name: "eth1".into(), ip: "10.0.1.1".parse().unwrap(), mac: Mac([2, 2, 2, 2, 2, 2]) };

		let mut routing = RoutingTable::default();
		routing.insert(Entry { dest: "0.0.0.0".parse().unwrap(), mask: "0.0.0.0".parse().unwrap(), gw: "203.0.113.1".parse().unwrap(), iface: "eth0".into() });
		routing.insert(Entry { dest: "10.0.0.0".parse().unwrap(), mask: "255.255.255.0".parse().unwrap(), gw: "10.0.1.2".parse().unwrap(), iface: "eth1".into() });

		let nat = nat::Table::new(eth0.ip);
		let mut router = Router::new(vec![eth0.clone(), eth1.clone()], routing, Some(nat));

		let now = Instant::now();
		let wan_gw_mac = Mac([3, 3, 3, 3, 3, 3]);
		let lan_gw_mac = Mac([4, 4, 4, 4, 4, 4]);
		router.arp.insert("203.0.113.1".parse().unwrap(), wan_gw_mac, now);
		router.arp.insert("10.0.1.2".parse().unwrap(), lan_gw_mac, now);

		let internal_ip: Ipv4Addr = "10.0.0.2".parse().unwrap();
		let peer_ip: Ipv4Addr = "8.8.8.8".parse().unwrap();

		let tcp = tcp_segment(5000, 80, internal_ip, peer_ip);
		let packet = ip_packet(internal_ip, peer_ip, 64, Protocol::Tcp, &tcp);
		let frame = eth1_frame(eth1.mac, &packet);

		let mut link = FakeLink::default();
		router.handle_packet(&mut link, &frame, "eth1", now);

		assert_eq!(link.sent.len(), 1);
		let (out_frame, out_iface) = &link.sent[0];
		assert_eq!(out_iface, "eth0");

		let ip_off = ethernet::HEADER_LEN;
		let tcp_off = ip_off + ipv4::HEADER_LEN;

		let ip_hdr: &ipv4::Header = utils::bytes::cast(&out_frame[ip_off..tcp_off]);
		assert_eq!(ip_hdr.src, eth0.ip, "outbound NAT should rewrite src to the external IP");
		assert!(ip_hdr.checksum_valid());

		let tcp_hdr: &wire::tcp::Header = utils::bytes::cast(&out_frame[tcp_off..tcp_off + wire::tcp::HEADER_LEN]);
		assert_eq!(tcp_hdr.src_port.get(), 1024, "first allocated external port");
		assert!(wire::tcp::Header::checksum_valid(&out_frame[tcp_off..], ip_hdr.pseudo_checksum(wire::tcp::HEADER_LEN as u16)));

		let reply_tcp = tcp_segment(80, 1024, peer_ip, eth0.ip);
		let reply_packet = ip_packet(peer_ip, eth0.ip, 64, Protocol::Tcp, &reply_tcp);
		let reply_frame = eth0_frame(eth0.mac, &reply_packet);

		link.sent.clear();
		router.handle_packet(&mut link, &reply_frame, "eth0", now);

		assert_eq!(link.sent.len(), 1, "the reply must be NAT-translated and forwarded, not dropped as a miss");
		let (out_frame, out_iface) = &link.sent[0];
		assert_eq!(out_iface, "eth1");

		let ip_hdr: &ipv4::Header = utils::bytes::cast(&out_frame[ip_off..tcp_off]);
		assert_eq!(ip_hdr.dst, internal_ip, "inbound NAT should rewrite dst back to the internal host");

		let tcp_hdr: &wire::tcp::Header = utils::bytes::cast(&out_frame[tcp_off..tcp_off + wire::tcp::HEADER_LEN]);
		assert_eq!(tcp_hdr.dst_port.get(), 5000, "inbound NAT should rewrite the port back to the internal port, not leave it at the external aux");
		assert!(wire::tcp::Header::checksum_valid(&out_frame[tcp_off..], ip_hdr.pseudo_checksum(wire::tcp::HEADER_LEN as u16)));
	}

	fn eth1_frame(src_iface_mac: Mac, packet: &[u8]) -> Vec<u8> {
		frame_with(src_iface_mac, Mac([9, 9, 9, 9, 9, 9]), EtherType::Ip, packet)
	}

	fn eth0_frame(src_iface_mac: Mac, packet: &[u8]) -> Vec<u8> {
		frame_with(src_iface_mac, Mac([5, 5, 5, 5, 5, 5]), EtherType::Ip, packet)
	}
}
