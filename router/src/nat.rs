//! The NAT table: endpoint-independent port-address translation with idle timeouts
//! (spec.md §3.5/§4.5).

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

const PORT_RANGE_START: u16 = 1024;

const ICMP_TIMEOUT: Duration = Duration::from_secs(60);
const TCP_ESTABLISHED_TIMEOUT: Duration = Duration::from_secs(7440);
const TCP_TRANSITORY_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Kind {
	Icmp,
	Tcp,
}

/// Per-mapping TCP connection state, tracked from observed SYN/SYN+ACK/FIN flags so
/// the differentiated established/transitory timeouts apply (design note §9's open
/// question). Mappings for ICMP never leave [`TcpState::Closed`] and are ignored.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TcpState {
	Closed,
	SynSent,
	Established,
	FinWait,
}

pub struct Mapping {
	pub kind: Kind,
	pub ip_int: Ipv4Addr,
	pub aux_int: u16,
	pub ip_ext: Ipv4Addr,
	pub aux_ext: u16,
	pub tcp_state: TcpState,
	last_updated: Instant,
}

impl Mapping {
	/// Advances [`TcpState`] per the TCP flags observed on a segment passing through
	/// this mapping, in either direction.
	pub fn observe_tcp(&mut self, syn: bool, ack: bool, fin: bool) {
		self.tcp_state = match (self.tcp_state, syn, ack, fin) {
			(_, _, _, true) => TcpState::FinWait,
			(TcpState::Closed, true, false, _) => TcpState::SynSent,
			(TcpState::SynSent, true, true, _) | (TcpState::SynSent, false, true, _) => TcpState::Established,
			(state, _, _, _) => state,
		};
	}

	fn timeout(&self) -> Duration {
		match self.kind {
			Kind::Icmp => ICMP_TIMEOUT,
			Kind::Tcp if self.tcp_state == TcpState::Established => TCP_ESTABLISHED_TIMEOUT,
			Kind::Tcp => TCP_TRANSITORY_TIMEOUT,
		}
	}
}

pub struct Table {
	mappings: Vec<Mapping>,
	next_port: u16,
	external_ip: Ipv4Addr,
}

impl Table {
	pub fn new(external_ip: Ipv4Addr) -> Self {
		Self { mappings: Vec::new(), next_port: PORT_RANGE_START, external_ip }
	}

	/// Outbound lookup by `(type, ip_int, aux_int)`, allocating a fresh mapping on
	/// miss (spec.md §4.5). Returns the index of the mapping so the caller can update
	/// its TCP state.
	pub fn lookup_or_insert_outbound(&mut self, kind: Kind, ip_int: Ipv4Addr, aux_int: u16, now: Instant) -> usize {
		if let Some(idx) = self.mappings.iter().position(|m| m.kind == kind && m.ip_int == ip_int && m.aux_int == aux_int) {
			self.mappings[idx].last_updated = now;
			return idx;
		}

		let aux_ext = self.allocate_port();

		self.mappings.push(Mapping { kind, ip_int, aux_int, ip_ext: self.external_ip, aux_ext, tcp_state: TcpState::Closed, last_updated: now });

		self.mappings.len() - 1
	}

	/// Inbound lookup by `(type, aux_ext)`. Returns `None` on miss, which the caller
	/// must treat as a drop (spec.md §7: "NAT miss on inbound").
	pub fn lookup_inbound(&mut self, kind: Kind, aux_ext: u16, now: Instant) -> Option<usize> {
		let idx = self.mappings.iter().position(|m| m.kind == kind && m.aux_ext == aux_ext)?;
		self.mappings[idx].last_updated = now;
		Some(idx)
	}

	pub fn mapping(&self, idx: usize) -> &Mapping {
		&self.mappings[idx]
	}

	pub fn mapping_mut(&mut self, idx: usize) -> &mut Mapping {
		&mut self.mappings[idx]
	}

	fn allocate_port(&mut self) -> u16 {
		loop {
			let candidate = self.next_port;

			self.next_port = if self.next_port == u16::MAX { PORT_RANGE_START } else { self.next_port + 1 };

			if !self.mappings.iter().any(|m| m.aux_ext == candidate) {
				return candidate;
			}
		}
	}

	/// Drops every mapping idle past its (kind- and TCP-state-dependent) timeout
	/// (spec.md §4.5's sweeper).
	pub fn sweep(&mut self, now: Instant) {
		self.mappings.retain(|m| now.duration_since(m.last_updated) < m.timeout());
	}
}
