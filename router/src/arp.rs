//! The ARP cache: resolved `ip -> mac` entries plus pending requests with queued
//! packets awaiting resolution (spec.md §3.4/§4.4).

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use wire::ethernet::Mac;

const ENTRY_TIMEOUT: Duration = Duration::from_secs(15);
const REQUEST_INTERVAL: Duration = Duration::from_secs(1);
const MAX_REQUEST_ATTEMPTS: u8 = 5;

struct Entry {
	mac: Mac,
	inserted: Instant,
}

/// An ARP query awaiting reply, holding the frames deferred until resolution.
pub struct PendingRequest {
	pub ip: Ipv4Addr,
	pub iface: String,
	pub queued: Vec<(Vec<u8>, String)>,
	sent_count: u8,
	last_sent: Option<Instant>,
}

/// What the sweeper (or an immediate post-queue check) should do about a pending
/// request.
pub enum Sweep {
	/// Broadcast another ARP request for `ip` out `iface`.
	Resend { ip: Ipv4Addr, iface: String },
	/// `sent_count` reached [`MAX_REQUEST_ATTEMPTS`]; every queued packet's source
	/// should receive an ICMP host-unreachable and the request is destroyed.
	Exhausted { queued: Vec<(Vec<u8>, String)> },
}

#[derive(Default)]
pub struct Cache {
	resolved: HashMap<Ipv4Addr, Entry>,
	pending: HashMap<Ipv4Addr, PendingRequest>,
}

impl Cache {
	pub fn lookup(&self, ip: Ipv4Addr) -> Option<Mac> {
		self.resolved.get(&ip).map(|e| e.mac)
	}

	/// Upserts a resolved entry. If a pending request existed for `ip`, removes and
	/// returns it so its queued packets can be flushed (spec.md §4.4).
	pub fn insert(&mut self, ip: Ipv4Addr, mac: Mac, now: Instant) -> Option<PendingRequest> {
		self.resolved.insert(ip, Entry { mac, inserted: now });
		self.pending.remove(&ip)
	}

	/// Creates or appends to the pending request for `ip`.
	pub fn queue_request(&mut self, ip: Ipv4Addr, frame: Vec<u8>, iface: String) {
		self.pending
			.entry(ip)
			.or_insert_with(|| PendingRequest { ip, iface: iface.clone(), queued: Vec::new(), sent_count: 0, last_sent: None })
			.queued
			.push((frame, iface));
	}

	pub fn destroy_request(&mut self, ip: Ipv4Addr) {
		self.pending.remove(&ip);
	}

	/// Drives every pending request whose `last_sent_time` is stale (spec.md §4.4's
	/// background sweeper). Called both right after queueing a new request and from
	/// the one-second recurring sweep.
	pub fn sweep(&mut self, now: Instant) -> Vec<Sweep> {
		let due: Vec<Ipv4Addr> = self
			.pending
			.iter()
			.filter(|(_, req)| req.last_sent.is_none_or(|t| now.duration_since(t) >= REQUEST_INTERVAL))
			.map(|(ip, _)| *ip)
			.collect();

		let mut results = Vec::new();

		for ip in due {
			let req = self.pending.get_mut(&ip).expect("just collected from the same map");

			if req.sent_count >= MAX_REQUEST_ATTEMPTS {
				let req = self.pending.remove(&ip).unwrap();
				results.push(Sweep::Exhausted { queued: req.queued });
			} else {
				req.sent_count += 1;
				req.last_sent = Some(now);
				results.push(Sweep::Resend { ip, iface: req.iface.clone() });
			}
		}

		self.resolved.retain(|_, e| now.duration_since(e.inserted) < ENTRY_TIMEOUT);

		results
	}
}
