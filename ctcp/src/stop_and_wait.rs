//! cTCP stop-and-wait (spec.md §4.1): exactly one segment may be in flight at a time.

use log::{debug, info, warn};

use crate::segment::{self, ACK, FIN};
use crate::{Cfg, Endpoint, Input, MAX_RT_ATTEMPTS, MSS, TICKS_PER_RT};

/// A segment that has been sent but not yet acknowledged. Its bytes are never mutated
/// after construction (spec.md §8: retransmitting a segment does not change its
/// `seqno`, `len`, or checksum); a retransmit resends this exact buffer.
struct Outstanding {
	seqno: u32,
	bytes: Vec<u8>,
}

/// A single stop-and-wait cTCP connection.
pub struct Connection<E: Endpoint> {
	endpoint: E,

	send_base: u32,
	next_seqno: u32,
	recv_expected: u32,

	outstanding: Option<Outstanding>,
	rt_attempts: u8,
	ticks_since_progress: u32,

	fin_sent: bool,
	torn_down: bool,
}

impl<E: Endpoint> Connection<E> {
	/// spec.md §4.1 `open`: initializes state and writes `cfg` back with the fixed
	/// stop-and-wait timing parameters.
	pub fn open(endpoint: E, cfg: &mut Cfg) -> Self {
		*cfg = Cfg::default();

		Self {
			endpoint,
			send_base: 1,
			next_seqno: 1,
			recv_expected: 1,
			outstanding: None,
			rt_attempts: 0,
			ticks_since_progress: 0,
			fin_sent: false,
			torn_down: false,
		}
	}

	pub fn is_torn_down(&self) -> bool {
		self.torn_down
	}

	/// spec.md §4.1 `read`: invoked when the application has input available.
	pub fn read(&mut self) {
		if self.torn_down || self.fin_sent || self.outstanding.is_some() {
			return;
		}

		let mut buf = vec![0u8; MSS];

		match self.endpoint.conn_input(&mut buf) {
			Input::None => {}
			Input::Eof => self.send_fin(),
			Input::Data(n) => {
				buf.truncate(n);
				self.send_data(&buf);
			}
		}
	}

	fn send_data(&mut self, payload: &[u8]) {
		let seg = segment::build(self.next_seqno, self.recv_expected, ACK, MSS as u16, payload);

		self.endpoint.conn_send(&seg);

		self.outstanding = Some(Outstanding { seqno: self.next_seqno, bytes: seg });
		self.next_seqno += payload.len() as u32;
		self.ticks_since_progress = 0;
	}

	fn send_fin(&mut self) {
		let seg = segment::build(self.next_seqno, self.recv_expected, ACK | FIN, MSS as u16, &[]);
		self.endpoint.conn_send(&seg);
		self.fin_sent = true;
	}

	fn send_ack(&mut self) {
		let seg = segment::build(self.next_seqno, self.recv_expected, ACK, MSS as u16, &[]);
		self.endpoint.conn_send(&seg);
	}

	/// spec.md §4.1 `receive`.
	pub fn receive(&mut self, buf: &[u8]) {
		if self.torn_down {
			return;
		}

		let Some(header) = segment::parse(buf) else {
			debug!("Dropping stop-and-wait segment with invalid checksum or length");
			return;
		};

		if header.has(FIN) {
			info!("Received FIN, tearing down connection");
			self.send_ack();
			self.endpoint.conn_eof();
			self.destroy();
			return;
		}

		let payload = segment::payload(buf);
		let seqno = header.seqno.get();
		let ackno = header.ackno.get();

		if payload.is_empty() {
			if header.has(ACK) {
				self.handle_ack(ackno);
			}
			return;
		}

		if seqno != self.recv_expected {
			debug!("Dropping duplicate/out-of-order segment (seqno {seqno}, expected {})", self.recv_expected);
			self.send_ack();
			return;
		}

		self.endpoint.conn_output(payload);
		self.recv_expected += payload.len() as u32;
		self.send_ack();
	}

	fn handle_ack(&mut self, ackno: u32) {
		let Some(o) = &self.outstanding else { return };

		if ackno <= o.seqno {
			// Does not acknowledge the outstanding segment; ignore (no regression of send_base).
			return;
		}

		self.send_base = ackno;
		self.outstanding = None;
		self.rt_attempts = 0;
		self.ticks_since_progress = 0;
	}

	/// spec.md §4.1 `timer`: invoked every 40ms.
	pub fn timer(&mut self) {
		if self.torn_down {
			return;
		}

		if self.rt_attempts >= MAX_RT_ATTEMPTS {
			warn!("Connection exceeded {MAX_RT_ATTEMPTS} retransmission attempts, tearing down");
			self.destroy();
			return;
		}

		let Some(o) = &self.outstanding else {
			self.ticks_since_progress = 0;
			return;
		};

		self.ticks_since_progress += 1;

		if self.ticks_since_progress >= TICKS_PER_RT {
			debug!("Retransmitting segment with seqno {}", o.seqno);
			self.endpoint.conn_send(&o.bytes);
			self.rt_attempts += 1;
			self.ticks_since_progress = 0;
		}
	}

	fn destroy(&mut self) {
		self.torn_down = true;
		self.endpoint.conn_remove();
		self.endpoint.end_client();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Default)]
	struct Fake {
		sent: Vec<Vec<u8>>,
		delivered: Vec<u8>,
		input: std::collections::VecDeque<Vec<u8>>,
		eof_signaled: bool,
		removed: bool,
	}

	impl Endpoint for Fake {
		fn conn_input(&mut self, buf: &mut [u8]) -> Input {
			match self.input.pop_front() {
				Some(bytes) => {
					let n = bytes.len().min(buf.len());
					buf[..n].copy_from_slice(&bytes[..n]);
					Input::Data(n)
				}
				None => Input::None,
			}
		}

		fn conn_output(&mut self, buf: &[u8]) -> usize {
			self.delivered.extend_from_slice(buf);
			buf.len()
		}

		fn conn_bufspace(&self) -> usize {
			usize::MAX
		}

		fn conn_eof(&mut self) {
			self.eof_signaled = true;
		}

		fn conn_send(&mut self, buf: &[u8]) {
			self.sent.push(buf.to_vec());
		}

		fn conn_remove(&mut self) {
			self.removed = true;
		}

		fn end_client(&mut self) {}
	}

	fn ack_for(seg: &[u8]) -> Vec<u8> {
		let header = segment::parse(seg).unwrap();
		let ackno = header.seqno.get() + segment::payload(seg).len() as u32;
		segment::build(1, ackno, ACK, 3072, &[])
	}

	#[test]
	fn happy_path_sends_and_acks() {
		let mut cfg = Cfg::default();
		let mut conn = Connection::open(Fake::default(), &mut cfg);

		conn.endpoint.input.push_back(b"HELLO".to_vec());
		conn.read();

		assert_eq!(conn.endpoint.sent.len(), 1);
		let seg = conn.endpoint.sent[0].clone();

		conn.receive(&ack_for(&seg));
		assert_eq!(conn.send_base, 6);
		assert!(conn.outstanding.is_none());

		for _ in 0..5 {
			conn.timer();
		}
		assert_eq!(conn.endpoint.sent.len(), 1, "acked segment must not be retransmitted");
	}

	#[test]
	fn lost_ack_triggers_retransmit() {
		let mut cfg = Cfg::default();
		let mut conn = Connection::open(Fake::default(), &mut cfg);

		conn.endpoint.input.push_back(b"HELLO".to_vec());
		conn.read();

		for _ in 0..5 {
			conn.timer();
		}

		assert_eq!(conn.endpoint.sent.len(), 2, "should retransmit once after 5 ticks");
		assert_eq!(conn.rt_attempts, 1);
		assert_eq!(conn.endpoint.sent[0], conn.endpoint.sent[1], "retransmit must be byte-identical");

		let seg = conn.endpoint.sent[1].clone();
		conn.receive(&ack_for(&seg));
		assert_eq!(conn.rt_attempts, 0);
	}

	#[test]
	fn fin_tears_down_connection() {
		let mut cfg = Cfg::default();
		let mut conn = Connection::open(Fake::default(), &mut cfg);

		let fin = segment::build(1, 1, ACK | FIN, 3072, &[]);
		conn.receive(&fin);

		assert!(conn.is_torn_down());
		assert!(conn.endpoint.eof_signaled);
		assert!(conn.endpoint.removed);
	}

	#[test]
	fn corrupt_checksum_is_dropped() {
		let mut cfg = Cfg::default();
		let mut conn = Connection::open(Fake::default(), &mut cfg);

		let mut seg = segment::build(1, 1, ACK, 3072, b"HELLO");
		let last = seg.len() - 1;
		seg[last] ^= 1;

		conn.receive(&seg);
		assert!(conn.endpoint.delivered.is_empty());
	}
}
