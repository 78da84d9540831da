//! cTCP go-back-N (spec.md §4.2): up to `send_window` bytes of unacknowledged data may
//! be in flight; the receiver delivers strictly in order and discards anything else.

use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::segment::{self, ACK, FIN};
use crate::{Cfg, Endpoint, Input, MAX_RT_ATTEMPTS, MSS, TICKS_PER_RT};

/// A sentinel segment (seqno=0, ackno=0) signaling that a corrupted segment was
/// received, per the GLOSSARY's "Sentinel NAK".
fn sentinel_nak() -> Vec<u8> {
	segment::build(0, 0, ACK, 0, &[])
}

struct Outstanding {
	seqno: u32,
	bytes: Vec<u8>,
}

pub struct Connection<E: Endpoint> {
	endpoint: E,

	send_window: usize,
	send_base: u32,
	next_seqno: u32,
	recv_expected: u32,
	last_ack_sent: u32,

	/// Oldest-first queue of segments sent but not yet acknowledged.
	outstanding: VecDeque<Outstanding>,

	rt_attempts: u8,
	ticks_since_progress: u32,
	need_resend: bool,

	fin_sent: bool,
	torn_down: bool,
}

impl<E: Endpoint> Connection<E> {
	/// spec.md §4.2 `open`. Unlike stop-and-wait, the host may request a larger
	/// `send_window` via `cfg`; a window smaller than one MSS is raised to `MSS` so at
	/// least one segment can always be outstanding.
	pub fn open(endpoint: E, cfg: &mut Cfg) -> Self {
		let send_window = cfg.send_window.max(MSS);

		*cfg = Cfg { send_window, ..Cfg::default() };

		Self {
			endpoint,
			send_window,
			send_base: 1,
			next_seqno: 1,
			recv_expected: 1,
			last_ack_sent: 1,
			outstanding: VecDeque::new(),
			rt_attempts: 0,
			ticks_since_progress: 0,
			need_resend: false,
			fin_sent: false,
			torn_down: false,
		}
	}

	pub fn is_torn_down(&self) -> bool {
		self.torn_down
	}

	/// spec.md §4.2 `read`: transmits one segment carrying up to MSS bytes if the
	/// window has room, otherwise defers.
	pub fn read(&mut self) {
		if self.torn_down || self.fin_sent {
			return;
		}

		if self.next_seqno - self.send_base >= self.send_window as u32 {
			debug!("Send window full ({} bytes outstanding), deferring read", self.next_seqno - self.send_base);
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
		let seg = segment::build(self.next_seqno, self.recv_expected, ACK, self.send_window as u16, payload);

		self.endpoint.conn_send(&seg);

		self.outstanding.push_back(Outstanding { seqno: self.next_seqno, bytes: seg });
		self.next_seqno += payload.len() as u32;
	}

	fn send_fin(&mut self) {
		let seg = segment::build(self.next_seqno, self.recv_expected, ACK | FIN, self.send_window as u16, &[]);
		self.endpoint.conn_send(&seg);
		self.fin_sent = true;
	}

	fn resend_last_ack(&mut self) {
		let seg = segment::build(self.next_seqno, self.last_ack_sent, ACK, self.send_window as u16, &[]);
		self.endpoint.conn_send(&seg);
	}

	/// spec.md §4.2 `receive`, with its three disjoint roles.
	pub fn receive(&mut self, buf: &[u8]) {
		if self.torn_down {
			return;
		}

		let Some(header) = segment::parse(buf) else {
			debug!("Corrupt go-back-N segment: sending sentinel NAK");
			let nak = sentinel_nak();
			self.endpoint.conn_send(&nak);
			return;
		};

		if header.has(FIN) {
			info!("Received FIN, tearing down connection");
			self.resend_last_ack();
			self.endpoint.conn_eof();
			self.destroy();
			return;
		}

		let payload = segment::payload(buf);
		let seqno = header.seqno.get();
		let ackno = header.ackno.get();

		if header.has(ACK) && !payload.is_empty() {
			if seqno == self.recv_expected {
				self.endpoint.conn_output(payload);
				self.recv_expected += payload.len() as u32;
				self.last_ack_sent = self.recv_expected;

				let ack = segment::build(self.next_seqno, self.recv_expected, ACK, self.send_window as u16, &[]);
				self.endpoint.conn_send(&ack);
			} else {
				debug!("Out-of-order segment (seqno {seqno}, expected {}); re-acking", self.recv_expected);
				self.resend_last_ack();
			}

			return;
		}

		if payload.is_empty() && header.has(ACK) {
			self.handle_pure_ack(ackno);
		}
	}

	fn handle_pure_ack(&mut self, ackno: u32) {
		if ackno == 0 {
			debug!("Received sentinel NAK, flagging for resend");
			self.need_resend = true;
			return;
		}

		if ackno == self.send_base && ackno > 1 {
			debug!("Duplicate ACK for {ackno}, flagging for resend");
			self.need_resend = true;
			return;
		}

		self.send_base = ackno;
		self.need_resend = false;

		while let Some(front) = self.outstanding.front() {
			if front.seqno >= self.send_base {
				break;
			}
			self.outstanding.pop_front();
		}

		if self.send_base == self.next_seqno {
			self.rt_attempts = 0;
			self.ticks_since_progress = 0;
		}
	}

	/// spec.md §4.2 `timer`: invoked every 40ms.
	pub fn timer(&mut self) {
		if self.torn_down {
			return;
		}

		if self.rt_attempts == MAX_RT_ATTEMPTS {
			warn!("Connection exceeded {MAX_RT_ATTEMPTS} retransmission attempts, tearing down");
			self.destroy();
			return;
		}

		if self.ticks_since_progress == TICKS_PER_RT {
			debug!("Retransmitting {} outstanding segment(s)", self.outstanding.len());

			for seg in &self.outstanding {
				self.endpoint.conn_send(&seg.bytes);
			}

			self.ticks_since_progress = 0;
			self.rt_attempts += 1;
		} else if !self.outstanding.is_empty() || self.need_resend {
			self.ticks_since_progress += 1;
		} else {
			self.ticks_since_progress = 0;
		}
	}

	fn destroy(&mut self) {
		self.torn_down = true;
		self.endpoint.conn_remove();
		self.endpoint.end_client();
	}
}
