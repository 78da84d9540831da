//! The cTCP reference client: bridges the process's stdin/stdout to a
//! [`stop_and_wait::Connection`] or [`go_back_n::Connection`] over an unreliable UDP
//! datagram service.
//!
//! The VNS link emulator, CLI argument parsing style, and packet dumping tooling spec.md
//! §1 calls out as external collaborators are not reimplemented here: this binary
//! substitutes a plain connected UDP socket for the emulator link.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::mpsc;
use std::thread;

use clap::{Parser, ValueEnum};
use collections::bytes::Slice;
use ctcp::{go_back_n, stop_and_wait, Cfg, Endpoint, Input, TIMER};
use log::{error, info, warn};
use stakker::{actor, fwd_to, ret_nop, ActorOwn, CX};
use utils::error::*;

#[derive(Clone, Copy, ValueEnum)]
enum Variant {
	StopAndWait,
	GoBackN,
}

#[derive(Parser)]
struct Args {
	/// Address of the unreliable link emulator (`host:port`).
	#[arg(short, long)]
	remote: String,

	/// Local UDP port to bind.
	#[arg(short, long, default_value_t = 0)]
	port: u16,

	/// Reliability variant to run.
	#[arg(short, long, value_enum, default_value_t = Variant::StopAndWait)]
	variant: Variant,

	/// Advertised go-back-N send window, in bytes. Ignored in stop-and-wait mode.
	#[arg(short, long, default_value_t = ctcp::MSS)]
	window: usize,
}

/// Bridges a [`ctcp::Endpoint`] to a connected UDP socket and the process's stdio.
struct Link {
	socket: UdpSocket,
	stdin: mpsc::Receiver<Vec<u8>>,
	pending: Vec<u8>,
	stdout: io::Stdout,
}

impl Endpoint for Link {
	fn conn_input(&mut self, buf: &mut [u8]) -> Input {
		if self.pending.is_empty() {
			match self.stdin.try_recv() {
				Ok(chunk) => self.pending = chunk,
				Err(mpsc::TryRecvError::Empty) => return Input::None,
				Err(mpsc::TryRecvError::Disconnected) => return Input::Eof,
			}
		}

		let n = self.pending.len().min(buf.len());
		buf[..n].copy_from_slice(&self.pending[..n]);
		self.pending.drain(..n);
		Input::Data(n)
	}

	fn conn_output(&mut self, buf: &[u8]) -> usize {
		if let Err(err) = self.stdout.write_all(buf) {
			warn!("Failed to write to stdout: {err}");
			return 0;
		}

		let _ = self.stdout.flush();
		buf.len()
	}

	fn conn_bufspace(&self) -> usize {
		usize::MAX
	}

	fn conn_eof(&mut self) {
		info!("Peer signaled EOF");
	}

	fn conn_send(&mut self, buf: &[u8]) {
		if let Err(err) = self.socket.send(buf) {
			warn!("Failed to send segment to link emulator: {err}");
		}
	}

	fn conn_remove(&mut self) {}

	fn end_client(&mut self) {
		info!("Connection closed, exiting");
		std::process::exit(0);
	}
}

enum Conn {
	StopAndWait(stop_and_wait::Connection<Link>),
	GoBackN(go_back_n::Connection<Link>),
}

impl Conn {
	fn read(&mut self) {
		match self {
			Self::StopAndWait(c) => c.read(),
			Self::GoBackN(c) => c.read(),
		}
	}

	fn receive(&mut self, buf: &[u8]) {
		match self {
			Self::StopAndWait(c) => c.receive(buf),
			Self::GoBackN(c) => c.receive(buf),
		}
	}

	fn timer(&mut self) {
		match self {
			Self::StopAndWait(c) => c.timer(),
			Self::GoBackN(c) => c.timer(),
		}
	}
}

struct CtcpApp {
	_io: runtime::Io<UdpSocket>,
	conn: Conn,
}

impl CtcpApp {
	fn init(cx: CX![], remote: SocketAddr, port: u16, variant: Variant, window: usize) -> Option<Self> {
		let socket = UdpSocket::bind(("0.0.0.0", port)).ok_or(|err| error!("Failed to bind UDP socket: {err}"))?;
		socket.set_nonblocking(true).ok_or(|err| error!("Failed to configure socket: {err}"))?;
		socket.connect(remote).ok_or(|err| error!("Failed to connect to link emulator at {remote}: {err}"))?;

		let send_socket = socket.try_clone().ok_or(|err| error!("Failed to clone socket: {err}"))?;

		let read_fwd = fwd_to!([cx], recv_datagram() as (Slice));
		let socket_io = runtime::Io::new(socket, read_fwd);

		let (tx, rx) = mpsc::channel();
		thread::spawn(move || {
			let mut stdin = io::stdin();
			let mut buf = [0u8; 4096];

			loop {
				match stdin.read(&mut buf) {
					Ok(0) | Err(_) => break,
					Ok(n) if tx.send(buf[..n].to_vec()).is_err() => break,
					Ok(_) => {}
				}
			}
		});

		let link = Link { socket: send_socket, stdin: rx, pending: Vec::new(), stdout: io::stdout() };

		let mut cfg = Cfg { send_window: window, ..Cfg::default() };

		let conn = match variant {
			Variant::StopAndWait => Conn::StopAndWait(stop_and_wait::Connection::open(link, &mut cfg)),
			Variant::GoBackN => Conn::GoBackN(go_back_n::Connection::open(link, &mut cfg)),
		};

		let actor = cx.access_actor().clone();
		cx.after(cfg.timer, move |s| actor.apply(s, |this, cx| this.tick(cx)));

		Some(Self { _io: socket_io, conn })
	}

	fn tick(&mut self, cx: CX![]) {
		self.conn.read();
		self.conn.timer();

		let actor = cx.access_actor().clone();
		cx.after(TIMER, move |s| actor.apply(s, |this, cx| this.tick(cx)));
	}

	fn recv_datagram(&mut self, _: CX![], buf: Slice) {
		self.conn.receive(&buf[..]);
	}
}

fn main() -> std::process::ExitCode {
	let args = Args::parse();

	log::set_logger(&runtime::Logger).ok();
	log::set_max_level(log::LevelFilter::Info);

	let Some(remote) = args.remote.to_socket_addrs().ok().and_then(|mut it| it.next()) else {
		eprintln!("Invalid remote address: {}", args.remote);
		return std::process::ExitCode::FAILURE;
	};

	let mut stakker = runtime::init();
	let s = &mut stakker;

	let app: ActorOwn<CtcpApp> = actor!(s, CtcpApp::init(remote, args.port, args.variant, args.window), ret_nop!());

	if runtime::exec(&mut stakker, move || drop(app)).is_err() {
		return std::process::ExitCode::FAILURE;
	}

	std::process::ExitCode::SUCCESS
}
