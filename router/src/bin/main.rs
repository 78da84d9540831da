//! The router reference process: a two-armed NAT box with `eth0` facing the WAN and
//! `eth1` facing the internal network (spec.md §4.5's "conventionally eth1").
//!
//! The VNS topology negotiation and real interface enumeration spec.md §1 calls out as
//! external collaborators are not reimplemented here: this binary substitutes a pair of
//! plain UDP sockets, one per interface, standing in for the Ethernet segments.

use std::net::UdpSocket;
use std::time::Duration;

use clap::Parser;
use collections::bytes::Slice;
use log::{error, info};
use router::link::Iface;
use router::{nat, routing, Link, Router};
use stakker::{actor, fwd_to, ret_nop, ActorOwn, CX};
use utils::error::*;
use wire::ethernet::Mac;

const ARP_SWEEP: Duration = Duration::from_secs(1);
const NAT_SWEEP: Duration = Duration::from_secs(1);

#[derive(Parser)]
struct Args {
	/// Path to the routing table (`dest gw mask iface` lines).
	#[arg(short = 'r', long = "rtable")]
	routing_table: String,

	/// VNS topology id. Accepted for CLI compatibility; this binary speaks UDP locally
	/// rather than the VNS protocol.
	#[arg(short = 't', long, default_value_t = 0)]
	topology_id: u16,

	/// Virtual host name.
	#[arg(short = 'v', long, default_value = "")]
	host: String,

	/// VNS server address. Accepted for CLI compatibility; unused.
	#[arg(short = 's', long, default_value = "localhost")]
	server: String,

	/// Base UDP port: `eth0` binds here, `eth1` binds here + 1.
	#[arg(short = 'p', long, default_value_t = 8888)]
	port: u16,

	/// Optional logfile path. Unused: logs always go to stderr via [`runtime::Logger`].
	#[arg(short = 'l', long)]
	logfile: Option<String>,

	/// This router's external IP address, assigned to `eth0`.
	#[arg(short = 'i', long)]
	ip: String,

	/// Enables NAT translation on `eth1` -> `eth0` traffic.
	#[arg(short = 'n', long, action = clap::ArgAction::SetTrue)]
	nat: bool,
}

struct UdpLink {
	sockets: Vec<(String, UdpSocket)>,
}

impl Link for UdpLink {
	fn send_packet(&mut self, frame: &[u8], iface: &str) {
		let Some((_, socket)) = self.sockets.iter().find(|(name, _)| name == iface) else {
			return error!("Attempted to send on unknown interface {iface}");
		};

		if let Err(err) = socket.send(frame) {
			error!("Failed to send frame on {iface}: {err}");
		}
	}
}

struct RouterApp {
	router: Router,
	link: UdpLink,
	_eth0_io: runtime::Io<UdpSocket>,
	_eth1_io: runtime::Io<UdpSocket>,
}

impl RouterApp {
	fn init(cx: CX![], ifaces: Vec<Iface>, sockets: Vec<(String, UdpSocket)>, routing: routing::Table, nat_enabled: bool) -> Option<Self> {
		let nat_table = nat_enabled.then(|| nat::Table::new(ifaces[0].ip));
		let router = Router::new(ifaces, routing, nat_table);

		let send_sockets = sockets.iter().map(|(name, socket)| Some((name.clone(), socket.try_clone().ok_or(|err| error!("Failed to clone socket for {name}: {err}"))?))).collect::<Option<Vec<_>>>()?;

		let mut recv_sockets = sockets.into_iter();
		let (_, eth0_socket) = recv_sockets.next().expect("two interfaces");
		let (_, eth1_socket) = recv_sockets.next().expect("two interfaces");

		eth0_socket.set_nonblocking(true).ok_or(|err| error!("Failed to configure eth0 socket: {err}"))?;
		eth1_socket.set_nonblocking(true).ok_or(|err| error!("Failed to configure eth1 socket: {err}"))?;

		let eth0_fwd = fwd_to!([cx], recv_eth0() as (Slice));
		let eth1_fwd = fwd_to!([cx], recv_eth1() as (Slice));

		let eth0_io = runtime::Io::new(eth0_socket, eth0_fwd);
		let eth1_io = runtime::Io::new(eth1_socket, eth1_fwd);

		let link = UdpLink { sockets: send_sockets };

		let actor = cx.access_actor().clone();
		cx.after(ARP_SWEEP, move |s| actor.apply(s, |this, cx| this.sweep_arp(cx)));

		let actor = cx.access_actor().clone();
		cx.after(NAT_SWEEP, move |s| actor.apply(s, |this, cx| this.sweep_nat(cx)));

		Some(Self { router, link, _eth0_io: eth0_io, _eth1_io: eth1_io })
	}

	fn recv_eth0(&mut self, _: CX![], buf: Slice) {
		self.router.handle_packet(&mut self.link, &buf[..], "eth0", std::time::Instant::now());
	}

	fn recv_eth1(&mut self, _: CX![], buf: Slice) {
		self.router.handle_packet(&mut self.link, &buf[..], "eth1", std::time::Instant::now());
	}

	fn sweep_arp(&mut self, cx: CX![]) {
		self.router.sweep_arp(&mut self.link, std::time::Instant::now());

		let actor = cx.access_actor().clone();
		cx.after(ARP_SWEEP, move |s| actor.apply(s, |this, cx| this.sweep_arp(cx)));
	}

	fn sweep_nat(&mut self, cx: CX![]) {
		self.router.sweep_nat(std::time::Instant::now());

		let actor = cx.access_actor().clone();
		cx.after(NAT_SWEEP, move |s| actor.apply(s, |this, cx| this.sweep_nat(cx)));
	}
}

fn main() -> std::process::ExitCode {
	let args = Args::parse();

	log::set_logger(&runtime::Logger).ok();
	log::set_max_level(log::LevelFilter::Info);

	let Ok(ext_ip) = args.ip.parse() else {
		eprintln!("Invalid IP address: {}", args.ip);
		return std::process::ExitCode::FAILURE;
	};

	let routing = match routing::Table::load(&args.routing_table) {
		Ok(table) => table,
		Err(err) => {
			eprintln!("Failed to load routing table: {err}");
			return std::process::ExitCode::FAILURE;
		}
	};

	let ifaces = vec![
		Iface { name: "eth0".to_string(), ip: ext_ip, mac: Mac([0x02, 0x00, 0x00, 0x00, 0x00, 0x00]) },
		Iface { name: "eth1".to_string(), ip: "10.0.1.1".parse().unwrap(), mac: Mac([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]) },
	];

	let eth0_socket = match UdpSocket::bind(("127.0.0.1", args.port)) {
		Ok(s) => s,
		Err(err) => {
			eprintln!("Failed to bind eth0 on port {}: {err}", args.port);
			return std::process::ExitCode::FAILURE;
		}
	};

	let eth1_socket = match UdpSocket::bind(("127.0.0.1", args.port + 1)) {
		Ok(s) => s,
		Err(err) => {
			eprintln!("Failed to bind eth1 on port {}: {err}", args.port + 1);
			return std::process::ExitCode::FAILURE;
		}
	};

	info!("Router {} (topology {}) listening: eth0=127.0.0.1:{} eth1=127.0.0.1:{}", args.host, args.topology_id, args.port, args.port + 1);

	let sockets = vec![("eth0".to_string(), eth0_socket), ("eth1".to_string(), eth1_socket)];

	let mut stakker = runtime::init();
	let s = &mut stakker;

	let app: ActorOwn<RouterApp> = actor!(s, RouterApp::init(ifaces, sockets, routing, args.nat), ret_nop!());

	if runtime::exec(&mut stakker, move || drop(app)).is_err() {
		return std::process::ExitCode::FAILURE;
	}

	std::process::ExitCode::SUCCESS
}
