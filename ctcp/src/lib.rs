pub mod endpoint;
pub mod go_back_n;
pub mod segment;
pub mod stop_and_wait;

use std::time::Duration;

pub use endpoint::{Endpoint, Input};

/// Maximum segment data size: the largest payload a single cTCP segment may carry.
pub const MSS: usize = 1400;

/// The timer period cTCP runs its retransmission clock at, spec.md §4.1/§4.2.
pub const TIMER: Duration = Duration::from_millis(40);
/// The retransmission timeout: 5 timer ticks with no progress.
pub const RT_TIMEOUT: Duration = Duration::from_millis(200);
/// The number of retransmission attempts after which a connection tears down.
pub const MAX_RT_ATTEMPTS: u8 = 5;
/// The number of timer ticks without progress that triggers a retransmission.
pub const TICKS_PER_RT: u32 = 5;

/// Connection configuration, written back by `open()` per spec.md §4.1/§4.2.
#[derive(Clone, Copy)]
pub struct Cfg {
	pub timer: Duration,
	pub rt_timeout: Duration,
	pub send_window: usize,
}

impl Default for Cfg {
	fn default() -> Self {
		Self { timer: TIMER, rt_timeout: RT_TIMEOUT, send_window: MSS }
	}
}
