//! The host-provided collaborators cTCP is built against, mirroring spec.md §6's
//! `conn_input`/`conn_output`/`conn_send`/`conn_remove`/`end_client` one for one. The
//! link emulator and application plumbing that implement this trait are out of scope
//! (spec.md §1); expressing them as a trait lets the state machines in
//! [`crate::stop_and_wait`] and [`crate::go_back_n`] be built and tested against a fake
//! without the real link layer.

/// The result of a [`Endpoint::conn_input`] call.
pub enum Input {
	/// No bytes are currently available.
	None,
	/// `n` bytes were read into the caller's buffer.
	Data(usize),
	/// The input stream is at EOF; no more bytes will ever be available.
	Eof,
}

pub trait Endpoint {
	/// Reads up to `buf.len()` bytes of pending application input.
	fn conn_input(&mut self, buf: &mut [u8]) -> Input;

	/// Delivers `buf` to the application's output stream, returning the number of
	/// bytes actually written (the caller may be bounded by [`Endpoint::conn_bufspace`]).
	fn conn_output(&mut self, buf: &[u8]) -> usize;

	/// The number of free bytes in the application's output buffer.
	fn conn_bufspace(&self) -> usize;

	/// Signals that the peer has closed its half of the stream; no further
	/// `conn_output` calls will follow.
	fn conn_eof(&mut self);

	/// Hands a cTCP segment to the unreliable link emulator.
	fn conn_send(&mut self, buf: &[u8]);

	/// Destroys link-layer state associated with this connection.
	fn conn_remove(&mut self);

	/// Terminates the host process after this connection ends.
	fn end_client(&mut self);
}
