pub mod arp;
pub mod dispatch;
pub mod link;
pub mod nat;
pub mod routing;

pub use dispatch::Router;
pub use link::{Iface, Link};
