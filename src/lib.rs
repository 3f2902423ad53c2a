//! mesh_udp_monitor: decoder and monitor for mesh-radio UDP multicast traffic

pub mod config;
pub mod keys;
pub mod decrypt;
pub mod format;
pub mod decode;
pub mod capture;
pub mod replay;
pub mod orchestrator;
pub mod monitor;
pub mod nodes;
pub mod listener;
pub mod parser {
	pub mod schema;
	pub mod envelope;
}
