//! The routing table: longest-prefix-match over a flat set of entries (spec.md §3.6).

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

#[derive(Clone, Debug)]
pub struct Entry {
	pub dest: Ipv4Addr,
	pub mask: Ipv4Addr,
	pub gw: Ipv4Addr,
	pub iface: String,
}

#[derive(Default)]
pub struct Table {
	entries: Vec<Entry>,
}

impl Table {
	/// Loads `dest gw mask iface` lines, whitespace-separated, one entry per line. A
	/// malformed line is a configuration-time error (spec.md §6/§7).
	pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
		let text = fs::read_to_string(path.as_ref()).map_err(|err| format!("Failed to read routing table: {err}"))?;

		let mut entries = Vec::new();

		for (lineno, line) in text.lines().enumerate() {
			let line = line.trim();

			if line.is_empty() || line.starts_with('#') {
				continue;
			}

			let mut fields = line.split_whitespace();

			let parse_addr = |s: Option<&str>| -> Result<Ipv4Addr, String> {
				s.ok_or_else(|| format!("line {}: missing field", lineno + 1))?
					.parse()
					.map_err(|_| format!("line {}: invalid address", lineno + 1))
			};

			let dest = parse_addr(fields.next())?;
			let gw = parse_addr(fields.next())?;
			let mask = parse_addr(fields.next())?;
			let iface = fields.next().ok_or_else(|| format!("line {}: missing iface", lineno + 1))?.to_string();

			entries.push(Entry { dest, mask, gw, iface });
		}

		Ok(Self { entries })
	}

	/// Longest-prefix match: the entry with the largest `mask` such that `mask & target
	/// == dest`. No other entry in the table has a longer matching prefix.
	pub fn lookup(&self, target: Ipv4Addr) -> Option<&Entry> {
		let target = u32::from(target);

		self.entries
			.iter()
			.filter(|e| {
				let mask = u32::from(e.mask);
				u32::from(e.dest) & mask == target & mask
			})
			.max_by_key(|e| u32::from(e.mask))
	}

	pub fn insert(&mut self, entry: Entry) {
		self.entries.push(entry);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn longest_prefix_wins() {
		let mut table = Table::default();
		table.insert(Entry { dest: "10.0.0.0".parse().unwrap(), mask: "255.0.0.0".parse().unwrap(), gw: "0.0.0.0".parse().unwrap(), iface: "eth0".into() });
		table.insert(Entry { dest: "10.0.1.0".parse().unwrap(), mask: "255.255.255.0".parse().unwrap(), gw: "192.168.2.1".parse().unwrap(), iface: "eth2".into() });

		let hit = table.lookup("10.0.1.5".parse().unwrap()).unwrap();
		assert_eq!(hit.iface, "eth2");
	}

	#[test]
	fn no_match_returns_none() {
		let table = Table::default();
		assert!(table.lookup("1.2.3.4".parse().unwrap()).is_none());
	}

	#[test]
	fn malformed_line_is_rejected() {
		let path = std::env::temp_dir().join(format!("router-routing-table-test-{}", std::process::id()));
		fs::write(&path, "10.0.0.0 192.168.1.1\n").unwrap();
		let result = Table::load(&path);
		let _ = fs::remove_file(&path);
		assert!(result.is_err());
	}
}
