//! Pack pattern matching: decides which paths belong to a whole-subtree,
//! content-addressed pack rather than being stored loose.
//!
//! A project's `pack_patterns` are regexes matched unanchored against a
//! path. The pack "root" a matching path belongs to is the full text the
//! regex matched — e.g. `^pack1/.*/` matched against `pack1/x/a` greedily
//! backtracks to the last `/`, producing a match of `pack1/x/`, which is
//! exactly the root the whole subtree is packed under (spec §8 scenario
//! 4).

use regex::Regex;

use dl_util::error::{Error, ErrContext};

#[derive(Debug, Clone)]
pub struct PackPatterns {
	patterns: Vec<Regex>,
}

impl PackPatterns {
	pub fn compile(raw: &[String]) -> Result<Self, Error> {
		let patterns = raw
			.iter()
			.map(|p| Regex::new(p).err_context(format!("invalid pack pattern {}", p)))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self { patterns })
	}

	pub fn empty() -> Self {
		Self { patterns: Vec::new() }
	}

	/// The pack root `path` belongs to, if any pattern matches.
	pub fn root_for(&self, path: &str) -> Option<String> {
		self.patterns
			.iter()
			.find_map(|re| re.find(path).map(|m| path[..m.end()].to_string()))
	}

	pub fn is_empty(&self) -> bool {
		self.patterns.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn derives_root_from_greedy_match() {
		let patterns = PackPatterns::compile(&["^pack1/.*/".to_string()]).unwrap();
		assert_eq!(patterns.root_for("pack1/x/a"), Some("pack1/x/".to_string()));
		assert_eq!(patterns.root_for("pack1/x/b"), Some("pack1/x/".to_string()));
		assert_eq!(patterns.root_for("other/a"), None);
	}

	#[test]
	fn no_patterns_matches_nothing() {
		let patterns = PackPatterns::empty();
		assert_eq!(patterns.root_for("pack1/x/a"), None);
	}
}
