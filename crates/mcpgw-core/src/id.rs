//! Server-id synthesis for ad-hoc commands (spec §6).

use md5::{Digest, Md5};

/// First 12 hex characters of the MD5 digest of `command`'s UTF-8 bytes.
///
/// Deterministic in `command`; collisions are tolerated, not
/// security-critical (spec §3 invariants, §8 "Id stability").
#[must_use]
pub fn synthesize(command: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(command.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_input() {
        assert_eq!(synthesize("npx -y echo-server"), synthesize("npx -y echo-server"));
    }

    #[test]
    fn differs_for_distinct_commands() {
        assert_ne!(synthesize("a"), synthesize("b"));
    }

    #[test]
    fn is_twelve_hex_chars() {
        let id = synthesize("anything");
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
