// ugBC - A retargetable BASIC compiler creating binaries for 8-bit home computers
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Wildcard patterns of `GLOBAL` and `SHARED` declarations.
//!
//! `*` matches any run of characters and `?` exactly one. Matching is
//! case-insensitive.

/// Match `name` against a wildcard `pattern`.
pub fn matches(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().map(|c| c.to_ascii_uppercase()).collect();
    let n: Vec<char> = name.chars().map(|c| c.to_ascii_uppercase()).collect();

    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// A list of visibility patterns.
#[derive(Debug, Clone, Default)]
pub struct Patterns {
    patterns: Vec<String>,
}

impl Patterns {
    pub fn add(&mut self, pattern: impl Into<String>) {
        self.patterns.push(pattern.into());
    }

    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| matches(p, name))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        assert!(matches("score*", "SCORE"));
        assert!(matches("score*", "scoreHigh"));
        assert!(matches("?X", "PX"));
        assert!(!matches("?X", "PPX"));
        assert!(matches("*", "anything$"));
        assert!(matches("a*b*c", "aXXbYYc"));
        assert!(!matches("a*b*c", "aXXbYY"));
        assert!(matches("NAME", "name"));
    }

    #[test]
    fn test_pattern_list() {
        let mut patterns = Patterns::default();
        assert!(!patterns.matches("X"));
        patterns.add("PLAYER*");
        assert!(patterns.matches("PLAYERX"));
        assert!(!patterns.matches("ENEMYX"));
    }
}
