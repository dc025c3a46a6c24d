//! Shared glob-style pattern matcher.
//!
//! Implements spec.md §4.2/§9's position-scan matcher — no regex crate, a
//! single linear scan supporting `*` (any run, including empty) and `?`
//! (exactly one character). Shared between the route table (matching a
//! key against a route pattern) and the file backend (matching a `List`
//! prefix/glob against on-disk keys) so the two never drift apart.

/// Returns whether `text` matches `pattern`, where `*` matches zero or
/// more characters and `?` matches exactly one character. Both operate on
/// Unicode scalar values, not bytes.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    match_from(&p, 0, &t, 0)
}

/// A pattern pre-split into `char`s once, so a route table holding many
/// patterns doesn't re-walk the same pattern string on every lookup.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    chars: Vec<char>,
}

impl CompiledPattern {
    pub fn compile(pattern: &str) -> Self {
        Self { chars: pattern.chars().collect() }
    }

    pub fn matches(&self, text: &str) -> bool {
        let t: Vec<char> = text.chars().collect();
        match_from(&self.chars, 0, &t, 0)
    }
}

fn match_from(p: &[char], pi: usize, t: &[char], ti: usize) -> bool {
    // Backtracking scan: on a `*` remember the position and try the
    // smallest possible match first, advancing the text pointer on
    // failure until the pattern catches up or text is exhausted.
    let mut pi = pi;
    let mut ti = ti;
    let mut star_pi: Option<usize> = None;
    let mut star_ti: usize = 0;

    loop {
        if pi < p.len() {
            match p[pi] {
                '*' => {
                    star_pi = Some(pi);
                    star_ti = ti;
                    pi += 1;
                    continue;
                }
                '?' if ti < t.len() => {
                    pi += 1;
                    ti += 1;
                    continue;
                }
                c if ti < t.len() && c == t[ti] => {
                    pi += 1;
                    ti += 1;
                    continue;
                }
                _ => {}
            }
        } else if ti == t.len() {
            return true;
        }

        if let Some(sp) = star_pi {
            star_ti += 1;
            if star_ti > t.len() {
                return false;
            }
            pi = sp + 1;
            ti = star_ti;
        } else {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(glob_match("foo", "foo"));
        assert!(!glob_match("foo", "foobar"));
    }

    #[test]
    fn star_matches_any_run() {
        assert!(glob_match("foo/*", "foo/bar/baz"));
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("a*c", "abc"));
        assert!(glob_match("a*c", "ac"));
        assert!(!glob_match("a*c", "ab"));
    }

    #[test]
    fn question_matches_single_char() {
        assert!(glob_match("fo?", "foo"));
        assert!(!glob_match("fo?", "fo"));
        assert!(!glob_match("fo?", "fooo"));
    }

    #[test]
    fn combined_wildcards() {
        assert!(glob_match("users/*/profile?", "users/42/profile1"));
        assert!(!glob_match("users/*/profile?", "users/42/profile"));
    }

    #[test]
    fn empty_pattern_matches_only_empty_text() {
        assert!(glob_match("", ""));
        assert!(!glob_match("", "x"));
    }

    #[test]
    fn compiled_pattern_matches_same_as_glob_match() {
        let compiled = CompiledPattern::compile("users/*/profile?");
        assert!(compiled.matches("users/42/profile1"));
        assert!(!compiled.matches("users/42/profile"));
    }
}
