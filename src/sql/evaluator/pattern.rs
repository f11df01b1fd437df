/// LIKE / REGEXP pattern compilation with an LRU of compiled patterns
use lru::LruCache;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::error::Result;

const PATTERN_CACHE_CAPACITY: usize = 256;

/// Compiled LIKE pattern. Matching is case-insensitive, so the pattern and
/// the text are both lower-cased before comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum LikePattern {
    /// No wildcards: "abc"
    Exact(String),
    /// "abc%"
    Prefix(String),
    /// "%abc"
    Suffix(String),
    /// "%abc%"
    Contains(String),
    /// Anything else
    Complex(Vec<PatternSegment>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PatternSegment {
    Char(char),
    /// `_`
    AnyChar,
    /// `%`
    AnyChars,
}

impl LikePattern {
    pub fn compile(pattern: &str, escape: char) -> Self {
        let mut segments = Vec::new();
        let mut chars = pattern.chars().flat_map(char::to_lowercase);
        while let Some(c) = chars.next() {
            if c == escape {
                // An escape at the very end stands for itself
                segments.push(PatternSegment::Char(chars.next().unwrap_or(escape)));
                continue;
            }
            segments.push(match c {
                '%' => PatternSegment::AnyChars,
                '_' => PatternSegment::AnyChar,
                c => PatternSegment::Char(c),
            });
        }

        let literal = |segs: &[PatternSegment]| -> Option<String> {
            segs.iter()
                .map(|s| match s {
                    PatternSegment::Char(c) => Some(*c),
                    _ => None,
                })
                .collect()
        };

        let n = segments.len();
        if let Some(text) = literal(&segments) {
            return LikePattern::Exact(text);
        }
        if n >= 1 && segments[n - 1] == PatternSegment::AnyChars {
            if let Some(text) = literal(&segments[..n - 1]) {
                return LikePattern::Prefix(text);
            }
        }
        if n >= 1 && segments[0] == PatternSegment::AnyChars {
            if let Some(text) = literal(&segments[1..]) {
                return LikePattern::Suffix(text);
            }
        }
        if n >= 2 && segments[0] == PatternSegment::AnyChars && segments[n - 1] == PatternSegment::AnyChars {
            if let Some(text) = literal(&segments[1..n - 1]) {
                return LikePattern::Contains(text);
            }
        }

        LikePattern::Complex(segments)
    }

    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        match self {
            LikePattern::Exact(p) => text == *p,
            LikePattern::Prefix(p) => text.starts_with(p.as_str()),
            LikePattern::Suffix(p) => text.ends_with(p.as_str()),
            LikePattern::Contains(p) => text.contains(p.as_str()),
            LikePattern::Complex(segments) => {
                let chars: Vec<char> = text.chars().collect();
                match_segments(&chars, segments)
            }
        }
    }
}

/// Wildcard match with single-point backtracking on the last `%`
fn match_segments(text: &[char], segments: &[PatternSegment]) -> bool {
    let (mut ti, mut si) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < text.len() {
        match segments.get(si) {
            Some(PatternSegment::AnyChars) => {
                star = Some((si, ti));
                si += 1;
            }
            Some(PatternSegment::AnyChar) => {
                ti += 1;
                si += 1;
            }
            Some(PatternSegment::Char(c)) if *c == text[ti] => {
                ti += 1;
                si += 1;
            }
            _ => match star {
                Some((star_si, star_ti)) => {
                    si = star_si + 1;
                    ti = star_ti + 1;
                    star = Some((star_si, star_ti + 1));
                }
                None => return false,
            },
        }
    }

    segments[si..].iter().all(|s| *s == PatternSegment::AnyChars)
}

/// Compiled LIKE and REGEXP patterns, keyed by their source text
pub struct PatternCache {
    like: Mutex<LruCache<(String, char), Arc<LikePattern>>>,
    regex: Mutex<LruCache<String, Arc<Regex>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        let capacity = NonZeroUsize::new(PATTERN_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            like: Mutex::new(LruCache::new(capacity)),
            regex: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn like(&self, pattern: &str, escape: char) -> Arc<LikePattern> {
        let key = (pattern.to_string(), escape);
        let mut cache = self.like.lock();
        if let Some(compiled) = cache.get(&key) {
            return Arc::clone(compiled);
        }
        let compiled = Arc::new(LikePattern::compile(pattern, escape));
        cache.put(key, Arc::clone(&compiled));
        compiled
    }

    pub fn regex(&self, pattern: &str) -> Result<Arc<Regex>> {
        let mut cache = self.regex.lock();
        if let Some(compiled) = cache.get(pattern) {
            return Ok(Arc::clone(compiled));
        }
        let compiled = Arc::new(RegexBuilder::new(pattern).case_insensitive(true).build()?);
        cache.put(pattern.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.like.lock().len() + self.regex.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn like(text: &str, pattern: &str) -> bool {
        LikePattern::compile(pattern, '\\').matches(text)
    }

    #[test]
    fn test_fast_paths_are_chosen() {
        assert_eq!(LikePattern::compile("abc", '\\'), LikePattern::Exact("abc".into()));
        assert_eq!(LikePattern::compile("ab%", '\\'), LikePattern::Prefix("ab".into()));
        assert_eq!(LikePattern::compile("%ab", '\\'), LikePattern::Suffix("ab".into()));
        assert_eq!(LikePattern::compile("%ab%", '\\'), LikePattern::Contains("ab".into()));
        assert!(matches!(LikePattern::compile("a_c", '\\'), LikePattern::Complex(_)));
    }

    #[test]
    fn test_like_matching() {
        assert!(like("Alice", "a%"));
        assert!(like("alice", "%ICE"));
        assert!(like("bob", "b_b"));
        assert!(!like("bob", "b_"));
        assert!(like("", "%"));
        assert!(like("abcabc", "%b%c"));
        assert!(like("mississippi", "m%iss%pi"));
        assert!(!like("mississippi", "m%x%pi"));
    }

    #[test]
    fn test_escape_literalises_wildcards() {
        assert!(like("50%", "50\\%"));
        assert!(!like("500", "50\\%"));
        assert!(like("a_b", "a\\_b"));
        assert!(!like("axb", "a\\_b"));
        assert!(LikePattern::compile("10!%", '!').matches("10%"));
    }

    #[test]
    fn test_cache_reuses_compiled_patterns() {
        let cache = PatternCache::new();
        let a = cache.like("a%", '\\');
        let b = cache.like("a%", '\\');
        assert!(Arc::ptr_eq(&a, &b));
        assert!(cache.regex("^A.*").unwrap().is_match("abc"));
        assert_eq!(cache.len(), 2);
        assert!(cache.regex("(").is_err());
    }
}
