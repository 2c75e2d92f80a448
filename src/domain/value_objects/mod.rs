use anyhow::Context;
use regex::Regex;

/// Optional allow-pattern set for recipient addresses. When no patterns are
/// configured every address is eligible; otherwise an address must match at
/// least one pattern. Matching is unanchored, like a substring search.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    patterns: Option<Vec<Regex>>,
}

impl Whitelist {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn from_patterns(patterns: &[String]) -> anyhow::Result<Self> {
        let compiled = patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("invalid whitelist pattern {p:?}")))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            patterns: Some(compiled),
        })
    }

    pub fn allows(&self, address: &str) -> bool {
        match &self.patterns {
            None => true,
            Some(patterns) => patterns.iter().any(|p| p.is_match(address)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_whitelist_allows_everything() {
        let whitelist = Whitelist::allow_all();
        assert!(whitelist.allows("anyone@anywhere.test"));
    }

    #[test]
    fn address_must_match_at_least_one_pattern() {
        let whitelist =
            Whitelist::from_patterns(&["@example\\.com$".to_string(), "@corp\\.test$".to_string()])
                .unwrap();
        assert!(whitelist.allows("ok@example.com"));
        assert!(whitelist.allows("ok@corp.test"));
        assert!(!whitelist.allows("outsider@elsewhere.org"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(Whitelist::from_patterns(&["(unclosed".to_string()]).is_err());
    }
}
