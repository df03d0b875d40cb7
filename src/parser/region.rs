use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

/// A named structural pattern. Capture group 1 is the region body.
#[derive(Debug, Clone)]
pub struct RegionMatcher {
    pub name: &'static str,
    re: Regex,
}

impl RegionMatcher {
    pub fn new(name: &'static str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(RegionMatcher {
            name,
            re: Regex::new(pattern)?,
        })
    }

    fn find_all<'h>(&self, html: &'h str) -> Vec<&'h str> {
        self.re
            .captures_iter(html)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionRule {
    /// Longest match across all matchers; ties go to the earlier matcher, then the earlier match.
    LongestMatch,
    /// First match of the first matcher that matches anything.
    FirstMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region<'a> {
    pub text: &'a str,
    /// `None` when nothing matched and the whole document was taken.
    pub matcher: Option<&'static str>,
}

static DEFAULT_MATCHERS: LazyLock<Vec<RegionMatcher>> = LazyLock::new(|| {
    [
        ("main", r"(?is)<main\b[^>]*>(.*?)</main\s*>"),
        ("article", r"(?is)<article\b[^>]*>(.*?)</article\s*>"),
        (
            "content-class",
            r#"(?is)<div\b[^>]*\bclass\s*=\s*["'][^"']*(?:content|post|entry)[^"']*["'][^>]*>(.*?)</div\s*>"#,
        ),
        ("body", r"(?is)<body\b[^>]*>(.*?)</body\s*>"),
    ]
    .into_iter()
    .map(|(name, pattern)| RegionMatcher::new(name, pattern).unwrap())
    .collect()
});

/// Picks the article body out of a full page.
///
/// The default longest-match rule assumes the article is the largest structural
/// block. Pages with a bigger non-article `<main>` or wrapper div will select the
/// wrong region; swap the matcher list or rule to change that.
#[derive(Debug, Clone)]
pub struct RegionSelector {
    matchers: Vec<RegionMatcher>,
    rule: SelectionRule,
}

impl Default for RegionSelector {
    fn default() -> Self {
        RegionSelector::with_rule(SelectionRule::LongestMatch)
    }
}

impl RegionSelector {
    pub fn new(matchers: Vec<RegionMatcher>, rule: SelectionRule) -> Self {
        RegionSelector { matchers, rule }
    }

    /// The built-in `main` / `article` / content-class / `body` matchers.
    pub fn with_rule(rule: SelectionRule) -> Self {
        RegionSelector::new(DEFAULT_MATCHERS.clone(), rule)
    }

    pub fn select<'a>(&self, html: &'a str) -> Region<'a> {
        let picked = match self.rule {
            SelectionRule::LongestMatch => self.longest(html),
            SelectionRule::FirstMatch => self
                .matchers
                .iter()
                .find_map(|m| m.find_all(html).first().map(|text| (m.name, *text))),
        };

        match picked {
            Some((name, text)) => Region {
                text,
                matcher: Some(name),
            },
            None => Region {
                text: html,
                matcher: None,
            },
        }
    }

    fn longest<'a>(&self, html: &'a str) -> Option<(&'static str, &'a str)> {
        let mut best: Option<(&'static str, &'a str, usize)> = None;
        for m in &self.matchers {
            for text in m.find_all(html) {
                let len = text.chars().count();
                if best.map_or(true, |(_, _, best_len)| len > best_len) {
                    best = Some((m.name, text, len));
                }
            }
        }
        best.map(|(name, text, _)| (name, text))
    }
}
