//! The `DKIM-Signature` tag map (C2's `SignatureTags`).
//!
//! This only parses and exposes the tags rather than bailing out on the
//! first broken one — every semantic check (version, domain, expiry,
//! ...) lives in the orchestrator so it can accumulate one verdict per
//! failure instead of stopping at the first one. A missing required tag
//! still produces a verdict, but does not abort the whole scan: later
//! steps that depend on it are simply skipped.

use crate::parser;
use indexmap::IndexMap;

pub const HEADER: &str = "DKIM-Signature";
pub const REQUIRED_TAGS: &[&str] = &["v", "a", "b", "bh", "d", "h", "s"];

#[derive(Clone, Debug)]
pub struct SignatureTags {
    tags: IndexMap<String, parser::Tag>,
    raw: String,
}

impl SignatureTags {
    /// Parsing itself never fails (`parser::tag_list` just skips
    /// malformed items); missing or invalid tags are reported by the
    /// orchestrator's own checks, not here.
    pub fn parse(value: &str) -> Self {
        let mut tags_map = IndexMap::new();
        for tag in parser::tag_list(value) {
            tags_map.insert(tag.name.clone(), tag);
        }

        SignatureTags {
            tags: tags_map,
            raw: value.to_owned(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(|t| t.value.as_str())
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// All required tags that are absent, in canonical order, so the
    /// orchestrator can emit one `TAG_MISSING` verdict per missing tag.
    pub fn missing_required_tags(&self) -> Vec<&'static str> {
        REQUIRED_TAGS
            .iter()
            .copied()
            .filter(|name| self.get(name).is_none())
            .collect()
    }

    pub fn has_required_tags(&self) -> bool {
        self.missing_required_tags().is_empty()
    }

    /// Snapshot of every parsed tag's value, for attaching to a `Verdict`.
    pub fn snapshot(&self) -> IndexMap<String, String> {
        self.tags
            .iter()
            .map(|(k, t)| (k.clone(), t.value.clone()))
            .collect()
    }

    /// The original header value with the `b=` tag's value blanked out,
    /// everything else byte-for-byte unchanged (RFC 6376 §3.5: the
    /// signature itself is computed with `b=`'s value treated as empty).
    /// `;` never appears inside a tag-value (outside the valchar range),
    /// so splitting the raw text on `;` reproduces each `tag-spec`
    /// segment exactly.
    pub fn raw_with_blank_b(&self) -> String {
        self.raw
            .split(';')
            .map(|segment| {
                let trimmed = segment.trim_start();
                let name: String = trimmed.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
                if name == "b" {
                    let prefix_len = segment.len() - trimmed.len();
                    let (prefix, rest) = segment.split_at(prefix_len);
                    match rest.find('=') {
                        Some(eq) => format!("{}{}=", prefix, &rest[..eq]),
                        None => segment.to_owned(),
                    }
                } else {
                    segment.to_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_lookup() {
        let header = "v=1; a=rsa-sha256; d=example.net; s=brisbane; c=relaxed/simple; \
                      q=dns/txt; i=foo@eng.example.net; h=from:to:subject; \
                      bh=aGVsbG8=; b=c2lnbmF0dXJl";
        let tags = SignatureTags::parse(header);
        assert_eq!(tags.get("v"), Some("1"));
        assert_eq!(tags.get("d"), Some("example.net"));
        assert!(tags.has_required_tags());
    }

    #[test]
    fn test_raw_with_blank_b() {
        let header = "v=1; a=rsa-sha256; bh=aGVsbG8=; b=c2lnbmF0dXJl";
        let tags = SignatureTags::parse(header);
        assert_eq!(
            tags.raw_with_blank_b(),
            "v=1; a=rsa-sha256; bh=aGVsbG8=; b="
        );
    }

    #[test]
    fn test_raw_with_blank_b_preserves_bh_tag() {
        // a tag named `bh` must not be mistaken for `b`.
        let header = "v=1; bh=c2lnbmF0dXJl; b=xyz";
        let tags = SignatureTags::parse(header);
        assert_eq!(tags.raw_with_blank_b(), "v=1; bh=c2lnbmF0dXJl; b=");
    }

    #[test]
    fn test_missing_required_tags() {
        let header = "v=1; a=rsa-sha256; bh=a; b=b";
        let tags = SignatureTags::parse(header);
        assert_eq!(tags.missing_required_tags(), vec!["d", "h", "s"]);
    }
}
