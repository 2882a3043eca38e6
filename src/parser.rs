//! Tag-list grammar shared by the `DKIM-Signature` header (C2) and key
//! records (C6) — both are `tag-list = tag-spec *( ";" tag-spec ) [ ";" ]`
//! per RFC 6376 §3.2.

use crate::errors::DKIMError;
use crate::hash::HashAlgo;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::alpha1;
use nom::combinator::opt;
use nom::multi::fold_many0;
use nom::sequence::{delimited, preceded};
use nom::IResult;

#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    pub name: String,
    /// Value with folding whitespace removed.
    pub value: String,
}

/// Parses a full tag list. Tolerant of a trailing `;` (dropped). `;`
/// never appears inside a tag-value (it falls outside the valchar
/// range), so splitting on it first and parsing each item independently
/// means one malformed item can't swallow the rest of the list: a
/// segment that doesn't parse as a whole `tag-spec` is simply skipped,
/// and scanning resumes at the next `;`-delimited item. This never fails
/// outright (SPEC_FULL.md §4.2: "does not fail fatally on malformed
/// items; it skips them"), so it returns the tags directly rather than
/// a `Result`.
pub fn tag_list(input: &str) -> Vec<Tag> {
    let mut items: Vec<&str> = input.split(';').collect();
    if items.last().map(|s| s.trim().is_empty()).unwrap_or(false) {
        items.pop();
    }

    let mut tags = Vec::new();
    for item in items {
        if item.trim().is_empty() {
            continue;
        }
        if let Ok((remainder, tag)) = tag_spec(item) {
            if remainder.trim().is_empty() {
                tags.push(tag);
            }
        }
    }

    tags
}

/// tag-spec  =  [FWS] tag-name [FWS] "=" [FWS] tag-value [FWS]
fn tag_spec(input: &str) -> IResult<&str, Tag> {
    let (input, name) = delimited(opt(fws), tag_name, opt(fws))(input)?;
    let (input, _) = tag("=")(input)?;
    let (input, value) = delimited(opt(fws), tag_value, opt(fws))(input)?;

    Ok((
        input,
        Tag {
            name: name.to_owned(),
            value,
        },
    ))
}

/// tag-name  =  ALPHA *ALNUMPUNC
fn tag_name(input: &str) -> IResult<&str, &str> {
    alpha1(input)
}

/// tag-value, folding whitespace between value-chars collapsed away.
fn tag_value(input: &str) -> IResult<&str, String> {
    let is_valchar = |c| ('!'..=':').contains(&c) || ('<'..='~').contains(&c);
    match opt(take_while1(is_valchar))(input)? {
        (input, Some(start)) => fold_many0(
            preceded(fws, take_while1(is_valchar)),
            || start.to_owned(),
            |mut acc: String, item| {
                acc += item;
                acc
            },
        )(input),
        (input, None) => Ok((input, "".to_string())),
    }
}

/// Folding whitespace: at least one of SP, HTAB, CR, LF.
fn fws(input: &str) -> IResult<&str, &str> {
    take_while1(|c| c == ' ' || c == '\t' || c == '\r' || c == '\n')(input)
}

/// Parses the `a=` tag into `(keytype, HashAlgo)`. Only `rsa-sha1` and
/// `rsa-sha256` are currently recognized.
pub fn parse_hash_algo(value: &str) -> Result<(String, HashAlgo), DKIMError> {
    match value {
        "rsa-sha1" => Ok(("rsa".to_owned(), HashAlgo::RsaSha1)),
        "rsa-sha256" => Ok(("rsa".to_owned(), HashAlgo::RsaSha256)),
        other => Err(DKIMError::UnsupportedHashAlgorithm(other.to_owned())),
    }
}

/// Parses `c=` into `(header canonicalization, body canonicalization)`.
/// Absent `c=` defaults to `simple/simple`; a bare `simple`/`relaxed`
/// (no `/`) defaults the body half to `simple`.
pub fn parse_canonicalization(
    value: Option<&str>,
) -> Result<(crate::canonicalization::Type, crate::canonicalization::Type), DKIMError> {
    use crate::canonicalization::Type::{Relaxed, Simple};

    let value = match value {
        None => return Ok((Simple, Simple)),
        Some(v) => v,
    };

    match value.split_once('/') {
        None => match value {
            "simple" => Ok((Simple, Simple)),
            "relaxed" => Ok((Relaxed, Simple)),
            other => Err(DKIMError::UnsupportedCanonicalizationHeader(other.to_owned())),
        },
        Some((header, body)) => {
            let header = match header {
                "simple" => Simple,
                "relaxed" => Relaxed,
                other => {
                    return Err(DKIMError::UnsupportedCanonicalizationHeader(
                        other.to_owned(),
                    ))
                }
            };
            let body = match body {
                "simple" => Simple,
                "relaxed" => Relaxed,
                other => {
                    return Err(DKIMError::UnsupportedCanonicalizationBody(other.to_owned()))
                }
            };
            Ok((header, body))
        }
    }
}
