// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint pattern validation and concrete-path matching.
//!
//! An endpoint is a `/`-separated pattern whose segments are either literal
//! text or a `%{parameter}` placeholder. A placeholder matches exactly one
//! non-empty, slash-free segment of a concrete path.

/// Validate an endpoint pattern.
///
/// Rules: leading `/`, at least one segment, no empty segments, placeholders
/// are whole segments of the form `%{name}` with a non-empty name.
pub(crate) fn validate_endpoint(endpoint: &str) -> Result<(), &'static str> {
    let Some(rest) = endpoint.strip_prefix('/') else {
        return Err("must start with /");
    };
    if rest.is_empty() {
        return Err("must have at least one segment");
    }
    for segment in rest.split('/') {
        if segment.is_empty() {
            return Err("empty segment");
        }
        if segment.contains('%') || segment.contains('{') || segment.contains('}') {
            let Some(name) = segment
                .strip_prefix("%{")
                .and_then(|s| s.strip_suffix('}'))
            else {
                return Err("malformed placeholder segment");
            };
            if name.is_empty() || name.contains('{') || name.contains('}') {
                return Err("malformed placeholder name");
            }
        }
    }
    Ok(())
}

/// Whether `path` is a well-formed concrete path: leading `/`, `/` as
/// separator, no empty segments.
pub(crate) fn is_valid_concrete_path(path: &str) -> bool {
    match path.strip_prefix('/') {
        Some(rest) => !rest.is_empty() && rest.split('/').all(|segment| !segment.is_empty()),
        None => false,
    }
}

/// Match a concrete path against an endpoint pattern, segment by segment.
///
/// Segment counts must be equal; `%{name}` segments match any concrete
/// segment, literal segments must compare equal.
pub(crate) fn endpoint_matches(endpoint: &str, concrete: &str) -> bool {
    let mut pattern = endpoint.split('/');
    let mut path = concrete.split('/');

    loop {
        match (pattern.next(), path.next()) {
            (None, None) => return true,
            (Some(p), Some(c)) => {
                let is_placeholder = p.starts_with("%{") && p.ends_with('}');
                if !is_placeholder && p != c {
                    return false;
                }
            }
            _ => return false,
        }
    }
}
