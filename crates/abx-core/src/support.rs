//! Injected network-side predicates.
//!
//! Regex validity and punycode mapping are host concerns; the parser only
//! needs yes/no answers. Defaults parse with `regex-syntax` (no matcher is
//! built) and map hostnames with `idna`.

/// External predicates used by network-filter analysis.
pub trait NetSupport {
    /// Whether `source` is a valid regular expression body.
    fn regex_is_valid(&self, source: &str) -> bool;

    /// Map one hostname label (or a dotted host) to its ASCII/punycode
    /// form. `None` on failure.
    fn to_ascii(&self, host: &str) -> Option<String>;
}

/// Default implementation backed by `regex-syntax` and `idna`.
///
/// Note: `regex-syntax` rejects ECMAScript-only constructs such as
/// lookaround; callers that need those semantics inject their own check.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNetSupport;

impl NetSupport for DefaultNetSupport {
    fn regex_is_valid(&self, source: &str) -> bool {
        regex_syntax::Parser::new().parse(source).is_ok()
    }

    fn to_ascii(&self, host: &str) -> Option<String> {
        match idna::domain_to_ascii(host) {
            Ok(mapped) if !mapped.is_empty() => Some(mapped),
            _ => None,
        }
    }
}
