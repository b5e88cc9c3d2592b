//! The filter parser.
//!
//! One reusable object per thread. `analyze` copies the line into an owned
//! buffer, decomposes it into slices, classifies it, and runs the
//! category-specific structural and semantic passes. Everything observable
//! afterwards (category, flavor bits, spans, option/token iterators,
//! compiled selector) reads from the parser until the next `analyze`.
//!
//! Errors never escape as panics or `Err`s: malformed input sets flavor
//! bits, and in interactive mode overlays ERROR/IGNORE bits on the
//! offending slices for editor highlighting.

use abx_selector::{SelectorCompiler, SelectorOracle};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::charclass::CharClass;
use crate::ext::{ExtCompiled, ExtOptionsIter};
use crate::net::{NetOptionsIter, OptionRecord};
use crate::slicer::{SliceBuf, Span, Spans, STRIDE};
use crate::support::{DefaultNetSupport, NetSupport};
use crate::tokens::PatternTokenIter;

/// Default ceiling for index-key extraction; see `set_max_token_length`.
const DEFAULT_MAX_TOKEN_LENGTH: usize = 7;

/// Leading hostname-like run of a network pattern, for punycode mapping.
static RE_PATTERN_HOSTNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-._%0-9a-z]|[^\x00-\x7F])+").unwrap());

// =============================================================================
// Category and flavor
// =============================================================================

/// Line classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    /// Blank line, or nothing recognizable.
    #[default]
    None,
    /// A comment line.
    Comment,
    /// An extended (cosmetic/scriptlet/HTML) filter.
    StaticExtFilter,
    /// A network filter.
    StaticNetFilter,
}

bitflags::bitflags! {
    /// Semantic properties of the analyzed line, orthogonal to category.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flavor: u32 {
        /// `@@` (network) or `#@#` (extended) exception.
        const EXCEPTION            = 1 << 0;
        /// Network pattern is a `/regex/` literal.
        const NET_REGEX            = 1 << 1;
        /// `|` left anchor.
        const NET_LEFT_URL_ANCHOR  = 1 << 2;
        /// Trailing `|` anchor.
        const NET_RIGHT_URL_ANCHOR = 1 << 3;
        /// `||` hostname anchor.
        const NET_LEFT_HN_ANCHOR   = 1 << 4;
        /// Trailing `^` hostname anchor.
        const NET_RIGHT_HN_ANCHOR  = 1 << 5;
        /// Pattern contained whitespace (hosts-file syntax).
        const NET_SPACE_IN_PATTERN = 1 << 6;
        /// `#$#` AdGuard style injection.
        const EXT_STYLE            = 1 << 7;
        /// `#?#` forced-procedural variant.
        const EXT_STRONG           = 1 << 8;
        /// Plain cosmetic filter.
        const EXT_COSMETIC         = 1 << 9;
        /// `+js(...)` scriptlet filter.
        const EXT_SCRIPTLET        = 1 << 10;
        /// `^`-prefixed HTML filter.
        const EXT_HTML             = 1 << 11;
        /// Valid but intentionally discarded.
        const IGNORE               = 1 << 12;
        /// Recognized but not implemented here.
        const UNSUPPORTED          = 1 << 13;
        /// Syntactically malformed.
        const ERROR                = 1 << 14;
    }
}

/// Construction options. `interactive` enables the ERROR/IGNORE slice
/// overlays used by editors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    pub interactive: bool,
}

// =============================================================================
// Parser
// =============================================================================

/// A reusable single-line filter parser.
pub struct FilterParser {
    pub(crate) interactive: bool,
    pub(crate) raw: String,
    pub(crate) slices: SliceBuf,
    pub(crate) spans: Spans,
    pub(crate) all_bits: CharClass,
    pub(crate) pattern_bits: CharClass,
    pub(crate) category: Category,
    pub(crate) flavor: Flavor,
    pub(crate) blank: bool,
    pub(crate) max_token_length: usize,
    pub(crate) net_option_records: Vec<OptionRecord>,
    pub(crate) ext_compiled: Option<ExtCompiled>,
    pub(crate) compiler: SelectorCompiler,
    pub(crate) support: Box<dyn NetSupport>,
}

impl FilterParser {
    pub fn new(options: ParserOptions) -> Self {
        Self::with_oracles(
            options,
            SelectorCompiler::new(),
            Box::new(DefaultNetSupport),
        )
    }

    /// Construct with injected predicates: a selector compiler wrapping the
    /// caller's CSS oracle, and the regex/punycode support.
    pub fn with_oracles(
        options: ParserOptions,
        compiler: SelectorCompiler,
        support: Box<dyn NetSupport>,
    ) -> Self {
        Self {
            interactive: options.interactive,
            raw: String::new(),
            slices: SliceBuf::default(),
            spans: Spans::default(),
            all_bits: CharClass::empty(),
            pattern_bits: CharClass::empty(),
            category: Category::None,
            flavor: Flavor::empty(),
            blank: true,
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
            net_option_records: Vec::new(),
            ext_compiled: None,
            compiler,
            support,
        }
    }

    /// Convenience around [`Self::with_oracles`] for a custom CSS oracle.
    pub fn with_css_oracle(options: ParserOptions, oracle: Box<dyn SelectorOracle>) -> Self {
        Self::with_oracles(
            options,
            SelectorCompiler::with_oracle(oracle),
            Box::new(DefaultNetSupport),
        )
    }

    // -------------------------------------------------------------------------
    // Analysis pipeline
    // -------------------------------------------------------------------------

    fn reset(&mut self) {
        self.spans = Spans::default();
        self.all_bits = CharClass::empty();
        self.pattern_bits = CharClass::empty();
        self.category = Category::None;
        self.flavor = Flavor::empty();
        self.blank = true;
        self.net_option_records.clear();
        self.ext_compiled = None;
        self.compiler.reset();
    }

    /// Analyze one logical line (no embedded newline).
    pub fn analyze(&mut self, line: &str) {
        self.reset();
        self.raw.clear();
        self.raw.push_str(line);
        self.all_bits = self.slices.slice_line(&self.raw);

        let end = self.slices.sentinel();
        self.spans.eol = Span { i: end, len: 0 };
        let left_len = if end > 0 && self.slices.bits(0).contains(CharClass::SPACE) {
            STRIDE
        } else {
            0
        };
        self.spans.left_space = Span { i: 0, len: left_len };
        let mut right = end;
        if end > STRIDE && self.slices.bits(end - STRIDE).contains(CharClass::SPACE) {
            right = end - STRIDE;
        }
        self.spans.right_space = Span { i: right, len: end - right };
        self.spans.comment = Span { i: right, len: 0 };

        let content = left_len;
        self.blank = content >= end;
        if self.blank {
            return;
        }

        let first = self.slices.bits(content);
        if first.intersects(CharClass::LINE_COMMENT) {
            if first.contains(CharClass::HASH) && self.analyze_ext(content) {
                self.analyze_ext_extra();
                return;
            }
            self.category = Category::Comment;
            self.spans.comment = Span {
                i: content,
                len: self.spans.right_space.i - content,
            };
            return;
        }

        if self.all_bits.contains(CharClass::HASH) {
            let bound = self.spans.right_space.i;
            let mut cell = content;
            while cell < bound && !self.slices.bits(cell).contains(CharClass::HASH) {
                cell += STRIDE;
            }
            if cell < bound && self.analyze_ext(cell) {
                self.analyze_ext_extra();
                return;
            }
        }

        if self.all_bits.contains(CharClass::SPACE) {
            // Hosts-file style trailing comment: `#` right after whitespace.
            let bound = self.spans.right_space.i;
            let mut cell = content + STRIDE;
            while cell < bound {
                if self.slices.bits(cell).contains(CharClass::HASH)
                    && self.slices.bits(cell - STRIDE).contains(CharClass::SPACE)
                {
                    self.spans.comment = Span {
                        i: cell - STRIDE,
                        len: bound - (cell - STRIDE),
                    };
                    break;
                }
                cell += STRIDE;
            }
        }

        self.analyze_net();
        self.analyze_net_extra();
    }

    /// Re-run the semantic pass of the current category. The pass is
    /// idempotent; interactive callers use this to refresh slice overlays.
    pub fn analyze_extra(&mut self) {
        match self.category {
            Category::StaticNetFilter => self.analyze_net_extra(),
            Category::StaticExtFilter => self.analyze_ext_extra(),
            _ => {}
        }
    }

    // -------------------------------------------------------------------------
    // Classification getters
    // -------------------------------------------------------------------------

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn spans(&self) -> &Spans {
        &self.spans
    }

    pub fn is_blank(&self) -> bool {
        self.blank
    }

    pub fn is_exception(&self) -> bool {
        self.flavor.contains(Flavor::EXCEPTION)
    }

    pub fn has_error(&self) -> bool {
        self.flavor.contains(Flavor::ERROR)
    }

    pub fn is_unsupported(&self) -> bool {
        self.flavor.contains(Flavor::UNSUPPORTED)
    }

    pub fn should_ignore(&self) -> bool {
        self.flavor.contains(Flavor::IGNORE)
    }

    /// True when any of Error, Unsupported or Ignore is set.
    pub fn should_discard(&self) -> bool {
        self.flavor
            .intersects(Flavor::ERROR | Flavor::UNSUPPORTED | Flavor::IGNORE)
    }

    // -------------------------------------------------------------------------
    // Network pattern getters
    // -------------------------------------------------------------------------

    /// The network pattern; for regex filters, the body without the
    /// enclosing slashes.
    pub fn net_pattern(&self) -> &str {
        let text = self.span_text(self.spans.pattern);
        if self.flavor.contains(Flavor::NET_REGEX) {
            text.get(1..text.len().saturating_sub(1)).unwrap_or("")
        } else {
            text
        }
    }

    /// Text of the options span (network options, or the hostname list of
    /// an extended filter).
    pub fn options_text(&self) -> &str {
        self.span_text(self.spans.options)
    }

    pub fn pattern_is_regex(&self) -> bool {
        self.flavor.contains(Flavor::NET_REGEX)
    }

    /// Empty pattern or a lone `*`.
    pub fn pattern_is_match_all(&self) -> bool {
        if self.flavor.contains(Flavor::NET_REGEX) {
            return false;
        }
        let p = self.spans.pattern;
        p.is_empty()
            || (p.len == STRIDE && self.slices.bits(p.i).contains(CharClass::ASTERISK))
    }

    /// `||hostname` or `||hostname^`, nothing but hostname bytes inside.
    pub fn pattern_is_plain_hostname(&self) -> bool {
        !self.spans.pattern.is_empty()
            && CharClass::HOSTNAME.contains(self.pattern_bits)
            && self.flavor.contains(Flavor::NET_LEFT_HN_ANCHOR)
            && !self.flavor.contains(Flavor::NET_RIGHT_URL_ANCHOR)
    }

    pub fn pattern_is_left_anchored(&self) -> bool {
        self.flavor.contains(Flavor::NET_LEFT_URL_ANCHOR)
    }

    pub fn pattern_is_right_anchored(&self) -> bool {
        self.flavor.contains(Flavor::NET_RIGHT_URL_ANCHOR)
    }

    pub fn pattern_is_left_hn_anchored(&self) -> bool {
        self.flavor.contains(Flavor::NET_LEFT_HN_ANCHOR)
    }

    pub fn pattern_is_right_hn_anchored(&self) -> bool {
        self.flavor.contains(Flavor::NET_RIGHT_HN_ANCHOR)
    }

    pub fn pattern_has_wildcard(&self) -> bool {
        self.pattern_bits.contains(CharClass::ASTERISK)
    }

    pub fn pattern_has_caret(&self) -> bool {
        self.pattern_bits.contains(CharClass::CARET)
    }

    pub fn pattern_has_unicode(&self) -> bool {
        self.pattern_bits.contains(CharClass::UNICODE)
    }

    pub fn pattern_has_uppercase(&self) -> bool {
        self.pattern_bits.contains(CharClass::UPPERCASE)
    }

    // -------------------------------------------------------------------------
    // Pattern transforms
    // -------------------------------------------------------------------------

    /// Lowercase the pattern region in place (ASCII only) and return it.
    /// UPPERCASE bits are cleared from the affected slices; now-equal
    /// neighbor slices are left unmerged.
    pub fn pattern_to_lowercase(&mut self) -> &str {
        let span = self.spans.pattern;
        if self.pattern_bits.contains(CharClass::UPPERCASE) && !span.is_empty() {
            let from = self.slices.origin(span.i);
            let to = self.slices.origin(span.end());
            // ASCII-only edits, so UTF-8 stays intact.
            let bytes = unsafe { self.raw.as_mut_str().as_bytes_mut() };
            for b in &mut bytes[from..to] {
                b.make_ascii_lowercase();
            }
            self.slices.clear_bits(span.i, span.end(), CharClass::UPPERCASE);
            self.pattern_bits -= CharClass::UPPERCASE;
        }
        self.span_text(span)
    }

    /// Punycode the leading hostname-like run of the pattern and
    /// re-analyze. Returns false on any failure: no hostname-like run, a
    /// label that will not map, or a regex pattern.
    pub fn to_punycode(&mut self) -> bool {
        if !self.pattern_has_unicode() {
            return true;
        }
        if self.spans.pattern.is_empty() {
            return true;
        }
        if self.pattern_is_regex() {
            return false;
        }
        let pattern_start = self.slices.origin(self.spans.pattern.i);
        let pattern = self.span_text(self.spans.pattern);
        let hn = match RE_PATTERN_HOSTNAME.find(pattern) {
            Some(m) => m.as_str(),
            None => return false,
        };
        if hn.is_ascii() {
            return false;
        }
        let hn_len = hn.len();
        let mut mapped = Vec::new();
        for label in hn.split('.') {
            if label.is_ascii() {
                mapped.push(label.to_string());
            } else {
                match self.support.to_ascii(label) {
                    Some(ascii) => mapped.push(ascii),
                    None => return false,
                }
            }
        }
        let mut rebuilt = String::with_capacity(self.raw.len());
        rebuilt.push_str(&self.raw[..pattern_start]);
        rebuilt.push_str(&mapped.join("."));
        rebuilt.push_str(&self.raw[pattern_start + hn_len..]);
        self.analyze(&rebuilt);
        true
    }

    // -------------------------------------------------------------------------
    // Iterators
    // -------------------------------------------------------------------------

    /// Parsed network options. Valid after `analyze`, until the next one.
    pub fn net_options(&self) -> NetOptionsIter<'_> {
        NetOptionsIter::new(self)
    }

    /// Hostname entries of an extended filter's options span.
    pub fn ext_options(&self) -> ExtOptionsIter<'_> {
        ExtOptionsIter::new(self)
    }

    /// Index-key candidates from the network pattern.
    pub fn pattern_tokens(&self) -> PatternTokenIter<'_> {
        PatternTokenIter::new(self)
    }

    /// Tokens at least this long may keep a trailing wildcard neighbor.
    pub fn set_max_token_length(&mut self, n: usize) {
        self.max_token_length = n;
    }

    /// Compiled payload of an extended filter, when compilation succeeded.
    pub fn ext_compiled(&self) -> Option<&ExtCompiled> {
        self.ext_compiled.as_ref()
    }

    // -------------------------------------------------------------------------
    // Slice/span plumbing shared by the analysis passes
    // -------------------------------------------------------------------------

    /// Split the slice at `cell` and shift every span starting strictly
    /// after it.
    pub(crate) fn split_slot(&mut self, cell: usize, left_len: usize) {
        self.slices.split(cell, left_len);
        self.spans.shift_after(cell);
    }

    pub(crate) fn span_text(&self, span: Span) -> &str {
        if span.is_empty() {
            return "";
        }
        &self.raw[self.slices.origin(span.i)..self.slices.origin(span.end())]
    }

    pub(crate) fn text_between(&self, from_cell: usize, to_cell: usize) -> &str {
        if from_cell >= to_cell {
            return "";
        }
        &self.raw[self.slices.origin(from_cell)..self.slices.origin(to_cell)]
    }

    /// Union of class bits over a span, overlay excluded.
    pub(crate) fn span_bits(&self, span: Span) -> CharClass {
        let mut bits = CharClass::empty();
        let mut cell = span.i;
        while cell < span.end() {
            bits |= self.slices.bits(cell).difference(CharClass::OVERLAY);
            cell += STRIDE;
        }
        bits
    }

    /// Every slice of `span` carries only bits from `mask`.
    pub(crate) fn span_within(&self, span: Span, mask: CharClass) -> bool {
        mask.contains(self.span_bits(span))
    }

    /// First cell from line start whose bits are not a subset of `mask`;
    /// the sentinel cell if none.
    pub(crate) fn first_cell_not_within(&self, mask: CharClass) -> usize {
        let end = self.spans.eol.i;
        let mut cell = 0;
        while cell < end {
            if !mask.contains(self.slices.bits(cell).difference(CharClass::OVERLAY)) {
                return cell;
            }
            cell += STRIDE;
        }
        end
    }

    pub(crate) fn mark_span(&mut self, span: Span, bits: CharClass) {
        self.slices.overlay(span.i, span.end(), bits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::NetOptionId;

    fn parser() -> FilterParser {
        FilterParser::new(ParserOptions { interactive: true })
    }

    fn analyzed(line: &str) -> FilterParser {
        let mut p = parser();
        p.analyze(line);
        p
    }

    // Every slice byte belongs to exactly one span, except slices that
    // analysis explicitly discarded (IGNORE overlay).
    fn assert_coverage(p: &FilterParser) {
        let s = p.spans();
        let mut spans = [
            s.left_space,
            s.exception,
            s.pattern_left_anchor,
            s.pattern,
            s.pattern_right_anchor,
            s.options_anchor,
            s.options,
            s.comment,
            s.right_space,
        ];
        spans.sort_by_key(|sp| sp.i);
        let mut cell = 0;
        for sp in spans.iter().filter(|sp| !sp.is_empty()) {
            assert!(sp.i >= cell, "overlapping spans in {:?}", p.raw());
            while cell < sp.i {
                assert!(
                    p.slices.bits(cell).contains(CharClass::IGNORE),
                    "uncovered slice at cell {cell} in {:?}",
                    p.raw()
                );
                cell += STRIDE;
            }
            cell = sp.end();
        }
        while cell < s.eol.i {
            assert!(
                p.slices.bits(cell).contains(CharClass::IGNORE),
                "uncovered tail slice at cell {cell} in {:?}",
                p.raw()
            );
            cell += STRIDE;
        }
    }

    #[test]
    fn test_blank_line() {
        let p = analyzed("   ");
        assert_eq!(p.category(), Category::None);
        assert!(p.is_blank());
        assert!(!p.should_discard());
        let p = analyzed("");
        assert!(p.is_blank());
    }

    #[test]
    fn test_scenario_plain_hostname() {
        let p = analyzed("||example.com^");
        assert_eq!(p.category(), Category::StaticNetFilter);
        assert!(p.pattern_is_left_hn_anchored());
        assert!(p.pattern_is_right_hn_anchored());
        assert!(!p.pattern_is_left_anchored());
        assert!(!p.is_exception());
        assert_eq!(p.net_pattern(), "example.com");
        assert_eq!(p.options_text(), "");
        assert!(p.pattern_is_plain_hostname());
        assert!(!p.should_discard());
        assert_coverage(&p);
    }

    #[test]
    fn test_scenario_exception_with_options() {
        let p = analyzed("@@||ads.example.com/banner$image,~third-party");
        assert_eq!(p.category(), Category::StaticNetFilter);
        assert!(p.is_exception());
        assert!(p.pattern_is_left_hn_anchored());
        assert_eq!(p.net_pattern(), "ads.example.com/banner");
        let options: Vec<_> = p.net_options().collect();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].id, NetOptionId::Image);
        assert_eq!(options[0].value, None);
        assert!(!options[0].negated);
        assert_eq!(options[1].id, NetOptionId::ThirdParty);
        assert_eq!(options[1].value, None);
        assert!(options[1].negated);
        assert!(!p.has_error());
        assert_coverage(&p);
    }

    #[test]
    fn test_scenario_comment() {
        let p = analyzed("! this is a comment");
        assert_eq!(p.category(), Category::Comment);
        assert!(!p.should_discard());
        let p = analyzed("[Adblock Plus 2.0]");
        assert_eq!(p.category(), Category::Comment);
        let p = analyzed("# hosts-style comment");
        assert_eq!(p.category(), Category::Comment);
    }

    #[test]
    fn test_scenario_cosmetic() {
        let p = analyzed("example.com##.ad-banner");
        assert_eq!(p.category(), Category::StaticExtFilter);
        assert!(p.flavor().contains(Flavor::EXT_COSMETIC));
        assert_eq!(p.options_text(), "example.com");
        assert_eq!(p.span_text(p.spans().pattern), ".ad-banner");
        match p.ext_compiled().unwrap() {
            ExtCompiled::Selector(sel) => {
                assert!(sel.is_plain());
                assert_eq!(sel.canonical, ".ad-banner");
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(!p.should_discard());
        assert_coverage(&p);
    }

    #[test]
    fn test_scenario_scriptlet_exception() {
        let p = analyzed("example.com#@#+js(nowebrtc)");
        assert_eq!(p.category(), Category::StaticExtFilter);
        assert!(p.is_exception());
        assert!(p.flavor().contains(Flavor::EXT_SCRIPTLET));
        match p.ext_compiled().unwrap() {
            ExtCompiled::Scriptlet(body) => assert_eq!(body, "nowebrtc"),
            other => panic!("unexpected payload {other:?}"),
        }
        assert_coverage(&p);
    }

    #[test]
    fn test_scenario_regex() {
        let p = analyzed(r"/^https?:\/\/ads\./");
        assert_eq!(p.category(), Category::StaticNetFilter);
        assert!(p.pattern_is_regex());
        assert_eq!(p.net_pattern(), r"^https?:\/\/ads\.");
        assert!(!p.has_error());
        assert_coverage(&p);
    }

    #[test]
    fn test_scenario_match_all_with_options() {
        let p = analyzed("*$image,redirect=1x1.gif,domain=foo.com|~bar.*");
        assert_eq!(p.category(), Category::StaticNetFilter);
        assert!(p.pattern_is_match_all());
        let options: Vec<_> = p.net_options().collect();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].id, NetOptionId::Image);
        assert_eq!(options[1].id, NetOptionId::Redirect);
        assert_eq!(options[1].value, Some("1x1.gif"));
        assert_eq!(options[2].id, NetOptionId::Domain);
        assert_eq!(options[2].value, Some("foo.com|~bar.*"));
        assert!(!p.has_error(), "entity suffix must be accepted for domain=");
        assert_coverage(&p);
    }

    #[test]
    fn test_scenario_procedural_has_text() {
        let p = analyzed("example.org##.container > .ad:has-text(/sponsor/i)");
        assert_eq!(p.category(), Category::StaticExtFilter);
        assert!(p.flavor().contains(Flavor::EXT_COSMETIC));
        match p.ext_compiled().unwrap() {
            ExtCompiled::Selector(sel) => {
                use abx_selector::{RegexLiteral, SelectorTask};
                assert_eq!(
                    sel.tasks.last(),
                    Some(&SelectorTask::HasText(RegexLiteral {
                        source: "sponsor".to_string(),
                        flags: "i".to_string(),
                    }))
                );
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(!p.should_discard());
    }

    #[test]
    fn test_idempotence() {
        let lines = [
            "||example.com^",
            "@@||ads.example.com/banner$image,~third-party",
            "example.com##.ad-banner",
            "*$image,redirect=1x1.gif,domain=foo.com|~bar.*",
            "0.0.0.0 localhost",
            "a###b",
        ];
        for line in lines {
            let mut p = parser();
            p.analyze(line);
            let state1 = (
                p.category(),
                p.flavor(),
                *p.spans(),
                p.raw().to_string(),
                p.slices.clone(),
            );
            p.analyze(line);
            let state2 = (
                p.category(),
                p.flavor(),
                *p.spans(),
                p.raw().to_string(),
                p.slices.clone(),
            );
            assert_eq!(state1, state2, "non-idempotent analysis of {line:?}");
        }
    }

    #[test]
    fn test_inline_comment() {
        let p = analyzed("0.0.0.0 ads.example.com # tracking sink");
        assert_eq!(p.category(), Category::StaticNetFilter);
        assert!(!p.spans().comment.is_empty());
        assert!(p.flavor().contains(Flavor::NET_SPACE_IN_PATTERN));
        assert_eq!(p.net_pattern(), "ads.example.com");
    }

    #[test]
    fn test_hosts_localhost_ignored() {
        let p = analyzed("127.0.0.1 localhost");
        assert_eq!(p.category(), Category::StaticNetFilter);
        assert!(p.should_ignore());
        assert!(p.should_discard());
        let p = analyzed("0.0.0.0 ip6-allnodes");
        assert!(p.should_ignore());
        let p = analyzed("0.0.0.0 ads.example.com");
        assert!(!p.should_ignore());
    }

    #[test]
    fn test_exception_prefix_splitting() {
        let p = analyzed("@@@||example.com^");
        assert!(p.is_exception());
        // Third `@` stays in the pattern.
        assert_eq!(p.net_pattern(), "@||example.com^");
    }

    #[test]
    fn test_left_anchor_variants() {
        let p = analyzed("|http://example.com");
        assert!(p.pattern_is_left_anchored());
        assert!(!p.pattern_is_left_hn_anchored());
        assert_eq!(p.net_pattern(), "http://example.com");

        let p = analyzed("|||example.com");
        assert!(p.pattern_is_left_hn_anchored());
        assert_eq!(p.net_pattern(), "|example.com");
    }

    #[test]
    fn test_right_anchor() {
        let p = analyzed("|http://example.com/path|");
        assert!(p.pattern_is_right_anchored());
        assert_eq!(p.net_pattern(), "http://example.com/path");
    }

    #[test]
    fn test_caret_not_hn_anchor_without_left() {
        let p = analyzed("example.com^");
        assert!(!p.pattern_is_right_hn_anchored());
        assert!(p.pattern_has_caret());
        assert_eq!(p.net_pattern(), "example.com^");
    }

    #[test]
    fn test_regex_with_options() {
        let p = analyzed("/ads/$script");
        assert!(p.pattern_is_regex());
        assert_eq!(p.net_pattern(), "ads");
        let options: Vec<_> = p.net_options().collect();
        assert_eq!(options[0].id, NetOptionId::Script);
    }

    #[test]
    fn test_invalid_regex_flagged() {
        let p = analyzed("/ad(/");
        assert!(p.pattern_is_regex());
        assert!(p.has_error());
    }

    #[test]
    fn test_dollar_in_pattern_rightmost_wins() {
        let p = analyzed("example.com/page$x$image");
        assert_eq!(p.net_pattern(), "example.com/page$x");
        let options: Vec<_> = p.net_options().collect();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].id, NetOptionId::Image);
    }

    #[test]
    fn test_adguard_double_dollar() {
        let p = analyzed("example.com$$script[tag-content=\"ads\"]");
        assert!(p.has_error());
    }

    #[test]
    fn test_dubious_single_character_pattern() {
        let p = analyzed("a");
        assert!(p.has_error());
        let p = analyzed("*");
        assert!(!p.has_error());
        assert!(p.pattern_is_match_all());
    }

    #[test]
    fn test_pointless_leading_wildcard() {
        let p = analyzed("*/ads/banner");
        assert_eq!(p.net_pattern(), "/ads/banner");
        let p = analyzed("*ads");
        assert_eq!(p.net_pattern(), "*ads");
    }

    #[test]
    fn test_pointless_trailing_wildcard_keeps_accidental_regex() {
        let p = analyzed("/banner/*");
        // Dropping the `*` would leave `/banner/`, which reads as a regex.
        assert_eq!(p.net_pattern(), "/banner/*");
        assert!(!p.pattern_is_regex());
    }

    #[test]
    fn test_anchors_on_match_all_cleared() {
        let p = analyzed("|*|");
        assert!(!p.pattern_is_left_anchored());
        assert!(!p.pattern_is_right_anchored());
        assert!(p.pattern_is_match_all());
    }

    #[test]
    fn test_ext_anchor_variants() {
        let p = analyzed("example.com#@#.ad");
        assert!(p.is_exception());
        assert!(p.flavor().contains(Flavor::EXT_COSMETIC));

        let p = analyzed("example.com#$#.ad { color: red; }");
        assert!(p.flavor().contains(Flavor::EXT_STYLE));
        assert!(!p.should_discard());

        let p = analyzed("example.com#$?#.ad:has-text(x) { remove: true; }");
        assert!(p.flavor().contains(Flavor::EXT_STYLE));
        assert!(p.flavor().contains(Flavor::EXT_STRONG));

        let p = analyzed("example.com#?#.ad:has-text(x)");
        assert!(p.flavor().contains(Flavor::EXT_STRONG));
        assert!(!p.should_discard());

        let p = analyzed("example.com#%#window.ads = false;");
        assert_eq!(p.category(), Category::StaticExtFilter);
        assert!(p.is_unsupported());
    }

    #[test]
    fn test_triple_hash_splits_into_id_selector() {
        let p = analyzed("example.com###banner");
        assert_eq!(p.category(), Category::StaticExtFilter);
        assert_eq!(p.span_text(p.spans().pattern), "#banner");
        match p.ext_compiled().unwrap() {
            ExtCompiled::Selector(sel) => assert_eq!(sel.canonical, "#banner"),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_too_many_hashes_is_comment_like() {
        let p = analyzed("####");
        assert_eq!(p.category(), Category::Comment);
    }

    #[test]
    fn test_double_hash_then_space_rejected_as_ext() {
        let p = analyzed("## this is not a cosmetic filter");
        assert_eq!(p.category(), Category::Comment);
    }

    #[test]
    fn test_html_filter() {
        let p = analyzed("example.com##^script:has-text(adblock)");
        assert!(p.flavor().contains(Flavor::EXT_HTML));
        match p.ext_compiled().unwrap() {
            ExtCompiled::Selector(sel) => {
                assert_eq!(sel.selector, "script");
                assert!(!sel.tasks.is_empty());
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_procedural_selector() {
        let p = analyzed("example.com##.ad:bogus-operator(x)");
        assert_eq!(p.category(), Category::StaticExtFilter);
        assert!(p.is_unsupported());
        assert!(p.should_discard());
    }

    #[test]
    fn test_ext_hostname_list() {
        let p = analyzed("example.com,~sub.example.com,example.*##.ad");
        let entries: Vec<_> = p.ext_options().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].hostname, "example.com");
        assert!(!entries[0].negated);
        assert_eq!(entries[1].hostname, "sub.example.com");
        assert!(entries[1].negated);
        assert_eq!(entries[2].hostname, "example.*");
        assert!(!entries[2].bad);
        assert!(!p.has_error());
    }

    #[test]
    fn test_ext_bad_hostname_flagged() {
        let p = analyzed("exa mple##.ad");
        assert_eq!(p.category(), Category::StaticExtFilter);
        assert!(p.has_error());
    }

    #[test]
    fn test_pattern_to_lowercase() {
        let mut p = parser();
        p.analyze("||Example.COM/Banner");
        assert!(p.pattern_has_uppercase());
        assert_eq!(p.pattern_to_lowercase(), "example.com/banner");
        assert!(!p.pattern_has_uppercase());
        assert_eq!(p.raw(), "||example.com/banner");
    }

    #[test]
    fn test_to_punycode() {
        let mut p = parser();
        p.analyze("||\u{4f8b}\u{3048}.com^$image");
        assert!(p.pattern_has_unicode());
        assert!(p.to_punycode());
        assert!(!p.pattern_has_unicode());
        assert!(p.net_pattern().starts_with("xn--"));
        assert!(p.net_pattern().ends_with(".com"));
        assert!(p.pattern_is_left_hn_anchored());
        let options: Vec<_> = p.net_options().collect();
        assert_eq!(options[0].id, NetOptionId::Image);
    }

    #[test]
    fn test_to_punycode_ascii_is_noop() {
        let mut p = parser();
        p.analyze("||example.com^");
        assert!(p.to_punycode());
        assert_eq!(p.net_pattern(), "example.com");
    }

    #[test]
    fn test_tokens_from_facade() {
        let p = analyzed("||ads.example.com/banner$image");
        let tokens: Vec<_> = p.pattern_tokens().map(|t| t.token.to_string()).collect();
        assert_eq!(tokens, vec!["ads", "example", "com", "banner"]);
    }

    #[test]
    fn test_round_trip_reconstruction() {
        let p = analyzed("@@||ads.example.com/banner$image");
        let s = p.spans();
        let rebuilt = format!(
            "{}{}{}{}{}{}",
            p.span_text(s.exception),
            p.span_text(s.pattern_left_anchor),
            p.span_text(s.pattern),
            p.span_text(s.pattern_right_anchor),
            p.span_text(s.options_anchor),
            p.span_text(s.options),
        );
        assert_eq!(rebuilt, p.raw());
    }
}
