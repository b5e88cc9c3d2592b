//! Network-filter analysis.
//!
//! Structural pass: exception prefix, regex detection, options split on the
//! rightmost `$`, anchors, hosts-file residue, pointless-wildcard
//! elimination. Semantic pass: regex validation, the dubious-pattern check,
//! and option parsing with cross-option invariants.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::charclass::CharClass;
use crate::domains::DomainListRules;
use crate::parser::{Category, FilterParser, Flavor};
use crate::slicer::{Span, STRIDE};

/// Hosts-file entries that merely redirect well-known local names.
static RE_HOSTS_REDIRECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:0\.0\.0\.0|(?:broadcast|local)host|local|ip6-\w+)\b").unwrap());

// =============================================================================
// Option descriptors
// =============================================================================

bitflags::bitflags! {
    /// Capabilities and constraints of a network option.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OptionFlags: u16 {
        /// `~` negation is meaningful.
        const CAN_NEGATE       = 1 << 0;
        /// Only valid on block filters.
        const BLOCK_ONLY       = 1 << 1;
        /// Only valid on exception filters.
        const ALLOW_ONLY       = 1 << 2;
        /// Requires `=value`.
        const MUST_ASSIGN      = 1 << 3;
        /// May appear unassigned on an exception filter.
        const ALLOW_MAY_ASSIGN = 1 << 4;
        /// Value is a domain list.
        const DOMAIN_LIST      = 1 << 5;
        /// A request-type constraint.
        const TYPE             = 1 << 6;
        /// A network request type (redirectable).
        const NETWORK_TYPE     = 1 << 7;
        /// Produces a redirect.
        const REDIRECT_TYPE    = 1 << 8;
        /// Recognized but not implemented.
        const NOT_SUPPORTED    = 1 << 9;
    }
}

/// Canonical network-option identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NetOptionId {
    Invalid = 0,
    All,
    Badfilter,
    Cname,
    Csp,
    Denyallow,
    Document,
    Domain,
    Elemhide,
    Empty,
    FirstParty,
    Font,
    Genericblock,
    Generichide,
    Header,
    Image,
    Important,
    InlineCss,
    InlineScript,
    MatchCase,
    Media,
    Mp4,
    Object,
    Other,
    Ping,
    Popunder,
    Popup,
    Redirect,
    RedirectRule,
    Script,
    Specifichide,
    Stylesheet,
    Subdocument,
    ThirdParty,
    Webrtc,
    Websocket,
    Xhr,
}

/// An option id plus its capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionDescriptor {
    pub id: NetOptionId,
    pub flags: OptionFlags,
}

const INVALID_DESCRIPTOR: OptionDescriptor = OptionDescriptor {
    id: NetOptionId::Invalid,
    flags: OptionFlags::empty(),
};

const NEGATABLE_NET_TYPE: OptionFlags = OptionFlags::TYPE
    .union(OptionFlags::NETWORK_TYPE)
    .union(OptionFlags::CAN_NEGATE);

const ASSIGNED_REDIRECT: OptionFlags = OptionFlags::MUST_ASSIGN
    .union(OptionFlags::ALLOW_MAY_ASSIGN)
    .union(OptionFlags::REDIRECT_TYPE);

/// Look up a (lowercased) option token.
fn lookup_option(token: &str) -> Option<OptionDescriptor> {
    use NetOptionId::*;
    let (id, flags) = match token {
        "all" => (All, OptionFlags::TYPE.union(OptionFlags::NETWORK_TYPE)),
        "badfilter" => (Badfilter, OptionFlags::empty()),
        "cname" => (Cname, OptionFlags::ALLOW_ONLY),
        "csp" => (
            Csp,
            OptionFlags::MUST_ASSIGN.union(OptionFlags::ALLOW_MAY_ASSIGN),
        ),
        "denyallow" => (
            Denyallow,
            OptionFlags::MUST_ASSIGN.union(OptionFlags::DOMAIN_LIST),
        ),
        "doc" | "document" => (Document, NEGATABLE_NET_TYPE),
        "domain" => (
            Domain,
            OptionFlags::MUST_ASSIGN.union(OptionFlags::DOMAIN_LIST),
        ),
        "ehide" | "elemhide" => (Elemhide, OptionFlags::TYPE),
        "empty" => (
            Empty,
            OptionFlags::BLOCK_ONLY.union(OptionFlags::REDIRECT_TYPE),
        ),
        "1p" | "first-party" => (FirstParty, OptionFlags::CAN_NEGATE),
        "font" => (Font, NEGATABLE_NET_TYPE),
        "genericblock" => (Genericblock, OptionFlags::NOT_SUPPORTED),
        "ghide" | "generichide" => (Generichide, OptionFlags::TYPE),
        "header" => (Header, OptionFlags::MUST_ASSIGN),
        "image" => (Image, NEGATABLE_NET_TYPE),
        "important" => (Important, OptionFlags::BLOCK_ONLY),
        "inline-css" => (InlineCss, OptionFlags::TYPE),
        "inline-script" => (InlineScript, OptionFlags::TYPE),
        "match-case" => (MatchCase, OptionFlags::empty()),
        "media" => (Media, NEGATABLE_NET_TYPE),
        "mp4" => (
            Mp4,
            OptionFlags::BLOCK_ONLY.union(OptionFlags::REDIRECT_TYPE),
        ),
        "object" => (Object, NEGATABLE_NET_TYPE),
        "other" => (Other, NEGATABLE_NET_TYPE),
        "ping" | "beacon" => (Ping, NEGATABLE_NET_TYPE),
        "popunder" => (Popunder, OptionFlags::TYPE),
        "popup" => (Popup, OptionFlags::TYPE.union(OptionFlags::CAN_NEGATE)),
        "redirect" => (Redirect, ASSIGNED_REDIRECT),
        "redirect-rule" => (RedirectRule, ASSIGNED_REDIRECT),
        "script" => (Script, NEGATABLE_NET_TYPE),
        "shide" | "specifichide" => (Specifichide, OptionFlags::TYPE),
        "css" | "stylesheet" => (Stylesheet, NEGATABLE_NET_TYPE),
        "frame" | "subdocument" => (Subdocument, NEGATABLE_NET_TYPE),
        "3p" | "third-party" => (ThirdParty, OptionFlags::CAN_NEGATE),
        "webrtc" => (Webrtc, OptionFlags::NOT_SUPPORTED),
        "websocket" => (Websocket, NEGATABLE_NET_TYPE),
        "xhr" | "xmlhttprequest" => (Xhr, NEGATABLE_NET_TYPE),
        _ => return None,
    };
    Some(OptionDescriptor { id, flags })
}

/// Prepared per-option record: a descriptor plus slice-cell bounds.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OptionRecord {
    pub descriptor: OptionDescriptor,
    pub opt_from: usize,
    pub token_from: usize,
    pub equals: Option<usize>,
    pub value_from: usize,
    pub opt_to: usize,
}

// =============================================================================
// Structural analysis
// =============================================================================

impl FilterParser {
    pub(crate) fn analyze_net(&mut self) {
        self.category = Category::StaticNetFilter;
        let mut islice = self.spans.left_space.len;
        self.spans.exception = Span { i: islice, len: 0 };

        // `@@` exception prefix; longer runs of `@` keep the excess in the
        // pattern.
        if islice < self.spans.comment.i && self.slices.bits(islice).contains(CharClass::AT) {
            let len = self.slices.byte_len(islice);
            if len >= 2 {
                if len > 2 {
                    self.split_slot(islice, 2);
                }
                self.spans.exception = Span { i: islice, len: STRIDE };
                self.flavor |= Flavor::EXCEPTION;
                islice += STRIDE;
            }
        }

        self.spans.pattern = Span {
            i: islice,
            len: self.spans.comment.i - islice,
        };

        let starts_slash = !self.spans.pattern.is_empty()
            && self.slices.bits(self.spans.pattern.i).contains(CharClass::SLASH);
        let mut is_regex = starts_slash && self.span_reads_as_regex(self.spans.pattern);

        // Options anchor: rightmost `$`, unless the whole remainder is a
        // regex literal.
        if !is_regex {
            let mut cell = self.spans.comment.i;
            let mut anchor = None;
            while cell > islice {
                cell -= STRIDE;
                if self.slices.bits(cell).contains(CharClass::DOLLAR) {
                    anchor = Some(cell);
                    break;
                }
            }
            if let Some(mut cell) = anchor {
                let len = self.slices.byte_len(cell);
                if len > 1 {
                    let allowed =
                        CharClass::HOSTNAME | CharClass::COMMA | CharClass::ASTERISK | CharClass::SPACE;
                    if self.first_cell_not_within(allowed) == cell {
                        // AdGuard `$$` rule marker.
                        self.flavor |= Flavor::ERROR;
                        if self.interactive {
                            self.slices.overlay(cell, cell + STRIDE, CharClass::ERROR);
                        }
                    } else {
                        self.split_slot(cell, len - 1);
                        cell += STRIDE;
                    }
                }
                self.spans.pattern.len = cell - self.spans.pattern.i;
                self.spans.options_anchor = Span { i: cell, len: STRIDE };
                self.spans.options = Span {
                    i: cell + STRIDE,
                    len: self.spans.comment.i - (cell + STRIDE),
                };
                if starts_slash {
                    is_regex = self.span_reads_as_regex(self.spans.pattern);
                }
            }
        }

        if is_regex {
            self.flavor |= Flavor::NET_REGEX;
        } else {
            self.analyze_net_pattern();
        }
        self.pattern_bits = self.span_bits(self.spans.pattern);
    }

    /// `/.../`: a lone slice longer than two bytes, or a multi-slice span
    /// whose last slice is also a slash run. The caller checks the first.
    fn span_reads_as_regex(&self, span: Span) -> bool {
        (span.len == STRIDE && self.slices.byte_len(span.i) > 2)
            || (span.len > STRIDE
                && self
                    .slices
                    .bits(span.end() - STRIDE)
                    .contains(CharClass::SLASH))
    }

    fn analyze_net_pattern(&mut self) {
        // Left anchor
        if !self.spans.pattern.is_empty()
            && self.slices.bits(self.spans.pattern.i).contains(CharClass::PIPE)
        {
            let cell = self.spans.pattern.i;
            let len = self.slices.byte_len(cell);
            if len == 1 {
                self.flavor |= Flavor::NET_LEFT_URL_ANCHOR;
            } else {
                if len > 2 {
                    self.split_slot(cell, 2);
                    self.spans.pattern.len += STRIDE;
                }
                self.flavor |= Flavor::NET_LEFT_HN_ANCHOR;
            }
            self.spans.pattern_left_anchor = Span { i: cell, len: STRIDE };
            self.spans.pattern.i += STRIDE;
            self.spans.pattern.len -= STRIDE;
        }

        // Right anchor
        if !self.spans.pattern.is_empty() {
            let mut last = self.spans.pattern.end() - STRIDE;
            let bits = self.slices.bits(last);
            if bits.contains(CharClass::PIPE) {
                let len = self.slices.byte_len(last);
                if len > 1 {
                    self.split_slot(last, len - 1);
                    self.spans.pattern.len += STRIDE;
                    last += STRIDE;
                }
                self.flavor |= Flavor::NET_RIGHT_URL_ANCHOR;
                self.spans.pattern_right_anchor = Span { i: last, len: STRIDE };
                self.spans.pattern.len -= STRIDE;
            } else if bits.contains(CharClass::CARET)
                && self.slices.byte_len(last) == 1
                && self.flavor.contains(Flavor::NET_LEFT_HN_ANCHOR)
                && self.span_within(
                    Span {
                        i: self.spans.pattern.i,
                        len: last - self.spans.pattern.i,
                    },
                    CharClass::HOSTNAME,
                )
            {
                self.flavor |= Flavor::NET_RIGHT_HN_ANCHOR;
                self.spans.pattern_right_anchor = Span { i: last, len: STRIDE };
                self.spans.pattern.len -= STRIDE;
            }
        }

        // Hosts-file residue: drop everything through the last space, then
        // ignore well-known local redirects.
        if self.span_bits(self.spans.pattern).intersects(CharClass::SPACE) {
            self.flavor |= Flavor::NET_SPACE_IN_PATTERN;
            let span = self.spans.pattern;
            let mut cell = span.end();
            while cell > span.i {
                cell -= STRIDE;
                if self.slices.bits(cell).contains(CharClass::SPACE) {
                    self.slices.overlay(span.i, cell + STRIDE, CharClass::IGNORE);
                    self.spans.pattern = Span {
                        i: cell + STRIDE,
                        len: span.end() - (cell + STRIDE),
                    };
                    break;
                }
            }
            if RE_HOSTS_REDIRECT.is_match(self.span_text(self.spans.pattern)) {
                self.flavor |= Flavor::IGNORE;
            }
        }

        // Pointless leading wildcard
        {
            let p = self.spans.pattern;
            if p.len > STRIDE
                && self.slices.bits(p.i).contains(CharClass::ASTERISK)
                && !self
                    .slices
                    .bits(p.i + STRIDE)
                    .intersects(CharClass::PATTERN_TOKEN)
            {
                self.slices.overlay(p.i, p.i + STRIDE, CharClass::IGNORE);
                self.spans.pattern.i += STRIDE;
                self.spans.pattern.len -= STRIDE;
                if self
                    .flavor
                    .intersects(Flavor::NET_LEFT_URL_ANCHOR | Flavor::NET_LEFT_HN_ANCHOR)
                {
                    let anchor = self.spans.pattern_left_anchor;
                    self.mark_span(anchor, CharClass::IGNORE);
                    self.flavor -= Flavor::NET_LEFT_URL_ANCHOR | Flavor::NET_LEFT_HN_ANCHOR;
                }
            }
        }

        // Pointless trailing wildcard, unless dropping it would leave a
        // regex-looking pattern behind.
        {
            let p = self.spans.pattern;
            if p.len > STRIDE {
                let last = p.end() - STRIDE;
                if self.slices.bits(last).contains(CharClass::ASTERISK)
                    && !self
                        .slices
                        .bits(last - STRIDE)
                        .intersects(CharClass::PATTERN_TOKEN)
                {
                    let shrunk = Span {
                        i: p.i,
                        len: p.len - STRIDE,
                    };
                    let accidental_regex = self.slices.bits(shrunk.i).contains(CharClass::SLASH)
                        && self.span_reads_as_regex(shrunk);
                    if !accidental_regex {
                        self.slices.overlay(last, last + STRIDE, CharClass::IGNORE);
                        self.spans.pattern.len -= STRIDE;
                        if self
                            .flavor
                            .intersects(Flavor::NET_RIGHT_URL_ANCHOR | Flavor::NET_RIGHT_HN_ANCHOR)
                        {
                            let anchor = self.spans.pattern_right_anchor;
                            self.mark_span(anchor, CharClass::IGNORE);
                            self.flavor -=
                                Flavor::NET_RIGHT_URL_ANCHOR | Flavor::NET_RIGHT_HN_ANCHOR;
                        }
                    }
                }
            }
        }

        // Anchoring an empty or match-all pattern achieves nothing.
        {
            let p = self.spans.pattern;
            let match_all = p.is_empty()
                || (p.len == STRIDE && self.slices.bits(p.i).contains(CharClass::ASTERISK));
            let anchors = Flavor::NET_LEFT_URL_ANCHOR
                | Flavor::NET_LEFT_HN_ANCHOR
                | Flavor::NET_RIGHT_URL_ANCHOR
                | Flavor::NET_RIGHT_HN_ANCHOR;
            if match_all && self.flavor.intersects(anchors) {
                let left = self.spans.pattern_left_anchor;
                let right = self.spans.pattern_right_anchor;
                self.mark_span(left, CharClass::IGNORE);
                self.mark_span(right, CharClass::IGNORE);
                self.flavor -= anchors;
            }
        }
    }

    // =========================================================================
    // Semantic analysis
    // =========================================================================

    pub(crate) fn analyze_net_extra(&mut self) {
        if self.flavor.contains(Flavor::NET_REGEX) {
            if !self.support.regex_is_valid(self.net_pattern()) {
                self.flavor |= Flavor::ERROR;
                if self.interactive {
                    let p = self.spans.pattern;
                    self.mark_span(p, CharClass::ERROR);
                }
            }
        } else if self.pattern_is_dubious() {
            self.flavor |= Flavor::ERROR;
            if self.interactive {
                let p = self.spans.pattern;
                self.mark_span(p, CharClass::ERROR);
            }
        }
        self.prepare_net_options();
    }

    /// A single-byte, non-wildcard pattern with no options matches far too
    /// much to be intentional.
    fn pattern_is_dubious(&self) -> bool {
        self.spans.options.is_empty()
            && self.spans.pattern.len == STRIDE
            && self.slices.byte_len(self.spans.pattern.i) == 1
            && !self.slices.bits(self.spans.pattern.i).contains(CharClass::ASTERISK)
    }

    fn prepare_net_options(&mut self) {
        self.net_option_records.clear();
        let span = self.spans.options;
        if span.is_empty() {
            if !self.spans.options_anchor.is_empty() {
                // `$` with nothing after it
                self.flavor |= Flavor::ERROR;
                if self.interactive {
                    let anchor = self.spans.options_anchor;
                    self.mark_span(anchor, CharClass::ERROR);
                }
            }
            return;
        }

        let end = span.end();
        let mut bad = false;
        let mut cell = span.i;
        while cell < end {
            let opt_from = cell;
            let mut opt_bad = false;
            if self.slices.bits(cell).contains(CharClass::TILDE) {
                if self.slices.byte_len(cell) != 1 {
                    opt_bad = true;
                }
                cell += STRIDE;
            }
            let token_from = cell;

            let mut equals = None;
            let mut scan = cell;
            while scan < end && !self.slices.bits(scan).contains(CharClass::COMMA) {
                if equals.is_none()
                    && self.slices.bits(scan).contains(CharClass::EQUAL)
                    && self.slices.byte_len(scan) == 1
                {
                    equals = Some(scan);
                }
                scan += STRIDE;
            }
            let opt_to = scan;
            let token_to = equals.unwrap_or(opt_to);
            let value_from = equals.map(|e| e + STRIDE).unwrap_or(opt_to);

            if token_from == token_to {
                opt_bad = true;
            }
            if equals.is_some() && value_from >= opt_to {
                opt_bad = true;
            }

            let token = self.text_between(token_from, token_to).to_ascii_lowercase();
            let descriptor = lookup_option(&token).unwrap_or(INVALID_DESCRIPTOR);
            if descriptor.id == NetOptionId::Invalid && token_from != token_to {
                opt_bad = true;
            }

            let negated = token_from != opt_from;
            let flags = descriptor.flags;
            if flags.contains(OptionFlags::NOT_SUPPORTED) {
                self.flavor |= Flavor::UNSUPPORTED;
            } else if descriptor.id != NetOptionId::Invalid {
                if negated && !flags.contains(OptionFlags::CAN_NEGATE) {
                    opt_bad = true;
                }
                if self.is_exception() && flags.contains(OptionFlags::BLOCK_ONLY) {
                    opt_bad = true;
                }
                if !self.is_exception() && flags.contains(OptionFlags::ALLOW_ONLY) {
                    opt_bad = true;
                }
                if flags.contains(OptionFlags::MUST_ASSIGN) {
                    let may_skip =
                        flags.contains(OptionFlags::ALLOW_MAY_ASSIGN) && self.is_exception();
                    if equals.is_none() && !may_skip {
                        opt_bad = true;
                    }
                } else if equals.is_some() {
                    opt_bad = true;
                }
                if flags.contains(OptionFlags::DOMAIN_LIST) && value_from < opt_to {
                    let entity = descriptor.id == NetOptionId::Domain;
                    self.validate_domain_list(
                        Span {
                            i: value_from,
                            len: opt_to - value_from,
                        },
                        DomainListRules {
                            separator: CharClass::PIPE,
                            allow_entity: entity,
                            allow_negation: entity,
                        },
                    );
                }
            }

            if opt_bad {
                bad = true;
                if self.interactive {
                    self.slices
                        .overlay(opt_from, opt_to.max(opt_from + STRIDE).min(end), CharClass::ERROR);
                }
            }
            self.net_option_records.push(OptionRecord {
                descriptor,
                opt_from,
                token_from,
                equals,
                value_from,
                opt_to,
            });

            if opt_to >= end {
                break;
            }
            // Separator: unit-length comma, with something after it.
            if self.slices.byte_len(opt_to) != 1 {
                bad = true;
                if self.interactive {
                    self.slices.overlay(opt_to, opt_to + STRIDE, CharClass::ERROR);
                }
            }
            if opt_to + STRIDE >= end {
                bad = true;
                if self.interactive {
                    self.slices.overlay(opt_to, opt_to + STRIDE, CharClass::ERROR);
                }
                break;
            }
            cell = opt_to + STRIDE;
        }

        // Cross-option invariants.
        let mut redirects = 0usize;
        let mut explicit_redirect = false;
        let mut network_types = 0usize;
        let mut types = 0usize;
        let mut csps = 0usize;
        for record in &self.net_option_records {
            let flags = record.descriptor.flags;
            if flags.contains(OptionFlags::REDIRECT_TYPE) {
                redirects += 1;
            }
            if matches!(
                record.descriptor.id,
                NetOptionId::Redirect | NetOptionId::RedirectRule
            ) {
                explicit_redirect = true;
            }
            if flags.contains(OptionFlags::NETWORK_TYPE) {
                network_types += 1;
            }
            if flags.contains(OptionFlags::TYPE) {
                types += 1;
            }
            if record.descriptor.id == NetOptionId::Csp {
                csps += 1;
            }
        }
        if redirects > 1 {
            bad = true;
        }
        if explicit_redirect && network_types != 1 {
            bad = true;
        }
        if csps > 1 {
            bad = true;
        }
        if csps == 1 && types > 0 {
            bad = true;
        }

        if bad {
            self.flavor |= Flavor::ERROR;
        }
    }
}

// =============================================================================
// Options iterator
// =============================================================================

/// One parsed network option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetOption<'a> {
    pub id: NetOptionId,
    pub value: Option<&'a str>,
    pub negated: bool,
}

/// Yields the options prepared by the last `analyze`.
pub struct NetOptionsIter<'a> {
    parser: &'a FilterParser,
    index: usize,
}

impl<'a> NetOptionsIter<'a> {
    pub(crate) fn new(parser: &'a FilterParser) -> Self {
        Self { parser, index: 0 }
    }
}

impl<'a> Iterator for NetOptionsIter<'a> {
    type Item = NetOption<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = *self.parser.net_option_records.get(self.index)?;
        self.index += 1;
        let value = if record.equals.is_some() && record.value_from < record.opt_to {
            Some(self.parser.text_between(record.value_from, record.opt_to))
        } else {
            None
        };
        Some(NetOption {
            id: record.descriptor.id,
            value,
            negated: record.token_from != record.opt_from,
        })
    }
}
