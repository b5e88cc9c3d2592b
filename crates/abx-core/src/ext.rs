//! Extended-filter analysis.
//!
//! The anchor between the hostname list and the selector matches
//! `#@?(\$\??|%|\?)?#`, with `##`/`###` handled as run-length cases. The
//! pattern side is refined into cosmetic, scriptlet or HTML flavor and
//! compiled through the selector compiler.

use abx_selector::CompiledSelector;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::charclass::CharClass;
use crate::domains::DomainListRules;
use crate::parser::{Category, FilterParser, Flavor};
use crate::slicer::{Span, STRIDE};

static RE_SCRIPTLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+js\((.*)\)$").unwrap());

/// Compiled payload of an extended filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtCompiled {
    /// Scriptlet name and arguments, the interior of `+js(...)`.
    Scriptlet(String),
    /// Compiled cosmetic or HTML selector.
    Selector(CompiledSelector),
}

impl FilterParser {
    /// Try to read an extended-filter anchor at `from` (a `#` slice).
    /// Returns false and leaves no flavor residue when the anchor shape is
    /// not there.
    pub(crate) fn analyze_ext(&mut self, from: usize) -> bool {
        let run = self.slices.byte_len(from);
        if run > 3 {
            // Longer runs are decorative hosts-file comments.
            return false;
        }
        let saved = self.flavor;
        let anchor_end;
        if run >= 2 {
            if run == 3 {
                // `###` is `##` followed by an id selector.
                self.split_slot(from, 2);
            } else {
                let next = from + STRIDE;
                if next >= self.spans.eol.i
                    || self.slices.bits(next).contains(CharClass::SPACE)
                {
                    return false;
                }
            }
            anchor_end = from + STRIDE;
        } else {
            let eol = self.spans.eol.i;
            let mut cell = from + STRIDE;
            if cell < eol && self.slices.bits(cell).contains(CharClass::AT) {
                if self.slices.byte_len(cell) != 1 {
                    return false;
                }
                self.flavor |= Flavor::EXCEPTION;
                cell += STRIDE;
            }
            if cell < eol && self.slices.bits(cell).contains(CharClass::DOLLAR) {
                if self.slices.byte_len(cell) != 1 {
                    self.flavor = saved;
                    return false;
                }
                self.flavor |= Flavor::EXT_STYLE;
                cell += STRIDE;
                if cell < eol && self.slices.bits(cell).contains(CharClass::QUESTION) {
                    if self.slices.byte_len(cell) != 1 {
                        self.flavor = saved;
                        return false;
                    }
                    self.flavor |= Flavor::EXT_STRONG;
                    cell += STRIDE;
                }
            } else if cell < eol && self.slices.bits(cell).contains(CharClass::PERCENT) {
                if self.slices.byte_len(cell) != 1 {
                    self.flavor = saved;
                    return false;
                }
                self.flavor |= Flavor::UNSUPPORTED;
                cell += STRIDE;
            } else if cell < eol && self.slices.bits(cell).contains(CharClass::QUESTION) {
                if self.slices.byte_len(cell) != 1 {
                    self.flavor = saved;
                    return false;
                }
                self.flavor |= Flavor::EXT_STRONG;
                cell += STRIDE;
            }
            if cell >= eol || !self.slices.bits(cell).contains(CharClass::HASH) {
                self.flavor = saved;
                return false;
            }
            if self.slices.byte_len(cell) > 1 {
                self.split_slot(cell, 1);
            }
            anchor_end = cell + STRIDE;
        }

        self.category = Category::StaticExtFilter;
        let content = self.spans.left_space.len;
        self.spans.options = Span {
            i: content,
            len: from - content,
        };
        self.spans.options_anchor = Span {
            i: from,
            len: anchor_end - from,
        };
        let pattern_end = self.spans.right_space.i.max(anchor_end);
        self.spans.pattern = Span {
            i: anchor_end,
            len: pattern_end - anchor_end,
        };
        self.refine_ext_flavor();
        true
    }

    fn refine_ext_flavor(&mut self) {
        if self.flavor.contains(Flavor::UNSUPPORTED) {
            // `#%#` AdGuard JS injection; no pattern flavor applies.
            return;
        }
        let pattern = self.span_text(self.spans.pattern);
        if pattern.starts_with('+') && RE_SCRIPTLET.is_match(pattern) {
            self.flavor |= Flavor::EXT_SCRIPTLET;
        } else if pattern.starts_with('^') {
            self.flavor |= Flavor::EXT_HTML;
        } else {
            self.flavor |= Flavor::EXT_COSMETIC;
        }
    }

    /// Semantic pass: validate the hostname list, compile the pattern.
    pub(crate) fn analyze_ext_extra(&mut self) {
        let options = self.spans.options;
        if !options.is_empty() {
            self.validate_domain_list(
                options,
                DomainListRules {
                    separator: CharClass::COMMA,
                    allow_entity: true,
                    allow_negation: true,
                },
            );
        }

        self.ext_compiled = None;
        if self.flavor.contains(Flavor::UNSUPPORTED) {
            return;
        }
        let pattern = self.span_text(self.spans.pattern).to_string();
        let compiled = if self.flavor.contains(Flavor::EXT_SCRIPTLET) {
            RE_SCRIPTLET
                .captures(&pattern)
                .map(|caps| ExtCompiled::Scriptlet(caps[1].to_string()))
        } else if self.flavor.contains(Flavor::EXT_HTML) {
            self.compiler.compile(&pattern[1..]).map(ExtCompiled::Selector)
        } else if self.flavor.contains(Flavor::EXT_STYLE) {
            self.compiler
                .compile_style_injection(&pattern)
                .map(ExtCompiled::Selector)
        } else {
            self.compiler.compile(&pattern).map(ExtCompiled::Selector)
        };
        match compiled {
            Some(payload) => self.ext_compiled = Some(payload),
            None => {
                self.flavor |= Flavor::UNSUPPORTED;
                if self.interactive {
                    let p = self.spans.pattern;
                    self.mark_span(p, CharClass::ERROR);
                }
            }
        }
    }
}

// =============================================================================
// Extended-filter options iterator
// =============================================================================

/// One hostname entry of an extended filter's options span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtDomain<'a> {
    pub hostname: &'a str,
    pub negated: bool,
    /// Entry failed structural validation.
    pub bad: bool,
}

/// Yields the comma-separated hostname/entity entries before the anchor.
pub struct ExtOptionsIter<'a> {
    parser: &'a FilterParser,
    cell: usize,
    end: usize,
}

impl<'a> ExtOptionsIter<'a> {
    pub(crate) fn new(parser: &'a FilterParser) -> Self {
        let span = if parser.category() == Category::StaticExtFilter {
            parser.spans.options
        } else {
            Span::default()
        };
        Self {
            parser,
            cell: span.i,
            end: span.end(),
        }
    }
}

impl<'a> Iterator for ExtOptionsIter<'a> {
    type Item = ExtDomain<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let p = self.parser;
        while self.cell < self.end {
            let from = self.cell;
            let mut scan = from;
            while scan < self.end && !p.slices.bits(scan).contains(CharClass::COMMA) {
                scan += STRIDE;
            }
            self.cell = scan + STRIDE;
            if from == scan {
                // Empty entry; the validation pass already flagged it.
                continue;
            }
            let rules = DomainListRules {
                separator: CharClass::COMMA,
                allow_entity: true,
                allow_negation: true,
            };
            let mut hn_from = from;
            let mut negated = false;
            if p.slices.bits(from).contains(CharClass::TILDE) && p.slices.byte_len(from) == 1 {
                negated = true;
                hn_from = from + STRIDE;
            }
            return Some(ExtDomain {
                hostname: p.text_between(hn_from, scan),
                negated,
                bad: !p.domain_entry_is_valid(from, scan, &rules),
            });
        }
        None
    }
}
