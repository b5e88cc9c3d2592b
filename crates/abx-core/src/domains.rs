//! Hostname/entity domain-list validation.
//!
//! Shared by `domain=`/`denyallow=` network option values (PIPE separator)
//! and extended-filter hostname lists (COMMA separator). Validation is
//! structural only; punycode and public-suffix concerns live elsewhere.

use crate::charclass::CharClass;
use crate::parser::{FilterParser, Flavor};
use crate::slicer::{Span, STRIDE};

/// What a particular domain list accepts.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DomainListRules {
    pub separator: CharClass,
    /// `example.*` entity suffixes and the lone `*` entry.
    pub allow_entity: bool,
    /// Leading `~` negation.
    pub allow_negation: bool,
}

impl FilterParser {
    /// Validate every entry of a separator-delimited list. Sets the Error
    /// flavor (and ERROR overlays in interactive mode) on bad entries,
    /// non-unit separators, and a dangling trailing separator.
    pub(crate) fn validate_domain_list(&mut self, span: Span, rules: DomainListRules) {
        if span.is_empty() {
            return;
        }
        let end = span.end();
        let mut bad: Vec<(usize, usize)> = Vec::new();
        let mut cell = span.i;
        while cell < end {
            let mut scan = cell;
            while scan < end && !self.slices.bits(scan).intersects(rules.separator) {
                scan += STRIDE;
            }
            if cell == scan || !self.domain_entry_is_valid(cell, scan, &rules) {
                bad.push((cell, (scan.max(cell + STRIDE)).min(end)));
            }
            if scan >= end {
                break;
            }
            if self.slices.byte_len(scan) != 1 || scan + STRIDE >= end {
                // Doubled or dangling separator.
                bad.push((scan, scan + STRIDE));
                if scan + STRIDE >= end {
                    break;
                }
            }
            cell = scan + STRIDE;
        }
        if !bad.is_empty() {
            self.flavor |= Flavor::ERROR;
            if self.interactive {
                for (from, to) in bad {
                    self.slices.overlay(from, to, CharClass::ERROR);
                }
            }
        }
    }

    /// Structural validity of one entry in `[from, to)`, leading `~`
    /// included.
    pub(crate) fn domain_entry_is_valid(
        &self,
        from: usize,
        to: usize,
        rules: &DomainListRules,
    ) -> bool {
        let s = &self.slices;
        let mut cell = from;
        if s.bits(cell).contains(CharClass::TILDE) {
            if !rules.allow_negation || s.byte_len(cell) != 1 {
                return false;
            }
            cell += STRIDE;
            if cell >= to {
                return false;
            }
        }

        // A lone `*` matches every site.
        if rules.allow_entity
            && to - cell == STRIDE
            && s.bits(cell).contains(CharClass::ASTERISK)
            && s.byte_len(cell) == 1
        {
            return true;
        }

        if !s.bits(cell).intersects(CharClass::WORD) {
            return false;
        }

        let last = to - STRIDE;
        let mut body_end = to;
        if s.bits(last).contains(CharClass::ASTERISK) {
            // Entity suffix: `name.*`, at least three slices.
            if !rules.allow_entity
                || to - cell < 3 * STRIDE
                || s.byte_len(last) != 1
                || !s.bits(last - STRIDE).contains(CharClass::PERIOD)
            {
                return false;
            }
            body_end = last;
        } else if !s.bits(last).intersects(CharClass::ALPHANUM | CharClass::UNICODE) {
            return false;
        }

        let mut scan = cell;
        while scan < body_end {
            let bits = s.bits(scan).difference(CharClass::OVERLAY);
            if !CharClass::HOSTNAME.contains(bits) {
                return false;
            }
            if bits.contains(CharClass::PERIOD) && s.byte_len(scan) != 1 {
                return false;
            }
            if bits.contains(CharClass::DASH) {
                let prev_ok = scan > cell
                    && s
                        .bits(scan - STRIDE)
                        .intersects(CharClass::ALPHANUM | CharClass::UNICODE);
                let next_ok = scan + STRIDE < to
                    && s
                        .bits(scan + STRIDE)
                        .intersects(CharClass::ALPHANUM | CharClass::UNICODE);
                if !prev_ok || !next_ok {
                    return false;
                }
            }
            scan += STRIDE;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{FilterParser, ParserOptions};

    fn has_error(line: &str) -> bool {
        let mut p = FilterParser::new(ParserOptions { interactive: true });
        p.analyze(line);
        p.has_error()
    }

    #[test]
    fn test_valid_domain_lists() {
        assert!(!has_error("||x.com^$domain=example.com"));
        assert!(!has_error("||x.com^$domain=example.com|sub.other.org"));
        assert!(!has_error("||x.com^$domain=example.*|~bar.example.*"));
        assert!(!has_error("||x.com^$domain=*"));
        assert!(!has_error("||x.com^$domain=xn--p1ai.example"));
        assert!(!has_error("||x.com^$domain=my_host.example"));
    }

    #[test]
    fn test_invalid_domain_lists() {
        // dangling separator
        assert!(has_error("||x.com^$domain=example.com|"));
        // doubled separator
        assert!(has_error("||x.com^$domain=a.com||b.com"));
        // repeated periods
        assert!(has_error("||x.com^$domain=example..com"));
        // dash needs alphanumeric neighbors
        assert!(has_error("||x.com^$domain=-example.com"));
        assert!(has_error("||x.com^$domain=example-.com"));
        assert!(has_error("||x.com^$domain=a.-b.com"));
        // entity wildcard needs a period before it
        assert!(has_error("||x.com^$domain=example*"));
        // wildcard run
        assert!(has_error("||x.com^$domain=example.**"));
        // stray characters
        assert!(has_error("||x.com^$domain=exa/mple.com"));
        assert!(has_error("||x.com^$domain=~"));
    }

    #[test]
    fn test_unicode_hostnames_pass_structurally() {
        assert!(!has_error("||x.com^$domain=\u{4f8b}\u{3048}.jp"));
    }
}
