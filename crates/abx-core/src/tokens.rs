//! Pattern-token extraction.
//!
//! Yields the maximal runs of token-class slices within the pattern that
//! are usable as matching-engine index keys, i.e. runs not weakened by an
//! adjacent wildcard. Regex-flavored patterns yield nothing.

use crate::charclass::CharClass;
use crate::parser::{Category, FilterParser, Flavor};
use crate::slicer::STRIDE;

/// One index-key candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternToken<'a> {
    pub token: &'a str,
    /// Byte offset within the pattern.
    pub offset: usize,
}

pub struct PatternTokenIter<'a> {
    parser: &'a FilterParser,
    cell: usize,
    start: usize,
    end: usize,
}

impl<'a> PatternTokenIter<'a> {
    pub(crate) fn new(parser: &'a FilterParser) -> Self {
        let span = parser.spans().pattern;
        let inert = parser.category() != Category::StaticNetFilter
            || parser.flavor().contains(Flavor::NET_REGEX);
        let (start, end) = if inert {
            (span.end(), span.end())
        } else {
            (span.i, span.end())
        };
        Self {
            parser,
            cell: start,
            start,
            end,
        }
    }
}

impl<'a> Iterator for PatternTokenIter<'a> {
    type Item = PatternToken<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let p = self.parser;
        loop {
            while self.cell < self.end
                && !p.slices.bits(self.cell).intersects(CharClass::PATTERN_TOKEN)
            {
                self.cell += STRIDE;
            }
            if self.cell >= self.end {
                return None;
            }
            let run_from = self.cell;
            while self.cell < self.end
                && p.slices.bits(self.cell).intersects(CharClass::PATTERN_TOKEN)
            {
                self.cell += STRIDE;
            }
            let run_to = self.cell;

            let left_ok = run_from == self.start
                || !p
                    .slices
                    .bits(run_from - STRIDE)
                    .contains(CharClass::ASTERISK);
            let byte_len = p.slices.origin(run_to) - p.slices.origin(run_from);
            let right_ok = run_to == self.end
                || !p.slices.bits(run_to).contains(CharClass::ASTERISK)
                || byte_len >= p.max_token_length;
            if left_ok && right_ok {
                return Some(PatternToken {
                    token: p.text_between(run_from, run_to),
                    offset: p.slices.origin(run_from) - p.slices.origin(self.start),
                });
            }
        }
    }
}
