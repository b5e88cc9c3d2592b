//! Character classes for the filter lexer.
//!
//! Every byte of a filter line maps to a small set of class bits; a maximal
//! run of same-class bytes becomes one slice. The two overlay bits
//! (IGNORE, ERROR) share the same integer and are OR-ed onto slices during
//! analysis for editor diagnostics.

bitflags::bitflags! {
    /// Per-byte character-class bit set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CharClass: u32 {
        const SPACE          = 1 << 0;
        const EXCLAMATION    = 1 << 1;
        const HASH           = 1 << 2;
        const DOLLAR         = 1 << 3;
        const PERCENT        = 1 << 4;
        const PAREN          = 1 << 5;
        const ASTERISK       = 1 << 6;
        const PLUS           = 1 << 7;
        const COMMA          = 1 << 8;
        const DASH           = 1 << 9;
        const PERIOD         = 1 << 10;
        const SLASH          = 1 << 11;
        const NUM            = 1 << 12;
        const EQUAL          = 1 << 13;
        const QUESTION       = 1 << 14;
        const AT             = 1 << 15;
        const ALPHA          = 1 << 16;
        const UPPERCASE      = 1 << 17;
        const SQUARE_BRACKET = 1 << 18;
        const BACKSLASH      = 1 << 19;
        const CARET          = 1 << 20;
        const UNDERSCORE     = 1 << 21;
        const BRACE          = 1 << 22;
        const PIPE           = 1 << 23;
        const TILDE          = 1 << 24;
        const OPENING        = 1 << 25;
        const CLOSING        = 1 << 26;
        const UNICODE        = 1 << 27;

        /// Overlay: slice discarded by analysis.
        const IGNORE         = 1 << 30;
        /// Overlay: slice is part of a syntax error.
        const ERROR          = 1 << 31;

        // Composite masks
        const ALPHANUM      = Self::NUM.bits() | Self::ALPHA.bits();
        const HOSTNAME      = Self::NUM.bits()
            | Self::ALPHA.bits()
            | Self::UPPERCASE.bits()
            | Self::DASH.bits()
            | Self::PERIOD.bits()
            | Self::UNDERSCORE.bits()
            | Self::UNICODE.bits();
        const PATTERN_TOKEN = Self::NUM.bits() | Self::ALPHA.bits() | Self::PERCENT.bits();
        const LINE_COMMENT  = Self::EXCLAMATION.bits()
            | Self::HASH.bits()
            | Self::SQUARE_BRACKET.bits();
        const WORD          = Self::NUM.bits()
            | Self::ALPHA.bits()
            | Self::UPPERCASE.bits()
            | Self::UNDERSCORE.bits()
            | Self::UNICODE.bits();
        const OVERLAY       = Self::IGNORE.bits() | Self::ERROR.bits();
    }
}

const fn ascii_class(b: u8) -> u32 {
    match b {
        b'\t' | b'\n' | 0x0b | 0x0c | b'\r' | b' ' => CharClass::SPACE.bits(),
        b'!' => CharClass::EXCLAMATION.bits(),
        b'#' => CharClass::HASH.bits(),
        b'$' => CharClass::DOLLAR.bits(),
        b'%' => CharClass::PERCENT.bits(),
        b'(' => CharClass::PAREN.bits() | CharClass::OPENING.bits(),
        b')' => CharClass::PAREN.bits() | CharClass::CLOSING.bits(),
        b'*' => CharClass::ASTERISK.bits(),
        b'+' => CharClass::PLUS.bits(),
        b',' => CharClass::COMMA.bits(),
        b'-' => CharClass::DASH.bits(),
        b'.' => CharClass::PERIOD.bits(),
        b'/' => CharClass::SLASH.bits(),
        b'0'..=b'9' => CharClass::NUM.bits(),
        b'<' => CharClass::OPENING.bits(),
        b'=' => CharClass::EQUAL.bits(),
        b'>' => CharClass::CLOSING.bits(),
        b'?' => CharClass::QUESTION.bits(),
        b'@' => CharClass::AT.bits(),
        b'A'..=b'Z' => CharClass::ALPHA.bits() | CharClass::UPPERCASE.bits(),
        b'[' => CharClass::SQUARE_BRACKET.bits() | CharClass::OPENING.bits(),
        b'\\' => CharClass::BACKSLASH.bits(),
        b']' => CharClass::SQUARE_BRACKET.bits() | CharClass::CLOSING.bits(),
        b'^' => CharClass::CARET.bits(),
        b'_' => CharClass::UNDERSCORE.bits(),
        b'a'..=b'z' => CharClass::ALPHA.bits(),
        b'{' => CharClass::BRACE.bits() | CharClass::OPENING.bits(),
        b'|' => CharClass::PIPE.bits(),
        b'}' => CharClass::BRACE.bits() | CharClass::CLOSING.bits(),
        b'~' => CharClass::TILDE.bits(),
        _ => 0,
    }
}

static ASCII_CLASS: [u32; 128] = {
    let mut table = [0u32; 128];
    let mut i = 0;
    while i < 128 {
        table[i] = ascii_class(i as u8);
        i += 1;
    }
    table
};

/// Class bits for one byte. Non-ASCII bytes all collapse to UNICODE|ALPHA,
/// so a multi-byte UTF-8 sequence forms a single run.
#[inline]
pub fn char_class(b: u8) -> CharClass {
    if b < 128 {
        CharClass::from_bits_retain(ASCII_CLASS[b as usize])
    } else {
        CharClass::UNICODE.union(CharClass::ALPHA)
    }
}
