//! CSS validity oracles.
//!
//! The compiler never talks to a DOM. Every question that would normally be
//! answered by one (is this plain CSS? does this declaration parse? is this
//! XPath plausible?) goes through the [`SelectorOracle`] trait, and the
//! default implementation is a pure-data heuristic built on regular
//! expressions. Hosts with a real CSS engine can inject their own.

use once_cell::sync::Lazy;
use regex::Regex;

/// Outcome of classifying a would-be plain CSS selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssValidity {
    /// Not a plain CSS selector.
    Invalid,
    /// A plain CSS selector.
    Plain,
    /// A plain CSS selector containing a pseudo-element.
    PlainWithPseudoElement,
}

/// Injected DOM-adjacent predicates used by the selector compiler.
pub trait SelectorOracle {
    /// Classify `selector` as plain CSS, plain CSS with a pseudo-element,
    /// or neither.
    fn selector_validity(&self, selector: &str) -> CssValidity;

    /// Whether `decl` parses as a non-empty CSS declaration list.
    fn declaration_is_valid(&self, decl: &str) -> bool;

    /// Whether `expr` is a plausible XPath expression.
    fn xpath_is_valid(&self, expr: &str) -> bool;
}

// =============================================================================
// Default heuristic oracle
// =============================================================================

/// Non-functional pseudo-classes accepted as plain CSS.
const PSEUDO_CLASSES: &[&str] = &[
    "active",
    "any-link",
    "blank",
    "checked",
    "default",
    "defined",
    "disabled",
    "empty",
    "enabled",
    "first",
    "first-child",
    "first-of-type",
    "focus",
    "focus-visible",
    "focus-within",
    "fullscreen",
    "hover",
    "in-range",
    "indeterminate",
    "invalid",
    "last-child",
    "last-of-type",
    "link",
    "only-child",
    "only-of-type",
    "optional",
    "out-of-range",
    "placeholder-shown",
    "read-only",
    "read-write",
    "required",
    "root",
    "scope",
    "target",
    "valid",
    "visited",
];

const PSEUDO_ELEMENTS: &[&str] = &[
    "after",
    "backdrop",
    "before",
    "cue",
    "first-letter",
    "first-line",
    "marker",
    "placeholder",
    "selection",
];

/// Single-colon spellings still accepted as pseudo-elements.
const LEGACY_PSEUDO_ELEMENTS: &[&str] = &["after", "before", "first-letter", "first-line"];

static RE_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)^\s* -?[\w\\-]+ (?:\|[\w\\-]+)? \s*
           (?: [~^$*|]?= \s* (?: "[^"]*" | '[^']*' | [^\s\]"']+ ) \s* (?:[iIsS]\s*)? )? $"#,
    )
    .unwrap()
});

static RE_NTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:odd|even|[+-]?\d+|[+-]?\d*n(?:\s*[+-]\s*\d+)?)\s*$").unwrap()
});

static RE_LANG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(?:["']?[A-Za-z][A-Za-z0-9*-]*["']?\s*,?\s*)+$"#).unwrap()
});

static RE_DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[A-Za-z_][\w-]*\s*:\s*[^;{}]+$").unwrap());

/// The default, regex-driven oracle.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicOracle;

impl SelectorOracle for HeuristicOracle {
    fn selector_validity(&self, selector: &str) -> CssValidity {
        let s = selector.trim();
        if s.is_empty() || s.contains('{') || s.contains('}') {
            return CssValidity::Invalid;
        }
        let mut scan = Scan::new(s);
        if !scan.validate_list() {
            return CssValidity::Invalid;
        }
        if scan.pseudo_element {
            CssValidity::PlainWithPseudoElement
        } else {
            CssValidity::Plain
        }
    }

    fn declaration_is_valid(&self, decl: &str) -> bool {
        let mut seen = false;
        for part in decl.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if !RE_DECLARATION.is_match(part) {
                return false;
            }
            seen = true;
        }
        seen
    }

    fn xpath_is_valid(&self, expr: &str) -> bool {
        let expr = expr.trim();
        if expr.is_empty() || expr.contains('{') || expr.contains('}') {
            return false;
        }
        let mut parens = 0i32;
        let mut brackets = 0i32;
        let mut quote = 0u8;
        for &b in expr.as_bytes() {
            if quote != 0 {
                if b == quote {
                    quote = 0;
                }
                continue;
            }
            match b {
                b'"' | b'\'' => quote = b,
                b'(' => parens += 1,
                b')' => parens -= 1,
                b'[' => brackets += 1,
                b']' => brackets -= 1,
                _ => {}
            }
            if parens < 0 || brackets < 0 {
                return false;
            }
        }
        parens == 0 && brackets == 0 && quote == 0
    }
}

// =============================================================================
// Selector scanner
// =============================================================================

struct Scan<'a> {
    bytes: &'a [u8],
    i: usize,
    pseudo_element: bool,
}

impl<'a> Scan<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            bytes: s.as_bytes(),
            i: 0,
            pseudo_element: false,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.i).copied()
    }

    fn skip_ws(&mut self) -> usize {
        let start = self.i;
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.i += 1;
        }
        self.i - start
    }

    /// selector-list := complex ("," complex)*
    fn validate_list(&mut self) -> bool {
        loop {
            if !self.validate_complex() {
                return false;
            }
            self.skip_ws();
            match self.peek() {
                None => return true,
                Some(b',') => self.i += 1,
                Some(_) => return false,
            }
        }
    }

    /// complex := compound (combinator compound)*
    fn validate_complex(&mut self) -> bool {
        self.skip_ws();
        if !self.validate_compound() {
            return false;
        }
        loop {
            let ws = self.skip_ws();
            match self.peek() {
                None | Some(b',') => return true,
                Some(b'>') | Some(b'+') | Some(b'~') => {
                    self.i += 1;
                    self.skip_ws();
                    if !self.validate_compound() {
                        return false;
                    }
                }
                Some(_) => {
                    if ws == 0 || !self.validate_compound() {
                        return false;
                    }
                }
            }
        }
    }

    /// compound := one or more simple selectors with no whitespace between.
    fn validate_compound(&mut self) -> bool {
        let mut any = false;
        loop {
            match self.peek() {
                Some(b'*') => {
                    self.i += 1;
                    any = true;
                }
                Some(b'#') | Some(b'.') => {
                    self.i += 1;
                    if self.scan_ident().is_none() {
                        return false;
                    }
                    any = true;
                }
                Some(b'[') => {
                    self.i += 1;
                    if !self.scan_attr() {
                        return false;
                    }
                    any = true;
                }
                Some(b':') => {
                    self.i += 1;
                    let double = self.peek() == Some(b':');
                    if double {
                        self.i += 1;
                    }
                    if !self.scan_pseudo(double) {
                        return false;
                    }
                    any = true;
                }
                Some(c) if is_ident_start(c) => {
                    // Type selector, only valid as the first simple selector.
                    if any || self.scan_ident().is_none() {
                        return false;
                    }
                    any = true;
                }
                _ => break,
            }
        }
        any
    }

    fn scan_pseudo(&mut self, double: bool) -> bool {
        let name = match self.scan_ident() {
            Some(name) => name.to_ascii_lowercase(),
            None => return false,
        };
        if double {
            if !PSEUDO_ELEMENTS.contains(&name.as_str()) {
                return false;
            }
            self.pseudo_element = true;
            return true;
        }
        if self.peek() == Some(b'(') {
            self.i += 1;
            let arg = match self.scan_balanced_arg() {
                Some(arg) => arg,
                None => return false,
            };
            return self.functional_arg_ok(&name, &arg);
        }
        if LEGACY_PSEUDO_ELEMENTS.contains(&name.as_str()) {
            self.pseudo_element = true;
            return true;
        }
        PSEUDO_CLASSES.contains(&name.as_str())
    }

    /// Functional pseudo-classes accepted as plain CSS. `:has()` is absent
    /// on purpose: filters that rely on it compile procedurally, matching
    /// engines without native support.
    fn functional_arg_ok(&mut self, name: &str, arg: &str) -> bool {
        match name {
            "not" | "is" | "where" => {
                let mut inner = Scan::new(arg.trim());
                let ok = !arg.trim().is_empty() && inner.validate_list();
                self.pseudo_element |= inner.pseudo_element;
                ok
            }
            "nth-child" | "nth-last-child" | "nth-of-type" | "nth-last-of-type" => {
                RE_NTH.is_match(arg)
            }
            "dir" => matches!(arg.trim(), "ltr" | "rtl"),
            "lang" => RE_LANG.is_match(arg),
            _ => false,
        }
    }

    /// Consumes the argument of a functional pseudo, starting just past the
    /// opening parenthesis, through the matching closing one.
    fn scan_balanced_arg(&mut self) -> Option<String> {
        let start = self.i;
        let mut depth = 1usize;
        let mut quote = 0u8;
        while let Some(b) = self.peek() {
            self.i += 1;
            if quote != 0 {
                if b == quote {
                    quote = 0;
                }
                continue;
            }
            match b {
                b'"' | b'\'' => quote = b,
                b'\\' => self.i += 1,
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        let arg = &self.bytes[start..self.i - 1];
                        return std::str::from_utf8(arg).ok().map(str::to_string);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn scan_attr(&mut self) -> bool {
        let start = self.i;
        let mut quote = 0u8;
        while let Some(b) = self.peek() {
            self.i += 1;
            if quote != 0 {
                if b == quote {
                    quote = 0;
                }
                continue;
            }
            match b {
                b'"' | b'\'' => quote = b,
                b']' => {
                    let inner = match std::str::from_utf8(&self.bytes[start..self.i - 1]) {
                        Ok(inner) => inner,
                        Err(_) => return false,
                    };
                    return RE_ATTR.is_match(inner);
                }
                _ => {}
            }
        }
        false
    }

    fn scan_ident(&mut self) -> Option<&'a str> {
        let start = self.i;
        let mut i = self.i;
        if self.bytes.get(i) == Some(&b'-') {
            i += 1;
        }
        let first = *self.bytes.get(i)?;
        if !is_ident_start(first) {
            return None;
        }
        while let Some(&c) = self.bytes.get(i) {
            if c == b'\\' {
                i = (i + 2).min(self.bytes.len());
            } else if c.is_ascii_alphanumeric() || c == b'_' || c == b'-' || c >= 0x80 {
                i += 1;
            } else {
                break;
            }
        }
        if i == start {
            return None;
        }
        self.i = i;
        std::str::from_utf8(&self.bytes[start..i]).ok()
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'\\' || c >= 0x80
}
