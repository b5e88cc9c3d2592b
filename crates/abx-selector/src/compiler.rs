//! Procedural cosmetic-selector compiler.
//!
//! Takes the raw selector part of an extended filter and produces either a
//! plain CSS selector (the fast path) or a task list of procedural
//! operators, each with a compiled argument. The compiled form also carries
//! a canonical decompiled string which downstream consumers dedupe on.
//!
//! AdGuard/ABP surface syntax (`sel { decl }` style injection, the
//! `[-abp-...=...]` / `[-ext-...=...]` bracket operators) is rewritten to
//! the equivalent `:op(...)` form before compilation.

use std::collections::HashMap;

use memchr::memchr3;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::oracle::{CssValidity, HeuristicOracle, SelectorOracle};

// =============================================================================
// Compiled form
// =============================================================================

/// A `/source/flags` regex argument. Literal (non-regex) arguments are
/// stored escaped, with the original text kept in the compiler's reverse
/// map so decompilation can restore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexLiteral {
    pub source: String,
    pub flags: String,
}

/// Argument of `:upward(...)`: an ancestor count or a selector to climb to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpwardArg {
    Depth(u8),
    Selector(String),
}

/// One procedural operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorTask {
    /// `:has-text(...)` - element text must match.
    HasText(RegexLiteral),
    /// `:matches-css(...)`, with `pseudo` set for the -after/-before forms.
    MatchesCss {
        pseudo: Option<&'static str>,
        name: String,
        value: RegexLiteral,
    },
    /// `:has(...)` / `:if(...)` - a descendant must match.
    Has(Box<CompiledSelector>),
    /// `:if-not(...)` / procedural `:not(...)` - no descendant may match.
    IfNot(Box<CompiledSelector>),
    /// `:min-text-length(...)`.
    MinTextLength(u32),
    /// `:upward(...)` / `:nth-ancestor(...)`.
    Upward(UpwardArg),
    /// `:remove()` action.
    Remove,
    /// `:style(...)` action.
    Style(String),
    /// `:watch-attr(...)`.
    WatchAttr(Vec<String>),
    /// `:xpath(...)`.
    Xpath(String),
    /// A residual plain-CSS fragment between operators.
    Spath(String),
}

/// Result of compiling a cosmetic selector. A plain selector has an empty
/// task list and no action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSelector {
    /// The plain CSS prefix the tasks start from (may be empty).
    pub selector: String,
    /// Procedural tasks, in evaluation order.
    pub tasks: Vec<SelectorTask>,
    /// Trailing action (`:remove()` or `:style(...)`), root only.
    pub action: Option<SelectorTask>,
    /// The selector contains a pseudo-element.
    pub pseudo_element: bool,
    /// The selector text as it appeared in the filter.
    pub raw: String,
    /// Canonical decompiled form; the dedupe key.
    pub canonical: String,
}

impl CompiledSelector {
    pub fn is_plain(&self) -> bool {
        self.tasks.is_empty() && self.action.is_none()
    }

    fn plain(raw: &str, selector: &str, pseudo_element: bool) -> Self {
        Self {
            selector: selector.to_string(),
            tasks: Vec::new(),
            action: None,
            pseudo_element,
            raw: raw.to_string(),
            canonical: selector.to_string(),
        }
    }
}

// =============================================================================
// Compiler
// =============================================================================

static RE_OPERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r":(?:-abp-contains|-abp-has|contains|has-text|has|if-not|if|matches-css-after|matches-css-before|matches-css|min-text-length|not|nth-ancestor|remove|style|upward|watch-attrs|watch-attr|xpath)\(",
    )
    .unwrap()
});

static RE_REGEX_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(.+)/([dgimsuvy]*)$").unwrap());

static RE_LEADING_COMBINATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[>+~]").unwrap());

static RE_SIBLING_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[+~]").unwrap());

static RE_EXTENDED_BRACKET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[-(?:abp|ext)-([a-z-]+)=(?:"(.+?)"|'(.+?)')\]"#).unwrap()
});

static RE_STYLE_INJECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*(.+?)\s*\{\s*(.+?)\s*\}\s*$").unwrap());

static RE_DISPLAY_NONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^display\s*:\s*none\s*!important\s*;?$").unwrap());

static RE_REMOVE_TRUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^remove\s*:\s*true\s*;?$").unwrap());

static RE_CSS_PROPERTY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[A-Za-z_][\w-]*$").unwrap());

enum Compiled {
    Task(SelectorTask),
    Action(SelectorTask),
}

/// Reusable selector compiler. One per parser; `reset` clears the regex
/// reverse map between lines.
pub struct SelectorCompiler {
    oracle: Box<dyn SelectorOracle>,
    regex_raw: HashMap<String, String>,
}

impl Default for SelectorCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectorCompiler {
    pub fn new() -> Self {
        Self::with_oracle(Box::new(HeuristicOracle))
    }

    pub fn with_oracle(oracle: Box<dyn SelectorOracle>) -> Self {
        Self {
            oracle,
            regex_raw: HashMap::new(),
        }
    }

    /// Forget per-line state. Called by the parser before each analysis.
    pub fn reset(&mut self) {
        self.regex_raw.clear();
    }

    /// Compile the selector part of a `##`-style filter. `None` rejects.
    pub fn compile(&mut self, raw: &str) -> Option<CompiledSelector> {
        let rewritten = self.rewrite_extended_syntax(raw)?;
        let s = rewritten.trim();
        if s.is_empty() {
            return None;
        }
        match self.oracle.selector_validity(s) {
            CssValidity::Plain => return Some(CompiledSelector::plain(raw, s, false)),
            CssValidity::PlainWithPseudoElement => {
                return Some(CompiledSelector::plain(raw, s, true))
            }
            CssValidity::Invalid => {}
        }
        let mut compiled = self.compile_procedural(s, true)?;
        compiled.raw = raw.to_string();
        Some(compiled)
    }

    /// Compile an AdGuard `#$#`-style `sel { decl }` injection.
    pub fn compile_style_injection(&mut self, raw: &str) -> Option<CompiledSelector> {
        let caps = RE_STYLE_INJECTION.captures(raw)?;
        let sel = caps.get(1).unwrap().as_str();
        let decl = caps.get(2).unwrap().as_str().trim();
        if RE_DISPLAY_NONE.is_match(decl) {
            return self.compile(sel);
        }
        if RE_REMOVE_TRUE.is_match(decl) {
            return self.compile(&format!("{sel}:remove()"));
        }
        self.compile(&format!("{sel}:style({decl})"))
    }

    /// Canonical textual form of a compiled selector, with escaped literal
    /// regexes restored from the reverse map.
    pub fn decompile(&self, compiled: &CompiledSelector) -> String {
        if compiled.is_plain() {
            return compiled.selector.clone();
        }
        let mut out = compiled.selector.clone();
        for task in &compiled.tasks {
            self.render_task(task, &mut out);
        }
        if let Some(action) = &compiled.action {
            self.render_task(action, &mut out);
        }
        out
    }

    // -------------------------------------------------------------------------
    // Surface rewrites
    // -------------------------------------------------------------------------

    fn rewrite_extended_syntax(&self, raw: &str) -> Option<String> {
        let mut s = raw.to_string();
        loop {
            let (range, replacement) = match RE_EXTENDED_BRACKET.captures(&s) {
                None => break,
                Some(caps) => {
                    let op = match caps.get(1).unwrap().as_str() {
                        "contains" | "has-text" => "has-text",
                        "has" => "has",
                        "matches-css" => "matches-css",
                        "matches-css-after" => "matches-css-after",
                        "matches-css-before" => "matches-css-before",
                        _ => return None,
                    };
                    let value = caps
                        .get(2)
                        .or_else(|| caps.get(3))
                        .unwrap()
                        .as_str();
                    (caps.get(0).unwrap().range(), format!(":{op}({value})"))
                }
            };
            s.replace_range(range, &replacement);
        }
        Some(s)
    }

    // -------------------------------------------------------------------------
    // Procedural compilation
    // -------------------------------------------------------------------------

    fn compile_procedural(&mut self, selector: &str, root: bool) -> Option<CompiledSelector> {
        let bytes = selector.as_bytes();
        let mut tasks: Vec<SelectorTask> = Vec::new();
        let mut action: Option<SelectorTask> = None;
        let mut prefix: Option<String> = None;
        let mut anchor = 0usize;
        let mut search = 0usize;
        loop {
            let mat = match RE_OPERATOR.find_at(selector, search) {
                Some(mat) => mat,
                None => {
                    let frag = &selector[anchor..];
                    if !frag.is_empty() {
                        if action.is_some() {
                            return None;
                        }
                        if tasks.is_empty() && prefix.is_none() {
                            prefix = Some(frag.to_string());
                        } else {
                            tasks.push(self.compile_spath(frag)?);
                        }
                    }
                    break;
                }
            };
            let open = mat.end() - 1;
            let close = find_matching_paren(bytes, open)?;
            let whole = &selector[mat.start()..=close];
            if self.oracle.selector_validity(whole) != CssValidity::Invalid {
                // Plain CSS that merely looks like an operator, e.g. a
                // native `:not(.x)`; leave it to the surrounding fragment.
                search = close + 1;
                continue;
            }
            if action.is_some() {
                return None;
            }
            let frag = &selector[anchor..mat.start()];
            if !frag.is_empty() {
                if tasks.is_empty() && prefix.is_none() {
                    prefix = Some(frag.to_string());
                } else {
                    tasks.push(self.compile_spath(frag)?);
                }
            }
            let name = &mat.as_str()[1..mat.as_str().len() - 1];
            let arg = &selector[open + 1..close];
            match self.compile_operator(name, arg, root)? {
                Compiled::Task(task) => tasks.push(task),
                Compiled::Action(task) => action = Some(task),
            }
            anchor = close + 1;
            search = close + 1;
        }
        if tasks.is_empty() && action.is_none() {
            return None;
        }
        if matches!(action, Some(SelectorTask::Style(_))) && tasks.len() > 1 {
            return None;
        }
        let mut pseudo_element = false;
        let mut sel_prefix = prefix.map(|p| p.trim().to_string()).unwrap_or_default();
        if !sel_prefix.is_empty() {
            if sel_prefix.ends_with(['>', '+', '~']) {
                sel_prefix.push_str(" *");
            }
            match self.oracle.selector_validity(&sel_prefix) {
                CssValidity::Plain => {}
                CssValidity::PlainWithPseudoElement => pseudo_element = true,
                CssValidity::Invalid => {
                    if root || !RE_SIBLING_PREFIX.is_match(&sel_prefix) {
                        return None;
                    }
                }
            }
        }
        let mut compiled = CompiledSelector {
            selector: sel_prefix,
            tasks,
            action,
            pseudo_element,
            raw: selector.to_string(),
            canonical: String::new(),
        };
        compiled.canonical = self.decompile(&compiled);
        Some(compiled)
    }

    fn compile_operator(&mut self, name: &str, arg: &str, root: bool) -> Option<Compiled> {
        let task = match name {
            "-abp-contains" | "contains" | "has-text" => {
                SelectorTask::HasText(self.compile_regex_arg(arg, false)?)
            }
            "-abp-has" | "has" | "if" => {
                SelectorTask::Has(Box::new(self.compile_conditional(arg)?))
            }
            "if-not" => SelectorTask::IfNot(Box::new(self.compile_conditional(arg)?)),
            "not" => {
                // A plain-CSS argument stays native CSS4 `:not`.
                if self.oracle.selector_validity(arg) != CssValidity::Invalid {
                    return None;
                }
                SelectorTask::IfNot(Box::new(self.compile_conditional(arg)?))
            }
            "matches-css" => self.compile_matches_css(None, arg)?,
            "matches-css-after" => self.compile_matches_css(Some("after"), arg)?,
            "matches-css-before" => self.compile_matches_css(Some("before"), arg)?,
            "min-text-length" => {
                let n = arg.trim().parse::<u32>().ok()?;
                if n >= 1 << 31 {
                    return None;
                }
                SelectorTask::MinTextLength(n)
            }
            "nth-ancestor" | "upward" => {
                let arg = arg.trim();
                if let Ok(n) = arg.parse::<u32>() {
                    if !(1..256).contains(&n) {
                        return None;
                    }
                    SelectorTask::Upward(UpwardArg::Depth(n as u8))
                } else {
                    if self.oracle.selector_validity(arg) == CssValidity::Invalid {
                        return None;
                    }
                    SelectorTask::Upward(UpwardArg::Selector(arg.to_string()))
                }
            }
            "watch-attr" | "watch-attrs" => {
                let attrs = arg
                    .split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect();
                SelectorTask::WatchAttr(attrs)
            }
            "xpath" => {
                let expr = arg.trim();
                if !self.oracle.xpath_is_valid(expr) {
                    return None;
                }
                SelectorTask::Xpath(expr.to_string())
            }
            "remove" => {
                if !root || !arg.trim().is_empty() {
                    return None;
                }
                return Some(Compiled::Action(SelectorTask::Remove));
            }
            "style" => {
                if !root {
                    return None;
                }
                let decl = arg.trim();
                if decl.contains('\\') || decl.to_ascii_lowercase().contains("url(") {
                    return None;
                }
                if !self.oracle.declaration_is_valid(decl) {
                    return None;
                }
                return Some(Compiled::Action(SelectorTask::Style(decl.to_string())));
            }
            _ => return None,
        };
        Some(Compiled::Task(task))
    }

    /// A conditional-selector argument (`:has`, `:if-not`, ...): compiled
    /// recursively, with `:scope ` prepended when it leads with a
    /// combinator.
    fn compile_conditional(&mut self, arg: &str) -> Option<CompiledSelector> {
        let scoped;
        let arg = if RE_LEADING_COMBINATOR.is_match(arg) {
            scoped = format!(":scope {}", arg.trim());
            scoped.as_str()
        } else {
            arg.trim()
        };
        if arg.is_empty() {
            return None;
        }
        match self.oracle.selector_validity(arg) {
            CssValidity::Plain => Some(CompiledSelector::plain(arg, arg, false)),
            CssValidity::PlainWithPseudoElement => Some(CompiledSelector::plain(arg, arg, true)),
            CssValidity::Invalid => self.compile_procedural(arg, false),
        }
    }

    fn compile_matches_css(&mut self, pseudo: Option<&'static str>, arg: &str) -> Option<SelectorTask> {
        let colon = arg.find(':')?;
        let name = arg[..colon].trim();
        let value = arg[colon + 1..].trim();
        if value.is_empty() || !RE_CSS_PROPERTY.is_match(name) {
            return None;
        }
        Some(SelectorTask::MatchesCss {
            pseudo,
            name: name.to_string(),
            value: self.compile_regex_arg(value, true)?,
        })
    }

    /// A text-matching argument: a `/regex/flags` literal, or a literal
    /// string escaped into a regex (anchored for CSS-value matching) and
    /// remembered in the reverse map.
    fn compile_regex_arg(&mut self, arg: &str, anchored: bool) -> Option<RegexLiteral> {
        if let Some(caps) = RE_REGEX_LITERAL.captures(arg) {
            return Some(RegexLiteral {
                source: caps.get(1).unwrap().as_str().to_string(),
                flags: caps.get(2).unwrap().as_str().to_string(),
            });
        }
        if arg.is_empty() {
            return None;
        }
        let escaped = regex::escape(arg);
        let source = if anchored {
            format!("^{escaped}$")
        } else {
            escaped
        };
        self.regex_raw.insert(source.clone(), arg.to_string());
        Some(RegexLiteral {
            source,
            flags: String::new(),
        })
    }

    fn compile_spath(&self, frag: &str) -> Option<SelectorTask> {
        if self.oracle.selector_validity(&format!("*{frag}")) == CssValidity::Invalid {
            return None;
        }
        Some(SelectorTask::Spath(frag.to_string()))
    }

    // -------------------------------------------------------------------------
    // Decompilation
    // -------------------------------------------------------------------------

    fn render_regex(&self, lit: &RegexLiteral, out: &mut String) {
        if lit.flags.is_empty() {
            if let Some(raw) = self.regex_raw.get(&lit.source) {
                out.push_str(raw);
                return;
            }
        }
        out.push('/');
        out.push_str(&lit.source);
        out.push('/');
        out.push_str(&lit.flags);
    }

    fn render_task(&self, task: &SelectorTask, out: &mut String) {
        match task {
            SelectorTask::HasText(lit) => {
                out.push_str(":has-text(");
                self.render_regex(lit, out);
                out.push(')');
            }
            SelectorTask::MatchesCss {
                pseudo,
                name,
                value,
            } => {
                out.push_str(":matches-css");
                if let Some(p) = pseudo {
                    out.push('-');
                    out.push_str(p);
                }
                out.push('(');
                out.push_str(name);
                out.push_str(": ");
                self.render_regex(value, out);
                out.push(')');
            }
            SelectorTask::Has(inner) => {
                out.push_str(":has(");
                out.push_str(&self.decompile(inner));
                out.push(')');
            }
            SelectorTask::IfNot(inner) => {
                out.push_str(":not(");
                out.push_str(&self.decompile(inner));
                out.push(')');
            }
            SelectorTask::MinTextLength(n) => {
                out.push_str(":min-text-length(");
                out.push_str(&n.to_string());
                out.push(')');
            }
            SelectorTask::Upward(UpwardArg::Depth(n)) => {
                out.push_str(":upward(");
                out.push_str(&n.to_string());
                out.push(')');
            }
            SelectorTask::Upward(UpwardArg::Selector(sel)) => {
                out.push_str(":upward(");
                out.push_str(sel);
                out.push(')');
            }
            SelectorTask::Remove => out.push_str(":remove()"),
            SelectorTask::Style(decl) => {
                out.push_str(":style(");
                out.push_str(decl);
                out.push(')');
            }
            SelectorTask::WatchAttr(attrs) => {
                out.push_str(":watch-attr(");
                out.push_str(&attrs.join(", "));
                out.push(')');
            }
            SelectorTask::Xpath(expr) => {
                out.push_str(":xpath(");
                out.push_str(expr);
                out.push(')');
            }
            SelectorTask::Spath(frag) => out.push_str(frag),
        }
    }
}

/// Matching `)` for the `(` at `open`, honoring backslash escapes.
fn find_matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = open + 1;
    while i < bytes.len() {
        let at = i + memchr3(b'(', b')', b'\\', &bytes[i..])?;
        match bytes[at] {
            b'\\' => i = at + 2,
            b'(' => {
                depth += 1;
                i = at + 1;
            }
            _ => {
                depth -= 1;
                if depth == 0 {
                    return Some(at);
                }
                i = at + 1;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> SelectorCompiler {
        SelectorCompiler::new()
    }

    #[test]
    fn test_plain_fast_path() {
        let mut c = compiler();
        let out = c.compile(".ad-banner").unwrap();
        assert!(out.is_plain());
        assert_eq!(out.selector, ".ad-banner");
        assert_eq!(out.canonical, ".ad-banner");
        assert!(!out.pseudo_element);
    }

    #[test]
    fn test_plain_pseudo_element() {
        let mut c = compiler();
        let out = c.compile("div::before").unwrap();
        assert!(out.is_plain());
        assert!(out.pseudo_element);
    }

    #[test]
    fn test_has_text_regex_literal() {
        let mut c = compiler();
        let out = c.compile(".container > .ad:has-text(/sponsor/i)").unwrap();
        assert_eq!(out.selector, ".container > .ad");
        assert_eq!(
            out.tasks,
            vec![SelectorTask::HasText(RegexLiteral {
                source: "sponsor".to_string(),
                flags: "i".to_string(),
            })]
        );
        assert_eq!(out.canonical, ".container > .ad:has-text(/sponsor/i)");
    }

    #[test]
    fn test_has_text_literal_round_trips() {
        let mut c = compiler();
        let out = c.compile("div:has-text(Sponsored (ad))").unwrap();
        match &out.tasks[0] {
            SelectorTask::HasText(lit) => {
                assert!(lit.source.contains(r"\("));
                assert!(lit.flags.is_empty());
            }
            other => panic!("unexpected task {other:?}"),
        }
        // Decompilation restores the raw literal through the reverse map.
        assert_eq!(out.canonical, "div:has-text(Sponsored (ad))");
    }

    #[test]
    fn test_nested_has() {
        let mut c = compiler();
        let out = c.compile("div:has(> .ad:has-text(promo))").unwrap();
        match &out.tasks[0] {
            SelectorTask::Has(inner) => {
                assert_eq!(inner.selector, ":scope > .ad");
                assert!(matches!(inner.tasks[0], SelectorTask::HasText(_)));
            }
            other => panic!("unexpected task {other:?}"),
        }
        assert_eq!(out.canonical, "div:has(:scope > .ad:has-text(promo))");
    }

    #[test]
    fn test_has_plain_argument() {
        let mut c = compiler();
        let out = c.compile("div:has(.x)").unwrap();
        match &out.tasks[0] {
            SelectorTask::Has(inner) => assert!(inner.is_plain()),
            other => panic!("unexpected task {other:?}"),
        }
    }

    #[test]
    fn test_not_plain_argument_stays_native() {
        let mut c = compiler();
        // `div:not(.keep)` is valid CSS4, so there is nothing procedural
        // about it; the fast path keeps it whole.
        let out = c.compile("div:not(.keep)").unwrap();
        assert!(out.is_plain());
    }

    #[test]
    fn test_not_procedural_argument() {
        let mut c = compiler();
        let out = c.compile("div:not(:has-text(keep))").unwrap();
        assert!(matches!(out.tasks[0], SelectorTask::IfNot(_)));
    }

    #[test]
    fn test_matches_css() {
        let mut c = compiler();
        let out = c
            .compile("span:matches-css(background-image: /^url/)")
            .unwrap();
        match &out.tasks[0] {
            SelectorTask::MatchesCss {
                pseudo,
                name,
                value,
            } => {
                assert_eq!(*pseudo, None);
                assert_eq!(name, "background-image");
                assert_eq!(value.source, "^url");
            }
            other => panic!("unexpected task {other:?}"),
        }
    }

    #[test]
    fn test_matches_css_literal_anchored() {
        let mut c = compiler();
        let out = c.compile("span:matches-css-before(content: hot)").unwrap();
        match &out.tasks[0] {
            SelectorTask::MatchesCss { pseudo, value, .. } => {
                assert_eq!(*pseudo, Some("before"));
                assert_eq!(value.source, "^hot$");
            }
            other => panic!("unexpected task {other:?}"),
        }
        assert_eq!(out.canonical, "span:matches-css-before(content: hot)");
    }

    #[test]
    fn test_upward_depth_and_selector() {
        let mut c = compiler();
        let out = c.compile(".a:upward(2)").unwrap();
        assert_eq!(out.tasks, vec![SelectorTask::Upward(UpwardArg::Depth(2))]);

        let out = c.compile(".a:upward(.container)").unwrap();
        assert_eq!(
            out.tasks,
            vec![SelectorTask::Upward(UpwardArg::Selector(
                ".container".to_string()
            ))]
        );

        assert!(c.compile(".a:upward(0)").is_none());
        assert!(c.compile(".a:upward(256)").is_none());
    }

    #[test]
    fn test_nth_ancestor_alias() {
        let mut c = compiler();
        let out = c.compile(".a:nth-ancestor(3)").unwrap();
        assert_eq!(out.tasks, vec![SelectorTask::Upward(UpwardArg::Depth(3))]);
        assert_eq!(out.canonical, ".a:upward(3)");
    }

    #[test]
    fn test_min_text_length() {
        let mut c = compiler();
        let out = c.compile("div:min-text-length(200)").unwrap();
        assert_eq!(out.tasks, vec![SelectorTask::MinTextLength(200)]);
        assert!(c.compile("div:min-text-length(x)").is_none());
    }

    #[test]
    fn test_watch_attr() {
        let mut c = compiler();
        let out = c.compile("div:watch-attr(class, style)").unwrap();
        assert_eq!(
            out.tasks,
            vec![SelectorTask::WatchAttr(vec![
                "class".to_string(),
                "style".to_string()
            ])]
        );
        let out = c.compile("div:watch-attrs(class)").unwrap();
        assert_eq!(out.canonical, "div:watch-attr(class)");
    }

    #[test]
    fn test_xpath() {
        let mut c = compiler();
        let out = c.compile(":xpath(//div[@id='ad'])").unwrap();
        assert_eq!(out.selector, "");
        assert!(matches!(&out.tasks[0], SelectorTask::Xpath(e) if e == "//div[@id='ad']"));
        assert!(c.compile(":xpath(//div[)").is_none());
    }

    #[test]
    fn test_remove_action() {
        let mut c = compiler();
        let out = c.compile(".ad:remove()").unwrap();
        assert_eq!(out.action, Some(SelectorTask::Remove));
        assert!(out.tasks.is_empty());
        // Anything after the action rejects.
        assert!(c.compile(".ad:remove():upward(1)").is_none());
        assert!(c.compile(".ad:remove(arg)").is_none());
    }

    #[test]
    fn test_style_action() {
        let mut c = compiler();
        let out = c.compile(".ad:style(position: absolute !important)").unwrap();
        assert!(matches!(&out.action, Some(SelectorTask::Style(d)) if d.contains("absolute")));
        assert!(c.compile(".ad:style(background: url(x.png))").is_none());
        assert!(c.compile(".ad:style()").is_none());
    }

    #[test]
    fn test_style_with_many_tasks_rejects() {
        let mut c = compiler();
        assert!(c
            .compile(".a:has-text(x):upward(1):style(color: red)")
            .is_none());
    }

    #[test]
    fn test_spath_fragment() {
        let mut c = compiler();
        let out = c.compile(".a:upward(1) > .b").unwrap();
        assert_eq!(
            out.tasks,
            vec![
                SelectorTask::Upward(UpwardArg::Depth(1)),
                SelectorTask::Spath(" > .b".to_string()),
            ]
        );
        assert_eq!(out.canonical, ".a:upward(1) > .b");
    }

    #[test]
    fn test_dangling_combinator_prefix() {
        let mut c = compiler();
        let out = c.compile(".a >:has-text(x)").unwrap();
        assert_eq!(out.selector, ".a > *");
    }

    #[test]
    fn test_invalid_prefix_rejects_at_root() {
        let mut c = compiler();
        assert!(c.compile("]]:has-text(x)").is_none());
    }

    #[test]
    fn test_style_injection_rewrites() {
        let mut c = compiler();
        let out = c
            .compile_style_injection(".ad { display:none!important; }")
            .unwrap();
        assert!(out.is_plain());
        assert_eq!(out.selector, ".ad");

        let out = c.compile_style_injection(".ad { remove:true; }").unwrap();
        assert_eq!(out.action, Some(SelectorTask::Remove));

        let out = c
            .compile_style_injection(".ad { color: red; }")
            .unwrap();
        assert!(matches!(&out.action, Some(SelectorTask::Style(d)) if d == "color: red;"));

        assert!(c.compile_style_injection(".ad").is_none());
    }

    #[test]
    fn test_extended_bracket_rewrites() {
        let mut c = compiler();
        let out = c.compile(r#"div[-abp-contains="promo"]"#).unwrap();
        assert!(matches!(out.tasks[0], SelectorTask::HasText(_)));
        assert_eq!(out.canonical, "div:has-text(promo)");

        let out = c.compile(r#"div[-ext-has=".sponsor"]"#).unwrap();
        assert!(matches!(out.tasks[0], SelectorTask::Has(_)));

        assert!(c.compile(r#"div[-abp-bogus="x"]"#).is_none());
    }

    #[test]
    fn test_reverse_map_cleared_on_reset() {
        let mut c = compiler();
        let out = c.compile("div:has-text(plain words)").unwrap();
        assert_eq!(out.canonical, "div:has-text(plain words)");
        c.reset();
        // Same compiled form, decompiled without the map: falls back to
        // the escaped regex rendering.
        let rendered = c.decompile(&out);
        assert!(rendered.starts_with("div:has-text(/"));
    }

    #[test]
    fn test_no_operator_rejects() {
        let mut c = compiler();
        assert!(c.compile("div:bogus-op(x)").is_none());
        assert!(c.compile("").is_none());
    }
}
