//! Definition/body separation for Rust fragments.
//!
//! A notebook fragment mixes items (functions, types, `use` declarations)
//! with statements meant to run. Items must live at module level while the
//! statements are evaluated as a block inside a generated `main`, so the
//! fragment is split line by line using leading keywords and brace depth.

use std::iter::Peekable;
use std::str::CharIndices;

use syn::Item;

/// Keywords that begin a module-level item.
const ITEM_KEYWORDS: &[&str] = &[
    "fn", "struct", "enum", "union", "impl", "trait", "mod", "use", "const", "static", "type",
    "extern",
];

/// Qualifiers that may precede an item keyword.
const ITEM_QUALIFIERS: &[&str] = &["async", "unsafe", "default", "extern \"C\""];

/// A Rust fragment split into module-level definitions and a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RustSource {
    /// Items placed at module level, in their original order.
    pub definitions: String,
    /// Statements and trailing expression evaluated inside `main`.
    pub body: Option<String>,
    /// The fragment defines its own `main`; it is compiled as-is.
    pub has_entry_point: bool,
}

impl RustSource {
    /// Whether the generated program reports a value through the result file.
    pub fn captures_value(&self) -> bool {
        !self.has_entry_point && self.body.is_some()
    }
}

/// Split a fragment into definitions and body.
///
/// A fragment that already defines `fn main` is passed through unmodified.
pub fn split_rust_source(code: &str) -> RustSource {
    let code = code.trim();

    if defines_entry_point(code) {
        return RustSource {
            definitions: code.to_string(),
            body: None,
            has_entry_point: true,
        };
    }

    let mut definitions = Vec::new();
    let mut body = Vec::new();
    let mut depth: i32 = 0;
    let mut in_attribute = false;
    let mut in_definition = false;

    for line in code.lines() {
        let scan = scan_line(line);
        depth += scan.delta;
        let trimmed = line.trim();
        // Item and attribute ends are judged without a trailing `//` comment.
        let tail = scan.code.trim_end();

        if in_attribute || trimmed.starts_with("#[") || trimmed.starts_with("#![") {
            definitions.push(line);
            in_attribute = !tail.ends_with(']');
            continue;
        }

        if in_definition || starts_item(trimmed) {
            definitions.push(line);
            in_definition = depth > 0 || !(tail.ends_with(';') || tail.ends_with('}'));
            continue;
        }

        body.push(line);
    }

    let body = body.join("\n");
    let body = body.trim();

    RustSource {
        definitions: definitions.join("\n"),
        body: (!body.is_empty()).then(|| body.to_string()),
        has_entry_point: false,
    }
}

/// Whether the fragment defines a top-level `fn main`.
///
/// Parses with `syn` when the fragment is a valid file; fragments with loose
/// statements fail to parse, so those fall back to a token scan.
pub fn defines_entry_point(code: &str) -> bool {
    match syn::parse_file(code) {
        Ok(file) => file
            .items
            .iter()
            .any(|item| matches!(item, Item::Fn(func) if func.sig.ident == "main")),
        Err(_) => code.lines().any(|line| declares_main(strip_visibility(line.trim()))),
    }
}

fn declares_main(line: &str) -> bool {
    line.strip_prefix("fn")
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix("main"))
        .is_some_and(|rest| rest.trim_start().starts_with('('))
}

fn starts_item(trimmed: &str) -> bool {
    if trimmed.starts_with("macro_rules!") {
        return true;
    }

    let mut rest = strip_visibility(trimmed);
    loop {
        let stripped = ITEM_QUALIFIERS
            .iter()
            .find_map(|q| strip_word(rest, q))
            .filter(|after| ITEM_KEYWORDS.iter().any(|kw| strip_word(after, kw).is_some()));
        match stripped {
            Some(after) => rest = after,
            None => break,
        }
    }

    ITEM_KEYWORDS.iter().any(|kw| strip_word(rest, kw).is_some())
}

/// Strip `pub`, `pub(crate)`, `pub(in path)` and similar.
fn strip_visibility(line: &str) -> &str {
    let Some(rest) = line.strip_prefix("pub") else {
        return line;
    };
    if let Some(scoped) = rest.strip_prefix('(') {
        return match scoped.find(')') {
            Some(close) => scoped[close + 1..].trim_start(),
            None => line,
        };
    }
    if rest.starts_with(char::is_whitespace) {
        rest.trim_start()
    } else {
        line
    }
}

/// Strip a whole word followed by whitespace.
fn strip_word<'a>(line: &'a str, word: &str) -> Option<&'a str> {
    line.strip_prefix(word)
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .map(str::trim_start)
}

/// Brace depth change of one line and the code before any `//` comment.
struct LineScan<'a> {
    delta: i32,
    code: &'a str,
}

/// Scan a line, skipping string and char literals.
///
/// Raw strings and block comments are not recognised.
fn scan_line(line: &str) -> LineScan<'_> {
    let mut delta = 0;
    let mut in_string = false;
    let mut chars = line.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        match c {
            '\\' if in_string => {
                chars.next();
            }
            '"' => in_string = !in_string,
            '\'' if !in_string => skip_char_literal(&mut chars),
            '/' if !in_string && matches!(chars.peek(), Some((_, '/'))) => {
                return LineScan {
                    delta,
                    code: &line[..index],
                };
            }
            '{' if !in_string => delta += 1,
            '}' if !in_string => delta -= 1,
            _ => {}
        }
    }

    LineScan { delta, code: line }
}

/// Consume a char literal following an opening `'`.
///
/// Lifetimes and loop labels have no closing quote and are left alone.
fn skip_char_literal(chars: &mut Peekable<CharIndices<'_>>) {
    let mut ahead = chars.clone();
    match ahead.next() {
        Some((_, '\\')) => {
            ahead.next();
            if ahead.any(|(_, c)| c == '\'') {
                *chars = ahead;
            }
        }
        Some(_) if matches!(ahead.peek(), Some((_, '\''))) => {
            ahead.next();
            *chars = ahead;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_only() {
        let source = split_rust_source("1 + 2");
        assert_eq!(source.definitions, "");
        assert_eq!(source.body.as_deref(), Some("1 + 2"));
        assert!(source.captures_value());
    }

    #[test]
    fn test_definitions_and_body() {
        let code = r#"
use std::collections::HashMap;

#[derive(Debug)]
struct Point {
    x: i32,
    y: i32,
}

fn make() -> Point {
    Point { x: 1, y: 2 }
}

let p = make();
p.x + p.y
"#;
        let source = split_rust_source(code);

        assert!(source.definitions.contains("use std::collections::HashMap;"));
        assert!(source.definitions.contains("#[derive(Debug)]"));
        assert!(source.definitions.contains("struct Point {"));
        assert!(source.definitions.contains("    Point { x: 1, y: 2 }"));
        assert_eq!(source.body.as_deref(), Some("let p = make();\np.x + p.y"));
    }

    #[test]
    fn test_signature_with_brace_on_next_line() {
        let code = "fn double(x: i32) -> i32\n{\n    x * 2\n}\ndouble(21)";
        let source = split_rust_source(code);

        assert_eq!(source.definitions, "fn double(x: i32) -> i32\n{\n    x * 2\n}");
        assert_eq!(source.body.as_deref(), Some("double(21)"));
    }

    #[test]
    fn test_qualified_items() {
        let code = "pub(crate) const LIMIT: u32 = 3;\npub async fn go() {}\nunsafe fn raw() {}\nmacro_rules! twice { ($e:expr) => { $e * 2 } }\ntwice!(LIMIT)";
        let source = split_rust_source(code);

        assert_eq!(source.definitions.lines().count(), 4);
        assert_eq!(source.body.as_deref(), Some("twice!(LIMIT)"));
    }

    #[test]
    fn test_unsafe_block_is_body() {
        let source = split_rust_source("let v = unsafe { 1 };\nv");
        assert_eq!(source.definitions, "");
        assert_eq!(source.body.as_deref(), Some("let v = unsafe { 1 };\nv"));
    }

    #[test]
    fn test_definitions_only() {
        let source = split_rust_source("struct Unit;\nfn helper() -> u8 { 1 }");
        assert!(source.body.is_none());
        assert!(!source.captures_value());
        assert!(!source.has_entry_point);
    }

    #[test]
    fn test_entry_point_passthrough() {
        let code = "fn helper() {}\n\nfn main() {\n    println!(\"hi\");\n}\n";
        let source = split_rust_source(code);

        assert!(source.has_entry_point);
        assert_eq!(source.definitions, code.trim());
        assert!(!source.captures_value());
    }

    #[test]
    fn test_entry_point_detection_fallback() {
        // Not a valid file, but still declares main.
        assert!(defines_entry_point("let x = 1;\npub fn main () {}"));
        assert!(!defines_entry_point("let main = 1;\nmain"));
        // A string mentioning main is not a declaration.
        assert!(!defines_entry_point("fn helper() { let s = \"fn main()\"; }"));
    }

    #[test]
    fn test_trailing_comment_ends_item() {
        let source = split_rust_source("const X: i32 = 5; // five\nX * 2");
        assert_eq!(source.definitions, "const X: i32 = 5; // five");
        assert_eq!(source.body.as_deref(), Some("X * 2"));

        let source = split_rust_source("fn one() -> i32 { 1 } // helper\none() + 1");
        assert_eq!(source.definitions, "fn one() -> i32 { 1 } // helper");
        assert_eq!(source.body.as_deref(), Some("one() + 1"));
    }

    #[test]
    fn test_trailing_comment_ends_attribute() {
        let source = split_rust_source("#[derive(Debug)] // c\nstruct Unit;\nUnit");
        assert_eq!(source.definitions, "#[derive(Debug)] // c\nstruct Unit;");
        assert_eq!(source.body.as_deref(), Some("Unit"));
    }

    #[test]
    fn test_comment_inside_signature_keeps_item_open() {
        let source = split_rust_source("fn two() -> i32 // no brace yet\n{\n    2\n}\ntwo()");
        assert_eq!(source.definitions.lines().count(), 4);
        assert_eq!(source.body.as_deref(), Some("two()"));
    }

    #[test]
    fn test_braces_in_strings_ignored() {
        assert_eq!(scan_line(r#"let s = "{ not a block";"#).delta, 0);
        assert_eq!(scan_line(r#"fn f() { // }"#).delta, 1);
        assert_eq!(scan_line(r#"let s = "\"{";"#).delta, 0);
    }

    #[test]
    fn test_char_literals_ignored() {
        assert_eq!(scan_line("let open = '{';").delta, 0);
        assert_eq!(scan_line("let quote = '\"'; {").delta, 1);
        assert_eq!(scan_line(r"let q = '\''; let b = '\u{7b}';").delta, 0);
        assert_eq!(scan_line("fn f<'a>(s: &'a str) {").delta, 1);
        assert_eq!(scan_line("'outer: loop { // }").delta, 1);
    }

    #[test]
    fn test_comment_position() {
        assert_eq!(scan_line("let x = 1; // one").code, "let x = 1; ");
        assert_eq!(scan_line(r#"let url = "http://x";"#).code, r#"let url = "http://x";"#);
        assert_eq!(scan_line("let s = '/'; // c").code, "let s = '/'; ");
    }
}
