//! Return-wrapping and import hoisting for JavaScript-family fragments.

/// Keywords that introduce a statement rather than an expression.
const STATEMENT_KEYWORDS: &[&str] = &[
    "const", "let", "var", "function", "class", "if", "else", "for", "while", "do", "switch",
    "try", "catch", "finally", "throw", "break", "continue", "return", "import", "export",
    "debugger", "with",
];

/// Additional statement keywords in TypeScript.
const TYPESCRIPT_KEYWORDS: &[&str] = &[
    "interface", "type", "enum", "namespace", "module", "declare", "abstract",
];

/// JavaScript-family dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    JavaScript,
    TypeScript,
}

impl Dialect {
    fn starts_statement(self, line: &str) -> bool {
        let extra: &[&str] = match self {
            Dialect::JavaScript => &[],
            Dialect::TypeScript => TYPESCRIPT_KEYWORDS,
        };
        STATEMENT_KEYWORDS
            .iter()
            .chain(extra)
            .any(|keyword| starts_with_keyword(line, keyword))
    }
}

fn starts_with_keyword(line: &str, keyword: &str) -> bool {
    match line.strip_prefix(keyword) {
        Some("") => true,
        Some(rest) => rest.starts_with([' ', '\t', '(', ';']),
        None => false,
    }
}

/// Rewrite a fragment so its last meaningful line is returned.
///
/// Scans from the end, skipping blank lines and comments. If the first
/// significant line closes a block or starts with a statement keyword the
/// fragment is returned unchanged (apart from trailing whitespace). Otherwise
/// one trailing `;` is dropped and the line is prefixed with `return`,
/// keeping its indentation. Every other line is left untouched.
pub fn transform_for_return(code: &str, dialect: Dialect) -> String {
    let lines: Vec<&str> = code.trim_end().split('\n').collect();
    let target = last_expression_line(&lines, dialect);

    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            if Some(index) == target {
                wrap_in_return(line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn last_expression_line(lines: &[&str], dialect: Dialect) -> Option<usize> {
    let mut in_block_comment = false;

    for (index, line) in lines.iter().enumerate().rev() {
        let trimmed = line.trim();

        if in_block_comment {
            if trimmed.contains("/*") {
                in_block_comment = false;
            }
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with("/*") {
            continue;
        }
        // Closing line of a multi-line block comment; skip back to its opener.
        if trimmed.ends_with("*/") && !trimmed.contains("/*") {
            in_block_comment = true;
            continue;
        }

        if trimmed.ends_with('}') || dialect.starts_statement(trimmed) {
            return None;
        }
        return Some(index);
    }

    None
}

fn wrap_in_return(line: &str) -> String {
    let indent = &line[..line.len() - line.trim_start().len()];
    let expression = line.trim_end();
    let expression = expression.strip_suffix(';').unwrap_or(expression);
    format!("{indent}return {}", expression.trim())
}

/// Import statements pulled out of a fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedImports {
    /// Each import statement, multi-line ones joined with `\n`.
    pub imports: Vec<String>,
    /// The fragment with the import lines removed.
    pub body: String,
}

/// Separate `import` statements from the rest of a fragment.
///
/// Multi-line imports continue until a line containing `;`, or a line
/// containing both `}` and `from`.
pub fn extract_imports(code: &str) -> ExtractedImports {
    let mut imports = Vec::new();
    let mut body = Vec::new();
    let mut pending: Option<String> = None;

    for line in code.split('\n') {
        let trimmed = line.trim();

        if let Some(mut statement) = pending.take() {
            statement.push('\n');
            statement.push_str(line);
            if trimmed.contains(';') || (trimmed.contains('}') && trimmed.contains("from")) {
                imports.push(statement);
            } else {
                pending = Some(statement);
            }
            continue;
        }

        if trimmed.starts_with("import ") {
            if is_complete_import(trimmed) {
                imports.push(line.to_string());
            } else {
                pending = Some(line.to_string());
            }
        } else {
            body.push(line);
        }
    }

    // An unterminated import is still hoisted; the runtime reports the error.
    if let Some(statement) = pending {
        imports.push(statement);
    }

    ExtractedImports {
        imports,
        body: body.join("\n"),
    }
}

fn is_complete_import(trimmed: &str) -> bool {
    if trimmed.contains(';') {
        return true;
    }

    // import 'side-effect'
    let after_import = trimmed["import".len()..].trim();
    if is_quoted(after_import) {
        return true;
    }

    // import x from 'module'
    trimmed.rfind("from").is_some_and(|pos| {
        let rest = &trimmed[pos + "from".len()..];
        rest.starts_with([' ', '\t', '\'', '"']) && is_quoted(rest.trim())
    })
}

fn is_quoted(text: &str) -> bool {
    let mut chars = text.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open @ ('\'' | '"')), Some(close)) if open == close => {
            !chars.as_str().contains(['\'', '"'])
        }
        _ => false,
    }
}
