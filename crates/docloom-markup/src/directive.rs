//! Directive fence classification and payload validation.
//!
//! Directives are fenced code blocks whose info string starts with a
//! directive keyword (`docs`, `autodocs`, `example`, `eval`, `setup`).
//! Classification happens at parse time; a malformed payload degrades the
//! block to plain code and records a parse issue, so the expansion engine
//! only ever sees validated payloads.

use docloom_model::{BindingOrder, Directive};

/// A recorded parse problem (mapped to a `parse_error` diagnostic).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseIssue {
    /// 1-based source line.
    pub line: usize,
    /// What went wrong.
    pub message: String,
}

/// Classified fence info string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FenceKind {
    /// Ordinary code block.
    Plain { language: Option<String> },
    /// Doctest fragment; stays a code block, collected by the doctest stage.
    Doctest,
    /// Directive block; the payload is built from the fence body.
    Directive(Keyword),
}

/// Directive keyword with any name argument from the info string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Keyword {
    Docs,
    AutoDocs,
    Example { name: Option<String> },
    Eval,
    Setup { name: Option<String> },
}

/// Classify a fence info string.
pub(crate) fn classify_fence(info: &str) -> FenceKind {
    let info = info.trim();
    let mut words = info.split_whitespace();
    let keyword = words.next().unwrap_or("");
    let name = words.next().map(str::to_owned);

    match keyword {
        "docs" => FenceKind::Directive(Keyword::Docs),
        "autodocs" => FenceKind::Directive(Keyword::AutoDocs),
        "example" => FenceKind::Directive(Keyword::Example { name }),
        "eval" => FenceKind::Directive(Keyword::Eval),
        "setup" => FenceKind::Directive(Keyword::Setup { name }),
        "doctest" => FenceKind::Doctest,
        "" => FenceKind::Plain { language: None },
        _ => FenceKind::Plain {
            language: Some(info.to_owned()),
        },
    }
}

/// Name of a doctest fence: `doctest` and `doctest foo` match, everything
/// else is `None`. Used by the doctest stage to collect fragments.
#[must_use]
pub fn doctest_fence_name(info: &str) -> Option<Option<String>> {
    let info = info.trim();
    let mut words = info.split_whitespace();
    match words.next() {
        Some("doctest") => Some(words.next().map(str::to_owned)),
        _ => None,
    }
}

/// Build a validated directive from a classified fence and its body.
pub(crate) fn build_directive(
    keyword: Keyword,
    body: &str,
    line: usize,
) -> Result<Directive, ParseIssue> {
    match keyword {
        Keyword::Docs => build_docs(body, line),
        Keyword::AutoDocs => build_autodocs(body, line),
        Keyword::Example { name } => {
            let code = require_code(body, "example", line)?;
            Ok(Directive::Example { name, code, line })
        }
        Keyword::Eval => {
            let code = require_code(body, "eval", line)?;
            Ok(Directive::Eval { code, line })
        }
        Keyword::Setup { name } => {
            let code = require_code(body, "setup", line)?;
            Ok(Directive::Setup { name, code, line })
        }
    }
}

fn build_docs(body: &str, line: usize) -> Result<Directive, ParseIssue> {
    let mut bindings = Vec::new();
    for (offset, raw) in body.lines().enumerate() {
        let binding = raw.trim();
        if binding.is_empty() {
            continue;
        }
        if !is_valid_binding(binding) {
            return Err(ParseIssue {
                line: line + 1 + offset,
                message: format!("invalid binding name '{binding}' in docs block"),
            });
        }
        bindings.push(binding.to_owned());
    }

    if bindings.is_empty() {
        return Err(ParseIssue {
            line,
            message: "docs block lists no bindings".to_owned(),
        });
    }
    Ok(Directive::Docs { bindings, line })
}

fn build_autodocs(body: &str, line: usize) -> Result<Directive, ParseIssue> {
    let mut module = None;
    let mut order = BindingOrder::default();
    let mut filter = None;

    for (offset, raw) in body.lines().enumerate() {
        let entry = raw.trim();
        if entry.is_empty() {
            continue;
        }
        let issue_line = line + 1 + offset;
        let Some((key, value)) = entry.split_once('=') else {
            return Err(ParseIssue {
                line: issue_line,
                message: format!("expected 'key = value' in autodocs block, got '{entry}'"),
            });
        };
        let value = value.trim().trim_matches('"');

        match key.trim() {
            "module" => module = Some(value.to_owned()),
            "order" => {
                order = match value {
                    "declaration" => BindingOrder::Declaration,
                    "name" => BindingOrder::Name,
                    other => {
                        return Err(ParseIssue {
                            line: issue_line,
                            message: format!(
                                "unknown autodocs order '{other}' (expected 'declaration' or 'name')"
                            ),
                        });
                    }
                };
            }
            "filter" => filter = Some(value.to_owned()),
            other => {
                return Err(ParseIssue {
                    line: issue_line,
                    message: format!("unknown autodocs key '{other}'"),
                });
            }
        }
    }

    let Some(module) = module else {
        return Err(ParseIssue {
            line,
            message: "autodocs block is missing 'module'".to_owned(),
        });
    };

    Ok(Directive::AutoDocs {
        module,
        order,
        filter,
        line,
    })
}

fn require_code(body: &str, label: &str, line: usize) -> Result<String, ParseIssue> {
    if body.trim().is_empty() {
        return Err(ParseIssue {
            line,
            message: format!("{label} block is empty"),
        });
    }
    Ok(body.to_owned())
}

/// Binding names: alphanumeric plus `.`, `_`, `:`, `-`, `!`.
fn is_valid_binding(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | ':' | '-' | '!'))
}
