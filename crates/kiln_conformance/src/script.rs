//! Source files of the script language.
//!
//! A file is a sequence of top-level lines:
//!
//! ```text
//! import app/util
//! open import std/core
//! effect state
//! pub fun get() : <state> int { 41 + 1 }
//! pub fun default-state(action) : () { action() }
//! pub fun main() : io () {
//!   println(get())
//! }
//! ```
//!
//! `#line N` directives renumber the following lines.

use crate::expr::{parse_body, Block, BodyLine, SyntaxError};
use kiln_build::{Import, Lexeme, SyntaxDecl};
use kiln_common::ModuleName;
use kiln_source::source_db::LINE_DIRECTIVE;
use kiln_source::SourceRange;
use std::path::{Path, PathBuf};

/// Module every script opens implicitly.
pub const PRELUDE: &str = "std/core";

/// A parse error with its location.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParseError {
    /// Where the error is.
    pub range: SourceRange,
    /// What went wrong.
    pub message: String,
}

/// Effect and result of a declared signature, e.g. `<state,exn> int`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Annotation {
    /// Effect names as written.
    pub effects: Vec<String>,
    /// Result type as written.
    pub result: String,
}

impl Annotation {
    /// Parses the text between `:` and the body.
    pub fn parse(text: &str) -> Option<Annotation> {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix('<') {
            let (labels, result) = rest.split_once('>')?;
            let effects = labels
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            return Some(Annotation {
                effects,
                result: result.trim().to_string(),
            });
        }
        let words: Vec<&str> = text.split_whitespace().collect();
        match words.as_slice() {
            [result] => Some(Annotation {
                effects: Vec::new(),
                result: result.to_string(),
            }),
            [effect, result] => Some(Annotation {
                effects: vec![effect.to_string()],
                result: result.to_string(),
            }),
            _ => None,
        }
    }
}

/// An `effect` declaration.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EffectDecl {
    /// The effect name.
    pub name: String,
    /// Where it is declared.
    pub range: SourceRange,
}

/// A function declaration.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FunDecl {
    /// The function name.
    pub name: String,
    /// Whether it is `pub`.
    pub public: bool,
    /// Parameter names. Functions with a parameter are handlers taking a closure.
    pub params: Vec<String>,
    /// The declared signature.
    pub annotation: Option<Annotation>,
    /// The body.
    pub body: Block,
    /// Where the name is declared.
    pub range: SourceRange,
}

impl FunDecl {
    /// Returns `true` for functions taking a closure.
    pub fn is_handler(&self) -> bool {
        !self.params.is_empty()
    }
}

/// A parsed source file.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Script {
    /// The module this file defines.
    pub module: ModuleName,
    /// The file it was parsed from.
    pub path: PathBuf,
    /// Effective imports, including the prelude.
    pub imports: Vec<Import>,
    /// Declared effects.
    pub effects: Vec<EffectDecl>,
    /// Declared functions, in source order.
    pub funs: Vec<FunDecl>,
}

impl Script {
    /// Returns a function by name.
    pub fn fun(&self, name: &str) -> Option<&FunDecl> {
        self.funs.iter().find(|f| f.name == name)
    }

    /// Returns `true` if `name` is declared as an effect.
    pub fn has_effect(&self, name: &str) -> bool {
        self.effects.iter().any(|e| e.name == name)
    }

    /// Returns the top-level declarations.
    pub fn decls(&self) -> Vec<SyntaxDecl> {
        let effects = self.effects.iter().map(|e| SyntaxDecl {
            name: e.name.clone(),
            public: true,
            range: e.range.clone(),
        });
        let funs = self.funs.iter().map(|f| SyntaxDecl {
            name: f.name.clone(),
            public: f.public,
            range: f.range.clone(),
        });
        effects.chain(funs).collect()
    }
}

/// The result of scanning a file: tokens and import declarations.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Scan {
    /// Whitespace-separated tokens.
    pub lexemes: Vec<Lexeme>,
    /// Imports written in the file.
    pub imports: Vec<Import>,
}

/// Numbers the lines of `text`, dropping `#line` directives.
pub fn logical_lines(text: &str) -> Vec<BodyLine<'_>> {
    let mut out = Vec::new();
    let mut next = 1;
    for line in text.lines() {
        if let Some(rest) = line.trim_start().strip_prefix(LINE_DIRECTIVE) {
            if let Some(n) = rest.split_whitespace().next().and_then(|n| n.parse().ok()) {
                next = n;
                continue;
            }
        }
        out.push((next, line));
        next += 1;
    }
    out
}

/// Scans tokens and imports.
pub fn scan(path: &Path, text: &str) -> Scan {
    let mut scan = Scan::default();
    for (line, content) in logical_lines(text) {
        let mut col = 1;
        for word in content.split(' ') {
            if !word.is_empty() {
                scan.lexemes.push(Lexeme {
                    text: word.to_string(),
                    range: SourceRange::on_line(path, line, col, word.chars().count() as u32),
                });
            }
            col += word.chars().count() as u32 + 1;
        }
        if let Some(import) = parse_import(content) {
            scan.imports.push(import);
        }
    }
    scan
}

fn parse_import(line: &str) -> Option<Import> {
    let line = line.trim();
    let (open, rest) = match line.strip_prefix("open import ") {
        Some(rest) => (true, rest),
        None => (false, line.strip_prefix("import ")?),
    };
    Some(Import {
        module: ModuleName::new(rest.trim()),
        open,
    })
}

/// Parses a whole file. `imports` are the effective imports decided at scan time.
pub fn parse_script(
    module: ModuleName,
    path: &Path,
    text: &str,
    imports: Vec<Import>,
) -> Result<Script, ParseError> {
    let lines = logical_lines(text);
    let mut script = Script {
        module,
        path: path.to_path_buf(),
        imports,
        effects: Vec::new(),
        funs: Vec::new(),
    };
    let error = |line: u32, col: u32, len: u32, message: String| ParseError {
        range: SourceRange::on_line(path, line, col, len),
        message,
    };

    let mut i = 0;
    while i < lines.len() {
        let (line, raw) = lines[i];
        i += 1;
        let content = raw.trim();
        let indent = (raw.len() - raw.trim_start().len()) as u32;
        if content.is_empty() || content.starts_with("//") || parse_import(content).is_some() {
            continue;
        }
        let (public, decl) = match content.strip_prefix("pub ") {
            Some(rest) => (true, rest.trim_start()),
            None => (false, content),
        };
        if let Some(name) = decl.strip_prefix("effect ") {
            let name = name.trim();
            let col = indent + (content.len() - name.len()) as u32 + 1;
            script.effects.push(EffectDecl {
                name: name.to_string(),
                range: SourceRange::on_line(path, line, col, name.len() as u32),
            });
            continue;
        }
        let Some(header) = decl.strip_prefix("fun ") else {
            return Err(error(
                line,
                indent + 1,
                content.len() as u32,
                "expected a declaration".to_string(),
            ));
        };

        let (name, rest) = header
            .split_once('(')
            .ok_or_else(|| error(line, indent + 1, content.len() as u32, "expected '('".to_string()))?;
        let name = name.trim();
        let name_col = indent + (content.len() - header.len()) as u32 + 1;
        let (params, rest) = rest
            .split_once(')')
            .ok_or_else(|| error(line, name_col, name.len() as u32, "expected ')'".to_string()))?;
        let params: Vec<String> = params
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        let (signature, body_text) = rest
            .split_once('{')
            .ok_or_else(|| error(line, name_col, name.len() as u32, "expected '{'".to_string()))?;
        let annotation = match signature.trim().strip_prefix(':') {
            Some(text) => Some(Annotation::parse(text).ok_or_else(|| {
                error(line, name_col, name.len() as u32, format!("malformed signature '{}'", text.trim()))
            })?),
            None if signature.trim().is_empty() => None,
            None => {
                return Err(error(
                    line,
                    name_col,
                    name.len() as u32,
                    "expected ':' or '{'".to_string(),
                ))
            }
        };

        let body_col = raw.trim_end().len() - body_text.len();
        let mut body: Vec<(u32, String)> = Vec::new();
        let first = body_text.trim_end();
        if let Some(inline) = first.strip_suffix('}') {
            body.push((line, format!("{}{inline}", " ".repeat(body_col))));
        } else {
            if !first.trim().is_empty() {
                body.push((line, format!("{}{first}", " ".repeat(body_col))));
            }
            loop {
                let Some(&(body_line, text)) = lines.get(i) else {
                    return Err(error(
                        line,
                        name_col,
                        name.len() as u32,
                        format!("unterminated body of '{name}'"),
                    ));
                };
                i += 1;
                if text.trim() == "}" {
                    break;
                }
                body.push((body_line, text.to_string()));
            }
        }

        let body_lines: Vec<BodyLine<'_>> = body.iter().map(|(l, t)| (*l, t.as_str())).collect();
        let body = parse_body(&body_lines).map_err(|e: SyntaxError| ParseError {
            range: SourceRange::on_line(path, e.pos.line, e.pos.col, e.len),
            message: e.message,
        })?;
        script.funs.push(FunDecl {
            name: name.to_string(),
            public,
            params,
            annotation,
            body,
            range: SourceRange::on_line(path, line, name_col, name.chars().count() as u32),
        });
    }
    Ok(script)
}

/// Returns `true` if `module` may import the prelude implicitly.
pub fn wants_prelude(module: &ModuleName) -> bool {
    let name = module.as_str();
    name != PRELUDE && !name.starts_with("std/core/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ExprKind, Stmt};
    use kiln_source::Pos;

    const FILE: &str = "\
open import std/core
import app/util
effect state
pub fun get() : <state> int { 41 + 1 }
fun helper() {
  val x = 1
  x
}
pub fun default-state(action) : () { action() }
";

    fn parse(text: &str) -> Result<Script, ParseError> {
        let path = Path::new("/src/app/main.kk");
        let scan = scan(path, text);
        parse_script(ModuleName::new("app/main"), path, text, scan.imports)
    }

    #[test]
    fn annotations() {
        assert_eq!(
            Annotation::parse(" <state, exn> int"),
            Some(Annotation {
                effects: vec!["state".to_string(), "exn".to_string()],
                result: "int".to_string()
            })
        );
        assert_eq!(Annotation::parse("io ()").unwrap().effects, vec!["io"]);
        assert!(Annotation::parse("").is_none());
    }

    #[test]
    fn scan_finds_imports() {
        let scan = scan(Path::new("/src/app/main.kk"), FILE);
        assert_eq!(
            scan.imports,
            vec![
                Import {
                    module: ModuleName::new("std/core"),
                    open: true
                },
                Import {
                    module: ModuleName::new("app/util"),
                    open: false
                },
            ]
        );
        assert_eq!(scan.lexemes[0].text, "open");
    }

    #[test]
    fn parses_declarations() {
        let script = parse(FILE).unwrap();
        assert!(script.has_effect("state"));
        let names: Vec<&str> = script.funs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["get", "helper", "default-state"]);
        assert!(!script.fun("helper").unwrap().public);
        assert!(script.fun("default-state").unwrap().is_handler());
        let get = script.fun("get").unwrap();
        assert_eq!(get.range.start, Pos::new(4, 9));
        assert!(matches!(
            get.body.result().map(|e| &e.kind),
            Some(ExprKind::Binary(..))
        ));
        assert!(matches!(script.fun("helper").unwrap().body.stmts[0], Stmt::Val(..)));
    }

    #[test]
    fn line_directive_renumbers_body() {
        let text = "pub fun @expr() {\n#line 1\n1 + true\n}\n";
        let script = parse(text).unwrap();
        let expr = script.fun("@expr").unwrap().body.result().unwrap().clone();
        assert_eq!(expr.pos, Pos::new(1, 1));
    }

    #[test]
    fn body_errors_point_into_body() {
        let text = "pub fun @expr() {\n#line 1\n1 +\n}\n";
        let err = parse(text).unwrap_err();
        assert_eq!(err.range.start.line, 1);
    }

    #[test]
    fn rejects_unknown_lines() {
        let err = parse("value x = 1\n").unwrap_err();
        assert_eq!(err.message, "expected a declaration");
        assert_eq!(err.range.start, Pos::new(1, 1));
    }

    #[test]
    fn unterminated_body() {
        let err = parse("pub fun f() {\n  1\n").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn prelude_rule() {
        assert!(wants_prelude(&ModuleName::new("app/main")));
        assert!(!wants_prelude(&ModuleName::new("std/core")));
        assert!(!wants_prelude(&ModuleName::new("std/core/exn")));
    }
}
