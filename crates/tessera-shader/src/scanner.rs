//! Keyword-led statement scanning over raw shader text.
//!
//! The scanner does not understand the shader language. It finds keywords on
//! whitespace boundaries and cuts from the keyword to the first terminator
//! after it. Braces and semicolons are not counted, so a terminator inside a
//! comment or default-value expression ends the statement early.

use crate::error::ParseError;

fn is_boundary(c: char) -> bool {
    c.is_whitespace()
}

/// Byte index of the first standalone occurrence of `keyword` in `src`.
///
/// A match is standalone when the characters around it are whitespace or the
/// start/end of the text, so `struct` is not found inside `mystruct` or `structX`.
pub fn find_keyword(src: &str, keyword: &str) -> Option<usize> {
    if keyword.is_empty() {
        return None;
    }

    let mut from = 0;
    while let Some(rel) = src[from..].find(keyword) {
        let start = from + rel;
        let end = start + keyword.len();

        let left = src[..start].chars().next_back().is_none_or(is_boundary);
        let right = src[end..].chars().next().is_none_or(is_boundary);
        if left && right {
            return Some(start);
        }
        from = end;
    }
    None
}

/// Lazy sequence of keyword-led statements.
///
/// Each item runs from the keyword up to and including `terminator`, or to
/// the end of the text when no terminator follows. The next search starts
/// right after the previous item.
#[derive(Debug, Clone)]
pub struct Statements<'s> {
    src: &'s str,
    keyword: &'static str,
    terminator: char,
    pos: usize,
}

impl<'s> Statements<'s> {
    pub fn new(src: &'s str, keyword: &'static str, terminator: char) -> Self {
        Self { src, keyword, terminator, pos: 0 }
    }
}

impl<'s> Iterator for Statements<'s> {
    type Item = &'s str;

    fn next(&mut self) -> Option<&'s str> {
        let rest = self.src.get(self.pos..)?;
        let start = self.pos + find_keyword(rest, self.keyword)?;
        let end = match self.src[start..].find(self.terminator) {
            Some(i) => start + i + self.terminator.len_utf8(),
            None => self.src.len(),
        };
        self.pos = end;
        Some(&self.src[start..end])
    }
}

/// `struct ... }` blocks.
pub fn struct_blocks(src: &str) -> Statements<'_> {
    Statements::new(src, "struct", '}')
}

/// `uniform ... ;` statements.
pub fn uniform_statements(src: &str) -> Statements<'_> {
    Statements::new(src, "uniform", ';')
}

/// Splits a statement into words on space, tab, newline and carriage return.
pub fn tokenize(statement: &str) -> Vec<&str> {
    statement
        .split(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Strips a trailing `;` and an optional `[N]` suffix from a declared name.
///
/// Returns the bare name and the element count (1 when there is no suffix).
pub fn split_declarator<'a>(statement: &str, raw: &'a str) -> Result<(&'a str, u32), ParseError> {
    let name = raw.strip_suffix(';').unwrap_or(raw);

    let Some(open) = name.find('[') else {
        return Ok((name, 1));
    };
    let close = name[open..]
        .find(']')
        .map(|i| open + i)
        .ok_or_else(|| ParseError::malformed(statement, "unterminated array suffix"))?;

    let count = name[open + 1..close]
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| ParseError::malformed(statement, "array size must be a positive integer"))?;

    Ok((&name[..open], count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_inside_identifiers_is_ignored() {
        assert_eq!(find_keyword("mystruct structX", "struct"), None);
    }

    #[test]
    fn standalone_keyword_is_found_once() {
        let src = "struct Foo { float a; }";
        assert_eq!(find_keyword(src, "struct"), Some(0));
        assert_eq!(struct_blocks(src).count(), 1);
    }

    #[test]
    fn keyword_after_rejected_match_is_found() {
        let src = "mystruct\nstruct Bar { int b; }";
        assert_eq!(find_keyword(src, "struct"), Some(9));
    }

    #[test]
    fn keyword_at_end_of_text_matches() {
        assert_eq!(find_keyword("out uniform", "uniform"), Some(4));
    }

    #[test]
    fn blocks_end_at_first_closing_brace() {
        let src = "struct A { float x; };\nvoid main() {}\nstruct B { vec2 y; }";
        let blocks: Vec<&str> = struct_blocks(src).collect();
        assert_eq!(blocks, vec!["struct A { float x; }", "struct B { vec2 y; }"]);
    }

    #[test]
    fn statements_end_at_first_semicolon() {
        let src = "uniform float a;\nuniform\tvec3 b[2];\nin vec3 v_uniform;";
        let stmts: Vec<&str> = uniform_statements(src).collect();
        assert_eq!(stmts, vec!["uniform float a;", "uniform\tvec3 b[2];"]);
    }

    #[test]
    fn unterminated_statement_runs_to_end() {
        let stmts: Vec<&str> = uniform_statements("uniform float a").collect();
        assert_eq!(stmts, vec!["uniform float a"]);
    }

    #[test]
    fn tokenize_drops_empty_words() {
        assert_eq!(
            tokenize("uniform \t mat4\r\n  r_Transform;"),
            vec!["uniform", "mat4", "r_Transform;"]
        );
    }

    #[test]
    fn declarator_suffixes() {
        assert_eq!(split_declarator("", "u_Color;"), Ok(("u_Color", 1)));
        assert_eq!(split_declarator("", "u_Lights[4];"), Ok(("u_Lights", 4)));
        assert_eq!(split_declarator("", "weights[ 8 ]"), Ok(("weights", 8)));
        assert!(split_declarator("", "u_Bad[0];").is_err());
        assert!(split_declarator("", "u_Bad[n];").is_err());
        assert!(split_declarator("", "u_Bad[3;").is_err());
    }
}
