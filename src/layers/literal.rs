//! Parser for Python list/tuple literals of strings, the encoding used by the
//! category stack variables (`['a', "b"]`, `('a',)`).
use anyhow::{anyhow, Result};
use std::iter::Peekable;
use std::str::CharIndices;

pub fn parse_string_list(raw: &str) -> Result<Vec<String>> {
    let mut parser = Parser {
        raw,
        chars: raw.char_indices().peekable(),
    };
    parser.skip_whitespace();
    let close = match parser.next_char() {
        Some((_, '[')) => ']',
        Some((_, '(')) => ')',
        Some((at, other)) => {
            return Err(parser.error(at, &format!("expected '[' or '(', found {other:?}")));
        }
        None => return Err(anyhow!("empty literal")),
    };

    let mut items = Vec::new();
    let mut saw_comma = false;
    loop {
        parser.skip_whitespace();
        match parser.peek_char() {
            Some(ch) if ch == close => {
                parser.next_char();
                break;
            }
            Some(_) if !items.is_empty() && !saw_comma => {
                let at = parser.offset();
                return Err(parser.error(at, &format!("expected ',' or {close:?}")));
            }
            Some(_) => {
                items.push(parser.string()?);
                saw_comma = false;
                parser.skip_whitespace();
                if parser.peek_char() == Some(',') {
                    parser.next_char();
                    saw_comma = true;
                }
            }
            None => return Err(anyhow!("unterminated literal, expected {close:?}")),
        }
    }
    // `("a")` is a parenthesized string, not a tuple.
    if close == ')' && items.len() == 1 && !saw_comma {
        return Err(anyhow!("expected a list or tuple, found a parenthesized string"));
    }
    parser.skip_whitespace();
    if let Some(at) = parser.chars.peek().map(|(at, _)| *at) {
        return Err(parser.error(at, "trailing characters after literal"));
    }
    Ok(items)
}

struct Parser<'a> {
    raw: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl Parser<'_> {
    fn next_char(&mut self) -> Option<(usize, char)> {
        self.chars.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map(|(at, _)| *at).unwrap_or(self.raw.len())
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.chars.next();
        }
    }

    fn error(&self, at: usize, message: &str) -> anyhow::Error {
        anyhow!("{message} at offset {at}")
    }

    fn string(&mut self) -> Result<String> {
        let start = self.offset();
        let mut raw_mode = false;
        while let Some(prefix) = self
            .peek_char()
            .filter(|ch| matches!(*ch, 'r' | 'R' | 'u' | 'U'))
        {
            raw_mode |= matches!(prefix, 'r' | 'R');
            self.next_char();
        }
        let quote = match self.next_char() {
            Some((_, quote @ ('\'' | '"'))) => quote,
            Some((at, other)) => {
                return Err(self.error(at, &format!("expected a string literal, found {other:?}")))
            }
            None => return Err(anyhow!("expected a string literal at end of input")),
        };

        let mut out = String::new();
        loop {
            let Some((at, ch)) = self.next_char() else {
                return Err(self.error(start, "unterminated string literal"));
            };
            match ch {
                c if c == quote => return Ok(out),
                '\n' => return Err(self.error(at, "newline in string literal")),
                '\\' if raw_mode => {
                    out.push('\\');
                    if let Some((_, next)) = self.next_char() {
                        out.push(next);
                    }
                }
                '\\' => self.escape(at, &mut out)?,
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, at: usize, out: &mut String) -> Result<()> {
        let Some((_, ch)) = self.next_char() else {
            return Err(self.error(at, "unterminated escape"));
        };
        match ch {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(ch),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '0'..='7' => {
                let mut value = ch.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek_char().and_then(|next| next.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            self.next_char();
                        }
                        None => break,
                    }
                }
                out.push(self.code_point(at, value)?);
            }
            'x' => {
                let value = self.hex_digits(at, 2)?;
                out.push(self.code_point(at, value)?);
            }
            'u' => {
                let value = self.hex_digits(at, 4)?;
                out.push(self.code_point(at, value)?);
            }
            'U' => {
                let value = self.hex_digits(at, 8)?;
                out.push(self.code_point(at, value)?);
            }
            // Unknown escapes keep their backslash.
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_digits(&mut self, at: usize, count: usize) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            let digit = self
                .next_char()
                .and_then(|(_, ch)| ch.to_digit(16))
                .ok_or_else(|| self.error(at, "truncated hex escape"))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn code_point(&self, at: usize, value: u32) -> Result<char> {
        char::from_u32(value).ok_or_else(|| self.error(at, "escape is not a valid code point"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lists_and_tuples() {
        assert_eq!(
            parse_string_list(r#"['networking', "datadog" ,'x',]"#).expect("list"),
            vec!["networking", "datadog", "x"]
        );
        assert_eq!(parse_string_list("('solo',)").expect("tuple"), vec!["solo"]);
        assert_eq!(parse_string_list("  [ ]  ").expect("empty"), Vec::<String>::new());
        assert_eq!(parse_string_list("()").expect("empty tuple"), Vec::<String>::new());
    }

    #[test]
    fn decodes_escapes() {
        assert_eq!(
            parse_string_list(r#"['it\'s', "a\"b", 'tab\there', '\x41é', r'raw\n']"#)
                .expect("escapes"),
            vec!["it's", "a\"b", "tab\there", "Aé", "raw\\n"]
        );
    }

    #[test]
    fn rejects_malformed_literals() {
        for raw in [
            "",
            "networking",
            "['a' 'b']",
            "['a', b]",
            "['a'",
            "['a'] extra",
            "('a')",
            "[1, 2]",
            "['unterminated]",
        ] {
            assert!(parse_string_list(raw).is_err(), "{raw:?}");
        }
    }
}
