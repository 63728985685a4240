//! Comment- and string-aware tokenizers for code examples.
//!
//! The code-example checks run over tokens rather than raw text, so an
//! identifier mentioned inside a comment or a string literal never
//! triggers a finding.

/// Token classes produced by [`tokenize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    /// Single- or double-quoted string; `text` excludes the quotes.
    Str,
    /// Template literal; `text` excludes the backticks.
    Template,
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// 0-based line within the tokenized source.
    pub line: usize,
}

impl Token<'_> {
    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }

    pub fn is_punct(&self, p: char) -> bool {
        self.kind == TokenKind::Punct && self.text.len() == p.len_utf8() && self.text.starts_with(p)
    }
}

/// Comment syntax of the language being tokenized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// `//` and `/* */` comments, `'`/`"`/`` ` `` strings (JS, TS, JSX).
    Script,
    /// `/* */` comments and `//` comments only at line start (CSS, SCSS, Less).
    Style,
    /// `<!-- -->` comments, quoted attribute values (HTML, Vue, Svelte templates).
    Markup,
}

/// Tokenize `src`, discarding whitespace and comments.
pub fn tokenize(src: &str, syntax: Syntax) -> Vec<Token<'_>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 0;
    let mut line_has_code = false;
    // Markup only: inside `<name ...>`, where quotes delimit attribute values.
    let mut in_tag = false;

    while i < bytes.len() {
        let c = bytes[i];

        if c == b'\n' {
            line += 1;
            line_has_code = false;
            i += 1;
            continue;
        }
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Comments
        if c == b'/' && bytes.get(i + 1) == Some(&b'*') && syntax != Syntax::Markup {
            let end = find(bytes, b"*/", i + 2).map(|e| e + 2).unwrap_or(bytes.len());
            line += count_newlines(&bytes[i..end]);
            i = end;
            continue;
        }
        if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
            let is_comment = match syntax {
                Syntax::Script => true,
                Syntax::Style => !line_has_code,
                Syntax::Markup => false,
            };
            if is_comment {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
        }
        if syntax == Syntax::Markup && bytes[i..].starts_with(b"<!--") {
            let end = find(bytes, b"-->", i + 4).map(|e| e + 3).unwrap_or(bytes.len());
            line += count_newlines(&bytes[i..end]);
            i = end;
            continue;
        }

        line_has_code = true;
        let start = i;

        // Strings. Markup text is prose, so a quote there is only a string
        // when it opens an attribute value.
        let quote_opens_string = match syntax {
            Syntax::Markup => in_tag && tokens.last().map(|t: &Token<'_>| t.is_punct('=')).unwrap_or(false),
            _ => true,
        };
        if quote_opens_string && (c == b'"' || c == b'\'' || (c == b'`' && syntax == Syntax::Script)) {
            let quote = c;
            let start_line = line;
            i += 1;
            while i < bytes.len() && bytes[i] != quote {
                if bytes[i] == b'\\' && syntax != Syntax::Markup {
                    i += 1;
                } else if bytes[i] == b'\n' {
                    if quote != b'`' && syntax == Syntax::Script {
                        // Unterminated literal; stop at end of line.
                        break;
                    }
                    line += 1;
                }
                i += 1;
            }
            let end = i.min(bytes.len());
            tokens.push(Token {
                kind: if quote == b'`' {
                    TokenKind::Template
                } else {
                    TokenKind::Str
                },
                text: &src[start + 1..end],
                line: start_line,
            });
            if i < bytes.len() && bytes[i] == quote {
                i += 1;
            }
            continue;
        }

        // Identifiers (CSS idents may contain '-')
        if is_ident_start(c) {
            i += 1;
            while i < bytes.len()
                && (is_ident_continue(bytes[i]) || (bytes[i] == b'-' && syntax != Syntax::Script))
            {
                i += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Ident,
                text: &src[start..i],
                line,
            });
            continue;
        }

        if c.is_ascii_digit() {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Number,
                text: &src[start..i],
                line,
            });
            continue;
        }

        // Anything else is a single punctuation character (UTF-8 aware).
        let width = src[i..].chars().next().map(char::len_utf8).unwrap_or(1);
        i += width;
        if syntax == Syntax::Markup {
            match c {
                b'<' => in_tag = bytes.get(i).map(|&n| is_ident_start(n) || n == b'/').unwrap_or(false),
                b'>' => in_tag = false,
                _ => {}
            }
        }
        tokens.push(Token {
            kind: TokenKind::Punct,
            text: &src[start..i],
            line,
        });
    }

    tokens
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$' || c >= 0x80
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$' || c >= 0x80
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn count_newlines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}

/// Index of the `)` matching the `(` at `open`, if balanced.
pub fn matching_paren(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, tok) in tokens.iter().enumerate().skip(open) {
        if tok.is_punct('(') {
            depth += 1;
        } else if tok.is_punct(')') {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

/// A shell command line split into words, with its 0-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub words: Vec<String>,
    pub line: usize,
}

/// Split shell source into commands.
///
/// Quotes are honoured, `#` starts a comment at a word boundary, `;`, `&&`,
/// `||` and `|` separate commands, and a leading `$ ` prompt is dropped.
pub fn shell_commands(src: &str) -> Vec<ShellCommand> {
    let mut commands = Vec::new();

    for (line_no, raw) in src.lines().enumerate() {
        let line = raw.trim_start();
        let line = line.strip_prefix("$ ").unwrap_or(line);

        let mut words: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut in_word = false;
        let mut quote: Option<char> = None;
        let mut chars = line.chars().peekable();

        let flush = |words: &mut Vec<String>, current: &mut String, in_word: &mut bool| {
            if *in_word {
                words.push(std::mem::take(current));
                *in_word = false;
            }
        };

        while let Some(ch) = chars.next() {
            if let Some(q) = quote {
                if ch == q {
                    quote = None;
                } else {
                    current.push(ch);
                }
                continue;
            }
            match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    in_word = true;
                }
                '#' if !in_word => break,
                ';' | '|' | '&' => {
                    flush(&mut words, &mut current, &mut in_word);
                    if chars.peek() == Some(&ch) {
                        chars.next();
                    }
                    if !words.is_empty() {
                        commands.push(ShellCommand {
                            words: std::mem::take(&mut words),
                            line: line_no,
                        });
                    }
                }
                c if c.is_whitespace() => flush(&mut words, &mut current, &mut in_word),
                c => {
                    current.push(c);
                    in_word = true;
                }
            }
        }
        flush(&mut words, &mut current, &mut in_word);
        if !words.is_empty() {
            commands.push(ShellCommand {
                words,
                line: line_no,
            });
        }
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idents(src: &str, syntax: Syntax) -> Vec<&str> {
        tokenize(src, syntax)
            .into_iter()
            .filter(|t| t.kind == TokenKind::Ident)
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_script_comments_and_strings_are_not_idents() {
        let src = "// useState here\n/* useEffect */ const x = 'useRef';\nfoo(`getStaticProps`)";
        assert_eq!(idents(src, Syntax::Script), vec!["const", "x", "foo"]);
    }

    #[test]
    fn test_line_numbers() {
        let toks = tokenize("a\n/* two\nlines */ b\n\"s\" c", Syntax::Script);
        let lines: Vec<(&str, usize)> = toks.iter().map(|t| (t.text, t.line)).collect();
        assert_eq!(lines, vec![("a", 0), ("b", 2), ("s", 3), ("c", 3)]);
    }

    #[test]
    fn test_string_token_content() {
        let toks = tokenize("'use client';", Syntax::Script);
        assert_eq!(toks[0].kind, TokenKind::Str);
        assert_eq!(toks[0].text, "use client");
        assert!(toks[1].is_punct(';'));
    }

    #[test]
    fn test_style_important() {
        let toks = tokenize(".a { color: red !important; } /* !important */", Syntax::Style);
        let bangs = toks.iter().filter(|t| t.is_punct('!')).count();
        assert_eq!(bangs, 1);
        assert!(toks.iter().any(|t| t.is_ident("important")));
    }

    #[test]
    fn test_style_url_is_not_comment() {
        let toks = tokenize("a { background: url(http://x/y.png); }", Syntax::Style);
        assert!(toks.iter().any(|t| t.is_ident("y")));
    }

    #[test]
    fn test_markup_comments() {
        assert_eq!(idents("<!-- <img> --><p>", Syntax::Markup), vec!["p"]);
    }

    #[test]
    fn test_markup_text_quotes_are_not_strings() {
        let tokens = tokenize("<p>Don't click</p>\n<img src=\"a.png\" alt='b'>", Syntax::Markup);
        let strs: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Str)
            .map(|t| t.text)
            .collect();
        assert_eq!(strs, vec!["a.png", "b"]);
        let img = tokens.iter().find(|t| t.is_ident("img")).unwrap();
        assert_eq!(img.line, 1);
    }

    #[test]
    fn test_markup_quoted_value_may_contain_angle_brackets() {
        let tokens = tokenize("<a title=\"x > y\" href=\"#\">go</a>", Syntax::Markup);
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Str && t.text == "x > y"));
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Str && t.text == "#"));
    }

    #[test]
    fn test_matching_paren() {
        let toks = tokenize("f(a, (b), c) + 1", Syntax::Script);
        assert_eq!(matching_paren(&toks, 1), Some(9));
    }

    #[test]
    fn test_shell_commands() {
        let cmds = shell_commands("$ sudo rm -rf build # clean\necho '# not a comment' && ls\n");
        assert_eq!(cmds.len(), 3);
        assert_eq!(cmds[0].words, vec!["sudo", "rm", "-rf", "build"]);
        assert_eq!(cmds[1].words, vec!["echo", "# not a comment"]);
        assert_eq!(cmds[2].words, vec!["ls"]);
        assert_eq!(cmds[2].line, 1);
    }
}
