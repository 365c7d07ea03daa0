/// Source scanner: text into arrays of code units
///
/// The lexer splits text into brackets, strings, tags and runs of word
/// characters; the parser classifies each run (integer, decimal, word,
/// set-word, get-word, refinement, path) and builds nested blocks and groups.
///
/// ```text
/// x: add 1 2           ; set-word word integer integer
/// append/dup [a] 'b 2  ; path block quoted-word integer
/// f/(pick)/2           ; path with a group segment
/// ```
use std::fmt;
use std::rc::Rc;

use crate::backend::models::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LBracket,
    RBracket,
    LParen,
    RParen,
    Text(String),
    Tag(String),
    Comma,
    /// `'` prefix
    Apostrophe,
    /// `@` prefix
    At,
    /// Run of word characters, classified by the parser
    Run(String),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Text(s) => write!(f, "\"{}\"", s),
            Token::Tag(s) => write!(f, "<{}>", s),
            Token::Comma => write!(f, ","),
            Token::Apostrophe => write!(f, "'"),
            Token::At => write!(f, "@"),
            Token::Run(s) => write!(f, "{}", s),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// Token with its position and whether whitespace preceded it
#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
    /// No whitespace between this token and the previous one
    pub joined: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scan error at {}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for ScanError {}

fn is_delimiter(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '[' | ']' | '(' | ')' | '"' | ';' | ',' | '{' | '}')
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> ScanError {
        ScanError {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }

    /// Skip whitespace and `;` comments; true if anything was skipped
    fn skip_trivia(&mut self) -> bool {
        let start = self.pos;
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == ';' {
                while let Some(ch) = self.advance() {
                    if ch == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
        self.pos != start
    }

    fn read_string(&mut self) -> Result<String, ScanError> {
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.advance() {
            match ch {
                '"' => return Ok(result),
                '\n' => return Err(self.error("newline in string literal")),
                '^' | '\\' => match self.advance() {
                    Some('n') | Some('/') => result.push('\n'),
                    Some('t') | Some('-') => result.push('\t'),
                    Some(c) => result.push(c),
                    None => return Err(self.error("unexpected end of string")),
                },
                c => result.push(c),
            }
        }
        Err(self.error("unclosed string literal"))
    }

    /// `{...}` text, which may span lines and nest braces
    fn read_braced(&mut self) -> Result<String, ScanError> {
        let mut result = String::new();
        let mut depth = 0usize;
        self.advance(); // opening brace

        while let Some(ch) = self.advance() {
            match ch {
                '{' => {
                    depth += 1;
                    result.push(ch);
                }
                '}' if depth == 0 => return Ok(result),
                '}' => {
                    depth -= 1;
                    result.push(ch);
                }
                '^' => match self.advance() {
                    Some(c) => result.push(c),
                    None => break,
                },
                c => result.push(c),
            }
        }
        Err(self.error("unclosed braced text"))
    }

    fn read_tag(&mut self) -> Result<String, ScanError> {
        let mut result = String::new();
        self.advance(); // <

        while let Some(ch) = self.advance() {
            match ch {
                '>' => return Ok(result),
                c if c.is_whitespace() => return Err(self.error("whitespace in tag")),
                c => result.push(c),
            }
        }
        Err(self.error("unclosed tag"))
    }

    fn read_run(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current() {
            if is_delimiter(ch) {
                break;
            }
            result.push(ch);
            self.advance();
        }
        result
    }

    pub fn next_token(&mut self) -> Result<Spanned, ScanError> {
        let skipped = self.skip_trivia();
        let (line, column) = (self.line, self.column);
        let token = match self.current() {
            None => Token::Eof,
            Some('[') => {
                self.advance();
                Token::LBracket
            }
            Some(']') => {
                self.advance();
                Token::RBracket
            }
            Some('(') => {
                self.advance();
                Token::LParen
            }
            Some(')') => {
                self.advance();
                Token::RParen
            }
            Some(',') => {
                self.advance();
                Token::Comma
            }
            Some('"') => Token::Text(self.read_string()?),
            Some('{') => Token::Text(self.read_braced()?),
            Some('}') => return Err(self.error("unexpected }")),
            Some('\'') => {
                self.advance();
                Token::Apostrophe
            }
            Some('@') if self.peek(1).is_some_and(|c| !is_delimiter(c) || c == '(' || c == '[') => {
                self.advance();
                Token::At
            }
            // `<` opens a tag only before a name; `<`, `<=` and `<>` are words
            Some('<') if self.peek(1).is_some_and(|c| c.is_alphabetic() || c == '.') => {
                Token::Tag(self.read_tag()?)
            }
            Some(_) => Token::Run(self.read_run()),
        };
        Ok(Spanned {
            token,
            line,
            column,
            joined: !skipped,
        })
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, ScanError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                return Ok(tokens);
            }
        }
    }
}

/// Piece of a path before it is split into segments
enum PathPiece {
    Run(String),
    Group(Vec<Value>),
}

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn current(&self) -> &Spanned {
        // tokenize always ends with Eof, and the parser never steps past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Spanned {
        let spanned = self.current().clone();
        if spanned.token != Token::Eof {
            self.pos += 1;
        }
        spanned
    }

    fn error_here(&self, message: impl Into<String>) -> ScanError {
        let at = self.current();
        ScanError {
            message: message.into(),
            line: at.line,
            column: at.column,
        }
    }

    /// Parse elements until `close` (or end of input when `close` is `None`)
    fn parse_sequence(&mut self, close: Option<Token>) -> Result<Vec<Value>, ScanError> {
        let mut items = Vec::new();
        loop {
            let token = self.current().token.clone();
            match (&token, &close) {
                (Token::Eof, None) => return Ok(items),
                (Token::Eof, Some(close)) => {
                    return Err(self.error_here(format!("missing {}", close)))
                }
                (t, Some(close)) if t == close => {
                    self.advance();
                    return Ok(items);
                }
                (Token::RBracket | Token::RParen, _) => {
                    return Err(self.error_here(format!("unexpected {}", token)))
                }
                _ => items.push(self.parse_element()?),
            }
        }
    }

    pub fn parse_element(&mut self) -> Result<Value, ScanError> {
        let spanned = self.advance();
        match spanned.token {
            Token::LBracket => Ok(Value::block(self.parse_sequence(Some(Token::RBracket))?)),
            Token::LParen => {
                let group = self.parse_sequence(Some(Token::RParen))?;
                self.parse_path_from(PathPiece::Group(group))
            }
            Token::Text(text) => Ok(Value::text(&text)),
            Token::Tag(tag) => Ok(Value::Tag(Rc::from(tag))),
            Token::Comma => Ok(Value::Comma),
            Token::Apostrophe => {
                if !self.current().joined || self.current().token == Token::Eof {
                    return Err(self.error_here("nothing to quote after '"));
                }
                Ok(Value::Quoted(Box::new(self.parse_element()?)))
            }
            Token::At => Ok(Value::Sym(Box::new(self.parse_element()?))),
            Token::Run(run) => self.parse_path_from(PathPiece::Run(run)),
            Token::RBracket | Token::RParen | Token::Eof => Err(ScanError {
                message: format!("unexpected {}", spanned.token),
                line: spanned.line,
                column: spanned.column,
            }),
        }
    }

    /// Gather `word/(group)/word` pieces written without whitespace
    fn parse_path_from(&mut self, first: PathPiece) -> Result<Value, ScanError> {
        let mut pieces = vec![first];
        loop {
            let next = self.current();
            let continues = next.joined
                && match (pieces.last(), &next.token) {
                    (Some(PathPiece::Run(run)), Token::LParen) => run.ends_with('/'),
                    (Some(PathPiece::Group(_)), Token::Run(run)) => run.starts_with('/'),
                    _ => false,
                };
            if !continues {
                break;
            }
            match self.advance().token {
                Token::LParen => pieces.push(PathPiece::Group(self.parse_sequence(Some(Token::RParen))?)),
                Token::Run(run) => pieces.push(PathPiece::Run(run)),
                _ => break,
            }
        }

        if pieces.len() == 1 {
            return match pieces.pop() {
                Some(PathPiece::Group(items)) => Ok(Value::group(items)),
                Some(PathPiece::Run(run)) => self.classify_run(&run),
                None => Err(self.error_here("empty path")),
            };
        }
        self.assemble_path(pieces)
    }

    fn classify_run(&self, run: &str) -> Result<Value, ScanError> {
        match run {
            "_" => return Ok(Value::Blank),
            "~" => return Ok(Value::Void),
            "/" | "//" => return Ok(Value::word(run)),
            _ => {}
        }
        if let Some(name) = run.strip_prefix('/') {
            if name.contains('/') || name.is_empty() {
                return Err(self.error_here(format!("bad refinement {}", run)));
            }
            return Ok(Value::Refinement(Rc::from(name)));
        }
        if run.contains('/') {
            return self.assemble_path(vec![PathPiece::Run(run.to_string())]);
        }
        if let Some(number) = parse_number(run) {
            return Ok(number);
        }
        if run.len() > 1 {
            if let Some(name) = run.strip_suffix(':') {
                return Ok(Value::SetWord(Rc::from(name)));
            }
            if let Some(name) = run.strip_prefix(':') {
                return Ok(Value::GetWord(Rc::from(name)));
            }
        }
        Ok(Value::word(run))
    }

    fn assemble_path(&self, mut pieces: Vec<PathPiece>) -> Result<Value, ScanError> {
        let mut set = false;
        let mut get = false;
        if let Some(PathPiece::Run(run)) = pieces.first_mut() {
            if let Some(rest) = run.strip_prefix(':') {
                get = true;
                *run = rest.to_string();
            }
        }
        if let Some(PathPiece::Run(run)) = pieces.last_mut() {
            if let Some(rest) = run.strip_suffix(':') {
                set = true;
                *run = rest.to_string();
            }
        }
        if set && get {
            return Err(self.error_here("path cannot be both get and set"));
        }

        let count = pieces.len();
        let mut segments = Vec::new();
        for (index, piece) in pieces.into_iter().enumerate() {
            match piece {
                PathPiece::Group(items) => segments.push(Value::group(items)),
                PathPiece::Run(run) => {
                    let mut text = run.as_str();
                    if index > 0 {
                        text = text.strip_prefix('/').unwrap_or(text);
                    }
                    if index + 1 < count {
                        text = text.strip_suffix('/').unwrap_or(text);
                    }
                    if text.is_empty() {
                        continue;
                    }
                    for segment in text.split('/') {
                        if segment.is_empty() {
                            return Err(self.error_here(format!("empty segment in path {}", run)));
                        }
                        segments.push(
                            parse_number(segment).unwrap_or_else(|| Value::word(segment)),
                        );
                    }
                }
            }
        }
        if segments.len() < 2 {
            return Err(self.error_here("path needs at least two segments"));
        }
        let array: Rc<[Value]> = Rc::from(segments);
        Ok(if set {
            Value::SetPath(array)
        } else if get {
            Value::GetPath(array)
        } else {
            Value::Path(array)
        })
    }

    pub fn parse(&mut self) -> Result<Vec<Value>, ScanError> {
        self.parse_sequence(None)
    }
}

fn parse_number(run: &str) -> Option<Value> {
    let digits = run.strip_prefix(['+', '-']).unwrap_or(run);
    let numeric_start = digits
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || (c == '.' && digits.len() > 1));
    if !numeric_start {
        return None;
    }
    if let Ok(n) = run.parse::<i64>() {
        return Some(Value::Integer(n));
    }
    run.parse::<f64>().ok().map(Value::Decimal)
}

/// Scan source text into top-level code units
pub fn scan(source: &str) -> Result<Vec<Value>, ScanError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(source: &str) -> Value {
        let mut items = scan(source).unwrap();
        assert_eq!(items.len(), 1, "{} should scan to one unit", source);
        items.remove(0)
    }

    #[test]
    fn test_scan_scalars() {
        assert_eq!(one("42"), Value::Integer(42));
        assert_eq!(one("-7"), Value::Integer(-7));
        assert_eq!(one("1.5"), Value::Decimal(1.5));
        assert_eq!(one("_"), Value::Blank);
        assert_eq!(one(r#""hi there""#), Value::text("hi there"));
        assert_eq!(one("{multi\nline}"), Value::text("multi\nline"));
    }

    #[test]
    fn test_scan_word_kinds() {
        assert_eq!(one("foo"), Value::word("foo"));
        assert_eq!(one("foo:"), Value::SetWord("foo".into()));
        assert_eq!(one(":foo"), Value::GetWord("foo".into()));
        assert_eq!(one("/dup"), Value::Refinement("dup".into()));
        assert_eq!(one("'foo"), Value::Quoted(Box::new(Value::word("foo"))));
        assert_eq!(one("@foo"), Value::Sym(Box::new(Value::word("foo"))));
        assert_eq!(one("-"), Value::word("-"));
        assert_eq!(one("/"), Value::word("/"));
    }

    #[test]
    fn test_scan_operators_and_tags() {
        let items = scan("a < b <= c <> d <opt> <...>").unwrap();
        assert_eq!(items[1], Value::word("<"));
        assert_eq!(items[3], Value::word("<="));
        assert_eq!(items[5], Value::word("<>"));
        assert_eq!(items[7], Value::Tag("opt".into()));
        assert_eq!(items[8], Value::Tag("...".into()));
    }

    #[test]
    fn test_scan_nested_and_comments() {
        let items = scan("[1 (2 3)] ; trailing comment\n, x").unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(
            items[0],
            Value::block(vec![
                Value::Integer(1),
                Value::group(vec![Value::Integer(2), Value::Integer(3)])
            ])
        );
        assert_eq!(items[1], Value::Comma);
    }

    #[test]
    fn test_scan_paths() {
        assert_eq!(
            one("append/dup"),
            Value::Path(Rc::from(vec![Value::word("append"), Value::word("dup")]))
        );
        assert_eq!(
            one("b/2:"),
            Value::SetPath(Rc::from(vec![Value::word("b"), Value::Integer(2)]))
        );
        assert_eq!(
            one(":b/x"),
            Value::GetPath(Rc::from(vec![Value::word("b"), Value::word("x")]))
        );
        assert_eq!(
            one("f/(r)/2"),
            Value::Path(Rc::from(vec![
                Value::word("f"),
                Value::group(vec![Value::word("r")]),
                Value::Integer(2)
            ]))
        );
    }

    #[test]
    fn test_scan_errors() {
        assert!(scan("[1 2").is_err());
        assert!(scan("1 2)").is_err());
        assert!(scan("\"open").is_err());
        assert!(scan("' x").is_err());
        let err = scan("\n  ]").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 3);
    }
}
