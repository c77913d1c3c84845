//! Free-text query parser.
//!
//! Parses the classic full-text query syntax into an [`Expression`]:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `aspirin` | term in any field (or the configured default fields) |
//! | `name:aspirin` | term in one field |
//! | `"oral drops"` | phrase |
//! | `asp*` | prefix |
//! | `/asp.rin/` | regular expression over tokens |
//! | `a AND b`, `a && b` | both |
//! | `a OR b`, `a \|\| b` | either |
//! | `NOT a`, `!a`, `-a` | prohibited |
//! | `+a` | required |
//! | `( ... )`, `name:( ... )` | grouping, optionally scoped to a field |
//! | `*:*` | every document |
//!
//! Adjacent clauses without an operator combine with the configured
//! [`DefaultOperator`]. `AND` binds tighter than `OR`. Any special character
//! can be escaped with a backslash; see [`escape_query`].
//!
//! Terms go through [`analyze`], so a term that analyzes to several tokens
//! becomes a phrase and a term that analyzes to nothing is dropped.

use crate::analysis::{analyze, normalize};
use crate::config::{DefaultOperator, SearchConfig};
use crate::error::{Result, SearchError};
use crate::expression::{BooleanClause, Expression, Occur};

/// Characters with a meaning in the query syntax.
const SPECIAL_CHARS: &[char] = &[
    '\\', '+', '-', '!', '(', ')', ':', '^', '[', ']', '"', '{', '}', '~', '*', '?', '|', '&', '/',
];

/// Escapes every special character so the text is searched literally.
///
/// ```
/// use termsift::escape_query;
///
/// assert_eq!(escape_query("type-2 (adult)"), r"type\-2 \(adult\)");
/// ```
pub fn escape_query(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Parser for free-text queries.
///
/// # Example
///
/// ```
/// use termsift::{Expression, QueryParser, SearchConfig};
///
/// let parser = QueryParser::new(SearchConfig::default());
/// let expr = parser.parse("name:Aspirin").unwrap();
/// assert_eq!(expr, Expression::term("name", "aspirin"));
///
/// assert!(parser.parse("name:(aspirin").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryParser {
    config: SearchConfig,
}

impl QueryParser {
    /// Creates a parser with the given options.
    pub fn new(config: SearchConfig) -> Self {
        QueryParser { config }
    }

    /// Returns the parser options.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Parses query text.
    ///
    /// Blank text parses to [`Expression::MatchAll`].
    pub fn parse(&self, text: &str) -> Result<Expression> {
        if text.trim().is_empty() {
            return Ok(Expression::MatchAll);
        }

        let tokens = Tokenizer::new(text).collect::<Result<Vec<_>>>()?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: text.len(),
            config: &self.config,
        };
        let unit = parser.disjunction(None)?;
        if let Some((position, token)) = parser.tokens.get(parser.pos) {
            return Err(SearchError::syntax(
                *position,
                format!("unexpected {}", token.describe()),
            ));
        }
        let expression = finish(unit);
        tracing::trace!(query = text, parsed = %expression, "parsed query");
        Ok(expression)
    }
}

/// Lexical tokens of the query syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// A bare word, with a trailing `*` recorded separately.
    Word { text: String, wildcard: bool },
    /// `field:` qualifier.
    Field(String),
    /// `"quoted phrase"`
    Phrase(String),
    /// `/regular expression/`
    Regex(String),
    /// `*:*`
    MatchAll,
    And,
    Or,
    Not,
    Plus,
    Minus,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word { text, .. } => format!("term '{}'", text),
            Token::Field(name) => format!("field '{}:'", name),
            Token::Phrase(_) => "phrase".to_string(),
            Token::Regex(_) => "regular expression".to_string(),
            Token::MatchAll => "'*:*'".to_string(),
            Token::And => "AND".to_string(),
            Token::Or => "OR".to_string(),
            Token::Not => "NOT".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }

    fn starts_unit(&self) -> bool {
        !matches!(self, Token::And | Token::Or | Token::RParen)
    }
}

/// Characters that end a bare word.
fn ends_word(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '!' | '(' | ')' | ':' | '^' | '[' | ']' | '"' | '{' | '}' | '~' | '?'
        )
}

/// Tokenizer for query text, yielding tokens with their byte offsets.
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn quoted(&mut self, delimiter: char, keep_escapes: bool) -> Result<String> {
        let start = self.pos;
        self.bump();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            self.bump();
            if c == delimiter {
                return Ok(text);
            }
            if c == '\\' {
                match self.peek() {
                    Some(next) => {
                        if keep_escapes && next != delimiter {
                            text.push('\\');
                        }
                        text.push(next);
                        self.bump();
                    }
                    None => break,
                }
                continue;
            }
            text.push(c);
        }
        let what = if delimiter == '"' {
            "phrase"
        } else {
            "regular expression"
        };
        Err(SearchError::syntax(start, format!("unterminated {}", what)))
    }

    fn word(&mut self) -> Result<Token> {
        let mut text = String::new();
        let mut escaped = false;
        let mut wildcard = false;

        while let Some(c) = self.peek() {
            if wildcard {
                if ends_word(c) {
                    break;
                }
                return Err(SearchError::syntax(
                    self.pos,
                    "wildcards are only supported at the end of a term",
                ));
            }
            if c == '\\' {
                let at = self.pos;
                self.bump();
                match self.peek() {
                    Some(next) => {
                        text.push(next);
                        escaped = true;
                        self.bump();
                    }
                    None => return Err(SearchError::syntax(at, "dangling escape character")),
                }
                continue;
            }
            if ends_word(c) {
                break;
            }
            self.bump();
            if c == '*' {
                wildcard = true;
            } else {
                text.push(c);
            }
        }

        if self.peek() == Some(':') {
            if wildcard {
                return Err(SearchError::syntax(self.pos, "field names cannot contain '*'"));
            }
            self.bump();
            return Ok(Token::Field(text));
        }

        if !escaped && !wildcard {
            match text.as_str() {
                "AND" => return Ok(Token::And),
                "OR" => return Ok(Token::Or),
                "NOT" => return Ok(Token::Not),
                _ => {}
            }
        }
        Ok(Token::Word { text, wildcard })
    }

    fn token(&mut self) -> Result<Token> {
        let rest = self.rest();
        if rest.starts_with("*:*") {
            self.pos += 3;
            return Ok(Token::MatchAll);
        }
        if rest.starts_with("&&") {
            self.pos += 2;
            return Ok(Token::And);
        }
        if rest.starts_with("||") {
            self.pos += 2;
            return Ok(Token::Or);
        }

        let single = match self.peek() {
            Some('(') => Some(Token::LParen),
            Some(')') => Some(Token::RParen),
            Some('+') => Some(Token::Plus),
            Some('-') => Some(Token::Minus),
            Some('!') => Some(Token::Not),
            _ => None,
        };
        if let Some(token) = single {
            self.bump();
            return Ok(token);
        }

        match self.peek() {
            Some('"') => self.quoted('"', false).map(Token::Phrase),
            Some('/') => self.quoted('/', true).map(Token::Regex),
            Some('*') => Err(SearchError::syntax(
                self.pos,
                "leading wildcards are not supported",
            )),
            Some(c @ (':' | '^' | '~' | '[' | ']' | '{' | '}' | '?')) => Err(SearchError::syntax(
                self.pos,
                format!("unsupported syntax '{}'", c),
            )),
            _ => self.word(),
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<(usize, Token)>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.peek()?;

        let start = self.pos;
        match self.token() {
            Ok(token) => Some(Ok((start, token))),
            Err(err) => {
                // Stop after the first error.
                self.pos = self.input.len();
                Some(Err(err))
            }
        }
    }
}

/// How a parsed unit was marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    None,
    Required,
    Prohibited,
}

type Unit = Option<(Modifier, Expression)>;

/// Turns a top-level or parenthesized unit into a standalone expression.
fn finish(unit: Unit) -> Expression {
    match unit {
        None => Expression::Boolean(Vec::new()),
        Some((Modifier::Prohibited, expression)) => {
            Expression::Boolean(vec![BooleanClause::new(Occur::MustNot, expression)])
        }
        Some((_, expression)) => expression,
    }
}

/// Combines units into one, or passes a lone unit through untouched.
fn combine(mut units: Vec<(Modifier, Expression)>, unmarked: Occur) -> Unit {
    match units.len() {
        0 => None,
        1 => units.pop(),
        _ => {
            let clauses = units
                .into_iter()
                .map(|(modifier, expression)| {
                    let occur = match modifier {
                        Modifier::None => unmarked,
                        Modifier::Required => Occur::Must,
                        Modifier::Prohibited => Occur::MustNot,
                    };
                    BooleanClause::new(occur, expression)
                })
                .collect();
            Some((Modifier::None, Expression::Boolean(clauses)))
        }
    }
}

struct Parser<'c> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    config: &'c SearchConfig,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(position, _)| *position)
            .unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn implicit(&self, operator: DefaultOperator) -> bool {
        self.config.default_operator == operator && self.peek().is_some_and(Token::starts_unit)
    }

    fn expect_unit(&self, after: &str) -> Result<()> {
        if self.peek().is_some_and(Token::starts_unit) {
            Ok(())
        } else {
            Err(SearchError::syntax(
                self.position(),
                format!("expected a clause after {}", after),
            ))
        }
    }

    fn disjunction(&mut self, field: Option<&str>) -> Result<Unit> {
        let mut units = Vec::new();
        units.extend(self.conjunction(field)?);
        loop {
            if self.peek() == Some(&Token::Or) {
                self.advance();
                self.expect_unit("OR")?;
            } else if !self.implicit(DefaultOperator::Or) {
                break;
            }
            units.extend(self.conjunction(field)?);
        }
        Ok(combine(units, Occur::Should))
    }

    fn conjunction(&mut self, field: Option<&str>) -> Result<Unit> {
        let mut units = Vec::new();
        units.extend(self.unit(field)?);
        loop {
            if self.peek() == Some(&Token::And) {
                self.advance();
                self.expect_unit("AND")?;
            } else if !self.implicit(DefaultOperator::And) {
                break;
            }
            units.extend(self.unit(field)?);
        }
        Ok(combine(units, Occur::Must))
    }

    fn unit(&mut self, field: Option<&str>) -> Result<Unit> {
        let modifier = match self.peek() {
            Some(Token::Plus) => Modifier::Required,
            Some(Token::Minus) | Some(Token::Not) => Modifier::Prohibited,
            _ => Modifier::None,
        };
        if modifier != Modifier::None {
            self.advance();
        }

        let expression = self.primary(field)?;
        Ok(expression.map(|expression| (modifier, expression)))
    }

    fn primary(&mut self, field: Option<&str>) -> Result<Option<Expression>> {
        let position = self.position();
        let Some((_, token)) = self.advance() else {
            return Err(SearchError::syntax(position, "unexpected end of query"));
        };

        match token {
            Token::LParen => self.group(position, field).map(Some),
            Token::Field(name) => {
                if field.is_some() {
                    return Err(SearchError::syntax(position, "nested field qualifier"));
                }
                match self.peek() {
                    Some(Token::LParen) => {
                        self.advance();
                        self.group(position, Some(&name)).map(Some)
                    }
                    Some(Token::Word { .. }) | Some(Token::Phrase(_)) | Some(Token::Regex(_)) => {
                        self.primary(Some(&name))
                    }
                    _ => Err(SearchError::syntax(
                        self.position(),
                        format!("missing value for field '{}'", name),
                    )),
                }
            }
            Token::MatchAll => Ok(Some(Expression::MatchAll)),
            Token::Word { text, wildcard } => self.word(position, field, &text, wildcard),
            Token::Phrase(text) => Ok(self.text(field, &text)),
            Token::Regex(pattern) => self.regex(position, field, pattern).map(Some),
            other => Err(SearchError::syntax(
                position,
                format!("unexpected {}", other.describe()),
            )),
        }
    }

    fn group(&mut self, open: usize, field: Option<&str>) -> Result<Expression> {
        if self.peek() == Some(&Token::RParen) {
            return Err(SearchError::syntax(open, "empty group"));
        }
        let unit = self.disjunction(field)?;
        match self.advance() {
            Some((_, Token::RParen)) => Ok(finish(unit)),
            _ => Err(SearchError::syntax(open, "unbalanced parenthesis")),
        }
    }

    fn word(
        &self,
        position: usize,
        field: Option<&str>,
        text: &str,
        wildcard: bool,
    ) -> Result<Option<Expression>> {
        if !wildcard {
            return Ok(self.text(field, text));
        }
        if !self.config.allow_wildcards {
            return Err(SearchError::syntax(position, "wildcard queries are disabled"));
        }
        let prefix = normalize(text);
        if prefix.is_empty() {
            return Err(SearchError::syntax(position, "empty wildcard prefix"));
        }
        Ok(Some(self.scoped(field, |field| Expression::Prefix {
            field,
            prefix: prefix.clone(),
        })))
    }

    fn text(&self, field: Option<&str>, text: &str) -> Option<Expression> {
        let mut terms = analyze(text);
        match terms.len() {
            0 => None,
            1 => {
                let text = terms.remove(0);
                Some(self.scoped(field, |field| Expression::Term {
                    field,
                    text: text.clone(),
                }))
            }
            _ => Some(self.scoped(field, |field| Expression::Phrase {
                field,
                terms: terms.clone(),
            })),
        }
    }

    fn regex(&self, position: usize, field: Option<&str>, pattern: String) -> Result<Expression> {
        if !self.config.allow_regex {
            return Err(SearchError::syntax(
                position,
                "regular expression queries are disabled",
            ));
        }
        regex::Regex::new(&pattern).map_err(|err| {
            SearchError::syntax(position, format!("invalid regular expression: {}", err))
        })?;
        Ok(self.scoped(field, |field| Expression::Regex {
            field,
            pattern: pattern.clone(),
        }))
    }

    /// Applies the explicit field, or spreads over the default fields.
    fn scoped<F>(&self, field: Option<&str>, build: F) -> Expression
    where
        F: Fn(Option<String>) -> Expression,
    {
        if let Some(field) = field {
            return build(Some(field.to_string()));
        }
        let defaults = &self.config.default_fields;
        if defaults.is_empty() {
            return build(None);
        }
        Expression::any(defaults.iter().map(|name| build(Some(name.clone()))))
    }
}
