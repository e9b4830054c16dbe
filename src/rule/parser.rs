use crate::rule::ast::{ArgValue, Dialect, Matcher, MatcherArg, RuleExpr, TemplateSegment};
use crate::rule::error::RuleError;
use crate::rule::lexer::{tokenize, SpannedToken, Token};
use crate::rule::schema::MatcherName;

/// 규칙 문자열을 파싱해 표현식 트리를 만듭니다.
///
/// 우선순위는 `||` < `&&` < 단항 `!` < 기본식 순으로 오르는
/// Pratt 스타일입니다. 파서는 전역적입니다: 트리 하나를 반환하거나,
/// 첫 결함을 가리키는 에러 하나를 반환합니다.
pub fn parse_rule(input: &str, dialect: Dialect) -> Result<RuleExpr, RuleError> {
    let tokens = tokenize(input, dialect)?;
    let mut parser = RuleParser {
        tokens,
        pos: 0,
        dialect,
        input_len: input.len(),
    };

    let expr = parser.parse_or()?;

    if let Some(extra) = parser.peek() {
        return Err(RuleError::TrailingGarbage { offset: extra.offset });
    }

    Ok(expr)
}

struct RuleParser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    dialect: Dialect,
    input_len: usize,
}

impl RuleParser {
    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&SpannedToken> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// 입력이 끝났을 때 에러가 가리킬 오프셋
    fn end_offset(&self) -> usize {
        self.input_len
    }

    fn unexpected(&self, expected: &str) -> RuleError {
        match self.peek() {
            Some(spanned) => RuleError::UnexpectedToken {
                found: spanned.token.describe(),
                expected: expected.to_string(),
                offset: spanned.offset,
            },
            None => RuleError::UnexpectedToken {
                found: "입력 끝".to_string(),
                expected: expected.to_string(),
                offset: self.end_offset(),
            },
        }
    }

    /// or_expr := and_expr ('||' and_expr)*
    fn parse_or(&mut self) -> Result<RuleExpr, RuleError> {
        let mut left = self.parse_and()?;

        while matches!(self.peek().map(|t| &t.token), Some(Token::OrOr)) {
            self.advance();
            let right = self.parse_and()?;
            left = RuleExpr::or(left, right);
        }

        Ok(left)
    }

    /// and_expr := not_expr ('&&' not_expr)*
    fn parse_and(&mut self) -> Result<RuleExpr, RuleError> {
        let mut left = self.parse_not()?;

        while matches!(self.peek().map(|t| &t.token), Some(Token::AndAnd)) {
            self.advance();
            let right = self.parse_not()?;
            left = RuleExpr::and(left, right);
        }

        Ok(left)
    }

    /// not_expr := '!' not_expr | primary
    fn parse_not(&mut self) -> Result<RuleExpr, RuleError> {
        if matches!(self.peek().map(|t| &t.token), Some(Token::Bang)) {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(RuleExpr::not(operand));
        }
        self.parse_primary()
    }

    /// primary := '(' expr ')' | matcher
    fn parse_primary(&mut self) -> Result<RuleExpr, RuleError> {
        match self.peek().map(|t| (t.token.clone(), t.offset)) {
            Some((Token::LParen, _)) => {
                self.advance();
                let inner = self.parse_or()?;
                match self.peek().map(|t| &t.token) {
                    Some(Token::RParen) => {
                        self.advance();
                        Ok(RuleExpr::group(inner))
                    }
                    _ => Err(self.unexpected("')'")),
                }
            }
            Some((Token::Ident(name), offset)) => {
                self.advance();
                self.parse_matcher(&name, offset)
            }
            _ => Err(self.unexpected("매처 또는 '('")),
        }
    }

    /// matcher := IDENT '(' arglist? ')'
    fn parse_matcher(&mut self, name: &str, name_offset: usize) -> Result<RuleExpr, RuleError> {
        let matcher_name = MatcherName::from_ident(name).ok_or_else(|| RuleError::UnknownMatcher {
            name: name.to_string(),
            offset: name_offset,
        })?;

        match self.peek().map(|t| &t.token) {
            Some(Token::LParen) => {
                self.advance();
            }
            _ => return Err(self.unexpected("'('")),
        }

        let mut args = Vec::new();

        if !matches!(self.peek().map(|t| &t.token), Some(Token::RParen)) {
            loop {
                let arg = self.parse_arg(matcher_name)?;
                args.push(arg);

                match self.peek().map(|t| &t.token) {
                    Some(Token::Comma) => {
                        self.advance();
                    }
                    Some(Token::RParen) => break,
                    _ => return Err(self.unexpected("',' 또는 ')'")),
                }
            }
        }

        // 닫는 괄호 소비
        self.advance();

        // 인자 수는 매처 이름 위치를 가리키며 검사
        if !matcher_name.accepts_arity(args.len()) {
            return Err(RuleError::ArityMismatch {
                matcher: matcher_name.as_str().to_string(),
                expected: matcher_name.arity_label(),
                found: args.len(),
                offset: name_offset,
            });
        }

        Ok(RuleExpr::matcher(Matcher::new(matcher_name, args)))
    }

    fn parse_arg(&mut self, matcher: MatcherName) -> Result<MatcherArg, RuleError> {
        match self.peek().map(|t| t.token.clone()) {
            Some(Token::Str { value, quote }) => {
                self.advance();

                // v2 HostRegexp 인자는 {name:regex} 템플릿을 구조화해 담음
                let parsed = if self.dialect == Dialect::V2 && matcher.takes_template_args() {
                    parse_template(&value)
                } else {
                    ArgValue::Literal(value)
                };

                Ok(MatcherArg { value: parsed, quote })
            }
            _ => Err(self.unexpected("문자열 인자")),
        }
    }
}

/// v2 중괄호 템플릿을 조각으로 분해합니다.
///
/// 캡처가 하나도 없으면 리터럴로 취급합니다. 패턴 내부의 중괄호
/// (`[a-z]{2,3}` 같은 수량자)는 중첩 수를 세어 넘깁니다.
fn parse_template(raw: &str) -> ArgValue {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = raw.char_indices().peekable();
    let mut has_capture = false;

    while let Some((_, ch)) = chars.next() {
        if ch != '{' {
            text.push(ch);
            continue;
        }

        // '{' 다음부터 캡처 이름과 패턴을 읽는다
        let mut name = String::new();
        let mut pattern = String::new();
        let mut in_pattern = false;
        let mut depth = 1;
        let mut closed = false;

        for (_, inner) in chars.by_ref() {
            match inner {
                ':' if !in_pattern => in_pattern = true,
                '{' => {
                    depth += 1;
                    if in_pattern {
                        pattern.push(inner);
                    } else {
                        name.push(inner);
                    }
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        closed = true;
                        break;
                    }
                    if in_pattern {
                        pattern.push(inner);
                    } else {
                        name.push(inner);
                    }
                }
                _ => {
                    if in_pattern {
                        pattern.push(inner);
                    } else {
                        name.push(inner);
                    }
                }
            }
        }

        if !closed {
            // 닫히지 않은 중괄호는 템플릿이 아니라 본문으로 되돌림
            text.push('{');
            text.push_str(&name);
            if in_pattern {
                text.push(':');
                text.push_str(&pattern);
            }
            continue;
        }

        if !text.is_empty() {
            segments.push(TemplateSegment::Text(std::mem::take(&mut text)));
        }

        // `{name}`은 제약 없는 캡처, `{name:re}`는 패턴 캡처
        let (name, pattern) = if in_pattern {
            (Some(name), pattern)
        } else if name.is_empty() {
            (None, ".+".to_string())
        } else {
            (Some(name), ".+".to_string())
        };

        has_capture = true;
        segments.push(TemplateSegment::Capture { name, pattern });
    }

    if !has_capture {
        return ArgValue::Literal(raw.to_string());
    }

    if !text.is_empty() {
        segments.push(TemplateSegment::Text(text));
    }

    ArgValue::Template(segments)
}
