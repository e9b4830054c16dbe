use crate::rule::schema::MatcherName;

/// 규칙 방언입니다. 문법은 연산자 수준에서 동일하고, 리터럴 인자의 허용
/// 형태만 다릅니다 (v2는 HostRegexp에 중괄호 템플릿과 큰따옴표 문자열 허용).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    V2,
    #[default]
    V3,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::V2 => "v2",
            Dialect::V3 => "v3",
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v2" => Ok(Dialect::V2),
            "v3" => Ok(Dialect::V3),
            unknown => Err(format!("알 수 없는 규칙 방언: {}", unknown)),
        }
    }
}

/// 문자열 인자의 원본 구분자입니다. 무손실 라운드트립을 위해 보존합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteStyle {
    #[default]
    Backtick,
    Single,
    /// v2에서만 합법
    Double,
}

/// v2 `HostRegexp` 템플릿 인자의 조각입니다.
///
/// `{sub:[a-z]+}.example.com`은
/// `[Capture{name:"sub", pattern:"[a-z]+"}, Text(".example.com")]`이 됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    Text(String),
    Capture {
        name: Option<String>,
        pattern: String,
    },
}

/// 매처 인자 값: 평범한 리터럴이거나 v2 템플릿입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Literal(String),
    Template(Vec<TemplateSegment>),
}

/// 매처 호출의 인자 하나입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherArg {
    pub value: ArgValue,
    pub quote: QuoteStyle,
}

impl MatcherArg {
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: ArgValue::Literal(value.into()),
            quote: QuoteStyle::Backtick,
        }
    }

    /// 리터럴 값이면 그 문자열을 돌려줍니다.
    pub fn as_literal(&self) -> Option<&str> {
        match &self.value {
            ArgValue::Literal(text) => Some(text),
            ArgValue::Template(_) => None,
        }
    }

    /// 인자를 v3 정규식 문자열로 내린 결과입니다.
    /// 리터럴은 그대로, 템플릿은 `(?P<name>pattern)` 꼴로 변환됩니다.
    pub fn to_v3_text(&self) -> String {
        match &self.value {
            ArgValue::Literal(text) => text.clone(),
            ArgValue::Template(segments) => segments_to_regex(segments),
        }
    }
}

/// 템플릿 조각 목록을 v3 정규식으로 내립니다.
/// 텍스트 조각은 정규식 메타문자를 이스케이프합니다.
pub fn segments_to_regex(segments: &[TemplateSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            TemplateSegment::Text(text) => {
                for ch in text.chars() {
                    if "\\.+*?()|[]{}^$".contains(ch) {
                        out.push('\\');
                    }
                    out.push(ch);
                }
            }
            TemplateSegment::Capture { name, pattern } => {
                match name {
                    Some(name) => {
                        out.push_str("(?P<");
                        out.push_str(name);
                        out.push('>');
                    }
                    None => out.push('('),
                }
                out.push_str(pattern);
                out.push(')');
            }
        }
    }
    out
}

/// 타입이 붙은 매처 술어입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub name: MatcherName,
    pub args: Vec<MatcherArg>,
}

impl Matcher {
    pub fn new(name: MatcherName, args: Vec<MatcherArg>) -> Self {
        Self { name, args }
    }

    /// 인자 문자열 하나로 매처를 만드는 편의 생성자
    pub fn single(name: MatcherName, arg: impl Into<String>) -> Self {
        Self {
            name,
            args: vec![MatcherArg::literal(arg)],
        }
    }
}

/// 규칙 표현식 트리입니다.
///
/// 유한하고 비순환적이며, `Group`은 작성자의 괄호 의도를 보존하기 위해
/// 별도 노드로 유지됩니다. 합성된 트리(그룹 없는)는 출력 시 의미 보존에
/// 필요한 곳에만 괄호가 삽입됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleExpr {
    Matcher(Matcher),
    And(Box<RuleExpr>, Box<RuleExpr>),
    Or(Box<RuleExpr>, Box<RuleExpr>),
    Not(Box<RuleExpr>),
    Group(Box<RuleExpr>),
}

impl RuleExpr {
    pub fn matcher(matcher: Matcher) -> Self {
        RuleExpr::Matcher(matcher)
    }

    pub fn and(left: RuleExpr, right: RuleExpr) -> Self {
        RuleExpr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: RuleExpr, right: RuleExpr) -> Self {
        RuleExpr::Or(Box::new(left), Box::new(right))
    }

    pub fn not(operand: RuleExpr) -> Self {
        RuleExpr::Not(Box::new(operand))
    }

    pub fn group(inner: RuleExpr) -> Self {
        RuleExpr::Group(Box::new(inner))
    }

    /// 최상위 논리곱(conjunction)을 평탄화해 매처 목록을 돌려줍니다.
    /// `Host(a) && (P(x) || P(y))`에서는 `Host`만 나옵니다.
    pub fn top_conjunction(&self) -> Vec<&Matcher> {
        let mut out = Vec::new();
        self.collect_conjunction(&mut out);
        out
    }

    fn collect_conjunction<'a>(&'a self, out: &mut Vec<&'a Matcher>) {
        match self {
            RuleExpr::Matcher(matcher) => out.push(matcher),
            RuleExpr::And(left, right) => {
                left.collect_conjunction(out);
                right.collect_conjunction(out);
            }
            // 그룹/부정/논리합 아래의 매처는 최상위 논리곱이 아님
            RuleExpr::Group(_) | RuleExpr::Not(_) | RuleExpr::Or(_, _) => {}
        }
    }

    /// 최상위 논리곱에서 Host/HostSNI 인자들을 추출합니다.
    /// nginx 방출기의 호스트 그룹화에 쓰입니다.
    pub fn hosts(&self) -> Vec<String> {
        self.top_conjunction()
            .into_iter()
            .filter(|matcher| {
                matches!(
                    matcher.name,
                    MatcherName::Host | MatcherName::HostRegexp | MatcherName::HostSni
                )
            })
            .flat_map(|matcher| matcher.args.iter().map(MatcherArg::to_v3_text))
            .collect()
    }

    /// 트리 전체의 매처를 깊이 우선으로 순회합니다.
    pub fn walk_matchers<'a>(&'a self, visit: &mut impl FnMut(&'a Matcher)) {
        match self {
            RuleExpr::Matcher(matcher) => visit(matcher),
            RuleExpr::And(left, right) | RuleExpr::Or(left, right) => {
                left.walk_matchers(visit);
                right.walk_matchers(visit);
            }
            RuleExpr::Not(operand) | RuleExpr::Group(operand) => operand.walk_matchers(visit),
        }
    }

    /// 트리에 등장하는 모든 매처 이름
    pub fn matcher_names(&self) -> Vec<MatcherName> {
        let mut names = Vec::new();
        self.walk_matchers(&mut |matcher| names.push(matcher.name));
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_conjunction_stops_at_groups() {
        // Host(`a`) && (PathPrefix(`/x`) || PathPrefix(`/y`))
        let expr = RuleExpr::and(
            RuleExpr::matcher(Matcher::single(MatcherName::Host, "a")),
            RuleExpr::group(RuleExpr::or(
                RuleExpr::matcher(Matcher::single(MatcherName::PathPrefix, "/x")),
                RuleExpr::matcher(Matcher::single(MatcherName::PathPrefix, "/y")),
            )),
        );

        let top = expr.top_conjunction();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, MatcherName::Host);
        assert_eq!(expr.hosts(), vec!["a"]);
    }

    #[test]
    fn test_walk_matchers_visits_all() {
        let expr = RuleExpr::and(
            RuleExpr::matcher(Matcher::single(MatcherName::Host, "a")),
            RuleExpr::not(RuleExpr::matcher(Matcher::single(MatcherName::Path, "/x"))),
        );
        assert_eq!(
            expr.matcher_names(),
            vec![MatcherName::Host, MatcherName::Path]
        );
    }

    #[test]
    fn test_template_to_regex() {
        let segments = vec![
            TemplateSegment::Capture {
                name: Some("sub".to_string()),
                pattern: "[a-z]+".to_string(),
            },
            TemplateSegment::Text(".x".to_string()),
        ];
        assert_eq!(segments_to_regex(&segments), r"(?P<sub>[a-z]+)\.x");
    }
}
