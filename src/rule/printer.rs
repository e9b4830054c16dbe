use crate::rule::ast::{
    ArgValue, Dialect, Matcher, MatcherArg, QuoteStyle, RuleExpr, TemplateSegment,
};

/// 표현식 트리를 방언에 맞는 규칙 문자열로 출력합니다.
///
/// 우선순위는 `Not` > `And` > `Or`입니다. 작성자의 `Group` 노드는 그대로
/// 보존하고, 합성된 트리에는 의미 보존에 필요한 곳에만 괄호를 넣습니다.
pub fn print_rule(expr: &RuleExpr, dialect: Dialect) -> String {
    let mut out = String::new();
    print_node(expr, dialect, &mut out);
    out
}

fn precedence(expr: &RuleExpr) -> u8 {
    match expr {
        RuleExpr::Or(_, _) => 1,
        RuleExpr::And(_, _) => 2,
        RuleExpr::Not(_) => 3,
        RuleExpr::Matcher(_) | RuleExpr::Group(_) => 4,
    }
}

fn print_node(expr: &RuleExpr, dialect: Dialect, out: &mut String) {
    match expr {
        RuleExpr::Matcher(matcher) => print_matcher(matcher, dialect, out),
        RuleExpr::And(left, right) => {
            print_child(left, 2, dialect, out);
            out.push_str(" && ");
            print_child(right, 2, dialect, out);
        }
        RuleExpr::Or(left, right) => {
            print_child(left, 1, dialect, out);
            out.push_str(" || ");
            print_child(right, 1, dialect, out);
        }
        RuleExpr::Not(operand) => {
            out.push('!');
            print_child(operand, 3, dialect, out);
        }
        RuleExpr::Group(inner) => {
            out.push('(');
            print_node(inner, dialect, out);
            out.push(')');
        }
    }
}

/// 자식의 우선순위가 부모보다 낮으면 괄호로 감쌉니다.
fn print_child(child: &RuleExpr, parent_prec: u8, dialect: Dialect, out: &mut String) {
    if precedence(child) < parent_prec {
        out.push('(');
        print_node(child, dialect, out);
        out.push(')');
    } else {
        print_node(child, dialect, out);
    }
}

fn print_matcher(matcher: &Matcher, dialect: Dialect, out: &mut String) {
    out.push_str(matcher.name.as_str());
    out.push('(');
    for (index, arg) in matcher.args.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        print_arg(matcher, arg, dialect, out);
    }
    out.push(')');
}

fn print_arg(matcher: &Matcher, arg: &MatcherArg, dialect: Dialect, out: &mut String) {
    let delim = quote_char(arg.quote, dialect);

    let text = match (&arg.value, dialect) {
        (ArgValue::Literal(text), Dialect::V2) if matcher.name.takes_template_args() => {
            // v3 정규식으로 들어온 인자를 v2 템플릿으로 되올림
            match segments_from_regex(text) {
                Some(segments) => print_segments(&segments),
                None => text.clone(),
            }
        }
        (ArgValue::Literal(text), _) => text.clone(),
        (ArgValue::Template(segments), Dialect::V2) => print_segments(segments),
        // v3는 템플릿 표기가 없으므로 정규식으로 내림
        (ArgValue::Template(_), Dialect::V3) => arg.to_v3_text(),
    };

    out.push(delim);
    out.push_str(&text);
    out.push(delim);
}

/// 방언이 허용하는 구분자로 강등합니다. v3는 큰따옴표가 없으므로 백틱 사용.
fn quote_char(quote: QuoteStyle, dialect: Dialect) -> char {
    match (quote, dialect) {
        (QuoteStyle::Backtick, _) => '`',
        (QuoteStyle::Single, _) => '\'',
        (QuoteStyle::Double, Dialect::V2) => '"',
        (QuoteStyle::Double, Dialect::V3) => '`',
    }
}

fn print_segments(segments: &[TemplateSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            TemplateSegment::Text(text) => out.push_str(text),
            TemplateSegment::Capture { name, pattern } => {
                out.push('{');
                if let Some(name) = name {
                    out.push_str(name);
                }
                out.push(':');
                out.push_str(pattern);
                out.push('}');
            }
        }
    }
    out
}

/// v3 정규식을 v2 템플릿 조각으로 되올립니다 (가능한 경우에만).
///
/// `(?P<name>pattern)` 그룹과 그 사이의 이스케이프된 텍스트만 인식하며,
/// 그 외의 정규식 구조가 섞여 있으면 `None`을 반환해 원문을 유지합니다.
pub fn segments_from_regex(regex: &str) -> Option<Vec<TemplateSegment>> {
    if !regex.contains("(?P<") {
        return None;
    }

    let mut segments = Vec::new();
    let mut text = String::new();
    let bytes = regex.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        if regex[pos..].starts_with("(?P<") {
            let rest = &regex[pos + 4..];
            let name_end = rest.find('>')?;
            let name = &rest[..name_end];

            // 패턴은 괄호 중첩을 세어 닫는 위치를 찾는다
            let pattern_start = pos + 4 + name_end + 1;
            let mut depth = 1;
            let mut end = pattern_start;
            let inner = regex.as_bytes();
            while end < inner.len() {
                match inner[end] {
                    b'\\' => end += 1,
                    b'(' => depth += 1,
                    b')' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                end += 1;
            }
            if depth != 0 {
                return None;
            }

            if !text.is_empty() {
                segments.push(TemplateSegment::Text(std::mem::take(&mut text)));
            }
            segments.push(TemplateSegment::Capture {
                name: Some(name.to_string()),
                pattern: regex[pattern_start..end].to_string(),
            });
            pos = end + 1;
        } else {
            let ch = regex[pos..].chars().next()?;
            if ch == '\\' {
                // 이스케이프 해제
                pos += 1;
                let escaped = regex[pos..].chars().next()?;
                text.push(escaped);
                pos += escaped.len_utf8();
            } else if "+*?()|[]^$".contains(ch) {
                // 템플릿으로 표현할 수 없는 날 정규식 구조
                return None;
            } else {
                text.push(ch);
                pos += ch.len_utf8();
            }
        }
    }

    if !text.is_empty() {
        segments.push(TemplateSegment::Text(text));
    }

    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::parser::parse_rule;
    use crate::rule::schema::MatcherName;

    fn roundtrip_v3(input: &str) {
        let expr = parse_rule(input, Dialect::V3).unwrap();
        assert_eq!(print_rule(&expr, Dialect::V3), input);
    }

    #[test]
    fn test_v3_roundtrip_verbatim() {
        // 시나리오 S1: 입력 그대로 재현
        roundtrip_v3("Host(`a.com`) && (PathPrefix(`/x`) || PathPrefix(`/y`))");
        roundtrip_v3("Host(`a.com`)");
        roundtrip_v3("Host(`a`) && Path(`/x`) && Method(`GET`)");
        roundtrip_v3("!Host(`a`) || Header(`X-Key`, `v`)");
        roundtrip_v3("((Host(`a`)))");
    }

    #[test]
    fn test_synthesized_tree_gets_needed_parens() {
        // 그룹 없는 합성 트리: And 아래 Or는 괄호 필요
        let expr = RuleExpr::and(
            RuleExpr::matcher(Matcher::single(MatcherName::Host, "a")),
            RuleExpr::or(
                RuleExpr::matcher(Matcher::single(MatcherName::Path, "/x")),
                RuleExpr::matcher(Matcher::single(MatcherName::Path, "/y")),
            ),
        );
        assert_eq!(
            print_rule(&expr, Dialect::V3),
            "Host(`a`) && (Path(`/x`) || Path(`/y`))"
        );
    }

    #[test]
    fn test_not_wraps_compound_operand() {
        let expr = RuleExpr::not(RuleExpr::and(
            RuleExpr::matcher(Matcher::single(MatcherName::Host, "a")),
            RuleExpr::matcher(Matcher::single(MatcherName::Path, "/x")),
        ));
        assert_eq!(print_rule(&expr, Dialect::V3), "!(Host(`a`) && Path(`/x`))");
    }

    #[test]
    fn test_quote_style_kept() {
        let expr = parse_rule("Host('a.com')", Dialect::V3).unwrap();
        assert_eq!(print_rule(&expr, Dialect::V3), "Host('a.com')");
    }

    #[test]
    fn test_v2_template_to_v3_regex() {
        // 속성 2: v2 템플릿은 v3 정규식으로 내려감
        let expr = parse_rule("HostRegexp(`{sub:[a-z]+}.x`)", Dialect::V2).unwrap();
        assert_eq!(
            print_rule(&expr, Dialect::V3),
            r"HostRegexp(`(?P<sub>[a-z]+)\.x`)"
        );
        // v2로 출력하면 템플릿 표기가 유지됨
        assert_eq!(print_rule(&expr, Dialect::V2), "HostRegexp(`{sub:[a-z]+}.x`)");
    }

    #[test]
    fn test_v3_regex_lifts_back_to_v2_template() {
        // 속성 2의 역방향
        let expr = parse_rule(r"HostRegexp(`(?P<sub>[a-z]+)\.x`)", Dialect::V3).unwrap();
        assert_eq!(print_rule(&expr, Dialect::V2), "HostRegexp(`{sub:[a-z]+}.x`)");
    }

    #[test]
    fn test_unliftable_regex_stays_verbatim_in_v2() {
        // 이름 없는 그룹이 섞이면 되올림을 포기하고 원문 유지
        let raw = r"HostRegexp(`^api-.+$`)";
        let expr = parse_rule(raw, Dialect::V3).unwrap();
        assert_eq!(print_rule(&expr, Dialect::V2), raw);
    }

    #[test]
    fn test_double_quote_downgrades_in_v3() {
        let expr = parse_rule("Host(\"a\")", Dialect::V2).unwrap();
        assert_eq!(print_rule(&expr, Dialect::V2), "Host(\"a\")");
        assert_eq!(print_rule(&expr, Dialect::V3), "Host(`a`)");
    }

    #[test]
    fn test_segments_from_regex_rejects_bare_structures() {
        assert!(segments_from_regex("plain").is_none());
        assert!(segments_from_regex(r"(?P<a>x)|y").is_none());
        assert_eq!(
            segments_from_regex(r"(?P<sub>[a-z]+)\.x"),
            Some(vec![
                TemplateSegment::Capture {
                    name: Some("sub".to_string()),
                    pattern: "[a-z]+".to_string(),
                },
                TemplateSegment::Text(".x".to_string()),
            ])
        );
    }
}
