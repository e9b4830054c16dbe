use proxy_config_bridge::rule::{
    parse_rule, print_rule, Dialect, Matcher, MatcherName, RuleError, RuleExpr,
};

#[test]
fn test_scenario_s1_ast_shape() {
    // Host(`a.com`) && (PathPrefix(`/x`) || PathPrefix(`/y`))
    let input = "Host(`a.com`) && (PathPrefix(`/x`) || PathPrefix(`/y`))";
    let expr = parse_rule(input, Dialect::V3).unwrap();

    let expected = RuleExpr::and(
        RuleExpr::matcher(Matcher::single(MatcherName::Host, "a.com")),
        RuleExpr::group(RuleExpr::or(
            RuleExpr::matcher(Matcher::single(MatcherName::PathPrefix, "/x")),
            RuleExpr::matcher(Matcher::single(MatcherName::PathPrefix, "/y")),
        )),
    );
    assert_eq!(expr, expected);

    // v3 출력이 입력을 그대로 재현
    assert_eq!(print_rule(&expr, Dialect::V3), input);
}

#[test]
fn test_scenario_s6_arity() {
    // Method(GET, POST)는 통과
    assert!(parse_rule("Method(`GET`, `POST`)", Dialect::V3).is_ok());

    // Method()는 매처 이름 위치에서 ArityMismatch
    let err = parse_rule("Method()", Dialect::V3).unwrap_err();
    match err {
        RuleError::ArityMismatch { matcher, found, offset, .. } => {
            assert_eq!(matcher, "Method");
            assert_eq!(found, 0);
            assert_eq!(offset, 0);
        }
        other => panic!("ArityMismatch가 아님: {:?}", other),
    }
}

#[test]
fn test_v3_roundtrip_corpus() {
    // 속성 1: 유효한 v3 규칙은 파싱 후 출력하면 그대로
    let corpus = vec![
        "Host(`example.com`)",
        "Host(`a.com`, `b.com`)",
        "Host(`a`) && PathPrefix(`/api`)",
        "Host(`a`) || Host(`b`)",
        "!Host(`internal`)",
        "Host(`a`) && !PathPrefix(`/admin`)",
        "(Host(`a`) || Host(`b`)) && Path(`/x`)",
        "Header(`X-Api-Key`, `secret`) && Method(`GET`, `POST`)",
        "Query(`flag`)",
        "Query(`flag`, `on`)",
        "ClientIP(`10.0.0.0/8`, `192.168.0.0/16`)",
        "HostRegexp(`^api-[a-z]+$`)",
        "PathRegexp(`^/v[0-9]+/`)",
        "Host(`a.com`) && (PathPrefix(`/x`) || PathPrefix(`/y`))",
        "((Host(`deep`)))",
        "HostSNI(`db.internal`) && ALPN(`h2`)",
    ];

    for input in corpus {
        let expr = parse_rule(input, Dialect::V3)
            .unwrap_or_else(|e| panic!("파싱 실패: {} ({})", input, e));
        assert_eq!(print_rule(&expr, Dialect::V3), input, "라운드트립 불일치: {}", input);
    }
}

#[test]
fn test_v2_v3_hostregexp_property() {
    // 속성 2: v2 템플릿 ↔ v3 정규식
    let v2_input = "HostRegexp(`{sub:[a-z]+}.x`)";
    let expr = parse_rule(v2_input, Dialect::V2).unwrap();

    let v3_output = print_rule(&expr, Dialect::V3);
    assert_eq!(v3_output, r"HostRegexp(`(?P<sub>[a-z]+)\.x`)");

    // v3로 내린 결과를 다시 파싱해 v2로 올리면 원래 템플릿
    let lifted = parse_rule(&v3_output, Dialect::V3).unwrap();
    assert_eq!(print_rule(&lifted, Dialect::V2), v2_input);

    // 다른 매처는 방언 불변
    let invariant = "Host(`a`) && PathPrefix(`/x`)";
    let expr = parse_rule(invariant, Dialect::V2).unwrap();
    assert_eq!(print_rule(&expr, Dialect::V3), invariant);
}

#[test]
fn test_parser_totality() {
    // 속성 6: 어떤 입력이든 트리 하나 또는 오프셋이 유효한 진단 하나
    let invalid_inputs = vec![
        "",
        "   ",
        "Host",
        "Host(",
        "Host(`a`",
        "Host(`a`))",
        "Host(`a`) &&",
        "&& Host(`a`)",
        "Host(`a`) & Host(`b`)",
        "Host(`a`) | Host(`b`)",
        "Hots(`a`)",
        "Host(a)",
        "Host(`a`,)",
        "Method()",
        "Header(`only-one`)",
        "Query(`a`, `b`, `c`)",
        "(Host(`a`)",
        "!(Host(`a`) || ",
        "Host(`a`) Host(`b`)",
        "123(`a`)",
        "Host(`a`) ;",
        "HostSNI(`a`) extra",
    ];

    for input in invalid_inputs {
        let err = parse_rule(input, Dialect::V3)
            .expect_err(&format!("에러가 나야 하는 입력: {:?}", input));
        let offset = err.offset();
        assert!(
            offset <= input.len(),
            "오프셋 {}가 입력 길이 {}를 넘음: {:?}",
            offset,
            input.len(),
            input
        );
    }
}

#[test]
fn test_error_offsets_point_at_fault() {
    let cases = vec![
        ("Hots(`a`)", 0),                    // 알 수 없는 매처 이름 위치
        ("Host(`a`) && Foo(`b`)", 13),       // 두 번째 매처 위치
        ("Host(`a`) Host(`b`)", 10),         // 잉여 토큰 위치
        ("Host(`unterminated", 5),           // 문자열 시작 위치
    ];

    for (input, expected_offset) in cases {
        let err = parse_rule(input, Dialect::V3).unwrap_err();
        assert_eq!(err.offset(), expected_offset, "입력: {:?}", input);
    }
}

#[test]
fn test_rule_error_to_diagnostic() {
    let err = parse_rule("Hots(`a`)", Dialect::V3).unwrap_err();
    let diagnostic = err.to_diagnostic();

    assert!(diagnostic.is_error());
    assert_eq!(diagnostic.source.as_ref().unwrap().column, Some(0));
}

#[test]
fn test_tcp_matchers_parse() {
    let expr = parse_rule("HostSNI(`db.internal`)", Dialect::V3).unwrap();
    match &expr {
        RuleExpr::Matcher(matcher) => assert_eq!(matcher.name, MatcherName::HostSni),
        other => panic!("매처가 아님: {:?}", other),
    }
}

#[test]
fn test_host_extraction_for_grouping() {
    // nginx 방출기가 쓰는 최상위 논리곱 호스트 추출
    let expr = parse_rule(
        "Host(`a.com`, `b.com`) && PathPrefix(`/x`) && Method(`GET`)",
        Dialect::V3,
    )
    .unwrap();
    assert_eq!(expr.hosts(), vec!["a.com", "b.com"]);

    // Or 아래의 호스트는 최상위 논리곱이 아님
    let expr = parse_rule("Host(`a`) || Host(`b`)", Dialect::V3).unwrap();
    assert!(expr.hosts().is_empty());
}
