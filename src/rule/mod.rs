//! Traefik 규칙 표현 언어의 렉서, 파서, AST, 출력기입니다.
//!
//! 문법(wire-exact):
//!
//! ```text
//! expr     := or_expr
//! or_expr  := and_expr ('||' and_expr)*
//! and_expr := not_expr ('&&' not_expr)*
//! not_expr := '!' not_expr | primary
//! primary  := '(' expr ')' | matcher
//! matcher  := IDENT '(' arglist? ')'
//! ```
//!
//! # 예제
//!
//! ```
//! use proxy_config_bridge::rule::{parse_rule, print_rule, Dialect};
//!
//! let expr = parse_rule("Host(`a.com`) && PathPrefix(`/api`)", Dialect::V3).unwrap();
//! assert_eq!(print_rule(&expr, Dialect::V3), "Host(`a.com`) && PathPrefix(`/api`)");
//! ```

mod ast;
mod error;
mod lexer;
mod parser;
mod printer;
mod schema;

pub use ast::{
    segments_to_regex, ArgValue, Dialect, Matcher, MatcherArg, QuoteStyle, RuleExpr,
    TemplateSegment,
};
pub use error::RuleError;
pub use parser::parse_rule;
pub use printer::{print_rule, segments_from_regex};
pub use schema::{MatcherName, MatcherSchema, MATCHER_SCHEMA};
