//! 출력 형식별 방출기(emitter)입니다.
//!
//! 방출은 Config와 방언의 순수 함수이며, id 맵이 `BTreeMap`이므로 출력은
//! 실행 간에 바이트 단위로 동일합니다. 대상 형식이 표현하지 못하는
//! 기능은 경고 진단으로 기록되고, 형식이 허용하면 주석으로도 남습니다.

mod compose;
mod error;
mod nginx;
mod traefik;

pub use compose::emit_compose;
pub use error::{EmitError, Emitted, Result};
pub use nginx::emit_nginx;
pub use traefik::emit_traefik;
