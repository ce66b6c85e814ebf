use std::sync::OnceLock;

use uuid::Uuid;

/// A primitive mechanism to tell fleet instances apart from each other. It
/// must survive multiple invocations handled by the same warm instance, so
/// it's computed once per process and cached, matching the original
/// lambda's `INSTANCE_ID: Final[str] = uuid4().hex`.
static INSTANCE_ID: OnceLock<String> = OnceLock::new();

pub fn instance_id() -> &'static str {
   INSTANCE_ID.get_or_init(|| Uuid::new_v4().simple().to_string())
}
