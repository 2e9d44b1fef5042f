/// Canonicalizes an upstream selection- or field-derived entity name into
/// the entity name the Belonging Oracle queries with `{entity}_by_pk`.
///
/// Ported prefix-for-prefix from `map_entity_name` in the upstream service.
/// Order matters: `flow_group`/`flow_run` must be checked before the bare
/// `flow` fallback, and `schedule*` really does map to `flow` — that mapping
/// is preserved verbatim even though it reads as a stretch.
/// Unknown prefixes return `None`, which the caller must treat as a denial.
pub fn canonicalize(entity: &str) -> Option<&'static str> {
	if entity.starts_with("_task_run") {
		Some("task_run")
	} else if entity.starts_with("agent") {
		Some("agent")
	} else if entity.starts_with("cloud_hook") {
		Some("cloud_hook")
	} else if entity.starts_with("edge") {
		Some("edge")
	} else if entity.starts_with("flow_group") {
		Some("flow_group")
	} else if entity.starts_with("flow_run") {
		Some("flow_run")
	} else if entity.starts_with("flow") {
		Some("flow")
	} else if entity.starts_with("log") {
		Some("log")
	} else if entity.starts_with("message") {
		Some("message")
	} else if entity.starts_with("project") {
		Some("project")
	} else if entity.starts_with("run") {
		Some("flow_run")
	} else if entity.starts_with("schedule") {
		Some("flow")
	} else if entity.starts_with("task") {
		Some("task")
	} else if entity.starts_with("tenant") {
		Some("tenant")
	} else if entity.starts_with("utility") {
		Some("task")
	} else {
		None
	}
}
