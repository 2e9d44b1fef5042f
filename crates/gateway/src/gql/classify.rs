/// Splits a mutation selection name into its action, entity and mode, e.g.
/// `delete_flow_run_by_pk` -> (`delete`, `flow_run`, `Some(pk)`).
///
/// `get_or_create_*` is a special case: the literal substring is treated as
/// the operation, and the remainder (including any leading underscore the
/// split leaves behind) becomes the entity. Ported as-is from the upstream
/// service, underscore quirk included, since the oracle only ever calls
/// `canonicalize` on the result and that strips unknown prefixes anyway.
pub fn split_operation_entity_mode(selection_name: &str) -> (String, String, Option<String>) {
	let parts: Vec<&str> = selection_name.split('_').collect();
	let mut operation = parts[0].to_string();
	let mut entity_mode = parts[1..].join("_");

	if operation == "get" {
		let tmp_parts: Vec<&str> = selection_name.split("get_or_create").collect();
		if tmp_parts.len() == 2 {
			operation = "get_or_create".to_string();
			entity_mode = tmp_parts[1].to_string();
		}
	}

	let parts: Vec<&str> = entity_mode.split("_by_").collect();
	let entity = parts[0].to_string();
	let mode = if parts.len() == 2 { Some(parts[1].to_string()) } else { None };
	(operation, entity, mode)
}

/// Mutations against these entities are never allowed, regardless of action.
pub fn is_blocked_entity(entity: &str) -> bool {
	entity.starts_with("cloud_hook") || entity.starts_with("project_description") || entity.starts_with("message") || entity.contains("artifact")
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("delete_flow_run_by_pk", ("delete", "flow_run", Some("pk")))]
	#[case("insert_task", ("insert", "task", None))]
	#[case("set_flow_run_states", ("set", "flow_run_states", None))]
	#[case("write_run_logs", ("write", "run_logs", None))]
	fn splits_action_entity_mode(#[case] name: &str, #[case] expected: (&str, &str, Option<&str>)) {
		let (action, entity, mode) = split_operation_entity_mode(name);
		assert_eq!(action, expected.0);
		assert_eq!(entity, expected.1);
		assert_eq!(mode.as_deref(), expected.2);
	}

	#[test]
	fn get_or_create_is_special_cased() {
		let (action, entity, mode) = split_operation_entity_mode("get_or_create_flow");
		assert_eq!(action, "get_or_create");
		assert_eq!(entity, "_flow");
		assert_eq!(mode, None);
	}

	#[rstest]
	#[case("flow_run_artifact", true)]
	#[case("cloud_hook", true)]
	#[case("project_description", true)]
	#[case("message_queue", true)]
	#[case("flow_run", false)]
	#[case("task", false)]
	fn blocklist_covers_every_blocked_family(#[case] entity: &str, #[case] blocked: bool) {
		assert_eq!(is_blocked_entity(entity), blocked);
	}
}
