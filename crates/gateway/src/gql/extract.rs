use std::collections::BTreeMap;

use super::value::{json_as_id_string, resolve_scalar, Variables};
use super::{Field, Value};
use serde_json::Value as JsonValue;

/// Entities and ids found in an object literal, keyed by `*_id` fields.
///
/// Only fields whose name ends in the `_id` suffix count; a bare `id` field
/// is ignored here on purpose (it names no entity), fixing a
/// misclassification the upstream service's equivalent `endswith("id")`
/// check was prone to on fields like `taskid`.
pub fn entities_and_ids_from_object(obj: &BTreeMap<String, Value>, variables: &Variables) -> (Vec<String>, Vec<String>) {
	let mut entities = Vec::new();
	let mut ids = Vec::new();
	for (name, value) in obj {
		let Some(entity) = name.strip_suffix("_id") else {
			continue;
		};
		if let Some(id) = resolve_scalar(value, variables) {
			entities.push(entity.to_string());
			ids.push(id);
		}
	}
	(entities, ids)
}

/// Extracts entities/ids from the `input` argument of a mutation selection.
pub fn entities_and_ids_from_input(selection: &Field, variables: &Variables) -> (Vec<String>, Vec<String>) {
	for (name, value) in &selection.arguments {
		if name == "input"
			&& let Value::Object(obj) = value
		{
			return entities_and_ids_from_object(obj, variables);
		}
	}
	(Vec::new(), Vec::new())
}

/// Extracts entities/ids from the `objects`/`object` argument of an insert
/// mutation selection.
pub fn entities_and_ids_from_insert(selection: &Field, variables: &Variables) -> (Vec<String>, Vec<String>) {
	let mut entities = Vec::new();
	let mut ids = Vec::new();
	for (name, value) in &selection.arguments {
		match (name.as_str(), value) {
			("objects", Value::List(items)) => {
				for item in items {
					if let Value::Object(obj) = item {
						let (e, i) = entities_and_ids_from_object(obj, variables);
						entities.extend(e);
						ids.extend(i);
					}
				}
			}
			("object", Value::Object(obj)) => {
				let (e, i) = entities_and_ids_from_object(obj, variables);
				entities.extend(e);
				ids.extend(i);
			}
			_ => {}
		}
	}
	(entities, ids)
}

/// Resolves the id of `entity` referenced by `selection`, searching (in
/// order) the top-level variables, the matching scalar/`id` argument, the
/// `where` argument (AST object or variable, including `_and`), and the
/// `input` argument. `loosen` widens the match to any `*_id`-suffixed
/// argument, used by mutations that don't know the entity name up front.
pub fn entity_id(entity: &str, selection: &Field, variables: &Variables, loosen: bool) -> Option<String> {
	let name_entity_id = format!("{entity}_id");
	if let Some(id) = variables.get(&name_entity_id).and_then(json_as_id_string) {
		return Some(id);
	}
	for (arg_name, arg_value) in &selection.arguments {
		if arg_name == &name_entity_id || arg_name == "id" || (loosen && arg_name.ends_with("_id")) {
			if let Some(id) = resolve_scalar(arg_value, variables) {
				return Some(id);
			}
		} else if arg_name == "where" {
			match arg_value {
				Value::Object(obj) => {
					if let Some(id) = find_in_where_node(obj, &name_entity_id, variables, loosen) {
						return Some(id);
					}
				}
				Value::Variable(var) => {
					if let Some(obj) = variables.get(var).and_then(JsonValue::as_object)
						&& let Some(id) = super::value::find_in_where_variable(obj, &name_entity_id, loosen)
					{
						return Some(id);
					}
				}
				_ => {}
			}
		} else if arg_name == "input" {
			match arg_value {
				Value::Object(obj) => {
					for (field_name, field_value) in obj {
						if field_name == &name_entity_id || (loosen && field_name.ends_with("_id")) {
							if let Some(id) = resolve_scalar(field_value, variables) {
								return Some(id);
							}
						}
					}
				}
				Value::Variable(var) => {
					if let Some(obj) = variables.get(var).and_then(JsonValue::as_object) {
						for (field_name, field_value) in obj {
							if field_name == &name_entity_id || (loosen && field_name.ends_with("_id")) {
								if let Some(id) = json_as_id_string(field_value) {
									return Some(id);
								}
							}
						}
					}
				}
				_ => {}
			}
		}
	}
	None
}

fn find_in_where_node(obj: &BTreeMap<String, Value>, name: &str, variables: &Variables, loosen: bool) -> Option<String> {
	if let Some(Value::List(items)) = obj.get("_and") {
		for item in items {
			if let Value::Object(inner) = item
				&& let Some(id) = find_flat_node(inner, name, variables, loosen)
			{
				return Some(id);
			}
		}
	}
	find_flat_node(obj, name, variables, loosen)
}

fn find_flat_node(obj: &BTreeMap<String, Value>, name: &str, variables: &Variables, loosen: bool) -> Option<String> {
	for (field_name, field_value) in obj {
		if field_name == "_and" {
			continue;
		}
		if field_name == name || (loosen && field_name.ends_with("_id")) {
			return resolve_scalar(field_value, variables);
		}
	}
	None
}

/// Extracts flow_run ids from `write_run_logs`'s `input.logs` argument,
/// which may be an inline list or a variable.
pub fn flow_run_ids_from_write(selection: &Field, variables: &Variables) -> Vec<String> {
	let mut flow_run_ids = Vec::new();
	for (name, value) in &selection.arguments {
		if name != "input" {
			continue;
		}
		match value {
			Value::Object(obj) => {
				if let Some(Value::List(logs)) = obj.get("logs") {
					for log in logs {
						if let Value::Object(log_obj) = log {
							let (entities, ids) = entities_and_ids_from_object(log_obj, variables);
							if let Some(pos) = entities.iter().position(|e| e == "flow_run") {
								flow_run_ids.push(ids[pos].clone());
							}
						}
					}
				} else if let Some(Value::Variable(var)) = obj.get("logs")
					&& let Some(logs) = variables.get(var).and_then(JsonValue::as_array)
				{
					collect_flow_run_ids_from_json(logs, &mut flow_run_ids);
				}
			}
			Value::Variable(var) => {
				if let Some(logs) = variables
					.get(var)
					.and_then(JsonValue::as_object)
					.and_then(|o| o.get("logs"))
					.and_then(JsonValue::as_array)
				{
					collect_flow_run_ids_from_json(logs, &mut flow_run_ids);
				}
			}
			_ => {}
		}
	}
	flow_run_ids
}

/// Extracts `(entity, id)` pairs from the `input.states` list of a
/// `*_states` mutation selection (e.g. `set_flow_run_states`), one pair per
/// `*_id` field found in each list element.
pub fn entities_and_ids_from_states(selection: &Field, variables: &Variables) -> (Vec<String>, Vec<String>) {
	let mut entities = Vec::new();
	let mut ids = Vec::new();
	for (name, value) in &selection.arguments {
		if name != "input" {
			continue;
		}
		let states = match value {
			Value::Object(obj) => obj.get("states"),
			_ => None,
		};
		match states {
			Some(Value::List(items)) => {
				for item in items {
					if let Value::Object(obj) = item {
						let (e, i) = entities_and_ids_from_object(obj, variables);
						entities.extend(e);
						ids.extend(i);
					}
				}
			}
			Some(Value::Variable(var)) => {
				if let Some(items) = variables.get(var).and_then(JsonValue::as_array) {
					for item in items {
						if let Some(obj) = item.as_object() {
							for (name, value) in obj {
								let Some(entity) = name.strip_suffix("_id") else {
									continue;
								};
								if let Some(id) = json_as_id_string(value) {
									entities.push(entity.to_string());
									ids.push(id);
								}
							}
						}
					}
				}
			}
			_ => {}
		}
	}
	(entities, ids)
}

fn collect_flow_run_ids_from_json(logs: &[JsonValue], out: &mut Vec<String>) {
	for log in logs {
		if let Some(id) = log.get("flow_run_id").and_then(json_as_id_string) {
			out.push(id);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gql::test_support::first_field;
	use serde_json::json;

	#[test]
	fn bare_id_field_is_ignored() {
		let mut obj = BTreeMap::new();
		obj.insert("id".to_string(), Value::String("x".into()));
		obj.insert("task_id".to_string(), Value::String("abc".into()));
		let (entities, ids) = entities_and_ids_from_object(&obj, &Variables::new());
		assert_eq!(entities, vec!["task".to_string()]);
		assert_eq!(ids, vec!["abc".to_string()]);
	}

	#[test]
	fn entity_id_from_variables_shortcircuits() {
		let mut variables = Variables::new();
		variables.insert("task_id".to_string(), json!("123"));
		let selection = first_field("query { task_by_pk { id } }");
		assert_eq!(entity_id("task", &selection, &variables, false), Some("123".into()));
	}

	#[test]
	fn entity_id_from_where_and_preserves_other_clauses() {
		let selection = first_field(r#"query { flow_run(where: {_and: [{flow_id: {_eq: "f1"}}, {name: {_eq: "x"}}]}) { id } }"#);
		assert_eq!(
			entity_id("flow", &selection, &Variables::new(), false),
			Some("f1".into())
		);
	}

	#[test]
	fn entity_id_from_where_variable_unwraps_eq() {
		let mut variables = Variables::new();
		variables.insert("where".to_string(), json!({"task_id": {"_eq": "abc"}}));
		let selection = first_field("query TaskRuns($where: task_run_bool_exp) { task_run(where: $where) { id } }");
		assert_eq!(entity_id("task", &selection, &variables, false), Some("abc".into()));
	}

	#[test]
	fn entities_and_ids_from_states_collects_each_element() {
		let selection = first_field(
			r#"mutation { set_flow_run_states(input: {states: [{flow_run_id: "a", state: "X"}, {flow_run_id: "b", state: "Y"}]}) { id } }"#,
		);
		let (entities, ids) = entities_and_ids_from_states(&selection, &Variables::new());
		assert_eq!(entities, vec!["flow_run".to_string(), "flow_run".to_string()]);
		assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
	}

	#[test]
	fn flow_run_ids_from_write_inline_list() {
		let selection = first_field(
			r#"mutation { write_run_logs(input: {logs: [{flow_run_id: "a", message: "x"}, {flow_run_id: "b", message: "y"}]}) { id } }"#,
		);
		assert_eq!(
			flow_run_ids_from_write(&selection, &Variables::new()),
			vec!["a".to_string(), "b".to_string()]
		);
	}
}
