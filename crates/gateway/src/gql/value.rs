use graphql_parser::query::Value as AstValue;
use serde_json::Map as JsonMap;
use serde_json::Value as JsonValue;

/// Variables are transported as a JSON object; some callers embed it as a
/// JSON-encoded string, which must be decoded before the rewriter touches
/// it.
pub type Variables = JsonMap<String, JsonValue>;

pub fn decode_variables(raw: &JsonValue) -> Variables {
	match raw {
		JsonValue::Object(map) => map.clone(),
		JsonValue::String(s) => serde_json::from_str(s).unwrap_or_default(),
		_ => JsonMap::new(),
	}
}

/// Resolve an AST value that is expected to carry a scalar identifier: a
/// literal string, or a variable dereferenced through `variables`.
pub fn resolve_scalar<'a>(value: &AstValue<'a, String>, variables: &Variables) -> Option<String> {
	match value {
		AstValue::String(s) => Some(s.clone()),
		AstValue::Variable(name) => variables.get(name).and_then(json_as_id_string),
		_ => None,
	}
}

/// Ids may be transported as JSON strings or numbers (e.g. bigint primary
/// keys); normalize both to their string form.
pub fn json_as_id_string(value: &JsonValue) -> Option<String> {
	match value {
		JsonValue::String(s) => Some(s.clone()),
		JsonValue::Number(n) => Some(n.to_string()),
		_ => None,
	}
}

/// Walk a JSON `where`-style variable object for a field matching `name`
/// (or, when `loosen`, any key ending in `_id`), returning its `_eq` value.
/// Mirrors the variable-based branch of `get_entity_id` in the upstream
/// service, including the nested `_and` array.
pub fn find_in_where_variable(obj: &JsonMap<String, JsonValue>, name: &str, loosen: bool) -> Option<String> {
	if let Some(and_arr) = obj.get("_and").and_then(JsonValue::as_array) {
		for item in and_arr {
			if let Some(item_obj) = item.as_object()
				&& let Some(found) = find_flat(item_obj, name, loosen)
			{
				return Some(found);
			}
		}
	}
	find_flat(obj, name, loosen)
}

fn find_flat(obj: &JsonMap<String, JsonValue>, name: &str, loosen: bool) -> Option<String> {
	for (key, value) in obj {
		if key == "_and" {
			continue;
		}
		if key == name || (loosen && key.ends_with("_id")) {
			if let Some(eq) = value.get("_eq") {
				return json_as_id_string(eq);
			}
			return json_as_id_string(value);
		}
	}
	None
}
