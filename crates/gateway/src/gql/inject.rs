use std::collections::BTreeMap;

use uuid::Uuid;

use super::value::Variables;
use super::Value;
use serde_json::Value as JsonValue;

/// Merges `tenant_id: {_eq: tenant}` into a `where` argument carried as a
/// variable, overwriting any existing `_eq` under `tenant_id`.
pub fn add_tenant_id_to_where_variable(obj: &mut serde_json::Map<String, JsonValue>, tenant: Uuid) {
	let eq = JsonValue::String(tenant.to_string());
	match obj.get_mut("tenant_id") {
		Some(JsonValue::Object(inner)) => {
			inner.insert("_eq".to_string(), eq);
		}
		_ => {
			let mut inner = serde_json::Map::new();
			inner.insert("_eq".to_string(), eq);
			obj.insert("tenant_id".to_string(), JsonValue::Object(inner));
		}
	}
}

/// Merges `tenant_id: {_eq: tenant}` into a `where` argument carried
/// directly as an AST object literal. If the existing `_eq` is itself a
/// variable reference, the tenant id is written into `variables` instead of
/// the AST so the eventual request still carries the right value.
pub fn add_tenant_id_to_where_node(where_obj: &mut BTreeMap<String, Value>, variables: &mut Variables, tenant: Uuid) {
	let tenant_str = tenant.to_string();
	if let Some(Value::Object(inner)) = where_obj.get_mut("tenant_id") {
		match inner.get_mut("_eq") {
			Some(Value::String(s)) => *s = tenant_str,
			Some(Value::Variable(name)) => {
				variables.insert(name.clone(), JsonValue::String(tenant_str));
			}
			_ => {
				inner.insert("_eq".to_string(), Value::String(tenant_str));
			}
		}
		return;
	}
	let mut inner = BTreeMap::new();
	inner.insert("_eq".to_string(), Value::String(tenant_str));
	where_obj.insert("tenant_id".to_string(), Value::Object(inner));
}

/// Builds a brand new `where: {tenant_id: {_eq: tenant}}` argument value for
/// selections that carry no `where` argument at all.
pub fn build_where_argument(tenant: Uuid) -> Value {
	let mut inner = BTreeMap::new();
	inner.insert("_eq".to_string(), Value::String(tenant.to_string()));
	let mut outer = BTreeMap::new();
	outer.insert("tenant_id".to_string(), Value::Object(inner));
	Value::Object(outer)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn where_variable_adds_tenant_when_absent() {
		let mut obj = serde_json::Map::new();
		obj.insert("name".to_string(), json!({"_eq": "x"}));
		let tenant = Uuid::new_v4();
		add_tenant_id_to_where_variable(&mut obj, tenant);
		assert_eq!(obj["tenant_id"]["_eq"], json!(tenant.to_string()));
		assert_eq!(obj["name"]["_eq"], json!("x"));
	}

	#[test]
	fn where_variable_overwrites_existing_tenant() {
		let mut obj = serde_json::Map::new();
		obj.insert("tenant_id".to_string(), json!({"_eq": "someone-else"}));
		let tenant = Uuid::new_v4();
		add_tenant_id_to_where_variable(&mut obj, tenant);
		assert_eq!(obj["tenant_id"]["_eq"], json!(tenant.to_string()));
	}

	#[test]
	fn where_node_adds_tenant_when_absent() {
		let mut obj = BTreeMap::new();
		obj.insert("name".to_string(), Value::String("x".into()));
		let mut variables = Variables::new();
		let tenant = Uuid::new_v4();
		add_tenant_id_to_where_node(&mut obj, &mut variables, tenant);
		match &obj["tenant_id"] {
			Value::Object(inner) => assert_eq!(inner["_eq"], Value::String(tenant.to_string())),
			other => panic!("expected object, got {other:?}"),
		}
	}

	#[test]
	fn where_node_overwrites_variable_eq_in_variables_map() {
		let mut inner = BTreeMap::new();
		inner.insert("_eq".to_string(), Value::Variable("tid".to_string()));
		let mut obj = BTreeMap::new();
		obj.insert("tenant_id".to_string(), Value::Object(inner));
		let mut variables = Variables::new();
		let tenant = Uuid::new_v4();
		add_tenant_id_to_where_node(&mut obj, &mut variables, tenant);
		assert_eq!(variables["tid"], json!(tenant.to_string()));
	}
}
