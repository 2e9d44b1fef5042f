use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::value::Variables;
use super::{classify, entity, extract, inject};
use super::{Definition, Field, OperationDefinition, Selection, Value};
use crate::error::ProxyError;
use crate::oracle::Oracle;

/// A single GraphQL request within a (possibly batched) proxy call.
///
/// `is_tenant_query` is set while rewriting and tells the response filter
/// whether this operation's `tenant` selections need to be pruned to the
/// caller's own memberships once the upstream response comes back.
pub struct Operation {
	pub query: String,
	pub variables: Variables,
	pub is_tenant_query: bool,
}

impl Operation {
	pub fn new(query: String, variables: JsonValue) -> Self {
		Self {
			query,
			variables: super::value::decode_variables(&variables),
			is_tenant_query: false,
		}
	}
}

const PUBLIC_QUERIES: [&str; 4] = ["hello", "reference_data", "api", "__schema"];
const ENTITY_INFO_QUERIES: [&str; 2] = ["mapped_children", "get_task_run_info"];
const INPUT_ID_ACTIONS: [&str; 7] = ["archive", "cancel", "create", "disable", "enable", "get", "register"];

/// Rewrites every operation in `operations` so none of them can read or
/// write another tenant's data, returning whether the batch as a whole may
/// be forwarded upstream. Every operation is parsed and (partially)
/// rewritten even once an earlier one is denied, mirroring the upstream
/// service's behavior of only ever gating the request at the very end.
pub async fn rewrite(mut operations: Vec<Operation>, tenant: Uuid, oracle: &dyn Oracle) -> Result<(bool, Vec<Operation>), ProxyError> {
	let mut allowed = true;
	for operation in &mut operations {
		let mut document = graphql_parser::parse_query(&operation.query)
			.map_err(|err| ProxyError::InvalidQuery(err.to_string()))?
			.into_static();

		for definition in &mut document.definitions {
			match definition {
				Definition::Fragment(_) => continue,
				Definition::Operation(OperationDefinition::Query(query)) => {
					rewrite_query(&mut query.selection_set.items, &mut operation.variables, &mut operation.is_tenant_query, tenant, oracle, &mut allowed).await?;
				}
				Definition::Operation(OperationDefinition::SelectionSet(selection_set)) => {
					rewrite_query(&mut selection_set.items, &mut operation.variables, &mut operation.is_tenant_query, tenant, oracle, &mut allowed).await?;
				}
				Definition::Operation(OperationDefinition::Mutation(mutation)) => {
					rewrite_mutation(&mut mutation.selection_set.items, &mut operation.variables, tenant, oracle, &mut allowed).await?;
				}
				Definition::Operation(OperationDefinition::Subscription(_)) => {
					allowed = false;
				}
			}
		}

		operation.query = document.to_string();
	}
	Ok((allowed, operations))
}

async fn rewrite_query(selections: &mut [Selection], variables: &mut Variables, is_tenant_query: &mut bool, tenant: Uuid, oracle: &dyn Oracle, allowed: &mut bool) -> Result<(), ProxyError> {
	for selection in selections {
		let Selection::Field(field) = selection else {
			continue;
		};
		let name = field.name.clone();

		if PUBLIC_QUERIES.contains(&name.as_str()) {
			continue;
		}

		if ENTITY_INFO_QUERIES.contains(&name.as_str()) {
			let Some(id) = extract::entity_id("task_run", field, variables, false) else {
				*allowed = false;
				break;
			};
			if !oracle.belongs("task_run", &id, tenant).await? {
				*allowed = false;
				break;
			}
			continue;
		}

		if let Some(base) = name.strip_suffix("_by_pk") {
			let (primary, secondary) = if name == "flow_by_pk" { ("flow", Some("flow_group")) } else { (base, None) };
			let Some(id) = extract::entity_id(primary, field, variables, false) else {
				*allowed = false;
				break;
			};
			let mut belongs = oracle.belongs(primary, &id, tenant).await?;
			if !belongs && let Some(secondary) = secondary {
				belongs = oracle.belongs(secondary, &id, tenant).await?;
			}
			if !belongs {
				*allowed = false;
				break;
			}
			continue;
		}

		if name.starts_with("tenant") {
			*is_tenant_query = true;
			ensure_id_selected(field);
			continue;
		}

		inject_tenant_filter(field, variables, tenant);
	}
	Ok(())
}

/// Adds a bare scalar `id` selection to `field` if its selection set doesn't
/// already request one. `tenant*` queries skip `where`-injection entirely, so
/// this is how the response filter guarantees it has an `id` to filter on.
fn ensure_id_selected(field: &mut Field) {
	let already_selected = field.selection_set.items.iter().any(|item| matches!(item, Selection::Field(f) if f.name == "id"));
	if already_selected {
		return;
	}
	field.selection_set.items.push(Selection::Field(id_field()));
}

fn id_field() -> Field {
	let document = graphql_parser::parse_query("{ id }").expect("static query parses").into_static();
	for definition in document.definitions {
		if let Definition::Operation(OperationDefinition::SelectionSet(selection_set)) = definition {
			for item in selection_set.items {
				if let Selection::Field(field) = item {
					return field;
				}
			}
		}
	}
	unreachable!("\"{{ id }}\" always parses to a single field selection")
}

fn inject_tenant_filter(field: &mut Field, variables: &mut Variables, tenant: Uuid) {
	for (arg_name, arg_value) in &mut field.arguments {
		if arg_name.as_str() != "where" {
			continue;
		}
		match arg_value {
			Value::Object(where_obj) => {
				inject::add_tenant_id_to_where_node(where_obj, variables, tenant);
			}
			Value::Variable(var_name) => {
				if let Some(JsonValue::Object(where_obj)) = variables.get_mut(var_name) {
					inject::add_tenant_id_to_where_variable(where_obj, tenant);
				}
			}
			_ => {}
		}
		return;
	}
	field.arguments.push(("where".to_string(), inject::build_where_argument(tenant)));
}

async fn rewrite_mutation(selections: &mut [Selection], variables: &mut Variables, tenant: Uuid, oracle: &dyn Oracle, allowed: &mut bool) -> Result<(), ProxyError> {
	for selection in selections {
		let Selection::Field(field) = selection else {
			continue;
		};
		let (action, raw_entity, _mode) = classify::split_operation_entity_mode(&field.name);

		if classify::is_blocked_entity(&raw_entity) {
			*allowed = false;
			break;
		}

		match action.as_str() {
			"delete" | "set" | "update" if field.name.ends_with("states") => {
				let (entities, ids) = extract::entities_and_ids_from_states(field, variables);
				if !check_all_belong(&entities, &ids, tenant, oracle).await? {
					*allowed = false;
					break;
				}
			}
			"delete" | "set" | "update" => {
				let Some(entity) = entity::canonicalize(&raw_entity) else {
					*allowed = false;
					break;
				};
				let Some(id) = extract::entity_id(entity, field, variables, true) else {
					*allowed = false;
					break;
				};
				if !oracle.belongs(entity, &id, tenant).await? {
					*allowed = false;
					break;
				}
			}
			"insert" => {
				let (entities, ids) = extract::entities_and_ids_from_insert(field, variables);
				if !check_all_belong(&entities, &ids, tenant, oracle).await? {
					*allowed = false;
					break;
				}
			}
			_ if INPUT_ID_ACTIONS.contains(&action.as_str()) => {
				let (entities, ids) = extract::entities_and_ids_from_input(field, variables);
				let canonical: Vec<Option<&'static str>> = entities.iter().map(|e| entity::canonicalize(e)).collect();
				if !check_tenant_or_belongs(&canonical, &ids, tenant, oracle, None).await? {
					*allowed = false;
					break;
				}
			}
			"get_or_create" => {
				let (entities, ids) = extract::entities_and_ids_from_input(field, variables);
				let canonical: Vec<Option<&'static str>> = entities.iter().map(|e| entity::canonicalize(e)).collect();
				if !check_tenant_or_belongs(&canonical, &ids, tenant, oracle, Some("task")).await? {
					*allowed = false;
					break;
				}
			}
			"write" => {
				let flow_run_ids = extract::flow_run_ids_from_write(field, variables);
				let entities = vec!["flow_run".to_string(); flow_run_ids.len()];
				if !check_all_belong(&entities, &flow_run_ids, tenant, oracle).await? {
					*allowed = false;
					break;
				}
			}
			_ => {
				*allowed = false;
				break;
			}
		}
	}
	Ok(())
}

async fn check_all_belong(entities: &[String], ids: &[String], tenant: Uuid, oracle: &dyn Oracle) -> Result<bool, ProxyError> {
	for (entity, id) in entities.iter().zip(ids) {
		if !oracle.belongs(entity, id, tenant).await? {
			return Ok(false);
		}
	}
	Ok(true)
}

/// Shared logic for the `archive`/`cancel`/`create`/.../`get`/`register` and
/// `get_or_create` mutation families: if the input names a tenant directly,
/// compare it to the caller's tenant; otherwise check each referenced entity
/// against the oracle, optionally skipping one canonical entity name (used
/// by `get_or_create` to skip `task`, which may not exist yet).
async fn check_tenant_or_belongs(entities: &[Option<&'static str>], ids: &[String], tenant: Uuid, oracle: &dyn Oracle, skip: Option<&str>) -> Result<bool, ProxyError> {
	if let Some(pos) = entities.iter().position(|e| *e == Some("tenant")) {
		return Ok(ids[pos] == tenant.to_string());
	}
	for (entity, id) in entities.iter().zip(ids) {
		let Some(entity) = entity else {
			return Ok(false);
		};
		if Some(*entity) == skip {
			continue;
		}
		if !oracle.belongs(entity, id, tenant).await? {
			return Ok(false);
		}
	}
	Ok(true)
}
