use std::collections::HashSet;

use bytes::Bytes;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::gql::Operation;
use crate::upstream::UpstreamResponse;

/// Applies [`filter_tenant_queries`] to a raw upstream response if, and only
/// if, the batch contained a tenant-query operation; otherwise the response
/// passes through byte-for-byte. When filtering does run, `Content-Length`
/// is recomputed for the edited body.
pub fn apply(operations: &[Operation], response: UpstreamResponse, caller_tenants: &HashSet<Uuid>) -> UpstreamResponse {
	if !operations.iter().any(|op| op.is_tenant_query) {
		return response;
	}
	let Ok(parsed) = serde_json::from_slice::<JsonValue>(&response.body) else {
		return response;
	};
	let filtered = filter_tenant_queries(operations, parsed, caller_tenants);
	let body = Bytes::from(serde_json::to_vec(&filtered).expect("filtered JSON always serializes"));

	let mut headers = response.headers;
	let content_length = reqwest::header::HeaderValue::from_str(&body.len().to_string()).expect("decimal length is a valid header value");
	headers.insert(reqwest::header::CONTENT_LENGTH, content_length);
	UpstreamResponse {
		status: response.status,
		headers,
		body,
	}
}

/// Prunes `data.tenant[]` entries in `response` down to the tenants the
/// caller actually belongs to, for any operation the rewriter marked as a
/// tenant query. Every other operation's response passes through untouched.
///
/// This proxy's caller only ever learns about a tenant by id through this
/// query, so this is the one place that filters a response body rather than
/// a request; everything else is denied outright before it ever reaches the
/// backend.
pub fn filter_tenant_queries(operations: &[Operation], response: JsonValue, caller_tenants: &HashSet<Uuid>) -> JsonValue {
	if !operations.iter().any(|op| op.is_tenant_query) {
		return response;
	}
	match response {
		JsonValue::Array(items) => {
			let filtered = items
				.into_iter()
				.zip(operations.iter().map(|op| op.is_tenant_query).chain(std::iter::repeat(false)))
				.map(|(item, is_tenant_query)| if is_tenant_query { filter_one(item, caller_tenants) } else { item })
				.collect();
			JsonValue::Array(filtered)
		}
		single => filter_one(single, caller_tenants),
	}
}

fn filter_one(mut response: JsonValue, caller_tenants: &HashSet<Uuid>) -> JsonValue {
	if let Some(tenants) = response.pointer_mut("/data/tenant").and_then(JsonValue::as_array_mut) {
		tenants.retain(|tenant| {
			tenant
				.get("id")
				.and_then(JsonValue::as_str)
				.and_then(|id| Uuid::parse_str(id).ok())
				.is_some_and(|id| caller_tenants.contains(&id))
		});
	}
	response
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn operation(is_tenant_query: bool) -> Operation {
		let mut op = Operation::new("query { tenant { id } }".to_string(), JsonValue::Null);
		op.is_tenant_query = is_tenant_query;
		op
	}

	#[test]
	fn non_tenant_query_passes_through() {
		let response = json!({"data": {"flow": []}});
		let out = filter_tenant_queries(&[operation(false)], response.clone(), &HashSet::new());
		assert_eq!(out, response);
	}

	#[test]
	fn filters_down_to_caller_tenants() {
		let mine = Uuid::new_v4();
		let theirs = Uuid::new_v4();
		let response = json!({"data": {"tenant": [{"id": mine.to_string()}, {"id": theirs.to_string()}]}});
		let mut mine_set = HashSet::new();
		mine_set.insert(mine);
		let out = filter_tenant_queries(&[operation(true)], response, &mine_set);
		let tenants = out["data"]["tenant"].as_array().unwrap();
		assert_eq!(tenants.len(), 1);
		assert_eq!(tenants[0]["id"], json!(mine.to_string()));
	}

	#[test]
	fn filters_each_item_of_a_batch_independently() {
		let mine = Uuid::new_v4();
		let theirs = Uuid::new_v4();
		let response = json!([
			{"data": {"tenant": [{"id": mine.to_string()}, {"id": theirs.to_string()}]}},
			{"data": {"flow": [{"id": "1"}]}}
		]);
		let mut mine_set = HashSet::new();
		mine_set.insert(mine);
		let out = filter_tenant_queries(&[operation(true), operation(false)], response, &mine_set);
		let batch = out.as_array().unwrap();
		assert_eq!(batch[0]["data"]["tenant"].as_array().unwrap().len(), 1);
		assert_eq!(batch[1]["data"]["flow"].as_array().unwrap().len(), 1);
	}

	fn upstream_response(body: JsonValue) -> UpstreamResponse {
		let bytes = Bytes::from(serde_json::to_vec(&body).unwrap());
		let mut headers = reqwest::header::HeaderMap::new();
		headers.insert(
			reqwest::header::CONTENT_LENGTH,
			reqwest::header::HeaderValue::from_str(&bytes.len().to_string()).unwrap(),
		);
		UpstreamResponse {
			status: reqwest::StatusCode::OK,
			headers,
			body: bytes,
		}
	}

	#[test]
	fn apply_passes_through_without_tenant_query() {
		let response = upstream_response(json!({"data": {"flow": []}}));
		let original_len = response.body.len();
		let out = apply(&[operation(false)], response, &HashSet::new());
		assert_eq!(out.body.len(), original_len);
	}

	#[test]
	fn apply_recomputes_content_length_when_filtering() {
		let mine = Uuid::new_v4();
		let theirs = Uuid::new_v4();
		let response = upstream_response(json!({"data": {"tenant": [{"id": mine.to_string()}, {"id": theirs.to_string()}]}}));
		let mut mine_set = HashSet::new();
		mine_set.insert(mine);
		let out = apply(&[operation(true)], response, &mine_set);
		let declared: usize = out.headers.get(reqwest::header::CONTENT_LENGTH).unwrap().to_str().unwrap().parse().unwrap();
		assert_eq!(declared, out.body.len());
		let parsed: JsonValue = serde_json::from_slice(&out.body).unwrap();
		assert_eq!(parsed["data"]["tenant"].as_array().unwrap().len(), 1);
	}
}
