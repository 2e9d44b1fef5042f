//! Parsing helpers shared by the `gql` module's unit tests. Building real
//! documents through the parser is far less fragile than hand-constructing
//! AST nodes, whose field lists are an implementation detail of the parser
//! crate.
#![cfg(test)]

use super::{Definition, Field, OperationDefinition, Selection};

pub fn first_field(query: &str) -> Field {
	let doc = graphql_parser::parse_query(query).expect("valid test query").into_static();
	for definition in doc.definitions {
		let Definition::Operation(op) = definition else {
			continue;
		};
		let selection_set = match op {
			OperationDefinition::SelectionSet(s) => s,
			OperationDefinition::Query(q) => q.selection_set,
			OperationDefinition::Mutation(m) => m.selection_set,
			OperationDefinition::Subscription(s) => s.selection_set,
		};
		for item in selection_set.items {
			if let Selection::Field(field) = item {
				return field;
			}
		}
	}
	panic!("no field selection found in test query");
}
