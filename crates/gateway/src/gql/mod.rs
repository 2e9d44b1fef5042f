//! The tenant-scoping rewriter: parses each caller-supplied GraphQL
//! operation, decides whether it may be forwarded, and mutates its AST so
//! that, if allowed, it can only touch the caller's own tenant.
pub mod classify;
pub mod entity;
pub mod extract;
pub mod inject;
pub mod rewriter;
pub mod value;

#[cfg(test)]
mod test_support;

pub type Document = graphql_parser::query::Document<'static, String>;
pub type Definition = graphql_parser::query::Definition<'static, String>;
pub type OperationDefinition = graphql_parser::query::OperationDefinition<'static, String>;
pub type Selection = graphql_parser::query::Selection<'static, String>;
pub type Field = graphql_parser::query::Field<'static, String>;
pub type Value = graphql_parser::query::Value<'static, String>;

pub use rewriter::{rewrite, Operation};
