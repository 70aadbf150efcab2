//! Tests for db::repository::error module.

use chickerp::db::repository::{ErrorContext, RepositoryError, RepositoryResult};

#[test]
fn test_error_context_new() {
    let ctx = ErrorContext::new("create_bird");
    assert_eq!(ctx.operation, Some("create_bird".to_string()));
    assert!(ctx.entity.is_none());
    assert!(ctx.entity_id.is_none());
    assert!(ctx.field.is_none());
    assert!(ctx.details.is_none());
    assert!(!ctx.retryable);
}

#[test]
fn test_error_context_chaining() {
    let ctx = ErrorContext::new("record_consumption")
        .with_entity("feed inventory")
        .with_entity_id(42)
        .with_field("quantityKg")
        .with_details("stock exhausted")
        .retryable();

    assert_eq!(ctx.operation, Some("record_consumption".to_string()));
    assert_eq!(ctx.entity, Some("feed inventory".to_string()));
    assert_eq!(ctx.entity_id, Some("42".to_string()));
    assert_eq!(ctx.field, Some("quantityKg".to_string()));
    assert_eq!(ctx.details, Some("stock exhausted".to_string()));
    assert!(ctx.retryable);
}

#[test]
fn test_error_context_display() {
    let ctx = ErrorContext::new("update_coop")
        .with_entity("coop")
        .with_entity_id("3")
        .with_field("capacity");

    assert_eq!(
        ctx.to_string(),
        "[operation=update_coop, entity=coop, id=3, field=capacity]"
    );
}

#[test]
fn test_error_context_display_retryable() {
    let ctx = ErrorContext::new("op").retryable();
    assert!(ctx.to_string().contains("retryable=true"));
}

#[test]
fn test_error_context_default_is_empty() {
    let ctx = ErrorContext::default();
    assert_eq!(ctx.to_string(), "[]");
    assert!(!ctx.retryable);
}

#[test]
fn test_repository_error_connection_is_retryable() {
    let err = RepositoryError::connection("pool exhausted");
    assert!(err.to_string().contains("Connection error"));
    assert!(err.to_string().contains("pool exhausted"));
    assert!(err.is_retryable());
}

#[test]
fn test_repository_error_connection_with_context() {
    let ctx = ErrorContext::new("connect").with_entity("database");
    let err = RepositoryError::connection_with_context("failed to connect", ctx);
    let err_str = err.to_string();
    assert!(err_str.contains("failed to connect"));
    assert!(err_str.contains("operation=connect"));
    assert!(err.is_retryable());
}

#[test]
fn test_repository_error_query() {
    let err = RepositoryError::query("syntax error near SELECT");
    assert!(err.to_string().contains("Query error"));
    assert!(!err.is_retryable());
}

#[test]
fn test_not_found_entity_carries_entity_and_id() {
    let err = RepositoryError::not_found_entity("bird", 7);
    assert!(err.is_not_found());
    assert_eq!(err.message(), "bird 7 not found");
    assert_eq!(err.context().entity.as_deref(), Some("bird"));
    assert_eq!(err.context().entity_id.as_deref(), Some("7"));
    assert!(!err.is_retryable());
}

#[test]
fn test_invalid_field_points_at_request_field() {
    let err = RepositoryError::invalid_field("coopId", "coop 'North' is at capacity");
    assert!(matches!(err, RepositoryError::ValidationError { .. }));
    assert_eq!(err.context().field.as_deref(), Some("coopId"));
    assert_eq!(err.message(), "coop 'North' is at capacity");
    assert!(err.to_string().contains("field=coopId"));
}

#[test]
fn test_with_field_overrides_the_field() {
    let err = RepositoryError::validation("duplicate band").with_field("identifiers[0].value");
    assert_eq!(err.context().field.as_deref(), Some("identifiers[0].value"));
}

#[test]
fn test_repository_error_with_operation() {
    let err = RepositoryError::query("error").with_operation("list_birds");
    assert!(err.to_string().contains("operation=list_birds"));
}

#[test]
fn test_other_error_kinds_render_their_prefix() {
    let cases = [
        (RepositoryError::configuration("missing DATABASE_URL"), "Configuration error"),
        (RepositoryError::internal("unexpected state"), "Internal error"),
        (RepositoryError::transaction("commit failed"), "Transaction error"),
    ];
    for (err, prefix) in cases {
        assert!(err.to_string().starts_with(prefix), "{}", err);
        assert!(!err.is_retryable());
        assert!(!err.is_not_found());
    }
}

#[test]
fn test_repository_result() {
    let ok: RepositoryResult<i32> = Ok(42);
    assert_eq!(ok.ok(), Some(42));
    let err: RepositoryResult<i32> = Err(RepositoryError::not_found("egg 1 not found"));
    assert!(err.unwrap_err().is_not_found());
}
