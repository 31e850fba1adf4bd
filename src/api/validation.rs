use actix_web::{HttpResponse, error::InternalError};
use serde::Serialize;
use validator::ValidationErrors;

/// Error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

fn bad_request(error: &str, fields: serde_json::Map<String, serde_json::Value>) -> actix_web::Error {
    InternalError::from_response(
        "",
        HttpResponse::BadRequest().json(ErrorResponse {
            error: error.to_string(),
            fields: serde_json::Value::Object(fields),
        }),
    )
    .into()
}

/// One `{field: {errors: [...]}}` entry per invalid field
fn field_errors(errors: &ValidationErrors) -> serde_json::Map<String, serde_json::Value> {
    let mut fields = serde_json::Map::new();
    for (field, errors) in errors.field_errors() {
        let messages: Vec<String> = errors
            .iter()
            .map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Validation error in field: {}", field))
            })
            .collect();
        fields.insert(field.to_string(), serde_json::json!({ "errors": messages }));
    }
    fields
}

/// Maps a deserialization message to something a client can act on
fn describe_body_error(message: &str) -> String {
    if message.contains("EOF while parsing") {
        "Request body is empty. Expected JSON payload".to_string()
    } else if message.contains("unknown variant") {
        // serde lists the allowed values after "expected"
        match message.split_once("expected") {
            Some((_, allowed)) => format!("Invalid enum value, expected{}", allowed),
            None => "Invalid enum value. Check allowed values for this field".to_string(),
        }
    } else if message.contains("missing field") {
        message.to_string()
    } else {
        "Invalid JSON format".to_string()
    }
}

fn to_response(err: actix_web_validator::Error, context: &str) -> actix_web::Error {
    match err {
        actix_web_validator::Error::Validate(errors) => {
            bad_request("Validation failed", field_errors(&errors))
        }
        actix_web_validator::Error::Deserialize(de_err) => {
            let mut fields = serde_json::Map::new();
            fields.insert(
                "message".to_string(),
                serde_json::json!(describe_body_error(&de_err.to_string())),
            );
            bad_request("Request validation failed", fields)
        }
        other => {
            let mut fields = serde_json::Map::new();
            fields.insert(
                "message".to_string(),
                serde_json::json!(format!("Invalid {}: {}", context, other)),
            );
            bad_request("Validation failed", fields)
        }
    }
}

/// JSON body extraction with the shared error body
pub fn json_config() -> actix_web_validator::JsonConfig {
    actix_web_validator::JsonConfig::default().error_handler(|err, _req| to_response(err, "body"))
}

/// Query string extraction with the shared error body
pub fn query_config() -> actix_web_validator::QueryConfig {
    actix_web_validator::QueryConfig::default()
        .error_handler(|err, _req| to_response(err, "query string"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_errors_list_allowed_values() {
        let message = "unknown variant `monster`, expected one of `indeed`, `linkedin` at line 1";
        assert!(describe_body_error(message).contains("`indeed`"));
        assert_eq!(
            describe_body_error("EOF while parsing a value at line 1 column 0"),
            "Request body is empty. Expected JSON payload"
        );
    }
}
