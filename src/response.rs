use std::future::Future;

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Mutating verbs reflected back in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Post,
    Delete,
}

impl Verb {
    fn label(self) -> &'static str {
        match self {
            Verb::Post => "Adding",
            Verb::Delete => "Deleting",
        }
    }
}

fn describe(code: u16) -> Option<&'static str> {
    Some(match code {
        200 => "Success",
        400 => "One or more params missed",
        403 => "Forbidden",
        404 => "Not found",
        409 => "Already exists",
        500 => "Server error",
        _ => return None,
    })
}

/// Uniform response envelope: `{code, description?, method?, <entity>: {...}}`.
///
/// Entity fields are attached only on success. Domain failures are carried in
/// the body; the HTTP status is always 200 OK so callers never see a
/// transport-level error for a domain-level outcome.
#[derive(Debug)]
pub struct ApiResponse {
    code: u16,
    verb: Option<Verb>,
    fields: Vec<(&'static str, Value)>,
}

impl ApiResponse {
    pub fn success(verb: impl Into<Option<Verb>>) -> Self {
        Self {
            code: 200,
            verb: verb.into(),
            fields: Vec::new(),
        }
    }

    pub fn error(err: &ApiError, verb: impl Into<Option<Verb>>) -> Self {
        Self {
            code: err.code(),
            verb: verb.into(),
            fields: Vec::new(),
        }
    }

    pub fn with<T: Serialize>(mut self, key: &'static str, value: &T) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.fields.push((key, value));
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == 200
    }

    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        body.insert("code".into(), Value::from(self.code));
        if let Some(description) = describe(self.code) {
            body.insert("description".into(), Value::from(description));
        }
        if let Some(verb) = self.verb {
            body.insert("method".into(), Value::from(verb.label()));
        }
        if self.is_success() {
            for (key, value) in &self.fields {
                body.insert((*key).into(), value.clone());
            }
        }
        Value::Object(body)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        Json(self.to_value()).into_response()
    }
}

/// Runs a handler body, converting a domain error into its envelope.
pub async fn respond<F>(verb: impl Into<Option<Verb>>, fut: F) -> ApiResponse
where
    F: Future<Output = Result<ApiResponse, ApiError>>,
{
    let verb = verb.into();
    match fut.await {
        Ok(response) => response,
        Err(err) => {
            if let ApiError::Server(inner) = &err {
                tracing::error!(error = %inner, "operation failed");
            }
            ApiResponse::error(&err, verb)
        }
    }
}

/// Error envelope for read endpoints, which carry no method tag.
pub fn fail(err: ApiError) -> ApiResponse {
    if let ApiError::Server(inner) = &err {
        tracing::error!(error = %inner, "operation failed");
    }
    ApiResponse::error(&err, None::<Verb>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_carries_entity_and_method() {
        let body = ApiResponse::success(Verb::Post)
            .with("profession", &json!({"id": 1, "name": "Engineer"}))
            .to_value();
        assert_eq!(body["code"], 200);
        assert_eq!(body["description"], "Success");
        assert_eq!(body["method"], "Adding");
        assert_eq!(body["profession"]["name"], "Engineer");
    }

    #[test]
    fn failure_envelope_drops_entity() {
        let body = ApiResponse::error(&ApiError::Forbidden, Verb::Delete)
            .with("profession", &json!({"id": 1}))
            .to_value();
        assert_eq!(body["code"], 403);
        assert_eq!(body["description"], "Forbidden");
        assert_eq!(body["method"], "Deleting");
        assert!(body.get("profession").is_none());
    }

    #[test]
    fn forbidden_causes_are_indistinguishable() {
        // A bad token and an unprivileged user must produce identical bodies.
        let missing_token = ApiResponse::error(&ApiError::Forbidden, Verb::Post).to_value();
        let unprivileged = ApiResponse::error(&ApiError::Forbidden, Verb::Post).to_value();
        assert_eq!(missing_token, unprivileged);
    }

    #[test]
    fn get_envelope_has_no_method() {
        let body = ApiResponse::success(None::<Verb>).to_value();
        assert_eq!(body["code"], 200);
        assert!(body.get("method").is_none());
    }
}
