//! OpenAPI 3.0.3 description of the HTTP surface

use axum::Json;
use serde_json::{json, Value};

/// GET /openapi.json
pub async fn openapi_document() -> Json<Value> {
    Json(document())
}

pub fn document() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Clipcat Clip Catalog API",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/clips": { "get": list_clips_operation() },
            "/clips/{reference}": { "get": get_clip_operation() },
        },
        "components": {
            "schemas": {
                "Clip": clip_schema(),
                "Error": error_schema(),
            },
            "securitySchemes": {
                "BearerAuth": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" },
            },
        },
    })
}

fn json_content(schema: Value) -> Value {
    json!({ "application/json": { "schema": schema } })
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": json_content(json!({ "$ref": "#/components/schemas/Error" })),
    })
}

fn list_clips_operation() -> Value {
    let body = json!({
        "type": "object",
        "properties": {
            "clips": {
                "type": "array",
                "items": { "$ref": "#/components/schemas/Clip" },
            }
        },
    });

    json!({
        "summary": "List clips",
        "security": [{ "BearerAuth": [] }],
        "parameters": [{
            "name": "tag",
            "in": "query",
            "required": false,
            "schema": { "type": "string" },
            "description": "Only clips carrying this tag",
        }],
        "responses": {
            "200": { "description": "Clips in catalog order", "content": json_content(body) },
            "401": error_response("Missing or invalid token"),
        },
    })
}

fn get_clip_operation() -> Value {
    json!({
        "summary": "Get one clip by identifier or name",
        "security": [{ "BearerAuth": [] }],
        "parameters": [{
            "name": "reference",
            "in": "path",
            "required": true,
            "schema": { "type": "string" },
        }],
        "responses": {
            "200": {
                "description": "The clip",
                "content": json_content(json!({ "$ref": "#/components/schemas/Clip" })),
            },
            "401": error_response("Missing or invalid token"),
            "404": error_response("No clip with that identifier or name"),
        },
    })
}

fn clip_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "_id": { "type": "string" },
            "identifier": { "type": "string" },
            "name": { "type": "string" },
            "file_prefix": { "type": "string" },
            "file": { "type": "string" },
            "creation_time": { "type": "string", "format": "date" },
            "tags": { "type": "array", "items": { "type": "string" } },
        },
    })
}

fn error_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "error": {
                "type": "object",
                "properties": {
                    "code": { "type": "string" },
                    "message": { "type": "string" },
                },
            }
        },
    })
}
