use axum::{
    response::{Html, Redirect},
    Json,
};
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn redirect_to_docs() -> Redirect {
    Redirect::temporary("/docs")
}

pub async fn docs_page() -> Html<&'static str> {
    Html(DOCS_HTML)
}

pub async fn openapi_document() -> Json<Value> {
    Json(openapi())
}

const DOCS_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>transcribe-service</title>
  <style>
    body { font-family: sans-serif; max-width: 48rem; margin: 2rem auto; line-height: 1.5; }
    code, pre { background: #f4f4f4; padding: 0.1rem 0.3rem; }
    pre { padding: 0.8rem; overflow-x: auto; }
  </style>
</head>
<body>
  <h1>transcribe-service</h1>
  <p>Batch speech transcription with word-level timestamps.</p>

  <h2><code>POST /transcribe</code></h2>
  <p>Multipart form upload. Attach one or more audio or video files under the
  <code>files</code> field. Results come back in upload order, times in seconds.</p>
  <pre>curl -F files=@first.mp3 -F files=@second.wav http://localhost:8080/transcribe</pre>
  <pre>{
  "results": [
    {
      "filename": "first.mp3",
      "language": "en",
      "transcript": [
        { "start": 0.52, "end": 1.9, "text": "Hello there.",
          "words": [ { "word": "Hello", "start": 0.52, "end": 0.88, "score": 0.97 } ] }
      ]
    }
  ]
}</pre>
  <p>With the <code>partial</code> failure policy a failed file is reported as
  <code>{ "filename": ..., "error": { "kind": ..., "message": ... } }</code>.</p>

  <h3>Errors</h3>
  <ul>
    <li><code>400</code> no files, malformed body, unreadable upload</li>
    <li><code>413</code> body over the configured upload limit</li>
    <li><code>422</code> transcription or alignment failure, unsupported language</li>
    <li><code>504</code> file or batch timeout</li>
    <li><code>500</code> resource or internal failure</li>
  </ul>

  <h2><code>GET /health</code></h2>
  <p>Liveness check, returns <code>{ "status": "ok" }</code>.</p>

  <p>Machine-readable description: <a href="/openapi.json">/openapi.json</a></p>
</body>
</html>
"#;

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/Error" }
            }
        }
    })
}

fn openapi() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "transcribe-service",
            "description": "Batch speech transcription with word-level alignment.",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/transcribe": transcribe_operation(),
            "/health": {
                "get": {
                    "summary": "Liveness check",
                    "responses": {
                        "200": {
                            "description": "Service is up",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": { "status": { "type": "string" } }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "/docs": {
                "get": {
                    "summary": "Human-readable API documentation",
                    "responses": { "200": { "description": "HTML page" } }
                }
            },
            "/": {
                "get": {
                    "summary": "Redirect to /docs",
                    "responses": { "307": { "description": "Temporary redirect" } }
                }
            }
        },
        "components": { "schemas": schemas() }
    })
}

fn transcribe_operation() -> Value {
    json!({
        "post": {
            "summary": "Transcribe and align a batch of audio files",
            "requestBody": {
                "required": true,
                "content": {
                    "multipart/form-data": {
                        "schema": {
                            "type": "object",
                            "properties": {
                                "files": {
                                    "type": "array",
                                    "items": { "type": "string", "format": "binary" }
                                }
                            },
                            "required": ["files"]
                        }
                    }
                }
            },
            "responses": {
                "200": {
                    "description": "Per-file results in upload order",
                    "content": {
                        "application/json": {
                            "schema": { "$ref": "#/components/schemas/TranscribeResponse" }
                        }
                    }
                },
                "400": error_response("No files, malformed body or unreadable upload"),
                "413": error_response("Upload limit exceeded"),
                "422": error_response("Transcription or alignment failed"),
                "500": error_response("Resource or internal failure"),
                "504": error_response("File or batch timeout"),
            }
        }
    })
}

fn schemas() -> Value {
    json!({
        "Error": {
            "type": "object",
            "properties": { "error": { "type": "string" } }
        },
        "Word": {
            "type": "object",
            "properties": {
                "word": { "type": "string" },
                "start": { "type": "number" },
                "end": { "type": "number" },
                "score": { "type": "number" }
            }
        },
        "Segment": {
            "type": "object",
            "properties": {
                "start": { "type": "number" },
                "end": { "type": "number" },
                "text": { "type": "string" },
                "words": {
                    "type": "array",
                    "items": { "$ref": "#/components/schemas/Word" }
                }
            }
        },
        "FileResult": {
            "type": "object",
            "properties": {
                "filename": { "type": "string" },
                "language": { "type": "string" },
                "transcript": {
                    "type": "array",
                    "items": { "$ref": "#/components/schemas/Segment" }
                },
                "error": {
                    "type": "object",
                    "properties": {
                        "kind": { "type": "string" },
                        "message": { "type": "string" }
                    }
                }
            }
        },
        "TranscribeResponse": {
            "type": "object",
            "properties": {
                "results": {
                    "type": "array",
                    "items": { "$ref": "#/components/schemas/FileResult" }
                }
            }
        }
    })
}
