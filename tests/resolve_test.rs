//! Integration tests for reference resolution and bundling.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tempfile::TempDir;

use openapi_resolver::{
    load_document_str, ComponentCategory, DumpOptions, OpenapiResolver, ResolveError,
    ResolveOptions,
};

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

const OPENAPI: &str = r#"openapi: 3.0.1
info:
  title: Citizens
  version: '1.0'
x-commons:
  common-responses: &common
    default:
      description: Unexpected error
paths:
  /citizens:
    get:
      parameters:
      - $ref: 'parameters/parameters.yaml#/citizen'
      responses:
        '200':
          description: OK
          content:
            application/json:
              schema:
                $ref: 'schemas/person.yaml#/Person'
        <<: *common
"#;

const PARAMETERS: &str = r#"citizen:
  name: citizen
  in: query
  schema:
    $ref: '../schemas/person.yaml#/TaxCode'
"#;

const PERSON: &str = r#"Person:
  type: object
  properties:
    given_name:
      $ref: '#/GivenName'
    tax_code:
      $ref: '#/TaxCode'
GivenName:
  type: string
TaxCode:
  type: string
  pattern: '^[A-Z]{6}$'
"#;

/// Lays out a document split across three files in nested directories.
fn citizens_fixture() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = write_file(dir.path(), "openapi.yaml", OPENAPI);
    write_file(dir.path(), "parameters/parameters.yaml", PARAMETERS);
    write_file(dir.path(), "schemas/person.yaml", PERSON);
    (dir, root)
}

mod local_files {
    use super::*;

    #[test]
    fn relative_references_follow_their_own_file() {
        let (_dir, root) = citizens_fixture();
        let mut resolver =
            OpenapiResolver::from_source(root.to_str().unwrap(), ResolveOptions::new()).unwrap();
        let resolved = resolver.resolve().unwrap().clone();

        let get = &resolved["paths"]["/citizens"]["get"];
        assert_eq!(
            get["parameters"][0],
            json!({"$ref": "#/components/parameters/citizen"})
        );
        assert_eq!(
            get["responses"]["200"]["content"]["application/json"]["schema"],
            json!({"$ref": "#/components/schemas/Person"})
        );
        // Merge key from x-commons was applied before resolution
        assert_eq!(get["responses"]["default"]["description"], "Unexpected error");

        let registry = resolver.registry();
        let person = registry.get(ComponentCategory::Schemas, "Person").unwrap();
        assert_eq!(
            person["properties"]["given_name"]["$ref"],
            "#/components/schemas/GivenName"
        );
        assert_eq!(
            person["properties"]["tax_code"]["$ref"],
            "#/components/schemas/TaxCode"
        );
        let citizen = registry
            .get(ComponentCategory::Parameters, "citizen")
            .unwrap();
        assert_eq!(citizen["schema"]["$ref"], "#/components/schemas/TaxCode");
        assert_eq!(
            registry.get(ComponentCategory::Schemas, "TaxCode"),
            Some(&json!({"type": "string", "pattern": "^[A-Z]{6}$"}))
        );
        assert_eq!(registry.len(), 4);
        assert_eq!(resolver.fetch_count(), 2);
        assert!(resolver.unresolved().is_empty());
    }

    #[test]
    fn dump_is_self_contained() {
        let (_dir, root) = citizens_fixture();
        let mut resolver =
            OpenapiResolver::from_source(root.to_str().unwrap(), ResolveOptions::new()).unwrap();
        resolver.resolve().unwrap();
        let dump = resolver.dump(&DumpOptions::default()).unwrap();

        assert!(dump.starts_with("openapi: 3.0.1\ninfo:\n"));
        assert!(!dump.contains("x-commons"));
        assert!(!dump.contains(".yaml#"));
        assert!(!dump.contains('&'));
        assert!(!dump.contains('*'));

        let reparsed = load_document_str(&dump).unwrap();
        assert_eq!(reparsed, resolver.bundle(&DumpOptions::default()));
        let keys: Vec<&String> = reparsed.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["openapi", "info", "paths", "components"]);
        assert_eq!(
            reparsed["components"]["schemas"]["GivenName"],
            json!({"type": "string"})
        );
    }

    #[test]
    fn missing_relative_file_is_left_in_place() {
        let dir = TempDir::new().unwrap();
        let root = write_file(
            dir.path(),
            "openapi.yaml",
            "openapi: 3.0.1\npaths:\n  /a:\n    get:\n      responses:\n        '200':\n          $ref: 'responses.yaml#/OK'\n",
        );
        let mut resolver =
            OpenapiResolver::from_source(root.to_str().unwrap(), ResolveOptions::new()).unwrap();
        let resolved = resolver.resolve().unwrap().clone();

        assert_eq!(
            resolved["paths"]["/a"]["get"]["responses"]["200"],
            json!({"$ref": "responses.yaml#/OK"})
        );
        let misses = resolver.unresolved();
        assert_eq!(misses.len(), 1);
        assert_eq!(misses[0].path, "/paths/~1a/get/responses/200");
        assert!(misses[0].context.as_deref().unwrap().ends_with("openapi.yaml"));
    }

    #[test]
    fn mutually_referencing_files_fail_with_cycle() {
        let dir = TempDir::new().unwrap();
        let root = write_file(
            dir.path(),
            "openapi.yaml",
            "components:\n  schemas:\n    Node:\n      $ref: 'a.yaml#/A'\n",
        );
        write_file(dir.path(), "a.yaml", "A:\n  properties:\n    b:\n      $ref: 'b.yaml#/B'\n");
        write_file(dir.path(), "b.yaml", "B:\n  properties:\n    a:\n      $ref: 'a.yaml#/A'\n");

        let mut resolver =
            OpenapiResolver::from_source(root.to_str().unwrap(), ResolveOptions::new()).unwrap();
        let err = resolver.resolve().unwrap_err();
        assert!(matches!(err, ResolveError::CycleDetected { .. }));
        assert_eq!(err.reference(), Some("a.yaml#/A"));
    }

    #[test]
    fn missing_fragment_in_existing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let root = write_file(
            dir.path(),
            "openapi.yaml",
            "paths:\n  /a:\n    $ref: 'paths.yaml#/nope'\n",
        );
        write_file(dir.path(), "paths.yaml", "yes: {}\n");

        let mut resolver =
            OpenapiResolver::from_source(root.to_str().unwrap(), ResolveOptions::new()).unwrap();
        let err = resolver.resolve().unwrap_err();
        assert!(matches!(err, ResolveError::LookupFailure { ref path, .. } if path == "/paths/~1a"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn file_scheme_is_rejected() {
        let doc = json!({"components": {"schemas": {"A": {"$ref": "file:///tmp/a.yaml#/A"}}}});
        let mut resolver = OpenapiResolver::new(doc, ResolveOptions::new());
        let err = resolver.resolve().unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedScheme { .. }));
        assert!(err.to_string().contains("/components/schemas/A"));
    }

    #[test]
    fn from_source_missing_file() {
        let result = OpenapiResolver::from_source("/nonexistent/openapi.yaml", ResolveOptions::new());
        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}

mod dumping {
    use super::*;

    #[test]
    fn repeated_local_references_are_not_aliased() {
        let mut paths = serde_json::Map::new();
        for path in ["/organization_list", "/package_list", "/user_list"] {
            paths.insert(
                path.to_string(),
                json!({"get": {
                    "description": "List or search all datasets\n",
                    "responses": {
                        "200": {"$ref": "#/components/responses/CkanResponse"},
                        "400": {"$ref": "#/components/responses/400BadRequest"}
                    },
                    "tags": ["public"]
                }}),
            );
        }
        let doc = json!({
            "openapi": "3.0.1",
            "paths": Value::Object(paths),
            "components": {"responses": {
                "CkanResponse": {"description": "OK"},
                "400BadRequest": {"description": "Bad Request"}
            }}
        });

        let mut resolver = OpenapiResolver::new(doc.clone(), ResolveOptions::new());
        assert_eq!(resolver.resolve().unwrap(), &doc);
        let dump = resolver.dump(&DumpOptions::default()).unwrap();

        assert!(!dump.contains("*id"));
        assert!(!dump.contains('&'));
        assert!(dump.contains("description: |\n        List or search all datasets\n"));
        assert_eq!(load_document_str(&dump).unwrap(), doc);
    }

    #[test]
    fn custom_remove_tags() {
        let doc = json!({"openapi": "3.0.1", "x-commons": {"a": 1}, "x-shared": {"b": 2}});
        let mut resolver = OpenapiResolver::new(doc, ResolveOptions::new());
        resolver.resolve().unwrap();

        let dump = resolver
            .dump(&DumpOptions::remove_tags(["x-shared"]))
            .unwrap();
        assert!(dump.contains("x-commons"));
        assert!(!dump.contains("x-shared"));
    }

    #[test]
    fn sequence_root_is_dumped_directly() {
        let doc = json!([{"name": "sort", "in": "query"}]);
        let mut resolver = OpenapiResolver::new(doc, ResolveOptions::new());
        resolver.resolve().unwrap();
        assert_eq!(
            resolver.dump(&DumpOptions::default()).unwrap(),
            "- name: sort\n  in: query\n"
        );
    }
}

#[cfg(feature = "remote")]
mod remote {
    use super::*;

    const RESPONSES: &str = r#"400BadRequest:
  description: Bad Request
  content:
    application/problem+json:
      schema:
        $ref: '#/schemas/Problem'
429TooManyRequests:
  description: Too many requests
  headers:
    Retry-After:
      $ref: '../headers/headers.yaml#/Retry-After'
  content:
    application/problem+json:
      schema:
        $ref: '#/schemas/Problem'
schemas:
  Problem:
    type: object
    properties:
      detail:
        type: string
        description: |
          A human readable explanation
          specific to this occurrence.
"#;

    const HEADERS: &str = r#"Retry-After:
  description: Seconds to wait
  schema:
    type: integer
    format: int32
"#;

    const PARAMETERS: &str = r#"sort:
  name: sort
  in: query
  description: Sorting order
  schema:
    type: string
    example: +name
"#;

    #[test]
    fn component_response_bundles_nested_schema() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/responses/responses.yaml")
            .with_status(200)
            .with_body(RESPONSES)
            .expect(1)
            .create();

        let doc = json!({
            "openapi": "3.0.1",
            "x-shared": {},
            "components": {"responses": {"400BadRequest": {
                "$ref": format!("{}/responses/responses.yaml#/400BadRequest", server.url())
            }}}
        });
        let mut resolver = OpenapiResolver::new(doc, ResolveOptions::new());
        resolver.resolve().unwrap();
        mock.assert();

        let bundled = resolver.bundle(&DumpOptions::default());
        let response = &bundled["components"]["responses"]["400BadRequest"];
        assert_eq!(
            response["content"]["application/problem+json"]["schema"],
            json!({"$ref": "#/components/schemas/Problem"})
        );
        assert!(bundled["components"]["schemas"]["Problem"].is_object());

        let dump = resolver.dump(&DumpOptions::default()).unwrap();
        assert!(dump.contains("400BadRequest:"));
        assert!(!dump.contains("x-shared"));
        assert!(!dump.contains(&server.url()));
        assert!(dump.contains("description: |\n"));
    }

    #[test]
    fn relative_reference_inside_remote_document() {
        let mut server = mockito::Server::new();
        let _responses = server
            .mock("GET", "/responses/responses.yaml")
            .with_body(RESPONSES)
            .expect(1)
            .create();
        let _headers = server
            .mock("GET", "/headers/headers.yaml")
            .with_body(HEADERS)
            .expect(1)
            .create();

        let doc = json!({"429TooManyRequests": {
            "$ref": format!("{}/responses/responses.yaml#/429TooManyRequests", server.url())
        }});
        let mut resolver = OpenapiResolver::new(doc, ResolveOptions::new());
        let resolved = resolver.resolve().unwrap().clone();

        assert_eq!(
            resolved["429TooManyRequests"]["headers"]["Retry-After"],
            json!({"$ref": "#/components/headers/Retry-After"})
        );
        let registry = resolver.registry();
        assert!(registry.contains(ComponentCategory::Headers, "Retry-After"));
        assert!(registry.contains(ComponentCategory::Schemas, "Problem"));
        assert_eq!(resolver.fetch_count(), 2);
    }

    #[test]
    fn inline_references_in_lists_and_objects() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/parameters/parameters.yaml")
            .with_body(PARAMETERS)
            .expect(1)
            .create();
        let target = format!("{}/parameters/parameters.yaml#/sort", server.url());

        let doc = json!({
            "a": 1,
            "list_of_refs": [{"$ref": target}],
            "object": {"$ref": target}
        });
        let mut resolver = OpenapiResolver::new(doc, ResolveOptions::new());
        let resolved = resolver.resolve().unwrap().clone();
        mock.assert();

        let sort = json!({
            "name": "sort",
            "in": "query",
            "description": "Sorting order",
            "schema": {"type": "string", "example": "+name"}
        });
        assert_eq!(
            resolved,
            json!({"a": 1, "list_of_refs": [sort.clone()], "object": sort})
        );
        assert!(resolver.registry().is_empty());
    }

    #[test]
    fn sequence_root_reference() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/parameters/parameters.yaml")
            .with_body(PARAMETERS)
            .create();
        let doc = json!([{"$ref": format!("{}/parameters/parameters.yaml#/sort", server.url())}]);

        let mut resolver = OpenapiResolver::new(doc, ResolveOptions::new());
        let resolved = resolver.resolve().unwrap();
        assert_eq!(resolved[0]["name"], "sort");
        assert_eq!(resolved[0]["schema"]["example"], "+name");
    }

    #[test]
    fn shared_target_converges_to_one_component() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/parameters/parameters.yaml")
            .with_body(PARAMETERS)
            .expect(1)
            .create();
        let target = format!("{}/parameters/parameters.yaml#/sort", server.url());

        let doc = json!({"paths": {
            "/a": {"get": {"parameters": [{"$ref": target}]}},
            "/b": {"get": {"parameters": [{"$ref": target}]}}
        }});
        let mut resolver = OpenapiResolver::new(doc, ResolveOptions::new());
        let resolved = resolver.resolve().unwrap().clone();
        mock.assert();

        let pointer = json!({"$ref": "#/components/parameters/sort"});
        assert_eq!(resolved["paths"]["/a"]["get"]["parameters"][0], pointer);
        assert_eq!(resolved["paths"]["/b"]["get"]["parameters"][0], pointer);
        assert_eq!(resolver.registry().len(), 1);
    }

    #[test]
    fn http_error_is_a_fetch_failure() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/gone.yaml").with_status(404).create();
        let doc = json!({"schema": {"$ref": format!("{}/gone.yaml#/A", server.url())}});

        let mut resolver = OpenapiResolver::new(doc, ResolveOptions::new());
        let err = resolver.resolve().unwrap_err();
        assert!(matches!(err, ResolveError::FetchFailure { ref path, .. } if path == "/schema"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn remote_source_is_the_initial_context() {
        let mut server = mockito::Server::new();
        let _root = server
            .mock("GET", "/api/openapi.yaml")
            .with_body("openapi: 3.0.1\ncomponents:\n  headers:\n    Retry-After:\n      $ref: '../headers/headers.yaml#/Retry-After'\n")
            .create();
        let _headers = server
            .mock("GET", "/headers/headers.yaml")
            .with_body(HEADERS)
            .create();

        let source = format!("{}/api/openapi.yaml", server.url());
        let mut resolver = OpenapiResolver::from_source(&source, ResolveOptions::new()).unwrap();
        resolver.resolve().unwrap();

        let bundled = resolver.bundle(&DumpOptions::default());
        assert_eq!(
            bundled["components"]["headers"]["Retry-After"]["schema"]["format"],
            "int32"
        );
    }
}
