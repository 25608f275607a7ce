//! Integration tests for schema compilation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use schema_roles::{
    properties, ArrayField, CompileContext, Deferred, DictField, Document, DocumentField,
    DocumentRef, DocumentRegistry, DocumentTarget, Field, FieldRef, NumberField, SchemaError,
    SchemaOptions, StringField, Var, Walker, DRAFT4_SCHEMA_URI,
};
use serde_json::{json, Value};

fn user() -> DocumentRef {
    Document::builder("User")
        .field(
            "id",
            Var::new().when("response", NumberField::integer().required(true).into_ref()),
        )
        .field("login", StringField::new().required(true))
        .build()
        .unwrap()
}

fn task(user: &DocumentRef) -> DocumentRef {
    Document::builder("Task")
        .title("Task")
        .description("A task.")
        .definition_id("task")
        .field(
            "id",
            NumberField::integer().required(Var::new().when("response", true)),
        )
        .field("name", StringField::new().required(true).min_length(5))
        .field(
            "type",
            StringField::new()
                .required(true)
                .enum_values(vec![json!("TYPE_1"), json!("TYPE_2")]),
        )
        .field("created_at", StringField::date_time().required(true))
        .field(
            "author",
            Var::new()
                .when("response", DocumentField::new(user.clone()).into_ref())
                .pass_down(["response"]),
        )
        .build()
        .unwrap()
}

fn contains(fields: &[FieldRef], field: &FieldRef) -> bool {
    fields.iter().any(|f| Arc::ptr_eq(f, field))
}

// === Role Resolution ===

mod roles {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_role() {
        let task = task(&user());
        let schema = task.get_schema(&SchemaOptions::new()).unwrap();
        assert_eq!(
            schema,
            json!({
                "$schema": DRAFT4_SCHEMA_URI,
                "type": "object",
                "title": "Task",
                "description": "A task.",
                "additionalProperties": false,
                "properties": {
                    "id": { "type": "integer" },
                    "name": { "type": "string", "minLength": 5 },
                    "type": { "type": "string", "enum": ["TYPE_1", "TYPE_2"] },
                    "created_at": { "type": "string", "format": "date-time" }
                },
                "required": ["name", "type", "created_at"]
            })
        );
    }

    #[test]
    fn response_role_passes_down_into_author() {
        let task = task(&user());
        let schema = task
            .get_schema(&SchemaOptions::new().role("response"))
            .unwrap();
        assert_eq!(schema["required"], json!(["id", "name", "type", "created_at"]));
        assert_eq!(
            schema["properties"]["author"],
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "id": { "type": "integer" },
                    "login": { "type": "string" }
                },
                "required": ["id", "login"]
            })
        );
    }

    #[test]
    fn unknown_role_behaves_like_default() {
        let task = task(&user());
        let default = task.get_schema(&SchemaOptions::new()).unwrap();
        let other = task
            .get_schema(&SchemaOptions::new().role("request"))
            .unwrap();
        assert_eq!(default, other);
    }

    #[test]
    fn end_to_end_example() {
        let document = Document::builder("Item")
            .field("name", StringField::new().required(true).min_length(5))
            .field(
                "tag",
                StringField::new().enum_values(vec![json!("X"), json!("Y")]),
            )
            .build()
            .unwrap();
        let mut schema = document.get_schema(&SchemaOptions::new()).unwrap();
        schema.as_object_mut().unwrap().remove("$schema");
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "name": { "type": "string", "minLength": 5 },
                    "tag": { "type": "string", "enum": ["X", "Y"] }
                },
                "required": ["name"]
            })
        );
    }
}

// === Walking ===

mod walking {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Fixture {
        a: DocumentRef,
        a_id: FieldRef,
        a_b: FieldRef,
        b_name_response: FieldRef,
        b_name_request: FieldRef,
    }

    fn fixture() -> Fixture {
        let b_name_response = StringField::new().required(true).into_ref();
        let b_name_request = StringField::new().into_ref();
        let b = Document::builder("B")
            .field(
                "name",
                Var::new()
                    .when("response", b_name_response.clone())
                    .when("request", b_name_request.clone()),
            )
            .build()
            .unwrap();

        let a_id = StringField::new().required(true).into_ref();
        let a_b = DocumentField::new(b).into_ref();
        let a = Document::builder("A")
            .field("id", Var::new().when("response", a_id.clone()))
            .field("b", a_b.clone())
            .build()
            .unwrap();

        Fixture {
            a,
            a_id,
            a_b,
            b_name_response,
            b_name_request,
        }
    }

    #[test]
    fn iter_fields_of_document_reference() {
        let fx = fixture();
        let field = DocumentField::new(fx.a.clone());
        let ctx = CompileContext::default();

        let fields: Vec<FieldRef> = field
            .iter_fields(&ctx, "default")
            .unwrap()
            .into_iter()
            .map(|(f, _)| f)
            .collect();
        assert_eq!(fields.len(), 1);
        assert!(contains(&fields, &fx.a_b));

        let fields: Vec<FieldRef> = field
            .iter_fields(&ctx, "response")
            .unwrap()
            .into_iter()
            .map(|(f, _)| f)
            .collect();
        assert_eq!(fields.len(), 2);
        assert!(contains(&fields, &fx.a_id));
        assert!(contains(&fields, &fx.a_b));
    }

    #[test]
    fn walk_without_expansion_stops_at_reference() {
        let fx = fixture();
        let field = DocumentField::new(fx.a.clone()).into_ref();
        let fields = Walker::new(CompileContext::default())
            .walk(&field, "default")
            .unwrap();
        assert_eq!(fields.len(), 1);
        assert!(Arc::ptr_eq(&fields[0], &field));
    }

    #[test]
    fn walk_through_document_fields() {
        let fx = fixture();
        let field = DocumentField::new(fx.a.clone()).into_ref();
        let walker = Walker::new(CompileContext::default()).through_document_fields(true);

        let fields = walker.walk(&field, "default").unwrap();
        assert_eq!(fields.len(), 2);
        assert!(contains(&fields, &field));
        assert!(contains(&fields, &fx.a_b));

        let fields = walker.walk(&field, "response").unwrap();
        assert_eq!(fields.len(), 4);
        for expected in [&field, &fx.a_b, &fx.a_id, &fx.b_name_response] {
            assert!(contains(&fields, expected));
        }

        let fields = walker.walk(&field, "request").unwrap();
        assert_eq!(fields.len(), 3);
        for expected in [&field, &fx.a_b, &fx.b_name_request] {
            assert!(contains(&fields, expected));
        }
    }
}

// === Recursive Documents ===

mod recursion {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mutual() -> (DocumentRef, DocumentRef, DocumentRegistry) {
        let a = Document::builder("A")
            .field("id", StringField::new().required(true))
            .field("b", DocumentField::named("B"))
            .build()
            .unwrap();
        let b = Document::builder("B")
            .field("id", StringField::new().required(true))
            .field("a", DocumentField::named("A"))
            .build()
            .unwrap();
        let mut registry = DocumentRegistry::new();
        registry.register(&a).register(&b);
        (a, b, registry)
    }

    #[test]
    fn self_reference_is_finite() {
        let node = Document::builder("A")
            .field("id", NumberField::integer().required(true))
            .field("next", DocumentField::recursive())
            .build()
            .unwrap();
        let schema = node.get_schema(&SchemaOptions::new()).unwrap();
        assert_eq!(schema["$ref"], json!("#/definitions/A"));
        assert_eq!(
            schema["definitions"]["A"]["properties"]["next"],
            json!({ "$ref": "#/definitions/A" })
        );
        assert_eq!(schema["definitions"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn mutual_references_via_registry() {
        let (a, _b, registry) = mutual();
        let schema = a
            .get_schema(&SchemaOptions::new().resolver(&registry))
            .unwrap();
        assert_eq!(
            schema,
            json!({
                "$schema": DRAFT4_SCHEMA_URI,
                "$ref": "#/definitions/A",
                "definitions": {
                    "A": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {
                            "id": { "type": "string" },
                            "b": { "$ref": "#/definitions/B" }
                        },
                        "required": ["id"]
                    },
                    "B": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {
                            "id": { "type": "string" },
                            "a": { "$ref": "#/definitions/A" }
                        },
                        "required": ["id"]
                    }
                }
            })
        );
    }

    #[test]
    fn named_reference_requires_resolver() {
        let (a, _b, _registry) = mutual();
        let err = a.get_schema(&SchemaOptions::new()).unwrap_err();
        assert!(matches!(err, SchemaError::NoResolver { name } if name == "B"));
    }

    #[test]
    fn closure_resolver() {
        let (a, b, _registry) = mutual();
        let resolver = move |name: &str| match name {
            "B" => Some(b.clone()),
            _ => None,
        };
        // "A" is missing from this resolver, so compiling B's back reference fails.
        let err = a
            .get_schema(&SchemaOptions::new().resolver(&resolver))
            .unwrap_err();
        assert!(matches!(err, SchemaError::DocumentNotFound { name } if name == "A"));
    }

    #[test]
    fn recursive_schema_validates_instances() {
        let (a, _b, registry) = mutual();
        let schema = a
            .get_schema(&SchemaOptions::new().resolver(&registry))
            .unwrap();
        let validator = jsonschema::validator_for(&schema).unwrap();

        assert!(validator.is_valid(&json!({ "id": "1", "b": { "id": "2", "a": { "id": "3" } } })));
        assert!(!validator.is_valid(&json!({ "id": "1", "b": { "a": { "id": "3" } } })));
        assert!(!validator.is_valid(&json!({ "id": "1", "extra": true })));
    }
}

// === Resolution Scope ===

mod scoping {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn refs_anchor_at_base_under_nested_ids() {
        let node = Document::builder("Node")
            .field("value", NumberField::integer())
            .field("next", DocumentField::recursive())
            .build()
            .unwrap();
        let deeper = DictField::new()
            .id("deeper/inner.json")
            .properties(properties([("node", DocumentField::new(node.clone()))]));
        let meta = DictField::new().id("meta.json").properties(properties([
            ("node", DocumentField::new(node.clone()).into_ref()),
            ("deeper", deeper.into_ref()),
        ]));
        let task = Document::builder("Task")
            .id("http://example.com/task.json")
            .field("root_node", DocumentField::new(node))
            .field("meta", meta)
            .build()
            .unwrap();

        let schema = task.get_schema(&SchemaOptions::new()).unwrap();
        let absolute = json!({ "$ref": "http://example.com/task.json#/definitions/Node" });

        assert_eq!(schema["id"], json!("http://example.com/task.json"));
        assert_eq!(
            schema["properties"]["root_node"],
            json!({ "$ref": "#/definitions/Node" })
        );
        assert_eq!(schema["properties"]["meta"]["id"], json!("meta.json"));
        assert_eq!(schema["properties"]["meta"]["properties"]["node"], absolute);
        assert_eq!(
            schema["properties"]["meta"]["properties"]["deeper"]["properties"]["node"],
            absolute
        );
        assert!(schema["definitions"].get("Node").is_some());
    }

    #[test]
    fn nested_document_ids_anchor_refs_at_base() {
        let node = Document::builder("Node")
            .field("value", NumberField::integer())
            .field("next", DocumentField::recursive())
            .build()
            .unwrap();
        let grand = Document::builder("Grand")
            .id("nested/grand.json")
            .field("node", DocumentField::new(node.clone()))
            .build()
            .unwrap();
        let child = Document::builder("Child")
            .id("child.json")
            .field("node", DocumentField::new(node.clone()))
            .field("grand", DocumentField::new(grand))
            .build()
            .unwrap();
        let root = Document::builder("Root")
            .id("http://example.com/root.json")
            .field("node", DocumentField::new(node))
            .field("child", DocumentField::new(child))
            .build()
            .unwrap();

        let schema = root.get_schema(&SchemaOptions::new()).unwrap();
        let absolute = json!({ "$ref": "http://example.com/root.json#/definitions/Node" });
        let child = &schema["properties"]["child"];
        let grand = &child["properties"]["grand"];

        assert_eq!(schema["id"], json!("http://example.com/root.json"));
        assert_eq!(
            schema["properties"]["node"],
            json!({ "$ref": "#/definitions/Node" })
        );
        assert_eq!(child["id"], json!("child.json"));
        assert_eq!(child["properties"]["node"], absolute);
        assert_eq!(grand["id"], json!("nested/grand.json"));
        assert_eq!(grand["properties"]["node"], absolute);
        assert!(child.get("$schema").is_none());
        assert!(child.get("definitions").is_none());
        assert!(schema["definitions"].get("Node").is_some());
    }
}

// === Output Shape ===

mod output {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ordered_output_lists_conventional_keys_first() {
        let task = task(&user());
        let schema = task
            .get_schema(&SchemaOptions::new().ordered(true))
            .unwrap();
        let keys: Vec<&String> = schema.as_object().unwrap().keys().collect();
        assert_eq!(&keys[..4], ["$schema", "type", "title", "description"]);

        let name: Vec<&String> = schema["properties"]["name"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(name, ["type", "minLength"]);
    }

    #[test]
    fn ordered_output_puts_definitions_last() {
        let node = Document::builder("Node")
            .field("next", DocumentField::recursive())
            .build()
            .unwrap();
        let schema = node
            .get_schema(&SchemaOptions::new().ordered(true))
            .unwrap();
        let keys: Vec<&String> = schema.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["$schema", "$ref", "definitions"]);
    }

    #[test]
    fn ordering_does_not_change_content() {
        let task = task(&user());
        for role in ["default", "response"] {
            let ordered = task
                .get_schema(&SchemaOptions::new().role(role).ordered(true))
                .unwrap();
            let unordered = task.get_schema(&SchemaOptions::new().role(role)).unwrap();
            assert_eq!(ordered, unordered);
        }
    }

    #[test]
    fn absent_document_field_compiles_to_empty_schema() {
        let field = DocumentField::new(Var::new().when("response", DocumentTarget::from(user())));
        assert_eq!(field.get_schema(&SchemaOptions::new()).unwrap(), json!({}));
    }

    #[test]
    fn array_of_documents() {
        let field = ArrayField::new(DocumentField::new(user()).as_ref(true)).min_items(1);
        let schema = field.get_schema(&SchemaOptions::new()).unwrap();
        assert_eq!(schema["items"], json!({ "$ref": "#/definitions/User" }));
        assert_eq!(schema["minItems"], json!(1));
        assert_eq!(schema["definitions"]["User"]["required"], json!(["login"]));
    }
}

// === Compilation Properties ===

mod properties_of_compilation {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compilation_is_idempotent() {
        let task = task(&user());
        for role in ["default", "response", "request"] {
            let options = SchemaOptions::new().role(role);
            let first = task.get_schema(&options).unwrap();
            let second = task.get_schema(&options).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn producers_run_at_compile_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let field = StringField::new().default(Deferred::lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Value::from("generated")
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let schema = field.get_schema(&SchemaOptions::new()).unwrap();
        assert_eq!(schema["default"], json!("generated"));
        field.get_schema(&SchemaOptions::new()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_compilation_matches_sequential() {
        let task = task(&user());
        let roles = ["default", "response", "request"];
        let expected: Vec<Value> = roles
            .iter()
            .map(|role| task.get_schema(&SchemaOptions::new().role(*role)).unwrap())
            .collect();

        std::thread::scope(|s| {
            let handles: Vec<_> = roles
                .iter()
                .map(|role| {
                    let task = &task;
                    s.spawn(move || task.get_schema(&SchemaOptions::new().role(*role)).unwrap())
                })
                .collect();
            for (handle, expected) in handles.into_iter().zip(&expected) {
                assert_eq!(&handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn compiled_schema_validates_instances() {
        let task = task(&user());
        let request = task.get_schema(&SchemaOptions::new()).unwrap();
        let response = task
            .get_schema(&SchemaOptions::new().role("response"))
            .unwrap();
        let request = jsonschema::validator_for(&request).unwrap();
        let response = jsonschema::validator_for(&response).unwrap();

        let created = json!({
            "name": "write tests",
            "type": "TYPE_1",
            "created_at": "2024-01-01T00:00:00Z"
        });
        assert!(request.is_valid(&created));
        assert!(!response.is_valid(&created));

        let returned = json!({
            "id": 7,
            "name": "write tests",
            "type": "TYPE_2",
            "created_at": "2024-01-01T00:00:00Z",
            "author": { "id": 1, "login": "ann" }
        });
        assert!(response.is_valid(&returned));
        assert!(!request.is_valid(&returned));
        assert!(!request.is_valid(&json!({
            "name": "tiny",
            "type": "TYPE_1",
            "created_at": "2024-01-01T00:00:00Z"
        })));
    }
}
