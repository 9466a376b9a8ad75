//! End-to-end builds of small fixture projects.

use std::fs;
use std::path::Path;

use keel_compiler::{Compiler, CompilerConfig, CompilerError, HttpMethod, Manifest, SchemaDocument};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn fixture() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    write(root, "src/index.ts", "import { App } from \"@keel/runtime\";\nnew App({}).start();\n");
    write(
        root,
        "src/schemas/Car.ts",
        r#"
import { Engine } from "./Engine";
export interface Car {
    model: string;
    year?: number;
    engine: Engine;
}
"#,
    );
    write(root, "src/schemas/Engine.ts", "export interface Engine { hp: number }");
    write(
        root,
        "src/handlers/GetCar.ts",
        r#"
import { GetHandler, HttpMethod, RouteProps } from "@keel/runtime";
import { Ctx } from "../Ctx";
import { Car } from "../schemas/Car";

export const Route: RouteProps = {
    path: "/car/:id",
    permissions: ["car:get"],
};

const getCar: GetHandler<Ctx, Car> = async ({ ctx, req }) => {
    return { data: { model: "Volvo", engine: { hp: 150 } } };
};

export default getCar;
"#,
    );
    write(
        root,
        "src/handlers/PostCar.ts",
        r#"
import { Handler, RouteProps } from "@keel/runtime";
import { Ctx } from "../Ctx";
import { Car } from "../schemas/Car";

export const Route: RouteProps = { path: "/car" };

const postCar: Handler<Ctx, { model: string; tags?: string[] }, Car[]> = async ({ req }) => {
    return { data: [] };
};

export default postCar;
"#,
    );
    write(root, "src/repos/CarRepo.ts", "export default class CarRepo {}");
    write(
        root,
        "src/jobs/Cleanup.ts",
        "export const Job: JobProps = { id: \"cleanup\", afterDelay: \"5s\" };\nexport default async () => {};",
    );
    temp
}

#[test]
fn test_build_writes_all_artifacts() {
    let temp = fixture();
    let root = temp.path();
    let result = Compiler::new(CompilerConfig::for_project(root)).build().unwrap();

    assert_eq!(result.handlers.len(), 2);
    assert_eq!(result.repos.len(), 1);
    assert_eq!(result.jobs.len(), 1);

    let get_car = &result.handlers[0];
    assert_eq!(get_car.name, "GetCar");
    assert_eq!(get_car.method(), Some(HttpMethod::Get));
    assert_eq!(get_car.req_schema, None);
    assert_eq!(get_car.res_schema.as_deref(), Some("GetCar_ResSchema"));

    let post_car = &result.handlers[1];
    assert_eq!(post_car.method(), Some(HttpMethod::Post));
    assert_eq!(post_car.req_schema.as_deref(), Some("PostCar_ReqSchema"));
    assert_eq!(post_car.res_schema.as_deref(), Some("PostCar_ResSchema"));

    let out = root.join(".keel");
    for file in [
        "generatedHandlers.ts",
        "generatedRepos.ts",
        "generatedJobs.ts",
        "start.ts",
        "manifest.json",
        "schemas/schemas.json",
        "schemas/GetCar_ResSchema.ts",
        "schemas/PostCar_ReqSchema.ts",
        "schemas/PostCar_ResSchema.ts",
    ] {
        assert!(out.join(file).is_file(), "missing {}", file);
    }

    let start = fs::read_to_string(out.join("start.ts")).unwrap();
    assert!(start.find("./generatedHandlers").unwrap() < start.find("../src/index").unwrap());

    let document: SchemaDocument =
        serde_json::from_str(&fs::read_to_string(out.join("schemas/schemas.json")).unwrap()).unwrap();
    assert_eq!(document.root.as_deref(), Some("#/definitions/GetCar_ResSchema"));
    assert_eq!(document.definitions["GetCar_ResSchema"]["required"], serde_json::json!(["model", "engine"]));
    assert_eq!(
        document.definitions["GetCar_ResSchema"]["properties"]["engine"]["$ref"],
        "#/definitions/Engine"
    );
    assert_eq!(document.definitions["PostCar_ResSchema"]["type"], "array");
    assert_eq!(document.definitions["PostCar_ReqSchema"]["required"], serde_json::json!(["model"]));

    let manifest: Manifest =
        serde_json::from_str(&fs::read_to_string(out.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest.handlers[0].route.as_ref().unwrap().permissions, vec!["car:get"]);
    assert_eq!(manifest.jobs[0].job.after_delay_ms, Some(5_000));
    assert_eq!(manifest.repos[0].repo_instance_name, "carRepo");
}

#[test]
fn test_rebuild_removes_stale_output() {
    let temp = fixture();
    let root = temp.path();
    let compiler = Compiler::new(CompilerConfig::for_project(root));

    compiler.build().unwrap();
    fs::remove_file(root.join("src/handlers/PostCar.ts")).unwrap();
    compiler.build().unwrap();

    assert!(!root.join(".keel/schemas/PostCar_ReqSchema.ts").exists());
    let handlers = fs::read_to_string(root.join(".keel/generatedHandlers.ts")).unwrap();
    assert!(!handlers.contains("PostCar"));
}

#[test]
fn test_failed_build_keeps_previous_output() {
    let temp = fixture();
    let root = temp.path();
    let compiler = Compiler::new(CompilerConfig::for_project(root));
    compiler.build().unwrap();

    write(root, "src/handlers/GetBroken.ts", "const x = 1;\n");
    let err = compiler.build().unwrap_err();
    assert!(matches!(err, CompilerError::MissingDefaultExport { .. }));
    assert!(root.join(".keel/generatedHandlers.ts").is_file());
}

#[test]
fn test_handlers_sharing_a_name_in_subdirectories_fail() {
    let temp = fixture();
    let root = temp.path();
    let handler = |shape: &str| {
        format!(
            "import {{ GetHandler }} from \"@keel/runtime\";\nconst h: GetHandler<any, {}> = async () => ({{ data: null }});\nexport default h;\n",
            shape
        )
    };
    write(root, "src/handlers/car/GetItem.ts", &handler("{ model: string }"));
    write(root, "src/handlers/boat/GetItem.ts", &handler("{ wheels: number }"));

    let err = Compiler::new(CompilerConfig::for_project(root)).build().unwrap_err();
    match err {
        CompilerError::DuplicateHandlerName { name, first, second } => {
            assert_eq!(name, "GetItem");
            assert!(first.ends_with("boat/GetItem.ts"));
            assert!(second.ends_with("car/GetItem.ts"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!root.join(".keel").exists());
}

#[test]
fn test_strict_mode_rejects_inline_schemas() {
    let temp = fixture();
    let mut config = CompilerConfig::for_project(temp.path());
    config.strict_schemas = true;

    let err = Compiler::new(config).build().unwrap_err();
    match err {
        CompilerError::InvalidSchemaType { file, type_text } => {
            assert!(file.ends_with("PostCar.ts"));
            assert_eq!(type_text, "{ model: string; tags?: string[] }");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_strict_mode_uses_interface_names() {
    let temp = fixture();
    fs::remove_file(temp.path().join("src/handlers/PostCar.ts")).unwrap();
    let mut config = CompilerConfig::for_project(temp.path());
    config.strict_schemas = true;

    let result = Compiler::new(config).build().unwrap();
    assert_eq!(result.handlers[0].res_schema.as_deref(), Some("Car"));
}

#[test]
fn test_exclude_globs_skip_handlers() {
    let temp = fixture();
    let mut config = CompilerConfig::for_project(temp.path());
    config.exclude = vec!["src/handlers/Post*".to_string()];

    let result = Compiler::new(config).build().unwrap();
    assert_eq!(result.handlers.len(), 1);
    assert_eq!(result.handlers[0].name, "GetCar");
}

#[test]
fn test_generate_schemas_from_types_dir() {
    let temp = fixture();
    let root = temp.path();
    let compiler = Compiler::new(CompilerConfig::for_project(root));
    let out_file = root.join("generated/schemas.json");

    let document = compiler.generate_schemas(&root.join("src/schemas"), &out_file).unwrap();

    assert!(out_file.is_file());
    assert!(document.definitions.contains_key("Car"));
    assert!(document.definitions.contains_key("Engine"));
    assert_eq!(document.root.as_deref(), Some("#/definitions/Car"));
}

#[test]
fn test_clean_removes_output() {
    let temp = fixture();
    let compiler = Compiler::new(CompilerConfig::for_project(temp.path()));
    compiler.build().unwrap();
    compiler.clean().unwrap();
    assert!(!temp.path().join(".keel").exists());
}
