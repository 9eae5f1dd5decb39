//! Built-in DevOps tools
//!
//! `devops_capabilities`, `generate_pipeline` and `generate_k8s_manifest`.
//! Each tool extracts its arguments with serde and validates them itself; the
//! advertised schema mirrors those checks.

use async_trait::async_trait;
use rust_mcp_sdk::schema::CallToolResult;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::domain::utils::{
    normalize_choice, parse_arguments, text_result, validate_dns_label, validate_length,
    validate_range, MAX_DNS_LABEL_LEN,
};
use crate::mcp::registry::{
    PropertySchema, SchemaNode, ToolDescriptor, ToolError, ToolHandler, ToolRegistry,
};

pub const PLATFORMS: [&str; 2] = ["github-actions", "gitlab-ci"];
pub const LANGUAGES: [&str; 4] = ["rust", "node", "python", "go"];
pub const CAPABILITY_AREAS: [&str; 3] = [
    "CI/CD pipeline generation",
    "Kubernetes deployment manifests",
    "Service naming and configuration checks",
];

pub const DEFAULT_REPLICAS: i64 = 2;
pub const MAX_REPLICAS: i64 = 20;
pub const DEFAULT_PORT: i64 = 8080;
pub const MAX_IMAGE_LEN: usize = 255;

pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(capabilities_descriptor());
    registry.register(pipeline_descriptor());
    registry.register(manifest_descriptor());
    registry
}

pub fn capabilities_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "devops_capabilities",
        "Describe the DevOps automation this server offers",
        SchemaNode::object(),
        DevopsCapabilitiesTool,
    )
}

pub fn pipeline_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "generate_pipeline",
        "Generate a CI pipeline definition for a project",
        SchemaNode::object()
            .property(
                "platform",
                PropertySchema::string()
                    .one_of(PLATFORMS)
                    .describe("CI platform to target"),
            )
            .property(
                "language",
                PropertySchema::string()
                    .one_of(LANGUAGES)
                    .describe("Primary project language"),
            )
            .required("platform")
            .required("language"),
        PipelineTool,
    )
}

pub fn manifest_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "generate_k8s_manifest",
        "Generate a Kubernetes Deployment and Service for a container image",
        SchemaNode::object()
            .property(
                "service_name",
                PropertySchema::string()
                    .length(1, MAX_DNS_LABEL_LEN as u32)
                    .describe("Lowercase DNS-1123 label used for every object name"),
            )
            .property(
                "image",
                PropertySchema::string()
                    .length(1, MAX_IMAGE_LEN as u32)
                    .describe("Container image reference"),
            )
            .property(
                "replicas",
                PropertySchema::integer()
                    .range(1, MAX_REPLICAS)
                    .describe("Desired pod count, defaults to 2"),
            )
            .property(
                "port",
                PropertySchema::integer()
                    .range(1, 65_535)
                    .describe("Container port, defaults to 8080"),
            )
            .required("service_name")
            .required("image"),
        K8sManifestTool,
    )
}

pub struct DevopsCapabilitiesTool;

#[async_trait]
impl ToolHandler for DevopsCapabilitiesTool {
    async fn call(&self, _arguments: Map<String, Value>) -> Result<CallToolResult, ToolError> {
        let mut text = String::from("DevOps capabilities:\n");
        for area in CAPABILITY_AREAS {
            text.push_str("- ");
            text.push_str(area);
            text.push('\n');
        }
        text.push_str(&format!(
            "Supported CI platforms: {}. Supported languages: {}.",
            PLATFORMS.join(", "),
            LANGUAGES.join(", ")
        ));

        Ok(text_result(
            text,
            Some(Map::from_iter([
                ("areas".to_string(), json!(CAPABILITY_AREAS)),
                ("platforms".to_string(), json!(PLATFORMS)),
                ("languages".to_string(), json!(LANGUAGES)),
            ])),
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct PipelineArgs {
    pub platform: String,
    pub language: String,
}

struct Toolchain {
    image: &'static str,
    setup: &'static str,
    test: &'static str,
    build: &'static str,
}

fn toolchain(language: &str) -> Toolchain {
    match language {
        "rust" => Toolchain {
            image: "rust:1",
            setup: "rustup component add clippy rustfmt",
            test: "cargo test --all-features",
            build: "cargo build --release",
        },
        "node" => Toolchain {
            image: "node:20",
            setup: "npm ci",
            test: "npm test",
            build: "npm run build",
        },
        "python" => Toolchain {
            image: "python:3.12",
            setup: "pip install -r requirements.txt",
            test: "pytest",
            build: "python -m build",
        },
        _ => Toolchain {
            image: "golang:1.22",
            setup: "go mod download",
            test: "go test ./...",
            build: "go build ./...",
        },
    }
}

pub fn render_pipeline(platform: &str, language: &str) -> String {
    let chain = toolchain(language);
    match platform {
        "github-actions" => format!(
            "name: ci\non:\n  push:\n    branches: [main]\n  pull_request:\njobs:\n  build:\n    runs-on: ubuntu-latest\n    container: {image}\n    steps:\n      - uses: actions/checkout@v4\n      - run: {setup}\n      - run: {test}\n      - run: {build}\n",
            image = chain.image,
            setup = chain.setup,
            test = chain.test,
            build = chain.build,
        ),
        _ => format!(
            "image: {image}\nstages:\n  - test\n  - build\ntest:\n  stage: test\n  script:\n    - {setup}\n    - {test}\nbuild:\n  stage: build\n  script:\n    - {setup}\n    - {build}\n",
            image = chain.image,
            setup = chain.setup,
            test = chain.test,
            build = chain.build,
        ),
    }
}

pub struct PipelineTool;

#[async_trait]
impl ToolHandler for PipelineTool {
    async fn call(&self, arguments: Map<String, Value>) -> Result<CallToolResult, ToolError> {
        let args: PipelineArgs = parse_arguments(arguments)?;
        let platform = normalize_choice("platform", &args.platform, &PLATFORMS)?;
        let language = normalize_choice("language", &args.language, &LANGUAGES)?;

        let pipeline = render_pipeline(&platform, &language);
        let path = match platform.as_str() {
            "github-actions" => ".github/workflows/ci.yml",
            _ => ".gitlab-ci.yml",
        };

        Ok(text_result(
            pipeline.clone(),
            Some(Map::from_iter([
                ("platform".to_string(), json!(platform)),
                ("language".to_string(), json!(language)),
                ("path".to_string(), json!(path)),
                ("content".to_string(), json!(pipeline)),
            ])),
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct ManifestArgs {
    pub service_name: String,
    pub image: String,
    pub replicas: Option<i64>,
    pub port: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSpec {
    pub service_name: String,
    pub image: String,
    pub replicas: i64,
    pub port: i64,
}

pub fn build_manifest_spec(args: ManifestArgs) -> Result<ManifestSpec, ToolError> {
    let service_name = validate_dns_label("service_name", &args.service_name)?;
    let image = validate_length("image", &args.image, 1, MAX_IMAGE_LEN)?;
    if image.chars().any(char::is_whitespace) {
        return Err(ToolError::invalid("image must not contain whitespace"));
    }

    let replicas = validate_range(
        "replicas",
        args.replicas.unwrap_or(DEFAULT_REPLICAS),
        1,
        MAX_REPLICAS,
    )?;
    let port = validate_range("port", args.port.unwrap_or(DEFAULT_PORT), 1, 65_535)?;

    Ok(ManifestSpec {
        service_name,
        image,
        replicas,
        port,
    })
}

pub fn render_manifest(spec: &ManifestSpec) -> String {
    format!(
        "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: {name}\n  labels:\n    app: {name}\nspec:\n  replicas: {replicas}\n  selector:\n    matchLabels:\n      app: {name}\n  template:\n    metadata:\n      labels:\n        app: {name}\n    spec:\n      containers:\n        - name: {name}\n          image: {image}\n          ports:\n            - containerPort: {port}\n---\napiVersion: v1\nkind: Service\nmetadata:\n  name: {name}\nspec:\n  selector:\n    app: {name}\n  ports:\n    - port: 80\n      targetPort: {port}\n",
        name = spec.service_name,
        image = spec.image,
        replicas = spec.replicas,
        port = spec.port,
    )
}

pub struct K8sManifestTool;

#[async_trait]
impl ToolHandler for K8sManifestTool {
    async fn call(&self, arguments: Map<String, Value>) -> Result<CallToolResult, ToolError> {
        let args: ManifestArgs = parse_arguments(arguments)?;
        let spec = build_manifest_spec(args)?;
        let manifest = render_manifest(&spec);

        Ok(text_result(
            manifest,
            Some(Map::from_iter([
                ("service_name".to_string(), json!(spec.service_name)),
                ("image".to_string(), json!(spec.image)),
                ("replicas".to_string(), json!(spec.replicas)),
                ("port".to_string(), json!(spec.port)),
            ])),
        ))
    }
}
