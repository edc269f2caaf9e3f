//! Terraform JSON plan parser
//!
//! Reads the output of `terraform show -json <planfile>` and returns the
//! managed resources of `planned_values`, including those of child modules.
//! Counted and `for_each` instances keep their index in the name
//! (`web[0]`, `web["a"]`); module resources are prefixed with the module
//! address (`module.app.web`).

use domain_estimation::{AttributeValue, Declaration, DeclarationParser, ParseError, ParseResult};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use super::{is_declarations_file, read_json};

#[derive(Debug, Deserialize)]
struct Plan {
    planned_values: Option<PlannedValues>,
}

#[derive(Debug, Deserialize)]
struct PlannedValues {
    root_module: Option<Module>,
}

#[derive(Debug, Default, Deserialize)]
struct Module {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    resources: Vec<PlanResource>,
    #[serde(default)]
    child_modules: Vec<Module>,
}

#[derive(Debug, Deserialize)]
struct PlanResource {
    #[serde(default)]
    mode: Option<String>,
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    index: Option<Value>,
    #[serde(default)]
    values: Option<serde_json::Map<String, Value>>,
}

impl PlanResource {
    fn is_managed(&self) -> bool {
        self.mode.as_deref().is_none_or(|mode| mode == "managed")
    }

    fn instance_name(&self, module: Option<&str>) -> String {
        let name = match &self.index {
            Some(Value::Number(n)) => format!("{}[{}]", self.name, n),
            Some(Value::String(s)) => format!("{}[\"{}\"]", self.name, s),
            _ => self.name.clone(),
        };
        match module {
            Some(module) => format!("{module}.{name}"),
            None => name,
        }
    }
}

fn collect(module: Module, declarations: &mut Vec<Declaration>) {
    let address = module.address;
    for resource in module.resources.into_iter().filter(PlanResource::is_managed) {
        let name = resource.instance_name(address.as_deref());
        let mut declaration = Declaration::new(resource.resource_type, name);
        for (key, value) in resource.values.unwrap_or_default() {
            declaration.attributes.insert(key, AttributeValue::from(value));
        }
        declarations.push(declaration);
    }
    for child in module.child_modules {
        collect(child, declarations);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TerraformPlanParser;

impl DeclarationParser for TerraformPlanParser {
    fn name(&self) -> &'static str {
        "terraform-plan"
    }

    /// A `.json` file (other than a native declarations file) that has `planned_values`
    fn can_handle(&self, path: &Path) -> bool {
        if !path.is_file() || is_declarations_file(path) {
            return false;
        }
        if path.extension().is_none_or(|ext| ext != "json") {
            return false;
        }
        std::fs::read_to_string(path)
            .map(|content| content.contains("\"planned_values\""))
            .unwrap_or(false)
    }

    fn parse(&self, path: &Path) -> ParseResult<Vec<Declaration>> {
        let plan: Plan = read_json(path)?;
        let root = plan
            .planned_values
            .and_then(|values| values.root_module)
            .ok_or_else(|| ParseError::Invalid {
                path: path.to_path_buf(),
                message: "plan has no planned_values.root_module".to_string(),
            })?;

        let mut declarations = Vec::new();
        collect(root, &mut declarations);

        debug!(path = %path.display(), count = declarations.len(), "Parsed Terraform plan");
        Ok(declarations)
    }
}
