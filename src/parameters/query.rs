use super::{rule_schema, ParameterFragment, ParametersGenerator};
use crate::document::{Items, Parameter, ParameterLocation, Schema};
use crate::error::Result;
use crate::rules::{FieldRules, RuleSet};
use log::debug;
use serde_json::{Map, Value};

/// Query parameters from validation rules.
///
/// Each top-level rule key is one parameter. `name.*` refines the element
/// schema of the array parameter `name`; any other dotted key is rendered in
/// bracket form (`filter.status` becomes `filter[status]`).
pub struct QueryParametersGenerator<'a> {
    rules: &'a Map<String, Value>,
}

impl<'a> QueryParametersGenerator<'a> {
    pub fn new(rules: &'a Map<String, Value>) -> Self {
        Self { rules }
    }
}

impl ParametersGenerator for QueryParametersGenerator<'_> {
    fn parameters(&self) -> Result<ParameterFragment> {
        let rules = RuleSet::parse(self.rules)?;
        let mut parameters: Vec<Parameter> = Vec::new();

        for field in rules.iter() {
            if let Some(array_name) = field.field.strip_suffix(".*") {
                if let Some(parameter) = parameters
                    .iter_mut()
                    .find(|p| p.name == array_name && p.schema.is_type("array"))
                {
                    let mut item = rule_schema(field);
                    item.description = None;
                    parameter.schema.items = Some(Items::Single(Box::new(item)));
                    continue;
                }
            }

            parameters.push(query_parameter(field));
        }

        for parameter in &mut parameters {
            if matches!(parameter.schema.items, Some(Items::List(_))) {
                parameter.schema.items = Some(Items::Single(Box::new(Schema::typed("string"))));
            }
        }

        debug!("Generated {} query parameters", parameters.len());
        Ok(ParameterFragment::Parameters(parameters))
    }

    fn location(&self) -> ParameterLocation {
        ParameterLocation::Query
    }
}

fn query_parameter(field: &FieldRules) -> Parameter {
    let mut schema = rule_schema(field);
    let description = schema.description.take();

    let mut parameter = Parameter::new(bracket_name(&field.field), ParameterLocation::Query, schema);
    parameter.required = field.is_required();
    parameter.description = description;
    parameter
}

/// `filter.status` → `filter[status]`, `ids.*` → `ids[]`
fn bracket_name(field: &str) -> String {
    let mut segments = field.split('.');
    let mut name = segments.next().unwrap_or_default().to_string();
    for segment in segments {
        if segment == "*" {
            name.push_str("[]");
        } else {
            name.push('[');
            name.push_str(segment);
            name.push(']');
        }
    }
    name
}
