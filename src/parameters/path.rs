use super::{ParameterFragment, ParametersGenerator};
use crate::document::{Parameter, ParameterLocation, Schema};
use crate::error::Result;
use crate::path_params::PLACEHOLDER;

/// One required `string` path parameter per `{name}` or `{name?}` placeholder
pub struct PathParametersGenerator<'a> {
    uri: &'a str,
}

impl<'a> PathParametersGenerator<'a> {
    pub fn new(uri: &'a str) -> Self {
        Self { uri }
    }

    /// Placeholder names in order, optional markers stripped
    pub fn variables(&self) -> Vec<String> {
        PLACEHOLDER
            .captures_iter(self.uri)
            .map(|c| c[1].trim_end_matches('?').to_string())
            .collect()
    }
}

impl ParametersGenerator for PathParametersGenerator<'_> {
    fn parameters(&self) -> Result<ParameterFragment> {
        let parameters = self
            .variables()
            .into_iter()
            .map(|name| {
                let mut parameter =
                    Parameter::new(name, ParameterLocation::Path, Schema::typed("string"));
                parameter.required = true;
                parameter
            })
            .collect();
        Ok(ParameterFragment::Parameters(parameters))
    }

    fn location(&self) -> ParameterLocation {
        ParameterLocation::Path
    }
}
