use crate::error::ParseError;
use crate::types::ShaderDomain;

const TYPE_DIRECTIVE: &str = "#type";

/// Per-stage source text of one shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSources {
    pub vertex: String,
    pub fragment: String,
}

impl StageSources {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self { vertex: vertex.into(), fragment: fragment.into() }
    }

    pub fn get(&self, domain: ShaderDomain) -> &str {
        match domain {
            ShaderDomain::Vertex => &self.vertex,
            ShaderDomain::Fragment => &self.fragment,
        }
    }
}

fn stage_from_name(name: &str) -> Option<ShaderDomain> {
    match name {
        "vertex" => Some(ShaderDomain::Vertex),
        "fragment" | "pixel" => Some(ShaderDomain::Fragment),
        _ => None,
    }
}

/// Splits a combined shader file into stages.
///
/// Each stage starts with a `#type vertex` or `#type fragment` line (`pixel`
/// is accepted for fragment) and runs until the next directive. A stage given
/// twice keeps its last section.
pub fn split_stages(src: &str) -> Result<StageSources, ParseError> {
    let mut sections: [Option<&str>; 2] = [None, None];

    let mut cursor = src.find(TYPE_DIRECTIVE);
    while let Some(pos) = cursor {
        let line_end = src[pos..].find(['\r', '\n']).map_or(src.len(), |i| pos + i);
        let stage_name = src[pos + TYPE_DIRECTIVE.len()..line_end].trim();
        let domain =
            stage_from_name(stage_name).ok_or_else(|| ParseError::UnknownStage(stage_name.to_string()))?;

        let body_start = src[line_end..]
            .find(|c| c != '\r' && c != '\n')
            .map_or(src.len(), |i| line_end + i);
        cursor = src[body_start..].find(TYPE_DIRECTIVE).map(|i| body_start + i);
        let body_end = cursor.unwrap_or(src.len());

        sections[domain.index()] = Some(&src[body_start..body_end]);
    }

    let [vertex, fragment] = sections;
    Ok(StageSources {
        vertex: vertex.ok_or(ParseError::MissingStage(ShaderDomain::Vertex))?.to_string(),
        fragment: fragment.ok_or(ParseError::MissingStage(ShaderDomain::Fragment))?.to_string(),
    })
}
