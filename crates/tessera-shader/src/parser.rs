use crate::error::ParseError;
use crate::reflection::ShaderReflection;
use crate::scanner::{self, split_declarator, tokenize};
use crate::stage::{split_stages, StageSources};
use crate::types::{ResourceType, ShaderDomain, UniformType};
use crate::uniform::{ResourceDeclaration, ShaderStruct, UniformDeclaration};

// ── Builder ───────────────────────────────────────────────────────────────

/// Populates a [`ShaderReflection`] from scanned `struct` and `uniform` statements.
///
/// Domains are independent passes: all struct blocks of a stage are read
/// before its uniform statements, so a uniform may use any struct of its own
/// stage (or of a stage parsed earlier).
#[derive(Debug, Default)]
pub struct DeclarationBuilder {
    reflection: ShaderReflection,
}

impl DeclarationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the struct pass, then the uniform pass, over one stage's source.
    pub fn parse_domain(&mut self, domain: ShaderDomain, src: &str) -> Result<(), ParseError> {
        for block in scanner::struct_blocks(src) {
            self.parse_struct(block, domain)?;
        }
        for statement in scanner::uniform_statements(src) {
            self.parse_uniform(statement, domain)?;
        }
        Ok(())
    }

    pub fn finish(self) -> ShaderReflection {
        self.reflection
    }

    // ── Struct pass ───────────────────────────────────────────────────────

    /// `struct Name { type field[N]?; ... }`
    fn parse_struct(&mut self, block: &str, domain: ShaderDomain) -> Result<(), ParseError> {
        let tokens = tokenize(block);
        // tokens[0] is `struct`, tokens[2] is `{` unless it is glued to the name
        let raw_name = tokens
            .get(1)
            .copied()
            .ok_or_else(|| ParseError::malformed(block, "struct without a name"))?;
        let (name, mut index) = match raw_name.strip_suffix('{') {
            Some(name) => (name, 2),
            None => (raw_name, 3),
        };

        let mut st = ShaderStruct::new(name);
        while index < tokens.len() {
            if tokens[index] == "}" {
                break;
            }
            let type_name = tokens[index];
            let raw_name = tokens
                .get(index + 1)
                .copied()
                .ok_or_else(|| ParseError::malformed(block, "struct field without a name"))?;
            index += 2;

            // `float intensity;}` closes the block on the last field
            let (raw_name, closed) = match raw_name.strip_suffix('}') {
                Some(name) => (name, true),
                None => (raw_name, false),
            };
            let (field_name, count) = split_declarator(block, raw_name)?;
            let field = self.declaration(block, domain, type_name, field_name, count)?;
            if st.add_field(field).is_none() {
                return Err(ParseError::malformed(block, "struct size overflows u32"));
            }
            if closed {
                break;
            }
        }

        match self.reflection.find_struct(st.name()) {
            // Each stage repeats the structs it uses; the first declaration is kept.
            Some(id) if self.reflection.get_struct(id).same_layout(&st) => {}
            Some(_) => return Err(ParseError::malformed(block, "struct redeclared with a different layout")),
            None => {
                self.reflection.add_struct(st);
            }
        }
        Ok(())
    }

    // ── Uniform pass ──────────────────────────────────────────────────────

    /// `uniform type name[N]?;`
    fn parse_uniform(&mut self, statement: &str, domain: ShaderDomain) -> Result<(), ParseError> {
        let tokens = tokenize(statement);
        let (Some(&type_name), Some(&raw_name)) = (tokens.get(1), tokens.get(2)) else {
            return Err(ParseError::malformed(statement, "expected `uniform <type> <name>;`"));
        };
        let (name, count) = split_declarator(statement, raw_name)?;

        if let Some(resource) = ResourceType::from_glsl(type_name) {
            self.reflection
                .push_resource(ResourceDeclaration::new(name, resource, count));
            return Ok(());
        }

        let decl = self.declaration(statement, domain, type_name, name, count)?;
        self.reflection
            .push_uniform(decl)
            .ok_or_else(|| ParseError::malformed(statement, "uniform buffer size overflows u32"))?;
        Ok(())
    }

    /// Builds a declaration for a built-in type or a previously registered struct.
    fn declaration(
        &self,
        statement: &str,
        domain: ShaderDomain,
        type_name: &str,
        name: &str,
        count: u32,
    ) -> Result<UniformDeclaration, ParseError> {
        let overflow = || ParseError::malformed(statement, "array size overflows u32");

        if let Some(ty) = UniformType::from_glsl(type_name) {
            ty.element_size().and_then(|size| size.checked_mul(count)).ok_or_else(overflow)?;
            return Ok(UniformDeclaration::new(domain, ty, name, count));
        }

        let id = self.reflection.find_struct(type_name).ok_or_else(|| ParseError::UnknownType {
            type_name: type_name.to_string(),
            name: name.to_string(),
        })?;
        let size = self.reflection.get_struct(id).size();
        size.checked_mul(count).ok_or_else(overflow)?;
        Ok(UniformDeclaration::with_struct(domain, id, size, name, count))
    }
}

// ── Public parse entry points ─────────────────────────────────────────────

/// Reflects already split stage sources, vertex first.
pub fn parse_stages(stages: &StageSources) -> Result<ShaderReflection, ParseError> {
    let mut builder = DeclarationBuilder::new();
    for domain in ShaderDomain::ALL {
        builder.parse_domain(domain, stages.get(domain))?;
    }
    Ok(builder.finish())
}

/// Splits a combined `#type`-sectioned shader file and reflects it.
pub fn parse_str(src: &str) -> Result<(StageSources, ShaderReflection), ParseError> {
    let stages = split_stages(src)?;
    let reflection = parse_stages(&stages)?;
    Ok((stages, reflection))
}
