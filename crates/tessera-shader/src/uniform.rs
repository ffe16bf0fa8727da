use crate::types::{ResourceType, ShaderDomain, StructId, UniformLocation, UniformType};

// ── UniformDeclaration ────────────────────────────────────────────────────

/// One named uniform and its place in the owning buffer (or struct).
///
/// The offset is assigned when the declaration is pushed into a
/// [`ShaderUniformBuffer`] or [`ShaderStruct`]; until then it is 0.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformDeclaration {
    name: String,
    ty: UniformType,
    count: u32,
    size: u32,
    offset: u32,
    domain: ShaderDomain,
    location: Option<UniformLocation>,
    /// Resolved handles for every leaf field of a struct-typed uniform, in
    /// [`ShaderReflection::leaf_fields`](crate::ShaderReflection::leaf_fields) order.
    field_locations: Vec<Option<UniformLocation>>,
}

impl UniformDeclaration {
    /// Creates a declaration of a built-in type.
    ///
    /// # Panics
    /// Panics if `ty` is a struct type (use [`UniformDeclaration::with_struct`])
    /// or if the array's byte size overflows `u32`.
    pub fn new(domain: ShaderDomain, ty: UniformType, name: impl Into<String>, count: u32) -> Self {
        let Some(element_size) = ty.element_size() else {
            panic!("struct-typed declarations must be built with UniformDeclaration::with_struct");
        };
        Self::build(domain, ty, name.into(), count, array_size(element_size, count))
    }

    /// Creates a declaration whose type is the struct `id` of size `struct_size`.
    ///
    /// # Panics
    /// Panics if the array's byte size overflows `u32`.
    pub fn with_struct(
        domain: ShaderDomain,
        id: StructId,
        struct_size: u32,
        name: impl Into<String>,
        count: u32,
    ) -> Self {
        Self::build(domain, UniformType::Struct(id), name.into(), count, array_size(struct_size, count))
    }

    fn build(domain: ShaderDomain, ty: UniformType, name: String, count: u32, size: u32) -> Self {
        Self {
            name,
            ty,
            count,
            size,
            offset: 0,
            domain,
            location: None,
            field_locations: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> UniformType {
        self.ty
    }

    /// Element count; greater than 1 for arrays.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        self.count > 1
    }

    /// Total byte size (element size × count).
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Byte offset within the owning buffer or struct.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[inline]
    pub fn domain(&self) -> ShaderDomain {
        self.domain
    }

    #[inline]
    pub fn struct_id(&self) -> Option<StructId> {
        match self.ty {
            UniformType::Struct(id) => Some(id),
            _ => None,
        }
    }

    /// Binding handle, `None` until resolved (or when the backend reported a miss).
    #[inline]
    pub fn location(&self) -> Option<UniformLocation> {
        self.location
    }

    pub fn set_location(&mut self, location: Option<UniformLocation>) {
        self.location = location;
    }

    #[inline]
    pub fn field_locations(&self) -> &[Option<UniformLocation>] {
        &self.field_locations
    }

    pub fn set_field_locations(&mut self, locations: Vec<Option<UniformLocation>>) {
        self.field_locations = locations;
    }

    /// Forgets every resolved handle.
    pub fn clear_locations(&mut self) {
        self.location = None;
        self.field_locations.clear();
    }

    pub(crate) fn set_offset(&mut self, offset: u32) {
        self.offset = offset;
    }
}

fn array_size(element_size: u32, count: u32) -> u32 {
    element_size
        .checked_mul(count)
        .unwrap_or_else(|| panic!("{count} elements of {element_size} bytes overflow u32"))
}

// ── ShaderStruct ──────────────────────────────────────────────────────────

/// A named aggregate type declared with `struct Name { ... }`.
///
/// Field offsets are local to the struct and start at 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderStruct {
    name: String,
    fields: Vec<UniformDeclaration>,
    size: u32,
}

impl ShaderStruct {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new(), size: 0 }
    }

    /// Appends a field at the current end of the struct and returns its offset.
    ///
    /// Returns `None` and leaves the struct unchanged if its size would overflow `u32`.
    pub fn add_field(&mut self, mut field: UniformDeclaration) -> Option<u32> {
        let offset = self.size;
        self.size = offset.checked_add(field.size())?;
        field.set_offset(offset);
        self.fields.push(field);
        Some(offset)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn fields(&self) -> &[UniformDeclaration] {
        &self.fields
    }

    /// Sum of all field sizes.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn find_field(&self, name: &str) -> Option<&UniformDeclaration> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Same name and the same fields (name, type, count) in the same order.
    /// The stage a field was declared in is not compared.
    pub fn same_layout(&self, other: &ShaderStruct) -> bool {
        self.name == other.name
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.name == b.name && a.ty == b.ty && a.count == b.count)
    }
}

// ── ShaderUniformBuffer ───────────────────────────────────────────────────

/// Ordered uniform declarations of one buffer (renderer-owned or material).
///
/// Duplicate names are kept; each one simply takes the next offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderUniformBuffer {
    name: String,
    domain: ShaderDomain,
    uniforms: Vec<UniformDeclaration>,
    size: u32,
}

impl ShaderUniformBuffer {
    pub fn new(name: impl Into<String>, domain: ShaderDomain) -> Self {
        Self { name: name.into(), domain, uniforms: Vec::new(), size: 0 }
    }

    /// Appends `uniform`, assigning it the buffer's size before the append as offset.
    ///
    /// Returns the assigned offset, or `None` (leaving the buffer unchanged)
    /// if the buffer size would overflow `u32`.
    pub fn push(&mut self, mut uniform: UniformDeclaration) -> Option<u32> {
        let offset = self.size;
        self.size = offset.checked_add(uniform.size())?;
        uniform.set_offset(offset);
        self.uniforms.push(uniform);
        Some(offset)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn domain(&self) -> ShaderDomain {
        self.domain
    }

    #[inline]
    pub fn uniforms(&self) -> &[UniformDeclaration] {
        &self.uniforms
    }

    #[inline]
    pub fn uniforms_mut(&mut self) -> &mut [UniformDeclaration] {
        &mut self.uniforms
    }

    /// Total byte size of the buffer.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.uniforms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.uniforms.is_empty()
    }

    /// First declaration named `name`.
    pub fn find(&self, name: &str) -> Option<&UniformDeclaration> {
        self.uniforms.iter().find(|u| u.name() == name)
    }
}

// ── ResourceDeclaration ───────────────────────────────────────────────────

/// An opaque resource uniform (sampler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDeclaration {
    name: String,
    ty: ResourceType,
    count: u32,
    /// First texture unit, assigned during resolution.
    unit: Option<u32>,
}

impl ResourceDeclaration {
    pub fn new(name: impl Into<String>, ty: ResourceType, count: u32) -> Self {
        Self { name: name.into(), ty, count, unit: None }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> ResourceType {
        self.ty
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// First texture unit of this resource; units `unit..unit + count` belong to it.
    #[inline]
    pub fn unit(&self) -> Option<u32> {
        self.unit
    }

    pub fn set_unit(&mut self, unit: Option<u32>) {
        self.unit = unit;
    }
}

// ── LeafField ─────────────────────────────────────────────────────────────

/// A non-struct value reachable from a declaration, with its absolute offset.
///
/// Struct-typed declarations expand into one leaf per (element, field),
/// recursively; other declarations are their own single leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafField {
    /// Backend-visible name, e.g. `u_Light.position` or `u_Lights[2].color`.
    pub name: String,
    pub ty: UniformType,
    pub count: u32,
    /// Absolute byte offset within the owning buffer.
    pub offset: u32,
    pub size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float(name: &str) -> UniformDeclaration {
        UniformDeclaration::new(ShaderDomain::Fragment, UniformType::Float32, name, 1)
    }

    #[test]
    fn empty_buffer_has_zero_size() {
        let buf = ShaderUniformBuffer::new("material", ShaderDomain::Vertex);
        assert_eq!(buf.size(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn offsets_are_prefix_sums_of_sizes() {
        let types = [
            (UniformType::Vec3, 1),
            (UniformType::Float32, 1),
            (UniformType::Mat4, 2),
            (UniformType::Bool, 1),
            (UniformType::Vec2, 3),
            (UniformType::Mat3, 1),
        ];

        let mut buf = ShaderUniformBuffer::new("material", ShaderDomain::Vertex);
        for (i, (ty, count)) in types.iter().enumerate() {
            let before = buf.size();
            let offset = buf.push(UniformDeclaration::new(
                ShaderDomain::Vertex,
                *ty,
                format!("u_{i}"),
                *count,
            ));
            assert_eq!(offset, Some(before));
        }

        let mut expected = 0;
        for u in buf.uniforms() {
            assert_eq!(u.offset(), expected);
            expected += u.size();
        }
        assert_eq!(buf.size(), expected);
        assert_eq!(buf.size(), 12 + 4 + 128 + 4 + 24 + 36);
    }

    #[test]
    fn struct_field_offsets_are_local() {
        let mut st = ShaderStruct::new("Light");
        st.add_field(UniformDeclaration::new(ShaderDomain::Fragment, UniformType::Vec3, "position", 1));
        st.add_field(float("intensity"));
        st.add_field(UniformDeclaration::new(ShaderDomain::Fragment, UniformType::Vec4, "color", 1));

        let offsets: Vec<u32> = st.fields().iter().map(|f| f.offset()).collect();
        assert_eq!(offsets, vec![0, 12, 16]);
        assert_eq!(st.size(), 32);

        // Placing the struct after other data does not touch its local offsets.
        let mut buf = ShaderUniformBuffer::new("material", ShaderDomain::Fragment);
        buf.push(float("u_Gamma"));
        buf.push(UniformDeclaration::with_struct(ShaderDomain::Fragment, StructId(0), st.size(), "u_Light", 1));
        assert_eq!(buf.uniforms()[1].offset(), 4);
        assert_eq!(st.fields()[1].offset(), 12);
    }

    #[test]
    fn struct_array_size_scales_with_count() {
        let decl = UniformDeclaration::with_struct(ShaderDomain::Vertex, StructId(3), 20, "u_Lights", 4);
        assert_eq!(decl.size(), 80);
        assert_eq!(decl.struct_id(), Some(StructId(3)));
        assert!(decl.is_array());
    }

    #[test]
    fn duplicates_are_kept_and_find_returns_first() {
        let mut buf = ShaderUniformBuffer::new("material", ShaderDomain::Fragment);
        buf.push(float("u_Value"));
        buf.push(float("u_Value"));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.uniforms()[1].offset(), 4);
        assert_eq!(buf.find("u_Value").map(|u| u.offset()), Some(0));
        assert!(buf.find("u_Missing").is_none());
    }

    #[test]
    fn overflowing_appends_leave_the_layout_unchanged() {
        let mut buf = ShaderUniformBuffer::new("material", ShaderDomain::Fragment);
        let huge = UniformDeclaration::new(ShaderDomain::Fragment, UniformType::Mat4, "u_Huge", u32::MAX / 64);
        assert_eq!(buf.push(huge.clone()), Some(0));
        assert_eq!(buf.push(UniformDeclaration::new(ShaderDomain::Fragment, UniformType::Mat4, "u_More", 1)), None);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.size(), huge.size());

        let mut st = ShaderStruct::new("Big");
        assert_eq!(st.add_field(huge), Some(0));
        assert_eq!(st.add_field(UniformDeclaration::new(ShaderDomain::Fragment, UniformType::Mat4, "tail", 1)), None);
        assert_eq!(st.fields().len(), 1);
    }

    #[test]
    #[should_panic(expected = "overflow u32")]
    fn oversized_arrays_panic_in_constructors() {
        let _ = UniformDeclaration::new(ShaderDomain::Vertex, UniformType::Vec4, "u_V", u32::MAX);
    }

    #[test]
    #[should_panic]
    fn new_rejects_struct_types() {
        let _ = UniformDeclaration::new(ShaderDomain::Vertex, UniformType::Struct(StructId(0)), "u_S", 1);
    }
}
