//! Immutable schema corpus consumed by the grammar cache (Spec 8.5).
//!
//! The corpus is an arena: types and element declarations are addressed by
//! [`TypeId`] and [`ElementId`], so recursive content models need no cyclic
//! references. Particle trees are owned values inside their complex type.
//!
//! Built-in XSD types are registered by [`CorpusBuilder::new`]. Datatypes
//! without a dedicated codec map to [`Datatype::String`], which keeps their
//! lexical form intact.
//!
//! # Spec-Referenz
//!
//! - 8.5.4.1.3 Type Grammars
//! - 8.5.4.1.4 Attribute Uses
//! - 8.5.4.1.5 Particles
//! - 8.5.4.1.6 Element Terms
//! - 8.5.4.1.7 Wildcard Terms
//! - 8.5.4.1.8 Model Group Terms

use std::sync::Arc;

use crate::qname::{QName, XSD_NS};
use crate::{Error, FastHashMap, Result};

/// Index eines Typs im Corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// Index einer Element-Deklaration im Corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u32);

/// Value representation of a simple type (Spec 7.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    String,
    Boolean,
    Integer,
    UnsignedInteger,
    Base64Binary,
    HexBinary,
}

/// Namespace constraint of a wildcard (Spec 8.5.4.1.7).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceConstraint {
    /// `##any`
    Any,
    /// `##other`: not the target namespace and not absent.
    Other { target: Arc<str> },
    /// Explicit URIs; `##local` is `""`, `##targetNamespace` the schema namespace.
    List(Vec<Arc<str>>),
}

impl NamespaceConstraint {
    /// Prüft ob `uri` zugelassen ist.
    pub fn allows(&self, uri: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Other { target } => !uri.is_empty() && uri != &**target,
            Self::List(uris) => uris.iter().any(|u| &**u == uri),
        }
    }
}

/// Upper bound of a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

/// Particle: occurrence bounds around a term (Spec 8.5.4.1.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Particle {
    pub min: u32,
    pub max: MaxOccurs,
    pub term: Term,
}

impl Particle {
    pub fn new(min: u32, max: MaxOccurs, term: Term) -> Self {
        Self { min, max, term }
    }

    /// `minOccurs=1 maxOccurs=1`
    pub fn once(term: Term) -> Self {
        Self::new(1, MaxOccurs::Bounded(1), term)
    }

    /// `minOccurs=0 maxOccurs=1`
    pub fn optional(term: Term) -> Self {
        Self::new(0, MaxOccurs::Bounded(1), term)
    }

    /// `minOccurs=0 maxOccurs=unbounded`
    pub fn zero_or_more(term: Term) -> Self {
        Self::new(0, MaxOccurs::Unbounded, term)
    }

    fn validate(&self) -> Result<()> {
        if let MaxOccurs::Bounded(max) = self.max
            && max < self.min
        {
            return Err(Error::schema_violation(format!(
                "particle maxOccurs {max} < minOccurs {}",
                self.min
            )));
        }
        if let Term::Group(group) = &self.term {
            for p in &group.particles {
                p.validate()?;
            }
        }
        Ok(())
    }
}

/// Term of a particle (Spec 8.5.4.1.6 – 8.5.4.1.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Element(ElementId),
    Wildcard(NamespaceConstraint),
    Group(ModelGroup),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compositor {
    Sequence,
    Choice,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelGroup {
    pub compositor: Compositor,
    pub particles: Vec<Particle>,
}

impl ModelGroup {
    pub fn sequence(particles: Vec<Particle>) -> Self {
        Self { compositor: Compositor::Sequence, particles }
    }

    pub fn choice(particles: Vec<Particle>) -> Self {
        Self { compositor: Compositor::Choice, particles }
    }

    pub fn all(particles: Vec<Particle>) -> Self {
        Self { compositor: Compositor::All, particles }
    }
}

/// Attribute use of a complex type (Spec 8.5.4.1.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUse {
    pub name: QName,
    pub required: bool,
    pub datatype: Datatype,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Empty,
    Simple(Datatype),
    ElementOnly(Particle),
    Mixed(Particle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexType {
    pub attributes: Vec<AttributeUse>,
    pub attribute_wildcard: Option<NamespaceConstraint>,
    pub content: ContentType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleType {
    pub datatype: Datatype,
    /// Union-Typen bekommen im Strict-Modus eine TYPE-Production (Spec 8.5.4.4.2).
    pub union: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Simple(SimpleType),
    Complex(ComplexType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: Option<QName>,
    pub base: Option<TypeId>,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDeclaration {
    pub name: QName,
    pub type_id: TypeId,
    pub nillable: bool,
}

/// Built-in XSD types: (local name, base, datatype).
const BUILTIN_SIMPLE_TYPES: &[(&str, &str, Datatype)] = &[
    ("anySimpleType", "anyType", Datatype::String),
    ("string", "anySimpleType", Datatype::String),
    ("normalizedString", "string", Datatype::String),
    ("token", "normalizedString", Datatype::String),
    ("language", "token", Datatype::String),
    ("Name", "token", Datatype::String),
    ("NCName", "Name", Datatype::String),
    ("ID", "NCName", Datatype::String),
    ("IDREF", "NCName", Datatype::String),
    ("anyURI", "anySimpleType", Datatype::String),
    ("QName", "anySimpleType", Datatype::String),
    ("boolean", "anySimpleType", Datatype::Boolean),
    ("decimal", "anySimpleType", Datatype::String),
    ("integer", "decimal", Datatype::Integer),
    ("long", "integer", Datatype::Integer),
    ("int", "long", Datatype::Integer),
    ("short", "int", Datatype::Integer),
    ("byte", "short", Datatype::Integer),
    ("nonPositiveInteger", "integer", Datatype::Integer),
    ("negativeInteger", "nonPositiveInteger", Datatype::Integer),
    ("nonNegativeInteger", "integer", Datatype::UnsignedInteger),
    ("positiveInteger", "nonNegativeInteger", Datatype::UnsignedInteger),
    ("unsignedLong", "nonNegativeInteger", Datatype::UnsignedInteger),
    ("unsignedInt", "unsignedLong", Datatype::UnsignedInteger),
    ("unsignedShort", "unsignedInt", Datatype::UnsignedInteger),
    ("unsignedByte", "unsignedShort", Datatype::UnsignedInteger),
    ("float", "anySimpleType", Datatype::String),
    ("double", "anySimpleType", Datatype::String),
    ("duration", "anySimpleType", Datatype::String),
    ("dateTime", "anySimpleType", Datatype::String),
    ("time", "anySimpleType", Datatype::String),
    ("date", "anySimpleType", Datatype::String),
    ("gYear", "anySimpleType", Datatype::String),
    ("gYearMonth", "anySimpleType", Datatype::String),
    ("gMonthDay", "anySimpleType", Datatype::String),
    ("gDay", "anySimpleType", Datatype::String),
    ("gMonth", "anySimpleType", Datatype::String),
    ("base64Binary", "anySimpleType", Datatype::Base64Binary),
    ("hexBinary", "anySimpleType", Datatype::HexBinary),
];

/// The compiled-in schema corpus.
#[derive(Debug, Clone)]
pub struct SchemaCorpus {
    types: Vec<TypeDefinition>,
    elements: Vec<ElementDeclaration>,
    global_elements: Vec<ElementId>,
    named_types: FastHashMap<QName, TypeId>,
    has_named_subtypes: Vec<bool>,
    any_type: TypeId,
}

impl SchemaCorpus {
    pub fn builder() -> CorpusBuilder {
        CorpusBuilder::new()
    }

    pub fn type_def(&self, id: TypeId) -> &TypeDefinition {
        &self.types[id.0 as usize]
    }

    pub fn element(&self, id: ElementId) -> &ElementDeclaration {
        &self.elements[id.0 as usize]
    }

    /// Globale Elemente, sortiert nach local-name, dann URI (Spec 8.5.1).
    pub fn global_elements(&self) -> &[ElementId] {
        &self.global_elements
    }

    /// Globales Element per QName.
    pub fn global_element(&self, name: &QName) -> Option<ElementId> {
        self.global_elements
            .binary_search_by(|id| self.element(*id).name.cmp(name))
            .ok()
            .map(|i| self.global_elements[i])
    }

    /// Benannter Typ (inkl. Built-ins) per QName.
    pub fn named_type(&self, name: &QName) -> Option<TypeId> {
        self.named_types.get(name).copied()
    }

    /// Alle benannten Typen.
    pub fn named_types(&self) -> impl Iterator<Item = (&QName, TypeId)> + '_ {
        self.named_types.iter().map(|(q, id)| (q, *id))
    }

    /// `xs:anyType`
    pub fn any_type(&self) -> TypeId {
        self.any_type
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// True wenn ein benannter Typ von `id` abgeleitet ist (Spec 8.5.4.4.2).
    pub fn has_named_subtypes(&self, id: TypeId) -> bool {
        self.has_named_subtypes[id.0 as usize]
    }

    /// True für Union-Simple-Types.
    pub fn is_union(&self, id: TypeId) -> bool {
        matches!(&self.type_def(id).kind, TypeKind::Simple(s) if s.union)
    }

    /// Alle (URI, local-name) Paare für die String-Table-Vorbelegung (Spec 7.3.1).
    ///
    /// Enthält Element-, Attribut- und Typnamen aller Schema-Namespaces
    /// außer dem XSD-Namespace.
    pub fn schema_names(&self) -> Vec<QName> {
        let mut names: Vec<QName> = Vec::new();
        names.extend(self.elements.iter().map(|e| e.name.expanded()));
        for t in &self.types {
            if let Some(name) = &t.name
                && &*name.uri != XSD_NS
            {
                names.push(name.expanded());
            }
            if let TypeKind::Complex(c) = &t.kind {
                names.extend(c.attributes.iter().map(|a| a.name.expanded()));
            }
        }
        names.sort_by(|a, b| a.uri.cmp(&b.uri).then_with(|| a.local_name.cmp(&b.local_name)));
        names.dedup();
        names
    }
}

/// Schrittweiser Aufbau eines [`SchemaCorpus`].
///
/// Typen können vorab reserviert werden, damit rekursive Content Models
/// auf sich selbst verweisen können.
#[derive(Debug)]
pub struct CorpusBuilder {
    types: Vec<Option<TypeDefinition>>,
    elements: Vec<ElementDeclaration>,
    global_elements: Vec<ElementId>,
    named_types: FastHashMap<QName, TypeId>,
}

impl Default for CorpusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusBuilder {
    /// Neuer Builder mit registrierten XSD Built-in Typen.
    pub fn new() -> Self {
        let mut b = Self {
            types: Vec::new(),
            elements: Vec::new(),
            global_elements: Vec::new(),
            named_types: FastHashMap::default(),
        };
        // anyType: Attribut-Wildcard + gemischter Inhalt aus ##any (Spec 8.5.4.1.3.2)
        let any_type = b.reserve_type(Some(QName::new(XSD_NS, "anyType")));
        b.define_type(
            any_type,
            None,
            TypeKind::Complex(ComplexType {
                attributes: Vec::new(),
                attribute_wildcard: Some(NamespaceConstraint::Any),
                content: ContentType::Mixed(Particle::zero_or_more(Term::Wildcard(
                    NamespaceConstraint::Any,
                ))),
            }),
        );
        for &(name, base, datatype) in BUILTIN_SIMPLE_TYPES {
            let base = b.builtin(base);
            let id = b.reserve_type(Some(QName::new(XSD_NS, name)));
            b.define_type(id, base, TypeKind::Simple(SimpleType { datatype, union: false }));
        }
        b
    }

    /// Built-in Typ per local-name.
    pub fn builtin(&self, local_name: &str) -> Option<TypeId> {
        self.named_types.get(&QName::new(XSD_NS, local_name)).copied()
    }

    /// Benannter Typ per QName (auch reservierte).
    pub fn named_type(&self, name: &QName) -> Option<TypeId> {
        self.named_types.get(name).copied()
    }

    /// Definition eines Typs, `None` solange er nur reserviert ist.
    pub fn type_kind(&self, id: TypeId) -> Option<&TypeKind> {
        self.types.get(id.0 as usize)?.as_ref().map(|t| &t.kind)
    }

    /// Reserviert eine TypeId; die Definition folgt per [`define_type`](Self::define_type).
    pub fn reserve_type(&mut self, name: Option<QName>) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(None);
        if let Some(name) = name {
            self.named_types.insert(name, id);
        }
        id
    }

    /// Setzt die Definition eines reservierten Typs.
    pub fn define_type(&mut self, id: TypeId, base: Option<TypeId>, kind: TypeKind) {
        let name = self
            .named_types
            .iter()
            .find(|(_, t)| **t == id)
            .map(|(q, _)| q.clone());
        self.types[id.0 as usize] = Some(TypeDefinition { name, base, kind });
    }

    /// Reserviert und definiert einen Typ in einem Schritt.
    pub fn add_type(&mut self, name: Option<QName>, base: Option<TypeId>, kind: TypeKind) -> TypeId {
        let id = self.reserve_type(name);
        self.define_type(id, base, kind);
        id
    }

    /// Fügt eine lokale Element-Deklaration hinzu.
    pub fn add_element(&mut self, name: QName, type_id: TypeId, nillable: bool) -> ElementId {
        let id = ElementId(self.elements.len() as u32);
        self.elements.push(ElementDeclaration { name: name.expanded(), type_id, nillable });
        id
    }

    /// Fügt eine globale Element-Deklaration hinzu.
    pub fn add_global_element(&mut self, name: QName, type_id: TypeId, nillable: bool) -> ElementId {
        let id = self.add_element(name, type_id, nillable);
        self.global_elements.push(id);
        id
    }

    /// Ändert Typ und Nillable einer Deklaration (für Zwei-Phasen-Loader).
    pub fn set_element_type(&mut self, id: ElementId, type_id: TypeId, nillable: bool) {
        let decl = &mut self.elements[id.0 as usize];
        decl.type_id = type_id;
        decl.nillable = nillable;
    }

    /// Schließt den Aufbau ab und prüft die Konsistenz.
    pub fn build(self) -> Result<SchemaCorpus> {
        let mut types = Vec::with_capacity(self.types.len());
        for (i, t) in self.types.into_iter().enumerate() {
            let t = t.ok_or_else(|| {
                Error::schema_violation(format!("type #{i} reserved but never defined"))
            })?;
            if let TypeKind::Complex(c) = &t.kind {
                match &c.content {
                    ContentType::ElementOnly(p) | ContentType::Mixed(p) => p.validate()?,
                    ContentType::Empty | ContentType::Simple(_) => {}
                }
            }
            types.push(t);
        }

        let mut has_named_subtypes = vec![false; types.len()];
        for t in types.iter().filter(|t| t.name.is_some()) {
            let mut base = t.base;
            let mut guard = 0;
            while let Some(b) = base {
                has_named_subtypes[b.0 as usize] = true;
                base = types[b.0 as usize].base;
                guard += 1;
                if guard > types.len() {
                    return Err(Error::schema_violation("cyclic type derivation"));
                }
            }
        }

        let elements = self.elements;
        let mut global_elements = self.global_elements;
        global_elements.sort_by(|a, b| elements[a.0 as usize].name.cmp(&elements[b.0 as usize].name));
        global_elements.dedup_by(|a, b| elements[a.0 as usize].name == elements[b.0 as usize].name);

        let any_type = TypeId(0);
        log::debug!(
            "schema corpus: {} types, {} elements, {} global",
            types.len(),
            elements.len(),
            global_elements.len()
        );
        Ok(SchemaCorpus {
            types,
            elements,
            global_elements,
            named_types: self.named_types,
            has_named_subtypes,
            any_type,
        })
    }
}
