//! XSD Loader: baut einen [`SchemaCorpus`] aus einem XML Schema (roxmltree).
//!
//! Unterstützt wird der Teil von XSD 1.0, den die Grammar-Konstruktion
//! (Spec 8.5.4.1) braucht:
//!
//! - targetNamespace, elementFormDefault, attributeFormDefault
//! - globale und lokale Elemente (`ref`, `type`, `nillable`, Occurs, anonyme Typen)
//! - sequence, choice, all, group-Referenzen
//! - any / anyAttribute mit Namespace-Constraints
//! - Attribute (`use="required"`, `use="prohibited"`), attributeGroup-Referenzen
//! - mixed, simpleContent, complexContent (extension und restriction)
//! - simpleType: restriction, list, union
//!
//! Das Schema wird in zwei Phasen geladen: zuerst werden alle globalen Namen
//! registriert, danach werden die Definitionen geparst. Basistypen werden bei
//! Bedarf vorgezogen, damit Vorwärtsreferenzen funktionieren.
//!
//! # Beispiel
//!
//! ```
//! use exi_grammar::qname::QName;
//! use exi_grammar::xsd::load_schema;
//!
//! let corpus = load_schema(r#"
//!     <xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
//!                targetNamespace="urn:t" elementFormDefault="qualified">
//!       <xs:element name="A">
//!         <xs:complexType>
//!           <xs:sequence>
//!             <xs:element name="AB" type="xs:string"/>
//!             <xs:element name="AC" type="xs:int" minOccurs="0"/>
//!           </xs:sequence>
//!         </xs:complexType>
//!       </xs:element>
//!     </xs:schema>"#).unwrap();
//!
//! assert!(corpus.global_element(&QName::new("urn:t", "A")).is_some());
//! ```

use std::sync::Arc;

use roxmltree::{Document, Node, ParsingOptions};

use crate::qname::{QName, XML_NS, XSD_NS};
use crate::schema::{
    AttributeUse, ComplexType, ContentType, CorpusBuilder, Datatype, ElementId, MaxOccurs,
    ModelGroup, NamespaceConstraint, Particle, SchemaCorpus, SimpleType, Term, TypeId, TypeKind,
};
use crate::{Error, FastHashMap, FastHashSet, Result};

/// Maximale Schema-Größe (DoS-Schutz).
const MAX_XSD_SIZE: usize = 16 * 1024 * 1024;

/// Lädt ein XSD und baut daraus den Schema-Corpus.
///
/// # Errors
///
/// - [`Error::XsdParseError`] bei ungültigem XML, fehlendem `xs:schema`,
///   unbekannten Referenzen oder ungültigen Occurs
/// - [`Error::SchemaViolation`] aus [`CorpusBuilder::build`]
pub fn load_schema(xsd: &str) -> Result<SchemaCorpus> {
    if xsd.len() > MAX_XSD_SIZE {
        return Err(Error::XsdParseError(format!(
            "schema too large ({} bytes, max {MAX_XSD_SIZE})",
            xsd.len()
        )));
    }
    let options = ParsingOptions { allow_dtd: true, ..Default::default() };
    let doc = Document::parse_with_options(xsd, options)
        .map_err(|e| Error::XsdParseError(format!("XML: {e}")))?;

    let root = doc.root_element();
    if root.tag_name().name() != "schema" || root.tag_name().namespace() != Some(XSD_NS) {
        return Err(Error::XsdParseError("root element must be xs:schema".to_string()));
    }

    let mut loader = Loader::new(&root);
    loader.register(&root);
    loader.define_all()?;
    loader.builder.build()
}

/// Kinder im XSD-Namespace, ohne Annotationen.
fn xs_children<'a, 'i>(node: &Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> + use<'a, 'i> {
    node.children().filter(|c| {
        c.is_element() && c.tag_name().namespace() == Some(XSD_NS) && c.tag_name().name() != "annotation"
    })
}

fn xs_child<'a, 'i>(node: &Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    xs_children(node).find(|c| c.tag_name().name() == name)
}

fn required_attr<'a>(node: &Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| {
        Error::XsdParseError(format!("xs:{} without @{name}", node.tag_name().name()))
    })
}

/// Basis-Informationen eines Typs für Ableitungen.
struct BaseInfo {
    datatype: Datatype,
    complex: Option<ComplexType>,
}

struct Loader<'a, 'i> {
    target_ns: Arc<str>,
    qualified_elements: bool,
    qualified_attributes: bool,
    builder: CorpusBuilder,
    any_type: TypeId,
    any_simple_type: TypeId,
    /// Benannte Typen, deren Definition noch geparst wird.
    type_nodes: FastHashMap<TypeId, Node<'a, 'i>>,
    defined: FastHashSet<TypeId>,
    in_progress: FastHashSet<TypeId>,
    elements: FastHashMap<QName, (ElementId, Node<'a, 'i>)>,
    attributes: FastHashMap<QName, Node<'a, 'i>>,
    groups: FastHashMap<QName, Node<'a, 'i>>,
    attribute_groups: FastHashMap<QName, Node<'a, 'i>>,
    /// Gruppen in Expansion (Zyklenschutz).
    expanding: Vec<QName>,
}

impl<'a, 'i> Loader<'a, 'i> {
    fn new(root: &Node<'a, 'i>) -> Self {
        let builder = CorpusBuilder::new();
        let any_type = builder.builtin("anyType").unwrap_or(TypeId(0));
        let any_simple_type = builder.builtin("anySimpleType").unwrap_or(any_type);
        Self {
            target_ns: root.attribute("targetNamespace").unwrap_or("").into(),
            qualified_elements: root.attribute("elementFormDefault") == Some("qualified"),
            qualified_attributes: root.attribute("attributeFormDefault") == Some("qualified"),
            builder,
            any_type,
            any_simple_type,
            type_nodes: FastHashMap::default(),
            defined: FastHashSet::default(),
            in_progress: FastHashSet::default(),
            elements: FastHashMap::default(),
            attributes: FastHashMap::default(),
            groups: FastHashMap::default(),
            attribute_groups: FastHashMap::default(),
            expanding: Vec::new(),
        }
    }

    fn global_name(&self, node: &Node) -> Option<QName> {
        node.attribute("name").map(|n| QName::new(Arc::clone(&self.target_ns), n))
    }

    // ========================================================================
    // Phase 1: globale Namen
    // ========================================================================

    fn register(&mut self, root: &Node<'a, 'i>) {
        for child in xs_children(root) {
            let Some(name) = self.global_name(&child) else {
                if matches!(child.tag_name().name(), "import" | "include" | "redefine") {
                    log::warn!("xs:{} is not supported, ignored", child.tag_name().name());
                }
                continue;
            };
            match child.tag_name().name() {
                "element" => {
                    // Platzhalter-Typ, gesetzt in Phase 2
                    let id = self.builder.add_global_element(name.clone(), self.any_type, false);
                    self.elements.insert(name, (id, child));
                }
                "complexType" | "simpleType" => {
                    let id = self.builder.reserve_type(Some(name));
                    self.type_nodes.insert(id, child);
                }
                "attribute" => {
                    self.attributes.insert(name, child);
                }
                "group" => {
                    self.groups.insert(name, child);
                }
                "attributeGroup" => {
                    self.attribute_groups.insert(name, child);
                }
                other => log::debug!("skipping top-level xs:{other}"),
            }
        }
        log::debug!(
            "xsd: {} global elements, {} named types, target namespace '{}'",
            self.elements.len(),
            self.type_nodes.len(),
            self.target_ns
        );
    }

    // ========================================================================
    // Phase 2: Definitionen
    // ========================================================================

    fn define_all(&mut self) -> Result<()> {
        let mut ids: Vec<TypeId> = self.type_nodes.keys().copied().collect();
        ids.sort();
        for id in ids {
            self.ensure_type(id)?;
        }

        let mut globals: Vec<(ElementId, Node<'a, 'i>)> = self.elements.values().copied().collect();
        globals.sort_by_key(|(id, _)| *id);
        for (id, node) in globals {
            let type_id = self.element_type(&node)?;
            let nillable = node.attribute("nillable") == Some("true");
            self.builder.set_element_type(id, type_id, nillable);
        }
        Ok(())
    }

    /// Definiert einen benannten Typ, falls noch nicht geschehen.
    fn ensure_type(&mut self, id: TypeId) -> Result<()> {
        if self.defined.contains(&id) {
            return Ok(());
        }
        let Some(node) = self.type_nodes.get(&id).copied() else {
            // Built-in
            return Ok(());
        };
        if !self.in_progress.insert(id) {
            return Err(Error::XsdParseError(format!(
                "circular derivation of type '{}'",
                node.attribute("name").unwrap_or("?")
            )));
        }
        let (base, kind) = self.parse_type(&node)?;
        self.builder.define_type(id, Some(base), kind);
        self.in_progress.remove(&id);
        self.defined.insert(id);
        Ok(())
    }

    fn parse_type(&mut self, node: &Node<'a, 'i>) -> Result<(TypeId, TypeKind)> {
        if node.tag_name().name() == "simpleType" {
            let (base, simple) = self.parse_simple_type(node)?;
            Ok((base, TypeKind::Simple(simple)))
        } else {
            let (base, complex) = self.parse_complex_type(node)?;
            Ok((base, TypeKind::Complex(complex)))
        }
    }

    /// Legt einen anonymen Typ an.
    fn anonymous_type(&mut self, node: &Node<'a, 'i>) -> Result<TypeId> {
        let (base, kind) = self.parse_type(node)?;
        Ok(self.builder.add_type(None, Some(base), kind))
    }

    /// Löst einen QName aus einem Attributwert auf (type, ref, base).
    ///
    /// Unpräfixierte Namen liegen im Default-Namespace des Knotens.
    fn resolve_qname(&self, value: &str, node: &Node) -> Result<QName> {
        let value = value.trim();
        match value.split_once(':') {
            Some(("xml", local)) => Ok(QName::new(XML_NS, local)),
            Some((prefix, local)) => {
                let uri = node.lookup_namespace_uri(Some(prefix)).ok_or_else(|| {
                    Error::XsdParseError(format!("unknown prefix '{prefix}' in '{value}'"))
                })?;
                Ok(QName::new(uri, local))
            }
            None => Ok(QName::new(node.lookup_namespace_uri(None).unwrap_or(""), value)),
        }
    }

    fn type_ref(&mut self, value: &str, node: &Node) -> Result<TypeId> {
        let q = self.resolve_qname(value, node)?;
        if let Some(id) = self.builder.named_type(&q) {
            return Ok(id);
        }
        if &*q.uri == XSD_NS {
            log::warn!("unsupported built-in type xs:{}, using anySimpleType", q.local_name);
            return Ok(self.any_simple_type);
        }
        Err(Error::XsdParseError(format!("unknown type '{value}'")))
    }

    /// Datatype und (bei komplexen Typen) die Definition eines Basistyps.
    fn base_info(&mut self, id: TypeId) -> Result<BaseInfo> {
        self.ensure_type(id)?;
        let info = match self.builder.type_kind(id) {
            Some(TypeKind::Simple(s)) => BaseInfo { datatype: s.datatype, complex: None },
            Some(TypeKind::Complex(c)) => BaseInfo {
                datatype: match c.content {
                    ContentType::Simple(dt) => dt,
                    _ => Datatype::String,
                },
                complex: Some(c.clone()),
            },
            None => return Err(Error::XsdParseError(format!("type #{} is not defined", id.0))),
        };
        Ok(info)
    }

    // ========================================================================
    // Simple Types
    // ========================================================================

    fn parse_simple_type(&mut self, node: &Node<'a, 'i>) -> Result<(TypeId, SimpleType)> {
        let plain = |datatype| SimpleType { datatype, union: false };
        if let Some(restriction) = xs_child(node, "restriction") {
            let base = match restriction.attribute("base") {
                Some(b) => self.type_ref(b, &restriction)?,
                None => match xs_child(&restriction, "simpleType") {
                    Some(inline) => self.anonymous_type(&inline)?,
                    None => return Err(Error::XsdParseError("xs:restriction without base".to_string())),
                },
            };
            let datatype = self.base_info(base)?.datatype;
            return Ok((base, plain(datatype)));
        }
        if xs_child(node, "list").is_some() {
            return Ok((self.any_simple_type, plain(Datatype::String)));
        }
        if xs_child(node, "union").is_some() {
            return Ok((self.any_simple_type, SimpleType { datatype: Datatype::String, union: true }));
        }
        Err(Error::XsdParseError(
            "xs:simpleType needs restriction, list or union".to_string(),
        ))
    }

    fn simple_datatype(&mut self, node: &Node<'a, 'i>) -> Result<Datatype> {
        if let Some(t) = node.attribute("type") {
            let id = self.type_ref(t, node)?;
            return Ok(self.base_info(id)?.datatype);
        }
        match xs_child(node, "simpleType") {
            Some(inline) => Ok(self.parse_simple_type(&inline)?.1.datatype),
            None => Ok(Datatype::String),
        }
    }

    // ========================================================================
    // Complex Types
    // ========================================================================

    fn parse_complex_type(&mut self, node: &Node<'a, 'i>) -> Result<(TypeId, ComplexType)> {
        let mixed = node.attribute("mixed") == Some("true");

        if let Some(content) = xs_child(node, "simpleContent") {
            return self.parse_simple_content(&content);
        }
        if let Some(content) = xs_child(node, "complexContent") {
            let mixed = match content.attribute("mixed") {
                Some(m) => m == "true",
                None => mixed,
            };
            return self.parse_complex_content(&content, mixed);
        }

        let particle = self.content_particle(node)?;
        let mut attributes = Vec::new();
        let mut prohibited = Vec::new();
        let wildcard = self.parse_attributes(node, &mut attributes, &mut prohibited)?;
        Ok((
            self.any_type,
            ComplexType {
                attributes,
                attribute_wildcard: wildcard,
                content: content_type(particle, mixed),
            },
        ))
    }

    fn derivation<'n>(&self, content: &Node<'n, 'i>) -> Result<(Node<'n, 'i>, bool)> {
        if let Some(ext) = xs_child(content, "extension") {
            return Ok((ext, true));
        }
        xs_child(content, "restriction").map(|r| (r, false)).ok_or_else(|| {
            Error::XsdParseError(format!(
                "xs:{} needs extension or restriction",
                content.tag_name().name()
            ))
        })
    }

    fn parse_simple_content(&mut self, content: &Node<'a, 'i>) -> Result<(TypeId, ComplexType)> {
        let (derivation, _) = self.derivation(content)?;
        let base = self.type_ref(required_attr(&derivation, "base")?, &derivation)?;
        let info = self.base_info(base)?;
        let (mut attributes, base_wildcard) = match info.complex {
            Some(c) => (c.attributes, c.attribute_wildcard),
            None => (Vec::new(), None),
        };
        let mut prohibited = Vec::new();
        let wildcard = self.parse_attributes(&derivation, &mut attributes, &mut prohibited)?;
        attributes.retain(|a| !prohibited.contains(&a.name));
        Ok((
            base,
            ComplexType {
                attributes,
                attribute_wildcard: wildcard.or(base_wildcard),
                content: ContentType::Simple(info.datatype),
            },
        ))
    }

    fn parse_complex_content(&mut self, content: &Node<'a, 'i>, mixed: bool) -> Result<(TypeId, ComplexType)> {
        let (derivation, extension) = self.derivation(content)?;
        let base = self.type_ref(required_attr(&derivation, "base")?, &derivation)?;
        let base_type = self.base_info(base)?.complex.ok_or_else(|| {
            Error::XsdParseError("complexContent with a simple base type".to_string())
        })?;

        let own = self.content_particle(&derivation)?;
        let particle = if extension {
            match (content_particle_of(&base_type.content), own) {
                (Some(b), Some(o)) => Some(Particle::once(Term::Group(ModelGroup::sequence(vec![b, o])))),
                (b, o) => b.or(o),
            }
        } else {
            own
        };

        let mut attributes = base_type.attributes;
        let mut prohibited = Vec::new();
        let wildcard = self.parse_attributes(&derivation, &mut attributes, &mut prohibited)?;
        attributes.retain(|a| !prohibited.contains(&a.name));
        let wildcard = if extension { wildcard.or(base_type.attribute_wildcard) } else { wildcard };

        Ok((
            base,
            ComplexType { attributes, attribute_wildcard: wildcard, content: content_type(particle, mixed) },
        ))
    }

    /// Die Model Group eines Typs oder einer Ableitung.
    fn content_particle(&mut self, node: &Node<'a, 'i>) -> Result<Option<Particle>> {
        match xs_children(node)
            .find(|c| matches!(c.tag_name().name(), "sequence" | "choice" | "all" | "group"))
        {
            Some(group) => self.parse_particle(&group),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Particles
    // ========================================================================

    fn parse_occurs(&self, node: &Node) -> Result<(u32, MaxOccurs)> {
        let min = match node.attribute("minOccurs") {
            Some(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::XsdParseError(format!("invalid minOccurs: {s}")))?,
            None => 1,
        };
        let max = match node.attribute("maxOccurs").map(str::trim) {
            Some("unbounded") => MaxOccurs::Unbounded,
            Some(s) => s
                .parse()
                .map(MaxOccurs::Bounded)
                .map_err(|_| Error::XsdParseError(format!("invalid maxOccurs: {s}")))?,
            None => MaxOccurs::Bounded(1),
        };
        if let MaxOccurs::Bounded(max) = max
            && min > max
        {
            return Err(Error::XsdParseError(format!(
                "minOccurs ({min}) cannot be greater than maxOccurs ({max})"
            )));
        }
        Ok((min, max))
    }

    fn parse_particle(&mut self, node: &Node<'a, 'i>) -> Result<Option<Particle>> {
        let (min, max) = self.parse_occurs(node)?;
        let term = match node.tag_name().name() {
            "element" => Term::Element(self.parse_local_element(node)?),
            "any" => Term::Wildcard(self.namespace_constraint(node.attribute("namespace"))?),
            "sequence" | "choice" | "all" => Term::Group(self.parse_model_group(node)?),
            "group" => Term::Group(self.group_ref(node)?),
            other => {
                log::debug!("ignoring xs:{other} in content model");
                return Ok(None);
            }
        };
        Ok(Some(Particle::new(min, max, term)))
    }

    fn parse_model_group(&mut self, node: &Node<'a, 'i>) -> Result<ModelGroup> {
        let mut particles = Vec::new();
        for child in xs_children(node) {
            if let Some(p) = self.parse_particle(&child)? {
                particles.push(p);
            }
        }
        Ok(match node.tag_name().name() {
            "choice" => ModelGroup::choice(particles),
            "all" => ModelGroup::all(particles),
            _ => ModelGroup::sequence(particles),
        })
    }

    fn group_ref(&mut self, node: &Node<'a, 'i>) -> Result<ModelGroup> {
        let name = self.resolve_qname(required_attr(node, "ref")?, node)?;
        let group = self
            .groups
            .get(&name)
            .copied()
            .ok_or_else(|| Error::XsdParseError(format!("group '{name}' not found")))?;
        if self.expanding.contains(&name) {
            return Err(Error::XsdParseError(format!("circular group '{name}'")));
        }
        let inner = xs_children(&group)
            .find(|c| matches!(c.tag_name().name(), "sequence" | "choice" | "all"))
            .ok_or_else(|| Error::XsdParseError(format!("group '{name}' without model group")))?;
        self.expanding.push(name);
        let result = self.parse_model_group(&inner);
        self.expanding.pop();
        result
    }

    // ========================================================================
    // Elements
    // ========================================================================

    fn element_type(&mut self, node: &Node<'a, 'i>) -> Result<TypeId> {
        if let Some(t) = node.attribute("type") {
            return self.type_ref(t, node);
        }
        match xs_children(node).find(|c| matches!(c.tag_name().name(), "complexType" | "simpleType")) {
            Some(inline) => self.anonymous_type(&inline),
            None => Ok(self.any_type),
        }
    }

    fn parse_local_element(&mut self, node: &Node<'a, 'i>) -> Result<ElementId> {
        if let Some(r) = node.attribute("ref") {
            let name = self.resolve_qname(r, node)?;
            return self
                .elements
                .get(&name)
                .map(|(id, _)| *id)
                .ok_or_else(|| Error::XsdParseError(format!("element '{name}' not found")));
        }
        let local = required_attr(node, "name")?;
        let uri = match node.attribute("form") {
            Some("qualified") => Arc::clone(&self.target_ns),
            Some(_) => "".into(),
            None if self.qualified_elements => Arc::clone(&self.target_ns),
            None => "".into(),
        };
        let type_id = self.element_type(node)?;
        let nillable = node.attribute("nillable") == Some("true");
        Ok(self.builder.add_element(QName::new(uri, local), type_id, nillable))
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Sammelt Attribute Uses und liefert das Attribut-Wildcard.
    ///
    /// Lokale Deklarationen ersetzen gleichnamige aus dem Basistyp.
    fn parse_attributes(
        &mut self,
        node: &Node<'a, 'i>,
        out: &mut Vec<AttributeUse>,
        prohibited: &mut Vec<QName>,
    ) -> Result<Option<NamespaceConstraint>> {
        let mut wildcard = None;
        for child in xs_children(node) {
            match child.tag_name().name() {
                "attribute" => {
                    let (name, datatype) = self.attribute_decl(&child)?;
                    out.retain(|a| a.name != name);
                    match child.attribute("use") {
                        Some("prohibited") => prohibited.push(name),
                        u => out.push(AttributeUse { name, required: u == Some("required"), datatype }),
                    }
                }
                "attributeGroup" => {
                    let name = self.resolve_qname(required_attr(&child, "ref")?, &child)?;
                    let group = self.attribute_groups.get(&name).copied().ok_or_else(|| {
                        Error::XsdParseError(format!("attributeGroup '{name}' not found"))
                    })?;
                    if self.expanding.contains(&name) {
                        return Err(Error::XsdParseError(format!("circular attributeGroup '{name}'")));
                    }
                    self.expanding.push(name);
                    let inner = self.parse_attributes(&group, out, prohibited);
                    self.expanding.pop();
                    if let Some(w) = inner? {
                        wildcard = Some(w);
                    }
                }
                "anyAttribute" => {
                    wildcard = Some(self.namespace_constraint(child.attribute("namespace"))?);
                }
                _ => {}
            }
        }
        Ok(wildcard)
    }

    fn attribute_decl(&mut self, node: &Node<'a, 'i>) -> Result<(QName, Datatype)> {
        if let Some(r) = node.attribute("ref") {
            let name = self.resolve_qname(r, node)?;
            let datatype = match self.attributes.get(&name).copied() {
                Some(global) => self.simple_datatype(&global)?,
                None if &*name.uri == XML_NS => Datatype::String,
                None => return Err(Error::XsdParseError(format!("attribute '{name}' not found"))),
            };
            return Ok((name, datatype));
        }
        let local = required_attr(node, "name")?;
        let qualified = match node.attribute("form") {
            Some(form) => form == "qualified",
            None => self.qualified_attributes,
        };
        let uri = if qualified { Arc::clone(&self.target_ns) } else { "".into() };
        Ok((QName::new(uri, local), self.simple_datatype(node)?))
    }

    /// Namespace-Constraint aus dem `namespace`-Attribut (Spec 8.5.4.1.7).
    fn namespace_constraint(&self, value: Option<&str>) -> Result<NamespaceConstraint> {
        match value.map(str::trim) {
            None | Some("##any") => Ok(NamespaceConstraint::Any),
            Some("##other") => Ok(NamespaceConstraint::Other { target: Arc::clone(&self.target_ns) }),
            Some(list) => {
                let tokens: Vec<&str> = list.split_whitespace().collect();
                if tokens.is_empty() {
                    return Err(Error::XsdParseError("empty namespace list".to_string()));
                }
                if tokens.len() > 1 && tokens.iter().any(|t| matches!(*t, "##any" | "##other")) {
                    return Err(Error::XsdParseError(format!(
                        "'{list}': ##any and ##other cannot be combined"
                    )));
                }
                let uris = tokens
                    .into_iter()
                    .map(|t| match t {
                        "##targetNamespace" => Arc::clone(&self.target_ns),
                        "##local" => "".into(),
                        uri => uri.into(),
                    })
                    .collect();
                Ok(NamespaceConstraint::List(uris))
            }
        }
    }
}

fn content_particle_of(content: &ContentType) -> Option<Particle> {
    match content {
        ContentType::ElementOnly(p) | ContentType::Mixed(p) => Some(p.clone()),
        ContentType::Empty | ContentType::Simple(_) => None,
    }
}

fn content_type(particle: Option<Particle>, mixed: bool) -> ContentType {
    let empty_group = |p: &Particle| matches!(&p.term, Term::Group(g) if g.particles.is_empty());
    match particle {
        Some(p) if mixed => ContentType::Mixed(p),
        None if mixed => ContentType::Mixed(Particle::once(Term::Group(ModelGroup::sequence(Vec::new())))),
        Some(p) if !empty_group(&p) => ContentType::ElementOnly(p),
        _ => ContentType::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Compositor;

    fn schema(body: &str) -> String {
        format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:t="urn:t"
                          targetNamespace="urn:t" elementFormDefault="qualified">{body}</xs:schema>"#
        )
    }

    fn complex(corpus: &SchemaCorpus, id: TypeId) -> &ComplexType {
        match &corpus.type_def(id).kind {
            TypeKind::Complex(c) => c,
            TypeKind::Simple(_) => panic!("expected complex type"),
        }
    }

    fn element_type(corpus: &SchemaCorpus, uri: &str, local: &str) -> TypeId {
        let id = corpus.global_element(&QName::new(uri, local)).unwrap();
        corpus.element(id).type_id
    }

    #[test]
    fn sequence_mit_lokalen_elementen() {
        let corpus = load_schema(&schema(
            r#"<xs:element name="A">
                 <xs:complexType>
                   <xs:sequence>
                     <xs:element name="AB" type="xs:string"/>
                     <xs:element name="AC" type="xs:int" minOccurs="0" maxOccurs="unbounded"/>
                   </xs:sequence>
                 </xs:complexType>
               </xs:element>"#,
        ))
        .unwrap();

        let a = complex(&corpus, element_type(&corpus, "urn:t", "A"));
        let ContentType::ElementOnly(p) = &a.content else { panic!("{:?}", a.content) };
        let Term::Group(g) = &p.term else { panic!() };
        assert_eq!(g.compositor, Compositor::Sequence);
        assert_eq!(g.particles.len(), 2);
        assert_eq!(g.particles[1].min, 0);
        assert_eq!(g.particles[1].max, MaxOccurs::Unbounded);
        let Term::Element(ac) = g.particles[1].term else { panic!() };
        assert_eq!(corpus.element(ac).name, QName::new("urn:t", "AC"));
    }

    #[test]
    fn unqualifizierte_lokale_elemente() {
        let corpus = load_schema(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t">
                 <xs:element name="A">
                   <xs:complexType><xs:sequence><xs:element name="B"/></xs:sequence></xs:complexType>
                 </xs:element>
               </xs:schema>"#,
        )
        .unwrap();
        let a = complex(&corpus, element_type(&corpus, "urn:t", "A"));
        let ContentType::ElementOnly(p) = &a.content else { panic!() };
        let Term::Group(g) = &p.term else { panic!() };
        let Term::Element(b) = g.particles[0].term else { panic!() };
        assert_eq!(corpus.element(b).name, QName::local("B"));
        assert_eq!(corpus.element(b).type_id, corpus.any_type());
    }

    #[test]
    fn element_ref_und_nillable() {
        let corpus = load_schema(&schema(
            r#"<xs:element name="root">
                 <xs:complexType><xs:sequence><xs:element ref="t:item"/></xs:sequence></xs:complexType>
               </xs:element>
               <xs:element name="item" type="xs:boolean" nillable="true"/>"#,
        ))
        .unwrap();
        let item = corpus.global_element(&QName::new("urn:t", "item")).unwrap();
        assert!(corpus.element(item).nillable);
        let root = complex(&corpus, element_type(&corpus, "urn:t", "root"));
        let ContentType::ElementOnly(p) = &root.content else { panic!() };
        let Term::Group(g) = &p.term else { panic!() };
        assert_eq!(g.particles[0].term, Term::Element(item));
    }

    // Vorwärtsreferenz auf den Basistyp
    #[test]
    fn extension_erbt_attribute_und_inhalt() {
        let corpus = load_schema(&schema(
            r#"<xs:complexType name="Derived">
                 <xs:complexContent>
                   <xs:extension base="t:Base">
                     <xs:sequence><xs:element name="extra" type="xs:int"/></xs:sequence>
                     <xs:attribute name="b" type="xs:boolean"/>
                   </xs:extension>
                 </xs:complexContent>
               </xs:complexType>
               <xs:complexType name="Base">
                 <xs:sequence><xs:element name="first" type="xs:string"/></xs:sequence>
                 <xs:attribute name="a" type="xs:string" use="required"/>
               </xs:complexType>"#,
        ))
        .unwrap();

        let base = corpus.named_type(&QName::new("urn:t", "Base")).unwrap();
        let derived = corpus.named_type(&QName::new("urn:t", "Derived")).unwrap();
        assert_eq!(corpus.type_def(derived).base, Some(base));
        assert!(corpus.has_named_subtypes(base));

        let c = complex(&corpus, derived);
        let names: Vec<_> = c.attributes.iter().map(|a| (&*a.name.local_name, a.required)).collect();
        assert_eq!(names, [("a", true), ("b", false)]);
        assert_eq!(c.attributes[1].datatype, Datatype::Boolean);
        let ContentType::ElementOnly(p) = &c.content else { panic!() };
        let Term::Group(g) = &p.term else { panic!() };
        assert_eq!(g.particles.len(), 2);
    }

    #[test]
    fn restriction_ersetzt_inhalt() {
        let corpus = load_schema(&schema(
            r#"<xs:complexType name="Base">
                 <xs:sequence><xs:element name="x" minOccurs="0"/></xs:sequence>
                 <xs:attribute name="a"/>
                 <xs:attribute name="b"/>
               </xs:complexType>
               <xs:complexType name="Narrow">
                 <xs:complexContent>
                   <xs:restriction base="t:Base">
                     <xs:attribute name="b" use="prohibited"/>
                   </xs:restriction>
                 </xs:complexContent>
               </xs:complexType>"#,
        ))
        .unwrap();
        let narrow = complex(&corpus, corpus.named_type(&QName::new("urn:t", "Narrow")).unwrap());
        assert_eq!(narrow.content, ContentType::Empty);
        assert_eq!(narrow.attributes.len(), 1);
        assert_eq!(&*narrow.attributes[0].name.local_name, "a");
    }

    #[test]
    fn simple_content_und_simple_types() {
        let corpus = load_schema(&schema(
            r#"<xs:simpleType name="Small">
                 <xs:restriction base="xs:unsignedByte"><xs:maxInclusive value="9"/></xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="Many"><xs:list itemType="xs:int"/></xs:simpleType>
               <xs:simpleType name="Either"><xs:union memberTypes="xs:int xs:boolean"/></xs:simpleType>
               <xs:element name="price">
                 <xs:complexType>
                   <xs:simpleContent>
                     <xs:extension base="t:Small">
                       <xs:attribute name="currency" type="xs:string" use="required"/>
                     </xs:extension>
                   </xs:simpleContent>
                 </xs:complexType>
               </xs:element>"#,
        ))
        .unwrap();

        let small = corpus.named_type(&QName::new("urn:t", "Small")).unwrap();
        assert!(matches!(
            corpus.type_def(small).kind,
            TypeKind::Simple(SimpleType { datatype: Datatype::UnsignedInteger, union: false })
        ));
        let many = corpus.named_type(&QName::new("urn:t", "Many")).unwrap();
        assert!(matches!(corpus.type_def(many).kind, TypeKind::Simple(SimpleType { datatype: Datatype::String, .. })));
        let either = corpus.named_type(&QName::new("urn:t", "Either")).unwrap();
        assert!(corpus.is_union(either));

        let price_type = element_type(&corpus, "urn:t", "price");
        assert_eq!(corpus.type_def(price_type).base, Some(small));
        let price = complex(&corpus, price_type);
        assert_eq!(price.content, ContentType::Simple(Datatype::UnsignedInteger));
        assert!(price.attributes[0].required);
    }

    #[test]
    fn wildcards_und_mixed() {
        let corpus = load_schema(&schema(
            r###"<xs:element name="open">
                 <xs:complexType mixed="true">
                   <xs:choice>
                     <xs:any namespace="##other" processContents="lax"/>
                     <xs:any namespace="##local ##targetNamespace urn:x"/>
                   </xs:choice>
                   <xs:anyAttribute namespace="##any"/>
                 </xs:complexType>
               </xs:element>"###,
        ))
        .unwrap();
        let open = complex(&corpus, element_type(&corpus, "urn:t", "open"));
        assert_eq!(open.attribute_wildcard, Some(NamespaceConstraint::Any));
        let ContentType::Mixed(p) = &open.content else { panic!("{:?}", open.content) };
        let Term::Group(g) = &p.term else { panic!() };
        assert_eq!(g.compositor, Compositor::Choice);
        assert_eq!(g.particles[0].term, Term::Wildcard(NamespaceConstraint::Other { target: "urn:t".into() }));
        assert_eq!(
            g.particles[1].term,
            Term::Wildcard(NamespaceConstraint::List(vec!["".into(), "urn:t".into(), "urn:x".into()]))
        );
    }

    #[test]
    fn gruppen_referenzen() {
        let corpus = load_schema(&schema(
            r#"<xs:group name="pair">
                 <xs:sequence><xs:element name="l"/><xs:element name="r"/></xs:sequence>
               </xs:group>
               <xs:attributeGroup name="common"><xs:attribute name="id" type="xs:ID"/></xs:attributeGroup>
               <xs:element name="p">
                 <xs:complexType>
                   <xs:group ref="t:pair" maxOccurs="2"/>
                   <xs:attributeGroup ref="t:common"/>
                 </xs:complexType>
               </xs:element>"#,
        ))
        .unwrap();
        let p = complex(&corpus, element_type(&corpus, "urn:t", "p"));
        assert_eq!(p.attributes.len(), 1);
        let ContentType::ElementOnly(particle) = &p.content else { panic!() };
        assert_eq!(particle.max, MaxOccurs::Bounded(2));
    }

    #[test]
    fn fehlerhafte_schemas() {
        assert!(matches!(load_schema("<root/>"), Err(Error::XsdParseError(_))));
        assert!(matches!(load_schema("<xs:schema"), Err(Error::XsdParseError(_))));
        assert!(matches!(
            load_schema(&schema(r#"<xs:element name="a" type="t:Missing"/>"#)),
            Err(Error::XsdParseError(_))
        ));
        assert!(matches!(
            load_schema(&schema(r#"<xs:element name="a" type="q:x"/>"#)),
            Err(Error::XsdParseError(_))
        ));
        let occurs = schema(
            r#"<xs:element name="a"><xs:complexType><xs:sequence>
                 <xs:element name="b" minOccurs="3" maxOccurs="2"/>
               </xs:sequence></xs:complexType></xs:element>"#,
        );
        assert!(matches!(load_schema(&occurs), Err(Error::XsdParseError(_))));
        let cycle = schema(
            r#"<xs:simpleType name="X"><xs:restriction base="t:Y"/></xs:simpleType>
               <xs:simpleType name="Y"><xs:restriction base="t:X"/></xs:simpleType>"#,
        );
        assert!(matches!(load_schema(&cycle), Err(Error::XsdParseError(_))));
    }
}
