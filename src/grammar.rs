//! Grammar Cache: kompilierte, unveränderliche Grammars (Spec 8.4, 8.5).
//!
//! [`GrammarCache::new`] übersetzt Schema-Corpus und [`GrammarOptions`]
//! einmalig in eine Arena von [`Grammar`]-Zuständen:
//!
//! - Document- und Fragment-Grammar (Spec 8.4.1, 8.4.2, 8.5.1, 8.5.2)
//! - pro Typ und Nillability die Start-Tag Zustände A_0..A_n
//!   (ein Zustand pro noch möglicher Attribut-Position)
//! - pro Typ die Content-Zustände, abgeleitet über [`ParticleArena`]
//! - pro Typ die Zustände nach `xsi:nil="true"`
//!
//! Jeder Zustand hält eine interned [`EventTypeList`] und parallel dazu eine
//! [`Production`] pro Event Type. Gleiche Listen werden nur einmal gehalten.
//! Der Cache wird nach dem Bau nie verändert und ist `Send + Sync`; gelernte
//! Productions leben pro Dokument in
//! [`BuiltinGrammars`](crate::builtin::BuiltinGrammars).
//!
//! # Zustände eines Element-Typs
//!
//! ```text
//! A_0 ──AT(a)──▶ A_1 ──AT(b)──▶ A_2 ──SE(x)──▶ C_1 ──EE──▶ (pop)
//!  │                              ▲
//!  └──────────SE(x), AT optional──┘
//! ```
//!
//! Ein A_i bietet in Tier 1 die Attribute ab Position i (bis einschließlich
//! des ersten Pflicht-Attributs), die Attribut-Wildcard und, wenn alle
//! restlichen Attribute optional sind, die Tier-1 Einträge von C_0.

use std::fmt;
use std::sync::Arc;

use crate::event_type::{EventTypeList, ItemType, Slot};
use crate::options::GrammarOptions;
use crate::proto_grammar::{Continuation, Frame, ParticleArena, Terminal};
use crate::qname::QName;
use crate::schema::{
    AttributeUse, ContentType, Datatype, NamespaceConstraint, SchemaCorpus, TypeId, TypeKind,
};
use crate::undeclared::{self, Area, Tier2Context};
use crate::{Error, FastHashMap, FastHashSet, Result};

/// Index eines Zustands im Grammar Cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrammarId(pub u32);

/// Art eines Grammar-Zustands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarKind {
    Document,
    DocContent,
    DocEnd,
    Fragment,
    FragmentContent,
    /// Start-Tag Zustand A_i.
    ElementStartTag,
    ElementContent,
    /// Content-Zustand innerhalb einer All-Gruppe.
    AllGroupRemainder,
    /// Kopie von C_0 für undeclared SE/CH im Start-Tag (Spec 8.5.4.4.1).
    ContentCopy,
    /// Start-Tag nach `xsi:nil="true"`.
    NilledContent,
}

/// Ziel einer Production.
///
/// `next = None` bei EE und ED (Frame endet) sowie bei TYPE (Ziel wird zur
/// Laufzeit über den xsi:type Wert bestimmt).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Production {
    pub next: Option<GrammarId>,
    /// Start-Zustand des Kind-Elements bei SE(qname).
    pub child: Option<GrammarId>,
    /// Wert-Repräsentation bei AT(qname) und CH.
    pub datatype: Option<Datatype>,
    /// Namespace-Einschränkung bei Wildcards aus dem Schema.
    pub filter: Option<NamespaceConstraint>,
}

impl Production {
    fn to(next: GrammarId) -> Self {
        Self { next: Some(next), ..Self::default() }
    }

    fn end() -> Self {
        Self::default()
    }

    /// Prüft die Namespace-Einschränkung einer Wildcard.
    pub fn allows(&self, uri: &str) -> bool {
        self.filter.as_ref().is_none_or(|f| f.allows(uri))
    }
}

/// Ein unveränderlicher Grammar-Zustand.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub kind: GrammarKind,
    pub events: Arc<EventTypeList>,
    /// Parallel zu `events`.
    pub productions: Vec<Production>,
    /// Typ des Elements, bei Dokument-Zuständen `None`.
    pub type_id: Option<TypeId>,
    /// Nillability, nur für Start-Tag Zustände relevant.
    pub nillable: bool,
}

impl Grammar {
    pub fn production(&self, index: usize) -> Option<&Production> {
        self.productions.get(index)
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(t) = self.type_id {
            write!(f, "(type #{})", t.0)?;
        }
        Ok(())
    }
}

/// Kompilierte Grammars zu einem Schema und einer Options-Kombination.
#[derive(Debug)]
pub struct GrammarCache {
    corpus: Option<Arc<SchemaCorpus>>,
    options: GrammarOptions,
    grammars: Vec<Grammar>,
    document: GrammarId,
    fragment: GrammarId,
    elements: FastHashMap<QName, GrammarId>,
    types: FastHashMap<(TypeId, bool), GrammarId>,
    list_count: usize,
}

impl GrammarCache {
    /// Baut alle Grammars zu `corpus` (Spec 8.5).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOptionCombination`] bei unzulässigen Options
    /// - [`Error::SchemaViolation`] bei nicht ableitbaren Content Models
    pub fn new(corpus: Arc<SchemaCorpus>, options: GrammarOptions) -> Result<Self> {
        options.validate()?;
        let built = Builder::new(Some(corpus.as_ref()), options).build()?;
        Ok(Self::from_built(Some(corpus), options, built))
    }

    /// Grammar Cache ohne Schema: alle Elemente nutzen Built-in Grammars (Spec 8.4).
    pub fn schemaless(options: GrammarOptions) -> Result<Self> {
        options.validate()?;
        let built = Builder::new(None, options).build()?;
        Ok(Self::from_built(None, options, built))
    }

    fn from_built(corpus: Option<Arc<SchemaCorpus>>, options: GrammarOptions, built: Built) -> Self {
        log::debug!(
            "grammar cache: {} states, {} distinct event type lists, {} element grammars, schema-informed={}",
            built.grammars.len(),
            built.list_count,
            built.elements.len(),
            corpus.is_some()
        );
        Self {
            corpus,
            options,
            grammars: built.grammars,
            document: built.document,
            fragment: built.fragment,
            elements: built.elements,
            types: built.types,
            list_count: built.list_count,
        }
    }

    pub fn options(&self) -> &GrammarOptions {
        &self.options
    }

    pub fn corpus(&self) -> Option<&SchemaCorpus> {
        self.corpus.as_deref()
    }

    pub fn is_schema_informed(&self) -> bool {
        self.corpus.is_some()
    }

    pub fn grammar(&self, id: GrammarId) -> &Grammar {
        &self.grammars[id.0 as usize]
    }

    pub fn document(&self) -> GrammarId {
        self.document
    }

    pub fn fragment(&self) -> GrammarId {
        self.fragment
    }

    /// Start-Zustand eines globalen Elements.
    pub fn element_grammar(&self, name: &QName) -> Option<GrammarId> {
        self.elements.get(name).copied()
    }

    /// Start-Zustand eines benannten Typs für xsi:type (Spec 8.5.4.4).
    pub fn type_grammar(&self, name: &QName, nillable: bool) -> Option<GrammarId> {
        let type_id = self.corpus.as_ref()?.named_type(name)?;
        self.types.get(&(type_id, nillable)).copied()
    }

    pub fn grammar_count(&self) -> usize {
        self.grammars.len()
    }

    /// Anzahl verschiedener EventTypeLists nach dem Interning.
    pub fn list_count(&self) -> usize {
        self.list_count
    }
}

struct Built {
    grammars: Vec<Grammar>,
    document: GrammarId,
    fragment: GrammarId,
    elements: FastHashMap<QName, GrammarId>,
    types: FastHashMap<(TypeId, bool), GrammarId>,
    list_count: usize,
}

/// Content-Zustände eines Typs.
#[derive(Clone, Copy)]
struct ContentStates {
    first: GrammarId,
    copy: GrammarId,
}

struct Builder<'c> {
    corpus: Option<&'c SchemaCorpus>,
    options: GrammarOptions,
    grammars: Vec<Option<Grammar>>,
    lists: FastHashSet<Arc<EventTypeList>>,
    starts: FastHashMap<(TypeId, bool), GrammarId>,
    nilled: FastHashMap<TypeId, GrammarId>,
    contents: FastHashMap<TypeId, ContentStates>,
    /// Reservierte, noch nicht gebaute Start-Zustände.
    pending: Vec<(TypeId, bool)>,
    pending_nilled: Vec<TypeId>,
}

impl<'c> Builder<'c> {
    fn new(corpus: Option<&'c SchemaCorpus>, options: GrammarOptions) -> Self {
        Self {
            corpus,
            options,
            grammars: Vec::new(),
            lists: FastHashSet::default(),
            starts: FastHashMap::default(),
            nilled: FastHashMap::default(),
            contents: FastHashMap::default(),
            pending: Vec::new(),
            pending_nilled: Vec::new(),
        }
    }

    fn reserve(&mut self) -> GrammarId {
        let id = GrammarId(self.grammars.len() as u32);
        self.grammars.push(None);
        id
    }

    fn intern(&mut self, list: EventTypeList) -> Arc<EventTypeList> {
        if let Some(existing) = self.lists.get(&list) {
            return Arc::clone(existing);
        }
        let list = Arc::new(list);
        self.lists.insert(Arc::clone(&list));
        list
    }

    /// Setzt einen reservierten Zustand. Tier-2 Productions liefert `tier2`.
    fn install(
        &mut self,
        id: GrammarId,
        kind: GrammarKind,
        tier1: Vec<(ItemType, Production)>,
        slots: Vec<Slot>,
        owner: (Option<TypeId>, bool),
        tier2: impl Fn(&ItemType, &[(ItemType, Production)]) -> Production,
    ) {
        let items: Vec<ItemType> = tier1.iter().map(|(i, _)| i.clone()).collect();
        let list = EventTypeList::new(items, slots);
        let mut productions: Vec<Production> = tier1.iter().map(|(_, p)| p.clone()).collect();
        for et in list.iter().skip(tier1.len()) {
            productions.push(tier2(&et.item, &tier1));
        }
        let events = self.intern(list);
        self.grammars[id.0 as usize] = Some(Grammar {
            kind,
            events,
            productions,
            type_id: owner.0,
            nillable: owner.1,
        });
    }

    /// Start-Zustand eines Typs, bei Bedarf reserviert.
    fn type_start(&mut self, type_id: TypeId, nillable: bool) -> GrammarId {
        if let Some(&id) = self.starts.get(&(type_id, nillable)) {
            return id;
        }
        let id = self.reserve();
        self.starts.insert((type_id, nillable), id);
        self.pending.push((type_id, nillable));
        id
    }

    fn nilled_start(&mut self, type_id: TypeId) -> GrammarId {
        if let Some(&id) = self.nilled.get(&type_id) {
            return id;
        }
        let id = self.reserve();
        self.nilled.insert(type_id, id);
        self.pending_nilled.push(type_id);
        id
    }

    fn build(mut self) -> Result<Built> {
        let mut elements = FastHashMap::default();
        let mut globals = Vec::new();
        if let Some(corpus) = self.corpus {
            for &eid in corpus.global_elements() {
                let decl = corpus.element(eid);
                let start = self.type_start(decl.type_id, decl.nillable);
                elements.insert(decl.name.clone(), start);
                globals.push((decl.name.clone(), start));
            }
            // xsi:type kann jeden benannten Typ referenzieren
            let mut named: Vec<TypeId> = corpus.named_types().map(|(_, id)| id).collect();
            named.sort();
            for id in named {
                self.type_start(id, false);
                self.type_start(id, true);
            }
        }

        let (document, fragment) = self.build_document(&globals);

        loop {
            if let Some((type_id, nillable)) = self.pending.pop() {
                self.build_type(type_id, nillable)?;
            } else if let Some(type_id) = self.pending_nilled.pop() {
                self.build_nilled(type_id)?;
            } else {
                break;
            }
        }

        let mut grammars = Vec::with_capacity(self.grammars.len());
        for (i, g) in self.grammars.into_iter().enumerate() {
            grammars.push(g.ok_or_else(|| {
                Error::schema_violation(format!("grammar state #{i} reserved but never built"))
            })?);
        }
        Ok(Built {
            grammars,
            document,
            fragment,
            elements,
            types: self.starts,
            list_count: self.lists.len(),
        })
    }

    /// Document- und Fragment-Grammar (Spec 8.4.1, 8.4.2, 8.5.1, 8.5.2).
    fn build_document(&mut self, globals: &[(QName, GrammarId)]) -> (GrammarId, GrammarId) {
        let opts = self.options;
        let document = self.reserve();
        let doc_content = self.reserve();
        let doc_end = self.reserve();

        self.install(
            document,
            GrammarKind::Document,
            vec![(ItemType::StartDocument, Production::to(doc_content))],
            Vec::new(),
            (None, false),
            |_, _| Production::end(),
        );

        let mut tier1: Vec<(ItemType, Production)> = globals
            .iter()
            .map(|(name, start)| {
                let p = Production { child: Some(*start), ..Production::to(doc_end) };
                (ItemType::StartElement(name.clone()), p)
            })
            .collect();
        tier1.push((ItemType::StartElementGeneric, Production::to(doc_end)));
        self.install(
            doc_content,
            GrammarKind::DocContent,
            tier1,
            undeclared::doc_content_tier2(&opts),
            (None, false),
            move |_, _| Production::to(doc_content),
        );

        self.install(
            doc_end,
            GrammarKind::DocEnd,
            vec![(ItemType::EndDocument, Production::end())],
            undeclared::misc_tier2(&opts),
            (None, false),
            move |_, _| Production::to(doc_end),
        );

        let fragment = self.reserve();
        let frag_content = self.reserve();
        self.install(
            fragment,
            GrammarKind::Fragment,
            vec![(ItemType::StartDocument, Production::to(frag_content))],
            Vec::new(),
            (None, false),
            |_, _| Production::end(),
        );
        let mut tier1: Vec<(ItemType, Production)> = globals
            .iter()
            .map(|(name, start)| {
                let p = Production { child: Some(*start), ..Production::to(frag_content) };
                (ItemType::StartElement(name.clone()), p)
            })
            .collect();
        tier1.push((ItemType::StartElementGeneric, Production::to(frag_content)));
        tier1.push((ItemType::EndDocument, Production::end()));
        self.install(
            frag_content,
            GrammarKind::FragmentContent,
            tier1,
            undeclared::misc_tier2(&opts),
            (None, false),
            move |_, _| Production::to(frag_content),
        );

        (document, fragment)
    }

    fn corpus(&self) -> Result<&'c SchemaCorpus> {
        self.corpus
            .ok_or_else(|| Error::schema_violation("type grammar without schema"))
    }

    /// Attribute (sortiert nach local-name, dann URI), Wildcard und Content eines Typs.
    fn type_parts(&self, type_id: TypeId) -> Result<(Vec<AttributeUse>, Option<NamespaceConstraint>)> {
        let def = self.corpus()?.type_def(type_id);
        Ok(match &def.kind {
            TypeKind::Simple(_) => (Vec::new(), None),
            TypeKind::Complex(c) => {
                let mut attrs = c.attributes.clone();
                attrs.sort_by(|a, b| a.name.cmp(&b.name));
                (attrs, c.attribute_wildcard.clone())
            }
        })
    }

    fn needs_xsi_type(&self, type_id: TypeId) -> Result<bool> {
        let corpus = self.corpus()?;
        Ok(corpus.has_named_subtypes(type_id) || corpus.is_union(type_id))
    }

    fn build_type(&mut self, type_id: TypeId, nillable: bool) -> Result<()> {
        let start = self.starts[&(type_id, nillable)];
        let content = self.content_states(type_id)?;
        let (attrs, wildcard) = self.type_parts(type_id)?;
        let needs_type = self.needs_xsi_type(type_id)?;
        let strict = self.options.strict();
        // NIL nur für nillable Elemente im Strict-Modus (Spec 8.5.4.4.2)
        let nil_target = (!strict || nillable).then(|| self.nilled_start(type_id));

        let mut ids = vec![start];
        for _ in 0..attrs.len() {
            ids.push(self.reserve());
        }
        for i in 0..=attrs.len() {
            let area = if i == 0 { Area::FirstAttribute } else { Area::Attribute };
            let mut tier1 = attribute_tier1(&attrs, &wildcard, i, &ids);
            if attrs[i..].iter().all(|a| !a.required) {
                let c0 = self.grammars[content.first.0 as usize]
                    .as_ref()
                    .ok_or_else(|| Error::schema_violation("content state not built"))?;
                let declared = c0.events.iter().take_while(|t| t.is_declared()).count();
                for (et, p) in c0.events.iter().zip(&c0.productions).take(declared) {
                    tier1.push((et.item.clone(), p.clone()));
                }
            }
            let ctx = Tier2Context {
                area,
                has_ee_in_tier1: tier1.iter().any(|(item, _)| *item == ItemType::EndElement),
                needs_xsi_type: needs_type,
                nillable,
            };
            let items: Vec<ItemType> = tier1.iter().map(|(item, _)| item.clone()).collect();
            let slots = undeclared::element_tier2(&ctx, &items, &self.options);
            let this = ids[i];
            let copy = content.copy;
            self.install(
                this,
                GrammarKind::ElementStartTag,
                tier1,
                slots,
                (Some(type_id), nillable),
                |item, tier1| match item {
                    ItemType::EndElement | ItemType::TypeCast => Production::end(),
                    ItemType::Nil => Production { next: nil_target, ..Production::end() },
                    ItemType::AttributeUntyped(q) => untyped_successor(q, tier1, this),
                    ItemType::StartElementGeneric
                    | ItemType::CharactersUntyped
                    | ItemType::EntityReference => Production::to(copy),
                    _ => Production::to(this),
                },
            );
        }
        Ok(())
    }

    /// Zustände nach `xsi:nil="true"`: nur noch Attribute und EE.
    fn build_nilled(&mut self, type_id: TypeId) -> Result<()> {
        let start = self.nilled[&type_id];
        let (attrs, wildcard) = self.type_parts(type_id)?;
        let mut ids = vec![start];
        for _ in 0..attrs.len() {
            ids.push(self.reserve());
        }
        for i in 0..=attrs.len() {
            let mut tier1 = attribute_tier1(&attrs, &wildcard, i, &ids);
            if attrs[i..].iter().all(|a| !a.required) {
                tier1.push((ItemType::EndElement, Production::end()));
            }
            let ctx = Tier2Context {
                area: Area::Nilled,
                has_ee_in_tier1: tier1.iter().any(|(item, _)| *item == ItemType::EndElement),
                needs_xsi_type: false,
                nillable: false,
            };
            let items: Vec<ItemType> = tier1.iter().map(|(item, _)| item.clone()).collect();
            let slots = undeclared::element_tier2(&ctx, &items, &self.options);
            let this = ids[i];
            self.install(
                this,
                GrammarKind::NilledContent,
                tier1,
                slots,
                (Some(type_id), false),
                |item, tier1| match item {
                    ItemType::EndElement => Production::end(),
                    ItemType::AttributeUntyped(q) => untyped_successor(q, tier1, this),
                    _ => Production::to(this),
                },
            );
        }
        Ok(())
    }

    /// Content-Zustände eines Typs, einmal pro Typ gebaut.
    fn content_states(&mut self, type_id: TypeId) -> Result<ContentStates> {
        if let Some(&states) = self.contents.get(&type_id) {
            return Ok(states);
        }
        let owner = (Some(type_id), false);
        let content = match &self.corpus()?.type_def(type_id).kind {
            TypeKind::Simple(s) => ContentType::Simple(s.datatype),
            TypeKind::Complex(c) => c.content.clone(),
        };

        let first = match content {
            ContentType::Empty => {
                let c0 = self.reserve();
                self.install_content(c0, GrammarKind::ElementContent, vec![(ItemType::EndElement, Production::end())], owner);
                c0
            }
            ContentType::Simple(datatype) => {
                let c0 = self.reserve();
                let c1 = self.reserve();
                let ch = Production { datatype: Some(datatype), ..Production::to(c1) };
                self.install_content(c0, GrammarKind::ElementContent, vec![(ItemType::Characters, ch)], owner);
                self.install_content(c1, GrammarKind::ElementContent, vec![(ItemType::EndElement, Production::end())], owner);
                c0
            }
            ContentType::ElementOnly(particle) => self.particle_states(&particle, false, owner)?,
            ContentType::Mixed(particle) => self.particle_states(&particle, true, owner)?,
        };

        let copy = self.reserve();
        let c0 = self.grammars[first.0 as usize]
            .clone()
            .ok_or_else(|| Error::schema_violation("content state not built"))?;
        self.grammars[copy.0 as usize] = Some(Grammar { kind: GrammarKind::ContentCopy, ..c0 });

        let states = ContentStates { first, copy };
        self.contents.insert(type_id, states);
        Ok(states)
    }

    /// Content-Zustand mit den Tier-2 Slots eines Content-Bereichs.
    fn install_content(
        &mut self,
        id: GrammarId,
        kind: GrammarKind,
        tier1: Vec<(ItemType, Production)>,
        owner: (Option<TypeId>, bool),
    ) {
        let ctx = Tier2Context {
            area: Area::Content,
            has_ee_in_tier1: tier1.iter().any(|(item, _)| *item == ItemType::EndElement),
            needs_xsi_type: false,
            nillable: false,
        };
        let items: Vec<ItemType> = tier1.iter().map(|(item, _)| item.clone()).collect();
        let slots = undeclared::element_tier2(&ctx, &items, &self.options);
        self.install(id, kind, tier1, slots, owner, |item, tier1| match item {
            ItemType::EndElement => Production::end(),
            // untyped CH hat denselben Nachfolger wie das typisierte CH
            ItemType::CharactersUntyped => tier1
                .iter()
                .find(|(i, _)| *i == ItemType::Characters)
                .and_then(|(_, p)| p.next)
                .map_or_else(|| Production::to(id), Production::to),
            _ => Production::to(id),
        });
    }

    /// Content-Zustände aus einem Particle (Spec 8.5.4.1.5 – 8.5.4.1.8).
    ///
    /// Jede Fortsetzung ist ein Zustand; gleiche Fortsetzungen teilen sich
    /// eine [`GrammarId`].
    fn particle_states(
        &mut self,
        particle: &crate::schema::Particle,
        mixed: bool,
        owner: (Option<TypeId>, bool),
    ) -> Result<GrammarId> {
        let corpus = self.corpus()?;
        let arena = ParticleArena::new(particle)?;
        let mut states: FastHashMap<Continuation, GrammarId> = FastHashMap::default();
        let mut queue: Vec<Continuation> = Vec::new();

        let initial = arena.initial();
        let first = self.reserve();
        states.insert(initial.clone(), first);
        queue.push(initial);

        while let Some(cont) = queue.pop() {
            let this = states[&cont];
            let expansion = arena.expand(&cont);

            let mut named = Vec::new();
            let mut by_uri = Vec::new();
            let mut generic = Vec::new();
            let mut seen: FastHashSet<(ItemType, Option<NamespaceConstraint>)> = FastHashSet::default();

            for (terminal, after) in expansion.moves {
                let next = match states.get(&after) {
                    Some(&id) => id,
                    None => {
                        let id = self.reserve();
                        states.insert(after.clone(), id);
                        queue.push(after);
                        id
                    }
                };
                match terminal {
                    Terminal::Element(eid) => {
                        let decl = corpus.element(eid);
                        let item = ItemType::StartElement(decl.name.clone());
                        if seen.insert((item.clone(), None)) {
                            let child = self.type_start(decl.type_id, decl.nillable);
                            named.push((item, Production { child: Some(child), ..Production::to(next) }));
                        }
                    }
                    Terminal::Wildcard(NamespaceConstraint::List(uris)) => {
                        for uri in uris {
                            let item = ItemType::StartElementNs(uri);
                            if seen.insert((item.clone(), None)) {
                                by_uri.push((item, Production::to(next)));
                            }
                        }
                    }
                    Terminal::Wildcard(ns) => {
                        let filter = match ns {
                            NamespaceConstraint::Any => None,
                            other => Some(other),
                        };
                        if seen.insert((ItemType::StartElementGeneric, filter.clone())) {
                            let p = Production { filter, ..Production::to(next) };
                            generic.push((ItemType::StartElementGeneric, p));
                        }
                    }
                }
            }

            let mut tier1 = named;
            tier1.extend(by_uri);
            tier1.extend(generic);
            if expansion.can_end {
                tier1.push((ItemType::EndElement, Production::end()));
            }
            if mixed {
                let ch = Production { datatype: Some(Datatype::String), ..Production::to(this) };
                tier1.push((ItemType::Characters, ch));
            }
            let kind = if cont.iter().any(|f| matches!(f, Frame::All { .. })) {
                GrammarKind::AllGroupRemainder
            } else {
                GrammarKind::ElementContent
            };
            self.install_content(this, kind, tier1, owner);
        }
        Ok(first)
    }
}

/// Tier-1 Attribut-Einträge von A_i (Spec 8.5.4.1.3.1).
///
/// Attribute ab Position `i` bis einschließlich des ersten Pflicht-Attributs,
/// danach die Attribut-Wildcard als Schleife auf A_i.
fn attribute_tier1(
    attrs: &[AttributeUse],
    wildcard: &Option<NamespaceConstraint>,
    i: usize,
    ids: &[GrammarId],
) -> Vec<(ItemType, Production)> {
    let mut tier1 = Vec::new();
    for (j, attr) in attrs.iter().enumerate().skip(i) {
        let p = Production { datatype: Some(attr.datatype), ..Production::to(ids[j + 1]) };
        tier1.push((ItemType::Attribute(attr.name.clone()), p));
        if attr.required {
            break;
        }
    }
    match wildcard {
        None => {}
        Some(NamespaceConstraint::Any) => {
            tier1.push((ItemType::AttributeGeneric, Production::to(ids[i])));
        }
        Some(NamespaceConstraint::List(uris)) => {
            for uri in uris {
                tier1.push((ItemType::AttributeNs(Arc::clone(uri)), Production::to(ids[i])));
            }
        }
        Some(other) => {
            let p = Production { filter: Some(other.clone()), ..Production::to(ids[i]) };
            tier1.push((ItemType::AttributeGeneric, p));
        }
    }
    tier1
}

/// AT(qname)[untyped] führt zum selben Zustand wie das typisierte AT(qname).
fn untyped_successor(q: &QName, tier1: &[(ItemType, Production)], fallback: GrammarId) -> Production {
    tier1
        .iter()
        .find(|(item, _)| matches!(item, ItemType::Attribute(a) if a == q))
        .and_then(|(_, p)| p.next)
        .map_or_else(|| Production::to(fallback), Production::to)
}
