//! Built-in Element Grammars mit Lernen (Spec 8.4.3).
//!
//! Elemente ohne Schema-Deklaration nutzen pro Element-QName zwei Zustände:
//! StartTagContent und ElementContent. Ein Event, das über eine generische
//! Tier-2 Production kodiert wurde, wird als Tier-1 Production für genau
//! diesen QName gelernt und steht danach mit Code 0 vorne in der Liste.
//!
//! Die gelernten Listen gehören zum Dokument, nicht zum Grammar Cache. Jede
//! Änderung baut eine neue `Arc<EventTypeList>` (copy-on-grow); Encoder und
//! Decoder sehen nach gleichen Events dieselbe Liste.

use std::sync::Arc;

use crate::event_type::{EventTypeList, ItemType, Slot};
use crate::options::GrammarOptions;
use crate::qname::QName;
use crate::undeclared;
use crate::FastHashMap;

#[derive(Debug, Clone)]
struct Learned {
    start_items: Vec<ItemType>,
    content_items: Vec<ItemType>,
    start: Arc<EventTypeList>,
    content: Arc<EventTypeList>,
}

/// Gelernte Built-in Grammars eines Dokuments.
#[derive(Debug, Clone)]
pub struct BuiltinGrammars {
    start_tier2: Vec<Slot>,
    content_tier2: Vec<Slot>,
    /// Listen ohne gelernte Productions.
    start: Arc<EventTypeList>,
    content: Arc<EventTypeList>,
    elements: FastHashMap<QName, Learned>,
}

impl BuiltinGrammars {
    pub fn new(options: &GrammarOptions) -> Self {
        let p = options.preserve();
        let mut start_tier2 = vec![Slot::Single(ItemType::EndElement), Slot::Single(ItemType::AttributeGeneric)];
        if p.prefixes {
            start_tier2.push(Slot::Single(ItemType::NamespaceDeclaration));
        }
        if options.self_contained() {
            start_tier2.push(Slot::Single(ItemType::SelfContained));
        }
        let mut content_tier2 = vec![
            Slot::Single(ItemType::StartElementGeneric),
            Slot::Single(ItemType::CharactersUntyped),
        ];
        if p.dtd {
            content_tier2.push(Slot::Single(ItemType::EntityReference));
        }
        content_tier2.extend(undeclared::cm_pi_slot(options));
        start_tier2.extend(content_tier2.iter().cloned());

        let start = Arc::new(EventTypeList::new(Vec::new(), start_tier2.clone()));
        let content = Arc::new(EventTypeList::new(vec![ItemType::EndElement], content_tier2.clone()));
        Self { start_tier2, content_tier2, start, content, elements: FastHashMap::default() }
    }

    /// Aktuelle Liste für `qname`, StartTagContent oder ElementContent.
    pub fn events(&self, qname: &QName, content: bool) -> Arc<EventTypeList> {
        match (self.elements.get(qname), content) {
            (Some(l), false) => Arc::clone(&l.start),
            (Some(l), true) => Arc::clone(&l.content),
            (None, false) => Arc::clone(&self.start),
            (None, true) => Arc::clone(&self.content),
        }
    }

    /// Lernt `item` als neue Tier-1 Production mit Code 0.
    ///
    /// Bereits gelernte Items werden nicht doppelt aufgenommen.
    pub fn learn(&mut self, qname: &QName, content: bool, item: ItemType) {
        let start = &self.start;
        let content_list = &self.content;
        let learned = self.elements.entry(qname.expanded()).or_insert_with(|| Learned {
            start_items: Vec::new(),
            content_items: Vec::new(),
            start: Arc::clone(start),
            content: Arc::clone(content_list),
        });
        let items = if content { &mut learned.content_items } else { &mut learned.start_items };
        if items.contains(&item) {
            return;
        }
        log::debug!(
            "learned {} in {} of {qname}",
            item.label(),
            if content { "ElementContent" } else { "StartTagContent" }
        );
        items.insert(0, item);

        if content {
            let mut tier1 = learned.content_items.clone();
            tier1.push(ItemType::EndElement);
            learned.content = Arc::new(EventTypeList::new(tier1, self.content_tier2.clone()));
        } else {
            learned.start = Arc::new(EventTypeList::new(learned.start_items.clone(), self.start_tier2.clone()));
        }
    }

    /// Anzahl gelernter Productions (StartTagContent, ElementContent).
    pub fn learned_count(&self, qname: &QName) -> (usize, usize) {
        self.elements
            .get(qname)
            .map_or((0, 0), |l| (l.start_items.len(), l.content_items.len()))
    }
}

/// Folgezustand nach einem Event in einer Built-in Grammar.
///
/// `None` beendet das Element, `Some(true)` führt nach ElementContent,
/// `Some(false)` bleibt in StartTagContent.
pub fn successor(item: &ItemType, content: bool) -> Option<bool> {
    match item {
        ItemType::EndElement => None,
        ItemType::Attribute(_)
        | ItemType::AttributeGeneric
        | ItemType::NamespaceDeclaration
        | ItemType::SelfContained => Some(content),
        _ => Some(true),
    }
}

/// Das Item, das ein generisch kodiertes Event lernt (Spec 8.4.3).
///
/// xsi:type und xsi:nil werden nicht gelernt; EE wird nur in
/// StartTagContent gelernt, in ElementContent steht es schon in Tier 1.
pub fn learnable(item: &ItemType, qname: Option<&QName>, content: bool) -> Option<ItemType> {
    match (item, qname) {
        (ItemType::AttributeGeneric, Some(q)) if !q.is_xsi_type() && !q.is_xsi_nil() => {
            Some(ItemType::Attribute(q.expanded()))
        }
        (ItemType::StartElementGeneric, Some(q)) => Some(ItemType::StartElement(q.expanded())),
        (ItemType::CharactersUntyped, _) => Some(ItemType::Characters),
        (ItemType::EndElement, _) if !content => Some(ItemType::EndElement),
        _ => None,
    }
}
