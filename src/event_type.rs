//! Event Types und EventTypeLists (Spec 8.2, 8.5.4.4).
//!
//! [`ItemType`] ist die geschlossene Menge aller Production-Arten. Eine
//! [`EventTypeList`] ordnet einem Grammar-Zustand seine Event Types in
//! Tier-Reihenfolge zu und vergibt die Event Codes. Listen mit gleichem Inhalt
//! sind gleich und werden im Grammar Cache nur einmal gehalten.

use std::sync::Arc;

use crate::event_code::{CodeLayout, EventCode};
use crate::qname::QName;

/// Art einer Production (Spec 8.2, Table 8-1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemType {
    StartDocument,
    EndDocument,
    /// SE(qname)
    StartElement(QName),
    /// SE(uri:*)
    StartElementNs(Arc<str>),
    /// SE(*)
    StartElementGeneric,
    EndElement,
    /// AT(qname) mit typisiertem Value
    Attribute(QName),
    /// AT(qname) [untyped value], nur in Tier 3
    AttributeUntyped(QName),
    /// AT(uri:*)
    AttributeNs(Arc<str>),
    /// AT(*)
    AttributeGeneric,
    /// CH mit Schema-Datatype
    Characters,
    /// CH [untyped value]
    CharactersUntyped,
    /// AT(xsi:type)
    TypeCast,
    /// AT(xsi:nil)
    Nil,
    NamespaceDeclaration,
    SelfContained,
    Comment,
    ProcessingInstruction,
    DocType,
    EntityReference,
}

impl ItemType {
    /// Kurzform für Logs und Fehlermeldungen.
    pub fn label(&self) -> String {
        match self {
            Self::StartDocument => "SD".into(),
            Self::EndDocument => "ED".into(),
            Self::StartElement(q) => format!("SE({q})"),
            Self::StartElementNs(uri) => format!("SE({uri}:*)"),
            Self::StartElementGeneric => "SE(*)".into(),
            Self::EndElement => "EE".into(),
            Self::Attribute(q) => format!("AT({q})"),
            Self::AttributeUntyped(q) => format!("AT({q})[untyped]"),
            Self::AttributeNs(uri) => format!("AT({uri}:*)"),
            Self::AttributeGeneric => "AT(*)".into(),
            Self::Characters => "CH".into(),
            Self::CharactersUntyped => "CH[untyped]".into(),
            Self::TypeCast => "AT(xsi:type)".into(),
            Self::Nil => "AT(xsi:nil)".into(),
            Self::NamespaceDeclaration => "NS".into(),
            Self::SelfContained => "SC".into(),
            Self::Comment => "CM".into(),
            Self::ProcessingInstruction => "PI".into(),
            Self::DocType => "DT".into(),
            Self::EntityReference => "ER".into(),
        }
    }
}

/// Ein Event Type mit Position und Code innerhalb seiner Liste.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventType {
    pub item: ItemType,
    pub index: usize,
    pub code: EventCode,
}

impl EventType {
    /// Tier-Tiefe 1-3, gleich der Anzahl Code-Teile.
    pub fn tier(&self) -> u8 {
        self.code.length()
    }

    /// Tier-1 Productions sind deklariert, alles darunter undeclared.
    pub fn is_declared(&self) -> bool {
        self.tier() == 1
    }
}

/// Slot in Tier 2: einzelner Event Type oder Tier-3 Gruppe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Single(ItemType),
    Group(Vec<ItemType>),
}

/// Geordnete Liste aller Event Types eines Zustands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventTypeList {
    types: Vec<EventType>,
    ee: Option<usize>,
    layout: CodeLayout,
}

impl EventTypeList {
    /// Baut die Liste aus Tier-1 Einträgen und Tier-2 Slots.
    ///
    /// Leere Gruppen werden übersprungen.
    pub fn new(tier1: Vec<ItemType>, tier2: Vec<Slot>) -> Self {
        let tier1_len = tier1.len() as u32;
        let mut types = Vec::with_capacity(tier1.len() + tier2.len());
        for (i, item) in tier1.into_iter().enumerate() {
            types.push(EventType { item, index: i, code: EventCode::one(i as u32) });
        }

        let mut slots = Vec::new();
        for slot in tier2 {
            let part2 = slots.len() as u32;
            match slot {
                Slot::Single(item) => {
                    slots.push(None);
                    let index = types.len();
                    types.push(EventType { item, index, code: EventCode::two(tier1_len, part2) });
                }
                Slot::Group(items) if items.is_empty() => {}
                Slot::Group(items) => {
                    slots.push(Some(items.len() as u32));
                    for (k, item) in items.into_iter().enumerate() {
                        let index = types.len();
                        let code = EventCode::three(tier1_len, part2, k as u32);
                        types.push(EventType { item, index, code });
                    }
                }
            }
        }

        let ee = types.iter().position(|t| t.item == ItemType::EndElement);
        Self { types, ee, layout: CodeLayout::new(tier1_len, slots) }
    }

    pub fn length(&self) -> usize {
        self.types.len()
    }

    pub fn item(&self, index: usize) -> Option<&EventType> {
        self.types.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventType> {
        self.types.iter()
    }

    /// Das erste EE der Liste, deklariert oder undeclared.
    pub fn generic_end_element(&self) -> Option<&EventType> {
        self.ee.map(|i| &self.types[i])
    }

    pub fn layout(&self) -> &CodeLayout {
        &self.layout
    }

    /// Sucht den Event Type zu einem gelesenen Code.
    pub fn by_code(&self, code: &EventCode) -> Option<&EventType> {
        if code.part2().is_none() {
            return self.types.get(code.part1() as usize);
        }
        self.types.iter().find(|t| t.code == *code)
    }

    /// Erster Index mit passendem Item.
    pub fn position(&self, pred: impl Fn(&ItemType) -> bool) -> Option<usize> {
        self.types.iter().position(|t| pred(&t.item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EventTypeList {
        EventTypeList::new(
            vec![ItemType::StartElement(QName::local("a")), ItemType::EndElement],
            vec![
                Slot::Single(ItemType::AttributeGeneric),
                Slot::Group(vec![]),
                Slot::Group(vec![
                    ItemType::AttributeUntyped(QName::local("x")),
                    ItemType::AttributeUntyped(QName::local("y")),
                ]),
                Slot::Single(ItemType::CharactersUntyped),
            ],
        )
    }

    #[test]
    fn codes_und_tiers() {
        let list = sample();
        assert_eq!(list.length(), 6);
        assert_eq!(list.item(1).unwrap().code, EventCode::one(1));
        assert_eq!(list.item(2).unwrap().code, EventCode::two(2, 0));
        // leere Gruppe belegt keinen Slot
        assert_eq!(list.item(4).unwrap().code, EventCode::three(2, 1, 1));
        assert_eq!(list.item(5).unwrap().code, EventCode::two(2, 2));
        assert_eq!(list.item(4).unwrap().tier(), 3);
        assert!(list.item(0).unwrap().is_declared());
    }

    #[test]
    fn generic_end_element_index() {
        let list = sample();
        assert_eq!(list.generic_end_element().map(|t| t.index), Some(1));
        let without = EventTypeList::new(vec![ItemType::Characters], vec![]);
        assert!(without.generic_end_element().is_none());
    }

    #[test]
    fn lookup_per_code() {
        let list = sample();
        let t = list.by_code(&EventCode::three(2, 1, 0)).unwrap();
        assert_eq!(t.item, ItemType::AttributeUntyped(QName::local("x")));
        assert!(list.by_code(&EventCode::one(7)).is_none());
    }

    #[test]
    fn gleicher_inhalt_ist_gleich() {
        assert_eq!(sample(), sample());
    }

    #[test]
    fn layout_aus_slots() {
        let list = sample();
        assert_eq!(list.layout().tier1_len(), 2);
        assert_eq!(list.layout().slots(), &[None, Some(2), None]);
    }
}
