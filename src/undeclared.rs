//! Undeclared Productions für Schema-informed Grammars (Spec 8.5.4.4).
//!
//! Dieses Modul liefert die Tier-2 Slots eines Grammar-Zustands:
//! - Comments, Processing Instructions (CM, PI)
//! - Entity References (ER), Namespace Declarations (NS), SC
//! - Schema-Deviations (SE(*), CH[untyped], AT(*), AT(qname)[untyped])
//! - xsi:type, xsi:nil (TYPE, NIL)
//!
//! Die Nachfolge-Zustände vergibt der Grammar-Builder; hier wird nur
//! festgelegt, welche Slots es gibt und in welcher Reihenfolge.
//!
//! # Spec-Referenz
//!
//! - 8.5.4.4.1 Adding Productions when Strict is False
//! - 8.5.4.4.2 Adding Productions when Strict is True

use crate::event_type::{ItemType, Slot};
use crate::options::GrammarOptions;

/// Bereich eines Element-Zustands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    /// Erster Start-Tag Zustand (A_0): TYPE, NIL, NS, SC möglich.
    FirstAttribute,
    /// Weitere Start-Tag Zustände (A_i, i > 0).
    Attribute,
    /// Content-Zustände.
    Content,
    /// Start-Tag nach xsi:nil="true".
    Nilled,
}

/// Kontext für die Tier-2 Generierung eines Zustands.
#[derive(Debug, Clone, Copy)]
pub struct Tier2Context {
    pub area: Area,
    /// EE steht schon in Tier 1 (kein zweites EE in Tier 2).
    pub has_ee_in_tier1: bool,
    /// Spec 8.5.4.4.2: Typ hat benannte Subtypen oder ist ein Union.
    pub needs_xsi_type: bool,
    pub nillable: bool,
}

/// CM/PI: Gruppe wenn beide aktiv, sonst ein einzelner Slot (Spec 8.5.4.4.1).
pub fn cm_pi_slot(options: &GrammarOptions) -> Option<Slot> {
    let p = options.preserve();
    match (p.comments, p.pis) {
        (true, true) => Some(Slot::Group(vec![ItemType::Comment, ItemType::ProcessingInstruction])),
        (true, false) => Some(Slot::Single(ItemType::Comment)),
        (false, true) => Some(Slot::Single(ItemType::ProcessingInstruction)),
        (false, false) => None,
    }
}

/// Tier-3 Gruppe AT(qname)[untyped] zu allen deklarierten AT in Tier 1.
fn untyped_attribute_group(tier1: &[ItemType]) -> Slot {
    Slot::Group(
        tier1
            .iter()
            .filter_map(|item| match item {
                ItemType::Attribute(q) => Some(ItemType::AttributeUntyped(q.clone())),
                _ => None,
            })
            .collect(),
    )
}

/// Tier-2 Slots eines Element-Zustands.
///
/// Reihenfolge (Spec 8.5.4.4.1): EE, TYPE, NIL, AT(*), AT[untyped], NS, SC,
/// SE(*), CH[untyped], ER, CM/PI. Im Strict-Modus nur TYPE und NIL im
/// ersten Zustand (Spec 8.5.4.4.2).
pub fn element_tier2(ctx: &Tier2Context, tier1: &[ItemType], options: &GrammarOptions) -> Vec<Slot> {
    let first = ctx.area == Area::FirstAttribute;
    let mut slots = Vec::new();

    if options.strict() {
        if first && ctx.needs_xsi_type {
            slots.push(Slot::Single(ItemType::TypeCast));
        }
        if first && ctx.nillable {
            slots.push(Slot::Single(ItemType::Nil));
        }
        return slots;
    }

    if !ctx.has_ee_in_tier1 {
        slots.push(Slot::Single(ItemType::EndElement));
    }
    if first {
        slots.push(Slot::Single(ItemType::TypeCast));
        slots.push(Slot::Single(ItemType::Nil));
    }
    let in_start_tag = ctx.area != Area::Content;
    if in_start_tag {
        slots.push(Slot::Single(ItemType::AttributeGeneric));
        slots.push(untyped_attribute_group(tier1));
    }
    if first && options.preserve().prefixes {
        slots.push(Slot::Single(ItemType::NamespaceDeclaration));
    }
    if first && options.self_contained() {
        slots.push(Slot::Single(ItemType::SelfContained));
    }
    // nach xsi:nil="true" gibt es keinen Content
    if ctx.area != Area::Nilled {
        slots.push(Slot::Single(ItemType::StartElementGeneric));
        slots.push(Slot::Single(ItemType::CharactersUntyped));
        if options.preserve().dtd {
            slots.push(Slot::Single(ItemType::EntityReference));
        }
    }
    slots.extend(cm_pi_slot(options));
    slots
}

/// Tier-2 Slots von DocContent (Spec 8.4.1): DT, CM/PI.
pub fn doc_content_tier2(options: &GrammarOptions) -> Vec<Slot> {
    let mut slots = Vec::new();
    if options.preserve().dtd {
        slots.push(Slot::Single(ItemType::DocType));
    }
    slots.extend(cm_pi_slot(options));
    slots
}

/// Tier-2 Slots von DocEnd, Fragment-Content und allen anderen
/// Dokument-Zuständen mit Kommentaren: nur CM/PI.
pub fn misc_tier2(options: &GrammarOptions) -> Vec<Slot> {
    cm_pi_slot(options).into_iter().collect()
}
