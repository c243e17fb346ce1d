//! Laufzeit-Zustand eines Dokuments: Frame-Stack, String Table und gelernte
//! Grammars (Spec 8.4, 8.5).
//!
//! Encoder und Decoder teilen sich diese Zustandsmaschine. Beide suchen
//! zuerst den passenden Event Type (per Event bzw. per gelesenem Code) und
//! rufen dann dieselbe Übergangsfunktion auf. So wachsen Frame-Stack,
//! String Table und Built-in Grammars auf beiden Seiten identisch.

use std::sync::Arc;

use crate::builtin::{self, BuiltinGrammars};
use crate::event_type::{EventType, EventTypeList, ItemType};
use crate::grammar::{GrammarCache, GrammarId, Production};
use crate::options::{GrammarOptions, StreamOptions};
use crate::qname::QName;
use crate::schema::Datatype;
use crate::string_table::StringTable;
use crate::{Error, Result};

/// Verweis auf den aktuellen Zustand eines Frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StateRef {
    Template(GrammarId),
    /// Built-in Grammar des Frame-QNames, StartTagContent oder ElementContent.
    Builtin { content: bool },
}

/// String Table und Built-in Grammars außerhalb eines SC-Fragments.
#[derive(Debug)]
struct Saved {
    table: StringTable,
    builtins: BuiltinGrammars,
}

/// Ein Eintrag im Element-Stack.
#[derive(Debug)]
pub(crate) struct Frame {
    pub qname: QName,
    pub state: StateRef,
    pub nillable: bool,
    /// Nur bei Fragment-Frames eines SC-Elements gesetzt.
    saved: Option<Box<Saved>>,
}

impl Frame {
    fn new(qname: QName, state: StateRef, nillable: bool) -> Self {
        Self { qname, state, nillable, saved: None }
    }

    fn fork(&self) -> Self {
        Self::new(self.qname.clone(), self.state, self.nillable)
    }
}

/// Zustand einer Encoder- oder Decoder-Session.
#[derive(Debug)]
pub(crate) struct Session {
    cache: Arc<GrammarCache>,
    pub(crate) table: StringTable,
    builtins: BuiltinGrammars,
    frames: Vec<Frame>,
    /// Für die frische String Table eines SC-Fragments.
    stream: StreamOptions,
    aligned: bool,
}

impl Session {
    pub fn new(cache: Arc<GrammarCache>, stream: StreamOptions) -> Self {
        let table = StringTable::new(cache.corpus(), &stream);
        let builtins = BuiltinGrammars::new(cache.options());
        let document = Frame::new(QName::local(""), StateRef::Template(cache.document()), false);
        Self {
            table,
            builtins,
            frames: vec![document],
            aligned: stream.alignment().is_byte_oriented(),
            stream,
            cache,
        }
    }

    pub fn options(&self) -> &GrammarOptions {
        self.cache.options()
    }

    /// Event Codes und n-bit Werte byteweise.
    pub fn aligned(&self) -> bool {
        self.aligned
    }

    /// Alle Frames inklusive Dokument-Frame wurden beendet.
    pub fn is_finished(&self) -> bool {
        self.frames.is_empty()
    }

    fn top(&self) -> Result<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| Error::ordering_violation("no further event", "event after ED"))
    }

    fn top_mut(&mut self) -> Result<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| Error::ordering_violation("no further event", "event after ED"))
    }

    /// QName des aktuellen Elements (Key für CH-Values).
    pub fn element_qname(&self) -> Result<QName> {
        Ok(self.top()?.qname.clone())
    }

    /// EventTypeList des aktuellen Zustands.
    pub fn events(&self) -> Result<Arc<EventTypeList>> {
        let top = self.top()?;
        Ok(match top.state {
            StateRef::Template(id) => Arc::clone(&self.cache.grammar(id).events),
            StateRef::Builtin { content } => self.builtins.events(&top.qname, content),
        })
    }

    /// Production zum Index, nur in Schema-Grammars.
    pub fn production(&self, index: usize) -> Option<&Production> {
        match self.frames.last()?.state {
            StateRef::Template(id) => self.cache.grammar(id).production(index),
            StateRef::Builtin { .. } => None,
        }
    }

    /// Beschreibung des Zustands für Fehlermeldungen.
    pub fn state_label(&self) -> String {
        match self.frames.last() {
            None => "terminated".into(),
            Some(f) => match f.state {
                StateRef::Template(id) => format!("{} of {}", self.cache.grammar(id), f.qname),
                StateRef::Builtin { content: false } => format!("StartTagContent of {}", f.qname),
                StateRef::Builtin { content: true } => format!("ElementContent of {}", f.qname),
            },
        }
    }

    pub fn in_builtin(&self) -> bool {
        matches!(self.frames.last(), Some(Frame { state: StateRef::Builtin { .. }, .. }))
    }

    /// Datatype für AT/CH Values; `None` bedeutet String über die String Table.
    ///
    /// Mit erhaltenen lexikalischen Werten ist jeder Value ein String.
    pub fn typed_datatype(&self, et: &EventType) -> Option<Datatype> {
        if self.options().preserve().lexical_values {
            return None;
        }
        match et.item {
            ItemType::Attribute(_) | ItemType::Characters => {
                self.production(et.index)?.datatype.filter(|d| *d != Datatype::String)
            }
            _ => None,
        }
    }

    /// Übergang für alle Events außer SE, EE, ED, TYPE und NIL.
    ///
    /// In Built-in Grammars wird hier gelernt (Spec 8.4.3).
    pub fn advance(&mut self, et: &EventType, qname: Option<&QName>) -> Result<()> {
        let next = match self.top()?.state {
            StateRef::Template(id) => match self.cache.grammar(id).production(et.index) {
                Some(p) => p.next.map(StateRef::Template),
                None => return Err(Error::invalid_event_code(et.code.to_string(), self.state_label())),
            },
            StateRef::Builtin { content } => {
                self.learn(et, qname, content)?;
                builtin::successor(&et.item, content).map(|content| StateRef::Builtin { content })
            }
        };
        if let Some(next) = next {
            self.top_mut()?.state = next;
        }
        Ok(())
    }

    fn learn(&mut self, et: &EventType, qname: Option<&QName>, content: bool) -> Result<()> {
        if et.is_declared() {
            return Ok(());
        }
        if let Some(item) = builtin::learnable(&et.item, qname, content) {
            let owner = self.top()?.qname.clone();
            self.builtins.learn(&owner, content, item);
        }
        Ok(())
    }

    /// SE: Zustand weiterschalten und Kind-Frame anlegen.
    ///
    /// Im SC-Fragment übernimmt das Kind den Zustand des äußeren Elements.
    pub fn start_element(&mut self, et: &EventType, qname: &QName) -> Result<()> {
        let declared_child = self.production(et.index).and_then(|p| p.child);
        let in_fragment = self.top()?.saved.is_some();
        self.advance(et, Some(qname))?;

        let child = if in_fragment {
            let n = self.frames.len();
            self.frames
                .get(n.wrapping_sub(2))
                .map(Frame::fork)
                .ok_or_else(|| Error::ordering_violation("SC element", "fragment without element"))?
        } else {
            let state = declared_child.or_else(|| self.cache.element_grammar(qname));
            match state {
                Some(id) => Frame::new(qname.expanded(), StateRef::Template(id), self.cache.grammar(id).nillable),
                None => Frame::new(qname.expanded(), StateRef::Builtin { content: false }, false),
            }
        };
        log::trace!("push {} ({:?})", child.qname, child.state);
        self.frames.push(child);
        Ok(())
    }

    /// EE: lernt ggf. EE und entfernt den Frame.
    pub fn end_element(&mut self, et: &EventType) -> Result<()> {
        if let StateRef::Builtin { content } = self.top()?.state {
            self.learn(et, None, content)?;
        }
        if self.frames.len() <= 1 {
            return Err(Error::ordering_violation("ED", "EE without open element"));
        }
        self.frames.pop();
        Ok(())
    }

    /// ED: beendet den Dokument-Frame.
    pub fn end_document(&mut self) -> Result<()> {
        if self.frames.len() != 1 {
            return Err(Error::ordering_violation("EE", "ED with open elements"));
        }
        self.frames.clear();
        Ok(())
    }

    /// xsi:type wechselt zur Grammar des genannten Typs (Spec 8.5.4.4).
    ///
    /// Liefert `false` wenn der Typ unbekannt ist; der Zustand bleibt dann.
    pub fn type_cast(&mut self, type_name: &QName) -> Result<bool> {
        let nillable = match self.top()?.state {
            StateRef::Template(_) => self.top()?.nillable,
            StateRef::Builtin { .. } => false,
        };
        match self.cache.type_grammar(type_name, nillable) {
            Some(id) => {
                let top = self.top_mut()?;
                top.state = StateRef::Template(id);
                Ok(true)
            }
            None => {
                log::warn!("xsi:type {type_name} not in schema, keeping current grammar");
                Ok(false)
            }
        }
    }

    /// True wenn `type_name` ein benannter Typ des Schemas ist.
    pub fn knows_type(&self, type_name: &QName) -> bool {
        self.cache.type_grammar(type_name, false).is_some()
    }

    /// xsi:nil: bei `true` weiter in die Nilled-Grammar.
    pub fn nil(&mut self, et: &EventType, value: bool) -> Result<()> {
        if !value {
            return Ok(());
        }
        if let Some(next) = self.production(et.index).and_then(|p| p.next) {
            self.top_mut()?.state = StateRef::Template(next);
        }
        Ok(())
    }

    /// True wenn der oberste Frame ein SC-Fragment ist, dessen Element beendet wurde.
    pub fn fragment_open(&self) -> bool {
        self.frames.last().is_some_and(|f| f.saved.is_some())
    }

    /// SC: neue String Table und Built-in Grammars, Fragment-Frame oben (Spec 8.5.4.4.1).
    pub fn enter_fragment(&mut self) -> Result<()> {
        let fresh_table = StringTable::new(self.cache.corpus(), &self.stream);
        let fresh_builtins = BuiltinGrammars::new(self.cache.options());
        let saved = Saved {
            table: std::mem::replace(&mut self.table, fresh_table),
            builtins: std::mem::replace(&mut self.builtins, fresh_builtins),
        };
        let mut frame = Frame::new(self.top()?.qname.clone(), StateRef::Template(self.cache.fragment()), false);
        frame.saved = Some(Box::new(saved));
        self.frames.push(frame);
        Ok(())
    }

    /// Nach dem ED des Fragments: Tabellen zurück, Fragment- und Element-Frame weg.
    pub fn leave_fragment(&mut self) -> Result<()> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| Error::ordering_violation("fragment", "empty stack"))?;
        let saved = frame
            .saved
            .ok_or_else(|| Error::ordering_violation("fragment", "element frame"))?;
        self.table = saved.table;
        self.builtins = saved.builtins;
        if self.frames.len() <= 1 {
            return Err(Error::ordering_violation("SC element", "missing outer element"));
        }
        self.frames.pop();
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn learned_count(&self, qname: &QName) -> (usize, usize) {
        self.builtins.learned_count(qname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let cache = Arc::new(GrammarCache::schemaless(GrammarOptions::default()).unwrap());
        Session::new(cache, StreamOptions::default())
    }

    fn find(s: &Session, label: &str) -> EventType {
        let list = s.events().unwrap();
        list.iter().find(|t| t.item.label() == label).unwrap().clone()
    }

    #[test]
    fn dokument_ablauf() {
        let mut s = session();
        s.advance(&find(&s, "SD"), None).unwrap();
        let se = find(&s, "SE(*)");
        s.start_element(&se, &QName::local("r")).unwrap();
        assert!(s.in_builtin());
        s.end_element(&find(&s, "EE")).unwrap();
        s.end_document().unwrap();
        assert!(s.is_finished());
        assert!(s.events().is_err());
    }

    // Spec 8.4.3: generisches SE wird im Eltern-Element gelernt
    #[test]
    fn lernen_im_eltern_element() {
        let mut s = session();
        s.advance(&find(&s, "SD"), None).unwrap();
        s.start_element(&find(&s, "SE(*)"), &QName::local("r")).unwrap();
        s.start_element(&find(&s, "SE(*)"), &QName::local("c")).unwrap();
        s.end_element(&find(&s, "EE")).unwrap();
        assert_eq!(s.learned_count(&QName::local("r")), (1, 0));
        // EE in StartTagContent von c gelernt
        assert_eq!(s.learned_count(&QName::local("c")), (1, 0));
        assert_eq!(find(&s, "SE(*)").tier(), 2);
        s.start_element(&find(&s, "SE(*)"), &QName::local("c")).unwrap();
        s.end_element(&find(&s, "EE")).unwrap();
        assert_eq!(s.learned_count(&QName::local("r")), (1, 1));
        assert_eq!(s.events().unwrap().item(0).unwrap().item, ItemType::StartElement(QName::local("c")));
    }

    #[test]
    fn ee_ohne_element_ist_fehler() {
        let mut s = session();
        s.advance(&find(&s, "SD"), None).unwrap();
        let ee = EventType { item: ItemType::EndElement, index: 0, code: crate::event_code::EventCode::one(0) };
        assert!(matches!(s.end_element(&ee), Err(Error::OrderingViolation { .. })));
    }

    #[test]
    fn unbekannter_typ_bleibt() {
        let mut s = session();
        s.advance(&find(&s, "SD"), None).unwrap();
        s.start_element(&find(&s, "SE(*)"), &QName::local("r")).unwrap();
        assert!(!s.type_cast(&QName::local("T")).unwrap());
        assert!(s.in_builtin());
    }
}
