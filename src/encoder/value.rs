//! AT, CH, xsi:type und xsi:nil (Spec 7, 8.5.4.4).

use std::io::Write;
use std::sync::Arc;

use crate::error::{Error, Result, ViolationReason};
use crate::event_type::{EventType, ItemType};
use crate::qname::QName;
use crate::typed_value::{self, TypedValue};
use crate::{boolean, string};

use super::Encoder;
use super::compression::Deferred;

/// Whitespace im Sinne von XML (S-Produktion).
fn is_xml_whitespace(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
}

/// Ergebnis der Suche nach einer Value-Production.
enum ValueMatch {
    Typed(EventType, TypedValue),
    Text(EventType),
}

impl<W: Write> Encoder<W> {
    /// Sucht die Production für einen Value.
    ///
    /// Passt ein typisierter Eintrag, der Wert aber nicht in den Datatype,
    /// geht die Suche weiter zur untyped Production (Spec 8.5.4.4.1).
    fn match_value(&self, value: &str, matches: impl Fn(&EventType) -> bool) -> Result<Option<ValueMatch>> {
        let list = self.session.events()?;
        for et in list.iter().filter(|t| matches(t)) {
            let Some(datatype) = self.session.typed_datatype(et) else {
                return Ok(Some(ValueMatch::Text(et.clone())));
            };
            match typed_value::parse(datatype, value) {
                Some(v) => return Ok(Some(ValueMatch::Typed(et.clone(), v))),
                None if self.session.options().strict() => {
                    return Err(Error::InvalidValue(format!("'{value}' is not a valid {datatype:?}").into()));
                }
                None => log::trace!("'{value}' not a {datatype:?}, trying untyped"),
            }
        }
        Ok(None)
    }

    /// Schreibt einen Value in den Stream oder in seinen Channel.
    pub(super) fn write_value(&mut self, key: &QName, value: Deferred) {
        if let Some(block) = self.block.as_mut() {
            block.push(key, value);
            return;
        }
        match value {
            Deferred::Typed(v) => typed_value::encode(&mut self.writer, &v, self.session.aligned()),
            Deferred::Text(s) => self.session.table.encode_value(&mut self.writer, key, &s),
        }
    }

    pub(super) fn attribute(&mut self, q: &QName, value: &Arc<str>) -> Result<()> {
        // xsi-Attribute laufen über ihre eigenen Events
        if q.is_xsi_nil()
            && let Some(nil) = boolean::parse(value)
        {
            return self.nil(nil);
        }
        if q.is_xsi_type() {
            let type_name = self.scope.resolve(value);
            return self.type_cast(&type_name);
        }

        // Deklariertes AT(q) mit ungültigem Wert geht über AT(q)[untyped], nicht über Wildcards
        let declared = self.session.events()?.iter().any(|t| matches!(&t.item, ItemType::Attribute(n) if n == q));
        let found = self.match_value(value, |t| match &t.item {
            ItemType::Attribute(n) | ItemType::AttributeUntyped(n) => n == q,
            ItemType::AttributeNs(uri) => !declared && *uri == q.uri,
            ItemType::AttributeGeneric => {
                !declared && self.session.production(t.index).is_none_or(|p| p.allows(&q.uri))
            }
            _ => false,
        })?;
        let Some(found) = found else {
            return Err(self.no_production(ViolationReason::UnexpectedAttribute, format!("AT({q})")));
        };
        let (et, deferred) = match found {
            ValueMatch::Typed(et, v) => (et, Deferred::Typed(v)),
            ValueMatch::Text(et) => (et, Deferred::Text(Arc::clone(value))),
        };
        self.write_code(&et)?;
        self.write_qname_content(&et.item, q);
        if et.item == ItemType::AttributeGeneric && q.is_xsi_nil() {
            // xsi:nil bleibt im Structure Channel
            self.session.table.encode_value(&mut self.writer, q, value);
        } else {
            self.write_value(q, deferred);
        }
        self.session.advance(&et, Some(q))
    }

    pub(super) fn characters(&mut self, text: &Arc<str>) -> Result<()> {
        let whitespace = is_xml_whitespace(text);
        if whitespace && !self.config.preserve_whitespace && !self.declares_characters()? {
            log::trace!("dropping whitespace-only CH in {}", self.session.state_label());
            return Ok(());
        }
        let found = self.match_value(text, |t| matches!(t.item, ItemType::Characters | ItemType::CharactersUntyped))?;
        let Some(found) = found else {
            if whitespace {
                log::trace!("no CH production for whitespace in {}", self.session.state_label());
                return Ok(());
            }
            let preview: String = text.chars().take(32).collect();
            return Err(self.no_production(ViolationReason::UnexpectedCharacters, format!("CH '{preview}'")));
        };
        let key = self.session.element_qname()?;
        let (et, deferred) = match found {
            ValueMatch::Typed(et, v) => (et, Deferred::Typed(v)),
            ValueMatch::Text(et) => (et, Deferred::Text(Arc::clone(text))),
        };
        self.write_code(&et)?;
        self.write_value(&key, deferred);
        self.session.advance(&et, None)
    }

    /// Leerer Simple Content ohne EE-Production: CH "" vor dem EE.
    ///
    /// Nur wenn der Datatype den leeren Wert annimmt. Der Decoder lässt
    /// dieses CH wieder weg.
    pub(super) fn empty_characters(&mut self) -> Result<bool> {
        let list = self.session.events()?;
        let Some(et) = list.iter().find(|t| t.is_declared() && t.item == ItemType::Characters).cloned() else {
            return Ok(false);
        };
        let deferred = match self.session.typed_datatype(&et) {
            Some(datatype) => match typed_value::parse(datatype, "") {
                Some(v) => Deferred::Typed(v),
                None => return Ok(false),
            },
            None => Deferred::Text(Arc::from("")),
        };
        log::trace!("empty CH before EE in {}", self.session.state_label());
        let key = self.session.element_qname()?;
        self.write_code(&et)?;
        self.write_value(&key, deferred);
        self.session.advance(&et, None)?;
        Ok(true)
    }

    /// Schema-Zustand mit deklariertem Text in Tier 1.
    fn declares_characters(&self) -> Result<bool> {
        if self.session.in_builtin() {
            return Ok(false);
        }
        Ok(self
            .session
            .events()?
            .iter()
            .any(|t| t.is_declared() && t.item == ItemType::Characters))
    }

    /// xsi:type (Spec 8.5.4.4).
    ///
    /// In Built-in Grammars als AT(*) mit QName-Value.
    pub(super) fn type_cast(&mut self, type_name: &QName) -> Result<()> {
        let builtin = self.session.in_builtin();
        let et = self.find(|t| match &t.item {
            ItemType::TypeCast => !builtin,
            ItemType::AttributeGeneric => builtin,
            _ => false,
        })?;
        let Some(et) = et else {
            return Err(self.no_production(ViolationReason::UnexpectedTypeCast, format!("xsi:type {type_name}")));
        };
        if !builtin && self.session.options().strict() && !self.session.knows_type(type_name) {
            return Err(Error::strict_violation(ViolationReason::UnexpectedTypeCast, type_name.to_string()));
        }
        self.write_code(&et)?;
        if builtin {
            self.write_qname_content(&et.item, &QName::xsi_type());
        }
        self.write_qname_value(type_name);
        self.session.advance(&et, Some(&QName::xsi_type()))?;
        self.session.type_cast(type_name)?;
        Ok(())
    }

    /// xsi:nil (Spec 8.5.4.4). Im Schema als Boolean, in Built-in Grammars
    /// als AT(*) mit String-Value. Beides bleibt im Structure Channel.
    pub(super) fn nil(&mut self, nil: bool) -> Result<()> {
        if self.session.in_builtin() {
            let et = self
                .find(|t| t.item == ItemType::AttributeGeneric)?
                .ok_or_else(|| self.no_production(ViolationReason::UnexpectedAttribute, "AT(xsi:nil)".into()))?;
            let q = QName::xsi_nil();
            self.write_code(&et)?;
            self.write_qname_content(&et.item, &q);
            let lexical = if nil { "true" } else { "false" };
            self.session.table.encode_value(&mut self.writer, &q, lexical);
            return self.session.advance(&et, Some(&q));
        }
        let et = self
            .find(|t| t.item == ItemType::Nil)?
            .ok_or_else(|| self.no_production(ViolationReason::UnexpectedAttribute, "xsi:nil".into()))?;
        self.write_code(&et)?;
        boolean::encode(&mut self.writer, nil, self.session.aligned());
        self.session.nil(&et, nil)
    }

    /// Kommentar-, PI-, DT- und ER-Inhalte sind Strings ohne Tabelle (Spec 7.1.10).
    pub(super) fn write_strings(&mut self, parts: &[&str]) {
        for part in parts {
            string::encode(&mut self.writer, part);
        }
    }
}
