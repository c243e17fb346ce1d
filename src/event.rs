//! Event model (Spec 4, Table 4-1).
//!
//! Runtime events consumed by the encoder and produced by the decoder.
//! `xsi:type` and `xsi:nil` are separate events because their productions
//! switch grammars instead of being ordinary attributes.

use std::sync::Arc;

use crate::qname::QName;

/// Content for Namespace Declaration (NS) events.
///
/// When `local_element_ns` is true, `uri` is the namespace of the element
/// the declaration belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsContent {
    pub uri: Arc<str>,
    /// Empty for the default namespace.
    pub prefix: Arc<str>,
    pub local_element_ns: bool,
}

/// Content for Attribute (AT) events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtContent {
    pub qname: QName,
    pub value: Arc<str>,
}

/// Content for Processing Instruction (PI) events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiContent {
    pub target: Arc<str>,
    pub data: Arc<str>,
}

/// Content for DOCTYPE (DT) events. Absent parts are empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtContent {
    pub name: Arc<str>,
    pub public: Arc<str>,
    pub system: Arc<str>,
    pub text: Arc<str>,
}

/// An EXI event (Spec 4, Table 4-1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExiEvent {
    StartDocument,
    EndDocument,
    StartElement(QName),
    EndElement,
    Attribute(AtContent),
    /// `xsi:type` with the referenced type name (Spec 8.5.4.4).
    TypeCast(QName),
    /// `xsi:nil` with a boolean value (Spec 8.5.4.4).
    Nil(bool),
    Characters(Arc<str>),
    NamespaceDeclaration(NsContent),
    Comment(Arc<str>),
    ProcessingInstruction(PiContent),
    DocType(DtContent),
    EntityReference(Arc<str>),
    /// Start of a self-contained element region (Spec 8.5.4.4.1).
    SelfContained,
}

impl ExiEvent {
    /// Kurzes Kürzel für Logs und Fehlermeldungen.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartDocument => "SD",
            Self::EndDocument => "ED",
            Self::StartElement(_) => "SE",
            Self::EndElement => "EE",
            Self::Attribute(_) => "AT",
            Self::TypeCast(_) => "AT(xsi:type)",
            Self::Nil(_) => "AT(xsi:nil)",
            Self::Characters(_) => "CH",
            Self::NamespaceDeclaration(_) => "NS",
            Self::Comment(_) => "CM",
            Self::ProcessingInstruction(_) => "PI",
            Self::DocType(_) => "DT",
            Self::EntityReference(_) => "ER",
            Self::SelfContained => "SC",
        }
    }

    /// Convenience: SE ohne Prefix.
    pub fn start(uri: &str, local_name: &str) -> Self {
        Self::StartElement(QName::new(uri, local_name))
    }

    /// Convenience: AT ohne Prefix.
    pub fn attribute(uri: &str, local_name: &str, value: &str) -> Self {
        Self::Attribute(AtContent {
            qname: QName::new(uri, local_name),
            value: value.into(),
        })
    }

    /// Convenience: CH.
    pub fn characters(value: &str) -> Self {
        Self::Characters(value.into())
    }

    /// Zählt als Value für Blöcke und Channels (Spec 9.1).
    pub fn carries_value(&self) -> bool {
        matches!(self, Self::Attribute(_) | Self::Characters(_))
    }
}
