//! Qualified names (Spec 7.1.7).
//!
//! Two qnames are equal when URI and local name match, regardless of their
//! prefixes. The prefix only travels along when prefixes are preserved.
//! Components are `Arc<str>` so names can be shared between the immutable
//! grammar cache and per-document sessions on different threads.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Namespace of the `xml:` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
/// XML Schema instance namespace (`xsi:type`, `xsi:nil`).
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// XML Schema namespace (built-in datatypes).
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
/// Namespace of `xmlns` attributes, never encoded as AT.
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// A qualified name with optional prefix.
#[derive(Clone)]
pub struct QName {
    pub uri: Arc<str>,
    pub local_name: Arc<str>,
    pub prefix: Option<Arc<str>>,
}

impl QName {
    /// Erstellt einen QName ohne Prefix.
    pub fn new(uri: impl Into<Arc<str>>, local_name: impl Into<Arc<str>>) -> Self {
        Self {
            uri: uri.into(),
            local_name: local_name.into(),
            prefix: None,
        }
    }

    /// Erstellt einen QName mit Prefix.
    pub fn with_prefix(
        uri: impl Into<Arc<str>>,
        local_name: impl Into<Arc<str>>,
        prefix: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            uri: uri.into(),
            local_name: local_name.into(),
            prefix: Some(prefix.into()),
        }
    }

    /// Name ohne Namespace.
    pub fn local(local_name: impl Into<Arc<str>>) -> Self {
        Self::new("", local_name)
    }

    /// `xsi:type`.
    pub fn xsi_type() -> Self {
        Self::new(XSI_NS, "type")
    }

    /// `xsi:nil`.
    pub fn xsi_nil() -> Self {
        Self::new(XSI_NS, "nil")
    }

    /// True für `xsi:type`.
    pub fn is_xsi_type(&self) -> bool {
        &*self.uri == XSI_NS && &*self.local_name == "type"
    }

    /// True für `xsi:nil`.
    pub fn is_xsi_nil(&self) -> bool {
        &*self.uri == XSI_NS && &*self.local_name == "nil"
    }

    /// Kopie ohne Prefix (für Grammar-Keys).
    pub fn expanded(&self) -> Self {
        Self {
            uri: Arc::clone(&self.uri),
            local_name: Arc::clone(&self.local_name),
            prefix: None,
        }
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.local_name == other.local_name && self.uri == other.uri
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
        self.local_name.hash(state);
    }
}

/// Schema-Sortierung: erst local-name, dann URI (Spec 8.5.4.1.3).
impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.local_name
            .cmp(&other.local_name)
            .then_with(|| self.uri.cmp(&other.uri))
    }
}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) if !p.is_empty() => write!(f, "{p}:{}", self.local_name),
            _ if self.uri.is_empty() => f.write_str(&self.local_name),
            _ => write!(f, "{{{}}}{}", self.uri, self.local_name),
        }
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QName({{{}}}{}", self.uri, self.local_name)?;
        if let Some(p) = &self.prefix {
            write!(f, ", prefix={p}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Spec 7.1.7: Prefix ist nicht Teil der Identität
    #[test]
    fn gleichheit_ignoriert_prefix() {
        let a = QName::with_prefix("urn:a", "x", "p");
        let b = QName::with_prefix("urn:a", "x", "q");
        assert_eq!(a, b);
        assert_ne!(a, QName::new("urn:b", "x"));
    }

    #[test]
    fn sortierung_local_name_vor_uri() {
        let mut names = vec![
            QName::new("urn:b", "a"),
            QName::new("", "b"),
            QName::new("urn:a", "a"),
        ];
        names.sort();
        assert_eq!(
            names,
            vec![QName::new("urn:a", "a"), QName::new("urn:b", "a"), QName::new("", "b")]
        );
    }

    #[test]
    fn xsi_namen() {
        assert!(QName::xsi_type().is_xsi_type());
        assert!(QName::xsi_nil().is_xsi_nil());
        assert!(!QName::local("nil").is_xsi_nil());
    }

    #[test]
    fn display_formen() {
        assert_eq!(QName::local("a").to_string(), "a");
        assert_eq!(QName::new("urn:x", "a").to_string(), "{urn:x}a");
        assert_eq!(QName::with_prefix("urn:x", "a", "x").to_string(), "x:a");
    }
}
