//! exi-grammar – schema-informed EXI 1.0 Codec
//!
//! Ein [`GrammarCache`](grammar::GrammarCache) wird einmal aus einem
//! Schema (oder schemalos) gebaut und von beliebig vielen Encodern und
//! Decodern geteilt. Jede Session hält ihre eigene String Table und ihre
//! gelernten Built-in Grammars.
//!
//! # Beispiel
//!
//! ```
//! use std::sync::Arc;
//! use exi_grammar::decoder::{DecoderConfig, decode};
//! use exi_grammar::encoder::{EncoderConfig, encode};
//! use exi_grammar::grammar::GrammarCache;
//! use exi_grammar::options::{Alignment, GrammarOptions, StreamOptions};
//! use exi_grammar::{xml, xsd};
//!
//! let corpus = xsd::load_schema(r#"
//!     <xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
//!       <xs:element name="greeting" type="xs:string"/>
//!     </xs:schema>"#).unwrap();
//! let cache = Arc::new(GrammarCache::new(Arc::new(corpus), GrammarOptions::default()).unwrap());
//!
//! let events = xml::parse_events("<greeting>Hello</greeting>").unwrap();
//! let stream = StreamOptions::default().with_alignment(Alignment::ByteAlignment);
//! let bytes = encode(Arc::clone(&cache), EncoderConfig::default().with_stream(stream), &events).unwrap();
//!
//! let decoded = decode(cache, DecoderConfig::with_stream(stream), &bytes).unwrap();
//! assert_eq!(decoded, events);
//! ```

pub mod binary;
pub mod bitstream;
pub mod boolean;
pub mod builtin;
pub mod compression;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod event;
pub mod event_code;
pub mod event_type;
pub mod grammar;
pub mod header;
pub mod integer;
pub mod n_bit_unsigned_integer;
pub mod options;
pub mod proto_grammar;
pub mod qname;
pub mod schema;
pub(crate) mod session;
pub mod string;
pub mod string_table;
pub mod typed_value;
pub mod undeclared;
pub mod unsigned_integer;
pub mod xml;
pub mod xsd;

pub use error::{Error, Result};

/// HashMap mit ahash (schneller, nicht DoS-resistent — für interne Datenstrukturen).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// HashSet mit ahash.
pub(crate) type FastHashSet<K> = hashbrown::HashSet<K, ahash::RandomState>;

/// IndexMap mit ahash (deterministische Iteration + schnelles Hashing).
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: Events
pub use event::{AtContent, DtContent, ExiEvent, NsContent, PiContent};

// Public API: Options
pub use options::{Alignment, GrammarOptions, Preserve, StreamOptions};

// Public API: Grammar
pub use grammar::GrammarCache;
pub use qname::QName;
pub use schema::SchemaCorpus;
