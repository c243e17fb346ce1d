//! Particle-Ableitung für Schema-informed Grammars (Spec 8.5.4.1.5 – 8.5.4.1.8).
//!
//! Statt Proto-Grammars mit ε-Productions zu konkatenieren und anschließend zu
//! normalisieren (Spec 8.5.4.2), wird der Rest eines Content Models als
//! Fortsetzung ([`Continuation`]) dargestellt: ein Stack von Frames, der
//! beschreibt, was noch kommen darf. [`ParticleArena::expand`] liefert für eine
//! Fortsetzung alle Terminals, die jetzt auftreten dürfen, jeweils mit der
//! Fortsetzung danach. Gleiche Fortsetzungen sind gleiche Grammar-Zustände;
//! wiederholbare Particles erzeugen so Rückkanten.
//!
//! # Spec-Referenz
//!
//! - 8.5.4.1.5 Particles: Wiederholung mit `{min occurs}` / `{max occurs}`
//! - 8.5.4.1.8.1 Sequence: "occurs now" vor "skip"
//! - 8.5.4.1.8.2 Choice: Vereinigung der Alternativen
//! - 8.5.4.1.8.3 All: Zustand = Menge der verbleibenden Kinder

use crate::schema::{Compositor, ElementId, MaxOccurs, NamespaceConstraint, Particle, Term};
use crate::{Error, FastHashSet, Result};

/// Index eines Particles in der Arena.
pub type NodeId = u32;

/// Obergrenze für Kinder einer All-Gruppe (Bitmaske).
const MAX_ALL_CHILDREN: usize = 64;

#[derive(Debug, Clone)]
enum NodeTerm {
    Element(ElementId),
    Wildcard(NamespaceConstraint),
    Group { compositor: Compositor, children: Vec<NodeId> },
}

#[derive(Debug, Clone)]
struct Node {
    min: u32,
    max: MaxOccurs,
    term: NodeTerm,
    /// Term kann leer gematcht werden.
    term_nullable: bool,
}

/// Ein Frame der Fortsetzung.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Frame {
    /// Restliche Kinder einer Sequence ab `pos`.
    Seq { node: NodeId, pos: u32 },
    /// Particle ist `count` mal aufgetreten. Bei unbounded wird `count` bei
    /// `min` gekappt, damit die Zustandsmenge endlich bleibt.
    Rep { node: NodeId, count: u32 },
    /// Verbleibende Kinder einer All-Gruppe als Bitmaske.
    All { node: NodeId, remaining: u64 },
}

/// Was nach dem aktuellen Punkt noch folgen darf (oberstes Frame zuletzt).
pub type Continuation = Vec<Frame>;

/// Terminal einer Particle-Ableitung.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Element(ElementId),
    Wildcard(NamespaceConstraint),
}

/// Ergebnis von [`ParticleArena::expand`].
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    /// Terminals in Production-Reihenfolge mit Folge-Fortsetzung.
    pub moves: Vec<(Terminal, Continuation)>,
    /// Content Model darf hier enden (EE).
    pub can_end: bool,
}

/// Flache Arena eines Particle-Baums.
#[derive(Debug, Clone)]
pub struct ParticleArena {
    nodes: Vec<Node>,
    root: NodeId,
}

impl ParticleArena {
    /// Baut die Arena aus dem Content-Particle eines Typs.
    ///
    /// # Errors
    ///
    /// [`Error::SchemaViolation`] bei All-Gruppen mit mehr als 64 Kindern.
    pub fn new(root: &Particle) -> Result<Self> {
        let mut arena = Self { nodes: Vec::new(), root: 0 };
        arena.root = arena.add(root)?;
        Ok(arena)
    }

    fn add(&mut self, particle: &Particle) -> Result<NodeId> {
        let (term, term_nullable) = match &particle.term {
            Term::Element(e) => (NodeTerm::Element(*e), false),
            Term::Wildcard(ns) => (NodeTerm::Wildcard(ns.clone()), false),
            Term::Group(group) => {
                if group.compositor == Compositor::All && group.particles.len() > MAX_ALL_CHILDREN {
                    return Err(Error::schema_violation(format!(
                        "all group with {} children",
                        group.particles.len()
                    )));
                }
                let mut children = Vec::with_capacity(group.particles.len());
                for p in &group.particles {
                    children.push(self.add(p)?);
                }
                let nullable = |n: &NodeId| self.particle_nullable(*n);
                let term_nullable = match group.compositor {
                    Compositor::Sequence | Compositor::All => children.iter().all(nullable),
                    Compositor::Choice => children.is_empty() || children.iter().any(nullable),
                };
                (NodeTerm::Group { compositor: group.compositor, children }, term_nullable)
            }
        };
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node { min: particle.min, max: particle.max, term, term_nullable });
        Ok(id)
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    fn particle_nullable(&self, id: NodeId) -> bool {
        let n = self.node(id);
        n.min == 0 || n.term_nullable || n.max == MaxOccurs::Bounded(0)
    }

    fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).term {
            NodeTerm::Group { children, .. } => children,
            NodeTerm::Element(_) | NodeTerm::Wildcard(_) => &[],
        }
    }

    /// Fortsetzung am Anfang des Content Models.
    pub fn initial(&self) -> Continuation {
        vec![Frame::Rep { node: self.root, count: 0 }]
    }

    /// Alle jetzt erlaubten Terminals und ob das Model enden darf.
    pub fn expand(&self, cont: &Continuation) -> Expansion {
        let mut out = Expansion::default();
        let mut seen = FastHashSet::default();
        self.expand_into(cont.clone(), &mut out, &mut seen);
        out
    }

    fn expand_into(
        &self,
        cont: Continuation,
        out: &mut Expansion,
        seen: &mut FastHashSet<Continuation>,
    ) {
        if !seen.insert(cont.clone()) {
            return;
        }
        let mut rest = cont;
        let Some(top) = rest.pop() else {
            out.can_end = true;
            return;
        };

        match top {
            Frame::Seq { node, pos } => {
                let children = self.children(node);
                let Some(&child) = children.get(pos as usize) else {
                    self.expand_into(rest, out, seen);
                    return;
                };
                if (pos as usize) + 1 < children.len() {
                    rest.push(Frame::Seq { node, pos: pos + 1 });
                }
                rest.push(Frame::Rep { node: child, count: 0 });
                self.expand_into(rest, out, seen);
            }
            Frame::Rep { node, count } => {
                let n = self.node(node);
                let (can_more, next_count) = match n.max {
                    MaxOccurs::Unbounded => (true, (count + 1).min(n.min)),
                    MaxOccurs::Bounded(max) => (count < max, count + 1),
                };
                // "occurs now" vor "skip"
                if can_more {
                    let mut after = rest.clone();
                    let exhausted = matches!(n.max, MaxOccurs::Bounded(max) if next_count >= max);
                    if !exhausted {
                        after.push(Frame::Rep { node, count: next_count });
                    }
                    self.enter(node, after, out, seen);
                }
                if count >= n.min || n.term_nullable {
                    self.expand_into(rest, out, seen);
                }
            }
            Frame::All { node, remaining } => {
                let children = self.children(node);
                for (i, &child) in children.iter().enumerate() {
                    if remaining & (1 << i) == 0 {
                        continue;
                    }
                    let mut after = rest.clone();
                    let left = remaining & !(1 << i);
                    if left != 0 {
                        after.push(Frame::All { node, remaining: left });
                    }
                    self.enter(child, after, out, seen);
                }
                let all_optional = children
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| remaining & (1 << i) != 0)
                    .all(|(_, c)| self.particle_nullable(*c));
                if all_optional {
                    self.expand_into(rest, out, seen);
                }
            }
        }
    }

    /// Ein Vorkommen des Terms von `node`, danach `after`.
    fn enter(
        &self,
        node: NodeId,
        mut after: Continuation,
        out: &mut Expansion,
        seen: &mut FastHashSet<Continuation>,
    ) {
        match &self.node(node).term {
            NodeTerm::Element(e) => out.moves.push((Terminal::Element(*e), after)),
            NodeTerm::Wildcard(ns) => out.moves.push((Terminal::Wildcard(ns.clone()), after)),
            NodeTerm::Group { compositor, children } => match compositor {
                Compositor::Sequence => {
                    if !children.is_empty() {
                        after.push(Frame::Seq { node, pos: 0 });
                    }
                    self.expand_into(after, out, seen);
                }
                Compositor::Choice => {
                    for &child in children {
                        let mut alt = after.clone();
                        alt.push(Frame::Rep { node: child, count: 0 });
                        self.expand_into(alt, out, seen);
                    }
                }
                Compositor::All => {
                    let mask = children
                        .iter()
                        .enumerate()
                        .filter(|(_, c)| self.node(**c).max != MaxOccurs::Bounded(0))
                        .fold(0u64, |m, (i, _)| m | (1 << i));
                    if mask != 0 {
                        after.push(Frame::All { node, remaining: mask });
                    }
                    self.expand_into(after, out, seen);
                }
            },
        }
    }
}
