//! Stream driver - lazy, ordered event serialization
//!
//! Walks the schema tree alongside the resolved data contexts, depth-first
//! pre-order, and yields `(path, event)` items. The walk is single-pass and
//! suspends between rows: at any point at most one row of one container is
//! held, and at most one container's cursor is open per nesting level.
//!
//! Error scoping through the stream:
//! - resolution and classification failures are fatal: one `Err` item, then
//!   the stream ends (zero events for the failing sub-tree)
//! - a producer failure kills only the sub-tree rooted at its binding;
//!   siblings proceed
//! - a projection failure aborts the remaining rows of its container; the
//!   matching `ExitContainer` is still emitted so nesting stays balanced
//!
//! Dropping the stream mid-container releases the open cursor.

use std::any::Any;
use std::collections::VecDeque;

use serde::Serialize;

use crate::classify::{classify, expected_shape, value_kind, DataContext};
use crate::error::{EngineError, ProjectionError, ResolutionError};
use crate::project::{coerce, project_row, ResolvedField, RowSlot, TypedValue};
use crate::resolve::{resolve_child, BindOptions, Resolution};
use crate::schema::{join_path, Attributes, NodeKind, SchemaNode};
use crate::source::{RowCursor, SourceValue};

/// One event of the output stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    EnterContainer {
        name: String,
        #[serde(skip_serializing_if = "Attributes::is_empty")]
        attributes: Attributes,
    },
    Field {
        name: String,
        value: TypedValue,
        #[serde(skip_serializing_if = "Attributes::is_empty")]
        attributes: Attributes,
    },
    ExitContainer {
        name: String,
    },
}

/// What the stream yields: a dotted node path paired with its event, or an
/// error item carrying path/ordinal context.
pub type StreamItem = Result<(String, Event), EngineError>;

/// Serialize a data source against a schema tree.
///
/// The returned stream is lazy and single-pass; the producer handle is the
/// opaque argument passed through to `RowProducer::produce` (use `&mut ()`
/// when the data source carries no producers).
pub fn serialize<'a>(
    root: &'a SchemaNode,
    data: SourceValue,
    handle: &'a mut dyn Any,
    opts: BindOptions,
) -> EventStream<'a> {
    let mut stream = EventStream {
        handle,
        opts,
        frames: Vec::new(),
        queue: VecDeque::new(),
    };
    match classify(data, expected_shape(root), &root.name) {
        Ok(ctx) => stream.enter_node(root, ctx, ""),
        Err(e) => stream.fatal(e.into()),
    }
    stream
}

enum Frame<'a> {
    /// Static group: children resolved by key, one at a time
    Group {
        node: &'a SchemaNode,
        ctx: DataContext,
        path: String,
        child_idx: usize,
    },
    /// Row-bearing container: one row's slots buffered at a time
    Sequence {
        node: &'a SchemaNode,
        path: String,
        cursor: RowCursor,
        ordinal: usize,
        slots: VecDeque<RowSlot>,
    },
}

/// Lazy iterator over serialization events
pub struct EventStream<'a> {
    handle: &'a mut dyn Any,
    opts: BindOptions,
    frames: Vec<Frame<'a>>,
    queue: VecDeque<StreamItem>,
}

enum Action<'a> {
    /// Group finished, no boundary event of its own
    PopGroup,
    /// Sequence exhausted normally
    ExitSequence { path: String, name: String },
    /// Descend into a resolved child context
    EnterChild {
        child: &'a SchemaNode,
        ctx: DataContext,
        parent_path: String,
    },
    /// Nested container child fed from the current row
    NestedChild {
        child: &'a SchemaNode,
        raw: SourceValue,
        parent_path: String,
    },
    EmitField { path: String, event: Event },
    /// Row-scoped failure: report, close the container, keep siblings
    AbortRows {
        err: EngineError,
        path: String,
        name: String,
    },
    /// Traversal-fatal failure
    Fatal(EngineError),
    /// Progressed internally (a row was fetched and projected)
    Continue,
}

impl<'a> EventStream<'a> {
    /// Push a resolved node onto the walk. Containers acquire their cursor
    /// here: a producer binding is invoked exactly once, at this point.
    fn enter_node(&mut self, node: &'a SchemaNode, ctx: DataContext, parent_path: &str) {
        let path = join_path(parent_path, &node.name);
        match &node.kind {
            NodeKind::Group { .. } => {
                // Any context is admissible here: a row-shaped context is
                // only usable if a child takes it whole (pass-through), and
                // resolution reports the mismatch otherwise.
                self.frames.push(Frame::Group { node, ctx, path, child_idx: 0 });
            }
            NodeKind::Container { .. } => {
                let cursor = match ctx {
                    DataContext::Rows(cursor) => cursor,
                    DataContext::Producer(mut producer) => {
                        tracing::debug!(path = path.as_str(), "invoking producer");
                        match producer.produce(&mut *self.handle) {
                            Ok(source) => RowCursor::new(source),
                            Err(e) => {
                                // Sub-tree fatal: no events for this
                                // container, siblings proceed.
                                self.queue.push_back(Err(EngineError::producer(path, e)));
                                return;
                            }
                        }
                    }
                    other => {
                        self.fatal(
                            ResolutionError::InvalidShape {
                                path,
                                details: format!(
                                    "container expects rows or a producer, got {}",
                                    other.kind()
                                ),
                            }
                            .into(),
                        );
                        return;
                    }
                };
                self.queue.push_back(Ok((
                    path.clone(),
                    Event::EnterContainer {
                        name: node.name.clone(),
                        attributes: node.attributes.clone(),
                    },
                )));
                self.frames.push(Frame::Sequence {
                    node,
                    path,
                    cursor,
                    ordinal: 0,
                    slots: VecDeque::new(),
                });
            }
            NodeKind::Scalar { ty, .. } => match ctx {
                DataContext::Literal(value) => match coerce(&value, *ty) {
                    Some(coerced) => self.queue.push_back(Ok((
                        path.clone(),
                        Event::Field {
                            name: node.name.clone(),
                            value: coerced,
                            attributes: node.attributes.clone(),
                        },
                    ))),
                    None => {
                        // Tree-level coercion failure; ordinal 0 marks
                        // "outside any row". Siblings proceed.
                        self.queue.push_back(Err(ProjectionError::TypeMismatch {
                            path,
                            field: node.binding_key().to_string(),
                            row: 0,
                            expected: ty.name(),
                            found: value_kind(&value),
                        }
                        .into()));
                    }
                },
                other => self.fatal(
                    ResolutionError::InvalidShape {
                        path,
                        details: format!("scalar expects a literal, got {}", other.kind()),
                    }
                    .into(),
                ),
            },
        }
    }

    fn fatal(&mut self, err: EngineError) {
        self.queue.push_back(Err(err));
        // Drop all frames; open cursors release via RowCursor's drop guard.
        self.frames.clear();
    }

    /// Advance the top frame by one step, producing at most a few queue
    /// items. Split into a borrow phase (peeking the frame) and an act
    /// phase (mutating the stream).
    fn advance(&mut self) {
        let Some(frame) = self.frames.last_mut() else { return };

        let action = match frame {
            Frame::Group { node, ctx, path, child_idx } => {
                let node: &'a SchemaNode = *node;
                let children = node.children();
                if *child_idx >= children.len() {
                    Action::PopGroup
                } else {
                    let child = &children[*child_idx];
                    *child_idx += 1;
                    match resolve_child(ctx, child, children.len(), path, &self.opts) {
                        Ok(Resolution::Context(child_ctx)) => Action::EnterChild {
                            child,
                            ctx: child_ctx,
                            parent_path: path.clone(),
                        },
                        Ok(Resolution::Deferred) => Action::Fatal(
                            ResolutionError::InvalidShape {
                                path: join_path(path, &child.name),
                                details: "row-shaped context cannot bind children by key"
                                .to_string(),
                            }
                            .into(),
                        ),
                        Err(e) => Action::Fatal(e),
                    }
                }
            }
            Frame::Sequence { node, path, cursor, ordinal, slots } => {
                let node: &'a SchemaNode = *node;
                if let Some(slot) = slots.pop_front() {
                    match slot {
                        RowSlot::Field(ResolvedField { child, value }) => {
                            let child = &node.children()[child];
                            Action::EmitField {
                                path: join_path(path, &child.name),
                                event: Event::Field {
                                    name: child.name.clone(),
                                    value,
                                    attributes: child.attributes.clone(),
                                },
                            }
                        }
                        RowSlot::Nested { child, raw } => Action::NestedChild {
                            child: &node.children()[child],
                            raw,
                            parent_path: path.clone(),
                        },
                    }
                } else {
                    match cursor.next_row() {
                        None => Action::ExitSequence {
                            path: path.clone(),
                            name: node.name.clone(),
                        },
                        Some(Err(e)) => Action::AbortRows {
                            err: EngineError::producer(path.clone(), e),
                            path: path.clone(),
                            name: node.name.clone(),
                        },
                        Some(Ok(row)) => {
                            *ordinal += 1;
                            // The whole row projects before any of its
                            // fields is emitted; a failing row emits nothing.
                            match project_row(&row, node, *ordinal, path) {
                                Ok(row_slots) => {
                                    slots.extend(row_slots);
                                    Action::Continue
                                }
                                Err(e) => Action::AbortRows {
                                    err: e.into(),
                                    path: path.clone(),
                                    name: node.name.clone(),
                                },
                            }
                        }
                    }
                }
            }
        };

        match action {
            Action::PopGroup => {
                self.frames.pop();
            }
            Action::ExitSequence { path, name } => {
                self.frames.pop();
                self.queue.push_back(Ok((path, Event::ExitContainer { name })));
            }
            Action::EnterChild { child, ctx, parent_path } => {
                self.enter_node(child, ctx, &parent_path);
            }
            Action::NestedChild { child, raw, parent_path } => {
                let child_path = join_path(&parent_path, &child.name);
                match classify(raw, expected_shape(child), &child_path) {
                    Ok(ctx) => self.enter_node(child, ctx, &parent_path),
                    Err(e) => self.fatal(e.into()),
                }
            }
            Action::EmitField { path, event } => {
                self.queue.push_back(Ok((path, event)));
            }
            Action::AbortRows { err, path, name } => {
                tracing::warn!(path = path.as_str(), error = %err, "aborting container rows");
                // Popping drops the cursor, which releases it.
                self.frames.pop();
                self.queue.push_back(Err(err));
                self.queue.push_back(Ok((path, Event::ExitContainer { name })));
            }
            Action::Fatal(err) => self.fatal(err),
            Action::Continue => {}
        }
    }
}

impl Iterator for EventStream<'_> {
    type Item = StreamItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.queue.pop_front() {
                return Some(item);
            }
            if self.frames.is_empty() {
                return None;
            }
            self.advance();
        }
    }
}
