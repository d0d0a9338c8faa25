use crate::description::{
    core::{
        fault::AttachmentDescription,
        graph::{DescriptionGraph, OperationId, ParameterNode},
        operation::OperationDescriptor,
    },
    facts::{
        Mode, ParameterStyle, Style,
        precedence::{Attribute, Candidates, Memo, Resolved, resolve, resolve_with, text},
    },
};

#[derive(Debug, Clone, Default)]
pub(crate) struct ParameterCache {
    name: Memo<Resolved<String>>,
    target_namespace: Memo<Resolved<String>>,
    mode: Memo<Resolved<Mode>>,
}

impl ParameterCache {
    pub(crate) fn reset(&mut self) {
        self.name.reset();
        self.target_namespace.reset();
        self.mode.reset();
    }
}

/// View of one positional parameter of an operation.
#[derive(Debug, Clone, Copy)]
pub struct ParameterDescriptor<'g> {
    graph: &'g DescriptionGraph,
    operation: OperationId,
    index: usize,
}

impl<'g> ParameterDescriptor<'g> {
    pub(crate) fn new(graph: &'g DescriptionGraph, operation: OperationId, index: usize) -> Self {
        Self { graph, operation, index }
    }

    fn node(&self) -> &'g ParameterNode {
        &self.graph.operation_node(self.operation).parameters[self.index]
    }

    pub fn operation(&self) -> OperationDescriptor<'g> {
        OperationDescriptor::new(self.graph, self.operation)
    }

    /// Zero-based position in the Java signature.
    pub fn index(&self) -> usize {
        self.index
    }

    fn is_document_bare(&self) -> bool {
        let operation = self.operation();
        operation.style() == Style::Document && operation.parameter_style() == ParameterStyle::Bare
    }

    fn is_document_wrapped(&self) -> bool {
        let operation = self.operation();
        operation.style() == Style::Document && operation.parameter_style() == ParameterStyle::Wrapped
    }

    pub fn resolved_name(&self) -> Resolved<String> {
        let node = self.node();
        node.cache
            .name
            .get_or_init(|| {
                let annotation = text(node.facts.web_param.as_ref().and_then(|w| w.name.as_deref()));
                resolve_with(Attribute::ParameterName, Candidates::new().with_annotation(annotation), || {
                    if self.is_document_bare() {
                        self.operation().operation_name()
                    } else {
                        format!("arg{}", self.index)
                    }
                })
            })
            .clone()
    }

    /// `@WebParam.name`, the operation name for document/bare, else `arg<N>`.
    pub fn name(&self) -> String {
        self.resolved_name().value
    }

    pub fn part_name(&self) -> String {
        let annotation = text(self.node().facts.web_param.as_ref().and_then(|w| w.part_name.as_deref()));
        resolve_with(Attribute::ParameterPartName, Candidates::new().with_annotation(annotation), || self.name())
            .value
    }

    pub fn resolved_target_namespace(&self) -> Resolved<String> {
        let node = self.node();
        node.cache
            .target_namespace
            .get_or_init(|| {
                let annotation =
                    text(node.facts.web_param.as_ref().and_then(|w| w.target_namespace.as_deref()));
                resolve_with(
                    Attribute::ParameterTargetNamespace,
                    Candidates::new().with_annotation(annotation),
                    || {
                        if self.is_document_wrapped() && !self.is_header() {
                            String::new()
                        } else {
                            self.operation().interface().target_namespace()
                        }
                    },
                )
            })
            .clone()
    }

    pub fn target_namespace(&self) -> String {
        self.resolved_target_namespace().value
    }

    /// A holder is always at least INOUT: an explicit IN on a holder is promoted.
    pub fn resolved_mode(&self) -> Resolved<Mode> {
        let node = self.node();
        node.cache
            .mode
            .get_or_init(|| {
                let annotation = node.facts.web_param.as_ref().and_then(|w| w.mode);
                let resolved = resolve(Attribute::ParameterMode, Candidates::new().with_annotation(annotation), Mode::In);
                if node.facts.is_holder() && resolved.value == Mode::In {
                    Resolved { value: Mode::InOut, origin: resolved.origin }
                } else {
                    resolved
                }
            })
            .clone()
    }

    pub fn mode(&self) -> Mode {
        self.resolved_mode().value
    }

    pub fn is_header(&self) -> bool {
        let annotation = self.node().facts.web_param.as_ref().map(|w| w.header).filter(|h| *h);
        resolve(Attribute::ParameterHeader, Candidates::new().with_annotation(annotation), false).value
    }

    pub fn is_holder(&self) -> bool {
        self.node().facts.is_holder()
    }

    /// Declared Java type name.
    pub fn parameter_type(&self) -> &'g str {
        &self.node().facts.type_name
    }

    /// Holder's wrapped type, else the declared type.
    pub fn parameter_actual_type(&self) -> &'g str {
        self.node().facts.actual_type()
    }

    pub fn is_list(&self) -> bool {
        self.node().facts.is_list
    }

    pub fn attachment(&self) -> Option<AttachmentDescription> {
        self.operation().attachment(&self.part_name())
    }
}
