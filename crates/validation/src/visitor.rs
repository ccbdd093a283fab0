use std::collections::HashMap;

use graphflow_schema::{MetaType, Schema};
use parser::types::{
    Directive, ExecutableDocument, Field, FragmentDefinition, FragmentSpread, InlineFragment,
    OperationDefinition, OperationType, Selection, SelectionSet,
};
use parser::{Pos, Positioned};
use value::{Name, Variables};

use crate::RuleError;

pub struct VisitorContext<'a> {
    pub schema: &'a Schema,
    pub variables: &'a Variables,
    pub fragments: &'a HashMap<Name, Positioned<FragmentDefinition>>,
    pub errors: Vec<RuleError>,
    type_stack: Vec<Option<&'a MetaType>>,
}

impl<'a> VisitorContext<'a> {
    pub fn new(schema: &'a Schema, document: &'a ExecutableDocument, variables: &'a Variables) -> Self {
        Self {
            schema,
            variables,
            fragments: &document.fragments,
            errors: Default::default(),
            type_stack: Default::default(),
        }
    }

    pub fn report_error(&mut self, locations: Vec<Pos>, msg: impl Into<String>) {
        self.errors.push(RuleError::new(locations, msg));
    }

    #[inline]
    pub fn current_type(&self) -> Option<&'a MetaType> {
        self.type_stack.last().copied().flatten()
    }

    pub fn fragment(&self, name: &str) -> Option<&'a Positioned<FragmentDefinition>> {
        self.fragments.get(name)
    }
}

pub trait Visitor<'a> {
    fn enter_document(&mut self, _ctx: &mut VisitorContext<'a>, _doc: &'a ExecutableDocument) {}
    fn exit_document(&mut self, _ctx: &mut VisitorContext<'a>, _doc: &'a ExecutableDocument) {}

    fn enter_operation_definition(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _operation_definition: &'a Positioned<OperationDefinition>,
    ) {
    }
    fn exit_operation_definition(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _operation_definition: &'a Positioned<OperationDefinition>,
    ) {
    }

    fn enter_fragment_definition(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _name: &'a Name,
        _fragment_definition: &'a Positioned<FragmentDefinition>,
    ) {
    }
    fn exit_fragment_definition(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _name: &'a Name,
        _fragment_definition: &'a Positioned<FragmentDefinition>,
    ) {
    }

    fn enter_selection_set(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _selection_set: &'a Positioned<SelectionSet>,
    ) {
    }
    fn exit_selection_set(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _selection_set: &'a Positioned<SelectionSet>,
    ) {
    }

    fn enter_selection(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _selection: &'a Positioned<Selection>,
    ) {
    }
    fn exit_selection(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _selection: &'a Positioned<Selection>,
    ) {
    }

    fn enter_field(&mut self, _ctx: &mut VisitorContext<'a>, _field: &'a Positioned<Field>) {}
    fn exit_field(&mut self, _ctx: &mut VisitorContext<'a>, _field: &'a Positioned<Field>) {}

    fn enter_fragment_spread(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _fragment_spread: &'a Positioned<FragmentSpread>,
    ) {
    }
    fn exit_fragment_spread(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _fragment_spread: &'a Positioned<FragmentSpread>,
    ) {
    }

    fn enter_inline_fragment(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _inline_fragment: &'a Positioned<InlineFragment>,
    ) {
    }
    fn exit_inline_fragment(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _inline_fragment: &'a Positioned<InlineFragment>,
    ) {
    }

    fn enter_directive(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _directive: &'a Positioned<Directive>,
    ) {
    }
    fn exit_directive(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _directive: &'a Positioned<Directive>,
    ) {
    }
}

pub struct VisitorNil;

impl VisitorNil {
    pub fn with<V>(self, visitor: V) -> VisitorCons<V, Self> {
        VisitorCons(visitor, self)
    }
}

impl<'a> Visitor<'a> for VisitorNil {}

pub struct VisitorCons<A, B>(A, B);

impl<A, B> VisitorCons<A, B> {
    pub fn with<V>(self, visitor: V) -> VisitorCons<V, Self> {
        VisitorCons(visitor, self)
    }
}

macro_rules! visit_both {
    ($name:ident, $ty:ty) => {
        fn $name(&mut self, ctx: &mut VisitorContext<'a>, node: $ty) {
            self.0.$name(ctx, node);
            self.1.$name(ctx, node);
        }
    };
}

impl<'a, A, B> Visitor<'a> for VisitorCons<A, B>
where
    A: Visitor<'a>,
    B: Visitor<'a>,
{
    visit_both!(enter_document, &'a ExecutableDocument);
    visit_both!(exit_document, &'a ExecutableDocument);
    visit_both!(enter_operation_definition, &'a Positioned<OperationDefinition>);
    visit_both!(exit_operation_definition, &'a Positioned<OperationDefinition>);
    visit_both!(enter_selection_set, &'a Positioned<SelectionSet>);
    visit_both!(exit_selection_set, &'a Positioned<SelectionSet>);
    visit_both!(enter_selection, &'a Positioned<Selection>);
    visit_both!(exit_selection, &'a Positioned<Selection>);
    visit_both!(enter_field, &'a Positioned<Field>);
    visit_both!(exit_field, &'a Positioned<Field>);
    visit_both!(enter_fragment_spread, &'a Positioned<FragmentSpread>);
    visit_both!(exit_fragment_spread, &'a Positioned<FragmentSpread>);
    visit_both!(enter_inline_fragment, &'a Positioned<InlineFragment>);
    visit_both!(exit_inline_fragment, &'a Positioned<InlineFragment>);
    visit_both!(enter_directive, &'a Positioned<Directive>);
    visit_both!(exit_directive, &'a Positioned<Directive>);

    fn enter_fragment_definition(
        &mut self,
        ctx: &mut VisitorContext<'a>,
        name: &'a Name,
        fragment_definition: &'a Positioned<FragmentDefinition>,
    ) {
        self.0.enter_fragment_definition(ctx, name, fragment_definition);
        self.1.enter_fragment_definition(ctx, name, fragment_definition);
    }

    fn exit_fragment_definition(
        &mut self,
        ctx: &mut VisitorContext<'a>,
        name: &'a Name,
        fragment_definition: &'a Positioned<FragmentDefinition>,
    ) {
        self.0.exit_fragment_definition(ctx, name, fragment_definition);
        self.1.exit_fragment_definition(ctx, name, fragment_definition);
    }
}

pub fn visit<'a, V: Visitor<'a>>(
    v: &mut V,
    ctx: &mut VisitorContext<'a>,
    doc: &'a ExecutableDocument,
) {
    v.enter_document(ctx, doc);

    for (_, operation) in doc.operations.iter() {
        visit_operation_definition(v, ctx, operation);
    }

    for (name, fragment) in &doc.fragments {
        visit_fragment_definition(v, ctx, name, fragment);
    }

    v.exit_document(ctx, doc);
}

fn visit_operation_definition<'a, V: Visitor<'a>>(
    v: &mut V,
    ctx: &mut VisitorContext<'a>,
    operation: &'a Positioned<OperationDefinition>,
) {
    let root_name = match operation.node.ty {
        OperationType::Query => Some(ctx.schema.query_type()),
        OperationType::Mutation => ctx.schema.mutation_type(),
        OperationType::Subscription => ctx.schema.subscription_type(),
    };
    ctx.type_stack
        .push(root_name.and_then(|name| ctx.schema.type_by_name(name)));
    v.enter_operation_definition(ctx, operation);
    visit_directives(v, ctx, &operation.node.directives);
    visit_selection_set(v, ctx, &operation.node.selection_set);
    v.exit_operation_definition(ctx, operation);
    ctx.type_stack.pop();
}

fn visit_fragment_definition<'a, V: Visitor<'a>>(
    v: &mut V,
    ctx: &mut VisitorContext<'a>,
    name: &'a Name,
    fragment: &'a Positioned<FragmentDefinition>,
) {
    let on_type = fragment.node.type_condition.node.on.node.as_str();
    ctx.type_stack.push(ctx.schema.type_by_name(on_type));
    v.enter_fragment_definition(ctx, name, fragment);
    visit_directives(v, ctx, &fragment.node.directives);
    visit_selection_set(v, ctx, &fragment.node.selection_set);
    v.exit_fragment_definition(ctx, name, fragment);
    ctx.type_stack.pop();
}

fn visit_selection_set<'a, V: Visitor<'a>>(
    v: &mut V,
    ctx: &mut VisitorContext<'a>,
    selection_set: &'a Positioned<SelectionSet>,
) {
    if selection_set.node.items.is_empty() {
        return;
    }
    v.enter_selection_set(ctx, selection_set);
    for selection in &selection_set.node.items {
        visit_selection(v, ctx, selection);
    }
    v.exit_selection_set(ctx, selection_set);
}

fn visit_selection<'a, V: Visitor<'a>>(
    v: &mut V,
    ctx: &mut VisitorContext<'a>,
    selection: &'a Positioned<Selection>,
) {
    v.enter_selection(ctx, selection);
    match &selection.node {
        Selection::Field(field) => {
            let field_type = ctx
                .current_type()
                .and_then(|ty| ty.field_by_name(field.node.name.node.as_str()))
                .and_then(|field_definition| ctx.schema.get_type(&field_definition.ty));
            ctx.type_stack.push(field_type);
            v.enter_field(ctx, field);
            visit_directives(v, ctx, &field.node.directives);
            visit_selection_set(v, ctx, &field.node.selection_set);
            v.exit_field(ctx, field);
            ctx.type_stack.pop();
        }
        Selection::FragmentSpread(fragment_spread) => {
            v.enter_fragment_spread(ctx, fragment_spread);
            visit_directives(v, ctx, &fragment_spread.node.directives);
            v.exit_fragment_spread(ctx, fragment_spread);
        }
        Selection::InlineFragment(inline_fragment) => {
            let fragment_type = match &inline_fragment.node.type_condition {
                Some(cond) => ctx.schema.type_by_name(cond.node.on.node.as_str()),
                None => ctx.current_type(),
            };
            ctx.type_stack.push(fragment_type);
            v.enter_inline_fragment(ctx, inline_fragment);
            visit_directives(v, ctx, &inline_fragment.node.directives);
            visit_selection_set(v, ctx, &inline_fragment.node.selection_set);
            v.exit_inline_fragment(ctx, inline_fragment);
            ctx.type_stack.pop();
        }
    }
    v.exit_selection(ctx, selection);
}

fn visit_directives<'a, V: Visitor<'a>>(
    v: &mut V,
    ctx: &mut VisitorContext<'a>,
    directives: &'a [Positioned<Directive>],
) {
    for directive in directives {
        v.enter_directive(ctx, directive);
        v.exit_directive(ctx, directive);
    }
}
