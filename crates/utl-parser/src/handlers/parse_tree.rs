//! Parse tree construction: one node per reduction, named after the
//! production, so the tree mirrors the grammar closely. Useful for
//! debugging the parser.

use utl_core::{AttrMap, NodeId, Value};

use super::{body_or_placeholder, link};
use crate::{
    handler::{Expr, Handler, HandlerResult, Literal, Reduction, Statement},
    span::Spanned,
};

/// Builds a parse tree rooted at `utldoc`.
///
/// Every node carries the reduction's context. Missing optional bodies are
/// filled with an empty `statement_list` so the shape of a node does not
/// depend on what was written.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseTreeHandler {
    strict: bool,
}

impl ParseTreeHandler {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }
}

impl Handler for ParseTreeHandler {
    fn is_strict(&self) -> bool {
        self.strict
    }

    fn utldoc(&mut self, r: &mut Reduction<'_>, statement_list: Option<NodeId>) -> HandlerResult {
        let context = r.context();
        r.tree()
            .new_node("utldoc", context, statement_list)
            .map(Some)
    }

    fn statement_list(
        &mut self,
        r: &mut Reduction<'_>,
        statement: Option<NodeId>,
        rest: Option<NodeId>,
    ) -> HandlerResult {
        link(r, "statement_list", statement, rest)
    }

    fn statement(&mut self, r: &mut Reduction<'_>, statement: Statement<'_>) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let inner = match statement {
            Statement::Empty | Statement::Node(None) => return Ok(None),
            Statement::Node(Some(node)) => node,
            Statement::Document(text) => {
                tree.new_node("document", context.with("text", text), [])?
            }
            Statement::Keyword(keyword) => tree.new_node(keyword.as_str(), context.clone(), [])?,
        };
        tree.new_node("statement", context, [inner]).map(Some)
    }

    fn echo_stmt(&mut self, r: &mut Reduction<'_>, expr: Option<NodeId>) -> HandlerResult {
        let context = r.context();
        r.tree().new_node("echo", context, expr).map(Some)
    }

    fn expr(&mut self, r: &mut Reduction<'_>, expr: Expr<'_>) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let node = match expr {
            Expr::Operand(operand) => tree.new_node("expr", context, operand)?,
            Expr::Id(name) => {
                let id = tree.new_node("id", context.with("symbol", name), [])?;
                tree.new_node("expr", context, [id])?
            }
            Expr::Unary { operator, operand } => {
                tree.new_node("expr", context.with("operator", operator), operand)?
            }
            Expr::Binary { operator, lhs, rhs } => tree.new_node(
                "expr",
                context.with("operator", operator),
                lhs.into_iter().chain(rhs),
            )?,
        };
        Ok(Some(node))
    }

    fn literal(&mut self, r: &mut Reduction<'_>, literal: Literal<'_>) -> HandlerResult {
        let context = r.context();
        let (kind, attributes) = match literal {
            Literal::Number(value) => ("number", context.with("value", value)),
            Literal::String(text) => ("string", context.with("value", text)),
            Literal::Boolean(value) => ("boolean", context.with("value", value)),
            Literal::Null => ("null", context.with("value", Value::Null)),
            Literal::Array(array) => {
                let attributes = context.with("type", "array").with("value", "[..]");
                return r.tree().new_node("literal", attributes, array).map(Some);
            }
        };
        r.tree()
            .new_node("literal", attributes.with("type", kind), [])
            .map(Some)
    }

    fn array_literal(&mut self, r: &mut Reduction<'_>, elements: Option<NodeId>) -> HandlerResult {
        let context = r.context();
        r.tree()
            .new_node("array_literal", context, elements)
            .map(Some)
    }

    fn array_elems(
        &mut self,
        r: &mut Reduction<'_>,
        expr: Option<NodeId>,
        previous: Option<NodeId>,
    ) -> HandlerResult {
        link(r, "array_elems", previous, expr)
    }

    fn array_ref(
        &mut self,
        r: &mut Reduction<'_>,
        variable: Option<NodeId>,
        index: Option<NodeId>,
    ) -> HandlerResult {
        let context = r.context();
        r.tree()
            .new_node("array_ref", context, variable.into_iter().chain(index))
            .map(Some)
    }

    fn macro_call(
        &mut self,
        r: &mut Reduction<'_>,
        callee: Option<NodeId>,
        args: Option<NodeId>,
        name: &str,
    ) -> HandlerResult {
        let context = r.context().with("macro", name);
        r.tree()
            .new_node("macro_call", context, callee.into_iter().chain(args))
            .map(Some)
    }

    fn arg_list(
        &mut self,
        r: &mut Reduction<'_>,
        arg: Option<NodeId>,
        rest: Option<NodeId>,
    ) -> HandlerResult {
        link(r, "arg_list", arg, rest)
    }

    fn arg(
        &mut self,
        r: &mut Reduction<'_>,
        value: Option<NodeId>,
        name: Option<&str>,
    ) -> HandlerResult {
        let mut attributes = r.context();
        if let Some(name) = name {
            attributes = attributes.with("name", name);
        }
        r.tree().new_node("arg", attributes, value).map(Some)
    }

    fn paren_expr(&mut self, r: &mut Reduction<'_>, expr: Option<NodeId>) -> HandlerResult {
        let context = r.context();
        r.tree().new_node("paren_expr", context, expr).map(Some)
    }

    fn if_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        condition: Option<NodeId>,
        body: Option<NodeId>,
        elseifs: Option<NodeId>,
        otherwise: Option<NodeId>,
    ) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let body = body_or_placeholder(tree, body)?;
        let children = condition
            .into_iter()
            .chain([body])
            .chain(elseifs)
            .chain(otherwise);
        tree.new_node("if_stmt", context, children).map(Some)
    }

    fn abbrev_if_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        condition: Option<NodeId>,
        statement: Option<NodeId>,
    ) -> HandlerResult {
        let context = r.context();
        r.tree()
            .new_node("abbrev_if_stmt", context, condition.into_iter().chain(statement))
            .map(Some)
    }

    fn elseif_stmts(
        &mut self,
        r: &mut Reduction<'_>,
        elseif: Option<NodeId>,
        rest: Option<NodeId>,
    ) -> HandlerResult {
        if rest.is_some() {
            return link(r, "elseif_stmts", elseif, rest);
        }
        // A one-element list takes its element's context.
        let tree = r.tree();
        let attributes = elseif.map_or_else(AttrMap::new, |e| tree.attributes(e).clone());
        tree.new_node("elseif_stmts", attributes, elseif).map(Some)
    }

    fn elseif_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        condition: Option<NodeId>,
        body: Option<NodeId>,
    ) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let body = body_or_placeholder(tree, body)?;
        tree.new_node("elseif_stmt", context, condition.into_iter().chain([body]))
            .map(Some)
    }

    fn else_stmt(&mut self, r: &mut Reduction<'_>, body: Option<NodeId>) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let body = body_or_placeholder(tree, body)?;
        tree.new_node("else_stmt", context, [body]).map(Some)
    }

    fn for_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        each: bool,
        expr: Option<NodeId>,
        as_clause: Option<NodeId>,
        body: Option<NodeId>,
    ) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let as_clause = match as_clause {
            Some(clause) => clause,
            None => tree.new_node("as_clause", AttrMap::new(), [])?,
        };
        let body = body_or_placeholder(tree, body)?;
        let symbol = if each { "for_each_stmt" } else { "for_stmt" };
        tree.new_node(symbol, context, expr.into_iter().chain([as_clause, body]))
            .map(Some)
    }

    fn as_clause(&mut self, r: &mut Reduction<'_>, names: &[Spanned<&str>]) -> HandlerResult {
        let context = r.context();
        let ids = names
            .iter()
            .map(|name| {
                let attributes = r.context_for(name.span()).with("symbol", **name);
                r.tree().new_node("id", attributes, [])
            })
            .collect::<Result<Vec<_>, _>>()?;
        r.tree().new_node("as_clause", context, ids).map(Some)
    }

    fn while_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        condition: Option<NodeId>,
        body: Option<NodeId>,
    ) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let body = body_or_placeholder(tree, body)?;
        tree.new_node("while_stmt", context, condition.into_iter().chain([body]))
            .map(Some)
    }

    fn macro_defn(
        &mut self,
        r: &mut Reduction<'_>,
        decl: Option<NodeId>,
        body: Option<NodeId>,
        name: &str,
    ) -> HandlerResult {
        let context = r.context();
        let end = r.span().end();
        let tree = r.tree();
        let body = match body {
            Some(body) => body,
            // An empty body sits at the end of the definition.
            None => tree.new_node("statement_list", context.with("start", end), [])?,
        };
        tree.new_node(
            "macro_defn",
            context.with("name", name),
            decl.into_iter().chain([body]),
        )
        .map(Some)
    }

    fn macro_decl(
        &mut self,
        r: &mut Reduction<'_>,
        id: Option<NodeId>,
        params: Option<NodeId>,
        _name: &str,
    ) -> HandlerResult {
        let context = r.context();
        r.tree()
            .new_node("macro_decl", context, id.into_iter().chain(params))
            .map(Some)
    }

    fn param_list(
        &mut self,
        r: &mut Reduction<'_>,
        param: Option<NodeId>,
        rest: Option<NodeId>,
    ) -> HandlerResult {
        link(r, "param_list", param, rest)
    }

    fn param_decl(
        &mut self,
        r: &mut Reduction<'_>,
        name: Spanned<&str>,
        default: Option<NodeId>,
    ) -> HandlerResult {
        let context = r.context().with("name", *name);
        r.tree().new_node("param_decl", context, default).map(Some)
    }

    fn dotted_id(
        &mut self,
        r: &mut Reduction<'_>,
        head: &str,
        rest: Option<NodeId>,
    ) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let symbol = match rest.and_then(|rest| tree.attributes(rest).get_str("symbol")) {
            Some(tail) => format!("{head}.{tail}"),
            None => head.to_string(),
        };
        tree.new_node("id", context.with("symbol", symbol), []).map(Some)
    }

    fn include_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        target: Option<NodeId>,
        _file: Option<&str>,
    ) -> HandlerResult {
        let context = r.context();
        r.tree()
            .new_node("include_stmt", context, target)
            .map(Some)
    }

    fn call_stmt(&mut self, r: &mut Reduction<'_>, call: Option<NodeId>) -> HandlerResult {
        let context = r.context();
        r.tree().new_node("call_stmt", context, call).map(Some)
    }

    fn default_assignment(&mut self, r: &mut Reduction<'_>, expr: Option<NodeId>) -> HandlerResult {
        let context = r.context();
        r.tree()
            .new_node("default_assignment", context, expr)
            .map(Some)
    }

    fn return_stmt(&mut self, r: &mut Reduction<'_>, expr: Option<NodeId>) -> HandlerResult {
        let context = r.context();
        r.tree().new_node("return_stmt", context, expr).map(Some)
    }
}
