//! Abstract syntax tree construction.
//!
//! Bookkeeping productions are collapsed:
//!
//! - the root is the top-level `statement_list`, one child per statement;
//!   empty statements and terminators leave no trace,
//! - `statement` and `paren_expr` pass their inner node through,
//! - `expr` is only materialised for operators; operands pass through,
//! - `a.b.c` becomes a single `id` node with `symbol = "a.b.c"`,
//! - positional arguments are the argument expressions themselves, keyed
//!   ones are `arg{name}` nodes,
//! - list productions (`arg_list`, `param_list`, `elseif_stmts`,
//!   `array_elems`) are flattened into the owning node.
//!
//! Nodes received from earlier reductions are never modified; flattening
//! and re-attributing work on copies, so another handler sharing the same
//! tree keeps its own result intact.

use utl_core::{AttrMap, NodeError, NodeId, Tree, Value};

use super::{body_or_placeholder, link, list_items};
use crate::{
    handler::{Expr, Handler, HandlerResult, Literal, Reduction, Statement},
    span::{Span, Spanned},
};

/// Builds a compact AST.
///
/// # Examples
///
/// ```
/// use utl_core::NodeView;
/// use utl_parser::{AstHandler, Parser};
///
/// let output = Parser::with_handler(AstHandler::new(false)).parse("[% a = b + 3; %]")?;
/// let assignment = output.root_node().and_then(|root| root.child(0)).expect("statement");
/// assert_eq!(
///     assignment.format(),
///     "expr: =\n    id: a\n    expr: +\n        id: b\n        literal: 3.0"
/// );
/// # Ok::<(), utl_parser::error::ParseError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AstHandler {
    strict: bool,
}

impl AstHandler {
    /// Create a handler; a strict handler aborts the parse on a syntax error.
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }
}

/// `a.b` for two plain identifiers.
fn dotted_symbol(tree: &Tree, lhs: Option<NodeId>, rhs: Option<NodeId>) -> Option<String> {
    let (lhs, rhs) = (lhs?, rhs?);
    let is_id = |id: NodeId| tree.symbol(id) == "id" && tree.children(id).is_empty();
    if !is_id(lhs) || !is_id(rhs) {
        return None;
    }
    let head = tree.attributes(lhs).get_str("symbol")?;
    let tail = tree.attributes(rhs).get_str("symbol")?;
    Some(format!("{head}.{tail}"))
}

/// A single node holding every item of a linked list, with the list's context.
fn flat_list(tree: &mut Tree, list: NodeId) -> Result<NodeId, NodeError> {
    let symbol = tree.symbol(list).to_text();
    let attributes = tree.attributes(list).clone();
    let items = list_items(tree, list);
    tree.new_node(&symbol, attributes, items)
}

/// A flattened statement body, or a placeholder when there is none.
fn flat_body(tree: &mut Tree, body: Option<NodeId>) -> Result<NodeId, NodeError> {
    match body {
        Some(list) => flat_list(tree, list),
        None => body_or_placeholder(tree, None),
    }
}

fn context_span(attributes: &AttrMap) -> Option<Span> {
    Some(Span::new(
        attributes.get_usize("start")?..attributes.get_usize("end")?,
    ))
}

impl Handler for AstHandler {
    fn is_strict(&self) -> bool {
        self.strict
    }

    fn utldoc(&mut self, r: &mut Reduction<'_>, statement_list: Option<NodeId>) -> HandlerResult {
        if let Some(list) = statement_list {
            return flat_list(r.tree(), list).map(Some);
        }
        let context = r.context();
        r.tree().new_node("statement_list", context, []).map(Some)
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
        match statement {
            Statement::Empty => Ok(None),
            Statement::Node(node) => Ok(node),
            Statement::Document(text) => r
                .tree()
                .new_node("document", context.with("text", text), [])
                .map(Some),
            Statement::Keyword(keyword) => {
                r.tree().new_node(keyword.as_str(), context, []).map(Some)
            }
        }
    }

    fn echo_stmt(&mut self, r: &mut Reduction<'_>, expr: Option<NodeId>) -> HandlerResult {
        let context = r.context();
        r.tree().new_node("echo", context, expr).map(Some)
    }

    fn expr(&mut self, r: &mut Reduction<'_>, expr: Expr<'_>) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        match expr {
            Expr::Operand(node) => Ok(node),
            Expr::Id(name) => tree
                .new_node("id", context.with("symbol", name), [])
                .map(Some),
            Expr::Unary { operator, operand } => tree
                .new_node("expr", context.with("operator", operator), operand)
                .map(Some),
            Expr::Binary { operator, lhs, rhs } => {
                if operator == "." {
                    if let Some(symbol) = dotted_symbol(tree, lhs, rhs) {
                        return tree
                            .new_node("id", context.with("symbol", symbol), [])
                            .map(Some);
                    }
                }
                tree.new_node(
                    "expr",
                    context.with("operator", operator),
                    lhs.into_iter().chain(rhs),
                )
                .map(Some)
            }
        }
    }

    fn literal(&mut self, r: &mut Reduction<'_>, literal: Literal<'_>) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let attributes = match literal {
            Literal::Number(value) => context.with("type", "number").with("value", value),
            Literal::String(text) => context.with("type", "string").with("value", text),
            Literal::Boolean(value) => context.with("type", "boolean").with("value", value),
            Literal::Null => context.with("type", "null").with("value", Value::Null),
            Literal::Array(array) => {
                let elements = array.map(|a| list_items(tree, a)).unwrap_or_default();
                return tree
                    .new_node("literal", context.with("type", "array"), elements)
                    .map(Some);
            }
        };
        tree.new_node("literal", attributes, []).map(Some)
    }

    fn array_literal(&mut self, _r: &mut Reduction<'_>, elements: Option<NodeId>) -> HandlerResult {
        Ok(elements)
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
        let context = r.context();
        let tree = r.tree();
        let mut children: Vec<NodeId> = callee.into_iter().collect();
        if let Some(args) = args {
            children.extend(list_items(tree, args));
        }
        tree.new_node("macro_call", context.with("macro", name), children)
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
        let Some(name) = name else {
            return Ok(value);
        };
        let context = r.context();
        r.tree()
            .new_node("arg", context.with("name", name), value)
            .map(Some)
    }

    fn paren_expr(&mut self, r: &mut Reduction<'_>, expr: Option<NodeId>) -> HandlerResult {
        let Some(expr) = expr else {
            return Ok(None);
        };
        let context = r.context();
        let tree = r.tree();
        let attributes = tree.attributes(expr).combine(&context);
        let copy = tree.copy(expr);
        tree.set_attributes(copy, attributes);
        Ok(Some(copy))
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
        let mut children: Vec<NodeId> = condition.into_iter().collect();
        children.push(flat_body(tree, body)?);
        if let Some(elseifs) = elseifs {
            children.extend(list_items(tree, elseifs));
        }
        children.extend(otherwise);
        tree.new_node("if", context, children).map(Some)
    }

    fn abbrev_if_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        condition: Option<NodeId>,
        statement: Option<NodeId>,
    ) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let body_context = statement.map_or_else(|| context.clone(), |s| tree.attributes(s).clone());
        let body = tree.new_node("statement_list", body_context, statement)?;
        tree.new_node("if", context, condition.into_iter().chain([body]))
            .map(Some)
    }

    fn elseif_stmts(
        &mut self,
        r: &mut Reduction<'_>,
        elseif: Option<NodeId>,
        rest: Option<NodeId>,
    ) -> HandlerResult {
        link(r, "elseif_stmts", elseif, rest)
    }

    fn elseif_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        condition: Option<NodeId>,
        body: Option<NodeId>,
    ) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let body = flat_body(tree, body)?;
        tree.new_node("elseif", context, condition.into_iter().chain([body]))
            .map(Some)
    }

    fn else_stmt(&mut self, r: &mut Reduction<'_>, body: Option<NodeId>) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let body = flat_body(tree, body)?;
        tree.new_node("else", context, [body]).map(Some)
    }

    fn for_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        each: bool,
        expr: Option<NodeId>,
        as_clause: Option<NodeId>,
        body: Option<NodeId>,
    ) -> HandlerResult {
        let mut attributes = r.context();
        let tree = r.tree();
        if each {
            attributes = attributes.with("each", true);
        }
        if let Some(clause) = as_clause {
            attributes = attributes.combine(tree.attributes(clause));
        }
        let body = flat_body(tree, body)?;
        tree.new_node("for", attributes, expr.into_iter().chain([body]))
            .map(Some)
    }

    fn as_clause(&mut self, r: &mut Reduction<'_>, names: &[Spanned<&str>]) -> HandlerResult {
        let mut attributes = AttrMap::new();
        for (key, name) in ["var", "var2"].into_iter().zip(names) {
            attributes = attributes.with(key, **name);
        }
        r.tree().new_node("as_clause", attributes, []).map(Some)
    }

    fn while_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        condition: Option<NodeId>,
        body: Option<NodeId>,
    ) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let body = flat_body(tree, body)?;
        tree.new_node("while", context, condition.into_iter().chain([body]))
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
        let tree = r.tree();
        let mut children = decl.map(|d| tree.children(d).to_vec()).unwrap_or_default();
        children.push(flat_body(tree, body)?);
        tree.new_node("macro_defn", context.with("name", name), children)
            .map(Some)
    }

    fn macro_decl(
        &mut self,
        r: &mut Reduction<'_>,
        _id: Option<NodeId>,
        params: Option<NodeId>,
        name: &str,
    ) -> HandlerResult {
        let context = r.context();
        let tree = r.tree();
        let params = params.map(|p| list_items(tree, p)).unwrap_or_default();
        tree.new_node("macro_decl", context.with("name", name), params)
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
        let context = r.context();
        r.tree()
            .new_node("param", context.with("name", *name), default)
            .map(Some)
    }

    fn include_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        target: Option<NodeId>,
        file: Option<&str>,
    ) -> HandlerResult {
        let context = r.context();
        if let Some(file) = file {
            return r
                .tree()
                .new_node("include", context.with("file", file), [])
                .map(Some);
        }
        let expression = target
            .and_then(|t| context_span(r.tree_ref().attributes(t)))
            .map(|span| r.text(span).to_string())
            .unwrap_or_default();
        r.tree()
            .new_node("include", context.with("expression", expression), target)
            .map(Some)
    }

    fn call_stmt(&mut self, r: &mut Reduction<'_>, call: Option<NodeId>) -> HandlerResult {
        let context = r.context();
        r.tree().new_node("call", context, call).map(Some)
    }

    fn default_assignment(&mut self, r: &mut Reduction<'_>, expr: Option<NodeId>) -> HandlerResult {
        let context = r.context();
        r.tree().new_node("default", context, expr).map(Some)
    }

    fn return_stmt(&mut self, r: &mut Reduction<'_>, expr: Option<NodeId>) -> HandlerResult {
        let context = r.context();
        r.tree().new_node("return", context, expr).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use utl_core::{NodeRef, NodeView};

    use super::*;
    use crate::parser::{ParseOutput, Parser};

    fn parse(source: &str) -> ParseOutput {
        Parser::with_handler(AstHandler::new(false))
            .with_file("test.utl")
            .parse(source)
            .unwrap()
    }

    fn root(output: &ParseOutput) -> NodeRef<'_> {
        output.root_node().unwrap()
    }

    fn symbols(node: NodeRef<'_>) -> Vec<String> {
        node.child_nodes()
            .into_iter()
            .map(|n| n.symbol().to_string())
            .collect()
    }

    #[test]
    fn test_assignment_shape() {
        let output = parse("[% a = b + 3; %]");
        let root = root(&output);
        assert_eq!(root.symbol(), "statement_list");

        let assign = root.child(0).unwrap();
        assert_eq!(assign.attributes().get_str("operator"), Some("="));
        assert_eq!(symbols(assign), vec!["id", "expr"]);

        let sum = assign.child(1).unwrap();
        assert_eq!(sum.attributes().get_str("operator"), Some("+"));
        let three = sum.child(1).unwrap();
        assert_eq!(three.attributes().get("value"), Some(&Value::Float(3.0)));
    }

    #[test]
    fn test_dotted_call_collapses_identifier() {
        let output = parse("[% cms.component.load('x'); %]");
        let call = root(&output).find_first("macro_call").unwrap();
        assert_eq!(call.attributes().get_str("macro"), Some("cms.component.load"));

        let ids = root(&output).find_all("id");
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].attributes().get_str("symbol"), Some("cms.component.load"));
        assert_eq!(ids[0].parent().unwrap().symbol(), "macro_call");

        let arg = call.child(1).unwrap();
        assert_eq!(arg.attributes().get_str("type"), Some("string"));
        assert_eq!(arg.attributes().get_str("value"), Some("x"));
    }

    #[test]
    fn test_keyed_and_positional_args() {
        let output = parse("[% f(1, size: 2, 'k': 3); %]");
        let call = root(&output).find_first("macro_call").unwrap();
        assert_eq!(symbols(call), vec!["id", "literal", "arg", "arg"]);
        assert_eq!(call.child(2).unwrap().attributes().get_str("name"), Some("size"));
        assert_eq!(call.child(3).unwrap().attributes().get_str("name"), Some("k"));
    }

    #[test]
    fn test_documents_and_keywords() {
        let output = parse("<p>[% break; continue; exit %]</p>");
        let root = root(&output);
        assert_eq!(
            symbols(root),
            vec!["document", "break", "continue", "exit", "document"]
        );
        assert_eq!(root.child(0).unwrap().attributes().get_str("text"), Some("<p>"));
    }

    #[test]
    fn test_if_elseif_else() {
        let output = parse("[% if a; x; elseif b; y; else if c else z; end; %]");
        let node = root(&output).child(0).unwrap();
        assert_eq!(node.symbol(), "if");
        assert_eq!(
            symbols(node),
            vec!["id", "statement_list", "elseif", "elseif", "else"]
        );

        let second = node.child(3).unwrap();
        let placeholder = second.child(1).unwrap();
        assert_eq!(placeholder.symbol(), "statement_list");
        assert!(placeholder.attributes().is_empty());
    }

    #[test]
    fn test_abbreviated_if() {
        let output = parse("[% if a then echo b; %]");
        let node = root(&output).child(0).unwrap();
        assert_eq!(node.symbol(), "if");
        assert_eq!(symbols(node), vec!["id", "statement_list"]);
        assert_eq!(symbols(node.child(1).unwrap()), vec!["echo"]);
    }

    #[test]
    fn test_for_each_with_as_clause() {
        let output = parse("[% foreach items as k, v; echo k; end %]");
        let node = root(&output).child(0).unwrap();
        assert_eq!(node.symbol(), "for");
        assert_eq!(node.attributes().get_str("var"), Some("k"));
        assert_eq!(node.attributes().get_str("var2"), Some("v"));
        assert_eq!(node.attributes().get("each"), None);
        assert_eq!(symbols(node), vec!["id", "statement_list"]);
    }

    #[test]
    fn test_macro_definition() {
        let output = parse("[% macro a.b(x, y = 2); return x; end %]");
        let node = root(&output).child(0).unwrap();
        assert_eq!(node.symbol(), "macro_defn");
        assert_eq!(node.attributes().get_str("name"), Some("a.b"));
        assert_eq!(symbols(node), vec!["param", "param", "statement_list"]);

        let y = node.child(1).unwrap();
        assert_eq!(y.attributes().get_str("name"), Some("y"));
        assert_eq!(symbols(y), vec!["literal"]);
    }

    #[test]
    fn test_empty_macro_body_gets_placeholder() {
        let output = parse("[% macro m; end %]");
        let node = root(&output).child(0).unwrap();
        assert_eq!(symbols(node), vec!["statement_list"]);
    }

    #[test]
    fn test_includes() {
        let output = parse("[% include 'a.utl'; include dir + 'b.utl' %]");
        let root = root(&output);
        let literal = root.child(0).unwrap();
        assert_eq!(literal.attributes().get_str("file"), Some("a.utl"));
        assert_eq!(literal.child_count(), 0);

        let computed = root.child(1).unwrap();
        assert_eq!(computed.attributes().get_str("file"), None);
        assert_eq!(
            computed.attributes().get_str("expression"),
            Some("dir + 'b.utl'")
        );
        assert_eq!(symbols(computed), vec!["expr"]);
    }

    #[test]
    fn test_array_literal_and_ref() {
        let output = parse("[% x = [1, 'two', true,]; y = x[0]; %]");
        let root = root(&output);
        let array = root.find_first("literal").unwrap();
        assert_eq!(array.attributes().get_str("type"), Some("array"));
        assert_eq!(symbols(array), vec!["literal", "literal", "literal"]);

        let index = root.find_first("array_ref").unwrap();
        assert_eq!(symbols(index), vec!["id", "literal"]);
    }

    #[test]
    fn test_paren_expression_takes_outer_context() {
        let output = parse("[% (a + b) * c; %]");
        let product = root(&output).child(0).unwrap();
        let sum = product.child(0).unwrap();
        assert_eq!(sum.attributes().get_str("operator"), Some("+"));
        assert_eq!(sum.attributes().get_usize("start"), Some(3));
        assert_eq!(sum.attributes().get_usize("end"), Some(10));
    }

    #[test]
    fn test_other_statements() {
        let output = parse("[% call f(); default x = 1; while x; x -= 1; end; return; echo %]");
        assert_eq!(
            symbols(root(&output)),
            vec!["call", "default", "while", "return", "echo"]
        );
        let call = root(&output).child(0).unwrap();
        assert_eq!(symbols(call), vec!["macro_call"]);
    }

    #[test]
    fn test_empty_input() {
        let output = parse("");
        let root = root(&output);
        assert_eq!(root.symbol(), "statement_list");
        assert_eq!(root.child_count(), 0);
        assert_eq!(root.attributes().get_usize("start"), Some(0));
        assert_eq!(root.attributes().get_usize("end"), Some(0));
        assert_eq!(root.attributes().get_usize("line"), Some(1));
    }
}
