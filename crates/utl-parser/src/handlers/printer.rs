use log::info;
use utl_core::NodeId;

use crate::{
    handler::{Expr, Handler, HandlerResult, Literal, Reduction, Statement},
    span::Spanned,
};

/// Logs every reduction at `info` level under the `utl_parser::printer`
/// target and builds nothing.
///
/// Install it next to a tree-building handler to trace a parse:
///
/// ```
/// use utl_parser::{AstHandler, Handler, Parser, PrinterHandler};
///
/// let handlers: Vec<Box<dyn Handler>> = vec![
///     Box::new(AstHandler::new(false)),
///     Box::new(PrinterHandler::new(false)),
/// ];
/// let output = Parser::new(handlers).parse("[% x; %]")?;
/// assert!(output.root.is_some());
/// # Ok::<(), utl_parser::error::ParseError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PrinterHandler {
    strict: bool,
}

impl PrinterHandler {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    fn print(&self, r: &Reduction<'_>, production: &str) -> HandlerResult {
        info!(
            target: "utl_parser::printer",
            file = r.file(),
            start = r.span().start(),
            end = r.span().end(),
            line = r.line();
            "{production}"
        );
        Ok(None)
    }
}

impl Handler for PrinterHandler {
    fn is_strict(&self) -> bool {
        self.strict
    }

    fn utldoc(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "utldoc")
    }

    fn statement_list(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "statement_list")
    }

    fn statement(&mut self, r: &mut Reduction<'_>, statement: Statement<'_>) -> HandlerResult {
        match statement {
            Statement::Keyword(keyword) => self.print(r, &format!("statement ({})", keyword.as_str())),
            Statement::Document(_) => self.print(r, "statement (document)"),
            Statement::Empty | Statement::Node(_) => self.print(r, "statement"),
        }
    }

    fn eostmt(&mut self, r: &mut Reduction<'_>, _: &str) -> HandlerResult {
        self.print(r, "eostmt")
    }

    fn echo_stmt(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "echo_stmt")
    }

    fn expr(&mut self, r: &mut Reduction<'_>, expr: Expr<'_>) -> HandlerResult {
        match expr {
            Expr::Unary { operator, .. } | Expr::Binary { operator, .. } => {
                self.print(r, &format!("expr ({operator})"))
            }
            Expr::Id(name) => self.print(r, &format!("expr (id {name})")),
            Expr::Operand(_) => self.print(r, "expr"),
        }
    }

    fn literal(&mut self, r: &mut Reduction<'_>, _: Literal<'_>) -> HandlerResult {
        self.print(r, "literal")
    }

    fn array_literal(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "array_literal")
    }

    fn array_elems(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "array_elems")
    }

    fn array_ref(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "array_ref")
    }

    fn macro_call(
        &mut self,
        r: &mut Reduction<'_>,
        _: Option<NodeId>,
        _: Option<NodeId>,
        name: &str,
    ) -> HandlerResult {
        self.print(r, &format!("macro_call ({name})"))
    }

    fn arg_list(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "arg_list")
    }

    fn arg(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>, _: Option<&str>) -> HandlerResult {
        self.print(r, "arg")
    }

    fn paren_expr(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "paren_expr")
    }

    fn if_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        _: Option<NodeId>,
        _: Option<NodeId>,
        _: Option<NodeId>,
        _: Option<NodeId>,
    ) -> HandlerResult {
        self.print(r, "if_stmt")
    }

    fn abbrev_if_stmt(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "abbrev_if_stmt")
    }

    fn elseif_stmts(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "elseif_stmts")
    }

    fn elseif_stmt(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "elseif_stmt")
    }

    fn else_stmt(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "else_stmt")
    }

    fn for_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        each: bool,
        _: Option<NodeId>,
        _: Option<NodeId>,
        _: Option<NodeId>,
    ) -> HandlerResult {
        self.print(r, if each { "for_stmt (each)" } else { "for_stmt" })
    }

    fn as_clause(&mut self, r: &mut Reduction<'_>, _: &[Spanned<&str>]) -> HandlerResult {
        self.print(r, "as_clause")
    }

    fn while_stmt(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "while_stmt")
    }

    fn macro_defn(
        &mut self,
        r: &mut Reduction<'_>,
        _: Option<NodeId>,
        _: Option<NodeId>,
        name: &str,
    ) -> HandlerResult {
        self.print(r, &format!("macro_defn ({name})"))
    }

    fn macro_decl(
        &mut self,
        r: &mut Reduction<'_>,
        _: Option<NodeId>,
        _: Option<NodeId>,
        _: &str,
    ) -> HandlerResult {
        self.print(r, "macro_decl")
    }

    fn param_list(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "param_list")
    }

    fn param_decl(&mut self, r: &mut Reduction<'_>, _: Spanned<&str>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "param_decl")
    }

    fn dotted_id(&mut self, r: &mut Reduction<'_>, _: &str, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "dotted_id")
    }

    fn include_stmt(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>, _: Option<&str>) -> HandlerResult {
        self.print(r, "include_stmt")
    }

    fn call_stmt(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "call_stmt")
    }

    fn default_assignment(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "default_assignment")
    }

    fn return_stmt(&mut self, r: &mut Reduction<'_>, _: Option<NodeId>) -> HandlerResult {
        self.print(r, "return_stmt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn test_printer_builds_nothing() {
        let mut parser = Parser::with_handler(PrinterHandler::new(false));
        let output = parser.parse("[% macro m(a); echo a; end; m(1); %]").unwrap();
        assert!(output.root.is_none());
        assert!(output.tree.is_empty());
        assert_eq!(parser.error_count(), 0);
    }

    #[test]
    fn test_strict_printer_aborts() {
        let mut parser = Parser::with_handler(PrinterHandler::new(true));
        assert!(parser.parse("[% a b; %]").is_err());
        assert_eq!(parser.error_count(), 1);
    }
}
