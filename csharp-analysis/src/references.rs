//! Reference and implementation search across a solution.
//!
//! Identifier-based: every whole-word occurrence of a symbol's name outside
//! comments and literals counts as a reference. That over-approximates what a
//! semantic engine would report, which is the right trade for a scanner; a
//! name that appears is at least textually coupled to the symbol.

use crate::cancel::{CancelToken, Cancelled};
use crate::solution::{DocumentId, Solution};
use crate::syntax::{self, Declaration};
use crate::text::TextSpan;

/// All reference locations for `name` across the solution, in document order.
pub fn find_references(
    solution: &Solution,
    name: &str,
    cancel: &CancelToken,
) -> Result<Vec<(DocumentId, TextSpan)>, Cancelled> {
    let mut results = Vec::new();
    for (_, document) in solution.documents() {
        cancel.check()?;
        for span in syntax::identifier_occurrences(&document.text, name) {
            results.push((document.id, span));
        }
    }
    Ok(results)
}

/// Reference spans within a single document's text.
pub fn document_references(text: &str, name: &str) -> Vec<TextSpan> {
    syntax::identifier_occurrences(text, name)
}

/// Declarations across the solution whose base list names `name`: classes
/// implementing an interface or deriving from a base type.
pub fn find_implementations(
    solution: &Solution,
    name: &str,
    cancel: &CancelToken,
) -> Result<Vec<(DocumentId, Declaration)>, Cancelled> {
    let mut results = Vec::new();
    for (_, document) in solution.documents() {
        cancel.check()?;
        let declarations = syntax::scan_declarations(&document.text);
        for decl in syntax::flatten(&declarations) {
            if decl.bases.iter().any(|base| base == name) {
                results.push((document.id, decl.clone()));
            }
        }
    }
    Ok(results)
}

/// Declarations across the solution with the given name.
pub fn find_declarations(solution: &Solution, name: &str) -> Vec<(DocumentId, Declaration)> {
    let mut results = Vec::new();
    for (_, document) in solution.documents() {
        let declarations = syntax::scan_declarations(&document.text);
        for decl in syntax::find_by_name(&declarations, name) {
            results.push((document.id, decl.clone()));
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solution::SolutionBuilder;

    fn sample() -> Solution {
        let mut builder = SolutionBuilder::new();
        let app = builder.add_project("App", "/work/app", Vec::new());
        builder.add_document(
            app,
            "/work/app/IShape.cs",
            "public interface IShape { double Area(); }",
        );
        builder.add_document(
            app,
            "/work/app/Circle.cs",
            "public class Circle : IShape { public double Area() { return 3.14; } }",
        );
        builder.add_document(
            app,
            "/work/app/Main.cs",
            "class Main { IShape shape = new Circle(); }",
        );
        builder.finish()
    }

    #[test]
    fn references_span_all_documents() {
        let solution = sample();
        let refs = find_references(&solution, "IShape", &CancelToken::new()).unwrap();
        assert_eq!(refs.len(), 3);
    }

    #[test]
    fn implementations_follow_base_lists() {
        let solution = sample();
        let impls = find_implementations(&solution, "IShape", &CancelToken::new()).unwrap();
        assert_eq!(impls.len(), 1);
        assert_eq!(impls[0].1.name, "Circle");
    }

    #[test]
    fn cancellation_stops_the_walk() {
        let solution = sample();
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(find_references(&solution, "IShape", &token), Err(Cancelled));
    }

    #[test]
    fn declarations_found_by_name() {
        let solution = sample();
        let decls = find_declarations(&solution, "Area");
        assert_eq!(decls.len(), 2);
    }
}
