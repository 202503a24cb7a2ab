//! Decompiled views of metadata types.
//!
//! A real compiler backend decompiles IL; this one renders a C# skeleton from
//! the stub tables carried by a project's metadata references. The output is
//! scanner-friendly source, so every downstream feature (hover, symbols,
//! navigation) works on decompiled documents the same way it works on user
//! code.

use std::sync::Arc;

use crate::solution::{MetadataMember, MetadataReference, MetadataType};
use crate::syntax::CsSymbolKind;

/// Render one metadata type as decompiled C# source.
pub fn decompile_type(reference: &MetadataReference, ty: &MetadataType) -> String {
    let mut out = String::new();
    out.push_str(&format!("#region Assembly {}\n", reference.assembly_name));
    out.push_str("// Decompiled from metadata\n");
    out.push_str("#endregion\n\n");

    let indent = match ty.namespace() {
        Some(namespace) => {
            out.push_str(&format!("namespace {namespace}\n{{\n"));
            "    "
        }
        None => "",
    };

    if let Some(summary) = &ty.summary {
        out.push_str(&format!("{indent}/// <summary>{summary}</summary>\n"));
    }
    let keyword = match ty.kind {
        CsSymbolKind::Struct => "struct",
        CsSymbolKind::Interface => "interface",
        CsSymbolKind::Enum => "enum",
        _ => "class",
    };
    out.push_str(&format!("{indent}public {keyword} {}\n{indent}{{\n", ty.simple_name()));
    for member in &ty.members {
        if let Some(summary) = &member.summary {
            out.push_str(&format!("{indent}    /// <summary>{summary}</summary>\n"));
        }
        out.push_str(&format!("{indent}    {};\n", member.signature));
    }
    out.push_str(&format!("{indent}}}\n"));
    if ty.namespace().is_some() {
        out.push_str("}\n");
    }
    out
}

fn method(name: &str, signature: &str, summary: &str) -> MetadataMember {
    MetadataMember {
        name: name.to_string(),
        kind: CsSymbolKind::Method,
        signature: signature.to_string(),
        summary: Some(summary.to_string()),
    }
}

fn property(name: &str, signature: &str, summary: &str) -> MetadataMember {
    MetadataMember {
        name: name.to_string(),
        kind: CsSymbolKind::Property,
        signature: signature.to_string(),
        summary: Some(summary.to_string()),
    }
}

/// The framework surface every loaded project references implicitly.
///
/// Small on purpose: just enough of `System` for navigation into metadata to
/// be exercisable end to end.
pub fn default_framework_references() -> Vec<Arc<MetadataReference>> {
    vec![Arc::new(MetadataReference {
        assembly_name: "System.Runtime".to_string(),
        types: vec![
            MetadataType {
                full_name: "System.Object".to_string(),
                kind: CsSymbolKind::Class,
                summary: Some("Supports all classes in the .NET class hierarchy.".to_string()),
                members: vec![
                    method(
                        "ToString",
                        "public virtual string ToString()",
                        "Returns a string that represents the current object.",
                    ),
                    method(
                        "Equals",
                        "public virtual bool Equals(object obj)",
                        "Determines whether the specified object is equal to the current object.",
                    ),
                    method(
                        "GetHashCode",
                        "public virtual int GetHashCode()",
                        "Serves as the default hash function.",
                    ),
                ],
            },
            MetadataType {
                full_name: "System.String".to_string(),
                kind: CsSymbolKind::Class,
                summary: Some("Represents text as a sequence of UTF-16 code units.".to_string()),
                members: vec![
                    property(
                        "Length",
                        "public int Length { get; }",
                        "Gets the number of characters in the current String object.",
                    ),
                    method(
                        "Substring",
                        "public string Substring(int startIndex, int length)",
                        "Retrieves a substring from this instance.",
                    ),
                    method(
                        "Contains",
                        "public bool Contains(string value)",
                        "Returns a value indicating whether a specified substring occurs within this string.",
                    ),
                ],
            },
            MetadataType {
                full_name: "System.Console".to_string(),
                kind: CsSymbolKind::Class,
                summary: Some(
                    "Represents the standard input, output, and error streams for console applications."
                        .to_string(),
                ),
                members: vec![
                    method(
                        "WriteLine",
                        "public static void WriteLine(string value)",
                        "Writes the specified string value, followed by the current line terminator, to the standard output stream.",
                    ),
                    method(
                        "Write",
                        "public static void Write(string value)",
                        "Writes the specified string value to the standard output stream.",
                    ),
                    method(
                        "ReadLine",
                        "public static string ReadLine()",
                        "Reads the next line of characters from the standard input stream.",
                    ),
                ],
            },
        ],
    })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::scan_declarations;

    #[test]
    fn decompiled_console_is_scannable() {
        let references = default_framework_references();
        let reference = &references[0];
        let console = reference.find_type("Console").unwrap();
        let source = decompile_type(reference, console);

        let declarations = scan_declarations(&source);
        let ns = declarations
            .iter()
            .find(|d| d.kind == CsSymbolKind::Namespace)
            .unwrap();
        assert_eq!(ns.name, "System");
        let class = &ns.children[0];
        assert_eq!(class.name, "Console");
        assert!(class.children.iter().any(|m| m.name == "WriteLine"));
    }

    #[test]
    fn decompiled_source_names_the_assembly() {
        let references = default_framework_references();
        let reference = &references[0];
        let ty = reference.find_type("System.String").unwrap();
        let source = decompile_type(reference, ty);
        assert!(source.contains("Assembly System.Runtime"));
    }

    #[test]
    fn framework_table_resolves_by_simple_and_full_name() {
        let references = default_framework_references();
        let reference = &references[0];
        assert!(reference.find_type("Object").is_some());
        assert!(reference.find_type("System.Object").is_some());
        assert!(reference.find_type("Missing").is_none());
    }
}
