//! Shared sample-solution fixtures for tests in this crate and the server.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::decompile::default_framework_references;
use crate::solution::{Solution, SolutionBuilder};

pub const SAMPLE_ROOT: &str = "/work/sample";

pub const PROGRAM_CS: &str = r#"using System;

namespace Sample
{
    public class Program
    {
        public static void Main(string[] args)
        {
            var greeter = new Greeter();
            Console.WriteLine(greeter.Greet("world"));
        }
    }
}
"#;

pub const GREETER_CS: &str = r#"using System;

namespace Sample
{
    /// <summary>Produces greetings.</summary>
    public class Greeter : IGreeter
    {
        private readonly string prefix = "Hello, ";

        /// <summary>Greets a person by name.</summary>
        /// <param name="name">Who to greet.</param>
        /// <returns>The greeting line.</returns>
        public string Greet(string name)
        {
            return prefix + name;
        }
    }
}
"#;

pub const IGREETER_CS: &str = r#"namespace Sample
{
    public interface IGreeter
    {
        string Greet(string name);
    }
}
"#;

fn fixture() -> &'static Solution {
    static FIXTURE: OnceLock<Solution> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let mut builder = SolutionBuilder::new();
        let root = PathBuf::from(SAMPLE_ROOT);
        let project = builder.add_project("Sample", &root, default_framework_references());
        builder.add_document(project, root.join("Program.cs"), PROGRAM_CS);
        builder.add_document(project, root.join("Greeter.cs"), GREETER_CS);
        builder.add_document(project, root.join("IGreeter.cs"), IGREETER_CS);
        builder.finish()
    })
}

/// A three-document sample solution with framework metadata references.
pub fn sample_solution() -> Solution {
    fixture().clone()
}

/// Write the sample project to disk so loader-driven tests can initialize
/// from a real directory.
pub fn write_sample_to(dir: &Path) -> std::io::Result<()> {
    std::fs::write(
        dir.join("Sample.csproj"),
        "<Project Sdk=\"Microsoft.NET.Sdk\"/>\n",
    )?;
    std::fs::write(dir.join("Program.cs"), PROGRAM_CS)?;
    std::fs::write(dir.join("Greeter.cs"), GREETER_CS)?;
    std::fs::write(dir.join("IGreeter.cs"), IGREETER_CS)?;
    Ok(())
}
