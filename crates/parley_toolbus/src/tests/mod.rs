
use parley_core::{AgentTool, BuildConfiguration, RuntimeConfiguration, ToolDependency, ToolType};

pub(crate) fn python_tool(name: &str) -> AgentTool {
    let runtime = RuntimeConfiguration::new("python:3.10-slim", format!("python {name}.py"))
        .with_dependency(ToolDependency::python("numpy"));
    AgentTool::new(format!("id-{name}"), name, ToolType::Python310, format!("{name}.py"), runtime, None)
        .unwrap()
}

pub(crate) fn c_tool(name: &str) -> AgentTool {
    let runtime = RuntimeConfiguration::new("debian:bookworm-slim", format!("./{name}"));
    let build = BuildConfiguration::new("gcc:13", format!("gcc -o {name} {name}.c"))
        .with_dependency(ToolDependency::new(parley_core::DependencyKind::StaticLibrary, "libz.a"));
    AgentTool::new(format!("id-{name}"), name, ToolType::C, format!("{name}.c"), runtime, Some(build))
        .unwrap()
}
