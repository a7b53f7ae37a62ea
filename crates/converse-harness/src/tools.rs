use std::fmt;

/// Caller context that decides which tools are advertised (for example
/// `AIAnalyst` or `AIAssistant`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Source(pub String);

impl Source {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Declaration of a tool as advertised to providers.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: serde_json::Value,
    /// Sources in which the tool is advertised.
    pub sources: Vec<Source>,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            sources: Vec::new(),
        }
    }

    /// Adds a source in which the tool is advertised.
    pub fn source(mut self, source: impl Into<Source>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn available_in(&self, source: &Source) -> bool {
        self.sources.contains(source)
    }
}

/// How the provider may pick tools.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model decides.
    #[default]
    Auto,
    /// The model must call the named tool.
    Required(String),
}

/// Which tools the caller exposes for a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolPolicy {
    pub source: Source,
    /// Pins exactly one tool and forces the provider to call it.
    pub pinned_tool: Option<String>,
}

impl ToolPolicy {
    pub fn for_source(source: impl Into<Source>) -> Self {
        Self {
            source: source.into(),
            pinned_tool: None,
        }
    }

    pub fn pin(mut self, tool: impl Into<String>) -> Self {
        self.pinned_tool = Some(tool.into());
        self
    }
}

/// Picks the tools to advertise and the matching tool choice.
pub fn select_tools(specs: &[ToolSpec], policy: &ToolPolicy) -> (Vec<ToolSpec>, ToolChoice) {
    match &policy.pinned_tool {
        Some(name) => {
            let pinned: Vec<ToolSpec> = specs.iter().filter(|s| &s.name == name).cloned().collect();
            if pinned.is_empty() {
                (pinned, ToolChoice::Auto)
            } else {
                (pinned, ToolChoice::Required(name.clone()))
            }
        }
        None => (
            specs
                .iter()
                .filter(|s| s.available_in(&policy.source))
                .cloned()
                .collect(),
            ToolChoice::Auto,
        ),
    }
}
