use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum InventoryError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// A carton's configuration could not be resolved (missing band range,
    /// empty identity fields, bad transform key, etc.).
    Configuration { carton: String, message: String },
    /// A declared band is missing on an entry and neither a transform source
    /// nor a sentinel is available.
    Placeholder { carton: String, row: usize, band: String },
    /// Missing expected column in an input row.
    MissingColumn { carton: String, row: usize, column: String },
    /// The target lookup collaborator failed.
    Lookup { carton: String, message: String },
    /// Illegal entry state transition.
    Stage { row: usize, from: String, to: String },
    /// Carton catalog selection produced nothing or was malformed.
    Selection(String),
    /// Carton list file could not be parsed.
    ListParse { line: usize, message: String },
    /// IO error (file read, etc.).
    Io(String),
}

impl InventoryError {
    /// Stable snake_case tag used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "config_parse",
            Self::Configuration { .. } => "configuration",
            Self::Placeholder { .. } => "placeholder",
            Self::MissingColumn { .. } => "missing_column",
            Self::Lookup { .. } => "lookup",
            Self::Stage { .. } => "stage",
            Self::Selection(_) => "selection",
            Self::ListParse { .. } => "list_parse",
            Self::Io(_) => "io",
        }
    }

    pub(crate) fn configuration(carton: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            carton: carton.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for InventoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::Configuration { carton, message } => {
                write!(f, "carton '{carton}': configuration error: {message}")
            }
            Self::Placeholder { carton, row, band } => write!(
                f,
                "carton '{carton}', row {row}: band '{band}' is missing and has no transform source or sentinel"
            ),
            Self::MissingColumn { carton, row, column } => {
                write!(f, "carton '{carton}', row {row}: missing column '{column}'")
            }
            Self::Lookup { carton, message } => {
                write!(f, "carton '{carton}': target lookup failed: {message}")
            }
            Self::Stage { row, from, to } => {
                write!(f, "row {row}: illegal stage transition {from} -> {to}")
            }
            Self::Selection(msg) => write!(f, "selection error: {msg}"),
            Self::ListParse { line, message } => {
                write!(f, "carton list line {line}: {message}")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for InventoryError {}
