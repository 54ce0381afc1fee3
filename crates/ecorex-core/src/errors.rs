use thiserror::Error;

/// Result type alias using ModelError
pub type Result<T> = std::result::Result<T, ModelError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of all errors
/// raised by the modeling runtime. Each kind maps to a stable error code that
/// can be used for programmatic error handling, testing, and tool output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Values and meta lookups
    BadValue,
    UnknownFeature,
    UnknownType,
    UnboundType,

    // Meta layer structure
    AbstractInstantiation,
    CycleInSupertypes,
    OppositeViolation,
    DerivedFeatureReadOnly,

    // Resources and documents
    UnresolvedProxy,
    DocumentMalformed,
    UnexpectedRoot,
    NotFound,
    AlreadyExists,

    // Editing
    CommandInapplicable,
    Forbidden,
    NotImplemented,

    // Integration/IO
    Io,
    Serialization,
    Concurrency,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::BadValue => "ERR_BAD_VALUE",
            ExErrorKind::UnknownFeature => "ERR_UNKNOWN_FEATURE",
            ExErrorKind::UnknownType => "ERR_UNKNOWN_TYPE",
            ExErrorKind::UnboundType => "ERR_UNBOUND_TYPE",
            ExErrorKind::AbstractInstantiation => "ERR_ABSTRACT_INSTANTIATION",
            ExErrorKind::CycleInSupertypes => "ERR_CYCLE_IN_SUPERTYPES",
            ExErrorKind::OppositeViolation => "ERR_OPPOSITE_VIOLATION",
            ExErrorKind::DerivedFeatureReadOnly => "ERR_DERIVED_FEATURE_READ_ONLY",
            ExErrorKind::UnresolvedProxy => "ERR_UNRESOLVED_PROXY",
            ExErrorKind::DocumentMalformed => "ERR_DOCUMENT_MALFORMED",
            ExErrorKind::UnexpectedRoot => "ERR_UNEXPECTED_ROOT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::CommandInapplicable => "ERR_COMMAND_INAPPLICABLE",
            ExErrorKind::Forbidden => "ERR_FORBIDDEN",
            ExErrorKind::NotImplemented => "ERR_NOT_IMPLEMENTED",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// This error type provides a structured representation of errors with
/// classification fields for programmatic handling and rich context for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    object_id: Option<String>,
    feature: Option<String>,
    line: Option<usize>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            object_id: None,
            feature: None,
            line: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add object identifier context
    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    /// Add feature name context
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    /// Add document line context
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the object identifier context, if any
    pub fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    /// Get the feature name context, if any
    pub fn feature(&self) -> Option<&str> {
        self.feature.as_deref()
    }

    /// Get the document line context, if any
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(object_id) = &self.object_id {
            write!(f, " (object: {})", object_id)?;
        }
        if let Some(feature) = &self.feature {
            write!(f, " (feature: {})", feature)?;
        }
        if let Some(line) = self.line {
            write!(f, " (line: {})", line)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for reflective modeling operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    // ===== Value Errors =====
    /// A write whose value violates type, enum membership, or cardinality
    #[error("Bad value for feature '{feature}': {reason}")]
    BadValue { feature: String, reason: String },

    /// A derived feature was written and has no setter
    #[error("Derived feature '{feature}' is read-only")]
    DerivedFeatureReadOnly { feature: String },

    // ===== Meta Lookup Errors =====
    /// Reflective feature lookup failed
    #[error("Unknown feature '{feature}' on class {class}{}", line_suffix(.line))]
    UnknownFeature {
        class: String,
        feature: String,
        line: Option<usize>,
    },

    /// Classifier or package lookup failed
    #[error("Unknown type '{name}'{}", line_suffix(.line))]
    UnknownType { name: String, line: Option<usize> },

    /// A feature was used before its type was bound
    #[error("Feature '{feature}' has no bound type")]
    UnboundType { feature: String },

    // ===== Meta Structure Errors =====
    /// An abstract class was instantiated
    #[error("Cannot instantiate abstract class {class}")]
    AbstractInstantiation { class: String },

    /// Adding a super-type would make the super-class closure cyclic
    #[error("Adding super-type {super_type} to {class} creates a cycle")]
    CycleInSupertypes { class: String, super_type: String },

    /// Opposite declaration is inconsistent
    #[error("Invalid opposite {feature} <-> {opposite}: {reason}")]
    OppositeViolation {
        feature: String,
        opposite: String,
        reason: String,
    },

    // ===== Object and Resource Errors =====
    /// Object handle does not belong to this resource set
    #[error("Object not found: {object}")]
    ObjectNotFound { object: String },

    /// A proxy's target cannot be located
    #[error("Unresolved proxy {uri}#{fragment}")]
    UnresolvedProxy { uri: String, fragment: String },

    /// Resource lookup failed
    #[error("Resource not found: {uri}")]
    ResourceNotFound { uri: String },

    /// A resource with this URI already exists in the set
    #[error("Resource already exists: {uri}")]
    ResourceExists { uri: String },

    /// The metamodel registry was mutated while a load or save was running
    #[error("Registry is busy: cannot register {ns_uri} during load or save")]
    RegistryBusy { ns_uri: String },

    // ===== Document Errors =====
    /// Document input does not fit the grammar
    #[error("Malformed document: {reason}{}", line_suffix(.line))]
    DocumentMalformed { reason: String, line: Option<usize> },

    /// The document root is not an object, package or XMI wrapper
    #[error("Unexpected document root <{tag}>")]
    UnexpectedRoot { tag: String },

    /// Byte-stream provider failure
    #[error("I/O failure on {uri}: {message}")]
    Io { uri: String, message: String },

    // ===== Editing Errors =====
    /// `can_execute` was false when a command was submitted
    #[error("Command '{command}' cannot be executed")]
    CommandInapplicable { command: String },

    /// A command targets an object outside the editing domain
    #[error("Object {object} is not in a resource of this editing domain")]
    NotInDomain { object: String },

    // ===== Operation Errors =====
    /// No operation with this name exists in the class hierarchy
    #[error("Unknown operation '{operation}' on class {class}")]
    UnknownOperation { class: String, operation: String },

    /// The operation exists but carries no behavior
    #[error("Operation '{operation}' has no behavior")]
    OperationNotImplemented { operation: String },

    // ===== Generic Errors =====
    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(" at line {}", line),
        None => String::new(),
    }
}

impl ModelError {
    /// Shorthand for a `BadValue` error
    pub fn bad_value(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::BadValue {
            feature: feature.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a `DocumentMalformed` error
    pub fn malformed(reason: impl Into<String>, line: Option<usize>) -> Self {
        ModelError::DocumentMalformed {
            reason: reason.into(),
            line,
        }
    }

    /// Canonical kind of this error
    pub fn kind(&self) -> ExErrorKind {
        ExError::from(self.clone()).kind()
    }
}

/// Conversion from ModelError to ExError
impl From<ModelError> for ExError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::BadValue { feature, reason } => ExError::new(ExErrorKind::BadValue)
                .with_feature(feature)
                .with_message(reason),

            ModelError::DerivedFeatureReadOnly { feature } => {
                ExError::new(ExErrorKind::DerivedFeatureReadOnly)
                    .with_feature(feature)
                    .with_message("Derived feature has no setter")
            }

            ModelError::UnknownFeature {
                class,
                feature,
                line,
            } => {
                let err = ExError::new(ExErrorKind::UnknownFeature)
                    .with_feature(feature)
                    .with_message(format!("No such feature on class {}", class));
                match line {
                    Some(line) => err.with_line(line),
                    None => err,
                }
            }

            ModelError::UnknownType { name, line } => {
                let err = ExError::new(ExErrorKind::UnknownType)
                    .with_message(format!("Unknown type {}", name));
                match line {
                    Some(line) => err.with_line(line),
                    None => err,
                }
            }

            ModelError::UnboundType { feature } => ExError::new(ExErrorKind::UnboundType)
                .with_feature(feature)
                .with_message("Feature type is not bound"),

            ModelError::AbstractInstantiation { class } => {
                ExError::new(ExErrorKind::AbstractInstantiation)
                    .with_op("create")
                    .with_message(format!("Class {} is abstract", class))
            }

            ModelError::CycleInSupertypes { class, super_type } => {
                ExError::new(ExErrorKind::CycleInSupertypes)
                    .with_op("add_supertype")
                    .with_message(format!("{} -> {} closes a cycle", class, super_type))
            }

            ModelError::OppositeViolation {
                feature,
                opposite,
                reason,
            } => ExError::new(ExErrorKind::OppositeViolation)
                .with_feature(feature)
                .with_message(format!("Opposite {}: {}", opposite, reason)),

            ModelError::ObjectNotFound { object } => ExError::new(ExErrorKind::NotFound)
                .with_object_id(object)
                .with_message("Object not found"),

            ModelError::UnresolvedProxy { uri, fragment } => {
                ExError::new(ExErrorKind::UnresolvedProxy)
                    .with_op("proxy_resolve")
                    .with_message(format!("Cannot resolve {}#{}", uri, fragment))
            }

            ModelError::ResourceNotFound { uri } => ExError::new(ExErrorKind::NotFound)
                .with_message(format!("Resource not found: {}", uri)),

            ModelError::ResourceExists { uri } => ExError::new(ExErrorKind::AlreadyExists)
                .with_message(format!("Resource already exists: {}", uri)),

            ModelError::RegistryBusy { ns_uri } => ExError::new(ExErrorKind::Concurrency)
                .with_op("register_package")
                .with_message(format!("Registry busy while registering {}", ns_uri)),

            ModelError::DocumentMalformed { reason, line } => {
                let err = ExError::new(ExErrorKind::DocumentMalformed).with_message(reason);
                match line {
                    Some(line) => err.with_line(line),
                    None => err,
                }
            }

            ModelError::UnexpectedRoot { tag } => ExError::new(ExErrorKind::UnexpectedRoot)
                .with_message(format!("Unexpected root element <{}>", tag)),

            ModelError::Io { uri, message } => ExError::new(ExErrorKind::Io)
                .with_message(format!("{}: {}", uri, message)),

            ModelError::CommandInapplicable { command } => {
                ExError::new(ExErrorKind::CommandInapplicable)
                    .with_op("command_execute")
                    .with_message(format!("Command {} cannot be executed", command))
            }

            ModelError::NotInDomain { object } => ExError::new(ExErrorKind::Forbidden)
                .with_object_id(object)
                .with_message("Object is not in a resource of this editing domain"),

            ModelError::UnknownOperation { class, operation } => {
                ExError::new(ExErrorKind::NotFound)
                    .with_op("invoke")
                    .with_message(format!("Unknown operation {} on {}", operation, class))
            }

            ModelError::OperationNotImplemented { operation } => {
                ExError::new(ExErrorKind::NotImplemented)
                    .with_op("invoke")
                    .with_message(format!("Operation {} has no behavior", operation))
            }

            ModelError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            ModelError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to ModelError
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization {
            message: err.to_string(),
        }
    }
}
