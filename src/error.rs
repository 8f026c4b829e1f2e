//! Error types for the frame solver

use std::fmt;

use thiserror::Error;

use crate::analysis::StaticsCheck;

/// One of the six degrees of freedom of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DofComponent {
    DX,
    DY,
    DZ,
    RX,
    RY,
    RZ,
}

impl DofComponent {
    /// All components in global DOF order
    pub const ALL: [DofComponent; 6] = [
        DofComponent::DX,
        DofComponent::DY,
        DofComponent::DZ,
        DofComponent::RX,
        DofComponent::RY,
        DofComponent::RZ,
    ];

    /// Offset of this component within a node's block of 6 DOFs
    pub fn offset(self) -> usize {
        self as usize
    }

    /// Component for an offset in `0..6`
    pub fn from_offset(offset: usize) -> Option<Self> {
        Self::ALL.get(offset).copied()
    }
}

impl fmt::Display for DofComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DofComponent::DX => "DX",
            DofComponent::DY => "DY",
            DofComponent::DZ => "DZ",
            DofComponent::RX => "RX",
            DofComponent::RY => "RY",
            DofComponent::RZ => "RZ",
        };
        f.write_str(label)
    }
}

/// A named degree of freedom, used to report unstable DOFs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dof {
    pub node: String,
    pub component: DofComponent,
}

impl fmt::Display for Dof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.component)
    }
}

/// Broad category of an [`FEAError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad model input, raised at registration time
    Validation,
    /// The restrained stiffness system is singular
    Instability,
    /// Factorization or solve exceeded numerical tolerance
    Numerical,
    /// Global equilibrium residual exceeded tolerance
    StaticsCheck,
    /// Model (de)serialization failed
    Serialization,
}

/// Main error type for frame analysis operations
#[derive(Error, Debug)]
pub enum FEAError {
    #[error("Node '{0}' not found in model")]
    NodeNotFound(String),

    #[error("Member '{0}' not found in model")]
    MemberNotFound(String),

    #[error("Material '{0}' not found in model")]
    MaterialNotFound(String),

    #[error("Load combination '{0}' not found in model")]
    LoadCombinationNotFound(String),

    #[error("Load case '{0}' not found in model")]
    LoadCaseNotFound(String),

    #[error("Duplicate name '{0}' already exists")]
    DuplicateName(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model is unstable: {detail} (unrestrained DOFs: {})", format_dofs(.dofs))]
    Unstable { dofs: Vec<Dof>, detail: String },

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Statics check failed for {} load combination(s)", .0.len())]
    StaticsCheckFailed(Vec<StaticsCheck>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FEAError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FEAError::NodeNotFound(_)
            | FEAError::MemberNotFound(_)
            | FEAError::MaterialNotFound(_)
            | FEAError::LoadCombinationNotFound(_)
            | FEAError::LoadCaseNotFound(_)
            | FEAError::DuplicateName(_)
            | FEAError::InvalidGeometry(_)
            | FEAError::InvalidInput(_) => ErrorKind::Validation,
            FEAError::Unstable { .. } => ErrorKind::Instability,
            FEAError::Numerical(_) => ErrorKind::Numerical,
            FEAError::StaticsCheckFailed(_) => ErrorKind::StaticsCheck,
            FEAError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// DOFs implicated in an instability error, empty otherwise
    pub fn unstable_dofs(&self) -> &[Dof] {
        match self {
            FEAError::Unstable { dofs, .. } => dofs,
            _ => &[],
        }
    }
}

fn format_dofs(dofs: &[Dof]) -> String {
    if dofs.is_empty() {
        return "unknown".to_string();
    }
    dofs.iter()
        .map(|dof| dof.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for frame analysis operations
pub type FEAResult<T> = Result<T, FEAError>;
