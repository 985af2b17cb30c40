#![forbid(unsafe_code)]

/// Element types a layer-test input tensor can carry.
///
/// The unary parameter surface only ever feeds three element types into a
/// graph: 32-bit floats for the numeric operators, 32-bit signed integers
/// for the bitwise operators, and booleans for the logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Bool,
    I32,
    F32,
}

impl ElementType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I32 => "i32",
            Self::F32 => "f32",
        }
    }

    #[must_use]
    pub const fn item_size(self) -> usize {
        match self {
            Self::Bool => 1,
            Self::I32 | Self::F32 => 4,
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(Self::Bool),
            "i32" | "int32" => Some(Self::I32),
            "f32" | "float32" => Some(Self::F32),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    ZeroDimension { shape: Vec<usize> },
    Overflow,
    ElementCountMismatch { expected: usize, actual: usize },
}

impl ShapeError {
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::ZeroDimension { .. } => "shape_zero_dimension_rejected",
            Self::Overflow => "shape_element_count_overflow",
            Self::ElementCountMismatch { .. } => "shape_element_count_mismatch",
        }
    }
}

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroDimension { shape } => {
                write!(f, "shape {shape:?} contains a zero extent")
            }
            Self::Overflow => write!(f, "size arithmetic overflow"),
            Self::ElementCountMismatch { expected, actual } => {
                write!(f, "element count mismatch expected={expected} actual={actual}")
            }
        }
    }
}

impl std::error::Error for ShapeError {}

/// Number of elements described by a shape. Rank-0 counts as one scalar.
pub fn element_count(shape: &[usize]) -> Result<usize, ShapeError> {
    if shape.contains(&0) {
        return Err(ShapeError::ZeroDimension {
            shape: shape.to_vec(),
        });
    }
    shape.iter().try_fold(1usize, |acc, &dim| {
        acc.checked_mul(dim).ok_or(ShapeError::Overflow)
    })
}

/// Homogeneous typed buffer backing one generated input or one output.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Bool(Vec<bool>),
    I32(Vec<i32>),
    F32(Vec<f32>),
}

impl TensorData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::F32(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        match self {
            Self::Bool(_) => ElementType::Bool,
            Self::I32(_) => ElementType::I32,
            Self::F32(_) => ElementType::F32,
        }
    }

    /// Lossy view of the buffer as f64 values; booleans map to 0.0/1.0.
    #[must_use]
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Self::Bool(v) => v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
            Self::I32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::F32(v) => v.iter().map(|&x| f64::from(x)).collect(),
        }
    }
}

/// One generated tensor: the requested shape plus its filled buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl InputTensor {
    pub fn new(shape: Vec<usize>, data: TensorData) -> Result<Self, ShapeError> {
        let expected = element_count(&shape)?;
        if data.len() != expected {
            return Err(ShapeError::ElementCountMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    #[must_use]
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    #[must_use]
    pub fn into_data(self) -> TensorData {
        self.data
    }
}
