#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use flt_dtype::{element_count, ElementType, InputTensor, ShapeError, TensorData};

/// Current graph wire format. Bumped when the node/tensor layout changes.
pub const GRAPH_FORMAT_VERSION: u32 = 1;

/// Conventional name of the single input slot in a built unary graph.
pub const INPUT_SLOT_NAME: &str = "Input";

/// Conventional name of the single operator node in a built unary graph.
pub const OPERATION_NODE_NAME: &str = "Operation";

pub const GRAPH_REASON_CODES: [&str; 5] = [
    "graph_unknown_tensor",
    "graph_missing_input",
    "graph_element_type_mismatch",
    "graph_shape_mismatch",
    "graph_invalid_shape",
];

/// The unary operators the conformance surface sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Abs,
    Acos,
    Acosh,
    Asin,
    Asinh,
    Atan,
    Atanh,
    BitwiseNot,
    Ceiling,
    Floor,
    Log,
    LogicalNot,
    Mish,
    Negative,
    Relu,
    Sign,
    Square,
    Sqrt,
    Tan,
    Tanh,
}

pub const ALL_OPS: [UnaryOp; 20] = [
    UnaryOp::Abs,
    UnaryOp::Acos,
    UnaryOp::Acosh,
    UnaryOp::Asin,
    UnaryOp::Asinh,
    UnaryOp::Atan,
    UnaryOp::Atanh,
    UnaryOp::BitwiseNot,
    UnaryOp::Ceiling,
    UnaryOp::Floor,
    UnaryOp::Log,
    UnaryOp::LogicalNot,
    UnaryOp::Mish,
    UnaryOp::Negative,
    UnaryOp::Relu,
    UnaryOp::Sign,
    UnaryOp::Square,
    UnaryOp::Sqrt,
    UnaryOp::Tan,
    UnaryOp::Tanh,
];

impl UnaryOp {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Acos => "acos",
            Self::Acosh => "acosh",
            Self::Asin => "asin",
            Self::Asinh => "asinh",
            Self::Atan => "atan",
            Self::Atanh => "atanh",
            Self::BitwiseNot => "bitwise_not",
            Self::Ceiling => "ceiling",
            Self::Floor => "floor",
            Self::Log => "log",
            Self::LogicalNot => "logical_not",
            Self::Mish => "mish",
            Self::Negative => "negative",
            Self::Relu => "relu",
            Self::Sign => "sign",
            Self::Square => "square",
            Self::Sqrt => "sqrt",
            Self::Tan => "tan",
            Self::Tanh => "tanh",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        ALL_OPS.into_iter().find(|op| op.name() == name)
    }

    /// Element type this operator consumes and produces.
    #[must_use]
    pub const fn element_type(self) -> ElementType {
        match self {
            Self::LogicalNot => ElementType::Bool,
            Self::BitwiseNot => ElementType::I32,
            _ => ElementType::F32,
        }
    }

    /// Reference evaluation on f32. `None` for the non-float operators.
    #[must_use]
    pub fn apply_f32(self, x: f32) -> Option<f32> {
        match self {
            Self::Abs => Some(x.abs()),
            Self::Acos => Some(x.acos()),
            Self::Acosh => Some(x.acosh()),
            Self::Asin => Some(x.asin()),
            Self::Asinh => Some(x.asinh()),
            Self::Atan => Some(x.atan()),
            Self::Atanh => Some(x.atanh()),
            Self::Ceiling => Some(x.ceil()),
            Self::Floor => Some(x.floor()),
            Self::Log => Some(x.ln()),
            // mish(x) = x * tanh(softplus(x)), softplus(x) = ln(1 + e^x)
            Self::Mish => Some(x * x.exp().ln_1p().tanh()),
            Self::Negative => Some(-x),
            Self::Relu => Some(x.max(0.0)),
            Self::Sign => Some(if x == 0.0 { 0.0 } else { x.signum() }),
            Self::Square => Some(x * x),
            Self::Sqrt => Some(x.sqrt()),
            Self::Tan => Some(x.tan()),
            Self::Tanh => Some(x.tanh()),
            Self::BitwiseNot | Self::LogicalNot => None,
        }
    }

    /// Reference evaluation on i32. `None` for everything but the bitwise complement.
    #[must_use]
    pub const fn apply_i32(self, x: i32) -> Option<i32> {
        match self {
            Self::BitwiseNot => Some(!x),
            _ => None,
        }
    }

    /// Reference evaluation on bool. `None` for everything but the logical complement.
    #[must_use]
    pub const fn apply_bool(self, x: bool) -> Option<bool> {
        match self {
            Self::LogicalNot => Some(!x),
            _ => None,
        }
    }
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    UnknownTensor { name: String },
    MissingInput { name: String },
    ElementTypeMismatch {
        op: UnaryOp,
        expected: ElementType,
        actual: ElementType,
    },
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    InvalidShape(ShapeError),
}

impl GraphError {
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::UnknownTensor { .. } => "graph_unknown_tensor",
            Self::MissingInput { .. } => "graph_missing_input",
            Self::ElementTypeMismatch { .. } => "graph_element_type_mismatch",
            Self::ShapeMismatch { .. } => "graph_shape_mismatch",
            Self::InvalidShape(_) => "graph_invalid_shape",
        }
    }
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTensor { name } => write!(f, "tensor '{name}' is not declared"),
            Self::MissingInput { name } => write!(f, "input slot '{name}' was not supplied"),
            Self::ElementTypeMismatch { op, expected, actual } => write!(
                f,
                "operator {op} expects {} elements, got {}",
                expected.name(),
                actual.name()
            ),
            Self::ShapeMismatch { expected, actual } => {
                write!(f, "shape mismatch expected={expected:?} actual={actual:?}")
            }
            Self::InvalidShape(err) => write!(f, "invalid shape: {err}"),
        }
    }
}

impl std::error::Error for GraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidShape(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShapeError> for GraphError {
    fn from(err: ShapeError) -> Self {
        Self::InvalidShape(err)
    }
}

/// Declared tensor: a name plus its static type and shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    pub name: String,
    pub element_type: ElementType,
    pub shape: Vec<usize>,
}

/// One operator application inside a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub op: UnaryOp,
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Minimal dataflow graph: declared tensors, nodes in execution order,
/// and the named input/output slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    pub tensors: BTreeMap<String, TensorInfo>,
    pub nodes: Vec<Node>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub format_version: u32,
}

impl Graph {
    pub fn tensor(&self, name: &str) -> Result<&TensorInfo, GraphError> {
        self.tensors.get(name).ok_or_else(|| GraphError::UnknownTensor {
            name: name.to_string(),
        })
    }
}

/// Builds the single-operator graph under test.
///
/// Returns the primary graph plus an optional hand-built reference graph.
/// `None` means the reference side is derived by direct evaluation of the
/// operator, which is the case for every operator in the current set.
pub fn build_unary_graph(
    op: UnaryOp,
    shape: &[usize],
    format_version: u32,
) -> Result<(Graph, Option<Graph>), GraphError> {
    element_count(shape)?;

    let element_type = op.element_type();
    let output_name = format!("{OPERATION_NODE_NAME}:0");

    let mut tensors = BTreeMap::new();
    tensors.insert(
        INPUT_SLOT_NAME.to_string(),
        TensorInfo {
            name: INPUT_SLOT_NAME.to_string(),
            element_type,
            shape: shape.to_vec(),
        },
    );
    tensors.insert(
        output_name.clone(),
        TensorInfo {
            name: output_name.clone(),
            element_type,
            shape: shape.to_vec(),
        },
    );

    let graph = Graph {
        tensors,
        nodes: vec![Node {
            op,
            name: OPERATION_NODE_NAME.to_string(),
            inputs: vec![INPUT_SLOT_NAME.to_string()],
            outputs: vec![output_name.clone()],
        }],
        inputs: vec![INPUT_SLOT_NAME.to_string()],
        outputs: vec![output_name],
        format_version,
    };

    Ok((graph, None))
}

/// Primary execution path. Kept behind a trait so the harness never
/// hard-codes how graphs get run.
pub trait LayerExecutor {
    fn execute(
        &self,
        graph: &Graph,
        inputs: &BTreeMap<String, InputTensor>,
    ) -> Result<InputTensor, GraphError>;
}

/// In-process executor: walks the node list and applies each operator's
/// reference semantics elementwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphInterpreter;

impl GraphInterpreter {
    fn apply_node(node: &Node, input: &InputTensor) -> Result<InputTensor, GraphError> {
        let op = node.op;
        let expected = op.element_type();
        let actual = input.element_type();
        if expected != actual {
            return Err(GraphError::ElementTypeMismatch { op, expected, actual });
        }

        let data = match input.data() {
            TensorData::F32(values) => {
                let mut out = Vec::with_capacity(values.len());
                for &x in values {
                    match op.apply_f32(x) {
                        Some(y) => out.push(y),
                        None => {
                            return Err(GraphError::ElementTypeMismatch {
                                op,
                                expected,
                                actual,
                            })
                        }
                    }
                }
                TensorData::F32(out)
            }
            TensorData::I32(values) => {
                let mut out = Vec::with_capacity(values.len());
                for &x in values {
                    match op.apply_i32(x) {
                        Some(y) => out.push(y),
                        None => {
                            return Err(GraphError::ElementTypeMismatch {
                                op,
                                expected,
                                actual,
                            })
                        }
                    }
                }
                TensorData::I32(out)
            }
            TensorData::Bool(values) => {
                let mut out = Vec::with_capacity(values.len());
                for &x in values {
                    match op.apply_bool(x) {
                        Some(y) => out.push(y),
                        None => {
                            return Err(GraphError::ElementTypeMismatch {
                                op,
                                expected,
                                actual,
                            })
                        }
                    }
                }
                TensorData::Bool(out)
            }
        };

        InputTensor::new(input.shape().to_vec(), data).map_err(GraphError::from)
    }
}

impl LayerExecutor for GraphInterpreter {
    fn execute(
        &self,
        graph: &Graph,
        inputs: &BTreeMap<String, InputTensor>,
    ) -> Result<InputTensor, GraphError> {
        let mut env: BTreeMap<String, InputTensor> = BTreeMap::new();

        for slot in &graph.inputs {
            let info = graph.tensor(slot)?;
            let tensor = inputs.get(slot).ok_or_else(|| GraphError::MissingInput {
                name: slot.clone(),
            })?;
            if tensor.shape() != info.shape.as_slice() {
                return Err(GraphError::ShapeMismatch {
                    expected: info.shape.clone(),
                    actual: tensor.shape().to_vec(),
                });
            }
            env.insert(slot.clone(), tensor.clone());
        }

        for node in &graph.nodes {
            let input_name = node.inputs.first().ok_or_else(|| GraphError::MissingInput {
                name: node.name.clone(),
            })?;
            let input = env.get(input_name).ok_or_else(|| GraphError::UnknownTensor {
                name: input_name.clone(),
            })?;
            let output = Self::apply_node(node, input)?;
            for output_name in &node.outputs {
                env.insert(output_name.clone(), output.clone());
            }
        }

        let result_name = graph.outputs.first().ok_or_else(|| GraphError::UnknownTensor {
            name: "<no output declared>".to_string(),
        })?;
        env.remove(result_name).ok_or_else(|| GraphError::UnknownTensor {
            name: result_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use flt_dtype::{ElementType, InputTensor, TensorData};

    use super::{
        build_unary_graph, GraphError, GraphInterpreter, LayerExecutor, UnaryOp, ALL_OPS,
        GRAPH_FORMAT_VERSION, INPUT_SLOT_NAME, OPERATION_NODE_NAME,
    };

    fn run_single(
        op: UnaryOp,
        shape: &[usize],
        data: TensorData,
    ) -> Result<InputTensor, GraphError> {
        let (graph, reference) = build_unary_graph(op, shape, GRAPH_FORMAT_VERSION)?;
        assert!(reference.is_none());
        let tensor = InputTensor::new(shape.to_vec(), data).expect("input tensor");
        let mut inputs = BTreeMap::new();
        inputs.insert(INPUT_SLOT_NAME.to_string(), tensor);
        GraphInterpreter.execute(&graph, &inputs)
    }

    #[test]
    fn names_round_trip_through_parse() {
        for op in ALL_OPS {
            assert_eq!(UnaryOp::parse(op.name()), Some(op));
        }
        assert_eq!(UnaryOp::parse("modulo"), None);
    }

    #[test]
    fn element_types_follow_operator_kind() {
        assert_eq!(UnaryOp::LogicalNot.element_type(), ElementType::Bool);
        assert_eq!(UnaryOp::BitwiseNot.element_type(), ElementType::I32);
        assert_eq!(UnaryOp::Sqrt.element_type(), ElementType::F32);
    }

    #[test]
    fn built_graph_uses_conventional_names() {
        let (graph, _) =
            build_unary_graph(UnaryOp::Tanh, &[10, 12], GRAPH_FORMAT_VERSION).expect("graph");
        assert_eq!(graph.inputs, vec![INPUT_SLOT_NAME.to_string()]);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].name, OPERATION_NODE_NAME);
        assert_eq!(graph.format_version, GRAPH_FORMAT_VERSION);
    }

    #[test]
    fn builder_rejects_zero_extent_shapes() {
        let err = build_unary_graph(UnaryOp::Abs, &[4, 0], GRAPH_FORMAT_VERSION)
            .expect_err("zero extent");
        assert_eq!(err.reason_code(), "graph_invalid_shape");
    }

    #[test]
    fn interpreter_applies_sqrt_elementwise() {
        let out = run_single(UnaryOp::Sqrt, &[4], TensorData::F32(vec![0.0, 1.0, 4.0, 9.0]))
            .expect("execute");
        assert_eq!(out.data(), &TensorData::F32(vec![0.0, 1.0, 2.0, 3.0]));
        assert_eq!(out.shape(), &[4]);
    }

    #[test]
    fn interpreter_complements_bitwise_and_logical() {
        let ints = run_single(UnaryOp::BitwiseNot, &[3], TensorData::I32(vec![0, -1, 255]))
            .expect("execute");
        assert_eq!(ints.data(), &TensorData::I32(vec![-1, 0, -256]));

        let bools = run_single(UnaryOp::LogicalNot, &[2], TensorData::Bool(vec![false, true]))
            .expect("execute");
        assert_eq!(bools.data(), &TensorData::Bool(vec![true, false]));
    }

    #[test]
    fn interpreter_rejects_mismatched_element_type() {
        let err = run_single(UnaryOp::Sqrt, &[2], TensorData::I32(vec![1, 2]))
            .expect_err("type mismatch");
        assert_eq!(err.reason_code(), "graph_element_type_mismatch");
    }

    #[test]
    fn interpreter_rejects_missing_input_slot() {
        let (graph, _) =
            build_unary_graph(UnaryOp::Abs, &[2], GRAPH_FORMAT_VERSION).expect("graph");
        let err = GraphInterpreter
            .execute(&graph, &BTreeMap::new())
            .expect_err("missing input");
        assert_eq!(err.reason_code(), "graph_missing_input");
    }

    #[test]
    fn sign_is_zero_at_zero() {
        assert_eq!(UnaryOp::Sign.apply_f32(0.0), Some(0.0));
        assert_eq!(UnaryOp::Sign.apply_f32(-3.5), Some(-1.0));
        assert_eq!(UnaryOp::Sign.apply_f32(3.5), Some(1.0));
    }

    #[test]
    fn mish_matches_closed_form() {
        let x = 1.5f32;
        let expected = x * x.exp().ln_1p().tanh();
        assert_eq!(UnaryOp::Mish.apply_f32(x), Some(expected));
        // mish(0) = 0 exactly
        assert_eq!(UnaryOp::Mish.apply_f32(0.0), Some(0.0));
    }

    #[test]
    fn float_application_refuses_non_float_operators() {
        assert_eq!(UnaryOp::LogicalNot.apply_f32(1.0), None);
        assert_eq!(UnaryOp::BitwiseNot.apply_f32(1.0), None);
        assert_eq!(UnaryOp::Tanh.apply_i32(1), None);
        assert_eq!(UnaryOp::Tanh.apply_bool(true), None);
    }
}
