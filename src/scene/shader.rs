use crate::error::{AtlasBakerError, Result};
use crate::scene::ImageId;

/// Surface blend mode, part of the atlas compatibility key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlendMode {
    Opaque,
    Clip,
    Blend,
}

impl std::fmt::Display for BlendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlendMode::Opaque => write!(f, "OPAQUE"),
            BlendMode::Clip => write!(f, "CLIP"),
            BlendMode::Blend => write!(f, "BLEND"),
        }
    }
}

/// Blend operation of a mix node. Only `Mix` and `Multiply` are candidates
/// for base-color tint extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixBlend {
    Mix,
    Multiply,
    Other,
}

/// The node kinds the analyzer can distinguish. Anything else is `Other`
/// and only participates in generic link tracing.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    ImageTexture { image: Option<ImageId> },
    Mix { blend: MixBlend },
    SeparateColor,
    NormalMap,
    Principled,
    UvMap { uv_map: String },
    Output { active: bool },
    Other,
}

/// Unlinked socket default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SocketValue {
    None,
    Scalar(f32),
    Color([f32; 4]),
    Vector([f32; 3]),
}

/// A named input or output socket. Names may repeat on one node (mix nodes
/// expose same-named sockets per data type), so lookups by name return the
/// first match and precise wiring goes through indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Socket {
    pub name: String,
    pub value: SocketValue,
}

impl Socket {
    fn new(name: &str, value: SocketValue) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// Stable node handle within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// A shader node: kind tag plus ordered socket lists.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub inputs: Vec<Socket>,
    pub outputs: Vec<Socket>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, name: &str, value: SocketValue) -> Self {
        self.inputs.push(Socket::new(name, value));
        self
    }

    pub fn with_output(mut self, name: &str) -> Self {
        self.outputs.push(Socket::new(name, SocketValue::None));
        self
    }

    /// Principled surface shader with the standard PBR sockets.
    pub fn principled(name: impl Into<String>) -> Self {
        Node::new(name, NodeKind::Principled)
            .with_input("Base Color", SocketValue::Color([0.8, 0.8, 0.8, 1.0]))
            .with_input("Metallic", SocketValue::Scalar(0.0))
            .with_input("Roughness", SocketValue::Scalar(0.5))
            .with_input("Alpha", SocketValue::Scalar(1.0))
            .with_input("Normal", SocketValue::Vector([0.0, 0.0, 0.0]))
            .with_output("BSDF")
    }

    /// Material output node.
    pub fn output_material(name: impl Into<String>, active: bool) -> Self {
        Node::new(name, NodeKind::Output { active }).with_input("Surface", SocketValue::None)
    }

    /// Image texture sampler.
    pub fn image_texture(name: impl Into<String>, image: Option<ImageId>) -> Self {
        Node::new(name, NodeKind::ImageTexture { image })
            .with_input("Vector", SocketValue::Vector([0.0, 0.0, 0.0]))
            .with_output("Color")
            .with_output("Alpha")
    }

    /// Legacy two-color mix node (`Fac` / `Color1` / `Color2`).
    pub fn mix_rgb(name: impl Into<String>, blend: MixBlend) -> Self {
        Node::new(name, NodeKind::Mix { blend })
            .with_input("Fac", SocketValue::Scalar(0.5))
            .with_input("Color1", SocketValue::Color([1.0, 1.0, 1.0, 1.0]))
            .with_input("Color2", SocketValue::Color([1.0, 1.0, 1.0, 1.0]))
            .with_output("Color")
    }

    /// Generic mix node exposing `A`/`B` socket pairs per data type; the
    /// color pair is the one with four-component defaults.
    pub fn mix_color(name: impl Into<String>, blend: MixBlend) -> Self {
        Node::new(name, NodeKind::Mix { blend })
            .with_input("Factor", SocketValue::Scalar(0.5))
            .with_input("A", SocketValue::Scalar(0.0))
            .with_input("B", SocketValue::Scalar(0.0))
            .with_input("A", SocketValue::Color([1.0, 1.0, 1.0, 1.0]))
            .with_input("B", SocketValue::Color([1.0, 1.0, 1.0, 1.0]))
            .with_output("Result")
    }

    /// Channel separator (`Color` in, `Red`/`Green`/`Blue` out).
    pub fn separate_color(name: impl Into<String>) -> Self {
        Node::new(name, NodeKind::SeparateColor)
            .with_input("Color", SocketValue::Color([0.0, 0.0, 0.0, 1.0]))
            .with_output("Red")
            .with_output("Green")
            .with_output("Blue")
    }

    /// Tangent-space normal map decode.
    pub fn normal_map(name: impl Into<String>) -> Self {
        Node::new(name, NodeKind::NormalMap)
            .with_input("Strength", SocketValue::Scalar(1.0))
            .with_input("Color", SocketValue::Color([0.5, 0.5, 1.0, 1.0]))
            .with_output("Normal")
    }

    /// UV channel lookup.
    pub fn uv_map(name: impl Into<String>, uv_map: impl Into<String>) -> Self {
        Node::new(
            name,
            NodeKind::UvMap {
                uv_map: uv_map.into(),
            },
        )
        .with_output("UV")
    }
}

/// A link from one node's output socket to another node's input socket,
/// both addressed by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub from_node: NodeId,
    pub from_output: usize,
    pub to_node: NodeId,
    pub to_input: usize,
}

/// A material's shader node graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeGraph {
    nodes: Vec<Node>,
    links: Vec<Link>,
}

impl NodeGraph {
    pub fn add(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Mutable node access, e.g. for setting socket defaults after wiring.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of the first input socket with the given name.
    pub fn input_index(&self, id: NodeId, name: &str) -> Option<usize> {
        self.node(id).inputs.iter().position(|s| s.name == name)
    }

    /// First input socket with the given name.
    pub fn input_socket(&self, id: NodeId, name: &str) -> Option<&Socket> {
        self.node(id).inputs.iter().find(|s| s.name == name)
    }

    /// Index of the first output socket with the given name.
    pub fn output_index(&self, id: NodeId, name: &str) -> Option<usize> {
        self.node(id).outputs.iter().position(|s| s.name == name)
    }

    pub fn is_input_linked(&self, id: NodeId, input: usize) -> bool {
        self.incoming(id, input).is_some()
    }

    /// Follow the incoming link on an input socket to its source node and
    /// output-socket index.
    pub fn incoming(&self, id: NodeId, input: usize) -> Option<(NodeId, usize)> {
        self.links
            .iter()
            .find(|l| l.to_node == id && l.to_input == input)
            .map(|l| (l.from_node, l.from_output))
    }

    /// Connect `from`'s named output to `to`'s named input.
    pub fn connect(&mut self, from: NodeId, output: &str, to: NodeId, input: &str) -> Result<()> {
        let to_input = self.input_index(to, input).ok_or_else(|| {
            AtlasBakerError::Shader(format!(
                "node '{}' has no input socket '{input}'",
                self.node(to).name
            ))
        })?;
        self.connect_to_index(from, output, to, to_input)
    }

    /// Connect to an input addressed by index, for nodes with same-named
    /// sockets.
    pub fn connect_to_index(
        &mut self,
        from: NodeId,
        output: &str,
        to: NodeId,
        to_input: usize,
    ) -> Result<()> {
        let from_output = self.output_index(from, output).ok_or_else(|| {
            AtlasBakerError::Shader(format!(
                "node '{}' has no output socket '{output}'",
                self.node(from).name
            ))
        })?;
        if to_input >= self.node(to).inputs.len() {
            return Err(AtlasBakerError::Shader(format!(
                "node '{}' has no input socket index {to_input}",
                self.node(to).name
            )));
        }
        self.links.push(Link {
            from_node: from,
            from_output,
            to_node: to,
            to_input,
        });
        Ok(())
    }
}

/// A surface material: render settings plus its shader graph.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub blend: BlendMode,
    pub alpha_threshold: f32,
    pub use_backface_culling: bool,
    pub graph: NodeGraph,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blend: BlendMode::Opaque,
            alpha_threshold: 0.5,
            use_backface_culling: false,
            graph: NodeGraph::default(),
        }
    }
}
