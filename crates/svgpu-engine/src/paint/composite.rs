use crate::backend::{BlendFactor, CompositeState};

/// Porter-Duff style composite operations.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum CompositeOperation {
    #[default]
    SourceOver,
    SourceIn,
    SourceOut,
    Atop,
    DestinationOver,
    DestinationIn,
    DestinationOut,
    DestinationAtop,
    Lighter,
    Copy,
    Xor,
}

impl CompositeOperation {
    /// Blend factors realizing this operation on premultiplied colors.
    pub fn state(self) -> CompositeState {
        use BlendFactor::*;

        let (src, dst) = match self {
            CompositeOperation::SourceOver => (One, OneMinusSrcAlpha),
            CompositeOperation::SourceIn => (DstAlpha, Zero),
            CompositeOperation::SourceOut => (OneMinusDstAlpha, Zero),
            CompositeOperation::Atop => (DstAlpha, OneMinusSrcAlpha),
            CompositeOperation::DestinationOver => (OneMinusDstAlpha, One),
            CompositeOperation::DestinationIn => (Zero, SrcAlpha),
            CompositeOperation::DestinationOut => (Zero, OneMinusSrcAlpha),
            CompositeOperation::DestinationAtop => (OneMinusDstAlpha, SrcAlpha),
            CompositeOperation::Lighter => (One, One),
            CompositeOperation::Copy => (One, Zero),
            CompositeOperation::Xor => (OneMinusDstAlpha, OneMinusSrcAlpha),
        };

        CompositeState::uniform(src, dst)
    }
}

impl From<CompositeOperation> for CompositeState {
    fn from(op: CompositeOperation) -> Self {
        op.state()
    }
}
