/// The error type for operations given a node handle which is not an element of the tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The node is not linked into any tree. It was either never inserted or already removed.
    #[error("node is not linked into a tree")]
    Detached,

    /// The node is linked into a different tree.
    #[error("node is linked into a different tree")]
    ForeignNode,
}
